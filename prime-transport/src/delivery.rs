//! Synchronous frame delivery
//!
//! A transport hands every received frame to its subscriber through a
//! `FrameDelivery` and waits until the subscriber has finished handling it.
//! The channel has depth one and every frame carries its own acknowledgement,
//! so a transport can never run ahead of the handler.

use bytes::Bytes;
use prime_core::{PrimeError, PrimeResult, Sna};
use std::time::SystemTime;
use tokio::sync::{mpsc, oneshot};

/// Frame received from the medium
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundFrame {
    /// Subnetwork the frame was received on
    pub source: Sna,
    /// Reception time
    pub timestamp: SystemTime,
    /// Direction flag reported by the receiver
    pub downlink: bool,
    /// Raw MAC frame bytes
    pub raw: Bytes,
}

impl InboundFrame {
    /// Create a frame stamped with the current time
    pub fn new(source: Sna, downlink: bool, raw: Bytes) -> Self {
        Self {
            source,
            timestamp: SystemTime::now(),
            downlink,
            raw,
        }
    }
}

struct Delivery {
    frame: InboundFrame,
    ack: oneshot::Sender<()>,
}

/// Create a connected delivery/inbox pair
pub fn delivery_channel() -> (FrameDelivery, FrameInbox) {
    let (tx, rx) = mpsc::channel(1);
    (FrameDelivery { tx }, FrameInbox { rx })
}

/// Sending half given to a transport
#[derive(Clone)]
pub struct FrameDelivery {
    tx: mpsc::Sender<Delivery>,
}

impl FrameDelivery {
    /// Deliver a frame and wait until the subscriber has handled it
    ///
    /// # Returns
    /// `Err(PrimeError::Closed)` once the inbox is gone.
    pub async fn deliver(&self, frame: InboundFrame) -> PrimeResult<()> {
        let (ack, done) = oneshot::channel();
        self.tx
            .send(Delivery { frame, ack })
            .await
            .map_err(|_| PrimeError::Closed)?;
        done.await.map_err(|_| PrimeError::Closed)
    }

    /// Whether the inbox has been dropped
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving half owned by the subscriber
pub struct FrameInbox {
    rx: mpsc::Receiver<Delivery>,
}

impl FrameInbox {
    /// Wait for the next frame
    ///
    /// Returns `None` once every `FrameDelivery` is dropped.
    pub async fn recv(&mut self) -> Option<PendingFrame> {
        self.rx.recv().await.map(|delivery| PendingFrame {
            frame: delivery.frame,
            ack: Some(delivery.ack),
        })
    }
}

/// A received frame whose sender is still waiting
///
/// The sender is released when this value is dropped.
pub struct PendingFrame {
    frame: InboundFrame,
    ack: Option<oneshot::Sender<()>>,
}

impl PendingFrame {
    pub fn frame(&self) -> &InboundFrame {
        &self.frame
    }
}

impl Drop for PendingFrame {
    fn drop(&mut self) {
        if let Some(ack) = self.ack.take() {
            let _ = ack.send(());
        }
    }
}
