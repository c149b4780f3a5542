//! In-memory transport
//!
//! `ChannelTransport` is the medium side given to the attack, `ChannelPeer`
//! plays the rest of the network: it sees every frame sent and injects
//! inbound frames, blocking until the subscriber has handled them.

use crate::delivery::{FrameDelivery, InboundFrame};
use crate::transport::FrameTransport;
use async_trait::async_trait;
use bytes::Bytes;
use prime_core::{PrimeError, PrimeResult};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

struct Shared {
    delivery: Mutex<Option<FrameDelivery>>,
}

/// Create a connected transport/peer pair
pub fn channel_transport() -> (ChannelTransport, ChannelPeer) {
    let shared = Arc::new(Shared {
        delivery: Mutex::new(None),
    });
    let (sent_tx, sent_rx) = mpsc::unbounded_channel();
    (
        ChannelTransport {
            shared: shared.clone(),
            sent_tx,
        },
        ChannelPeer { shared, sent_rx },
    )
}

/// Transport half of an in-memory medium
pub struct ChannelTransport {
    shared: Arc<Shared>,
    sent_tx: mpsc::UnboundedSender<Bytes>,
}

#[async_trait]
impl FrameTransport for ChannelTransport {
    async fn send(&self, frame: &[u8]) -> PrimeResult<()> {
        self.sent_tx
            .send(Bytes::copy_from_slice(frame))
            .map_err(|_| PrimeError::Closed)
    }

    fn subscribe(&self, delivery: FrameDelivery) -> PrimeResult<()> {
        let mut current = self
            .shared
            .delivery
            .lock()
            .map_err(|_| PrimeError::Transport("Subscription lock poisoned".to_string()))?;
        if current.replace(delivery).is_some() {
            log::debug!("Replacing previous frame subscriber");
        }
        Ok(())
    }
}

/// Network half of an in-memory medium
pub struct ChannelPeer {
    shared: Arc<Shared>,
    sent_rx: mpsc::UnboundedReceiver<Bytes>,
}

impl ChannelPeer {
    /// Deliver a frame to the subscriber and wait until it is handled
    pub async fn inject(&self, frame: InboundFrame) -> PrimeResult<()> {
        let delivery = self
            .shared
            .delivery
            .lock()
            .map_err(|_| PrimeError::Transport("Subscription lock poisoned".to_string()))?
            .clone()
            .ok_or_else(|| PrimeError::Transport("No frame subscriber".to_string()))?;
        delivery.deliver(frame).await
    }

    /// Wait for the next frame written by the transport
    pub async fn recv_sent(&mut self) -> Option<Bytes> {
        self.sent_rx.recv().await
    }

    /// Next frame written by the transport, if one is queued
    pub fn try_recv_sent(&mut self) -> Option<Bytes> {
        self.sent_rx.try_recv().ok()
    }

    /// Drain every queued frame written by the transport
    pub fn drain_sent(&mut self) -> Vec<Bytes> {
        let mut frames = Vec::new();
        while let Some(frame) = self.try_recv_sent() {
            frames.push(frame);
        }
        frames
    }

    /// Whether a subscriber is registered
    pub fn has_subscriber(&self) -> bool {
        self.shared
            .delivery
            .lock()
            .map(|d| d.as_ref().is_some_and(|d| !d.is_closed()))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::delivery_channel;
    use prime_core::Sna;

    #[tokio::test]
    async fn test_sent_frames_reach_peer() {
        let (transport, mut peer) = channel_transport();
        transport.send(&[1, 2, 3]).await.unwrap();
        transport.send(&[4]).await.unwrap();
        assert_eq!(peer.recv_sent().await.unwrap().as_ref(), &[1, 2, 3]);
        assert_eq!(peer.drain_sent().len(), 1);
        assert!(peer.try_recv_sent().is_none());
    }

    #[tokio::test]
    async fn test_send_after_peer_dropped() {
        let (transport, peer) = channel_transport();
        drop(peer);
        assert!(matches!(transport.send(&[1]).await, Err(PrimeError::Closed)));
    }

    #[tokio::test]
    async fn test_inject_requires_subscriber() {
        let (transport, peer) = channel_transport();
        let frame = InboundFrame::new(Sna::new([0; 6]), false, Bytes::from_static(&[0x61]));
        assert!(peer.inject(frame.clone()).await.is_err());

        let (delivery, mut inbox) = delivery_channel();
        transport.subscribe(delivery).unwrap();
        assert!(peer.has_subscriber());

        let consumer = tokio::spawn(async move {
            let pending = inbox.recv().await.unwrap();
            pending.frame().raw.clone()
        });
        peer.inject(frame).await.unwrap();
        assert_eq!(consumer.await.unwrap().as_ref(), &[0x61]);
    }
}
