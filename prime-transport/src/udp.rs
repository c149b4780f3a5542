//! UDP bridge transport
//!
//! Talks to a power-line modem bridge over UDP. Outbound datagrams carry one
//! raw MAC frame. Inbound datagrams carry a 7-byte prefix in front of the
//! frame:
//!
//! ```text
//! +-----------+-------+-----------------+
//! | SNA (6)   | flags | raw MAC frame   |
//! +-----------+-------+-----------------+
//! ```
//! Bit 0 of `flags` is set when the bridge received the frame as downlink.

use crate::delivery::{FrameDelivery, InboundFrame};
use crate::transport::FrameTransport;
use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use prime_core::{PrimeError, PrimeResult, Sna};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

/// Maximum UDP payload size
pub const MAX_UDP_PAYLOAD_SIZE: usize = 65507;

/// Length of the inbound datagram prefix
pub const DATAGRAM_PREFIX_LEN: usize = 7;

const FLAG_DOWNLINK: u8 = 0x01;

/// UDP bridge settings
#[derive(Debug, Clone)]
pub struct UdpSettings {
    pub local_address: SocketAddr,
    pub bridge_address: SocketAddr,
}

impl UdpSettings {
    /// Create settings binding an ephemeral local port
    pub fn new(bridge_address: SocketAddr) -> Self {
        let local_address = if bridge_address.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };
        Self {
            local_address,
            bridge_address,
        }
    }

    /// Create settings with an explicit local address
    pub fn with_local_address(bridge_address: SocketAddr, local_address: SocketAddr) -> Self {
        Self {
            local_address,
            bridge_address,
        }
    }
}

/// Encode an inbound frame the way the bridge sends it
pub fn encode_datagram(frame: &InboundFrame) -> Bytes {
    let mut buf = BytesMut::with_capacity(DATAGRAM_PREFIX_LEN + frame.raw.len());
    buf.put_slice(frame.source.as_bytes());
    buf.put_u8(if frame.downlink { FLAG_DOWNLINK } else { 0 });
    buf.put_slice(&frame.raw);
    buf.freeze()
}

/// Decode a datagram received from the bridge
pub fn decode_datagram(datagram: &[u8]) -> PrimeResult<InboundFrame> {
    if datagram.len() <= DATAGRAM_PREFIX_LEN {
        return Err(PrimeError::FrameInvalid(format!(
            "Bridge datagram too short: {} bytes",
            datagram.len()
        )));
    }

    let mut sna = [0u8; 6];
    sna.copy_from_slice(&datagram[..6]);
    Ok(InboundFrame::new(
        Sna::new(sna),
        datagram[6] & FLAG_DOWNLINK != 0,
        Bytes::copy_from_slice(&datagram[DATAGRAM_PREFIX_LEN..]),
    ))
}

/// Transport bridged over UDP
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    settings: UdpSettings,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl UdpTransport {
    /// Bind the local socket
    pub async fn bind(settings: UdpSettings) -> PrimeResult<Self> {
        let socket = UdpSocket::bind(settings.local_address).await?;
        log::info!(
            "UDP bridge transport bound to {}, bridge at {}",
            socket.local_addr()?,
            settings.bridge_address
        );
        Ok(Self {
            socket: Arc::new(socket),
            settings,
            reader: Mutex::new(None),
        })
    }

    /// Local address of the bound socket
    pub fn local_addr(&self) -> PrimeResult<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    async fn read_loop(socket: Arc<UdpSocket>, bridge: SocketAddr, delivery: FrameDelivery) {
        let mut buf = vec![0u8; MAX_UDP_PAYLOAD_SIZE];
        loop {
            let (len, addr) = match socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(e) => {
                    log::warn!("UDP bridge receive failed: {}", e);
                    continue;
                }
            };

            // Only the bridge may inject frames
            if addr != bridge {
                log::trace!("Dropping datagram from unexpected peer {}", addr);
                continue;
            }

            let frame = match decode_datagram(&buf[..len]) {
                Ok(frame) => frame,
                Err(e) => {
                    log::trace!("Dropping bridge datagram: {}", e);
                    continue;
                }
            };

            if delivery.deliver(frame).await.is_err() {
                log::debug!("Frame subscriber gone, stopping UDP reader");
                break;
            }
        }
    }
}

#[async_trait]
impl FrameTransport for UdpTransport {
    async fn send(&self, frame: &[u8]) -> PrimeResult<()> {
        if frame.len() > MAX_UDP_PAYLOAD_SIZE {
            return Err(PrimeError::Transport(format!(
                "Frame of {} bytes exceeds UDP payload",
                frame.len()
            )));
        }
        self.socket
            .send_to(frame, self.settings.bridge_address)
            .await?;
        Ok(())
    }

    fn subscribe(&self, delivery: FrameDelivery) -> PrimeResult<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| PrimeError::Transport(format!("No async runtime: {}", e)))?;
        let mut reader = self
            .reader
            .lock()
            .map_err(|_| PrimeError::Transport("Reader lock poisoned".to_string()))?;
        if let Some(previous) = reader.take() {
            previous.abort();
        }
        *reader = Some(runtime.spawn(Self::read_loop(
            self.socket.clone(),
            self.settings.bridge_address,
            delivery,
        )));
        Ok(())
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        if let Ok(mut reader) = self.reader.lock() {
            if let Some(handle) = reader.take() {
                handle.abort();
            }
        }
    }
}
