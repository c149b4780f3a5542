//! Frame transport trait

use crate::delivery::FrameDelivery;
use async_trait::async_trait;
use prime_core::PrimeResult;

/// Access to the power-line medium
///
/// A transport writes serialized MAC frames and pushes every frame it receives
/// to the current subscriber, waiting for each delivery to be handled before
/// pushing the next one.
#[async_trait]
pub trait FrameTransport: Send + Sync {
    /// Write one serialized frame to the medium
    ///
    /// # Returns
    /// `Err(PrimeError::Closed)` when the medium is gone for good; other
    /// errors are transient.
    async fn send(&self, frame: &[u8]) -> PrimeResult<()>;

    /// Register the subscriber of inbound frames
    ///
    /// A new subscription replaces the previous one.
    fn subscribe(&self, delivery: FrameDelivery) -> PrimeResult<()>;
}

#[async_trait]
impl<T: FrameTransport + ?Sized> FrameTransport for std::sync::Arc<T> {
    async fn send(&self, frame: &[u8]) -> PrimeResult<()> {
        (**self).send(frame).await
    }

    fn subscribe(&self, delivery: FrameDelivery) -> PrimeResult<()> {
        (**self).subscribe(delivery)
    }
}
