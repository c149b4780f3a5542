//! Resend and deadline timers
//!
//! Both timers are plain deadlines owned by the driver: arming records an
//! instant, disarming clears it, and the driver loop sleeps until the
//! earliest one. Nothing runs in the background, so a disarmed timer can
//! never fire late.

use std::time::Duration;
use tokio::time::{sleep_until, Instant};

/// Periodic retransmission timer
#[derive(Debug, Clone)]
pub struct ResendTimer {
    interval: Duration,
    next: Option<Instant>,
}

impl ResendTimer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: None,
        }
    }

    /// Schedule the next tick one interval after `now`
    pub fn arm(&mut self, now: Instant) {
        self.next = Some(now + self.interval);
    }

    pub fn disarm(&mut self) {
        self.next = None;
    }

    pub fn next_fire(&self) -> Option<Instant> {
        self.next
    }

    pub fn is_armed(&self) -> bool {
        self.next.is_some()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

/// Absolute timeout of the attack
#[derive(Debug, Clone)]
pub struct Deadline {
    timeout: Duration,
    at: Option<Instant>,
}

impl Deadline {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout, at: None }
    }

    pub fn arm(&mut self, now: Instant) {
        self.at = Some(now + self.timeout);
    }

    pub fn disarm(&mut self) {
        self.at = None;
    }

    pub fn expiry(&self) -> Option<Instant> {
        self.at
    }

    pub fn is_armed(&self) -> bool {
        self.at.is_some()
    }
}

/// Sleep until `at`, or forever when there is nothing to wait for
pub async fn sleep_until_opt(at: Option<Instant>) {
    match at {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resend_timer() {
        let now = Instant::now();
        let mut timer = ResendTimer::new(Duration::from_secs(1));
        assert!(!timer.is_armed());

        timer.arm(now);
        assert_eq!(timer.next_fire(), Some(now + Duration::from_secs(1)));

        timer.disarm();
        timer.disarm();
        assert_eq!(timer.next_fire(), None);
    }

    #[test]
    fn test_deadline() {
        let now = Instant::now();
        let mut deadline = Deadline::new(Duration::from_secs(120));
        deadline.arm(now);
        assert_eq!(deadline.expiry(), Some(now + Duration::from_secs(120)));
        deadline.disarm();
        assert!(!deadline.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_until_opt() {
        let start = Instant::now();
        sleep_until_opt(Some(start + Duration::from_millis(500))).await;
        assert!(Instant::now() >= start + Duration::from_millis(500));

        let unarmed = tokio::time::timeout(Duration::from_secs(3600), sleep_until_opt(None)).await;
        assert!(unarmed.is_err());
    }
}
