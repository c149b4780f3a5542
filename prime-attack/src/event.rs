//! Events reported to the operator

/// Notification emitted by a running attack
///
/// `Timeout`, `Cancelled` and `Completed` are terminal: an attack emits at
/// most one of them.
#[derive(Debug, Clone, PartialEq)]
pub enum AttackEvent {
    Started,
    /// Human-readable status line
    Status(String),
    /// Coarse progress in `[0, 1]`
    Progress(f32),
    /// The target never answered before the deadline
    Timeout,
    Cancelled,
    Completed,
}

impl AttackEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AttackEvent::Timeout | AttackEvent::Cancelled | AttackEvent::Completed
        )
    }
}
