//! ActivationState - Where a Guarded Flow Stands
//!
//! One logical flow (one button, one send screen) owns exactly one
//! activation at a time. Its state is always one of these four variants.
//!
//! ```text
//! Inactive --Begin--> PendingAtGate(0)
//! PendingAtGate(i) --Pending(j >= i)--> PendingAtGate(j)
//! PendingAtGate(i) --Block(j >= i)--> Blocked(j)
//! PendingAtGate(i) --Complete--> Completed --Fire--> Inactive
//! * --Reset--> Inactive
//! ```

use std::fmt;

/// The state of a flow activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActivationState {
    /// No activation is open. The next trigger starts a fresh lifetime.
    #[default]
    Inactive,
    /// Suspended on the gate at this index of the chain.
    PendingAtGate(usize),
    /// The gate at this index failed definitively. Terminal until reset.
    Blocked(usize),
    /// Every gate is satisfied and the terminal action is due.
    Completed,
}

impl ActivationState {
    /// Check if no activation is open
    pub fn is_inactive(&self) -> bool {
        matches!(self, ActivationState::Inactive)
    }

    /// Check if the activation is suspended on a gate
    pub fn is_pending(&self) -> bool {
        matches!(self, ActivationState::PendingAtGate(_))
    }

    /// Check if the activation is blocked
    pub fn is_blocked(&self) -> bool {
        matches!(self, ActivationState::Blocked(_))
    }

    /// Check if the activation has completed
    pub fn is_completed(&self) -> bool {
        matches!(self, ActivationState::Completed)
    }

    /// Index of the pending gate, if suspended
    pub fn pending_index(&self) -> Option<usize> {
        match self {
            ActivationState::PendingAtGate(i) => Some(*i),
            _ => None,
        }
    }

    /// Index of the gate the activation is parked on, pending or blocked
    pub fn gate_index(&self) -> Option<usize> {
        match self {
            ActivationState::PendingAtGate(i) | ActivationState::Blocked(i) => Some(*i),
            _ => None,
        }
    }
}

impl fmt::Display for ActivationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivationState::Inactive => f.write_str("inactive"),
            ActivationState::PendingAtGate(i) => write!(f, "pending at gate {i}"),
            ActivationState::Blocked(i) => write!(f, "blocked at gate {i}"),
            ActivationState::Completed => f.write_str("completed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_inactive() {
        assert_eq!(ActivationState::default(), ActivationState::Inactive);
    }

    #[test]
    fn gate_index_covers_pending_and_blocked() {
        assert_eq!(ActivationState::PendingAtGate(2).gate_index(), Some(2));
        assert_eq!(ActivationState::Blocked(1).gate_index(), Some(1));
        assert_eq!(ActivationState::Completed.gate_index(), None);
        assert_eq!(ActivationState::Blocked(1).pending_index(), None);
    }
}
