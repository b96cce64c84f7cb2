//! GateStatus - Monotonic Gate Resolution
//!
//! Within one activation a gate only ever moves forward:
//! `Unresolved -> Satisfied` or `Unresolved -> Blocking`.

use std::fmt;

/// Resolution status of a single gate within one activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GateStatus {
    /// Not yet checked, or checked and still waiting.
    #[default]
    Unresolved,
    /// Passed. Cached for the rest of the activation.
    Satisfied,
    /// Definitively failed for this activation.
    Blocking,
}

impl GateStatus {
    /// Check if the gate has passed
    pub fn is_satisfied(&self) -> bool {
        matches!(self, GateStatus::Satisfied)
    }

    /// Check if the gate has reached a final status
    pub fn is_resolved(&self) -> bool {
        !matches!(self, GateStatus::Unresolved)
    }

    /// Move to `next`, refusing any backward or sideways move.
    ///
    /// Re-asserting the current status is allowed so that re-evaluation
    /// stays idempotent.
    pub fn advance(&mut self, next: GateStatus) -> Result<(), StatusRegression> {
        match (*self, next) {
            (from, to) if from == to => Ok(()),
            (GateStatus::Unresolved, to) => {
                *self = to;
                Ok(())
            }
            (from, to) => Err(StatusRegression { from, to }),
        }
    }
}

impl fmt::Display for GateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateStatus::Unresolved => f.write_str("unresolved"),
            GateStatus::Satisfied => f.write_str("satisfied"),
            GateStatus::Blocking => f.write_str("blocking"),
        }
    }
}

/// A rejected attempt to move a resolved gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusRegression {
    pub from: GateStatus,
    pub to: GateStatus,
}

impl fmt::Display for StatusRegression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gate status cannot move from {} to {}", self.from, self.to)
    }
}

impl std::error::Error for StatusRegression {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unresolved_moves_forward() {
        let mut status = GateStatus::Unresolved;
        assert!(status.advance(GateStatus::Satisfied).is_ok());
        assert_eq!(status, GateStatus::Satisfied);

        let mut status = GateStatus::Unresolved;
        assert!(status.advance(GateStatus::Blocking).is_ok());
        assert_eq!(status, GateStatus::Blocking);
    }

    #[test]
    fn resolved_never_moves_back() {
        let mut status = GateStatus::Satisfied;
        let err = status.advance(GateStatus::Unresolved).unwrap_err();
        assert_eq!(err.from, GateStatus::Satisfied);
        assert_eq!(status, GateStatus::Satisfied);

        let mut status = GateStatus::Blocking;
        assert!(status.advance(GateStatus::Satisfied).is_err());
    }

    #[test]
    fn reasserting_is_idempotent() {
        let mut status = GateStatus::Satisfied;
        assert!(status.advance(GateStatus::Satisfied).is_ok());
        assert_eq!(status, GateStatus::Satisfied);
    }
}
