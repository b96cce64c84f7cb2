//! Disable/Explain surface.
//!
//! What the rendering layer reads on every redraw. Derived purely from
//! the activation state and gate snapshots; computing it has no effects.

use crate::gate::{GateSnapshot, Hold};
use crate::verdict::Explanation;
use serde::{Deserialize, Serialize};
use turnstile_flow::ActivationState;

/// Trigger affordance derived from the current activation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Surface {
    /// The trigger control should not accept presses.
    pub disabled: bool,
    /// Reason to show next to the control.
    pub explanation: Option<Explanation>,
    /// The pending gate failed transiently and can be retried.
    pub retry_available: bool,
}

impl Surface {
    pub fn derive(state: ActivationState, snapshots: &[GateSnapshot]) -> Self {
        match state {
            ActivationState::Inactive | ActivationState::Completed => Surface::default(),
            ActivationState::Blocked(index) => Surface {
                disabled: true,
                explanation: snapshots.get(index).and_then(|s| s.explanation.clone()),
                retry_available: false,
            },
            ActivationState::PendingAtGate(index) => {
                let Some(snapshot) = snapshots.get(index) else {
                    return Surface::default();
                };
                match &snapshot.hold {
                    // Only an async check in flight disables; a synchronous
                    // wait is resolved by pressing again.
                    Some(Hold::Waiting) => Surface {
                        disabled: snapshot.is_async,
                        ..Default::default()
                    },
                    Some(Hold::Interrupted) => Surface {
                        disabled: true,
                        ..Default::default()
                    },
                    Some(Hold::Acknowledge(explanation)) => Surface {
                        disabled: false,
                        explanation: Some(explanation.clone()),
                        retry_available: false,
                    },
                    Some(Hold::Retryable(_)) => Surface {
                        disabled: true,
                        explanation: None,
                        retry_available: true,
                    },
                    None => Surface::default(),
                }
            }
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn explanation(&self) -> Option<&Explanation> {
        self.explanation.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::GateId;
    use turnstile_flow::GateStatus;

    fn snapshot(is_async: bool, hold: Option<Hold>) -> GateSnapshot {
        GateSnapshot {
            id: GateId::new("g"),
            is_async,
            status: GateStatus::Unresolved,
            hold,
            entered: true,
            explanation: None,
        }
    }

    #[test]
    fn async_wait_disables_without_explanation() {
        let surface = Surface::derive(
            ActivationState::PendingAtGate(0),
            &[snapshot(true, Some(Hold::Waiting))],
        );
        assert!(surface.is_disabled());
        assert!(surface.explanation().is_none());
    }

    #[test]
    fn sync_wait_stays_enabled() {
        let surface = Surface::derive(
            ActivationState::PendingAtGate(0),
            &[snapshot(false, Some(Hold::Waiting))],
        );
        assert!(!surface.is_disabled());
    }

    #[test]
    fn retryable_disables_and_offers_retry() {
        let surface = Surface::derive(
            ActivationState::PendingAtGate(0),
            &[snapshot(true, Some(Hold::Retryable("timeout".into())))],
        );
        assert!(surface.is_disabled());
        assert!(surface.retry_available);
        assert!(surface.explanation().is_none());
    }

    #[test]
    fn blocked_carries_explanation() {
        let mut blocked = snapshot(true, None);
        blocked.status = GateStatus::Blocking;
        blocked.explanation = Some(Explanation::unavailable("Unavailable", "Not in your region"));

        let surface = Surface::derive(ActivationState::Blocked(0), &[blocked]);
        assert!(surface.is_disabled());
        assert_eq!(surface.explanation().map(|e| e.title.as_str()), Some("Unavailable"));
    }

    #[test]
    fn inactive_is_clear() {
        assert_eq!(Surface::derive(ActivationState::Inactive, &[]), Surface::default());
    }
}
