//! Gate - an independently owned precondition of a guarded flow.

use crate::activation::ActivationId;
use crate::bus::Bus;
use crate::condition::Condition;
use crate::effect::Effect;
use crate::verdict::{Explanation, GateVerdict};
use serde::{Deserialize, Serialize};
use std::fmt;
use turnstile_flow::GateStatus;

/// Stable identifier of a gate within its chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GateId(String);

impl GateId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GateId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// The contract for a gate.
///
/// A gate is a pure function of host state (`check`) plus an optional
/// entry effect (`on_enter`) fired the first time an activation suspends
/// on it. Checks must be cheap and side-effect free: they are re-run on
/// every resume.
///
/// # Example
/// ```rust,ignore
/// struct Connected;
///
/// impl Gate for Connected {
///     fn id(&self) -> GateId { GateId::new("connected") }
///     fn watches(&self, c: &Condition) -> bool { *c == Condition::AccountConnected }
///     fn check(&self, bus: &Bus) -> GateVerdict {
///         if bus.get::<WalletState>().is_some_and(WalletState::is_connected) {
///             GateVerdict::Satisfied
///         } else {
///             GateVerdict::Interrupted
///         }
///     }
/// }
/// ```
pub trait Gate: Send + Sync + 'static {
    fn id(&self) -> GateId;

    /// Whether resolving this gate waits on an external event rather than
    /// a synchronous check.
    fn is_async(&self) -> bool {
        false
    }

    /// Whether a change of `condition` can alter this gate's verdict.
    fn watches(&self, condition: &Condition) -> bool;

    /// Check the gate against current host state.
    fn check(&self, bus: &Bus) -> GateVerdict;

    /// Side effect to perform when an activation first suspends here.
    fn on_enter(&self, _activation: ActivationId, _bus: &Bus) -> Option<Effect> {
        None
    }

    /// Whether `condition` means the user walked away from this gate's
    /// interruption (e.g. closed the panel it opened).
    fn abandoned_by(&self, _condition: &Condition) -> bool {
        false
    }

    /// Human-readable label for schematics and logs.
    fn label(&self) -> String {
        self.id().to_string()
    }
}

/// Why an unresolved gate is holding the flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hold {
    /// Waiting on an external event.
    Waiting,
    /// An interruption owned by the gate is on screen.
    Interrupted,
    /// Waiting for the user to acknowledge the explanation.
    Acknowledge(Explanation),
    /// The last check failed transiently; a retry is available.
    Retryable(String),
}

/// The last observed state of one gate within the current activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateSnapshot {
    pub id: GateId,
    pub is_async: bool,
    pub status: GateStatus,
    /// Set while the gate is unresolved and holding the flow.
    pub hold: Option<Hold>,
    /// The entry effect already fired in this activation.
    pub entered: bool,
    /// Reason recorded when the gate turned blocking.
    pub explanation: Option<Explanation>,
}

impl GateSnapshot {
    pub fn new(gate: &dyn Gate) -> Self {
        Self {
            id: gate.id(),
            is_async: gate.is_async(),
            status: GateStatus::Unresolved,
            hold: None,
            entered: false,
            explanation: None,
        }
    }
}
