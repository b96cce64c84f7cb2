use crate::gate::GateId;
use crate::verdict::Explanation;
use thiserror::Error;

/// Gate-level failures, as the controller reports them.
///
/// These are never returned from `trigger`; they are translated into
/// activation state and read back through `FlowController::failure` or
/// [`Progress::failure`](crate::controller::Progress::failure).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    #[error("gate `{gate}` failed transiently: {reason}")]
    TransientGateFailure { gate: GateId, reason: String },

    #[error("gate `{gate}` blocks this flow: {}", .explanation.title)]
    BlockingGateFailure {
        gate: GateId,
        explanation: Explanation,
    },

    #[error("challenge at gate `{gate}` failed: {reason}")]
    ChallengeFailed { gate: GateId, reason: String },
}

impl FlowError {
    /// Whether the user can recover without a reset.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FlowError::TransientGateFailure { .. })
    }
}
