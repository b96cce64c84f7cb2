//! Step - Activation State Transition Contract
//!
//! Every change of `ActivationState` goes through [`ActivationState::step`].
//! Illegal moves are rejected instead of silently applied, so a controller
//! bug surfaces as an error rather than a resurrected or regressed flow.

use crate::state::ActivationState;
use std::fmt;

/// An input to the activation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// A trigger opened a new activation.
    Begin,
    /// Evaluation suspended at the gate with this index.
    Pending(usize),
    /// Evaluation hit a definitive failure at this index.
    Block(usize),
    /// Every gate is satisfied.
    Complete,
    /// The terminal action fired.
    Fire,
    /// The activation was abandoned or forcibly reset.
    Reset,
}

/// An illegal state machine move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepError {
    /// The step is not defined from this state.
    Illegal { from: ActivationState, step: Step },
    /// Evaluation tried to move back to an earlier gate.
    Regressed { from: usize, to: usize },
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepError::Illegal { from, step } => {
                write!(f, "step {step:?} is not allowed while {from}")
            }
            StepError::Regressed { from, to } => {
                write!(f, "activation cannot regress from gate {from} to gate {to}")
            }
        }
    }
}

impl std::error::Error for StepError {}

impl ActivationState {
    /// Apply `step`, returning the next state.
    pub fn step(self, step: Step) -> Result<ActivationState, StepError> {
        use ActivationState::*;

        match (self, step) {
            (_, Step::Reset) => Ok(Inactive),
            (Inactive, Step::Begin) => Ok(PendingAtGate(0)),
            (PendingAtGate(i), Step::Pending(j)) | (PendingAtGate(i), Step::Block(j)) if j < i => {
                Err(StepError::Regressed { from: i, to: j })
            }
            (PendingAtGate(_), Step::Pending(j)) => Ok(PendingAtGate(j)),
            (PendingAtGate(_), Step::Block(j)) => Ok(Blocked(j)),
            (PendingAtGate(_), Step::Complete) => Ok(Completed),
            (Completed, Step::Fire) => Ok(Inactive),
            (from, step) => Err(StepError::Illegal { from, step }),
        }
    }
}
