use crate::chain::GateChain;
use crate::gate::GateSnapshot;
use serde::{Deserialize, Serialize};
use std::fmt;
use turnstile_flow::{ActivationState, Step, StepError};
use uuid::Uuid;

/// Identifier of one activation lifetime.
///
/// A reset to `Inactive` ends the lifetime; the next trigger gets a new id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivationId(Uuid);

impl ActivationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ActivationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ActivationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One run of a guarded flow, from trigger to completion or abandonment.
#[derive(Debug, Clone)]
pub struct Activation {
    id: ActivationId,
    state: ActivationState,
    snapshots: Vec<GateSnapshot>,
}

impl Activation {
    /// An inactive activation with no snapshots.
    pub fn idle() -> Self {
        Self {
            id: ActivationId::new(),
            state: ActivationState::Inactive,
            snapshots: Vec::new(),
        }
    }

    /// Open a fresh lifetime for `chain`: new id, every gate unresolved.
    pub fn begin(chain: &GateChain) -> Result<Self, StepError> {
        Ok(Self {
            id: ActivationId::new(),
            state: ActivationState::Inactive.step(Step::Begin)?,
            snapshots: chain.gates().map(GateSnapshot::new).collect(),
        })
    }

    pub fn id(&self) -> ActivationId {
        self.id
    }

    pub fn state(&self) -> ActivationState {
        self.state
    }

    pub fn snapshots(&self) -> &[GateSnapshot] {
        &self.snapshots
    }

    pub fn snapshot(&self, index: usize) -> Option<&GateSnapshot> {
        self.snapshots.get(index)
    }

    pub(crate) fn snapshots_mut(&mut self) -> &mut [GateSnapshot] {
        &mut self.snapshots
    }

    /// Apply a state machine step.
    pub(crate) fn apply(&mut self, step: Step) -> Result<ActivationState, StepError> {
        self.state = self.state.step(step)?;
        Ok(self.state)
    }

    /// Force the activation back to `Inactive`, discarding snapshots.
    pub(crate) fn clear(&mut self) {
        self.state = ActivationState::Inactive;
        self.snapshots.clear();
    }
}

impl Default for Activation {
    fn default() -> Self {
        Self::idle()
    }
}
