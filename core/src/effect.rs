//! Outbound boundary: gate side effects and completion events.
//!
//! Effects are data. The controller decides *that* a side effect is due
//! and hands an [`Effect`] to an [`EffectSink`]; the host decides *how*
//! to open a panel or start a request.

use crate::activation::ActivationId;
use crate::gate::GateId;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// A fire-and-forget call into a collaborator subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum Effect {
    /// Start the regional availability lookup.
    RequestEligibility { activation: ActivationId },
    /// Open the wallet connection panel.
    OpenConnectionPanel {
        activation: ActivationId,
        /// Show the fiat on-ramp promotion inside the panel.
        promote_onramp: bool,
    },
    /// Present the authentication challenge.
    OpenChallenge {
        activation: ActivationId,
        gate: GateId,
    },
    /// Present a warning that needs acknowledgement.
    ShowWarning {
        activation: ActivationId,
        gate: GateId,
    },
    /// Open the flow's terminal modal (e.g. the on-ramp purchase sheet).
    OpenTerminalModal { activation: ActivationId },
    /// Stop whatever the gate's entry effect started.
    CancelPending {
        activation: ActivationId,
        gate: GateId,
    },
    /// Route the user back to the editable stage of the flow.
    ReturnToEdit {
        activation: ActivationId,
        gate: GateId,
    },
    /// Host-defined side effect for custom gates or terminals.
    Custom {
        activation: ActivationId,
        name: String,
    },
}

impl Effect {
    /// The activation lifetime that produced this effect.
    pub fn activation(&self) -> ActivationId {
        match self {
            Effect::RequestEligibility { activation }
            | Effect::OpenConnectionPanel { activation, .. }
            | Effect::OpenChallenge { activation, .. }
            | Effect::ShowWarning { activation, .. }
            | Effect::OpenTerminalModal { activation }
            | Effect::CancelPending { activation, .. }
            | Effect::ReturnToEdit { activation, .. }
            | Effect::Custom { activation, .. } => *activation,
        }
    }

    /// Short name of the effect ("request_eligibility", ...), matching its
    /// serialized tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Effect::RequestEligibility { .. } => "request_eligibility",
            Effect::OpenConnectionPanel { .. } => "open_connection_panel",
            Effect::OpenChallenge { .. } => "open_challenge",
            Effect::ShowWarning { .. } => "show_warning",
            Effect::OpenTerminalModal { .. } => "open_terminal_modal",
            Effect::CancelPending { .. } => "cancel_pending",
            Effect::ReturnToEdit { .. } => "return_to_edit",
            Effect::Custom { .. } => "custom",
        }
    }
}

/// Receives side effects from the controller.
pub trait EffectSink: Send + Sync {
    fn dispatch(&self, effect: Effect);
}

/// What a completed activation produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Completion {
    /// The flow's terminal effect fired.
    TerminalFired,
    /// A transfer was submitted through the review stage.
    TransferSubmitted { variant: String },
}

/// Emitted exactly once per successful activation lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionEvent {
    pub flow: String,
    pub activation: ActivationId,
    pub completion: Completion,
    pub completed_at: DateTime<Utc>,
}

impl CompletionEvent {
    pub fn new(flow: impl Into<String>, activation: ActivationId, completion: Completion) -> Self {
        Self {
            flow: flow.into(),
            activation,
            completion,
            completed_at: Utc::now(),
        }
    }
}

/// Receives completion events (notifications, telemetry).
pub trait CompletionSink: Send + Sync {
    fn completed(&self, event: CompletionEvent);
}

/// A sink that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct Discard;

impl EffectSink for Discard {
    fn dispatch(&self, effect: Effect) {
        tracing::trace!(?effect, "Effect discarded");
    }
}

impl CompletionSink for Discard {
    fn completed(&self, event: CompletionEvent) {
        tracing::trace!(?event, "Completion discarded");
    }
}

/// Buffers effects until the owner drains them.
///
/// Used by drivers that must act on some effects themselves (starting a
/// lookup) before forwarding the rest to the host.
#[derive(Debug, Default)]
pub struct EffectQueue {
    pending: Mutex<Vec<Effect>>,
}

impl EffectQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every queued effect in dispatch order.
    pub fn drain(&self) -> Vec<Effect> {
        std::mem::take(&mut *self.pending.lock())
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

impl EffectSink for EffectQueue {
    fn dispatch(&self, effect: Effect) {
        self.pending.lock().push(effect);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_drains_in_order() {
        let queue = EffectQueue::new();
        let activation = ActivationId::new();
        queue.dispatch(Effect::RequestEligibility { activation });
        queue.dispatch(Effect::OpenTerminalModal { activation });

        let drained = queue.drain();
        assert_eq!(drained.len(), 2);
        assert!(matches!(drained[0], Effect::RequestEligibility { .. }));
        assert!(queue.is_empty());
    }
}
