//! # FlowController: Guarded Action Flow
//!
//! The `FlowController` owns the single activation of one logical flow and
//! drives it through its [`GateChain`].
//!
//! ## Operations
//!
//! * `trigger` - start an activation, or re-run evaluation of the open one
//! * `observe_external_change` - resume only when a watched condition changed
//! * `refresh` - re-evaluate after the host changed state on its own
//! * `retry` - re-arm a gate that failed transiently
//! * `reset` - abandon the activation; the next trigger starts clean
//!
//! Gate failures never escape these calls. They become activation state and
//! are read back through [`FlowController::surface`] and
//! [`FlowController::failure`].

use crate::activation::{Activation, ActivationId};
use crate::bus::Bus;
use crate::chain::{EvalResult, GateChain, evaluate};
use crate::condition::Condition;
use crate::effect::{Completion, CompletionEvent, CompletionSink, Effect, EffectSink};
use crate::error::FlowError;
use crate::gate::{GateId, Hold};
use crate::surface::Surface;
use crate::terminal::{CompletionToken, TerminalLedger};
use crate::timeline::{Timeline, TimelineEvent};
use crate::verdict::Explanation;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use turnstile_flow::{ActivationState, Step};

/// Produces the terminal side effect for a completed activation.
pub type TerminalAction = Arc<dyn Fn(ActivationId) -> Option<Effect> + Send + Sync>;

/// What a controller call left the flow doing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "progress", rename_all = "snake_case")]
pub enum Progress {
    /// No activation is open (or the call was ignored while inactive).
    Idle,
    /// Suspended on a gate.
    Pending { index: usize, gate: GateId },
    /// Stopped on a definitive failure until reset.
    Blocked {
        index: usize,
        gate: GateId,
        explanation: Explanation,
    },
    /// The terminal action fired; the flow is inactive again.
    Completed { activation: ActivationId },
    /// A challenge was refused; the user went back to an editable stage.
    Rewound {
        activation: ActivationId,
        gate: GateId,
        reason: String,
    },
    /// The user walked away from a gate's interruption.
    Abandoned {
        activation: ActivationId,
        gate: GateId,
    },
}

impl Progress {
    pub fn is_completed(&self) -> bool {
        matches!(self, Progress::Completed { .. })
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Progress::Pending { .. })
    }

    /// The failure this progress reports, if any.
    pub fn failure(&self) -> Option<FlowError> {
        match self {
            Progress::Blocked {
                gate, explanation, ..
            } => Some(FlowError::BlockingGateFailure {
                gate: gate.clone(),
                explanation: explanation.clone(),
            }),
            Progress::Rewound { gate, reason, .. } => Some(FlowError::ChallengeFailed {
                gate: gate.clone(),
                reason: reason.clone(),
            }),
            _ => None,
        }
    }
}

/// Finite-state controller for one guarded flow instance.
pub struct FlowController {
    chain: GateChain,
    activation: Activation,
    terminal: TerminalAction,
    effects: Arc<dyn EffectSink>,
    completion: Option<Arc<dyn CompletionSink>>,
    ledger: TerminalLedger,
    last_completion: Option<CompletionToken>,
    timeline: Timeline,
}

impl FlowController {
    /// Create a controller whose terminal action opens the terminal modal.
    pub fn new(chain: GateChain, effects: Arc<dyn EffectSink>) -> Self {
        Self {
            chain,
            activation: Activation::idle(),
            terminal: Arc::new(|activation| Some(Effect::OpenTerminalModal { activation })),
            effects,
            completion: None,
            ledger: TerminalLedger::new(),
            last_completion: None,
            timeline: Timeline::new(),
        }
    }

    /// Replace the terminal side effect.
    pub fn with_terminal<F>(mut self, terminal: F) -> Self
    where
        F: Fn(ActivationId) -> Option<Effect> + Send + Sync + 'static,
    {
        self.terminal = Arc::new(terminal);
        self
    }

    /// Keep at most `capacity` timeline events.
    pub fn with_timeline_capacity(mut self, capacity: usize) -> Self {
        self.timeline = Timeline::with_capacity(capacity);
        self
    }

    /// Emit a completion event when the terminal action fires.
    ///
    /// Leave unset when a later stage (e.g. review & submit) owns completion.
    pub fn with_completion(mut self, sink: Arc<dyn CompletionSink>) -> Self {
        self.completion = Some(sink);
        self
    }

    pub fn name(&self) -> &str {
        self.chain.name()
    }

    pub fn chain(&self) -> &GateChain {
        &self.chain
    }

    pub fn state(&self) -> ActivationState {
        self.activation.state()
    }

    pub fn activation(&self) -> &Activation {
        &self.activation
    }

    /// Id of the open activation, if any.
    pub fn activation_id(&self) -> Option<ActivationId> {
        (!self.activation.state().is_inactive()).then(|| self.activation.id())
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Receipt for the most recent activation whose terminal action fired.
    ///
    /// Stays set across later activations until another one completes.
    pub fn last_completion(&self) -> Option<&CompletionToken> {
        self.last_completion.as_ref()
    }

    /// Disable/Explain view for the rendering layer.
    pub fn surface(&self) -> Surface {
        Surface::derive(self.activation.state(), self.activation.snapshots())
    }

    pub fn is_disabled(&self) -> bool {
        self.surface().disabled
    }

    pub fn explanation(&self) -> Option<Explanation> {
        self.surface().explanation
    }

    /// The failure the open activation is currently parked on.
    pub fn failure(&self) -> Option<FlowError> {
        let index = self.activation.state().gate_index()?;
        let snapshot = self.activation.snapshot(index)?;
        match (self.activation.state(), &snapshot.hold) {
            (ActivationState::Blocked(_), _) => Some(FlowError::BlockingGateFailure {
                gate: snapshot.id.clone(),
                explanation: snapshot.explanation.clone()?,
            }),
            (ActivationState::PendingAtGate(_), Some(Hold::Retryable(reason))) => {
                Some(FlowError::TransientGateFailure {
                    gate: snapshot.id.clone(),
                    reason: reason.clone(),
                })
            }
            _ => None,
        }
    }

    /// Where the flow currently stands, without evaluating anything.
    pub fn progress(&self) -> Progress {
        let state = self.activation.state();
        let Some(index) = state.gate_index() else {
            return Progress::Idle;
        };
        let Some(snapshot) = self.activation.snapshot(index) else {
            return Progress::Idle;
        };
        match state {
            ActivationState::Blocked(_) => Progress::Blocked {
                index,
                gate: snapshot.id.clone(),
                explanation: snapshot
                    .explanation
                    .clone()
                    .unwrap_or_else(|| Explanation::unavailable(snapshot.id.as_str(), "")),
            },
            _ => Progress::Pending {
                index,
                gate: snapshot.id.clone(),
            },
        }
    }

    /// Start a new activation, or re-run evaluation of the open one.
    ///
    /// Re-triggering while suspended re-checks from gate 0; satisfied gates
    /// are cached and entry effects do not fire twice. A blocked activation
    /// ignores triggers until reset.
    pub fn trigger(&mut self, bus: &Bus) -> Progress {
        match self.activation.state() {
            ActivationState::Inactive => {
                match Activation::begin(&self.chain) {
                    Ok(activation) => self.activation = activation,
                    Err(error) => {
                        tracing::error!(%error, "Could not open activation");
                        return Progress::Idle;
                    }
                }
                let activation = self.activation.id();
                tracing::info!(flow = %self.chain.name(), %activation, "Activation started");
                self.record(TimelineEvent::Activated {
                    activation,
                    timestamp: Utc::now(),
                });
                self.run(bus)
            }
            ActivationState::PendingAtGate(_) => self.run(bus),
            ActivationState::Blocked(_) | ActivationState::Completed => {
                tracing::debug!(flow = %self.chain.name(), state = %self.activation.state(), "Trigger ignored");
                self.progress()
            }
        }
    }

    /// React to a host-reported change.
    ///
    /// Evaluation re-runs only when the condition matters to the pending gate
    /// or a gate after it. If the pending gate treats the condition as
    /// abandonment and the flow is still parked on it afterwards, the gate's
    /// entry effect is cancelled and the activation resets.
    pub fn observe_external_change(&mut self, condition: &Condition, bus: &Bus) -> Progress {
        let Some(index) = self.activation.state().pending_index() else {
            tracing::debug!(%condition, state = %self.activation.state(), "Notification ignored");
            return self.progress();
        };

        let relevant = self
            .chain
            .gates()
            .zip(self.activation.snapshots())
            .skip(index)
            .any(|(gate, snapshot)| !snapshot.status.is_satisfied() && gate.watches(condition));
        let abandons = self
            .chain
            .get(index)
            .is_some_and(|gate| gate.abandoned_by(condition));

        if !relevant && !abandons {
            tracing::debug!(%condition, index, "Notification not relevant to pending gates");
            return self.progress();
        }

        let progress = self.run(bus);
        if abandons && self.activation.state() == ActivationState::PendingAtGate(index) {
            return self.abandon(index, condition);
        }
        progress
    }

    /// Re-evaluate a suspended activation after the host changed state itself.
    ///
    /// Never starts a new activation.
    pub fn refresh(&mut self, bus: &Bus) -> Progress {
        if self.activation.state().is_pending() {
            self.run(bus)
        } else {
            self.progress()
        }
    }

    /// Re-arm the pending gate after a transient failure and re-evaluate.
    ///
    /// The gate's entry effect fires again, re-issuing its request.
    pub fn retry(&mut self, bus: &Bus) -> Progress {
        let Some(index) = self.activation.state().pending_index() else {
            return self.progress();
        };
        let Some(snapshot) = self.activation.snapshots_mut().get_mut(index) else {
            return self.progress();
        };
        if !matches!(snapshot.hold, Some(Hold::Retryable(_))) {
            tracing::debug!(gate = %snapshot.id, "Retry ignored; gate is not retryable");
            return self.progress();
        }
        tracing::info!(gate = %snapshot.id, "Retrying gate");
        snapshot.entered = false;
        snapshot.hold = None;
        self.run(bus)
    }

    /// Abandon the open activation. The next trigger starts from gate 0.
    pub fn reset(&mut self) {
        let state = self.activation.state();
        if state.is_inactive() {
            return;
        }
        let activation = self.activation.id();

        let entered_gate = state
            .pending_index()
            .and_then(|index| self.activation.snapshot(index))
            .filter(|snapshot| snapshot.entered)
            .map(|snapshot| snapshot.id.clone());
        if let Some(gate) = entered_gate {
            self.effects
                .dispatch(Effect::CancelPending { activation, gate });
        }

        tracing::info!(flow = %self.chain.name(), %activation, %state, "Activation reset");
        self.record(TimelineEvent::Reset {
            activation,
            timestamp: Utc::now(),
        });
        self.activation.clear();
    }

    fn run(&mut self, bus: &Bus) -> Progress {
        let activation = self.activation.id();
        let span = tracing::info_span!(
            "Flow",
            turnstile.flow = %self.chain.name(),
            turnstile.activation = %activation
        );
        let _span = span.enter();

        let holds_before: Vec<Option<Hold>> = self
            .activation
            .snapshots()
            .iter()
            .map(|snapshot| snapshot.hold.clone())
            .collect();
        let eval = evaluate(&self.chain, &mut self.activation, bus);

        let now = Utc::now();
        for gate in eval.satisfied {
            self.record(TimelineEvent::GateSatisfied {
                activation,
                gate,
                timestamp: now,
            });
        }
        if let Some(gate) = eval.entered {
            self.record(TimelineEvent::GateEntered {
                activation,
                gate,
                timestamp: now,
            });
        }
        for effect in eval.effects {
            tracing::debug!(?effect, "Dispatching entry effect");
            self.effects.dispatch(effect);
        }

        match eval.result {
            EvalResult::AllSatisfied => self.complete(),
            EvalResult::PendingAt { index, gate } => {
                if !self.step(Step::Pending(index)) {
                    return Progress::Idle;
                }
                let hold = self
                    .activation
                    .snapshot(index)
                    .and_then(|snapshot| snapshot.hold.clone());
                if let Some(Hold::Retryable(reason)) = hold {
                    let previous = holds_before.get(index).cloned().flatten();
                    if previous != Some(Hold::Retryable(reason.clone())) {
                        tracing::warn!(%gate, %reason, "Gate check failed transiently");
                        self.record(TimelineEvent::Held {
                            activation,
                            gate: gate.clone(),
                            reason,
                            timestamp: now,
                        });
                    }
                }
                Progress::Pending { index, gate }
            }
            EvalResult::BlockedAt {
                index,
                gate,
                explanation,
            } => {
                if !self.step(Step::Block(index)) {
                    return Progress::Idle;
                }
                tracing::info!(%gate, title = %explanation.title, "Flow blocked");
                self.record(TimelineEvent::Blocked {
                    activation,
                    gate: gate.clone(),
                    timestamp: now,
                });
                Progress::Blocked {
                    index,
                    gate,
                    explanation,
                }
            }
            EvalResult::RewindAt { gate, reason, .. } => {
                tracing::info!(%gate, %reason, "Flow returned to editable stage");
                self.effects.dispatch(Effect::ReturnToEdit {
                    activation,
                    gate: gate.clone(),
                });
                self.record(TimelineEvent::Rewound {
                    activation,
                    gate: gate.clone(),
                    reason: reason.clone(),
                    timestamp: now,
                });
                self.activation.clear();
                Progress::Rewound {
                    activation,
                    gate,
                    reason,
                }
            }
        }
    }

    fn complete(&mut self) -> Progress {
        let activation = self.activation.id();
        if !self.step(Step::Complete) {
            return Progress::Idle;
        }

        if self.ledger.claim(activation) {
            if let Some(effect) = (self.terminal)(activation) {
                self.effects.dispatch(effect);
            }
            if let Some(sink) = &self.completion {
                sink.completed(CompletionEvent::new(
                    self.chain.name(),
                    activation,
                    Completion::TerminalFired,
                ));
            }
            self.last_completion = Some(CompletionToken::new(self.chain.name(), activation));
            tracing::info!(flow = %self.chain.name(), %activation, "Terminal action fired");
            self.record(TimelineEvent::Completed {
                activation,
                timestamp: Utc::now(),
            });
        } else {
            tracing::warn!(%activation, "Terminal action already fired for this activation");
        }

        self.step(Step::Fire);
        self.activation.clear();
        Progress::Completed { activation }
    }

    fn abandon(&mut self, index: usize, condition: &Condition) -> Progress {
        let activation = self.activation.id();
        let Some(gate) = self.activation.snapshot(index).map(|s| s.id.clone()) else {
            self.activation.clear();
            return Progress::Idle;
        };

        tracing::info!(%gate, %condition, "Interruption abandoned");
        self.effects.dispatch(Effect::CancelPending {
            activation,
            gate: gate.clone(),
        });
        self.record(TimelineEvent::Abandoned {
            activation,
            gate: gate.clone(),
            condition: condition.clone(),
            timestamp: Utc::now(),
        });
        self.activation.clear();
        Progress::Abandoned { activation, gate }
    }

    fn step(&mut self, step: Step) -> bool {
        match self.activation.apply(step) {
            Ok(_) => true,
            Err(error) => {
                tracing::error!(%error, "Illegal activation step; resetting");
                self.activation.clear();
                false
            }
        }
    }

    fn record(&mut self, event: TimelineEvent) {
        self.timeline.push(event);
    }
}

impl std::fmt::Debug for FlowController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowController")
            .field("flow", &self.chain.name())
            .field("state", &self.activation.state())
            .finish()
    }
}
