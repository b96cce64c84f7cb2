//! Turnstile core: gate chains, activations and the flow controller.
//!
//! A guarded flow is an ordered [`GateChain`] in front of a terminal action.
//! The [`FlowController`] walks the chain on every trigger or host
//! notification, suspends on the first unresolved gate and fires the
//! terminal action once every gate is satisfied.

pub mod activation;
pub mod bus;
pub mod chain;
pub mod condition;
pub mod controller;
pub mod effect;
pub mod error;
pub mod gate;
pub mod host;
pub mod schematic;
pub mod surface;
pub mod terminal;
pub mod timeline;
pub mod verdict;

pub use activation::{Activation, ActivationId};
pub use bus::Bus;
pub use chain::{EvalResult, Evaluation, GateChain, evaluate};
pub use condition::Condition;
pub use controller::{FlowController, Progress, TerminalAction};
pub use effect::{
    Completion, CompletionEvent, CompletionSink, Discard, Effect, EffectQueue, EffectSink,
};
pub use error::FlowError;
pub use gate::{Gate, GateId, GateSnapshot, Hold};
pub use schematic::{Edge, Node, NodeKind, Schematic};
pub use surface::Surface;
pub use terminal::{CompletionToken, TerminalLedger};
pub use timeline::{Timeline, TimelineEvent};
pub use verdict::{Explanation, ExplanationKind, GateVerdict};

pub use turnstile_flow::{ActivationState, GateStatus};

pub mod prelude {
    pub use crate::activation::ActivationId;
    pub use crate::bus::Bus;
    pub use crate::chain::GateChain;
    pub use crate::condition::Condition;
    pub use crate::controller::{FlowController, Progress};
    pub use crate::effect::{Completion, CompletionEvent, CompletionSink, Effect, EffectSink};
    pub use crate::error::FlowError;
    pub use crate::gate::{Gate, GateId};
    pub use crate::host::{
        ChallengeOutcome, ChallengeState, EligibilityState, Lookup, WalletState, Warning,
        WarningSet, WarningSeverity,
    };
    pub use crate::surface::Surface;
    pub use crate::terminal::CompletionToken;
    pub use crate::verdict::{Explanation, GateVerdict};
    pub use turnstile_flow::ActivationState;
}
