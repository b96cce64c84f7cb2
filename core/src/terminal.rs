//! Terminal action bookkeeping.
//!
//! [`TerminalLedger`] makes the terminal action fire at most once per
//! activation lifetime. [`CompletionToken`] is the receipt a controller
//! hands out when that happens; later stages take the token instead of a
//! bare [`ActivationId`] so they only ever act on a flow that really
//! completed.

use crate::activation::ActivationId;
use std::collections::VecDeque;
use std::fmt;

const DEFAULT_CAPACITY: usize = 64;

/// Idempotence record for terminal actions, keyed by activation lifetime.
///
/// A lifetime may claim its terminal action once; every later claim for
/// the same id is refused. Only the most recent `capacity` ids are kept,
/// which is plenty since a controller opens one lifetime at a time.
#[derive(Debug, Clone)]
pub struct TerminalLedger {
    fired: VecDeque<ActivationId>,
    capacity: usize,
}

impl TerminalLedger {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fired: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Record `activation` as fired. Returns `false` if it already was.
    pub fn claim(&mut self, activation: ActivationId) -> bool {
        if self.contains(activation) {
            return false;
        }
        if self.fired.len() == self.capacity {
            self.fired.pop_front();
        }
        self.fired.push_back(activation);
        true
    }

    pub fn contains(&self, activation: ActivationId) -> bool {
        self.fired.contains(&activation)
    }
}

impl Default for TerminalLedger {
    fn default() -> Self {
        Self::new()
    }
}

/// Proof that a flow's terminal action fired for one activation.
///
/// Only a [`FlowController`](crate::controller::FlowController) can mint
/// one, at the moment it claims the terminal action.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompletionToken {
    flow: String,
    activation: ActivationId,
}

impl CompletionToken {
    pub(crate) fn new(flow: impl Into<String>, activation: ActivationId) -> Self {
        Self {
            flow: flow.into(),
            activation,
        }
    }

    pub fn flow(&self) -> &str {
        &self.flow
    }

    pub fn activation(&self) -> ActivationId {
        self.activation
    }
}

impl fmt::Display for CompletionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.flow, self.activation)
    }
}
