use std::sync::Arc;
use turnstile_core::bus::Bus;
use turnstile_core::condition::Condition;
use turnstile_core::gate::{Gate, GateId};
use turnstile_core::verdict::{Explanation, GateVerdict};

/// A synchronous gate defined by a closure over host state.
///
/// A false predicate waits by default; with [`PredicateGate::blocking`] it
/// blocks the activation instead.
pub struct PredicateGate<F> {
    id: String,
    watches: Vec<Condition>,
    predicate: Arc<F>,
    blocking: Option<Explanation>,
}

impl<F> PredicateGate<F>
where
    F: Fn(&Bus) -> bool + Send + Sync + 'static,
{
    pub fn new(id: impl Into<String>, predicate: F) -> Self {
        Self {
            id: id.into(),
            watches: Vec::new(),
            predicate: Arc::new(predicate),
            blocking: None,
        }
    }

    /// Re-evaluate when `condition` changes.
    pub fn watching(mut self, condition: Condition) -> Self {
        self.watches.push(condition);
        self
    }

    /// Block with `explanation` when the predicate is false.
    pub fn blocking(mut self, explanation: Explanation) -> Self {
        self.blocking = Some(explanation);
        self
    }
}

impl<F> Clone for PredicateGate<F> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            watches: self.watches.clone(),
            predicate: self.predicate.clone(),
            blocking: self.blocking.clone(),
        }
    }
}

impl<F> std::fmt::Debug for PredicateGate<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredicateGate")
            .field("id", &self.id)
            .field("watches", &self.watches)
            .finish()
    }
}

impl<F> Gate for PredicateGate<F>
where
    F: Fn(&Bus) -> bool + Send + Sync + 'static,
{
    fn id(&self) -> GateId {
        GateId::new(&self.id)
    }

    fn watches(&self, condition: &Condition) -> bool {
        self.watches.contains(condition)
    }

    fn check(&self, bus: &Bus) -> GateVerdict {
        if (self.predicate)(bus) {
            return GateVerdict::Satisfied;
        }
        match &self.blocking {
            Some(explanation) => GateVerdict::Blocking(explanation.clone()),
            None => GateVerdict::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Default)]
    struct Terms(bool);

    #[test]
    fn false_predicate_waits_or_blocks() {
        let waiting = PredicateGate::new("terms", |bus: &Bus| bus.get_or_default::<Terms>().0)
            .watching(Condition::custom("terms_accepted"));
        assert_eq!(waiting.check(&Bus::new()), GateVerdict::Pending);
        assert!(waiting.watches(&Condition::custom("terms_accepted")));
        assert!(!waiting.watches(&Condition::AccountConnected));

        let blocking = waiting
            .clone()
            .blocking(Explanation::unavailable("Terms required", ""));
        assert!(matches!(blocking.check(&Bus::new()), GateVerdict::Blocking(_)));
        assert_eq!(
            blocking.check(&Bus::new().with(Terms(true))),
            GateVerdict::Satisfied
        );
    }
}
