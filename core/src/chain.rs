//! # GateChain: Ordered Preconditions
//!
//! A `GateChain` is the declared, ordered list of gates one flow must pass
//! before its terminal action. [`evaluate`] walks it left to right against
//! the current activation and host state.
//!
//! ## Evaluation rules
//!
//! * Gates already `Satisfied` in this activation are skipped, never re-checked.
//! * The first gate that is not satisfied stops the pass.
//! * A gate's entry effect fires once per activation, the first time the pass
//!   stops on it.
//! * Re-running with unchanged host state reproduces the same result and
//!   leaves the snapshots untouched.

use crate::activation::Activation;
use crate::bus::Bus;
use crate::effect::Effect;
use crate::gate::{Gate, GateId, GateSnapshot, Hold};
use crate::schematic::{Edge, Node, NodeKind, Schematic};
use crate::verdict::{Explanation, GateVerdict};
use std::sync::Arc;
use turnstile_flow::GateStatus;

/// The ordered precondition sequence of one flow.
#[derive(Clone)]
pub struct GateChain {
    name: String,
    gates: Vec<Arc<dyn Gate>>,
}

impl GateChain {
    /// Start an empty chain with the given flow name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            gates: Vec::new(),
        }
    }

    /// Append a gate. Evaluation order is declaration order.
    pub fn gate<G: Gate>(mut self, gate: G) -> Self {
        self.gates.push(Arc::new(gate));
        self
    }

    /// Append an already shared gate.
    pub fn shared(mut self, gate: Arc<dyn Gate>) -> Self {
        self.gates.push(gate);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.gates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&dyn Gate> {
        self.gates.get(index).map(|g| g.as_ref())
    }

    pub fn gates(&self) -> impl Iterator<Item = &dyn Gate> {
        self.gates.iter().map(|g| g.as_ref())
    }

    /// Extract the structural view of this chain.
    pub fn schematic(&self) -> Schematic {
        let mut schematic = Schematic::new(&self.name);
        schematic.nodes.push(Node::new("trigger", NodeKind::Trigger, "activate"));

        for gate in self.gates() {
            let mut node = Node::new(gate.id().as_str(), NodeKind::Gate, gate.label());
            node.is_async = gate.is_async();
            schematic.nodes.push(node);
        }
        schematic
            .nodes
            .push(Node::new("terminal", NodeKind::Terminal, "terminal action"));

        let ids: Vec<String> = schematic.nodes.iter().map(|n| n.id.clone()).collect();
        for pair in ids.windows(2) {
            schematic.edges.push(Edge::satisfied(&pair[0], &pair[1]));
        }
        schematic
    }
}

impl std::fmt::Debug for GateChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GateChain")
            .field("name", &self.name)
            .field(
                "gates",
                &self.gates().map(|g| g.id()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Where a pass over the chain stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalResult {
    /// Every gate is satisfied.
    AllSatisfied,
    /// Suspended on an unresolved gate.
    PendingAt { index: usize, gate: GateId },
    /// A gate failed definitively.
    BlockedAt {
        index: usize,
        gate: GateId,
        explanation: Explanation,
    },
    /// A gate asked to end the activation and return to an editable stage.
    RewindAt {
        index: usize,
        gate: GateId,
        reason: String,
    },
}

/// The result of one pass plus what it changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub result: EvalResult,
    /// Entry effects that fired during this pass.
    pub effects: Vec<Effect>,
    /// Gates that turned satisfied during this pass.
    pub satisfied: Vec<GateId>,
    /// Gate the pass suspended on for the first time in this activation.
    pub entered: Option<GateId>,
}

/// Evaluate `chain` for `activation` against current host state.
///
/// Snapshots are updated in place; entry effects are returned, not
/// dispatched. The activation's state is left for the caller to step.
pub fn evaluate(chain: &GateChain, activation: &mut Activation, bus: &Bus) -> Evaluation {
    let activation_id = activation.id();
    let mut effects = Vec::new();
    let mut satisfied = Vec::new();
    let mut entered = None;

    for (index, (gate, snapshot)) in chain
        .gates()
        .zip(activation.snapshots_mut().iter_mut())
        .enumerate()
    {
        match snapshot.status {
            GateStatus::Satisfied => continue,
            GateStatus::Blocking => {
                let explanation = snapshot
                    .explanation
                    .clone()
                    .unwrap_or_else(|| Explanation::unavailable(gate.label(), ""));
                return Evaluation {
                    result: EvalResult::BlockedAt {
                        index,
                        gate: snapshot.id.clone(),
                        explanation,
                    },
                    effects,
                    satisfied,
                    entered,
                };
            }
            GateStatus::Unresolved => {}
        }

        let verdict = gate.check(bus);
        tracing::debug!(gate = %snapshot.id, index, ?verdict, "Gate checked");

        let hold = match verdict {
            GateVerdict::Satisfied => {
                resolve(snapshot, GateStatus::Satisfied);
                snapshot.hold = None;
                satisfied.push(snapshot.id.clone());
                continue;
            }
            GateVerdict::Blocking(explanation) => {
                resolve(snapshot, GateStatus::Blocking);
                snapshot.hold = None;
                snapshot.explanation = Some(explanation.clone());
                return Evaluation {
                    result: EvalResult::BlockedAt {
                        index,
                        gate: snapshot.id.clone(),
                        explanation,
                    },
                    effects,
                    satisfied,
                    entered,
                };
            }
            GateVerdict::Rewind { reason } => {
                snapshot.hold = None;
                return Evaluation {
                    result: EvalResult::RewindAt {
                        index,
                        gate: snapshot.id.clone(),
                        reason,
                    },
                    effects,
                    satisfied,
                    entered,
                };
            }
            GateVerdict::Pending => Hold::Waiting,
            GateVerdict::Interrupted => Hold::Interrupted,
            GateVerdict::Acknowledge(explanation) => Hold::Acknowledge(explanation),
            GateVerdict::Transient { reason } => Hold::Retryable(reason),
        };

        snapshot.hold = Some(hold);
        if !snapshot.entered {
            snapshot.entered = true;
            entered = Some(snapshot.id.clone());
            if let Some(effect) = gate.on_enter(activation_id, bus) {
                effects.push(effect);
            }
        }

        return Evaluation {
            result: EvalResult::PendingAt {
                index,
                gate: snapshot.id.clone(),
            },
            effects,
            satisfied,
            entered,
        };
    }

    Evaluation {
        result: EvalResult::AllSatisfied,
        effects,
        satisfied,
        entered,
    }
}

fn resolve(snapshot: &mut GateSnapshot, status: GateStatus) {
    if let Err(regression) = snapshot.status.advance(status) {
        tracing::error!(gate = %snapshot.id, %regression, "Gate status regression refused");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::ActivationId;
    use crate::condition::Condition;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Reads a `u8` from the bus: 0 pending, 1 satisfied, 2 blocking, 3 transient.
    struct Dial {
        id: &'static str,
        entries: Arc<AtomicUsize>,
    }

    #[derive(Clone, Copy)]
    struct DialA(u8);
    #[derive(Clone, Copy)]
    struct DialB(u8);

    impl Dial {
        fn new(id: &'static str) -> (Self, Arc<AtomicUsize>) {
            let entries = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    id,
                    entries: entries.clone(),
                },
                entries,
            )
        }

        fn value(&self, bus: &Bus) -> u8 {
            match self.id {
                "a" => bus.get::<DialA>().map(|d| d.0).unwrap_or(0),
                _ => bus.get::<DialB>().map(|d| d.0).unwrap_or(0),
            }
        }
    }

    impl Gate for Dial {
        fn id(&self) -> GateId {
            GateId::new(self.id)
        }

        fn is_async(&self) -> bool {
            true
        }

        fn watches(&self, _condition: &Condition) -> bool {
            true
        }

        fn check(&self, bus: &Bus) -> GateVerdict {
            match self.value(bus) {
                1 => GateVerdict::Satisfied,
                2 => GateVerdict::Blocking(Explanation::unavailable("no", "blocked")),
                3 => GateVerdict::transient("network"),
                _ => GateVerdict::Pending,
            }
        }

        fn on_enter(&self, activation: ActivationId, _bus: &Bus) -> Option<Effect> {
            self.entries.fetch_add(1, Ordering::SeqCst);
            Some(Effect::Custom {
                activation,
                name: format!("enter-{}", self.id),
            })
        }
    }

    fn chain() -> (GateChain, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let (a, a_entries) = Dial::new("a");
        let (b, b_entries) = Dial::new("b");
        (GateChain::new("test").gate(a).gate(b), a_entries, b_entries)
    }

    #[test]
    fn all_satisfied_in_one_pass_without_entry_effects() {
        let (chain, a_entries, b_entries) = chain();
        let bus = Bus::new().with(DialA(1)).with(DialB(1));
        let mut activation = Activation::begin(&chain).unwrap();

        let eval = evaluate(&chain, &mut activation, &bus);
        assert_eq!(eval.result, EvalResult::AllSatisfied);
        assert!(eval.effects.is_empty());
        assert_eq!(eval.satisfied.len(), 2);
        assert_eq!(a_entries.load(Ordering::SeqCst), 0);
        assert_eq!(b_entries.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn stops_at_first_unresolved_and_enters_once() {
        let (chain, a_entries, b_entries) = chain();
        let bus = Bus::new().with(DialA(1));
        let mut activation = Activation::begin(&chain).unwrap();

        let first = evaluate(&chain, &mut activation, &bus);
        assert_eq!(
            first.result,
            EvalResult::PendingAt {
                index: 1,
                gate: GateId::new("b")
            }
        );
        assert_eq!(first.effects.len(), 1);

        let snapshots = activation.snapshots().to_vec();
        let second = evaluate(&chain, &mut activation, &bus);
        assert_eq!(second.result, first.result);
        assert!(second.effects.is_empty());
        assert!(second.satisfied.is_empty());
        assert_eq!(activation.snapshots(), snapshots.as_slice());
        assert_eq!(a_entries.load(Ordering::SeqCst), 0);
        assert_eq!(b_entries.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn satisfied_gates_are_cached() {
        let (chain, _, _) = chain();
        let mut bus = Bus::new().with(DialA(1));
        let mut activation = Activation::begin(&chain).unwrap();
        evaluate(&chain, &mut activation, &bus);

        // Gate a would now block, but it already passed in this activation.
        bus.insert(DialA(2));
        bus.insert(DialB(1));
        let eval = evaluate(&chain, &mut activation, &bus);
        assert_eq!(eval.result, EvalResult::AllSatisfied);
    }

    #[test]
    fn blocking_is_sticky() {
        let (chain, _, _) = chain();
        let mut bus = Bus::new().with(DialA(2));
        let mut activation = Activation::begin(&chain).unwrap();

        let eval = evaluate(&chain, &mut activation, &bus);
        assert!(matches!(eval.result, EvalResult::BlockedAt { index: 0, .. }));

        bus.insert(DialA(1));
        let eval = evaluate(&chain, &mut activation, &bus);
        assert!(matches!(eval.result, EvalResult::BlockedAt { index: 0, .. }));
        assert_eq!(activation.snapshots()[0].status, GateStatus::Blocking);
    }

    #[test]
    fn transient_failure_holds_as_retryable() {
        let (chain, _, _) = chain();
        let bus = Bus::new().with(DialA(3));
        let mut activation = Activation::begin(&chain).unwrap();

        let eval = evaluate(&chain, &mut activation, &bus);
        assert!(matches!(eval.result, EvalResult::PendingAt { index: 0, .. }));
        assert_eq!(activation.snapshots()[0].status, GateStatus::Unresolved);
        assert_eq!(
            activation.snapshots()[0].hold,
            Some(Hold::Retryable("network".into()))
        );
    }

    #[test]
    fn schematic_lists_gates_between_trigger_and_terminal() {
        let (chain, _, _) = chain();
        let schematic = chain.schematic();
        let ids: Vec<&str> = schematic.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["trigger", "a", "b", "terminal"]);
        assert_eq!(schematic.edges.len(), 3);
    }
}
