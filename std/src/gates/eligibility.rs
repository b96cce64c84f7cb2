use serde::{Deserialize, Serialize};
use turnstile_core::activation::ActivationId;
use turnstile_core::bus::Bus;
use turnstile_core::condition::Condition;
use turnstile_core::effect::Effect;
use turnstile_core::gate::{Gate, GateId};
use turnstile_core::host::{EligibilityState, Lookup};
use turnstile_core::verdict::{Explanation, GateVerdict};

/// Support article explaining why the on-ramp provider is unavailable.
pub const REGION_AVAILABILITY_ARTICLE: &str =
    "https://support.uniswap.org/hc/en-us/articles/11306664890381-Why-isn-t-MoonPay-available-in-my-region-";

/// Regional availability check backed by an asynchronous lookup.
///
/// Reads [`EligibilityState`] from the bus. Entering the gate asks the host
/// to start the lookup unless one is already in flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EligibilityGate {
    pub id: String,
    pub explanation: Explanation,
}

impl EligibilityGate {
    pub fn new() -> Self {
        Self {
            id: "eligibility".to_string(),
            explanation: Explanation::unavailable(
                "Not available in your region",
                "Buying crypto with a card is not supported in your region yet.",
            )
            .with_learn_more(REGION_AVAILABILITY_ARTICLE),
        }
    }

    pub fn with_explanation(mut self, explanation: Explanation) -> Self {
        self.explanation = explanation;
        self
    }

    fn lookup<'a>(&self, bus: &'a Bus) -> Option<&'a Lookup<bool>> {
        bus.get::<EligibilityState>().map(|state| &state.available)
    }
}

impl Default for EligibilityGate {
    fn default() -> Self {
        Self::new()
    }
}

impl Gate for EligibilityGate {
    fn id(&self) -> GateId {
        GateId::new(&self.id)
    }

    fn is_async(&self) -> bool {
        true
    }

    fn watches(&self, condition: &Condition) -> bool {
        *condition == Condition::EligibilityResolved
    }

    fn check(&self, bus: &Bus) -> GateVerdict {
        match self.lookup(bus) {
            None | Some(Lookup::Idle) | Some(Lookup::InFlight) => GateVerdict::Pending,
            Some(Lookup::Ready(true)) => GateVerdict::Satisfied,
            Some(Lookup::Ready(false)) => GateVerdict::Blocking(self.explanation.clone()),
            Some(Lookup::Failed(reason)) => GateVerdict::transient(reason.clone()),
        }
    }

    fn on_enter(&self, activation: ActivationId, bus: &Bus) -> Option<Effect> {
        if self.lookup(bus).is_some_and(Lookup::is_in_flight) {
            tracing::debug!(gate = %self.id, "Eligibility lookup already in flight");
            return None;
        }
        Some(Effect::RequestEligibility { activation })
    }

    fn label(&self) -> String {
        "Regional availability".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unchecked_region_is_pending_and_requests_lookup() {
        let gate = EligibilityGate::new();
        let bus = Bus::new();
        assert_eq!(gate.check(&bus), GateVerdict::Pending);
        assert!(matches!(
            gate.on_enter(ActivationId::new(), &bus),
            Some(Effect::RequestEligibility { .. })
        ));
    }

    #[test]
    fn in_flight_lookup_is_not_requested_twice() {
        let gate = EligibilityGate::new();
        let bus = Bus::new().with(EligibilityState {
            available: Lookup::InFlight,
        });
        assert_eq!(gate.check(&bus), GateVerdict::Pending);
        assert!(gate.on_enter(ActivationId::new(), &bus).is_none());
    }

    #[test]
    fn ineligible_region_blocks_with_learn_more_link() {
        let gate = EligibilityGate::new();
        let bus = Bus::new().with(EligibilityState::resolved(false));
        match gate.check(&bus) {
            GateVerdict::Blocking(explanation) => {
                assert_eq!(
                    explanation.learn_more_url.as_deref(),
                    Some(REGION_AVAILABILITY_ARTICLE)
                );
            }
            other => panic!("expected blocking verdict, got {other:?}"),
        }
    }

    #[test]
    fn failed_lookup_is_transient() {
        let gate = EligibilityGate::new();
        let bus = Bus::new().with(EligibilityState {
            available: Lookup::Failed("timeout".into()),
        });
        assert_eq!(gate.check(&bus), GateVerdict::transient("timeout"));
    }
}
