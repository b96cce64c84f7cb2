use serde::{Deserialize, Serialize};
use turnstile_core::activation::ActivationId;
use turnstile_core::bus::Bus;
use turnstile_core::condition::Condition;
use turnstile_core::effect::Effect;
use turnstile_core::gate::{Gate, GateId};
use turnstile_core::host::{ChallengeOutcome, ChallengeState};
use turnstile_core::verdict::GateVerdict;

/// Out-of-band confirmation (biometric or passcode) before the terminal
/// action.
///
/// Approval passes the gate. A rejected or dismissed challenge ends the
/// activation and sends the user back to edit. Hosts clear
/// [`ChallengeState`] when they handle `ReturnToEdit`, so the next
/// activation challenges again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeGate {
    pub id: String,
}

impl ChallengeGate {
    pub fn new() -> Self {
        Self {
            id: "challenge".to_string(),
        }
    }
}

impl Default for ChallengeGate {
    fn default() -> Self {
        Self::new()
    }
}

impl Gate for ChallengeGate {
    fn id(&self) -> GateId {
        GateId::new(&self.id)
    }

    fn is_async(&self) -> bool {
        true
    }

    fn watches(&self, condition: &Condition) -> bool {
        *condition == Condition::ChallengeResolved
    }

    fn check(&self, bus: &Bus) -> GateVerdict {
        match bus.get::<ChallengeState>().and_then(|state| state.outcome) {
            None => GateVerdict::Interrupted,
            Some(ChallengeOutcome::Approved) => GateVerdict::Satisfied,
            Some(ChallengeOutcome::Rejected) => GateVerdict::rewind("challenge rejected"),
            Some(ChallengeOutcome::Dismissed) => GateVerdict::rewind("challenge dismissed"),
        }
    }

    fn on_enter(&self, activation: ActivationId, _bus: &Bus) -> Option<Effect> {
        Some(Effect::OpenChallenge {
            activation,
            gate: self.id(),
        })
    }

    fn label(&self) -> String {
        "Authentication".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(outcome: ChallengeOutcome) -> Bus {
        Bus::new().with(ChallengeState {
            outcome: Some(outcome),
        })
    }

    #[test]
    fn unanswered_challenge_interrupts() {
        let gate = ChallengeGate::new();
        assert_eq!(gate.check(&Bus::new()), GateVerdict::Interrupted);
        assert!(matches!(
            gate.on_enter(ActivationId::new(), &Bus::new()),
            Some(Effect::OpenChallenge { .. })
        ));
    }

    #[test]
    fn outcomes_map_to_verdicts() {
        let gate = ChallengeGate::new();
        assert_eq!(
            gate.check(&outcome(ChallengeOutcome::Approved)),
            GateVerdict::Satisfied
        );
        assert!(matches!(
            gate.check(&outcome(ChallengeOutcome::Rejected)),
            GateVerdict::Rewind { .. }
        ));
        assert!(matches!(
            gate.check(&outcome(ChallengeOutcome::Dismissed)),
            GateVerdict::Rewind { .. }
        ));
    }
}
