use serde::{Deserialize, Serialize};
use turnstile_core::activation::ActivationId;
use turnstile_core::bus::Bus;
use turnstile_core::condition::Condition;
use turnstile_core::effect::Effect;
use turnstile_core::gate::{Gate, GateId};
use turnstile_core::host::WarningSet;
use turnstile_core::verdict::{Explanation, GateVerdict};

/// Holds the flow until the user has seen the pending action's warnings.
///
/// A blocking warning stops the flow outright. A warning of medium
/// severity or worse must be acknowledged; it is shown on the surface
/// without disabling the trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarningGate {
    pub id: String,
}

impl WarningGate {
    pub fn new() -> Self {
        Self {
            id: "warning".to_string(),
        }
    }
}

impl Default for WarningGate {
    fn default() -> Self {
        Self::new()
    }
}

impl Gate for WarningGate {
    fn id(&self) -> GateId {
        GateId::new(&self.id)
    }

    fn watches(&self, condition: &Condition) -> bool {
        *condition == Condition::WarningAcknowledged
    }

    fn abandoned_by(&self, condition: &Condition) -> bool {
        *condition == Condition::WarningDismissed
    }

    fn check(&self, bus: &Bus) -> GateVerdict {
        let Some(set) = bus.get::<WarningSet>() else {
            return GateVerdict::Satisfied;
        };
        if let Some(warning) = set.blocking() {
            return GateVerdict::Blocking(Explanation::unavailable(
                &warning.title,
                &warning.message,
            ));
        }
        match set.transfer_warning() {
            Some(warning) if !set.acknowledged => GateVerdict::Acknowledge(Explanation::warning(
                &warning.title,
                &warning.message,
            )),
            _ => GateVerdict::Satisfied,
        }
    }

    fn on_enter(&self, activation: ActivationId, _bus: &Bus) -> Option<Effect> {
        Some(Effect::ShowWarning {
            activation,
            gate: self.id(),
        })
    }

    fn label(&self) -> String {
        "Warnings acknowledged".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use turnstile_core::host::{Warning, WarningSeverity};

    #[test]
    fn no_warnings_pass() {
        assert_eq!(WarningGate::new().check(&Bus::new()), GateVerdict::Satisfied);
    }

    #[test]
    fn low_severity_warnings_do_not_hold() {
        let bus = Bus::new().with(WarningSet::new(vec![Warning::new(
            WarningSeverity::Low,
            "New address",
            "You have not sent to this address before.",
        )]));
        assert_eq!(WarningGate::new().check(&bus), GateVerdict::Satisfied);
    }

    #[test]
    fn transfer_warning_needs_acknowledgement() {
        let mut set = WarningSet::new(vec![Warning::new(
            WarningSeverity::Medium,
            "Smart contract address",
            "Sending to a contract may lose funds.",
        )]);
        let gate = WarningGate::new();

        let verdict = gate.check(&Bus::new().with(set.clone()));
        assert!(matches!(verdict, GateVerdict::Acknowledge(ref e) if e.title == "Smart contract address"));

        set.acknowledged = true;
        assert_eq!(gate.check(&Bus::new().with(set)), GateVerdict::Satisfied);
    }

    #[test]
    fn dismissing_the_warning_abandons_the_flow() {
        let gate = WarningGate::new();
        assert!(gate.abandoned_by(&Condition::WarningDismissed));
        assert!(!gate.abandoned_by(&Condition::WarningAcknowledged));
        assert!(!gate.watches(&Condition::WarningDismissed));
    }

    #[test]
    fn blocking_warning_blocks_even_when_acknowledged() {
        let mut set = WarningSet::new(vec![
            Warning::new(WarningSeverity::High, "Insufficient funds", "Not enough balance.")
                .blocking(),
        ]);
        set.acknowledged = true;
        assert!(matches!(
            WarningGate::new().check(&Bus::new().with(set)),
            GateVerdict::Blocking(_)
        ));
    }
}
