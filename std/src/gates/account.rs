use serde::{Deserialize, Serialize};
use turnstile_core::activation::ActivationId;
use turnstile_core::bus::Bus;
use turnstile_core::condition::Condition;
use turnstile_core::effect::Effect;
use turnstile_core::gate::{Gate, GateId};
use turnstile_core::host::WalletState;
use turnstile_core::verdict::GateVerdict;

/// Requires a connected wallet account.
///
/// While no account is connected the gate holds the flow behind the
/// connection panel. Closing the panel without connecting abandons the
/// activation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountGate {
    pub id: String,
    /// Show the fiat on-ramp promotion inside the connection panel.
    #[serde(default)]
    pub promote_onramp: bool,
}

impl AccountGate {
    pub fn new() -> Self {
        Self {
            id: "account".to_string(),
            promote_onramp: false,
        }
    }

    pub fn promote_onramp(mut self) -> Self {
        self.promote_onramp = true;
        self
    }
}

impl Default for AccountGate {
    fn default() -> Self {
        Self::new()
    }
}

impl Gate for AccountGate {
    fn id(&self) -> GateId {
        GateId::new(&self.id)
    }

    fn is_async(&self) -> bool {
        true
    }

    fn watches(&self, condition: &Condition) -> bool {
        *condition == Condition::AccountConnected
    }

    fn check(&self, bus: &Bus) -> GateVerdict {
        if bus.get::<WalletState>().is_some_and(WalletState::is_connected) {
            GateVerdict::Satisfied
        } else {
            GateVerdict::Interrupted
        }
    }

    fn on_enter(&self, activation: ActivationId, bus: &Bus) -> Option<Effect> {
        // A panel the user opened themselves is left alone.
        if bus.get::<WalletState>().is_some_and(|wallet| wallet.panel_open) {
            return None;
        }
        Some(Effect::OpenConnectionPanel {
            activation,
            promote_onramp: self.promote_onramp,
        })
    }

    fn abandoned_by(&self, condition: &Condition) -> bool {
        *condition == Condition::PanelClosed
    }

    fn label(&self) -> String {
        "Wallet connected".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_account_interrupts_and_opens_panel() {
        let gate = AccountGate::new().promote_onramp();
        let bus = Bus::new();
        assert_eq!(gate.check(&bus), GateVerdict::Interrupted);
        assert!(matches!(
            gate.on_enter(ActivationId::new(), &bus),
            Some(Effect::OpenConnectionPanel {
                promote_onramp: true,
                ..
            })
        ));
    }

    #[test]
    fn open_panel_is_not_reopened() {
        let gate = AccountGate::new();
        let bus = Bus::new().with(WalletState {
            panel_open: true,
            ..Default::default()
        });
        assert!(gate.on_enter(ActivationId::new(), &bus).is_none());
    }

    #[test]
    fn connected_account_satisfies() {
        let gate = AccountGate::new();
        let bus = Bus::new().with(WalletState::connected("0xabc"));
        assert_eq!(gate.check(&bus), GateVerdict::Satisfied);
        assert!(gate.abandoned_by(&Condition::PanelClosed));
        assert!(!gate.watches(&Condition::PanelClosed));
    }
}
