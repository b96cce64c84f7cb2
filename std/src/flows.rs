//! Preset gate chains for the flows the wallet ships with.

use crate::gates::account::AccountGate;
use crate::gates::challenge::ChallengeGate;
use crate::gates::eligibility::EligibilityGate;
use crate::gates::warning::WarningGate;
use serde::{Deserialize, Serialize};
use std::fmt;
use turnstile_core::chain::GateChain;

pub const BUY_FIAT_FLOW: &str = "buy_fiat";
pub const SEND_FLOW: &str = "send";

/// Buy crypto with fiat: region check, then a connected wallet, then the
/// on-ramp modal.
pub fn buy_fiat_flow() -> GateChain {
    GateChain::new(BUY_FIAT_FLOW)
        .gate(EligibilityGate::new())
        .gate(AccountGate::new().promote_onramp())
}

/// Send a transfer: a connected wallet and acknowledged warnings before the
/// review sheet opens.
pub fn send_flow() -> GateChain {
    GateChain::new(SEND_FLOW)
        .gate(AccountGate::new())
        .gate(WarningGate::new())
}

/// [`send_flow`] with an authentication challenge in front of the review
/// sheet.
pub fn send_flow_with_challenge() -> GateChain {
    send_flow().gate(ChallengeGate::new())
}

/// Named presets, as referenced from configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowPreset {
    BuyFiat,
    Send,
    SendWithChallenge,
}

impl FlowPreset {
    pub const ALL: [FlowPreset; 3] = [
        FlowPreset::BuyFiat,
        FlowPreset::Send,
        FlowPreset::SendWithChallenge,
    ];

    pub fn chain(self) -> GateChain {
        match self {
            FlowPreset::BuyFiat => buy_fiat_flow(),
            FlowPreset::Send => send_flow(),
            FlowPreset::SendWithChallenge => send_flow_with_challenge(),
        }
    }
}

impl fmt::Display for FlowPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowPreset::BuyFiat => f.write_str("buy_fiat"),
            FlowPreset::Send => f.write_str("send"),
            FlowPreset::SendWithChallenge => f.write_str("send_with_challenge"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use turnstile_core::gate::GateId;

    fn ids(chain: &GateChain) -> Vec<GateId> {
        chain.gates().map(|g| g.id()).collect()
    }

    #[test]
    fn buy_fiat_checks_region_before_account() {
        assert_eq!(
            ids(&buy_fiat_flow()),
            vec![GateId::new("eligibility"), GateId::new("account")]
        );
    }

    #[test]
    fn presets_parse_from_snake_case() {
        let preset: FlowPreset = serde_json::from_str("\"send_with_challenge\"").unwrap();
        assert_eq!(preset, FlowPreset::SendWithChallenge);
        assert_eq!(preset.chain().len(), 3);
        assert_eq!(preset.to_string(), "send_with_challenge");
    }
}
