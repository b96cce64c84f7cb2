//! Built-in gates and preset flows.

pub mod flows;
pub mod gates;
pub mod prelude;

pub use flows::{FlowPreset, buy_fiat_flow, send_flow, send_flow_with_challenge};
pub use gates::account::AccountGate;
pub use gates::challenge::ChallengeGate;
pub use gates::eligibility::EligibilityGate;
pub use gates::predicate::PredicateGate;
pub use gates::warning::WarningGate;
