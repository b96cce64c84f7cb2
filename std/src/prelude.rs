pub use crate::flows::{FlowPreset, buy_fiat_flow, send_flow, send_flow_with_challenge};
pub use crate::gates::account::AccountGate;
pub use crate::gates::challenge::ChallengeGate;
pub use crate::gates::eligibility::{EligibilityGate, REGION_AVAILABILITY_ARTICLE};
pub use crate::gates::predicate::PredicateGate;
pub use crate::gates::warning::WarningGate;
