//! Async runtime for Turnstile flows: the tokio host loop, collaborator
//! services and the Review & Submit terminal wrapper.

pub mod collaborator;
pub mod config;
pub mod driver;
pub mod review;

pub mod prelude {
    pub use crate::collaborator::{ChallengeService, EligibilityService, LookupError};
    pub use crate::config::DriverConfig;
    pub use crate::driver::{FlowDriver, FlowHandle, HostEvent};
    pub use crate::review::{ReviewSubmitter, SubmitError, SubmitInputs, SubmitOutcome};
}

pub use collaborator::{
    ChallengeService, EligibilityService, LookupError, StaticChallenge, StaticEligibility,
};
pub use config::{ConfigError, DriverConfig};
pub use driver::{DriverError, DriverReport, FlowDriver, FlowHandle, HostEvent};
pub use review::{
    FungibleAsset, GasEstimate, NftAsset, Precondition, ReviewSubmitter, SendStage, SubmitError,
    SubmitInputs, SubmitOutcome, TransactionRequest, TransferError, TransferHandler,
    TransferVariant,
};
