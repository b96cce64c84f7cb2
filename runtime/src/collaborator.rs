//! Collaborator services the driver calls out to.

use async_trait::async_trait;
use thiserror::Error;
use turnstile_core::host::ChallengeOutcome;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("lookup service unavailable: {0}")]
    Unavailable(String),

    #[error("lookup timed out after {0}ms")]
    Timeout(u64),
}

/// Regional availability of the on-ramp provider.
#[async_trait]
pub trait EligibilityService: Send + Sync {
    /// `Ok(false)` is a definitive "not available here".
    async fn check_availability(&self) -> Result<bool, LookupError>;
}

/// Out-of-band confirmation (biometric prompt, passcode sheet).
#[async_trait]
pub trait ChallengeService: Send + Sync {
    async fn challenge(&self) -> ChallengeOutcome;
}

/// An eligibility service with a fixed answer.
#[derive(Debug, Clone)]
pub struct StaticEligibility(pub Result<bool, LookupError>);

#[async_trait]
impl EligibilityService for StaticEligibility {
    async fn check_availability(&self) -> Result<bool, LookupError> {
        self.0.clone()
    }
}

/// A challenge service that always answers the same way.
#[derive(Debug, Clone, Copy)]
pub struct StaticChallenge(pub ChallengeOutcome);

#[async_trait]
impl ChallengeService for StaticChallenge {
    async fn challenge(&self) -> ChallengeOutcome {
        self.0
    }
}
