use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use turnstile_core::host::ChallengeOutcome;
use turnstile_runtime::collaborator::{ChallengeService, EligibilityService, LookupError};
use turnstile_runtime::review::{TransactionRequest, TransferError, TransferHandler, TransferVariant};

/// Answers eligibility lookups from a script, then repeats the fallback.
#[derive(Debug)]
pub struct ScriptedEligibility {
    script: Mutex<VecDeque<Result<bool, LookupError>>>,
    fallback: Result<bool, LookupError>,
    calls: AtomicUsize,
}

impl ScriptedEligibility {
    pub fn new(script: impl IntoIterator<Item = Result<bool, LookupError>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback: Err(LookupError::Unavailable("script exhausted".to_string())),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn always(result: Result<bool, LookupError>) -> Self {
        Self::new([]).with_fallback(result)
    }

    pub fn with_fallback(mut self, fallback: Result<bool, LookupError>) -> Self {
        self.fallback = fallback;
        self
    }

    /// How many lookups were issued.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EligibilityService for ScriptedEligibility {
    async fn check_availability(&self) -> Result<bool, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

/// Answers challenges from a script; dismisses once it runs out.
#[derive(Debug, Default)]
pub struct ScriptedChallenge {
    script: Mutex<VecDeque<ChallengeOutcome>>,
    calls: AtomicUsize,
}

impl ScriptedChallenge {
    pub fn new(script: impl IntoIterator<Item = ChallengeOutcome>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChallengeService for ScriptedChallenge {
    async fn challenge(&self) -> ChallengeOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .pop_front()
            .unwrap_or(ChallengeOutcome::Dismissed)
    }
}

/// Records transfers and answers with a fake receipt.
#[derive(Debug, Default)]
pub struct RecordingTransfers {
    sent: Mutex<Vec<(String, TransferVariant)>>,
    fail_with: Option<TransferError>,
}

impl RecordingTransfers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(error: TransferError) -> Self {
        Self {
            sent: Mutex::default(),
            fail_with: Some(error),
        }
    }

    /// `(recipient, variant)` pairs in submission order.
    pub fn sent(&self) -> Vec<(String, TransferVariant)> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl TransferHandler for RecordingTransfers {
    async fn transfer(
        &self,
        recipient: &str,
        variant: &TransferVariant,
        _request: &TransactionRequest,
    ) -> Result<String, TransferError> {
        if let Some(error) = &self.fail_with {
            return Err(error.clone());
        }
        let mut sent = self.sent.lock();
        sent.push((recipient.to_string(), variant.clone()));
        Ok(format!("0xreceipt{}", sent.len()))
    }
}
