//! Review & Submit: the terminal action of the send flow.
//!
//! [`ReviewSubmitter::submit`] re-checks the synchronous preconditions,
//! runs the optional challenge, then executes exactly one transfer variant
//! and reports completion once per activation lifetime.

use crate::collaborator::ChallengeService;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use turnstile_core::effect::{Completion, CompletionEvent, CompletionSink, Effect, EffectSink};
use turnstile_core::gate::GateId;
use turnstile_core::host::{ChallengeOutcome, WalletState, WarningSet};
use turnstile_core::terminal::{CompletionToken, TerminalLedger};

/// Which screen of the send flow the user is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendStage {
    /// Recipient and amount are editable.
    #[default]
    Form,
    Review,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FungibleAsset {
    pub address: String,
    pub symbol: String,
    pub amount: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftAsset {
    pub contract: String,
    pub token_id: String,
}

/// A built, unsigned transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub chain_id: u64,
    pub to: String,
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub value: String,
}

/// Network cost estimate for the transaction.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GasEstimate {
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl GasEstimate {
    pub fn ready(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            error: None,
        }
    }
}

/// Everything the review screen derived before the user pressed submit.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SubmitInputs {
    #[serde(default)]
    pub recipient: Option<String>,
    #[serde(default)]
    pub currency: Option<FungibleAsset>,
    #[serde(default)]
    pub nft: Option<NftAsset>,
    #[serde(default)]
    pub tx_request: Option<TransactionRequest>,
    #[serde(default)]
    pub gas: GasEstimate,
    #[serde(default)]
    pub warnings: WarningSet,
    #[serde(default)]
    pub wallet: WalletState,
}

/// A synchronous submit precondition that does not hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Precondition {
    BlockingWarning,
    GasUnavailable,
    GasError,
    MissingTransactionRequest,
    ReadOnlyAccount,
}

impl fmt::Display for Precondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Precondition::BlockingWarning => "a blocking warning is outstanding",
            Precondition::GasUnavailable => "no network cost estimate",
            Precondition::GasError => "network cost estimate failed",
            Precondition::MissingTransactionRequest => "transaction request not built",
            Precondition::ReadOnlyAccount => "account is view-only",
        };
        f.write_str(text)
    }
}

impl SubmitInputs {
    /// Preconditions that currently fail, in a stable order.
    pub fn unmet_preconditions(&self) -> Vec<Precondition> {
        let mut unmet = Vec::new();
        if self.warnings.blocking().is_some() {
            unmet.push(Precondition::BlockingWarning);
        }
        if self.gas.value.is_none() {
            unmet.push(Precondition::GasUnavailable);
        }
        if self.gas.error.is_some() {
            unmet.push(Precondition::GasError);
        }
        if self.tx_request.is_none() {
            unmet.push(Precondition::MissingTransactionRequest);
        }
        if self.wallet.read_only {
            unmet.push(Precondition::ReadOnlyAccount);
        }
        unmet
    }

    /// Whether the submit control should be disabled.
    pub fn action_disabled(&self) -> bool {
        !self.unmet_preconditions().is_empty()
    }

    /// The transfer path to take. The non-fungible path wins when an NFT is
    /// selected.
    pub fn variant(&self) -> Option<TransferVariant> {
        match (&self.nft, &self.currency) {
            (Some(nft), _) => Some(TransferVariant::Nft(nft.clone())),
            (None, Some(currency)) => Some(TransferVariant::Fungible(currency.clone())),
            (None, None) => None,
        }
    }
}

/// The mutually exclusive ways to submit a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum TransferVariant {
    Fungible(FungibleAsset),
    Nft(NftAsset),
}

impl TransferVariant {
    pub fn name(&self) -> &'static str {
        match self {
            TransferVariant::Fungible(_) => "fungible",
            TransferVariant::Nft(_) => "nft",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("transfer rejected by the wallet: {0}")]
    Rejected(String),

    #[error("transfer could not be broadcast: {0}")]
    Broadcast(String),
}

/// Signs and sends one transfer variant.
#[async_trait]
pub trait TransferHandler: Send + Sync {
    /// Returns an identifier of the submitted transaction.
    async fn transfer(
        &self,
        recipient: &str,
        variant: &TransferVariant,
        request: &TransactionRequest,
    ) -> Result<String, TransferError>;
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error("submission blocked: {}", describe(.unmet))]
    SubmissionBlocked { unmet: Vec<Precondition> },

    #[error("challenge failed: {reason}")]
    ChallengeFailed { reason: String },

    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// A collaborator called submit without the inputs it must provide, or
    /// with a completion that belongs to another flow.
    #[error("contract violation: {0}")]
    ContractViolation(&'static str),
}

impl SubmitError {
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, SubmitError::ContractViolation(_))
    }
}

fn describe(unmet: &[Precondition]) -> String {
    unmet
        .iter()
        .map(Precondition::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Submitted {
        variant: &'static str,
        receipt: String,
    },
    /// This activation already submitted; nothing was done.
    AlreadySubmitted,
}

const CHALLENGE_GATE: &str = "challenge";

/// Terminal action wrapper for the send flow.
pub struct ReviewSubmitter {
    flow: String,
    handler: Arc<dyn TransferHandler>,
    challenge: Option<Arc<dyn ChallengeService>>,
    challenge_timeout: Duration,
    effects: Arc<dyn EffectSink>,
    completion: Arc<dyn CompletionSink>,
    ledger: Mutex<TerminalLedger>,
    stage: Mutex<SendStage>,
}

impl ReviewSubmitter {
    pub fn new(
        flow: impl Into<String>,
        handler: Arc<dyn TransferHandler>,
        effects: Arc<dyn EffectSink>,
        completion: Arc<dyn CompletionSink>,
    ) -> Self {
        Self {
            flow: flow.into(),
            handler,
            challenge: None,
            challenge_timeout: Duration::from_secs(60),
            effects,
            completion,
            ledger: Mutex::new(TerminalLedger::new()),
            stage: Mutex::new(SendStage::Form),
        }
    }

    /// Require `service` to approve before any transfer runs.
    pub fn with_challenge(mut self, service: Arc<dyn ChallengeService>, timeout: Duration) -> Self {
        self.challenge = Some(service);
        self.challenge_timeout = timeout;
        self
    }

    pub fn stage(&self) -> SendStage {
        *self.stage.lock()
    }

    /// Move to the review screen.
    pub fn open_review(&self) {
        *self.stage.lock() = SendStage::Review;
    }

    /// Return to the editable form.
    pub fn edit(&self) {
        *self.stage.lock() = SendStage::Form;
    }

    /// Submit the transfer for the flow that `token` completed.
    ///
    /// The token comes from the send flow's
    /// [`FlowController::last_completion`](turnstile_core::FlowController::last_completion);
    /// a token minted by a different flow is a contract violation. Repeated
    /// calls after a successful submit return
    /// [`SubmitOutcome::AlreadySubmitted`] without side effects.
    pub async fn submit(
        &self,
        token: &CompletionToken,
        inputs: &SubmitInputs,
    ) -> Result<SubmitOutcome, SubmitError> {
        let activation = token.activation();
        if token.flow() != self.flow {
            tracing::error!(%token, flow = %self.flow, "Submit invoked with a foreign completion");
            return Err(SubmitError::ContractViolation(
                "submit invoked with a completion from another flow",
            ));
        }
        if self.ledger.lock().contains(activation) {
            tracing::debug!(%activation, "Submit ignored; already submitted");
            return Ok(SubmitOutcome::AlreadySubmitted);
        }

        let Some(recipient) = inputs.recipient.as_deref() else {
            tracing::error!(%activation, "Submit invoked with no recipient resolved");
            return Err(SubmitError::ContractViolation(
                "submit invoked with no recipient resolved",
            ));
        };

        let unmet = inputs.unmet_preconditions();
        if !unmet.is_empty() {
            tracing::warn!(%activation, ?unmet, "Submission blocked");
            return Err(SubmitError::SubmissionBlocked { unmet });
        }
        let Some(request) = inputs.tx_request.as_ref() else {
            return Err(SubmitError::SubmissionBlocked {
                unmet: vec![Precondition::MissingTransactionRequest],
            });
        };

        let Some(variant) = inputs.variant() else {
            tracing::error!(%activation, "Submit invoked with no asset selected");
            return Err(SubmitError::ContractViolation(
                "submit invoked with no asset selected",
            ));
        };

        if let Some(service) = &self.challenge {
            let outcome = tokio::time::timeout(self.challenge_timeout, service.challenge())
                .await
                .unwrap_or(ChallengeOutcome::Dismissed);
            if !outcome.is_approved() {
                let reason = match outcome {
                    ChallengeOutcome::Rejected => "challenge rejected",
                    _ => "challenge dismissed",
                };
                tracing::info!(%activation, reason, "Returning to send form");
                self.edit();
                self.effects.dispatch(Effect::ReturnToEdit {
                    activation,
                    gate: GateId::new(CHALLENGE_GATE),
                });
                return Err(SubmitError::ChallengeFailed {
                    reason: reason.to_string(),
                });
            }
        }

        // Claimed before the transfer runs so a concurrent submit cannot
        // send twice. A failed transfer needs a new activation.
        if !self.ledger.lock().claim(activation) {
            return Ok(SubmitOutcome::AlreadySubmitted);
        }

        let receipt = self.handler.transfer(recipient, &variant, request).await?;
        tracing::info!(%activation, variant = variant.name(), %receipt, "Transfer submitted");

        self.completion.completed(CompletionEvent::new(
            &self.flow,
            activation,
            Completion::TransferSubmitted {
                variant: variant.name().to_string(),
            },
        ));
        Ok(SubmitOutcome::Submitted {
            variant: variant.name(),
            receipt,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborator::StaticChallenge;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use turnstile_core::host::{Warning, WarningSeverity};
    use turnstile_core::{Bus, Discard, FlowController, GateChain};

    #[derive(Default)]
    struct Recorder {
        effects: Mutex<Vec<Effect>>,
        completions: Mutex<Vec<CompletionEvent>>,
        transfers: AtomicUsize,
        last_variant: Mutex<Option<&'static str>>,
    }

    impl EffectSink for Recorder {
        fn dispatch(&self, effect: Effect) {
            self.effects.lock().push(effect);
        }
    }

    impl CompletionSink for Recorder {
        fn completed(&self, event: CompletionEvent) {
            self.completions.lock().push(event);
        }
    }

    #[async_trait]
    impl TransferHandler for Recorder {
        async fn transfer(
            &self,
            _recipient: &str,
            variant: &TransferVariant,
            _request: &TransactionRequest,
        ) -> Result<String, TransferError> {
            self.transfers.fetch_add(1, Ordering::SeqCst);
            *self.last_variant.lock() = Some(variant.name());
            Ok("0xreceipt".to_string())
        }
    }

    fn submitter(recorder: &Arc<Recorder>) -> ReviewSubmitter {
        ReviewSubmitter::new("send", recorder.clone(), recorder.clone(), recorder.clone())
    }

    /// Run an ungated flow named `flow` to completion and take its receipt.
    fn completion_token(flow: &str) -> CompletionToken {
        let mut controller = FlowController::new(GateChain::new(flow), Arc::new(Discard));
        controller.trigger(&Bus::new());
        controller.last_completion().cloned().unwrap()
    }

    fn ready_inputs() -> SubmitInputs {
        SubmitInputs {
            recipient: Some("0xrecipient".into()),
            currency: Some(FungibleAsset {
                address: "0xtoken".into(),
                symbol: "UNI".into(),
                amount: "1.5".into(),
            }),
            tx_request: Some(TransactionRequest {
                chain_id: 1,
                to: "0xtoken".into(),
                data: "0x".into(),
                value: "0".into(),
            }),
            gas: GasEstimate::ready("0.001"),
            wallet: WalletState::connected("0xsender"),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn submits_once_and_completes_once() {
        let recorder = Arc::new(Recorder::default());
        let submitter = submitter(&recorder);
        let token = completion_token("send");

        let first = submitter.submit(&token, &ready_inputs()).await.unwrap();
        assert!(matches!(first, SubmitOutcome::Submitted { variant: "fungible", .. }));

        let second = submitter.submit(&token, &ready_inputs()).await.unwrap();
        assert_eq!(second, SubmitOutcome::AlreadySubmitted);
        assert_eq!(recorder.transfers.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.completions.lock().len(), 1);
    }

    #[tokio::test]
    async fn nft_variant_wins() {
        let recorder = Arc::new(Recorder::default());
        let mut inputs = ready_inputs();
        inputs.nft = Some(NftAsset {
            contract: "0xnft".into(),
            token_id: "7".into(),
        });

        submitter(&recorder)
            .submit(&completion_token("send"), &inputs)
            .await
            .unwrap();
        assert_eq!(*recorder.last_variant.lock(), Some("nft"));
    }

    #[tokio::test]
    async fn read_only_account_blocks_submission() {
        let recorder = Arc::new(Recorder::default());
        let mut inputs = ready_inputs();
        inputs.wallet.read_only = true;
        assert!(inputs.action_disabled());

        let err = submitter(&recorder)
            .submit(&completion_token("send"), &inputs)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SubmitError::SubmissionBlocked {
                unmet: vec![Precondition::ReadOnlyAccount]
            }
        );
        assert_eq!(recorder.transfers.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn gas_and_warning_preconditions_are_reported_together() {
        let mut inputs = ready_inputs();
        inputs.gas = GasEstimate {
            value: Some("0.001".into()),
            error: Some("estimation reverted".into()),
        };
        inputs.warnings = WarningSet::new(vec![
            Warning::new(WarningSeverity::High, "Insufficient funds", "").blocking(),
        ]);
        assert_eq!(
            inputs.unmet_preconditions(),
            vec![Precondition::BlockingWarning, Precondition::GasError]
        );
    }

    #[tokio::test]
    async fn missing_recipient_is_a_contract_violation() {
        let recorder = Arc::new(Recorder::default());
        let mut inputs = ready_inputs();
        inputs.recipient = None;

        let err = submitter(&recorder)
            .submit(&completion_token("send"), &inputs)
            .await
            .unwrap_err();
        assert!(err.is_contract_violation());
    }

    #[tokio::test]
    async fn rejected_challenge_returns_to_form() {
        let recorder = Arc::new(Recorder::default());
        let submitter = submitter(&recorder).with_challenge(
            Arc::new(StaticChallenge(ChallengeOutcome::Rejected)),
            Duration::from_secs(1),
        );
        submitter.open_review();

        let err = submitter
            .submit(&completion_token("send"), &ready_inputs())
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::ChallengeFailed { .. }));
        assert_eq!(submitter.stage(), SendStage::Form);
        assert!(matches!(
            recorder.effects.lock().as_slice(),
            [Effect::ReturnToEdit { .. }]
        ));
        assert_eq!(recorder.transfers.load(Ordering::SeqCst), 0);
        assert!(recorder.completions.lock().is_empty());
    }

    #[tokio::test]
    async fn approved_challenge_submits() {
        let recorder = Arc::new(Recorder::default());
        let submitter = submitter(&recorder).with_challenge(
            Arc::new(StaticChallenge(ChallengeOutcome::Approved)),
            Duration::from_secs(1),
        );
        let outcome = submitter
            .submit(&completion_token("send"), &ready_inputs())
            .await
            .unwrap();
        assert!(matches!(outcome, SubmitOutcome::Submitted { .. }));
    }

    #[tokio::test]
    async fn completion_from_another_flow_is_a_contract_violation() {
        let recorder = Arc::new(Recorder::default());
        let err = submitter(&recorder)
            .submit(&completion_token("buy_fiat"), &ready_inputs())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SubmitError::ContractViolation("submit invoked with a completion from another flow")
        );
        assert_eq!(recorder.transfers.load(Ordering::SeqCst), 0);
        assert!(recorder.completions.lock().is_empty());
    }
}
