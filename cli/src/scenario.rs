//! Scenario scripts
//!
//! A scenario names a preset flow, the host state it starts from and a
//! list of steps. Steps either drive the controller, change host state the
//! way a wallet would, or assert on the surface.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use turnstile::core::host::{
    ChallengeOutcome, ChallengeState, EligibilityState, WalletState, Warning, WarningSet,
};
use turnstile::core::{Bus, Condition};
use turnstile::std::FlowPreset;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    pub preset: FlowPreset,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub host: HostConfig,
    #[serde(default)]
    pub steps: Vec<ScenarioStep>,
}

impl ScenarioConfig {
    pub fn from_toml_str(input: &str) -> Result<Self> {
        toml::from_str(input).context("Failed to parse scenario")
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario file: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid scenario: {}", path.display()))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// `EnvFilter` directive; `RUST_LOG` still wins.
    #[serde(default)]
    pub filter: Option<String>,
    /// JSON lines instead of the human-readable format.
    #[serde(default)]
    pub json: bool,
}

/// Host state before the first step.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostConfig {
    /// Region lookup result; unset means not looked up yet.
    #[serde(default)]
    pub eligible: Option<bool>,
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub panel_open: bool,
    #[serde(default)]
    pub challenge: Option<ChallengeOutcome>,
    #[serde(default)]
    pub warnings: Vec<Warning>,
    #[serde(default)]
    pub acknowledged: bool,
}

impl HostConfig {
    pub fn to_bus(&self) -> Bus {
        let mut bus = Bus::new();
        if let Some(eligible) = self.eligible {
            bus.insert(EligibilityState::resolved(eligible));
        }
        bus.insert(WalletState {
            account: self.account.clone(),
            read_only: self.read_only,
            panel_open: self.panel_open,
        });
        bus.insert(ChallengeState {
            outcome: self.challenge,
        });
        bus.insert(WarningSet {
            warnings: self.warnings.clone(),
            acknowledged: self.acknowledged,
        });
        bus
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScenarioStep {
    /// The user presses the guarded control.
    Trigger,
    /// Report a condition without touching host state.
    Notify { condition: Condition },
    Refresh,
    Retry,
    Reset,
    /// The region lookup answered.
    ResolveEligibility { eligible: bool },
    /// The region lookup failed.
    FailEligibility { reason: String },
    /// The user connected a wallet from the panel.
    Connect { account: String },
    /// The user dismissed the connection panel.
    ClosePanel,
    /// The user acknowledged the warning modal.
    Acknowledge,
    /// The user closed the warning modal without acknowledging it.
    DismissWarning,
    AnswerChallenge { outcome: ChallengeOutcome },
    Expect(Expectation),
}

impl ScenarioStep {
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioStep::Trigger => "trigger",
            ScenarioStep::Notify { .. } => "notify",
            ScenarioStep::Refresh => "refresh",
            ScenarioStep::Retry => "retry",
            ScenarioStep::Reset => "reset",
            ScenarioStep::ResolveEligibility { .. } => "resolve_eligibility",
            ScenarioStep::FailEligibility { .. } => "fail_eligibility",
            ScenarioStep::Connect { .. } => "connect",
            ScenarioStep::ClosePanel => "close_panel",
            ScenarioStep::Acknowledge => "acknowledge",
            ScenarioStep::DismissWarning => "dismiss_warning",
            ScenarioStep::AnswerChallenge { .. } => "answer_challenge",
            ScenarioStep::Expect(_) => "expect",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectedState {
    Inactive,
    Pending,
    Blocked,
    Completed,
}

/// Checks against the state after the previous step. Unset fields are not
/// checked.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Expectation {
    #[serde(default)]
    pub state: Option<ExpectedState>,
    /// Gate index for `pending` or `blocked`.
    #[serde(default)]
    pub gate: Option<usize>,
    #[serde(default)]
    pub disabled: Option<bool>,
    #[serde(default)]
    pub retry_available: Option<bool>,
    /// Explanation title; an empty string expects no explanation.
    #[serde(default)]
    pub explanation: Option<String>,
    /// Effect kinds the previous step dispatched, in order.
    #[serde(default)]
    pub effects: Option<Vec<String>>,
    /// Completions so far.
    #[serde(default)]
    pub completions: Option<usize>,
}
