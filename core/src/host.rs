//! Host-owned state records.
//!
//! These are the values a host keeps on the [`Bus`](crate::bus::Bus) for
//! the built-in gates to read. The controller never writes them.

use serde::{Deserialize, Serialize};

/// Progress of an asynchronous lookup backing a gate.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum Lookup<T> {
    /// Never requested.
    #[default]
    Idle,
    /// Requested, result outstanding.
    InFlight,
    /// Result arrived.
    Ready(T),
    /// The request failed for a recoverable reason.
    Failed(String),
}

impl<T> Lookup<T> {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Lookup::InFlight)
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            Lookup::Ready(value) => Some(value),
            _ => None,
        }
    }
}

/// Result of the regional availability check for a feature.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EligibilityState {
    pub available: Lookup<bool>,
}

impl EligibilityState {
    pub fn resolved(available: bool) -> Self {
        Self {
            available: Lookup::Ready(available),
        }
    }
}

/// Wallet connection as seen by the host.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WalletState {
    #[serde(default)]
    pub account: Option<String>,
    /// The connected account can only watch, not sign.
    #[serde(default)]
    pub read_only: bool,
    /// The connection panel is currently open.
    #[serde(default)]
    pub panel_open: bool,
}

impl WalletState {
    pub fn connected(account: impl Into<String>) -> Self {
        Self {
            account: Some(account.into()),
            ..Default::default()
        }
    }

    pub fn is_connected(&self) -> bool {
        self.account.is_some()
    }
}

/// How an out-of-band challenge ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeOutcome {
    Approved,
    Rejected,
    /// Closed without answering.
    Dismissed,
}

impl ChallengeOutcome {
    pub fn is_approved(&self) -> bool {
        matches!(self, ChallengeOutcome::Approved)
    }
}

/// Latest outcome of the authentication challenge, if any.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChallengeState {
    #[serde(default)]
    pub outcome: Option<ChallengeOutcome>,
}

/// Severity of a transaction warning.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum WarningSeverity {
    #[default]
    None,
    Low,
    Medium,
    High,
}

/// A warning computed for the pending action by an external classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub severity: WarningSeverity,
    pub title: String,
    pub message: String,
    /// Forbids the action outright.
    #[serde(default)]
    pub blocking: bool,
}

impl Warning {
    pub fn new(
        severity: WarningSeverity,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            title: title.into(),
            message: message.into(),
            blocking: false,
        }
    }

    pub fn blocking(mut self) -> Self {
        self.blocking = true;
        self
    }
}

/// All warnings for the pending action plus the user's acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WarningSet {
    #[serde(default)]
    pub warnings: Vec<Warning>,
    #[serde(default)]
    pub acknowledged: bool,
}

impl WarningSet {
    pub fn new(warnings: Vec<Warning>) -> Self {
        Self {
            warnings,
            acknowledged: false,
        }
    }

    /// First warning that forbids the action.
    pub fn blocking(&self) -> Option<&Warning> {
        self.warnings.iter().find(|w| w.blocking)
    }

    /// First warning serious enough to show before submitting.
    pub fn transfer_warning(&self) -> Option<&Warning> {
        self.warnings
            .iter()
            .find(|w| w.severity >= WarningSeverity::Medium)
    }
}
