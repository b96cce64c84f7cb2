use serde::{Deserialize, Serialize};
use std::fmt;

/// A host-observed change that may let a suspended flow advance.
///
/// Hosts report these through `notify`; the controller only re-evaluates
/// when a not-yet-satisfied gate watches the condition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// A wallet account became connected.
    AccountConnected,
    /// A region / eligibility lookup produced a result or an error.
    EligibilityResolved,
    /// An interrupting panel (e.g. the connection drawer) was closed.
    PanelClosed,
    /// An authentication challenge reported its outcome.
    ChallengeResolved,
    /// The user acknowledged the displayed warning.
    WarningAcknowledged,
    /// The user closed the warning without acknowledging it.
    WarningDismissed,
    /// A host-defined condition for custom gates.
    Custom(String),
}

impl Condition {
    pub fn custom(name: impl Into<String>) -> Self {
        Condition::Custom(name.into())
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::AccountConnected => f.write_str("account_connected"),
            Condition::EligibilityResolved => f.write_str("eligibility_resolved"),
            Condition::PanelClosed => f.write_str("panel_closed"),
            Condition::ChallengeResolved => f.write_str("challenge_resolved"),
            Condition::WarningAcknowledged => f.write_str("warning_acknowledged"),
            Condition::WarningDismissed => f.write_str("warning_dismissed"),
            Condition::Custom(name) => write!(f, "custom:{name}"),
        }
    }
}
