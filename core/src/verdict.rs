use serde::{Deserialize, Serialize};

/// The explicit result of checking one gate against current host state.
///
/// `GateVerdict` is "Control Flow as Data": a gate never throws, it
/// answers with a verdict and the controller decides what happens next.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum GateVerdict {
    /// The precondition holds. Cached for the rest of the activation.
    Satisfied,

    /// Waiting on an external event (a lookup in flight, a user action).
    Pending,

    /// Waiting on an interruption this gate owns (a panel, a challenge
    /// sheet). The trigger stays disabled while it is on screen.
    Interrupted,

    /// Waiting for the user to acknowledge something shown to them.
    Acknowledge(Explanation),

    /// The check failed for a recoverable reason (network error).
    /// Treated as unresolved; a retry is offered.
    Transient { reason: String },

    /// The check failed definitively for this activation.
    Blocking(Explanation),

    /// The user backed out of an out-of-band confirmation. The activation
    /// ends and the user returns to an editable stage.
    Rewind { reason: String },
}

impl GateVerdict {
    pub fn transient(reason: impl Into<String>) -> Self {
        GateVerdict::Transient {
            reason: reason.into(),
        }
    }

    pub fn rewind(reason: impl Into<String>) -> Self {
        GateVerdict::Rewind {
            reason: reason.into(),
        }
    }

    /// Whether this verdict suspends the flow at the gate.
    pub fn is_hold(&self) -> bool {
        matches!(
            self,
            GateVerdict::Pending
                | GateVerdict::Interrupted
                | GateVerdict::Acknowledge(_)
                | GateVerdict::Transient { .. }
        )
    }
}

/// What kind of message an explanation carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExplanationKind {
    /// The feature cannot be used (region, eligibility, blocking warning).
    Unavailable,
    /// A warning the user should read before continuing.
    Warning,
}

/// User-facing reason attached to a blocked or acknowledgement gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Explanation {
    pub kind: ExplanationKind,
    pub title: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learn_more_url: Option<String>,
}

impl Explanation {
    pub fn unavailable(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: ExplanationKind::Unavailable,
            title: title.into(),
            message: message.into(),
            learn_more_url: None,
        }
    }

    pub fn warning(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: ExplanationKind::Warning,
            title: title.into(),
            message: message.into(),
            learn_more_url: None,
        }
    }

    pub fn with_learn_more(mut self, url: impl Into<String>) -> Self {
        self.learn_more_url = Some(url.into());
        self
    }
}
