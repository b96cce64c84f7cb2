//! Test utilities for Turnstile flows.
//!
//! * [`RecordingSink`] - captures effects and completion events
//! * [`TestBus`] - fluent builder for host state
//! * [`ScriptedEligibility`], [`ScriptedChallenge`], [`RecordingTransfers`] -
//!   collaborator doubles
//! * [`assert_effects!`] - compare captured effect kinds

mod bus;
mod services;
mod sink;

pub use bus::TestBus;
pub use services::{RecordingTransfers, ScriptedChallenge, ScriptedEligibility};
pub use sink::RecordingSink;

/// Assert the kinds of the effects a [`RecordingSink`] captured, in order.
///
/// ```rust,ignore
/// assert_effects!(sink, ["request_eligibility", "open_connection_panel"]);
/// ```
#[macro_export]
macro_rules! assert_effects {
    ($sink:expr, [$($kind:expr),* $(,)?]) => {{
        let expected: Vec<&str> = vec![$($kind),*];
        assert_eq!($sink.kinds(), expected, "unexpected effects");
    }};
}
