//! Turnstile facade crate.
//!
//! Re-exports the flow, core, std, runtime and observe crates behind a
//! single entry point.

pub use turnstile_core as core;
pub use turnstile_flow as flow;
#[cfg(feature = "observe")]
pub use turnstile_observe as observe;
#[cfg(feature = "runtime")]
pub use turnstile_runtime as runtime;
#[cfg(feature = "std")]
pub use turnstile_std as std;

pub use turnstile_core::{Bus, Condition, FlowController, Gate, GateChain, Progress, Surface};
#[cfg(feature = "runtime")]
pub use turnstile_runtime::{FlowDriver, FlowHandle, ReviewSubmitter};

pub mod prelude {
    pub use turnstile_core::prelude::*;
    #[cfg(feature = "runtime")]
    pub use turnstile_runtime::prelude::*;
    #[cfg(feature = "std")]
    pub use turnstile_std::prelude::*;
}
