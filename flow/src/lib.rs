//! Turnstile Flow - Activation State Layer
//!
//! This crate defines the **structural** aspects of a guarded flow:
//! - `ActivationState`: where an activation currently stands
//! - `GateStatus`: the monotonic status of a single gate
//! - `Step`: the only legal moves between activation states
//!
//! **IMPORTANT**: This layer is Pure Rust - no IO, no Async, no dependencies.

pub mod state;
pub mod status;
pub mod transition;

pub use state::ActivationState;
pub use status::{GateStatus, StatusRegression};
pub use transition::{Step, StepError};
