//! Motion control module
//!
//! Moves the agent in a straight line towards its target at a constant speed. Each call to
//! `tick` is one control period, so `speed` is a distance per period rather than per second.
//! Running the timer at a fixed interval makes this equivalent to stepping `speed / period * dt`.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use params::*;
pub use state::*;

use crate::loc::Position;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during MotionCtrl operation.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum MotionCtrlError {
    #[error("Target {0:?} is not a finite position")]
    InvalidTarget(Position),

    #[error("Invalid motion parameters: {0}")]
    InvalidParams(String),
}
