//! Parameters structure for MotionCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

use super::MotionCtrlError;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for motion control.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(default)]
pub struct Params {
    /// Distance moved towards the target in one control period.
    ///
    /// Units: display units/period
    pub speed: f64,

    /// Distance from the target under which the agent has arrived.
    ///
    /// Units: display units
    pub arrival_tolerance: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            speed: 2.0,
            arrival_tolerance: 1.0,
        }
    }
}

impl Params {
    /// Check the parameters can drive the agent to a target.
    pub fn validate(&self) -> Result<(), MotionCtrlError> {
        if !(self.speed.is_finite() && self.speed > 0.0) {
            return Err(MotionCtrlError::InvalidParams(format!(
                "speed must be finite and positive, found {}",
                self.speed
            )));
        }

        if !(self.arrival_tolerance.is_finite() && self.arrival_tolerance >= 0.0) {
            return Err(MotionCtrlError::InvalidParams(format!(
                "arrival_tolerance must be finite and non-negative, found {}",
                self.arrival_tolerance
            )));
        }

        Ok(())
    }
}
