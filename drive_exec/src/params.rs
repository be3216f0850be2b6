//! # Drive Executable Parameters

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

use comms_if::net::LinkParams;

use crate::{coord_map::DisplayParams, motion_ctrl, tm_sampler::TelemetryParams};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters of the drive executable, loaded from `drive_exec.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DriveExecParams {
    /// Target period of one cycle.
    ///
    /// Units: seconds
    pub cycle_period_s: f64,

    /// Keep polling telemetry while the agent is not moving.
    pub poll_while_idle: bool,

    /// Number of consecutive link failures after which the link is reported
    /// as degraded.
    pub max_consec_link_errors: u64,

    pub motion: motion_ctrl::Params,

    pub display: DisplayParams,

    pub telemetry: TelemetryParams,

    pub link: LinkParams,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ParamsError {
    #[error("cycle_period_s must be finite and positive, found {0}")]
    InvalidCyclePeriod(f64),

    #[error("telemetry.history_len must be at least 1")]
    ZeroHistoryLen,

    #[error("display origin must be finite")]
    InvalidDisplayOrigin,

    #[error("{0}")]
    Motion(#[from] motion_ctrl::MotionCtrlError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for DriveExecParams {
    fn default() -> Self {
        Self {
            cycle_period_s: 0.05,
            poll_while_idle: true,
            max_consec_link_errors: 5,
            motion: Default::default(),
            display: Default::default(),
            telemetry: Default::default(),
            link: Default::default(),
        }
    }
}

impl DriveExecParams {
    /// Check that the parameters are usable.
    pub fn validate(&self) -> Result<(), ParamsError> {
        if util::time::seconds_to_std(self.cycle_period_s).is_none() || self.cycle_period_s == 0.0 {
            return Err(ParamsError::InvalidCyclePeriod(self.cycle_period_s));
        }

        if self.telemetry.history_len == 0 {
            return Err(ParamsError::ZeroHistoryLen);
        }

        if !util::maths::all_finite(&[self.display.origin_x, self.display.origin_y]) {
            return Err(ParamsError::InvalidDisplayOrigin);
        }

        self.motion.validate()?;

        Ok(())
    }
}
