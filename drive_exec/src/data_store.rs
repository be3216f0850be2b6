//! # Data Store

use std::fmt::Display;

use comms_if::eqpt::drive::TelemetrySample;
use log::{error, info};

use crate::{loc::Position, motion_ctrl::MotionStatus};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Data store for the executable, carried from cycle to cycle.
#[derive(Debug)]
pub struct DataStore {
    // Cycle management
    /// Number of cycles already executed
    pub num_cycles: u128,

    /// Session elapsed time at the start of this cycle
    pub session_time_s: f64,

    // Motion
    /// Agent position in the display frame
    pub position: Position,

    /// Agent position in the logical frame
    pub logical_position: Position,

    pub motion_status: MotionStatus,

    // Link
    /// True while the link has failed too many times in a row. The agent keeps
    /// moving locally, only the remote actuator is out of step.
    pub link_degraded: bool,

    /// Most recent link failure, cleared on the next success
    pub last_link_error: Option<String>,

    /// Most recent telemetry sample
    pub latest_sample: Option<TelemetrySample>,

    // Monitoring Counters
    /// Number of consecutive link failures, commands and polls alike
    pub num_consec_link_errors: u64,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl Default for DataStore {
    fn default() -> Self {
        Self {
            num_cycles: 0,
            session_time_s: 0.0,
            position: Position::default(),
            logical_position: Position::default(),
            motion_status: MotionStatus::Idle,
            link_degraded: false,
            last_link_error: None,
            latest_sample: None,
            num_consec_link_errors: 0,
        }
    }
}

impl DataStore {
    /// Perform actions required at the start of a cycle.
    pub fn cycle_start(&mut self) {
        self.session_time_s = util::session::get_elapsed_seconds();
    }

    /// Perform actions required at the end of a cycle.
    pub fn cycle_end(&mut self) {
        self.num_cycles += 1;
    }

    /// Record a successful link exchange, leaving degraded mode if needed.
    pub fn record_link_ok(&mut self) {
        self.num_consec_link_errors = 0;
        self.last_link_error = None;

        if self.link_degraded {
            self.link_degraded = false;
            info!("Link recovered, degraded mode cleared");
        }
    }

    /// Record a failed link exchange.
    ///
    /// Enters degraded mode once more than `max_consec_errors` failures happen
    /// in a row.
    pub fn record_link_error(&mut self, err: impl Display, max_consec_errors: u64) {
        self.num_consec_link_errors += 1;
        self.last_link_error = Some(err.to_string());

        if self.num_consec_link_errors > max_consec_errors && !self.link_degraded {
            self.link_degraded = true;
            error!(
                "Maximum number of consecutive link errors ({}) exceeded, link degraded",
                max_consec_errors
            );
        }
    }
}
