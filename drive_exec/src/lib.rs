//! # Drive library.
//!
//! This library holds the modules of the drive executable: a simulated agent driving towards a
//! target at a fixed control rate, mirrored to a remote actuator whose drive telemetry is sampled
//! every cycle.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Localisation types - positions in the logical and display frames
pub mod loc;

/// Coordinate mapping - converts between the logical and display frames
pub mod coord_map;

/// Motion control module - steps the agent towards its target each cycle
pub mod motion_ctrl;

/// Telemetry sampler - polls actuator telemetry into bounded histories
pub mod tm_sampler;

/// Link client - drives the remote link from a background worker
pub mod link_client;

/// Data store - state shared across one cycle of the executable
pub mod data_store;

/// Control loop - ties the modules together for one cycle
pub mod control_loop;

/// Parameters for the drive executable
pub mod params;
