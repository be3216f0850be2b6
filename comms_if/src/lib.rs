//! # Communications interface crate.
//!
//! Provides all common communications interfaces between the drive software and the remote
//! actuator.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Command and telemetry definitions for equipment (the drive actuators)
pub mod eqpt;

/// Network module
pub mod net;
