//! # Equipment Interface
//!
//! This module defines the interface structures which are exchanged with the remote actuator.

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

pub mod drive;
