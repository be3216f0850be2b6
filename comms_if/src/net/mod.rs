//! # Network Module
//!
//! This module provides the link to the remote actuator. Two transports are supported behind the
//! [`RemoteLink`] trait:
//!
//! - [`HttpLink`]: the actuator runs a small HTTP server with `setTarget`, `stop` and telemetry
//!   endpoints, telemetry is a labelled payload.
//! - [`SerialLink`]: the actuator is attached to a serial device, commands and telemetry are
//!   newline terminated text lines, telemetry is a comma pair.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod http;
mod serial;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

use crate::eqpt::drive::{DriveCmd, RawTelemetryPayload};

pub use http::HttpLink;
pub use serial::SerialLink;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A link to the remote actuator.
///
/// All calls are blocking. Callers which must not stall (the control loop) should drive the link
/// from a worker thread.
pub trait RemoteLink: Send {
    /// Command the actuator to drive to the given logical target.
    ///
    /// This is best-effort: an `Ok` only means the transport accepted the command.
    fn set_target(&mut self, x: i32, y: i32) -> Result<(), LinkError>;

    /// Command the actuator to stop.
    fn stop(&mut self) -> Result<(), LinkError>;

    /// Fetch one raw telemetry payload from the actuator.
    fn fetch_telemetry(&mut self) -> Result<RawTelemetryPayload, LinkError>;

    /// Send a drive command, dispatching to `set_target` or `stop`.
    fn send_cmd(&mut self, cmd: &DriveCmd) -> Result<(), LinkError> {
        match *cmd {
            DriveCmd::SetTarget { x, y } => self.set_target(x, y),
            DriveCmd::Stop => self.stop(),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters describing how to reach the remote actuator.
///
/// Immutable once the link is created.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LinkParams {
    /// Which transport to use.
    pub transport: TransportKind,

    /// Base URL of the actuator's HTTP server, for example `"http://192.168.1.3"`.
    pub base_url: String,

    /// Path of the serial device, for example `"/dev/ttyUSB0"`.
    pub device_path: String,

    /// Timeout applied to each request.
    ///
    /// Units: milliseconds
    pub timeout_ms: u64,

    /// HTTP path of the set target endpoint.
    pub set_target_path: String,

    /// HTTP path of the stop endpoint.
    pub stop_path: String,

    /// HTTP path of the telemetry endpoint.
    pub telemetry_path: String,
}

/// A link which is never reachable, used to keep running locally when the real link can't be
/// opened.
#[derive(Debug, Clone)]
pub struct OfflineLink {
    reason: String,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Transports available to reach the actuator.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Http,
    Serial,
}

/// Errors raised by a [`RemoteLink`]. All of these are recoverable.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("The actuator could not be reached: {0}")]
    Unreachable(String),

    #[error("The actuator sent an unexpected response: {0}")]
    Malformed(String),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for LinkParams {
    fn default() -> Self {
        Self {
            transport: TransportKind::Http,
            base_url: String::from("http://192.168.1.3"),
            device_path: String::from("/dev/ttyUSB0"),
            timeout_ms: 500,
            set_target_path: String::from("/setTarget"),
            stop_path: String::from("/stop"),
            telemetry_path: String::from("/getPWM"),
        }
    }
}

impl OfflineLink {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn err(&self) -> LinkError {
        LinkError::Unreachable(format!("link offline ({})", self.reason))
    }
}

impl RemoteLink for OfflineLink {
    fn set_target(&mut self, _x: i32, _y: i32) -> Result<(), LinkError> {
        Err(self.err())
    }

    fn stop(&mut self) -> Result<(), LinkError> {
        Err(self.err())
    }

    fn fetch_telemetry(&mut self) -> Result<RawTelemetryPayload, LinkError> {
        Err(self.err())
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Open the link described by the parameters.
pub fn connect(params: &LinkParams) -> Result<Box<dyn RemoteLink>, LinkError> {
    match params.transport {
        TransportKind::Http => Ok(Box::new(HttpLink::new(params)?)),
        TransportKind::Serial => Ok(Box::new(SerialLink::open(&params.device_path)?)),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_link_params_defaults() {
        let p: LinkParams = toml::from_str("transport = \"serial\"").unwrap();

        assert_eq!(p.transport, TransportKind::Serial);
        assert_eq!(p.telemetry_path, "/getPWM");
        assert_eq!(p.timeout_ms, 500);
    }

    #[test]
    fn test_connect_missing_serial_device() {
        let p = LinkParams {
            transport: TransportKind::Serial,
            device_path: String::from("/definitely/not/a/tty"),
            ..Default::default()
        };

        assert!(matches!(connect(&p), Err(LinkError::Unreachable(_))));
    }

    #[test]
    fn test_offline_link() {
        let mut link = OfflineLink::new("no device");

        assert!(matches!(link.send_cmd(&DriveCmd::Stop), Err(LinkError::Unreachable(_))));
        assert!(link.fetch_telemetry().is_err());
    }
}
