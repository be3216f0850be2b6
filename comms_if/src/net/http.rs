//! HTTP transport to the actuator.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::time::Duration;

use log::trace;
use reqwest::blocking::Client;

use super::{LinkError, LinkParams, RemoteLink};
use crate::eqpt::drive::{PayloadFormat, RawTelemetryPayload};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Link to an actuator which serves commands and telemetry over HTTP.
pub struct HttpLink {
    http: Client,
    base_url: String,
    set_target_path: String,
    stop_path: String,
    telemetry_path: String,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl HttpLink {
    /// Create a new HTTP link. No request is made until the first command.
    pub fn new(params: &LinkParams) -> Result<Self, LinkError> {
        let http = Client::builder()
            .timeout(Duration::from_millis(params.timeout_ms))
            .build()
            .map_err(|e| LinkError::Unreachable(format!("could not build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: params.base_url.trim_end_matches('/').to_string(),
            set_target_path: params.set_target_path.clone(),
            stop_path: params.stop_path.clone(),
            telemetry_path: params.telemetry_path.clone(),
        })
    }

    /// Perform a GET request and return the response body.
    fn get(&self, path: &str, query: &[(&str, i32)]) -> Result<String, LinkError> {
        let url = format!("{}{}", self.base_url, path);

        trace!("GET {} {:?}", url, query);

        let resp = self
            .http
            .get(&url)
            .query(query)
            .send()
            .map_err(|e| LinkError::Unreachable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(LinkError::Malformed(format!("{} returned status {}", path, status)));
        }

        resp.text()
            .map_err(|e| LinkError::Malformed(format!("could not read body of {}: {}", path, e)))
    }
}

impl RemoteLink for HttpLink {
    fn set_target(&mut self, x: i32, y: i32) -> Result<(), LinkError> {
        self.get(&self.set_target_path, &[("x", x), ("y", y)])
            .map(|_| ())
    }

    fn stop(&mut self) -> Result<(), LinkError> {
        self.get(&self.stop_path, &[]).map(|_| ())
    }

    fn fetch_telemetry(&mut self) -> Result<RawTelemetryPayload, LinkError> {
        self.get(&self.telemetry_path, &[])
            .map(|text| RawTelemetryPayload::new(PayloadFormat::Labelled, text))
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
