//! Cache of the latest telemetry reading.
//!
//! The background poller writes here; HTTP handlers only read.

use herakles_hw_telemetry::TelemetryReading;
use std::time::Instant;

/// Latest reading with poll timing information.
#[derive(Clone, Default)]
pub struct TelemetryCache {
    pub reading: Option<TelemetryReading>,
    pub last_updated: Option<Instant>,
    pub update_duration_seconds: f64,
    pub update_success: bool,
    pub is_updating: bool,
}

impl TelemetryCache {
    /// Seconds since the last successful poll, if any.
    pub fn age_seconds(&self) -> Option<f64> {
        self.last_updated.map(|t| t.elapsed().as_secs_f64())
    }
}
