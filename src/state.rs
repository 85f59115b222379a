//! Application state management for the exporter.
//!
//! This module defines the shared application state that is passed
//! to HTTP handlers and used by the background polling task.

use herakles_hw_telemetry::{CommandRunner, Sampler};
use prometheus::Registry;
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;

use crate::cache::TelemetryCache;
use crate::config::Config;
use crate::health_stats::HealthStats;
use crate::metrics::TelemetryMetrics;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// Sampler driven by the poller; the mutex is only ever taken on a blocking thread.
pub type SharedSampler = Arc<Mutex<Sampler<Box<dyn CommandRunner>>>>;

/// Global application state shared across requests and background tasks.
pub struct AppState {
    pub registry: Registry,
    pub metrics: TelemetryMetrics,
    pub cache: Arc<RwLock<TelemetryCache>>,
    pub config: Arc<Config>,
    pub sampler: SharedSampler,
    pub health_stats: Arc<HealthStats>,
}

impl AppState {
    pub fn new(
        config: Config,
        runner: Box<dyn CommandRunner>,
    ) -> Result<SharedState, Box<dyn std::error::Error>> {
        let registry = Registry::new();
        let metrics = TelemetryMetrics::new(&registry)?;

        Ok(Arc::new(Self {
            registry,
            metrics,
            cache: Arc::new(RwLock::new(TelemetryCache::default())),
            config: Arc::new(config),
            sampler: Arc::new(Mutex::new(Sampler::new(runner))),
            health_stats: Arc::new(HealthStats::new()),
        }))
    }
}
