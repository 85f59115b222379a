//! Background polling of the sampler.
//!
//! A single task owns the polling cadence, so the sampler's counter state is
//! never driven by two callers at once. Each poll runs on a blocking thread
//! because the sampler waits on shell commands.

use anyhow::Context;
use std::time::{Duration, Instant};
use tokio::time::{interval_at, Interval, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

use crate::state::SharedState;

/// Samples every enabled family once and publishes the reading.
#[instrument(skip(state))]
pub async fn poll_once(state: &SharedState) -> anyhow::Result<()> {
    let start = Instant::now();
    debug!("Starting telemetry poll");

    // Mark cache as updating (keep old reading until the new one is ready)
    {
        let mut cache = state.cache.write().await;
        cache.is_updating = true;
    }

    let sampler = state.sampler.clone();
    let families = state.config.families();
    let result = tokio::task::spawn_blocking(move || {
        let mut guard = sampler.lock().unwrap_or_else(|poisoned| {
            warn!("Sampler lock poisoned, recovering counter state");
            poisoned.into_inner()
        });
        guard.sample(families)
    })
    .await
    .context("sampler task failed");

    let reading = match result {
        Ok(reading) => reading,
        Err(e) => {
            let mut cache = state.cache.write().await;
            cache.is_updating = false;
            cache.update_success = false;
            state.metrics.poll_success.set(0.0);
            state.health_stats.record_failed_poll();
            return Err(e);
        }
    };

    let duration = start.elapsed().as_secs_f64();
    state.metrics.observe(&reading);
    state.metrics.poll_duration.set(duration);
    state.metrics.poll_success.set(1.0);
    state.health_stats.record_poll(
        duration,
        reading.cpu_percent,
        reading.gpu.map(|g| g.percent),
    );

    debug!(
        "Poll completed in {:.2}ms: cpu={:?} gpu={:?}",
        duration * 1000.0,
        reading.cpu_percent,
        reading.gpu.map(|g| g.percent)
    );

    // Swap reading under a short write lock
    {
        let mut cache = state.cache.write().await;
        cache.reading = Some(reading);
        cache.last_updated = Some(start);
        cache.update_duration_seconds = duration;
        cache.update_success = true;
        cache.is_updating = false;
    }

    Ok(())
}

/// Ticker whose first tick is one full period away, since startup already
/// polled once to take the differential baselines.
fn poll_ticker(period: Duration) -> Interval {
    let mut ticker = interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Polls forever at the configured interval.
pub async fn run(state: SharedState) {
    let period = state.config.poll_interval();
    let mut ticker = poll_ticker(period);
    info!(
        "Background poller started with {:.1}s interval",
        period.as_secs_f64()
    );

    loop {
        ticker.tick().await;
        if let Err(e) = poll_once(&state).await {
            error!("Scheduled poll failed: {:#}", e);
        }
    }
}
