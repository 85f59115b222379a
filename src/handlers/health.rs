//! Health check endpoint handler.
//!
//! This module provides the `/health` endpoint handler that returns
//! poller health statistics and the latest reading.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use herakles_hw_telemetry::TelemetryReading;
use std::fmt::Write as FmtWrite;
use tracing::{debug, instrument};

use crate::state::SharedState;

/// Footer text for human-readable HTTP endpoints.
pub const FOOTER_TEXT: &str = "Project: https://github.com/herakles-io/herakles-hw-telemetry — More info: https://www.herakles.io — Support: proc-mem@herakles.io";

/// Handler for the /health endpoint.
#[instrument(skip(state))]
pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /health request");

    state.health_stats.record_http_request();

    let cache = state.cache.read().await;

    // Derive HTTP status from cache state
    let status = if cache.update_success && cache.last_updated.is_some() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let message = if cache.is_updating && cache.last_updated.is_some() {
        "OK - Poll in progress"
    } else if cache.update_success {
        "OK"
    } else if cache.last_updated.is_none() {
        "No poll completed yet"
    } else {
        "Last poll failed"
    };

    let table = state.health_stats.render_table();
    let reading_section = match &cache.reading {
        Some(reading) => render_reading(
            reading,
            cache.age_seconds().unwrap_or(0.0),
            cache.update_duration_seconds,
        ),
        None => "LATEST READING\n==============\n\nnone\n".to_string(),
    };

    debug!("Health check: {} - {}", status, message);
    (
        status,
        [("Content-Type", "text/plain; charset=utf-8")],
        format!("{message}\n\n{table}\n{reading_section}\n{FOOTER_TEXT}"),
    )
}

/// Renders the latest reading as plain text.
fn render_reading(reading: &TelemetryReading, age_seconds: f64, poll_seconds: f64) -> String {
    let mut out = String::new();
    writeln!(out, "LATEST READING").ok();
    writeln!(out, "==============").ok();
    writeln!(out).ok();
    writeln!(out, "{:14} {}", "taken at:", reading.timestamp.to_rfc3339()).ok();
    writeln!(out, "{:14} {:.1}s", "age:", age_seconds).ok();
    writeln!(out, "{:14} {:.3}s", "poll took:", poll_seconds).ok();

    match reading.cpu_percent {
        Some(cpu) => writeln!(out, "{:14} {}%", "cpu:", cpu).ok(),
        None => writeln!(out, "{:14} disabled", "cpu:").ok(),
    };

    match reading.gpu {
        Some(gpu) => {
            let source = gpu.source.map(|s| s.as_str()).unwrap_or("unavailable");
            writeln!(out, "{:14} {}% ({})", "gpu:", gpu.percent, source).ok()
        }
        None => writeln!(out, "{:14} disabled", "gpu:").ok(),
    };

    match reading.memory {
        Some(mem) => {
            writeln!(
                out,
                "{:14} {} / {} MB",
                "ram:",
                mem.ram_used / 1024 / 1024,
                mem.ram_total / 1024 / 1024
            )
            .ok();
            writeln!(
                out,
                "{:14} {} / {} MB",
                "swap:",
                mem.swap_used / 1024 / 1024,
                mem.swap_total / 1024 / 1024
            )
            .ok();
            writeln!(
                out,
                "{:14} {} / {} MB",
                "zram:",
                mem.zram_used / 1024 / 1024,
                mem.zram_total / 1024 / 1024
            )
            .ok()
        }
        None => writeln!(out, "{:14} disabled", "memory:").ok(),
    };

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use herakles_hw_telemetry::{GpuReading, MemorySnapshot};

    #[test]
    fn test_render_reading() {
        let reading = TelemetryReading {
            timestamp: Utc::now(),
            cpu_percent: Some(57),
            gpu: Some(GpuReading::default()),
            memory: Some(MemorySnapshot {
                zram_total: 512 * 1024 * 1024,
                zram_used: 10 * 1024 * 1024,
                ..MemorySnapshot::default()
            }),
        };
        let text = render_reading(&reading, 1.5, 0.042);
        assert!(text.contains("57%"));
        assert!(text.contains("0% (unavailable)"));
        assert!(text.contains("10 / 512 MB"));
        assert!(text.contains("1.5s"));
        assert!(text.contains("poll took:     0.042s"));
    }
}
