//! Documentation endpoint handler.
//!
//! This module provides the `/doc` endpoint handler that displays
//! documentation for the exporter.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use tracing::{debug, instrument};

use crate::handlers::health::FOOTER_TEXT;
use crate::state::SharedState;

/// Handler for the /doc endpoint.
#[instrument(skip(state))]
pub async fn doc_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /doc request");

    state.health_stats.record_http_request();

    let version = env!("CARGO_PKG_VERSION");
    let doc = format!(
        r#"HERAKLES HARDWARE TELEMETRY EXPORTER - DOCUMENTATION
====================================================

VERSION: {}
DESCRIPTION: Prometheus exporter for CPU/GPU utilization and RAM/swap/zram usage

HTTP ENDPOINTS
--------------
GET /metrics     - Prometheus metrics endpoint
GET /health      - Health check with poll statistics (plain text)
GET /doc         - This documentation (plain text)

AVAILABLE METRICS
-----------------
herakles_hw_cpu_usage_percent            - Aggregate CPU usage since last poll
herakles_hw_gpu_usage_percent            - GPU busy from first available source
herakles_hw_gpu_source_info{{source}}      - 1 for the GPU source that answered
herakles_hw_ram_{{total,used}}_bytes       - RAM from `free -b`
herakles_hw_swap_{{total,used}}_bytes      - Non-zram swap areas from /proc/swaps
herakles_hw_zram_{{total,used}}_bytes      - zram devices from /proc/swaps
herakles_hw_poll_duration_seconds        - Duration of the last poll
herakles_hw_poll_success                 - Last poll completed (1) or failed (0)
herakles_hw_last_poll_timestamp_seconds  - Unix time of the last poll

GPU SOURCES (in probe order)
----------------------------
adreno_percentage  /sys/class/kgsl/kgsl-3d0/gpu_busy_percentage
adreno_busy        /sys/class/kgsl/kgsl-3d0/gpubusy (cumulative, needs two polls)
mali               /sys/class/misc/mali0/device/utilization
generic            /sys/kernel/gpu/gpu_busy

CPU and adreno_busy are differential: the first poll after start reports 0.

CONFIGURATION
-------------
Config file locations (in order):
1. CLI specified: -c /path/to/config.yaml
2. System config: /etc/herakles/hw-telemetry.yaml
3. Current directory: ./herakles-hw-telemetry.yaml

Key configuration options:
- port: HTTP listen port (default: 9216)
- bind: Bind address (default: 0.0.0.0)
- poll_interval_secs: Sampling interval (default: 2)
- command_timeout_ms: Per-command timeout (default: 2000)
- privileged: Wrap reads in `su -c` (default: true)

CLI COMMANDS
------------
herakles-hw-telemetry                        - Start the exporter
herakles-hw-telemetry check --all            - Probe telemetry sources
herakles-hw-telemetry config -o config.yaml  - Generate config file
herakles-hw-telemetry sample -n 3            - Print readings and exit
herakles-hw-telemetry --help                 - Show all CLI options

PROMETHEUS SCRAPE CONFIG
------------------------
scrape_configs:
  - job_name: 'herakles-hw'
    static_configs:
      - targets: ['localhost:9216']
    scrape_interval: 15s

{}
"#,
        version, FOOTER_TEXT
    );

    (
        StatusCode::OK,
        [("Content-Type", "text/plain; charset=utf-8")],
        doc,
    )
}
