//! Sample command implementation.
//!
//! Drives the sampler directly (no HTTP server) and prints each reading.
//! Differential metrics need a baseline, so the first CPU reading is 0.

use herakles_hw_telemetry::{CommandRunner, Sampler, TelemetryReading};
use std::time::Duration;
use tracing::debug;

use crate::cli::ReadingFormat;
use crate::config::Config;

/// Samples telemetry `iterations` times and prints the readings
pub fn command_sample(
    iterations: usize,
    interval_ms: u64,
    format: ReadingFormat,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut sampler = Sampler::new(config.shell_runner());
    let readings = collect_readings(
        &mut sampler,
        iterations,
        Duration::from_millis(interval_ms),
        config,
    );

    for reading in &readings {
        println!("{}", render_reading(reading, &format)?);
    }
    Ok(())
}

/// Takes `iterations` readings, sleeping `interval` between them.
pub fn collect_readings<R: CommandRunner>(
    sampler: &mut Sampler<R>,
    iterations: usize,
    interval: Duration,
    config: &Config,
) -> Vec<TelemetryReading> {
    let families = config.families();
    let mut readings = Vec::with_capacity(iterations);

    for iteration in 1..=iterations {
        if iteration > 1 {
            std::thread::sleep(interval);
        }
        debug!("Sampling iteration {}/{}", iteration, iterations);
        readings.push(sampler.sample(families));
    }

    readings
}

fn render_reading(
    reading: &TelemetryReading,
    format: &ReadingFormat,
) -> Result<String, Box<dyn std::error::Error>> {
    Ok(match format {
        ReadingFormat::Json => serde_json::to_string(reading)?,
        ReadingFormat::Yaml => format!("---\n{}", serde_yaml::to_string(reading)?),
    })
}
