//! Prometheus metrics definitions for herakles-hw-telemetry.
//!
//! This module defines the gauges that mirror the latest telemetry reading.

use herakles_hw_telemetry::{GpuSource, TelemetryReading};
use prometheus::{Gauge, GaugeVec, Opts, Registry};

/// Collection of Prometheus metrics for hardware telemetry.
#[derive(Clone)]
pub struct TelemetryMetrics {
    pub cpu_usage: Gauge,
    pub gpu_usage: Gauge,
    /// 1 for the GPU source that answered the last poll, 0 for the others.
    pub gpu_source: GaugeVec,

    pub ram_total: Gauge,
    pub ram_used: Gauge,
    pub swap_total: Gauge,
    pub swap_used: Gauge,
    pub zram_total: Gauge,
    pub zram_used: Gauge,

    // Poller self-metrics
    pub poll_duration: Gauge,
    pub poll_success: Gauge,
    pub last_poll_timestamp: Gauge,
}

const GPU_SOURCES: [GpuSource; 4] = [
    GpuSource::AdrenoPercentage,
    GpuSource::AdrenoBusy,
    GpuSource::Mali,
    GpuSource::Generic,
];

impl TelemetryMetrics {
    /// Creates and registers all Prometheus metrics with the registry.
    pub fn new(registry: &Registry) -> Result<Self, Box<dyn std::error::Error>> {
        let cpu_usage = Gauge::new(
            "herakles_hw_cpu_usage_percent",
            "Aggregate CPU usage in percent (delta over last poll)",
        )?;
        let gpu_usage = Gauge::new(
            "herakles_hw_gpu_usage_percent",
            "GPU busy in percent from the first available source",
        )?;
        let gpu_source = GaugeVec::new(
            Opts::new(
                "herakles_hw_gpu_source_info",
                "GPU utilization source that answered the last poll (1) or not (0)",
            ),
            &["source"],
        )?;

        let ram_total = Gauge::new("herakles_hw_ram_total_bytes", "Total RAM in bytes")?;
        let ram_used = Gauge::new("herakles_hw_ram_used_bytes", "Used RAM in bytes")?;
        let swap_total = Gauge::new(
            "herakles_hw_swap_total_bytes",
            "Total size of non-zram swap areas in bytes",
        )?;
        let swap_used = Gauge::new(
            "herakles_hw_swap_used_bytes",
            "Used space of non-zram swap areas in bytes",
        )?;
        let zram_total = Gauge::new(
            "herakles_hw_zram_total_bytes",
            "Total size of zram swap devices in bytes",
        )?;
        let zram_used = Gauge::new(
            "herakles_hw_zram_used_bytes",
            "Used space of zram swap devices in bytes",
        )?;

        let poll_duration = Gauge::new(
            "herakles_hw_poll_duration_seconds",
            "Time spent on the last sampler poll",
        )?;
        let poll_success = Gauge::new(
            "herakles_hw_poll_success",
            "Whether the last poll completed (1) or failed (0)",
        )?;
        let last_poll_timestamp = Gauge::new(
            "herakles_hw_last_poll_timestamp_seconds",
            "Unix timestamp of the last completed poll",
        )?;

        registry.register(Box::new(cpu_usage.clone()))?;
        registry.register(Box::new(gpu_usage.clone()))?;
        registry.register(Box::new(gpu_source.clone()))?;

        registry.register(Box::new(ram_total.clone()))?;
        registry.register(Box::new(ram_used.clone()))?;
        registry.register(Box::new(swap_total.clone()))?;
        registry.register(Box::new(swap_used.clone()))?;
        registry.register(Box::new(zram_total.clone()))?;
        registry.register(Box::new(zram_used.clone()))?;

        registry.register(Box::new(poll_duration.clone()))?;
        registry.register(Box::new(poll_success.clone()))?;
        registry.register(Box::new(last_poll_timestamp.clone()))?;

        Ok(Self {
            cpu_usage,
            gpu_usage,
            gpu_source,
            ram_total,
            ram_used,
            swap_total,
            swap_used,
            zram_total,
            zram_used,
            poll_duration,
            poll_success,
            last_poll_timestamp,
        })
    }

    /// Copies a reading into the gauges. Disabled families keep their last value.
    pub fn observe(&self, reading: &TelemetryReading) {
        if let Some(cpu) = reading.cpu_percent {
            self.cpu_usage.set(cpu as f64);
        }

        if let Some(gpu) = reading.gpu {
            self.gpu_usage.set(gpu.percent as f64);
            for source in GPU_SOURCES {
                let active = if gpu.source == Some(source) { 1.0 } else { 0.0 };
                self.gpu_source.with_label_values(&[source.as_str()]).set(active);
            }
        }

        if let Some(mem) = reading.memory {
            self.ram_total.set(mem.ram_total as f64);
            self.ram_used.set(mem.ram_used as f64);
            self.swap_total.set(mem.swap_total as f64);
            self.swap_used.set(mem.swap_used as f64);
            self.zram_total.set(mem.zram_total as f64);
            self.zram_used.set(mem.zram_used as f64);
        }

        self.last_poll_timestamp
            .set(reading.timestamp.timestamp_millis() as f64 / 1000.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use herakles_hw_telemetry::{GpuReading, MemorySnapshot};

    #[test]
    fn test_observe_sets_gauges() {
        let registry = Registry::new();
        let metrics = TelemetryMetrics::new(&registry).unwrap();

        metrics.observe(&TelemetryReading {
            timestamp: Utc::now(),
            cpu_percent: Some(57),
            gpu: Some(GpuReading {
                percent: 78,
                source: Some(GpuSource::Mali),
            }),
            memory: Some(MemorySnapshot {
                zram_total: 536870912,
                ..MemorySnapshot::default()
            }),
        });

        assert_eq!(metrics.cpu_usage.get(), 57.0);
        assert_eq!(metrics.gpu_usage.get(), 78.0);
        assert_eq!(metrics.gpu_source.with_label_values(&["mali"]).get(), 1.0);
        assert_eq!(metrics.gpu_source.with_label_values(&["generic"]).get(), 0.0);
        assert_eq!(metrics.zram_total.get(), 536870912.0);
        assert!(metrics.last_poll_timestamp.get() > 0.0);
    }

    #[test]
    fn test_disabled_family_keeps_previous_value() {
        let registry = Registry::new();
        let metrics = TelemetryMetrics::new(&registry).unwrap();
        metrics.cpu_usage.set(12.0);

        metrics.observe(&TelemetryReading {
            timestamp: Utc::now(),
            cpu_percent: None,
            gpu: None,
            memory: None,
        });
        assert_eq!(metrics.cpu_usage.get(), 12.0);
    }
}
