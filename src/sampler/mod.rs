//! Stateful hardware telemetry sampler.
//!
//! A [`Sampler`] owns the counter baselines for CPU and GPU differential
//! readings and pulls all raw data through an injected [`CommandRunner`].
//! Every operation is best effort: failures are logged and turned into a
//! zero reading, nothing is returned to the caller as an error.
//!
//! Operations block on shell execution. Async callers should run them on a
//! blocking thread (`tokio::task::spawn_blocking`). One sampler is meant to
//! be driven by a single poller; `&mut self` enforces that at compile time.

pub mod cpu;
pub mod gpu;
pub mod memory;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::SampleError;
use crate::runner::CommandRunner;

pub use cpu::{CpuCounterState, CpuTicks, PROC_STAT_COMMAND};
pub use gpu::{default_probes, GpuCounterState, GpuProbe, GpuSource};
pub use memory::{MemorySnapshot, SwapEntry, FREE_COMMAND, PROC_SWAPS_COMMAND};

/// Result of the GPU fallback chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GpuReading {
    pub percent: u8,
    /// Probe that answered; `None` when every source failed.
    pub source: Option<GpuSource>,
}

/// Which metric families a full sample should read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricFamilies {
    pub cpu: bool,
    pub gpu: bool,
    pub memory: bool,
}

impl Default for MetricFamilies {
    fn default() -> Self {
        Self {
            cpu: true,
            gpu: true,
            memory: true,
        }
    }
}

/// One poll of every enabled family.
#[derive(Debug, Clone, Serialize)]
pub struct TelemetryReading {
    pub timestamp: DateTime<Utc>,
    pub cpu_percent: Option<u8>,
    pub gpu: Option<GpuReading>,
    pub memory: Option<MemorySnapshot>,
}

/// Availability of a single raw source, reported by [`Sampler::probe_sources`].
#[derive(Debug, Clone, Serialize)]
pub struct SourceStatus {
    pub command: String,
    pub available: bool,
    /// First output line, if any.
    pub sample: Option<String>,
}

pub struct Sampler<R: CommandRunner> {
    runner: R,
    cpu: CpuCounterState,
    gpu: GpuCounterState,
    gpu_probes: Vec<Box<dyn GpuProbe>>,
}

impl<R: CommandRunner> Sampler<R> {
    /// Sampler with zeroed baselines and the standard GPU probe order.
    pub fn new(runner: R) -> Self {
        Self::with_gpu_probes(runner, default_probes())
    }

    pub fn with_gpu_probes(runner: R, gpu_probes: Vec<Box<dyn GpuProbe>>) -> Self {
        Self {
            runner,
            cpu: CpuCounterState::default(),
            gpu: GpuCounterState::default(),
            gpu_probes,
        }
    }

    pub fn cpu_state(&self) -> CpuCounterState {
        self.cpu
    }

    pub fn gpu_state(&self) -> GpuCounterState {
        self.gpu
    }

    /// Aggregate CPU usage in percent since the previous call.
    ///
    /// Returns 0 on the first call, after a counter reset, and whenever
    /// `/proc/stat` cannot be read or parsed. A failed read leaves the
    /// baseline untouched.
    pub fn cpu_usage(&mut self) -> u8 {
        match self.try_cpu_usage() {
            Ok(usage) => usage,
            Err(e @ SampleError::CounterReset { .. }) => {
                debug!("CPU baseline reset: {}", e);
                0
            }
            Err(e) => {
                warn!("Error reading CPU usage: {}", e);
                0
            }
        }
    }

    fn try_cpu_usage(&mut self) -> Result<u8, SampleError> {
        let output = self.runner.run(PROC_STAT_COMMAND);
        if !output.has_output() {
            return Err(SampleError::CommandFailed(PROC_STAT_COMMAND.to_string()));
        }
        let line = cpu::find_aggregate_line(&output.lines)
            .ok_or_else(|| SampleError::missing(PROC_STAT_COMMAND, "no aggregate cpu line"))?;
        let ticks = CpuTicks::parse_line(line)?;
        self.cpu.update(ticks)
    }

    /// GPU usage in percent from the first source that answers, 0 if none do.
    pub fn gpu_usage(&mut self) -> u8 {
        self.gpu_reading().percent
    }

    /// GPU usage together with the source that produced it.
    pub fn gpu_reading(&mut self) -> GpuReading {
        let now_ms = now_epoch_ms();

        for probe in &self.gpu_probes {
            let command = probe.command();
            let output = self.runner.run(&command);
            if !output.has_output() {
                debug!("GPU source {} unavailable: `{}` failed", probe.source(), command);
                continue;
            }

            match probe.read(&output, &mut self.gpu, now_ms) {
                Ok(percent) => {
                    debug!("GPU usage {}% from {}", percent, probe.source());
                    return GpuReading {
                        percent,
                        source: Some(probe.source()),
                    };
                }
                Err(e) => {
                    debug!("GPU source {} unusable: {}", probe.source(), e);
                }
            }
        }

        debug!("No GPU utilization source available");
        GpuReading::default()
    }

    /// RAM, swap file and zram usage.
    ///
    /// RAM and swap areas are read independently; a failure in one leaves its
    /// fields at zero without discarding what the other produced.
    pub fn memory_info(&self) -> MemorySnapshot {
        let mut snapshot = MemorySnapshot::default();

        match self.read_ram() {
            Ok((total, used)) => {
                snapshot.ram_total = total;
                snapshot.ram_used = used;
            }
            Err(e) => warn!("Error reading RAM info: {}", e),
        }

        if let Err(e) = self.read_swaps(&mut snapshot) {
            warn!("Error reading swap info: {}", e);
        }

        snapshot
    }

    fn read_ram(&self) -> Result<(u64, u64), SampleError> {
        let output = self.runner.run(FREE_COMMAND);
        if !output.success {
            return Err(SampleError::CommandFailed(FREE_COMMAND.to_string()));
        }
        memory::parse_free(&output.lines)
    }

    /// Accumulates into `snapshot` as it goes, so rows before a bad one count.
    fn read_swaps(&self, snapshot: &mut MemorySnapshot) -> Result<(), SampleError> {
        let output = self.runner.run(PROC_SWAPS_COMMAND);
        if !output.success {
            return Err(SampleError::CommandFailed(PROC_SWAPS_COMMAND.to_string()));
        }

        let mut first_error = None;
        for line in &output.lines {
            match SwapEntry::parse_line(line) {
                Ok(Some(entry)) => snapshot.add_swap(&entry),
                Ok(None) => {}
                Err(e) => {
                    debug!("Skipping swaps row {:?}: {}", line, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Reads every enabled family once.
    pub fn sample(&mut self, families: MetricFamilies) -> TelemetryReading {
        let cpu_percent = families.cpu.then(|| self.cpu_usage());
        let gpu = families.gpu.then(|| self.gpu_reading());
        let memory = families.memory.then(|| self.memory_info());

        TelemetryReading {
            timestamp: Utc::now(),
            cpu_percent,
            gpu,
            memory,
        }
    }

    /// Runs every raw source command once without touching counter state.
    pub fn probe_sources(&self) -> Vec<SourceStatus> {
        let mut commands = vec![PROC_STAT_COMMAND.to_string()];
        commands.extend(self.gpu_probes.iter().map(|p| p.command()));
        commands.push(FREE_COMMAND.to_string());
        commands.push(PROC_SWAPS_COMMAND.to_string());

        commands
            .into_iter()
            .map(|command| {
                let output = self.runner.run(&command);
                SourceStatus {
                    available: output.has_output(),
                    sample: output.first_line().map(str::to_string),
                    command,
                }
            })
            .collect()
    }
}

fn now_epoch_ms() -> u64 {
    Utc::now().timestamp_millis().max(1) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{CommandOutput, ScriptedRunner};

    const ADRENO_PCT: &str = "cat /sys/class/kgsl/kgsl-3d0/gpu_busy_percentage";
    const ADRENO_BUSY: &str = "cat /sys/class/kgsl/kgsl-3d0/gpubusy";
    const MALI: &str = "cat /sys/class/misc/mali0/device/utilization";
    const GENERIC: &str = "cat /sys/kernel/gpu/gpu_busy";

    #[test]
    fn test_cpu_failure_keeps_baseline() {
        let runner = ScriptedRunner::new();
        runner
            .respond_lines(PROC_STAT_COMMAND, ["cpu 100 0 50 800 20 5 5 0"])
            .fail(PROC_STAT_COMMAND)
            .respond_lines(PROC_STAT_COMMAND, ["cpu 150 0 70 850 30 10 10 0"]);
        let mut sampler = Sampler::new(&runner);

        assert_eq!(sampler.cpu_usage(), 0);
        let baseline = sampler.cpu_state();
        assert_eq!(sampler.cpu_usage(), 0);
        assert_eq!(sampler.cpu_state(), baseline);
        assert_eq!(sampler.cpu_usage(), 57);
    }

    #[test]
    fn test_cpu_missing_aggregate_line() {
        let runner = ScriptedRunner::new();
        runner.respond_lines(PROC_STAT_COMMAND, ["cpu0 1 2 3 4 5 6 7 8", "intr 1"]);
        let mut sampler = Sampler::new(&runner);
        assert_eq!(sampler.cpu_usage(), 0);
        assert!(!sampler.cpu_state().has_baseline());
    }

    #[test]
    fn test_gpu_stops_at_first_source() {
        let runner = ScriptedRunner::new();
        runner.respond_lines(ADRENO_PCT, ["37 %"]);
        let mut sampler = Sampler::new(&runner);

        let reading = sampler.gpu_reading();
        assert_eq!(reading.percent, 37);
        assert_eq!(reading.source, Some(GpuSource::AdrenoPercentage));
        assert_eq!(runner.calls(), vec![ADRENO_PCT]);
    }

    #[test]
    fn test_gpu_cumulative_baseline_then_delta() {
        let runner = ScriptedRunner::new();
        runner
            .respond_lines(ADRENO_BUSY, ["100 1000"])
            .respond_lines(ADRENO_BUSY, ["350 1500"]);
        let mut sampler = Sampler::new(&runner);

        assert_eq!(sampler.gpu_usage(), 0);
        assert!(sampler.gpu_state().has_baseline());
        assert_eq!(sampler.gpu_usage(), 50);
        assert_eq!(sampler.gpu_state().prev_total, 1500);
    }

    #[test]
    fn test_gpu_unparsable_mali_stops_the_chain() {
        let runner = ScriptedRunner::new();
        runner
            .respond_lines(MALI, ["n/a"])
            .respond_lines(GENERIC, ["90"]);
        let mut sampler = Sampler::new(&runner);

        let reading = sampler.gpu_reading();
        assert_eq!(reading.percent, 0);
        assert_eq!(reading.source, Some(GpuSource::Mali));
        assert_eq!(runner.calls(), vec![ADRENO_PCT, ADRENO_BUSY, MALI]);
    }

    #[test]
    fn test_custom_probe_order() {
        let runner = ScriptedRunner::new();
        runner
            .respond_lines(ADRENO_PCT, ["40"])
            .respond_lines(GENERIC, ["15%"]);
        let probes: Vec<Box<dyn GpuProbe>> = vec![
            Box::new(gpu::BusyPercentage::generic()),
            Box::new(gpu::BusyPercentage::adreno()),
        ];
        let mut sampler = Sampler::with_gpu_probes(&runner, probes);

        let reading = sampler.gpu_reading();
        assert_eq!(reading.percent, 15);
        assert_eq!(reading.source, Some(GpuSource::Generic));
        assert_eq!(runner.calls(), vec![GENERIC]);

        let statuses = sampler.probe_sources();
        assert_eq!(statuses.len(), 5);
        assert_eq!(statuses[1].command, GENERIC);
        assert_eq!(statuses[2].command, ADRENO_PCT);
    }

    #[test]
    fn test_gpu_empty_output_falls_through() {
        let runner = ScriptedRunner::new();
        runner
            .respond(ADRENO_PCT, CommandOutput::ok(Vec::<String>::new()))
            .respond_lines(MALI, ["200"]);
        let mut sampler = Sampler::new(&runner);
        assert_eq!(sampler.gpu_usage(), 78);
    }

    #[test]
    fn test_memory_partial_on_swaps_failure() {
        let runner = ScriptedRunner::new();
        runner.respond_lines(FREE_COMMAND, ["Mem: 1000 600 400 0 0 0"]);
        let sampler = Sampler::new(&runner);

        let snap = sampler.memory_info();
        assert_eq!(snap.ram_total, 1000);
        assert_eq!(snap.ram_used, 600);
        assert_eq!(snap.swap_total, 0);
        assert_eq!(snap.zram_total, 0);
    }

    #[test]
    fn test_memory_bad_swap_row_keeps_others() {
        let runner = ScriptedRunner::new();
        runner.respond_lines(
            PROC_SWAPS_COMMAND,
            [
                "Filename Type Size Used Priority",
                "/dev/block/zram0 partition 100 10 -2",
                "/data/swapfile file garbage 1 -1",
                "/data/swapfile2 file 200 20 -3",
            ],
        );
        let sampler = Sampler::new(&runner);

        let snap = sampler.memory_info();
        assert_eq!(snap.ram_total, 0);
        assert_eq!(snap.zram_total, 100 * 1024);
        assert_eq!(snap.swap_total, 200 * 1024);
        assert_eq!(snap.swap_used, 20 * 1024);
    }

    #[test]
    fn test_sample_respects_families() {
        let runner = ScriptedRunner::new();
        let mut sampler = Sampler::new(&runner);
        let reading = sampler.sample(MetricFamilies {
            cpu: true,
            gpu: false,
            memory: false,
        });
        assert_eq!(reading.cpu_percent, Some(0));
        assert!(reading.gpu.is_none());
        assert!(reading.memory.is_none());
        assert_eq!(runner.calls(), vec![PROC_STAT_COMMAND]);
    }

    #[test]
    fn test_probe_sources_does_not_touch_state() {
        let runner = ScriptedRunner::new();
        runner
            .respond_lines(PROC_STAT_COMMAND, ["cpu 1 2 3 4 5 6 7 8"])
            .respond_lines(ADRENO_BUSY, ["10 20"]);
        let sampler = Sampler::new(&runner);

        let statuses = sampler.probe_sources();
        assert_eq!(statuses.len(), 7);
        assert!(statuses[0].available);
        assert!(!statuses[1].available);
        assert_eq!(statuses[2].sample.as_deref(), Some("10 20"));
        assert!(!sampler.cpu_state().has_baseline());
        assert!(!sampler.gpu_state().has_baseline());
    }
}
