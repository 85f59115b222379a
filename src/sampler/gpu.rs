//! GPU utilization probes.
//!
//! There is no common kernel interface for GPU load, so the sampler walks an
//! ordered list of vendor sysfs nodes and takes the first one that answers:
//!
//! 1. Adreno `gpu_busy_percentage`: instantaneous percent, may end in `%`.
//! 2. Adreno `gpubusy`: two cumulative counters, `busy_cycles total_cycles`.
//! 3. Mali `utilization`: either 0-100 or a raw 0-255 byte.
//! 4. Generic `gpu_busy`: plain percent, may end in `%`.

use serde::Serialize;
use std::fmt;
use tracing::debug;

use crate::error::SampleError;
use crate::runner::CommandOutput;

pub const ADRENO_PERCENTAGE_PATH: &str = "/sys/class/kgsl/kgsl-3d0/gpu_busy_percentage";
pub const ADRENO_BUSY_PATH: &str = "/sys/class/kgsl/kgsl-3d0/gpubusy";
pub const MALI_UTILIZATION_PATH: &str = "/sys/class/misc/mali0/device/utilization";
pub const GENERIC_BUSY_PATH: &str = "/sys/kernel/gpu/gpu_busy";

/// Full scale of Mali raw utilization values.
const MALI_RAW_SCALE: i64 = 255;

/// Which sysfs layout produced a GPU reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GpuSource {
    AdrenoPercentage,
    AdrenoBusy,
    Mali,
    Generic,
}

impl GpuSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            GpuSource::AdrenoPercentage => "adreno_percentage",
            GpuSource::AdrenoBusy => "adreno_busy",
            GpuSource::Mali => "mali",
            GpuSource::Generic => "generic",
        }
    }
}

impl fmt::Display for GpuSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Baseline for the cumulative `gpubusy` counters.
///
/// `last_update_epoch_ms == 0` means never sampled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GpuCounterState {
    pub prev_usage: u64,
    pub prev_total: u64,
    pub last_update_epoch_ms: u64,
}

impl GpuCounterState {
    pub fn has_baseline(&self) -> bool {
        self.last_update_epoch_ms != 0
    }

    /// Feeds a `(busy, total)` counter pair taken at `now_ms`.
    ///
    /// First sample and a total below the baseline both re-baseline and yield
    /// 0. Otherwise returns `round(delta_busy / delta_total * 100)`, or 0 when
    /// no cycles elapsed.
    pub fn update(&mut self, busy: u64, total: u64, now_ms: u64) -> u8 {
        if !self.has_baseline() || total < self.prev_total {
            self.store(busy, total, now_ms);
            return 0;
        }

        let delta_usage = busy as i128 - self.prev_usage as i128;
        let delta_total = total - self.prev_total;
        self.store(busy, total, now_ms);

        // No new cycles recorded: treat as idle rather than holding the last value.
        if delta_total == 0 {
            return 0;
        }

        let percent = (delta_usage as f64 / delta_total as f64 * 100.0).round();
        percent.clamp(0.0, 100.0) as u8
    }

    fn store(&mut self, busy: u64, total: u64, now_ms: u64) {
        self.prev_usage = busy;
        self.prev_total = total;
        self.last_update_epoch_ms = now_ms.max(1);
    }
}

/// One GPU data source in the fallback chain.
///
/// `read` only sees output that succeeded and is non-empty. An `Err` means the
/// source is unusable for this call and the next probe is tried.
pub trait GpuProbe: Send + Sync {
    fn source(&self) -> GpuSource;

    fn command(&self) -> String;

    fn read(
        &self,
        output: &CommandOutput,
        state: &mut GpuCounterState,
        now_ms: u64,
    ) -> Result<u8, SampleError>;
}

/// Node holding a plain percentage, optionally `%`-suffixed.
pub struct BusyPercentage {
    source: GpuSource,
    path: &'static str,
}

impl BusyPercentage {
    pub fn adreno() -> Self {
        Self {
            source: GpuSource::AdrenoPercentage,
            path: ADRENO_PERCENTAGE_PATH,
        }
    }

    pub fn generic() -> Self {
        Self {
            source: GpuSource::Generic,
            path: GENERIC_BUSY_PATH,
        }
    }
}

impl GpuProbe for BusyPercentage {
    fn source(&self) -> GpuSource {
        self.source
    }

    fn command(&self) -> String {
        format!("cat {}", self.path)
    }

    fn read(
        &self,
        output: &CommandOutput,
        _state: &mut GpuCounterState,
        _now_ms: u64,
    ) -> Result<u8, SampleError> {
        let value = parse_percent_text(first_line(output, self.path)?)?;
        Ok(clamp_percent(value))
    }
}

/// Adreno `gpubusy` cumulative busy/total cycle counters.
pub struct BusyCounters {
    path: &'static str,
}

impl BusyCounters {
    pub fn adreno() -> Self {
        Self {
            path: ADRENO_BUSY_PATH,
        }
    }
}

impl GpuProbe for BusyCounters {
    fn source(&self) -> GpuSource {
        GpuSource::AdrenoBusy
    }

    fn command(&self) -> String {
        format!("cat {}", self.path)
    }

    fn read(
        &self,
        output: &CommandOutput,
        state: &mut GpuCounterState,
        now_ms: u64,
    ) -> Result<u8, SampleError> {
        let (busy, total) = parse_counter_pair(first_line(output, self.path)?)?;
        Ok(state.update(busy, total, now_ms))
    }
}

/// Mali `utilization`, either percent or a raw 0-255 value.
///
/// Unparsable output reads as 0 instead of falling through.
pub struct MaliUtilization {
    path: &'static str,
}

impl MaliUtilization {
    pub fn new() -> Self {
        Self {
            path: MALI_UTILIZATION_PATH,
        }
    }
}

impl Default for MaliUtilization {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuProbe for MaliUtilization {
    fn source(&self) -> GpuSource {
        GpuSource::Mali
    }

    fn command(&self) -> String {
        format!("cat {}", self.path)
    }

    fn read(
        &self,
        output: &CommandOutput,
        _state: &mut GpuCounterState,
        _now_ms: u64,
    ) -> Result<u8, SampleError> {
        // The node answered, so garbage ends the chain as idle.
        let line = output.first_line().unwrap_or_default();
        match line.parse::<i64>() {
            Ok(value) => Ok(scale_mali(value)),
            Err(e) => {
                debug!("Unparsable mali utilization {:?}: {}", line, e);
                Ok(0)
            }
        }
    }
}

/// Probes in priority order.
pub fn default_probes() -> Vec<Box<dyn GpuProbe>> {
    vec![
        Box::new(BusyPercentage::adreno()),
        Box::new(BusyCounters::adreno()),
        Box::new(MaliUtilization::new()),
        Box::new(BusyPercentage::generic()),
    ]
}

fn first_line<'a>(output: &'a CommandOutput, path: &str) -> Result<&'a str, SampleError> {
    output
        .first_line()
        .filter(|l| !l.is_empty())
        .ok_or_else(|| SampleError::missing(path, "empty first line"))
}

/// `"42"`, `"42%"`, `"42 %"` -> 42
pub fn parse_percent_text(text: &str) -> Result<i64, SampleError> {
    let cleaned = text.replace('%', "");
    let cleaned = cleaned.trim();
    cleaned
        .parse::<i64>()
        .map_err(|e| SampleError::parse("gpu percentage", format!("{cleaned:?}: {e}")))
}

/// `"1234 5678"` -> (1234, 5678)
pub fn parse_counter_pair(text: &str) -> Result<(u64, u64), SampleError> {
    let parts: Vec<&str> = text.split_whitespace().collect();
    if parts.len() < 2 {
        return Err(SampleError::parse(
            "gpubusy",
            format!("expected 2 counters, got {}", parts.len()),
        ));
    }
    let busy = parts[0]
        .parse::<u64>()
        .map_err(|e| SampleError::parse("gpubusy busy", format!("{:?}: {}", parts[0], e)))?;
    let total = parts[1]
        .parse::<u64>()
        .map_err(|e| SampleError::parse("gpubusy total", format!("{:?}: {}", parts[1], e)))?;
    Ok((busy, total))
}

/// Values above 100 are treated as raw 0-255 utilization.
pub fn scale_mali(value: i64) -> u8 {
    if value > 100 {
        clamp_percent(value.saturating_mul(100) / MALI_RAW_SCALE)
    } else {
        clamp_percent(value)
    }
}

fn clamp_percent(value: i64) -> u8 {
    value.clamp(0, 100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn out(line: &str) -> CommandOutput {
        CommandOutput::ok([line])
    }

    #[test]
    fn test_parse_percent_text() {
        assert_eq!(parse_percent_text("42").unwrap(), 42);
        assert_eq!(parse_percent_text("42%").unwrap(), 42);
        assert_eq!(parse_percent_text(" 7 % ").unwrap(), 7);
        assert!(parse_percent_text("busy").is_err());
    }

    #[test]
    fn test_busy_percentage_clamps() {
        let probe = BusyPercentage::adreno();
        let mut state = GpuCounterState::default();
        assert_eq!(probe.read(&out("150"), &mut state, 1).unwrap(), 100);
        assert_eq!(probe.read(&out("-3 %"), &mut state, 1).unwrap(), 0);
        assert_eq!(probe.read(&out("63 %"), &mut state, 1).unwrap(), 63);
        assert_eq!(state, GpuCounterState::default());
    }

    #[test]
    fn test_mali_scaling() {
        assert_eq!(scale_mali(200), 78);
        assert_eq!(scale_mali(255), 100);
        assert_eq!(scale_mali(100), 100);
        assert_eq!(scale_mali(101), 39);
        assert_eq!(scale_mali(45), 45);
        assert_eq!(scale_mali(-1), 0);
        assert_eq!(scale_mali(10_000), 100);
    }

    #[test]
    fn test_mali_garbage_reads_as_idle() {
        let probe = MaliUtilization::new();
        let mut state = GpuCounterState::default();
        assert_eq!(probe.read(&out("n/a"), &mut state, 1).unwrap(), 0);
        assert_eq!(probe.read(&out("200"), &mut state, 1).unwrap(), 78);
    }

    #[test]
    fn test_counter_pair_parsing() {
        assert_eq!(parse_counter_pair("1234 5678").unwrap(), (1234, 5678));
        assert_eq!(parse_counter_pair("  0   0  ").unwrap(), (0, 0));
        assert!(parse_counter_pair("1234").is_err());
        assert!(parse_counter_pair("a 5678").is_err());
    }

    #[test]
    fn test_busy_counters_first_sample_is_baseline() {
        let mut state = GpuCounterState::default();
        assert_eq!(state.update(500, 1000, 1_700_000_000_000), 0);
        assert!(state.has_baseline());
        assert_eq!(state.prev_usage, 500);
        assert_eq!(state.prev_total, 1000);

        // Same counters again: no new cycles.
        assert_eq!(state.update(500, 1000, 1_700_000_001_000), 0);
    }

    #[test]
    fn test_busy_counters_delta_rounds() {
        let mut state = GpuCounterState::default();
        state.update(0, 0, 10);
        // 2 of 3 cycles busy = 66.67% -> 67
        assert_eq!(state.update(2, 3, 20), 67);
        // 1 of 3 cycles busy = 33.33% -> 33
        assert_eq!(state.update(3, 6, 30), 33);
        assert_eq!(state.last_update_epoch_ms, 30);
    }

    #[test]
    fn test_busy_counters_reset() {
        let mut state = GpuCounterState::default();
        state.update(900, 1000, 10);
        assert_eq!(state.update(10, 20, 20), 0);
        assert_eq!(state.prev_total, 20);
        assert_eq!(state.update(20, 30, 30), 100);
    }

    #[test]
    fn test_busy_counters_busy_going_backwards_is_clamped() {
        let mut state = GpuCounterState::default();
        state.update(900, 1000, 10);
        assert_eq!(state.update(100, 2000, 20), 0);
    }

    #[test]
    fn test_zero_timestamp_still_marks_baseline() {
        let mut state = GpuCounterState::default();
        state.update(1, 2, 0);
        assert!(state.has_baseline());
    }

    #[test]
    fn test_default_probe_order() {
        let commands: Vec<String> = default_probes().iter().map(|p| p.command()).collect();
        assert_eq!(
            commands,
            vec![
                "cat /sys/class/kgsl/kgsl-3d0/gpu_busy_percentage",
                "cat /sys/class/kgsl/kgsl-3d0/gpubusy",
                "cat /sys/class/misc/mali0/device/utilization",
                "cat /sys/kernel/gpu/gpu_busy",
            ]
        );
    }
}
