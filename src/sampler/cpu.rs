//! Aggregate CPU utilization from `/proc/stat` tick counters.
//!
//! The first line of `/proc/stat` carries cumulative ticks since boot:
//! `cpu  user nice system idle iowait irq softirq steal guest guest_nice`.
//! Usage over a polling interval is the share of non-idle ticks in the delta
//! between two samples.

use serde::Serialize;

use crate::error::SampleError;

/// Command producing the tick counters.
pub const PROC_STAT_COMMAND: &str = "cat /proc/stat";

/// Label of the aggregate line, including the separating space so per-core
/// lines (`cpu0`, `cpu1`, ...) never match.
const AGGREGATE_PREFIX: &str = "cpu ";

/// Label plus the seven counters we sum.
const MIN_TOKENS: usize = 8;

const FIELD_NAMES: [&str; 7] = ["user", "nice", "system", "idle", "iowait", "irq", "softirq"];

/// Tick totals extracted from one aggregate line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuTicks {
    /// user + nice + system + idle + iowait + irq + softirq
    pub total: u64,
    /// idle + iowait
    pub idle: u64,
}

impl CpuTicks {
    /// Parses an aggregate `cpu ` line.
    pub fn parse_line(line: &str) -> Result<Self, SampleError> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < MIN_TOKENS {
            return Err(SampleError::parse(
                "cpu line",
                format!("expected at least {} fields, got {}", MIN_TOKENS, parts.len()),
            ));
        }

        let mut fields = [0u64; 7];
        for (i, name) in FIELD_NAMES.into_iter().enumerate() {
            fields[i] = parts[i + 1]
                .parse::<u64>()
                .map_err(|e| SampleError::parse(name, format!("{:?}: {}", parts[i + 1], e)))?;
        }

        let total = fields
            .iter()
            .try_fold(0u64, |acc, v| acc.checked_add(*v))
            .ok_or_else(|| SampleError::parse("cpu line", "tick total overflows u64"))?;
        let idle = fields[3]
            .checked_add(fields[4])
            .ok_or_else(|| SampleError::parse("cpu line", "idle total overflows u64"))?;

        Ok(Self { total, idle })
    }
}

/// Finds the aggregate line among `/proc/stat` output.
pub fn find_aggregate_line<S: AsRef<str>>(lines: &[S]) -> Option<&str> {
    lines
        .iter()
        .map(|l| l.as_ref())
        .find(|l| l.starts_with(AGGREGATE_PREFIX))
}

/// Baseline of the previous CPU sample.
///
/// `prev_total_ticks == 0` means no baseline has been taken yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CpuCounterState {
    pub prev_total_ticks: u64,
    pub prev_idle_ticks: u64,
}

impl CpuCounterState {
    pub fn has_baseline(&self) -> bool {
        self.prev_total_ticks != 0
    }

    /// Feeds a new sample and returns usage in percent.
    ///
    /// The first sample only records the baseline and yields 0. A total below
    /// the stored baseline (reboot, wrap) re-baselines and yields
    /// [`SampleError::CounterReset`]. The baseline always ends up equal to
    /// `ticks`.
    pub fn update(&mut self, ticks: CpuTicks) -> Result<u8, SampleError> {
        if !self.has_baseline() {
            self.store(ticks);
            return Ok(0);
        }
        if ticks.total < self.prev_total_ticks {
            let previous = self.prev_total_ticks;
            self.store(ticks);
            return Err(SampleError::CounterReset {
                previous,
                current: ticks.total,
            });
        }

        let delta_total = ticks.total - self.prev_total_ticks;
        let delta_idle = ticks.idle as i128 - self.prev_idle_ticks as i128;
        self.store(ticks);

        if delta_total == 0 {
            return Ok(0);
        }

        let busy = delta_total as i128 - delta_idle;
        let usage = busy * 100 / delta_total as i128;
        Ok(usage.clamp(0, 100) as u8)
    }

    fn store(&mut self, ticks: CpuTicks) {
        self.prev_total_ticks = ticks.total;
        self.prev_idle_ticks = ticks.idle;
    }
}
