//! Hardware telemetry sampling for rooted Android and embedded Linux.
//!
//! The [`Sampler`] turns raw kernel and sysfs counters into normalized
//! readings: CPU and GPU utilization in percent, RAM, swap file and zram
//! usage in bytes. Raw data always comes from shell commands run through a
//! [`CommandRunner`], so the parsing and differential logic can be driven by
//! a [`ScriptedRunner`] in tests.

pub mod error;
pub mod runner;
pub mod sampler;

pub use error::SampleError;
pub use runner::{CommandOutput, CommandRunner, ScriptedRunner, ShellRunner};
pub use sampler::{
    CpuCounterState, GpuCounterState, GpuReading, GpuSource, MemorySnapshot, MetricFamilies,
    Sampler, SourceStatus, TelemetryReading,
};
