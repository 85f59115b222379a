//! Failure classes of a single telemetry read.
//!
//! None of these ever leave the sampler: each sampling operation logs the
//! error and falls back to a zero reading.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SampleError {
    /// Runner reported failure (spawn error, non-zero exit or timeout).
    #[error("command `{0}` failed")]
    CommandFailed(String),

    /// Command succeeded but the expected line was not present.
    #[error("no usable output from `{command}`: {detail}")]
    MissingOutput { command: String, detail: String },

    /// A token could not be parsed or the line had too few fields.
    #[error("failed to parse {field}: {reason}")]
    Parse { field: &'static str, reason: String },

    /// New cumulative value is below the stored baseline.
    #[error("counter reset detected ({previous} -> {current})")]
    CounterReset { previous: u64, current: u64 },
}

impl SampleError {
    pub(crate) fn missing(command: &str, detail: impl Into<String>) -> Self {
        SampleError::MissingOutput {
            command: command.to_string(),
            detail: detail.into(),
        }
    }

    pub(crate) fn parse(field: &'static str, reason: impl std::fmt::Display) -> Self {
        SampleError::Parse {
            field,
            reason: reason.to_string(),
        }
    }
}
