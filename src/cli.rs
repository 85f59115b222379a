//! CLI arguments and subcommands for herakles-hw-telemetry.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use std::net::IpAddr;
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Output format for sampled readings
#[derive(Debug, Clone, ValueEnum)]
pub enum ReadingFormat {
    Yaml,
    Json,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "herakles-hw-telemetry",
    about = "Prometheus exporter for CPU/GPU utilization and RAM/swap/zram usage",
    long_about = "Prometheus exporter for CPU/GPU utilization and RAM/swap/zram usage.\n\n\
                  Samples /proc/stat, vendor GPU sysfs nodes (Adreno, Mali, generic), \
                  free -b and /proc/swaps through a privileged shell and exports \
                  normalized readings.",
    author = "Michael Moll <proc-mem@herakles.io> - Herakles IO",
    version = "0.1.0",
    propagate_version = true,
    after_help = "Project: https://github.com/herakles-io/herakles-hw-telemetry — More info: https://www.herakles.io — Support: proc-mem@herakles.io"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// HTTP listen port
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Bind to specific interface/IP
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Log level (overrides config file, default: info)
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Poll the sampler every N seconds
    #[arg(long)]
    pub poll_interval: Option<u64>,

    /// Per-command timeout in milliseconds
    #[arg(long)]
    pub command_timeout_ms: Option<u64>,

    /// Run commands with plain `sh -c` instead of `su -c`
    #[arg(long)]
    pub no_root: bool,

    /// su binary used for privileged reads
    #[arg(long)]
    pub su_binary: Option<String>,

    /// Disable /health endpoint
    #[arg(long)]
    pub disable_health: bool,

    /// Skip CPU sampling
    #[arg(long)]
    pub disable_cpu: bool,

    /// Skip GPU sampling
    #[arg(long)]
    pub disable_gpu: bool,

    /// Skip RAM/swap/zram sampling
    #[arg(long)]
    pub disable_memory: bool,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check which telemetry sources are readable on this device
    Check {
        /// Check /proc/stat
        #[arg(long)]
        cpu: bool,

        /// Check GPU sysfs sources
        #[arg(long)]
        gpu: bool,

        /// Check free -b and /proc/swaps
        #[arg(long)]
        memory: bool,

        /// Check everything
        #[arg(long)]
        all: bool,
    },

    /// Generate configuration files
    Config {
        /// Output file path ("-" for stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },

    /// Sample telemetry and print readings
    Sample {
        /// Number of samples
        #[arg(short = 'n', long, default_value_t = 2)]
        iterations: usize,

        /// Delay between samples in milliseconds
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ReadingFormat,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sample_subcommand() {
        let args = Args::parse_from([
            "herakles-hw-telemetry",
            "--no-root",
            "sample",
            "-n",
            "5",
            "--format",
            "json",
        ]);
        assert!(args.no_root);
        match args.command {
            Some(Commands::Sample {
                iterations,
                interval_ms,
                format,
            }) => {
                assert_eq!(iterations, 5);
                assert_eq!(interval_ms, 1000);
                assert!(matches!(format, ReadingFormat::Json));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_server_mode_flags() {
        let args = Args::parse_from([
            "herakles-hw-telemetry",
            "-p",
            "9300",
            "--poll-interval",
            "5",
            "--disable-gpu",
        ]);
        assert!(args.command.is_none());
        assert_eq!(args.port, Some(9300));
        assert_eq!(args.poll_interval, Some(5));
        assert!(args.disable_gpu);
        assert!(!args.disable_cpu);
    }
}
