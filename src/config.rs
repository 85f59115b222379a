//! Configuration management.
//!
//! Precedence is CLI (if provided) > config file > defaults. Files may be
//! YAML (default), JSON or TOML, picked by extension.

use clap::ValueEnum;
use herakles_hw_telemetry::{MetricFamilies, ShellRunner};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::cli::{Args, ConfigFormat, LogLevel};

// Default configuration constants
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 9216;
pub const DEFAULT_POLL_INTERVAL: u64 = 2;
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 2000;
pub const DEFAULT_SU_BINARY: &str = "su";

const DEFAULT_CONFIG_PATHS: [&str; 6] = [
    "/etc/herakles/hw-telemetry.yaml",
    "/etc/herakles/hw-telemetry.yml",
    "/etc/herakles/hw-telemetry.json",
    "./herakles-hw-telemetry.yaml",
    "./herakles-hw-telemetry.yml",
    "./herakles-hw-telemetry.json",
];

/// Exporter configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    // Server configuration
    pub port: Option<u16>,
    pub bind: Option<String>,

    // Sampling
    #[serde(alias = "poll-interval-secs")]
    pub poll_interval_secs: Option<u64>,
    #[serde(alias = "command-timeout-ms")]
    pub command_timeout_ms: Option<u64>,

    // Privileged shell
    pub privileged: Option<bool>,
    #[serde(alias = "su-binary")]
    pub su_binary: Option<String>,

    // Feature flags
    pub enable_health: Option<bool>,

    // Metric families
    #[serde(alias = "enable-cpu")]
    pub enable_cpu: Option<bool>,
    #[serde(alias = "enable-gpu")]
    pub enable_gpu: Option<bool>,
    #[serde(alias = "enable-memory")]
    pub enable_memory: Option<bool>,

    // Logging
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: Some(DEFAULT_PORT),
            bind: Some(DEFAULT_BIND_ADDR.to_string()),
            poll_interval_secs: Some(DEFAULT_POLL_INTERVAL),
            command_timeout_ms: Some(DEFAULT_COMMAND_TIMEOUT_MS),
            privileged: Some(true),
            su_binary: Some(DEFAULT_SU_BINARY.to_string()),
            enable_health: Some(true),
            enable_cpu: Some(true),
            enable_gpu: Some(true),
            enable_memory: Some(true),
            log_level: Some("info".into()),
        }
    }
}

impl Config {
    pub fn families(&self) -> MetricFamilies {
        MetricFamilies {
            cpu: self.enable_cpu.unwrap_or(true),
            gpu: self.enable_gpu.unwrap_or(true),
            memory: self.enable_memory.unwrap_or(true),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.unwrap_or(DEFAULT_POLL_INTERVAL))
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms.unwrap_or(DEFAULT_COMMAND_TIMEOUT_MS))
    }

    /// Shell runner matching the privilege settings.
    pub fn shell_runner(&self) -> ShellRunner {
        ShellRunner::new(
            self.privileged.unwrap_or(true),
            self.su_binary.as_deref().unwrap_or(DEFAULT_SU_BINARY),
            self.command_timeout(),
        )
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let families = cfg.families();
    if !(families.cpu || families.gpu || families.memory) {
        return Err("At least one of enable_cpu/enable_gpu/enable_memory must be true".into());
    }

    if cfg.poll_interval_secs == Some(0) {
        return Err("poll_interval_secs must be greater than 0".into());
    }

    if cfg.command_timeout_ms == Some(0) {
        return Err("command_timeout_ms must be greater than 0".into());
    }

    if cfg.privileged.unwrap_or(true)
        && cfg
            .su_binary
            .as_deref()
            .map_or(false, |s| s.trim().is_empty())
    {
        return Err("su_binary must not be empty when privileged is true".into());
    }

    if let Some(level) = cfg.log_level.as_deref() {
        LogLevel::from_str(level, true).map_err(|_| {
            format!(
                "Invalid log_level '{}', expected off/error/warn/info/debug/trace",
                level
            )
        })?;
    }

    if let Some(bind) = cfg.bind.as_deref() {
        bind.parse::<std::net::IpAddr>()
            .map_err(|e| format!("Invalid bind address '{}': {}", bind, e))?;
    }

    Ok(())
}

/// Resolves configuration from CLI args, config file, and defaults
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(bind_ip) = args.bind {
        config.bind = Some(bind_ip.to_string());
    }
    if let Some(cli_port) = args.port {
        config.port = Some(cli_port);
    }
    if let Some(secs) = args.poll_interval {
        config.poll_interval_secs = Some(secs);
    }
    if let Some(ms) = args.command_timeout_ms {
        config.command_timeout_ms = Some(ms);
    }
    if let Some(su) = &args.su_binary {
        config.su_binary = Some(su.clone());
    }
    if args.no_root {
        config.privileged = Some(false);
    }

    if let Some(level) = &args.log_level {
        config.log_level = level
            .to_possible_value()
            .map(|v| v.get_name().to_string());
    }

    // Feature flags
    if args.disable_health {
        config.enable_health = Some(false);
    }
    if args.disable_cpu {
        config.enable_cpu = Some(false);
    }
    if args.disable_gpu {
        config.enable_gpu = Some(false);
    }
    if args.disable_memory {
        config.enable_memory = Some(false);
    }

    Ok(config)
}

/// Loads the given file, or the first default location that exists.
/// Missing files fall back to defaults; fields absent from a file keep their
/// default values.
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => match DEFAULT_CONFIG_PATHS.iter().find(|p| Path::new(p).exists()) {
            Some(p) => PathBuf::from(p),
            None => return Ok(Config::default()),
        },
    };

    if !path.exists() {
        return Ok(Config::default());
    }

    let content = fs::read_to_string(&path)?;

    let loaded: Config = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => {
            let config = serde_json::from_str(&content)?;
            info!("Loaded JSON configuration from: {}", path.display());
            config
        }
        Some("toml") => {
            let config = toml::from_str(&content)?;
            info!("Loaded TOML configuration from: {}", path.display());
            config
        }
        _ => {
            // Default to YAML
            let config = serde_yaml::from_str(&content)?;
            info!("Loaded YAML configuration from: {}", path.display());
            config
        }
    };

    Ok(merge_defaults(loaded))
}

fn merge_defaults(loaded: Config) -> Config {
    let d = Config::default();
    Config {
        port: loaded.port.or(d.port),
        bind: loaded.bind.or(d.bind),
        poll_interval_secs: loaded.poll_interval_secs.or(d.poll_interval_secs),
        command_timeout_ms: loaded.command_timeout_ms.or(d.command_timeout_ms),
        privileged: loaded.privileged.or(d.privileged),
        su_binary: loaded.su_binary.or(d.su_binary),
        enable_health: loaded.enable_health.or(d.enable_health),
        enable_cpu: loaded.enable_cpu.or(d.enable_cpu),
        enable_gpu: loaded.enable_gpu.or(d.enable_gpu),
        enable_memory: loaded.enable_memory.or(d.enable_memory),
        log_level: loaded.log_level.or(d.log_level),
    }
}

/// Serializes configuration in the requested format
pub fn render_config(
    config: &Config,
    format: &ConfigFormat,
) -> Result<String, Box<dyn std::error::Error>> {
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    })
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", render_config(config, &format)?);
    Ok(())
}

/// Adds comments to YAML configuration
pub fn add_config_comments(yaml: String) -> String {
    let comments = r#"# Herakles Hardware Telemetry Exporter Configuration
# ===================================================
#
# Server Configuration
# --------------------
# bind: "0.0.0.0"              # Bind IP (0.0.0.0 = all interfaces)
# port: 9216                   # HTTP port
#
# Sampling
# --------
# poll_interval_secs: 2        # Sample CPU/GPU/memory every N seconds
# command_timeout_ms: 2000     # Kill a shell read after N milliseconds
#
# Privileged Shell
# ----------------
# privileged: true             # Wrap reads in `su -c` unless already root
# su_binary: "su"              # su binary (name on PATH or absolute path)
#
# Feature Flags
# -------------
# enable_health: true          # Enable /health endpoint
#
# Metric Families
# ---------------
# enable_cpu: true             # /proc/stat aggregate CPU usage
# enable_gpu: true             # Adreno / Mali / generic GPU busy
# enable_memory: true          # free -b and /proc/swaps (swap file vs zram)
#
# Logging
# -------
# log_level: "info"            # off, error, warn, info, debug, trace
"#;

    format!("{comments}\n{yaml}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    fn write_temp(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_effective_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_all_families_disabled_is_invalid() {
        let cfg = Config {
            enable_cpu: Some(false),
            enable_gpu: Some(false),
            enable_memory: Some(false),
            ..Config::default()
        };
        assert!(validate_effective_config(&cfg).is_err());
    }

    #[test]
    fn test_zero_intervals_are_invalid() {
        let cfg = Config {
            poll_interval_secs: Some(0),
            ..Config::default()
        };
        assert!(validate_effective_config(&cfg).is_err());

        let cfg = Config {
            command_timeout_ms: Some(0),
            ..Config::default()
        };
        assert!(validate_effective_config(&cfg).is_err());
    }

    #[test]
    fn test_bad_bind_is_invalid() {
        let cfg = Config {
            bind: Some("not-an-ip".into()),
            ..Config::default()
        };
        assert!(validate_effective_config(&cfg).is_err());
    }

    #[test]
    fn test_bad_log_level_is_invalid() {
        let cfg = Config {
            log_level: Some("verbose".into()),
            ..Config::default()
        };
        assert!(validate_effective_config(&cfg).is_err());
    }

    #[test]
    fn test_load_yaml_merges_defaults() {
        let file = write_temp(".yaml", "port: 9400\nenable_gpu: false\n");
        let cfg = load_config(Some(file.path())).unwrap();
        assert_eq!(cfg.port, Some(9400));
        assert_eq!(cfg.enable_gpu, Some(false));
        assert_eq!(cfg.poll_interval_secs, Some(DEFAULT_POLL_INTERVAL));
        assert_eq!(cfg.su_binary.as_deref(), Some(DEFAULT_SU_BINARY));
    }

    #[test]
    fn test_load_json_and_toml() {
        let file = write_temp(".json", r#"{"poll_interval_secs": 10}"#);
        assert_eq!(
            load_config(Some(file.path())).unwrap().poll_interval_secs,
            Some(10)
        );

        let file = write_temp(".toml", "command_timeout_ms = 500\nprivileged = false\n");
        let cfg = load_config(Some(file.path())).unwrap();
        assert_eq!(cfg.command_timeout_ms, Some(500));
        assert_eq!(cfg.privileged, Some(false));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let cfg = load_config(Some(Path::new("/nonexistent/herakles.yaml"))).unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn test_cli_overrides_file() {
        let file = write_temp(".yaml", "port: 9400\npoll_interval_secs: 10\n");
        let path = file.path().to_str().unwrap().to_string();
        let args = Args::parse_from([
            "herakles-hw-telemetry",
            "-c",
            &path,
            "--poll-interval",
            "3",
            "--no-root",
        ]);
        let cfg = resolve_config(&args).unwrap();
        assert_eq!(cfg.port, Some(9400));
        assert_eq!(cfg.poll_interval_secs, Some(3));
        assert_eq!(cfg.privileged, Some(false));
        assert!(!cfg.shell_runner().escalates());
    }

    #[test]
    fn test_render_round_trips_through_yaml() {
        let cfg = Config::default();
        let yaml = render_config(&cfg, &ConfigFormat::Yaml).unwrap();
        let commented = add_config_comments(yaml);
        let parsed: Config = serde_yaml::from_str(&commented).unwrap();
        assert_eq!(parsed, cfg);
    }
}
