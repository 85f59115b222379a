//! Config command implementation.

use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;
use crate::config::{add_config_comments, render_config, Config};

/// Default output file when `-o` is not given.
const DEFAULT_OUTPUT: &str = "herakles-hw-telemetry.yaml";

/// Generates configuration files
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    let output = output.unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));

    let mut content = render_config(&config, &format)?;
    if commented && matches!(format, ConfigFormat::Yaml) {
        content = add_config_comments(content);
    }

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config;

    #[test]
    fn test_written_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hw.toml");

        command_config(Some(path.clone()), ConfigFormat::Toml, true).unwrap();
        let cfg = load_config(Some(&path)).unwrap();
        assert_eq!(cfg, Config::default());
    }
}
