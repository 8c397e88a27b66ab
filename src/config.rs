//! Configuration management for scriptrack.
//!
//! This module defines the structure of the optional `scriptrack.toml` file and provides
//! functionality to load and parse it. Every key is optional; command-line flags take
//! precedence and built-in defaults fill whatever is left.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Top-level configuration structure corresponding to `scriptrack.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Flat file holding the script list, one path per line.
    pub list_file: Option<String>,
    /// How often (milliseconds) the monitor polls registered processes.
    pub monitor_interval_ms: Option<u64>,
    /// Interpreter command used when none is found next to the script.
    pub interpreter: Option<String>,
    /// Executable names searched for in the script's directory tree.
    pub interpreter_names: Option<Vec<String>>,
    /// Name of the env file loaded from the script's directory.
    pub env_file: Option<String>,
    /// Grace period (milliseconds) between the terminate signal and a forced kill.
    pub stop_timeout_ms: Option<u64>,
    /// What starting an already-running script does ("restart", "refuse", "detach").
    pub on_restart: Option<String>,
    /// Whether to use Unicode symbols in the TUI (default: true).
    pub symbols: Option<bool>,
}

/// Loads and parses the configuration from a file path.
pub fn load_config(path: &Path) -> Result<Config> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config: Config = toml::from_str(&raw)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_optional_fields() {
        let raw = r#"
list_file = "scripts.txt"
monitor_interval_ms = 2500
interpreter = "python3"
interpreter_names = ["python3", "python"]
env_file = ".env.local"
stop_timeout_ms = 1200
on_restart = "refuse"
symbols = false
"#;
        let config: Config = toml::from_str(raw).unwrap();
        assert_eq!(config.list_file.as_deref(), Some("scripts.txt"));
        assert_eq!(config.monitor_interval_ms, Some(2500));
        assert_eq!(config.interpreter.as_deref(), Some("python3"));
        assert_eq!(
            config.interpreter_names,
            Some(vec!["python3".to_string(), "python".to_string()])
        );
        assert_eq!(config.env_file.as_deref(), Some(".env.local"));
        assert_eq!(config.stop_timeout_ms, Some(1200));
        assert_eq!(config.on_restart.as_deref(), Some("refuse"));
        assert_eq!(config.symbols, Some(false));
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.list_file.is_none());
        assert!(config.interpreter_names.is_none());
    }

    #[test]
    fn load_config_reports_path_on_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scriptrack.toml");
        std::fs::write(&path, "monitor_interval_ms = \"soon\"").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("scriptrack.toml"));
    }
}
