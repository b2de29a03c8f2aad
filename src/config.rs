//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.omicsgw.toml` files.

use crate::engine::EngineConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".omicsgw.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Analysis engine settings.
    #[serde(default)]
    pub engine: EngineSettings,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Largest accepted upload, in bytes.
    #[serde(default = "default_max_upload")]
    pub max_upload_bytes: usize,

    /// Allow cross-origin requests from any origin.
    #[serde(default = "default_true")]
    pub cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_bytes: default_max_upload(),
            cors: true,
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_max_upload() -> usize {
    512 * 1024 * 1024 // expression matrices can be large
}

fn default_true() -> bool {
    true
}

/// External engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Program that runs the scripts.
    #[serde(default = "default_program")]
    pub program: String,

    /// Directory with pre-authored scripts. Missing scripts fall back to the
    /// copies built into the binary.
    #[serde(default = "default_scripts_dir")]
    pub scripts_dir: PathBuf,

    /// Timeout for every invocation, in seconds. 0 disables it.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Timeout for GO enrichment runs, in seconds. 0 disables it.
    #[serde(default = "default_enrichment_timeout")]
    pub enrichment_timeout_seconds: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            program: default_program(),
            scripts_dir: default_scripts_dir(),
            timeout_seconds: default_timeout(),
            enrichment_timeout_seconds: default_enrichment_timeout(),
        }
    }
}

fn default_program() -> String {
    "Rscript".to_string()
}

fn default_scripts_dir() -> PathBuf {
    PathBuf::from("rcode")
}

fn default_timeout() -> u64 {
    1800 // 30 min; GSEA over all three ontologies is slow
}

fn default_enrichment_timeout() -> u64 {
    600
}

fn seconds(value: u64) -> Option<Duration> {
    (value > 0).then(|| Duration::from_secs(value))
}

impl EngineSettings {
    /// Engine configuration with the uniform timeout.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            program: self.program.clone(),
            scripts_dir: self.scripts_dir.clone(),
            timeout: seconds(self.timeout_seconds),
        }
    }

    pub fn enrichment_timeout(&self) -> Option<Duration> {
        seconds(self.enrichment_timeout_seconds)
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were actually given.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref bind) = args.bind {
            self.server.bind = bind.clone();
        }
        if let Some(ref program) = args.engine {
            self.engine.program = program.clone();
        }
        if let Some(ref dir) = args.scripts_dir {
            self.engine.scripts_dir = dir.clone();
        }
        if let Some(timeout) = args.timeout {
            self.engine.timeout_seconds = timeout;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.bind, "0.0.0.0:8000");
        assert_eq!(config.engine.program, "Rscript");
        assert_eq!(config.engine.timeout_seconds, 1800);
        assert_eq!(
            config.engine.enrichment_timeout(),
            Some(Duration::from_secs(600))
        );
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[server]
bind = "127.0.0.1:9000"
cors = false

[engine]
program = "/opt/R/bin/Rscript"
scripts_dir = "/srv/omics/rcode"
timeout_seconds = 0
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:9000");
        assert!(!config.server.cors);
        assert_eq!(config.server.max_upload_bytes, default_max_upload());
        assert_eq!(config.engine.program, "/opt/R/bin/Rscript");
        assert_eq!(config.engine.scripts_dir, PathBuf::from("/srv/omics/rcode"));
        assert_eq!(config.engine.engine_config().timeout, None);
        assert_eq!(config.engine.enrichment_timeout_seconds, 600);
    }

    #[test]
    fn test_cli_overrides_file_values() {
        use clap::Parser;

        let mut config = Config::default();
        let args = crate::cli::Args::parse_from([
            "omicsgw",
            "--engine",
            "/usr/local/bin/Rscript",
            "--timeout",
            "90",
        ]);
        config.merge_with_args(&args);

        assert_eq!(config.engine.program, "/usr/local/bin/Rscript");
        assert_eq!(config.engine.timeout_seconds, 90);
        assert_eq!(config.engine.scripts_dir, PathBuf::from("rcode"));
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[server]"));
        assert!(toml_str.contains("[engine]"));

        let reparsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(reparsed.engine.program, "Rscript");
    }
}
