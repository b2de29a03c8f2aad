//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

/// omicsgw - HTTP gateway for R omics analysis scripts
///
/// Serves heatmap, volcano, PCA, DEG filtering, GO/GSEA enrichment and
/// network plot endpoints. Each request runs one R script and returns the
/// plots it produced.
///
/// Examples:
///   omicsgw
///   omicsgw --bind 127.0.0.1:9000 --scripts-dir ./rcode
///   omicsgw --engine /opt/R/4.3/bin/Rscript --timeout 3600
///   omicsgw --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Address to listen on (e.g. 0.0.0.0:8000)
    #[arg(short, long, value_name = "ADDR", env = "OMICSGW_BIND")]
    pub bind: Option<String>,

    /// Program used to run analysis scripts
    #[arg(short, long, value_name = "PROGRAM", env = "OMICSGW_ENGINE")]
    pub engine: Option<String>,

    /// Directory with the R scripts
    ///
    /// Scripts missing from this directory fall back to the built-in copies.
    #[arg(short, long, value_name = "DIR")]
    pub scripts_dir: Option<PathBuf>,

    /// Per-invocation timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .omicsgw.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .omicsgw.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if let Some(ref bind) = self.bind {
            if bind.parse::<SocketAddr>().is_err() {
                return Err(format!("Invalid bind address: {}", bind));
            }
        }

        if let Some(ref engine) = self.engine {
            if engine.trim().is_empty() {
                return Err("Engine program must not be empty".to_string());
            }
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref dir) = self.scripts_dir {
            if !dir.is_dir() {
                return Err(format!(
                    "Scripts directory does not exist: {}",
                    dir.display()
                ));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
