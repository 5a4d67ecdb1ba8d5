//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `MQRD_CONFIG`
//! environment variable. A missing file is not an error; every field has a default.
//!
//! ## Loading Priority
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `MQRD_` override YAML values
//!
//! For nested values use double underscores, e.g. `MQRD_LIMITS__FILES__MAX_FILES_COUNT=10`.
//!
//! ## Example
//!
//! ```yaml
//! host: 0.0.0.0
//! port: 3001
//! limits:
//!   files:
//!     max_file_size: 10485760
//!     max_files_count: 5
//!     max_concurrent_files: 2
//! staging:
//!   mode: disk
//!   directory: /var/tmp/mqrd
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};

use crate::errors::Error;

/// CLI args: config file location plus an optional one-shot subcommand
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "MQRD_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Decode local image files and print the batch result as JSON instead of serving HTTP
    Decode {
        /// Image files, processed in the given order
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}

/// Main application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Expose Prometheus metrics at `/internal/metrics`
    pub enable_metrics: bool,
    /// Enable OpenTelemetry OTLP export for distributed tracing
    pub enable_otel_export: bool,
    /// Request and file limits
    pub limits: LimitsConfig,
    /// Where image variants are held while the detector runs
    pub staging: StagingConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    pub files: FileLimitsConfig,
}

/// File limits configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileLimitsConfig {
    /// Maximum size of a single uploaded file in bytes. Larger files get an error result.
    /// Set to 0 for unlimited (not recommended for production).
    /// Default: 10MB
    pub max_file_size: u64,
    /// Maximum number of files per request.
    /// Default: 5
    pub max_files_count: usize,
    /// Number of files decoded in parallel within one request. 1 processes files sequentially.
    /// Default: 1
    pub max_concurrent_files: usize,
}

impl Default for FileLimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size: 10 * 1024 * 1024, // 10MB
            max_files_count: 5,
            max_concurrent_files: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StagingMode {
    /// Keep variants as in-memory buffers
    #[default]
    Memory,
    /// Spill variants to temporary PNG files, removed once the file is processed
    Disk,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct StagingConfig {
    pub mode: StagingMode,
    /// Directory for temporary files in `disk` mode (system temp dir when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            enable_metrics: true,
            enable_otel_export: false,
            limits: LimitsConfig::default(),
            staging: StagingConfig::default(),
        }
    }
}

/// Multipart framing allowance on top of the file payloads
const MULTIPART_OVERHEAD: u64 = 1024 * 1024;

impl Config {
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            .merge(Yaml::file(&args.config))
            .merge(Env::prefixed("MQRD_").split("__"))
    }

    /// Validate the configuration for consistency
    pub fn validate(&self) -> Result<(), Error> {
        let files = &self.limits.files;

        if files.max_files_count == 0 {
            return Err(Error::Internal {
                operation: "Config validation: limits.files.max_files_count must be at least 1".to_string(),
            });
        }

        if files.max_concurrent_files == 0 {
            return Err(Error::Internal {
                operation: "Config validation: limits.files.max_concurrent_files must be at least 1".to_string(),
            });
        }

        if self.staging.mode == StagingMode::Disk
            && let Some(dir) = &self.staging.directory
            && !dir.is_dir()
        {
            return Err(Error::Internal {
                operation: format!("Config validation: staging.directory {} is not a directory", dir.display()),
            });
        }

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Body limit for the decode route, sized for one file more than the count limit so an
    /// over-count batch of legal files is still answered with a validation error.
    /// `None` when file size is unlimited.
    pub fn request_body_limit(&self) -> Option<usize> {
        let files = &self.limits.files;
        if files.max_file_size == 0 {
            return None;
        }
        let limit = files
            .max_file_size
            .saturating_mul(files.max_files_count as u64 + 1)
            .saturating_add(MULTIPART_OVERHEAD);
        Some(usize::try_from(limit).unwrap_or(usize::MAX))
    }
}
