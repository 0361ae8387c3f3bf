//! Optional TOML configuration file
//!
//! ```toml
//! [analysis]
//! continuation = "strict"
//! sample_limit = 3
//!
//! [input]
//! extensions = ["log", "txt", "out"]
//! max_bytes = 52428800
//!
//! [[rules.severity]]
//! token = "sev1"
//! error_type = "FATAL"
//! ```
//!
//! Command-line flags override file values.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use logsift_engine::{AnalyzerOptions, RulesConfig};

/// Default accepted file extensions
const DEFAULT_EXTENSIONS: &[&str] = &["log", "txt"];

/// Default maximum input size (10 MiB)
const DEFAULT_MAX_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub analysis: AnalyzerOptions,
    pub input: InputConfig,
    pub rules: RulesConfig,
}

/// Checks applied to a file before it is analyzed
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InputConfig {
    /// Accepted extensions, without the dot, matched case-insensitively
    pub extensions: Vec<String>,
    pub max_bytes: u64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_toml_str(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Load `path` if given, defaults otherwise
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }
}
