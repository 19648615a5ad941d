// src/config.rs
//! Conversion run configuration
//!
//! A run is described by [`ConvertConfig`]. Values come from an optional TOML
//! file and are then overridden by command-line flags:
//!
//! ```toml
//! output_dir = "migrated"
//! extensions = [".xml"]
//! skip_patterns = ["/tests?/", "_demo\\.xml$"]
//! workers = 4
//! enable_source_rewrite = true
//! ```

use crate::domain::ConditionParsing;
use crate::error::{Error, Result};
use crate::transform::TransformOptions;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Problems with the configuration file itself
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{0}")]
    Invalid(String),
}

/// Options for one conversion run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    /// Directory tree to convert
    pub source_dir: PathBuf,
    /// Mirror converted files here instead of rewriting in place
    pub output_dir: Option<PathBuf>,
    /// Keep a `.bak` copy of every file rewritten in place
    pub backup: bool,
    /// File name suffixes to process
    pub extensions: Vec<String>,
    /// Regexes matched against the full path of each candidate
    pub skip_patterns: Vec<String>,
    /// Worker threads, clamped to the available parallelism
    pub workers: usize,
    /// Transform and report without writing anything
    pub dry_run: bool,
    /// Rewrite `view_mode` values (and process `.py` files)
    pub enable_source_rewrite: bool,
    /// Translate arbitrarily nested domains instead of the basic shapes only
    pub advanced_conditions: bool,
    /// Write the JSON run summary here
    pub report_file: Option<PathBuf>,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("."),
            output_dir: None,
            backup: true,
            extensions: vec![".xml".to_string()],
            skip_patterns: Vec::new(),
            workers: 1,
            dry_run: false,
            enable_source_rewrite: false,
            advanced_conditions: true,
            report_file: None,
        }
    }
}

impl ConvertConfig {
    /// Load a configuration file
    pub fn from_file(path: &Path) -> std::result::Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> std::result::Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Extensions actually processed, each with a leading dot
    pub fn effective_extensions(&self) -> Vec<String> {
        let mut extensions: Vec<String> = self
            .extensions
            .iter()
            .map(|e| e.trim())
            .filter(|e| !e.is_empty())
            .map(|e| if e.starts_with('.') { e.to_string() } else { format!(".{}", e) })
            .collect();
        if self.enable_source_rewrite && !extensions.iter().any(|e| e == ".py") {
            extensions.push(".py".to_string());
        }
        extensions.sort();
        extensions.dedup();
        extensions
    }

    /// Worker count clamped to `[1, available_parallelism]`
    pub fn effective_workers(&self) -> usize {
        let available = std::thread::available_parallelism()
            .map(|p| p.get())
            .unwrap_or(1);
        self.workers.clamp(1, available.max(1))
    }

    /// Rule selection derived from the flags
    pub fn transform_options(&self) -> TransformOptions {
        TransformOptions {
            parsing: if self.advanced_conditions {
                ConditionParsing::Advanced
            } else {
                ConditionParsing::Basic
            },
            source_rewrite: self.enable_source_rewrite,
        }
    }

    /// Compile the skip-list
    pub fn compile_skip_patterns(&self) -> Result<Vec<Regex>> {
        self.skip_patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| Error::InvalidPattern {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect()
    }

    /// Check everything that would make the run fail before it starts
    pub fn validate(&self) -> Result<Vec<Regex>> {
        if !self.source_dir.is_dir() {
            return Err(Error::SourceNotFound(self.source_dir.clone()));
        }
        if self.effective_extensions().is_empty() {
            return Err(ConfigError::Invalid("no file extensions to process".to_string()).into());
        }
        if let Some(output) = &self.output_dir {
            if output.exists() && !output.is_dir() {
                return Err(ConfigError::Invalid(format!(
                    "output path {} is not a directory",
                    output.display()
                ))
                .into());
            }
        }
        self.compile_skip_patterns()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = ConvertConfig::default();
        assert!(config.backup);
        assert_eq!(config.extensions, vec![".xml"]);
        assert_eq!(config.workers, 1);
        assert!(config.advanced_conditions);
        assert_eq!(config.transform_options().parsing, ConditionParsing::Advanced);
    }

    #[test]
    fn test_from_toml_partial() {
        let config = ConvertConfig::from_toml(
            r#"
            backup = false
            extensions = ["xml", ".XML"]
            workers = 64
            advanced_conditions = false
            "#,
        )
        .unwrap();
        assert!(!config.backup);
        assert_eq!(config.effective_extensions(), vec![".XML", ".xml"]);
        assert!(config.effective_workers() >= 1);
        assert!(config.effective_workers() <= 64);
        assert_eq!(config.transform_options().parsing, ConditionParsing::Basic);
        assert_eq!(config.report_file, None);
    }

    #[test]
    fn test_from_toml_rejects_unknown_types() {
        assert!(matches!(
            ConvertConfig::from_toml("workers = \"many\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_source_rewrite_adds_python() {
        let config = ConvertConfig {
            enable_source_rewrite: true,
            ..Default::default()
        };
        assert_eq!(config.effective_extensions(), vec![".py", ".xml"]);
        assert!(config.transform_options().source_rewrite);
    }

    #[test]
    fn test_validate() {
        let dir = TempDir::new().unwrap();
        let mut config = ConvertConfig {
            source_dir: dir.path().to_path_buf(),
            skip_patterns: vec!["/static/".to_string()],
            ..Default::default()
        };
        assert_eq!(config.validate().unwrap().len(), 1);

        config.skip_patterns.push("([".to_string());
        assert!(matches!(config.validate(), Err(Error::InvalidPattern { .. })));

        config.source_dir = dir.path().join("missing");
        assert!(matches!(config.validate(), Err(Error::SourceNotFound(_))));
    }
}
