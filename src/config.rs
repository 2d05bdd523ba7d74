// In: src/config.rs

//! The single source of truth for codec configuration.
//!
//! `CodecConfig` is created once at the application boundary (e.g. from a JSON
//! section of a segment build config) and passed down by reference. Every
//! recognized option is an explicit, defaulted field; unknown keys are
//! rejected rather than silently ignored.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::bridge::format::DEFAULT_ROWS_PER_CHUNK;
use crate::error::{Result, ScmvError};

/// Configuration shared by the encoder, the stateless API and logging setup.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct CodecConfig {
    /// **The number of rows per chunk-index entry.**
    /// Smaller values shorten bitmap scans at the cost of a larger header.
    #[serde(default = "default_rows_per_chunk")]
    pub rows_per_chunk: usize,

    /// If true, the encoder recounts row-start marks before writing and
    /// refuses to publish a column whose bitmap disagrees with `num_rows`.
    #[serde(default = "default_true")]
    pub verify_on_close: bool,

    /// Log level for `observability::enable_logging` (e.g. "info", "debug").
    #[serde(default)]
    pub log_level: Option<String>,

    /// Optional file that log output is appended to instead of stderr.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            rows_per_chunk: default_rows_per_chunk(),
            verify_on_close: true,
            log_level: None,
            log_file: None,
        }
    }
}

impl CodecConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.rows_per_chunk == 0 {
            return Err(ScmvError::InvalidParameter(
                "rows_per_chunk must be at least 1".into(),
            ));
        }
        if let Some(level) = &self.log_level {
            level.parse::<log::LevelFilter>().map_err(|_| {
                ScmvError::InvalidParameter(format!("Unrecognized log level '{}'", level))
            })?;
        }
        Ok(())
    }
}

/// Helper for `serde` to default a boolean field to true.
fn default_true() -> bool {
    true
}

/// Helper for `serde` to provide a default for `rows_per_chunk`.
fn default_rows_per_chunk() -> usize {
    DEFAULT_ROWS_PER_CHUNK
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_yields_defaults() {
        let config = CodecConfig::from_json("{}").unwrap();
        assert_eq!(config, CodecConfig::default());
        assert_eq!(config.rows_per_chunk, 1024);
        assert!(config.verify_on_close);
    }

    #[test]
    fn test_overrides_are_applied() {
        let config =
            CodecConfig::from_json(r#"{"rows_per_chunk": 64, "verify_on_close": false, "log_level": "debug"}"#)
                .unwrap();
        assert_eq!(config.rows_per_chunk, 64);
        assert!(!config.verify_on_close);
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let result = CodecConfig::from_json(r#"{"rows_per_chunks": 64}"#);
        assert!(matches!(result, Err(ScmvError::SerdeJson(_))));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(CodecConfig::from_json(r#"{"rows_per_chunk": 0}"#).is_err());
        assert!(CodecConfig::from_json(r#"{"log_level": "loud"}"#).is_err());
    }
}
