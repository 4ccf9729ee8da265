use std::env;

use serde::{Deserialize, Serialize};

use crate::classifier::ClassifierError;

/// Number of ranked confidences reported by default.
pub const DEFAULT_TOP_K: usize = 3;

/// Default cap on input size, in bytes.
pub const DEFAULT_MAX_INPUT_BYTES: usize = 1 << 20;

pub const TOP_K_ENV: &str = "LANGSNIFF_TOP_K";
pub const MAX_INPUT_BYTES_ENV: &str = "LANGSNIFF_MAX_INPUT_BYTES";

/// Per-request settings of a `LanguageDetector`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// How many ranked confidences to report
    pub top_k: usize,
    /// Inputs longer than this many bytes are rejected; `None` disables the cap
    pub max_input_bytes: Option<usize>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            max_input_bytes: Some(DEFAULT_MAX_INPUT_BYTES),
        }
    }
}

impl DetectorConfig {
    /// Defaults overridden by `LANGSNIFF_TOP_K` and `LANGSNIFF_MAX_INPUT_BYTES`.
    ///
    /// `LANGSNIFF_MAX_INPUT_BYTES` accepts `0` or `none` to disable the cap.
    pub fn from_env() -> Result<Self, ClassifierError> {
        let mut config = Self::default();

        if let Ok(value) = env::var(TOP_K_ENV) {
            config.top_k = parse_top_k(&value)?;
        }
        if let Ok(value) = env::var(MAX_INPUT_BYTES_ENV) {
            config.max_input_bytes = parse_max_input_bytes(&value)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_max_input_bytes(mut self, max_input_bytes: Option<usize>) -> Self {
        self.max_input_bytes = max_input_bytes;
        self
    }

    pub fn validate(&self) -> Result<(), ClassifierError> {
        if self.top_k == 0 {
            return Err(ClassifierError::ConfigError("top_k must be at least 1".into()));
        }
        Ok(())
    }
}

fn parse_top_k(value: &str) -> Result<usize, ClassifierError> {
    value
        .trim()
        .parse()
        .map_err(|_| {
            ClassifierError::ConfigError(format!(
                "{} must be a positive integer, got '{}'",
                TOP_K_ENV, value
            ))
        })
}

fn parse_max_input_bytes(value: &str) -> Result<Option<usize>, ClassifierError> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    match value.parse::<usize>() {
        Ok(0) => Ok(None),
        Ok(max) => Ok(Some(max)),
        Err(_) => Err(ClassifierError::ConfigError(format!(
            "{} must be a byte count or 'none', got '{}'",
            MAX_INPUT_BYTES_ENV, value
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DetectorConfig::default();
        assert_eq!(config.top_k, 3);
        assert_eq!(config.max_input_bytes, Some(1 << 20));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_max_input_bytes() {
        assert_eq!(parse_max_input_bytes("1024").unwrap(), Some(1024));
        assert_eq!(parse_max_input_bytes("0").unwrap(), None);
        assert_eq!(parse_max_input_bytes(" None ").unwrap(), None);
        assert!(parse_max_input_bytes("lots").is_err());
    }

    #[test]
    fn test_parse_top_k() {
        assert_eq!(parse_top_k("5").unwrap(), 5);
        assert!(parse_top_k("-1").is_err());
        assert!(DetectorConfig::default().with_top_k(0).validate().is_err());
    }
}
