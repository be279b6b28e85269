//! Engine settings, read from TOML.
//!
//! ```toml
//! history-capacity = 4096
//! tab-width = 8
//! ```

use serde::Deserialize;
use thiserror::Error;

/// Result type for config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur when reading a config.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to parse config: {0}")]
  Parse(#[from] toml::de::Error),
  #[error("invalid value for `{field}`: {reason}")]
  InvalidValue {
    field:  &'static str,
    reason: &'static str,
  },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct Config {
  /// Bytes reserved up front for the history log.
  pub history_capacity: usize,
  /// Initial slots in the line index.
  pub lines_capacity:   usize,
  /// Initial slots for cursors.
  pub cursors_capacity: usize,
  /// Tab stops used to expand tabs in loaded text.
  pub tab_width:        usize,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      history_capacity: 1000,
      lines_capacity:   6,
      cursors_capacity: 1,
      tab_width:        4,
    }
  }
}

impl Config {
  pub fn from_toml(source: &str) -> Result<Self> {
    let config: Config = toml::from_str(source)?;
    config.validate()?;
    Ok(config)
  }

  pub fn validate(&self) -> Result<()> {
    let positive = [
      ("lines-capacity", self.lines_capacity),
      ("cursors-capacity", self.cursors_capacity),
      ("tab-width", self.tab_width),
    ];
    for (field, value) in positive {
      if value == 0 {
        return Err(ConfigError::InvalidValue {
          field,
          reason: "must be at least 1",
        });
      }
    }
    Ok(())
  }
}
