//! TOML hardware configuration files
//!
//! Every section and key is optional; missing values fall back to the
//! reference board wiring:
//!
//! ```toml
//! [address]
//! ser = 45
//! srclk = 41
//! rclk = 42
//!
//! [control]
//! ce = 18
//! oe = 20
//! we = 19
//!
//! [data]
//! swapped = [33, 34, 35, 36, 37, 2, 3, 40, 8, 7, 6, 5, 4, 39, 38, 1]
//! sequential = [40, 39, 38, 37, 36, 35, 34, 33, 1, 2, 3, 4, 5, 6, 7, 8]
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::string::String;

use super::HardwareConfig;
use crate::error::Error;

/// Errors from loading a hardware configuration file
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    /// The file could not be read
    #[error("failed to read {path:?}: {source}")]
    Io {
        /// File that was being read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML or has unknown value types
    #[error("failed to parse hardware configuration: {0}")]
    Parse(#[from] ::toml::de::Error),

    /// The wiring described is not usable
    #[error("invalid hardware configuration: {0}")]
    Invalid(#[from] Error),

    /// Serializing the configuration failed
    #[error("failed to serialize hardware configuration: {0}")]
    Serialize(#[from] ::toml::ser::Error),
}

impl HardwareConfig {
    /// Load and validate a configuration from a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigFileError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigFileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigFileError> {
        let config: HardwareConfig = ::toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Render the configuration as TOML
    pub fn to_toml_string(&self) -> Result<String, ConfigFileError> {
        Ok(::toml::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_reference_board() {
        let config = HardwareConfig::from_toml_str("").unwrap();
        assert_eq!(config, HardwareConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let config = HardwareConfig::from_toml_str(
            r#"
[control]
ce = 21
"#,
        )
        .unwrap();
        assert_eq!(config.control.ce, 21);
        assert_eq!(config.control.oe, 20);
        assert_eq!(config.address, HardwareConfig::default().address);
    }

    #[test]
    fn test_invalid_mapping_rejected() {
        let result = HardwareConfig::from_toml_str(
            r#"
[data]
swapped = [1, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15]
sequential = [1, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15]
"#,
        );
        assert!(matches!(
            result,
            Err(ConfigFileError::Invalid(Error::InvalidPinMapping))
        ));
    }

    #[test]
    fn test_round_trip_through_toml() {
        let config = HardwareConfig::default();
        let text = config.to_toml_string().unwrap();
        assert_eq!(HardwareConfig::from_toml_str(&text).unwrap(), config);
    }
}
