//! Daemon configuration.

use crate::{SwitchdError, SwitchdResult};
use serde::Deserialize;

/// Configuration for a switchd instance.
///
/// Values come from an optional JSON config file with per-field defaults
/// matching the shipped board image.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonConfig {
    /// Hostname shown in the CLI prompt.
    pub hostname: String,
    /// 7-bit I²C slave address of this layer.
    pub i2c_address: u8,
    /// Echo console input back to the terminal.
    pub echo: bool,
    /// Emit VT100 escape sequences (progress bars, menus).
    pub console_mode: bool,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        DaemonConfig {
            hostname: "EEE-Switch".to_string(),
            i2c_address: 0x1A,
            echo: true,
            console_mode: true,
        }
    }
}

impl DaemonConfig {
    /// Validates field constraints.
    pub fn validate(&self) -> SwitchdResult<()> {
        if self.hostname.is_empty() || self.hostname.len() > 16 {
            return Err(SwitchdError::invalid_argument(
                "hostname",
                self.hostname.clone(),
            ));
        }
        if self.i2c_address > 0x7F {
            return Err(SwitchdError::invalid_argument(
                "i2c_address",
                format!("0x{:02X}", self.i2c_address),
            ));
        }
        Ok(())
    }

    /// Loads configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> SwitchdResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| SwitchdError::invalid_argument("config", e.to_string()))?;
        let config: DaemonConfig = serde_json::from_str(&text)
            .map_err(|e| SwitchdError::invalid_argument("config", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DaemonConfig::default();
        assert_eq!(config.hostname, "EEE-Switch");
        assert_eq!(config.i2c_address, 0x1A);
        assert!(config.echo);
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_fields() {
        let config = DaemonConfig {
            hostname: String::new(),
            ..DaemonConfig::default()
        };
        assert!(config.validate().is_err());

        let config = DaemonConfig {
            i2c_address: 0x80,
            ..DaemonConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_partial_json() {
        let config: DaemonConfig =
            serde_json::from_str(r#"{"hostname": "lab-switch"}"#).unwrap();
        assert_eq!(config.hostname, "lab-switch");
        assert_eq!(config.i2c_address, 0x1A);
    }
}
