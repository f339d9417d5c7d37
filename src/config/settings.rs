//! Application settings loading from config.toml
//!
//! Settings cover the HTTP bind address and fee defaults. A missing file yields
//! the built-in defaults; a malformed one is a configuration error.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

/// Prepaid agency-fee allowance given to new students when none is specified.
pub const DEFAULT_AGENCY_FEE: f64 = 600.0;

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerSettings,
    /// Fee defaults
    #[serde(default)]
    pub fees: FeeSettings,
}

/// HTTP server settings
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    /// Address the API listens on
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

fn default_bind_addr() -> String {
    "127.0.0.1:3000".to_string()
}

/// Fee defaults
#[derive(Debug, Deserialize, Clone)]
pub struct FeeSettings {
    /// Agency-fee capacity for newly created students
    #[serde(default = "default_agency_fee")]
    pub default_agency_fee: f64,
}

impl Default for FeeSettings {
    fn default() -> Self {
        Self {
            default_agency_fee: DEFAULT_AGENCY_FEE,
        }
    }
}

const fn default_agency_fee() -> f64 {
    DEFAULT_AGENCY_FEE
}

/// Parses settings from TOML text.
pub fn parse_settings(contents: &str) -> Result<Settings> {
    let settings: Settings = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })?;

    if !settings.fees.default_agency_fee.is_finite() || settings.fees.default_agency_fee < 0.0 {
        return Err(Error::Config {
            message: format!(
                "fees.default_agency_fee must be a non-negative number, got {}",
                settings.fees.default_agency_fee
            ),
        });
    }
    Ok(settings)
}

/// Loads settings from a TOML file, falling back to defaults when it does not exist.
///
/// # Errors
/// Returns an error if:
/// - The file exists but cannot be read
/// - The TOML syntax is invalid
/// - A value is out of range
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let path = path.as_ref();
    if !path.exists() {
        info!("No config file at {}, using defaults.", path.display());
        return Ok(Settings::default());
    }
    debug!("Loading configuration from {}", path.display());
    let contents = std::fs::read_to_string(path).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;
    parse_settings(&contents)
}

/// Loads settings from `SCHOOL_LEDGER_CONFIG`, or ./config.toml when unset.
pub fn load_default_settings() -> Result<Settings> {
    let path = std::env::var("SCHOOL_LEDGER_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    load_settings(path)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;

    #[test]
    fn test_parse_settings() {
        let toml_str = r#"
            [server]
            bind_addr = "0.0.0.0:8080"

            [fees]
            default_agency_fee = 800.0
        "#;

        let settings = parse_settings(toml_str).unwrap();
        assert_eq!(settings.server.bind_addr, "0.0.0.0:8080");
        assert_eq!(settings.fees.default_agency_fee, 800.0);
    }

    #[test]
    fn test_parse_settings_defaults() {
        let settings = parse_settings("").unwrap();
        assert_eq!(settings.server.bind_addr, "127.0.0.1:3000");
        assert_eq!(settings.fees.default_agency_fee, 600.0);
    }

    #[test]
    fn test_parse_settings_rejects_negative_agency_fee() {
        let result = parse_settings("[fees]\ndefault_agency_fee = -1.0\n");
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let settings = load_settings("definitely/not/here/config.toml").unwrap();
        assert_eq!(settings.fees.default_agency_fee, DEFAULT_AGENCY_FEE);
    }
}
