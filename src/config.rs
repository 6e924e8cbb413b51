//! Settings for loading exports and presenting results.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{
    Error,
    format::{Locale, MAX_DECIMALS, NumberFormat},
};

/// The config for loading workbooks and formatting report values.
///
/// Every field has a default, so a config file only needs the fields it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DashboardConfig {
    /// The name of the per-transaction detail sheet.
    pub detail_sheet: String,
    /// The name of the national-totals sheet.
    pub national_sheet: String,
    /// How long the provider reference table is cached, in seconds.
    pub provider_cache_ttl_secs: u64,
    /// The number of decimal places for formatted numbers.
    pub default_decimals: u32,
    /// The text shown for missing numbers.
    pub placeholder: String,
    /// File path to the SQLite database holding the provider table.
    pub database_path: PathBuf,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            detail_sheet: "Data".to_owned(),
            national_sheet: "Nasional".to_owned(),
            provider_cache_ttl_secs: 600,
            default_decimals: 2,
            placeholder: "-".to_owned(),
            database_path: PathBuf::from("pjp_report.db"),
        }
    }
}

impl DashboardConfig {
    /// Parse a config from JSON text.
    ///
    /// # Errors
    /// Returns [Error::InvalidConfig] if the JSON is malformed, has unknown
    /// fields or contains invalid values.
    pub fn from_json_str(text: &str) -> Result<Self, Error> {
        let config: Self =
            serde_json::from_str(text).map_err(|error| Error::InvalidConfig(error.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Read and parse a JSON config file.
    ///
    /// # Errors
    /// Returns [Error::InvalidConfig] if the file cannot be read, or any error
    /// of [DashboardConfig::from_json_str].
    pub fn from_json_file(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path).map_err(|error| {
            Error::InvalidConfig(format!("could not read {}: {error}", path.display()))
        })?;

        tracing::debug!("loaded config from {}", path.display());

        Self::from_json_str(&text)
    }

    /// The time-to-live of the provider cache.
    pub fn provider_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.provider_cache_ttl_secs)
    }

    /// The number format for `locale` using the configured decimals and placeholder.
    pub fn number_format(&self, locale: Locale) -> NumberFormat {
        NumberFormat {
            locale,
            decimals: self.default_decimals,
            grouping: true,
            placeholder: self.placeholder.clone(),
        }
    }

    fn validate(&self) -> Result<(), Error> {
        if self.detail_sheet.trim().is_empty() || self.national_sheet.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "sheet names cannot be empty".to_owned(),
            ));
        }

        if self.default_decimals > MAX_DECIMALS {
            return Err(Error::InvalidConfig(format!(
                "default_decimals must be at most {MAX_DECIMALS}, got {}",
                self.default_decimals
            )));
        }

        Ok(())
    }
}
