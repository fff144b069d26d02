use crate::engine::errors::ConfigError;
use serde::Deserialize;
use std::env;
use std::str::FromStr;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub engine: EngineConfig,
    pub compactor: CompactorConfig,
    pub time: TimeConfig,
    pub logging: LoggingConfig,
}

/// Storage-layout knobs: where segments live and how large a data page is.
#[derive(Debug, Deserialize)]
pub struct EngineConfig {
    pub data_dir: String,
    /// Rows per Arrow-IPC data page (§4.B).
    pub page_rows: usize,
    /// Pinned-page-exempt LRU capacity of the in-process page pool (§5/K), in pages.
    pub buffer_pool_capacity_pages: usize,
}

/// Compaction knobs (§4.H).
#[derive(Debug, Deserialize)]
pub struct CompactorConfig {
    /// Number of same-level segments merged into the next level per compaction.
    #[serde(default = "default_fan_in")]
    pub fan_in: usize,
}

fn default_fan_in() -> usize {
    4
}

/// Defaults applied when a temporal bounds clause (§4.I) omits a timezone.
#[derive(Debug, Deserialize)]
pub struct TimeConfig {
    pub default_time_zone: String,
    /// Whether literal-printing helpers are suppressed (no wire/CLI surface in this crate).
    #[serde(default)]
    pub suppress_time_literal_printers: bool,
}

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    pub log_dir: String,
    pub stdout_level: String,
    pub file_level: String,
}

pub fn load_settings() -> Result<Settings, ConfigError> {
    let config_path = env::var("BITEMPORAL_STORE_CONFIG").unwrap_or_else(|_| "config".to_string());

    let settings: Settings = config::Config::builder()
        .add_source(config::File::with_name(&config_path))
        .build()?
        .try_deserialize()?;

    validate_time_zone(&settings.time.default_time_zone)?;

    Ok(settings)
}

/// §6's "default time zone (parsed as an IANA zone)" requirement: reject a config that
/// doesn't name a real zone at load time rather than failing later on first use.
fn validate_time_zone(name: &str) -> Result<(), ConfigError> {
    chrono_tz::Tz::from_str(name)
        .map(|_| ())
        .map_err(|_| ConfigError::InvalidTimeZone(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_time_zone() {
        let err = validate_time_zone("Not/A_Zone").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTimeZone(_)));
    }

    #[test]
    fn accepts_valid_iana_zone() {
        assert!(validate_time_zone("America/New_York").is_ok());
        assert!(validate_time_zone("UTC").is_ok());
    }
}
