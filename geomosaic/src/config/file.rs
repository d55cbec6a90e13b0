//! INI configuration file handling.
//!
//! ```ini
//! [download]
//! workers = 4
//! max_attempts = 3
//! timeout = 120
//! min_tile_bytes = 1024
//! backoff_ms = 500
//!
//! [provider]
//! url_template = https://imagery.example.com/export?c={sensor}&bbox={west},{south},{east},{north}
//! sensors = LANDSAT_8, SENTINEL_2
//!
//! [logging]
//! directory = logs
//! file = geomosaic.log
//! ```
//!
//! A missing file yields the defaults. Unknown keys are ignored.

use super::download::{DownloadConfig, MAX_WORKERS_LIMIT};
use crate::logging::{DEFAULT_LOG_DIR, DEFAULT_LOG_FILE};
use crate::provider::UrlTemplateProvider;
use ini::{Ini, Properties};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Config text is not valid INI
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] ini::ParseError),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

/// `[provider]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderSettings {
    /// URL template for [`UrlTemplateProvider`]
    pub url_template: Option<String>,
    /// Accepted sensors, empty for any
    pub sensors: Vec<String>,
}

impl ProviderSettings {
    /// Builds a template provider when a URL template is configured.
    pub fn template_provider(&self) -> Option<UrlTemplateProvider> {
        self.url_template
            .as_ref()
            .map(|template| UrlTemplateProvider::new(template.clone(), self.sensors.clone()))
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub directory: PathBuf,
    pub file: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(DEFAULT_LOG_DIR),
            file: DEFAULT_LOG_FILE.to_string(),
        }
    }
}

/// Parsed configuration file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub download: DownloadConfig,
    pub provider: ProviderSettings,
    pub logging: LoggingSettings,
}

impl ConfigFile {
    /// Load configuration from `path`, falling back to defaults if it is absent.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        Self::from_ini(&ini)
    }

    /// Parse configuration from INI text.
    pub fn parse(content: &str) -> Result<Self, ConfigFileError> {
        let ini = Ini::load_from_str(content)?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigFileError> {
        let mut config = Self::default();

        // [download] section
        if let Some(section) = ini.section(Some("download")) {
            let mut download = config.download;

            if let Some(workers) = parse_value::<usize>(
                section,
                "download",
                "workers",
                "must be a positive integer",
            )? {
                if workers == 0 || workers > MAX_WORKERS_LIMIT {
                    warn!(
                        workers = workers,
                        limit = MAX_WORKERS_LIMIT,
                        "Worker count out of range, clamping"
                    );
                }
                download = download.with_max_workers(workers);
            }
            if let Some(attempts) = parse_value::<u32>(
                section,
                "download",
                "max_attempts",
                "must be a positive integer",
            )? {
                if attempts == 0 {
                    return Err(invalid("download", "max_attempts", "0", "must be at least 1"));
                }
                download = download.with_max_attempts(attempts);
            }
            if let Some(secs) = parse_value::<u64>(
                section,
                "download",
                "timeout",
                "must be a positive integer (seconds)",
            )? {
                if secs == 0 {
                    return Err(invalid("download", "timeout", "0", "must be at least 1 second"));
                }
                download = download.with_request_timeout(Duration::from_secs(secs));
            }
            if let Some(bytes) = parse_value::<u64>(
                section,
                "download",
                "min_tile_bytes",
                "must be a non-negative integer (bytes)",
            )? {
                download = download.with_min_tile_bytes(bytes);
            }
            if let Some(ms) = parse_value::<u64>(
                section,
                "download",
                "backoff_ms",
                "must be a non-negative integer (milliseconds)",
            )? {
                download = download.with_backoff_base(Duration::from_millis(ms));
            }

            config.download = download;
        }

        // [provider] section
        if let Some(section) = ini.section(Some("provider")) {
            if let Some(v) = section.get("url_template") {
                let v = v.trim();
                if !v.is_empty() {
                    config.provider.url_template = Some(v.to_string());
                }
            }
            if let Some(v) = section.get("sensors") {
                config.provider.sensors = v
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
            }
        }

        // [logging] section
        if let Some(section) = ini.section(Some("logging")) {
            if let Some(v) = section.get("directory") {
                let v = v.trim();
                if !v.is_empty() {
                    config.logging.directory = PathBuf::from(v);
                }
            }
            if let Some(v) = section.get("file") {
                let v = v.trim();
                if !v.is_empty() {
                    config.logging.file = v.to_string();
                }
            }
        }

        Ok(config)
    }
}

fn parse_value<T: FromStr>(
    section: &Properties,
    section_name: &str,
    key: &str,
    reason: &str,
) -> Result<Option<T>, ConfigFileError> {
    match section.get(key) {
        None => Ok(None),
        Some(v) => v
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| invalid(section_name, key, v, reason)),
    }
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = ConfigFile::load_from(&temp_dir.path().join("nope.ini")).unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_load_full_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.ini");
        std::fs::write(
            &config_path,
            r#"
[download]
workers = 8
max_attempts = 5
timeout = 30
min_tile_bytes = 2048
backoff_ms = 250

[provider]
url_template = https://x.test/{sensor}
sensors = LANDSAT_8, SENTINEL_2

[logging]
directory = /var/log/geomosaic
file = run.log
"#,
        )
        .unwrap();

        let config = ConfigFile::load_from(&config_path).unwrap();
        assert_eq!(config.download.max_workers(), 8);
        assert_eq!(config.download.max_attempts(), 5);
        assert_eq!(config.download.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.download.min_tile_bytes(), 2048);
        assert_eq!(config.download.backoff_base(), Duration::from_millis(250));
        assert_eq!(
            config.provider.url_template.as_deref(),
            Some("https://x.test/{sensor}")
        );
        assert_eq!(config.provider.sensors, vec!["LANDSAT_8", "SENTINEL_2"]);
        assert_eq!(config.logging.directory, PathBuf::from("/var/log/geomosaic"));
        assert_eq!(config.logging.file, "run.log");
    }

    #[test]
    fn test_invalid_workers_value() {
        let result = ConfigFile::parse("[download]\nworkers = many\n");
        match result {
            Err(ConfigFileError::InvalidValue { section, key, value, .. }) => {
                assert_eq!(section, "download");
                assert_eq!(key, "workers");
                assert_eq!(value, "many");
            }
            other => panic!("expected InvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn test_workers_clamped_to_limit() {
        let config = ConfigFile::parse("[download]\nworkers = 500\n").unwrap();
        assert_eq!(config.download.max_workers(), MAX_WORKERS_LIMIT);

        let config = ConfigFile::parse("[download]\nworkers = 0\n").unwrap();
        assert_eq!(config.download.max_workers(), 1);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let result = ConfigFile::parse("[download]\ntimeout = 0\n");
        assert!(matches!(
            result,
            Err(ConfigFileError::InvalidValue { key, .. }) if key == "timeout"
        ));
    }

    #[test]
    fn test_template_provider_from_settings() {
        let config = ConfigFile::parse("[provider]\nurl_template = {sensor}\nsensors = A\n").unwrap();
        let provider = config.provider.template_provider().unwrap();
        assert_eq!(provider.sensors().collect::<Vec<_>>(), vec!["A"]);

        assert!(ConfigFile::default().provider.template_provider().is_none());
    }
}
