//! TOML configuration for the `trafficpulse` binary.
//!
//! Looked up from `--config`, then `TRAFFICPULSE_CONFIG`, then
//! `trafficpulse.toml` in the working directory. Only an explicitly named
//! file has to exist; otherwise every field falls back to its default.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use trafficpulse_dashboard::{Coordinates, DEFAULT_LOCATION, DashboardConfig};
use trafficpulse_signal::DEFAULT_RADIUS_KM;

/// File read when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "trafficpulse.toml";

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "TRAFFICPULSE_CONFIG";

/// Errors that can occur while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        /// File that was being read.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`Config`].
    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        /// File that was being parsed.
        path: PathBuf,
        /// Underlying error.
        source: toml::de::Error,
    },

    /// The radius is negative or not a number.
    #[error("radius_km must be a finite, non-negative number (got {0})")]
    InvalidRadius(f64),
}

/// Runtime settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// JSON document list used as the incident store.
    pub snapshot_path: PathBuf,
    /// Directory receiving uploaded images.
    pub blob_dir: PathBuf,
    /// Vicinity radius in kilometres.
    pub radius_km: f64,
    /// Center used when no position is given.
    pub default_location: Coordinates,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from("incidents.json"),
            blob_dir: PathBuf::from("blobs"),
            radius_km: DEFAULT_RADIUS_KM,
            default_location: DEFAULT_LOCATION,
        }
    }
}

impl Config {
    /// Parses and validates TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the text is not valid or the values are
    /// out of range.
    pub fn from_toml(text: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the config from `explicit`, the environment, or the default
    /// file, in that order.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a named file is missing or any file is
    /// invalid.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let named = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from));

        let (path, required) = match named {
            Some(path) => (path, true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };

        match std::fs::read_to_string(&path) {
            Ok(text) => {
                log::debug!("Loading config from {}", path.display());
                Self::from_toml(&text, &path)
            }
            Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No {} found, using defaults", path.display());
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Io { path, source }),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.radius_km.is_finite() || self.radius_km < 0.0 {
            return Err(ConfigError::InvalidRadius(self.radius_km));
        }
        Ok(())
    }

    /// Dashboard settings derived from this config.
    #[must_use]
    pub const fn dashboard(&self) -> DashboardConfig {
        DashboardConfig {
            default_location: Some(self.default_location),
            radius_km: self.radius_km,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::from_toml("", Path::new("t.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert!((config.radius_km - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn reads_all_fields() {
        let text = r#"
snapshot_path = "data/incidents.json"
blob_dir = "data/blobs"
radius_km = 3.5

[default_location]
lat = 51.505
lng = -0.09
"#;
        let config = Config::from_toml(text, Path::new("t.toml")).unwrap();
        assert_eq!(config.snapshot_path, PathBuf::from("data/incidents.json"));
        assert_eq!(config.blob_dir, PathBuf::from("data/blobs"));
        assert!((config.radius_km - 3.5).abs() < f64::EPSILON);
        assert!((config.default_location.lat - 51.505).abs() < f64::EPSILON);
        assert!((config.dashboard().radius_km - 3.5).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_negative_radius() {
        assert!(matches!(
            Config::from_toml("radius_km = -1.0", Path::new("t.toml")),
            Err(ConfigError::InvalidRadius(_))
        ));
    }

    #[test]
    fn rejects_bad_toml() {
        assert!(matches!(
            Config::from_toml("radius_km = \"far\"", Path::new("t.toml")),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let missing = std::env::temp_dir().join("trafficpulse-definitely-missing.toml");
        assert!(matches!(
            Config::load(Some(&missing)),
            Err(ConfigError::Io { .. })
        ));
    }
}
