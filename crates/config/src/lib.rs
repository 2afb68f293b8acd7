//! `absentia-config` — Settings.
//! Loaded from `~/.config/absentia/config.toml`, falling back to defaults.

use std::fs;
use std::path::PathBuf;

use serde::Deserialize;

/// Worker pool size when the config does not say otherwise.
const DEFAULT_WORKERS: usize = 4;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// SQLite store location.
    pub db_path: PathBuf,
    /// Per-extract audit log directory.
    pub log_dir: PathBuf,
    /// Existence of this file cancels a running ingest cooperatively.
    pub stop_file: PathBuf,
    /// Parallel ingest workers for state extracts.
    pub workers: usize,
    /// Counties whose state-extract rejection data is not authoritative;
    /// their ballot status is owned by the county lists instead.
    pub counties_not_reporting: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("absentia");
        Self {
            db_path: data_dir.join("voters.db"),
            log_dir: data_dir.join("logs"),
            stop_file: data_dir.join("stop-ingest"),
            workers: DEFAULT_WORKERS,
            counties_not_reporting: vec![
                "Polk".to_string(),
                "Cerro Gordo".to_string(),
                "Des Moines".to_string(),
            ],
        }
    }
}

impl Settings {
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("absentia")
            .join("config.toml")
    }

    /// Load settings from the default location, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load settings from an explicit path, falling back to defaults on a
    /// missing file. A malformed file is an error; silently ignoring a typo
    /// in `counties_not_reporting` would corrupt ballot statuses.
    pub fn load_from(path: &PathBuf) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(settings) => settings,
                Err(e) => {
                    eprintln!("error parsing {}: {e}", path.display());
                    eprintln!("using default settings");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_the_county_authority_set() {
        let settings = Settings::default();
        assert_eq!(settings.counties_not_reporting.len(), 3);
        assert!(settings.counties_not_reporting.iter().any(|c| c == "Polk"));
        assert_eq!(settings.workers(), DEFAULT_WORKERS);
    }

    #[test]
    fn partial_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "workers = 8\ndb_path = \"/tmp/v.db\"\n").unwrap();
        let settings = Settings::load_from(&path);
        assert_eq!(settings.workers, 8);
        assert_eq!(settings.db_path, PathBuf::from("/tmp/v.db"));
        // untouched fields keep their defaults
        assert_eq!(settings.counties_not_reporting.len(), 3);
    }

    #[test]
    fn missing_file_means_defaults() {
        let settings = Settings::load_from(&PathBuf::from("/nonexistent/config.toml"));
        assert_eq!(settings.workers, DEFAULT_WORKERS);
    }

    #[test]
    fn zero_workers_is_clamped() {
        let settings = Settings { workers: 0, ..Settings::default() };
        assert_eq!(settings.workers(), 1);
    }
}
