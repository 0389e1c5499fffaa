//! Configuration and data directories for Moneta applications
//!
//! Provides the shared config directory (~/.config/moneta/) for credential
//! and settings files, and the data directory (~/.local/share/moneta/) for
//! the transaction database.
//!
//! Call [`init`] at application startup to bootstrap both directories.

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Initialize the Moneta directories.
///
/// Creates ~/.config/moneta/ and ~/.local/share/moneta/ if they don't exist.
/// Call this once at application startup. Returns the config directory.
pub fn init() -> Result<PathBuf> {
    ensure_dir(data_dir().context("Could not determine data directory")?)?;
    ensure_dir(config_dir().context("Could not determine config directory")?)
}

/// Get the Moneta config directory (~/.config/moneta/)
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("moneta"))
}

/// Get the Moneta data directory (~/.local/share/moneta/)
pub fn data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("moneta"))
}

/// Get the path to a file within the Moneta config directory
pub fn config_path(filename: &str) -> Option<PathBuf> {
    config_dir().map(|p| p.join(filename))
}

/// Get the path to a file within the Moneta data directory
pub fn data_path(filename: &str) -> Option<PathBuf> {
    data_dir().map(|p| p.join(filename))
}

/// Check if a config file exists in the Moneta config directory
pub fn config_exists(filename: &str) -> bool {
    config_path(filename).is_some_and(|p| p.exists())
}

/// Load and parse a JSON config file from the Moneta config directory
pub fn load_json<T: DeserializeOwned>(filename: &str) -> Result<T> {
    let path = config_path(filename).context("Could not determine config directory")?;
    load_json_file(&path)
}

/// Load and parse a JSON file from an arbitrary path
pub fn load_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Save a value as pretty-printed JSON into the Moneta config directory
pub fn save_json<T: Serialize>(filename: &str, value: &T) -> Result<()> {
    let dir = ensure_dir(config_dir().context("Could not determine config directory")?)?;
    let path = dir.join(filename);
    let content = serde_json::to_string_pretty(value)?;
    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;
    Ok(())
}

fn ensure_dir(dir: PathBuf) -> Result<PathBuf> {
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_dir_ends_with_app_name() {
        let dir = config_dir();
        assert!(dir.is_some());
        assert!(dir.unwrap().ends_with("moneta"));
    }

    #[test]
    fn test_data_dir_differs_from_config_dir() {
        let config = config_dir().unwrap();
        let data = data_dir().unwrap();
        assert!(data.ends_with("moneta"));
        assert_ne!(config, data);
    }

    #[test]
    fn test_load_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"batch_size": 20}"#).unwrap();

        #[derive(serde::Deserialize)]
        struct Settings {
            batch_size: usize,
        }

        let settings: Settings = load_json_file(&path).unwrap();
        assert_eq!(settings.batch_size, 20);
    }

    #[test]
    fn test_load_json_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let result: Result<serde_json::Value> = load_json_file(&dir.path().join("missing.json"));
        assert!(result.is_err());
    }
}
