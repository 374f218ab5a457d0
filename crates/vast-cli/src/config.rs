use crate::{CliError, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const API_KEY_ENV: &str = "VAST_API_KEY";
const CONFIG_FILE: &str = "config.toml";
const API_KEY_FILE: &str = "vast_api_key";
const LEGACY_API_KEY_FILE: &str = ".vast_api_key";
const CONFIG_FILE_MODE: u32 = 0o644;
const API_KEY_FILE_MODE: u32 = 0o600;

/// Configuration-specific errors that can occur during config operations
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Config directory creation failed: {0}")]
    DirectoryCreationFailed(String),

    #[error("TOML parsing error: {0}")]
    TomlError(String),
}

/// `[api]` section of `config.toml`
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ApiSection {
    pub base_url: Option<String>,
    pub retry: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ConfigData {
    pub api: Option<ApiSection>,
}

/// Values given on the command line; they win over everything stored.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub retry: Option<u32>,
}

impl vast_api::ApiConfig for Config {
    type Error = CliError;

    fn get_api_key(&self) -> std::result::Result<Option<String>, Self::Error> {
        self.get_api_key()
    }

    fn get_base_url(&self) -> std::result::Result<Option<String>, Self::Error> {
        Ok(self.base_url())
    }

    fn get_retry(&self) -> std::result::Result<Option<u32>, Self::Error> {
        Ok(self.retry())
    }
}

/// Configuration manager: the TOML settings file plus the API key file.
///
/// Everything lives under `<config_dir>/vastai/`. A key saved by older
/// clients in `~/.vast_api_key` is still read when the new file is absent.
#[derive(Debug, Clone)]
pub struct Config {
    pub config_path: PathBuf,
    pub api_key_path: PathBuf,
    pub legacy_api_key_path: Option<PathBuf>,
    pub data: ConfigData,
    pub overrides: Overrides,
}

impl Config {
    /// Load from the default locations
    pub fn new() -> Result<Self> {
        let legacy = home::home_dir().map(|home| home.join(LEGACY_API_KEY_FILE));
        Self::load_from(&get_config_dir()?, legacy)
    }

    /// Load from `dir`. A missing config file yields the defaults.
    pub fn load_from(dir: &Path, legacy_api_key_path: Option<PathBuf>) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE);

        let data = if config_path.exists() {
            debug!("Loading config from {}", config_path.display());
            let content = fs::read_to_string(&config_path)?;
            toml::from_str(&content).map_err(|e| ConfigError::TomlError(e.to_string()))?
        } else {
            ConfigData::default()
        };

        Ok(Config {
            config_path,
            api_key_path: dir.join(API_KEY_FILE),
            legacy_api_key_path,
            data,
            overrides: Overrides::default(),
        })
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Save the configuration to file with atomic write
    pub fn save(&self) -> Result<()> {
        let content = toml::to_string_pretty(&self.data)
            .map_err(|e| ConfigError::TomlError(e.to_string()))?;
        write_atomic(&self.config_path, &content, CONFIG_FILE_MODE)
    }

    /// API key, by precedence: `--api-key`, `VAST_API_KEY`, key file, legacy key file.
    pub fn get_api_key(&self) -> Result<Option<String>> {
        self.resolve_api_key(std::env::var(API_KEY_ENV).ok())
    }

    fn resolve_api_key(&self, from_env: Option<String>) -> Result<Option<String>> {
        if let Some(ref key) = self.overrides.api_key {
            return Ok(Some(key.clone()));
        }
        if let Some(key) = from_env.filter(|k| !k.trim().is_empty()) {
            debug!("Using API key from {}", API_KEY_ENV);
            return Ok(Some(key));
        }

        let candidates = std::iter::once(&self.api_key_path).chain(self.legacy_api_key_path.as_ref());
        for path in candidates {
            if path.exists() {
                let key = fs::read_to_string(path)?.trim().to_string();
                if !key.is_empty() {
                    debug!("Using API key from {}", path.display());
                    return Ok(Some(key));
                }
            }
        }

        Ok(None)
    }

    /// Persist `api_key` to the key file
    pub fn set_api_key(&self, api_key: &str) -> Result<()> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "api_key".to_string(),
                value: String::new(),
            }
            .into());
        }

        write_atomic(&self.api_key_path, api_key, API_KEY_FILE_MODE)
    }

    pub fn base_url(&self) -> Option<String> {
        self.overrides
            .base_url
            .clone()
            .or_else(|| self.data.api.as_ref().and_then(|api| api.base_url.clone()))
    }

    pub fn retry(&self) -> Option<u32> {
        self.overrides
            .retry
            .or_else(|| self.data.api.as_ref().and_then(|api| api.retry))
    }
}

/// Write to a temporary file first, then rename over the target.
/// The temporary file is created with `mode`, so the content is never
/// readable with looser permissions.
fn write_atomic(path: &Path, content: &str, mode: u32) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)
                .map_err(|e| ConfigError::DirectoryCreationFailed(e.to_string()))?;
        }
    }

    let temp_path = path.with_extension("tmp");
    if temp_path.exists() {
        fs::remove_file(&temp_path)?;
    }

    let mut file = create_with_mode(&temp_path, mode)?;
    file.write_all(content.as_bytes())?;
    file.sync_all()?;
    drop(file);

    fs::rename(&temp_path, path)?;
    Ok(())
}

#[cfg(unix)]
fn create_with_mode(path: &Path, mode: u32) -> std::io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;
    fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(mode)
        .open(path)
}

#[cfg(not(unix))]
fn create_with_mode(path: &Path, _mode: u32) -> std::io::Result<File> {
    fs::OpenOptions::new().write(true).create_new(true).open(path)
}

/// `<platform config dir>/vastai`, e.g. `~/.config/vastai` on Linux
fn get_config_dir() -> Result<PathBuf> {
    let base = dirs::config_dir().ok_or_else(|| {
        ConfigError::DirectoryCreationFailed("Could not find config directory".to_string())
    })?;
    Ok(base.join("vastai"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> Config {
        Config::load_from(dir.path(), Some(dir.path().join("legacy_key"))).unwrap()
    }

    #[test]
    fn test_defaults_when_missing() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);

        assert_eq!(config.data, ConfigData::default());
        assert_eq!(config.base_url(), None);
        assert_eq!(config.retry(), None);
        assert_eq!(config.resolve_api_key(None).unwrap(), None);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(&dir);
        config.data.api = Some(ApiSection {
            base_url: Some("https://example.test/api/v0".to_string()),
            retry: Some(5),
        });
        config.save().unwrap();

        let reloaded = config_in(&dir);
        assert_eq!(reloaded.data, config.data);
        assert_eq!(reloaded.retry(), Some(5));
        assert!(!dir.path().join("config.tmp").exists());
    }

    #[test]
    fn test_invalid_toml() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("config.toml"), "[api\nretry = ").unwrap();

        let err = Config::load_from(dir.path(), None).unwrap_err();
        assert!(matches!(err, CliError::Config(ConfigError::TomlError(_))));
    }

    #[test]
    fn test_api_key_precedence() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("legacy_key"), "legacy\n").unwrap();
        let config = config_in(&dir);

        assert_eq!(config.resolve_api_key(None).unwrap().as_deref(), Some("legacy"));

        config.set_api_key("  stored  ").unwrap();
        assert_eq!(config.resolve_api_key(None).unwrap().as_deref(), Some("stored"));
        assert_eq!(
            config.resolve_api_key(Some("from-env".to_string())).unwrap().as_deref(),
            Some("from-env")
        );

        let config = config.with_overrides(Overrides {
            api_key: Some("from-flag".to_string()),
            ..Default::default()
        });
        assert_eq!(
            config.resolve_api_key(Some("from-env".to_string())).unwrap().as_deref(),
            Some("from-flag")
        );
    }

    #[test]
    fn test_blank_api_key_rejected() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);

        assert!(config.set_api_key("   ").is_err());
        assert!(!config.api_key_path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_api_key_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);

        // A stale temp file left with open permissions must not be reused.
        let stale = config.api_key_path.with_extension("tmp");
        fs::write(&stale, "old").unwrap();
        fs::set_permissions(&stale, fs::Permissions::from_mode(0o666)).unwrap();

        config.set_api_key("secret-key").unwrap();

        let mode = fs::metadata(&config.api_key_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert!(!stale.exists());
        assert_eq!(fs::read_to_string(&config.api_key_path).unwrap(), "secret-key");
    }

    #[test]
    fn test_overrides_win() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("config.toml"),
            "[api]\nbase_url = \"https://stored\"\nretry = 2\n",
        )
        .unwrap();

        let config = config_in(&dir).with_overrides(Overrides {
            base_url: Some("https://flag".to_string()),
            ..Default::default()
        });

        assert_eq!(config.base_url().as_deref(), Some("https://flag"));
        assert_eq!(config.retry(), Some(2));
    }
}
