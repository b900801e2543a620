use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {config_path}: {source}")]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {config_path}: {source}")]
    ConfigParseError {
        config_path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid value for {key} in {config_path}: {reason}")]
    InvalidValue {
        config_path: PathBuf,
        key: &'static str,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Revision store location; relative paths are inside the notes folder
    pub store_dir: PathBuf,
    /// Delay before the single autosave retry
    pub autosave_retry_secs: u64,
    /// Recorded on commits; falls back to `$USER` when unset
    pub author: Option<String>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            store_dir: PathBuf::from(".folio-history"),
            autosave_retry_secs: 5,
            author: None,
        }
    }
}

impl HistoryConfig {
    pub fn autosave_retry_delay(&self) -> Duration {
        Duration::from_secs(self.autosave_retry_secs)
    }

    pub fn author(&self) -> String {
        self.author
            .clone()
            .or_else(|| std::env::var("USER").ok())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    /// Largest LCS table built before falling back to an unminimized diff
    pub max_cells: usize,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            max_cells: 4_000_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub notes_path: PathBuf,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub diff: DiffConfig,
}

impl Config {
    pub fn new(notes_path: impl Into<PathBuf>) -> Self {
        Self {
            notes_path: notes_path.into(),
            history: HistoryConfig::default(),
            diff: DiffConfig::default(),
        }
    }

    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Option<Self>, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path).map_err(|source| {
            ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            }
        })?;

        let mut config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::ConfigParseError {
                config_path: config_path.to_path_buf(),
                source,
            })?;

        if config.diff.max_cells == 0 {
            return Err(ConfigError::InvalidValue {
                config_path: config_path.to_path_buf(),
                key: "diff.max_cells",
                reason: "must be greater than zero".to_string(),
            });
        }

        // Expand shell variables and tilde in the loaded paths
        config.notes_path = Self::expand_path(&config.notes_path).unwrap_or(config.notes_path);
        config.history.store_dir =
            Self::expand_path(&config.history.store_dir).unwrap_or(config.history.store_dir);

        Ok(Some(config))
    }

    pub fn load() -> Result<Option<Self>, ConfigError> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, config_path: P) -> anyhow::Result<()> {
        let config_path = config_path.as_ref();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        self.save_to_path(&config_path)
    }

    pub fn config_path() -> PathBuf {
        let config_dir = shellexpand::tilde("~/.config/folio");
        PathBuf::from(config_dir.as_ref()).join("config.toml")
    }

    /// Absolute revision store location for this notes folder
    pub fn store_dir(&self) -> PathBuf {
        self.notes_path.join(&self.history.store_dir)
    }

    fn expand_path(path: &Path) -> Option<PathBuf> {
        let path_str = path.to_string_lossy();
        match shellexpand::full(&path_str) {
            Ok(expanded) => Some(PathBuf::from(expanded.as_ref())),
            Err(_) => None,
        }
    }
}
