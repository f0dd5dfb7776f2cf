//! Configuration file support for mlbase.
//!
//! Loads an optional `config.toml` from `$MLBASE_CONFIG` or
//! `<config_dir>/mlbase/config.toml`. Every field has a default, so a missing
//! file is never an error.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "MLBASE_CONFIG";

const APP_DIR: &str = "mlbase";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("failed to render config: {0}")]
    Render(#[from] toml::ser::Error),
}

/// Editor command: a single command line or an explicit argv.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EditorSetting {
    Line(String),
    Argv(Vec<String>),
}

impl Default for EditorSetting {
    fn default() -> Self {
        match std::env::var("EDITOR") {
            Ok(editor) if !editor.trim().is_empty() => EditorSetting::Line(editor),
            _ => EditorSetting::Argv(vec!["vi".to_string()]),
        }
    }
}

impl EditorSetting {
    /// Program followed by its leading arguments. Never empty.
    pub fn argv(&self) -> Vec<String> {
        let argv: Vec<String> = match self {
            EditorSetting::Line(line) => line.split_whitespace().map(String::from).collect(),
            EditorSetting::Argv(argv) => argv.iter().filter(|a| !a.is_empty()).cloned().collect(),
        };
        if argv.is_empty() {
            vec!["vi".to_string()]
        } else {
            argv
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Editor launched by `config edit`.
    pub editor: EditorSetting,
    /// Where tools built on mlbase keep their data.
    pub storage: PathBuf,
    /// Plugin descriptor document (TOML or JSON).
    pub plugin_config: PathBuf,
    /// Root of the cache directories used by `git` plugins.
    pub plugin_cache: PathBuf,

    /// File this config was loaded from (or would be).
    #[serde(skip)]
    pub config_path: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        let config_dir = base_dir(dirs::config_dir()).join(APP_DIR);
        Self {
            editor: EditorSetting::default(),
            storage: base_dir(dirs::data_dir()).join(APP_DIR),
            plugin_config: config_dir.join("plugins.toml"),
            plugin_cache: base_dir(dirs::cache_dir()).join(APP_DIR).join("plugins"),
            config_path: config_dir.join("config.toml"),
        }
    }
}

fn base_dir(dir: Option<PathBuf>) -> PathBuf {
    dir.unwrap_or_else(|| PathBuf::from("."))
}

/// Expand a leading `~/` to the home directory.
pub fn expand_path(raw: &Path) -> PathBuf {
    if let Ok(stripped) = raw.strip_prefix("~")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(stripped);
    }
    raw.to_path_buf()
}

/// Config file location: `$MLBASE_CONFIG`, else the platform config dir.
pub fn default_config_path() -> PathBuf {
    match std::env::var_os(CONFIG_ENV) {
        Some(path) if !path.is_empty() => expand_path(Path::new(&path)),
        _ => base_dir(dirs::config_dir())
            .join(APP_DIR)
            .join("config.toml"),
    }
}

impl AppConfig {
    /// Load from the default location.
    /// Returns default config if file doesn't exist or is invalid.
    pub fn load() -> Self {
        Self::load_from_path(&default_config_path())
    }

    /// Load config from a specific path, warning about and ignoring a broken
    /// file.
    pub fn load_from_path(path: &Path) -> Self {
        match Self::try_load_from_path(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("[mlbase][warn] {}", e);
                Self {
                    config_path: path.to_path_buf(),
                    ..Self::default()
                }
            }
        }
    }

    /// Strict variant of [`AppConfig::load_from_path`].
    pub fn try_load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file; using defaults");
            return Ok(Self {
                config_path: path.to_path_buf(),
                ..Self::default()
            });
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: AppConfig =
            toml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.storage = expand_path(&config.storage);
        config.plugin_config = expand_path(&config.plugin_config);
        config.plugin_cache = expand_path(&config.plugin_cache);
        config.config_path = path.to_path_buf();
        Ok(config)
    }

    /// Effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}
