use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::types::ScriptletConfig;
use crate::error::{Result, ScriptletError};

/// Environment variable overriding the Python interpreter image.
pub const PYTHON_PATH_ENV: &str = "PYTHON_PATH";

/// Environment variable overriding the Python library directory.
pub const PYTHON_LIB_PATH_ENV: &str = "PYTHON_LIB_PATH";

/// Environment variable overriding the QuickJS interpreter image.
pub const QUICKJS_PATH_ENV: &str = "QUICKJS_PATH";

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "scriptlet", "scriptlet")
}

fn home_fallback() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Get the default configuration file path
pub fn get_config_path() -> PathBuf {
    match project_dirs() {
        Some(dirs) => dirs.config_dir().join("config.toml"),
        None => home_fallback().join(".scriptlet").join("config.toml"),
    }
}

/// Get the cache directory for downloaded wasmer binaries
pub fn get_cache_dir() -> PathBuf {
    match project_dirs() {
        Some(dirs) => dirs.cache_dir().to_path_buf(),
        None => home_fallback().join(".cache").join("scriptlet"),
    }
}

/// Load configuration from file, then apply environment overrides.
///
/// An explicitly requested file must exist; the default file is optional and
/// defaults are used when it is missing. This is the only place the
/// interpreter path variables are read.
pub fn load_config(config_path: Option<&Path>) -> Result<ScriptletConfig> {
    let mut config = match config_path {
        Some(path) if !path.exists() => {
            return Err(ScriptletError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }
        Some(path) => read_config(path)?,
        None => {
            let path = get_config_path();
            if path.exists() {
                read_config(&path)?
            } else {
                ScriptletConfig::default()
            }
        }
    };

    apply_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

fn read_config(path: &Path) -> Result<ScriptletConfig> {
    debug!(path = %path.display(), "Reading configuration");
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|e| ScriptletError::TomlParse(e.to_string()))
}

/// Apply interpreter path overrides from a variable lookup.
///
/// Empty values are ignored so that `PYTHON_PATH=` does not point the adapter
/// at the current directory.
pub fn apply_overrides<F>(config: &mut ScriptletConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| lookup(key).filter(|value| !value.is_empty());

    if let Some(path) = non_empty(PYTHON_PATH_ENV) {
        config.python.binary = PathBuf::from(path);
    }
    if let Some(path) = non_empty(PYTHON_LIB_PATH_ENV) {
        config.python.lib_dir = PathBuf::from(path);
    }
    if let Some(path) = non_empty(QUICKJS_PATH_ENV) {
        config.quickjs.binary = PathBuf::from(path);
    }
}
