use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default location of the Python interpreter image.
pub const DEFAULT_PYTHON_BINARY: &str = "wasm/python/bin/python.wasm";

/// Default location of the Python standard library copied into each workspace.
pub const DEFAULT_PYTHON_LIB_DIR: &str = "wasm/python/lib";

/// Default location of the QuickJS interpreter image.
pub const DEFAULT_QUICKJS_BINARY: &str = "wasm/quickjs/quickjs.wasm";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptletConfig {
    pub python: PythonConfig,
    pub quickjs: QuickJsConfig,
    pub wasmer: WasmerConfig,
}

/// Python interpreter image and the library directory it imports from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PythonConfig {
    /// Path to python.wasm
    pub binary: PathBuf,
    /// Directory copied into every workspace and mapped to `lib` in the sandbox
    pub lib_dir: PathBuf,
}

impl Default for PythonConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from(DEFAULT_PYTHON_BINARY),
            lib_dir: PathBuf::from(DEFAULT_PYTHON_LIB_DIR),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuickJsConfig {
    /// Path to quickjs.wasm
    pub binary: PathBuf,
}

impl Default for QuickJsConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from(DEFAULT_QUICKJS_BINARY),
        }
    }
}

/// Wasmer-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WasmerConfig {
    /// Path to the wasmer CLI (looked up on PATH, then in the cache if not set)
    pub binary: Option<PathBuf>,
    /// Kill the sandboxed process after this many seconds
    pub timeout_seconds: Option<u64>,
    /// Download wasmer into the cache directory when it cannot be found
    pub auto_download: bool,
}

impl Default for WasmerConfig {
    fn default() -> Self {
        Self {
            binary: None,
            timeout_seconds: None,
            auto_download: true,
        }
    }
}
