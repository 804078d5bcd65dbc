use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::loader::get_cache_dir;
use crate::config::types::WasmerConfig;
use crate::error::{Result, ScriptletError};
use crate::sandbox::traits::SandboxExecutor;
use crate::sandbox::ExecutionResult;

/// Wasmer version to download if not installed
#[cfg(feature = "download")]
const WASMER_VERSION: &str = "v6.0.0";

#[cfg(windows)]
const WASMER_EXE: &str = "wasmer.exe";
#[cfg(not(windows))]
const WASMER_EXE: &str = "wasmer";

/// Runs interpreter images with `wasmer run`.
///
/// The argument vector handed to [`SandboxExecutor::run`] is passed through
/// unchanged after `run`, so it starts with the image path followed by any
/// wasmer flags, `--`, and the interpreter's own arguments.
pub struct WasmerExecutor {
    binary: PathBuf,
    timeout: Option<Duration>,
}

impl WasmerExecutor {
    /// Create an executor, locating (and if allowed downloading) wasmer.
    pub async fn new(config: &WasmerConfig) -> Result<Self> {
        let binary = locate_wasmer(config).await?;
        Ok(Self::with_binary(binary, config.timeout_seconds))
    }

    /// Create an executor for a known wasmer binary without probing it.
    pub fn with_binary(binary: PathBuf, timeout_seconds: Option<u64>) -> Self {
        Self {
            binary,
            timeout: timeout_seconds.map(Duration::from_secs),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

#[async_trait]
impl SandboxExecutor for WasmerExecutor {
    fn name(&self) -> &str {
        "wasmer"
    }

    async fn run(&self, args: &[String]) -> Result<ExecutionResult> {
        debug!(
            binary = %self.binary.display(),
            image = args.first().map(String::as_str).unwrap_or_default(),
            argc = args.len(),
            "Running wasmer"
        );

        let mut cmd = Command::new(&self.binary);
        cmd.arg("run");
        cmd.args(args);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let launched = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, cmd.output())
                .await
                .map_err(|_| ScriptletError::SandboxTimeout {
                    seconds: limit.as_secs(),
                })?,
            None => cmd.output().await,
        };

        let output = launched.map_err(|source| ScriptletError::SandboxLaunch {
            binary: self.binary.display().to_string(),
            source,
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        debug!(
            exit_code = ?output.status.code(),
            stdout_len = stdout.len(),
            stderr_len = stderr.len(),
            "wasmer completed"
        );

        if !output.status.success() {
            return Err(ScriptletError::SandboxExecution {
                exit_code: output.status.code(),
                stdout,
                stderr,
            });
        }

        Ok(ExecutionResult { stdout, stderr })
    }
}

/// Find a working wasmer binary.
///
/// Checks in order:
/// 1. The configured path
/// 2. System PATH
/// 3. Cached download
/// 4. Downloads from GitHub releases (when `auto_download` is set)
pub async fn locate_wasmer(config: &WasmerConfig) -> Result<PathBuf> {
    if let Some(path) = &config.binary {
        return match wasmer_version(path).await {
            Some(version) => {
                info!(version = %version, path = %path.display(), "Using configured wasmer");
                Ok(path.clone())
            }
            None => Err(ScriptletError::WasmerNotFound {
                path: path.display().to_string(),
            }),
        };
    }

    let system = PathBuf::from(WASMER_EXE);
    if let Some(version) = wasmer_version(&system).await {
        info!(version = %version, "Using system wasmer");
        return Ok(system);
    }

    let cached = get_cache_dir().join("wasmer").join(WASMER_EXE);
    if let Some(version) = wasmer_version(&cached).await {
        info!(version = %version, path = %cached.display(), "Using cached wasmer");
        return Ok(cached);
    }

    if !config.auto_download {
        return Err(ScriptletError::SandboxInit(
            "wasmer is not installed. Install it with: curl https://get.wasmer.io -sSfL | sh"
                .to_string(),
        ));
    }

    download_wasmer(&cached).await
}

/// Returns the `--version` output if the binary runs.
async fn wasmer_version(binary: &Path) -> Option<String> {
    let output = Command::new(binary)
        .arg("--version")
        .stdin(Stdio::null())
        .output()
        .await
        .ok()?;

    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

#[cfg(not(feature = "download"))]
async fn download_wasmer(_target: &Path) -> Result<PathBuf> {
    Err(ScriptletError::SandboxInit(
        "wasmer is not installed and download support was not compiled in".to_string(),
    ))
}

#[cfg(feature = "download")]
fn release_url() -> Result<String> {
    let os = match std::env::consts::OS {
        "linux" => "linux",
        "macos" => "darwin",
        "windows" => "windows",
        other => {
            return Err(ScriptletError::SandboxInit(format!(
                "No wasmer release for OS: {}",
                other
            )))
        }
    };
    let arch = match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        other => {
            return Err(ScriptletError::SandboxInit(format!(
                "No wasmer release for architecture: {}",
                other
            )))
        }
    };

    Ok(format!(
        "https://github.com/wasmerio/wasmer/releases/download/{}/wasmer-{}-{}.tar.gz",
        WASMER_VERSION, os, arch
    ))
}

/// Download the wasmer release tarball and install its binary at `target`.
#[cfg(feature = "download")]
async fn download_wasmer(target: &Path) -> Result<PathBuf> {
    let url = release_url()?;
    info!(url = %url, "Downloading wasmer {}", WASMER_VERSION);

    let response = reqwest::get(&url)
        .await
        .map_err(|e| ScriptletError::SandboxInit(format!("Failed to download wasmer: {}", e)))?;
    if !response.status().is_success() {
        return Err(ScriptletError::SandboxInit(format!(
            "Failed to download wasmer: HTTP {}",
            response.status()
        )));
    }
    let archive_bytes = response
        .bytes()
        .await
        .map_err(|e| ScriptletError::SandboxInit(format!("Failed to read wasmer archive: {}", e)))?;

    let install_dir = target
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(get_cache_dir);
    tokio::fs::create_dir_all(&install_dir).await?;

    // Unpack next to the final location so the rename stays on one filesystem.
    let unpack_dir = tempfile::Builder::new()
        .prefix("wasmer-unpack-")
        .tempdir_in(&install_dir)?;
    let unpack_path = unpack_dir.path().to_path_buf();

    tokio::task::spawn_blocking(move || {
        let decoder = flate2::read::GzDecoder::new(std::io::Cursor::new(archive_bytes));
        tar::Archive::new(decoder).unpack(&unpack_path)
    })
    .await
    .map_err(anyhow::Error::from)?
    .map_err(|e| ScriptletError::SandboxInit(format!("Failed to extract wasmer: {}", e)))?;

    let extracted = [
        unpack_dir.path().join("bin").join(WASMER_EXE),
        unpack_dir.path().join(WASMER_EXE),
    ]
    .into_iter()
    .find(|candidate| candidate.exists())
    .ok_or_else(|| {
        ScriptletError::SandboxInit("Could not find wasmer binary in archive".to_string())
    })?;
    tokio::fs::rename(&extracted, target).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(target, std::fs::Permissions::from_mode(0o755)).await?;
    }

    match wasmer_version(target).await {
        Some(version) => {
            info!(version = %version, path = %target.display(), "wasmer ready");
            Ok(target.to_path_buf())
        }
        None => Err(ScriptletError::SandboxInit(
            "Downloaded wasmer binary not working".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binary_is_launch_error() {
        let dir = tempfile::tempdir().unwrap();
        let executor = WasmerExecutor::with_binary(dir.path().join("no-such-wasmer"), None);

        let err = executor
            .run(&["python.wasm".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, ScriptletError::SandboxLaunch { .. }));
    }

    #[tokio::test]
    async fn test_configured_binary_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let config = WasmerConfig {
            binary: Some(dir.path().join("wasmer")),
            timeout_seconds: None,
            auto_download: false,
        };

        let err = locate_wasmer(&config).await.unwrap_err();
        assert!(matches!(err, ScriptletError::WasmerNotFound { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_execution_error() {
        let executor = WasmerExecutor::with_binary(PathBuf::from("false"), None);
        let err = executor
            .run(&["image.wasm".to_string()])
            .await
            .unwrap_err();

        match err {
            ScriptletError::SandboxExecution { exit_code, .. } => {
                assert_eq!(exit_code, Some(1));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_arguments_follow_run() {
        let executor = WasmerExecutor::with_binary(PathBuf::from("echo"), Some(30));
        let result = executor
            .run(&["image.wasm".to_string(), "--".to_string(), "-q".to_string()])
            .await
            .unwrap();

        assert_eq!(result.stdout, "run image.wasm -- -q\n");
        assert_eq!(result.stderr, "");
    }
}
