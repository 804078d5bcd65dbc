use std::path::{Path, PathBuf};
use std::time::Instant;

use tempfile::TempDir;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::{Result, ScriptletError};

/// A per-invocation temporary directory holding a copy of interpreter files.
///
/// Each workspace is unique, so concurrent invocations never share one. Call
/// [`Workspace::release`] once the invocation is over; a workspace that is
/// dropped without being released is still removed, just synchronously.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a fresh temporary directory and copy the contents of `source`
    /// into it.
    pub async fn provision(source: &Path) -> Result<Self> {
        let started = Instant::now();
        let provisioning_error = |source_err: std::io::Error| ScriptletError::Provisioning {
            path: source.display().to_string(),
            source: source_err,
        };

        let metadata = fs::metadata(source).await.map_err(provisioning_error)?;
        if !metadata.is_dir() {
            return Err(provisioning_error(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "library path is not a directory",
            )));
        }

        let dir = tempfile::Builder::new()
            .prefix("scriptlet-")
            .tempdir()
            .map_err(provisioning_error)?;
        info!(workspace = %dir.path().display(), "Created workspace");

        // On failure `dir` is dropped here, which removes the partial copy.
        let copied = copy_dir_contents(source, dir.path())
            .await
            .map_err(provisioning_error)?;

        info!(
            files = copied,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Copied library into workspace"
        );

        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Recursively delete the workspace.
    ///
    /// Consumes the workspace, so nothing can refer to it afterwards.
    pub async fn release(self) -> Result<()> {
        let path = self.dir.path().to_path_buf();
        tokio::task::spawn_blocking(move || self.dir.close())
            .await
            .map_err(anyhow::Error::from)??;
        debug!(workspace = %path.display(), "Released workspace");
        Ok(())
    }
}

/// Copy everything below `from` into the existing directory `to`.
///
/// Symlinks to files are copied as regular files; symlinks to directories are
/// skipped so a link back to an ancestor cannot recurse. Returns the number
/// of files copied.
async fn copy_dir_contents(from: &Path, to: &Path) -> std::io::Result<u64> {
    let mut pending: Vec<(PathBuf, PathBuf)> = vec![(from.to_path_buf(), to.to_path_buf())];
    let mut copied = 0;

    while let Some((src_dir, dst_dir)) = pending.pop() {
        let mut entries = fs::read_dir(&src_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let src = entry.path();
            let dst = dst_dir.join(entry.file_name());

            let file_type = entry.file_type().await?;

            if file_type.is_dir() {
                fs::create_dir(&dst).await?;
                pending.push((src, dst));
            } else if file_type.is_symlink() {
                match fs::metadata(&src).await {
                    Ok(target) if target.is_file() => {
                        fs::copy(&src, &dst).await?;
                        copied += 1;
                    }
                    _ => debug!(link = %src.display(), "Skipping directory or dangling symlink"),
                }
            } else {
                fs::copy(&src, &dst).await?;
                copied += 1;
            }
        }
    }

    Ok(copied)
}

/// Release a workspace, logging rather than returning a failure to delete it.
pub(crate) async fn release_logged(workspace: Workspace) {
    let path = workspace.path().to_path_buf();
    if let Err(e) = workspace.release().await {
        warn!(workspace = %path.display(), error = %e, "Failed to remove workspace");
    }
}
