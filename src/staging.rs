//! # Request Staging
//!
//! Every request gets its own uniquely named scratch directory. Files handed to
//! the encoder live there, and the whole directory goes away when the
//! [`StagingArea`] is dropped, whichever way the handler returns.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::config::StagingConfig;
use crate::error::{Result, StagingError};
use crate::media::Upload;

pub struct StagingArea {
    dir: Option<TempDir>,
    path: PathBuf,
    keep: bool,
    used_names: HashSet<String>,
}

impl StagingArea {
    /// Create a fresh request directory under the configured root
    pub fn create(config: &StagingConfig) -> Result<Self> {
        let root = config.root();
        std::fs::create_dir_all(&root).map_err(|e| StagingError::CreateFailed {
            root: root.display().to_string(),
            reason: e.to_string(),
        })?;

        let dir = tempfile::Builder::new()
            .prefix(&config.prefix)
            .tempdir_in(&root)
            .map_err(|e| StagingError::CreateFailed {
                root: root.display().to_string(),
                reason: e.to_string(),
            })?;

        let path = dir.path().canonicalize()?;
        debug!("Created staging directory {:?}", path);

        Ok(Self {
            dir: Some(dir),
            path,
            keep: config.keep,
            used_names: HashSet::new(),
        })
    }

    /// Absolute path of the request directory
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of a fixed-name file inside the request directory
    pub fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Write bytes to a fixed-name file inside the request directory
    pub async fn write(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.file(name);
        tokio::fs::write(&path, bytes).await?;
        debug!("Staged {} bytes at {:?}", bytes.len(), path);
        Ok(path)
    }

    /// Persist an upload under its own name inside `subdir`.
    ///
    /// Names are reduced to their final component. A name already used in this
    /// request gets a numbered suffix so nothing staged earlier is overwritten.
    pub async fn stage_upload(&mut self, subdir: &str, upload: &Upload) -> Result<PathBuf> {
        let base = sanitize_name(&upload.name)?;
        let dir = self.path.join(subdir);
        tokio::fs::create_dir_all(&dir).await?;

        let name = self.unique_name(subdir, &base);
        let path = dir.join(&name);
        tokio::fs::write(&path, &upload.bytes).await?;
        debug!("Staged upload '{}' as {:?}", upload.name, path);
        Ok(path)
    }

    fn unique_name(&mut self, subdir: &str, base: &str) -> String {
        let (stem, ext) = split_extension(base);
        let mut candidate = base.to_string();
        let mut n = 2;
        while !self.used_names.insert(format!("{}/{}", subdir, candidate)) {
            candidate = match ext {
                Some(ext) => format!("{} ({}).{}", stem, n, ext),
                None => format!("{} ({})", stem, n),
            };
            n += 1;
        }
        candidate
    }

    /// Remove the request directory now, reporting failures
    pub fn release(mut self) -> Result<()> {
        self.release_inner()
    }

    /// Release once the result is in hand; a directory that cannot be removed
    /// is logged and left behind. Returns whether the release succeeded.
    pub fn release_or_warn(self) -> bool {
        let path = self.path.clone();
        match self.release() {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to remove staging directory {:?}: {}", path, e);
                false
            }
        }
    }

    fn release_inner(&mut self) -> Result<()> {
        let Some(dir) = self.dir.take() else {
            return Ok(());
        };

        if self.keep {
            let kept = dir.keep();
            info!("Keeping staging directory {:?}", kept);
            return Ok(());
        }

        dir.close()?;
        debug!("Removed staging directory {:?}", self.path);
        Ok(())
    }
}

impl Drop for StagingArea {
    fn drop(&mut self) {
        if let Err(e) = self.release_inner() {
            warn!("Failed to remove staging directory {:?}: {}", self.path, e);
        }
    }
}

/// Reduce an upload name to a safe single path component
pub fn sanitize_name(name: &str) -> Result<String> {
    let invalid = || StagingError::InvalidName { name: name.to_string() };

    if name.chars().any(char::is_control) {
        return Err(invalid().into());
    }

    // Accept both separators; uploads may come from any platform.
    let last = name
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .map(str::trim)
        .unwrap_or("");

    if last.is_empty() || last == "." || last == ".." {
        return Err(invalid().into());
    }

    Ok(last.to_string())
}

fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], Some(&name[idx + 1..])),
        _ => (name, None),
    }
}
