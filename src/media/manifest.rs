use std::path::{Path, PathBuf};

use crate::error::{Result, StagingError};

/// Input list for the FFmpeg concat demuxer
///
/// Entries keep insertion order, which is the order of the output. Every
/// entry is an absolute path that existed when it was added.
#[derive(Debug, Clone, Default)]
pub struct ConcatManifest {
    entries: Vec<PathBuf>,
}

impl ConcatManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();

        if !path.is_absolute() {
            return Err(StagingError::RelativePath { path: path.to_path_buf() }.into());
        }
        if !path.is_file() {
            return Err(StagingError::MissingAsset { path: path.to_path_buf() }.into());
        }

        let text = path.to_string_lossy();
        if text.contains('\n') || text.contains('\r') {
            return Err(StagingError::InvalidName { name: text.into_owned() }.into());
        }

        self.entries.push(path.to_path_buf());
        Ok(())
    }

    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// One `file '<path>'` line per entry
    pub fn render(&self) -> String {
        let mut list = String::new();
        for entry in &self.entries {
            list.push_str("file '");
            list.push_str(&escape(&entry.to_string_lossy()));
            list.push_str("'\n");
        }
        list
    }

    pub async fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<PathBuf> {
        let path = path.as_ref();
        tokio::fs::write(path, self.render()).await?;
        Ok(path.to_path_buf())
    }
}

/// Quote for the concat demuxer: a `'` closes the quote, escapes, and reopens
fn escape(path: &str) -> String {
    path.replace('\'', r"'\''")
}
