use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{Result, ValidationWarning};

/// Broad class of an uploaded file, decided by its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Classify a file name like "slide.PNG" or "intro.mov"
    pub fn from_name(name: &str) -> Option<Self> {
        let extension = Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())?
            .to_lowercase();

        match extension.as_str() {
            "jpg" | "jpeg" | "png" => Some(Self::Image),
            "mp4" | "mov" | "avi" => Some(Self::Video),
            _ => None,
        }
    }

    fn expected(&self) -> &'static str {
        match self {
            Self::Image => "a JPG or PNG image",
            Self::Video => "an MP4, MOV or AVI video",
        }
    }
}

/// A file supplied by the user, held in memory until it is staged
#[derive(Debug, Clone)]
pub struct Upload {
    /// Original file name, as the user sees it
    pub name: String,

    /// Raw file contents
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new<S: Into<String>>(name: S, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Read an upload from disk, keeping only the file name
    pub async fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, bytes))
    }

    pub fn kind(&self) -> Option<MediaKind> {
        MediaKind::from_name(&self.name)
    }

    /// Refuse uploads that are not of the expected kind
    pub fn expect_kind(&self, kind: MediaKind) -> std::result::Result<(), ValidationWarning> {
        if self.kind() == Some(kind) {
            Ok(())
        } else {
            Err(ValidationWarning::UnsupportedUpload {
                name: self.name.clone(),
                expected: kind.expected().to_string(),
            })
        }
    }
}

/// The finished video, held in memory for preview and download
#[derive(Debug, Clone)]
pub struct OutputVideo {
    /// Suggested download name
    pub file_name: String,

    pub mime_type: &'static str,

    pub bytes: Vec<u8>,

    /// Measured duration in seconds, when the handler knows it
    pub duration: Option<f64>,
}

impl OutputVideo {
    pub const MP4: &'static str = "video/mp4";

    pub fn mp4<S: Into<String>>(file_name: S, bytes: Vec<u8>, duration: Option<f64>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: Self::MP4,
            bytes,
            duration,
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Write the video to `path`, creating parent directories as needed
    pub async fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<PathBuf> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, &self.bytes).await?;
        info!("Saved {} ({:.1} KB) to {:?}", self.file_name, self.size() as f64 / 1024.0, path);
        Ok(path.to_path_buf())
    }
}

/// Narration written to disk together with its probed length
#[derive(Debug, Clone)]
pub struct AudioTrack {
    pub path: PathBuf,
    pub duration: f64,
}
