use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the Slide Studio library
#[derive(Error, Debug)]
pub enum StudioError {
    #[error("{0}")]
    Warning(#[from] ValidationWarning),

    #[error("Slide image error: {0}")]
    Slide(#[from] SlideError),

    #[error("Speech synthesis error: {0}")]
    Speech(#[from] SpeechError),

    #[error("Encoder error: {0}")]
    Encoder(#[from] EncoderError),

    #[error("Staging error: {0}")]
    Staging(#[from] StagingError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Generic error: {0}")]
    Generic(String),
}

/// Input problems reported back to the user instead of failing the request.
///
/// Handlers return these before any staging happens.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationWarning {
    #[error("Please upload an image slide.")]
    MissingImage,

    #[error("Please enter some text.")]
    EmptyScript,

    #[error("Please upload at least one video file.")]
    NoVideos,

    #[error("Unsupported upload '{name}': expected {expected}")]
    UnsupportedUpload { name: String, expected: String },
}

/// Slide image errors
#[derive(Error, Debug)]
pub enum SlideError {
    #[error("Unsupported image format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Failed to decode image: {reason}")]
    DecodeFailed { reason: String },

    #[error("Image too small for an even-sized frame: {width}x{height}")]
    TooSmall { width: u32, height: u32 },

    #[error("Failed to save staged image {path}: {reason}")]
    SaveFailed { path: String, reason: String },
}

/// Speech synthesis errors
#[derive(Error, Debug)]
pub enum SpeechError {
    #[error("Speech request failed: {reason}")]
    RequestFailed { reason: String },

    #[error("Speech service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Speech synthesis timed out after {seconds}s")]
    TimedOut { seconds: u64 },

    #[error("Speech service returned no audio")]
    EmptyAudio,

    #[error("Speech command failed: {message}")]
    CommandFailed { message: String },

    #[error("Speech service unavailable after {attempts} attempts: {last}")]
    Unavailable { attempts: u32, last: String },
}

/// Errors from the external encoder and prober processes
#[derive(Error, Debug)]
pub enum EncoderError {
    #[error("{program} not found. Please install FFmpeg.")]
    NotFound { program: String },

    #[error("{program} failed (exit code {exit_code}): {stderr}")]
    Failed {
        program: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("{program} did not finish within {seconds}s")]
    TimedOut { program: String, seconds: u64 },

    #[error("{program} reported success but produced no output at {path}")]
    MissingOutput { program: String, path: String },

    #[error("Failed to probe {path}: {reason}")]
    ProbeFailed { path: String, reason: String },

    #[error("No audio stream found in {path}")]
    NoAudioStream { path: String },

    #[error("Input videos cannot be stream-copied together: {details}")]
    IncompatibleInputs { details: String },
}

/// Staging area errors
#[derive(Error, Debug)]
pub enum StagingError {
    #[error("Failed to create staging directory under {root}: {reason}")]
    CreateFailed { root: String, reason: String },

    #[error("Invalid upload name: {name:?}")]
    InvalidName { name: String },

    #[error("Staged asset missing: {}", .path.display())]
    MissingAsset { path: PathBuf },

    #[error("Manifest paths must be absolute: {}", .path.display())]
    RelativePath { path: PathBuf },
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path}: {reason}")]
    ParseFailed { path: String, reason: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Convenience type alias for Results using StudioError
pub type Result<T> = std::result::Result<T, StudioError>;

impl StudioError {
    /// Create a generic error with a custom message
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }

    /// Validation tier: the request was rejected, nothing failed
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::Warning(_))
    }

    /// An external collaborator did not answer in time
    pub fn is_upstream_unavailable(&self) -> bool {
        matches!(
            self,
            Self::Speech(SpeechError::TimedOut { .. })
                | Self::Speech(SpeechError::Unavailable { .. })
                | Self::Encoder(EncoderError::TimedOut { .. })
        )
    }

    /// Check if this error is worth retrying
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Speech(SpeechError::TimedOut { .. }) => true,
            Self::Speech(SpeechError::RequestFailed { .. }) => true,
            Self::Speech(SpeechError::Status { status, .. }) => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Warning(warning) => warning.to_string(),
            Self::Encoder(EncoderError::Failed { program, stderr, .. }) => {
                format!("Error running {}: {}", program, stderr)
            }
            Self::Encoder(EncoderError::IncompatibleInputs { details }) => {
                format!(
                    "Error while combining videos: {}. All videos must share the same codecs and resolution.",
                    details
                )
            }
            Self::Config(ConfigError::FileNotFound { path }) => {
                format!("Configuration file '{}' not found.", path)
            }
            _ if self.is_upstream_unavailable() => {
                format!("Upstream unavailable: {}", self)
            }
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_tier() {
        let err: StudioError = ValidationWarning::EmptyScript.into();
        assert!(err.is_warning());
        assert!(!err.is_recoverable());
        assert_eq!(err.user_message(), "Please enter some text.");
    }

    #[test]
    fn test_timeouts_are_upstream_unavailable() {
        let speech: StudioError = SpeechError::TimedOut { seconds: 5 }.into();
        assert!(speech.is_upstream_unavailable());
        assert!(speech.is_recoverable());

        let encoder: StudioError = EncoderError::TimedOut {
            program: "ffmpeg".to_string(),
            seconds: 60,
        }
        .into();
        assert!(encoder.is_upstream_unavailable());
        assert!(!encoder.is_recoverable());
        assert!(encoder.user_message().starts_with("Upstream unavailable"));
    }

    #[test]
    fn test_http_status_recoverability() {
        let server: StudioError = SpeechError::Status { status: 503, body: String::new() }.into();
        let throttled: StudioError = SpeechError::Status { status: 429, body: String::new() }.into();
        let client: StudioError = SpeechError::Status { status: 400, body: String::new() }.into();
        assert!(server.is_recoverable());
        assert!(throttled.is_recoverable());
        assert!(!client.is_recoverable());
    }

    #[test]
    fn test_encoder_failure_shows_stderr_verbatim() {
        let err: StudioError = EncoderError::Failed {
            program: "ffmpeg".to_string(),
            exit_code: 1,
            stderr: "Invalid data found when processing input".to_string(),
        }
        .into();
        assert_eq!(
            err.user_message(),
            "Error running ffmpeg: Invalid data found when processing input"
        );
    }
}
