use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Main configuration for Slide Studio
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Speech synthesis settings
    pub speech: SpeechConfig,

    /// External encoder and prober settings
    pub encoder: EncoderConfig,

    /// Slide-to-video output settings
    pub slide: SlideConfig,

    /// Concatenation settings
    pub concat: ConcatConfig,

    /// Per-request staging settings
    pub staging: StagingConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidValue {
            key: "config".to_string(),
            value: e.to_string(),
        })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.speech.validate()?;
        self.encoder.validate()?;
        self.slide.validate()?;
        Ok(())
    }
}

fn invalid(key: &str, value: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

/// Which speech backend turns the script into audio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeechProvider {
    /// Google Translate's TTS endpoint (MP3)
    Google,
    /// Any local command that writes an audio file, e.g. Piper
    Command,
}

/// Speech synthesis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub provider: SpeechProvider,

    /// Language code passed to the service
    pub language: String,

    /// Endpoint for the Google provider
    pub endpoint: String,

    /// Maximum characters per request for the Google provider
    pub max_chunk_chars: usize,

    /// Per-attempt timeout in seconds
    pub timeout_secs: u64,

    /// Extra attempts after the first one fails recoverably
    pub max_retries: u32,

    /// Backoff between attempts, multiplied by the attempt number
    pub retry_backoff_ms: u64,

    /// argv for the command provider; `{output}` is replaced with the audio path
    pub command: Vec<String>,

    /// Extension of the file the command provider writes
    pub command_audio_extension: String,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            provider: SpeechProvider::Google,
            language: "en".to_string(),
            endpoint: "https://translate.google.com/translate_tts".to_string(),
            max_chunk_chars: 100,
            timeout_secs: 30,
            max_retries: 2,
            retry_backoff_ms: 500,
            command: vec![
                "piper".to_string(),
                "--model".to_string(),
                "en_US-amy-medium.onnx".to_string(),
                "--output_file".to_string(),
                "{output}".to_string(),
            ],
            command_audio_extension: "wav".to_string(),
        }
    }
}

impl SpeechConfig {
    fn validate(&self) -> Result<()> {
        if self.language.trim().is_empty() {
            return Err(invalid("speech.language", &self.language).into());
        }

        if self.timeout_secs == 0 {
            return Err(invalid("speech.timeout_secs", self.timeout_secs).into());
        }

        match self.provider {
            SpeechProvider::Google => {
                if !(1..=100).contains(&self.max_chunk_chars) {
                    return Err(invalid("speech.max_chunk_chars", self.max_chunk_chars).into());
                }
            }
            SpeechProvider::Command => {
                if self.command.is_empty() || !self.command.iter().any(|a| a.contains("{output}")) {
                    return Err(invalid("speech.command", self.command.join(" ")).into());
                }
                if self.command_audio_extension.trim().is_empty() {
                    return Err(invalid(
                        "speech.command_audio_extension",
                        &self.command_audio_extension,
                    )
                    .into());
                }
            }
        }

        Ok(())
    }
}

/// External tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Encoder program
    pub ffmpeg: String,

    /// Arguments placed before every encoder invocation
    pub ffmpeg_args: Vec<String>,

    /// Prober program
    pub ffprobe: String,

    /// Arguments placed before every prober invocation
    pub ffprobe_args: Vec<String>,

    /// Wall-clock limit for a single encoder or prober run
    pub timeout_secs: u64,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffmpeg_args: vec!["-hide_banner".to_string(), "-nostdin".to_string()],
            ffprobe: "ffprobe".to_string(),
            ffprobe_args: vec!["-hide_banner".to_string()],
            timeout_secs: 600,
        }
    }
}

impl EncoderConfig {
    fn validate(&self) -> Result<()> {
        if self.ffmpeg.trim().is_empty() {
            return Err(invalid("encoder.ffmpeg", &self.ffmpeg).into());
        }
        if self.ffprobe.trim().is_empty() {
            return Err(invalid("encoder.ffprobe", &self.ffprobe).into());
        }
        if self.timeout_secs == 0 {
            return Err(invalid("encoder.timeout_secs", self.timeout_secs).into());
        }
        Ok(())
    }
}

/// Slide-to-video encoding parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlideConfig {
    /// Frame rate of the looped still image
    pub framerate: u32,
    pub video_codec: String,
    pub pixel_format: String,
    pub audio_codec: String,
    pub audio_bitrate: String,

    /// Name offered for the produced file
    pub output_name: String,
}

impl Default for SlideConfig {
    fn default() -> Self {
        Self {
            framerate: 1,
            video_codec: "libx264".to_string(),
            pixel_format: "yuv420p".to_string(),
            audio_codec: "aac".to_string(),
            audio_bitrate: "192k".to_string(),
            output_name: "tts_slide.mp4".to_string(),
        }
    }
}

impl SlideConfig {
    fn validate(&self) -> Result<()> {
        if self.framerate == 0 {
            return Err(invalid("slide.framerate", self.framerate).into());
        }

        for (key, value) in [
            ("slide.video_codec", &self.video_codec),
            ("slide.pixel_format", &self.pixel_format),
            ("slide.audio_codec", &self.audio_codec),
            ("slide.audio_bitrate", &self.audio_bitrate),
            ("slide.output_name", &self.output_name),
        ] {
            if value.trim().is_empty() {
                return Err(invalid(key, value).into());
            }
        }

        Ok(())
    }
}

/// Concatenation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcatConfig {
    /// Probe every input and refuse mismatched streams before invoking the encoder
    pub verify_compatibility: bool,

    /// Name offered for the combined file
    pub output_name: String,
}

impl Default for ConcatConfig {
    fn default() -> Self {
        Self {
            verify_compatibility: true,
            output_name: "final_combined_video.mp4".to_string(),
        }
    }
}

/// Per-request staging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingConfig {
    /// Parent of the request directories (platform temp dir when unset)
    pub root: Option<PathBuf>,

    /// Prefix of each request directory name
    pub prefix: String,

    /// Leave request directories on disk for inspection
    pub keep: bool,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            root: None,
            prefix: "slide-studio-".to_string(),
            keep: false,
        }
    }
}

impl StagingConfig {
    pub fn root(&self) -> PathBuf {
        self.root.clone().unwrap_or_else(std::env::temp_dir)
    }
}
