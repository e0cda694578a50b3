//! # Slide Studio
//!
//! Turn a slide image and a script into a narrated video, or stitch video clips
//! together end to end.
//!
//! Both handlers stage their inputs in a private scratch directory, drive FFmpeg,
//! and return the finished MP4 as bytes. The scratch directory is removed on
//! every exit path.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use slide_studio::{Config, SlideComposer, SlideRequest, Upload};
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let composer = SlideComposer::new(Config::default())?;
//!
//! let video = composer
//!     .compose(SlideRequest {
//!         image: Some(Upload::from_path("slide.png").await?),
//!         script: "Welcome to the quarterly review.".to_string(),
//!         language: None,
//!     })
//!     .await?;
//!
//! video.save_to("tts_slide.mp4").await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`composition`] - The slide and concatenation handlers
//! - [`speech`] - Text-to-speech providers and the retry policy around them
//! - [`media`] - FFmpeg/FFprobe wrappers, slide images, concat manifests
//! - [`staging`] - Per-request scratch directories
//! - [`config`] - Configuration management
//!
//! ## Custom Speech Providers
//!
//! Any backend can narrate slides by implementing
//! [`SpeechSynthesizer`](speech::SpeechSynthesizer):
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use slide_studio::speech::SpeechSynthesizer;
//! use slide_studio::Result;
//!
//! struct Silence;
//!
//! #[async_trait]
//! impl SpeechSynthesizer for Silence {
//!     fn name(&self) -> &str {
//!         "silence"
//!     }
//!
//!     fn audio_extension(&self) -> &str {
//!         "wav"
//!     }
//!
//!     async fn synthesize(&self, _text: &str, _language: &str) -> Result<Vec<u8>> {
//!         // Produce WAV bytes here
//!         Ok(Vec::new())
//!     }
//! }
//! ```

pub mod composition;
pub mod config;
pub mod error;
pub mod media;
pub mod speech;
pub mod staging;

// Re-export commonly used types for convenience
pub use crate::{
    composition::{ConcatRequest, SlideComposer, SlideRequest, VideoConcatenator},
    config::Config,
    error::{Result, StudioError},
    media::{OutputVideo, Upload},
};
