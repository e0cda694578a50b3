//! # Speech Synthesis
//!
//! Turns the narration script into encoded audio bytes.
//!
//! Two providers ship with the crate:
//!
//! - [`GoogleTranslateTts`] - the Google Translate TTS endpoint (MP3), the default
//! - [`CommandTts`] - any local program that reads text on stdin and writes an audio file
//!
//! Calls go through a [`RetryPolicy`], which bounds each attempt with a timeout
//! and retries transient failures a fixed number of times.

pub mod command;
pub mod google;

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::{SpeechConfig, SpeechProvider};
use crate::error::{Result, SpeechError};

pub use command::CommandTts;
pub use google::GoogleTranslateTts;

/// A text-to-speech backend
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// File extension of the audio this backend produces
    fn audio_extension(&self) -> &str;

    /// Upstream requests one call for `text` makes; scales the attempt timeout
    fn request_count(&self, _text: &str) -> usize {
        1
    }

    /// Synthesize `text` in `language` and return the encoded audio
    async fn synthesize(&self, text: &str, language: &str) -> Result<Vec<u8>>;
}

/// Build the configured backend
pub fn from_config(config: &SpeechConfig) -> Result<Box<dyn SpeechSynthesizer>> {
    match config.provider {
        SpeechProvider::Google => Ok(Box::new(GoogleTranslateTts::new(config)?)),
        SpeechProvider::Command => Ok(Box::new(CommandTts::new(config))),
    }
}

/// Per-attempt timeout plus bounded retries with linear backoff
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub max_retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &SpeechConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_secs),
            max_retries: config.max_retries,
            backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }

    /// `timeout` applies per upstream request, so a chunked script gets one
    /// slice per chunk
    pub fn attempt_timeout(&self, synthesizer: &dyn SpeechSynthesizer, text: &str) -> Duration {
        let requests = synthesizer.request_count(text).clamp(1, u32::MAX as usize) as u32;
        self.timeout.saturating_mul(requests)
    }

    /// Run the synthesizer until it succeeds, fails permanently, or attempts run out
    pub async fn synthesize(
        &self,
        synthesizer: &dyn SpeechSynthesizer,
        text: &str,
        language: &str,
    ) -> Result<Vec<u8>> {
        let attempts = self.max_retries + 1;
        let budget = self.attempt_timeout(synthesizer, text);
        let mut attempt = 1;

        loop {
            debug!("{} attempt {}/{}", synthesizer.name(), attempt, attempts);

            let result = match tokio::time::timeout(budget, synthesizer.synthesize(text, language))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(SpeechError::TimedOut {
                    seconds: budget.as_secs(),
                }
                .into()),
            };

            let err = match result {
                Ok(bytes) if bytes.is_empty() => return Err(SpeechError::EmptyAudio.into()),
                Ok(bytes) => return Ok(bytes),
                Err(err) if !err.is_recoverable() => return Err(err),
                Err(err) => err,
            };

            if attempt >= attempts {
                return Err(SpeechError::Unavailable {
                    attempts,
                    last: err.to_string(),
                }
                .into());
            }

            warn!(
                "{} failed (attempt {}/{}): {}; retrying",
                synthesizer.name(),
                attempt,
                attempts,
                err
            );
            tokio::time::sleep(self.backoff * attempt).await;
            attempt += 1;
        }
    }
}
