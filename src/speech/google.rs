use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::SpeechConfig;
use crate::error::{Result, SpeechError};
use crate::speech::SpeechSynthesizer;

const USER_AGENT: &str = concat!("slide-studio/", env!("CARGO_PKG_VERSION"));

/// Google Translate's TTS endpoint
///
/// The endpoint only accepts short snippets, so the script is split into
/// chunks and the MP3 responses are concatenated in order. MP3 frames are
/// self-delimiting, so the joined bytes play back as one stream.
pub struct GoogleTranslateTts {
    client: reqwest::Client,
    endpoint: String,
    max_chunk_chars: usize,
    timeout: Duration,
}

impl GoogleTranslateTts {
    pub fn new(config: &SpeechConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| SpeechError::RequestFailed {
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            max_chunk_chars: config.max_chunk_chars,
            timeout,
        })
    }

    fn request_error(&self, e: reqwest::Error) -> SpeechError {
        if e.is_timeout() {
            SpeechError::TimedOut {
                seconds: self.timeout.as_secs(),
            }
        } else {
            SpeechError::RequestFailed {
                reason: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for GoogleTranslateTts {
    fn name(&self) -> &str {
        "google-translate-tts"
    }

    fn audio_extension(&self) -> &str {
        "mp3"
    }

    fn request_count(&self, text: &str) -> usize {
        split_text(text, self.max_chunk_chars).len()
    }

    async fn synthesize(&self, text: &str, language: &str) -> Result<Vec<u8>> {
        let chunks = split_text(text, self.max_chunk_chars);
        let total = chunks.len().to_string();
        info!("Synthesizing {} chars in {} request(s)", text.chars().count(), chunks.len());

        let mut audio = Vec::new();
        for (idx, chunk) in chunks.iter().enumerate() {
            let idx = idx.to_string();
            let textlen = chunk.chars().count().to_string();
            debug!("TTS chunk {}: {:?}", idx, chunk);

            let response = self
                .client
                .get(&self.endpoint)
                .query(&[
                    ("ie", "UTF-8"),
                    ("q", chunk.as_str()),
                    ("tl", language),
                    ("client", "tw-ob"),
                    ("total", total.as_str()),
                    ("idx", idx.as_str()),
                    ("textlen", textlen.as_str()),
                ])
                .send()
                .await
                .map_err(|e| self.request_error(e))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(SpeechError::Status {
                    status: status.as_u16(),
                    body: body.chars().take(200).collect(),
                }
                .into());
            }

            let bytes = response.bytes().await.map_err(|e| self.request_error(e))?;
            audio.extend_from_slice(&bytes);
        }

        Ok(audio)
    }
}

/// Split on whitespace into chunks of at most `max_chars` characters.
///
/// Words longer than the limit are cut into pieces.
pub fn split_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if word_len > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = word.chars().collect();
            for piece in chars.chunks(max_chars) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }

        if current.is_empty() {
            current.push_str(word);
            current_len = word_len;
        } else if current_len + 1 + word_len <= max_chars {
            current.push(' ');
            current.push_str(word);
            current_len += 1 + word_len;
        } else {
            chunks.push(std::mem::replace(&mut current, word.to_string()));
            current_len = word_len;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
