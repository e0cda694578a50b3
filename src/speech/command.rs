use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::SpeechConfig;
use crate::error::{Result, SpeechError};
use crate::speech::SpeechSynthesizer;

/// A local TTS program such as Piper
///
/// The script is written to the program's stdin. `{output}` in the argv is
/// replaced with the path the program must write, and `{language}` with the
/// requested language code.
pub struct CommandTts {
    argv: Vec<String>,
    extension: String,
}

impl CommandTts {
    pub fn new(config: &SpeechConfig) -> Self {
        Self {
            argv: config.command.clone(),
            extension: config.command_audio_extension.clone(),
        }
    }

    fn failed(message: impl Into<String>) -> SpeechError {
        SpeechError::CommandFailed {
            message: message.into(),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for CommandTts {
    fn name(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or("command")
    }

    fn audio_extension(&self) -> &str {
        &self.extension
    }

    async fn synthesize(&self, text: &str, language: &str) -> Result<Vec<u8>> {
        let (program, rest) = self
            .argv
            .split_first()
            .ok_or_else(|| Self::failed("no command configured"))?;

        let scratch = tempfile::Builder::new().prefix("slide-studio-tts-").tempdir()?;
        let output = scratch.path().join(format!("speech.{}", self.extension));
        let output_str = output.to_string_lossy();

        let args: Vec<String> = rest
            .iter()
            .map(|arg| arg.replace("{output}", &output_str).replace("{language}", language))
            .collect();

        info!("Calling {} for speech synthesis", program);
        debug!("{} {:?}", program, args);

        let mut child = Command::new(program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Self::failed(format!("failed to start {}: {}", program, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            // A program that exits without reading stdin is judged by its exit status.
            if let Err(e) = stdin.write_all(text.as_bytes()).await {
                if e.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(e.into());
                }
                debug!("{} closed stdin early", program);
            }
        }

        let result = child.wait_with_output().await?;
        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                format!("{} exited with {}", program, result.status)
            } else {
                stderr
            };
            return Err(Self::failed(message).into());
        }

        let audio = tokio::fs::read(&output)
            .await
            .map_err(|e| Self::failed(format!("{} wrote no audio to {:?}: {}", program, output, e)))?;

        Ok(audio)
    }
}
