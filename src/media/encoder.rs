use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::{EncoderConfig, SlideConfig};
use crate::error::{EncoderError, Result};

/// An external program run with captured output and a wall-clock limit
#[derive(Debug, Clone)]
pub struct Tool {
    program: String,
    leading_args: Vec<String>,
    timeout: Duration,
}

impl Tool {
    pub fn new<S: Into<String>>(program: S, leading_args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            leading_args,
            timeout,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Check that the program starts and answers `-version`
    pub async fn is_available(&self) -> bool {
        Command::new(&self.program)
            .args(&self.leading_args)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }

    /// Run to completion and return its output; a non-zero exit is an error
    pub async fn run<I, S>(&self, args: I) -> Result<Output>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.leading_args)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("Running {:?}", cmd.as_std());

        let child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EncoderError::NotFound {
                    program: self.program.clone(),
                }
            } else {
                EncoderError::Failed {
                    program: self.program.clone(),
                    exit_code: -1,
                    stderr: format!("failed to start: {}", e),
                }
            }
        })?;

        // Dropping the wait future on timeout kills the child.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                warn!("{} exceeded {}s, killed", self.program, self.timeout.as_secs());
                return Err(EncoderError::TimedOut {
                    program: self.program.clone(),
                    seconds: self.timeout.as_secs(),
                }
                .into());
            }
        };

        if !output.status.success() {
            let exit_code = output.status.code().unwrap_or(-1);
            return Err(EncoderError::Failed {
                program: self.program.clone(),
                exit_code,
                stderr: diagnostic(&output.stderr, exit_code),
            }
            .into());
        }

        Ok(output)
    }
}

/// Stderr text for the user; never empty
fn diagnostic(stderr: &[u8], exit_code: i32) -> String {
    let text = String::from_utf8_lossy(stderr).trim().to_string();
    if text.is_empty() {
        format!("process exited with status {} and no diagnostic output", exit_code)
    } else {
        text
    }
}

/// Shortest `-t` value the six-decimal argument can express
pub const MIN_DURATION_SECS: f64 = 0.000_001;

/// One encoder invocation: its arguments and the file it must produce
#[derive(Debug, Clone)]
pub struct EncodeJob {
    args: Vec<OsString>,
    output: PathBuf,
}

impl EncodeJob {
    /// Looped still image plus narration, cut to the narration's length
    pub fn slide(
        image: &Path,
        audio: &Path,
        duration: f64,
        output: &Path,
        params: &SlideConfig,
    ) -> Self {
        let framerate = params.framerate.to_string();
        let duration = format!("{:.6}", duration.max(MIN_DURATION_SECS));

        let mut args: Vec<OsString> = Vec::new();
        push(&mut args, ["-y", "-loop", "1", "-framerate", framerate.as_str(), "-i"]);
        args.push(image.as_os_str().to_owned());
        push(&mut args, ["-i"]);
        args.push(audio.as_os_str().to_owned());
        push(
            &mut args,
            [
                "-c:v",
                params.video_codec.as_str(),
                "-pix_fmt",
                params.pixel_format.as_str(),
                "-c:a",
                params.audio_codec.as_str(),
                "-b:a",
                params.audio_bitrate.as_str(),
                "-shortest",
                "-t",
                duration.as_str(),
            ],
        );
        args.push(output.as_os_str().to_owned());

        Self {
            args,
            output: output.to_path_buf(),
        }
    }

    /// Concat demuxer over a manifest, stream copy for every track
    pub fn concat(manifest: &Path, output: &Path) -> Self {
        let mut args: Vec<OsString> = Vec::new();
        push(&mut args, ["-y", "-f", "concat", "-safe", "0", "-i"]);
        args.push(manifest.as_os_str().to_owned());
        push(&mut args, ["-c", "copy"]);
        args.push(output.as_os_str().to_owned());

        Self {
            args,
            output: output.to_path_buf(),
        }
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    pub fn output(&self) -> &Path {
        &self.output
    }
}

fn push<'a, I: IntoIterator<Item = &'a str>>(args: &mut Vec<OsString>, items: I) {
    args.extend(items.into_iter().map(OsString::from));
}

/// FFmpeg wrapper
pub struct Encoder {
    tool: Tool,
}

impl Encoder {
    pub fn new(config: &EncoderConfig) -> Self {
        Self {
            tool: Tool::new(
                config.ffmpeg.clone(),
                config.ffmpeg_args.clone(),
                Duration::from_secs(config.timeout_secs),
            ),
        }
    }

    pub fn program(&self) -> &str {
        self.tool.program()
    }

    pub async fn is_available(&self) -> bool {
        self.tool.is_available().await
    }

    /// Run a job; success means exit code 0 and the output file exists
    pub async fn run(&self, job: &EncodeJob) -> Result<()> {
        info!("Encoding {:?}", job.output());
        self.tool.run(job.args()).await?;

        if !tokio::fs::try_exists(job.output()).await.unwrap_or(false) {
            return Err(EncoderError::MissingOutput {
                program: self.tool.program().to_string(),
                path: job.output().display().to_string(),
            }
            .into());
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::StudioError;
    use tempfile::tempdir;

    /// Encoder config whose `ffmpeg` is a shell script; the job args follow as $1..
    pub(crate) fn scripted(ffmpeg_script: &str) -> EncoderConfig {
        EncoderConfig {
            ffmpeg: "sh".to_string(),
            ffmpeg_args: vec!["-c".to_string(), ffmpeg_script.to_string(), "ffmpeg".to_string()],
            timeout_secs: 5,
            ..EncoderConfig::default()
        }
    }

    /// Writes a small file to the last argument, like a successful encode
    pub(crate) const WRITE_LAST_ARG: &str =
        r#"for a in "$@"; do last="$a"; done; printf 'encoded' > "$last""#;

    fn strings(job: &EncodeJob) -> Vec<String> {
        job.args().iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn test_slide_job_arguments() {
        let job = EncodeJob::slide(
            Path::new("/s/slide.jpg"),
            Path::new("/s/narration.mp3"),
            1.2,
            Path::new("/s/tts_slide.mp4"),
            &SlideConfig::default(),
        );

        assert_eq!(
            strings(&job),
            vec![
                "-y", "-loop", "1", "-framerate", "1", "-i", "/s/slide.jpg", "-i",
                "/s/narration.mp3", "-c:v", "libx264", "-pix_fmt", "yuv420p", "-c:a", "aac",
                "-b:a", "192k", "-shortest", "-t", "1.200000", "/s/tts_slide.mp4",
            ]
        );
        assert_eq!(job.output(), Path::new("/s/tts_slide.mp4"));
    }

    #[test]
    fn test_slide_job_keeps_sub_second_duration() {
        let job = EncodeJob::slide(
            Path::new("/s/slide.jpg"),
            Path::new("/s/narration.mp3"),
            0.35,
            Path::new("/s/tts_slide.mp4"),
            &SlideConfig::default(),
        );
        assert!(strings(&job).windows(3).any(|w| w == ["-shortest", "-t", "0.350000"]));
    }

    #[test]
    fn test_slide_job_never_passes_zero_duration() {
        let job = EncodeJob::slide(
            Path::new("/s/slide.jpg"),
            Path::new("/s/narration.wav"),
            4e-7,
            Path::new("/s/tts_slide.mp4"),
            &SlideConfig::default(),
        );
        assert!(strings(&job).windows(2).any(|w| w == ["-t", "0.000001"]));
    }

    #[test]
    fn test_concat_job_arguments() {
        let job = EncodeJob::concat(Path::new("/s/filelist.txt"), Path::new("/s/combined_video.mp4"));
        assert_eq!(
            strings(&job),
            vec![
                "-y", "-f", "concat", "-safe", "0", "-i", "/s/filelist.txt", "-c", "copy",
                "/s/combined_video.mp4",
            ]
        );
    }

    #[tokio::test]
    async fn test_successful_run() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("out.mp4");
        let job = EncodeJob::concat(&dir.path().join("list.txt"), &output);

        let encoder = Encoder::new(&scripted(WRITE_LAST_ARG));
        encoder.run(&job).await.unwrap();
        assert_eq!(std::fs::read(&output).unwrap(), b"encoded");
    }

    #[tokio::test]
    async fn test_failure_carries_stderr() {
        let dir = tempdir().unwrap();
        let job = EncodeJob::concat(&dir.path().join("list.txt"), &dir.path().join("out.mp4"));

        let encoder = Encoder::new(&scripted("echo 'Unsafe file name' >&2; exit 1"));
        let err = encoder.run(&job).await.unwrap_err();
        match err {
            StudioError::Encoder(EncoderError::Failed { exit_code, stderr, .. }) => {
                assert_eq!(exit_code, 1);
                assert_eq!(stderr, "Unsafe file name");
            }
            other => panic!("Expected Failed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_silent_failure_still_has_diagnostic() {
        let dir = tempdir().unwrap();
        let job = EncodeJob::concat(&dir.path().join("list.txt"), &dir.path().join("out.mp4"));

        let encoder = Encoder::new(&scripted("exit 3"));
        let err = encoder.run(&job).await.unwrap_err();
        assert!(!err.user_message().is_empty());
        assert!(err.to_string().contains("status 3"));
    }

    #[tokio::test]
    async fn test_zero_exit_without_output_is_error() {
        let dir = tempdir().unwrap();
        let job = EncodeJob::concat(&dir.path().join("list.txt"), &dir.path().join("out.mp4"));

        let encoder = Encoder::new(&scripted("exit 0"));
        let err = encoder.run(&job).await.unwrap_err();
        assert!(matches!(err, StudioError::Encoder(EncoderError::MissingOutput { .. })));
    }

    #[tokio::test]
    async fn test_timeout_is_upstream_unavailable() {
        let config = scripted("sleep 5");
        let tool = Tool::new(config.ffmpeg, config.ffmpeg_args, Duration::from_millis(200));

        let err = tool.run(["x"]).await.unwrap_err();
        assert!(err.is_upstream_unavailable());
    }

    #[tokio::test]
    async fn test_missing_program() {
        let tool = Tool::new("definitely-not-ffmpeg-xyz", vec![], Duration::from_secs(5));
        let err = tool.run(["-version"]).await.unwrap_err();
        assert!(matches!(err, StudioError::Encoder(EncoderError::NotFound { .. })));
        assert!(!tool.is_available().await);
    }
}
