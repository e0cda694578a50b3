use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::{
    config::Config,
    error::{EncoderError, Result, ValidationWarning},
    media::{ConcatManifest, EncodeJob, Encoder, MediaKind, MediaProbe, OutputVideo, StreamSignature, Upload},
    staging::StagingArea,
};

const VIDEO_DIR: &str = "videos";
const MANIFEST_FILE: &str = "filelist.txt";
const OUTPUT_FILE: &str = "combined_video.mp4";

/// Input of the concatenation handler; order is playback order
#[derive(Debug, Clone, Default)]
pub struct ConcatRequest {
    pub videos: Vec<Upload>,
}

/// Joins uploaded clips end to end without re-encoding
pub struct VideoConcatenator {
    config: Config,
    encoder: Encoder,
    probe: MediaProbe,
}

impl VideoConcatenator {
    pub fn new(config: Config) -> Self {
        Self {
            encoder: Encoder::new(&config.encoder),
            probe: MediaProbe::new(&config.encoder),
            config,
        }
    }

    pub async fn concatenate(&self, request: ConcatRequest) -> Result<OutputVideo> {
        Self::validate(&request)?;
        info!("🎞️  Concatenating {} video(s)", request.videos.len());

        let mut staging = StagingArea::create(&self.config.staging)?;

        let mut staged = Vec::with_capacity(request.videos.len());
        for upload in &request.videos {
            let path = staging.stage_upload(VIDEO_DIR, upload).await?;
            staged.push((upload.name.as_str(), path));
        }

        if self.config.concat.verify_compatibility {
            self.check_compatibility(&staged).await?;
        } else {
            debug!("Skipping stream compatibility check");
        }

        let mut manifest = ConcatManifest::new();
        for (_, path) in &staged {
            manifest.push(path)?;
        }
        let manifest_path = manifest.write_to(staging.file(MANIFEST_FILE)).await?;
        debug!("Manifest:\n{}", manifest.render());

        let output_path = staging.file(OUTPUT_FILE);
        self.encoder
            .run(&EncodeJob::concat(&manifest_path, &output_path))
            .await?;

        let video = tokio::fs::read(&output_path).await?;
        staging.release_or_warn();

        info!(
            "🎉 Combined {} clip(s): {:.1} KB",
            manifest.len(),
            video.len() as f64 / 1024.0
        );
        Ok(OutputVideo::mp4(self.config.concat.output_name.clone(), video, None))
    }

    fn validate(request: &ConcatRequest) -> std::result::Result<(), ValidationWarning> {
        if request.videos.is_empty() {
            return Err(ValidationWarning::NoVideos);
        }
        for upload in &request.videos {
            upload.expect_kind(MediaKind::Video)?;
        }
        Ok(())
    }

    /// Every input must carry the same stream layout as the first one
    async fn check_compatibility(&self, staged: &[(&str, PathBuf)]) -> Result<()> {
        let Some(((first_name, first_path), rest)) = staged.split_first() else {
            return Ok(());
        };

        let reference = self.layout(first_path).await?;
        for (name, path) in rest {
            let layout = self.layout(path).await?;
            if layout != reference {
                warn!("'{}' does not match '{}'", name, first_name);
                return Err(EncoderError::IncompatibleInputs {
                    details: format!(
                        "'{}' has [{}] but '{}' has [{}]",
                        name,
                        describe(&layout),
                        first_name,
                        describe(&reference)
                    ),
                }
                .into());
            }
        }

        debug!("All inputs share [{}]", describe(&reference));
        Ok(())
    }

    async fn layout(&self, path: &Path) -> Result<Vec<StreamSignature>> {
        self.probe.stream_layout(path).await
    }
}

fn describe(layout: &[StreamSignature]) -> String {
    if layout.is_empty() {
        return "no streams".to_string();
    }
    layout
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StagingConfig;
    use crate::error::StudioError;
    use crate::media::{encoder, probe};
    use tempfile::{tempdir, TempDir};

    const MP4_H264_640: &str = r#"{"streams":[{"codec_type":"video","codec_name":"h264","width":640,"height":360},{"codec_type":"audio","codec_name":"aac","sample_rate":"44100","channels":2}],"format":{"format_name":"mov,mp4,m4a,3gp,3g2,mj2","duration":"2.000000"}}"#;

    fn test_config(root: &Path, ffmpeg_script: &str) -> Config {
        let mut config = Config::default();
        config.encoder = encoder::tests::scripted(ffmpeg_script);
        probe::tests::scripted(&mut config.encoder, probe::tests::MP4_H264_AAC);
        config.staging = StagingConfig {
            root: Some(root.to_path_buf()),
            ..StagingConfig::default()
        };
        config
    }

    fn clips(names: &[&str]) -> ConcatRequest {
        ConcatRequest {
            videos: names
                .iter()
                .map(|name| Upload::new(*name, format!("clip {}", name).into_bytes()))
                .collect(),
        }
    }

    /// ffmpeg stand-in that keeps the manifest ($7) and writes the output
    fn capturing_script(capture: &TempDir) -> String {
        format!(
            r#"cp "$7" '{}/filelist.txt'; for a in "$@"; do last="$a"; done; printf 'combined' > "$last""#,
            capture.path().display()
        )
    }

    fn is_empty_dir(dir: &TempDir) -> bool {
        std::fs::read_dir(dir.path()).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn test_no_videos_is_a_warning() {
        let root = tempdir().unwrap();
        let concat = VideoConcatenator::new(test_config(root.path(), encoder::tests::WRITE_LAST_ARG));

        let err = concat.concatenate(ConcatRequest::default()).await.unwrap_err();
        assert!(matches!(err, StudioError::Warning(ValidationWarning::NoVideos)));
        assert!(is_empty_dir(&root));
    }

    #[tokio::test]
    async fn test_non_video_upload_is_a_warning() {
        let root = tempdir().unwrap();
        let concat = VideoConcatenator::new(test_config(root.path(), encoder::tests::WRITE_LAST_ARG));

        let err = concat.concatenate(clips(&["a.mp4", "notes.txt"])).await.unwrap_err();
        assert!(err.is_warning());
        assert!(is_empty_dir(&root));
    }

    #[tokio::test]
    async fn test_manifest_keeps_upload_order() {
        let root = tempdir().unwrap();
        let capture = tempdir().unwrap();
        let concat = VideoConcatenator::new(test_config(root.path(), &capturing_script(&capture)));

        let video = concat.concatenate(clips(&["a.mp4", "b.mp4", "c.mp4"])).await.unwrap();
        assert_eq!(video.bytes, b"combined");
        assert_eq!(video.file_name, "final_combined_video.mp4");
        assert_eq!(video.duration, None);

        let manifest = std::fs::read_to_string(capture.path().join("filelist.txt")).unwrap();
        let lines: Vec<&str> = manifest.lines().collect();
        assert_eq!(lines.len(), 3);
        for (line, name) in lines.iter().zip(["a.mp4", "b.mp4", "c.mp4"]) {
            assert!(line.starts_with("file '/"), "absolute path expected: {}", line);
            assert!(line.ends_with(&format!("/videos/{}'", name)), "{}", line);
        }

        assert!(is_empty_dir(&root), "staging area must be released");
    }

    #[tokio::test]
    async fn test_single_video_passes_through() {
        let root = tempdir().unwrap();
        let capture = tempdir().unwrap();
        let concat = VideoConcatenator::new(test_config(root.path(), &capturing_script(&capture)));

        let video = concat.concatenate(clips(&["only.mov"])).await.unwrap();
        assert_eq!(video.bytes, b"combined");

        let manifest = std::fs::read_to_string(capture.path().join("filelist.txt")).unwrap();
        assert_eq!(manifest.lines().count(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_and_quoted_names_stay_distinct() {
        let root = tempdir().unwrap();
        let capture = tempdir().unwrap();
        let concat = VideoConcatenator::new(test_config(root.path(), &capturing_script(&capture)));

        concat
            .concatenate(clips(&["intro.mp4", "intro.mp4", "it's.mp4"]))
            .await
            .unwrap();

        let manifest = std::fs::read_to_string(capture.path().join("filelist.txt")).unwrap();
        let lines: Vec<&str> = manifest.lines().collect();
        assert!(lines[0].ends_with("/videos/intro.mp4'"));
        assert!(lines[1].ends_with("/videos/intro (2).mp4'"));
        assert!(lines[2].ends_with(r"/videos/it'\''s.mp4'"));
    }

    #[tokio::test]
    async fn test_mismatched_streams_are_rejected_before_encoding() {
        let root = tempdir().unwrap();
        let capture = tempdir().unwrap();
        let marker = capture.path().join("ffmpeg-ran");
        let mut config = test_config(root.path(), &format!("touch '{}'", marker.display()));

        // $7 is the probed file
        config.encoder.ffprobe_args = vec![
            "-c".to_string(),
            format!(
                r#"case "$7" in *b.mp4) printf '%s' '{}';; *) printf '%s' '{}';; esac"#,
                MP4_H264_640,
                probe::tests::MP4_H264_AAC
            ),
            "ffprobe".to_string(),
        ];
        let concat = VideoConcatenator::new(config);

        let err = concat.concatenate(clips(&["a.mp4", "b.mp4"])).await.unwrap_err();
        match &err {
            StudioError::Encoder(EncoderError::IncompatibleInputs { details }) => {
                assert!(details.contains("'b.mp4'"));
                assert!(details.contains("640x360"));
                assert!(details.contains("1280x720"));
            }
            other => panic!("Expected IncompatibleInputs, got {:?}", other),
        }
        assert!(!marker.exists(), "encoder must not run");
        assert!(is_empty_dir(&root));
    }

    #[tokio::test]
    async fn test_check_can_be_disabled() {
        let root = tempdir().unwrap();
        let mut config = test_config(root.path(), encoder::tests::WRITE_LAST_ARG);
        config.concat.verify_compatibility = false;
        config.encoder.ffprobe = "definitely-not-ffprobe-xyz".to_string();
        config.encoder.ffprobe_args = Vec::new();
        let concat = VideoConcatenator::new(config);

        let video = concat.concatenate(clips(&["a.mp4", "b.avi"])).await.unwrap();
        assert_eq!(video.bytes, b"encoded");
    }

    #[tokio::test]
    async fn test_encoder_failure_is_reported_and_cleaned_up() {
        let root = tempdir().unwrap();
        let concat = VideoConcatenator::new(test_config(
            root.path(),
            "echo 'Unsafe file name' >&2; exit 1",
        ));

        let err = concat.concatenate(clips(&["a.mp4", "b.mp4"])).await.unwrap_err();
        assert!(err.user_message().contains("Unsafe file name"));
        assert!(!err.is_warning());
        assert!(is_empty_dir(&root));
    }
}
