use std::ffi::OsStr;
use std::fmt;
use std::fs::File;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use symphonia::core::codecs::CODEC_TYPE_NULL;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::{Time, TimeBase};
use tracing::{debug, warn};

use crate::config::EncoderConfig;
use crate::error::{EncoderError, Result, StudioError};
use crate::media::encoder::{Tool, MIN_DURATION_SECS};

/// Raw `ffprobe -print_format json` output, the parts we use
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProbeReport {
    #[serde(default)]
    pub streams: Vec<ProbeStream>,
    pub format: Option<ProbeFormat>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProbeStream {
    pub codec_type: Option<String>,
    pub codec_name: Option<String>,
    pub duration: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub sample_rate: Option<String>,
    pub channels: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProbeFormat {
    pub format_name: Option<String>,
    pub duration: Option<String>,
}

impl ProbeReport {
    pub fn parse(json: &[u8], path: &Path) -> Result<Self> {
        serde_json::from_slice(json).map_err(|e| {
            EncoderError::ProbeFailed {
                path: path.display().to_string(),
                reason: format!("unreadable ffprobe output: {}", e),
            }
            .into()
        })
    }

    /// Duration of the first audio stream, falling back to the container's
    pub fn audio_duration(&self) -> Option<f64> {
        let audio = self
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("audio"))?;

        audio
            .duration
            .as_deref()
            .and_then(parse_seconds)
            .or_else(|| {
                self.format
                    .as_ref()
                    .and_then(|f| f.duration.as_deref())
                    .and_then(parse_seconds)
            })
    }

    pub fn signatures(&self) -> Vec<StreamSignature> {
        self.streams.iter().map(StreamSignature::from).collect()
    }
}

fn parse_seconds(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|d| d.is_finite())
}

/// What has to match between inputs for stream-copy concatenation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSignature {
    pub codec_type: String,
    pub codec_name: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u32>,
}

impl From<&ProbeStream> for StreamSignature {
    fn from(stream: &ProbeStream) -> Self {
        Self {
            codec_type: stream.codec_type.clone().unwrap_or_else(|| "unknown".to_string()),
            codec_name: stream.codec_name.clone().unwrap_or_else(|| "unknown".to_string()),
            width: stream.width,
            height: stream.height,
            sample_rate: stream.sample_rate.as_deref().and_then(|r| r.parse().ok()),
            channels: stream.channels,
        }
    }
}

impl fmt::Display for StreamSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.codec_type, self.codec_name)?;
        if let (Some(w), Some(h)) = (self.width, self.height) {
            write!(f, " {}x{}", w, h)?;
        }
        if let Some(rate) = self.sample_rate {
            write!(f, " {} Hz", rate)?;
        }
        if let Some(channels) = self.channels {
            write!(f, " {}ch", channels)?;
        }
        Ok(())
    }
}

/// FFprobe wrapper with an in-process fallback for audio durations
pub struct MediaProbe {
    tool: Tool,
}

impl MediaProbe {
    pub fn new(config: &EncoderConfig) -> Self {
        Self {
            tool: Tool::new(
                config.ffprobe.clone(),
                config.ffprobe_args.clone(),
                Duration::from_secs(config.timeout_secs),
            ),
        }
    }

    pub async fn is_available(&self) -> bool {
        self.tool.is_available().await
    }

    pub async fn probe(&self, path: &Path) -> Result<ProbeReport> {
        let args: [&OsStr; 7] = [
            OsStr::new("-v"),
            OsStr::new("error"),
            OsStr::new("-print_format"),
            OsStr::new("json"),
            OsStr::new("-show_streams"),
            OsStr::new("-show_format"),
            path.as_os_str(),
        ];
        let output = self.tool.run(args).await?;
        ProbeReport::parse(&output.stdout, path)
    }

    /// Exact length of an audio file in seconds
    pub async fn audio_duration(&self, path: &Path) -> Result<f64> {
        let duration = match self.probe(path).await {
            Ok(report) => report.audio_duration().ok_or_else(|| EncoderError::NoAudioStream {
                path: path.display().to_string(),
            })?,
            Err(StudioError::Encoder(EncoderError::NotFound { program })) => {
                warn!("{} not available, measuring {:?} in-process", program, path);
                let owned = path.to_path_buf();
                tokio::task::spawn_blocking(move || decode_duration(&owned))
                    .await
                    .map_err(|e| StudioError::generic(format!("duration task failed: {}", e)))??
            }
            Err(e) => return Err(e),
        };

        if duration < MIN_DURATION_SECS {
            return Err(EncoderError::ProbeFailed {
                path: path.display().to_string(),
                reason: format!("duration {} is too short to encode", duration),
            }
            .into());
        }

        debug!("Audio duration of {:?}: {:.3}s", path, duration);
        Ok(duration)
    }

    pub async fn stream_layout(&self, path: &Path) -> Result<Vec<StreamSignature>> {
        Ok(self.probe(path).await?.signatures())
    }
}

/// Measure an audio file without ffprobe: hound for WAV, symphonia otherwise
pub fn decode_duration(path: &Path) -> Result<f64> {
    let is_wav = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("wav"))
        .unwrap_or(false);

    if is_wav {
        wav_duration(path)
    } else {
        symphonia_duration(path)
    }
}

fn probe_failed(path: &Path, reason: impl ToString) -> StudioError {
    EncoderError::ProbeFailed {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
    .into()
}

fn wav_duration(path: &Path) -> Result<f64> {
    let reader = hound::WavReader::open(path).map_err(|e| probe_failed(path, e))?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return Err(probe_failed(path, "zero sample rate"));
    }
    Ok(reader.duration() as f64 / spec.sample_rate as f64)
}

fn symphonia_duration(path: &Path) -> Result<f64> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| probe_failed(path, e))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| EncoderError::NoAudioStream {
            path: path.display().to_string(),
        })?;

    let track_id = track.id;
    let params = track.codec_params.clone();
    let time_base = params
        .time_base
        .or_else(|| params.sample_rate.map(|rate| TimeBase::new(1, rate)))
        .ok_or_else(|| probe_failed(path, "no time base"))?;

    if let Some(n_frames) = params.n_frames {
        return Ok(seconds(time_base.calc_time(n_frames)));
    }

    // No frame count in the header (common for MP3); walk the packets.
    let mut end = 0u64;
    loop {
        match format.next_packet() {
            Ok(packet) if packet.track_id() == track_id => {
                end = end.max(packet.ts() + packet.dur());
            }
            Ok(_) => continue,
            Err(SymphoniaError::ResetRequired) => continue,
            Err(_) => break,
        }
    }

    Ok(seconds(time_base.calc_time(end)))
}

fn seconds(time: Time) -> f64 {
    time.seconds as f64 + time.frac
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::tempdir;

    /// Prober config whose `ffprobe` prints `json`
    pub(crate) fn scripted(config: &mut EncoderConfig, json: &str) {
        config.ffprobe = "sh".to_string();
        config.ffprobe_args = vec![
            "-c".to_string(),
            format!("printf '%s' '{}'", json),
            "ffprobe".to_string(),
        ];
    }

    pub(crate) const MP4_H264_AAC: &str = r#"{"streams":[{"codec_type":"video","codec_name":"h264","width":1280,"height":720},{"codec_type":"audio","codec_name":"aac","sample_rate":"44100","channels":2,"duration":"3.000000"}],"format":{"format_name":"mov,mp4,m4a,3gp,3g2,mj2","duration":"3.000000"}}"#;

    fn write_wav(path: &Path, sample_rate: u32, samples: u32) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..samples {
            writer.write_sample(((i % 100) as i16) * 100).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_audio_stream_duration() {
        let json = br#"{"streams":[{"codec_type":"audio","codec_name":"mp3","duration":"1.224000"}],"format":{"duration":"1.250000"}}"#;
        let report = ProbeReport::parse(json, Path::new("a.mp3")).unwrap();
        assert_eq!(report.audio_duration(), Some(1.224));
    }

    #[test]
    fn test_container_duration_fallback() {
        let json = br#"{"streams":[{"codec_type":"audio","codec_name":"mp3"}],"format":{"duration":"2.5"}}"#;
        let report = ProbeReport::parse(json, Path::new("a.mp3")).unwrap();
        assert_eq!(report.audio_duration(), Some(2.5));
    }

    #[test]
    fn test_no_audio_stream() {
        let json = br#"{"streams":[{"codec_type":"video","codec_name":"mjpeg"}],"format":{"duration":"0.04"}}"#;
        let report = ProbeReport::parse(json, Path::new("a.jpg")).unwrap();
        assert_eq!(report.audio_duration(), None);
    }

    #[test]
    fn test_garbage_output() {
        assert!(ProbeReport::parse(b"not json", Path::new("x")).is_err());
    }

    #[test]
    fn test_signatures() {
        let report = ProbeReport::parse(MP4_H264_AAC.as_bytes(), Path::new("a.mp4")).unwrap();
        let signatures = report.signatures();
        assert_eq!(signatures.len(), 2);
        assert_eq!(signatures[0].to_string(), "video h264 1280x720");
        assert_eq!(signatures[1].to_string(), "audio aac 44100 Hz 2ch");
    }

    #[tokio::test]
    async fn test_probe_through_ffprobe() {
        let mut config = EncoderConfig::default();
        scripted(&mut config, MP4_H264_AAC);
        let probe = MediaProbe::new(&config);

        let duration = probe.audio_duration(Path::new("/any/a.mp4")).await.unwrap();
        assert_eq!(duration, 3.0);
        let layout = probe.stream_layout(Path::new("/any/a.mp4")).await.unwrap();
        assert_eq!(layout[0].codec_name, "h264");
    }

    #[test]
    fn test_wav_and_symphonia_durations_agree() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("narration.wav");
        write_wav(&path, 8000, 12000);

        let from_hound = decode_duration(&path).unwrap();
        let from_symphonia = symphonia_duration(&path).unwrap();
        assert!((from_hound - 1.5).abs() < 1e-9);
        assert!((from_symphonia - 1.5).abs() < 1e-3);
    }

    #[tokio::test]
    async fn test_duration_too_short_to_encode_is_rejected() {
        let mut config = EncoderConfig::default();
        scripted(
            &mut config,
            r#"{"streams":[{"codec_type":"audio","codec_name":"pcm_s16le","duration":"0.0000004"}]}"#,
        );

        let err = MediaProbe::new(&config)
            .audio_duration(Path::new("/any/narration.wav"))
            .await
            .unwrap_err();
        assert!(matches!(err, StudioError::Encoder(EncoderError::ProbeFailed { .. })));
    }

    #[tokio::test]
    async fn test_missing_ffprobe_falls_back_to_decoding() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("narration.wav");
        write_wav(&path, 16000, 8000);

        let config = EncoderConfig {
            ffprobe: "definitely-not-ffprobe-xyz".to_string(),
            ffprobe_args: vec![],
            ..EncoderConfig::default()
        };
        let duration = MediaProbe::new(&config).audio_duration(&path).await.unwrap();
        assert!((duration - 0.5).abs() < 1e-9);
    }
}
