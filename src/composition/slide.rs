use tracing::{debug, info};

use crate::{
    config::Config,
    error::{Result, StudioError, ValidationWarning},
    media::{AudioTrack, EncodeJob, Encoder, MediaKind, MediaProbe, OutputVideo, SourceImage, Upload},
    speech::{self, RetryPolicy, SpeechSynthesizer},
    staging::StagingArea,
};

const SLIDE_FILE: &str = "slide.jpg";
const OUTPUT_FILE: &str = "tts_slide.mp4";

/// Input of the slide-to-video handler
#[derive(Debug, Clone, Default)]
pub struct SlideRequest {
    /// JPEG or PNG slide
    pub image: Option<Upload>,

    /// Narration script
    pub script: String,

    /// Overrides `speech.language` when set
    pub language: Option<String>,
}

/// Turns one slide image and a narration script into a narrated MP4
///
/// Pipeline:
/// 1. Validate input - missing image or blank script is a warning, not a failure
/// 2. Stage the slide - RGB, even dimensions, JPEG
/// 3. Synthesize the narration and stage it
/// 4. Probe the narration's exact duration
/// 5. Encode the looped slide with the narration, capped at that duration
/// 6. Read the result into memory and release the staging area
pub struct SlideComposer {
    config: Config,
    synthesizer: Box<dyn SpeechSynthesizer>,
    retry: RetryPolicy,
    encoder: Encoder,
    probe: MediaProbe,
}

impl SlideComposer {
    /// Create a composer with the speech provider named in the configuration
    pub fn new(config: Config) -> Result<Self> {
        let synthesizer = speech::from_config(&config.speech)?;
        Ok(Self::with_synthesizer(config, synthesizer))
    }

    pub fn with_synthesizer(config: Config, synthesizer: Box<dyn SpeechSynthesizer>) -> Self {
        Self {
            retry: RetryPolicy::from_config(&config.speech),
            encoder: Encoder::new(&config.encoder),
            probe: MediaProbe::new(&config.encoder),
            synthesizer,
            config,
        }
    }

    pub async fn compose(&self, request: SlideRequest) -> Result<OutputVideo> {
        let image = Self::validate(&request)?;
        let language = request
            .language
            .as_deref()
            .unwrap_or(&self.config.speech.language);

        info!("🖼️  Composing narrated slide from '{}'", image.name);

        let staging = StagingArea::create(&self.config.staging)?;

        // Step 2: slide image
        let slide_path = staging.file(SLIDE_FILE);
        let bytes = image.bytes.clone();
        let target = slide_path.clone();
        let (width, height) = tokio::task::spawn_blocking(move || {
            SourceImage::decode(&bytes)?.stage(&target)
        })
        .await
        .map_err(|e| StudioError::generic(format!("image task failed: {}", e)))??;
        info!("   Slide staged at {}x{}", width, height);

        // Steps 3-4: narration
        let narration = self.narrate(&staging, &request.script, language).await?;
        info!("   Narration: {:.2}s", narration.duration);

        // Step 5: encode
        let output_path = staging.file(OUTPUT_FILE);
        let job = EncodeJob::slide(
            &slide_path,
            &narration.path,
            narration.duration,
            &output_path,
            &self.config.slide,
        );
        self.encoder.run(&job).await?;

        // Step 6: hand the video over and release the scratch files
        let video = tokio::fs::read(&output_path).await?;
        staging.release_or_warn();

        info!("🎉 Narrated slide ready: {:.1} KB", video.len() as f64 / 1024.0);
        Ok(OutputVideo::mp4(
            self.config.slide.output_name.clone(),
            video,
            Some(narration.duration),
        ))
    }

    fn validate(request: &SlideRequest) -> std::result::Result<&Upload, ValidationWarning> {
        let image = request.image.as_ref().ok_or(ValidationWarning::MissingImage)?;
        if request.script.trim().is_empty() {
            return Err(ValidationWarning::EmptyScript);
        }
        image.expect_kind(MediaKind::Image)?;
        Ok(image)
    }

    async fn narrate(&self, staging: &StagingArea, script: &str, language: &str) -> Result<AudioTrack> {
        debug!("Synthesizing with {} ({})", self.synthesizer.name(), language);
        let audio = self
            .retry
            .synthesize(self.synthesizer.as_ref(), script, language)
            .await?;

        let name = format!("narration.{}", self.synthesizer.audio_extension());
        let path = staging.write(&name, &audio).await?;
        let duration = self.probe.audio_duration(&path).await?;

        Ok(AudioTrack { path, duration })
    }
}
