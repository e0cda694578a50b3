use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use slide_studio::{
    config::Config,
    media::{Encoder, MediaProbe},
    speech, ConcatRequest, OutputVideo, SlideComposer, SlideRequest, StudioError, Upload,
    VideoConcatenator,
};

#[derive(Parser)]
#[command(
    name = "slide-studio",
    version,
    about = "Turn a slide and a script into a narrated video, or stitch clips together",
    long_about = "Slide Studio narrates a single slide image with synthesized speech and encodes it as an MP4, or joins several video clips end to end without re-encoding."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Configuration file (optional)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Narrate a slide image and encode it as a video
    Slide {
        /// Slide image (JPG, JPEG, PNG)
        #[arg(short, long)]
        image: Option<PathBuf>,

        /// Narration script
        #[arg(short, long, conflicts_with = "text_file")]
        text: Option<String>,

        /// Read the narration script from a file
        #[arg(long)]
        text_file: Option<PathBuf>,

        /// Speech language code, overrides the configuration
        #[arg(short, long)]
        lang: Option<String>,

        /// Output video path [default: tts_slide.mp4]
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Join video clips in the given order
    Concat {
        /// Video clips (MP4, MOV, AVI)
        videos: Vec<PathBuf>,

        /// Output video path [default: final_combined_video.mp4]
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check that ffmpeg and ffprobe can be executed
    Check,

    /// Write the default configuration to a file
    InitConfig {
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(cli).await {
        Ok(()) => Ok(()),
        Err(err) => match err.downcast_ref::<StudioError>() {
            Some(studio) if studio.is_warning() => {
                warn!("{}", studio.user_message());
                std::process::exit(2);
            }
            Some(studio) => {
                error!("{}", studio.user_message());
                std::process::exit(1);
            }
            None => Err(err),
        },
    }
}

async fn run(cli: Cli) -> Result<()> {
    info!("Starting Slide Studio v{}", env!("CARGO_PKG_VERSION"));

    let config = match &cli.config {
        Some(config_path) => {
            info!("Loading configuration from {:?}", config_path);
            Config::from_file(config_path)?
        }
        None => Config::default(),
    };
    config.validate()?;

    match cli.command {
        Command::Slide {
            image,
            text,
            text_file,
            lang,
            output,
        } => {
            let image = match image {
                Some(path) => Some(Upload::from_path(&path).await?),
                None => None,
            };
            let script = match (text, text_file) {
                (Some(text), _) => text,
                (None, Some(path)) => tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("Failed to read script from {:?}", path))?,
                (None, None) => String::new(),
            };

            let output = output.unwrap_or_else(|| PathBuf::from(&config.slide.output_name));
            let composer = SlideComposer::new(config)?;
            let video = composer
                .compose(SlideRequest {
                    image,
                    script,
                    language: lang,
                })
                .await?;
            deliver(&video, &output).await?;
        }

        Command::Concat { videos, output } => {
            let mut uploads = Vec::with_capacity(videos.len());
            for path in &videos {
                uploads.push(Upload::from_path(path).await?);
            }

            let output = output.unwrap_or_else(|| PathBuf::from(&config.concat.output_name));
            let concatenator = VideoConcatenator::new(config);
            let video = concatenator
                .concatenate(ConcatRequest { videos: uploads })
                .await?;
            deliver(&video, &output).await?;
        }

        Command::Check => check(&config).await?,

        Command::InitConfig { path } => {
            Config::default().save_to_file(&path)?;
            info!("Default configuration written to {:?}", path);
        }
    }

    Ok(())
}

/// Save the result and print what the preview pane would show
async fn deliver(video: &OutputVideo, output: &Path) -> Result<()> {
    let saved = video.save_to(output).await?;

    info!("Output: {:?}", saved);
    info!("   Name: {} ({})", video.file_name, video.mime_type);
    info!("   Size: {:.1} KB", video.size() as f64 / 1024.0);
    if let Some(duration) = video.duration {
        info!("   Duration: {:.2}s", duration);
    }
    Ok(())
}

async fn check(config: &Config) -> Result<()> {
    let encoder = Encoder::new(&config.encoder);
    let probe = MediaProbe::new(&config.encoder);

    let encoder_ok = encoder.is_available().await;
    let probe_ok = probe.is_available().await;
    let synthesizer = speech::from_config(&config.speech)?;

    info!("{:<10} {}", encoder.program(), status(encoder_ok));
    info!(
        "{:<10} {}",
        config.encoder.ffprobe,
        if probe_ok { "✅ available" } else { "⚠️  missing (durations measured in-process)" }
    );
    info!("{:<10} {} ({})", "speech", synthesizer.name(), config.speech.language);

    if !encoder_ok {
        anyhow::bail!("{} cannot be executed", encoder.program());
    }
    Ok(())
}

fn status(ok: bool) -> &'static str {
    if ok {
        "✅ available"
    } else {
        "❌ missing"
    }
}
