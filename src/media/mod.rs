//! # Media Module
//!
//! Everything that touches media files: uploads and outputs, slide image
//! normalization, the concat manifest, and the FFmpeg/FFprobe wrappers.

pub mod encoder;
pub mod manifest;
pub mod probe;
pub mod slide;
pub mod types;

pub use encoder::{EncodeJob, Encoder, Tool};
pub use manifest::ConcatManifest;
pub use probe::{MediaProbe, ProbeReport, StreamSignature};
pub use slide::SourceImage;
pub use types::{AudioTrack, MediaKind, OutputVideo, Upload};
