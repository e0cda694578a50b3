//! # Composition
//!
//! The two request handlers. Each one validates its input, works inside its own
//! staging area, drives FFmpeg, and hands back the finished MP4 in memory.
//!
//! - [`SlideComposer`] - one slide plus a narration script becomes a narrated video
//! - [`VideoConcatenator`] - several clips are joined in upload order without re-encoding

pub mod concat;
pub mod slide;

pub use concat::{ConcatRequest, VideoConcatenator};
pub use slide::{SlideComposer, SlideRequest};
