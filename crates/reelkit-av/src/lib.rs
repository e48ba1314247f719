//! # reelkit-av
//!
//! Media probing, codec inspection and container repacking for video files.
//!
//! This crate provides functionality for:
//! - Probing media files with ffprobe to extract track codecs and duration
//! - Deciding whether a file can be repacked without re-encoding
//! - Repacking into another container with progress and cancellation
//!
//! ## Features
//!
//! - `probe` (default) - Probing via the ffprobe CLI
//! - `remux` (default) - Container repacking via the ffmpeg CLI
//! - `all` - Enable all features
//! - `tracing` - Enable tracing support
//!
//! ## Example
//!
//! ```no_run
//! use reelkit_av::{CompatibilityInspector, FfprobeReader};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # async fn run() {
//! let inspector = CompatibilityInspector::new(Arc::new(FfprobeReader::default()), "mkv");
//! if inspector.is_eligible(Path::new("/media/movie.mkv")).await {
//!     println!("movie.mkv can be repacked losslessly");
//! }
//! # }
//! ```

mod error;
pub mod inspect;
pub mod probe;
pub mod tools;

#[cfg(feature = "remux")]
pub mod actions;

// Re-exports
pub use error::{Error, Result};
pub use inspect::{
    AudioCodec, Classification, CodecProfile, CompatibilityInspector, FfprobeReader,
    ProfileReader, VideoCodec,
};
pub use probe::{AudioTrack, MediaInfo, VideoTrack};
pub use tools::{check_tool, check_tools, require_tool, ToolInfo, ToolPaths};

#[cfg(feature = "remux")]
pub use actions::{Container, ExportSession, ExportStatus, Exporter, FfmpegExporter, RepackEngine};
