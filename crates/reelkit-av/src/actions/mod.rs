//! Media processing actions.
//!
//! This module provides container repacking: a stream-copy into a new
//! container with sampled progress, cancellation, and backup of the
//! original.

mod export;
mod remux;

pub use export::{ExportSession, ExportStatus, Exporter, FfmpegExporter};
pub use remux::{Container, RepackEngine};
