//! Media file probing module.
//!
//! Metadata is read with the `ffprobe` command-line tool and parsed from its
//! JSON output. Only what the repack pipeline needs is kept: container,
//! duration, and the codec of every video and audio track.

mod ffprobe;
mod types;

pub use ffprobe::{parse_ffprobe_json, probe_with_ffprobe};
pub use types::*;
