//! Path conventions for candidates, repack output, backups and sidecars.
//!
//! These helpers are pure path arithmetic; none of them touch the disk.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// List of recognised video file extensions.
const VIDEO_EXTENSIONS: &[&str] = &[
    "mkv", "mp4", "avi", "m4v", "ts", "m2ts", "webm", "mov", "wmv", "flv",
];

/// Suffix appended to archived originals.
pub const BACKUP_SUFFIX: &str = ".bak";

/// Extension of sidecar thumbnail artifacts.
pub const THUMBNAIL_EXTENSION: &str = "png";

/// Check whether `path` has the extension `ext` (case-insensitive, no leading dot).
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use reelkit_common::paths::has_extension;
///
/// assert!(has_extension(Path::new("movie.MKV"), "mkv"));
/// assert!(!has_extension(Path::new("movie.mkv.bak"), "mkv"));
/// assert!(!has_extension(Path::new("mkv"), "mkv"));
/// ```
pub fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(ext.trim_start_matches('.')))
        .unwrap_or(false)
}

/// Check if a path has a video file extension.
pub fn is_video_file(path: &Path) -> bool {
    VIDEO_EXTENSIONS.iter().any(|ext| has_extension(path, ext))
}

/// Same directory, same base name, extension replaced with `ext`.
pub fn with_replaced_extension(path: &Path, ext: &str) -> PathBuf {
    path.with_extension(ext.trim_start_matches('.'))
}

/// `<original-filename>.bak`, with the suffix appended rather than replacing
/// the extension.
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

/// Location of the thumbnail artifact for `media`:
/// `<dir>/<sidecar_dir>/<lowercased-base-name>.png`.
///
/// Returns `None` when the path has no file stem.
pub fn sidecar_thumbnail_path(media: &Path, sidecar_dir: &str) -> Option<PathBuf> {
    let stem = media.file_stem()?.to_string_lossy().to_lowercase();
    let dir = media.parent().unwrap_or_else(|| Path::new(""));
    Some(
        dir.join(sidecar_dir)
            .join(format!("{}.{}", stem, THUMBNAIL_EXTENSION)),
    )
}
