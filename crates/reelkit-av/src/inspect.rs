//! Codec compatibility inspection.
//!
//! Decides whether a container can be repacked losslessly: the first video
//! track must be H.264 or HEVC and every audio track must be in a short
//! allow-list of codecs that the target containers carry as-is.
//!
//! Inspection fails closed. Any error while reading metadata is logged and
//! the file is treated as ineligible; callers never see the error.

use crate::probe::{probe_with_ffprobe, MediaInfo};
use crate::{Error, Result};
use async_trait::async_trait;
use reelkit_common::paths::has_extension;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Video codec of a track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoCodec {
    /// H.264 / AVC.
    H264,
    /// H.265 / HEVC.
    Hevc,
    /// Any other codec, by its ffprobe name.
    Other(String),
    /// The track carries no format metadata.
    Unknown,
}

impl VideoCodec {
    /// Map an ffprobe codec name.
    pub fn from_name(name: Option<&str>) -> Self {
        match name.map(|n| n.trim().to_ascii_lowercase()) {
            None => Self::Unknown,
            Some(n) => match n.as_str() {
                "" => Self::Unknown,
                "h264" | "avc" | "avc1" => Self::H264,
                "hevc" | "h265" | "hvc1" | "hev1" => Self::Hevc,
                _ => Self::Other(n),
            },
        }
    }

    /// Whether the codec can be copied into the target container.
    pub fn is_repackable(&self) -> bool {
        matches!(self, Self::H264 | Self::Hevc)
    }
}

/// Audio codec of a track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioCodec {
    Aac,
    Ac3,
    Eac3,
    Mp3,
    Alac,
    Flac,
    Opus,
    /// Any other codec, by its ffprobe name.
    Other(String),
    /// The track carries no format metadata.
    Unknown,
}

impl AudioCodec {
    /// Map an ffprobe codec name.
    pub fn from_name(name: Option<&str>) -> Self {
        match name.map(|n| n.trim().to_ascii_lowercase()) {
            None => Self::Unknown,
            Some(n) => match n.as_str() {
                "" => Self::Unknown,
                "aac" => Self::Aac,
                "ac3" => Self::Ac3,
                "eac3" => Self::Eac3,
                "mp3" => Self::Mp3,
                "alac" => Self::Alac,
                "flac" => Self::Flac,
                "opus" => Self::Opus,
                _ => Self::Other(n),
            },
        }
    }

    /// Whether the codec can be copied into the target container.
    pub fn is_repackable(&self) -> bool {
        !matches!(self, Self::Other(_) | Self::Unknown)
    }
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::H264 => write!(f, "H.264"),
            Self::Hevc => write!(f, "HEVC"),
            Self::Other(name) => write!(f, "{}", name),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

impl fmt::Display for AudioCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aac => write!(f, "AAC"),
            Self::Ac3 => write!(f, "AC-3"),
            Self::Eac3 => write!(f, "E-AC-3"),
            Self::Mp3 => write!(f, "MP3"),
            Self::Alac => write!(f, "ALAC"),
            Self::Flac => write!(f, "FLAC"),
            Self::Opus => write!(f, "Opus"),
            Self::Other(name) => write!(f, "{}", name),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Codecs extracted from a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecProfile {
    /// Codec of the first video track.
    pub video: VideoCodec,
    /// Codecs of all audio tracks, in stream order.
    pub audio: Vec<AudioCodec>,
}

impl CodecProfile {
    /// Build a profile from probed media info.
    ///
    /// Only the first video track is examined. Returns `None` when the file
    /// has no video track at all.
    pub fn from_media_info(info: &MediaInfo) -> Option<Self> {
        let video = info.primary_video()?;
        Some(Self {
            video: VideoCodec::from_name(video.codec.as_deref()),
            audio: info
                .audio_tracks
                .iter()
                .map(|a| AudioCodec::from_name(a.codec.as_deref()))
                .collect(),
        })
    }

    /// A profile is repackable when the video codec and every audio codec are
    /// allow-listed. No audio tracks is fine.
    pub fn is_repackable(&self) -> bool {
        self.video.is_repackable() && self.audio.iter().all(AudioCodec::is_repackable)
    }
}

/// Cached inspection verdict for a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Eligible,
    Ineligible,
    /// Not inspected yet.
    #[default]
    Unknown,
}

/// Source of codec profiles.
#[async_trait]
pub trait ProfileReader: Send + Sync {
    /// Read the codec profile of a container.
    async fn read_profile(&self, path: &Path) -> Result<CodecProfile>;
}

/// Reads profiles by running `ffprobe` on a blocking task.
#[derive(Debug, Clone)]
pub struct FfprobeReader {
    ffprobe: PathBuf,
}

impl FfprobeReader {
    pub fn new(ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffprobe: ffprobe.into(),
        }
    }
}

impl Default for FfprobeReader {
    fn default() -> Self {
        Self::new(crate::tools::FFPROBE)
    }
}

#[async_trait]
impl ProfileReader for FfprobeReader {
    async fn read_profile(&self, path: &Path) -> Result<CodecProfile> {
        let ffprobe = self.ffprobe.clone();
        let path_buf = path.to_path_buf();
        let info = tokio::task::spawn_blocking(move || probe_with_ffprobe(&ffprobe, &path_buf))
            .await
            .map_err(|e| Error::tool_failed("ffprobe", e.to_string()))??;

        CodecProfile::from_media_info(&info)
            .ok_or_else(|| Error::Unsupported(format!("no video track in {}", path.display())))
    }
}

/// Decides repack eligibility for candidate files.
pub struct CompatibilityInspector {
    reader: std::sync::Arc<dyn ProfileReader>,
    source_extension: String,
}

impl CompatibilityInspector {
    /// Create an inspector for files with `source_extension` (e.g. "mkv").
    pub fn new(reader: std::sync::Arc<dyn ProfileReader>, source_extension: impl Into<String>) -> Self {
        Self {
            reader,
            source_extension: source_extension.into(),
        }
    }

    /// The extension candidates must carry.
    pub fn source_extension(&self) -> &str {
        &self.source_extension
    }

    /// Whether `path` can be repacked without re-encoding.
    ///
    /// Never fails: read and parse errors are logged and count as ineligible.
    pub async fn is_eligible(&self, path: &Path) -> bool {
        if !has_extension(path, &self.source_extension) {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                "{:?} does not have the .{} extension",
                path,
                self.source_extension
            );
            return false;
        }

        match self.reader.read_profile(path).await {
            Ok(profile) => {
                let eligible = profile.is_repackable();
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    "{:?}: video {}, audio [{}] -> {}",
                    path,
                    profile.video,
                    profile
                        .audio
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(", "),
                    if eligible { "eligible" } else { "ineligible" }
                );
                eligible
            }
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!("Could not classify {:?}, treating as ineligible: {}", path, e);
                let _ = e;
                false
            }
        }
    }

    /// Tri-state verdict for caching on a candidate.
    pub async fn classify(&self, path: &Path) -> Classification {
        if self.is_eligible(path).await {
            Classification::Eligible
        } else {
            Classification::Ineligible
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{AudioTrack, VideoTrack};
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    struct FixedReader(HashMap<PathBuf, CodecProfile>);

    #[async_trait]
    impl ProfileReader for FixedReader {
        async fn read_profile(&self, path: &Path) -> Result<CodecProfile> {
            self.0
                .get(path)
                .cloned()
                .ok_or_else(|| Error::tool_failed("ffprobe", "unreadable"))
        }
    }

    fn inspector(entries: Vec<(&str, CodecProfile)>) -> CompatibilityInspector {
        let map = entries
            .into_iter()
            .map(|(p, profile)| (PathBuf::from(p), profile))
            .collect();
        CompatibilityInspector::new(Arc::new(FixedReader(map)), "mkv")
    }

    fn profile(video: VideoCodec, audio: Vec<AudioCodec>) -> CodecProfile {
        CodecProfile { video, audio }
    }

    #[test]
    fn test_codec_names() {
        assert_eq!(VideoCodec::from_name(Some("h264")), VideoCodec::H264);
        assert_eq!(VideoCodec::from_name(Some("HEVC")), VideoCodec::Hevc);
        assert_eq!(
            VideoCodec::from_name(Some("av1")),
            VideoCodec::Other("av1".to_string())
        );
        assert_eq!(VideoCodec::from_name(None), VideoCodec::Unknown);
        assert_eq!(AudioCodec::from_name(Some("eac3")), AudioCodec::Eac3);
        assert_eq!(AudioCodec::from_name(Some(" ")), AudioCodec::Unknown);
        assert_eq!(
            AudioCodec::from_name(Some("dts")),
            AudioCodec::Other("dts".to_string())
        );
    }

    #[test]
    fn test_profile_rules() {
        assert!(profile(VideoCodec::H264, vec![]).is_repackable());
        assert!(profile(VideoCodec::Hevc, vec![AudioCodec::Aac, AudioCodec::Ac3]).is_repackable());
        assert!(!profile(VideoCodec::Other("vp9".into()), vec![AudioCodec::Opus]).is_repackable());
        assert!(!profile(VideoCodec::Unknown, vec![]).is_repackable());
        assert!(!profile(
            VideoCodec::H264,
            vec![AudioCodec::Aac, AudioCodec::Other("truehd".into())]
        )
        .is_repackable());
        assert!(!profile(VideoCodec::H264, vec![AudioCodec::Unknown]).is_repackable());
    }

    #[test]
    fn test_profile_uses_first_video_track_only() {
        let track = |codec: &str| VideoTrack {
            index: 0,
            codec: Some(codec.to_string()),
            width: 1920,
            height: 1080,
            frame_rate: None,
        };
        let info = MediaInfo {
            file_path: PathBuf::from("a.mkv"),
            file_size: 0,
            container: "matroska,webm".to_string(),
            duration: Some(Duration::from_secs(60)),
            video_tracks: vec![track("h264"), track("mpeg2video")],
            audio_tracks: vec![AudioTrack {
                index: 0,
                codec: Some("aac".to_string()),
                channels: 2,
                language: None,
            }],
        };
        let profile = CodecProfile::from_media_info(&info).unwrap();
        assert_eq!(profile.video, VideoCodec::H264);
        assert!(profile.is_repackable());

        let no_video = MediaInfo {
            video_tracks: vec![],
            ..info
        };
        assert!(CodecProfile::from_media_info(&no_video).is_none());
    }

    #[tokio::test]
    async fn test_extension_checked_before_reading() {
        let inspector = inspector(vec![(
            "/media/clip.mp4",
            profile(VideoCodec::H264, vec![AudioCodec::Aac]),
        )]);
        assert!(!inspector.is_eligible(Path::new("/media/clip.mp4")).await);
    }

    #[tokio::test]
    async fn test_eligibility() {
        let inspector = inspector(vec![
            (
                "/media/Movie.MKV",
                profile(VideoCodec::H264, vec![AudioCodec::Aac]),
            ),
            (
                "/media/Show.mkv",
                profile(VideoCodec::Hevc, vec![AudioCodec::Other("dts".into())]),
            ),
        ]);
        assert!(inspector.is_eligible(Path::new("/media/Movie.MKV")).await);
        assert!(!inspector.is_eligible(Path::new("/media/Show.mkv")).await);
        assert_eq!(
            inspector.classify(Path::new("/media/Show.mkv")).await,
            Classification::Ineligible
        );
    }

    #[tokio::test]
    async fn test_read_failure_fails_closed() {
        let inspector = inspector(vec![]);
        assert!(!inspector.is_eligible(Path::new("/media/broken.mkv")).await);
    }

    #[tokio::test]
    async fn test_ffprobe_reader_missing_file() {
        let reader = FfprobeReader::default();
        assert!(reader
            .read_profile(Path::new("/nonexistent/movie.mkv"))
            .await
            .is_err());
    }
}
