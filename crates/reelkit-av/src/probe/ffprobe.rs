//! FFprobe-based media probing.

use super::types::*;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    format_name: String,
    duration: Option<String>,
    size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    channels: Option<u32>,
    #[serde(default)]
    disposition: FfprobeDisposition,
    #[serde(default)]
    tags: FfprobeTags,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeDisposition {
    #[serde(default)]
    attached_pic: u8,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeTags {
    language: Option<String>,
}

/// Probe a media file using the `ffprobe` executable at `ffprobe`.
pub fn probe_with_ffprobe(ffprobe: &Path, path: &Path) -> Result<MediaInfo> {
    if !path.exists() {
        return Err(Error::file_not_found(path));
    }

    let output = Command::new(ffprobe)
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .output()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::tool_not_found("ffprobe")
            } else {
                Error::Io(e)
            }
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::tool_failed("ffprobe", stderr.to_string()));
    }

    let json_str = String::from_utf8(output.stdout)
        .map_err(|e| Error::parse_error("ffprobe", format!("Invalid UTF-8: {}", e)))?;

    parse_ffprobe_json(path, &json_str)
}

/// Parse the JSON emitted by `ffprobe -show_format -show_streams`.
pub fn parse_ffprobe_json(path: &Path, json: &str) -> Result<MediaInfo> {
    let output: FfprobeOutput = serde_json::from_str(json)?;
    Ok(parse_ffprobe_output(path, output))
}

fn parse_ffprobe_output(path: &Path, output: FfprobeOutput) -> MediaInfo {
    let duration = output
        .format
        .duration
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64);

    let mut info = MediaInfo {
        file_path: path.to_path_buf(),
        file_size: output.format.size.and_then(|s| s.parse().ok()).unwrap_or(0),
        container: output.format.format_name,
        duration,
        video_tracks: Vec::new(),
        audio_tracks: Vec::new(),
    };

    let mut video_index = 0u32;
    let mut audio_index = 0u32;

    for stream in output.streams {
        match stream.codec_type.as_deref() {
            // Cover art is exposed as a video stream; it is not a track.
            Some("video") if stream.disposition.attached_pic == 0 => {
                info.video_tracks.push(VideoTrack {
                    index: video_index,
                    codec: non_empty(stream.codec_name),
                    width: stream.width.unwrap_or(0),
                    height: stream.height.unwrap_or(0),
                    frame_rate: stream.r_frame_rate.and_then(|s| parse_frame_rate(&s)),
                });
                video_index += 1;
            }
            Some("audio") => {
                info.audio_tracks.push(AudioTrack {
                    index: audio_index,
                    codec: non_empty(stream.codec_name),
                    channels: stream.channels.unwrap_or(2),
                    language: stream.tags.language,
                });
                audio_index += 1;
            }
            _ => {}
        }
    }

    info
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

fn parse_frame_rate(rate_str: &str) -> Option<f64> {
    let parts: Vec<&str> = rate_str.split('/').collect();
    if parts.len() == 2 {
        let num: f64 = parts[0].parse().ok()?;
        let den: f64 = parts[1].parse().ok()?;
        if den != 0.0 {
            return Some(num / den);
        }
    }
    rate_str.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "streams": [
            {"index": 0, "codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080, "r_frame_rate": "24000/1001"},
            {"index": 1, "codec_type": "audio", "codec_name": "aac", "channels": 6, "tags": {"language": "eng"}},
            {"index": 2, "codec_type": "audio", "codec_name": "truehd", "channels": 8},
            {"index": 3, "codec_type": "subtitle", "codec_name": "subrip"},
            {"index": 4, "codec_type": "video", "codec_name": "mjpeg", "disposition": {"attached_pic": 1}}
        ],
        "format": {"filename": "movie.mkv", "format_name": "matroska,webm", "duration": "5400.5", "size": "1048576"}
    }"#;

    #[test]
    fn test_parse_sample() {
        let info = parse_ffprobe_json(Path::new("/media/movie.mkv"), SAMPLE).unwrap();

        assert_eq!(info.container, "matroska,webm");
        assert_eq!(info.file_size, 1_048_576);
        assert_eq!(info.duration, Some(Duration::from_secs_f64(5400.5)));

        assert_eq!(info.video_tracks.len(), 1);
        let video = info.primary_video().unwrap();
        assert_eq!(video.codec.as_deref(), Some("h264"));
        assert_eq!((video.width, video.height), (1920, 1080));

        assert_eq!(info.audio_tracks.len(), 2);
        assert_eq!(info.audio_tracks[0].language.as_deref(), Some("eng"));
        assert_eq!(info.audio_tracks[1].codec.as_deref(), Some("truehd"));
        assert_eq!(info.audio_tracks[1].index, 1);
    }

    #[test]
    fn test_missing_codec_metadata() {
        let json = r#"{
            "streams": [{"codec_type": "video", "codec_name": ""}, {"codec_type": "audio"}],
            "format": {"format_name": "matroska,webm"}
        }"#;
        let info = parse_ffprobe_json(Path::new("x.mkv"), json).unwrap();
        assert!(info.video_tracks[0].codec.is_none());
        assert!(info.audio_tracks[0].codec.is_none());
        assert!(info.duration.is_none());
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            parse_ffprobe_json(Path::new("x.mkv"), "not json"),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn test_probe_missing_file() {
        let result = probe_with_ffprobe(Path::new("ffprobe"), Path::new("/nonexistent/file.mkv"));
        assert!(matches!(result, Err(Error::FileNotFound { .. })));
    }

    #[test]
    fn test_parse_frame_rate() {
        assert_eq!(parse_frame_rate("24000/1001"), Some(23.976023976023978));
        assert_eq!(parse_frame_rate("30/1"), Some(30.0));
        assert_eq!(parse_frame_rate("25"), Some(25.0));
        assert_eq!(parse_frame_rate("invalid"), None);
    }
}
