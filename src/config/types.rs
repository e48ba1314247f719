use crate::rename::CleanupRule;
use reelkit_av::{Container, ToolPaths};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub remux: RemuxConfig,

    #[serde(default)]
    pub rename: RenameConfig,

    #[serde(default)]
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RemuxConfig {
    /// Extension of the files a batch picks up (default: "mkv")
    #[serde(default = "default_source_extension")]
    pub source_extension: String,

    /// Container produced by a repack (default: mp4)
    #[serde(default = "default_target_container")]
    pub target_container: Container,

    /// How often a running export is polled, in milliseconds (default: 100)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Replace a file already sitting at the output path
    #[serde(default)]
    pub overwrite_existing: bool,
}

fn default_source_extension() -> String {
    "mkv".to_string()
}

fn default_target_container() -> Container {
    Container::Mp4
}

fn default_poll_interval_ms() -> u64 {
    100
}

impl Default for RemuxConfig {
    fn default() -> Self {
        Self {
            source_extension: default_source_extension(),
            target_container: default_target_container(),
            poll_interval_ms: default_poll_interval_ms(),
            overwrite_existing: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RenameConfig {
    /// Directory next to the media holding thumbnails (default: ".video_info")
    #[serde(default = "default_sidecar_dir")]
    pub sidecar_dir: String,

    /// Maximum number of changes a preview returns, 0 = unlimited (default: 50)
    #[serde(default = "default_preview_limit")]
    pub preview_limit: usize,

    /// Cleanup rules, applied in order
    #[serde(default = "CleanupRule::defaults")]
    pub rules: Vec<CleanupRule>,
}

fn default_sidecar_dir() -> String {
    ".video_info".to_string()
}

fn default_preview_limit() -> usize {
    50
}

impl Default for RenameConfig {
    fn default() -> Self {
        Self {
            sidecar_dir: default_sidecar_dir(),
            preview_limit: default_preview_limit(),
            rules: CleanupRule::defaults(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,
}

impl ToolsConfig {
    /// Resolve the configured tool locations, falling back to `PATH` lookup.
    pub fn paths(&self) -> ToolPaths {
        ToolPaths::resolve(self.ffmpeg_path.as_deref(), self.ffprobe_path.as_deref())
    }
}
