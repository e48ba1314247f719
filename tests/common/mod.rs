//! Shared fakes for integration tests.
//!
//! [`StaticReader`] serves codec profiles by file name and [`FakeExporter`]
//! writes outputs without running ffmpeg, so batches can be driven end to
//! end against a temporary directory.

#![allow(dead_code)]

use async_trait::async_trait;
use reelkit::batch::BatchRemuxer;
use reelkit_av::{
    AudioCodec, CodecProfile, CompatibilityInspector, Container, Error, ExportSession,
    ExportStatus, Exporter, ProfileReader, RepackEngine, Result, VideoCodec,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn h264_aac() -> CodecProfile {
    CodecProfile {
        video: VideoCodec::H264,
        audio: vec![AudioCodec::Aac],
    }
}

pub fn hevc_truehd() -> CodecProfile {
    CodecProfile {
        video: VideoCodec::Hevc,
        audio: vec![AudioCodec::Other("truehd".to_string())],
    }
}

/// Profiles keyed by file name; any other file fails to read.
#[derive(Default)]
pub struct StaticReader {
    profiles: HashMap<String, CodecProfile>,
}

impl StaticReader {
    pub fn with(mut self, file_name: &str, profile: CodecProfile) -> Self {
        self.profiles.insert(file_name.to_string(), profile);
        self
    }
}

#[async_trait]
impl ProfileReader for StaticReader {
    async fn read_profile(&self, path: &Path) -> Result<CodecProfile> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.profiles
            .get(&name)
            .cloned()
            .ok_or_else(|| Error::parse_error("ffprobe", format!("no profile for {}", name)))
    }
}

/// Exporter that completes after a few polls, or never when `hang` is set.
#[derive(Clone, Default)]
pub struct FakeExporter {
    pub started: Arc<Mutex<Vec<PathBuf>>>,
    pub hang: bool,
}

impl FakeExporter {
    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::default()
        }
    }

    pub fn started(&self) -> Vec<PathBuf> {
        self.started.lock().unwrap().clone()
    }
}

struct FakeSession {
    output: PathBuf,
    polls: u32,
    hang: bool,
}

#[async_trait]
impl Exporter for FakeExporter {
    async fn start(
        &self,
        input: &Path,
        output: &Path,
        _container: Container,
    ) -> Result<Box<dyn ExportSession>> {
        self.started.lock().unwrap().push(input.to_path_buf());
        std::fs::write(output, b"partial")?;
        Ok(Box::new(FakeSession {
            output: output.to_path_buf(),
            polls: 0,
            hang: self.hang,
        }))
    }
}

#[async_trait]
impl ExportSession for FakeSession {
    async fn poll_status(&mut self) -> ExportStatus {
        self.polls += 1;
        if self.hang || self.polls < 3 {
            return ExportStatus::Exporting;
        }
        std::fs::write(&self.output, b"repacked").unwrap();
        ExportStatus::Completed
    }

    fn progress(&self) -> f64 {
        (f64::from(self.polls) * 0.3).min(0.9)
    }

    async fn cancel(&mut self) {}
}

pub fn remuxer(reader: StaticReader, exporter: FakeExporter) -> BatchRemuxer {
    let inspector = CompatibilityInspector::new(Arc::new(reader), "mkv");
    let engine = RepackEngine::new(Arc::new(exporter), Container::Mp4)
        .with_poll_interval(Duration::from_millis(2));
    BatchRemuxer::new(Arc::new(inspector), Arc::new(engine))
}

pub fn touch(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"source").unwrap();
    path
}
