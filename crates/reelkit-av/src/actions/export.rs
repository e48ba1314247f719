//! Export backends: the process that actually rewrites the container.
//!
//! An [`Exporter`] starts a stream-copy export and hands back an
//! [`ExportSession`] whose status and progress the repack engine samples on
//! a fixed interval. The ffmpeg backend feeds that session from ffmpeg's
//! `-progress` pipe.

use super::remux::Container;
use crate::probe::probe_with_ffprobe;
use crate::tools::{FFMPEG, FFPROBE};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;

/// Lines of ffmpeg stderr kept for error messages.
const STDERR_TAIL_LINES: usize = 20;

/// Observable state of an export.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportStatus {
    /// Started but no progress reported yet.
    Waiting,
    /// Running.
    Exporting,
    /// Finished successfully; the output is complete.
    Completed,
    /// Finished with an error from the backend.
    Failed(String),
    /// Stopped on request.
    Cancelled,
    /// Ended in a state the backend cannot explain.
    Unknown,
}

impl ExportStatus {
    /// Whether the export has stopped.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Waiting | Self::Exporting)
    }
}

/// A running export.
#[async_trait]
pub trait ExportSession: Send {
    /// Sample the current status.
    async fn poll_status(&mut self) -> ExportStatus;

    /// Fraction complete in `0.0..=1.0`.
    fn progress(&self) -> f64;

    /// Stop the export. Subsequent polls report [`ExportStatus::Cancelled`].
    async fn cancel(&mut self);
}

/// Starts stream-copy exports.
#[async_trait]
pub trait Exporter: Send + Sync {
    /// Begin copying `input` into `output` using `container`.
    async fn start(
        &self,
        input: &Path,
        output: &Path,
        container: Container,
    ) -> Result<Box<dyn ExportSession>>;
}

/// Exports with the ffmpeg CLI.
#[derive(Debug, Clone)]
pub struct FfmpegExporter {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl FfmpegExporter {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    /// Build the ffmpeg argument list for a stream-copy export.
    pub fn build_args(input: &Path, output: &Path, container: Container) -> Vec<String> {
        let mut args: Vec<String> = ["-hide_banner", "-nostdin", "-y", "-i"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        args.push(input.to_string_lossy().into_owned());

        // First real video track (no cover art) plus every audio track.
        args.extend(
            ["-map", "0:V:0", "-map", "0:a?", "-c", "copy"]
                .iter()
                .map(|s| s.to_string()),
        );

        if container.supports_faststart() {
            args.extend(["-movflags".to_string(), "+faststart".to_string()]);
        }

        args.extend([
            "-f".to_string(),
            container.ffmpeg_format_name().to_string(),
            "-progress".to_string(),
            "pipe:1".to_string(),
            "-nostats".to_string(),
        ]);
        args.push(output.to_string_lossy().into_owned());
        args
    }

    async fn probe_duration(&self, input: &Path) -> Option<Duration> {
        let ffprobe = self.ffprobe.clone();
        let input = input.to_path_buf();
        tokio::task::spawn_blocking(move || probe_with_ffprobe(&ffprobe, &input))
            .await
            .ok()
            .and_then(|r| r.ok())
            .and_then(|info| info.duration)
    }
}

impl Default for FfmpegExporter {
    fn default() -> Self {
        Self::new(FFMPEG, FFPROBE)
    }
}

#[async_trait]
impl Exporter for FfmpegExporter {
    async fn start(
        &self,
        input: &Path,
        output: &Path,
        container: Container,
    ) -> Result<Box<dyn ExportSession>> {
        let duration = self.probe_duration(input).await;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "Starting ffmpeg export {:?} -> {:?} (duration {:?})",
            input,
            output,
            duration
        );

        let mut child = Command::new(&self.ffmpeg)
            .args(Self::build_args(input, output, container))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::tool_not_found("ffmpeg")
                } else {
                    Error::Io(e)
                }
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::tool_failed("ffmpeg", "stdout was not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::tool_failed("ffmpeg", "stderr was not captured"))?;

        let progress = Arc::new(AtomicU64::new(0f64.to_bits()));
        let reader = tokio::spawn(read_progress(stdout, duration, Arc::clone(&progress)));
        let stderr_task = tokio::spawn(read_tail(stderr));

        Ok(Box::new(FfmpegSession {
            child,
            progress,
            reader: Some(reader),
            stderr_task: Some(stderr_task),
            finished: None,
        }))
    }
}

struct FfmpegSession {
    child: Child,
    progress: Arc<AtomicU64>,
    reader: Option<JoinHandle<()>>,
    stderr_task: Option<JoinHandle<String>>,
    finished: Option<ExportStatus>,
}

#[async_trait]
impl ExportSession for FfmpegSession {
    async fn poll_status(&mut self) -> ExportStatus {
        if let Some(status) = &self.finished {
            return status.clone();
        }

        let status = match self.child.try_wait() {
            Ok(None) if self.progress() > 0.0 => return ExportStatus::Exporting,
            Ok(None) => return ExportStatus::Waiting,
            Ok(Some(exit)) => {
                if let Some(reader) = self.reader.take() {
                    let _ = reader.await;
                }
                let stderr = match self.stderr_task.take() {
                    Some(task) => task.await.unwrap_or_default(),
                    None => String::new(),
                };

                if exit.success() {
                    ExportStatus::Completed
                } else if let Some(code) = exit.code() {
                    ExportStatus::Failed(format!("ffmpeg exited with code {}: {}", code, stderr.trim()))
                } else {
                    // Terminated by a signal we did not send.
                    ExportStatus::Unknown
                }
            }
            Err(e) => ExportStatus::Failed(e.to_string()),
        };

        self.finished = Some(status.clone());
        status
    }

    fn progress(&self) -> f64 {
        f64::from_bits(self.progress.load(Ordering::Relaxed))
    }

    async fn cancel(&mut self) {
        if self.finished.is_none() {
            let _ = self.child.kill().await;
            self.finished = Some(ExportStatus::Cancelled);
        }
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }
    }
}

/// Consume ffmpeg's `-progress` key=value stream.
async fn read_progress(stdout: ChildStdout, duration: Option<Duration>, progress: Arc<AtomicU64>) {
    let mut lines = BufReader::new(stdout).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if let Some(fraction) = parse_progress_line(&line, duration) {
            // Non-negative f64 bit patterns order like the values, so
            // fetch_max keeps progress monotonic.
            progress.fetch_max(fraction.to_bits(), Ordering::Relaxed);
        }
    }
}

/// Parse one progress line into a fraction of `duration`.
///
/// `out_time_ms` is reported in microseconds by ffmpeg, same as `out_time_us`.
fn parse_progress_line(line: &str, duration: Option<Duration>) -> Option<f64> {
    let (key, value) = line.trim().split_once('=')?;
    match key {
        "progress" if value == "end" => Some(1.0),
        "out_time_us" | "out_time_ms" => {
            let micros: f64 = value.parse().ok()?;
            let total = duration?.as_secs_f64();
            if total <= 0.0 || micros < 0.0 {
                return None;
            }
            Some((micros / 1_000_000.0 / total).clamp(0.0, 1.0))
        }
        _ => None,
    }
}

async fn read_tail<R: AsyncRead + Unpin>(stream: R) -> String {
    let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if tail.len() == STDERR_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    }
    Vec::from(tail).join("\n")
}
