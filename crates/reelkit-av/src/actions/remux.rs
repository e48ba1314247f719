//! Container repacking.
//!
//! The engine stream-copies a file into a new container next to the
//! original, reporting progress by polling the export on a fixed interval.
//! Only a completed export archives the original as `<name>.bak`; failed and
//! cancelled exports leave the original where it was and remove whatever
//! partial output they produced.

use super::export::{ExportStatus, Exporter};
use crate::{Error, Result};
use reelkit_common::paths::{backup_path, with_replaced_extension};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Supported container formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Container {
    /// Matroska container
    Mkv,
    /// MPEG-4 Part 14 container
    Mp4,
    /// MPEG transport stream
    Ts,
    /// QuickTime container
    Mov,
    /// WebM container
    Webm,
    /// M2TS (Blu-ray) container
    M2ts,
}

impl Container {
    /// Get the file extension for this container.
    pub fn extension(&self) -> &'static str {
        match self {
            Container::Mkv => "mkv",
            Container::Mp4 => "mp4",
            Container::Ts => "ts",
            Container::Mov => "mov",
            Container::Webm => "webm",
            Container::M2ts => "m2ts",
        }
    }

    /// Get the FFmpeg muxer name for this container.
    pub fn ffmpeg_format_name(&self) -> &'static str {
        match self {
            Container::Mkv => "matroska",
            Container::Mp4 => "mp4",
            Container::Ts => "mpegts",
            Container::Mov => "mov",
            Container::Webm => "webm",
            Container::M2ts => "mpegts", // M2TS uses the same muxer as TS
        }
    }

    /// Whether the muxer can move its index to the front for progressive playback.
    pub fn supports_faststart(&self) -> bool {
        matches!(self, Container::Mp4 | Container::Mov)
    }
}

impl std::str::FromStr for Container {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mkv" | "matroska" => Ok(Container::Mkv),
            "mp4" | "m4v" => Ok(Container::Mp4),
            "ts" | "mpegts" => Ok(Container::Ts),
            "mov" | "quicktime" => Ok(Container::Mov),
            "webm" => Ok(Container::Webm),
            "m2ts" => Ok(Container::M2ts),
            _ => Err(format!("Unknown container format: {}", s)),
        }
    }
}

impl std::fmt::Display for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Stream-copies eligible files into the target container.
pub struct RepackEngine {
    exporter: Arc<dyn Exporter>,
    target: Container,
    poll_interval: Duration,
}

impl RepackEngine {
    /// Default progress sampling interval.
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

    pub fn new(exporter: Arc<dyn Exporter>, target: Container) -> Self {
        Self {
            exporter,
            target,
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
        }
    }

    /// Override the progress sampling interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Where the repacked copy of `input` is written.
    pub fn output_path(&self, input: &Path) -> PathBuf {
        with_replaced_extension(input, self.target.extension())
    }

    /// Repack `input` into the target container.
    ///
    /// `on_progress` receives fractions in `0.0..=1.0`, sampled every poll
    /// interval while the export runs. A stale output from an earlier attempt
    /// is removed first. On success the original is renamed to
    /// `<name>.bak` and the output path is returned.
    ///
    /// # Errors
    ///
    /// - [`Error::DestinationExists`] if a stale output cannot be removed
    /// - [`Error::ExportFailed`] if the backend reports a failure
    /// - [`Error::Cancelled`] if `cancel` fires before the export completes
    /// - [`Error::UnknownExportState`] for any other terminal state
    /// - [`Error::Backup`] if the export succeeded but archiving failed
    pub async fn repack<F>(
        &self,
        input: &Path,
        cancel: &CancellationToken,
        mut on_progress: F,
    ) -> Result<PathBuf>
    where
        F: FnMut(f64) + Send,
    {
        let output = self.output_path(input);
        if output == input {
            return Err(Error::InvalidInput(format!(
                "{:?} is already a .{} file",
                input,
                self.target.extension()
            )));
        }
        if !tokio::fs::try_exists(input).await.unwrap_or(false) {
            return Err(Error::file_not_found(input));
        }
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        if tokio::fs::try_exists(&output).await.unwrap_or(false) {
            #[cfg(feature = "tracing")]
            tracing::info!("Removing previous output {:?} before repacking", output);
            tokio::fs::remove_file(&output)
                .await
                .map_err(|_| Error::DestinationExists {
                    path: output.clone(),
                })?;
        }

        #[cfg(feature = "tracing")]
        tracing::info!("Repacking {:?} to {}", input, self.target);

        let mut session = self.exporter.start(input, &output, self.target).await?;

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let terminal = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    session.cancel().await;
                    break ExportStatus::Cancelled;
                }
                _ = ticker.tick() => {
                    let status = session.poll_status().await;
                    if status.is_terminal() {
                        break status;
                    }
                    on_progress(session.progress());
                }
            }
        };

        match terminal {
            ExportStatus::Completed => {
                if !tokio::fs::try_exists(&output).await.unwrap_or(false) {
                    return Err(Error::export_failed("export completed without output"));
                }
                on_progress(1.0);

                let backup = backup_path(input);
                tokio::fs::rename(input, &backup)
                    .await
                    .map_err(|source| Error::Backup {
                        path: input.to_path_buf(),
                        source,
                    })?;

                #[cfg(feature = "tracing")]
                tracing::info!("Repack complete: {:?} (original kept as {:?})", output, backup);

                Ok(output)
            }
            ExportStatus::Failed(message) => {
                discard_partial(&output).await;
                Err(Error::export_failed(message))
            }
            ExportStatus::Cancelled => {
                discard_partial(&output).await;
                Err(Error::Cancelled)
            }
            ExportStatus::Waiting | ExportStatus::Exporting | ExportStatus::Unknown => {
                discard_partial(&output).await;
                Err(Error::UnknownExportState)
            }
        }
    }
}

async fn discard_partial(output: &Path) {
    match tokio::fs::remove_file(output).await {
        Ok(()) => {
            #[cfg(feature = "tracing")]
            tracing::debug!("Removed partial output {:?}", output);
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            #[cfg(feature = "tracing")]
            tracing::warn!("Could not remove partial output {:?}: {}", output, e);
            let _ = e;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::export::ExportSession;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// Plays back a fixed status script. Writes a partial output on start and
    /// "finishes" it when the script reaches `Completed`. An exhausted script
    /// keeps reporting `Exporting`.
    struct ScriptedExporter {
        script: Vec<ExportStatus>,
        cancelled: Arc<AtomicBool>,
        started: Arc<Mutex<Vec<PathBuf>>>,
    }

    impl ScriptedExporter {
        fn new(script: Vec<ExportStatus>) -> Self {
            Self {
                script,
                cancelled: Arc::new(AtomicBool::new(false)),
                started: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    struct ScriptedSession {
        script: VecDeque<ExportStatus>,
        output: PathBuf,
        progress: f64,
        cancelled: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Exporter for ScriptedExporter {
        async fn start(
            &self,
            input: &Path,
            output: &Path,
            _container: Container,
        ) -> Result<Box<dyn ExportSession>> {
            self.started.lock().unwrap().push(input.to_path_buf());
            std::fs::write(output, b"partial")?;
            Ok(Box::new(ScriptedSession {
                script: self.script.clone().into(),
                output: output.to_path_buf(),
                progress: 0.0,
                cancelled: Arc::clone(&self.cancelled),
            }))
        }
    }

    #[async_trait]
    impl ExportSession for ScriptedSession {
        async fn poll_status(&mut self) -> ExportStatus {
            let status = self.script.pop_front().unwrap_or(ExportStatus::Exporting);
            match status {
                ExportStatus::Exporting => self.progress = (self.progress + 0.25).min(1.0),
                ExportStatus::Completed => std::fs::write(&self.output, b"complete").unwrap(),
                _ => {}
            }
            status
        }

        fn progress(&self) -> f64 {
            self.progress
        }

        async fn cancel(&mut self) {
            self.cancelled.store(true, Ordering::SeqCst);
        }
    }

    fn engine(exporter: ScriptedExporter) -> RepackEngine {
        RepackEngine::new(Arc::new(exporter), Container::Mp4)
            .with_poll_interval(Duration::from_millis(2))
    }

    fn source_file(dir: &Path) -> PathBuf {
        let input = dir.join("Movie.mkv");
        std::fs::write(&input, b"source").unwrap();
        input
    }

    #[test]
    fn test_container_extension() {
        assert_eq!(Container::Mkv.extension(), "mkv");
        assert_eq!(Container::Mp4.extension(), "mp4");
        assert_eq!(Container::Ts.extension(), "ts");
    }

    #[test]
    fn test_container_from_str() {
        assert_eq!("mkv".parse::<Container>().ok(), Some(Container::Mkv));
        assert_eq!("MKV".parse::<Container>().ok(), Some(Container::Mkv));
        assert_eq!("mp4".parse::<Container>().ok(), Some(Container::Mp4));
        assert_eq!("unknown".parse::<Container>().ok(), None);
    }

    #[test]
    fn test_container_ffmpeg_format_name() {
        assert_eq!(Container::Mkv.ffmpeg_format_name(), "matroska");
        assert_eq!(Container::Mp4.ffmpeg_format_name(), "mp4");
        assert_eq!(Container::M2ts.ffmpeg_format_name(), "mpegts");
        assert!(Container::Mov.supports_faststart());
        assert!(!Container::Webm.supports_faststart());
    }

    #[test]
    fn test_output_path_swaps_extension() {
        let engine = engine(ScriptedExporter::new(vec![]));
        assert_eq!(
            engine.output_path(Path::new("/media/Movie.2020.mkv")),
            PathBuf::from("/media/Movie.2020.mp4")
        );
    }

    #[tokio::test]
    async fn test_successful_repack_archives_original() {
        let dir = tempfile::tempdir().unwrap();
        let input = source_file(dir.path());
        let engine = engine(ScriptedExporter::new(vec![
            ExportStatus::Waiting,
            ExportStatus::Exporting,
            ExportStatus::Exporting,
            ExportStatus::Completed,
        ]));

        let mut fractions = Vec::new();
        let output = engine
            .repack(&input, &CancellationToken::new(), |f| fractions.push(f))
            .await
            .unwrap();

        assert_eq!(output, dir.path().join("Movie.mp4"));
        assert_eq!(std::fs::read(&output).unwrap(), b"complete");
        assert!(!input.exists());
        assert!(dir.path().join("Movie.mkv.bak").exists());

        assert_eq!(fractions, vec![0.0, 0.25, 0.5, 1.0]);
    }

    #[tokio::test]
    async fn test_stale_output_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let input = source_file(dir.path());
        std::fs::write(dir.path().join("Movie.mp4"), b"stale").unwrap();

        let engine = engine(ScriptedExporter::new(vec![ExportStatus::Completed]));
        let output = engine
            .repack(&input, &CancellationToken::new(), |_| {})
            .await
            .unwrap();
        assert_eq!(std::fs::read(output).unwrap(), b"complete");
    }

    #[tokio::test]
    async fn test_failed_export_keeps_original() {
        let dir = tempfile::tempdir().unwrap();
        let input = source_file(dir.path());
        let engine = engine(ScriptedExporter::new(vec![
            ExportStatus::Exporting,
            ExportStatus::Failed("muxer error".to_string()),
        ]));

        let err = engine
            .repack(&input, &CancellationToken::new(), |_| {})
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ExportFailed { ref message } if message == "muxer error"));
        assert!(input.exists());
        assert!(!dir.path().join("Movie.mkv.bak").exists());
        assert!(!dir.path().join("Movie.mp4").exists());
    }

    #[tokio::test]
    async fn test_unknown_terminal_state() {
        let dir = tempfile::tempdir().unwrap();
        let input = source_file(dir.path());
        let engine = engine(ScriptedExporter::new(vec![ExportStatus::Unknown]));

        let err = engine
            .repack(&input, &CancellationToken::new(), |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownExportState));
        assert!(input.exists());
    }

    #[tokio::test]
    async fn test_cancel_mid_export_leaves_no_backup_or_partial() {
        let dir = tempfile::tempdir().unwrap();
        let input = source_file(dir.path());
        let exporter = ScriptedExporter::new(vec![]);
        let cancelled = Arc::clone(&exporter.cancelled);
        let engine = engine(exporter);

        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = engine.repack(&input, &token, |_| {}).await.unwrap_err();

        assert!(err.is_cancelled());
        assert!(cancelled.load(Ordering::SeqCst));
        assert!(input.exists());
        assert!(!dir.path().join("Movie.mkv.bak").exists());
        assert!(!dir.path().join("Movie.mp4").exists());
    }

    #[tokio::test]
    async fn test_already_cancelled_never_starts() {
        let dir = tempfile::tempdir().unwrap();
        let input = source_file(dir.path());
        let exporter = ScriptedExporter::new(vec![ExportStatus::Completed]);
        let started = Arc::clone(&exporter.started);
        let engine = engine(exporter);

        let token = CancellationToken::new();
        token.cancel();
        let err = engine.repack(&input, &token, |_| {}).await.unwrap_err();

        assert!(err.is_cancelled());
        assert!(started.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(ScriptedExporter::new(vec![ExportStatus::Completed]));
        let err = engine
            .repack(&dir.path().join("gone.mkv"), &CancellationToken::new(), |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, Error::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn test_same_container_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("clip.mp4");
        std::fs::write(&input, b"source").unwrap();
        let engine = engine(ScriptedExporter::new(vec![ExportStatus::Completed]));
        let err = engine
            .repack(&input, &CancellationToken::new(), |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(input.exists());
    }
}
