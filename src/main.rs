mod cli;

use reelkit::{
    batch::{BatchCancel, BatchProgress, BatchRemuxer, BatchSummary, RepackOutcome},
    config,
    rename::{self, FilenameNormalizer, PreviewLimit},
};
use reelkit_av::{FfprobeReader, ProfileReader};
use reelkit_common::has_extension;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;
use std::process::ExitCode;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "reelkit=debug,reelkit_av=debug".to_string()
        } else {
            "reelkit=info,reelkit_av=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Remux { dir, json } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(remux_directory(&dir, cli.config.as_deref(), json))
        }
        Commands::Inspect { file, json } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(inspect_file(&file, cli.config.as_deref(), json))?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Rename { dir, limit, apply } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(rename_directory(&dir, cli.config.as_deref(), limit, apply))
        }
        Commands::CheckTools => {
            check_tools(cli.config.as_deref())?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Version => {
            println!("reelkit {}", env!("CARGO_PKG_VERSION"));
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn remux_directory(dir: &Path, config_path: Option<&Path>, json: bool) -> Result<ExitCode> {
    let config = config::load_config_or_default(config_path)?;

    if !dir.is_dir() {
        anyhow::bail!("Directory does not exist: {:?}", dir);
    }

    let tools = config.tools.paths();
    let remuxer = BatchRemuxer::from_config(&config.remux, &tools);

    let cancel = BatchCancel::new();
    let signal_cancel = cancel.clone();
    let signal_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        eprintln!("Stopping after the current file (Ctrl-C again to abort it)");
        signal_cancel.stop_after_current();

        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Aborting the current file");
            signal_cancel.abort_current();
        }
    });

    tracing::info!(
        "Repacking .{} files in {:?} to {}",
        config.remux.source_extension,
        dir,
        config.remux.target_container
    );

    let mut last_printed: Option<(usize, u32)> = None;
    let outcomes = remuxer
        .run_batch(dir, &cancel, |progress: BatchProgress| {
            // One line per file start and per 10% step.
            let step = (progress.fraction * 10.0).floor() as u32;
            if last_printed == Some((progress.processed_count, step)) {
                return;
            }
            last_printed = Some((progress.processed_count, step));
            eprintln!(
                "[{}/{}] {} {:>3.0}%",
                progress.processed_count,
                progress.total_count,
                progress.current_file_name,
                progress.fraction * 100.0
            );
        })
        .await;
    signal_task.abort();

    let summary = BatchSummary::from_outcomes(&outcomes);

    if json {
        let reports: Vec<_> = outcomes.iter().map(RepackOutcome::to_report).collect();
        let json_str = serde_json::to_string_pretty(&serde_json::json!({
            "outcomes": reports,
            "summary": summary,
        }))?;
        println!("{}", json_str);
    } else {
        for outcome in &outcomes {
            match outcome {
                RepackOutcome::Success { original, output } => {
                    println!("✓ {} -> {}", original.display(), output.display())
                }
                RepackOutcome::Failure { original, error } => {
                    println!("✗ {}: {}", original.display(), error)
                }
                RepackOutcome::Skipped { original, reason } => {
                    println!("- {}: {}", original.display(), reason)
                }
            }
        }
        println!(
            "\n{} succeeded, {} failed, {} skipped",
            summary.succeeded, summary.failed, summary.skipped
        );
    }

    Ok(if summary.failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

async fn inspect_file(file: &Path, config_path: Option<&Path>, json: bool) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let reader = FfprobeReader::new(config.tools.paths().ffprobe);
    let profile = reader
        .read_profile(file)
        .await
        .with_context(|| format!("Failed to inspect {:?}", file))?;

    let extension_ok = has_extension(file, &config.remux.source_extension);
    let eligible = extension_ok && profile.is_repackable();

    if json {
        let json_str = serde_json::to_string_pretty(&serde_json::json!({
            "file": file,
            "profile": profile,
            "eligible": eligible,
        }))?;
        println!("{}", json_str);
    } else {
        println!("File: {}", file.display());
        println!(
            "Video: {} ({})",
            profile.video,
            if profile.video.is_repackable() { "ok" } else { "unsupported" }
        );
        println!("\nAudio Tracks: {}", profile.audio.len());
        for (i, codec) in profile.audio.iter().enumerate() {
            println!(
                "  [{}] {} ({})",
                i,
                codec,
                if codec.is_repackable() { "ok" } else { "unsupported" }
            );
        }

        println!();
        if eligible {
            println!("Eligible: can be repacked to {}", config.remux.target_container);
        } else if !extension_ok {
            println!(
                "Not eligible: only .{} files are repacked",
                config.remux.source_extension
            );
        } else {
            println!("Not eligible: incompatible codecs");
        }
    }

    Ok(())
}

async fn rename_directory(
    dir: &Path,
    config_path: Option<&Path>,
    limit: Option<usize>,
    apply: bool,
) -> Result<ExitCode> {
    let config = config::load_config_or_default(config_path)?;

    let normalizer = FilenameNormalizer::from_config(&config.rename)
        .context("Failed to compile rename rules")?;
    let files = rename::scan_directory(dir)
        .with_context(|| format!("Failed to read directory {:?}", dir))?;

    let limit = PreviewLimit::from_config(limit.unwrap_or(config.rename.preview_limit));
    let preview = normalizer.preview(&files, limit);

    if preview.total_matches == 0 {
        println!("Nothing to rename in {}", dir.display());
        return Ok(ExitCode::SUCCESS);
    }

    for change in &preview.changes {
        println!(
            "{} -> {}",
            file_name(&change.original),
            file_name(&change.cleaned)
        );
    }
    println!(
        "\n{} of {} files would be renamed",
        preview.changes.len(),
        preview.total_matches
    );

    if !apply {
        return Ok(ExitCode::SUCCESS);
    }

    let report = normalizer
        .apply(&preview.changes, |progress| {
            tracing::debug!(
                "Renaming {} ({}/{})",
                progress.current_file_name,
                progress.processed_index,
                preview.changes.len()
            );
        })
        .await;

    for failure in &report.failures {
        println!("✗ {}: {}", file_name(&failure.change.original), failure.error);
    }
    println!("\n{} renamed, {} failed", report.succeeded, report.failed);

    Ok(if report.failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let paths = config.tools.paths();

    println!("Checking external tools...\n");

    let tools = reelkit_av::check_tools(&paths);
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version.lines().next().unwrap_or(""));
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install ffmpeg to enable repacking.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            config::Config::default()
        }
    };

    println!(
        "  Remux: .{} -> {}",
        config.remux.source_extension, config.remux.target_container
    );
    println!("  Poll interval: {} ms", config.remux.poll_interval_ms);
    println!("  Overwrite existing: {}", config.remux.overwrite_existing);
    println!("  Sidecar dir: {}", config.rename.sidecar_dir);
    println!("  Rename rules: {}", config.rename.rules.len());

    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
