use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "reelkit")]
#[command(author, version, about = "Lossless container repacking and release-name cleanup for video libraries")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Repack every eligible file in a directory into the target container
    Remux {
        /// Directory to process (not recursive)
        #[arg(required = true)]
        dir: PathBuf,

        /// Print outcomes as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the codecs of a file and whether it can be repacked
    Inspect {
        /// File to inspect
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Preview (and optionally apply) release-name cleanups in a directory
    Rename {
        /// Directory to process (not recursive)
        #[arg(required = true)]
        dir: PathBuf,

        /// Maximum number of changes to show, 0 for all (overrides config)
        #[arg(short, long)]
        limit: Option<usize>,

        /// Rename the previewed files
        #[arg(long)]
        apply: bool,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
