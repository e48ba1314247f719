mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./reelkit.toml",
        "~/.config/reelkit/config.toml",
        "/etc/reelkit/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {:?}", path);
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    let source = config.remux.source_extension.trim_start_matches('.');
    if source.is_empty() {
        anyhow::bail!("remux.source_extension cannot be empty");
    }

    if source.eq_ignore_ascii_case(config.remux.target_container.extension()) {
        anyhow::bail!(
            "remux.target_container '{}' is the same as the source extension",
            config.remux.target_container
        );
    }

    if config.remux.poll_interval_ms == 0 {
        anyhow::bail!("remux.poll_interval_ms must be greater than 0");
    }

    let sidecar = &config.rename.sidecar_dir;
    if sidecar.is_empty() || sidecar.contains(['/', '\\']) {
        anyhow::bail!(
            "rename.sidecar_dir must be a single directory name, got '{}'",
            sidecar
        );
    }

    if config.rename.rules.is_empty() {
        tracing::warn!("No rename rules configured; rename previews will be empty");
    }

    for (name, path) in [
        ("ffmpeg", &config.tools.ffmpeg_path),
        ("ffprobe", &config.tools.ffprobe_path),
    ] {
        if let Some(path) = path {
            if !path.exists() {
                tracing::warn!("Configured {} path does not exist: {:?}", name, path);
            }
        }
    }

    Ok(())
}
