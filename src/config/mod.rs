mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Environment variable consulted when no TMDB token is configured.
pub const TMDB_TOKEN_ENV: &str = "TMDB_API";

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let mut config = parse_config(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    if config.database.path.is_relative() {
        if let Some(dir) = path.parent() {
            config.database.path = dir.join(&config.database.path);
        }
    }

    Ok(config)
}

/// Parse and validate configuration from TOML text, applying env fallbacks.
pub fn parse_config(content: &str) -> Result<Config> {
    let mut config: Config = toml::from_str(content)?;
    apply_env(&mut config);
    validate_config(&config)?;
    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./config.toml",
        "./stremtmdb.toml",
        "~/.config/stremtmdb/config.toml",
        "/etc/stremtmdb/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    let mut config = Config::default();
    apply_env(&mut config);
    Ok(config)
}

fn apply_env(config: &mut Config) {
    if config.tmdb.api_token.trim().is_empty() {
        if let Ok(token) = std::env::var(TMDB_TOKEN_ENV) {
            config.tmdb.api_token = token;
        }
    }
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    if config.resolver.max_concurrent_resolutions == 0 {
        anyhow::bail!("resolver.max_concurrent_resolutions must be at least 1");
    }

    if config.tmdb.requests_per_second == 0 {
        anyhow::bail!("tmdb.requests_per_second must be at least 1");
    }

    if config.imdb.requests_per_second == 0 {
        anyhow::bail!("imdb.requests_per_second must be at least 1");
    }

    if !(1..=500).contains(&config.imdb.page_size) {
        anyhow::bail!(
            "imdb.page_size must be between 1 and 500, got {}",
            config.imdb.page_size
        );
    }

    if config.tmdb.api_token.trim().is_empty() {
        tracing::warn!(
            "No TMDB token configured; set tmdb.api_token or {}",
            TMDB_TOKEN_ENV
        );
    }

    Ok(())
}

/// Ensure the credentials needed to reach the providers are present.
pub fn require_credentials(config: &Config) -> Result<()> {
    if config.tmdb.api_token.trim().is_empty() {
        anyhow::bail!(
            "A TMDB token is required: set tmdb.api_token or the {} environment variable",
            TMDB_TOKEN_ENV
        );
    }
    Ok(())
}
