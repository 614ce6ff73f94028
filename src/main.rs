mod cli;

use stremtmdb::{
    cache::SqliteIdentityStore,
    config::{self, Config},
    providers::{ImdbClient, TmdbClient},
    resolver::Resolver,
    server::{
        self,
        views::{season_mappings, series_mappings, Envelope, IdMapping},
    },
};
use stremtmdb_common::MediaKind;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, PurgeKind};
use serde::Serialize;
use std::sync::Arc;

/// Wire the providers and the identity store described by `config`.
fn build_resolver(config: &Config) -> Result<Arc<Resolver>> {
    config::require_credentials(config)?;

    tracing::info!("Opening identity database at {:?}", config.database.path);
    let store = SqliteIdentityStore::open(&config.database.path).with_context(|| {
        format!(
            "Failed to open identity database {:?}",
            config.database.path
        )
    })?;

    let catalog = TmdbClient::new(&config.tmdb).context("Failed to build TMDB client")?;
    let graph = ImdbClient::new(&config.imdb).context("Failed to build IMDb client")?;

    Ok(Arc::new(Resolver::new(
        Arc::new(catalog),
        Arc::new(graph),
        Arc::new(store),
        config.resolver.max_concurrent_resolutions,
    )))
}

async fn start_server(
    host: Option<String>,
    port: Option<u16>,
    config_path: Option<&std::path::Path>,
) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;

    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    config::validate_config(&config)?;

    tracing::info!("Starting stremtmdb server");
    tracing::info!(
        "Server will listen on {}:{}",
        config.server.host,
        config.server.port
    );

    let resolver = build_resolver(&config)?;
    server::start_server(config, resolver).await
}

fn print_json<T: Serialize>(ids: &[u64], body: Option<T>) -> Result<()> {
    let envelope = match body {
        Some(body) => Envelope::found(body),
        None => Envelope::failed(ids),
    };
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(())
}

async fn run_command(command: Commands, config_path: Option<&std::path::Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let resolver = build_resolver(&config)?;

    match command {
        Commands::Movie { id } => {
            let entry = resolver.resolve_movie(id).await?;
            print_json(&[id], entry.as_ref().map(IdMapping::from))
        }
        Commands::Season { series, season } => {
            let outcomes = resolver.resolve_season(series, season, true).await?;
            print_json(
                &[series, u64::from(season)],
                outcomes.as_deref().map(season_mappings),
            )
        }
        Commands::Series { id } => {
            let seasons = resolver.resolve_series(id).await?;
            print_json(&[id], seasons.as_deref().map(series_mappings))
        }
        Commands::Purge { kind, id } => {
            let kind = match kind {
                PurgeKind::Movie => MediaKind::Movie,
                PurgeKind::Series => MediaKind::Episode,
            };
            let removed = resolver.purge(kind, id).await?;
            println!("Removed {removed} entries.");
            Ok(())
        }
        Commands::Start { .. } | Commands::Validate { .. } | Commands::Version => {
            anyhow::bail!("command does not resolve identities")
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "stremtmdb=trace,stremtmdb_db=debug,stremtmdb_common=debug,tower_http=debug".to_string()
        } else {
            "stremtmdb=info,stremtmdb_db=info,tower_http=info".to_string()
        }
    });

    // Logs go to stderr so resolution commands can print JSON on stdout.
    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("stremtmdb {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        command => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_command(command, cli.config.as_deref()))
        }
    }
}

fn validate_config(path: Option<&std::path::Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            print_summary(&config);
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::load_config_or_default(None)?;
            println!("Default config:");
            print_summary(&config);
        }
    }

    Ok(())
}

fn print_summary(config: &Config) {
    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!("  Database: {}", config.database.path.display());
    println!("  TMDB: {}", config.tmdb.base_url);
    println!(
        "  TMDB token: {}",
        if config.tmdb.api_token.trim().is_empty() {
            "missing"
        } else {
            "set"
        }
    );
    println!("  IMDb: {}", config.imdb.endpoint);
    println!(
        "  Max concurrent resolutions: {}",
        config.resolver.max_concurrent_resolutions
    );
}
