use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stremtmdb")]
#[command(author, version, about = "TMDB to IMDb identity resolution service")]
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
    /// Start the HTTP server
    Start {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Resolve a TMDB movie and print its IMDb mapping
    Movie {
        /// TMDB movie id
        id: u64,
    },

    /// Resolve every episode of one TMDB season
    Season {
        /// TMDB series id
        series: u64,

        /// Season number
        season: u32,
    },

    /// Resolve every season of a TMDB series
    Series {
        /// TMDB series id
        id: u64,
    },

    /// Remove every cached mapping for a TMDB title
    Purge {
        /// Kind of title
        #[arg(value_enum)]
        kind: PurgeKind,

        /// TMDB id
        id: u64,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PurgeKind {
    Movie,
    Series,
}
