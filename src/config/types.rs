use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub tmdb: TmdbConfig,

    #[serde(default)]
    pub imdb: ImdbConfig,

    #[serde(default)]
    pub resolver: ResolverConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// SQLite file holding the identity map. Relative paths resolve against
    /// the directory of the config file.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("stremtmdb.db")
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TmdbConfig {
    /// TMDB read access token (v4 bearer token). Falls back to `TMDB_API`.
    #[serde(default)]
    pub api_token: String,

    #[serde(default = "default_tmdb_base_url")]
    pub base_url: String,

    #[serde(default = "default_tmdb_rate")]
    pub requests_per_second: u32,
}

fn default_tmdb_base_url() -> String {
    "https://api.themoviedb.org/3".to_string()
}
fn default_tmdb_rate() -> u32 {
    40
}

impl Default for TmdbConfig {
    fn default() -> Self {
        Self {
            api_token: String::new(),
            base_url: default_tmdb_base_url(),
            requests_per_second: default_tmdb_rate(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImdbConfig {
    #[serde(default = "default_imdb_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_imdb_rate")]
    pub requests_per_second: u32,

    /// Episodes requested per GraphQL page (the API caps this at 500).
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_imdb_endpoint() -> String {
    "https://api.graphql.imdb.com/".to_string()
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/134.0.0.0 Safari/537.3".to_string()
}
fn default_imdb_rate() -> u32 {
    20
}
fn default_page_size() -> u32 {
    500
}

impl Default for ImdbConfig {
    fn default() -> Self {
        Self {
            endpoint: default_imdb_endpoint(),
            user_agent: default_user_agent(),
            requests_per_second: default_imdb_rate(),
            page_size: default_page_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResolverConfig {
    /// Ceiling on episode resolutions in flight at once, process-wide.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_resolutions: usize,
}

fn default_max_concurrent() -> usize {
    100
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_concurrent_resolutions: default_max_concurrent(),
        }
    }
}
