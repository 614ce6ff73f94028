//! Stremtmdb-DB: Database schema, migrations, and query operations
//!
//! This crate provides the persistent half of the identity cache using SQLite
//! with rusqlite and r2d2 connection pooling.
//!
//! # Modules
//!
//! - `migrations` - Database schema migrations
//! - `pool` - Connection pool management
//! - `models` - Rust models matching database schema
//! - `queries` - Database query operations
//!
//! # Example
//!
//! ```no_run
//! use chrono::Utc;
//! use stremtmdb_common::{CanonicalKey, ResolvedGraphId};
//! use stremtmdb_db::pool::{init_pool, get_conn};
//! use stremtmdb_db::queries::identity_map;
//!
//! let pool = init_pool("/var/lib/stremtmdb/stremtmdb.db").unwrap();
//! let mut conn = get_conn(&pool).unwrap();
//!
//! let key = CanonicalKey::movie(603);
//! identity_map::upsert_entries(
//!     &mut conn,
//!     &[(key, ResolvedGraphId::title("tt0133093"))],
//!     Utc::now(),
//! )
//! .unwrap();
//! ```

pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;
