//! Stremtmdb-Common: Shared identity types and errors.
//!
//! This crate provides the value types every other stremtmdb crate speaks:
//!
//! - **Keys**: [`CanonicalKey`] addresses one movie or episode in the Catalog
//!   provider's numbering, tagged with its [`MediaKind`].
//! - **Resolved ids**: [`ResolvedGraphId`] is the matching identity in the
//!   Graph provider's numbering, with an explicit storage form.
//! - **Error Handling**: Common error types and result aliases
//!
//! # Examples
//!
//! ```
//! use stremtmdb_common::{CanonicalKey, ResolvedGraphId};
//!
//! let key = CanonicalKey::episode(1399, 1, 1);
//! assert_eq!(key.to_string(), "e:1399:1:1");
//!
//! let id: ResolvedGraphId = "tt0944947:1:1".parse().unwrap();
//! assert_eq!(id.season, Some(1));
//! ```

pub mod error;
pub mod ids;

pub use error::{Error, Result};
pub use ids::*;
