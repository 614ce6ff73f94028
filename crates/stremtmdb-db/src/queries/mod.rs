//! Database query modules.
//!
//! - identity_map: Catalog key to Graph id reconciliation rows

pub mod identity_map;
