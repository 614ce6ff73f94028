//! Stremtmdb - TMDB to IMDb identity resolution
//!
//! This library crate exposes the resolution engine, its provider clients and
//! the HTTP surface for integration testing.

pub mod cache;
pub mod config;
pub mod matching;
pub mod providers;
pub mod resolver;
pub mod server;
