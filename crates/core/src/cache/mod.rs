//! SQLite-backed versioned response cache.
//!
//! This module provides a persistent cache of captured HTTP responses using
//! SQLite with async access via tokio-rusqlite. It supports:
//!
//! - Named generations; deleting a generation drops all of its entries
//! - Request-addressed entries keyed by SHA-256 of method and URL
//! - Automatic schema migrations
//! - WAL mode for concurrent access

pub mod connection;
pub mod entries;
pub mod generations;
pub mod hash;
pub mod migrations;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::{CacheEntry, EntryMeta};
