//! Core types and shared functionality for toolshell.
//!
//! This crate provides:
//! - Versioned response cache with SQLite backend
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{CacheDb, CacheEntry, EntryMeta};
pub use config::{AppConfig, OverlapPolicy};
pub use error::Error;
