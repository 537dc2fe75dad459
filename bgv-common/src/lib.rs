//! # BGV Common Library
//!
//! Shared code for the BGV reporting services including:
//! - Error taxonomy and `Result` alias
//! - Configuration loading (env var / TOML file / default)
//! - Database bootstrap (pool creation, fixed-table creation)
//! - Schema introspection for dynamically configured per-service tables
//! - Row models read by the aggregation pipeline

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
