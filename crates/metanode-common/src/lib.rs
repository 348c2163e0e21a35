//! Metanode Common - Shared types and utilities
//!
//! This crate provides the configuration structures and small filesystem
//! helpers shared by the metadata store and its tooling.

pub mod config;
pub mod types;

pub use config::{Config, StoreConfig};
pub use types::*;
