//! Common types and utilities shared across all coordination crates

pub mod config;
pub mod error;
pub mod keys;
pub mod types;

pub use config::*;
pub use error::{CoordError, Result};
pub use types::*;
