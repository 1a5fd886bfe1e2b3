//! # Kiln Common Library
//!
//! Shared code for the kiln workspace:
//! - Error and result types
//! - TOML configuration loading
//! - Root folder resolution
//! - Logging configuration

pub mod config;
pub mod error;

pub use error::{Error, Result};
