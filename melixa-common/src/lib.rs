//! # Melixa Common Library
//!
//! Shared code for the Melixa mood-analysis crates:
//! - Error type and result alias
//! - Bootstrap configuration loading (TOML, environment, compiled defaults)
//! - Tracing subscriber initialization

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
