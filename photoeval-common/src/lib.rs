//! # Photo Evaluator Common Library
//!
//! Shared code for the photo evaluation services:
//! - Error type used across crates
//! - Bootstrap configuration loading (TOML, environment, command line)
//! - Data folder resolution

pub mod config;
pub mod error;

pub use error::{Error, Result};
