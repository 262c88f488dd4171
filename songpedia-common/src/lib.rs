//! # Songpedia Common Library
//!
//! Shared code for the songpedia tools including:
//! - Error and result types
//! - Configuration loading and data directory resolution
//! - Durable (write-temp-then-rename) file replacement

pub mod config;
pub mod error;
pub mod fs;

pub use error::{Error, Result};
