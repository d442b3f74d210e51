//! # dlmig Common Library
//!
//! Shared code for the dlmig tools including:
//! - Error types
//! - TOML configuration loading
//! - Filesystem helpers (atomic writes, permission bits)

pub mod config;
pub mod error;
pub mod fs_utils;

pub use error::{Error, Result};
