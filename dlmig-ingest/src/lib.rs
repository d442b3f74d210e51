//! dlmig-ingest library interface
//!
//! Exposes the migration pipeline for the binary and for integration testing.

pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod xml;

pub use crate::error::{IngestError, IngestResult};
