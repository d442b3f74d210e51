//! Error types for dlmig-ingest
//!
//! Every variant except [`IngestError::CatalogUnreachable`] is contained at
//! the title boundary: the title is skipped and the batch continues.

use crate::xml::XmlError;
use std::path::PathBuf;
use thiserror::Error;

/// Ingest error type
#[derive(Debug, Error)]
pub enum IngestError {
    /// Malformed input grouping (unknown files, missing pack sides, no root)
    #[error("Structural error in {path}: {reason}")]
    Structural { path: PathBuf, reason: String },

    /// Transport failure while talking to the catalog; aborts the whole batch
    #[error("Catalog unreachable while querying {partition}: {message}")]
    CatalogUnreachable { partition: String, message: String },

    /// No catalog record could be matched; recoverable via fallback identity
    #[error("No catalog record found: {0}")]
    CatalogNotFound(String),

    /// Missing or duplicated document element expected by the rewriter
    #[error("Rewrite error in pack {pack_id} ({field}): {reason}")]
    Rewrite {
        pack_id: String,
        field: String,
        reason: String,
    },

    /// Required permission bits could not be enforced
    #[error("Permission error: could not set mode {mode:#o} on {path}")]
    Permission { path: PathBuf, mode: u32 },

    /// Import system rejected or failed the import trigger
    #[error("Import notification failed{}: {body}", http_status_suffix(.status))]
    Notification { status: Option<u16>, body: String },

    /// Document could not be parsed or serialized
    #[error("XML error in {path}: {source}")]
    Xml {
        path: PathBuf,
        #[source]
        source: XmlError,
    },

    /// Filesystem operation failed
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// dlmig-common error
    #[error(transparent)]
    Common(dlmig_common::Error),
}

impl IngestError {
    pub fn structural(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        IngestError::Structural {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn rewrite(pack_id: &str, field: &str, reason: impl Into<String>) -> Self {
        IngestError::Rewrite {
            pack_id: pack_id.to_string(),
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        IngestError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn xml(path: impl Into<PathBuf>, source: XmlError) -> Self {
        IngestError::Xml {
            path: path.into(),
            source,
        }
    }

    /// Stable error code for reports
    pub fn code(&self) -> &'static str {
        match self {
            IngestError::Structural { .. } => "STRUCTURAL_ERROR",
            IngestError::CatalogUnreachable { .. } => "CATALOG_UNREACHABLE",
            IngestError::CatalogNotFound(_) => "CATALOG_NOT_FOUND",
            IngestError::Rewrite { .. } => "REWRITE_ERROR",
            IngestError::Permission { .. } => "PERMISSION_ERROR",
            IngestError::Notification { .. } => "NOTIFICATION_ERROR",
            IngestError::Xml { .. } => "XML_ERROR",
            IngestError::Io { .. } => "IO_ERROR",
            IngestError::Config(_) => "CONFIG_ERROR",
            IngestError::Common(_) => "COMMON_ERROR",
        }
    }

    /// Only a catalog transport failure stops the whole batch
    pub fn is_batch_fatal(&self) -> bool {
        matches!(self, IngestError::CatalogUnreachable { .. })
    }
}

impl From<dlmig_common::Error> for IngestError {
    fn from(e: dlmig_common::Error) -> Self {
        match e {
            dlmig_common::Error::Permission { path, mode } => IngestError::Permission { path, mode },
            dlmig_common::Error::Config(msg) => IngestError::Config(msg),
            other => IngestError::Common(other),
        }
    }
}

fn http_status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (HTTP {})", code),
        None => String::new(),
    }
}

/// Result type for ingest operations
pub type IngestResult<T> = Result<T, IngestError>;
