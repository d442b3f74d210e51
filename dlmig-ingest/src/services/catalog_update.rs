//! Catalog update side records
//!
//! One `<rootPackId>.csv` per catalog-matched title, picked up by the catalog
//! team to link the record to its digital copy.

use crate::error::{IngestError, IngestResult};
use crate::models::ResolvedIdentity;
use dlmig_common::fs_utils;
use std::path::{Path, PathBuf};
use tracing::info;

/// Viewer URL prefix of the public digital library
pub const VIEWER_URL_PREFIX: &str = "http://www.digitalniknihovna.cz/mzk/view/uuid:";
/// Side record mode: read/write for owner and group, read for others
pub const SIDE_RECORD_MODE: u32 = 0o664;

/// Writer of catalog update side records
pub struct CatalogUpdateWriter {
    directory: PathBuf,
}

impl CatalogUpdateWriter {
    pub fn new(directory: PathBuf) -> Self {
        Self { directory }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Record line, quotes included
    pub fn record_line(identity: &ResolvedIdentity, root_pack_id: &str) -> String {
        format!(
            "\"{} @ {} @ {}{}\"",
            identity.partition(),
            identity.serial_number(),
            VIEWER_URL_PREFIX,
            root_pack_id
        )
    }

    /// Write `<directory>/<root_pack_id>.csv`
    pub fn write(&self, identity: &ResolvedIdentity, root_pack_id: &str) -> IngestResult<PathBuf> {
        let target = self.directory.join(format!("{}.csv", root_pack_id));
        let line = Self::record_line(identity, root_pack_id);

        fs_utils::write_atomic(&target, line.as_bytes()).map_err(|e| match e {
            dlmig_common::Error::Io(source) => IngestError::io(&target, source),
            other => other.into(),
        })?;
        fs_utils::set_exact_mode(&target, SIDE_RECORD_MODE)?;

        info!(title = %root_pack_id, path = %target.display(), "Catalog update record written");
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_record_line() {
        let identity = ResolvedIdentity::from_catalog("000329646", "MZK01").unwrap();
        assert_eq!(
            CatalogUpdateWriter::record_line(&identity, "root-1"),
            "\"MZK01 @ 000329646 @ http://www.digitalniknihovna.cz/mzk/view/uuid:root-1\""
        );
    }

    #[test]
    fn test_write_creates_csv() {
        let dir = TempDir::new().unwrap();
        let writer = CatalogUpdateWriter::new(dir.path().to_path_buf());
        let identity = ResolvedIdentity::from_catalog("000329646", "MZK01").unwrap();

        let path = writer.write(&identity, "root-1").unwrap();
        assert_eq!(path, dir.path().join("root-1.csv"));
        assert!(std::fs::read_to_string(&path).unwrap().starts_with("\"MZK01 @ 000329646"));
    }
}
