//! Export pack: one metadata document and/or one binary asset sharing an identifier

use serde::Serialize;
use std::path::{Path, PathBuf};

/// One content unit of an export directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pack {
    /// Shared identifier (file stem), usually a content UUID
    pub id: String,
    metadata_path: Option<PathBuf>,
    asset_path: Option<PathBuf>,
}

impl Pack {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            metadata_path: None,
            asset_path: None,
        }
    }

    pub fn metadata_path(&self) -> Option<&Path> {
        self.metadata_path.as_deref()
    }

    pub fn asset_path(&self) -> Option<&Path> {
        self.asset_path.as_deref()
    }

    /// Record the metadata document; the first recorded path is kept
    pub fn set_metadata_path(&mut self, path: PathBuf) {
        if self.metadata_path.is_none() {
            self.metadata_path = Some(path);
        }
    }

    /// Record the binary asset; the first recorded path is kept
    pub fn set_asset_path(&mut self, path: PathBuf) {
        if self.asset_path.is_none() {
            self.asset_path = Some(path);
        }
    }

    /// Both the metadata document and the binary asset are present
    pub fn is_complete(&self) -> bool {
        self.metadata_path.is_some() && self.asset_path.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completeness_requires_both_sides() {
        let mut pack = Pack::new("0000-fb87");
        assert!(!pack.is_complete());

        pack.set_metadata_path(PathBuf::from("/in/0000-fb87.xml"));
        assert!(!pack.is_complete());

        pack.set_asset_path(PathBuf::from("/in/0000-fb87.NDK_USER"));
        assert!(pack.is_complete());
    }

    #[test]
    fn test_paths_are_immutable_once_set() {
        let mut pack = Pack::new("a");
        pack.set_metadata_path(PathBuf::from("/first.xml"));
        pack.set_metadata_path(PathBuf::from("/second.xml"));
        assert_eq!(pack.metadata_path(), Some(Path::new("/first.xml")));
    }
}
