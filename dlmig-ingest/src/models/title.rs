//! Title: the aggregate for one exported record

use super::{Pack, ResolvedIdentity};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// One logical record discovered in an export directory
///
/// Packs are kept in ordered maps so processing order is stable between runs.
#[derive(Debug, Clone)]
pub struct Title {
    location: PathBuf,
    root_id: String,
    pages: BTreeMap<String, Pack>,
    non_pages: BTreeMap<String, Pack>,
    identity: Option<ResolvedIdentity>,
}

impl Title {
    /// Create a title from already classified packs
    ///
    /// `root_id` must name one of the non-page packs.
    pub fn new(
        location: PathBuf,
        root_id: String,
        pages: BTreeMap<String, Pack>,
        non_pages: BTreeMap<String, Pack>,
    ) -> Self {
        Self {
            location,
            root_id,
            pages,
            non_pages,
            identity: None,
        }
    }

    /// Directory the title was discovered in
    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Identifier of the root (title/volume-level) pack
    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    pub fn root_pack(&self) -> Option<&Pack> {
        self.non_pages.get(&self.root_id)
    }

    /// Page packs, each carrying a metadata document and an image asset
    pub fn pages(&self) -> impl Iterator<Item = &Pack> {
        self.pages.values()
    }

    /// Metadata-only packs, including the root
    pub fn non_pages(&self) -> impl Iterator<Item = &Pack> {
        self.non_pages.values()
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn non_page_count(&self) -> usize {
        self.non_pages.len()
    }

    pub fn identity(&self) -> Option<&ResolvedIdentity> {
        self.identity.as_ref()
    }

    pub fn set_identity(&mut self, identity: ResolvedIdentity) {
        self.identity = Some(identity);
    }
}
