//! Export directory grouping
//!
//! Groups the files of one export directory into packs by shared file stem,
//! then splits them into page packs (metadata declaring a full-resolution
//! image datastream) and metadata-only packs, one of which is the root.

use crate::error::{IngestError, IngestResult};
use crate::models::{Pack, Title};
use crate::xml::XmlError;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Suffix of exported binary page images
pub const ASSET_SUFFIX: &str = ".NDK_USER";
/// Suffix of exported metadata documents
pub const METADATA_SUFFIX: &str = ".xml";
/// Non-semantic files written by the exporting system
pub const DEFAULT_IGNORED_NAMES: [&str; 1] = ["proarc_export_status.log"];

/// Datastream whose presence makes a pack a page
const PAGE_DATASTREAM_ID: &str = "IMG_FULL";

/// Groups directory listings into titles
pub struct PackMatcher {
    asset_suffix: String,
    metadata_suffix: String,
    ignored_names: Vec<String>,
}

impl PackMatcher {
    /// Create matcher with the export suffixes and default ignore list
    pub fn new() -> Self {
        Self {
            asset_suffix: ASSET_SUFFIX.to_string(),
            metadata_suffix: METADATA_SUFFIX.to_string(),
            ignored_names: DEFAULT_IGNORED_NAMES.iter().map(|n| n.to_string()).collect(),
        }
    }

    /// Add a file name that is silently skipped
    pub fn ignore(mut self, name: impl Into<String>) -> Self {
        self.ignored_names.push(name.into());
        self
    }

    /// Classify the files of `location` into a [`Title`]
    ///
    /// Returns `Ok(None)` when no file in the directory is classifiable (not an
    /// export directory). `files` is the listing already obtained by the caller.
    pub fn match_directory(&self, location: &Path, files: &[PathBuf]) -> IngestResult<Option<Title>> {
        let mut packs: BTreeMap<String, Pack> = BTreeMap::new();
        let mut unclassified: Vec<String> = Vec::new();

        for file in files {
            let name = match file.file_name() {
                Some(name) => name.to_string_lossy().into_owned(),
                None => continue,
            };

            if self.ignored_names.iter().any(|ignored| *ignored == name) {
                debug!(path = %file.display(), "Ignoring non-semantic file");
                continue;
            }

            if let Some(id) = name.strip_suffix(self.asset_suffix.as_str()) {
                packs
                    .entry(id.to_string())
                    .or_insert_with(|| Pack::new(id))
                    .set_asset_path(file.clone());
            } else if let Some(id) = name.strip_suffix(self.metadata_suffix.as_str()) {
                packs
                    .entry(id.to_string())
                    .or_insert_with(|| Pack::new(id))
                    .set_metadata_path(file.clone());
            } else {
                unclassified.push(name);
            }
        }

        if packs.is_empty() {
            if !unclassified.is_empty() {
                warn!(
                    title = %location.display(),
                    files = unclassified.len(),
                    "No export files in directory, skipping"
                );
            }
            return Ok(None);
        }

        if !unclassified.is_empty() {
            return Err(IngestError::structural(
                location,
                format!("unknown files: {}", unclassified.join(", ")),
            ));
        }

        let mut pages = BTreeMap::new();
        let mut non_pages = BTreeMap::new();

        for (id, pack) in packs {
            let is_page = match pack.metadata_path() {
                Some(path) => declares_full_image(path)?,
                // An asset without its document can only be a page
                None => true,
            };

            if is_page {
                if pack.metadata_path().is_none() {
                    return Err(IngestError::structural(
                        location,
                        format!("page {} is missing its metadata document", id),
                    ));
                }
                if pack.asset_path().is_none() {
                    return Err(IngestError::structural(
                        location,
                        format!("page {} is missing its image asset", id),
                    ));
                }
                pages.insert(id, pack);
            } else {
                if pack.asset_path().is_some() {
                    return Err(IngestError::structural(
                        location,
                        format!("non-page unit {} carries a binary asset", id),
                    ));
                }
                non_pages.insert(id, pack);
            }
        }

        let root_id = select_root(location, &non_pages)?;

        debug!(
            title = %location.display(),
            root = %root_id,
            pages = pages.len(),
            non_pages = non_pages.len(),
            "Directory matched"
        );

        Ok(Some(Title::new(location.to_path_buf(), root_id, pages, non_pages)))
    }
}

impl Default for PackMatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn select_root(location: &Path, non_pages: &BTreeMap<String, Pack>) -> IngestResult<String> {
    let mut ids = non_pages.keys();

    match (ids.next(), ids.next()) {
        (None, _) => Err(IngestError::structural(location, "no root unit found")),
        (Some(only), None) => Ok(only.clone()),
        (Some(_), Some(_)) => {
            // Several title/volume records: the one named like the directory is the root
            let dir_name = location
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            if non_pages.contains_key(&dir_name) {
                Ok(dir_name)
            } else {
                Err(IngestError::structural(
                    location,
                    format!(
                        "ambiguous root, candidates: {}",
                        non_pages.keys().cloned().collect::<Vec<_>>().join(", ")
                    ),
                ))
            }
        }
    }
}

/// Whether the document declares a `datastream` with the page image ID
///
/// Streams the document and stops at the first match.
fn declares_full_image(path: &Path) -> IngestResult<bool> {
    let content = std::fs::read_to_string(path).map_err(|e| IngestError::io(path, e))?;
    let mut reader = Reader::from_str(&content);

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() != b"datastream" {
                    continue;
                }
                let id = e
                    .try_get_attribute("ID")
                    .map_err(|err| IngestError::xml(path, XmlError::Malformed(err.to_string())))?;
                if let Some(id) = id {
                    if id.value.as_ref() == PAGE_DATASTREAM_ID.as_bytes() {
                        return Ok(true);
                    }
                }
            }
            Ok(Event::Eof) => return Ok(false),
            Ok(_) => {}
            Err(e) => return Err(IngestError::xml(path, e.into())),
        }
    }
}
