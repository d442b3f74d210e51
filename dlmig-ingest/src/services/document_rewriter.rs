//! FOXML metadata document rewriting
//!
//! One rewriter owns one pack's document for the duration of its processing.
//! Embedded image payloads are replaced by references to the image server and
//! the relationship block is retargeted to the tiled image.

use crate::error::{IngestError, IngestResult};
use crate::models::ResolvedIdentity;
use crate::xml::{Document, Element, Node};
use std::fmt;
use std::path::Path;
use tracing::{debug, warn};

/// Legacy repository origin attribute
const FEDORA_URI: &str = "FEDORA_URI";
/// Namespace of the tiles URL relation
pub const KRAMERIUS4_NS: &str = "http://www.nsdl.org/ontologies/relationships#";
/// Extension of the tiled image the file pointer names
const TILED_IMAGE_EXT: &str = "jp2";

/// Named content slot of a FOXML document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatastreamKind {
    ImgFull,
    ImgPreview,
    ImgThumb,
    TextOcr,
    Alto,
}

impl DatastreamKind {
    /// Image datastreams moved to the image server, in processing order
    pub const IMAGES: [DatastreamKind; 3] = [
        DatastreamKind::ImgFull,
        DatastreamKind::ImgPreview,
        DatastreamKind::ImgThumb,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            DatastreamKind::ImgFull => "IMG_FULL",
            DatastreamKind::ImgPreview => "IMG_PREVIEW",
            DatastreamKind::ImgThumb => "IMG_THUMB",
            DatastreamKind::TextOcr => "TEXT_OCR",
            DatastreamKind::Alto => "ALTO",
        }
    }

    /// ID of the version element declaring this datastream
    pub fn version_id(&self) -> String {
        format!("{}.0", self.id())
    }

    pub fn is_image(&self) -> bool {
        self.file_name().is_some()
    }

    /// Text layers may be absent from a page
    pub fn is_optional(&self) -> bool {
        matches!(self, DatastreamKind::TextOcr | DatastreamKind::Alto)
    }

    /// File name of the image on the image server
    pub fn file_name(&self) -> Option<&'static str> {
        match self {
            DatastreamKind::ImgFull => Some("big.jpg"),
            DatastreamKind::ImgPreview => Some("preview.jpg"),
            DatastreamKind::ImgThumb => Some("thumb.jpg"),
            DatastreamKind::TextOcr | DatastreamKind::Alto => None,
        }
    }
}

impl fmt::Display for DatastreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Result of [`DocumentRewriter::externalize`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalizeOutcome {
    Applied,
    /// Optional text layer not present; nothing changed
    SkippedOptionalAbsent,
    /// Mandatory datastream not present; the pack cannot be migrated
    MissingMandatory(DatastreamKind),
}

/// Base URL of a pack's tiles: `<host>/<partition>/<a>/<b>/<c>/<packId>`
pub fn tiles_base_url(imageserver_url: &str, identity: &ResolvedIdentity, pack_id: &str) -> String {
    format!(
        "{}/{}/{}",
        imageserver_url.trim_end_matches('/'),
        identity.url_path(),
        pack_id
    )
}

/// Rewriter for one pack's metadata document
pub struct DocumentRewriter {
    pack_id: String,
    document: Document,
    tiles_url: String,
}

impl DocumentRewriter {
    pub fn new(pack_id: impl Into<String>, document: Document, tiles_url: String) -> Self {
        Self {
            pack_id: pack_id.into(),
            document,
            tiles_url,
        }
    }

    /// Load and parse the document at `path`
    pub fn load(pack_id: &str, path: &Path, tiles_url: String) -> IngestResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| IngestError::io(path, e))?;
        let document = Document::parse(&content).map_err(|e| IngestError::xml(path, e))?;
        Ok(Self::new(pack_id, document, tiles_url))
    }

    pub fn pack_id(&self) -> &str {
        &self.pack_id
    }

    pub fn tiles_url(&self) -> &str {
        &self.tiles_url
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Remove the legacy origin attribute from the document root
    pub fn strip_stale_provenance(&mut self) {
        if self.document.root.remove_attr(FEDORA_URI) {
            debug!(pack_id = %self.pack_id, "Removed FEDORA_URI from root");
        }
    }

    /// Replace the inline payload of `kind` by an external reference
    ///
    /// Idempotent: a second call leaves a single, identical `contentLocation`.
    pub fn externalize(&mut self, kind: DatastreamKind) -> IngestResult<ExternalizeOutcome> {
        let version_id = kind.version_id();
        let paths = self
            .document
            .root
            .find_paths(|e| e.local_name() == "datastreamVersion" && e.attr("ID") == Some(version_id.as_str()));

        let version_path = match paths.as_slice() {
            [] if kind.is_optional() => return Ok(ExternalizeOutcome::SkippedOptionalAbsent),
            [] => return Ok(ExternalizeOutcome::MissingMandatory(kind)),
            [single] => single.clone(),
            _ => {
                return Err(IngestError::rewrite(
                    &self.pack_id,
                    "datastreamVersion",
                    format!("{} declared {} times", version_id, paths.len()),
                ))
            }
        };

        let datastream_path = match version_path.split_last() {
            Some((_, parent)) => parent.to_vec(),
            None => {
                return Err(IngestError::rewrite(
                    &self.pack_id,
                    "datastream",
                    "version element is the document root",
                ))
            }
        };

        let reference = kind
            .file_name()
            .map(|file| format!("{}/{}", self.tiles_url, file));

        let datastream = self
            .document
            .element_mut(&datastream_path)
            .ok_or_else(|| IngestError::rewrite(&self.pack_id, "datastream", "owning datastream not found"))?;
        datastream.remove_attr(FEDORA_URI);
        if reference.is_some() {
            datastream.set_attr("CONTROL_GROUP", "E");
        }

        let pack_id = self.pack_id.clone();
        let version = self
            .document
            .element_mut(&version_path)
            .ok_or_else(|| IngestError::rewrite(&pack_id, "datastreamVersion", "version element not found"))?;

        remove_binary_content(version, &pack_id)?;

        if let Some(reference) = reference {
            set_content_location(version, &reference, &pack_id)?;
        }

        debug!(pack_id = %pack_id, datastream = %kind, "Datastream externalized");
        Ok(ExternalizeOutcome::Applied)
    }

    /// Point the relationship block at the tiled image
    ///
    /// `kramerius:file` becomes `<packId>.jp2`; `kramerius4:tiles-url` is set,
    /// or inserted together with its namespace declaration.
    pub fn rewrite_cross_references(&mut self) -> IngestResult<()> {
        let descriptions = self.document.root.find_paths(|e| e.name == "rdf:Description");

        let description_path = match descriptions.as_slice() {
            [single] => single.clone(),
            _ => {
                return Err(IngestError::rewrite(
                    &self.pack_id,
                    "rdf:Description",
                    format!("expected exactly one, found {}", descriptions.len()),
                ))
            }
        };

        let tiles_urls = self.document.root.find_paths(|e| e.name == "kramerius4:tiles-url");
        if tiles_urls.len() > 1 {
            return Err(IngestError::rewrite(
                &self.pack_id,
                "kramerius4:tiles-url",
                format!("expected at most one, found {}", tiles_urls.len()),
            ));
        }

        let file_name = format!("{}.{}", self.pack_id, TILED_IMAGE_EXT);
        let tiles_url = self.tiles_url.clone();
        let pack_id = self.pack_id.clone();

        let description = self
            .document
            .element_mut(&description_path)
            .ok_or_else(|| IngestError::rewrite(&pack_id, "rdf:Description", "element not found"))?;

        for node in description.children.iter_mut() {
            if let Node::Element(child) = node {
                if child.name == "kramerius:file" {
                    child.set_text(file_name.clone());
                }
            }
        }

        if let Some(existing) = tiles_urls.first() {
            let element = self
                .document
                .element_mut(existing)
                .ok_or_else(|| IngestError::rewrite(&pack_id, "kramerius4:tiles-url", "element not found"))?;
            element.set_text(tiles_url);
            return Ok(());
        }

        let mut inserted = Element::new("kramerius4:tiles-url");
        inserted.set_text(tiles_url);
        description.children.push(Node::Element(inserted));

        // Declare the prefix on the enclosing element
        match description_path.split_last() {
            Some((_, parent_path)) => {
                if let Some(parent) = self.document.element_mut(parent_path) {
                    parent.set_attr("xmlns:kramerius4", KRAMERIUS4_NS);
                }
            }
            None => self.document.root.set_attr("xmlns:kramerius4", KRAMERIUS4_NS),
        }

        Ok(())
    }

    /// Serialize the rewritten document
    pub fn to_bytes(&self) -> IngestResult<Vec<u8>> {
        self.document
            .to_bytes()
            .map_err(|e| IngestError::xml(format!("{}.xml", self.pack_id), e))
    }

    pub fn into_document(self) -> Document {
        self.document
    }
}

fn remove_binary_content(version: &mut Element, pack_id: &str) -> IngestResult<()> {
    let payloads = version.child_indices("binaryContent");

    match payloads.as_slice() {
        [] => {
            debug!(pack_id = %pack_id, element = %version.name, "No inline payload to remove");
        }
        [index] => {
            version.children.remove(*index);
            version.remove_attr("SIZE");
        }
        _ => {
            warn!(pack_id = %pack_id, count = payloads.len(), "Multiple inline payloads");
            return Err(IngestError::rewrite(
                pack_id,
                "binaryContent",
                format!("multiple binaryContent in {}", version.name),
            ));
        }
    }

    Ok(())
}

fn set_content_location(version: &mut Element, reference: &str, pack_id: &str) -> IngestResult<()> {
    let locations = version.child_indices("contentLocation");

    let location = match locations.as_slice() {
        [] => {
            let name = version.prefixed("contentLocation");
            version.children.push(Node::Element(Element::new(name)));
            let index = version.children.len() - 1;
            version.child_element_mut(index)
        }
        [index] => version.child_element_mut(*index),
        _ => {
            return Err(IngestError::rewrite(
                pack_id,
                "contentLocation",
                format!("multiple contentLocation in {}", version.name),
            ))
        }
    };

    let location = location
        .ok_or_else(|| IngestError::rewrite(pack_id, "contentLocation", "element not addressable"))?;
    location.set_attr("TYPE", "URL");
    location.set_attr("REF", reference);

    Ok(())
}
