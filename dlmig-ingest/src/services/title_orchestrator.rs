//! Per-title pipeline
//!
//! Resolving → Rewriting → Materializing → Notifying → Done. All pack
//! documents are rewritten in memory before anything is written, so a rewrite
//! failure on any pack leaves no output for the title, including packs
//! ordered before the failing one. This is stricter than only keeping
//! already written units: none are written. A failure while materializing
//! stops at the failing pack; packs written before it stay on disk.
//!
//! Failures are recorded in the returned [`TitleOutcome`]; only a
//! batch-fatal error is returned as `Err`.

use crate::config::IngestConfig;
use crate::error::{IngestError, IngestResult};
use crate::models::{PackSkip, ResolvedIdentity, Title, TitleOutcome, TitleState};
use crate::services::catalog_client::CatalogResolver;
use crate::services::catalog_update::CatalogUpdateWriter;
use crate::services::document_rewriter::{tiles_base_url, DatastreamKind, DocumentRewriter, ExternalizeOutcome};
use crate::services::import_notifier::ImportNotifier;
use crate::services::layout_materializer::{AssetCopy, LayoutMaterializer};
use crate::services::mods_reader::RootDescriptor;
use crate::xml::Document;
use tracing::{error, info, warn};

/// Rewritten document waiting to be written
struct PendingDocument {
    pack_id: String,
    content: Vec<u8>,
    /// Page packs carry an image to copy
    is_page: bool,
}

/// Drives one title through the pipeline
pub struct TitleOrchestrator {
    resolver: CatalogResolver,
    materializer: LayoutMaterializer,
    notifier: Option<ImportNotifier>,
    catalog_update: Option<CatalogUpdateWriter>,
    imageserver_url: String,
    fallback_partition: String,
}

impl TitleOrchestrator {
    pub fn new(
        resolver: CatalogResolver,
        materializer: LayoutMaterializer,
        imageserver_url: impl Into<String>,
        fallback_partition: impl Into<String>,
    ) -> Self {
        Self {
            resolver,
            materializer,
            notifier: None,
            catalog_update: None,
            imageserver_url: imageserver_url.into(),
            fallback_partition: fallback_partition.into(),
        }
    }

    /// Build from resolved configuration
    pub fn from_config(config: &IngestConfig) -> IngestResult<Self> {
        let resolver = CatalogResolver::new(config.catalog.clone())?;
        let materializer = LayoutMaterializer::new(config.output.kramerius_dir(), config.output.imageserver_dir());

        let mut orchestrator = Self::new(
            resolver,
            materializer,
            config.imageserver_url.clone(),
            config.fallback_partition.clone(),
        );

        if let Some(endpoint) = &config.import_endpoint {
            orchestrator = orchestrator.with_notifier(ImportNotifier::new(endpoint.clone())?);
        }
        if let Some(dir) = &config.aleph_dir {
            orchestrator = orchestrator.with_catalog_update(CatalogUpdateWriter::new(dir.clone()));
        }

        Ok(orchestrator)
    }

    pub fn with_notifier(mut self, notifier: ImportNotifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_catalog_update(mut self, writer: CatalogUpdateWriter) -> Self {
        self.catalog_update = Some(writer);
        self
    }

    /// Process one title
    ///
    /// Returns `Err` only for [`IngestError::is_batch_fatal`] errors.
    pub async fn process(&self, mut title: Title) -> IngestResult<TitleOutcome> {
        let mut outcome = TitleOutcome::new(title.location().to_path_buf(), Some(title.root_id().to_string()));
        let root_id = title.root_id().to_string();

        info!(
            title = %root_id,
            location = %title.location().display(),
            pages = title.page_count(),
            "Processing title"
        );

        // Resolving
        outcome.transition_to(TitleState::Resolving);
        let identity = match self.resolve_identity(&title).await {
            Ok(identity) => identity,
            Err(e) if e.is_batch_fatal() => return Err(e),
            Err(e) => {
                fail(&mut outcome, &root_id, e);
                return Ok(outcome);
            }
        };
        title.set_identity(identity.clone());
        outcome.identity = Some(identity.clone());

        // Rewriting
        outcome.transition_to(TitleState::Rewriting);
        let pending = match self.rewrite_packs(&title, &identity, &mut outcome) {
            Ok(pending) => pending,
            Err((unit, e)) => {
                fail(&mut outcome, &unit, e);
                return Ok(outcome);
            }
        };

        // Materializing
        outcome.transition_to(TitleState::Materializing);
        if let Err((unit, e)) = self.materialize(&title, &pending, &mut outcome) {
            fail(&mut outcome, &unit, e);
            return Ok(outcome);
        }

        // Notifying
        outcome.transition_to(TitleState::Notifying);
        if let Some(notifier) = &self.notifier {
            if let Err(e) = notifier.notify(&root_id).await {
                fail(&mut outcome, "notification", e);
                return Ok(outcome);
            }
        }

        if let Some(writer) = &self.catalog_update {
            if identity.is_fallback() {
                info!(title = %root_id, "Fallback identity, no catalog update record");
            } else if let Err(e) = writer.write(&identity, &root_id) {
                fail(&mut outcome, "catalog-update", e);
                return Ok(outcome);
            }
        }

        outcome.transition_to(TitleState::Done);
        info!(
            title = %root_id,
            written = outcome.written.len(),
            skipped = outcome.skipped.len(),
            copied = outcome.assets_copied,
            "Title done"
        );

        Ok(outcome)
    }

    /// Catalog identity of the title, or its fallback when nothing matches
    async fn resolve_identity(&self, title: &Title) -> IngestResult<ResolvedIdentity> {
        let root_id = title.root_id();
        let root_path = title
            .root_pack()
            .and_then(|pack| pack.metadata_path())
            .ok_or_else(|| IngestError::structural(title.location(), "root unit has no metadata document"))?;

        let content = std::fs::read_to_string(root_path).map_err(|e| IngestError::io(root_path, e))?;
        let root_document = Document::parse(&content).map_err(|e| IngestError::xml(root_path, e))?;

        let resolved = match RootDescriptor::read(&root_document, root_id) {
            Ok(descriptor) => self.resolver.resolve(&descriptor.signature, &descriptor.year).await?,
            Err(IngestError::CatalogNotFound(reason)) => {
                warn!(title = %root_id, reason = %reason, "Catalog lookup keys missing");
                None
            }
            Err(e) => return Err(e),
        };

        if let Some(identity) = resolved {
            return Ok(identity);
        }

        let fallback = ResolvedIdentity::fallback(root_id, &self.fallback_partition).ok_or_else(|| {
            IngestError::structural(
                title.location(),
                format!("root identifier {} cannot address a fallback location", root_id),
            )
        })?;

        warn!(
            title = %root_id,
            path = %fallback.url_path(),
            "No catalog record, using fallback identity"
        );
        Ok(fallback)
    }

    /// Rewrite every pack in memory
    ///
    /// Pages missing a mandatory datastream are skipped; any other error
    /// stops the title and names the failing pack.
    fn rewrite_packs(
        &self,
        title: &Title,
        identity: &ResolvedIdentity,
        outcome: &mut TitleOutcome,
    ) -> Result<Vec<PendingDocument>, (String, IngestError)> {
        let mut pending = Vec::with_capacity(title.page_count() + title.non_page_count());

        'pages: for pack in title.pages() {
            let at = |e: IngestError| (pack.id.clone(), e);
            let path = pack
                .metadata_path()
                .ok_or_else(|| at(IngestError::structural(title.location(), "page without metadata document")))?;

            let tiles_url = tiles_base_url(&self.imageserver_url, identity, &pack.id);
            let mut rewriter = DocumentRewriter::load(&pack.id, path, tiles_url).map_err(at)?;
            rewriter.strip_stale_provenance();

            for kind in DatastreamKind::IMAGES {
                match rewriter.externalize(kind).map_err(at)? {
                    ExternalizeOutcome::Applied | ExternalizeOutcome::SkippedOptionalAbsent => {}
                    ExternalizeOutcome::MissingMandatory(missing) => {
                        warn!(pack_id = %pack.id, datastream = %missing, "Missing datastream, skipping pack");
                        outcome.skipped.push(PackSkip {
                            pack_id: pack.id.clone(),
                            reason: format!("missing datastream {}", missing),
                        });
                        continue 'pages;
                    }
                }
            }

            rewriter.rewrite_cross_references().map_err(at)?;

            pending.push(PendingDocument {
                pack_id: pack.id.clone(),
                content: rewriter.to_bytes().map_err(at)?,
                is_page: true,
            });
        }

        for pack in title.non_pages() {
            let at = |e: IngestError| (pack.id.clone(), e);
            let path = pack
                .metadata_path()
                .ok_or_else(|| at(IngestError::structural(title.location(), "unit without metadata document")))?;

            let mut rewriter = DocumentRewriter::load(&pack.id, path, String::new()).map_err(at)?;
            rewriter.strip_stale_provenance();

            pending.push(PendingDocument {
                pack_id: pack.id.clone(),
                content: rewriter.to_bytes().map_err(at)?,
                is_page: false,
            });
        }

        Ok(pending)
    }

    /// Create the output directories, then write documents and copy images
    fn materialize(
        &self,
        title: &Title,
        pending: &[PendingDocument],
        outcome: &mut TitleOutcome,
    ) -> Result<(), (String, IngestError)> {
        let paths = self
            .materializer
            .prepare_paths(title)
            .map_err(|e| ("layout".to_string(), e))?;

        for document in pending {
            let at = |e: IngestError| (document.pack_id.clone(), e);

            self.materializer
                .save_document(&paths, &document.pack_id, &document.content)
                .map_err(at)?;
            outcome.written.push(document.pack_id.clone());

            if !document.is_page {
                continue;
            }

            let pack = title
                .pages()
                .find(|pack| pack.id == document.pack_id)
                .ok_or_else(|| at(IngestError::structural(title.location(), "rewritten page not in title")))?;

            match self.materializer.copy_asset(&paths, pack).map_err(at)? {
                AssetCopy::Copied => outcome.assets_copied += 1,
                AssetCopy::Existing => outcome.assets_existing += 1,
            }
        }

        Ok(())
    }
}

fn fail(outcome: &mut TitleOutcome, unit: &str, e: IngestError) {
    error!(
        title = %outcome.location.display(),
        unit = %unit,
        code = e.code(),
        error = %e,
        "Title failed"
    );
    outcome.fail(unit, e.code(), e.to_string());
}
