//! Pipeline services
//!
//! Leaf-first: directory grouping, catalog resolution, document rewriting and
//! target layout, then the per-title orchestrator and the batch driver on top.

pub mod batch_driver;
pub mod catalog_client;
pub mod catalog_update;
pub mod document_rewriter;
pub mod import_notifier;
pub mod layout_materializer;
pub mod mods_reader;
pub mod pack_matcher;
pub mod title_orchestrator;

pub use batch_driver::{BatchAborted, BatchDriver};
pub use catalog_client::CatalogResolver;
pub use catalog_update::CatalogUpdateWriter;
pub use document_rewriter::{DatastreamKind, DocumentRewriter, ExternalizeOutcome};
pub use import_notifier::ImportNotifier;
pub use layout_materializer::{AssetCopy, LayoutMaterializer, TitlePaths};
pub use mods_reader::RootDescriptor;
pub use pack_matcher::PackMatcher;
pub use title_orchestrator::TitleOrchestrator;
