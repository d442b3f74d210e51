//! Data models for dlmig-ingest
//!
//! - Export packs and the titles grouping them
//! - Resolved catalog identity and the image-server path derived from it
//! - Per-title state machine and batch report

pub mod identity;
pub mod outcome;
pub mod pack;
pub mod title;

pub use identity::{IdentityOrigin, ResolvedIdentity};
pub use outcome::{BatchAbort, BatchReport, PackSkip, TitleOutcome, TitleState};
pub use pack::Pack;
pub use title::Title;
