//! Batch driver
//!
//! Walks the input root one directory level at a time in file-name order. A
//! directory holding only files is one title; a directory holding only
//! subdirectories is descended into; a directory holding both is malformed.

use crate::error::{IngestError, IngestResult};
use crate::models::{BatchReport, TitleOutcome};
use crate::services::pack_matcher::PackMatcher;
use crate::services::title_orchestrator::TitleOrchestrator;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info, warn};
use walkdir::WalkDir;

/// A batch stopped by a batch-fatal error
///
/// Carries the report of everything processed before the stop, closed with
/// its [`BatchReport::aborted`] record.
#[derive(Debug, Error)]
#[error("Batch aborted: {source}")]
pub struct BatchAborted {
    pub report: BatchReport,
    #[source]
    pub source: IngestError,
}

/// Immediate children of one directory
#[derive(Debug, Default)]
struct Listing {
    files: Vec<PathBuf>,
    dirs: Vec<PathBuf>,
}

/// Runs every title found under an input root
pub struct BatchDriver {
    matcher: PackMatcher,
    orchestrator: TitleOrchestrator,
}

impl BatchDriver {
    pub fn new(matcher: PackMatcher, orchestrator: TitleOrchestrator) -> Self {
        Self { matcher, orchestrator }
    }

    /// Process all titles below `input_root`
    ///
    /// Title failures are recorded in the report. A batch-fatal error stops
    /// the walk and is returned with the partial report; titles completed
    /// before it keep their output and their entries.
    pub async fn run(&self, input_root: &Path) -> Result<BatchReport, BatchAborted> {
        let mut report = BatchReport::new(input_root.to_path_buf());

        info!(
            session_id = %report.session_id,
            input = %input_root.display(),
            "Starting batch"
        );

        // Depth-first, children pushed in reverse so they pop in name order
        let mut pending = vec![input_root.to_path_buf()];

        while let Some(dir) = pending.pop() {
            let listing = match list_directory(&dir) {
                Ok(listing) => listing,
                Err(e) => {
                    report.push(failed_outcome(&dir, e));
                    continue;
                }
            };

            if !listing.files.is_empty() && !listing.dirs.is_empty() {
                report.push(failed_outcome(
                    &dir,
                    IngestError::structural(&dir, "directory holds both files and subdirectories"),
                ));
                continue;
            }

            if !listing.dirs.is_empty() {
                pending.extend(listing.dirs.into_iter().rev());
                continue;
            }

            if listing.files.is_empty() {
                continue;
            }

            let title = match self.matcher.match_directory(&dir, &listing.files) {
                Ok(Some(title)) => title,
                Ok(None) => continue,
                Err(e) => {
                    report.push(failed_outcome(&dir, e));
                    continue;
                }
            };

            match self.orchestrator.process(title).await {
                Ok(outcome) => report.push(outcome),
                Err(e) => {
                    error!(
                        session_id = %report.session_id,
                        title = %dir.display(),
                        code = e.code(),
                        error = %e,
                        completed = report.completed_count(),
                        "Batch aborted"
                    );
                    report.abort(dir, e.code(), e.to_string());
                    return Err(BatchAborted { report, source: e });
                }
            }
        }

        report.finish();

        info!(
            session_id = %report.session_id,
            titles = report.titles.len(),
            completed = report.completed_count(),
            failed = report.failed_count(),
            fallback = report.fallback_count(),
            "Batch finished"
        );

        Ok(report)
    }
}

fn list_directory(dir: &Path) -> IngestResult<Listing> {
    let mut listing = Listing::default();

    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.to_path_buf());
            match e.into_io_error() {
                Some(io) => IngestError::io(path, io),
                None => IngestError::structural(path, "filesystem loop"),
            }
        })?;

        if entry.file_type().is_dir() {
            listing.dirs.push(entry.into_path());
        } else {
            listing.files.push(entry.into_path());
        }
    }

    Ok(listing)
}

fn failed_outcome(dir: &Path, e: IngestError) -> TitleOutcome {
    warn!(title = %dir.display(), code = e.code(), error = %e, "Skipping directory");

    let mut outcome = TitleOutcome::new(dir.to_path_buf(), None);
    let unit = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| dir.display().to_string());
    outcome.fail(unit, e.code(), e.to_string());
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_listing_is_sorted_and_split() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.xml"), "").unwrap();
        std::fs::write(dir.path().join("a.xml"), "").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let listing = list_directory(dir.path()).unwrap();
        assert_eq!(listing.files, vec![dir.path().join("a.xml"), dir.path().join("b.xml")]);
        assert_eq!(listing.dirs, vec![dir.path().join("sub")]);
    }

    #[test]
    fn test_failed_outcome_names_directory() {
        let outcome = failed_outcome(Path::new("/in/t1"), IngestError::structural("/in/t1", "bad"));
        assert!(outcome.is_failed());
        assert_eq!(outcome.error_code.as_deref(), Some("STRUCTURAL_ERROR"));
    }
}
