//! Pack matcher tests on export directories

mod helpers;

use dlmig_ingest::services::PackMatcher;
use dlmig_ingest::IngestError;
use helpers::*;
use std::fs;
use tempfile::TempDir;

fn structural_reason(result: Result<Option<dlmig_ingest::models::Title>, IngestError>) -> String {
    match result {
        Err(IngestError::Structural { reason, .. }) => reason,
        other => panic!("expected structural error, got {:?}", other.map(|t| t.map(|t| t.root_id().to_string()))),
    }
}

#[test]
fn test_pages_and_root_are_classified() {
    let temp = TempDir::new().unwrap();
    let dir = write_simple_title(temp.path(), ROOT_A, Some("A 1"), 3);

    let title = PackMatcher::new()
        .match_directory(&dir, &list_files(&dir))
        .unwrap()
        .unwrap();

    assert_eq!(title.root_id(), ROOT_A);
    assert_eq!(title.page_count(), 3);
    assert_eq!(title.non_page_count(), 1);
    assert!(title.pages().all(|p| p.is_complete()));
    assert!(title.root_pack().unwrap().asset_path().is_none());

    // Stable order
    let ids: Vec<&str> = title.pages().map(|p| p.id.as_str()).collect();
    let mut sorted = ids.clone();
    sorted.sort();
    assert_eq!(ids, sorted);
}

#[test]
fn test_all_pages_means_no_root() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("t");
    fs::create_dir(&dir).unwrap();
    for id in ["p1", "p2"] {
        fs::write(dir.join(format!("{}.xml", id)), page_foxml(id)).unwrap();
        fs::write(dir.join(format!("{}.NDK_USER", id)), ASSET_BYTES).unwrap();
    }

    let reason = structural_reason(PackMatcher::new().match_directory(&dir, &list_files(&dir)));
    assert!(reason.contains("no root"));
}

#[test]
fn test_page_missing_asset_names_the_side() {
    let temp = TempDir::new().unwrap();
    let dir = write_simple_title(temp.path(), ROOT_A, Some("A 1"), 2);
    let asset = list_files(&dir)
        .into_iter()
        .find(|p| p.extension().map(|e| e == "NDK_USER").unwrap_or(false))
        .unwrap();
    fs::remove_file(asset).unwrap();

    let reason = structural_reason(PackMatcher::new().match_directory(&dir, &list_files(&dir)));
    assert!(reason.contains("image asset"));
}

#[test]
fn test_orphan_asset_is_page_missing_document() {
    let temp = TempDir::new().unwrap();
    let dir = write_simple_title(temp.path(), ROOT_A, Some("A 1"), 1);
    fs::write(dir.join("orphan.NDK_USER"), ASSET_BYTES).unwrap();

    let reason = structural_reason(PackMatcher::new().match_directory(&dir, &list_files(&dir)));
    assert!(reason.contains("metadata document"));
}

#[test]
fn test_root_with_asset_is_structural() {
    let temp = TempDir::new().unwrap();
    let dir = write_simple_title(temp.path(), ROOT_A, Some("A 1"), 1);
    fs::write(dir.join(format!("{}.NDK_USER", ROOT_A)), ASSET_BYTES).unwrap();

    let reason = structural_reason(PackMatcher::new().match_directory(&dir, &list_files(&dir)));
    assert!(reason.contains("binary asset"));
}

#[test]
fn test_unknown_file_among_exports_is_structural() {
    let temp = TempDir::new().unwrap();
    let dir = write_simple_title(temp.path(), ROOT_A, Some("A 1"), 1);
    fs::write(dir.join("notes.txt"), "hello").unwrap();

    let reason = structural_reason(PackMatcher::new().match_directory(&dir, &list_files(&dir)));
    assert!(reason.contains("notes.txt"));
}

#[test]
fn test_directory_without_exports_is_skipped() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("readme.txt"), "x").unwrap();
    fs::write(temp.path().join("Thumbs.db"), "x").unwrap();

    let matched = PackMatcher::new()
        .match_directory(temp.path(), &list_files(temp.path()))
        .unwrap();
    assert!(matched.is_none());
}

#[test]
fn test_extra_ignored_name() {
    let temp = TempDir::new().unwrap();
    let dir = write_simple_title(temp.path(), ROOT_A, Some("A 1"), 1);
    fs::write(dir.join("checksums.md5"), "x").unwrap();

    let title = PackMatcher::new()
        .ignore("checksums.md5")
        .match_directory(&dir, &list_files(&dir))
        .unwrap();
    assert!(title.is_some());
}
