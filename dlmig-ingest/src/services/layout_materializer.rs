//! Target layout on the digital library and image server filesystems
//!
//! - Metadata documents: `<kramerius_root>/<rootPackId>/<packId>.xml`
//! - Page images: `<imageserver_root>/<partition>/<a>/<b>/<c>/<packId>.jp2`
//!
//! Every directory below the configured roots carries the shared permission
//! bits, and so does a root created here. Existing images are never
//! overwritten.

use crate::error::{IngestError, IngestResult};
use crate::models::{Pack, ResolvedIdentity, Title};
use dlmig_common::fs_utils::{self, SHARED_DIR_BITS, SHARED_FILE_BITS};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Mode of copied images: r-x for owner and group, read-only for others
pub const ASSET_MODE: u32 = 0o554;
/// Extension of images on the image server
const ASSET_EXT: &str = "jp2";

/// Output directories of one title
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitlePaths {
    pub metadata_dir: PathBuf,
    pub asset_dir: PathBuf,
}

/// Result of copying one image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetCopy {
    Copied,
    /// Target already present; left untouched
    Existing,
}

/// Creates target directories and writes title output
pub struct LayoutMaterializer {
    kramerius_root: PathBuf,
    imageserver_root: PathBuf,
}

impl LayoutMaterializer {
    pub fn new(kramerius_root: PathBuf, imageserver_root: PathBuf) -> Self {
        Self {
            kramerius_root,
            imageserver_root,
        }
    }

    pub fn kramerius_root(&self) -> &Path {
        &self.kramerius_root
    }

    pub fn imageserver_root(&self) -> &Path {
        &self.imageserver_root
    }

    /// Image directory of an identity, without touching the filesystem
    pub fn asset_dir_for(&self, identity: &ResolvedIdentity) -> PathBuf {
        self.imageserver_root.join(identity.relative_path())
    }

    /// Create both output directories of `title` with the shared permission bits
    ///
    /// The title's identity must be resolved.
    pub fn prepare_paths(&self, title: &Title) -> IngestResult<TitlePaths> {
        let identity = title.identity().ok_or_else(|| {
            IngestError::structural(title.location(), "identity not resolved before layout")
        })?;

        let metadata_dir = self.kramerius_root.join(title.root_id());
        let asset_dir = self.asset_dir_for(identity);

        fs_utils::create_shared_dir(&self.kramerius_root, &metadata_dir, SHARED_DIR_BITS)?;
        fs_utils::create_shared_dir(&self.imageserver_root, &asset_dir, SHARED_DIR_BITS)?;

        debug!(
            title = %title.root_id(),
            metadata_dir = %metadata_dir.display(),
            asset_dir = %asset_dir.display(),
            "Output directories prepared"
        );

        Ok(TitlePaths {
            metadata_dir,
            asset_dir,
        })
    }

    /// Atomically write `<metadata_dir>/<packId>.xml`
    pub fn save_document(&self, paths: &TitlePaths, pack_id: &str, content: &[u8]) -> IngestResult<PathBuf> {
        let target = paths.metadata_dir.join(format!("{}.xml", pack_id));

        fs_utils::write_atomic(&target, content).map_err(|e| match e {
            dlmig_common::Error::Io(source) => IngestError::io(&target, source),
            other => other.into(),
        })?;
        fs_utils::ensure_mode_bits(&target, SHARED_FILE_BITS)?;

        debug!(pack_id = %pack_id, path = %target.display(), "Metadata document saved");
        Ok(target)
    }

    /// Copy the pack's image to `<asset_dir>/<packId>.jp2` unless already present
    pub fn copy_asset(&self, paths: &TitlePaths, pack: &Pack) -> IngestResult<AssetCopy> {
        let source = pack.asset_path().ok_or_else(|| {
            IngestError::structural(&paths.asset_dir, format!("pack {} has no image asset", pack.id))
        })?;
        let target = paths.asset_dir.join(format!("{}.{}", pack.id, ASSET_EXT));

        let copied = fs_utils::copy_if_absent(source, &target).map_err(|e| match e {
            dlmig_common::Error::Io(io) => IngestError::io(source, io),
            other => other.into(),
        })?;

        if !copied {
            info!(pack_id = %pack.id, path = %target.display(), "Image already present, not overwritten");
            return Ok(AssetCopy::Existing);
        }

        fs_utils::set_exact_mode(&target, ASSET_MODE)?;
        debug!(pack_id = %pack.id, path = %target.display(), "Image copied");
        Ok(AssetCopy::Copied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn title_with(identity: ResolvedIdentity) -> Title {
        let mut title = Title::new(
            PathBuf::from("/in/root-1"),
            "root-1".to_string(),
            BTreeMap::new(),
            BTreeMap::new(),
        );
        title.set_identity(identity);
        title
    }

    #[test]
    fn test_prepare_paths_for_catalog_identity() {
        let out = TempDir::new().unwrap();
        let materializer = LayoutMaterializer::new(out.path().join("k4"), out.path().join("img"));
        std::fs::create_dir_all(materializer.kramerius_root()).unwrap();
        std::fs::create_dir_all(materializer.imageserver_root()).unwrap();

        let title = title_with(ResolvedIdentity::from_catalog("000329646", "MZK01").unwrap());
        let paths = materializer.prepare_paths(&title).unwrap();

        assert_eq!(paths.metadata_dir, out.path().join("k4").join("root-1"));
        assert_eq!(paths.asset_dir, out.path().join("img/mzk01/000/329/646"));
        assert!(paths.asset_dir.is_dir());

        // Second run over existing directories succeeds
        assert_eq!(materializer.prepare_paths(&title).unwrap(), paths);
    }

    #[test]
    fn test_unresolved_title_is_rejected() {
        let out = TempDir::new().unwrap();
        let materializer = LayoutMaterializer::new(out.path().to_path_buf(), out.path().to_path_buf());
        let title = Title::new(PathBuf::from("/in/t"), "t".to_string(), BTreeMap::new(), BTreeMap::new());

        assert!(materializer.prepare_paths(&title).is_err());
    }

    #[test]
    #[cfg(unix)]
    fn test_saved_document_and_copied_asset_modes() {
        use std::os::unix::fs::PermissionsExt;

        let out = TempDir::new().unwrap();
        let materializer = LayoutMaterializer::new(out.path().join("k4"), out.path().join("img"));
        std::fs::create_dir_all(materializer.kramerius_root()).unwrap();
        std::fs::create_dir_all(materializer.imageserver_root()).unwrap();
        let title = title_with(ResolvedIdentity::from_catalog("000329646", "mzk01").unwrap());
        let paths = materializer.prepare_paths(&title).unwrap();

        let saved = materializer.save_document(&paths, "p1", b"<a/>").unwrap();
        let mode = std::fs::metadata(&saved).unwrap().permissions().mode();
        assert_eq!(mode & SHARED_FILE_BITS, SHARED_FILE_BITS);

        let source = out.path().join("p1.NDK_USER");
        std::fs::write(&source, b"jp2").unwrap();
        let mut pack = Pack::new("p1");
        pack.set_asset_path(source);

        assert_eq!(materializer.copy_asset(&paths, &pack).unwrap(), AssetCopy::Copied);
        let target = paths.asset_dir.join("p1.jp2");
        assert_eq!(std::fs::metadata(&target).unwrap().permissions().mode() & 0o777, ASSET_MODE);
    }
}
