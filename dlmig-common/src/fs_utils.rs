//! Filesystem helpers shared by the dlmig tools
//!
//! - Atomic writes (temp file + rename) so readers never observe a partial file
//! - Permission bit enforcement with a single bounded retry

use crate::{Error, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Group write
pub const GROUP_WRITE: u32 = 0o020;
/// Group execute (search for directories)
pub const GROUP_EXEC: u32 = 0o010;
/// Others read
pub const OTHERS_READ: u32 = 0o004;
/// Others execute (search for directories)
pub const OTHERS_EXEC: u32 = 0o001;

/// Bits every directory in a published tree must carry
pub const SHARED_DIR_BITS: u32 = GROUP_WRITE | GROUP_EXEC | OTHERS_READ | OTHERS_EXEC;

/// Bits every published metadata file must carry
pub const SHARED_FILE_BITS: u32 = GROUP_WRITE | GROUP_EXEC | OTHERS_READ;

/// Re-attempts after the first failed attempt to set a bit
const PERMISSION_RETRIES: usize = 1;

/// Write `contents` to `target` atomically
///
/// The data goes to a hidden sibling temp file first and is renamed into
/// place, so the target is either absent, the previous version, or complete.
pub fn write_atomic(target: &Path, contents: &[u8]) -> Result<()> {
    let temp = temp_sibling(target)?;

    let write_result = (|| -> std::io::Result<()> {
        let mut file = fs::File::create(&temp)?;
        file.write_all(contents)?;
        file.sync_all()
    })();

    if let Err(e) = write_result {
        let _ = fs::remove_file(&temp);
        return Err(Error::Io(e));
    }

    if let Err(e) = fs::rename(&temp, target) {
        let _ = fs::remove_file(&temp);
        return Err(Error::Io(e));
    }

    Ok(())
}

/// Copy `source` to `target` through a temp sibling, never overwriting
///
/// Returns `Ok(false)` without touching anything when `target` already exists.
pub fn copy_if_absent(source: &Path, target: &Path) -> Result<bool> {
    if target.exists() {
        return Ok(false);
    }

    let temp = temp_sibling(target)?;

    if let Err(e) = fs::copy(source, &temp) {
        let _ = fs::remove_file(&temp);
        return Err(Error::Io(e));
    }

    // Re-check: the target may have appeared while copying
    if target.exists() {
        let _ = fs::remove_file(&temp);
        return Ok(false);
    }

    if let Err(e) = fs::rename(&temp, target) {
        let _ = fs::remove_file(&temp);
        return Err(Error::Io(e));
    }

    Ok(true)
}

fn temp_sibling(target: &Path) -> Result<PathBuf> {
    let file_name = target
        .file_name()
        .ok_or_else(|| Error::InvalidInput(format!("Not a file path: {}", target.display())))?;

    Ok(target.with_file_name(format!(".{}.tmp", file_name.to_string_lossy())))
}

/// Make sure every bit of `bits` is set on `path`
///
/// Each missing bit is added and re-read. A bit that is still missing after
/// one retry yields [`Error::Permission`].
#[cfg(unix)]
pub fn ensure_mode_bits(path: &Path, bits: u32) -> Result<()> {
    for shift in 0..12 {
        let bit = 1u32 << shift;
        if bits & bit != 0 {
            ensure_bit(path, bit)?;
        }
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn ensure_mode_bits(_path: &Path, _bits: u32) -> Result<()> {
    Ok(())
}

#[cfg(unix)]
fn ensure_bit(path: &Path, bit: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    for attempt in 0..=PERMISSION_RETRIES {
        let mode = fs::metadata(path)?.permissions().mode();
        if mode & bit == bit {
            return Ok(());
        }

        if attempt > 0 {
            tracing::warn!(
                path = %path.display(),
                bit = %format!("{:#o}", bit),
                "Permission bit still missing, retrying"
            );
        }

        if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(mode | bit)) {
            tracing::debug!(path = %path.display(), error = %e, "set_permissions failed");
        }
    }

    let mode = fs::metadata(path)?.permissions().mode();
    if mode & bit == bit {
        Ok(())
    } else {
        Err(Error::Permission {
            path: path.to_path_buf(),
            mode: bit,
        })
    }
}

/// Set the permission bits of `path` to exactly `mode`
#[cfg(unix)]
pub fn set_exact_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(|_| Error::Permission {
        path: path.to_path_buf(),
        mode,
    })?;

    let actual = fs::metadata(path)?.permissions().mode() & 0o7777;
    if actual == mode {
        Ok(())
    } else {
        Err(Error::Permission {
            path: path.to_path_buf(),
            mode,
        })
    }
}

#[cfg(not(unix))]
pub fn set_exact_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

/// Create `leaf` (and parents) under `root`, then enforce `bits` on every
/// directory from `root` down to and including `leaf`
///
/// A `root` that already exists is provisioned outside of this tool and is
/// left as is; a `root` created here gets the bits like any other segment.
pub fn create_shared_dir(root: &Path, leaf: &Path, bits: u32) -> Result<()> {
    let relative = leaf.strip_prefix(root).map_err(|_| {
        Error::InvalidInput(format!(
            "{} is not below {}",
            leaf.display(),
            root.display()
        ))
    })?;

    let root_existed = root.is_dir();

    // create_dir_all tolerates directories that already exist
    fs::create_dir_all(leaf)?;

    if !root_existed {
        ensure_mode_bits(root, bits)?;
    }

    let mut current = root.to_path_buf();
    for segment in relative.components() {
        current.push(segment);
        ensure_mode_bits(&current, bits)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_atomic_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("doc.xml");

        write_atomic(&target, b"<a/>").unwrap();

        assert_eq!(fs::read(&target).unwrap(), b"<a/>");
        assert!(!dir.path().join(".doc.xml.tmp").exists());
    }

    #[test]
    fn test_copy_if_absent_does_not_overwrite() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("source.bin");
        let target = dir.path().join("target.bin");
        fs::write(&source, b"new").unwrap();
        fs::write(&target, b"old").unwrap();

        assert!(!copy_if_absent(&source, &target).unwrap());
        assert_eq!(fs::read(&target).unwrap(), b"old");
    }

    #[test]
    #[cfg(unix)]
    fn test_ensure_mode_bits_adds_missing_bits() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        fs::set_permissions(&sub, fs::Permissions::from_mode(0o700)).unwrap();

        ensure_mode_bits(&sub, SHARED_DIR_BITS).unwrap();

        let mode = fs::metadata(&sub).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o735);
    }

    #[test]
    #[cfg(unix)]
    fn test_create_shared_dir_covers_created_root() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let root = dir.path().join("imageserver");
        let leaf = root.join("mzk01").join("000");

        create_shared_dir(&root, &leaf, SHARED_DIR_BITS).unwrap();

        for path in [&root, &root.join("mzk01"), &leaf] {
            let mode = fs::metadata(path).unwrap().permissions().mode();
            assert_eq!(mode & SHARED_DIR_BITS, SHARED_DIR_BITS, "{} has mode {:o}", path.display(), mode);
        }
    }

    #[test]
    fn test_create_shared_dir_rejects_leaf_outside_root() {
        let dir = TempDir::new().unwrap();
        let result = create_shared_dir(dir.path(), Path::new("/elsewhere"), SHARED_DIR_BITS);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
