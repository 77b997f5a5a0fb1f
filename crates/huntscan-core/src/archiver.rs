use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Copies every matched evidence into `storage_dir`, optionally
/// neutralizing the copy (§4.6). A per-file failure is logged and the loop
/// continues — one bad copy must never abort archival of the rest.
pub fn archive(evidences: &[PathBuf], storage_dir: &Path, neutralize: bool, product_suffix: &str) {
    if evidences.is_empty() {
        return;
    }

    if !storage_dir.is_dir() {
        if let Err(source) = create_storage_dir(storage_dir) {
            warn!(path = %storage_dir.display(), error = %source, "failed to create storage directory");
            return;
        }
    }

    for evidence in evidences {
        if let Err(err) = archive_one(evidence, storage_dir, neutralize, product_suffix) {
            warn!(evidence = %evidence.display(), error = %err, "failed to archive matching evidence");
        }
    }
}

fn create_storage_dir(path: &Path) -> std::io::Result<()> {
    fs::create_dir_all(path)?;
    #[cfg(unix)]
    {
        let mut perms = fs::metadata(path)?.permissions();
        perms.set_mode(0o700);
        fs::set_permissions(path, perms)?;
    }
    Ok(())
}

fn archive_one(
    evidence: &Path,
    storage_dir: &Path,
    neutralize: bool,
    product_suffix: &str,
) -> std::io::Result<()> {
    let basename = evidence
        .file_name()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, "evidence path has no file name"))?;

    let destination_name = if neutralize {
        let mut name = basename.to_os_string();
        name.push(".");
        name.push(product_suffix);
        name
    } else {
        basename.to_os_string()
    };

    let destination = storage_dir.join(destination_name);
    copy_preserving_metadata(evidence, &destination)?;

    if neutralize {
        clear_executable_bits(&destination)?;
    }

    Ok(())
}

/// Mirrors `shutil.copy2`: copy bytes, then carry over mtime (and, on
/// unix, permission bits) from the source.
fn copy_preserving_metadata(from: &Path, to: &Path) -> std::io::Result<()> {
    fs::copy(from, to)?;

    let metadata = fs::metadata(from)?;

    #[cfg(unix)]
    fs::set_permissions(to, metadata.permissions())?;

    let mtime = filetime::FileTime::from_last_modification_time(&metadata);
    let atime = filetime::FileTime::from_last_access_time(&metadata);
    filetime::set_file_times(to, atime, mtime)?;

    Ok(())
}

#[cfg(unix)]
fn clear_executable_bits(path: &Path) -> std::io::Result<()> {
    let metadata = fs::metadata(path)?;
    let mut perms = metadata.permissions();
    let cleared = perms.mode() & !0o111;
    perms.set_mode(cleared);
    fs::set_permissions(path, perms)
}

#[cfg(not(unix))]
fn clear_executable_bits(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copies_matching_evidence_with_original_bytes() {
        let src_dir = tempfile::tempdir().unwrap();
        let dst_dir = tempfile::tempdir().unwrap();
        let src = src_dir.path().join("a.bin");
        fs::write(&src, b"foobar").unwrap();

        archive(&[src.clone()], dst_dir.path(), false, "huntscan");

        let copy = dst_dir.path().join("a.bin");
        assert_eq!(fs::read(&copy).unwrap(), b"foobar");
    }

    #[test]
    fn neutralize_appends_suffix_and_clears_exec_bit() {
        let src_dir = tempfile::tempdir().unwrap();
        let dst_dir = tempfile::tempdir().unwrap();
        let src = src_dir.path().join("a.bin");
        fs::write(&src, b"foobar").unwrap();

        #[cfg(unix)]
        {
            let mut perms = fs::metadata(&src).unwrap().permissions();
            perms.set_mode(0o755);
            fs::set_permissions(&src, perms).unwrap();
        }

        archive(&[src], dst_dir.path(), true, "huntscan");

        let copy = dst_dir.path().join("a.bin.huntscan");
        assert!(copy.exists());

        #[cfg(unix)]
        {
            let mode = fs::metadata(&copy).unwrap().permissions().mode();
            assert_eq!(mode & 0o111, 0);
        }
    }

    #[test]
    fn empty_evidence_set_creates_no_directory() {
        let dst_dir = tempfile::tempdir().unwrap();
        let storage = dst_dir.path().join("storage");
        archive(&[], &storage, false, "huntscan");
        assert!(!storage.exists());
    }
}
