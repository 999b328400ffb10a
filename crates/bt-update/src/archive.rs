//! Archive extraction for downloaded releases
//!
//! Release archives hold the executable either at the root or inside one
//! top-level folder (`bt-x86_64-unknown-linux-gnu/bt`). Entries that would
//! escape the destination directory are rejected, and only regular files and
//! directories are written.

use flate2::read::GzDecoder;
use std::fs;
use std::io::{self, Cursor};
use std::path::{Component, Path, PathBuf};
use tar::Archive;
use tracing::debug;

use crate::error::InstallError;
use crate::platform::ArchiveFormat;

/// Extract an archive and return the path of the named executable inside it
pub fn extract_binary(
    bytes: &[u8],
    format: ArchiveFormat,
    binary_name: &str,
    dest_dir: &Path,
) -> Result<PathBuf, InstallError> {
    match format {
        ArchiveFormat::TarGz => extract_tar_gz(bytes, dest_dir)?,
        ArchiveFormat::Zip => extract_zip(bytes, dest_dir)?,
    }

    find_binary(dest_dir, binary_name)
}

/// Extract a gzip-compressed tarball into `dest_dir`
pub fn extract_tar_gz(bytes: &[u8], dest_dir: &Path) -> Result<(), InstallError> {
    let mut archive = Archive::new(GzDecoder::new(Cursor::new(bytes)));

    let entries = archive.entries().map_err(archive_error)?;
    for entry in entries {
        let mut entry = entry.map_err(archive_error)?;
        let entry_path = entry.path().map_err(archive_error)?.into_owned();
        reject_unsafe_path(&entry_path)?;

        let output_path = dest_dir.join(&entry_path);
        let entry_type = entry.header().entry_type();

        if entry_type.is_dir() {
            fs::create_dir_all(&output_path).map_err(|e| InstallError::io(&output_path, e))?;
        } else if entry_type.is_file() {
            create_parent(&output_path)?;
            entry
                .unpack(&output_path)
                .map_err(|e| InstallError::io(&output_path, e))?;
        } else {
            debug!("Skipping non-file archive entry {}", entry_path.display());
        }
    }

    Ok(())
}

/// Extract a zip archive into `dest_dir`
pub fn extract_zip(bytes: &[u8], dest_dir: &Path) -> Result<(), InstallError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| InstallError::Archive(format!("invalid zip archive: {}", e)))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| InstallError::Archive(format!("failed to read entry {}: {}", i, e)))?;

        let entry_path = entry.enclosed_name().ok_or_else(|| {
            InstallError::Archive(format!("refusing to extract unsafe path '{}'", entry.name()))
        })?;
        reject_unsafe_path(&entry_path)?;

        let output_path = dest_dir.join(&entry_path);
        if entry.is_dir() {
            fs::create_dir_all(&output_path).map_err(|e| InstallError::io(&output_path, e))?;
        } else {
            create_parent(&output_path)?;
            let mut outfile =
                fs::File::create(&output_path).map_err(|e| InstallError::io(&output_path, e))?;
            io::copy(&mut entry, &mut outfile).map_err(|e| InstallError::io(&output_path, e))?;
        }
    }

    Ok(())
}

/// Locate the executable at the root or under a single top-level folder
pub fn find_binary(dest_dir: &Path, binary_name: &str) -> Result<PathBuf, InstallError> {
    let at_root = dest_dir.join(binary_name);
    if at_root.is_file() {
        return Ok(at_root);
    }

    let entries: Vec<PathBuf> = fs::read_dir(dest_dir)
        .map_err(|e| InstallError::io(dest_dir, e))?
        .filter_map(Result::ok)
        .map(|e| e.path())
        .collect();

    if let [only] = entries.as_slice() {
        let nested = only.join(binary_name);
        if only.is_dir() && nested.is_file() {
            return Ok(nested);
        }
    }

    Err(InstallError::BinaryNotFound {
        name: binary_name.to_string(),
    })
}

fn reject_unsafe_path(path: &Path) -> Result<(), InstallError> {
    let escapes = path.components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });

    if escapes || path.is_absolute() {
        return Err(InstallError::Archive(format!(
            "refusing to extract path with parent directory or absolute reference: {}",
            path.display()
        )));
    }
    Ok(())
}

fn create_parent(path: &Path) -> Result<(), InstallError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| InstallError::io(parent, e))?;
    }
    Ok(())
}

fn archive_error(err: io::Error) -> InstallError {
    InstallError::Archive(err.to_string())
}
