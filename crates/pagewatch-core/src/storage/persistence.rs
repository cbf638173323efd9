//! Snapshot document persistence
//!
//! Encoding and decoding of snapshot documents, and atomic file
//! replacement (write to temp file, sync, rename) so a reader never sees a
//! partially written snapshot.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::models::{Item, TargetKey};

use super::error::{StorageError, StorageResult};

/// Suffix of in-flight temp files
pub(crate) const TEMP_SUFFIX: &str = ".tmp";

/// Encode a snapshot as a pretty-printed JSON array
pub fn encode_snapshot(key: &TargetKey, items: &[Item]) -> StorageResult<Vec<u8>> {
    let mut bytes = serde_json::to_vec_pretty(items).map_err(|source| StorageError::Encode {
        key: key.to_string(),
        source,
    })?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Decode a snapshot document
pub fn decode_snapshot(location: &str, bytes: &[u8]) -> StorageResult<Vec<Item>> {
    serde_json::from_slice(bytes).map_err(|e| StorageError::corrupt(location, e))
}

/// Encode a packed archive (keys sorted)
pub fn encode_archive(archive: &BTreeMap<TargetKey, Vec<Item>>) -> StorageResult<Vec<u8>> {
    let mut bytes = serde_json::to_vec_pretty(archive).map_err(|source| StorageError::Encode {
        key: "<archive>".to_string(),
        source,
    })?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Decode a packed archive
pub fn decode_archive(location: &str, bytes: &[u8]) -> StorageResult<BTreeMap<TargetKey, Vec<Item>>> {
    let raw: BTreeMap<String, Vec<Item>> =
        serde_json::from_slice(bytes).map_err(|e| StorageError::corrupt(location, e))?;

    raw.into_iter()
        .map(|(name, items)| {
            let key = TargetKey::from_stored(&name)
                .map_err(|e| StorageError::corrupt(location, e))?;
            Ok((key, items))
        })
        .collect()
}

/// Read a file, returning `None` when it does not exist
pub(crate) fn read_optional(path: &Path) -> StorageResult<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StorageError::from_read(e, path.to_path_buf())),
    }
}

/// Write data to a file atomically
///
/// 1. Write to a temporary file in the same directory
/// 2. Sync the file to disk
/// 3. Rename the temp file to the target path
pub(crate) fn atomic_write(path: &Path, data: &[u8]) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| StorageError::CreateDirectory {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    // Same directory, so the rename stays on one filesystem
    let temp_path = temp_path_for(path);

    let mut file =
        File::create(&temp_path).map_err(|e| StorageError::from_io(e, temp_path.clone()))?;

    file.write_all(data)
        .map_err(|e| StorageError::from_io(e, temp_path.clone()))?;

    file.sync_all()
        .map_err(|e| StorageError::from_io(e, temp_path.clone()))?;

    drop(file);

    fs::rename(&temp_path, path).map_err(|source| {
        let _ = fs::remove_file(&temp_path);
        StorageError::AtomicWriteFailed {
            from: temp_path.clone(),
            to: path.to_path_buf(),
            source,
        }
    })?;

    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(TEMP_SUFFIX);
    path.with_file_name(name)
}
