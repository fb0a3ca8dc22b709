//! The top-level `Archive` handle: an opened, fully-indexed ZIP listing.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::io::RangeSource;

use super::parser::{detect_zip64, find_eocd, read_central_directory, read_zip64_eocd};
use super::structures::ZipEntry;

/// An opened ZIP archive: its full entry listing, indexed by path.
///
/// Opening an archive only reads its Central Directory (and, for ZIP64
/// archives, the ZIP64 End of Central Directory record) — never entry data.
pub struct Archive {
    source: Arc<dyn RangeSource>,
    entries: IndexMap<String, ZipEntry>,
    is_zip64: bool,
}

/// Read an archive's Central Directory and build an indexed listing.
///
/// Rejects archives containing two entries with the same path as malformed,
/// since a path-keyed index could not represent them both.
pub async fn open(source: Arc<dyn RangeSource>) -> Result<Archive> {
    let (eocd, eocd_offset) = find_eocd(&source).await?;
    let is_zip64 = detect_zip64(&source, eocd_offset).await?;

    let (cd_offset, cd_size, total_entries) = if is_zip64 {
        let eocd64 = read_zip64_eocd(&source, eocd_offset).await?;
        (eocd64.cd_offset, eocd64.cd_size, eocd64.total_entries)
    } else {
        if eocd.needs_zip64() {
            return Err(Error::malformed(
                "End of Central Directory reports ZIP64 sentinel values but no ZIP64 locator was found",
            ));
        }
        (eocd.cd_offset as u64, eocd.cd_size as u64, eocd.total_entries as u64)
    };

    let parsed = read_central_directory(&source, cd_offset, cd_size, total_entries).await?;

    let mut entries = IndexMap::with_capacity(parsed.len());
    for entry in parsed {
        if entries.contains_key(&entry.path) {
            return Err(Error::malformed(format!("duplicate entry path: {}", entry.path)));
        }
        entries.insert(entry.path.clone(), entry);
    }

    Ok(Archive {
        source,
        entries,
        is_zip64,
    })
}

impl Archive {
    /// Number of entries in the archive (files and directories).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the archive used ZIP64 extensions.
    pub fn is_zip64(&self) -> bool {
        self.is_zip64
    }

    /// Iterate entries in on-disk Central Directory order.
    pub fn entries(&self) -> impl Iterator<Item = &ZipEntry> {
        self.entries.values()
    }

    /// Look up an entry by its exact stored path.
    pub fn find_by_path(&self, path: &str) -> Option<&ZipEntry> {
        self.entries.get(path)
    }

    /// Find entries whose path ends with the given suffix, e.g. a bare
    /// file name regardless of directory.
    pub fn find_by_name_suffix(&self, suffix: &str) -> Vec<&ZipEntry> {
        self.entries.values().filter(|e| e.path.ends_with(suffix)).collect()
    }

    /// Find entries matching an arbitrary predicate.
    pub fn find_by_predicate<F>(&self, mut predicate: F) -> Vec<&ZipEntry>
    where
        F: FnMut(&ZipEntry) -> bool,
    {
        self.entries.values().filter(|e| predicate(e)).collect()
    }

    /// The byte source this archive was opened over.
    pub fn source(&self) -> &Arc<dyn RangeSource> {
        &self.source
    }
}
