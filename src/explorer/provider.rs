//! The metadata-enrichment contract implemented by [`super::BasicMetadataProvider`]
//! (no-op) and [`crate::rocrate::RoCrateMetadataProvider`].

use std::sync::Arc;

use async_trait::async_trait;

use super::{basic_entry_metadata, FileEntryMetadata};
use crate::error::Result;
use crate::io::RangeSource;
use crate::zip::{Archive, ZipEntry};

/// Domain-specific enrichment strategy plugged into an [`super::Explorer`].
///
/// Implementors are constructed independently of any archive and are
/// expected to be cheap to hold by value; any state they accumulate while
/// inspecting the archive (e.g. a parsed metadata document) must use interior
/// mutability, since `load_metadata` and `build_entry_metadata` both take
/// `&self`.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Hook invoked once per [`super::Explorer::extract_metadata`] call,
    /// before any entry is visited. The default implementation does nothing.
    async fn load_metadata(&self, _archive: &Archive, _source: &Arc<dyn RangeSource>) -> Result<()> {
        Ok(())
    }

    /// Derive the metadata record for a single file entry. Called once per
    /// file entry, in Central Directory order, after `load_metadata` returns.
    fn build_entry_metadata(&self, entry: &ZipEntry) -> FileEntryMetadata;
}

/// The no-op enrichment strategy: every record is the base derivation (last
/// path segment as name, uncompressed size, mirrored timestamp, no
/// description).
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicMetadataProvider;

#[async_trait]
impl MetadataProvider for BasicMetadataProvider {
    fn build_entry_metadata(&self, entry: &ZipEntry) -> FileEntryMetadata {
        basic_entry_metadata(entry)
    }
}
