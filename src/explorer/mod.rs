//! The caller-facing facade: couples a [`RangeSource`] to an opened
//! [`Archive`] and an optional metadata-enrichment pipeline.
//!
//! An [`Explorer`] moves through three states over its lifetime:
//!
//! ```text
//! created --open()--> opened --extract_metadata()--> enriched
//! ```
//!
//! Accessing archive-dependent operations before `open` and accessing
//! enriched metadata before `extract_metadata` both fail with
//! [`Error::InvalidOperation`] rather than encoding the state machine in the
//! type system — a trait-object `MetadataProvider` makes the latter
//! impractical to express at compile time (see `DESIGN.md`).

mod provider;

pub use provider::{BasicMetadataProvider, MetadataProvider};

use std::sync::Arc;

use indexmap::IndexMap;
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::io::{ByteStream, RangeSource};
use crate::zip::{self, Archive, ZipEntry};

/// Per-entry enrichment produced by [`Explorer::extract_metadata`].
#[derive(Debug, Clone)]
pub struct FileEntryMetadata {
    /// Same as the entry's path; the identifier this record is keyed by.
    pub path: String,
    /// The archive entry this record was derived from.
    pub entry: ZipEntry,
    /// Display name. Defaults to the last path segment.
    pub name: String,
    /// Uncompressed size in bytes, mirrored from the entry.
    pub size: u64,
    /// Modification timestamp, mirrored from the entry.
    pub date_time: chrono::NaiveDateTime,
    /// Optional human-readable description, populated by enrichment.
    pub description: Option<String>,
}

/// Derive the base metadata record for an entry: last path segment as name,
/// uncompressed size, mirrored timestamp, no description.
pub(crate) fn basic_entry_metadata(entry: &ZipEntry) -> FileEntryMetadata {
    let name = entry
        .path
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(&entry.path)
        .to_string();

    FileEntryMetadata {
        path: entry.path.clone(),
        entry: entry.clone(),
        name,
        size: entry.uncompressed_size,
        date_time: entry.date_time,
        description: None,
    }
}

/// Couples a byte source with a lazily-opened archive and a pluggable
/// metadata-enrichment strategy.
///
/// `Explorer<BasicMetadataProvider>` (the [`Default`] instantiation) performs
/// no enrichment beyond the base record; [`crate::rocrate::RoCrateExplorer`]
/// is a type alias over `Explorer<RoCrateMetadataProvider>`.
pub struct Explorer<P: MetadataProvider = BasicMetadataProvider> {
    source: Arc<dyn RangeSource>,
    archive: OnceCell<Arc<Archive>>,
    provider: P,
    metadata: RwLock<Option<IndexMap<String, FileEntryMetadata>>>,
}

impl<P: MetadataProvider + Default> Explorer<P> {
    /// Create an explorer over a byte source, using `P`'s default
    /// configuration.
    pub fn new(source: Arc<dyn RangeSource>) -> Self {
        Self::with_provider(source, P::default())
    }
}

impl<P: MetadataProvider> Explorer<P> {
    /// Create an explorer over a byte source with an explicit provider.
    pub fn with_provider(source: Arc<dyn RangeSource>, provider: P) -> Self {
        Self {
            source,
            archive: OnceCell::new(),
            provider,
            metadata: RwLock::new(None),
        }
    }

    /// Compose a new explorer over an already-opened archive, reusing its
    /// index instead of re-parsing the central directory.
    ///
    /// This is the "wrap an existing explorer" pattern from the spec: rather
    /// than accepting another `Explorer`, this takes the opened `Archive`
    /// directly (obtained from [`Explorer::open`]), which is the data an
    /// already-opened explorer and a raw source both eventually converge on.
    pub fn from_opened(archive: Arc<Archive>, provider: P) -> Self {
        let source = archive.source().clone();
        let cell = OnceCell::new();
        // infallible: the cell is empty and `set` only fails if already initialised.
        cell.set(archive).expect("freshly constructed OnceCell is empty");
        Self {
            source,
            archive: cell,
            provider,
            metadata: RwLock::new(None),
        }
    }

    /// Open the archive, parsing its Central Directory if this is the first
    /// call. Subsequent calls return the same handle without re-parsing.
    #[instrument(skip(self), fields(source_len = self.source.len()))]
    pub async fn open(&self) -> Result<Arc<Archive>> {
        let archive = self
            .archive
            .get_or_try_init(|| async { zip::open(self.source.clone()).await.map(Arc::new) })
            .await?;
        Ok(archive.clone())
    }

    /// The opened archive's entry index, in Central Directory order.
    ///
    /// Fails with [`Error::InvalidOperation`] if [`Explorer::open`] has not
    /// been called yet.
    pub fn entries(&self) -> Result<Vec<ZipEntry>> {
        Ok(self.require_opened()?.entries().cloned().collect())
    }

    /// Look up an entry by its exact archive path.
    pub fn find_by_path(&self, path: &str) -> Result<Option<ZipEntry>> {
        Ok(self.require_opened()?.find_by_path(path).cloned())
    }

    /// Find the first file entry whose path ends with `suffix`.
    pub fn find_file_by_name(&self, suffix: &str) -> Result<Option<ZipEntry>> {
        Ok(self
            .require_opened()?
            .find_by_name_suffix(suffix)
            .into_iter()
            .find(|e| e.is_file())
            .cloned())
    }

    /// Whole-file decompressed contents of a single entry.
    pub async fn get_file_contents(&self, entry: &ZipEntry) -> Result<Vec<u8>> {
        self.require_opened()?;
        zip::extract_bytes(&self.source, entry).await
    }

    /// Decompressed contents of a single entry as a pull-based byte stream.
    pub async fn get_file_stream(&self, entry: &ZipEntry) -> Result<ByteStream> {
        self.require_opened()?;
        zip::extract_stream(&self.source, entry).await
    }

    /// Populate the metadata map: runs the provider's `load_metadata` hook,
    /// then derives a [`FileEntryMetadata`] for every file entry.
    ///
    /// Idempotent: repeated calls re-run the provider hook and rebuild the
    /// map from scratch rather than patching it, so a failed re-extraction
    /// never leaves a half-populated map visible to readers (the write lock
    /// is only taken once the full replacement map is ready).
    #[instrument(skip(self))]
    pub async fn extract_metadata(&self) -> Result<()> {
        let archive = self.require_opened()?.clone();
        self.provider.load_metadata(&archive, &self.source).await?;

        let mut map = IndexMap::with_capacity(archive.len());
        for entry in archive.entries().filter(|e| e.is_file()) {
            map.insert(entry.path.clone(), self.provider.build_entry_metadata(entry));
        }
        debug!(entries = map.len(), "metadata extracted");

        *self.metadata.write().await = Some(map);
        Ok(())
    }

    /// The enriched metadata record for a single entry.
    ///
    /// Fails with [`Error::InvalidOperation`] if [`Explorer::extract_metadata`]
    /// has not run yet, or [`Error::NotFound`] if the path has no entry.
    pub async fn get_file_entry_metadata(&self, path: &str) -> Result<FileEntryMetadata> {
        let guard = self.metadata.read().await;
        let map = guard
            .as_ref()
            .ok_or_else(|| Error::invalid_operation("extract_metadata has not been called"))?;
        map.get(path).cloned().ok_or_else(|| Error::not_found(path))
    }

    /// The byte source this explorer was constructed over.
    pub fn source(&self) -> &Arc<dyn RangeSource> {
        &self.source
    }

    /// The provider backing this explorer's enrichment.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    fn require_opened(&self) -> Result<&Arc<Archive>> {
        self.archive
            .get()
            .ok_or_else(|| Error::invalid_operation("archive has not been opened yet"))
    }
}
