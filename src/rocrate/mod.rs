//! RO-Crate recognition: an [`Explorer`] specialisation that locates
//! `ro-crate-metadata.json` at the archive root, parses it as a minimal
//! JSON-LD graph, and overlays per-entry `name`/`description` metadata drawn
//! from graph entities keyed by path.
//!
//! No general-purpose JSON-LD engine appears anywhere in this crate's
//! dependency corpus, so the graph model here (§4.5.1 of the design notes)
//! is the minimal concrete shape this crate needs: a `@graph` array of
//! entities, each carrying an `@id` and optional `name`/`description`
//! strings, indexed once at load time.

mod graph;

pub use graph::{RoCrate, RoCrateEntity};

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::{Error, Result};
use crate::explorer::{basic_entry_metadata, Explorer, FileEntryMetadata, MetadataProvider};
use crate::io::RangeSource;
use crate::zip::{self, Archive, ZipEntry};

/// The well-known path of the RO-Crate metadata document at the archive
/// root. No leading slash, no subdirectory — per the RO-Crate file contract.
pub const ROOT_METADATA_NAME: &str = "ro-crate-metadata.json";

/// An [`Explorer`] specialised for RO-Crate archives.
pub type RoCrateExplorer = Explorer<RoCrateMetadataProvider>;

/// [`MetadataProvider`] that recognises RO-Crate archives.
///
/// Absence of `ro-crate-metadata.json` is not a load-time failure: it simply
/// leaves the cached crate unset, and every entry falls back to the base
/// metadata record.
#[derive(Default)]
pub struct RoCrateMetadataProvider {
    cache: OnceCell<Option<RoCrate>>,
}

impl RoCrateMetadataProvider {
    /// The cached crate, if `load_metadata` has run and found one.
    ///
    /// Returns `None` both when `load_metadata` has not run yet and when it
    /// ran but found no crate; callers that need to distinguish the two
    /// check [`RoCrateExplorerExt::has_crate`] instead.
    fn cached(&self) -> Option<&RoCrate> {
        self.cache.get().and_then(|slot| slot.as_ref())
    }
}

#[async_trait]
impl MetadataProvider for RoCrateMetadataProvider {
    async fn load_metadata(&self, archive: &Archive, source: &Arc<dyn RangeSource>) -> Result<()> {
        self.cache
            .get_or_try_init(|| async {
                let Some(entry) = archive.find_by_path(ROOT_METADATA_NAME).filter(|e| e.is_file()) else {
                    debug!("no ro-crate-metadata.json at archive root");
                    return Ok(None);
                };
                let bytes = zip::extract_bytes(source, entry).await?;
                let text = String::from_utf8(bytes).map_err(|e| {
                    Error::malformed(format!("{ROOT_METADATA_NAME} is not valid UTF-8: {e}"))
                })?;
                let document: serde_json::Value = serde_json::from_str(&text)?;
                let crate_ = RoCrate::from_document(document)?;
                debug!(entities = crate_.len(), "parsed RO-Crate graph");
                Ok(Some(crate_))
            })
            .await?;
        Ok(())
    }

    fn build_entry_metadata(&self, entry: &ZipEntry) -> FileEntryMetadata {
        let base = basic_entry_metadata(entry);
        let Some(crate_) = self.cached() else {
            return base;
        };
        let Some(entity) = crate_.get_entity(&entry.path) else {
            return base;
        };

        let mut enriched = base;
        if let Some(name) = entity.get("name").and_then(|v| v.as_str()) {
            enriched.name = name.to_string();
        }
        if let Some(description) = entity.get("description").and_then(|v| v.as_str()) {
            enriched.description = Some(description.to_string());
        }
        enriched
    }
}

/// Extra operations available on an [`Explorer`] configured with
/// [`RoCrateMetadataProvider`], added as an inherent impl over the generic
/// [`Explorer`] type rather than a new struct, since Rust's trait-object
/// `MetadataProvider` makes a fully separate `RoCrateExplorer` type
/// unnecessary — see `DESIGN.md`.
impl Explorer<RoCrateMetadataProvider> {
    /// True iff an entry named exactly `ro-crate-metadata.json` exists at
    /// the archive root.
    ///
    /// Fails with [`Error::InvalidOperation`] if the archive has not been
    /// opened yet.
    pub fn has_crate(&self) -> Result<bool> {
        Ok(self
            .find_by_path(ROOT_METADATA_NAME)?
            .map(|e| e.is_file())
            .unwrap_or(false))
    }

    /// An immutable view over the parsed RO-Crate graph.
    ///
    /// Fails with [`Error::InvalidOperation`] if [`Explorer::extract_metadata`]
    /// has not been called yet, or if it ran but found no
    /// `ro-crate-metadata.json` at the archive root.
    pub fn ro_crate(&self) -> Result<&RoCrate> {
        match self.provider().cache.get() {
            Some(Some(crate_)) => Ok(crate_),
            Some(None) => Err(Error::invalid_operation(
                "archive has no ro-crate-metadata.json at its root",
            )),
            None => Err(Error::invalid_operation("extract_metadata has not been called")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zip::testutil::{build_zip, MemorySource};

    fn sample_document() -> Vec<u8> {
        serde_json::json!({
            "@context": "https://w3id.org/ro/crate/1.1/context",
            "@graph": [
                {
                    "@id": "ro-crate-metadata.json",
                    "@type": "CreativeWork",
                    "about": { "@id": "./" }
                },
                {
                    "@id": "./",
                    "@type": "Dataset",
                    "name": "Example Dataset"
                },
                {
                    "@id": "data/reads.fastq",
                    "@type": "File",
                    "name": "Sequencing reads",
                    "description": "Raw FASTQ output from the sequencer"
                }
            ]
        })
        .to_string()
        .into_bytes()
    }

    #[tokio::test]
    async fn has_crate_true_when_present() {
        let meta = sample_document();
        let (bytes, _) = build_zip(&[(ROOT_METADATA_NAME, &meta), ("data/reads.fastq", b"@read1\n")]);
        let explorer = RoCrateExplorer::new(MemorySource::new(bytes));
        explorer.open().await.unwrap();
        assert!(explorer.has_crate().unwrap());
    }

    #[tokio::test]
    async fn has_crate_false_without_metadata_file() {
        let (bytes, _) = build_zip(&[("plain.txt", b"nothing special")]);
        let explorer = RoCrateExplorer::new(MemorySource::new(bytes));
        explorer.open().await.unwrap();
        assert!(!explorer.has_crate().unwrap());
    }

    #[tokio::test]
    async fn has_crate_before_open_is_invalid_operation() {
        let (bytes, _) = build_zip(&[("plain.txt", b"x")]);
        let explorer = RoCrateExplorer::new(MemorySource::new(bytes));
        let err = explorer.has_crate().unwrap_err();
        assert!(matches!(err, Error::InvalidOperation { .. }));
    }

    #[tokio::test]
    async fn ro_crate_before_extract_metadata_is_invalid_operation() {
        let meta = sample_document();
        let (bytes, _) = build_zip(&[(ROOT_METADATA_NAME, &meta)]);
        let explorer = RoCrateExplorer::new(MemorySource::new(bytes));
        explorer.open().await.unwrap();
        let err = explorer.ro_crate().unwrap_err();
        assert!(matches!(err, Error::InvalidOperation { .. }));
    }

    #[tokio::test]
    async fn ro_crate_absent_is_invalid_operation_after_extract() {
        let (bytes, _) = build_zip(&[("plain.txt", b"x")]);
        let explorer = RoCrateExplorer::new(MemorySource::new(bytes));
        explorer.open().await.unwrap();
        explorer.extract_metadata().await.unwrap();
        let err = explorer.ro_crate().unwrap_err();
        assert!(matches!(err, Error::InvalidOperation { .. }));
    }

    #[tokio::test]
    async fn entry_metadata_overridden_by_graph_entity() {
        let meta = sample_document();
        let (bytes, _) = build_zip(&[(ROOT_METADATA_NAME, &meta), ("data/reads.fastq", b"@read1\n")]);
        let explorer = RoCrateExplorer::new(MemorySource::new(bytes));
        explorer.open().await.unwrap();
        explorer.extract_metadata().await.unwrap();

        let meta = explorer.get_file_entry_metadata("data/reads.fastq").await.unwrap();
        assert_eq!(meta.name, "Sequencing reads");
        assert_eq!(meta.description.as_deref(), Some("Raw FASTQ output from the sequencer"));

        // The metadata document's own entry has no matching graph entity
        // keyed by that path (its entity is keyed by "ro-crate-metadata.json",
        // which is itself a valid path match) so it takes the descriptor's name.
        let descriptor = explorer.get_file_entry_metadata(ROOT_METADATA_NAME).await.unwrap();
        assert_eq!(descriptor.description, None);
    }

    #[tokio::test]
    async fn entry_without_matching_entity_keeps_base_metadata() {
        let meta = sample_document();
        let (bytes, _) = build_zip(&[(ROOT_METADATA_NAME, &meta), ("unrelated.txt", b"hi")]);
        let explorer = RoCrateExplorer::new(MemorySource::new(bytes));
        explorer.open().await.unwrap();
        explorer.extract_metadata().await.unwrap();

        let meta = explorer.get_file_entry_metadata("unrelated.txt").await.unwrap();
        assert_eq!(meta.name, "unrelated.txt");
        assert_eq!(meta.description, None);
    }

    #[tokio::test]
    async fn root_entity_resolves_via_descriptor_about() {
        let meta = sample_document();
        let (bytes, _) = build_zip(&[(ROOT_METADATA_NAME, &meta)]);
        let explorer = RoCrateExplorer::new(MemorySource::new(bytes));
        explorer.open().await.unwrap();
        explorer.extract_metadata().await.unwrap();

        let crate_ = explorer.ro_crate().unwrap();
        let root = crate_.root_entity().expect("root entity resolves");
        assert_eq!(root.get("name").and_then(|v| v.as_str()), Some("Example Dataset"));
    }
}
