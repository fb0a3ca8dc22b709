//! # rocrate-explorer
//!
//! Random-access, read-only exploration of ZIP archives over local files and
//! HTTP(S) Range requests, with a thin overlay that recognises [RO-Crate]
//! archives.
//!
//! For remote archives, opening and listing never fetches the archive body:
//! only the trailing End of Central Directory record and the Central
//! Directory itself are read, via HTTP `Range` requests. Individual members
//! are later extracted with their own targeted range request.
//!
//! [RO-Crate]: https://www.researchobject.org/ro-crate/
//!
//! ## Layout
//!
//! - [`io`] — the [`io::RangeSource`] trait and its [`io::LocalSource`] /
//!   [`io::RemoteSource`] implementations.
//! - [`zip`] — the ZIP/ZIP64 Central Directory parser and per-entry
//!   extraction, driven entirely by ranged reads.
//! - [`explorer`] — [`explorer::Explorer`], the caller-facing facade coupling
//!   a source, an opened archive, and a pluggable metadata-enrichment
//!   pipeline.
//! - [`rocrate`] — [`rocrate::RoCrateExplorer`], the RO-Crate-aware
//!   specialisation.
//!
//! ## Example
//!
//! ```no_run
//! use rocrate_explorer::{ArchiveSource, RoCrateExplorer};
//!
//! # #[tokio::main]
//! # async fn main() -> rocrate_explorer::Result<()> {
//! let explorer = RoCrateExplorer::open_source(ArchiveSource::Remote(
//!     "https://example.org/dataset.crate.zip".to_string(),
//! ))
//! .await?;
//!
//! for entry in explorer.entries()? {
//!     println!("{} ({} bytes)", entry.path, entry.uncompressed_size);
//! }
//!
//! if explorer.has_crate()? {
//!     explorer.extract_metadata().await?;
//!     let root = explorer.ro_crate()?.root_entity();
//!     println!("{root:?}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod explorer;
pub mod io;
pub mod rocrate;
pub mod zip;

pub use error::{Error, Result};
pub use explorer::{BasicMetadataProvider, Explorer, FileEntryMetadata, MetadataProvider};
pub use io::{LocalSource, RangeSource, RemoteSource, RemoteSourceOptions};
pub use rocrate::{RoCrate, RoCrateEntity, RoCrateExplorer, RoCrateMetadataProvider};
pub use zip::{Archive, EntryKind, ZipEntry};

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// A tagged archive source, for callers that only learn the source kind at
/// runtime (e.g. from a CLI argument or a request body).
///
/// Callers who know their source kind ahead of time can skip this and call
/// [`io::LocalSource::open`] / [`io::RemoteSource::new`] directly.
#[derive(Debug, Clone)]
pub enum ArchiveSource {
    /// A local file, identified by path.
    Local(PathBuf),
    /// An HTTP(S) URL, identified by its string form.
    Remote(String),
}

impl ArchiveSource {
    /// Resolve this source into a [`RangeSource`], opening a local file or
    /// probing a remote URL as appropriate.
    pub async fn open(self) -> Result<Arc<dyn RangeSource>> {
        Ok(match self {
            ArchiveSource::Local(path) => Arc::new(LocalSource::open(path)?),
            ArchiveSource::Remote(url) => Arc::new(RemoteSource::new(url).await?),
        })
    }
}

impl<P: MetadataProvider + Default> Explorer<P> {
    /// Resolve an [`ArchiveSource`] and open it in one step.
    pub async fn open_source(source: ArchiveSource) -> Result<Self> {
        let range_source = source.open().await?;
        let explorer = Self::new(range_source);
        explorer.open().await?;
        Ok(explorer)
    }
}

/// Run a long-running `open`/`extract` call under a deadline, surfacing
/// [`Error::Cancelled`] if it elapses instead of `tokio::time::timeout`'s own
/// `Elapsed` type.
///
/// This is the documented way to cancel an in-flight call: wrap it here
/// rather than in a bare `tokio::time::timeout`, so a caller-supplied
/// deadline and a transport-level failure both come back through the same
/// [`Error`] taxonomy.
pub async fn with_timeout<F, T>(duration: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(duration, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::Cancelled),
    }
}
