//! Byte-source abstractions for reading ZIP archives from various origins.
//!
//! This module provides a unified interface for random-access, ranged reads,
//! allowing the ZIP parser in [`crate::zip`] to work identically over a local
//! file and a remote HTTP(S) URL.
//!
//! ## Architecture
//!
//! The core abstraction is the [`RangeSource`] trait, which provides:
//! - Total addressable length
//! - A contiguous `[offset, offset + length)` read, materialised into memory
//! - The same contiguous read, delivered as a pull-based byte stream
//!
//! ## Implementations
//!
//! - [`LocalSource`]: reads from a local file via platform pread/seek,
//!   dispatched to the blocking thread pool.
//! - [`RemoteSource`]: reads from an HTTP(S) URL using Range requests,
//!   resolving redirects and probing Range support on first use.

mod local;
mod remote;

pub use local::LocalSource;
pub use remote::{RemoteSource, RemoteSourceOptions};

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures_core::stream::BoxStream;

/// A pull-based stream of byte chunks, as returned by [`RangeSource::read_stream`].
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// A random-access, read-only byte source.
///
/// Implementations must be `Send + Sync` so an opened archive can be shared
/// across tasks behind an `Arc`. Reads are independent and reorderable: the
/// trait makes no ordering or exclusion promises between concurrent calls
/// (see the crate-level concurrency notes).
#[async_trait]
pub trait RangeSource: Send + Sync {
    /// Total number of bytes addressable by this source.
    fn len(&self) -> u64;

    /// Returns `true` if the source is known to be empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read exactly `length` bytes starting at `offset`.
    ///
    /// Fails if the source cannot satisfy the full range (a short read is a
    /// malformed-source condition, not silently truncated).
    async fn read(&self, offset: u64, length: u64) -> Result<Bytes>;

    /// Read `length` bytes starting at `offset`, delivered as a sequence of
    /// chunks rather than buffered up front. Used for large-payload
    /// extraction without resident buffering.
    async fn read_stream(&self, offset: u64, length: u64) -> Result<ByteStream>;
}
