//! Entry data extraction: whole-buffer and streaming, STORED and DEFLATE.

use std::io::Read;
use std::sync::Arc;

use flate2::read::DeflateDecoder;
use futures_util::TryStreamExt;
use tokio_util::io::{ReaderStream, StreamReader};

use crate::error::{Error, Result};
use crate::io::{ByteStream, RangeSource};

use super::parser::resolve_data_offset;
use super::structures::ZipEntry;

const STORED: u16 = 0;
const DEFLATE: u16 = 8;

/// Extract an entry's decompressed contents into memory.
///
/// Fails with [`Error::InvalidOperation`] for directory entries and
/// [`Error::UnsupportedCompression`] for any method other than STORED or
/// DEFLATE.
pub async fn extract_bytes(source: &Arc<dyn RangeSource>, entry: &ZipEntry) -> Result<Vec<u8>> {
    if entry.is_directory() {
        return Err(Error::invalid_operation(format!(
            "cannot extract data from directory entry {}",
            entry.path
        )));
    }

    let data_offset = resolve_data_offset(source, entry).await?;
    let compressed = source.read(data_offset, entry.compressed_size).await?;

    match entry.compression_method {
        STORED => Ok(compressed.to_vec()),
        DEFLATE => {
            let mut decoder = DeflateDecoder::new(&compressed[..]);
            let mut out = Vec::with_capacity(entry.uncompressed_size as usize);
            decoder
                .read_to_end(&mut out)
                .map_err(|e| Error::malformed(format!("inflating {}: {e}", entry.path)))?;
            Ok(out)
        }
        other => Err(Error::UnsupportedCompression { method: other }),
    }
}

/// Extract an entry's decompressed contents as a stream of chunks.
///
/// For STORED entries this is a direct pass-through of the ranged byte
/// stream. For DEFLATE entries the compressed stream is piped through
/// [`async_compression`]'s Tokio-based decoder so callers never need to
/// buffer a whole entry in memory.
pub async fn extract_stream(source: &Arc<dyn RangeSource>, entry: &ZipEntry) -> Result<ByteStream> {
    if entry.is_directory() {
        return Err(Error::invalid_operation(format!(
            "cannot extract data from directory entry {}",
            entry.path
        )));
    }

    let data_offset = resolve_data_offset(source, entry).await?;
    let raw = source.read_stream(data_offset, entry.compressed_size).await?;

    match entry.compression_method {
        STORED => Ok(raw),
        DEFLATE => {
            let io_stream = raw.map_err(std::io::Error::other);
            let reader = StreamReader::new(io_stream);
            let decoder = async_compression::tokio::bufread::DeflateDecoder::new(reader);
            let out = ReaderStream::new(decoder)
                .map_err(|e| Error::malformed(format!("inflating {}: {e}", entry.path)));
            Ok(Box::pin(out))
        }
        other => Err(Error::UnsupportedCompression { method: other }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zip::archive;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn extracts_stored_bytes() {
        let (bytes, _) = crate::zip::testutil::build_zip(&[("a.txt", b"hello world")]);
        let source = crate::zip::testutil::MemorySource::new(bytes);
        let arc = archive::open(source.clone()).await.unwrap();
        let entry = arc.find_by_path("a.txt").unwrap();

        let data = extract_bytes(&source, entry).await.unwrap();
        assert_eq!(data, b"hello world");
    }

    #[tokio::test]
    async fn extract_stream_matches_extract_bytes_for_stored() {
        let (bytes, _) = crate::zip::testutil::build_zip(&[("a.txt", b"streamed content")]);
        let source = crate::zip::testutil::MemorySource::new(bytes);
        let arc = archive::open(source.clone()).await.unwrap();
        let entry = arc.find_by_path("a.txt").unwrap();

        let whole = extract_bytes(&source, entry).await.unwrap();
        let mut stream = extract_stream(&source, entry).await.unwrap();
        let mut collected = Vec::new();
        while let Some(chunk) = stream.next().await {
            collected.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(collected, whole);
    }

    #[tokio::test]
    async fn rejects_directory_extraction() {
        let (bytes, _) = crate::zip::testutil::build_zip(&[("dir/", b"")]);
        let source = crate::zip::testutil::MemorySource::new(bytes);
        let arc = archive::open(source.clone()).await.unwrap();
        let entry = arc.find_by_path("dir/").unwrap();

        let err = extract_bytes(&source, entry).await.unwrap_err();
        assert!(matches!(err, Error::InvalidOperation { .. }));
    }
}
