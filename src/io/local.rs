//! Local filesystem byte source with random-access reads.
//!
//! Reads are dispatched to the blocking thread pool via
//! [`tokio::task::spawn_blocking`] so the async runtime is never blocked on
//! disk I/O, even though the underlying syscalls themselves are synchronous.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{self, StreamExt};

use super::{ByteStream, RangeSource};
use crate::error::{Error, Result};

/// Size of each chunk yielded by [`LocalSource::read_stream`].
const CHUNK_SIZE: u64 = 64 * 1024;

/// A byte source backed by a local file.
///
/// Uses platform-specific positioned reads so concurrent reads never race on
/// a shared file cursor:
/// - **Unix**: `pread(2)` via [`std::os::unix::fs::FileExt::read_at`], which
///   reads at an offset without touching the file position.
/// - **Windows**: seek + read on a duplicated handle, so the original
///   handle's position is untouched.
/// - **Other platforms**: falls back to seek + read (not safe under
///   concurrent access, but none of the platforms this crate targets land
///   here).
pub struct LocalSource {
    file: Arc<std::fs::File>,
    size: u64,
}

impl LocalSource {
    /// Open a local file as a byte source.
    ///
    /// Opens the file in read-only mode and caches its size for later use.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| {
            Error::source_unavailable(format!("opening {}: {e}", path.display()))
        })?;
        let size = file
            .metadata()
            .map_err(|e| Error::source_unavailable(format!("statting {}: {e}", path.display())))?
            .len();
        Ok(Self {
            file: Arc::new(file),
            size,
        })
    }

    fn read_at_sync(file: &std::fs::File, offset: u64, buf: &mut [u8]) -> std::io::Result<usize> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::FileExt;
            file.read_at(buf, offset)
        }

        #[cfg(windows)]
        {
            use std::io::{Read, Seek, SeekFrom};
            use std::os::windows::io::{AsRawHandle, FromRawHandle};
            // SAFETY: we construct a transient File over the same handle and
            // `forget` it below so the original owner's handle is never closed.
            let mut dup = unsafe { std::fs::File::from_raw_handle(file.as_raw_handle()) };
            dup.seek(SeekFrom::Start(offset))?;
            let n = dup.read(buf)?;
            std::mem::forget(dup);
            Ok(n)
        }

        #[cfg(not(any(unix, windows)))]
        {
            use std::io::{Read, Seek, SeekFrom};
            let mut file = file;
            file.seek(SeekFrom::Start(offset))?;
            file.read(buf)
        }
    }
}

#[async_trait]
impl RangeSource for LocalSource {
    fn len(&self) -> u64 {
        self.size
    }

    async fn read(&self, offset: u64, length: u64) -> Result<Bytes> {
        let file = self.file.clone();
        let n = length as usize;
        let bytes = tokio::task::spawn_blocking(move || -> Result<Vec<u8>> {
            let mut buf = vec![0u8; n];
            let mut filled = 0;
            while filled < n {
                let read = Self::read_at_sync(&file, offset + filled as u64, &mut buf[filled..])?;
                if read == 0 {
                    return Err(Error::malformed(format!(
                        "short read at offset {offset}: expected {n} bytes, got {filled}"
                    )));
                }
                filled += read;
            }
            Ok(buf)
        })
        .await
        .map_err(|e| Error::source_unavailable(format!("blocking read task failed: {e}")))??;
        Ok(Bytes::from(bytes))
    }

    async fn read_stream(&self, offset: u64, length: u64) -> Result<ByteStream> {
        enum State {
            Reading {
                file: Arc<std::fs::File>,
                offset: u64,
                remaining: u64,
            },
            Done,
        }

        let state = State::Reading {
            file: self.file.clone(),
            offset,
            remaining: length,
        };

        let stream = stream::unfold(state, |state| async move {
            let State::Reading {
                file,
                offset,
                remaining,
            } = state
            else {
                return None;
            };
            if remaining == 0 {
                return None;
            }

            let chunk_len = remaining.min(CHUNK_SIZE) as usize;
            let result = tokio::task::spawn_blocking({
                let file = file.clone();
                move || -> Result<Vec<u8>> {
                    let mut buf = vec![0u8; chunk_len];
                    let mut filled = 0;
                    while filled < chunk_len {
                        let read =
                            LocalSource::read_at_sync(&file, offset + filled as u64, &mut buf[filled..])?;
                        if read == 0 {
                            return Err(Error::malformed(format!(
                                "short read at offset {offset}: expected {chunk_len} bytes, got {filled}"
                            )));
                        }
                        filled += read;
                    }
                    Ok(buf)
                }
            })
            .await
            .map_err(|e| Error::source_unavailable(format!("blocking read task failed: {e}")));

            match result {
                Ok(Ok(buf)) => {
                    let next = State::Reading {
                        file,
                        offset: offset + chunk_len as u64,
                        remaining: remaining - chunk_len as u64,
                    };
                    Some((Ok(Bytes::from(buf)), next))
                }
                Ok(Err(e)) | Err(e) => Some((Err(e), State::Done)),
            }
        });
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn reads_exact_range() {
        let mut tmp = tempfile_with(b"hello world").await;
        let source = LocalSource::open(tmp_path(&mut tmp)).unwrap();
        assert_eq!(source.len(), 11);
        let bytes = source.read(6, 5).await.unwrap();
        assert_eq!(&bytes[..], b"world");
    }

    #[tokio::test]
    async fn read_stream_concatenates_to_full_read() {
        let data: Vec<u8> = (0..(CHUNK_SIZE * 3 + 17)).map(|i| (i % 256) as u8).collect();
        let mut tmp = tempfile_with(&data).await;
        let source = LocalSource::open(tmp_path(&mut tmp)).unwrap();

        let whole = source.read(0, data.len() as u64).await.unwrap();

        let mut stream = source.read_stream(0, data.len() as u64).await.unwrap();
        let mut collected = Vec::new();
        while let Some(chunk) = stream.next().await {
            collected.extend_from_slice(&chunk.unwrap());
        }

        assert_eq!(collected, whole.to_vec());
    }

    #[tokio::test]
    async fn short_read_is_malformed_archive() {
        let mut tmp = tempfile_with(b"short").await;
        let source = LocalSource::open(tmp_path(&mut tmp)).unwrap();
        let err = source.read(0, 100).await.unwrap_err();
        assert!(matches!(err, Error::MalformedArchive { .. }));
    }

    struct NamedTempFile {
        path: std::path::PathBuf,
    }

    impl Drop for NamedTempFile {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.path);
        }
    }

    async fn tempfile_with(data: &[u8]) -> NamedTempFile {
        let mut path = std::env::temp_dir();
        path.push(format!("rocrate-explorer-test-{}", uniq_id()));
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(data).unwrap();
        NamedTempFile { path }
    }

    fn tmp_path(t: &mut NamedTempFile) -> &Path {
        &t.path
    }

    fn uniq_id() -> u64 {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        COUNTER.fetch_add(1, Ordering::Relaxed) + ((std::process::id() as u64) << 32)
    }
}
