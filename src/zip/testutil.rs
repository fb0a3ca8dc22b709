//! In-memory archive fixtures and a `RangeSource` backed by a `Vec<u8>`,
//! used by unit tests across this crate. No binary ZIP fixtures ship with
//! this crate; every test archive is synthesized on the fly.

#![cfg(test)]

use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream;

use crate::error::Result;
use crate::io::{ByteStream, RangeSource};

/// A `RangeSource` over an in-memory buffer, for tests that need a
/// `RangeSource` without touching the filesystem or network.
pub struct MemorySource {
    data: Bytes,
}

impl MemorySource {
    pub fn new(data: Vec<u8>) -> Arc<dyn RangeSource> {
        Arc::new(Self { data: Bytes::from(data) })
    }
}

#[async_trait]
impl RangeSource for MemorySource {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    async fn read(&self, offset: u64, length: u64) -> Result<Bytes> {
        let start = offset as usize;
        let end = start + length as usize;
        Ok(self.data.slice(start..end))
    }

    async fn read_stream(&self, offset: u64, length: u64) -> Result<ByteStream> {
        let chunk = self.read(offset, length).await?;
        Ok(Box::pin(stream::once(async move { Ok(chunk) })))
    }
}

fn dos_date_time() -> (u16, u16) {
    // 2024-01-01 00:00:00: year 44 (1980+44), month 1, day 1; time all zero.
    let date = (44u16 << 9) | (1 << 5) | 1;
    (date, 0)
}

/// Build a minimal, well-formed (non-ZIP64) ZIP archive in memory from a list
/// of `(path, content)` pairs. Paths ending in `/` are written as directory
/// entries with no data. Returns the archive bytes and the list of paths in
/// on-disk order.
pub fn build_zip(files: &[(&str, &[u8])]) -> (Vec<u8>, Vec<String>) {
    let mut out = Vec::new();
    let mut central = Vec::new();
    let (date, time) = dos_date_time();
    let mut names = Vec::new();

    for (path, content) in files {
        names.push(path.to_string());
        let is_dir = path.ends_with('/');
        let data: &[u8] = if is_dir { b"" } else { content };
        let local_header_offset = out.len() as u32;

        out.write_all(&[0x50, 0x4b, 0x03, 0x04]).unwrap();
        out.write_all(&20u16.to_le_bytes()).unwrap(); // version needed
        out.write_all(&0u16.to_le_bytes()).unwrap(); // flags
        out.write_all(&0u16.to_le_bytes()).unwrap(); // method: stored
        out.write_all(&time.to_le_bytes()).unwrap();
        out.write_all(&date.to_le_bytes()).unwrap();
        out.write_all(&crc32(data).to_le_bytes()).unwrap();
        out.write_all(&(data.len() as u32).to_le_bytes()).unwrap(); // compressed
        out.write_all(&(data.len() as u32).to_le_bytes()).unwrap(); // uncompressed
        out.write_all(&(path.len() as u16).to_le_bytes()).unwrap();
        out.write_all(&0u16.to_le_bytes()).unwrap(); // extra len
        out.write_all(path.as_bytes()).unwrap();
        out.write_all(data).unwrap();

        central.write_all(&[0x50, 0x4b, 0x01, 0x02]).unwrap();
        central.write_all(&20u16.to_le_bytes()).unwrap(); // version made by
        central.write_all(&20u16.to_le_bytes()).unwrap(); // version needed
        central.write_all(&0u16.to_le_bytes()).unwrap(); // flags
        central.write_all(&0u16.to_le_bytes()).unwrap(); // method
        central.write_all(&time.to_le_bytes()).unwrap();
        central.write_all(&date.to_le_bytes()).unwrap();
        central.write_all(&crc32(data).to_le_bytes()).unwrap();
        central.write_all(&(data.len() as u32).to_le_bytes()).unwrap();
        central.write_all(&(data.len() as u32).to_le_bytes()).unwrap();
        central.write_all(&(path.len() as u16).to_le_bytes()).unwrap();
        central.write_all(&0u16.to_le_bytes()).unwrap(); // extra len
        central.write_all(&0u16.to_le_bytes()).unwrap(); // comment len
        central.write_all(&0u16.to_le_bytes()).unwrap(); // disk number start
        central.write_all(&0u16.to_le_bytes()).unwrap(); // internal attrs
        central.write_all(&0u32.to_le_bytes()).unwrap(); // external attrs
        central.write_all(&local_header_offset.to_le_bytes()).unwrap();
        central.write_all(path.as_bytes()).unwrap();
    }

    let cd_offset = out.len() as u32;
    let cd_size = central.len() as u32;
    out.extend_from_slice(&central);

    out.write_all(&[0x50, 0x4b, 0x05, 0x06]).unwrap();
    out.write_all(&0u16.to_le_bytes()).unwrap(); // disk number
    out.write_all(&0u16.to_le_bytes()).unwrap(); // disk with cd
    out.write_all(&(files.len() as u16).to_le_bytes()).unwrap();
    out.write_all(&(files.len() as u16).to_le_bytes()).unwrap();
    out.write_all(&cd_size.to_le_bytes()).unwrap();
    out.write_all(&cd_offset.to_le_bytes()).unwrap();
    out.write_all(&0u16.to_le_bytes()).unwrap(); // comment len

    (out, names)
}

fn crc32(data: &[u8]) -> u32 {
    // This crate does not verify CRC-32 on extraction (see Non-goals); the
    // synthesized fixtures still compute it so a real unzip tool could check
    // them. A small table-free bit-at-a-time implementation avoids pulling a
    // CRC dependency in just for test fixtures.
    let mut crc: u32 = 0xFFFFFFFF;
    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (0xEDB88320 & mask);
        }
    }
    !crc
}
