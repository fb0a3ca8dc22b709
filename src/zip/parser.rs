//! Low-level ZIP archive parsing: EOCD location, ZIP64 detection, and
//! Central Directory decoding.
//!
//! ZIP files are designed to be read from the end:
//! 1. Find the End of Central Directory (EOCD) at the file's tail.
//! 2. If ZIP64, read the ZIP64 EOCD for the authoritative entry count and
//!    Central Directory extents.
//! 3. Read the Central Directory to get metadata for every entry.
//! 4. For extraction, read each file's Local File Header to compute where
//!    its data actually starts.
//!
//! This approach is what makes Range-request archive exploration viable: the
//! entire listing is obtained from the archive's tail, never its body.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::io::RangeSource;

use super::structures::*;

/// Find and parse the End of Central Directory record.
///
/// Tries the common case first (no archive comment, EOCD is the last 22
/// bytes) before falling back to a backward scan over the maximum possible
/// comment size.
///
/// Returns the parsed EOCD and its absolute offset in the archive.
pub async fn find_eocd(source: &Arc<dyn RangeSource>) -> Result<(EndOfCentralDirectory, u64)> {
    let size = source.len();

    if size >= EOCD_SIZE as u64 {
        let offset = size - EOCD_SIZE as u64;
        let buf = source.read(offset, EOCD_SIZE as u64).await?;
        if buf[0..4] == EOCD_SIGNATURE && buf[20..22] == [0, 0] {
            return Ok((EndOfCentralDirectory::parse(&buf)?, offset));
        }
    }

    let search_size = (MAX_COMMENT_SIZE + EOCD_SIZE as u64).min(size);
    let search_start = size - search_size;
    let buf = source.read(search_start, search_size).await?;

    for i in (0..buf.len().saturating_sub(EOCD_SIZE)).rev() {
        if buf[i..i + 4] == EOCD_SIGNATURE {
            let comment_len = u16::from_le_bytes([buf[i + 20], buf[i + 21]]) as usize;
            if comment_len == buf.len() - i - EOCD_SIZE {
                let eocd = EndOfCentralDirectory::parse(&buf[i..i + EOCD_SIZE])?;
                return Ok((eocd, search_start + i as u64));
            }
        }
    }

    Err(Error::malformed(
        "End of Central Directory signature not found in archive trailer",
    ))
}

/// True iff the ZIP64 EOCD Locator signature is present immediately before
/// the EOCD offset.
pub async fn detect_zip64(source: &Arc<dyn RangeSource>, eocd_offset: u64) -> Result<bool> {
    if eocd_offset < ZIP64_EOCD_LOCATOR_SIZE as u64 {
        return Ok(false);
    }
    let locator_offset = eocd_offset - ZIP64_EOCD_LOCATOR_SIZE as u64;
    let buf = source.read(locator_offset, 4).await?;
    Ok(buf[0..4] == ZIP64_EOCD_LOCATOR_SIGNATURE)
}

/// Read the ZIP64 End of Central Directory record via its locator, which
/// sits immediately before the classic EOCD.
pub async fn read_zip64_eocd(source: &Arc<dyn RangeSource>, eocd_offset: u64) -> Result<Zip64Eocd> {
    let locator_offset = eocd_offset - ZIP64_EOCD_LOCATOR_SIZE as u64;
    let locator_buf = source.read(locator_offset, ZIP64_EOCD_LOCATOR_SIZE as u64).await?;
    let locator = Zip64EocdLocator::parse(&locator_buf)?;

    let eocd64_buf = source
        .read(locator.eocd64_offset, ZIP64_EOCD_MIN_SIZE as u64)
        .await?;
    Zip64Eocd::parse(&eocd64_buf)
}

/// Read and parse the Central Directory, returning entries in on-disk order.
pub async fn read_central_directory(
    source: &Arc<dyn RangeSource>,
    cd_offset: u64,
    cd_size: u64,
    total_entries: u64,
) -> Result<Vec<ZipEntry>> {
    let cd_data = source.read(cd_offset, cd_size).await?;
    let mut cursor = Cursor::new(&cd_data[..]);
    let mut entries = Vec::with_capacity(total_entries as usize);

    for index in 0..total_entries {
        let entry = parse_cdfh(&mut cursor)
            .map_err(|e| annotate(e, format!("decoding central directory entry {index}")))?;
        entries.push(entry);
    }

    Ok(entries)
}

fn annotate(err: Error, context: String) -> Error {
    match err {
        Error::MalformedArchive { message } => Error::malformed(format!("{context}: {message}")),
        other => other,
    }
}

/// Parse one Central Directory File Header from the cursor, advancing it
/// past the entry (including name, extra field, and comment).
fn parse_cdfh(cursor: &mut Cursor<&[u8]>) -> Result<ZipEntry> {
    let mut sig = [0u8; 4];
    cursor.read_exact(&mut sig)?;
    if sig != CDFH_SIGNATURE {
        return Err(Error::malformed("invalid Central Directory File Header signature"));
    }

    let _version_made_by = cursor.read_u16::<LittleEndian>()?;
    let _version_needed = cursor.read_u16::<LittleEndian>()?;
    let _flags = cursor.read_u16::<LittleEndian>()?;
    let compression_method = cursor.read_u16::<LittleEndian>()?;
    let last_mod_time = cursor.read_u16::<LittleEndian>()?;
    let last_mod_date = cursor.read_u16::<LittleEndian>()?;
    let _crc32 = cursor.read_u32::<LittleEndian>()?;
    let mut compressed_size = cursor.read_u32::<LittleEndian>()? as u64;
    let mut uncompressed_size = cursor.read_u32::<LittleEndian>()? as u64;
    let file_name_length = cursor.read_u16::<LittleEndian>()?;
    let extra_field_length = cursor.read_u16::<LittleEndian>()?;
    let file_comment_length = cursor.read_u16::<LittleEndian>()?;
    let _disk_number_start = cursor.read_u16::<LittleEndian>()?;
    let _internal_attrs = cursor.read_u16::<LittleEndian>()?;
    let _external_attrs = cursor.read_u32::<LittleEndian>()?;
    let mut header_offset = cursor.read_u32::<LittleEndian>()? as u64;

    let mut name_bytes = vec![0u8; file_name_length as usize];
    cursor.read_exact(&mut name_bytes)?;
    let path =
        String::from_utf8(name_bytes).map_err(|_| Error::malformed("entry name is not valid UTF-8"))?;
    let kind = if path.ends_with('/') {
        EntryKind::Directory
    } else {
        EntryKind::File
    };

    let extra_field_end = cursor.position() + extra_field_length as u64;
    while cursor.position() + 4 <= extra_field_end {
        let header_id = cursor.read_u16::<LittleEndian>()?;
        let field_size = cursor.read_u16::<LittleEndian>()?;
        let field_end = (cursor.position() + field_size as u64).min(extra_field_end);

        if header_id == ZIP64_EXTRA_ID {
            if uncompressed_size == 0xFFFFFFFF && cursor.position() + 8 <= field_end {
                uncompressed_size = cursor.read_u64::<LittleEndian>()?;
            }
            if compressed_size == 0xFFFFFFFF && cursor.position() + 8 <= field_end {
                compressed_size = cursor.read_u64::<LittleEndian>()?;
            }
            if header_offset == 0xFFFFFFFF && cursor.position() + 8 <= field_end {
                header_offset = cursor.read_u64::<LittleEndian>()?;
            }
        }
        cursor.set_position(field_end);
    }
    cursor.set_position(extra_field_end);
    cursor.set_position(cursor.position() + file_comment_length as u64);

    let date_time = decode_dos_datetime(last_mod_date, last_mod_time);

    Ok(ZipEntry {
        path,
        header_offset,
        compression_method,
        compressed_size,
        uncompressed_size,
        date_time,
        kind,
    })
}

/// Resolve the absolute offset where an entry's compressed data begins, by
/// reading its Local File Header (whose name/extra-field lengths can differ
/// from the Central Directory's).
pub async fn resolve_data_offset(source: &Arc<dyn RangeSource>, entry: &ZipEntry) -> Result<u64> {
    let lfh = source.read(entry.header_offset, LFH_SIZE as u64).await?;
    if lfh[0..4] != LFH_SIGNATURE {
        return Err(Error::malformed(format!(
            "invalid Local File Header signature for {}",
            entry.path
        )));
    }
    let mut cursor = Cursor::new(&lfh[..]);
    cursor.set_position(26);
    let name_len = cursor.read_u16::<LittleEndian>()? as u64;
    let extra_len = cursor.read_u16::<LittleEndian>()? as u64;
    Ok(entry.header_offset + LFH_SIZE as u64 + name_len + extra_len)
}
