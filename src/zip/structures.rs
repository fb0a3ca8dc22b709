//! ZIP wire-format structures: EOCD, ZIP64 EOCD locator/record, and the
//! parsed per-entry record exposed to callers.
//!
//! ## ZIP file layout
//!
//! ```text
//! [Local File Header 1] [File Data 1]
//! [Local File Header 2] [File Data 2]
//! ...
//! [Central Directory File Header 1]
//! [Central Directory File Header 2]
//! ...
//! [ZIP64 End of Central Directory Record] (optional)
//! [ZIP64 End of Central Directory Locator] (optional)
//! [End of Central Directory Record]
//! ```

use byteorder::{LittleEndian, ReadBytesExt};
use chrono::NaiveDateTime;
use std::io::Cursor;

use crate::error::{Error, Result};

/// End of Central Directory signature: `PK\x05\x06`.
pub const EOCD_SIGNATURE: [u8; 4] = [0x50, 0x4b, 0x05, 0x06];
/// ZIP64 End of Central Directory Locator signature: `PK\x06\x07`.
pub const ZIP64_EOCD_LOCATOR_SIGNATURE: [u8; 4] = [0x50, 0x4b, 0x06, 0x07];
/// ZIP64 End of Central Directory Record signature: `PK\x06\x06`.
pub const ZIP64_EOCD_SIGNATURE: [u8; 4] = [0x50, 0x4b, 0x06, 0x06];
/// Central Directory File Header signature: `PK\x01\x02`.
pub const CDFH_SIGNATURE: [u8; 4] = [0x50, 0x4b, 0x01, 0x02];
/// Local File Header signature: `PK\x03\x04`.
pub const LFH_SIGNATURE: [u8; 4] = [0x50, 0x4b, 0x03, 0x04];

/// Fixed size of the End of Central Directory record, excluding the comment.
pub const EOCD_SIZE: usize = 22;
/// Size of the ZIP64 End of Central Directory Locator.
pub const ZIP64_EOCD_LOCATOR_SIZE: usize = 20;
/// Minimum size of the ZIP64 End of Central Directory Record.
pub const ZIP64_EOCD_MIN_SIZE: usize = 56;
/// Fixed size of the Local File Header, excluding name and extra field.
pub const LFH_SIZE: usize = 30;
/// ZIP64 extra-field header id.
pub const ZIP64_EXTRA_ID: u16 = 0x0001;
/// Maximum ZIP comment size allowed by the format.
pub const MAX_COMMENT_SIZE: u64 = 65535;

/// End of Central Directory record.
#[derive(Debug, Clone)]
pub struct EndOfCentralDirectory {
    pub disk_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
}

impl EndOfCentralDirectory {
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < EOCD_SIZE || data[0..4] != EOCD_SIGNATURE {
            return Err(Error::malformed("invalid End of Central Directory record"));
        }
        let mut cursor = Cursor::new(&data[4..]);
        let _disk_number = cursor.read_u16::<LittleEndian>()?;
        let _disk_with_cd = cursor.read_u16::<LittleEndian>()?;
        let disk_entries = cursor.read_u16::<LittleEndian>()?;
        let total_entries = cursor.read_u16::<LittleEndian>()?;
        let cd_size = cursor.read_u32::<LittleEndian>()?;
        let cd_offset = cursor.read_u32::<LittleEndian>()?;
        Ok(Self {
            disk_entries,
            total_entries,
            cd_size,
            cd_offset,
        })
    }

    /// True when any field overflowed into its ZIP64 sentinel value.
    pub fn needs_zip64(&self) -> bool {
        self.disk_entries == 0xFFFF
            || self.total_entries == 0xFFFF
            || self.cd_size == 0xFFFFFFFF
            || self.cd_offset == 0xFFFFFFFF
    }
}

/// ZIP64 End of Central Directory Locator: sits 20 bytes before the EOCD.
#[derive(Debug, Clone)]
pub struct Zip64EocdLocator {
    pub eocd64_offset: u64,
}

impl Zip64EocdLocator {
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < ZIP64_EOCD_LOCATOR_SIZE || data[0..4] != ZIP64_EOCD_LOCATOR_SIGNATURE {
            return Err(Error::malformed("invalid ZIP64 End of Central Directory Locator"));
        }
        let mut cursor = Cursor::new(&data[4..]);
        let _disk_with_eocd64 = cursor.read_u32::<LittleEndian>()?;
        let eocd64_offset = cursor.read_u64::<LittleEndian>()?;
        Ok(Self { eocd64_offset })
    }
}

/// ZIP64 End of Central Directory Record.
#[derive(Debug, Clone)]
pub struct Zip64Eocd {
    pub total_entries: u64,
    pub cd_size: u64,
    pub cd_offset: u64,
}

impl Zip64Eocd {
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < ZIP64_EOCD_MIN_SIZE || data[0..4] != ZIP64_EOCD_SIGNATURE {
            return Err(Error::malformed("invalid ZIP64 End of Central Directory record"));
        }
        let mut cursor = Cursor::new(&data[4..]);
        let _eocd64_size = cursor.read_u64::<LittleEndian>()?;
        let _version_made_by = cursor.read_u16::<LittleEndian>()?;
        let _version_needed = cursor.read_u16::<LittleEndian>()?;
        let _disk_number = cursor.read_u32::<LittleEndian>()?;
        let _disk_with_cd = cursor.read_u32::<LittleEndian>()?;
        let _disk_entries = cursor.read_u64::<LittleEndian>()?;
        let total_entries = cursor.read_u64::<LittleEndian>()?;
        let cd_size = cursor.read_u64::<LittleEndian>()?;
        let cd_offset = cursor.read_u64::<LittleEndian>()?;
        Ok(Self {
            total_entries,
            cd_size,
            cd_offset,
        })
    }
}

/// Whether an entry represents a file or a directory.
///
/// Distinguished solely by whether the stored path ends with `/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// A parsed Central Directory entry describing one archive member.
#[derive(Debug, Clone)]
pub struct ZipEntry {
    /// Decoded member path (UTF-8), used as the entry's identifier.
    pub path: String,
    /// Absolute offset of the Local File Header in the archive.
    pub header_offset: u64,
    /// 0 = stored, 8 = DEFLATE-raw; other values fail only at extract time.
    pub compression_method: u16,
    /// Bytes to read starting after the local header.
    pub compressed_size: u64,
    /// Expected decompressed output size.
    pub uncompressed_size: u64,
    /// Decoded modification timestamp (DOS date-time, no timezone).
    pub date_time: NaiveDateTime,
    /// `File` or `Directory`.
    pub kind: EntryKind,
}

impl ZipEntry {
    /// True iff `compressed_size` differs from `uncompressed_size`.
    pub fn is_compressed(&self) -> bool {
        self.compressed_size != self.uncompressed_size
    }

    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }
}

/// Decode a DOS-encoded `(date, time)` pair into a calendar moment.
///
/// Bit layout, LSB to MSB:
/// - time: seconds/2 (5b), minutes (6b), hours (5b)
/// - date: day (5b), month (4b), year (7b, offset by 1980)
///
/// Archives occasionally carry an all-zero or otherwise invalid timestamp
/// (month 0, day 0); rather than treat that as a malformed archive, this
/// clamps to the nearest valid date so a bad timestamp never fails `open`.
pub fn decode_dos_datetime(date: u16, time: u16) -> NaiveDateTime {
    let seconds = ((time & 0x1F) as u32) * 2;
    let minutes = ((time >> 5) & 0x3F) as u32;
    let hours = ((time >> 11) & 0x1F) as u32;

    let day = (date & 0x1F) as u32;
    let month = ((date >> 5) & 0x0F) as u32;
    let year = (((date >> 9) & 0x7F) as i32) + 1980;

    let date = chrono::NaiveDate::from_ymd_opt(year, month.max(1), day.max(1))
        .or_else(|| chrono::NaiveDate::from_ymd_opt(year, 1, 1))
        .expect("year 1980 is always a valid calendar year");
    let time = chrono::NaiveTime::from_hms_opt(hours.min(23), minutes.min(59), seconds.min(59))
        .unwrap_or_else(|| chrono::NaiveTime::from_hms_opt(0, 0, 0).unwrap());
    NaiveDateTime::new(date, time)
}
