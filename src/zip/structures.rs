use byteorder::{LittleEndian, ReadBytesExt};
use chrono::{NaiveDate, NaiveDateTime};
use std::io::Cursor;

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }
}

/// Central directory location, normalised to 64-bit quantities whether it
/// came from the classic EOCD or the ZIP64 one.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CentralDirectoryLocation {
    pub total_entries: u64,
    pub cd_size: u64,
    pub cd_offset: u64,
}

/// End of Central Directory (EOCD) - 22 bytes plus trailing comment
pub(crate) struct EndOfCentralDirectory {
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;

    /// Decodes the fixed trailer if the signature matches.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < Self::SIZE || &data[0..4] != Self::SIGNATURE {
            return None;
        }

        let mut cursor = Cursor::new(&data[10..]);
        let total_entries = cursor.read_u16::<LittleEndian>().ok()?;
        let cd_size = cursor.read_u32::<LittleEndian>().ok()?;
        let cd_offset = cursor.read_u32::<LittleEndian>().ok()?;
        let comment_len = cursor.read_u16::<LittleEndian>().ok()?;

        Some(Self {
            total_entries,
            cd_size,
            cd_offset,
            comment_len,
        })
    }

    pub fn location(&self) -> CentralDirectoryLocation {
        CentralDirectoryLocation {
            total_entries: self.total_entries as u64,
            cd_size: self.cd_size as u64,
            cd_offset: self.cd_offset as u64,
        }
    }
}

/// ZIP64 End of Central Directory Locator - 20 bytes
pub(crate) struct Zip64EocdLocator {
    pub eocd64_offset: u64,
}

impl Zip64EocdLocator {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x07";
    pub const SIZE: usize = 20;

    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < Self::SIZE || &data[0..4] != Self::SIGNATURE {
            return None;
        }

        // signature(4) disk_with_eocd64(4) eocd64_offset(8) total_disks(4)
        let mut cursor = Cursor::new(&data[8..]);
        let eocd64_offset = cursor.read_u64::<LittleEndian>().ok()?;

        Some(Self { eocd64_offset })
    }
}

/// ZIP64 End of Central Directory - 56 bytes minimum
pub(crate) struct Zip64Eocd {
    pub total_entries: u64,
    pub cd_size: u64,
    pub cd_offset: u64,
}

impl Zip64Eocd {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x06";
    pub const SIZE: usize = 56;

    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < Self::SIZE || &data[0..4] != Self::SIGNATURE {
            return None;
        }

        // signature(4) record_size(8) versions(4) disk_numbers(8)
        // disk_entries(8) total_entries(8) cd_size(8) cd_offset(8)
        let mut cursor = Cursor::new(&data[32..]);
        let total_entries = cursor.read_u64::<LittleEndian>().ok()?;
        let cd_size = cursor.read_u64::<LittleEndian>().ok()?;
        let cd_offset = cursor.read_u64::<LittleEndian>().ok()?;

        Some(Self {
            total_entries,
            cd_size,
            cd_offset,
        })
    }

    pub fn location(&self) -> CentralDirectoryLocation {
        CentralDirectoryLocation {
            total_entries: self.total_entries,
            cd_size: self.cd_size,
            cd_offset: self.cd_offset,
        }
    }
}

/// Central Directory File Header (CDFH) - 46 bytes plus name/extra/comment
pub(crate) const CDFH_SIGNATURE: &[u8] = b"PK\x01\x02";
pub(crate) const CDFH_SIZE: usize = 46;

/// Local File Header (LFH) - 30 bytes plus name/extra
pub(crate) const LFH_SIGNATURE: &[u8] = b"PK\x03\x04";
pub(crate) const LFH_SIZE: usize = 30;

/// ZIP64 extended-information extra field id
pub(crate) const ZIP64_EXTRA_ID: u16 = 0x0001;

/// The 32-bit sentinel signalling that a field's real value lives in the
/// ZIP64 extra field.
pub(crate) const ZIP64_SENTINEL: u32 = 0xFFFF_FFFF;

/// Decodes an MS-DOS date/time pair into a calendar datetime.
///
/// Date packs `year-1980 | month | day` into 7+4+5 bits, time packs
/// `hour | minute | second/2` into 5+6+5 bits. Values that do not form a
/// real calendar date (month 0, hour 31, ...) yield `None`; the entry
/// itself stays usable.
pub(crate) fn dos_datetime(date: u16, time: u16) -> Option<NaiveDateTime> {
    let day = (date & 0x1F) as u32;
    let month = ((date >> 5) & 0x0F) as u32;
    let year = ((date >> 9) & 0x7F) as i32 + 1980;

    let second = ((time & 0x1F) * 2) as u32;
    let minute = ((time >> 5) & 0x3F) as u32;
    let hour = ((time >> 11) & 0x1F) as u32;

    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)
}

/// Parsed ZIP entry metadata.
///
/// Produced once per central-directory record during
/// [`ZipArchive::open`](crate::ZipArchive::open); the sizes and offset are
/// the post-ZIP64-merge 64-bit values. File names are the raw stored bytes
/// decoded with `String::from_utf8_lossy`, regardless of the
/// general-purpose UTF-8 flag.
#[derive(Debug, Clone)]
pub struct ZipEntry {
    pub(crate) file_name: String,
    pub(crate) bit_flag: u16,
    pub(crate) compression_method: CompressionMethod,
    pub(crate) last_modified: Option<NaiveDateTime>,
    pub(crate) crc32: u32,
    pub(crate) compressed_size: u64,
    pub(crate) uncompressed_size: u64,
    pub(crate) local_header_offset: u64,
}

impl ZipEntry {
    /// Entry name as stored in the archive, `/`-separated.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Modification timestamp, if the stored DOS date/time was a valid
    /// calendar value.
    pub fn last_modified(&self) -> Option<NaiveDateTime> {
        self.last_modified
    }

    /// Size of the entry's data as stored in the archive.
    pub fn compressed_size(&self) -> u64 {
        self.compressed_size
    }

    /// Size of the entry's data after decompression.
    pub fn uncompressed_size(&self) -> u64 {
        self.uncompressed_size
    }

    /// Compression method recorded in the central directory.
    pub fn compression_method(&self) -> CompressionMethod {
        self.compression_method
    }

    /// Directory entries are named with a trailing `/` and carry no data.
    pub fn is_directory(&self) -> bool {
        self.file_name.ends_with('/')
    }

    /// Raw general-purpose bit flags. Bit 11 marks the name as UTF-8.
    pub fn bit_flag(&self) -> u16 {
        self.bit_flag
    }
}
