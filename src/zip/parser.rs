//! Central-directory decoding.
//!
//! The central directory is a contiguous run of per-entry records between
//! `cd_offset` and `cd_offset + cd_size`. Each record is a fixed 46-byte
//! header followed by three variable-length tails (file name, extra
//! fields, comment). The walk runs over a [`ForwardBuffer`] bounded by the
//! directory end, so a handful of coalesced positional reads cover the
//! whole directory even against a remote store.
//!
//! Two validations happen during the walk rather than after it:
//!
//! * ZIP64 merge: any 32-bit size/offset field equal to `0xFFFFFFFF` takes
//!   its real value from the ZIP64 extra field (id `0x0001`), in the fixed
//!   order uncompressed size, compressed size, local header offset.
//! * Overlap rejection: each record's claimed data range must be disjoint
//!   from every previously accepted one, which bounds total decompression
//!   work and defeats quoted-overlap zip bombs before any data is read.

use byteorder::{LittleEndian, ReadBytesExt};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;

use tracing::debug;

use crate::buffer::{BufferError, ForwardBuffer};
use crate::error::ZipError;
use crate::io::ReadAt;
use crate::ranges::RangeSet;

use super::structures::{
    CDFH_SIGNATURE, CDFH_SIZE, CentralDirectoryLocation, CompressionMethod, ZIP64_EXTRA_ID,
    ZIP64_SENTINEL, ZipEntry, dos_datetime,
};

/// Entries in central-directory order plus a name lookup index.
///
/// Duplicate names keep their first position in the order but carry the
/// later record's metadata.
pub(crate) struct EntryMap {
    pub entries: Vec<ZipEntry>,
    pub index: HashMap<String, usize>,
}

/// Decodes the whole central directory into an [`EntryMap`].
pub(crate) async fn parse_central_directory<R: ReadAt>(
    store: &Arc<R>,
    location: &CentralDirectoryLocation,
) -> Result<EntryMap, ZipError> {
    let limit = location
        .cd_offset
        .checked_add(location.cd_size)
        .ok_or(ZipError::InvalidCentralDirectory)?;
    let mut window = ForwardBuffer::new(Arc::clone(store), location.cd_offset, limit);

    let mut ranges = RangeSet::new();
    let mut entries: Vec<ZipEntry> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut records: u64 = 0;

    while window.position() < limit {
        let entry = parse_record(&mut window, records == 0).await?;

        if ranges.overlaps(entry.local_header_offset, entry.compressed_size) {
            return Err(ZipError::OverlappingEntries);
        }
        ranges.insert(entry.local_header_offset, entry.compressed_size);
        records += 1;

        match index.get(&entry.file_name) {
            Some(&at) => entries[at] = entry,
            None => {
                index.insert(entry.file_name.clone(), entries.len());
                entries.push(entry);
            }
        }
    }

    if records != location.total_entries {
        return Err(ZipError::InvalidCentralDirectory);
    }

    debug!(
        records,
        unique = entries.len(),
        cd_size = location.cd_size,
        "parsed central directory"
    );
    Ok(EntryMap { entries, index })
}

/// Decodes one central-directory record and advances the window past it.
async fn parse_record<R: ReadAt>(
    window: &mut ForwardBuffer<R>,
    first: bool,
) -> Result<ZipEntry, ZipError> {
    let header = next(window, CDFH_SIZE).await?;

    if &header[0..4] != CDFH_SIGNATURE {
        // A bad signature on the very first record means the EOCD pointed
        // somewhere that is not a central directory at all.
        return Err(if first {
            ZipError::InvalidCdFileHeader
        } else {
            ZipError::InvalidCentralDirectory
        });
    }

    let raw = RawRecord::decode(&header).map_err(|_| ZipError::InvalidCentralDirectory)?;
    advance(window, CDFH_SIZE)?;

    let name_bytes = next(window, raw.file_name_length as usize).await?;
    advance(window, raw.file_name_length as usize)?;
    let extra = next(window, raw.extra_field_length as usize).await?;
    advance(window, raw.extra_field_length as usize)?;
    next(window, raw.comment_length as usize).await?;
    advance(window, raw.comment_length as usize)?;

    let file_name = String::from_utf8_lossy(&name_bytes).to_string();

    let mut compressed_size = raw.compressed_size as u64;
    let mut uncompressed_size = raw.uncompressed_size as u64;
    let mut local_header_offset = raw.local_header_offset as u64;

    if raw.compressed_size == ZIP64_SENTINEL
        || raw.uncompressed_size == ZIP64_SENTINEL
        || raw.local_header_offset == ZIP64_SENTINEL
    {
        merge_zip64_extra(
            &extra,
            &mut uncompressed_size,
            &mut compressed_size,
            &mut local_header_offset,
        )?;
    }

    // A range past u64::MAX cannot describe real bytes.
    local_header_offset
        .checked_add(compressed_size)
        .ok_or(ZipError::InvalidCentralDirectory)?;

    Ok(ZipEntry {
        file_name,
        bit_flag: raw.bit_flag,
        compression_method: CompressionMethod::from_u16(raw.compression_method),
        last_modified: dos_datetime(raw.last_mod_date, raw.last_mod_time),
        crc32: raw.crc32,
        compressed_size,
        uncompressed_size,
        local_header_offset,
    })
}

/// Fixed 46-byte header fields, still in their on-disk widths.
struct RawRecord {
    bit_flag: u16,
    compression_method: u16,
    last_mod_time: u16,
    last_mod_date: u16,
    crc32: u32,
    compressed_size: u32,
    uncompressed_size: u32,
    file_name_length: u16,
    extra_field_length: u16,
    comment_length: u16,
    local_header_offset: u32,
}

impl RawRecord {
    fn decode(header: &[u8]) -> std::io::Result<Self> {
        let mut cursor = Cursor::new(&header[4..]);
        let _version_made_by = cursor.read_u16::<LittleEndian>()?;
        let _version_needed = cursor.read_u16::<LittleEndian>()?;
        let bit_flag = cursor.read_u16::<LittleEndian>()?;
        let compression_method = cursor.read_u16::<LittleEndian>()?;
        let last_mod_time = cursor.read_u16::<LittleEndian>()?;
        let last_mod_date = cursor.read_u16::<LittleEndian>()?;
        let crc32 = cursor.read_u32::<LittleEndian>()?;
        let compressed_size = cursor.read_u32::<LittleEndian>()?;
        let uncompressed_size = cursor.read_u32::<LittleEndian>()?;
        let file_name_length = cursor.read_u16::<LittleEndian>()?;
        let extra_field_length = cursor.read_u16::<LittleEndian>()?;
        let comment_length = cursor.read_u16::<LittleEndian>()?;
        let _disk_number_start = cursor.read_u16::<LittleEndian>()?;
        let _internal_attrs = cursor.read_u16::<LittleEndian>()?;
        let _external_attrs = cursor.read_u32::<LittleEndian>()?;
        let local_header_offset = cursor.read_u32::<LittleEndian>()?;

        Ok(Self {
            bit_flag,
            compression_method,
            last_mod_time,
            last_mod_date,
            crc32,
            compressed_size,
            uncompressed_size,
            file_name_length,
            extra_field_length,
            comment_length,
            local_header_offset,
        })
    }
}

/// Walks the extra-field TLVs and substitutes the 64-bit overrides for any
/// field still holding the sentinel. The ZIP64 record carries only the
/// overridden fields, always in the order uncompressed size, compressed
/// size, local header offset.
fn merge_zip64_extra(
    extra: &[u8],
    uncompressed_size: &mut u64,
    compressed_size: &mut u64,
    local_header_offset: &mut u64,
) -> Result<(), ZipError> {
    let mut pos = 0usize;

    while pos + 4 <= extra.len() {
        let id = u16::from_le_bytes([extra[pos], extra[pos + 1]]);
        let size = u16::from_le_bytes([extra[pos + 2], extra[pos + 3]]) as usize;
        pos += 4;

        let data = extra
            .get(pos..pos + size)
            .ok_or(ZipError::InvalidCentralDirectory)?;

        if id == ZIP64_EXTRA_ID {
            let mut cursor = Cursor::new(data);
            let sentinel = ZIP64_SENTINEL as u64;
            for field in [uncompressed_size, compressed_size, local_header_offset] {
                if *field == sentinel {
                    *field = cursor
                        .read_u64::<LittleEndian>()
                        .map_err(|_| ZipError::InvalidCentralDirectory)?;
                }
            }
            return Ok(());
        }

        pos += size;
    }

    // A sentinel with no ZIP64 record to resolve it.
    Err(ZipError::InvalidCentralDirectory)
}

async fn next<R: ReadAt>(window: &mut ForwardBuffer<R>, n: usize) -> Result<Vec<u8>, ZipError> {
    match window.next_chunk(n).await {
        Ok(bytes) => Ok(bytes),
        Err(BufferError::Adapter(e)) => Err(ZipError::Adapter(e)),
        // The directory ended mid-record.
        Err(_) => Err(ZipError::InvalidCentralDirectory),
    }
}

fn advance<R: ReadAt>(window: &mut ForwardBuffer<R>, k: usize) -> Result<(), ZipError> {
    match window.move_forward_by(k) {
        Ok(()) => Ok(()),
        Err(BufferError::Adapter(e)) => Err(ZipError::Adapter(e)),
        Err(_) => Err(ZipError::InvalidCentralDirectory),
    }
}
