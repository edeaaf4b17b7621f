//! Shared test utilities for integration tests.
//!
//! Builds ZIP archives in memory, byte by byte, so tests control every
//! field the reader looks at, including deliberately broken ones.
//!
//! Note: `#![allow(dead_code)]` is required because each integration test
//! file compiles as a separate crate and may only use a subset of these
//! helpers.

#![allow(dead_code)]

use flate2::Compression;
use flate2::write::DeflateEncoder;
use std::io::Write;

const LFH_SIGNATURE: &[u8] = b"PK\x03\x04";
const CDFH_SIGNATURE: &[u8] = b"PK\x01\x02";
const EOCD_SIGNATURE: &[u8] = b"PK\x05\x06";
const ZIP64_EOCD_SIGNATURE: &[u8] = b"PK\x06\x06";
const ZIP64_LOCATOR_SIGNATURE: &[u8] = b"PK\x06\x07";
const SENTINEL32: u32 = 0xFFFF_FFFF;

/// 2024-05-20 in DOS date encoding.
pub const DOS_DATE: u16 = ((2024 - 1980) << 9) | (5 << 5) | 20;
/// 10:30:44 in DOS time encoding.
pub const DOS_TIME: u16 = (10 << 11) | (30 << 5) | (44 / 2);

/// Raw-deflates `data` the way a ZIP writer would (no zlib wrapper).
pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

struct Record {
    name: String,
    method: u16,
    crc: u32,
    compressed_size: u64,
    uncompressed_size: u64,
    offset: u64,
    /// Write sentinel size/offset fields plus a ZIP64 extra field.
    zip64: bool,
}

/// Incremental in-memory ZIP writer covering exactly the shapes the reader
/// consumes: STORED and DEFLATE entries, trailing comments, ZIP64 records,
/// and catalogue-only records for malformed-archive tests.
pub struct ArchiveBuilder {
    data: Vec<u8>,
    records: Vec<Record>,
    comment: Vec<u8>,
    force_zip64: bool,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            records: Vec::new(),
            comment: Vec::new(),
            force_zip64: false,
        }
    }

    /// Sets the archive comment that follows the EOCD record.
    pub fn comment(&mut self, comment: &[u8]) -> &mut Self {
        self.comment = comment.to_vec();
        self
    }

    /// Forces the ZIP64 EOCD + locator pair even when nothing needs it.
    pub fn force_zip64(&mut self) -> &mut Self {
        self.force_zip64 = true;
        self
    }

    pub fn add_stored(&mut self, name: &str, data: &[u8]) -> &mut Self {
        self.add_raw(name, 0, data, crc32fast::hash(data), data.len() as u64, false)
    }

    pub fn add_deflated(&mut self, name: &str, data: &[u8]) -> &mut Self {
        let compressed = deflate(data);
        self.add_raw(
            name,
            8,
            &compressed,
            crc32fast::hash(data),
            data.len() as u64,
            false,
        )
    }

    /// Directory entries carry a trailing slash and no data.
    pub fn add_directory(&mut self, name: &str) -> &mut Self {
        self.add_stored(name, b"")
    }

    /// Like [`add_stored`](Self::add_stored)/[`add_deflated`](Self::add_deflated)
    /// but with every recorded field under test control.
    pub fn add_raw(
        &mut self,
        name: &str,
        method: u16,
        payload: &[u8],
        crc: u32,
        uncompressed_size: u64,
        zip64: bool,
    ) -> &mut Self {
        let offset = self.data.len() as u64;
        self.write_local_header(name, method, crc, payload.len() as u64, uncompressed_size);
        self.data.extend_from_slice(payload);

        self.records.push(Record {
            name: name.to_string(),
            method,
            crc,
            compressed_size: payload.len() as u64,
            uncompressed_size,
            offset,
            zip64,
        });
        self
    }

    /// Adds a central-directory record whose data range duplicates an
    /// existing entry's, as overlap bombs do. No local header is written.
    pub fn add_alias(&mut self, name: &str, of: &str) -> &mut Self {
        let source = self
            .records
            .iter()
            .find(|r| r.name == of)
            .expect("alias source must exist");
        let record = Record {
            name: name.to_string(),
            method: source.method,
            crc: source.crc,
            compressed_size: source.compressed_size,
            uncompressed_size: source.uncompressed_size,
            offset: source.offset,
            zip64: source.zip64,
        };
        self.records.push(record);
        self
    }

    /// Adds a catalogue-only record pointing at arbitrary coordinates.
    /// Useful for metadata-shape tests and for ranges that overlap real
    /// entries.
    pub fn add_phantom(
        &mut self,
        name: &str,
        compressed_size: u64,
        uncompressed_size: u64,
        offset: u64,
        zip64: bool,
    ) -> &mut Self {
        self.records.push(Record {
            name: name.to_string(),
            method: 8,
            crc: 0,
            compressed_size,
            uncompressed_size,
            offset,
            zip64,
        });
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = self.data.clone();
        let cd_offset = out.len() as u64;

        for record in &self.records {
            self.write_cd_record(&mut out, record);
        }
        let cd_size = out.len() as u64 - cd_offset;

        let zip64 = self.force_zip64 || self.records.len() > 0xFFFF;
        if zip64 {
            let eocd64_offset = out.len() as u64;
            // ZIP64 EOCD
            out.extend_from_slice(ZIP64_EOCD_SIGNATURE);
            out.extend_from_slice(&44u64.to_le_bytes()); // size of remainder
            out.extend_from_slice(&45u16.to_le_bytes()); // version made by
            out.extend_from_slice(&45u16.to_le_bytes()); // version needed
            out.extend_from_slice(&0u32.to_le_bytes()); // disk number
            out.extend_from_slice(&0u32.to_le_bytes()); // disk with cd
            out.extend_from_slice(&(self.records.len() as u64).to_le_bytes());
            out.extend_from_slice(&(self.records.len() as u64).to_le_bytes());
            out.extend_from_slice(&cd_size.to_le_bytes());
            out.extend_from_slice(&cd_offset.to_le_bytes());
            // ZIP64 EOCD locator
            out.extend_from_slice(ZIP64_LOCATOR_SIGNATURE);
            out.extend_from_slice(&0u32.to_le_bytes()); // disk with eocd64
            out.extend_from_slice(&eocd64_offset.to_le_bytes());
            out.extend_from_slice(&1u32.to_le_bytes()); // total disks
        }

        // Classic EOCD, sentinelled when ZIP64 speaks for the archive.
        out.extend_from_slice(EOCD_SIGNATURE);
        out.extend_from_slice(&0u16.to_le_bytes()); // disk number
        out.extend_from_slice(&0u16.to_le_bytes()); // disk with cd
        let entries16 = if zip64 {
            0xFFFFu16
        } else {
            self.records.len() as u16
        };
        out.extend_from_slice(&entries16.to_le_bytes());
        out.extend_from_slice(&entries16.to_le_bytes());
        let cd_size32 = if zip64 { SENTINEL32 } else { cd_size as u32 };
        let cd_offset32 = if zip64 { SENTINEL32 } else { cd_offset as u32 };
        out.extend_from_slice(&cd_size32.to_le_bytes());
        out.extend_from_slice(&cd_offset32.to_le_bytes());
        out.extend_from_slice(&(self.comment.len() as u16).to_le_bytes());
        out.extend_from_slice(&self.comment);

        out
    }

    fn write_local_header(
        &mut self,
        name: &str,
        method: u16,
        crc: u32,
        compressed_size: u64,
        uncompressed_size: u64,
    ) {
        self.data.extend_from_slice(LFH_SIGNATURE);
        self.data.extend_from_slice(&20u16.to_le_bytes()); // version needed
        self.data.extend_from_slice(&0u16.to_le_bytes()); // flags
        self.data.extend_from_slice(&method.to_le_bytes());
        self.data.extend_from_slice(&DOS_TIME.to_le_bytes());
        self.data.extend_from_slice(&DOS_DATE.to_le_bytes());
        self.data.extend_from_slice(&crc.to_le_bytes());
        self.data
            .extend_from_slice(&(compressed_size as u32).to_le_bytes());
        self.data
            .extend_from_slice(&(uncompressed_size as u32).to_le_bytes());
        self.data
            .extend_from_slice(&(name.len() as u16).to_le_bytes());
        self.data.extend_from_slice(&0u16.to_le_bytes()); // extra len
        self.data.extend_from_slice(name.as_bytes());
    }

    fn write_cd_record(&self, out: &mut Vec<u8>, record: &Record) {
        let mut extra = Vec::new();
        let (compressed32, uncompressed32, offset32) = if record.zip64 {
            extra.extend_from_slice(&0x0001u16.to_le_bytes());
            extra.extend_from_slice(&24u16.to_le_bytes());
            extra.extend_from_slice(&record.uncompressed_size.to_le_bytes());
            extra.extend_from_slice(&record.compressed_size.to_le_bytes());
            extra.extend_from_slice(&record.offset.to_le_bytes());
            (SENTINEL32, SENTINEL32, SENTINEL32)
        } else {
            (
                record.compressed_size as u32,
                record.uncompressed_size as u32,
                record.offset as u32,
            )
        };

        out.extend_from_slice(CDFH_SIGNATURE);
        out.extend_from_slice(&20u16.to_le_bytes()); // version made by
        out.extend_from_slice(&20u16.to_le_bytes()); // version needed
        out.extend_from_slice(&0u16.to_le_bytes()); // flags
        out.extend_from_slice(&record.method.to_le_bytes());
        out.extend_from_slice(&DOS_TIME.to_le_bytes());
        out.extend_from_slice(&DOS_DATE.to_le_bytes());
        out.extend_from_slice(&record.crc.to_le_bytes());
        out.extend_from_slice(&compressed32.to_le_bytes());
        out.extend_from_slice(&uncompressed32.to_le_bytes());
        out.extend_from_slice(&(record.name.len() as u16).to_le_bytes());
        out.extend_from_slice(&(extra.len() as u16).to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes()); // comment len
        out.extend_from_slice(&0u16.to_le_bytes()); // disk number start
        out.extend_from_slice(&0u16.to_le_bytes()); // internal attrs
        out.extend_from_slice(&0u32.to_le_bytes()); // external attrs
        out.extend_from_slice(&offset32.to_le_bytes());
        out.extend_from_slice(record.name.as_bytes());
        out.extend_from_slice(&extra);
    }
}

/// Drains a stream to completion, returning the concatenated chunks.
pub async fn read_to_end<R: zipstream::ReadAt>(
    stream: &mut zipstream::EntryStream<R>,
) -> zipstream::Result<Vec<u8>> {
    let mut content = Vec::new();
    while let Some(chunk) = stream.next_chunk().await? {
        content.extend_from_slice(&chunk);
    }
    Ok(content)
}

/// Finds the `n`-th occurrence (0-based) of `needle` in `haystack`.
pub fn find_nth(haystack: &[u8], needle: &[u8], n: usize) -> Option<usize> {
    haystack
        .windows(needle.len())
        .enumerate()
        .filter(|(_, window)| *window == needle)
        .map(|(at, _)| at)
        .nth(n)
}
