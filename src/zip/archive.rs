//! High-level archive API.
//!
//! [`ZipArchive::open`] locates the End-Of-Central-Directory record and
//! decodes the full central directory eagerly; listing entries afterwards
//! touches no I/O. Entry data is only ever read on demand, chunk by chunk,
//! through [`ZipArchive::stream`].
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use zipstream::{HttpRangeReader, ZipArchive};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let reader = Arc::new(HttpRangeReader::new("https://example.com/archive.zip".to_string()).await?);
//! let archive = ZipArchive::open(reader).await?;
//!
//! for entry in archive.entries() {
//!     println!("{}: {} bytes", entry.file_name(), entry.uncompressed_size());
//! }
//! # Ok(())
//! # }
//! ```

use byteorder::{LittleEndian, ReadBytesExt};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;

use tracing::debug;

use crate::error::{Result, ZipError};
use crate::io::{self, ReadAt};

use super::locator::locate_eocd;
use super::parser::parse_central_directory;
use super::stream::{EntryStream, StreamOptions};
use super::structures::{LFH_SIGNATURE, LFH_SIZE, ZipEntry};

/// A ZIP archive whose catalogue has been fully decoded.
///
/// The archive owns a shared handle to the backing store and is immutable
/// after construction, so it can be shared freely; concurrent entry
/// streams are fine as long as the store tolerates concurrent positional
/// reads. Closing the store remains the caller's responsibility.
#[derive(Debug)]
pub struct ZipArchive<R> {
    store: Arc<R>,
    entries: Vec<ZipEntry>,
    index: HashMap<String, usize>,
}

impl<R: ReadAt> ZipArchive<R> {
    /// Opens an archive by locating its EOCD record and decoding the
    /// central directory.
    ///
    /// # Errors
    ///
    /// Returns an error if no EOCD record exists within the trailing
    /// 5 MiB comment window, the central directory is malformed, any two
    /// entries claim overlapping data ranges, or the backing store fails.
    pub async fn open(store: Arc<R>) -> Result<Self> {
        let location = locate_eocd(&store).await?;
        let map = parse_central_directory(&store, &location).await?;

        Ok(Self {
            store,
            entries: map.entries,
            index: map.index,
        })
    }

    /// Entry metadata in central-directory order.
    pub fn entries(&self) -> &[ZipEntry] {
        &self.entries
    }

    /// Looks up a single entry by its stored name.
    pub fn get(&self, name: &str) -> Option<&ZipEntry> {
        self.index.get(name).map(|&at| &self.entries[at])
    }

    /// Opens a decompressed stream over the named entry with default
    /// options.
    pub async fn stream(&self, name: &str) -> Result<EntryStream<R>> {
        self.stream_with(name, StreamOptions::default()).await
    }

    /// Opens a decompressed stream over the named entry.
    ///
    /// The entry's local file header is read eagerly to find where its
    /// data begins; decoding happens lazily as the stream is pulled. The
    /// compression method is taken from the local header and checked at
    /// the first pull, and the sizes come from the central directory.
    ///
    /// # Errors
    ///
    /// Returns [`ZipError::EntryNotFound`] for unknown names and
    /// [`ZipError::InvalidLocalFileHeader`] if the entry's local header
    /// does not carry the expected signature. An unsupported compression
    /// method surfaces from the stream's first pull.
    pub async fn stream_with(&self, name: &str, options: StreamOptions) -> Result<EntryStream<R>> {
        let entry = self
            .get(name)
            .ok_or_else(|| ZipError::EntryNotFound(name.to_string()))?;

        let mut header = [0u8; LFH_SIZE];
        io::read_full(&*self.store, entry.local_header_offset, &mut header).await?;

        if &header[0..4] != LFH_SIGNATURE {
            return Err(ZipError::InvalidLocalFileHeader);
        }

        // The local header's own size fields may disagree with the central
        // directory (or be zero under streaming-mode flags); only its
        // compression method and tail lengths are used here.
        let mut cursor = Cursor::new(&header[8..]);
        let method = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| ZipError::InvalidLocalFileHeader)?;

        let mut cursor = Cursor::new(&header[26..]);
        let file_name_length = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| ZipError::InvalidLocalFileHeader)?;
        let extra_field_length = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| ZipError::InvalidLocalFileHeader)?;

        let data_offset = entry.local_header_offset
            + LFH_SIZE as u64
            + file_name_length as u64
            + extra_field_length as u64;

        debug!(
            name = %entry.file_name,
            method,
            compressed = entry.compressed_size,
            uncompressed = entry.uncompressed_size,
            "opening entry stream"
        );

        Ok(EntryStream::new(
            Arc::clone(&self.store),
            super::structures::CompressionMethod::from_u16(method),
            entry.crc32,
            data_offset,
            entry.compressed_size,
            options,
        ))
    }
}
