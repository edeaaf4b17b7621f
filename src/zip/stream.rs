//! Chunked entry decoding.
//!
//! An [`EntryStream`] is a single-shot, pull-driven sequence of
//! decompressed byte chunks. Each demand issues at most a handful of
//! positional reads of `chunk_size` compressed bytes, pipes them through a
//! raw inflater (or straight through for STORED entries), and feeds a
//! running CRC-32. Once the compressed range is exhausted the computed
//! checksum is compared against the central directory's; the comparison is
//! the final event of a fully consumed stream. A stream that is dropped
//! early skips the comparison.

use std::sync::Arc;

use crc32fast::Hasher;
use flate2::{Decompress, FlushDecompress, Status};

use crate::buffer::DEFAULT_CHUNK_SIZE;
use crate::error::ZipError;
use crate::io::{self, ReadAt};

use super::structures::CompressionMethod;

/// Options accepted by [`ZipArchive::stream_with`](crate::ZipArchive::stream_with).
#[derive(Debug, Clone, Copy)]
pub struct StreamOptions {
    chunk_size: usize,
}

impl StreamOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the compressed-read granularity. Every backing-store read
    /// issued while streaming requests exactly this many bytes, except the
    /// final one.
    ///
    /// # Panics
    ///
    /// Panics if `chunk_size` is zero.
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "chunk_size must be positive");
        self.chunk_size = chunk_size;
        self
    }
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

#[derive(Debug)]
enum Decoder {
    Stored,
    Deflate(Box<Decompress>),
}

#[derive(Debug)]
enum State {
    /// No data demanded yet; the compression method has not been checked.
    Init,
    /// Compressed bytes remain to be read.
    Reading,
    /// Input exhausted and flushed; the CRC comparison is still owed.
    Finalising,
    /// All data emitted and the checksum verified.
    Done,
    /// A terminal error was returned; nothing further is emitted.
    Failed,
}

/// Lazy decompressed view of a single archive entry.
///
/// Obtain one via [`ZipArchive::stream`](crate::ZipArchive::stream) and
/// drain it with [`next_chunk`](Self::next_chunk):
///
/// ```no_run
/// # async fn example(archive: zipstream::ZipArchive<zipstream::MemoryReader>) -> zipstream::Result<()> {
/// let mut stream = archive.stream("quotes/rain.txt").await?;
/// let mut content = Vec::new();
/// while let Some(chunk) = stream.next_chunk().await? {
///     content.extend_from_slice(&chunk);
/// }
/// # Ok(())
/// # }
/// ```
///
/// The stream is not restartable; request a fresh one to read the entry
/// again.
#[derive(Debug)]
pub struct EntryStream<R> {
    store: Arc<R>,
    state: State,
    decoder: Decoder,
    method: CompressionMethod,
    hasher: Hasher,
    expected_crc: u32,
    /// Absolute offset of the next compressed read.
    next_offset: u64,
    /// Compressed bytes not yet read.
    remaining: u64,
    chunk_size: usize,
}

impl<R: ReadAt> EntryStream<R> {
    pub(crate) fn new(
        store: Arc<R>,
        method: CompressionMethod,
        expected_crc: u32,
        data_offset: u64,
        compressed_size: u64,
        options: StreamOptions,
    ) -> Self {
        Self {
            store,
            state: State::Init,
            decoder: Decoder::Stored,
            method,
            hasher: Hasher::new(),
            expected_crc,
            next_offset: data_offset,
            remaining: compressed_size,
            chunk_size: options.chunk_size,
        }
    }

    /// Pulls the next decompressed chunk.
    ///
    /// Returns `Ok(None)` once the entry is fully emitted and its checksum
    /// verified. Errors are terminal: after one is returned the stream
    /// emits nothing further.
    pub async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, ZipError> {
        loop {
            match self.state {
                State::Done | State::Failed => return Ok(None),
                State::Init => {
                    self.decoder = match self.method {
                        CompressionMethod::Stored => Decoder::Stored,
                        CompressionMethod::Deflate => {
                            Decoder::Deflate(Box::new(Decompress::new(false)))
                        }
                        CompressionMethod::Unknown(method) => {
                            self.state = State::Failed;
                            return Err(ZipError::UnsupportedCompression(method));
                        }
                    };
                    self.state = State::Reading;
                }
                State::Reading => match self.read_step().await {
                    Ok(Some(chunk)) => return Ok(Some(chunk)),
                    Ok(None) => self.state = State::Finalising,
                    Err(e) => {
                        self.state = State::Failed;
                        return Err(e);
                    }
                },
                State::Finalising => {
                    let actual = self.hasher.clone().finalize();
                    if actual != self.expected_crc {
                        self.state = State::Failed;
                        return Err(ZipError::CrcMismatch {
                            expected: self.expected_crc,
                            actual,
                        });
                    }
                    self.state = State::Done;
                    return Ok(None);
                }
            }
        }
    }

    /// Reads compressed chunks until the decoder emits output or the input
    /// is exhausted. `Ok(None)` means the compressed range is fully
    /// consumed and flushed.
    async fn read_step(&mut self) -> Result<Option<Vec<u8>>, ZipError> {
        while self.remaining > 0 {
            let len = (self.chunk_size as u64).min(self.remaining) as usize;
            let mut raw = vec![0u8; len];
            io::read_full(&*self.store, self.next_offset, &mut raw).await?;
            self.next_offset += len as u64;
            self.remaining -= len as u64;

            let last = self.remaining == 0;
            let out = match &mut self.decoder {
                Decoder::Stored => raw,
                Decoder::Deflate(inflater) => {
                    let mut out = Vec::with_capacity(len.saturating_mul(2));
                    inflate_chunk(inflater, &raw, last, &mut out)?;
                    out
                }
            };

            if !out.is_empty() {
                self.hasher.update(&out);
                return Ok(Some(out));
            }
        }
        Ok(None)
    }
}

/// Feeds one compressed chunk to the inflater, draining everything it can
/// produce into `out`. With `last` set the stream tail is flushed through
/// to end-of-stream.
fn inflate_chunk(
    inflater: &mut Decompress,
    input: &[u8],
    last: bool,
    out: &mut Vec<u8>,
) -> Result<(), ZipError> {
    let flush = if last {
        FlushDecompress::Finish
    } else {
        FlushDecompress::None
    };
    let mut pos = 0usize;

    loop {
        if out.capacity() == out.len() {
            out.reserve(32 * 1024);
        }

        let before_in = inflater.total_in();
        let before_out = inflater.total_out();
        let status = inflater.decompress_vec(&input[pos..], out, flush)?;
        let consumed = (inflater.total_in() - before_in) as usize;
        pos += consumed;
        let produced = inflater.total_out() != before_out;

        match status {
            Status::StreamEnd => return Ok(()),
            Status::Ok | Status::BufError => {
                // Stop once the inflater goes quiet: input exhausted, or
                // no progress at all (a stream that ended before its
                // recorded compressed size, or a truncated one; either
                // way the CRC comparison has the last word).
                if !produced && (pos >= input.len() || consumed == 0) {
                    return Ok(());
                }
            }
        }
    }
}
