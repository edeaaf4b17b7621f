//! I/O-coalescing read windows over a backing store.
//!
//! The trailer records of a ZIP archive have no fixed location, so the
//! locator walks backward from end-of-file one byte at a time, and the
//! central-directory parser walks forward record by record. Issuing a
//! positional read per step would be ruinous against a remote store, so
//! both walks run over a buffered window that pulls `max(chunk, required)`
//! bytes per backing-store read and serves the fine-grained steps from
//! memory.
//!
//! Reads never move the window; only the `move_*_by` operations do. The
//! buffers drop bytes that the window direction makes unreachable, keeping
//! residency near one chunk plus one extension.

use std::sync::Arc;

use crate::io::ReadAt;

/// Default size of a single coalesced backing-store read.
pub(crate) const DEFAULT_CHUNK_SIZE: usize = 65_000;

#[derive(Debug, thiserror::Error)]
pub(crate) enum BufferError {
    /// The remaining addressable range holds fewer bytes than requested.
    #[error("short read: {requested} bytes requested, {available} addressable")]
    ShortRead { requested: usize, available: u64 },

    /// A window move larger than the currently buffered byte count.
    #[error("invalid count: moving by {requested} exceeds {buffered} buffered bytes")]
    InvalidCount { requested: usize, buffered: u64 },

    #[error(transparent)]
    Adapter(#[from] anyhow::Error),
}

pub(crate) type BufferResult<T> = Result<T, BufferError>;

async fn pull<R: ReadAt>(store: &R, offset: u64, len: usize) -> BufferResult<Vec<u8>> {
    let mut chunk = vec![0u8; len];
    let got = store.read_at(offset, &mut chunk).await?;
    if got != len {
        return Err(BufferError::Adapter(anyhow::anyhow!(
            "backing store returned {got} bytes, expected {len}"
        )));
    }
    Ok(chunk)
}

/// Read window that walks backward from end-of-file.
///
/// `next_chunk(n)` returns the `n` bytes ending at the current window end
/// without moving it; [`move_backward_by`](Self::move_backward_by) shrinks
/// the window from the tail.
pub(crate) struct BackwardBuffer<R> {
    store: Arc<R>,
    chunk_size: usize,
    /// Absolute offset of the first buffered byte.
    buf_start: u64,
    /// Buffered bytes covering `[buf_start, buf_start + buf.len())`.
    buf: Vec<u8>,
    /// Absolute offset one past the current window end. Only decreases.
    end: u64,
}

impl<R: ReadAt> BackwardBuffer<R> {
    pub fn new(store: Arc<R>) -> Self {
        Self::with_chunk_size(store, DEFAULT_CHUNK_SIZE)
    }

    pub fn with_chunk_size(store: Arc<R>, chunk_size: usize) -> Self {
        let end = store.size();
        Self {
            store,
            chunk_size: chunk_size.max(1),
            buf_start: end,
            buf: Vec::new(),
            end,
        }
    }

    /// Returns the `n` bytes ending at the current window end.
    pub async fn next_chunk(&mut self, n: usize) -> BufferResult<Vec<u8>> {
        if (n as u64) > self.end {
            return Err(BufferError::ShortRead {
                requested: n,
                available: self.end,
            });
        }
        if self.end - self.buf_start < n as u64 {
            self.extend_back(n).await?;
        }
        let end_idx = (self.end - self.buf_start) as usize;
        Ok(self.buf[end_idx - n..end_idx].to_vec())
    }

    /// Shrinks the window by dropping `k` trailing bytes.
    pub fn move_backward_by(&mut self, k: usize) -> BufferResult<()> {
        let buffered = self.end - self.buf_start;
        if k as u64 > buffered {
            return Err(BufferError::InvalidCount {
                requested: k,
                buffered,
            });
        }
        self.end -= k as u64;
        Ok(())
    }

    /// Pulls earlier bytes so that `[end - n, end)` is buffered. Bytes past
    /// the window end can never be read again and are discarded.
    async fn extend_back(&mut self, n: usize) -> BufferResult<()> {
        let missing = self.buf_start - (self.end - n as u64);
        let pull_len = (self.chunk_size as u64).max(missing).min(self.buf_start);
        let read_start = self.buf_start - pull_len;

        let mut chunk = pull(&*self.store, read_start, pull_len as usize).await?;
        let live = (self.end - self.buf_start) as usize;
        chunk.extend_from_slice(&self.buf[..live]);
        self.buf = chunk;
        self.buf_start = read_start;
        Ok(())
    }
}

/// Read window that walks forward from a start offset toward a limit.
///
/// `next_chunk(n)` returns the `n` bytes starting at the current window
/// start without moving it; [`move_forward_by`](Self::move_forward_by)
/// advances the start.
pub(crate) struct ForwardBuffer<R> {
    store: Arc<R>,
    chunk_size: usize,
    /// Absolute offset of the first buffered byte.
    buf_start: u64,
    buf: Vec<u8>,
    /// Current window start. Only increases.
    start: u64,
    /// Exclusive upper bound of the addressable range.
    limit: u64,
}

impl<R: ReadAt> ForwardBuffer<R> {
    pub fn new(store: Arc<R>, start: u64, limit: u64) -> Self {
        Self::with_chunk_size(store, start, limit, DEFAULT_CHUNK_SIZE)
    }

    pub fn with_chunk_size(store: Arc<R>, start: u64, limit: u64, chunk_size: usize) -> Self {
        let limit = limit.min(store.size());
        Self {
            store,
            chunk_size: chunk_size.max(1),
            buf_start: start,
            buf: Vec::new(),
            start,
            limit,
        }
    }

    /// Absolute offset of the current window start.
    pub fn position(&self) -> u64 {
        self.start
    }

    /// Returns the `n` bytes starting at the current window start.
    pub async fn next_chunk(&mut self, n: usize) -> BufferResult<Vec<u8>> {
        let available = self.limit.saturating_sub(self.start);
        if (n as u64) > available {
            return Err(BufferError::ShortRead {
                requested: n,
                available,
            });
        }
        let buf_end = self.buf_start + self.buf.len() as u64;
        if buf_end < self.start + n as u64 {
            self.extend_forward(n).await?;
        }
        let start_idx = (self.start - self.buf_start) as usize;
        Ok(self.buf[start_idx..start_idx + n].to_vec())
    }

    /// Advances the window start by `k`.
    pub fn move_forward_by(&mut self, k: usize) -> BufferResult<()> {
        let buffered = (self.buf_start + self.buf.len() as u64).saturating_sub(self.start);
        if k as u64 > buffered {
            return Err(BufferError::InvalidCount {
                requested: k,
                buffered,
            });
        }
        self.start += k as u64;
        Ok(())
    }

    /// Pulls further bytes so that `[start, start + n)` is buffered. Bytes
    /// before the window start are already consumed and are discarded.
    async fn extend_forward(&mut self, n: usize) -> BufferResult<()> {
        let consumed = (self.start - self.buf_start) as usize;
        self.buf.drain(..consumed);
        self.buf_start = self.start;

        let buf_end = self.buf_start + self.buf.len() as u64;
        let missing = (self.start + n as u64) - buf_end;
        let pull_len = (self.chunk_size as u64)
            .max(missing)
            .min(self.limit - buf_end);

        let chunk = pull(&*self.store, buf_end, pull_len as usize).await?;
        self.buf.extend_from_slice(&chunk);
        Ok(())
    }
}
