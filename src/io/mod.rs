mod http;
mod local;
mod memory;

pub use http::HttpRangeReader;
pub use local::LocalFileReader;
pub use memory::MemoryReader;

use anyhow::Result;
use async_trait::async_trait;

use crate::error::ZipError;

/// Trait for random access reading from a data source.
///
/// An implementation must fill the whole buffer: returning `Ok(n)` with
/// `n < buf.len()` is a contract violation and is surfaced to callers of
/// the archive API as an adapter error. Reads outside `[0, size())` must
/// fail rather than return truncated data.
#[async_trait]
pub trait ReadAt: Send + Sync {
    /// Read data at the specified offset into the buffer.
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// Get the total size of the data source.
    fn size(&self) -> u64;
}

/// Reads exactly `buf.len()` bytes at `offset`, enforcing the [`ReadAt`]
/// contract on behalf of the core.
pub(crate) async fn read_full<R: ReadAt + ?Sized>(
    store: &R,
    offset: u64,
    buf: &mut [u8],
) -> Result<(), ZipError> {
    if buf.is_empty() {
        return Ok(());
    }
    let got = store.read_at(offset, buf).await.map_err(ZipError::Adapter)?;
    if got != buf.len() {
        return Err(ZipError::Adapter(anyhow::anyhow!(
            "backing store returned {got} bytes, expected {}",
            buf.len()
        )));
    }
    Ok(())
}
