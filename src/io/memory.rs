use super::ReadAt;
use anyhow::Result;
use async_trait::async_trait;

/// In-memory reader over an owned byte buffer.
///
/// Mostly useful for tests and for archives that have already been
/// fetched wholesale (for example out of an object-store GET).
#[derive(Debug)]
pub struct MemoryReader {
    data: Vec<u8>,
}

impl MemoryReader {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

#[async_trait]
impl ReadAt for MemoryReader {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let end = offset
            .checked_add(buf.len() as u64)
            .filter(|end| *end <= self.data.len() as u64)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "read of {} bytes at offset {} is out of bounds (size {})",
                    buf.len(),
                    offset,
                    self.data.len()
                )
            })?;
        buf.copy_from_slice(&self.data[offset as usize..end as usize]);
        Ok(buf.len())
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }
}
