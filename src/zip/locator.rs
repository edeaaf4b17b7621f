//! End-Of-Central-Directory discovery.
//!
//! The EOCD record sits at the very end of the archive behind a
//! variable-length comment, so its position is not knowable up front. The
//! locator walks backward from end-of-file one byte at a time over a
//! [`BackwardBuffer`], testing a 22-byte window at each step. A window is
//! only accepted when its signature matches *and* its `comment_length`
//! field equals the number of bytes already walked past: the comment is
//! attacker-controlled, and that self-check rejects signatures that merely
//! occur inside comment bytes.
//!
//! After a match the 20 bytes immediately preceding the record are
//! examined for a ZIP64 EOCD locator; when present, the 64-bit EOCD it
//! points at replaces the classic record wholesale.

use std::sync::Arc;

use tracing::debug;

use crate::buffer::{BackwardBuffer, BufferError};
use crate::error::ZipError;
use crate::io::{self, ReadAt};

use super::structures::{
    CentralDirectoryLocation, EndOfCentralDirectory, Zip64Eocd, Zip64EocdLocator,
};

/// Archives with a trailing comment longer than this are rejected; the cap
/// bounds worst-case I/O and CPU for the backward walk.
const EOCD_COMMENT_CAP: u64 = 5 * 1024 * 1024;

/// Finds the EOCD record, preferring the ZIP64 variant when its locator is
/// present.
pub(crate) async fn locate_eocd<R: ReadAt>(
    store: &Arc<R>,
) -> Result<CentralDirectoryLocation, ZipError> {
    let mut window = BackwardBuffer::new(Arc::clone(store));
    let mut consumed: u64 = 0;

    loop {
        let trailer = match window.next_chunk(EndOfCentralDirectory::SIZE).await {
            Ok(bytes) => bytes,
            // Walked past the start of the file without a match.
            Err(BufferError::ShortRead { .. }) => return Err(ZipError::MissingEocd),
            Err(BufferError::Adapter(e)) => return Err(ZipError::Adapter(e)),
            Err(BufferError::InvalidCount { .. }) => return Err(ZipError::MissingEocd),
        };

        if let Some(eocd) = EndOfCentralDirectory::from_bytes(&trailer) {
            if eocd.comment_len as u64 == consumed {
                debug!(
                    entries = eocd.total_entries,
                    cd_offset = eocd.cd_offset,
                    comment_len = eocd.comment_len,
                    "located EOCD record"
                );
                move_backward(&mut window, EndOfCentralDirectory::SIZE)?;
                return upgrade_to_zip64(store, &mut window, eocd.location()).await;
            }
        }

        move_backward(&mut window, 1)?;
        consumed += 1;
        if consumed > EOCD_COMMENT_CAP {
            return Err(ZipError::MissingEocd);
        }
    }
}

/// Reads the 20 bytes before the EOCD; when they form a ZIP64 EOCD
/// locator, follows it and returns the 64-bit record instead.
async fn upgrade_to_zip64<R: ReadAt>(
    store: &Arc<R>,
    window: &mut BackwardBuffer<R>,
    fallback: CentralDirectoryLocation,
) -> Result<CentralDirectoryLocation, ZipError> {
    let preceding = match window.next_chunk(Zip64EocdLocator::SIZE).await {
        Ok(bytes) => bytes,
        // Too close to the start of the file to hold a locator.
        Err(BufferError::ShortRead { .. }) => return Ok(fallback),
        Err(BufferError::Adapter(e)) => return Err(ZipError::Adapter(e)),
        Err(BufferError::InvalidCount { .. }) => return Ok(fallback),
    };

    let Some(locator) = Zip64EocdLocator::from_bytes(&preceding) else {
        return Ok(fallback);
    };

    if locator
        .eocd64_offset
        .checked_add(Zip64Eocd::SIZE as u64)
        .is_none_or(|end| end > store.size())
    {
        return Err(ZipError::MissingEocd);
    }

    let mut raw = [0u8; Zip64Eocd::SIZE];
    io::read_full(&**store, locator.eocd64_offset, &mut raw).await?;

    let eocd64 = Zip64Eocd::from_bytes(&raw).ok_or(ZipError::MissingEocd)?;
    debug!(
        entries = eocd64.total_entries,
        cd_offset = eocd64.cd_offset,
        "upgraded to ZIP64 EOCD record"
    );
    Ok(eocd64.location())
}

fn move_backward<R: ReadAt>(window: &mut BackwardBuffer<R>, k: usize) -> Result<(), ZipError> {
    match window.move_backward_by(k) {
        Ok(()) => Ok(()),
        Err(BufferError::Adapter(e)) => Err(ZipError::Adapter(e)),
        Err(_) => Err(ZipError::MissingEocd),
    }
}
