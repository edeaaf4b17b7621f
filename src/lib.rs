//! # zipstream
//!
//! Stream the contents of ZIP archives without a local copy of the
//! archive.
//!
//! This library decouples ZIP parsing from the byte source: any backing
//! store that can report its total size and serve positional reads (a
//! local file, an HTTP server with Range support, an in-memory buffer)
//! plugs in through the [`ReadAt`] trait. Opening an archive reads only
//! its trailing records and central directory; entry data is fetched and
//! decompressed chunk by chunk, on demand.
//!
//! ## Features
//!
//! - List and stream entries from local, remote, or in-memory archives
//! - ZIP64 support for archives past the 32-bit size/offset limits
//! - STORED and DEFLATE compression methods
//! - CRC-32 verification at end-of-stream
//! - Rejection of overlapping-entry ("quoted overlap") zip bombs before
//!   any decompression happens
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use zipstream::{HttpRangeReader, ZipArchive};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Open a remote ZIP file without downloading it.
//!     let reader = Arc::new(HttpRangeReader::new("https://example.com/archive.zip".to_string()).await?);
//!     let archive = ZipArchive::open(reader).await?;
//!
//!     for entry in archive.entries() {
//!         println!("{}", entry.file_name());
//!     }
//!
//!     // Stream one entry, chunk by chunk.
//!     let mut stream = archive.stream("README.md").await?;
//!     while let Some(chunk) = stream.next_chunk().await? {
//!         print!("{}", String::from_utf8_lossy(&chunk));
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod error;
pub mod io;
pub mod zip;

mod buffer;
mod ranges;

pub use cli::Cli;
pub use error::{Result, ZipError};
pub use io::{HttpRangeReader, LocalFileReader, MemoryReader, ReadAt};
pub use zip::{CompressionMethod, EntryStream, StreamOptions, ZipArchive, ZipEntry};
