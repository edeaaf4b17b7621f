mod archive;
mod locator;
mod parser;
mod stream;
mod structures;

pub use archive::ZipArchive;
pub use stream::{EntryStream, StreamOptions};
pub use structures::{CompressionMethod, ZipEntry};
