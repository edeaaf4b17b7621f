//! Error types for ZIP archive operations.
//!
//! All fallible operations in this crate return [`Result<T>`]. The error
//! messages for format-level failures are stable and part of the public
//! interface; callers may match on [`ZipError`] variants or compare the
//! rendered messages.

/// The main error type for ZIP archive operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ZipError {
    /// No End-Of-Central-Directory record was found within the trailing
    /// comment search window, or the file ended before one could exist.
    #[error("Invalid zip file, missing EOCD record")]
    MissingEocd,

    /// The central directory ended short, or a record signature mismatched
    /// after the first record had already been parsed.
    #[error("Invalid zip file, invalid central directory")]
    InvalidCentralDirectory,

    /// The first central-directory record did not carry the expected
    /// signature.
    #[error("Invalid zip file, invalid central directory file header")]
    InvalidCdFileHeader,

    /// A local file header did not carry the expected signature when an
    /// entry stream was opened.
    #[error("Invalid zip file, invalid local file header")]
    InvalidLocalFileHeader,

    /// Two central-directory entries claim intersecting compressed data
    /// ranges. Overlapping entries are the signature of "quoted overlap"
    /// zip bombs and are always rejected.
    #[error("Invalid zip file, found overlapping zip entries")]
    OverlappingEntries,

    /// The entry uses a compression method other than STORED (0) or
    /// DEFLATE (8).
    #[error("Compression method {0} is not supported")]
    UnsupportedCompression(u16),

    /// The requested entry name does not exist in the archive.
    #[error("File {0} not present in the zip")]
    EntryNotFound(String),

    /// The CRC-32 of the decoded data disagrees with the checksum stored
    /// in the central directory.
    #[error("CRC mismatch. expected: {expected} got: {actual}")]
    CrcMismatch {
        /// Checksum recorded in the central directory.
        expected: u32,
        /// Checksum computed over the decoded bytes.
        actual: u32,
    },

    /// The raw DEFLATE stream could not be decoded.
    #[error("Failed to inflate entry data: {0}")]
    Inflate(#[from] flate2::DecompressError),

    /// The backing store failed, or violated the positional-read contract
    /// by returning fewer bytes than requested without an error.
    #[error(transparent)]
    Adapter(#[from] anyhow::Error),
}

/// A specialized Result type for ZIP operations.
pub type Result<T> = std::result::Result<T, ZipError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_error_messages_are_stable() {
        assert_eq!(
            ZipError::MissingEocd.to_string(),
            "Invalid zip file, missing EOCD record"
        );
        assert_eq!(
            ZipError::InvalidCentralDirectory.to_string(),
            "Invalid zip file, invalid central directory"
        );
        assert_eq!(
            ZipError::InvalidCdFileHeader.to_string(),
            "Invalid zip file, invalid central directory file header"
        );
        assert_eq!(
            ZipError::OverlappingEntries.to_string(),
            "Invalid zip file, found overlapping zip entries"
        );
    }

    #[test]
    fn parameterised_messages() {
        assert_eq!(
            ZipError::UnsupportedCompression(30840).to_string(),
            "Compression method 30840 is not supported"
        );
        assert_eq!(
            ZipError::EntryNotFound("a/b.txt".into()).to_string(),
            "File a/b.txt not present in the zip"
        );
        assert_eq!(
            ZipError::CrcMismatch {
                expected: 123,
                actual: 456
            }
            .to_string(),
            "CRC mismatch. expected: 123 got: 456"
        );
    }

    #[test]
    fn adapter_errors_pass_reason_through() {
        let err = ZipError::from(anyhow::anyhow!("connection reset"));
        assert_eq!(err.to_string(), "connection reset");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ZipError>();
    }
}
