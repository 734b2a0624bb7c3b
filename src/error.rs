//! Error types for the ld.so.cache reader.
//!
//! Every failure is terminal: a corrupt cache does not become valid on retry,
//! so the parser stops at the first problem and hands back one of these.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Which of the two nested cache formats a diagnostic refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheFormat {
    /// The outer `ld.so-1.7.0` container.
    Legacy,
    /// The `glibc-ld.so.cache1.1` overlay embedded in the legacy string table.
    New,
}

impl fmt::Display for CacheFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheFormat::Legacy => f.write_str("legacy"),
            CacheFormat::New => f.write_str("new"),
        }
    }
}

/// The main error type for cache loading and parsing.
#[derive(Error, Debug)]
pub enum Error {
    // ==================== I/O Errors ====================
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to open file '{path}': {source}")]
    FileOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to memory map file '{path}': {source}")]
    MemoryMap {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ==================== Structure Errors ====================
    #[error("invalid {format} cache magic: expected {expected:?}, got {found:?}")]
    MagicMismatch {
        format: CacheFormat,
        expected: &'static str,
        found: String,
    },

    #[error("truncated cache: need {needed} bytes at offset {offset:#x}, file has {available}")]
    TruncatedFile {
        offset: u64,
        needed: u64,
        available: u64,
    },

    #[error("declared sizes cover {consumed} bytes but the file is {file_size} bytes")]
    OverreadOrUnderread { consumed: u64, file_size: u64 },

    // ==================== String Table Errors ====================
    #[error("string table is not NUL-terminated (last byte {found:#04x})")]
    MissingTerminator { found: u8 },

    #[error("entry {entry}: string offset {offset:#x} out of bounds (limit: {limit:#x})")]
    StringOffsetOutOfBounds { entry: usize, offset: u32, limit: u64 },

    #[error("entry {entry}: string at offset {offset:#x} has no terminating NUL")]
    UnterminatedString { entry: usize, offset: u32 },

    #[error("entry {entry}: string at offset {offset:#x} is not valid UTF-8")]
    InvalidUtf8 { entry: usize, offset: u32 },
}

/// A specialized Result type for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error category without the diagnostic payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The byte region could not be loaded.
    IoFailure,
    /// A header magic did not match.
    MagicMismatch,
    /// A structural read ran past the end of the region.
    TruncatedFile,
    /// The declared structure does not cover the file exactly.
    OverreadOrUnderread,
    /// The last byte of the file is not NUL.
    MissingTerminator,
    /// An entry references a string outside the string table.
    StringOffsetOutOfBounds,
    /// An entry references a string that never terminates.
    UnterminatedString,
    /// An entry references a string that is not UTF-8.
    InvalidUtf8,
}

impl Error {
    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) | Error::FileOpen { .. } | Error::MemoryMap { .. } => ErrorKind::IoFailure,
            Error::MagicMismatch { .. } => ErrorKind::MagicMismatch,
            Error::TruncatedFile { .. } => ErrorKind::TruncatedFile,
            Error::OverreadOrUnderread { .. } => ErrorKind::OverreadOrUnderread,
            Error::MissingTerminator { .. } => ErrorKind::MissingTerminator,
            Error::StringOffsetOutOfBounds { .. } => ErrorKind::StringOffsetOutOfBounds,
            Error::UnterminatedString { .. } => ErrorKind::UnterminatedString,
            Error::InvalidUtf8 { .. } => ErrorKind::InvalidUtf8,
        }
    }

    /// Creates a magic mismatch error, rendering the found bytes lossily.
    #[inline]
    pub fn magic_mismatch(format: CacheFormat, expected: &'static [u8], found: &[u8]) -> Self {
        Error::MagicMismatch {
            format,
            expected: std::str::from_utf8(expected).unwrap_or_default(),
            found: String::from_utf8_lossy(found).into_owned(),
        }
    }

    /// Creates a truncation error.
    #[inline]
    pub fn truncated(offset: usize, needed: u64, available: usize) -> Self {
        Error::TruncatedFile {
            offset: offset as u64,
            needed,
            available: available as u64,
        }
    }
}
