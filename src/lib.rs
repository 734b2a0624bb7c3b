//! ldcache - A bounds-checked reader for the glibc dynamic linker cache.
//!
//! This library decodes `/etc/ld.so.cache`, the file `ld.so` consults to map
//! library names to paths. The cache nests a newer format inside the string
//! table of a legacy one; both headers, both entry tables and the shared
//! string table are validated before any byte is interpreted as a string.
//!
//! # Features
//!
//! - Memory-mapped or in-memory loading
//! - Zero-copy structure decoding
//! - Overflow-safe bounds checking on every structural read
//! - Eager validation: a parsed [`CacheView`] cannot fail on access
//!
//! # Example
//!
//! ```no_run
//! use ldcache::{ByteSource, CacheView, DEFAULT_CACHE_PATH};
//!
//! fn main() -> ldcache::Result<()> {
//!     let source = ByteSource::open(DEFAULT_CACHE_PATH)?;
//!     let cache = CacheView::parse(&source)?;
//!
//!     if let Some(libc) = cache.find("libc.so.6") {
//!         println!("{} => {}", libc.key, libc.value);
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod error;

// Re-export main types
pub use cache::{
    BoundsCursor, ByteSource, CacheEntry, CacheView, EntryFlags, LegacyHeaderInfo, NewHeaderInfo,
    DEFAULT_CACHE_PATH,
};
pub use error::{CacheFormat, Error, ErrorKind, Result};

/// Parses a cache held in memory.
///
/// Equivalent to [`CacheView::parse`].
#[inline]
pub fn parse(data: &[u8]) -> Result<CacheView<'_>> {
    CacheView::parse(data)
}

/// Loads the cache file at `path`.
///
/// Parse the returned source with [`parse`]; the view borrows from it.
pub fn load<P: AsRef<std::path::Path>>(path: P) -> Result<ByteSource> {
    ByteSource::open(path)
}
