//! Loading a cache file into memory.

use std::fs::File;
use std::ops::Deref;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use tracing::debug;

use crate::error::{Error, Result};

/// Backing storage for the bytes of a cache.
#[derive(Debug)]
enum Storage {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

/// An immutable, length-known byte region holding an entire cache file.
///
/// The region is never written after it is loaded, so views parsed from it
/// can be shared freely.
#[derive(Debug)]
pub struct ByteSource {
    storage: Storage,
    path: Option<PathBuf>,
}

impl ByteSource {
    /// Memory-maps the file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let file = File::open(&path).map_err(|e| Error::FileOpen {
            path: path.clone(),
            source: e,
        })?;

        // Zero-length mappings are rejected on some platforms.
        let len = file.metadata()?.len();
        if len == 0 {
            debug!("{} is empty", path.display());
            return Ok(Self {
                storage: Storage::Owned(Vec::new()),
                path: Some(path),
            });
        }

        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| Error::MemoryMap {
            path: path.clone(),
            source: e,
        })?;
        debug!("mapped {} ({} bytes)", path.display(), mmap.len());

        Ok(Self {
            storage: Storage::Mapped(mmap),
            path: Some(path),
        })
    }

    /// Reads the file at `path` into an owned buffer instead of mapping it.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let bytes = std::fs::read(&path).map_err(|e| Error::FileOpen {
            path: path.clone(),
            source: e,
        })?;
        debug!("read {} ({} bytes)", path.display(), bytes.len());

        Ok(Self {
            storage: Storage::Owned(bytes),
            path: Some(path),
        })
    }

    /// Wraps bytes that are already in memory.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            storage: Storage::Owned(bytes),
            path: None,
        }
    }

    /// Returns the loaded bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        match &self.storage {
            Storage::Mapped(mmap) => &mmap[..],
            Storage::Owned(bytes) => &bytes[..],
        }
    }

    /// Returns the length of the region in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Returns true if the region is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the path this region was loaded from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns true if the region is memory-mapped.
    pub fn is_mapped(&self) -> bool {
        matches!(self.storage, Storage::Mapped(_))
    }
}

impl Deref for ByteSource {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl AsRef<[u8]> for ByteSource {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("ldcache-{}-{}", std::process::id(), name))
    }

    #[test]
    fn test_from_bytes() {
        let source = ByteSource::from_bytes(vec![1, 2, 3]);
        assert_eq!(source.as_bytes(), &[1, 2, 3]);
        assert_eq!(source.len(), 3);
        assert!(source.path().is_none());
        assert!(!source.is_mapped());
    }

    #[test]
    fn test_open_maps_file() {
        let path = temp_path("mapped");
        std::fs::write(&path, b"ld.so-1.7.0").unwrap();

        let source = ByteSource::open(&path).unwrap();
        assert!(source.is_mapped());
        assert_eq!(&source[..], b"ld.so-1.7.0");
        assert_eq!(source.path(), Some(path.as_path()));

        drop(source);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_open_empty_file() {
        let path = temp_path("empty");
        std::fs::write(&path, b"").unwrap();

        let source = ByteSource::open(&path).unwrap();
        assert!(source.is_empty());

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_open_missing_file() {
        let err = ByteSource::open(temp_path("does-not-exist")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IoFailure);

        let err = ByteSource::read(temp_path("does-not-exist")).unwrap_err();
        assert!(matches!(err, Error::FileOpen { .. }));
    }
}
