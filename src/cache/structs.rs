//! ld.so.cache binary structures.
//!
//! These structures match the on-disk layout of the glibc linker cache. All
//! integer fields use `zerocopy`'s little-endian wrappers, which have an
//! alignment of one, so every record can be decoded from any byte offset and
//! `size_of` is exactly the on-disk size.

use std::fmt;

use bitflags::bitflags;
use zerocopy::little_endian::{I16, I32, U32, U64};
use zerocopy::{FromBytes, Immutable, KnownLayout, Unaligned};

/// Magic of the legacy format (no trailing NUL is stored).
pub const CACHE_MAGIC_OLD: &[u8; 11] = b"ld.so-1.7.0";

/// Magic of the embedded new format.
pub const CACHE_MAGIC_NEW: &[u8; 20] = b"glibc-ld.so.cache1.1";

/// Required alignment of the new header's absolute file offset.
pub const NEW_HEADER_ALIGN: usize = 8;

/// Default location of the cache on Linux systems.
pub const DEFAULT_CACHE_PATH: &str = "/etc/ld.so.cache";

// =============================================================================
// Legacy Format
// =============================================================================

/// Header of the legacy format.
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct LegacyHeader {
    /// Magic identifier, `ld.so-1.7.0`
    pub magic: [u8; 11],
    /// Number of legacy entries
    pub nlibs: U32,
}

impl LegacyHeader {
    /// Size of the header in bytes.
    pub const SIZE: usize = 15;

    /// Returns true if the magic matches the legacy constant.
    #[inline]
    pub fn is_valid(&self) -> bool {
        &self.magic == CACHE_MAGIC_OLD
    }
}

/// One legacy library entry.
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct LegacyEntry {
    /// Flags (0x01 marks an ELF library)
    pub flags: I32,
    /// Key offset into the legacy string table
    pub key: U32,
    /// Value offset into the legacy string table
    pub value: U32,
}

impl LegacyEntry {
    /// Size of an entry in bytes.
    pub const SIZE: usize = 12;
}

// =============================================================================
// New Format
// =============================================================================

/// Header of the new format.
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct NewHeader {
    /// Magic identifier, `glibc-ld.so.cache1.1`
    pub magic: [u8; 20],
    /// Number of new entries
    pub nlibs: U32,
    /// Size of the string payload that follows the entries
    pub stringslen: U32,
    /// Reserved for future extensions
    pub unused: [U32; 5],
}

impl NewHeader {
    /// Size of the header in bytes.
    pub const SIZE: usize = 48;

    /// Returns true if the magic matches the new-format constant.
    #[inline]
    pub fn is_valid(&self) -> bool {
        &self.magic == CACHE_MAGIC_NEW
    }
}

/// One new-format library entry.
///
/// The 16-bit flags are followed by two bytes of padding so that the 32-bit
/// fields stay naturally aligned, which makes the record 24 bytes long.
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct NewEntry {
    /// Flags; the low bits determine library type and architecture
    pub flags: I16,
    _pad: [u8; 2],
    /// Key offset into the new string table
    pub key: U32,
    /// Value offset into the new string table
    pub value: U32,
    /// Required OS version
    pub osversion: U32,
    /// Hardware capability mask
    pub hwcap: U64,
}

impl NewEntry {
    /// Size of an entry in bytes.
    pub const SIZE: usize = 24;
}

// =============================================================================
// Entry Flags
// =============================================================================

bitflags! {
    /// Marker bits carried in entry flags.
    ///
    /// Bits not named here are retained untouched.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EntryFlags: u32 {
        /// Entry is an ELF library
        const ELF = 0x0001;
        /// x86-64 library
        const X86_64 = 0x0300;
        /// i386 library
        const I386 = 0x0800;
    }
}

impl EntryFlags {
    /// Reinterprets raw 16-bit entry flags, keeping unknown bits.
    #[inline]
    pub fn from_raw(raw: i16) -> Self {
        Self::from_bits_retain(raw as u16 as u32)
    }

    /// Returns a short architecture label, if one of the known markers is set.
    pub fn arch_name(&self) -> Option<&'static str> {
        if self.contains(Self::X86_64) {
            Some("x86-64")
        } else if self.contains(Self::I386) {
            Some("i386")
        } else {
            None
        }
    }
}

impl fmt::Display for EntryFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.contains(Self::ELF) { "libc6" } else { "unknown" };
        match self.arch_name() {
            Some(arch) => write!(f, "{},{}", kind, arch),
            None => f.write_str(kind),
        }
    }
}
