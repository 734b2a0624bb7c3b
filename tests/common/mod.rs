//! Synthetic cache construction for integration tests.

#![allow(dead_code)]

use byteorder::{LittleEndian, WriteBytesExt};

pub const MAGIC_OLD: &[u8] = b"ld.so-1.7.0";
pub const MAGIC_NEW: &[u8] = b"glibc-ld.so.cache1.1";

/// One new-format entry.
///
/// `key` and `value` are offsets into the builder's string payload; `build`
/// rebases them onto the new header, where the format measures them from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEntry {
    pub flags: i16,
    pub key: u32,
    pub value: u32,
    pub osversion: u32,
    pub hwcap: u64,
}

/// Builds cache images field by field.
#[derive(Debug, Clone, Default)]
pub struct CacheBuilder {
    pub legacy: Vec<(i32, u32, u32)>,
    pub entries: Vec<RawEntry>,
    pub strings: Vec<u8>,
    /// Overrides the declared string length.
    pub strings_len: Option<u32>,
    /// Overrides the declared new entry count.
    pub new_count: Option<u32>,
}

impl CacheBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a string to the payload and returns its payload offset.
    pub fn string(&mut self, s: &str) -> u32 {
        let offset = self.strings.len() as u32;
        self.strings.extend_from_slice(s.as_bytes());
        self.strings.push(0);
        offset
    }

    /// Adds an entry resolving `key` to `value`.
    pub fn library(&mut self, flags: i16, key: &str, value: &str) -> &mut Self {
        let key = self.string(key);
        let value = self.string(value);
        self.entries.push(RawEntry {
            flags,
            key,
            value,
            osversion: 0,
            hwcap: 0,
        });
        self
    }

    pub fn legacy_entry(&mut self, flags: i32, key: u32, value: u32) -> &mut Self {
        self.legacy.push((flags, key, value));
        self
    }

    /// Returns the absolute offset at which the new header is written.
    pub fn new_header_offset(&self) -> usize {
        let end = MAGIC_OLD.len() + 4 + self.legacy.len() * 12;
        (end + 7) & !7
    }

    /// Returns the distance from the new header to the string payload.
    pub fn strings_base(&self) -> u32 {
        (48 + self.entries.len() * 24) as u32
    }

    /// Returns the total length of the built image.
    pub fn len(&self) -> usize {
        self.new_header_offset() + self.strings_base() as usize + self.strings.len()
    }

    pub fn build(&self) -> Vec<u8> {
        let mut data = Vec::new();

        data.extend_from_slice(MAGIC_OLD);
        data.write_u32::<LittleEndian>(self.legacy.len() as u32).unwrap();
        for &(flags, key, value) in &self.legacy {
            data.write_i32::<LittleEndian>(flags).unwrap();
            data.write_u32::<LittleEndian>(key).unwrap();
            data.write_u32::<LittleEndian>(value).unwrap();
        }
        data.resize(self.new_header_offset(), 0);

        data.extend_from_slice(MAGIC_NEW);
        let count = self.new_count.unwrap_or(self.entries.len() as u32);
        data.write_u32::<LittleEndian>(count).unwrap();
        let strings_len = self.strings_len.unwrap_or(self.strings.len() as u32);
        data.write_u32::<LittleEndian>(strings_len).unwrap();
        data.extend_from_slice(&[0u8; 20]);

        let base = self.strings_base();
        for entry in &self.entries {
            data.write_i16::<LittleEndian>(entry.flags).unwrap();
            data.write_u16::<LittleEndian>(0).unwrap();
            data.write_u32::<LittleEndian>(entry.key.saturating_add(base)).unwrap();
            data.write_u32::<LittleEndian>(entry.value.saturating_add(base)).unwrap();
            data.write_u32::<LittleEndian>(entry.osversion).unwrap();
            data.write_u64::<LittleEndian>(entry.hwcap).unwrap();
        }
        data.extend_from_slice(&self.strings);
        data
    }
}

/// A small but realistic cache: two architectures of libc plus libm.
pub fn sample_cache() -> Vec<u8> {
    let mut builder = CacheBuilder::new();
    builder
        .legacy_entry(1, 0, 0)
        .legacy_entry(1, 0, 0)
        .library(0x0303, "libm.so.6", "/lib/x86_64-linux-gnu/libm.so.6")
        .library(0x0303, "libc.so.6", "/lib/x86_64-linux-gnu/libc.so.6")
        .library(0x0801, "libc.so.6", "/lib/i386-linux-gnu/libc.so.6");
    builder.entries[2].osversion = 0x0003_0200;
    builder.entries[2].hwcap = 0x4000_0000_0000_0000;
    builder.build()
}
