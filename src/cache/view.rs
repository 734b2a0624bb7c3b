//! The validated, read-only view of a cache.

use super::cursor::BoundsCursor;
use super::reader::{locate_overlay, read_legacy, read_new, validate_strings};
use super::structs::*;
use crate::error::Result;

// =============================================================================
// Cache Entry
// =============================================================================

/// A library entry from the new format, with both strings resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheEntry<'a> {
    /// Raw flags, passed through unchanged
    pub flags: i16,
    /// Library name (e.g., "libc.so.6")
    pub key: &'a str,
    /// Offset of `key` from the string table origin
    pub key_offset: u32,
    /// Library path (e.g., "/lib/x86_64-linux-gnu/libc.so.6")
    pub value: &'a str,
    /// Offset of `value` from the string table origin
    pub value_offset: u32,
    /// Required OS version
    pub os_version: u32,
    /// Hardware capability mask
    pub hwcap: u64,
}

impl<'a> CacheEntry<'a> {
    /// Returns the flags as marker bits.
    #[inline]
    pub fn flag_bits(&self) -> EntryFlags {
        EntryFlags::from_raw(self.flags)
    }

    /// Returns a short architecture label, if the flags carry one.
    pub fn arch_name(&self) -> Option<&'static str> {
        self.flag_bits().arch_name()
    }

    /// Returns true if the key or the value contains `filter`.
    pub fn matches_filter(&self, filter: &str) -> bool {
        self.key.contains(filter) || self.value.contains(filter)
    }
}

// =============================================================================
// Header Summaries
// =============================================================================

/// Summary of the legacy header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyHeaderInfo {
    /// Magic text
    pub magic: &'static str,
    /// Number of legacy entries
    pub entry_count: u32,
    /// Absolute offset of the legacy string table
    pub strtab_offset: usize,
}

/// Summary of the new header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewHeaderInfo {
    /// Magic text
    pub magic: &'static str,
    /// Number of new entries
    pub entry_count: u32,
    /// Declared length of the string payload
    pub strings_len: u32,
    /// Absolute offset of the header and of the new string table
    pub strtab_offset: usize,
}

// =============================================================================
// Cache View
// =============================================================================

/// A fully validated ld.so.cache.
///
/// All validation happens in [`CacheView::parse`], so none of the accessors
/// can fail. Strings borrow from the parsed bytes.
#[derive(Debug, Clone)]
pub struct CacheView<'a> {
    data: &'a [u8],
    legacy: LegacyHeaderInfo,
    legacy_entries: &'a [LegacyEntry],
    header: NewHeaderInfo,
    entries: Vec<CacheEntry<'a>>,
}

impl<'a> CacheView<'a> {
    /// Parses and validates a complete cache.
    ///
    /// The first problem found aborts the parse; no partial view is returned.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let mut cursor = BoundsCursor::new(data);

        let legacy = read_legacy(&mut cursor)?;
        locate_overlay(&mut cursor)?;
        let new = read_new(&mut cursor)?;
        let entries = validate_strings(&cursor, &new)?;

        Ok(Self {
            data,
            legacy: LegacyHeaderInfo {
                magic: magic_text(CACHE_MAGIC_OLD),
                entry_count: legacy.header.nlibs.get(),
                strtab_offset: legacy.strtab_offset,
            },
            legacy_entries: legacy.entries,
            header: NewHeaderInfo {
                magic: magic_text(CACHE_MAGIC_NEW),
                entry_count: new.header.nlibs.get(),
                strings_len: new.header.stringslen.get(),
                strtab_offset: new.strtab_offset,
            },
            entries,
        })
    }

    /// Returns the number of new-format entries.
    #[inline]
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the cache has no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the entry at `index`.
    #[inline]
    pub fn entry(&self, index: usize) -> Option<&CacheEntry<'a>> {
        self.entries.get(index)
    }

    /// Returns all entries in file order.
    #[inline]
    pub fn entries(&self) -> &[CacheEntry<'a>] {
        &self.entries
    }

    /// Returns an iterator over all entries.
    pub fn iter(&self) -> impl Iterator<Item = &CacheEntry<'a>> {
        self.entries.iter()
    }

    /// Returns the legacy header summary.
    pub fn legacy_header(&self) -> &LegacyHeaderInfo {
        &self.legacy
    }

    /// Returns the raw legacy entries.
    ///
    /// Their offsets address the legacy string table and are not resolved.
    pub fn legacy_entries(&self) -> &'a [LegacyEntry] {
        self.legacy_entries
    }

    /// Returns the new header summary.
    pub fn new_header(&self) -> &NewHeaderInfo {
        &self.header
    }

    /// Returns the absolute offset of the new string table.
    pub fn string_table_origin(&self) -> usize {
        self.header.strtab_offset
    }

    /// Returns the size of the parsed region in bytes.
    pub fn file_size(&self) -> usize {
        self.data.len()
    }

    /// Finds the first entry whose key is exactly `name`.
    pub fn find(&self, name: &str) -> Option<&CacheEntry<'a>> {
        self.entries.iter().find(|entry| entry.key == name)
    }

    /// Returns every entry whose key is exactly `name`.
    ///
    /// A library built for several architectures appears once per variant.
    pub fn find_all<'s>(&'s self, name: &'s str) -> impl Iterator<Item = &'s CacheEntry<'a>> {
        self.entries.iter().filter(move |entry| entry.key == name)
    }

    /// Returns entries whose key or value contains `filter`.
    pub fn filter<'s>(&'s self, filter: &'s str) -> impl Iterator<Item = &'s CacheEntry<'a>> {
        self.entries
            .iter()
            .filter(move |entry| entry.matches_filter(filter))
    }
}

impl<'s, 'a> IntoIterator for &'s CacheView<'a> {
    type Item = &'s CacheEntry<'a>;
    type IntoIter = std::slice::Iter<'s, CacheEntry<'a>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

fn magic_text(magic: &'static [u8]) -> &'static str {
    std::str::from_utf8(magic).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    /// Builds `legacy header | pad | new header | entries | strings`.
    ///
    /// Entry offsets are given relative to the start of `strings` and are
    /// rebased onto the new header, which is where the format measures them.
    fn build(entries: &[(i16, u32, u32, u32, u64)], strings: &[u8]) -> Vec<u8> {
        let base = (NewHeader::SIZE + entries.len() * NewEntry::SIZE) as u32;
        let mut data = CACHE_MAGIC_OLD.to_vec();
        data.extend_from_slice(&0u32.to_le_bytes());
        data.push(0);

        data.extend_from_slice(CACHE_MAGIC_NEW);
        data.extend_from_slice(&(entries.len() as u32).to_le_bytes());
        data.extend_from_slice(&(strings.len() as u32).to_le_bytes());
        data.extend_from_slice(&[0u8; 20]);
        for &(flags, key, value, osversion, hwcap) in entries {
            data.extend_from_slice(&flags.to_le_bytes());
            data.extend_from_slice(&[0, 0]);
            data.extend_from_slice(&(base + key).to_le_bytes());
            data.extend_from_slice(&(base + value).to_le_bytes());
            data.extend_from_slice(&osversion.to_le_bytes());
            data.extend_from_slice(&hwcap.to_le_bytes());
        }
        data.extend_from_slice(strings);
        data
    }

    #[test]
    fn test_single_entry() {
        let data = build(&[(1, 0, 4, 0, 0)], b"foo\0bar\0");
        let view = CacheView::parse(&data).unwrap();

        assert_eq!(view.entry_count(), 1);
        let entry = view.entry(0).unwrap();
        assert_eq!(entry.flags, 1);
        assert_eq!(entry.key, "foo");
        assert_eq!(entry.key_offset, 72);
        assert_eq!(entry.value, "bar");
        assert_eq!(entry.value_offset, 76);
        assert_eq!(entry.os_version, 0);
        assert_eq!(entry.hwcap, 0);
        assert!(view.entry(1).is_none());

        assert_eq!(view.legacy_header().magic, "ld.so-1.7.0");
        assert_eq!(view.legacy_header().entry_count, 0);
        assert_eq!(view.new_header().magic, "glibc-ld.so.cache1.1");
        assert_eq!(view.new_header().entry_count, 1);
        assert_eq!(view.new_header().strings_len, 8);
        assert_eq!(view.string_table_origin(), 16);
    }

    #[test]
    fn test_lookup_helpers() {
        let strings = b"libc.so.6\0/lib64/libc.so.6\0/lib/libc.so.6\0libm.so.6\0/lib64/libm.so.6\0";
        let data = build(
            &[
                (0x0303, 0, 10, 0, 0),
                (0x0801, 0, 27, 0, 0),
                (0x0303, 42, 52, 0, 0),
            ],
            strings,
        );
        let view = CacheView::parse(&data).unwrap();

        let libc = view.find("libc.so.6").unwrap();
        assert_eq!(libc.value, "/lib64/libc.so.6");
        assert_eq!(libc.arch_name(), Some("x86-64"));
        assert_eq!(view.find_all("libc.so.6").count(), 2);
        assert_eq!(view.filter("lib64").count(), 2);
        assert_eq!(view.filter("libm").count(), 1);
        assert!(view.find("libz.so.1").is_none());
        assert_eq!((&view).into_iter().count(), 3);
    }

    #[test]
    fn test_empty_cache() {
        let data = build(&[], b"\0");
        let view = CacheView::parse(&data).unwrap();
        assert!(view.is_empty());
        assert_eq!(view.file_size(), data.len());
    }

    #[test]
    fn test_trailing_bytes() {
        let mut data = build(&[(1, 0, 4, 0, 0)], b"foo\0bar\0");
        data.push(0);
        let err = CacheView::parse(&data).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OverreadOrUnderread);
    }

    #[test]
    fn test_short_string_payload() {
        let mut data = build(&[(1, 0, 4, 0, 0)], b"foo\0bar\0");
        data.truncate(data.len() - 1);
        let err = CacheView::parse(&data).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TruncatedFile);
    }

    #[test]
    fn test_offsets_are_relative_to_new_header() {
        let mut data = build(&[(1, 0, 4, 0, 0)], b"foo\0bar\0");
        // Point the key at offset 0: the new magic, followed by nlibs = 1.
        data[16 + 48 + 4..16 + 48 + 8].copy_from_slice(&0u32.to_le_bytes());

        let view = CacheView::parse(&data).unwrap();
        assert_eq!(view.entry(0).unwrap().key, "glibc-ld.so.cache1.1\u{1}");
        assert_eq!(view.entry(0).unwrap().value, "bar");
    }

    #[test]
    fn test_value_offset_out_of_bounds() {
        let data = build(&[(1, 0, 8, 0, 0)], b"foo\0bar\0");
        let err = CacheView::parse(&data).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StringOffsetOutOfBounds);
    }
}
