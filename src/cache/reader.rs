//! Parse stages for the two nested cache formats.
//!
//! The file is laid out as follows, with the new format living inside what
//! the legacy format considers its string table:
//!
//! ```text
//! "ld.so-1.7.0" nlibs               legacy header (15 bytes)
//! libs[0] .. libs[nlibs-1]          legacy entries (12 bytes each)
//! pad                               up to an 8 byte boundary
//! "glibc-ld.so.cache1.1" nlibs      new header (48 bytes), new strtab origin
//!   stringslen unused[5]
//! libs[0] .. libs[nlibs-1]          new entries (24 bytes each)
//! strings                           stringslen bytes, last byte is NUL
//! ```
//!
//! Each stage takes the cursor left behind by the previous one. The stages
//! must run in order: [`read_legacy`], [`locate_overlay`], [`read_new`],
//! [`validate_strings`].

use zerocopy::FromBytes;

use super::cursor::BoundsCursor;
use super::structs::*;
use super::view::CacheEntry;
use crate::error::{CacheFormat, Error, Result};

/// The legacy header and its entry table.
#[derive(Debug, Clone, Copy)]
pub struct LegacySection<'a> {
    /// Decoded header
    pub header: LegacyHeader,
    /// Entry table
    pub entries: &'a [LegacyEntry],
    /// Absolute offset of the legacy string table
    pub strtab_offset: usize,
}

/// The new header and its entry table.
#[derive(Debug, Clone, Copy)]
pub struct NewSection<'a> {
    /// Decoded header
    pub header: NewHeader,
    /// Entry table
    pub entries: &'a [NewEntry],
    /// Absolute offset of the header, which is also the string table origin
    pub strtab_offset: usize,
}

fn entry_slice<'a, T>(bytes: &'a [u8], offset: usize, len: usize) -> Result<&'a [T]>
where
    T: FromBytes + zerocopy::KnownLayout + zerocopy::Immutable + zerocopy::Unaligned,
{
    <[T]>::ref_from_bytes(bytes).map_err(|_| Error::truncated(offset, bytes.len() as u64, len))
}

/// Reads the legacy header and skips over its entries.
///
/// The magic is checked before the entry table is touched.
pub fn read_legacy<'a>(cursor: &mut BoundsCursor<'a>) -> Result<LegacySection<'a>> {
    let header: LegacyHeader = cursor.read()?;
    if !header.is_valid() {
        return Err(Error::magic_mismatch(
            CacheFormat::Legacy,
            CACHE_MAGIC_OLD,
            &header.magic,
        ));
    }

    let offset = cursor.position();
    let bytes = cursor.read_array::<LegacyEntry>(header.nlibs.get())?;
    let entries = entry_slice(bytes, offset, cursor.data().len())?;

    Ok(LegacySection {
        header,
        entries,
        strtab_offset: cursor.position(),
    })
}

/// Moves the cursor to the embedded new header and confirms its magic.
///
/// Returns the absolute offset of the new header. The cursor is left on the
/// header, which is not consumed.
pub fn locate_overlay(cursor: &mut BoundsCursor<'_>) -> Result<usize> {
    cursor.align_to(NEW_HEADER_ALIGN)?;

    let magic = cursor.peek(CACHE_MAGIC_NEW.len() as u64)?;
    if magic != CACHE_MAGIC_NEW {
        return Err(Error::magic_mismatch(CacheFormat::New, CACHE_MAGIC_NEW, magic));
    }

    Ok(cursor.position())
}

/// Reads the new header, its entries and skips the string payload.
///
/// On success the cursor sits just past the last byte the headers account for.
pub fn read_new<'a>(cursor: &mut BoundsCursor<'a>) -> Result<NewSection<'a>> {
    let strtab_offset = cursor.position();
    let header: NewHeader = cursor.read()?;
    if !header.is_valid() {
        return Err(Error::magic_mismatch(
            CacheFormat::New,
            CACHE_MAGIC_NEW,
            &header.magic,
        ));
    }

    let offset = cursor.position();
    let bytes = cursor.read_array::<NewEntry>(header.nlibs.get())?;
    let entries = entry_slice(bytes, offset, cursor.data().len())?;

    cursor.advance(u64::from(header.stringslen.get()))?;

    Ok(NewSection {
        header,
        entries,
        strtab_offset,
    })
}

/// Checks that the structure covers the file exactly and resolves every
/// entry's key and value.
pub fn validate_strings<'a>(
    cursor: &BoundsCursor<'a>,
    section: &NewSection<'a>,
) -> Result<Vec<CacheEntry<'a>>> {
    let data = cursor.data();
    let end = cursor.position();

    if end != data.len() {
        return Err(Error::OverreadOrUnderread {
            consumed: end as u64,
            file_size: data.len() as u64,
        });
    }

    match data.last() {
        Some(0) => {}
        Some(&found) => return Err(Error::MissingTerminator { found }),
        None => return Err(Error::truncated(0, NewHeader::SIZE as u64, 0)),
    }

    let strings = data;
    section
        .entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let key = resolve_string(strings, section.strtab_offset, index, entry.key.get())?;
            let value = resolve_string(strings, section.strtab_offset, index, entry.value.get())?;
            Ok(CacheEntry {
                flags: entry.flags.get(),
                key,
                key_offset: entry.key.get(),
                value,
                value_offset: entry.value.get(),
                os_version: entry.osversion.get(),
                hwcap: entry.hwcap.get(),
            })
        })
        .collect()
}

/// Resolves `origin + offset` to a NUL-terminated string inside `strings`.
fn resolve_string<'a>(
    strings: &'a [u8],
    origin: usize,
    entry: usize,
    offset: u32,
) -> Result<&'a str> {
    let limit = strings.len() as u64;
    let start = origin as u64 + u64::from(offset);
    if start >= limit {
        return Err(Error::StringOffsetOutOfBounds { entry, offset, limit });
    }

    let tail = &strings[start as usize..];
    let len = memchr::memchr(0, tail).ok_or(Error::UnterminatedString { entry, offset })?;
    std::str::from_utf8(&tail[..len]).map_err(|_| Error::InvalidUtf8 { entry, offset })
}
