//! ld.so.cache handling.
//!
//! This module provides types and utilities for parsing the cache that the
//! glibc dynamic linker consults to resolve library names to paths.
//!
//! # Cache Structure
//!
//! A cache file nests two formats:
//! - The legacy `ld.so-1.7.0` header and its entry table
//! - The `glibc-ld.so.cache1.1` format, embedded at an 8 byte aligned offset
//!   inside what the legacy format treats as its string table
//! - A shared string table, addressed from the start of the new header
//!
//! Only files carrying the new format are accepted.

mod cursor;
pub mod reader;
mod source;
mod structs;
mod view;

pub use cursor::*;
pub use source::*;
pub use structs::*;
pub use view::*;
