//! Heap file binary format decoding.
//!
//! Types and functions for reading the on-disk structures of heap data
//! files: page headers and line pointers, tuple headers with their null
//! bitmaps, attribute values (including inline-compressed and out-of-line
//! varlena forms), and a recovery scanner for damaged byte streams.
//!
//! Start with [`source::DataFile`] to read blocks, decode them with
//! [`page::decode_page`], and pull rows out with [`extract::extract_page`].
//! For damaged files or disk images use [`scanner::Scanner`].

pub mod attribute;
pub mod catalog;
pub mod compression;
pub mod constants;
pub mod extract;
pub mod field_decode;
pub mod page;
pub mod scanner;
pub mod source;
pub mod tuple;
