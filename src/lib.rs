//! Offline heap file decoding and disaster-recovery toolkit.
//!
//! The `pgheap-utils` crate (library name `pdu`) reconstructs rows from
//! heap data files without a running database server: it validates page
//! headers, walks line pointers, decodes tuple headers and attribute
//! values using a column layout supplied by the caller, and scans damaged
//! files or raw disk images for pages that are no longer reachable by
//! block address.
//!
//! # CLI Reference
//!
//! | Command | Purpose |
//! |---------|---------|
//! | [`pdu info`](cli::app::Commands::Info) | Page header and line pointer summary |
//! | [`pdu scan`](cli::app::Commands::Scan) | Classify every page of every data file in a directory |
//! | [`pdu unload`](cli::app::Commands::Unload) | Decode live tuples to JSON, CSV or SQL |
//! | [`pdu dropscan`](cli::app::Commands::Dropscan) | Recover pages from an arbitrary byte stream |
//! | [`pdu completions`](cli::app::Commands::Completions) | Generate shell completions |
//!
//! All subcommands accept `--color <auto|always|never>`, `--output <file>`,
//! `--threads`, `--mmap` and `--log-level`.
//!
//! # Library API
//!
//! ```no_run
//! use pdu::heap::catalog::{SchemaFile, SchemaSource};
//! use pdu::heap::extract::{extract_page, TupleOutcome};
//! use pdu::heap::page::decode_page;
//! use pdu::heap::source::DataFile;
//!
//! let file = DataFile::open("base/16384/16400").unwrap();
//! let schema = SchemaFile::load("schema.json").unwrap();
//! let columns = schema.resolve_columns("public.accounts").unwrap();
//!
//! let block = file.read_block(0).unwrap();
//! let page = decode_page(&block, file.page_size()).unwrap();
//! for outcome in extract_page(&page, Some(&columns)).tuples {
//!     if let TupleOutcome::Decoded(row) = outcome {
//!         for (name, value) in row.values() {
//!             println!("{} = {}", name, value);
//!         }
//!     }
//! }
//! ```
//!
//! ## Module overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`heap::constants`] | Page, line pointer, tuple and varlena layout constants |
//! | [`heap::page`] | Page header and line pointer decoding |
//! | [`heap::tuple`] | Tuple header and null bitmap decoding |
//! | [`heap::attribute`] | Attribute value decoding against column descriptors |
//! | [`heap::compression`] | pglz and LZ4 inline decompression |
//! | [`heap::field_decode`] | Typed rendering of attribute bytes |
//! | [`heap::extract`] | Per-page tuple extraction |
//! | [`heap::scanner`] | Disaster-recovery page scanner |
//! | [`heap::source`] | Byte sources and block-addressed data files |
//! | [`heap::catalog`] | Column layout sources (JSON schema files) |
//!
//! ## Feature flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli` | on | The `pdu` binary, memory-mapped sources |
//! | `parallel` | on (via `cli`) | Region-parallel scanning with `rayon` |

#[cfg(feature = "cli")]
pub mod cli;
pub mod heap;
pub mod util;

use thiserror::Error;

/// Errors returned by `pdu` operations.
#[derive(Error, Debug)]
pub enum PduError {
    /// An I/O error occurred (file open, read, seek, or write failure).
    #[error("I/O error: {0}")]
    Io(String),

    /// A parse error occurred (malformed schema file or unexpected values).
    #[error("Parse error: {0}")]
    Parse(String),

    /// An invalid argument was supplied (out-of-range page number, bad option, etc.).
    #[error("Invalid argument: {0}")]
    Argument(String),
}
