//! CLI subcommand implementations for the `pdu` binary.
//!
//! Argument parsing uses clap derive macros; the top-level [`app::Cli`]
//! struct and [`app::Commands`] enum live in [`app`] and are shared with
//! `build.rs` (man pages and shell completions) via `include!()`.
//!
//! Each subcommand module has an `Options` struct holding the parsed
//! arguments and a `pub fn execute(opts, writer) -> Result<(), PduError>`
//! entry point. Output goes to a `&mut dyn Write` so tests can capture it
//! and the global `--output` flag can redirect it.
//!
//! | Command | Module | Purpose |
//! |---------|--------|---------|
//! | `pdu info` | [`info`] | Page header and line pointer summary |
//! | `pdu scan` | [`scan`] | Classify pages of every data file in a directory |
//! | `pdu unload` | [`unload`] | Decode live tuples to JSON, CSV or SQL |
//! | `pdu dropscan` | [`dropscan`] | Recover pages from an arbitrary byte stream |
//!
//! Diagnostics (skipped pages, rejected candidates) go to stderr through
//! `tracing`; the `wprintln!` macro wraps `writeln!` and converts
//! `io::Error` into `PduError`.

pub mod app;
pub mod dropscan;
pub mod info;
pub mod scan;
pub mod unload;

/// Write a line to the given writer, converting io::Error to PduError.
macro_rules! wprintln {
    ($w:expr) => {
        writeln!($w).map_err(|e| $crate::PduError::Io(e.to_string()))
    };
    ($w:expr, $($arg:tt)*) => {
        writeln!($w, $($arg)*).map_err(|e| $crate::PduError::Io(e.to_string()))
    };
}

pub(crate) use wprintln;

use crate::heap::attribute::ColumnDescriptor;
use crate::heap::catalog::{SchemaFile, SchemaSource};
use crate::heap::constants::BLCKSZ;
use crate::heap::source::{ByteSource, DataFile, FileSource, MmapSource};
use crate::PduError;
use indicatif::{ProgressBar, ProgressStyle};

/// Open a data file, selecting mmap or buffered I/O based on the flag.
pub(crate) fn open_data_file(
    path: &str,
    use_mmap: bool,
) -> Result<DataFile<Box<dyn ByteSource>>, PduError> {
    let source: Box<dyn ByteSource> = if use_mmap {
        Box::new(MmapSource::open(path)?)
    } else {
        Box::new(FileSource::open(path)?)
    };
    DataFile::new(source, BLCKSZ)
}

/// Resolve `--schema` / `--table` into a column layout.
///
/// A table missing from the schema file is not an error: the caller falls
/// back to header-only output.
pub(crate) fn load_columns(
    schema: Option<&str>,
    table: Option<&str>,
) -> Result<Option<Vec<ColumnDescriptor>>, PduError> {
    let (Some(schema_path), Some(table)) = (schema, table) else {
        return Ok(None);
    };
    let schema = SchemaFile::load(schema_path)?;
    let columns = schema.resolve_columns(table);
    if columns.is_none() {
        tracing::warn!(
            table,
            known = ?schema.tables(),
            "table not found in schema file, decoding tuple headers only"
        );
    }
    Ok(columns)
}

/// Create a styled progress bar for iterating over pages, files or bytes.
pub(crate) fn create_progress_bar(count: u64, unit: &str) -> ProgressBar {
    let pb = ProgressBar::new(count);
    let style = ProgressStyle::default_bar()
        .template(&format!(
            "{{spinner:.green}} [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {} ({{eta}})",
            unit
        ))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb
}
