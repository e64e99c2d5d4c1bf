use std::io::Write;

use serde::Serialize;

use crate::cli::app::RowFormat;
use crate::cli::{load_columns, open_data_file, wprintln};
use crate::heap::attribute::ColumnDescriptor;
use crate::heap::extract::{extract_page, DecodedTuple, TupleOutcome};
use crate::heap::field_decode::FieldValue;
use crate::heap::page::decode_page;
use crate::heap::tuple::ItemPointer;
use crate::PduError;

/// Options for the `pdu unload` subcommand.
pub struct UnloadOptions {
    /// Path to the heap data file.
    pub file: String,
    /// JSON schema file.
    pub schema: Option<String>,
    /// Table name within the schema file.
    pub table: Option<String>,
    /// Row output format.
    pub format: RowFormat,
    /// Unload a single page instead of the whole file.
    pub page: Option<u64>,
    /// Use memory-mapped I/O for file access.
    pub mmap: bool,
}

#[derive(Serialize)]
struct RowJson<'a> {
    page: u64,
    item: u16,
    ctid: String,
    xmin: u32,
    xmax: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    values: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    natts: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    infomask: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<&'a str>,
}

#[derive(Default)]
struct UnloadStats {
    pages: u64,
    skipped_pages: u64,
    rows: u64,
    unreadable: u64,
    warnings: u64,
}

/// Quote a CSV field when it contains a separator, quote or newline.
fn csv_escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Quote an SQL identifier unless it is a plain lowercase name.
fn sql_ident(name: &str) -> String {
    let plain = name
        .split('.')
        .all(|part| {
            !part.is_empty()
                && part
                    .bytes()
                    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
                && !part.as_bytes()[0].is_ascii_digit()
        });
    if plain {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

struct RowWriter<'a> {
    format: RowFormat,
    columns: Option<&'a [ColumnDescriptor]>,
    table: &'a str,
}

impl RowWriter<'_> {
    fn header(&self, writer: &mut dyn Write) -> Result<(), PduError> {
        if self.format != RowFormat::Csv {
            return Ok(());
        }
        let mut names = vec!["page".to_string(), "item".to_string(), "xmin".to_string(), "xmax".to_string()];
        match self.columns {
            Some(cols) => names.extend(cols.iter().map(|c| csv_escape(&c.name))),
            None => names.extend(["natts".to_string(), "infomask".to_string()]),
        }
        wprintln!(writer, "{}", names.join(","))
    }

    /// Column values in schema order; columns not decoded are NULL.
    fn full_values(&self, tuple: &DecodedTuple) -> Vec<FieldValue> {
        let cols = self.columns.unwrap_or(&[]);
        (0..cols.len())
            .map(|i| {
                tuple
                    .columns
                    .get(i)
                    .map(|c| c.value.clone())
                    .unwrap_or(FieldValue::Null)
            })
            .collect()
    }

    fn row(&self, writer: &mut dyn Write, page: u64, tuple: &DecodedTuple) -> Result<(), PduError> {
        let h = &tuple.header;
        match self.format {
            RowFormat::Json => {
                let values = self.columns.map(|_| {
                    tuple
                        .values()
                        .map(|(name, v)| {
                            (
                                name.to_string(),
                                serde_json::to_value(v).unwrap_or(serde_json::Value::Null),
                            )
                        })
                        .collect()
                });
                let header_only = self.columns.is_none();
                let row = RowJson {
                    page,
                    item: tuple.item,
                    ctid: ItemPointer {
                        block: page as u32,
                        offset: tuple.item,
                    }
                    .to_string(),
                    xmin: h.xmin,
                    xmax: h.xmax,
                    values,
                    natts: header_only.then(|| h.natts()),
                    infomask: header_only.then_some(h.infomask),
                    warning: tuple.warning.as_deref(),
                };
                let json = serde_json::to_string(&row)
                    .map_err(|e| PduError::Parse(format!("JSON serialization error: {}", e)))?;
                wprintln!(writer, "{}", json)
            }
            RowFormat::Csv => {
                let mut fields = vec![page.to_string(), tuple.item.to_string(), h.xmin.to_string(), h.xmax.to_string()];
                match self.columns {
                    Some(_) => fields.extend(
                        self.full_values(tuple)
                            .iter()
                            .map(|v| csv_escape(&v.to_string())),
                    ),
                    None => fields.extend([h.natts().to_string(), format!("0x{:04x}", h.infomask)]),
                }
                wprintln!(writer, "{}", fields.join(","))
            }
            RowFormat::Sql => {
                let cols = self.columns.unwrap_or(&[]);
                let names: Vec<String> = cols.iter().map(|c| sql_ident(&c.name)).collect();
                let values: Vec<String> = self
                    .full_values(tuple)
                    .iter()
                    .map(FieldValue::sql_literal)
                    .collect();
                if let Some(w) = &tuple.warning {
                    wprintln!(writer, "-- page {} item {}: {}", page, tuple.item, w)?;
                }
                wprintln!(
                    writer,
                    "INSERT INTO {} ({}) VALUES ({});",
                    sql_ident(self.table),
                    names.join(", "),
                    values.join(", ")
                )
            }
        }
    }
}

/// Decode every live tuple of a heap data file and write the rows.
///
/// With `--schema` and `--table` the column layout is taken from the
/// schema file and each row carries its decoded column values; without a
/// schema only tuple header fields are written. Pages that fail validation
/// and tuples that cannot be decoded are skipped with a diagnostic; a
/// summary is printed to stderr when the run finishes.
pub fn execute(opts: &UnloadOptions, writer: &mut dyn Write) -> Result<(), PduError> {
    if opts.format == RowFormat::Sql && opts.schema.is_none() {
        return Err(PduError::Argument(
            "SQL output requires --schema and --table".to_string(),
        ));
    }

    let df = open_data_file(&opts.file, opts.mmap)?;
    let columns = load_columns(opts.schema.as_deref(), opts.table.as_deref())?;
    if opts.format == RowFormat::Sql && columns.is_none() {
        return Err(PduError::Argument(format!(
            "table {} not found in schema file",
            opts.table.as_deref().unwrap_or("")
        )));
    }

    let range = match opts.page {
        Some(p) if p >= df.page_count() => {
            return Err(PduError::Argument(format!(
                "Page {} out of range (file has {} pages)",
                p,
                df.page_count()
            )))
        }
        Some(p) => p..p + 1,
        None => 0..df.page_count(),
    };

    let rows = RowWriter {
        format: opts.format,
        columns: columns.as_deref(),
        table: opts.table.as_deref().unwrap_or("recovered"),
    };
    rows.header(writer)?;

    let mut stats = UnloadStats::default();
    for page_num in range {
        stats.pages += 1;
        let block = match df.read_block(page_num) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(page = page_num, error = %e, "page read failed");
                stats.skipped_pages += 1;
                continue;
            }
        };
        let page = match decode_page(&block, df.page_size()) {
            Ok(p) => p,
            Err(e) => {
                tracing::debug!(page = page_num, error = %e, "page skipped");
                stats.skipped_pages += 1;
                continue;
            }
        };

        for outcome in extract_page(&page, columns.as_deref()).tuples {
            match outcome {
                TupleOutcome::Decoded(t) => {
                    if t.warning.is_some() {
                        stats.warnings += 1;
                    }
                    rows.row(writer, page_num, &t)?;
                    stats.rows += 1;
                }
                TupleOutcome::Unreadable(u) => {
                    tracing::warn!(page = page_num, item = u.item, reason = %u.reason, "unreadable tuple");
                    stats.unreadable += 1;
                }
            }
        }
    }

    eprintln!(
        "Unloaded {} rows from {} pages ({} pages skipped, {} unreadable tuples, {} partial rows)",
        stats.rows, stats.pages, stats.skipped_pages, stats.unreadable, stats.warnings
    );
    Ok(())
}
