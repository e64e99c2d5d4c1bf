use std::io::Write;
use std::ops::Range;

use colored::Colorize;
use serde::Serialize;

use crate::cli::{open_data_file, wprintln};
use crate::heap::page::{decode_page, ItemId, PageHeader};
use crate::heap::source::{ByteSource, DataFile};
use crate::PduError;

/// Options for the `pdu info` subcommand.
pub struct InfoOptions {
    /// Path to the heap data file.
    pub file: String,
    /// Show a single page instead of every page.
    pub page: Option<u64>,
    /// List every line pointer.
    pub verbose: bool,
    /// Emit output as JSON.
    pub json: bool,
    /// Use memory-mapped I/O for file access.
    pub mmap: bool,
}

#[derive(Serialize)]
struct InfoReport {
    file: String,
    file_size: u64,
    page_size: usize,
    page_count: u64,
    #[serde(skip_serializing_if = "is_zero")]
    trailing_bytes: u64,
    pages: Vec<PageInfo>,
}

fn is_zero(v: &u64) -> bool {
    *v == 0
}

#[derive(Serialize)]
struct PageInfo {
    page: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    header: Option<PageHeader>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    line_pointers: usize,
    live: usize,
    free_space: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    items: Vec<ItemId>,
}

fn inspect(block: &[u8], page: u64, page_size: usize, with_items: bool) -> PageInfo {
    match decode_page(block, page_size) {
        Ok(p) => PageInfo {
            page,
            header: Some(p.header),
            error: None,
            line_pointers: p.items.len(),
            live: p.live_count(),
            free_space: p.header.free_space(),
            items: if with_items { p.items.clone() } else { Vec::new() },
        },
        Err(e) => PageInfo {
            page,
            header: PageHeader::parse(block),
            error: Some(e.to_string()),
            line_pointers: 0,
            live: 0,
            free_space: 0,
            items: Vec::new(),
        },
    }
}

/// Inspect each page in `range`; a page that cannot be read is reported
/// with the read error and the run continues.
fn inspect_range<S: ByteSource>(df: &DataFile<S>, range: Range<u64>, with_items: bool) -> Vec<PageInfo> {
    range
        .map(|page_num| match df.read_block(page_num) {
            Ok(block) => inspect(&block, page_num, df.page_size(), with_items),
            Err(e) => {
                tracing::warn!(page = page_num, error = %e, "page unreadable");
                PageInfo {
                    page: page_num,
                    header: None,
                    error: Some(e.to_string()),
                    line_pointers: 0,
                    live: 0,
                    free_space: 0,
                    items: Vec::new(),
                }
            }
        })
        .collect()
}

/// Display page headers and line pointer summaries of a heap data file.
///
/// For each page prints the LSN, checksum, flags, the `lower` / `upper` /
/// `special` layout words and the number of line pointers and live tuples.
/// Pages that fail validation are reported with the reason; an all-zero
/// page is reported as uninitialized. With `--verbose` every line pointer
/// is listed with its state, offset and length.
pub fn execute(opts: &InfoOptions, writer: &mut dyn Write) -> Result<(), PduError> {
    let df = open_data_file(&opts.file, opts.mmap)?;
    let page_size = df.page_size();

    let range = match opts.page {
        Some(p) => {
            if p >= df.page_count() {
                return Err(PduError::Argument(format!(
                    "Page {} out of range (file has {} pages)",
                    p,
                    df.page_count()
                )));
            }
            p..p + 1
        }
        None => 0..df.page_count(),
    };

    let pages = inspect_range(&df, range, opts.verbose || opts.json);

    if opts.json {
        let report = InfoReport {
            file: opts.file.clone(),
            file_size: df.file_size(),
            page_size,
            page_count: df.page_count(),
            trailing_bytes: df.trailing_bytes(),
            pages,
        };
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| PduError::Parse(format!("JSON serialization error: {}", e)))?;
        wprintln!(writer, "{}", json)?;
        return Ok(());
    }

    wprintln!(
        writer,
        "{} ({} bytes, {} pages of {} bytes)",
        opts.file.bold(),
        df.file_size(),
        df.page_count(),
        page_size
    )?;
    if df.trailing_bytes() > 0 {
        wprintln!(
            writer,
            "  {} {} trailing bytes after the last page",
            "warning:".yellow(),
            df.trailing_bytes()
        )?;
    }
    wprintln!(writer)?;

    for info in &pages {
        print_page(writer, info, opts.verbose)?;
    }
    Ok(())
}

fn print_page(writer: &mut dyn Write, info: &PageInfo, verbose: bool) -> Result<(), PduError> {
    if let Some(err) = &info.error {
        wprintln!(writer, "Page {}: {}", info.page, err.red())?;
        return Ok(());
    }
    let Some(h) = &info.header else {
        return Ok(());
    };

    wprintln!(
        writer,
        "Page {}: lsn={:X}/{:08X} checksum=0x{:04x} flags=0x{:04x} lower={} upper={} special={} version={} prune_xid={}",
        info.page,
        h.lsn_xlogid,
        h.lsn_xrecoff,
        h.checksum,
        h.flags,
        h.lower,
        h.upper,
        h.special,
        h.layout_version(),
        h.prune_xid
    )?;
    wprintln!(
        writer,
        "  line pointers: {}  live: {}  free space: {} bytes",
        info.line_pointers,
        format!("{}", info.live).green(),
        info.free_space
    )?;

    if verbose {
        for (idx, it) in info.items.iter().enumerate() {
            let inside = it.within(h.lower, h.special);
            let marker = if it.is_live() && !inside {
                " OUT OF BOUNDS".red().to_string()
            } else {
                String::new()
            };
            wprintln!(
                writer,
                "    ({:>3}) {:<12} off={:<5} len={}{}",
                idx + 1,
                it.state.name(),
                it.offset,
                it.length,
                marker
            )?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::constants::*;
    use byteorder::{BigEndian, ByteOrder};

    #[test]
    fn test_inspect_reports_uninitialized() {
        let info = inspect(&vec![0u8; BLCKSZ], 3, BLCKSZ, false);
        assert_eq!(info.page, 3);
        assert!(info.error.as_deref().unwrap().contains("uninitialized"));
    }

    #[test]
    fn test_inspect_counts_items() {
        let mut block = vec![0u8; BLCKSZ];
        BigEndian::write_u16(&mut block[PD_LOWER..], 32);
        BigEndian::write_u16(&mut block[PD_UPPER..], 8168);
        BigEndian::write_u16(&mut block[PD_SPECIAL..], 8192);
        BigEndian::write_u16(&mut block[24..], 8168);
        BigEndian::write_u16(&mut block[26..], (24 << LP_LEN_SHIFT) | LP_NORMAL);
        BigEndian::write_u16(&mut block[30..], LP_DEAD);
        let info = inspect(&block, 0, BLCKSZ, true);
        assert!(info.error.is_none());
        assert_eq!(info.line_pointers, 2);
        assert_eq!(info.live, 1);
        assert_eq!(info.free_space, 8168 - 32);
        assert_eq!(info.items.len(), 2);
    }

    /// Source whose second block cannot be read.
    struct BadSecondBlock(Vec<u8>);

    impl ByteSource for BadSecondBlock {
        fn len(&self) -> u64 {
            self.0.len() as u64
        }

        fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), PduError> {
            if offset == BLCKSZ as u64 {
                return Err(PduError::Io("bad sector".to_string()));
            }
            let start = offset as usize;
            buf.copy_from_slice(&self.0[start..start + buf.len()]);
            Ok(())
        }
    }

    #[test]
    fn test_unreadable_page_does_not_stop_run() {
        let df = DataFile::new(BadSecondBlock(vec![0u8; 3 * BLCKSZ]), BLCKSZ).unwrap();
        let pages = inspect_range(&df, 0..3, false);
        assert_eq!(pages.len(), 3);
        assert!(pages[0].error.as_deref().unwrap().contains("uninitialized"));
        assert!(pages[1].error.as_deref().unwrap().contains("bad sector"));
        assert!(pages[1].header.is_none());
        assert!(pages[2].error.as_deref().unwrap().contains("uninitialized"));
    }
}
