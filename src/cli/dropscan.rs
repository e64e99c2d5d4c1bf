use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use indicatif::ProgressBar;

use crate::cli::{create_progress_bar, load_columns, open_data_file, wprintln};
use crate::heap::attribute::ColumnDescriptor;
use crate::heap::extract::TupleOutcome;
use crate::heap::scanner::{scan_parallel, RecoveredPage, ScanConfig, Scanner};
use crate::util::hex::{format_offset, hex_dump};
use crate::PduError;

/// Options for the `pdu dropscan` subcommand.
pub struct DropscanOptions {
    /// Path to the file or raw image to scan.
    pub file: String,
    /// JSON schema file.
    pub schema: Option<String>,
    /// Table name within the schema file.
    pub table: Option<String>,
    /// Distance between probes inside a damaged window.
    pub probe_step: usize,
    /// Bytes per parallel scan region.
    pub region_size: u64,
    /// First byte offset to scan.
    pub start: u64,
    /// Stop scanning at this byte offset.
    pub stop: Option<u64>,
    /// Hex dump unreadable tuples.
    pub verbose: bool,
    /// Emit NDJSON, one object per recovered page.
    pub json: bool,
    /// Use memory-mapped I/O for file access.
    pub mmap: bool,
    /// Worker threads; 1 scans sequentially and streams results.
    pub threads: usize,
    /// Set to stop the scan early (Ctrl+C).
    pub cancel: Option<Arc<AtomicBool>>,
}

#[derive(Default)]
struct DropscanStats {
    aligned: u64,
    shifted: u64,
    tuples: u64,
    unreadable: u64,
    partial: u64,
}

impl DropscanStats {
    fn record(&mut self, page: &RecoveredPage) {
        if page.aligned {
            self.aligned += 1;
        } else {
            self.shifted += 1;
        }
        self.tuples += page.extraction.decoded_count() as u64;
        self.unreadable += page.extraction.unreadable_count() as u64;
        self.partial += page.extraction.warning_count() as u64;
    }
}

fn emit_page(
    writer: &mut dyn Write,
    page: &RecoveredPage,
    page_size: usize,
    opts: &DropscanOptions,
    columns: Option<&[ColumnDescriptor]>,
) -> Result<(), PduError> {
    if opts.json {
        let json = serde_json::to_string(page)
            .map_err(|e| PduError::Parse(format!("JSON serialization error: {}", e)))?;
        return wprintln!(writer, "{}", json);
    }

    let placement = if page.aligned {
        format!("block {}", page.offset / page_size as u64)
    } else {
        format!("shifted +{}", page.offset % page_size as u64).yellow().to_string()
    };
    let h = &page.header;
    wprintln!(
        writer,
        "Page at {} [{}]: lower={} upper={} special={} tuples={} unreadable={}",
        format_offset(page.offset),
        placement,
        h.lower,
        h.upper,
        h.special,
        page.extraction.decoded_count(),
        page.extraction.unreadable_count()
    )?;

    for outcome in &page.extraction.tuples {
        match outcome {
            TupleOutcome::Decoded(t) => {
                let th = &t.header;
                let mut line = format!(
                    "  ({:>3}) xmin={} xmax={} ctid={}",
                    t.item, th.xmin, th.xmax, th.ctid
                );
                if columns.is_some() {
                    let values: Vec<String> = t
                        .values()
                        .map(|(name, v)| format!("{}={}", name, v))
                        .collect();
                    line.push_str(&format!(" {}", values.join(" ")));
                } else {
                    line.push_str(&format!(" natts={}", th.natts()));
                }
                wprintln!(writer, "{}", line)?;
                if let Some(w) = &t.warning {
                    wprintln!(writer, "        {} {}", "warning:".yellow(), w)?;
                }
            }
            TupleOutcome::Unreadable(u) => {
                wprintln!(
                    writer,
                    "  ({:>3}) {} off={} len={}: {}",
                    u.item,
                    "UNREADABLE".red(),
                    u.offset,
                    u.length,
                    u.reason
                )?;
                if opts.verbose && !u.raw.is_empty() {
                    for line in hex_dump(&u.raw, page.offset + u.offset as u64).lines() {
                        wprintln!(writer, "        {}", line)?;
                    }
                }
            }
        }
    }
    Ok(())
}

fn spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// Recover heap pages from a damaged data file or raw disk image.
///
/// The source is scanned page-size window by window; windows that fail
/// validation are probed every `--probe-step` bytes for displaced pages.
/// With more than one worker thread the source is split into regions of
/// `--region-size` bytes scanned in parallel and the results are merged;
/// with `--threads 1` pages are streamed as they are found. Output is
/// NDJSON (`--json`) or a text listing of every recovered tuple. When the
/// cancel flag is raised the pages found so far are still written.
pub fn execute(opts: &DropscanOptions, writer: &mut dyn Write) -> Result<(), PduError> {
    if opts.probe_step == 0 {
        return Err(PduError::Argument("--probe-step must be at least 1".to_string()));
    }
    if let Some(stop) = opts.stop {
        if stop <= opts.start {
            return Err(PduError::Argument(format!(
                "--stop {} must be greater than --start {}",
                stop, opts.start
            )));
        }
    }

    let df = open_data_file(&opts.file, opts.mmap)?;
    let page_size = df.page_size();
    if opts.start >= df.file_size() {
        return Err(PduError::Argument(format!(
            "--start {} is past the end of the file ({} bytes)",
            opts.start,
            df.file_size()
        )));
    }
    let columns = load_columns(opts.schema.as_deref(), opts.table.as_deref())?;

    let config = ScanConfig {
        page_size,
        probe_step: opts.probe_step,
        start: opts.start,
        stop: opts.stop,
        region_size: opts.region_size,
    };
    let cancel = opts
        .cancel
        .clone()
        .unwrap_or_else(|| Arc::new(AtomicBool::new(false)));
    let scan_end = opts.stop.unwrap_or(u64::MAX).min(df.file_size());
    let scan_start = opts.start / page_size as u64 * page_size as u64;

    let mut stats = DropscanStats::default();
    if opts.threads == 1 {
        let mut scanner =
            Scanner::with_config(df.source(), &config).with_cancel(Arc::clone(&cancel));
        if let Some(cols) = columns.as_deref() {
            scanner = scanner.with_schema(cols);
        }
        let pb = (!opts.json).then(|| create_progress_bar(scan_end - scan_start, "bytes"));
        while let Some(page) = scanner.next() {
            stats.record(&page);
            if let Some(pb) = &pb {
                pb.set_position(scanner.position().saturating_sub(scan_start));
            }
            emit_page(writer, &page, page_size, opts, columns.as_deref())?;
        }
        if let Some(pb) = pb {
            pb.finish_and_clear();
        }
    } else {
        let pb = (!opts.json).then(|| {
            spinner(format!(
                "scanning {} bytes of {}",
                scan_end - scan_start,
                opts.file
            ))
        });
        let pages = scan_parallel(
            df.source(),
            &config,
            columns.as_deref(),
            Some(Arc::clone(&cancel)),
        );
        if let Some(pb) = pb {
            pb.finish_and_clear();
        }
        for page in &pages {
            stats.record(page);
            emit_page(writer, page, page_size, opts, columns.as_deref())?;
        }
    }

    let cancelled = cancel.load(Ordering::Relaxed);
    if !opts.json {
        wprintln!(writer)?;
        wprintln!(writer, "Recovery summary:")?;
        wprintln!(writer, "  Pages recovered: {}", stats.aligned + stats.shifted)?;
        wprintln!(writer, "    Aligned:       {}", stats.aligned)?;
        wprintln!(writer, "    Shifted:       {}", stats.shifted)?;
        wprintln!(writer, "  Tuples:          {}", format!("{}", stats.tuples).green())?;
        wprintln!(writer, "  Partial rows:    {}", stats.partial)?;
        wprintln!(writer, "  Unreadable:      {}", stats.unreadable)?;
        if cancelled {
            wprintln!(writer, "  {}", "Scan interrupted; results are incomplete.".yellow())?;
        }
    } else if cancelled {
        eprintln!("Scan interrupted; results are incomplete.");
    }
    tracing::info!(
        aligned = stats.aligned,
        shifted = stats.shifted,
        tuples = stats.tuples,
        unreadable = stats.unreadable,
        cancelled,
        "dropscan finished"
    );
    Ok(())
}
