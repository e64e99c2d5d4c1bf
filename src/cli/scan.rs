use std::io::Write;
use std::path::Path;

use colored::Colorize;
use rayon::prelude::*;
use serde::Serialize;

use crate::cli::{create_progress_bar, open_data_file, wprintln};
use crate::heap::extract::extract_page;
use crate::heap::page::{decode_page, PageError};
use crate::util::fs::find_data_files;
use crate::PduError;

/// Options for the `pdu scan` subcommand.
pub struct ScanOptions {
    /// Data directory to search.
    pub dir: String,
    /// List each damaged page.
    pub verbose: bool,
    /// Emit output as JSON.
    pub json: bool,
    /// Use memory-mapped I/O for file access.
    pub mmap: bool,
}

/// Page integrity status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum PageStatus {
    Intact,
    Empty,
    Corrupt,
    Unreadable,
}

impl PageStatus {
    fn label(self) -> &'static str {
        match self {
            PageStatus::Intact => "intact",
            PageStatus::Empty => "empty",
            PageStatus::Corrupt => "CORRUPT",
            PageStatus::Unreadable => "UNREADABLE",
        }
    }
}

struct PageAnalysis {
    page: u64,
    status: PageStatus,
    tuples: usize,
    bad_tuples: usize,
    reason: Option<String>,
}

fn analyze_block(block: &[u8], page: u64, page_size: usize) -> PageAnalysis {
    match decode_page(block, page_size) {
        Ok(p) => {
            let ext = extract_page(&p, None);
            let bad = ext.unreadable_count();
            PageAnalysis {
                page,
                status: if bad > 0 {
                    PageStatus::Corrupt
                } else {
                    PageStatus::Intact
                },
                tuples: ext.decoded_count(),
                bad_tuples: bad,
                reason: (bad > 0).then(|| format!("{} unreadable tuples", bad)),
            }
        }
        Err(PageError::Uninitialized) => PageAnalysis {
            page,
            status: PageStatus::Empty,
            tuples: 0,
            bad_tuples: 0,
            reason: None,
        },
        Err(e) => PageAnalysis {
            page,
            status: PageStatus::Corrupt,
            tuples: 0,
            bad_tuples: 0,
            reason: Some(e.to_string()),
        },
    }
}

#[derive(Serialize, Default)]
struct FileSummary {
    intact: u64,
    empty: u64,
    corrupt: u64,
    unreadable: u64,
    tuples: u64,
    unreadable_tuples: u64,
}

#[derive(Serialize)]
struct DamagedPage {
    page: u64,
    status: PageStatus,
    reason: String,
}

#[derive(Serialize)]
struct FileReport {
    file: String,
    pages: u64,
    summary: FileSummary,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    damaged: Vec<DamagedPage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct ScanReport {
    dir: String,
    files: Vec<FileReport>,
    totals: FileSummary,
}

fn scan_file(path: &Path, display: String, mmap: bool) -> FileReport {
    let df = match open_data_file(&path.to_string_lossy(), mmap) {
        Ok(df) => df,
        Err(e) => {
            let file_name = &display;
            tracing::warn!(file = %file_name, error = %e, "cannot open data file");
            return FileReport {
                file: display,
                pages: 0,
                summary: FileSummary::default(),
                damaged: Vec::new(),
                error: Some(e.to_string()),
            };
        }
    };
    let page_size = df.page_size();

    let analyses: Vec<PageAnalysis> = (0..df.page_count())
        .into_par_iter()
        .map(|page| match df.read_block(page) {
            Ok(block) => analyze_block(&block, page, page_size),
            Err(e) => PageAnalysis {
                page,
                status: PageStatus::Unreadable,
                tuples: 0,
                bad_tuples: 0,
                reason: Some(e.to_string()),
            },
        })
        .collect();

    let mut summary = FileSummary::default();
    let mut damaged = Vec::new();
    for a in analyses {
        match a.status {
            PageStatus::Intact => summary.intact += 1,
            PageStatus::Empty => summary.empty += 1,
            PageStatus::Corrupt => summary.corrupt += 1,
            PageStatus::Unreadable => summary.unreadable += 1,
        }
        summary.tuples += a.tuples as u64;
        summary.unreadable_tuples += a.bad_tuples as u64;
        if let Some(reason) = a.reason {
            damaged.push(DamagedPage {
                page: a.page,
                status: a.status,
                reason,
            });
        }
    }

    FileReport {
        file: display,
        pages: df.page_count(),
        summary,
        damaged,
        error: None,
    }
}

/// Classify every page of every heap data file under a directory.
///
/// Relation files (numeric names and their `.N` segments) are found
/// recursively. Each page is decoded and classified as intact, empty
/// (never written), corrupt (invalid header or unreadable tuples) or
/// unreadable (I/O failure). Pages of one file are analyzed in parallel;
/// a progress bar tracks files in text mode. A file that cannot be opened
/// is reported and the scan continues.
pub fn execute(opts: &ScanOptions, writer: &mut dyn Write) -> Result<(), PduError> {
    let dir = Path::new(&opts.dir);
    if !dir.is_dir() {
        return Err(PduError::Argument(format!(
            "Data directory does not exist: {}",
            opts.dir
        )));
    }

    let files = find_data_files(dir)?;
    if files.is_empty() {
        if opts.json {
            let report = ScanReport {
                dir: opts.dir.clone(),
                files: Vec::new(),
                totals: FileSummary::default(),
            };
            let json = serde_json::to_string_pretty(&report)
                .map_err(|e| PduError::Parse(format!("JSON serialization error: {}", e)))?;
            wprintln!(writer, "{}", json)?;
        } else {
            wprintln!(writer, "No data files found in {}", opts.dir)?;
        }
        return Ok(());
    }

    let pb = if !opts.json && files.len() > 1 {
        Some(create_progress_bar(files.len() as u64, "files"))
    } else {
        None
    };

    let mut reports = Vec::with_capacity(files.len());
    for path in &files {
        let display = path
            .strip_prefix(dir)
            .unwrap_or(path)
            .display()
            .to_string();
        reports.push(scan_file(path, display, opts.mmap));
        if let Some(pb) = &pb {
            pb.inc(1);
        }
    }
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    let mut totals = FileSummary::default();
    for r in &reports {
        totals.intact += r.summary.intact;
        totals.empty += r.summary.empty;
        totals.corrupt += r.summary.corrupt;
        totals.unreadable += r.summary.unreadable;
        totals.tuples += r.summary.tuples;
        totals.unreadable_tuples += r.summary.unreadable_tuples;
    }

    if opts.json {
        let report = ScanReport {
            dir: opts.dir.clone(),
            files: reports,
            totals,
        };
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| PduError::Parse(format!("JSON serialization error: {}", e)))?;
        wprintln!(writer, "{}", json)?;
        return Ok(());
    }

    for r in &reports {
        if let Some(err) = &r.error {
            wprintln!(writer, "{}: {}", r.file, err.red())?;
            continue;
        }
        let bad = r.summary.corrupt + r.summary.unreadable;
        let status = if bad == 0 {
            "OK".green()
        } else {
            format!("{} damaged", bad).red()
        };
        wprintln!(
            writer,
            "{}: {} pages, {} tuples [{}]",
            r.file,
            r.pages,
            r.summary.tuples,
            status
        )?;
        if opts.verbose {
            for d in &r.damaged {
                wprintln!(writer, "  page {}: {} ({})", d.page, d.status.label(), d.reason)?;
            }
        }
    }

    wprintln!(writer)?;
    wprintln!(writer, "Summary:")?;
    wprintln!(writer, "  Files:      {}", reports.len())?;
    wprintln!(writer, "  Intact:     {}", totals.intact)?;
    wprintln!(writer, "  Empty:      {}", totals.empty)?;
    let corrupt = format!("{}", totals.corrupt);
    wprintln!(
        writer,
        "  Corrupt:    {}",
        if totals.corrupt > 0 { corrupt.red() } else { corrupt.green() }
    )?;
    wprintln!(writer, "  Unreadable: {}", totals.unreadable)?;
    wprintln!(writer, "  Tuples:     {}", totals.tuples)?;
    Ok(())
}
