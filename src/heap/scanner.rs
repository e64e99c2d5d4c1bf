//! Disaster-recovery page scanner.
//!
//! Scans an arbitrary byte stream (a damaged data file, a disk image, the
//! remains of a dropped table) for byte ranges that look like heap pages,
//! without relying on block addressing or the catalog.
//!
//! The primary stride is page-size aligned windows. When the aligned window
//! fails validation, finer offsets inside it are probed (`probe_step`,
//! 512 bytes by default) to find pages displaced from their block
//! boundary. A candidate is accepted when:
//!
//! - the header satisfies `24 <= lower <= upper <= special <= page_size`;
//! - the special area is 0, 8 or 16 bytes;
//! - at least one line pointer with storage (of any state, so dead tuples
//!   count) lies inside `[lower, special)`.
//!
//! Overlapping candidates are resolved by [`resolve_overlaps`]: aligned
//! candidates beat shifted ones, and among shifted candidates the earliest
//! offset wins. [`Scanner`] applies the same rule while streaming.
//!
//! Accepted pages are decoded with the regular page, tuple and attribute
//! decoders; tuples that fail to decode are kept as raw bytes with the
//! failure reason.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::heap::attribute::ColumnDescriptor;
use crate::heap::constants::{BLCKSZ, RECOGNIZED_SPECIAL_SIZES, SIZE_PAGE_HEADER};
use crate::heap::extract::{extract_page, PageExtraction};
use crate::heap::page::{decode_page, Page, PageError, PageHeader};
use crate::heap::source::ByteSource;

/// Default distance between probes inside a failed aligned window.
pub const DEFAULT_PROBE_STEP: usize = 512;

/// Smallest page size the scanner accepts; smaller values are raised to it.
pub const MIN_SCAN_PAGE_SIZE: usize = SIZE_PAGE_HEADER;

/// Default region size for parallel scans (1024 pages).
pub const DEFAULT_REGION_PAGES: u64 = 1024;

/// Scanner settings.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub page_size: usize,
    pub probe_step: usize,
    /// First byte to scan (rounded down to a page boundary).
    pub start: u64,
    /// Scan windows starting before this offset (None = end of source).
    pub stop: Option<u64>,
    /// Bytes per region for [`scan_parallel`] (rounded to whole pages).
    pub region_size: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            page_size: BLCKSZ,
            probe_step: DEFAULT_PROBE_STEP,
            start: 0,
            stop: None,
            region_size: DEFAULT_REGION_PAGES * BLCKSZ as u64,
        }
    }
}

/// Why a candidate window was not accepted as a page.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error(transparent)]
    Page(#[from] PageError),

    #[error("special area of {0} bytes is not a recognized size")]
    SpecialSize(usize),

    #[error("no line pointer with storage inside the tuple area")]
    NoTupleStorage,
}

/// Check whether `block` is a plausible heap page.
pub fn validate_candidate(block: &[u8], page_size: usize) -> Result<Page<'_>, Rejection> {
    let page = decode_page(block, page_size)?;
    let special_size = page.header.special_size(page_size);
    if !RECOGNIZED_SPECIAL_SIZES.contains(&special_size) {
        return Err(Rejection::SpecialSize(special_size));
    }
    let (lower, special) = (page.header.lower, page.header.special);
    if !page
        .items
        .iter()
        .any(|it| it.has_storage() && it.within(lower, special))
    {
        return Err(Rejection::NoTupleStorage);
    }
    Ok(page)
}

/// A candidate page position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Window {
    pub offset: u64,
    /// Starts on a page-size boundary.
    pub aligned: bool,
}

/// Choose a non-overlapping subset of candidate windows of `page_size` bytes.
///
/// Every aligned window is kept (aligned windows never overlap each other).
/// Shifted windows are then taken in offset order, skipping any that
/// overlap a window already kept. The result is sorted by offset.
///
/// # Examples
///
/// ```
/// use pdu::heap::scanner::{resolve_overlaps, Window};
///
/// let candidates = [
///     Window { offset: 512, aligned: false },
///     Window { offset: 1024, aligned: false },
///     Window { offset: 8192, aligned: true },
/// ];
/// // both shifted windows overlap the aligned one
/// let kept = resolve_overlaps(&candidates, 8192);
/// assert_eq!(kept, vec![Window { offset: 8192, aligned: true }]);
/// ```
pub fn resolve_overlaps(candidates: &[Window], page_size: usize) -> Vec<Window> {
    let size = page_size.max(MIN_SCAN_PAGE_SIZE) as u64;
    let mut kept: BTreeSet<u64> = BTreeSet::new();
    let mut result: Vec<Window> = Vec::new();

    let mut aligned: Vec<Window> = candidates.iter().copied().filter(|w| w.aligned).collect();
    aligned.sort();
    aligned.dedup();
    for w in aligned {
        kept.insert(w.offset);
        result.push(w);
    }

    let mut shifted: Vec<Window> = candidates.iter().copied().filter(|w| !w.aligned).collect();
    shifted.sort();
    shifted.dedup();
    for w in shifted {
        let lo = w.offset.saturating_sub(size - 1);
        let hi = w.offset.saturating_add(size);
        if kept.range(lo..hi).next().is_none() {
            kept.insert(w.offset);
            result.push(w);
        }
    }

    result.sort();
    result
}

/// A page recovered by the scanner.
#[derive(Debug, Clone, Serialize)]
pub struct RecoveredPage {
    /// Byte offset of the page within the scanned source.
    pub offset: u64,
    pub aligned: bool,
    pub header: PageHeader,
    #[serde(flatten)]
    pub extraction: PageExtraction,
}

impl RecoveredPage {
    pub fn window(&self) -> Window {
        Window {
            offset: self.offset,
            aligned: self.aligned,
        }
    }
}

/// Lazy iterator over the pages recoverable from a byte source.
///
/// ```
/// use pdu::heap::scanner::Scanner;
/// use pdu::heap::source::MemorySource;
///
/// let image = MemorySource::new(vec![0u8; 3 * 8192]);
/// assert_eq!(Scanner::new(&image, 8192).count(), 0);
/// ```
pub struct Scanner<'a, S: ByteSource + ?Sized> {
    source: &'a S,
    page_size: usize,
    probe_step: usize,
    descriptors: Option<&'a [ColumnDescriptor]>,
    cancel: Option<Arc<AtomicBool>>,
    next_window: u64,
    stop: u64,
    emitted_until: u64,
    /// Validation result of the most recently checked aligned window.
    aligned_memo: Option<(u64, bool)>,
    cancelled: bool,
    buf: Vec<u8>,
}

impl<'a, S: ByteSource + ?Sized> Scanner<'a, S> {
    /// Scan `source` in windows of `page_size` bytes.
    ///
    /// A `page_size` below [`MIN_SCAN_PAGE_SIZE`] is raised to it.
    pub fn new(source: &'a S, page_size: usize) -> Self {
        let page_size = page_size.max(MIN_SCAN_PAGE_SIZE);
        Scanner {
            source,
            page_size,
            probe_step: DEFAULT_PROBE_STEP.min(page_size),
            descriptors: None,
            cancel: None,
            next_window: 0,
            stop: source.len(),
            emitted_until: 0,
            aligned_memo: None,
            cancelled: false,
            buf: vec![0u8; page_size],
        }
    }

    /// Build a scanner from a [`ScanConfig`].
    pub fn with_config(source: &'a S, config: &ScanConfig) -> Self {
        let mut scanner = Scanner::new(source, config.page_size)
            .probe_step(config.probe_step)
            .starting_at(config.start);
        if let Some(stop) = config.stop {
            scanner = scanner.stop_at(stop);
        }
        scanner
    }

    /// Resume from `offset`, rounded down to a page boundary.
    pub fn starting_at(mut self, offset: u64) -> Self {
        let size = self.page_size as u64;
        self.next_window = offset / size * size;
        self.emitted_until = self.next_window;
        self.aligned_memo = None;
        self
    }

    /// Only scan windows starting before `offset`.
    ///
    /// Probes in the last window may read up to one page past `offset`.
    pub fn stop_at(mut self, offset: u64) -> Self {
        self.stop = offset.min(self.source.len());
        self
    }

    /// Distance between probes inside a failed aligned window.
    pub fn probe_step(mut self, step: usize) -> Self {
        self.probe_step = step.clamp(1, self.page_size);
        self
    }

    /// Decode attributes of recovered tuples with this column layout.
    pub fn with_schema(mut self, descriptors: &'a [ColumnDescriptor]) -> Self {
        self.descriptors = Some(descriptors);
        self
    }

    /// Stop the scan when `flag` becomes true.
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Start of the next window to scan.
    pub fn position(&self) -> u64 {
        self.next_window
    }

    pub fn was_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Read `page_size` bytes at `offset` into the buffer.
    fn load(&mut self, offset: u64) -> bool {
        let end = offset.saturating_add(self.page_size as u64);
        if end > self.source.len() {
            return false;
        }
        match self.source.read_at(offset, &mut self.buf) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(offset, error = %e, "read failed, window skipped");
                false
            }
        }
    }

    fn check(&mut self, offset: u64) -> bool {
        if !self.load(offset) {
            return false;
        }
        match validate_candidate(&self.buf, self.page_size) {
            Ok(_) => true,
            Err(reason) => {
                tracing::trace!(offset, %reason, "candidate rejected");
                false
            }
        }
    }

    fn aligned_valid(&mut self, offset: u64) -> bool {
        if let Some((memo_offset, valid)) = self.aligned_memo {
            if memo_offset == offset {
                return valid;
            }
        }
        let valid = self.check(offset);
        self.aligned_memo = Some((offset, valid));
        valid
    }

    /// Decode the window at `offset` into a recovered page.
    fn recover(&mut self, offset: u64, aligned: bool) -> Option<RecoveredPage> {
        if !self.load(offset) {
            return None;
        }
        let page = validate_candidate(&self.buf, self.page_size).ok()?;
        let extraction = extract_page(&page, self.descriptors);
        tracing::debug!(
            offset,
            aligned,
            tuples = extraction.tuples.len(),
            "page recovered"
        );
        self.emitted_until = offset + self.page_size as u64;
        Some(RecoveredPage {
            offset,
            aligned,
            header: page.header,
            extraction,
        })
    }

    /// Find the earliest acceptable shifted page in the window at `window`.
    fn probe_window(&mut self, window: u64) -> Option<u64> {
        let size = self.page_size as u64;
        let step = self.probe_step as u64;
        let mut offset = window + step;
        while offset < window + size {
            if offset >= self.emitted_until && self.check(offset) {
                // Every probe in this window overlaps the next aligned window
                if self.aligned_valid(window + size) {
                    tracing::debug!(offset, "shifted candidate overlaps an aligned page");
                    return None;
                }
                return Some(offset);
            }
            offset += step;
        }
        None
    }
}

impl<S: ByteSource + ?Sized> Iterator for Scanner<'_, S> {
    type Item = RecoveredPage;

    fn next(&mut self) -> Option<RecoveredPage> {
        let size = self.page_size as u64;
        while self.next_window < self.stop {
            if let Some(flag) = &self.cancel {
                if flag.load(Ordering::Relaxed) {
                    tracing::warn!(offset = self.next_window, "scan cancelled");
                    self.cancelled = true;
                    self.next_window = self.stop;
                    return None;
                }
            }

            let window = self.next_window;
            self.next_window += size;

            if self.aligned_valid(window) {
                if window >= self.emitted_until {
                    if let Some(page) = self.recover(window, true) {
                        return Some(page);
                    }
                }
                continue;
            }

            if let Some(offset) = self.probe_window(window) {
                if let Some(page) = self.recover(offset, false) {
                    return Some(page);
                }
            }
        }
        None
    }
}

/// Deduplicate and resolve overlaps among pages from independent scans.
///
/// Output is sorted by offset.
pub fn merge_recoveries(mut pages: Vec<RecoveredPage>, page_size: usize) -> Vec<RecoveredPage> {
    pages.sort_by_key(|p| (p.offset, !p.aligned));
    pages.dedup_by_key(|p| p.offset);
    let windows: Vec<Window> = pages.iter().map(RecoveredPage::window).collect();
    let kept: BTreeSet<u64> = resolve_overlaps(&windows, page_size)
        .into_iter()
        .map(|w| w.offset)
        .collect();
    pages.retain(|p| kept.contains(&p.offset));
    pages
}

/// Scan `source` in page-aligned regions on the rayon thread pool.
///
/// Each region is scanned independently and may read up to one page past
/// its end; results are combined with [`merge_recoveries`].
#[cfg(feature = "parallel")]
pub fn scan_parallel<S: ByteSource + ?Sized>(
    source: &S,
    config: &ScanConfig,
    descriptors: Option<&[ColumnDescriptor]>,
    cancel: Option<Arc<AtomicBool>>,
) -> Vec<RecoveredPage> {
    use rayon::prelude::*;

    let page_size = config.page_size.max(MIN_SCAN_PAGE_SIZE);
    let size = page_size as u64;
    let region = (config.region_size / size).max(1) * size;
    let start = config.start / size * size;
    let stop = config.stop.unwrap_or(u64::MAX).min(source.len());

    let regions: Vec<u64> = (0..)
        .map(|i| start + i * region)
        .take_while(|r| *r < stop)
        .collect();
    tracing::debug!(regions = regions.len(), region_bytes = region, "parallel scan");

    let pages: Vec<RecoveredPage> = regions
        .into_par_iter()
        .flat_map_iter(|region_start| {
            let mut scanner = Scanner::new(source, page_size)
                .probe_step(config.probe_step)
                .starting_at(region_start)
                .stop_at((region_start + region).min(stop));
            if let Some(descs) = descriptors {
                scanner = scanner.with_schema(descs);
            }
            if let Some(flag) = &cancel {
                scanner = scanner.with_cancel(Arc::clone(flag));
            }
            scanner.collect::<Vec<_>>()
        })
        .collect();

    merge_recoveries(pages, page_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::constants::*;
    use crate::heap::source::MemorySource;
    use byteorder::{BigEndian, ByteOrder};

    const PS: usize = BLCKSZ;

    /// Heap page with one 24-byte tuple whose xmin is `marker`.
    fn heap_page(marker: u32, special_size: usize) -> Vec<u8> {
        let mut page = vec![0u8; PS];
        let special = PS - special_size;
        let upper = special - 24;
        BigEndian::write_u32(&mut page[PD_LSN_XRECOFF..], marker);
        BigEndian::write_u16(&mut page[PD_LOWER..], 28);
        BigEndian::write_u16(&mut page[PD_UPPER..], upper as u16);
        BigEndian::write_u16(&mut page[PD_SPECIAL..], special as u16);
        BigEndian::write_u16(&mut page[PD_PAGESIZE_VERSION..], 0x2004);
        BigEndian::write_u16(&mut page[24..], upper as u16);
        BigEndian::write_u16(&mut page[26..], (24 << LP_LEN_SHIFT) | LP_NORMAL);
        BigEndian::write_u32(&mut page[upper + T_XMIN..], marker);
        page[upper + T_HOFF] = 24;
        page
    }

    fn image_of(pages: &[Vec<u8>]) -> MemorySource {
        MemorySource::new(pages.concat())
    }

    fn offsets<S: ByteSource + ?Sized>(scanner: Scanner<'_, S>) -> Vec<(u64, bool)> {
        scanner.map(|p| (p.offset, p.aligned)).collect()
    }

    #[test]
    fn test_recovers_every_aligned_page() {
        let pages: Vec<Vec<u8>> = (1..=5).map(|m| heap_page(m, 0)).collect();
        let image = image_of(&pages);
        let recovered: Vec<RecoveredPage> = Scanner::new(&image, PS).collect();
        assert_eq!(recovered.len(), 5);
        for (i, p) in recovered.iter().enumerate() {
            assert_eq!(p.offset, (i * PS) as u64);
            assert!(p.aligned);
            assert_eq!(p.extraction.tuples.len(), 1);
        }
    }

    #[test]
    fn test_scan_is_idempotent() {
        let image = image_of(&[heap_page(1, 0), vec![0u8; PS], heap_page(2, 16)]);
        let first = offsets(Scanner::new(&image, PS));
        let second = offsets(Scanner::new(&image, PS));
        assert_eq!(first, second);
        assert_eq!(first, vec![(0, true), (2 * PS as u64, true)]);
    }

    #[test]
    fn test_recovers_uniformly_shifted_pages() {
        let mut bytes = vec![0u8; 512];
        for m in 1..=3 {
            bytes.extend_from_slice(&heap_page(m, 0));
        }
        let image = MemorySource::new(bytes);
        let found = offsets(Scanner::new(&image, PS));
        assert_eq!(
            found,
            vec![(512, false), (512 + PS as u64, false), (512 + 2 * PS as u64, false)]
        );
    }

    #[test]
    fn test_aligned_beats_overlapping_shifted() {
        let mut bytes = vec![0u8; 2 * PS];
        // a fake header at 512 whose window overlaps the real page at PS
        BigEndian::write_u16(&mut bytes[512 + PD_LOWER..], 28);
        BigEndian::write_u16(&mut bytes[512 + PD_UPPER..], 8000);
        BigEndian::write_u16(&mut bytes[512 + PD_SPECIAL..], PS as u16);
        BigEndian::write_u16(&mut bytes[512 + 24..], 8000);
        BigEndian::write_u16(&mut bytes[512 + 26..], (24 << LP_LEN_SHIFT) | LP_NORMAL);
        bytes[PS..].copy_from_slice(&heap_page(9, 0));
        let image = MemorySource::new(bytes.clone());

        assert_eq!(offsets(Scanner::new(&image, PS)), vec![(PS as u64, true)]);

        // without the aligned page the shifted candidate is taken
        bytes[PS..].fill(0);
        let image = MemorySource::new(bytes);
        assert_eq!(offsets(Scanner::new(&image, PS)), vec![(512, false)]);
    }

    #[test]
    fn test_mixed_image_matches_overlap_resolution() {
        let mut bytes = heap_page(1, 0);
        bytes.extend_from_slice(&[0u8; 1024]);
        bytes.extend_from_slice(&heap_page(2, 8));
        bytes.resize(3 * PS, 0);
        bytes.extend_from_slice(&heap_page(3, 16));
        let image = MemorySource::new(bytes);

        let found = offsets(Scanner::new(&image, PS));
        assert_eq!(found, vec![(0, true), (PS as u64 + 1024, false), (3 * PS as u64, true)]);

        // brute force: every probe position, then the pure resolution rule
        let mut candidates = Vec::new();
        let mut offset = 0u64;
        while offset + PS as u64 <= image.len() {
            let block = &image.as_bytes()[offset as usize..offset as usize + PS];
            if validate_candidate(block, PS).is_ok() {
                candidates.push(Window {
                    offset,
                    aligned: offset % PS as u64 == 0,
                });
            }
            offset += DEFAULT_PROBE_STEP as u64;
        }
        let resolved: Vec<(u64, bool)> = resolve_overlaps(&candidates, PS)
            .into_iter()
            .map(|w| (w.offset, w.aligned))
            .collect();
        assert_eq!(found, resolved);
    }

    #[test]
    fn test_restart_and_stop() {
        let pages: Vec<Vec<u8>> = (1..=4).map(|m| heap_page(m, 0)).collect();
        let image = image_of(&pages);
        let full = offsets(Scanner::new(&image, PS));

        let mut split = offsets(Scanner::new(&image, PS).stop_at(2 * PS as u64));
        // unaligned restart offsets round down to the page boundary
        split.extend(offsets(Scanner::new(&image, PS).starting_at(2 * PS as u64 + 100)));
        assert_eq!(split, full);
    }

    #[test]
    fn test_cancelled_scan_stops() {
        let pages: Vec<Vec<u8>> = (1..=3).map(|m| heap_page(m, 0)).collect();
        let image = image_of(&pages);
        let flag = Arc::new(AtomicBool::new(false));
        let mut scanner = Scanner::new(&image, PS).with_cancel(Arc::clone(&flag));

        assert!(scanner.next().is_some());
        flag.store(true, Ordering::Relaxed);
        assert!(scanner.next().is_none());
        assert!(scanner.was_cancelled());
        assert!(scanner.next().is_none());
    }

    #[test]
    fn test_candidate_rules() {
        assert!(validate_candidate(&heap_page(1, 0), PS).is_ok());
        assert!(validate_candidate(&heap_page(1, 8), PS).is_ok());
        assert!(validate_candidate(&heap_page(1, 16), PS).is_ok());
        assert_eq!(
            validate_candidate(&heap_page(1, 32), PS).unwrap_err(),
            Rejection::SpecialSize(32)
        );

        let mut no_storage = heap_page(1, 0);
        BigEndian::write_u16(&mut no_storage[26..], LP_DEAD);
        assert_eq!(validate_candidate(&no_storage, PS).unwrap_err(), Rejection::NoTupleStorage);

        // storage past the special area does not count
        let mut outside = heap_page(1, 16);
        BigEndian::write_u16(&mut outside[24..], (PS - 8) as u16);
        assert_eq!(validate_candidate(&outside, PS).unwrap_err(), Rejection::NoTupleStorage);

        assert!(matches!(
            validate_candidate(&vec![0u8; PS], PS).unwrap_err(),
            Rejection::Page(PageError::Uninitialized)
        ));
    }

    #[test]
    fn test_page_of_deleted_rows_is_recovered() {
        let mut deleted = heap_page(7, 0);
        BigEndian::write_u16(&mut deleted[26..], (24 << LP_LEN_SHIFT) | LP_DEAD);
        assert!(validate_candidate(&deleted, PS).is_ok());

        let mut bytes = vec![0u8; 1024];
        bytes.extend_from_slice(&deleted);
        bytes.resize(2 * PS, 0);
        let image = MemorySource::new(bytes);
        let recovered: Vec<RecoveredPage> = Scanner::new(&image, PS).collect();
        assert_eq!(recovered.len(), 1);
        assert_eq!(recovered[0].offset, 1024);
        assert!(!recovered[0].aligned);
        assert_eq!(recovered[0].extraction.dead, 1);
        assert!(recovered[0].extraction.tuples.is_empty());
    }

    #[test]
    fn test_zero_page_size_is_raised() {
        let image = image_of(&[heap_page(1, 0)]);
        let scanner = Scanner::new(&image, 0);
        assert_eq!(scanner.page_size, MIN_SCAN_PAGE_SIZE);
        // terminates: no 24-byte window validates as an 8 KiB page
        assert_eq!(scanner.count(), 0);

        let candidates = [
            Window { offset: 0, aligned: true },
            Window { offset: 8, aligned: false },
        ];
        assert_eq!(resolve_overlaps(&candidates, 0), vec![candidates[0]]);
    }

    #[test]
    fn test_resolve_overlaps_prefers_earliest_shifted() {
        let candidates = [
            Window { offset: 1536, aligned: false },
            Window { offset: 1024, aligned: false },
            Window { offset: 1024 + PS as u64, aligned: false },
        ];
        let kept = resolve_overlaps(&candidates, PS);
        assert_eq!(
            kept,
            vec![
                Window { offset: 1024, aligned: false },
                Window { offset: 1024 + PS as u64, aligned: false },
            ]
        );
    }

    #[test]
    fn test_merge_dedupes_region_results() {
        let pages: Vec<Vec<u8>> = (1..=3).map(|m| heap_page(m, 0)).collect();
        let image = image_of(&pages);
        let mut all: Vec<RecoveredPage> = Scanner::new(&image, PS).collect();
        all.extend(Scanner::new(&image, PS).starting_at(PS as u64));
        let merged = merge_recoveries(all, PS);
        let got: Vec<u64> = merged.iter().map(|p| p.offset).collect();
        assert_eq!(got, vec![0, PS as u64, 2 * PS as u64]);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_matches_sequential() {
        let mut bytes = Vec::new();
        for m in 1..=9 {
            if m % 3 == 0 {
                bytes.extend_from_slice(&vec![0u8; PS]);
            } else {
                bytes.extend_from_slice(&heap_page(m, 0));
            }
        }
        let image = MemorySource::new(bytes);
        let config = ScanConfig {
            region_size: 2 * PS as u64,
            ..ScanConfig::default()
        };
        let sequential = offsets(Scanner::with_config(&image, &config));
        let parallel: Vec<(u64, bool)> = scan_parallel(&image, &config, None, None)
            .into_iter()
            .map(|p| (p.offset, p.aligned))
            .collect();
        assert_eq!(parallel, sequential);
        assert_eq!(parallel.len(), 6);
    }
}
