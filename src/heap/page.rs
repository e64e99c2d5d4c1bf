//! Heap page header and line pointer parsing.
//!
//! Every heap page begins with a 24-byte header ([`PageHeader`]) holding the
//! LSN of the last change, a checksum, flag bits and three offsets
//! (`lower`, `upper`, `special`) that split the page into
//! `[header + line pointers][free space][tuple data][special area]`.
//! The line pointer array ([`ItemId`]) starts right after the header and
//! grows towards `lower`; each entry locates one tuple.
//!
//! [`decode_page`] validates a block and returns a [`Page`] view over it.

use byteorder::{BigEndian, ByteOrder};
use serde::Serialize;
use thiserror::Error;

use crate::heap::constants::*;

/// Errors produced while decoding a page.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PageError {
    /// The block is not exactly one page long.
    #[error("block is {actual} bytes, expected {expected}")]
    WrongSize { expected: usize, actual: usize },

    /// The block is all zeros (allocated but never written).
    #[error("page is uninitialized (all zeros)")]
    Uninitialized,

    /// The `lower <= upper <= special` layout is violated.
    #[error("malformed page header: lower={lower} upper={upper} special={special}")]
    Malformed { lower: u16, upper: u16, special: u16 },

    /// The requested item number does not exist on this page.
    #[error("item {item} does not exist (page has {count} line pointers)")]
    NoSuchItem { item: u16, count: usize },

    /// The line pointer does not reference stored tuple data.
    #[error("item {item} has no storage (state {state})")]
    NotLive { item: u16, state: ItemState },

    /// The line pointer references bytes outside the tuple area.
    #[error("item {item} points outside the tuple area: offset={offset} length={length}")]
    SlotOutOfBounds { item: u16, offset: u16, length: u16 },
}

/// Parsed page header (24 bytes, present at the start of every page).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageHeader {
    /// WAL file id of the last change. Bytes 0-3.
    pub lsn_xlogid: u32,
    /// Offset within that WAL file. Bytes 4-7.
    pub lsn_xrecoff: u32,
    /// Page checksum. Bytes 8-9.
    pub checksum: u16,
    /// Flag bits (PD_HAS_FREE_LINES, PD_PAGE_FULL, PD_ALL_VISIBLE). Bytes 10-11.
    pub flags: u16,
    /// Offset to the start of free space. Bytes 12-13.
    pub lower: u16,
    /// Offset to the end of free space. Bytes 14-15.
    pub upper: u16,
    /// Offset to the start of the special area. Bytes 16-17.
    pub special: u16,
    /// Page size (high byte) and layout version (low byte). Bytes 18-19.
    pub pagesize_version: u16,
    /// Oldest prunable transaction id, or zero. Bytes 20-23.
    pub prune_xid: u32,
}

impl PageHeader {
    /// Parse a page header from a byte slice.
    ///
    /// The slice must be at least SIZE_PAGE_HEADER (24) bytes.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < SIZE_PAGE_HEADER {
            return None;
        }

        Some(PageHeader {
            lsn_xlogid: BigEndian::read_u32(&data[PD_LSN_XLOGID..]),
            lsn_xrecoff: BigEndian::read_u32(&data[PD_LSN_XRECOFF..]),
            checksum: BigEndian::read_u16(&data[PD_CHECKSUM..]),
            flags: BigEndian::read_u16(&data[PD_FLAGS..]),
            lower: BigEndian::read_u16(&data[PD_LOWER..]),
            upper: BigEndian::read_u16(&data[PD_UPPER..]),
            special: BigEndian::read_u16(&data[PD_SPECIAL..]),
            pagesize_version: BigEndian::read_u16(&data[PD_PAGESIZE_VERSION..]),
            prune_xid: BigEndian::read_u32(&data[PD_PRUNE_XID..]),
        })
    }

    /// Full 64-bit LSN.
    pub fn lsn(&self) -> u64 {
        ((self.lsn_xlogid as u64) << 32) | self.lsn_xrecoff as u64
    }

    /// Page layout version (low byte of `pagesize_version`).
    pub fn layout_version(&self) -> u8 {
        (self.pagesize_version & PD_VERSION_MASK) as u8
    }

    /// Page size recorded in the header (high byte of `pagesize_version`).
    pub fn recorded_page_size(&self) -> usize {
        (self.pagesize_version & PD_PAGESIZE_MASK) as usize
    }

    pub fn has_free_lines(&self) -> bool {
        self.flags & PD_HAS_FREE_LINES != 0
    }

    pub fn is_full(&self) -> bool {
        self.flags & PD_PAGE_FULL != 0
    }

    pub fn is_all_visible(&self) -> bool {
        self.flags & PD_ALL_VISIBLE != 0
    }

    /// Check `24 <= lower <= upper <= special <= page_size`.
    pub fn validate(&self, page_size: usize) -> Result<(), PageError> {
        let (lower, upper, special) = (
            self.lower as usize,
            self.upper as usize,
            self.special as usize,
        );
        if SIZE_PAGE_HEADER <= lower && lower <= upper && upper <= special && special <= page_size
        {
            Ok(())
        } else {
            Err(PageError::Malformed {
                lower: self.lower,
                upper: self.upper,
                special: self.special,
            })
        }
    }

    /// Number of line pointers implied by `lower`.
    pub fn item_count(&self) -> usize {
        (self.lower as usize).saturating_sub(SIZE_PAGE_HEADER) / SIZE_ITEM_ID
    }

    /// Size of the special area at the end of a page of `page_size` bytes.
    pub fn special_size(&self, page_size: usize) -> usize {
        page_size.saturating_sub(self.special as usize)
    }

    /// Bytes of free space between the line pointers and the tuple data.
    pub fn free_space(&self) -> usize {
        (self.upper as usize).saturating_sub(self.lower as usize)
    }
}

/// Line pointer state (2 bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemState {
    /// Unused; should have length 0.
    Unused,
    /// Points at a stored tuple.
    Normal,
    /// HOT redirect to another line pointer.
    Redirect,
    /// Dead; may or may not still have storage.
    Dead,
}

impl ItemState {
    /// Convert the low two bits of a line pointer word.
    pub fn from_bits(bits: u16) -> Self {
        match bits & LP_FLAGS_MASK {
            LP_NORMAL => ItemState::Normal,
            LP_REDIRECT => ItemState::Redirect,
            LP_DEAD => ItemState::Dead,
            _ => ItemState::Unused,
        }
    }

    /// Source-style name (e.g. `"LP_NORMAL"`).
    pub fn name(&self) -> &'static str {
        match self {
            ItemState::Unused => "LP_UNUSED",
            ItemState::Normal => "LP_NORMAL",
            ItemState::Redirect => "LP_REDIRECT",
            ItemState::Dead => "LP_DEAD",
        }
    }
}

impl std::fmt::Display for ItemState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Parsed line pointer.
///
/// Layout: bytes 0-1 hold the tuple offset; bytes 2-3 hold the state in the
/// low 2 bits and the tuple length in the upper 14 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ItemId {
    /// Offset of the tuple from the start of the page.
    pub offset: u16,
    /// Line pointer state.
    pub state: ItemState,
    /// Tuple length in bytes.
    pub length: u16,
}

impl ItemId {
    /// Parse a line pointer from at least SIZE_ITEM_ID (4) bytes.
    ///
    /// # Examples
    ///
    /// ```
    /// use pdu::heap::page::{ItemId, ItemState};
    /// use byteorder::{BigEndian, ByteOrder};
    ///
    /// let mut data = [0u8; 4];
    /// BigEndian::write_u16(&mut data[0..2], 8180);
    /// BigEndian::write_u16(&mut data[2..4], (12 << 2) | 1);
    ///
    /// let item = ItemId::parse(&data).unwrap();
    /// assert_eq!(item.offset, 8180);
    /// assert_eq!(item.state, ItemState::Normal);
    /// assert_eq!(item.length, 12);
    /// assert!(item.is_live());
    /// ```
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < SIZE_ITEM_ID {
            return None;
        }
        let word = BigEndian::read_u16(&data[2..4]);
        Some(ItemId {
            offset: BigEndian::read_u16(&data[0..2]),
            state: ItemState::from_bits(word),
            length: word >> LP_LEN_SHIFT,
        })
    }

    /// True if the line pointer has tuple bytes behind it.
    pub fn has_storage(&self) -> bool {
        self.length != 0
    }

    /// True if the line pointer yields a tuple: state normal and length > 0.
    pub fn is_live(&self) -> bool {
        self.state == ItemState::Normal && self.has_storage()
    }

    /// True if `[offset, offset + length)` lies inside `[lower, special)`.
    pub fn within(&self, lower: u16, special: u16) -> bool {
        let start = self.offset as usize;
        let end = start + self.length as usize;
        start >= lower as usize && end <= special as usize
    }
}

/// A validated page: header, line pointers, and the underlying block.
#[derive(Debug, Clone)]
pub struct Page<'a> {
    pub header: PageHeader,
    pub items: Vec<ItemId>,
    data: &'a [u8],
}

impl<'a> Page<'a> {
    /// The raw block this page was decoded from.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Look up a line pointer by its 1-based item number.
    pub fn item(&self, item: u16) -> Option<&ItemId> {
        (item as usize)
            .checked_sub(1)
            .and_then(|idx| self.items.get(idx))
    }

    /// Iterate over live line pointers as `(item_number, item)`.
    pub fn live_items(&self) -> impl Iterator<Item = (u16, &ItemId)> + '_ {
        self.items
            .iter()
            .enumerate()
            .filter(|(_, it)| it.is_live())
            .map(|(idx, it)| (idx as u16 + 1, it))
    }

    /// Number of live line pointers.
    pub fn live_count(&self) -> usize {
        self.items.iter().filter(|it| it.is_live()).count()
    }

    /// Return the bytes of the tuple referenced by item number `item`.
    ///
    /// Fails when the item does not exist, is not live, or points outside
    /// `[lower, special)`.
    pub fn tuple_bytes(&self, item: u16) -> Result<&'a [u8], PageError> {
        let it = *self.item(item).ok_or(PageError::NoSuchItem {
            item,
            count: self.items.len(),
        })?;
        if !it.is_live() {
            return Err(PageError::NotLive {
                item,
                state: it.state,
            });
        }
        if !it.within(self.header.lower, self.header.special) {
            return Err(PageError::SlotOutOfBounds {
                item,
                offset: it.offset,
                length: it.length,
            });
        }
        let start = it.offset as usize;
        Ok(&self.data[start..start + it.length as usize])
    }
}

/// Decode one block into a [`Page`].
///
/// The block must be exactly `page_size` bytes. All-zero blocks are
/// reported as [`PageError::Uninitialized`]; a header violating
/// `24 <= lower <= upper <= special <= page_size` as [`PageError::Malformed`].
///
/// # Examples
///
/// ```
/// use pdu::heap::constants::BLCKSZ;
/// use pdu::heap::page::{decode_page, PageError};
///
/// let block = vec![0u8; BLCKSZ];
/// assert_eq!(decode_page(&block, BLCKSZ).unwrap_err(), PageError::Uninitialized);
/// ```
pub fn decode_page(block: &[u8], page_size: usize) -> Result<Page<'_>, PageError> {
    if block.len() != page_size {
        return Err(PageError::WrongSize {
            expected: page_size,
            actual: block.len(),
        });
    }
    if block.iter().all(|&b| b == 0) {
        return Err(PageError::Uninitialized);
    }

    let header = PageHeader::parse(block).ok_or(PageError::WrongSize {
        expected: page_size,
        actual: block.len(),
    })?;
    header.validate(page_size)?;

    // lower <= page_size, so every line pointer is inside the block
    let items = (0..header.item_count())
        .filter_map(|i| ItemId::parse(&block[SIZE_PAGE_HEADER + i * SIZE_ITEM_ID..]))
        .collect();

    Ok(Page {
        header,
        items,
        data: block,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn write_header(page: &mut [u8], lower: u16, upper: u16, special: u16) {
        BigEndian::write_u32(&mut page[PD_LSN_XLOGID..], 1);
        BigEndian::write_u32(&mut page[PD_LSN_XRECOFF..], 0x2000);
        BigEndian::write_u16(&mut page[PD_LOWER..], lower);
        BigEndian::write_u16(&mut page[PD_UPPER..], upper);
        BigEndian::write_u16(&mut page[PD_SPECIAL..], special);
        BigEndian::write_u16(&mut page[PD_PAGESIZE_VERSION..], 0x2000 | 4);
    }

    fn write_item(page: &mut [u8], idx: usize, offset: u16, state: u16, length: u16) {
        let pos = SIZE_PAGE_HEADER + idx * SIZE_ITEM_ID;
        BigEndian::write_u16(&mut page[pos..], offset);
        BigEndian::write_u16(&mut page[pos + 2..], (length << LP_LEN_SHIFT) | state);
    }

    #[test]
    fn test_page_header_parse() {
        let mut page = vec![0u8; BLCKSZ];
        write_header(&mut page, 28, 8168, 8192);
        BigEndian::write_u16(&mut page[PD_FLAGS..], PD_ALL_VISIBLE);
        BigEndian::write_u32(&mut page[PD_PRUNE_XID..], 742);

        let hdr = PageHeader::parse(&page).unwrap();
        assert_eq!(hdr.lower, 28);
        assert_eq!(hdr.upper, 8168);
        assert_eq!(hdr.special, 8192);
        assert_eq!(hdr.lsn(), (1u64 << 32) | 0x2000);
        assert_eq!(hdr.layout_version(), 4);
        assert_eq!(hdr.recorded_page_size(), 8192);
        assert_eq!(hdr.prune_xid, 742);
        assert!(hdr.is_all_visible());
        assert!(!hdr.is_full());
        assert_eq!(hdr.item_count(), 1);
        assert_eq!(hdr.free_space(), 8140);
    }

    #[test]
    fn test_page_header_too_short() {
        assert!(PageHeader::parse(&[0u8; 10]).is_none());
    }

    #[test]
    fn test_item_state_from_bits() {
        assert_eq!(ItemState::from_bits(0), ItemState::Unused);
        assert_eq!(ItemState::from_bits(1), ItemState::Normal);
        assert_eq!(ItemState::from_bits(2), ItemState::Redirect);
        assert_eq!(ItemState::from_bits(3), ItemState::Dead);
        // only the low two bits count
        assert_eq!(ItemState::from_bits(0x0005), ItemState::Normal);
    }

    #[test]
    fn test_item_id_max_length() {
        let mut data = [0u8; 4];
        BigEndian::write_u16(&mut data[2..4], (LP_MAX_LEN << LP_LEN_SHIFT) | LP_DEAD);
        let item = ItemId::parse(&data).unwrap();
        assert_eq!(item.length, LP_MAX_LEN);
        assert_eq!(item.state, ItemState::Dead);
        assert!(!item.is_live());
        assert!(item.has_storage());
    }

    #[test]
    fn test_decode_page_wrong_size() {
        let block = vec![1u8; 100];
        assert_eq!(
            decode_page(&block, BLCKSZ).unwrap_err(),
            PageError::WrongSize {
                expected: BLCKSZ,
                actual: 100
            }
        );
    }

    #[test]
    fn test_decode_page_lower_above_upper() {
        // 32 (header + 2 items) but upper only 30
        let mut page = vec![0u8; BLCKSZ];
        write_header(&mut page, 32, 30, 8192);
        assert!(matches!(
            decode_page(&page, BLCKSZ),
            Err(PageError::Malformed { lower: 32, upper: 30, .. })
        ));
    }

    #[test]
    fn test_decode_page_lower_inside_header() {
        let mut page = vec![0u8; BLCKSZ];
        write_header(&mut page, 12, 8192, 8192);
        assert!(matches!(
            decode_page(&page, BLCKSZ),
            Err(PageError::Malformed { .. })
        ));
    }

    #[test]
    fn test_decode_page_special_past_end() {
        let mut page = vec![0u8; 4096];
        write_header(&mut page, 24, 4000, 4100);
        assert!(matches!(
            decode_page(&page, 4096),
            Err(PageError::Malformed { special: 4100, .. })
        ));
    }

    #[test]
    fn test_decode_page_items_and_liveness() {
        let mut page = vec![0u8; BLCKSZ];
        write_header(&mut page, 24 + 4 * 4, 8100, 8192);
        write_item(&mut page, 0, 8160, LP_NORMAL, 32);
        write_item(&mut page, 1, 0, LP_NORMAL, 0);
        write_item(&mut page, 2, 3, LP_REDIRECT, 0);
        write_item(&mut page, 3, 8100, LP_DEAD, 60);

        let p = decode_page(&page, BLCKSZ).unwrap();
        assert_eq!(p.items.len(), 4);
        assert_eq!(p.live_count(), 1);
        let live: Vec<u16> = p.live_items().map(|(n, _)| n).collect();
        assert_eq!(live, vec![1]);
        assert_eq!(p.tuple_bytes(1).unwrap().len(), 32);
        assert!(matches!(
            p.tuple_bytes(2),
            Err(PageError::NotLive { item: 2, .. })
        ));
        assert!(matches!(
            p.tuple_bytes(9),
            Err(PageError::NoSuchItem { item: 9, count: 4 })
        ));
        assert!(p.item(0).is_none());
    }

    #[test]
    fn test_tuple_bytes_outside_tuple_area() {
        let mut page = vec![0u8; BLCKSZ];
        write_header(&mut page, 28, 8000, 8176);
        // runs into the special area
        write_item(&mut page, 0, 8170, LP_NORMAL, 20);
        let p = decode_page(&page, BLCKSZ).unwrap();
        assert_eq!(
            p.tuple_bytes(1).unwrap_err(),
            PageError::SlotOutOfBounds {
                item: 1,
                offset: 8170,
                length: 20
            }
        );
    }

    const STATES: [u16; 4] = [LP_UNUSED, LP_NORMAL, LP_REDIRECT, LP_DEAD];

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(128))]

        #[test]
        fn live_count_matches_normal_slots_with_storage(
            slots in prop::collection::vec((0usize..4, 0u16..48), 0..64)
        ) {
            let lower = (SIZE_PAGE_HEADER + slots.len() * SIZE_ITEM_ID) as u16;
            let upper = BLCKSZ as u16 - 64 * 48;
            let mut page = vec![0u8; BLCKSZ];
            write_header(&mut page, lower, upper, BLCKSZ as u16);
            for (idx, &(state, length)) in slots.iter().enumerate() {
                let offset = if length == 0 { 0 } else { upper + 48 * idx as u16 };
                write_item(&mut page, idx, offset, STATES[state], length);
            }
            let expected = slots
                .iter()
                .filter(|&&(state, length)| STATES[state] == LP_NORMAL && length > 0)
                .count();

            let p = decode_page(&page, BLCKSZ).unwrap();
            prop_assert_eq!(p.items.len(), slots.len());
            prop_assert_eq!(p.live_count(), expected);
            prop_assert_eq!(p.live_items().count(), expected);
        }

        #[test]
        fn lower_above_upper_is_malformed(
            (lower, upper) in (25u16..=BLCKSZ as u16).prop_flat_map(|l| (Just(l), 0..l)),
            special in any::<u16>(),
        ) {
            let mut page = vec![0u8; BLCKSZ];
            write_header(&mut page, lower, upper, special);
            let result = decode_page(&page, BLCKSZ);
            prop_assert!(
                matches!(result, Err(PageError::Malformed { lower: l, upper: u, .. }) if l == lower && u == upper),
                "lower={} upper={} gave {:?}", lower, upper, result
            );
        }
    }
}
