/// Heap file page and tuple layout constants.
///
/// Offsets are relative to the start of the structure they describe. All
/// multi-byte fields are stored big-endian.
// Page size
pub const BLCKSZ: usize = 8192;

// Page header (24 bytes)
pub const SIZE_PAGE_HEADER: usize = 24;
pub const PD_LSN_XLOGID: usize = 0; // 4 bytes - WAL file id of last change
pub const PD_LSN_XRECOFF: usize = 4; // 4 bytes - offset within that WAL file
pub const PD_CHECKSUM: usize = 8; // 2 bytes - page checksum
pub const PD_FLAGS: usize = 10; // 2 bytes - flag bits
pub const PD_LOWER: usize = 12; // 2 bytes - start of free space
pub const PD_UPPER: usize = 14; // 2 bytes - end of free space
pub const PD_SPECIAL: usize = 16; // 2 bytes - start of special space
pub const PD_PAGESIZE_VERSION: usize = 18; // 2 bytes - page size | layout version
pub const PD_PRUNE_XID: usize = 20; // 4 bytes - oldest prunable xid

// Page flag bits
pub const PD_HAS_FREE_LINES: u16 = 0x0001;
pub const PD_PAGE_FULL: u16 = 0x0002;
pub const PD_ALL_VISIBLE: u16 = 0x0004;

// pd_pagesize_version packing
pub const PD_VERSION_MASK: u16 = 0x00FF;
pub const PD_PAGESIZE_MASK: u16 = 0xFF00;

// Line pointer (4 bytes: 2-byte offset, 2-byte state|length word)
pub const SIZE_ITEM_ID: usize = 4;
pub const LP_FLAGS_MASK: u16 = 0x0003;
pub const LP_LEN_SHIFT: u16 = 2;
pub const LP_MAX_LEN: u16 = 0x3FFF;

pub const LP_UNUSED: u16 = 0;
pub const LP_NORMAL: u16 = 1;
pub const LP_REDIRECT: u16 = 2;
pub const LP_DEAD: u16 = 3;

// Special-area sizes recognised by the scanner (bytes before page end).
// 0 = plain heap, 8 = gin/spgist/brin style, 16 = btree/hash/gist style.
pub const RECOGNIZED_SPECIAL_SIZES: [usize; 3] = [0, 8, 16];

// Tuple header (23 bytes before the null bitmap)
pub const SIZE_HEAP_TUPLE_HEADER: usize = 23;
pub const T_XMIN: usize = 0; // 4 bytes - inserting transaction
pub const T_XMAX: usize = 4; // 4 bytes - deleting / locking transaction
pub const T_FIELD3: usize = 8; // 4 bytes - command id or vacuum xid
pub const T_CTID: usize = 12; // 6 bytes - block hi, block lo, offset
pub const T_INFOMASK2: usize = 18; // 2 bytes - attribute count + flags
pub const T_INFOMASK: usize = 20; // 2 bytes - flag bits
pub const T_HOFF: usize = 22; // 1 byte - header length incl. bitmap and padding
pub const T_BITS: usize = 23; // null bitmap start

// t_infomask bits
pub const HEAP_HASNULL: u16 = 0x0001;
pub const HEAP_HASVARWIDTH: u16 = 0x0002;
pub const HEAP_HASEXTERNAL: u16 = 0x0004;
pub const HEAP_HASOID: u16 = 0x0008;
pub const HEAP_XMAX_KEYSHR_LOCK: u16 = 0x0010;
pub const HEAP_COMBOCID: u16 = 0x0020;
pub const HEAP_XMAX_EXCL_LOCK: u16 = 0x0040;
pub const HEAP_XMAX_LOCK_ONLY: u16 = 0x0080;
pub const HEAP_XMIN_COMMITTED: u16 = 0x0100;
pub const HEAP_XMIN_INVALID: u16 = 0x0200;
pub const HEAP_XMAX_COMMITTED: u16 = 0x0400;
pub const HEAP_XMAX_INVALID: u16 = 0x0800;
pub const HEAP_XMAX_IS_MULTI: u16 = 0x1000;
pub const HEAP_UPDATED: u16 = 0x2000;

// t_infomask2 bits
pub const HEAP_NATTS_MASK: u16 = 0x07FF;
pub const HEAP_KEYS_UPDATED: u16 = 0x2000;
pub const HEAP_HOT_UPDATED: u16 = 0x4000;
pub const HEAP_ONLY_TUPLE: u16 = 0x8000;

// Object id stored just before t_hoff when HEAP_HASOID is set
pub const SIZE_OID: usize = 4;

// Variable-length (varlena) headers
pub const VARHDRSZ: usize = 4;
pub const VARHDRSZ_SHORT: usize = 1;
pub const VARHDRSZ_EXTERNAL: usize = 2;
pub const VARLENA_4B_MASK: u8 = 0xC0; // top two bits of the first byte
pub const VARLENA_4B_U: u8 = 0x00; // 4-byte header, uncompressed
pub const VARLENA_4B_C: u8 = 0x40; // 4-byte header, compressed inline
pub const VARLENA_1B: u8 = 0x80; // top bit set: 1-byte header
pub const VARLENA_1B_E: u8 = 0x80; // exactly 0x80: external pointer
pub const VARLENA_4B_LEN_MASK: u32 = 0x3FFF_FFFF;
pub const VARLENA_1B_LEN_MASK: u8 = 0x7F;

// Compressed inline varlena: 4-byte raw-size / method word after the header
pub const VARLENA_COMPRESSED_HDRSZ: usize = 8;
pub const VARLENA_EXTSIZE_MASK: u32 = 0x3FFF_FFFF;
pub const VARLENA_EXTSIZE_BITS: u32 = 30;
pub const TOAST_PGLZ_COMPRESSION_ID: u32 = 0;
pub const TOAST_LZ4_COMPRESSION_ID: u32 = 1;

// External pointer tags
pub const VARTAG_INDIRECT: u8 = 1;
pub const VARTAG_EXPANDED_RO: u8 = 2;
pub const VARTAG_EXPANDED_RW: u8 = 3;
pub const VARTAG_ONDISK: u8 = 18;
pub const SIZE_VARATT_EXTERNAL: usize = 16;

/// Round `offset` up to the next multiple of `align` (a power of two).
pub const fn align_up(offset: usize, align: usize) -> usize {
    (offset + align - 1) & !(align - 1)
}
