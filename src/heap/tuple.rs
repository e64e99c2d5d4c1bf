//! Heap tuple header and null bitmap parsing.
//!
//! Each tuple starts with a fixed 23-byte header ([`TupleHeader`]) carrying
//! the inserting/deleting transaction ids, the current tuple id (`ctid`),
//! two info masks and `hoff`, the offset where attribute data begins. When
//! the `HEAP_HASNULL` bit is set, a null bitmap (one bit per attribute,
//! least-significant bit first, 0 = null) sits between the fixed header and
//! `hoff`.
//!
//! No visibility decision is made here: the raw transaction fields and hint
//! bits are exposed for the caller to interpret.

use byteorder::{BigEndian, ByteOrder};
use serde::Serialize;
use thiserror::Error;

use crate::heap::constants::*;

/// Errors produced while decoding a tuple header.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TupleError {
    /// Fewer bytes than the fixed header.
    #[error("tuple is {actual} bytes, header needs {needed}")]
    Truncated { needed: usize, actual: usize },

    /// Header fields are inconsistent with the tuple length.
    #[error("malformed tuple header: {0}")]
    Malformed(String),
}

/// Tuple id: block number and 1-based item number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ItemPointer {
    pub block: u32,
    pub offset: u16,
}

impl ItemPointer {
    fn parse(data: &[u8]) -> Self {
        let hi = BigEndian::read_u16(&data[0..2]) as u32;
        let lo = BigEndian::read_u16(&data[2..4]) as u32;
        ItemPointer {
            block: (hi << 16) | lo,
            offset: BigEndian::read_u16(&data[4..6]),
        }
    }
}

impl std::fmt::Display for ItemPointer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({},{})", self.block, self.offset)
    }
}

/// Parsed tuple header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TupleHeader {
    /// Inserting transaction id. Bytes 0-3.
    pub xmin: u32,
    /// Deleting or locking transaction id. Bytes 4-7.
    pub xmax: u32,
    /// Command id or old-style vacuum xid. Bytes 8-11.
    pub field3: u32,
    /// Current tuple id of this or a newer version. Bytes 12-17.
    pub ctid: ItemPointer,
    /// Attribute count (low 11 bits) and update flags. Bytes 18-19.
    pub infomask2: u16,
    /// Flag bits. Bytes 20-21.
    pub infomask: u16,
    /// Offset of the attribute data. Byte 22.
    pub hoff: u8,
    /// Null bitmap bytes, present only when `HEAP_HASNULL` is set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub null_bitmap: Option<Vec<u8>>,
    /// Object id, present only when `HEAP_HASOID` is set and stored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oid: Option<u32>,
}

impl TupleHeader {
    /// Number of attributes stored in the tuple.
    pub fn natts(&self) -> usize {
        (self.infomask2 & HEAP_NATTS_MASK) as usize
    }

    pub fn has_nulls(&self) -> bool {
        self.infomask & HEAP_HASNULL != 0
    }

    pub fn has_varwidth(&self) -> bool {
        self.infomask & HEAP_HASVARWIDTH != 0
    }

    pub fn has_external(&self) -> bool {
        self.infomask & HEAP_HASEXTERNAL != 0
    }

    pub fn has_oid(&self) -> bool {
        self.infomask & HEAP_HASOID != 0
    }

    pub fn xmin_committed(&self) -> bool {
        self.infomask & HEAP_XMIN_COMMITTED != 0
    }

    pub fn xmin_invalid(&self) -> bool {
        self.infomask & HEAP_XMIN_INVALID != 0
    }

    pub fn xmax_committed(&self) -> bool {
        self.infomask & HEAP_XMAX_COMMITTED != 0
    }

    pub fn xmax_invalid(&self) -> bool {
        self.infomask & HEAP_XMAX_INVALID != 0
    }

    pub fn xmax_is_multi(&self) -> bool {
        self.infomask & HEAP_XMAX_IS_MULTI != 0
    }

    pub fn xmax_lock_only(&self) -> bool {
        self.infomask & HEAP_XMAX_LOCK_ONLY != 0
    }

    pub fn is_hot_updated(&self) -> bool {
        self.infomask2 & HEAP_HOT_UPDATED != 0
    }

    pub fn is_heap_only(&self) -> bool {
        self.infomask2 & HEAP_ONLY_TUPLE != 0
    }

    pub fn keys_updated(&self) -> bool {
        self.infomask2 & HEAP_KEYS_UPDATED != 0
    }

    /// True if attribute `attnum` (0-based) is null.
    ///
    /// Without a bitmap nothing is null. Attributes past the bitmap's
    /// declared count are reported as null, since they are not stored.
    pub fn is_null(&self, attnum: usize) -> bool {
        match &self.null_bitmap {
            None => false,
            Some(bits) => {
                if attnum >= self.natts() {
                    return true;
                }
                bits.get(attnum / 8)
                    .is_none_or(|byte| byte & (1 << (attnum % 8)) == 0)
            }
        }
    }

    /// Short text summary of the hint bits, e.g. `"xmin_committed,xmax_invalid"`.
    pub fn hint_summary(&self) -> String {
        let mut parts = Vec::new();
        if self.xmin_committed() {
            parts.push("xmin_committed");
        }
        if self.xmin_invalid() {
            parts.push("xmin_invalid");
        }
        if self.xmax_committed() {
            parts.push("xmax_committed");
        }
        if self.xmax_invalid() {
            parts.push("xmax_invalid");
        }
        if self.xmax_is_multi() {
            parts.push("xmax_multi");
        }
        if self.is_hot_updated() {
            parts.push("hot_updated");
        }
        if self.is_heap_only() {
            parts.push("heap_only");
        }
        parts.join(",")
    }
}

/// Decode the header (and null bitmap) of one tuple.
///
/// `data` is exactly the tuple's byte range as referenced by its line
/// pointer. Requires at least 23 bytes and `23 <= hoff <= data.len()`.
/// With `HEAP_HASNULL`, `ceil(natts / 8)` bitmap bytes must fit before
/// `hoff`.
///
/// # Examples
///
/// ```
/// use pdu::heap::tuple::{decode_tuple_header, TupleError};
///
/// let mut data = vec![0u8; 24];
/// data[22] = 24; // hoff
/// let hdr = decode_tuple_header(&data).unwrap();
/// assert_eq!(hdr.natts(), 0);
///
/// assert!(matches!(
///     decode_tuple_header(&data[..12]),
///     Err(TupleError::Truncated { needed: 23, actual: 12 })
/// ));
/// ```
pub fn decode_tuple_header(data: &[u8]) -> Result<TupleHeader, TupleError> {
    if data.len() < SIZE_HEAP_TUPLE_HEADER {
        return Err(TupleError::Truncated {
            needed: SIZE_HEAP_TUPLE_HEADER,
            actual: data.len(),
        });
    }

    let infomask2 = BigEndian::read_u16(&data[T_INFOMASK2..]);
    let infomask = BigEndian::read_u16(&data[T_INFOMASK..]);
    let hoff = data[T_HOFF];
    let hoff_usize = hoff as usize;

    if hoff_usize < SIZE_HEAP_TUPLE_HEADER {
        return Err(TupleError::Malformed(format!(
            "hoff {} is inside the fixed header",
            hoff
        )));
    }
    if hoff_usize > data.len() {
        return Err(TupleError::Malformed(format!(
            "hoff {} is past the tuple end ({} bytes)",
            hoff,
            data.len()
        )));
    }

    let natts = (infomask2 & HEAP_NATTS_MASK) as usize;
    let bitmap_len = natts.div_ceil(8);

    let null_bitmap = if infomask & HEAP_HASNULL != 0 {
        let end = T_BITS + bitmap_len;
        if end > hoff_usize {
            return Err(TupleError::Malformed(format!(
                "null bitmap for {} attributes needs {} bytes, only {} before hoff",
                natts,
                bitmap_len,
                hoff_usize - T_BITS
            )));
        }
        Some(data[T_BITS..end].to_vec())
    } else {
        None
    };

    // The object id occupies the last 4 bytes before hoff
    let oid = if infomask & HEAP_HASOID != 0 {
        let bitmap_end = T_BITS + if null_bitmap.is_some() { bitmap_len } else { 0 };
        if hoff_usize >= bitmap_end + SIZE_OID {
            Some(BigEndian::read_u32(&data[hoff_usize - SIZE_OID..]))
        } else {
            None
        }
    } else {
        None
    };

    Ok(TupleHeader {
        xmin: BigEndian::read_u32(&data[T_XMIN..]),
        xmax: BigEndian::read_u32(&data[T_XMAX..]),
        field3: BigEndian::read_u32(&data[T_FIELD3..]),
        ctid: ItemPointer::parse(&data[T_CTID..]),
        infomask2,
        infomask,
        hoff,
        null_bitmap,
        oid,
    })
}
