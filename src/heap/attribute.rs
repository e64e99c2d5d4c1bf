//! Attribute (column value) decoding.
//!
//! Walks the attribute area of a tuple, starting at `hoff`, using an ordered
//! list of [`ColumnDescriptor`]s supplied by the catalog collaborator. Null
//! attributes take no space. Every other attribute is aligned to its
//! column's alignment boundary and then read according to its length class:
//!
//! | Class | Encoding |
//! |-------|----------|
//! | Fixed `n` | exactly `n` bytes |
//! | Varlena | 1-byte header (top bit set, not aligned), 4-byte header (top two bits `00` plain, `01` compressed), or `0x80` external pointer |
//! | CString | bytes up to and including a zero terminator |
//!
//! No read ever goes past the tuple slice: a value that would overrun it
//! yields [`AttrError::OutOfBounds`] together with everything decoded so far.

use byteorder::{BigEndian, ByteOrder};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

use crate::heap::compression::{decompress, CompressionMethod};
use crate::heap::constants::*;
use crate::heap::tuple::TupleHeader;

/// Required alignment of a column's stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Alignment {
    Char,
    Short,
    Int,
    Double,
}

impl Alignment {
    /// Alignment in bytes (1, 2, 4 or 8).
    pub fn bytes(self) -> usize {
        match self {
            Alignment::Char => 1,
            Alignment::Short => 2,
            Alignment::Int => 4,
            Alignment::Double => 8,
        }
    }
}

impl TryFrom<u8> for Alignment {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Alignment::Char),
            2 => Ok(Alignment::Short),
            4 => Ok(Alignment::Int),
            8 => Ok(Alignment::Double),
            other => Err(format!("invalid alignment {} (expected 1, 2, 4 or 8)", other)),
        }
    }
}

impl From<Alignment> for u8 {
    fn from(value: Alignment) -> Self {
        value.bytes() as u8
    }
}

/// How a column's stored length is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnLength {
    /// Fixed number of bytes.
    Fixed(u16),
    /// Self-describing length header.
    Varlena,
    /// Zero-terminated.
    Cstring,
}

/// Storage description of one column, as supplied by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub length: ColumnLength,
    pub align: Alignment,
    /// Passed by value (fixed-size scalar) rather than by reference.
    #[serde(default)]
    pub by_value: bool,
    /// Type name used for rendering (e.g. `"int4"`, `"text"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
}

impl ColumnDescriptor {
    /// Fixed-length column.
    pub fn fixed(name: &str, len: u16, align: Alignment, by_value: bool) -> Self {
        ColumnDescriptor {
            name: name.to_string(),
            length: ColumnLength::Fixed(len),
            align,
            by_value,
            type_name: None,
        }
    }

    /// Variable-length (varlena) column.
    pub fn varlena(name: &str, align: Alignment) -> Self {
        ColumnDescriptor {
            name: name.to_string(),
            length: ColumnLength::Varlena,
            align,
            by_value: false,
            type_name: None,
        }
    }

    /// Zero-terminated string column.
    pub fn cstring(name: &str) -> Self {
        ColumnDescriptor {
            name: name.to_string(),
            length: ColumnLength::Cstring,
            align: Alignment::Char,
            by_value: false,
            type_name: None,
        }
    }

    /// Attach a type name for rendering.
    pub fn with_type(mut self, type_name: &str) -> Self {
        self.type_name = Some(type_name.to_string());
        self
    }

    pub fn is_variable(&self) -> bool {
        !matches!(self.length, ColumnLength::Fixed(_))
    }
}

/// Pointer to a value stored out of line (toast).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExternalPointer {
    /// Pointer tag (18 = on-disk).
    pub tag: u8,
    /// Original size including header.
    pub raw_size: i32,
    /// External stored size (low 30 bits) and compression method (top 2 bits).
    pub ext_info: u32,
    /// Value id within the toast relation.
    pub value_id: u32,
    /// Toast relation id.
    pub toast_relid: u32,
}

impl ExternalPointer {
    /// Stored (possibly compressed) size in the toast relation.
    pub fn ext_size(&self) -> u32 {
        self.ext_info & VARLENA_EXTSIZE_MASK
    }

    /// True if the external copy is compressed.
    pub fn is_compressed(&self) -> bool {
        (self.ext_size() as i64) < (self.raw_size as i64 - VARHDRSZ as i64)
    }
}

/// Decoded value of one attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    Null,
    /// Fixed-length value bytes.
    Fixed(Vec<u8>),
    /// Variable-length payload (header stripped, decompressed if it was compressed).
    Varlena(Vec<u8>),
    /// Zero-terminated value without its terminator.
    Cstring(Vec<u8>),
    /// Inline compressed value that could not be decompressed.
    Compressed {
        method: CompressionMethod,
        raw_size: u32,
        data: Vec<u8>,
    },
    /// Value stored out of line; not resolvable from this block.
    ExternalReference(ExternalPointer),
}

impl AttributeValue {
    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    /// The inline value bytes, if there are any.
    pub fn bytes(&self) -> Option<&[u8]> {
        match self {
            AttributeValue::Fixed(b) | AttributeValue::Varlena(b) | AttributeValue::Cstring(b) => {
                Some(b)
            }
            _ => None,
        }
    }
}

impl Serialize for AttributeValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use crate::util::hex::format_bytes;

        match self {
            AttributeValue::Null => serializer.serialize_none(),
            AttributeValue::Fixed(b) | AttributeValue::Varlena(b) | AttributeValue::Cstring(b) => {
                serializer.serialize_str(&format_bytes(b))
            }
            AttributeValue::Compressed {
                method,
                raw_size,
                data,
            } => {
                let mut s = serializer.serialize_struct("Compressed", 3)?;
                s.serialize_field("compression", method.name())?;
                s.serialize_field("raw_size", raw_size)?;
                s.serialize_field("data_hex", &format_bytes(data))?;
                s.end()
            }
            AttributeValue::ExternalReference(ptr) => ptr.serialize(serializer),
        }
    }
}

/// Errors produced while decoding attributes.
///
/// Every variant carries the values decoded before the problem was found.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AttrError {
    /// A value would extend past the end of the tuple.
    #[error("attribute {column} ({name}) needs bytes {offset}..{end}, tuple has {available}")]
    OutOfBounds {
        column: usize,
        name: String,
        offset: usize,
        end: usize,
        available: usize,
        partial: Vec<AttributeValue>,
    },

    /// The tuple stores a different number of attributes than the schema declares.
    #[error("tuple stores {found} attributes, schema declares {expected}")]
    ArityMismatch {
        expected: usize,
        found: usize,
        partial: Vec<AttributeValue>,
    },

    /// A varlena header is not a valid on-disk encoding.
    #[error("attribute {column} ({name}): {reason}")]
    BadVarlena {
        column: usize,
        name: String,
        reason: String,
        partial: Vec<AttributeValue>,
    },
}

impl AttrError {
    /// Values decoded before the error.
    pub fn partial(&self) -> &[AttributeValue] {
        match self {
            AttrError::OutOfBounds { partial, .. }
            | AttrError::ArityMismatch { partial, .. }
            | AttrError::BadVarlena { partial, .. } => partial,
        }
    }

    /// Consume the error, keeping the partial values.
    pub fn into_partial(self) -> Vec<AttributeValue> {
        match self {
            AttrError::OutOfBounds { partial, .. }
            | AttrError::ArityMismatch { partial, .. }
            | AttrError::BadVarlena { partial, .. } => partial,
        }
    }

    /// An arity mismatch is a warning: every stored value was decoded.
    pub fn is_warning(&self) -> bool {
        matches!(self, AttrError::ArityMismatch { .. })
    }
}

/// Problem found while reading a single value, before column context is added.
enum ValueFault {
    Bounds { offset: usize, end: usize },
    Varlena(String),
}

/// Bounds-checked sub-slice `data[offset..offset + len]`.
fn take(data: &[u8], offset: usize, len: usize) -> Result<&[u8], ValueFault> {
    let end = offset.checked_add(len).ok_or(ValueFault::Bounds {
        offset,
        end: usize::MAX,
    })?;
    data.get(offset..end)
        .ok_or(ValueFault::Bounds { offset, end })
}

fn byte_at(data: &[u8], offset: usize) -> Result<u8, ValueFault> {
    take(data, offset, 1).map(|b| b[0])
}

/// Decode one varlena starting at `pos`; returns the value and bytes consumed.
fn read_varlena(data: &[u8], pos: usize) -> Result<(AttributeValue, usize), ValueFault> {
    let first = byte_at(data, pos)?;

    if first == VARLENA_1B_E {
        let tag = byte_at(data, pos + 1)?;
        if tag != VARTAG_ONDISK {
            let kind = match tag {
                VARTAG_INDIRECT => "indirect",
                VARTAG_EXPANDED_RO | VARTAG_EXPANDED_RW => "expanded",
                _ => "unknown",
            };
            return Err(ValueFault::Varlena(format!(
                "{} external pointer tag {} cannot appear on disk",
                kind, tag
            )));
        }
        let body = take(data, pos + VARHDRSZ_EXTERNAL, SIZE_VARATT_EXTERNAL)?;
        let ptr = ExternalPointer {
            tag,
            raw_size: BigEndian::read_i32(&body[0..4]),
            ext_info: BigEndian::read_u32(&body[4..8]),
            value_id: BigEndian::read_u32(&body[8..12]),
            toast_relid: BigEndian::read_u32(&body[12..16]),
        };
        return Ok((
            AttributeValue::ExternalReference(ptr),
            VARHDRSZ_EXTERNAL + SIZE_VARATT_EXTERNAL,
        ));
    }

    if first & VARLENA_1B != 0 {
        // Short header: low 7 bits are the total length including this byte
        let total = (first & VARLENA_1B_LEN_MASK) as usize;
        if total < VARHDRSZ_SHORT {
            return Err(ValueFault::Varlena(
                "short varlena with zero length".to_string(),
            ));
        }
        let payload = take(data, pos + VARHDRSZ_SHORT, total - VARHDRSZ_SHORT)?;
        return Ok((AttributeValue::Varlena(payload.to_vec()), total));
    }

    let word = BigEndian::read_u32(take(data, pos, VARHDRSZ)?);
    let total = (word & VARLENA_4B_LEN_MASK) as usize;

    match first & VARLENA_4B_MASK {
        VARLENA_4B_U => {
            if total < VARHDRSZ {
                return Err(ValueFault::Varlena(format!(
                    "4-byte varlena length {} is shorter than its header",
                    total
                )));
            }
            let payload = take(data, pos + VARHDRSZ, total - VARHDRSZ)?;
            Ok((AttributeValue::Varlena(payload.to_vec()), total))
        }
        VARLENA_4B_C => {
            if total < VARLENA_COMPRESSED_HDRSZ {
                return Err(ValueFault::Varlena(format!(
                    "compressed varlena length {} is shorter than its header",
                    total
                )));
            }
            let body = take(data, pos + VARHDRSZ, total - VARHDRSZ)?;
            let info = BigEndian::read_u32(&body[0..4]);
            let raw_size = info & VARLENA_EXTSIZE_MASK;
            let method = CompressionMethod::from_id(info >> VARLENA_EXTSIZE_BITS);
            let compressed = &body[4..];
            let value = match decompress(method, compressed, raw_size as usize) {
                Some(out) => AttributeValue::Varlena(out),
                None => {
                    tracing::debug!(
                        method = method.name(),
                        raw_size,
                        "inline compressed value left undecoded"
                    );
                    AttributeValue::Compressed {
                        method,
                        raw_size,
                        data: compressed.to_vec(),
                    }
                }
            };
            Ok((value, total))
        }
        _ => unreachable!("top bit clear leaves only the 00 and 01 forms"),
    }
}

/// True if bitmap bit `attnum` marks the attribute as null.
fn bitmap_says_null(null_bitmap: Option<&[u8]>, attnum: usize) -> bool {
    match null_bitmap {
        None => false,
        Some(bits) => bits
            .get(attnum / 8)
            .is_none_or(|b| b & (1 << (attnum % 8)) == 0),
    }
}

/// Decode attribute values from a tuple.
///
/// `data` is the complete tuple byte range, `hoff` the offset where the
/// attribute area begins, `null_bitmap` the bitmap bytes (None when the tuple
/// has no nulls) and `natts` the attribute count stored in the tuple header.
///
/// Returns one value per descriptor. When `natts` differs from the number
/// of descriptors, the `min(natts, descriptors)` stored values are decoded
/// and returned inside [`AttrError::ArityMismatch`].
///
/// # Examples
///
/// ```
/// use pdu::heap::attribute::{decode_attributes, Alignment, AttributeValue, ColumnDescriptor};
///
/// // hoff = 24, then an int4 (42) and a short-header varlena "hi"
/// let mut data = vec![0u8; 24];
/// data.extend_from_slice(&42i32.to_be_bytes());
/// data.extend_from_slice(&[0x83, b'h', b'i']);
///
/// let cols = vec![
///     ColumnDescriptor::fixed("id", 4, Alignment::Int, true),
///     ColumnDescriptor::varlena("note", Alignment::Int),
/// ];
/// let values = decode_attributes(&data, 24, None, 2, &cols).unwrap();
/// assert_eq!(values[0], AttributeValue::Fixed(vec![0, 0, 0, 42]));
/// assert_eq!(values[1], AttributeValue::Varlena(b"hi".to_vec()));
/// ```
pub fn decode_attributes(
    data: &[u8],
    hoff: usize,
    null_bitmap: Option<&[u8]>,
    natts: usize,
    descriptors: &[ColumnDescriptor],
) -> Result<Vec<AttributeValue>, AttrError> {
    let stored = natts.min(descriptors.len());
    let mut values: Vec<AttributeValue> = Vec::with_capacity(stored);
    let mut cursor = hoff;

    for (column, desc) in descriptors.iter().take(stored).enumerate() {
        if bitmap_says_null(null_bitmap, column) {
            values.push(AttributeValue::Null);
            continue;
        }

        let step = match desc.length {
            ColumnLength::Fixed(len) => {
                let start = align_up(cursor, desc.align.bytes());
                take(data, start, len as usize)
                    .map(|b| (AttributeValue::Fixed(b.to_vec()), start, len as usize))
            }
            ColumnLength::Varlena => {
                // A non-zero byte here starts an unaligned short header or
                // external pointer; zero bytes are padding before a 4-byte header.
                byte_at(data, cursor).and_then(|first| {
                    let start = if first == 0 {
                        align_up(cursor, desc.align.bytes())
                    } else {
                        cursor
                    };
                    read_varlena(data, start).map(|(v, used)| (v, start, used))
                })
            }
            ColumnLength::Cstring => {
                let start = align_up(cursor, desc.align.bytes());
                match data.get(start..).and_then(|rest| rest.iter().position(|&b| b == 0)) {
                    Some(nul) => Ok((
                        AttributeValue::Cstring(data[start..start + nul].to_vec()),
                        start,
                        nul + 1,
                    )),
                    None => Err(ValueFault::Bounds {
                        offset: start,
                        end: data.len() + 1,
                    }),
                }
            }
        };

        match step {
            Ok((value, start, used)) => {
                values.push(value);
                cursor = start + used;
            }
            Err(fault) => return Err(fault_to_error(fault, column, desc, data.len(), values)),
        }
    }

    if natts != descriptors.len() {
        return Err(AttrError::ArityMismatch {
            expected: descriptors.len(),
            found: natts,
            partial: values,
        });
    }

    Ok(values)
}

fn fault_to_error(
    fault: ValueFault,
    column: usize,
    desc: &ColumnDescriptor,
    available: usize,
    partial: Vec<AttributeValue>,
) -> AttrError {
    match fault {
        ValueFault::Bounds { offset, end } => AttrError::OutOfBounds {
            column,
            name: desc.name.clone(),
            offset,
            end,
            available,
            partial,
        },
        ValueFault::Varlena(reason) => AttrError::BadVarlena {
            column,
            name: desc.name.clone(),
            reason,
            partial,
        },
    }
}

/// Decode attributes using a parsed tuple header.
pub fn decode_tuple_attributes(
    data: &[u8],
    header: &TupleHeader,
    descriptors: &[ColumnDescriptor],
) -> Result<Vec<AttributeValue>, AttrError> {
    decode_attributes(
        data,
        header.hoff as usize,
        header.null_bitmap.as_deref(),
        header.natts(),
        descriptors,
    )
}
