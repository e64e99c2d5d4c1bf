//! Page-level tuple extraction.
//!
//! [`extract_page`] is the path shared by block-addressed unloading and the
//! recovery scanner: it walks a decoded page's line pointers, decodes each
//! live tuple's header and (when a column layout is known) its attributes,
//! and records one [`TupleOutcome`] per live item. Nothing here aborts on a
//! single bad tuple.

use serde::Serialize;

use crate::heap::attribute::{decode_tuple_attributes, AttributeValue, ColumnDescriptor};
use crate::heap::field_decode::{render_value, FieldValue};
use crate::heap::page::{ItemState, Page};
use crate::heap::tuple::{decode_tuple_header, TupleHeader};

/// One decoded column of a tuple.
#[derive(Debug, Clone, Serialize)]
pub struct DecodedColumn {
    pub name: String,
    pub value: FieldValue,
    #[serde(skip)]
    pub raw: AttributeValue,
}

/// A tuple whose header decoded.
#[derive(Debug, Clone, Serialize)]
pub struct DecodedTuple {
    /// 1-based item number on the page.
    pub item: u16,
    /// Byte offset of the tuple within the page.
    pub offset: u16,
    pub length: u16,
    pub header: TupleHeader,
    /// Decoded columns in schema order; shorter than the schema when
    /// decoding stopped early.
    pub columns: Vec<DecodedColumn>,
    /// Why the column list is incomplete or suspect.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl DecodedTuple {
    /// `(name, value)` pairs for output formatters.
    pub fn values(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.columns.iter().map(|c| (c.name.as_str(), &c.value))
    }
}

/// A live item whose bytes could not be decoded.
#[derive(Debug, Clone, Serialize)]
pub struct UnreadableTuple {
    pub item: u16,
    pub offset: u16,
    pub length: u16,
    pub reason: String,
    /// Raw tuple bytes when they lie inside the page.
    #[serde(rename = "raw_hex", serialize_with = "crate::util::hex::serialize_hex")]
    pub raw: Vec<u8>,
}

/// Result of decoding one live item.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TupleOutcome {
    Decoded(DecodedTuple),
    Unreadable(UnreadableTuple),
}

impl TupleOutcome {
    pub fn item(&self) -> u16 {
        match self {
            TupleOutcome::Decoded(t) => t.item,
            TupleOutcome::Unreadable(t) => t.item,
        }
    }

    pub fn is_decoded(&self) -> bool {
        matches!(self, TupleOutcome::Decoded(_))
    }
}

/// Every live tuple of one page plus line pointer statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PageExtraction {
    pub tuples: Vec<TupleOutcome>,
    pub unused: usize,
    pub redirect: usize,
    pub dead: usize,
    /// Normal line pointers with zero length (no storage).
    pub empty_normal: usize,
}

impl PageExtraction {
    pub fn decoded_count(&self) -> usize {
        self.tuples.iter().filter(|t| t.is_decoded()).count()
    }

    pub fn unreadable_count(&self) -> usize {
        self.tuples.len() - self.decoded_count()
    }

    /// Decoded tuples whose columns are incomplete.
    pub fn warning_count(&self) -> usize {
        self.tuples
            .iter()
            .filter(|t| matches!(t, TupleOutcome::Decoded(d) if d.warning.is_some()))
            .count()
    }
}

/// Decode every live tuple on `page`.
///
/// With `descriptors` = None only tuple headers are decoded. Tuples whose
/// bytes lie outside the tuple area or whose header is invalid become
/// [`TupleOutcome::Unreadable`]; attribute errors keep the partial columns
/// and set [`DecodedTuple::warning`].
pub fn extract_page(page: &Page<'_>, descriptors: Option<&[ColumnDescriptor]>) -> PageExtraction {
    let mut out = PageExtraction::default();

    for (idx, it) in page.items.iter().enumerate() {
        let item = idx as u16 + 1;
        match it.state {
            ItemState::Unused => out.unused += 1,
            ItemState::Redirect => out.redirect += 1,
            ItemState::Dead => out.dead += 1,
            ItemState::Normal if !it.is_live() => out.empty_normal += 1,
            ItemState::Normal => out.tuples.push(extract_item(page, item, descriptors)),
        }
    }

    out
}

fn extract_item(page: &Page<'_>, item: u16, descriptors: Option<&[ColumnDescriptor]>) -> TupleOutcome {
    let Some(it) = page.item(item).copied() else {
        return unreadable(item, 0, 0, "no such item".to_string(), Vec::new());
    };

    let bytes = match page.tuple_bytes(item) {
        Ok(b) => b,
        Err(e) => {
            tracing::debug!(item, error = %e, "tuple outside tuple area");
            // keep whatever part of the range lies inside the block
            let data = page.data();
            let start = (it.offset as usize).min(data.len());
            let end = (it.offset as usize + it.length as usize).min(data.len());
            return unreadable(item, it.offset, it.length, e.to_string(), data[start..end].to_vec());
        }
    };

    let header = match decode_tuple_header(bytes) {
        Ok(h) => h,
        Err(e) => {
            tracing::debug!(item, error = %e, "unreadable tuple header");
            return unreadable(item, it.offset, it.length, e.to_string(), bytes.to_vec());
        }
    };

    let (columns, warning) = match descriptors {
        None => (Vec::new(), None),
        Some(descs) => match decode_tuple_attributes(bytes, &header, descs) {
            Ok(values) => (named(descs, values), None),
            Err(e) => {
                tracing::debug!(item, error = %e, "partial attribute decode");
                let warning = e.to_string();
                (named(descs, e.into_partial()), Some(warning))
            }
        },
    };

    TupleOutcome::Decoded(DecodedTuple {
        item,
        offset: it.offset,
        length: it.length,
        header,
        columns,
        warning,
    })
}

fn named(descs: &[ColumnDescriptor], values: Vec<AttributeValue>) -> Vec<DecodedColumn> {
    descs
        .iter()
        .zip(values)
        .map(|(d, raw)| DecodedColumn {
            name: d.name.clone(),
            value: render_value(d, &raw),
            raw,
        })
        .collect()
}

fn unreadable(item: u16, offset: u16, length: u16, reason: String, raw: Vec<u8>) -> TupleOutcome {
    TupleOutcome::Unreadable(UnreadableTuple {
        item,
        offset,
        length,
        reason,
        raw,
    })
}
