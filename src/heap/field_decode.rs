//! Typed rendering of decoded attribute values.
//!
//! Interprets the raw bytes of an [`AttributeValue`] using the column's
//! type name. Values whose type is unknown, or whose stored length does not
//! match the type, fall back to hex.
//!
//! | Type | Storage | Rendered as |
//! |------|---------|-------------|
//! | `bool` | 1 byte | `Bool` |
//! | `int2` / `int4` / `int8` | big-endian two's complement | `Int` |
//! | `oid` / `xid` | big-endian u32 | `Uint` |
//! | `float4` / `float8` | big-endian IEEE 754 | `Double` |
//! | `char` | 1 byte | `Str` |
//! | `name` | 64 bytes, zero padded | `Str` |
//! | `text` / `varchar` / `bpchar` | varlena, UTF-8 | `Str` |
//! | `bytea` | varlena | `Str` (`\x` hex) |
//! | `uuid` | 16 bytes | `Str` |
//! | `date` | i32 days since 2000-01-01 | `Str` |
//! | `timestamp` / `timestamptz` | i64 microseconds since 2000-01-01 | `Str` |

use std::fmt;

use byteorder::{BigEndian, ByteOrder};
use chrono::{Days, Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::heap::attribute::{AttributeValue, ColumnDescriptor};
use crate::heap::catalog::canonical_type;
use crate::util::hex::format_bytes;

/// Rendered column value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Double(f64),
    Str(String),
    /// Hex-encoded bytes for values with no known rendering.
    Hex(String),
}

impl FieldValue {
    /// Render as a SQL literal for INSERT statements.
    pub fn sql_literal(&self) -> String {
        match self {
            FieldValue::Null => "NULL".to_string(),
            FieldValue::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            FieldValue::Int(v) => v.to_string(),
            FieldValue::Uint(v) => v.to_string(),
            FieldValue::Double(v) if v.is_finite() => v.to_string(),
            FieldValue::Double(v) => format!("'{}'", v),
            FieldValue::Str(s) => format!("'{}'", s.replace('\'', "''")),
            FieldValue::Hex(h) => format!("'\\x{}'", h),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => Ok(()),
            FieldValue::Bool(b) => write!(f, "{}", if *b { "t" } else { "f" }),
            FieldValue::Int(v) => write!(f, "{}", v),
            FieldValue::Uint(v) => write!(f, "{}", v),
            FieldValue::Double(v) => write!(f, "{}", v),
            FieldValue::Str(s) => write!(f, "{}", s),
            FieldValue::Hex(h) => write!(f, "\\x{}", h),
        }
    }
}

/// Render one attribute value for display.
pub fn render_value(desc: &ColumnDescriptor, value: &AttributeValue) -> FieldValue {
    let bytes = match value {
        AttributeValue::Null => return FieldValue::Null,
        AttributeValue::ExternalReference(ptr) => {
            return FieldValue::Str(format!(
                "<toast value {} in relation {}, {} bytes>",
                ptr.value_id,
                ptr.toast_relid,
                ptr.raw_size.max(0)
            ))
        }
        AttributeValue::Compressed {
            method, raw_size, ..
        } => {
            return FieldValue::Str(format!(
                "<{} compressed value, {} bytes>",
                method.name(),
                raw_size
            ))
        }
        AttributeValue::Fixed(b) | AttributeValue::Varlena(b) | AttributeValue::Cstring(b) => {
            b.as_slice()
        }
    };

    let type_name = desc.type_name.as_deref().and_then(canonical_type);
    match type_name {
        Some("bool") if bytes.len() == 1 => FieldValue::Bool(bytes[0] != 0),
        Some("int2") if bytes.len() == 2 => FieldValue::Int(BigEndian::read_i16(bytes) as i64),
        Some("int4") if bytes.len() == 4 => FieldValue::Int(BigEndian::read_i32(bytes) as i64),
        Some("int8") if bytes.len() == 8 => FieldValue::Int(BigEndian::read_i64(bytes)),
        Some("oid") | Some("xid") if bytes.len() == 4 => {
            FieldValue::Uint(BigEndian::read_u32(bytes) as u64)
        }
        Some("float4") if bytes.len() == 4 => {
            FieldValue::Double(BigEndian::read_f32(bytes) as f64)
        }
        Some("float8") if bytes.len() == 8 => FieldValue::Double(BigEndian::read_f64(bytes)),
        Some("char") if bytes.len() == 1 => FieldValue::Str((bytes[0] as char).to_string()),
        Some("name") => {
            let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
            FieldValue::Str(String::from_utf8_lossy(&bytes[..end]).into_owned())
        }
        Some("text") | Some("varchar") | Some("bpchar") | Some("json") | Some("cstring") => {
            FieldValue::Str(String::from_utf8_lossy(bytes).into_owned())
        }
        Some("bytea") => FieldValue::Str(format!("\\x{}", format_bytes(bytes))),
        Some("uuid") if bytes.len() == 16 => FieldValue::Str(format_uuid(bytes)),
        Some("date") if bytes.len() == 4 => render_date(BigEndian::read_i32(bytes)),
        Some("timestamp") if bytes.len() == 8 => {
            render_timestamp(BigEndian::read_i64(bytes), false)
        }
        Some("timestamptz") if bytes.len() == 8 => {
            render_timestamp(BigEndian::read_i64(bytes), true)
        }
        _ => FieldValue::Hex(format_bytes(bytes)),
    }
}

fn format_uuid(b: &[u8]) -> String {
    let hex = format_bytes(b);
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

fn epoch() -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(2000, 1, 1)?.and_hms_opt(0, 0, 0)
}

fn render_date(days: i32) -> FieldValue {
    match days {
        i32::MIN => return FieldValue::Str("-infinity".to_string()),
        i32::MAX => return FieldValue::Str("infinity".to_string()),
        _ => {}
    }
    let date = epoch().map(|e| e.date()).and_then(|e| {
        if days >= 0 {
            e.checked_add_days(Days::new(days as u64))
        } else {
            e.checked_sub_days(Days::new(days.unsigned_abs() as u64))
        }
    });
    match date {
        Some(d) => FieldValue::Str(d.format("%Y-%m-%d").to_string()),
        None => FieldValue::Int(days as i64),
    }
}

fn render_timestamp(micros: i64, with_zone: bool) -> FieldValue {
    match micros {
        i64::MIN => return FieldValue::Str("-infinity".to_string()),
        i64::MAX => return FieldValue::Str("infinity".to_string()),
        _ => {}
    }
    match epoch().and_then(|e| e.checked_add_signed(Duration::microseconds(micros))) {
        Some(ts) => {
            let text = ts.format("%Y-%m-%d %H:%M:%S%.f").to_string();
            if with_zone {
                FieldValue::Str(format!("{}+00", text))
            } else {
                FieldValue::Str(text)
            }
        }
        None => FieldValue::Int(micros),
    }
}
