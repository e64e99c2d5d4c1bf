//! Hex formatting for raw byte recoveries.
//!
//! Compact hex strings for JSON output of undecodable bytes, and a
//! traditional offset/hex/ASCII dump for verbose text output.

use serde::Serializer;

/// Format a byte offset as "decimal (0xhex)".
pub fn format_offset(offset: u64) -> String {
    format!("{} (0x{:x})", offset, offset)
}

/// Format bytes as a compact hex string (e.g., "4a2f00ff").
pub fn format_bytes(data: &[u8]) -> String {
    use std::fmt::Write;

    let mut out = String::with_capacity(data.len() * 2);
    for b in data {
        let _ = write!(out, "{:02x}", b);
    }
    out
}

/// serde `serialize_with` helper writing bytes as a compact hex string.
pub fn serialize_hex<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_bytes(data))
}

/// Bytes shown per [`hex_dump`] row.
const DUMP_WIDTH: usize = 16;

/// Render `data` as rows of offset, hex bytes and printable ASCII.
///
/// `base_offset` is the position of `data[0]` in the scanned source, so
/// dumped tuples can be located in the image. Each row looks like:
/// ```text
/// 000021f8  00 00 02 ee 00 00 00 00  00 00 00 00 00 00 00 01  |................|
/// ```
pub fn hex_dump(data: &[u8], base_offset: u64) -> String {
    use std::fmt::Write;

    let mut out = String::with_capacity(data.len().div_ceil(DUMP_WIDTH) * 78);
    for (row, chunk) in data.chunks(DUMP_WIDTH).enumerate() {
        if row > 0 {
            out.push('\n');
        }
        let _ = write!(out, "{:08x} ", base_offset + (row * DUMP_WIDTH) as u64);
        for col in 0..DUMP_WIDTH {
            if col % 8 == 0 {
                out.push(' ');
            }
            match chunk.get(col) {
                Some(b) => {
                    let _ = write!(out, "{:02x} ", b);
                }
                None => out.push_str("   "),
            }
        }
        let ascii: String = chunk
            .iter()
            .map(|&b| if b == b' ' || b.is_ascii_graphic() { b as char } else { '.' })
            .collect();
        let _ = write!(out, " |{:<width$}|", ascii, width = DUMP_WIDTH);
    }
    out
}
