//! Inline varlena decompression.
//!
//! Compressed inline values carry a 4-byte word after the varlena header:
//! the low 30 bits hold the uncompressed size and the top 2 bits the
//! compression method (0 = pglz, 1 = LZ4). [`decompress_pglz`] implements
//! the built-in LZ-family format; LZ4 blocks are handled by `lz4_flex`.

/// Upper bound on output bytes per input byte for either method.
///
/// A pglz tag is at least two bytes and expands to at most 273 bytes; LZ4
/// length extension bytes add at most 255 each.
pub const MAX_EXPANSION: usize = 273;

/// True if `compressed` could possibly expand to `raw_size` bytes.
pub fn plausible_size(compressed: &[u8], raw_size: usize) -> bool {
    raw_size <= compressed.len().saturating_mul(MAX_EXPANSION)
}

/// Compression method stored in the top two bits of the size word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Pglz,
    Lz4,
    /// Method id not understood (value of the top two bits).
    Unknown(u32),
}

impl CompressionMethod {
    pub fn from_id(id: u32) -> Self {
        use crate::heap::constants::*;

        match id {
            TOAST_PGLZ_COMPRESSION_ID => CompressionMethod::Pglz,
            TOAST_LZ4_COMPRESSION_ID => CompressionMethod::Lz4,
            other => CompressionMethod::Unknown(other),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CompressionMethod::Pglz => "pglz",
            CompressionMethod::Lz4 => "lz4",
            CompressionMethod::Unknown(_) => "unknown",
        }
    }
}

/// Decompress `compressed` with the given method.
///
/// Returns None if the method is unsupported, the stream is corrupt, the
/// claimed size is out of reach of the input, or the output length does not
/// equal `raw_size`.
pub fn decompress(method: CompressionMethod, compressed: &[u8], raw_size: usize) -> Option<Vec<u8>> {
    match method {
        CompressionMethod::Pglz => decompress_pglz(compressed, raw_size),
        CompressionMethod::Lz4 => decompress_lz4(compressed, raw_size),
        CompressionMethod::Unknown(_) => None,
    }
}

/// Decompress an LZ4 block.
pub fn decompress_lz4(compressed: &[u8], raw_size: usize) -> Option<Vec<u8>> {
    if !plausible_size(compressed, raw_size) {
        return None;
    }
    let out = lz4_flex::block::decompress(compressed, raw_size).ok()?;
    (out.len() == raw_size).then_some(out)
}

/// Decompress a pglz stream into exactly `raw_size` bytes.
///
/// The stream is a sequence of control bytes, each followed by up to eight
/// items. A clear control bit means one literal byte; a set bit means a
/// 2-3 byte back-reference: length `(b0 & 0x0f) + 3` (18 = read one more
/// length byte) at distance `((b0 & 0xf0) << 4) | b1`.
///
/// # Examples
///
/// ```
/// use pdu::heap::compression::decompress_pglz;
///
/// // literals "ab", then copy 4 bytes from distance 2
/// let stream = [0b0000_0100, b'a', b'b', 0x01, 0x02];
/// assert_eq!(decompress_pglz(&stream, 6).unwrap(), b"ababab");
/// ```
pub fn decompress_pglz(compressed: &[u8], raw_size: usize) -> Option<Vec<u8>> {
    if !plausible_size(compressed, raw_size) {
        return None;
    }
    let mut out: Vec<u8> = Vec::with_capacity(raw_size);
    let mut sp = 0usize;

    while sp < compressed.len() && out.len() < raw_size {
        let mut ctrl = compressed[sp];
        sp += 1;

        for _ in 0..8 {
            if sp >= compressed.len() || out.len() >= raw_size {
                break;
            }
            if ctrl & 1 != 0 {
                if sp + 2 > compressed.len() {
                    return None;
                }
                let b0 = compressed[sp] as usize;
                let b1 = compressed[sp + 1] as usize;
                sp += 2;
                let mut len = (b0 & 0x0f) + 3;
                let off = ((b0 & 0xf0) << 4) | b1;
                if len == 18 {
                    len += *compressed.get(sp)? as usize;
                    sp += 1;
                }
                if off == 0 || off > out.len() {
                    return None;
                }
                let len = len.min(raw_size - out.len());
                // Byte-at-a-time: source and destination may overlap
                let start = out.len() - off;
                for i in 0..len {
                    let b = out[start + i];
                    out.push(b);
                }
            } else {
                out.push(compressed[sp]);
                sp += 1;
            }
            ctrl >>= 1;
        }
    }

    (out.len() == raw_size).then_some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pglz_literals_only() {
        let stream = [0x00, b'h', b'e', b'a', b'p'];
        assert_eq!(decompress_pglz(&stream, 4).unwrap(), b"heap");
    }

    #[test]
    fn test_pglz_long_match() {
        // literal 'x', then match len 18 + 12 = 30 at distance 1
        let stream = [0b0000_0010, b'x', 0x0f, 0x01, 12];
        let out = decompress_pglz(&stream, 31).unwrap();
        assert_eq!(out, vec![b'x'; 31]);
    }

    #[test]
    fn test_pglz_bad_distance() {
        // back-reference before any output
        let stream = [0b0000_0001, 0x01, 0x05];
        assert!(decompress_pglz(&stream, 4).is_none());
    }

    #[test]
    fn test_pglz_short_output_rejected() {
        let stream = [0x00, b'a', b'b'];
        assert!(decompress_pglz(&stream, 5).is_none());
    }

    #[test]
    fn test_pglz_truncated_tag() {
        let stream = [0b0000_0010, b'a', 0x01];
        assert!(decompress_pglz(&stream, 4).is_none());
    }

    #[test]
    fn test_oversized_raw_size_rejected_before_decoding() {
        // size word claims the 30-bit maximum for a two-byte payload
        let stream = [0x00, b'a'];
        assert!(!plausible_size(&stream, 0x3FFF_FFFF));
        assert!(decompress_pglz(&stream, 0x3FFF_FFFF).is_none());
        assert!(decompress_lz4(&stream, 0x3FFF_FFFF).is_none());
        assert!(decompress(CompressionMethod::Pglz, &[], 1).is_none());

        assert!(plausible_size(&stream, 2 * MAX_EXPANSION));
        assert!(!plausible_size(&stream, 2 * MAX_EXPANSION + 1));
    }

    #[test]
    fn test_lz4_roundtrip_through_lz4_flex() {
        let input = b"recovered recovered recovered recovered".to_vec();
        let compressed = lz4_flex::block::compress(&input);
        assert_eq!(decompress_lz4(&compressed, input.len()).unwrap(), input);
        assert_eq!(
            decompress(CompressionMethod::Lz4, &compressed, input.len()).unwrap(),
            input
        );
    }

    #[test]
    fn test_method_from_id() {
        assert_eq!(CompressionMethod::from_id(0), CompressionMethod::Pglz);
        assert_eq!(CompressionMethod::from_id(1), CompressionMethod::Lz4);
        assert_eq!(CompressionMethod::from_id(3), CompressionMethod::Unknown(3));
        assert!(decompress(CompressionMethod::Unknown(2), &[1, 2], 2).is_none());
    }
}
