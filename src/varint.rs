//! Variable-length integer codecs for Git object and delta headers.
//!
//! Git's binary headers use three related encodings:
//!
//! - **Size varint**: little-endian base-128 with a continuation high bit,
//!   7 value bits per byte. Used for the two length fields at the head of a
//!   delta payload.
//! - **Object-header varint**: the first byte carries a 3-bit type tag and
//!   4 value bits; continuation bytes carry 7 bits each at increasing
//!   shifts. Used for pack entry headers and consumed by header-parsing
//!   callers outside the delta path.
//! - **OFS distance varint**: big-endian-ish chained encoding where each
//!   continuation adds one and shifts by 7. Used for OFS_DELTA backward
//!   distances.
//!
//! All decoders return `Ok(None)` when the buffer ends before the integer
//! terminates, with the cursor restored to its starting position so the
//! caller can refill its buffer and retry without losing state. This is the
//! refill boundary for the whole streaming design. A continuation sequence
//! that would exceed 64 bits fails hard with `VarintError::Overflow`;
//! truncation is never silently zero-filled.

use crate::errors::VarintError;

/// Maximum encoded bytes for a 64-bit OFS distance.
const MAX_OFS_BYTES: usize = 10; // ceil(64/7)

/// Decodes a little-endian base-128 size varint.
///
/// Returns `Ok(None)` and leaves `pos` unchanged if `buf` ends before the
/// terminating byte.
pub fn read_size(buf: &[u8], pos: &mut usize) -> Result<Option<u64>, VarintError> {
    let start = *pos;
    let mut value: u64 = 0;
    let mut shift: u32 = 0;

    loop {
        let Some(&byte) = buf.get(*pos) else {
            *pos = start;
            return Ok(None);
        };
        *pos += 1;

        let bits = (byte & 0x7f) as u64;
        if shift >= 64 || (shift == 63 && bits > 1) {
            return Err(VarintError::Overflow);
        }
        value |= bits << shift;

        if (byte & 0x80) == 0 {
            return Ok(Some(value));
        }
        shift += 7;
    }
}

/// Decodes a pack entry's object-header varint.
///
/// The first byte holds the 3-bit object type and the low 4 size bits;
/// continuation bytes contribute 7 bits each. Returns `(type, size)`, or
/// `Ok(None)` with `pos` unchanged if the buffer ends mid-header.
pub fn read_object_header(buf: &[u8], pos: &mut usize) -> Result<Option<(u8, u64)>, VarintError> {
    let start = *pos;

    let Some(&first) = buf.get(*pos) else {
        return Ok(None);
    };
    *pos += 1;

    let obj_type = (first >> 4) & 0x07;
    let mut size: u64 = (first & 0x0f) as u64;
    let mut shift: u32 = 4;

    let mut byte = first;
    while (byte & 0x80) != 0 {
        let Some(&next) = buf.get(*pos) else {
            *pos = start;
            return Ok(None);
        };
        *pos += 1;
        byte = next;

        // Shifts run 4, 11, ..., 60; at 60 only the low 4 bits still fit.
        let bits = (byte & 0x7f) as u64;
        if shift > 63 || (shift == 60 && bits > 0x0f) {
            return Err(VarintError::Overflow);
        }
        size |= bits << shift;
        shift += 7;
    }

    Ok(Some((obj_type, size)))
}

/// Decodes an OFS_DELTA backward distance.
///
/// The encoding chains continuation bytes with an implicit `+1` per hop;
/// see `gitformat-pack(5)`. Returns `Ok(None)` with `pos` unchanged if the
/// buffer ends mid-distance.
pub fn read_ofs_distance(buf: &[u8], pos: &mut usize) -> Result<Option<u64>, VarintError> {
    let start = *pos;

    let Some(&first) = buf.get(*pos) else {
        return Ok(None);
    };
    *pos += 1;

    let mut byte = first;
    let mut value: u64 = (byte & 0x7f) as u64;
    let mut read = 1usize;

    while (byte & 0x80) != 0 {
        if read >= MAX_OFS_BYTES {
            return Err(VarintError::Overflow);
        }
        let Some(&next) = buf.get(*pos) else {
            *pos = start;
            return Ok(None);
        };
        *pos += 1;
        byte = next;
        read += 1;

        value = value
            .checked_add(1)
            .and_then(|v| v.checked_shl(7))
            .ok_or(VarintError::Overflow)?;
        value |= (byte & 0x7f) as u64;
    }

    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_size(mut value: u64) -> Vec<u8> {
        let mut out = Vec::new();
        loop {
            let mut byte = (value & 0x7f) as u8;
            value >>= 7;
            if value != 0 {
                byte |= 0x80;
            }
            out.push(byte);
            if value == 0 {
                break;
            }
        }
        out
    }

    #[test]
    fn size_varint_boundaries_round_trip() {
        for value in [0u64, 1, 127, 128, 16383, 16384, u64::MAX] {
            let encoded = encode_size(value);
            let mut pos = 0;
            assert_eq!(read_size(&encoded, &mut pos).unwrap(), Some(value));
            assert_eq!(pos, encoded.len());
        }
    }

    #[test]
    fn size_varint_truncation_restores_cursor() {
        let encoded = encode_size(16384);
        let mut pos = 0;
        // All but the terminating byte: caller must be able to retry.
        assert_eq!(read_size(&encoded[..encoded.len() - 1], &mut pos).unwrap(), None);
        assert_eq!(pos, 0);
        assert_eq!(read_size(&encoded, &mut pos).unwrap(), Some(16384));
    }

    #[test]
    fn size_varint_overflow_is_hard_error() {
        // The tenth byte lands at shift 63 with more than one value bit.
        let encoded = vec![0xff; 10];
        let mut pos = 0;
        assert_eq!(read_size(&encoded, &mut pos), Err(VarintError::Overflow));
    }

    #[test]
    fn object_header_type_and_size() {
        // type=3 (blob), size=5: fits in the first byte.
        let mut pos = 0;
        assert_eq!(
            read_object_header(&[0x35], &mut pos).unwrap(),
            Some((3, 5))
        );
        assert_eq!(pos, 1);

        // type=1 (commit), size=0x123: needs a continuation byte.
        // first: 0x80 | (1 << 4) | (0x123 & 0x0f) = 0x93; then 0x12.
        let mut pos = 0;
        assert_eq!(
            read_object_header(&[0x93, 0x12], &mut pos).unwrap(),
            Some((1, 0x123))
        );
        assert_eq!(pos, 2);
    }

    #[test]
    fn object_header_overflow_is_hard_error() {
        // Nine continuation bytes put the terminator at shift 60; value
        // bits above the low 4 would land past bit 63.
        let mut encoded = vec![0xb0u8];
        encoded.extend_from_slice(&[0x80; 8]);
        encoded.push(0x10);
        let mut pos = 0;
        assert_eq!(
            read_object_header(&encoded, &mut pos),
            Err(VarintError::Overflow)
        );

        // The low 4 bits at shift 60 still decode.
        let mut encoded = vec![0xb0u8];
        encoded.extend_from_slice(&[0x80; 8]);
        encoded.push(0x0f);
        let mut pos = 0;
        assert_eq!(
            read_object_header(&encoded, &mut pos).unwrap(),
            Some((3, 0x0f << 60))
        );
    }

    #[test]
    fn object_header_truncation_restores_cursor() {
        let mut pos = 0;
        assert_eq!(read_object_header(&[0x93], &mut pos).unwrap(), None);
        assert_eq!(pos, 0);
        assert_eq!(read_object_header(&[], &mut pos).unwrap(), None);
    }

    #[test]
    fn ofs_distance_decoding() {
        // Single byte distances are their own value.
        let mut pos = 0;
        assert_eq!(read_ofs_distance(&[0x05], &mut pos).unwrap(), Some(5));

        // Two-byte encoding: first=0x80|a, second=b -> ((a+1)<<7)|b.
        let mut pos = 0;
        assert_eq!(
            read_ofs_distance(&[0x81, 0x00], &mut pos).unwrap(),
            Some(256)
        );
    }

    #[test]
    fn ofs_distance_truncation_and_overflow() {
        let mut pos = 0;
        assert_eq!(read_ofs_distance(&[0x81], &mut pos).unwrap(), None);
        assert_eq!(pos, 0);

        let mut pos = 0;
        assert_eq!(
            read_ofs_distance(&[0xff; 11], &mut pos),
            Err(VarintError::Overflow)
        );
    }
}
