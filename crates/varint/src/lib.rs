//! # Varint
//!
//! Zero-compressed encoding for signed 64-bit integers, the format used to
//! length-prefix serialized keys and values in a sort/spill record stream.
//!
//! ## Layout
//!
//! ```text
//! -112 ..= 127        one byte, the value itself
//! otherwise           [length byte][1..=8 big-endian bytes of the value]
//!
//! length byte (i8):   -113 ..= -120   non-negative value, 1..=8 bytes follow
//!                     -121 ..= -128   negative value,     1..=8 bytes follow
//! ```
//!
//! The number of trailing bytes is the number of bytes needed to hold the
//! value's magnitude (its one's complement for negatives). The bytes written
//! are the low `length` bytes of the original value; the sign carried by the
//! length byte restores the high bytes on decode.
//!
//! Encodings are canonical: [`decode`] rejects any byte sequence that
//! [`encode`] would not have produced, so every value has exactly one
//! encoding.
//!
//! ## Example
//! ```rust
//! let bytes = varint::encode(1024);
//! assert_eq!(bytes.len(), varint::size_of(1024));
//! assert_eq!(varint::decode(&bytes).unwrap(), (1024, 3));
//! ```

use byteorder::{ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

use thiserror::Error;

/// Longest possible encoding: one length byte plus eight value bytes.
pub const MAX_ENCODED_LEN: usize = 9;

/// Smallest value that encodes to a single byte.
pub const SINGLE_BYTE_MIN: i64 = -112;

/// Largest value that encodes to a single byte.
pub const SINGLE_BYTE_MAX: i64 = 127;

const POSITIVE_LEN_BASE: i32 = 112;
const NEGATIVE_LEN_BASE: i32 = 120;

/// Why a byte sequence could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Malformed {
    #[error("no bytes to decode")]
    Empty,
    #[error("length byte {length_byte} needs {needed} value bytes, only {available} available")]
    Truncated {
        length_byte: i8,
        needed: usize,
        available: usize,
    },
    #[error("length byte {length_byte} is not the canonical encoding of {value}")]
    NonCanonical { length_byte: i8, value: i64 },
}

#[derive(Debug, Error)]
pub enum VarintError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("malformed varint: {0}")]
    Malformed(#[from] Malformed),
}

pub type Result<T> = std::result::Result<T, VarintError>;

#[inline]
fn fits_single_byte(i: i64) -> bool {
    (SINGLE_BYTE_MIN..=SINGLE_BYTE_MAX).contains(&i)
}

/// Bytes needed to hold the magnitude of `i` (one's complement for negatives).
#[inline]
fn magnitude_len(i: i64) -> usize {
    let magnitude = (if i < 0 { !i } else { i }) as u64;
    (64 - magnitude.leading_zeros() as usize).div_ceil(8)
}

#[inline]
fn length_byte(i: i64, len: usize) -> i8 {
    let base = if i < 0 {
        NEGATIVE_LEN_BASE
    } else {
        POSITIVE_LEN_BASE
    };
    // len is 1..=8, so the result is in -128..=-113
    (-(len as i32 + base)) as i8
}

/// Maps a multi-byte length byte to `(negative, value_len)`.
#[inline]
fn split_length_byte(first: i8) -> (bool, usize) {
    let first = first as i32;
    if first < -NEGATIVE_LEN_BASE {
        (true, (-NEGATIVE_LEN_BASE - first) as usize)
    } else {
        (false, (-POSITIVE_LEN_BASE - first) as usize)
    }
}

/// Rebuilds a value from its low `payload.len()` big-endian bytes and sign.
fn assemble(
    length_byte: i8,
    negative: bool,
    payload: &[u8],
) -> std::result::Result<i64, Malformed> {
    let len = payload.len();
    let mut raw = payload.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64);
    if negative && len < 8 {
        raw |= u64::MAX << (8 * len);
    }
    let value = raw as i64;

    if (value < 0) != negative || fits_single_byte(value) || magnitude_len(value) != len {
        return Err(Malformed::NonCanonical { length_byte, value });
    }
    Ok(value)
}

/// Returns the encoded length of `i` without encoding it.
///
/// This is a pure function of the magnitude of `i`; it never allocates.
#[inline]
pub fn size_of(i: i64) -> usize {
    if fits_single_byte(i) {
        1
    } else {
        magnitude_len(i) + 1
    }
}

/// Appends the encoding of `i` to `out`, returning the number of bytes written.
pub fn encode_into(out: &mut Vec<u8>, i: i64) -> usize {
    if fits_single_byte(i) {
        out.push(i as u8);
        return 1;
    }
    let len = magnitude_len(i);
    out.push(length_byte(i, len) as u8);
    out.extend_from_slice(&i.to_be_bytes()[8 - len..]);
    len + 1
}

/// Encodes `i` into a fresh buffer of exactly [`size_of`]`(i)` bytes.
pub fn encode(i: i64) -> Vec<u8> {
    let mut out = Vec::with_capacity(size_of(i));
    encode_into(&mut out, i);
    out
}

/// Decodes one value from the front of `bytes`.
///
/// Returns the value and the number of bytes consumed. Trailing bytes after
/// the encoding are left untouched, so sequential values can be decoded by
/// advancing the slice.
///
/// # Errors
///
/// [`VarintError::Malformed`] if `bytes` is empty, shorter than the length
/// byte requires, or not the canonical encoding of the value it spells.
pub fn decode(bytes: &[u8]) -> Result<(i64, usize)> {
    let (&first, rest) = bytes.split_first().ok_or(Malformed::Empty)?;
    let first = first as i8;
    if first as i64 >= SINGLE_BYTE_MIN {
        return Ok((first as i64, 1));
    }

    let (negative, len) = split_length_byte(first);
    if rest.len() < len {
        return Err(Malformed::Truncated {
            length_byte: first,
            needed: len,
            available: rest.len(),
        }
        .into());
    }
    let value = assemble(first, negative, &rest[..len])?;
    Ok((value, len + 1))
}

/// Writes the encoding of `i` to `w`, returning the number of bytes written.
pub fn write_vlong<W: Write>(w: &mut W, i: i64) -> Result<usize> {
    if fits_single_byte(i) {
        w.write_i8(i as i8)?;
        return Ok(1);
    }
    let len = magnitude_len(i);
    w.write_i8(length_byte(i, len))?;
    w.write_all(&i.to_be_bytes()[8 - len..])?;
    Ok(len + 1)
}

/// Reads one encoded value from `r`.
///
/// # Errors
///
/// [`VarintError::Io`] if the reader fails or ends mid-value;
/// [`VarintError::Malformed`] for a non-canonical encoding.
pub fn read_vlong<R: Read>(r: &mut R) -> Result<i64> {
    let first = r.read_i8()?;
    if first as i64 >= SINGLE_BYTE_MIN {
        return Ok(first as i64);
    }
    let (negative, len) = split_length_byte(first);
    let mut payload = [0u8; 8];
    r.read_exact(&mut payload[..len])?;
    Ok(assemble(first, negative, &payload[..len])?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // -------------------- Sizes --------------------

    #[test]
    fn small_and_kilobyte_sizes() {
        assert_eq!(size_of(5), 1);
        assert_eq!(size_of(1024), 3);
    }

    #[test]
    fn single_byte_band() {
        for i in SINGLE_BYTE_MIN..=SINGLE_BYTE_MAX {
            assert_eq!(size_of(i), 1, "value {}", i);
            assert_eq!(encode(i), vec![i as u8]);
        }
        assert_eq!(size_of(128), 2);
        assert_eq!(size_of(-113), 2);
    }

    #[test]
    fn size_at_byte_boundaries() {
        let cases = [
            (255i64, 2),
            (256, 3),
            (65_535, 3),
            (65_536, 4),
            ((1 << 24) - 1, 4),
            (1 << 24, 5),
            (1 << 56, 9),
            (i64::MAX, 9),
            (-256, 2),
            (-257, 3),
            (i64::MIN, 9),
        ];
        for (value, expected) in cases {
            assert_eq!(size_of(value), expected, "value {}", value);
            assert_eq!(encode(value).len(), expected, "value {}", value);
        }
    }

    // -------------------- Exact bytes --------------------

    #[test]
    fn positive_multi_byte_layout() {
        assert_eq!(encode(128), vec![(-113i8) as u8, 0x80]);
        assert_eq!(encode(1024), vec![(-114i8) as u8, 0x04, 0x00]);
        let max = encode(i64::MAX);
        assert_eq!(max[0], (-120i8) as u8);
        assert_eq!(&max[1..], &i64::MAX.to_be_bytes());
    }

    #[test]
    fn negative_multi_byte_writes_original_bytes() {
        // magnitude of -113 is 112, one byte; the byte written is -113 itself
        assert_eq!(encode(-113), vec![(-121i8) as u8, 0x8F]);
        // -201: low byte 0x37, high bytes restored from the sign
        assert_eq!(encode(-201), vec![(-121i8) as u8, 0x37]);
        let min = encode(i64::MIN);
        assert_eq!(min[0], (-128i8) as u8);
        assert_eq!(&min[1..], &i64::MIN.to_be_bytes());
    }

    // -------------------- Decode --------------------

    #[test]
    fn decode_sequential_values() {
        let values = [0i64, -112, 127, 128, -113, -201, 1 << 40, i64::MIN, i64::MAX];
        let mut buf = Vec::new();
        for &v in &values {
            encode_into(&mut buf, v);
        }
        let mut cursor = &buf[..];
        for &expected in &values {
            let (value, used) = decode(cursor).unwrap();
            assert_eq!(value, expected);
            cursor = &cursor[used..];
        }
        assert!(cursor.is_empty());
    }

    #[test]
    fn decode_empty_is_malformed() {
        let err = decode(&[]).unwrap_err();
        assert!(matches!(err, VarintError::Malformed(Malformed::Empty)));
    }

    #[test]
    fn decode_truncated_is_malformed() {
        let mut bytes = encode(1 << 40);
        bytes.truncate(3);
        match decode(&bytes).unwrap_err() {
            VarintError::Malformed(Malformed::Truncated {
                needed, available, ..
            }) => {
                assert_eq!(needed, 6);
                assert_eq!(available, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn decode_rejects_non_canonical() {
        // 5 spelled with a one-byte length prefix
        let err = decode(&[(-113i8) as u8, 0x05]).unwrap_err();
        assert!(matches!(
            err,
            VarintError::Malformed(Malformed::NonCanonical { value: 5, .. })
        ));

        // 300 padded to three bytes
        let err = decode(&[(-115i8) as u8, 0x00, 0x01, 0x2C]).unwrap_err();
        assert!(matches!(
            err,
            VarintError::Malformed(Malformed::NonCanonical { .. })
        ));

        // negative length byte over a positive 8-byte payload
        let mut bytes = vec![(-128i8) as u8];
        bytes.extend_from_slice(&i64::MAX.to_be_bytes());
        assert!(decode(&bytes).is_err());
    }

    // -------------------- Streaming --------------------

    #[test]
    fn write_then_read_stream() {
        let values = [7i64, -7, 300, -300, 1 << 33, i64::MIN];
        let mut sink = Vec::new();
        let mut written = 0;
        for &v in &values {
            written += write_vlong(&mut sink, v).unwrap();
        }
        assert_eq!(written, sink.len());

        let mut src = &sink[..];
        for &expected in &values {
            assert_eq!(read_vlong(&mut src).unwrap(), expected);
        }
        assert!(src.is_empty());
    }

    #[test]
    fn read_past_end_is_io_error() {
        let bytes = encode(70_000);
        let mut src = &bytes[..2];
        assert!(matches!(read_vlong(&mut src), Err(VarintError::Io(_))));
    }

    // -------------------- Properties --------------------

    proptest! {
        #[test]
        fn roundtrip_any_i64(i in any::<i64>()) {
            let bytes = encode(i);
            prop_assert_eq!(decode(&bytes).unwrap(), (i, bytes.len()));
        }

        #[test]
        fn size_matches_encoding(i in any::<i64>()) {
            prop_assert_eq!(encode(i).len(), size_of(i));
            prop_assert!(size_of(i) <= MAX_ENCODED_LEN);
        }

        #[test]
        fn stream_matches_buffer(i in any::<i64>()) {
            let mut sink = Vec::new();
            write_vlong(&mut sink, i).unwrap();
            prop_assert_eq!(&sink, &encode(i));
            prop_assert_eq!(read_vlong(&mut &sink[..]).unwrap(), i);
        }
    }
}
