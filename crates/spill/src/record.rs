use std::fmt;

use crate::error::{Result, SpillError};

/// Bookkeeping bytes the sort buffer keeps per record (partition, key
/// offset, value offset, value length; four 4-byte ints).
pub const RECORD_METADATA_BYTES: u64 = 16;

/// Serialized size of a fixed-width 4-byte integer value.
pub const INT_FIELD_BYTES: i64 = 4;

/// Serialized size of a text field of `chars` bytes: its own varint length
/// prefix followed by the bytes.
///
/// A one-character key therefore serializes to 2 bytes.
///
/// # Errors
///
/// [`SpillError::InvalidSize`] if `chars` is negative.
pub fn text_len(chars: i64) -> Result<i64> {
    if chars < 0 {
        return Err(SpillError::InvalidSize {
            field: "text_chars",
            value: chars,
        });
    }
    Ok(varint::size_of(chars) as i64 + chars)
}

/// Size of one key/value record, in the sort buffer and on the wire.
///
/// `key_bytes` and `value_bytes` are the serialized sizes of the key and
/// value; each is preceded on the wire by a varint holding that size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordSize {
    pub key_encoded_len: u64,
    pub value_encoded_len: u64,
    pub key_bytes: u64,
    pub value_bytes: u64,
    /// Bytes the record occupies in the live sort buffer (metadata included).
    pub buffer_footprint: u64,
    /// Bytes the record occupies in a spill or merged output file.
    pub wire_footprint: u64,
}

impl RecordSize {
    /// Key plus value bytes, without length prefixes.
    pub fn payload_bytes(&self) -> u64 {
        self.key_bytes + self.value_bytes
    }

    /// Buffer bytes that are never written to disk.
    pub fn metadata_bytes(&self) -> u64 {
        self.buffer_footprint - self.wire_footprint
    }
}

impl fmt::Display for RecordSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "key {}+{} B, value {}+{} B, buffer {} B, wire {} B",
            self.key_encoded_len,
            self.key_bytes,
            self.value_encoded_len,
            self.value_bytes,
            self.buffer_footprint,
            self.wire_footprint
        )
    }
}

/// Computes [`RecordSize`]s for the length-prefixed record format.
///
/// Stateless apart from the per-record bookkeeping cost, which defaults to
/// [`RECORD_METADATA_BYTES`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordSizeModel {
    metadata_bytes: u64,
}

impl RecordSizeModel {
    pub fn new() -> Self {
        Self {
            metadata_bytes: RECORD_METADATA_BYTES,
        }
    }

    /// Overrides the per-record bookkeeping cost.
    pub fn with_metadata_bytes(metadata_bytes: u64) -> Self {
        Self { metadata_bytes }
    }

    pub fn metadata_bytes(&self) -> u64 {
        self.metadata_bytes
    }

    /// Sizes one record with a `key_bytes`-byte key and a `value_bytes`-byte
    /// value.
    ///
    /// # Errors
    ///
    /// [`SpillError::InvalidSize`] if either size is negative.
    pub fn size_of_record(&self, key_bytes: i64, value_bytes: i64) -> Result<RecordSize> {
        if key_bytes < 0 {
            return Err(SpillError::InvalidSize {
                field: "key_bytes",
                value: key_bytes,
            });
        }
        if value_bytes < 0 {
            return Err(SpillError::InvalidSize {
                field: "value_bytes",
                value: value_bytes,
            });
        }

        let key_encoded_len = varint::size_of(key_bytes) as u64;
        let value_encoded_len = varint::size_of(value_bytes) as u64;
        let key_bytes = key_bytes as u64;
        let value_bytes = value_bytes as u64;
        let wire_footprint = key_encoded_len + key_bytes + value_encoded_len + value_bytes;

        Ok(RecordSize {
            key_encoded_len,
            value_encoded_len,
            key_bytes,
            value_bytes,
            buffer_footprint: self.metadata_bytes + wire_footprint,
            wire_footprint,
        })
    }
}

impl Default for RecordSizeModel {
    fn default() -> Self {
        Self::new()
    }
}

/// [`RecordSizeModel::size_of_record`] with the default bookkeeping cost.
pub fn size_of_record(key_bytes: i64, value_bytes: i64) -> Result<RecordSize> {
    RecordSizeModel::new().size_of_record(key_bytes, value_bytes)
}
