//! # Spill
//!
//! Analytical model of a bounded sort buffer: how large each record is in
//! the buffer and on disk, and how many spill files a stream of records
//! produces before the final merge.
//!
//! ## Model
//! - Every record costs `metadata + key prefix + key + value prefix + value`
//!   bytes in the buffer; prefixes are [`varint`]-encoded sizes.
//! - The buffer spills each time occupancy reaches
//!   `capacity * threshold_fraction` bytes, kept exact even when that is not
//!   a whole number.
//! - On disk a record costs only its prefixed key and value; each partition
//!   of the merged output ends with a 6-byte marker.
//!
//! ## Example
//! ```rust
//! use spill::{size_of_record, text_len, SpillAccountant, INT_FIELD_BYTES};
//!
//! let size = size_of_record(text_len(1).unwrap(), INT_FIELD_BYTES).unwrap();
//! let acct = SpillAccountant::new(1 << 20, 0.5, 1).unwrap();
//! let p = acct.predict(50_000, &size).unwrap();
//! assert_eq!(p.num_spill_files, 3);
//! assert_eq!(p.materialized_bytes_total, 400_006);
//! ```

mod accountant;
mod error;
mod record;

pub use accountant::{
    predict, spill_threshold_bytes, SpillAccountant, SpillPrediction, PARTITION_MARKER_BYTES,
};
pub use error::{Result, SpillError};
pub use record::{
    size_of_record, text_len, RecordSize, RecordSizeModel, INT_FIELD_BYTES, RECORD_METADATA_BYTES,
};
