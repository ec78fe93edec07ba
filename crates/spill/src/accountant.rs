use std::fmt;

use tracing::debug;

use crate::error::{Result, SpillError};
use crate::record::RecordSize;

/// End-of-partition marker written once per partition in the merged output.
pub const PARTITION_MARKER_BYTES: u64 = 6;

/// Predicted outcome of pushing a number of records through the sort buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpillPrediction {
    pub num_spill_files: u64,
    /// Length-prefixed record bytes, no partition markers.
    pub wire_bytes_total: u64,
    /// Bytes of the final merged output: wire bytes plus partition markers.
    pub materialized_bytes_total: u64,
    /// Key and value bytes alone.
    pub payload_bytes_total: u64,
}

impl fmt::Display for SpillPrediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "spill files: {}, payload bytes: {}, wire bytes: {}, materialized bytes: {}",
            self.num_spill_files,
            self.payload_bytes_total,
            self.wire_bytes_total,
            self.materialized_bytes_total
        )
    }
}

/// Exact spill threshold: `numerator / 2^shift` bytes.
///
/// Every finite `f64` is a dyadic rational, so `capacity * fraction` is
/// carried without rounding and spill counts never depend on float error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Threshold {
    numerator: u128,
    shift: u32,
}

impl Threshold {
    /// `fraction` must be finite and positive.
    fn new(buffer_capacity_bytes: u64, fraction: f64) -> Self {
        let (mantissa, shift) = dyadic(fraction);
        Self {
            numerator: buffer_capacity_bytes as u128 * mantissa as u128,
            shift,
        }
    }

    /// `ceil(bytes / threshold)`, or `None` if it does not fit in a `u64`.
    ///
    /// Binary long division of `bytes * 2^shift` by the numerator; the
    /// remainder stays below the numerator (< 2^117) so doubling it never
    /// overflows.
    fn spills_for(&self, bytes: u128) -> Option<u64> {
        let mut quotient = bytes / self.numerator;
        let mut remainder = bytes % self.numerator;
        for _ in 0..self.shift {
            if quotient > u64::MAX as u128 {
                return None;
            }
            quotient <<= 1;
            remainder <<= 1;
            if remainder >= self.numerator {
                remainder -= self.numerator;
                quotient += 1;
            }
        }
        if remainder != 0 {
            quotient += 1;
        }
        u64::try_from(quotient).ok()
    }
}

/// Splits a finite positive `f64` into `mantissa / 2^shift` with an odd
/// mantissa (or a zero shift).
fn dyadic(value: f64) -> (u64, u32) {
    let bits = value.to_bits();
    let exponent = ((bits >> 52) & 0x7ff) as u32;
    let fraction_bits = bits & ((1 << 52) - 1);
    let (mantissa, shift) = if exponent == 0 {
        // subnormal
        (fraction_bits, 1074)
    } else {
        (fraction_bits | 1 << 52, 1075 - exponent)
    };
    let zeros = mantissa.trailing_zeros().min(shift);
    (mantissa >> zeros, shift - zeros)
}

/// Predicts spills for a sort buffer of fixed capacity.
///
/// The buffer spills every time its occupancy reaches
/// `capacity * threshold_fraction` bytes, so the spill count is the ceiling
/// of total buffer bytes over that threshold. A buffer that lands exactly on
/// the threshold still counts as one spill. The threshold is kept exact and
/// need not be a whole number of bytes.
///
/// The configuration is validated once in [`SpillAccountant::new`]; after
/// that every prediction is a pure function of its arguments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpillAccountant {
    buffer_capacity_bytes: u64,
    spill_threshold_fraction: f64,
    num_partitions: u32,
    threshold: Threshold,
}

impl SpillAccountant {
    /// Validates a buffer configuration.
    ///
    /// # Errors
    ///
    /// [`SpillError::InvalidConfig`] if the capacity is zero, the fraction is
    /// outside `(0, 1]`, or there are no partitions.
    pub fn new(
        buffer_capacity_bytes: u64,
        spill_threshold_fraction: f64,
        num_partitions: u32,
    ) -> Result<Self> {
        if buffer_capacity_bytes == 0 {
            return Err(SpillError::InvalidConfig {
                field: "buffer_capacity_bytes",
                value: buffer_capacity_bytes.to_string(),
                reason: "must be > 0",
            });
        }
        // also rejects NaN
        if !(spill_threshold_fraction > 0.0 && spill_threshold_fraction <= 1.0) {
            return Err(SpillError::InvalidConfig {
                field: "spill_threshold_fraction",
                value: spill_threshold_fraction.to_string(),
                reason: "must be in (0, 1]",
            });
        }
        if num_partitions == 0 {
            return Err(SpillError::InvalidConfig {
                field: "num_partitions",
                value: num_partitions.to_string(),
                reason: "must be >= 1",
            });
        }

        Ok(Self {
            buffer_capacity_bytes,
            spill_threshold_fraction,
            num_partitions,
            threshold: Threshold::new(buffer_capacity_bytes, spill_threshold_fraction),
        })
    }

    pub fn buffer_capacity_bytes(&self) -> u64 {
        self.buffer_capacity_bytes
    }

    pub fn spill_threshold_fraction(&self) -> f64 {
        self.spill_threshold_fraction
    }

    pub fn num_partitions(&self) -> u32 {
        self.num_partitions
    }

    /// Buffer occupancy, in bytes, at which a spill starts.
    ///
    /// Rounded to `f64` for reporting; spill counts use the exact value.
    pub fn threshold_bytes(&self) -> f64 {
        spill_threshold_bytes(self.buffer_capacity_bytes, self.spill_threshold_fraction)
    }

    /// Predicts spills and output bytes for `record_count` records of `size`.
    ///
    /// # Errors
    ///
    /// [`SpillError::InvalidConfig`] if a total does not fit in a `u64`.
    pub fn predict(&self, record_count: u64, size: &RecordSize) -> Result<SpillPrediction> {
        let records = record_count as u128;
        let buffered = records * size.buffer_footprint as u128;
        let wire = records * size.wire_footprint as u128;
        let payload = records * size.payload_bytes() as u128;
        let markers = PARTITION_MARKER_BYTES as u128 * self.num_partitions as u128;

        let num_spill_files = self
            .threshold
            .spills_for(buffered)
            .ok_or_else(|| overflow(record_count))?;
        let prediction = SpillPrediction {
            num_spill_files,
            wire_bytes_total: fit_u64(wire, record_count)?,
            materialized_bytes_total: fit_u64(wire + markers, record_count)?,
            payload_bytes_total: fit_u64(payload, record_count)?,
        };

        debug!(
            record_count,
            buffer_footprint = size.buffer_footprint,
            threshold_bytes = self.threshold_bytes(),
            num_spill_files,
            materialized_bytes = prediction.materialized_bytes_total,
            "predicted spills"
        );
        Ok(prediction)
    }

    /// Largest number of records of `size` that fits in `desired_spills`
    /// spills.
    ///
    /// Feeding the result back into [`predict`](Self::predict) yields
    /// `desired_spills` spill files.
    ///
    /// # Errors
    ///
    /// [`SpillError::InvalidConfig`] if a single record is larger than the
    /// spill threshold, or if the count overflows.
    pub fn records_for_spills(&self, desired_spills: u64, size: &RecordSize) -> Result<u64> {
        let footprint = size.buffer_footprint as u128;
        if self.threshold.spills_for(footprint).map_or(true, |n| n > 1) {
            return Err(SpillError::InvalidConfig {
                field: "buffer_footprint",
                value: size.buffer_footprint.to_string(),
                reason: "record is larger than the spill threshold",
            });
        }
        let fits = |records: u64| {
            self.threshold
                .spills_for(records as u128 * footprint)
                .is_some_and(|n| n <= desired_spills)
        };
        if fits(u64::MAX) {
            return Err(SpillError::InvalidConfig {
                field: "desired_spills",
                value: desired_spills.to_string(),
                reason: "record count overflows u64",
            });
        }
        // fits(lo) && !fits(hi)
        let (mut lo, mut hi) = (0u64, u64::MAX);
        while hi - lo > 1 {
            let mid = lo + (hi - lo) / 2;
            if fits(mid) {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        Ok(lo)
    }
}

/// `capacity * fraction`, the buffer occupancy that triggers a spill.
pub fn spill_threshold_bytes(buffer_capacity_bytes: u64, spill_threshold_fraction: f64) -> f64 {
    buffer_capacity_bytes as f64 * spill_threshold_fraction
}

/// One-shot prediction without keeping the accountant around.
pub fn predict(
    record_count: u64,
    size: &RecordSize,
    buffer_capacity_bytes: u64,
    spill_threshold_fraction: f64,
    num_partitions: u32,
) -> Result<SpillPrediction> {
    SpillAccountant::new(buffer_capacity_bytes, spill_threshold_fraction, num_partitions)?
        .predict(record_count, size)
}

fn overflow(record_count: u64) -> SpillError {
    SpillError::InvalidConfig {
        field: "record_count",
        value: record_count.to_string(),
        reason: "total overflows u64",
    }
}

fn fit_u64(value: u128, record_count: u64) -> Result<u64> {
    u64::try_from(value).map_err(|_| overflow(record_count))
}
