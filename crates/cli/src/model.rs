//! Spill/merge model that ties record sizing, spill accounting and the merge
//! scheduler to one configuration.

use anyhow::{Context, Result};
use merge::MergeTrace;
use spill::{RecordSize, RecordSizeModel, SpillAccountant, SpillPrediction};
use std::fmt;
use tracing::info;

use crate::config::ModelConfig;

/// Records pushed through one sort buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Workload {
    pub records: u64,
    /// Serialized key size in bytes.
    pub key_bytes: i64,
    /// Serialized value size in bytes.
    pub value_bytes: i64,
}

/// Everything the model predicts for one [`Workload`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub workload: Workload,
    pub record_size: RecordSize,
    pub spill: SpillPrediction,
    /// Merge of the spill files into one output; empty for zero or one spill.
    pub merge: MergeTrace,
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "records: {}", self.workload.records)?;
        writeln!(f, "record size: {}", self.record_size)?;
        writeln!(f, "{}", self.spill)?;
        if self.merge.is_empty() {
            writeln!(f, "no merge needed")
        } else {
            write!(f, "{}", self.merge)
        }
    }
}

/// The spill/merge model.
///
/// # Prediction path
///
/// 1. Size one record (varint length prefixes plus buffer bookkeeping).
/// 2. Count spills: total buffer bytes over the spill threshold, rounded up.
/// 3. Schedule the merge of those spill files with the configured factor and
///    policy.
///
/// Every method is a pure function of the configuration and its arguments,
/// so a model can be shared freely between threads.
#[derive(Debug, Clone)]
pub struct SpillMergeModel {
    config: ModelConfig,
    sizes: RecordSizeModel,
    accountant: SpillAccountant,
}

impl SpillMergeModel {
    /// Validates `config` and builds the model.
    pub fn new(config: ModelConfig) -> Result<Self> {
        let accountant = config.spill_accountant()?;
        info!(
            buffer_bytes = accountant.buffer_capacity_bytes(),
            threshold_bytes = accountant.threshold_bytes(),
            factor = config.sort_factor,
            partitions = config.partitions,
            policy = %config.merge_policy,
            "model configured"
        );
        Ok(Self {
            config,
            sizes: RecordSizeModel::new(),
            accountant,
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn record_size(&self, key_bytes: i64, value_bytes: i64) -> Result<RecordSize> {
        Ok(self.sizes.size_of_record(key_bytes, value_bytes)?)
    }

    pub fn predict_spills(&self, records: u64, size: &RecordSize) -> Result<SpillPrediction> {
        Ok(self.accountant.predict(records, size)?)
    }

    /// Merge schedule for `segments` sorted segments.
    pub fn merge_trace(&self, segments: u64) -> Result<MergeTrace> {
        merge::schedule(self.config.merge_policy, self.config.sort_factor, segments)
            .with_context(|| format!("cannot schedule merge of {segments} segments"))
    }

    /// Full prediction for one workload.
    pub fn plan(&self, workload: &Workload) -> Result<Plan> {
        let record_size = self.record_size(workload.key_bytes, workload.value_bytes)?;
        let spill = self.predict_spills(workload.records, &record_size)?;
        // zero or one spill leaves nothing to merge
        let merge = self.merge_trace(spill.num_spill_files.max(1))?;
        Ok(Plan {
            workload: *workload,
            record_size,
            spill,
            merge,
        })
    }

    /// One spill prediction per record count, in input order.
    pub fn sweep(
        &self,
        record_counts: &[u64],
        key_bytes: i64,
        value_bytes: i64,
    ) -> Result<Vec<(u64, SpillPrediction)>> {
        let size = self.record_size(key_bytes, value_bytes)?;
        record_counts
            .iter()
            .map(|&records| -> Result<(u64, SpillPrediction)> {
                Ok((records, self.predict_spills(records, &size)?))
            })
            .collect()
    }

    /// Records of the given shape needed to produce `spills` spill files.
    pub fn records_for_spills(
        &self,
        spills: u64,
        key_bytes: i64,
        value_bytes: i64,
    ) -> Result<u64> {
        let size = self.record_size(key_bytes, value_bytes)?;
        Ok(self.accountant.records_for_spills(spills, &size)?)
    }
}
