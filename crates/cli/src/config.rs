//! Model configuration.
//!
//! Values come from three layers, later layers winning:
//!
//! 1. [`ModelConfig::default`], the stock job defaults.
//! 2. Job-style properties (`-D mapreduce.task.io.sort.mb=1`).
//! 3. Explicit command-line flags.

use anyhow::{anyhow, bail, Context, Result};
use merge::MergePolicy;
use spill::SpillAccountant;
use tracing::{debug, warn};

pub const SORT_MB_KEY: &str = "mapreduce.task.io.sort.mb";
pub const SPILL_PERCENT_KEY: &str = "mapreduce.map.sort.spill.percent";
pub const SORT_FACTOR_KEY: &str = "mapreduce.task.io.sort.factor";
pub const REDUCES_KEY: &str = "mapreduce.job.reduces";

/// Largest sort buffer, in MB, whose byte size fits in a `u64`.
const MAX_SORT_MB: u64 = u64::MAX >> 20;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelConfig {
    /// Sort buffer size in megabytes.
    pub sort_buffer_mb: u64,
    /// Fraction of the buffer that triggers a spill, in `(0, 1]`.
    pub spill_percent: f64,
    /// Maximum number of segments merged in one pass.
    pub sort_factor: u64,
    /// Partitions (reducers) in the merged output.
    pub partitions: u32,
    pub merge_policy: MergePolicy,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            sort_buffer_mb: 100,
            spill_percent: 0.80,
            sort_factor: 10,
            partitions: 1,
            merge_policy: MergePolicy::Variable,
        }
    }
}

impl ModelConfig {
    pub fn buffer_capacity_bytes(&self) -> u64 {
        self.sort_buffer_mb << 20
    }

    /// Applies one job property. Unknown keys are ignored with a warning.
    pub fn apply_property(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key.trim() {
            SORT_MB_KEY => self.sort_buffer_mb = parse_value(key, value)?,
            SPILL_PERCENT_KEY => self.spill_percent = parse_value(key, value)?,
            SORT_FACTOR_KEY => self.sort_factor = parse_value(key, value)?,
            REDUCES_KEY => self.partitions = parse_value(key, value)?,
            other => {
                warn!(key = other, "ignoring unknown property");
                return Ok(());
            }
        }
        debug!(key, value, "applied property");
        Ok(())
    }

    /// Applies `key=value` pairs in order.
    pub fn apply_properties<I, S>(&mut self, pairs: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for pair in pairs {
            let (key, value) = parse_property(pair.as_ref())?;
            self.apply_property(key, value)?;
        }
        Ok(())
    }

    /// Rejects settings the model cannot evaluate.
    pub fn validate(&self) -> Result<()> {
        if self.sort_buffer_mb == 0 {
            bail!("{SORT_MB_KEY} must be > 0");
        }
        if self.sort_buffer_mb > MAX_SORT_MB {
            bail!(
                "{SORT_MB_KEY} = {} is too large (max {MAX_SORT_MB})",
                self.sort_buffer_mb
            );
        }
        if !(self.spill_percent > 0.0 && self.spill_percent <= 1.0) {
            bail!(
                "{SPILL_PERCENT_KEY} = {} must be in (0, 1]",
                self.spill_percent
            );
        }
        if self.sort_factor == 0 {
            bail!("{SORT_FACTOR_KEY} must be >= 1");
        }
        if self.partitions == 0 {
            bail!("{REDUCES_KEY} must be >= 1");
        }
        Ok(())
    }

    /// Builds the spill accountant for this buffer configuration.
    pub fn spill_accountant(&self) -> Result<SpillAccountant> {
        self.validate()?;
        SpillAccountant::new(
            self.buffer_capacity_bytes(),
            self.spill_percent,
            self.partitions,
        )
        .context("invalid sort buffer configuration")
    }
}

/// Splits `key=value`.
pub fn parse_property(pair: &str) -> Result<(&str, &str)> {
    let (key, value) = pair
        .split_once('=')
        .ok_or_else(|| anyhow!("property '{pair}' is not of the form key=value"))?;
    if key.trim().is_empty() {
        bail!("property '{pair}' has an empty key");
    }
    Ok((key.trim(), value))
}

fn parse_value<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse()
        .with_context(|| format!("invalid value '{value}' for {key}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ModelConfig::default();
        config.validate().unwrap();
        assert_eq!(config.buffer_capacity_bytes(), 100 << 20);
        assert_eq!(config.sort_factor, 10);
    }

    #[test]
    fn properties_override_defaults() -> Result<()> {
        let mut config = ModelConfig::default();
        config.apply_properties([
            "mapreduce.task.io.sort.mb=1",
            "mapreduce.map.sort.spill.percent=0.5",
            "mapreduce.task.io.sort.factor=3",
            "mapreduce.job.reduces = 4",
        ])?;
        assert_eq!(config.sort_buffer_mb, 1);
        assert_eq!(config.buffer_capacity_bytes(), 1 << 20);
        assert_eq!(config.spill_percent, 0.5);
        assert_eq!(config.sort_factor, 3);
        assert_eq!(config.partitions, 4);
        Ok(())
    }

    #[test]
    fn later_property_wins() -> Result<()> {
        let mut config = ModelConfig::default();
        config.apply_properties([
            "mapreduce.task.io.sort.factor=3",
            "mapreduce.task.io.sort.factor=7",
        ])?;
        assert_eq!(config.sort_factor, 7);
        Ok(())
    }

    #[test]
    fn unknown_property_ignored() -> Result<()> {
        let mut config = ModelConfig::default();
        config.apply_properties(["dfs.blocksize=134217728"])?;
        assert_eq!(config, ModelConfig::default());
        Ok(())
    }

    #[test]
    fn malformed_pairs_rejected() {
        let mut config = ModelConfig::default();
        assert!(config.apply_properties(["no-equals-sign"]).is_err());
        assert!(config.apply_properties(["=5"]).is_err());
        let err = config
            .apply_properties(["mapreduce.task.io.sort.mb=lots"])
            .unwrap_err();
        assert!(err.to_string().contains(SORT_MB_KEY));
    }

    #[test]
    fn validate_rejects_out_of_range() {
        let cases = [
            ModelConfig {
                sort_buffer_mb: 0,
                ..ModelConfig::default()
            },
            ModelConfig {
                sort_buffer_mb: MAX_SORT_MB + 1,
                ..ModelConfig::default()
            },
            ModelConfig {
                spill_percent: 0.0,
                ..ModelConfig::default()
            },
            ModelConfig {
                spill_percent: 1.01,
                ..ModelConfig::default()
            },
            ModelConfig {
                sort_factor: 0,
                ..ModelConfig::default()
            },
            ModelConfig {
                partitions: 0,
                ..ModelConfig::default()
            },
        ];
        for config in cases {
            assert!(config.validate().is_err(), "{config:?} should be rejected");
            assert!(config.spill_accountant().is_err());
        }
    }

    #[test]
    fn accountant_uses_buffer_threshold() -> Result<()> {
        let mut config = ModelConfig::default();
        config.apply_properties([
            "mapreduce.task.io.sort.mb=1",
            "mapreduce.map.sort.spill.percent=0.5",
        ])?;
        let acct = config.spill_accountant()?;
        assert_eq!(acct.threshold_bytes(), 524_288.0);
        Ok(())
    }
}
