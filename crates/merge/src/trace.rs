use std::fmt;

use tracing::debug;

use crate::error::{MergeError, Result};
use crate::policy::{compute_first_pass_factor, MergePolicy};

/// Upper bound on the passes of one trace; every pass is kept in memory.
pub const MAX_MERGE_PASSES: u64 = 1 << 20;

/// One merge pass: `effective_factor` segments in, one segment out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergePass {
    pub pass_number: u64,
    pub segments_before: u64,
    pub effective_factor: u64,
    pub segments_after: u64,
}

impl fmt::Display for MergePass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pass {}: {} segments, merging {}, {} remaining",
            self.pass_number, self.segments_before, self.effective_factor, self.segments_after
        )
    }
}

/// The ordered passes that reduce `initial_segments` segments to one.
///
/// Empty when there was nothing to merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeTrace {
    policy: MergePolicy,
    factor: u64,
    initial_segments: u64,
    passes: Vec<MergePass>,
}

impl MergeTrace {
    pub fn policy(&self) -> MergePolicy {
        self.policy
    }

    pub fn factor(&self) -> u64 {
        self.factor
    }

    pub fn initial_segments(&self) -> u64 {
        self.initial_segments
    }

    pub fn passes(&self) -> &[MergePass] {
        &self.passes
    }

    /// Total number of passes.
    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Segments left after the last pass (the initial count if no pass ran).
    pub fn final_segments(&self) -> u64 {
        self.passes
            .last()
            .map(|p| p.segments_after)
            .unwrap_or(self.initial_segments)
    }

    /// `segments_after` of each pass, in order.
    pub fn segments_after(&self) -> Vec<u64> {
        self.passes.iter().map(|p| p.segments_after).collect()
    }

    /// Segment reads across all passes (sum of effective fan-outs).
    pub fn segments_read(&self) -> u64 {
        self.passes.iter().map(|p| p.effective_factor).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MergePass> {
        self.passes.iter()
    }
}

impl<'a> IntoIterator for &'a MergeTrace {
    type Item = &'a MergePass;
    type IntoIter = std::slice::Iter<'a, MergePass>;

    fn into_iter(self) -> Self::IntoIter {
        self.passes.iter()
    }
}

impl fmt::Display for MergeTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} merge of {} segments, factor {}: {} passes",
            self.policy,
            self.initial_segments,
            self.factor,
            self.passes.len()
        )?;
        for pass in &self.passes {
            writeln!(f, "  {pass}")?;
        }
        Ok(())
    }
}

/// Checks the inputs shared by both policies.
///
/// Returns `false` when there is nothing to merge.
fn validate(factor: u64, initial_segments: u64) -> Result<bool> {
    if factor == 0 {
        return Err(MergeError::InvalidConfig {
            field: "factor",
            value: factor,
        });
    }
    if initial_segments == 0 {
        return Err(MergeError::InvalidConfig {
            field: "initial_segments",
            value: initial_segments,
        });
    }
    if initial_segments == 1 {
        return Ok(false);
    }
    if factor == 1 {
        return Err(MergeError::DegenerateMergeConfig { initial_segments });
    }
    let passes = (initial_segments - 1).div_ceil(factor - 1);
    if passes > MAX_MERGE_PASSES {
        return Err(MergeError::TooManyPasses {
            initial_segments,
            passes,
        });
    }
    Ok(true)
}

fn record(passes: &mut Vec<MergePass>, segments_before: u64, effective_factor: u64) -> u64 {
    let pass = MergePass {
        pass_number: passes.len() as u64 + 1,
        segments_before,
        effective_factor,
        segments_after: segments_before - (effective_factor - 1),
    };
    debug!(
        pass = pass.pass_number,
        segments_before,
        effective_factor,
        segments_after = pass.segments_after,
        "merge pass"
    );
    passes.push(pass);
    pass.segments_after
}

/// Merges with an undersized first pass and full fan-out afterwards.
///
/// # Errors
///
/// [`MergeError::InvalidConfig`] for a zero factor or zero segments;
/// [`MergeError::DegenerateMergeConfig`] for factor 1 with more than one
/// segment; [`MergeError::TooManyPasses`] past [`MAX_MERGE_PASSES`].
pub fn run_variable_trace(factor: u64, initial_segments: u64) -> Result<MergeTrace> {
    let mut passes = Vec::new();
    if validate(factor, initial_segments)? {
        let mut remaining = initial_segments;
        let mut pass_number = 1;
        while remaining > 1 {
            let pass_factor = compute_first_pass_factor(factor, pass_number, remaining);
            // the last pass may ask for more segments than are left
            remaining = record(&mut passes, remaining, pass_factor.min(remaining));
            pass_number += 1;
        }
    }
    Ok(MergeTrace {
        policy: MergePolicy::Variable,
        factor,
        initial_segments,
        passes,
    })
}

/// Merges at full fan-out every pass; the final pass takes whatever is left.
///
/// # Errors
///
/// Same as [`run_variable_trace`].
pub fn run_fixed_trace(factor: u64, initial_segments: u64) -> Result<MergeTrace> {
    let mut passes = Vec::new();
    if validate(factor, initial_segments)? {
        let mut remaining = initial_segments;
        while remaining > 1 {
            remaining = record(&mut passes, remaining, remaining.min(factor));
        }
    }
    Ok(MergeTrace {
        policy: MergePolicy::Fixed,
        factor,
        initial_segments,
        passes,
    })
}

/// Runs the trace for `policy`.
pub fn schedule(policy: MergePolicy, factor: u64, initial_segments: u64) -> Result<MergeTrace> {
    match policy {
        MergePolicy::Variable => run_variable_trace(factor, initial_segments),
        MergePolicy::Fixed => run_fixed_trace(factor, initial_segments),
    }
}
