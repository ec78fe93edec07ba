//! # Merge
//!
//! Pass-by-pass schedule of a bounded fan-out external merge.
//!
//! Merging `factor` sorted segments into one removes `factor - 1` segments,
//! so reducing `n` segments to one always takes `ceil((n - 1) / (factor - 1))`
//! passes. Two policies decide the fan-out of each pass:
//!
//! - [`MergePolicy::Variable`] sizes the first pass so that every later pass
//!   runs at the full factor ([`run_variable_trace`]).
//! - [`MergePolicy::Fixed`] runs every pass at the full factor and merges
//!   the remainder last ([`run_fixed_trace`]).
//!
//! Both produce the same number of passes.
//!
//! ```rust
//! let trace = merge::run_variable_trace(5, 23).unwrap();
//! assert_eq!(trace.segments_after(), vec![21, 17, 13, 9, 5, 1]);
//! ```

mod error;
mod policy;
mod trace;

pub use error::{MergeError, Result};
pub use policy::{compute_first_pass_factor, MergePolicy};
pub use trace::{
    run_fixed_trace, run_variable_trace, schedule, MergePass, MergeTrace, MAX_MERGE_PASSES,
};
