use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    #[error("invalid config: {field} = {value} (must be >= 1)")]
    InvalidConfig { field: &'static str, value: u64 },

    /// A fan-out of 1 never reduces the segment count.
    #[error("merge factor 1 cannot reduce {initial_segments} segments to one")]
    DegenerateMergeConfig { initial_segments: u64 },

    #[error(
        "merging {initial_segments} segments takes {passes} passes (max {max})",
        max = crate::MAX_MERGE_PASSES
    )]
    TooManyPasses { initial_segments: u64, passes: u64 },
}

pub type Result<T> = std::result::Result<T, MergeError>;
