//! Error types for record sizing and spill prediction.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpillError {
    /// A byte count that must be non-negative was negative.
    #[error("invalid size: {field} = {value} (must be >= 0)")]
    InvalidSize { field: &'static str, value: i64 },

    /// A buffer or partition setting the model cannot work with.
    #[error("invalid config: {field} = {value} ({reason})")]
    InvalidConfig {
        field: &'static str,
        value: String,
        reason: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, SpillError>;
