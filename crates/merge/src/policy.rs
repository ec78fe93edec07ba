use std::fmt;
use std::str::FromStr;

use tracing::trace;

/// How the fan-out of each merge pass is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergePolicy {
    /// Undersized first pass, full fan-out afterwards.
    #[default]
    Variable,
    /// Full fan-out every pass, remainder merged in the last pass.
    Fixed,
}

impl fmt::Display for MergePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergePolicy::Variable => f.write_str("variable"),
            MergePolicy::Fixed => f.write_str("fixed"),
        }
    }
}

impl FromStr for MergePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "variable" => Ok(MergePolicy::Variable),
            "fixed" => Ok(MergePolicy::Fixed),
            other => Err(format!(
                "unknown merge policy '{other}' (expected 'variable' or 'fixed')"
            )),
        }
    }
}

/// Fan-out for pass `pass_number` when `segments_remaining` segments are left.
///
/// Only the first pass is ever undersized: it merges just enough segments
/// that the count left afterwards is `1 + k * (factor - 1)`, so every later
/// pass runs at the full `factor`.
pub fn compute_first_pass_factor(factor: u64, pass_number: u64, segments_remaining: u64) -> u64 {
    if pass_number > 1 || segments_remaining <= factor || factor <= 1 {
        return factor;
    }
    let m = (segments_remaining - 1) % (factor - 1);
    let pass_factor = if m == 0 { factor } else { m + 1 };
    trace!(factor, segments_remaining, pass_factor, "first pass factor");
    pass_factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_pass_is_undersized() {
        assert_eq!(compute_first_pass_factor(5, 1, 23), 3);
        assert_eq!(compute_first_pass_factor(3, 1, 8), 2);
    }

    #[test]
    fn first_pass_full_when_remainder_divides() {
        // 21 = 1 + 5 * 4
        assert_eq!(compute_first_pass_factor(5, 1, 21), 5);
        assert_eq!(compute_first_pass_factor(10, 1, 100), 10);
    }

    #[test]
    fn later_passes_and_small_inputs_use_factor() {
        assert_eq!(compute_first_pass_factor(5, 2, 23), 5);
        assert_eq!(compute_first_pass_factor(5, 1, 5), 5);
        assert_eq!(compute_first_pass_factor(5, 1, 2), 5);
        assert_eq!(compute_first_pass_factor(1, 1, 100), 1);
    }

    #[test]
    fn policy_parses() {
        assert_eq!("variable".parse::<MergePolicy>(), Ok(MergePolicy::Variable));
        assert_eq!("Fixed".parse::<MergePolicy>(), Ok(MergePolicy::Fixed));
        assert!("greedy".parse::<MergePolicy>().is_err());
        assert_eq!(MergePolicy::Fixed.to_string(), "fixed");
    }
}
