//! Reduction strategies and pruning tables
//!
//! A strategy bundles, per block size, the recursive preprocessing block
//! sizes and a table of pruning parameter rows. Tables are consumed as-is
//! (typically deserialized from a strategy file); computing pruning
//! coefficients is not this crate's job.

use serde::{Deserialize, Serialize};

/// One row of a pruning table.
///
/// `coefficients[t]` bounds the squared partial norm after `t + 1`
/// coordinates of the enumeration tree have been fixed, as a fraction of the
/// full squared radius. `probability` is the success probability of an
/// enumeration run with these bounds. All-ones coefficients disable pruning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pruning {
    pub probability: f64,
    pub coefficients: Vec<f64>,
}

impl Pruning {
    /// No pruning: unit bound at every depth, success probability one.
    pub fn none(block_size: usize) -> Self {
        Self {
            probability: 1.0,
            coefficients: vec![1.0; block_size],
        }
    }
}

/// Per-block-size reduction strategy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Strategy {
    pub block_size: usize,
    /// Non-increasing list of smaller block sizes used for recursive
    /// preprocessing. Sizes of two or less are never listed; plain LLL is
    /// the base case.
    pub preprocessing_block_sizes: Vec<usize>,
    /// Pruning table, ordered by trial: row t parameterizes the t-th
    /// enumeration attempt on a block.
    pub pruning_parameters: Vec<Pruning>,
}

impl Strategy {
    pub fn new(block_size: usize) -> Self {
        Self {
            block_size,
            preprocessing_block_sizes: Vec::new(),
            pruning_parameters: Vec::new(),
        }
    }

    /// Pruning row for the given trial, clamped to the last row. An empty
    /// table yields the all-ones default for `block_size`.
    pub fn get_pruning(&self, trial: usize, block_size: usize) -> Pruning {
        if self.pruning_parameters.is_empty() {
            return Pruning::none(block_size);
        }
        let idx = trial.min(self.pruning_parameters.len() - 1);
        self.pruning_parameters[idx].clone()
    }
}

/// Trivial strategies for every block size up to `max_block_size`
/// (no preprocessing, no pruning).
pub fn default_strategies(max_block_size: usize) -> Vec<Strategy> {
    (0..=max_block_size).map(Strategy::new).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pruning_none() {
        let p = Pruning::none(5);
        assert_eq!(p.coefficients, vec![1.0; 5]);
        assert_eq!(p.probability, 1.0);
    }

    #[test]
    fn test_get_pruning_clamps_trial() {
        let mut s = Strategy::new(10);
        s.pruning_parameters = vec![
            Pruning {
                probability: 0.5,
                coefficients: vec![1.0; 10],
            },
            Pruning {
                probability: 0.3,
                coefficients: vec![0.9; 10],
            },
        ];
        assert_eq!(s.get_pruning(0, 10).probability, 0.5);
        assert_eq!(s.get_pruning(1, 10).probability, 0.3);
        assert_eq!(s.get_pruning(7, 10).probability, 0.3);
    }

    #[test]
    fn test_empty_table_falls_back() {
        let s = Strategy::new(6);
        let p = s.get_pruning(3, 4);
        assert_eq!(p.coefficients.len(), 4);
        assert_eq!(p.probability, 1.0);
    }

    #[test]
    fn test_default_strategies_indexable_by_block_size() {
        let s = default_strategies(20);
        assert_eq!(s.len(), 21);
        assert_eq!(s[20].block_size, 20);
    }
}
