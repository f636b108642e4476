//! Reduction parameters
//!
//! The parameter bundle recognized by the block reduction driver, the flag
//! set selecting tour variants and budget checks, and the float type chosen
//! at the entry points.

use std::ops::{BitOr, BitOrAssign};

use crate::pruning::{default_strategies, Strategy};

/// Flag set for block reduction, composed with `|`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BkzFlags(pub u32);

impl BkzFlags {
    pub const DEFAULT: BkzFlags = BkzFlags(0);
    /// Per-tour reporting through the logger.
    pub const VERBOSE: BkzFlags = BkzFlags(0x1);
    /// Restrict the pre-enumeration LLL to the block instead of the prefix.
    pub const BOUNDED_LLL: BkzFlags = BkzFlags(0x4);
    /// Cap the enumeration radius by the Gaussian heuristic estimate.
    pub const GH_BND: BkzFlags = BkzFlags(0x8);
    /// Stop when the basis slope stops improving.
    pub const AUTO_ABORT: BkzFlags = BkzFlags(0x10);
    /// Honor `max_loops`.
    pub const MAX_LOOPS: BkzFlags = BkzFlags(0x20);
    /// Honor `max_time`.
    pub const MAX_TIME: BkzFlags = BkzFlags(0x40);
    /// Append the basis shape to `dump_gso_filename` after every tour.
    pub const DUMP_GSO: BkzFlags = BkzFlags(0x80);
    /// Self-dual variant: alternate dual and primal tours.
    pub const SD_VARIANT: BkzFlags = BkzFlags(0x100);
    /// Slide reduction.
    pub const SLD_RED: BkzFlags = BkzFlags(0x200);

    pub fn contains(self, other: BkzFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for BkzFlags {
    type Output = BkzFlags;
    fn bitor(self, rhs: BkzFlags) -> BkzFlags {
        BkzFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for BkzFlags {
    fn bitor_assign(&mut self, rhs: BkzFlags) {
        self.0 |= rhs.0;
    }
}

/// Float type used for Gram-Schmidt data.
///
/// The engine computes in f64. The variants exist so callers can state their
/// requirement: `Mpfr` demands an explicit working precision and is rejected
/// without one; the remaining variants all dispatch to the f64 engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FloatType {
    #[default]
    Default,
    Double,
    LongDouble,
    Dpe,
    Mpfr,
}

/// Parameter bundle for block reduction.
#[derive(Debug, Clone)]
pub struct BkzParam {
    /// Size of the block reduced at each step.
    pub block_size: usize,
    /// Per-block-size strategies, indexed by block size.
    pub strategies: Vec<Strategy>,
    /// Lovász slack; the basis is done when LLL with this δ holds.
    pub delta: f64,
    pub flags: BkzFlags,
    /// Tour budget, 0 = unlimited.
    pub max_loops: usize,
    /// Wall-clock budget in seconds, 0 = unlimited. Checked at tour
    /// boundaries only.
    pub max_time: f64,
    pub auto_abort_scale: f64,
    pub auto_abort_max_no_dec: usize,
    /// Enumeration radius cap as a multiple of the Gaussian heuristic
    /// estimate, applied under `GH_BND`.
    pub gh_factor: f64,
    /// Retry until the accumulated failure probability of the enumeration
    /// attempts drops below `1 - min_success_probability`.
    pub min_success_probability: f64,
    /// Nonzero entries per row in the rerandomization perturbation.
    pub rerandomization_density: usize,
    pub dump_gso_filename: Option<String>,
    pub dump_gso_prefix: Option<String>,
}

impl BkzParam {
    pub fn new(block_size: usize, flags: BkzFlags) -> Self {
        Self {
            block_size,
            strategies: default_strategies(block_size),
            delta: 0.99,
            flags,
            max_loops: 0,
            max_time: 0.0,
            auto_abort_scale: 1.0,
            auto_abort_max_no_dec: 5,
            gh_factor: 1.1,
            min_success_probability: 0.5,
            rerandomization_density: 3,
            dump_gso_filename: None,
            dump_gso_prefix: None,
        }
    }

    /// Strategy for a block size, falling back to the trivial strategy when
    /// none was supplied.
    pub fn strategy(&self, block_size: usize) -> Strategy {
        self.strategies
            .get(block_size)
            .cloned()
            .unwrap_or_else(|| Strategy::new(block_size))
    }

    /// Derived bundle for one recursive preprocessing tour at a smaller
    /// block size. Strategies carry over; the radius is GH-capped the way
    /// inner tours always are.
    pub fn preprocessing_param(&self, block_size: usize) -> BkzParam {
        let mut par = BkzParam::new(block_size, BkzFlags::GH_BND);
        par.strategies = self.strategies.clone();
        par.delta = self.delta;
        par.gh_factor = self.gh_factor;
        par.min_success_probability = self.min_success_probability;
        par.rerandomization_density = self.rerandomization_density;
        par
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_compose() {
        let f = BkzFlags::VERBOSE | BkzFlags::AUTO_ABORT;
        assert!(f.contains(BkzFlags::VERBOSE));
        assert!(f.contains(BkzFlags::AUTO_ABORT));
        assert!(!f.contains(BkzFlags::SLD_RED));
        assert!(f.contains(BkzFlags::DEFAULT));
    }

    #[test]
    fn test_param_defaults() {
        let p = BkzParam::new(20, BkzFlags::DEFAULT);
        assert_eq!(p.delta, 0.99);
        assert_eq!(p.auto_abort_max_no_dec, 5);
        assert_eq!(p.auto_abort_scale, 1.0);
        assert_eq!(p.rerandomization_density, 3);
        assert_eq!(p.strategies.len(), 21);
    }

    #[test]
    fn test_preprocessing_param_inherits_strategies() {
        let mut p = BkzParam::new(30, BkzFlags::DEFAULT);
        p.strategies[10].preprocessing_block_sizes = vec![4];
        let pre = p.preprocessing_param(10);
        assert_eq!(pre.block_size, 10);
        assert!(pre.flags.contains(BkzFlags::GH_BND));
        assert_eq!(pre.strategy(10).preprocessing_block_sizes, vec![4]);
    }
}
