//! Block lattice reduction
//!
//! Given a basis of an integer lattice that is already LLL reduced, this
//! crate strengthens it so that short projected sublattice vectors appear in
//! prescribed positions. Three reduction strategies are implemented on one
//! engine: classical BKZ, self-dual BKZ and slide reduction, with full HKZ
//! as the special case of a block covering the whole basis.
//!
//! The engine orchestrates pruned enumeration over projected blocks, LLL for
//! preprocessing and cleanup, and a shared Gram-Schmidt basis state that all
//! components mutate in place.
//!
//! # Modules
//!
//! - `gso`: integer basis, transformation mirror, μ/r data, row operations
//! - `lll`: ranged LLL reduction and dependency removal
//! - `enumeration`: pruned Schnorr-Euchner search, primal and dual
//! - `pruning`: strategies and pruning tables (consumed, not computed)
//! - `params`: parameter bundle, flags, float type selection
//! - `bkz`: the reduction engine, tours, driver and entry points
//! - `error`: status codes

pub mod bkz;
pub mod enumeration;
pub mod error;
pub mod gso;
pub mod lll;
pub mod params;
pub mod pruning;

pub use bkz::{
    bkz_reduction, bkz_reduction_flags, hkz_reduction, BkzAutoAbort, BkzReduction,
};
pub use error::RedStatus;
pub use gso::{IntMatrix, MatGso};
pub use lll::LllReducer;
pub use params::{BkzFlags, BkzParam, FloatType};
pub use pruning::{Pruning, Strategy};
