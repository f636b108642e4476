//! Ranged LLL reduction
//!
//! The reducer operates on a row range of a shared [`MatGso`]: rows before
//! `kappa_min` are never touched, size reduction starts at `kappa_start`, and
//! the sweep stops at `kappa_end`. This is the shape block reduction needs,
//! where a block is LLL-cleaned in place while the rest of the basis stays
//! put.
//!
//! Besides the plain sweep there is a removal variant used when a linear
//! combination has been inserted and the generating set carries exactly one
//! dependency: the sweep then drives the dependent direction to an exactly
//! zero integer row, which is moved out and dropped.

use crate::error::RedStatus;
use crate::gso::MatGso;

/// Default Lovász slack.
pub const LLL_DEF_DELTA: f64 = 0.99;
/// Default size-reduction threshold.
pub const LLL_DEF_ETA: f64 = 0.51;

/// Iteration guard. A sweep that exceeds this count is reported as a
/// numeric fault rather than allowed to spin.
const LLL_MAX_ITERS: u64 = 4_000_000;

/// LLL reducer parameters plus per-call counters.
#[derive(Debug, Clone)]
pub struct LllReducer {
    pub delta: f64,
    pub eta: f64,
    /// Row swaps performed by the most recent call.
    pub n_swaps: u64,
}

impl LllReducer {
    pub fn new(delta: f64, eta: f64) -> Self {
        Self {
            delta,
            eta,
            n_swaps: 0,
        }
    }

    /// LLL-reduce rows `[kappa_start, kappa_end)`, size-reducing against rows
    /// down to `kappa_min`.
    pub fn lll(
        &mut self,
        m: &mut MatGso,
        kappa_min: usize,
        kappa_start: usize,
        kappa_end: usize,
    ) -> Result<(), RedStatus> {
        self.n_swaps = 0;
        if kappa_end <= kappa_min + 1 {
            return m.ensure_valid(kappa_end).map_err(|_| RedStatus::LllFailure);
        }
        m.ensure_valid(kappa_end).map_err(|_| RedStatus::LllFailure)?;

        let mut k = kappa_start.max(kappa_min + 1);
        let mut iters: u64 = 0;
        while k < kappa_end {
            iters += 1;
            if iters > LLL_MAX_ITERS {
                return Err(RedStatus::LllFailure);
            }
            self.size_reduce_row(m, k, kappa_min)?;
            if self.lovasz_holds(m, k)? {
                k += 1;
            } else {
                m.swap_rows(k, k - 1);
                self.n_swaps += 1;
                m.ensure_valid(k + 1).map_err(|_| RedStatus::LllFailure)?;
                k = (k - 1).max(kappa_min + 1);
            }
        }
        m.ensure_valid(kappa_end).map_err(|_| RedStatus::LllFailure)
    }

    /// LLL over `[kappa_start, kappa_end)` where the rows carry exactly one
    /// linear dependency. The dependent direction is reduced to a zero row,
    /// moved to the end of the basis and removed; the sweep then finishes on
    /// the shrunk range.
    ///
    /// Fails with `LllFailure` if no zero row emerges within the iteration
    /// budget.
    pub fn lll_removal(
        &mut self,
        m: &mut MatGso,
        kappa_min: usize,
        kappa_start: usize,
        kappa_end: usize,
    ) -> Result<(), RedStatus> {
        self.n_swaps = 0;
        let mut end = kappa_end;
        m.ensure_valid(end).map_err(|_| RedStatus::LllFailure)?;

        let mut removed = false;
        let mut k = kappa_start.max(kappa_min + 1);
        let mut iters: u64 = 0;
        // The inserted row may itself be the dependency.
        if m.is_zero_row(kappa_min) {
            m.move_row(kappa_min, m.d() - 1);
            m.remove_last_row();
            m.ensure_valid(end - 1).map_err(|_| RedStatus::LllFailure)?;
            end -= 1;
            removed = true;
        }
        while k < end {
            iters += 1;
            if iters > LLL_MAX_ITERS {
                return Err(RedStatus::LllFailure);
            }
            self.size_reduce_row(m, k, kappa_min)?;
            if !removed && m.is_zero_row(k) {
                m.move_row(k, m.d() - 1);
                m.remove_last_row();
                m.ensure_valid(end - 1).map_err(|_| RedStatus::LllFailure)?;
                end -= 1;
                removed = true;
                k = k.max(kappa_min + 1);
                continue;
            }
            if self.lovasz_holds(m, k)? {
                k += 1;
            } else {
                m.swap_rows(k, k - 1);
                self.n_swaps += 1;
                m.ensure_valid(k + 1).map_err(|_| RedStatus::LllFailure)?;
                k = (k - 1).max(kappa_min + 1);
            }
        }
        if removed {
            Ok(())
        } else {
            Err(RedStatus::LllFailure)
        }
    }

    /// Make |μ[k][j]| ≤ eta for all j in `[kappa_min, k)`. Repeats until no
    /// coefficient rounds to a nonzero integer, recomputing the GSO row after
    /// each pass.
    fn size_reduce_row(
        &mut self,
        m: &mut MatGso,
        k: usize,
        kappa_min: usize,
    ) -> Result<(), RedStatus> {
        let mut passes: u32 = 0;
        loop {
            m.ensure_valid(k + 1).map_err(|_| RedStatus::LllFailure)?;
            passes += 1;
            if passes > 64 {
                return Err(RedStatus::LllFailure);
            }
            let mut any = false;
            for j in (kappa_min..k).rev() {
                let mu = m.get_mu(k, j);
                if !mu.is_finite() {
                    return Err(RedStatus::LllFailure);
                }
                if mu.abs() > self.eta {
                    if mu.abs() >= i64::MAX as f64 {
                        return Err(RedStatus::LllFailure);
                    }
                    let q = mu.round() as i64;
                    m.row_addmul(k, j, -q).map_err(|_| RedStatus::LllFailure)?;
                    m.ensure_valid(k + 1).map_err(|_| RedStatus::LllFailure)?;
                    any = true;
                }
            }
            if !any {
                return Ok(());
            }
        }
    }

    /// Lovász condition at k: r[k] ≥ (δ − μ[k][k-1]²)·r[k-1]. A zero row at
    /// k-1 counts as satisfied (nothing to compare against).
    fn lovasz_holds(&self, m: &MatGso, k: usize) -> Result<bool, RedStatus> {
        let r_prev = m.get_r(k - 1);
        let r_k = m.get_r(k);
        if !r_prev.is_finite() || !r_k.is_finite() {
            return Err(RedStatus::LllFailure);
        }
        if r_prev <= 0.0 {
            return Ok(true);
        }
        let mu = m.get_mu(k, k - 1);
        Ok(r_k >= (self.delta - mu * mu) * r_prev)
    }
}
