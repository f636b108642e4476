//! Block reduction engine
//!
//! Implements BKZ, the self-dual variant (SD-BKZ) and slide reduction, with
//! full HKZ as the special case of a block spanning the whole basis. The
//! engine assumes the input basis is LLL reduced and strengthens it by
//! sweeping SVP (or dual SVP) reductions over blocks: each block is
//! preprocessed with LLL and recursive tours at smaller block sizes,
//! searched by pruned enumeration with rerandomized retries, and improved
//! vectors are inserted back without creating linear dependencies.
//!
//! The driver loops tours until a tour leaves the basis unchanged, a budget
//! runs out, or the auto-abort heuristic reports that the basis shape has
//! stopped improving. Numeric faults raised inside a tour are caught at the
//! `_ex` wrappers and recorded as a status code.
//!
//! # References
//!
//! - Schnorr, Euchner (1994): "Lattice Basis Reduction"
//! - Chen, Nguyen (2011): "BKZ 2.0: Better Lattice Security Estimates"
//! - Micciancio, Walter (2016): "Practical, Predictable Lattice Basis
//!   Reduction" (SD-BKZ and slide reduction)

use std::f64::consts::{E, PI};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::enumeration::enumerate_block;
use crate::error::RedStatus;
use crate::gso::{IntMatrix, MatGso};
use crate::lll::{LllReducer, LLL_DEF_DELTA, LLL_DEF_ETA};
use crate::params::{BkzFlags, BkzParam, FloatType};

/// Tolerance on the slide potential decrease, relative to the potential's
/// magnitude. A tour whose potential drops by less than this is clean.
pub const SLD_POTENTIAL_TOL: f64 = 1e-12;

/// Node budget per enumeration call; the best vector found inside the budget
/// is returned.
const ENUM_NODE_LIMIT: u64 = 1 << 18;

/// Hard cap on rerandomized enumeration retries per block.
const MAX_RERANDOMIZATION_TRIALS: usize = 10;

/// Cap on the inner primal rounds of one slide tour.
const MAX_SLIDE_ROUNDS: usize = 1000;

/// Gaussian heuristic constant for block size β, about sqrt(β/(2πe)).
fn c_beta(beta: usize) -> f64 {
    (beta as f64 / (2.0 * PI * E)).sqrt()
}

/// Gaussian heuristic estimate of the squared shortest vector length of a
/// lattice with orthogonalized squared norms `r`.
pub fn gaussian_heuristic_sq(r: &[f64]) -> f64 {
    let beta = r.len() as f64;
    let log_det: f64 = r.iter().map(|&x| x.max(f64::MIN_POSITIVE).ln()).sum();
    let c = c_beta(r.len());
    c * c * (log_det / beta).exp()
}

/// Least-squares slope of (i, ln r[i]) over rows `[start_row, stop_row)`.
pub fn current_slope(m: &MatGso, start_row: usize, stop_row: usize) -> f64 {
    let n = stop_row - start_row;
    if n < 2 {
        return 0.0;
    }
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut sum_xx = 0.0;
    let mut sum_xy = 0.0;
    for i in 0..n {
        let x = i as f64;
        let y = m.get_r(start_row + i).max(f64::MIN_POSITIVE).ln();
        sum_x += x;
        sum_y += y;
        sum_xx += x * x;
        sum_xy += x * y;
    }
    let nf = n as f64;
    (nf * sum_xy - sum_x * sum_y) / (nf * sum_xx - sum_x * sum_x)
}

/// Heuristic termination check for block reduction.
///
/// Tracks the slope of the log basis shape across tours and reports
/// convergence once the slope has failed to decrease for a number of
/// consecutive calls.
#[derive(Debug, Clone)]
pub struct BkzAutoAbort {
    old_slope: f64,
    no_dec: i64,
    num_rows: usize,
    start_row: usize,
}

impl BkzAutoAbort {
    pub fn new(num_rows: usize, start_row: usize) -> Self {
        Self {
            old_slope: f64::INFINITY,
            no_dec: -1,
            num_rows,
            start_row,
        }
    }

    /// Compute the current slope and compare it against the best slope seen,
    /// slackened by `scale`. Returns true once the slope has not improved
    /// for `max_no_dec` consecutive calls. The first call records the slope
    /// and returns false.
    pub fn test_abort(&mut self, m: &MatGso, scale: f64, max_no_dec: usize) -> bool {
        let new_slope = current_slope(m, self.start_row, self.start_row + self.num_rows);
        if self.no_dec == -1 || new_slope < scale * self.old_slope {
            self.no_dec = 0;
            self.old_slope = new_slope;
        } else {
            self.no_dec += 1;
        }
        self.no_dec >= max_no_dec as i64
    }
}

/// The block reduction engine.
///
/// Borrows the basis state and the LLL reducer for its lifetime; all basis
/// mutation is routed through them. Single-threaded by contract: the engine
/// is the only mutator of the basis while it lives.
pub struct BkzReduction<'a> {
    m: &'a mut MatGso,
    lll: &'a mut LllReducer,
    param: &'a BkzParam,
    /// Status of the reduction, updated by the driver and the `_ex` wrappers.
    pub status: RedStatus,
    /// Nodes visited during enumeration, accumulated across all blocks.
    pub nodes: u64,
    delta: f64,
    algorithm: &'static str,
    sld_potential: f64,
    rng: StdRng,
    cputime_start: Instant,
}

impl<'a> BkzReduction<'a> {
    pub fn new(m: &'a mut MatGso, lll: &'a mut LllReducer, param: &'a BkzParam) -> Self {
        let delta = param.delta;
        Self {
            m,
            lll,
            param,
            status: RedStatus::Success,
            nodes: 0,
            delta,
            algorithm: "BKZ",
            sld_potential: f64::INFINITY,
            rng: StdRng::from_entropy(),
            cputime_start: Instant::now(),
        }
    }

    fn set_status(&mut self, status: RedStatus) -> bool {
        self.status = status;
        status == RedStatus::Success
    }

    /// Randomize rows between `min_row` and `max_row` (exclusive):
    /// permute rows `[min_row + 1, max_row)`, apply a random unit lower
    /// triangular transformation with entries in {-1, 0, 1}, then LLL the
    /// range. Row `min_row` survives as the leading candidate.
    pub fn rerandomize_block(
        &mut self,
        min_row: usize,
        max_row: usize,
        density: usize,
    ) -> Result<(), RedStatus> {
        if max_row <= min_row + 1 {
            return Ok(());
        }
        for i in ((min_row + 2)..max_row).rev() {
            let j = self.rng.gen_range(min_row + 1..=i);
            if j != i {
                self.m.swap_rows(i, j);
            }
        }
        for i in (min_row + 1)..max_row {
            let mut idx: Vec<usize> = (min_row..i).collect();
            let picks = density.min(idx.len());
            for t in 0..picks {
                let p = self.rng.gen_range(t..idx.len());
                idx.swap(t, p);
                let sign = if self.rng.gen::<bool>() { 1 } else { -1 };
                self.m
                    .row_addmul(i, idx[t], sign)
                    .map_err(|_| RedStatus::BkzFailure)?;
            }
        }
        self.lll.lll(self.m, min_row, min_row, max_row)?;
        Ok(())
    }

    /// Preprocess a block with recursive tours at the strategy's smaller
    /// block sizes. Returns false if any inner tour changed the basis.
    pub fn svp_preprocessing(
        &mut self,
        kappa: usize,
        block_size: usize,
        param: &BkzParam,
    ) -> Result<bool, RedStatus> {
        let mut clean = true;
        let strategy = param.strategy(block_size);
        for &pre in &strategy.preprocessing_block_sizes {
            if pre < 3 || pre >= block_size {
                continue;
            }
            let prepar = param.preprocessing_param(pre);
            let mut dummy_kappa_max = 0;
            if !self.tour(0, &mut dummy_kappa_max, &prepar, kappa, kappa + block_size)? {
                clean = false;
            }
        }
        Ok(clean)
    }

    /// r[kappa] (primal) or 1/r[kappa + block_size - 1] (dual), the squared
    /// norm the block's (dual) SVP has to beat.
    fn block_metric(
        &mut self,
        kappa: usize,
        block_size: usize,
        dual: bool,
    ) -> Result<f64, RedStatus> {
        self.m
            .ensure_valid(kappa + block_size)
            .map_err(|_| RedStatus::BkzFailure)?;
        let r = if dual {
            let r_last = self.m.get_r(kappa + block_size - 1);
            if !(r_last > 0.0) || !r_last.is_finite() {
                return Err(RedStatus::EnumFailure);
            }
            1.0 / r_last
        } else {
            self.m.get_r(kappa)
        };
        if !(r > 0.0) || !r.is_finite() {
            return Err(RedStatus::EnumFailure);
        }
        Ok(r)
    }

    fn block_gh(&self, kappa: usize, block_size: usize, dual: bool) -> f64 {
        let mut rs: Vec<f64> = (kappa..kappa + block_size)
            .map(|i| self.m.get_r(i))
            .collect();
        if dual {
            for x in rs.iter_mut() {
                *x = 1.0 / *x;
            }
            rs.reverse();
        }
        gaussian_heuristic_sq(&rs)
    }

    /// (Dual) SVP-reduce one block.
    ///
    /// Preprocess, enumerate with rerandomized retries following the pruning
    /// table's success probabilities, insert the solution. Returns true iff
    /// the block was left unchanged beyond the δ tolerance.
    pub fn svp_reduction(
        &mut self,
        kappa: usize,
        block_size: usize,
        param: &BkzParam,
        dual: bool,
    ) -> Result<bool, RedStatus> {
        debug_assert!(block_size >= 2);
        let mut clean = true;

        let lll_start = if param.flags.contains(BkzFlags::BOUNDED_LLL) {
            kappa
        } else {
            0
        };
        self.lll.lll(self.m, lll_start, kappa, kappa + block_size)?;
        if self.lll.n_swaps > 0 {
            clean = false;
        }

        let strategy = param.strategy(block_size);
        let mut old_metric: Option<f64> = None;
        let mut remaining_probability = 1.0f64;
        let mut trial = 0usize;
        loop {
            if trial > 0 {
                self.rerandomize_block(kappa, kappa + block_size, param.rerandomization_density)?;
            }
            if !self.svp_preprocessing(kappa, block_size, param)? {
                clean = false;
            }

            let metric = self.block_metric(kappa, block_size, dual)?;
            if old_metric.is_none() {
                old_metric = Some(metric);
            }
            let mut max_dist = metric;
            if param.flags.contains(BkzFlags::GH_BND) {
                let gh = self.block_gh(kappa, block_size, dual);
                max_dist = max_dist.min(param.gh_factor * gh);
            }

            let pruning = strategy.get_pruning(trial, block_size);
            let outcome = enumerate_block(
                self.m,
                kappa,
                block_size,
                max_dist,
                &pruning.coefficients,
                dual,
                ENUM_NODE_LIMIT,
            )?;
            self.nodes += outcome.nodes;
            if let Some((solution, _)) = outcome.solution {
                self.svp_postprocessing(kappa, block_size, &solution, dual)?;
                break;
            }
            remaining_probability *= 1.0 - pruning.probability;
            trial += 1;
            if remaining_probability <= 1.0 - param.min_success_probability
                || trial >= MAX_RERANDOMIZATION_TRIALS
            {
                break;
            }
        }

        let new_metric = self.block_metric(kappa, block_size, dual)?;
        if let Some(old) = old_metric {
            if new_metric < self.delta * old {
                clean = false;
            }
        }
        Ok(clean)
    }

    /// Same as [`Self::svp_reduction`] but catches faults: the clean flag is
    /// cleared through `clean`, a fault sets the status and returns false.
    pub fn svp_reduction_ex(
        &mut self,
        kappa: usize,
        block_size: usize,
        param: &BkzParam,
        clean: &mut bool,
        dual: bool,
    ) -> bool {
        match self.svp_reduction(kappa, block_size, param, dual) {
            Ok(c) => {
                *clean &= c;
                true
            }
            Err(e) => self.set_status(e),
        }
    }

    /// Insert an enumeration solution into the basis (or its dual) without
    /// creating linear dependencies.
    ///
    /// Primal: if the last nonzero coefficient is ±1 the combination
    /// replaces that row and moves to the front of the block; otherwise the
    /// combination is prepended and LLL eliminates the resulting dependency.
    /// Dual: mirrored, the inserted vector becomes the last dual vector.
    pub fn svp_postprocessing(
        &mut self,
        kappa: usize,
        block_size: usize,
        solution: &[i64],
        dual: bool,
    ) -> Result<(), RedStatus> {
        debug_assert_eq!(solution.len(), block_size);
        if dual {
            return self.dsvp_postprocessing(kappa, block_size, solution);
        }
        let k = match solution.iter().rposition(|&s| s != 0) {
            Some(k) => k,
            None => return Ok(()),
        };
        if k == 0 {
            // the block's first vector itself
            return Ok(());
        }
        let sk = solution[k];
        if sk.abs() == 1 {
            for j in 0..k {
                if solution[j] != 0 {
                    self.m
                        .row_addmul(kappa + k, kappa + j, sk * solution[j])
                        .map_err(|_| RedStatus::BkzFailure)?;
                }
            }
            self.m.move_row(kappa + k, kappa);
            Ok(())
        } else {
            self.svp_postprocessing_generic(kappa, block_size, solution)
        }
    }

    /// General primal insertion: prepend the combination, giving β + 1
    /// dependent vectors on the extended range, and let LLL produce and
    /// remove the one zero row.
    fn svp_postprocessing_generic(
        &mut self,
        kappa: usize,
        block_size: usize,
        solution: &[i64],
    ) -> Result<(), RedStatus> {
        let d = self.m.d();
        self.m.create_row();
        for (j, &s) in solution.iter().enumerate() {
            if s != 0 {
                self.m
                    .row_addmul(d, kappa + j, s)
                    .map_err(|_| RedStatus::BkzFailure)?;
            }
        }
        self.m.move_row(d, kappa);
        self.m.babai(kappa, kappa)?;
        self.lll
            .lll_removal(self.m, kappa, kappa, kappa + block_size + 1)?;
        Ok(())
    }

    /// Dual insertion. With s the dual coefficients, any unimodular P with
    /// P·s = ±e_last makes the found vector the last dual vector of the
    /// block; rows κ..κ+β-2 are adjusted, the moved row closes the
    /// determinant.
    fn dsvp_postprocessing(
        &mut self,
        kappa: usize,
        block_size: usize,
        solution: &[i64],
    ) -> Result<(), RedStatus> {
        let k = match solution.iter().position(|&s| s != 0) {
            Some(k) => k,
            None => return Ok(()),
        };
        if k == block_size - 1 {
            // the block's last dual vector itself
            return Ok(());
        }
        let sk = solution[k];
        if sk.abs() == 1 && solution[..k].iter().all(|&s| s == 0) {
            for i in (k + 1)..block_size {
                if solution[i] != 0 {
                    self.m
                        .row_addmul(kappa + i, kappa + k, -(solution[i] * sk))
                        .map_err(|_| RedStatus::BkzFailure)?;
                }
            }
            self.m.move_row(kappa + k, kappa + block_size - 1);
            Ok(())
        } else {
            self.dsvp_postprocessing_generic(kappa, block_size, solution)
        }
    }

    /// General dual insertion: a Euclidean staircase of row operations
    /// (b_i += c·b_j mirrors s_i += c·s_j) reduces the coefficient vector to
    /// a signed unit, then the unit path applies.
    fn dsvp_postprocessing_generic(
        &mut self,
        kappa: usize,
        block_size: usize,
        solution: &[i64],
    ) -> Result<(), RedStatus> {
        let mut s = solution.to_vec();
        let g = s.iter().fold(0i64, |acc, &x| gcd(acc, x.abs()));
        if g != 1 {
            // a shortest dual vector is primitive; do not touch the basis
            log::warn!("non-primitive dual solution (gcd {}), insertion skipped", g);
            return Ok(());
        }
        let mut iters = 0u32;
        loop {
            let mut imax: Option<usize> = None;
            let mut jmin: Option<usize> = None;
            let mut nonzero = 0usize;
            for (idx, &v) in s.iter().enumerate() {
                if v == 0 {
                    continue;
                }
                nonzero += 1;
                if imax.map_or(true, |cur| v.abs() > s[cur].abs()) {
                    imax = Some(idx);
                }
            }
            let i = imax.unwrap();
            if nonzero == 1 {
                debug_assert_eq!(s[i].abs(), 1);
                self.m.move_row(kappa + i, kappa + block_size - 1);
                return Ok(());
            }
            for (idx, &v) in s.iter().enumerate() {
                if v == 0 || idx == i {
                    continue;
                }
                if jmin.map_or(true, |cur| v.abs() < s[cur].abs()) {
                    jmin = Some(idx);
                }
            }
            let j = jmin.unwrap();
            let q = (s[i] as f64 / s[j] as f64).round() as i64;
            s[i] -= q * s[j];
            self.m
                .row_addmul(kappa + i, kappa + j, -q)
                .map_err(|_| RedStatus::BkzFailure)?;
            iters += 1;
            if iters > 10_000 {
                return Err(RedStatus::EnumFailure);
            }
        }
    }

    /// One primal BKZ tour over `[min_row, max_row)`, with an LLL sweep
    /// restoring the prefix after every block that changed.
    pub fn tour(
        &mut self,
        loop_idx: usize,
        kappa_max: &mut usize,
        param: &BkzParam,
        min_row: usize,
        max_row: usize,
    ) -> Result<bool, RedStatus> {
        if max_row - min_row < 2 {
            return Ok(true);
        }
        log::debug!("tour {} over rows [{}, {})", loop_idx, min_row, max_row);
        let mut clean = true;
        for kappa in min_row..(max_row - 1) {
            let block_size = param.block_size.min(max_row - kappa);
            let block_clean = self.svp_reduction(kappa, block_size, param, false)?;
            if !block_clean {
                clean = false;
                self.lll.lll(self.m, 0, kappa, kappa + block_size)?;
            } else if clean {
                *kappa_max = kappa;
            }
        }
        Ok(clean)
    }

    pub fn tour_ex(
        &mut self,
        loop_idx: usize,
        kappa_max: &mut usize,
        param: &BkzParam,
        min_row: usize,
        max_row: usize,
        clean: &mut bool,
    ) -> bool {
        match self.tour(loop_idx, kappa_max, param, min_row, max_row) {
            Ok(c) => {
                *clean &= c;
                true
            }
            Err(e) => self.set_status(e),
        }
    }

    /// One SD-BKZ tour: a dual tour from the back, then a primal tour.
    pub fn sd_tour(
        &mut self,
        loop_idx: usize,
        param: &BkzParam,
        min_row: usize,
        max_row: usize,
    ) -> Result<bool, RedStatus> {
        log::debug!("sd tour {} over rows [{}, {})", loop_idx, min_row, max_row);
        let mut clean = true;
        for kappa in (min_row..max_row).rev() {
            let start = if kappa + 1 >= min_row + param.block_size {
                kappa + 1 - param.block_size
            } else {
                min_row
            };
            let block_size = kappa + 1 - start;
            if block_size < 2 {
                continue;
            }
            if !self.svp_reduction(start, block_size, param, true)? {
                clean = false;
            }
        }
        let mut kappa_max = 0;
        if !self.tour(loop_idx, &mut kappa_max, param, min_row, max_row)? {
            clean = false;
        }
        Ok(clean)
    }

    pub fn sd_tour_ex(
        &mut self,
        loop_idx: usize,
        param: &BkzParam,
        min_row: usize,
        max_row: usize,
        clean: &mut bool,
    ) -> bool {
        match self.sd_tour(loop_idx, param, min_row, max_row) {
            Ok(c) => {
                *clean &= c;
                true
            }
            Err(e) => self.set_status(e),
        }
    }

    /// HKZ-reduce `[min_row, max_row)`: one SVP reduction per starting
    /// position, each spanning the rest of the range.
    pub fn hkz(
        &mut self,
        kappa_max: &mut usize,
        param: &BkzParam,
        min_row: usize,
        max_row: usize,
    ) -> Result<bool, RedStatus> {
        let mut clean = true;
        for kappa in min_row..max_row.saturating_sub(1) {
            let block_size = max_row - kappa;
            if !self.svp_reduction(kappa, block_size, param, false)? {
                clean = false;
            } else if clean {
                *kappa_max = kappa;
            }
        }
        Ok(clean)
    }

    pub fn hkz_ex(
        &mut self,
        kappa_max: &mut usize,
        param: &BkzParam,
        min_row: usize,
        max_row: usize,
        clean: &mut bool,
    ) -> bool {
        match self.hkz(kappa_max, param, min_row, max_row) {
            Ok(c) => {
                *clean &= c;
                true
            }
            Err(e) => self.set_status(e),
        }
    }

    /// Truncated tour: disjoint full-size primal blocks at offsets
    /// `min_row + i·β`, never shrinking the window, with an LLL pass after
    /// each block that changed.
    fn trunc_tour(
        &mut self,
        kappa_max: &mut usize,
        param: &BkzParam,
        min_row: usize,
        max_row: usize,
    ) -> Result<bool, RedStatus> {
        let beta = param.block_size;
        let mut clean = true;
        let mut kappa = min_row;
        while kappa + beta <= max_row {
            let block_clean = self.svp_reduction(kappa, beta, param, false)?;
            if !block_clean {
                clean = false;
                self.lll.lll(self.m, 0, kappa, kappa + beta)?;
            } else if clean {
                *kappa_max = kappa;
            }
            kappa += beta;
        }
        Ok(clean)
    }

    /// Truncated dual tour: disjoint full-size dual blocks shifted by one,
    /// at offsets `min_row + 1 + i·β`.
    fn trunc_dtour(
        &mut self,
        param: &BkzParam,
        min_row: usize,
        max_row: usize,
    ) -> Result<bool, RedStatus> {
        let beta = param.block_size;
        let mut clean = true;
        let mut kappa = min_row + 1;
        while kappa + beta <= max_row {
            if !self.svp_reduction(kappa, beta, param, true)? {
                clean = false;
            }
            kappa += beta;
        }
        Ok(clean)
    }

    /// One slide reduction tour: primal sweeps over the disjoint block
    /// partition until they stabilize, then dual sweeps over the partition
    /// shifted by one. Clean iff the slide potential dropped by less than
    /// the tolerance.
    ///
    /// The range length must be divisible by the block size; this is
    /// checked before any basis mutation.
    pub fn slide_tour(
        &mut self,
        loop_idx: usize,
        param: &BkzParam,
        min_row: usize,
        max_row: usize,
    ) -> Result<bool, RedStatus> {
        let beta = param.block_size;
        if beta < 2 || (max_row - min_row) % beta != 0 {
            return Err(RedStatus::ParamFailure);
        }
        log::debug!(
            "slide tour {} over rows [{}, {})",
            loop_idx,
            min_row,
            max_row
        );
        let mut rounds = 0;
        loop {
            self.lll.lll(self.m, 0, min_row, max_row)?;
            let mut kappa_max = 0;
            if self.trunc_tour(&mut kappa_max, param, min_row, max_row)? {
                break;
            }
            rounds += 1;
            if rounds >= MAX_SLIDE_ROUNDS {
                return Err(RedStatus::BkzFailure);
            }
        }
        self.trunc_dtour(param, min_row, max_row)?;

        let new_potential = self.compute_sld_potential(param, min_row, max_row)?;
        let tol = SLD_POTENTIAL_TOL * new_potential.abs().max(1.0);
        let clean = self.sld_potential - new_potential < tol;
        self.sld_potential = new_potential;
        Ok(clean)
    }

    pub fn slide_tour_ex(
        &mut self,
        loop_idx: usize,
        param: &BkzParam,
        min_row: usize,
        max_row: usize,
        clean: &mut bool,
    ) -> bool {
        match self.slide_tour(loop_idx, param, min_row, max_row) {
            Ok(c) => {
                *clean &= c;
                true
            }
            Err(e) => self.set_status(e),
        }
    }

    /// Slide potential Σ (n - k) · ln r[k] over the block boundaries.
    fn compute_sld_potential(
        &mut self,
        param: &BkzParam,
        min_row: usize,
        max_row: usize,
    ) -> Result<f64, RedStatus> {
        self.m
            .ensure_valid(max_row)
            .map_err(|_| RedStatus::BkzFailure)?;
        let mut pot = 0.0;
        let mut k = min_row;
        while k < max_row {
            let r = self.m.get_r(k);
            if !(r > 0.0) || !r.is_finite() {
                return Err(RedStatus::BkzFailure);
            }
            pot += (max_row - k) as f64 * r.ln();
            k += param.block_size;
        }
        Ok(pot)
    }

    /// Main loop: run the tour variant selected by the flags until a tour is
    /// clean, a budget runs out, or auto-abort fires. Budgets are checked at
    /// tour boundaries only. Finishes with one LLL pass over the whole
    /// basis.
    pub fn bkz(&mut self) -> bool {
        let param = self.param;
        let flags = param.flags;
        let d = self.m.d();
        self.algorithm = if flags.contains(BkzFlags::SLD_RED) {
            "SLD"
        } else if flags.contains(BkzFlags::SD_VARIANT) {
            "SD-BKZ"
        } else {
            "BKZ"
        };
        self.status = RedStatus::Success;
        self.nodes = 0;
        self.cputime_start = Instant::now();

        if param.block_size < 2 || d < 2 {
            return self.set_status(RedStatus::Success);
        }
        if flags.contains(BkzFlags::SLD_RED) && d % param.block_size != 0 {
            return self.set_status(RedStatus::ParamFailure);
        }
        if flags.contains(BkzFlags::VERBOSE) {
            self.print_params();
        }

        if let Err(e) = self.lll.lll(self.m, 0, 0, d) {
            return self.set_status(e);
        }
        if flags.contains(BkzFlags::DUMP_GSO) {
            self.dump_tour_gso("Input", false);
        }
        if flags.contains(BkzFlags::SLD_RED) {
            self.sld_potential = match self.compute_sld_potential(param, 0, d) {
                Ok(p) => p,
                Err(e) => return self.set_status(e),
            };
        }

        let mut auto_abort = BkzAutoAbort::new(d, 0);
        let mut kappa_max = 0;
        let mut i_loop = 0;
        let final_status = loop {
            if param.max_loops > 0 && i_loop >= param.max_loops {
                break RedStatus::BkzLoopsLimit;
            }
            if param.max_time > 0.0
                && self.cputime_start.elapsed().as_secs_f64() > param.max_time
            {
                break RedStatus::BkzTimeLimit;
            }
            if flags.contains(BkzFlags::AUTO_ABORT) && i_loop > 0 {
                if self.m.update_gso().is_err() {
                    break RedStatus::BkzFailure;
                }
                if auto_abort.test_abort(
                    self.m,
                    param.auto_abort_scale,
                    param.auto_abort_max_no_dec,
                ) {
                    break RedStatus::Success;
                }
            }

            let mut clean = true;
            let ok = if flags.contains(BkzFlags::SLD_RED) {
                self.slide_tour_ex(i_loop, param, 0, d, &mut clean)
            } else if flags.contains(BkzFlags::SD_VARIANT) {
                self.sd_tour_ex(i_loop, param, 0, d, &mut clean)
            } else {
                self.tour_ex(i_loop, &mut kappa_max, param, 0, d, &mut clean)
            };
            if !ok {
                break self.status;
            }
            if flags.contains(BkzFlags::VERBOSE) {
                self.print_tour(i_loop, 0, d);
            }
            if clean {
                break RedStatus::Success;
            }
            i_loop += 1;
            if flags.contains(BkzFlags::DUMP_GSO) {
                self.dump_tour_gso(&format!("loop {}", i_loop), true);
            }
        };
        self.status = final_status;

        if let Err(e) = self.lll.lll(self.m, 0, 0, d) {
            if self.status == RedStatus::Success {
                self.status = e;
            }
        }
        self.status == RedStatus::Success
    }

    /// Write one line `"<prefix> <r[0]> ... <r[d-1]>"` with the current
    /// basis shape.
    pub fn dump_gso(&mut self, filename: &str, prefix: &str, append: bool) -> io::Result<()> {
        if self.m.update_gso().is_err() {
            return Err(io::Error::new(io::ErrorKind::Other, "GSO not computable"));
        }
        let mut opts = OpenOptions::new();
        opts.create(true);
        if append {
            opts.append(true);
        } else {
            opts.write(true).truncate(true);
        }
        let mut file = opts.open(filename)?;
        let mut line = String::from(prefix);
        for i in 0..self.m.d() {
            line.push_str(&format!(" {:.6}", self.m.get_r(i)));
        }
        writeln!(file, "{}", line)
    }

    fn dump_tour_gso(&mut self, tag: &str, append: bool) {
        let filename = match &self.param.dump_gso_filename {
            Some(f) => f.clone(),
            None => {
                log::warn!("DUMP_GSO set without a dump filename");
                return;
            }
        };
        let prefix = match &self.param.dump_gso_prefix {
            Some(p) => format!("{} {}", p, tag),
            None => tag.to_string(),
        };
        if let Err(e) = self.dump_gso(&filename, &prefix, append) {
            log::warn!("GSO dump to {} failed: {}", filename, e);
        }
    }

    fn print_params(&self) {
        let p = self.param;
        log::info!(
            "{}: block_size = {}, flags = {:#06x}, delta = {:.3}, max_loops = {}, \
             max_time = {}, gh_factor = {}, rerandomization density = {}",
            self.algorithm,
            p.block_size,
            p.flags.0,
            p.delta,
            p.max_loops,
            p.max_time,
            p.gh_factor,
            p.rerandomization_density
        );
    }

    fn print_tour(&mut self, loop_idx: usize, min_row: usize, max_row: usize) {
        if self.m.update_gso().is_err() {
            return;
        }
        log::info!(
            "End of {} loop {}: time {:.3}s, r_{} = {:.4e}, slope = {:.6}, enum nodes = {}",
            self.algorithm,
            loop_idx,
            self.cputime_start.elapsed().as_secs_f64(),
            min_row,
            self.m.get_r(min_row),
            current_slope(self.m, min_row, max_row),
            self.nodes
        );
    }
}

fn gcd(a: i64, b: i64) -> i64 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

/// Block-reduce `b` with the given parameter bundle.
///
/// When `u` is supplied it is reset to the identity and every basis row
/// operation is mirrored onto it, so `u * b_in = b_out` with `det(u) = ±1`.
/// `precision` must be positive iff `float_type` is `Mpfr`; it is ignored
/// otherwise (the engine computes in f64).
pub fn bkz_reduction(
    b: &mut IntMatrix,
    u: Option<&mut IntMatrix>,
    param: &BkzParam,
    float_type: FloatType,
    precision: usize,
) -> RedStatus {
    if float_type == FloatType::Mpfr && precision == 0 {
        return RedStatus::ParamFailure;
    }
    if b.is_empty() || b[0].is_empty() || b.iter().any(|row| row.len() != b[0].len()) {
        return RedStatus::ParamFailure;
    }
    let basis = std::mem::take(b);
    let built = if u.is_some() {
        MatGso::with_transform(basis)
    } else {
        MatGso::from_basis(basis)
    };
    let mut m = match built {
        Ok(m) => m,
        Err(e) => return e,
    };
    // block LLL runs with the default δ; param.delta is the svp progress slack
    let mut lll = LllReducer::new(LLL_DEF_DELTA, LLL_DEF_ETA);
    let status = {
        let mut bkz = BkzReduction::new(&mut m, &mut lll, param);
        bkz.bkz();
        bkz.status
    };
    let (basis, trans) = m.into_parts();
    *b = basis;
    if let Some(uref) = u {
        *uref = trans.unwrap_or_default();
    }
    status
}

/// Block-reduce `b` with default strategies for the given block size.
pub fn bkz_reduction_flags(
    b: &mut IntMatrix,
    block_size: usize,
    flags: BkzFlags,
    float_type: FloatType,
    precision: usize,
) -> RedStatus {
    let param = BkzParam::new(block_size, flags);
    bkz_reduction(b, None, &param, float_type, precision)
}

/// HKZ-reduce `b`: block reduction with the block spanning the whole basis.
pub fn hkz_reduction(
    b: &mut IntMatrix,
    flags: BkzFlags,
    float_type: FloatType,
    precision: usize,
) -> RedStatus {
    let block_size = b.len().max(2);
    let param = BkzParam::new(block_size, flags);
    bkz_reduction(b, None, &param, float_type, precision)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prepared(b: IntMatrix) -> MatGso {
        let mut m = MatGso::from_basis(b).unwrap();
        m.update_gso().unwrap();
        m
    }

    #[test]
    fn test_c_beta() {
        // sqrt(2/(2πe)) ≈ 0.342
        assert!((c_beta(2) - 0.342).abs() < 0.01);
        for beta in 2..=40 {
            let c = c_beta(beta);
            assert!(c > 0.0 && c < 2.0, "c_beta({}) = {}", beta, c);
        }
    }

    #[test]
    fn test_current_slope_geometric_decay() {
        // r = 16, 4, 1: ln r drops by ln 4 per row
        let m = prepared(vec![vec![4, 0, 0], vec![0, 2, 0], vec![0, 0, 1]]);
        let slope = current_slope(&m, 0, 3);
        assert!((slope + 4.0f64.ln()).abs() < 1e-9, "slope = {}", slope);
    }

    #[test]
    fn test_auto_abort_counts_non_decreases() {
        let m = prepared(vec![vec![4, 0], vec![0, 1]]);
        let mut abort = BkzAutoAbort::new(2, 0);
        // first call records the slope
        assert!(!abort.test_abort(&m, 1.0, 2));
        // constant slope: two further calls reach max_no_dec = 2
        assert!(!abort.test_abort(&m, 1.0, 2));
        assert!(abort.test_abort(&m, 1.0, 2));
    }

    #[test]
    fn test_gaussian_heuristic_unit_lattice() {
        // Z^beta: gh^2 = c_beta^2
        let r = vec![1.0; 10];
        let gh = gaussian_heuristic_sq(&r);
        let c = c_beta(10);
        assert!((gh - c * c).abs() < 1e-12);
    }

    #[test]
    fn test_primal_postprocessing_unit_head() {
        let mut m = prepared(vec![vec![4, 3], vec![5, 2]]);
        let mut lll = LllReducer::new(0.99, LLL_DEF_ETA);
        let param = BkzParam::new(2, BkzFlags::DEFAULT);
        let mut bkz = BkzReduction::new(&mut m, &mut lll, &param);
        // shortest vector is -b0 + b1 = (1, -1)
        bkz.svp_postprocessing(0, 2, &[-1, 1], false).unwrap();
        assert_eq!(m.basis()[0], vec![1, -1]);
        assert_eq!(m.basis()[1], vec![4, 3]);
    }

    #[test]
    fn test_primal_postprocessing_generic_keeps_rank() {
        let mut m = prepared(vec![vec![7, 0], vec![0, 5]]);
        let mut lll = LllReducer::new(0.99, LLL_DEF_ETA);
        let param = BkzParam::new(2, BkzFlags::DEFAULT);
        let mut bkz = BkzReduction::new(&mut m, &mut lll, &param);
        // no ±1 coefficient: takes the extend-and-remove path
        bkz.svp_postprocessing(0, 2, &[3, 2], false).unwrap();
        assert_eq!(m.d(), 2);
        m.update_gso().unwrap();
        // determinant is preserved up to sign
        let det = (m.get_r(0) * m.get_r(1)).sqrt();
        assert!((det - 35.0).abs() < 1e-6, "det = {}", det);
    }

    #[test]
    fn test_dual_postprocessing_unit_head() {
        let mut m = prepared(vec![vec![2, 0], vec![0, 3]]);
        let mut lll = LllReducer::new(0.99, LLL_DEF_ETA);
        let param = BkzParam::new(2, BkzFlags::DEFAULT);
        let mut bkz = BkzReduction::new(&mut m, &mut lll, &param);
        bkz.svp_postprocessing(0, 2, &[1, 0], true).unwrap();
        // the dual of the old first row is now the last dual vector
        assert_eq!(m.basis()[0], vec![0, 3]);
        assert_eq!(m.basis()[1], vec![2, 0]);
    }

    #[test]
    fn test_rerandomize_preserves_leading_rows() {
        let b = vec![
            vec![10, 0, 0, 0, 0],
            vec![1, 10, 0, 0, 0],
            vec![0, 1, 10, 0, 0],
            vec![1, 0, 1, 10, 0],
            vec![0, 1, 0, 1, 10],
        ];
        let mut m = prepared(b.clone());
        let mut lll = LllReducer::new(0.99, LLL_DEF_ETA);
        let param = BkzParam::new(3, BkzFlags::DEFAULT);
        let mut bkz = BkzReduction::new(&mut m, &mut lll, &param);
        bkz.rerandomize_block(1, 5, 2).unwrap();
        assert_eq!(m.basis()[0], b[0]);
    }

    #[test]
    fn test_bkz_small_dimension_smoke() {
        let mut b = vec![vec![9, 1, 1], vec![1, 8, 2], vec![2, 1, 7]];
        let status = bkz_reduction_flags(&mut b, 3, BkzFlags::DEFAULT, FloatType::Default, 0);
        assert_eq!(status, RedStatus::Success);
        let mut m = MatGso::from_basis(b).unwrap();
        m.update_gso().unwrap();
        // Lovász condition with δ = 0.99 after reduction
        for k in 1..3 {
            let mu = m.get_mu(k, k - 1);
            assert!(m.get_r(k) >= (0.99 - mu * mu) * m.get_r(k - 1) - 1e-6);
        }
    }

    #[test]
    fn test_hkz_sweep_installs_shortest_vectors() {
        let mut m = prepared(vec![vec![5, 0, 0], vec![2, 5, 0], vec![1, 2, 5]]);
        let mut lll = LllReducer::new(0.99, LLL_DEF_ETA);
        let param = BkzParam::new(3, BkzFlags::DEFAULT);
        let mut bkz = BkzReduction::new(&mut m, &mut lll, &param);
        let mut kappa_max = 0;
        // the basis realizes its successive minima already, so the sweep is clean
        let clean = bkz.hkz(&mut kappa_max, &param, 0, 3).unwrap();
        assert!(clean);
        m.update_gso().unwrap();
        assert!((m.get_r(0) - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_block_size_below_two_is_noop() {
        let mut b = vec![vec![3, 1], vec![1, 2]];
        let before = b.clone();
        let status = bkz_reduction_flags(&mut b, 1, BkzFlags::DEFAULT, FloatType::Default, 0);
        assert_eq!(status, RedStatus::Success);
        assert_eq!(b, before);
    }
}
