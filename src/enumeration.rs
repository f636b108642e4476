//! Pruned enumeration over a projected block
//!
//! Schnorr-Euchner depth-first search for the shortest vector of a projected
//! sublattice, given the block-local μ coefficients and squared norms r.
//! Candidates at each level are visited center-outward, partial squared norms
//! are bounded per depth by the pruning coefficients, and the search is
//! capped by a node budget (the best solution found so far is returned when
//! the cap hits).
//!
//! The dual mode searches the dual of the projected block. Writing the block
//! GSO as B = L·D^{1/2}·Q with L the unit lower triangular μ matrix, the
//! reversed dual basis has μ' = J·L^{-T}·J and r'[i] = 1/r[β-1-i], so the
//! same primal search runs on the transformed data and the coefficients are
//! un-reversed afterwards.

use crate::error::RedStatus;
use crate::gso::MatGso;

/// Result of one enumeration call.
#[derive(Debug, Clone)]
pub struct EnumOutcome {
    /// Coefficients and squared norm of the best vector strictly inside the
    /// radius, if any.
    pub solution: Option<(Vec<i64>, f64)>,
    /// Nodes visited in the search tree.
    pub nodes: u64,
}

/// Enumerate the block `[kappa, kappa + block_size)` of `m` for a vector of
/// squared norm strictly below `max_dist`.
///
/// `pruning` holds per-depth bounds as fractions of `max_dist`; missing
/// entries count as 1. Requires the GSO of the block to be fresh.
pub fn enumerate_block(
    m: &MatGso,
    kappa: usize,
    block_size: usize,
    max_dist: f64,
    pruning: &[f64],
    dual: bool,
    max_nodes: u64,
) -> Result<EnumOutcome, RedStatus> {
    let (mu, r) = m.block_mu_r(kappa, block_size);
    if dual {
        let (mu_d, r_d) = dual_block(&mu, &r)?;
        let mut outcome = enumerate(&mu_d, &r_d, max_dist, pruning, max_nodes)?;
        if let Some((coeffs, dist)) = outcome.solution.take() {
            let mut s = vec![0i64; block_size];
            for (i, &y) in coeffs.iter().enumerate() {
                s[block_size - 1 - i] = y;
            }
            outcome.solution = Some((s, dist));
        }
        Ok(outcome)
    } else {
        enumerate(&mu, &r, max_dist, pruning, max_nodes)
    }
}

/// Reversed dual GSO of a block: μ' = J·L^{-T}·J, r'[i] = 1/r[β-1-i].
fn dual_block(mu: &[Vec<f64>], r: &[f64]) -> Result<(Vec<Vec<f64>>, Vec<f64>), RedStatus> {
    let n = r.len();
    if r.iter().any(|&x| !(x > 0.0) || !x.is_finite()) {
        return Err(RedStatus::EnumFailure);
    }
    // invert the unit lower triangular L by forward substitution
    let mut linv = vec![vec![0.0; n]; n];
    for i in 0..n {
        linv[i][i] = 1.0;
        for j in 0..i {
            let mut acc = 0.0;
            for k in j..i {
                acc += mu[i][k] * linv[k][j];
            }
            linv[i][j] = -acc;
        }
    }
    let mut mu_d = Vec::with_capacity(n);
    for i in 0..n {
        let mut row = vec![0.0; i];
        for (j, item) in row.iter_mut().enumerate() {
            *item = linv[n - 1 - j][n - 1 - i];
        }
        if row.iter().any(|x| !x.is_finite()) {
            return Err(RedStatus::EnumFailure);
        }
        mu_d.push(row);
    }
    let r_d: Vec<f64> = (0..n).map(|i| 1.0 / r[n - 1 - i]).collect();
    Ok((mu_d, r_d))
}

/// Enumerate with explicit block-local data; `mu[i]` has length i.
pub fn enumerate(
    mu: &[Vec<f64>],
    r: &[f64],
    max_dist: f64,
    pruning: &[f64],
    max_nodes: u64,
) -> Result<EnumOutcome, RedStatus> {
    let n = r.len();
    if n == 0 || !(max_dist > 0.0) {
        return Ok(EnumOutcome {
            solution: None,
            nodes: 0,
        });
    }
    if r.iter().any(|&x| !x.is_finite() || x <= 0.0) {
        return Err(RedStatus::EnumFailure);
    }
    // bound on the partial squared norm once depth t+1 coordinates are fixed
    let bounds: Vec<f64> = (0..n)
        .map(|t| pruning.get(t).copied().unwrap_or(1.0) * max_dist)
        .collect();

    let mut search = Search {
        mu,
        r,
        bounds: &bounds,
        coeffs: vec![0i64; n],
        nodes: 0,
        max_nodes,
        best: None,
    };
    search.descend(n - 1, 0.0)?;
    Ok(EnumOutcome {
        solution: search.best,
        nodes: search.nodes,
    })
}

struct Search<'a> {
    mu: &'a [Vec<f64>],
    r: &'a [f64],
    bounds: &'a [f64],
    coeffs: Vec<i64>,
    nodes: u64,
    max_nodes: u64,
    best: Option<(Vec<i64>, f64)>,
}

impl Search<'_> {
    /// Explore level k with `partial` squared norm contributed by the levels
    /// above. Levels run from n-1 (outermost) down to 0.
    fn descend(&mut self, k: usize, partial: f64) -> Result<(), RedStatus> {
        let n = self.coeffs.len();
        self.nodes += 1;
        if self.nodes >= self.max_nodes {
            return Ok(());
        }
        let mut center = 0.0;
        for j in (k + 1)..n {
            center -= self.mu[j][k] * self.coeffs[j] as f64;
        }
        if !center.is_finite() {
            return Err(RedStatus::EnumFailure);
        }
        let depth = n - k;
        let allowed = self.bounds[depth - 1];
        let x_center = center.round() as i64;

        // center-outward: 0, +1, -1, +2, -2, ...
        let mut offset: i64 = 0;
        loop {
            if self.nodes >= self.max_nodes {
                return Ok(());
            }
            let mut candidates_left = false;
            for &x in &[x_center + offset, x_center - offset] {
                // by symmetry only nonnegative leading coefficients
                if k == n - 1 && x < 0 {
                    continue;
                }
                let dist = x as f64 - center;
                let contrib = dist * dist * self.r[k];
                if partial + contrib >= allowed {
                    continue;
                }
                candidates_left = true;
                self.coeffs[k] = x;
                if k == 0 {
                    self.visit_leaf(partial + contrib);
                } else {
                    self.descend(k - 1, partial + contrib)?;
                }
                if offset == 0 {
                    break;
                }
            }
            if !candidates_left && offset > 0 {
                return Ok(());
            }
            offset += 1;
        }
    }

    fn visit_leaf(&mut self, dist: f64) {
        if self.coeffs.iter().all(|&c| c == 0) {
            return;
        }
        match &self.best {
            Some((_, best_dist)) if dist >= *best_dist => {}
            _ => self.best = Some((self.coeffs.clone(), dist)),
        }
    }
}
