//! Basis state with Gram-Schmidt data
//!
//! Holds the integer basis rows together with their Gram-Schmidt
//! orthogonalization (μ coefficients and squared norms r) and an optional
//! transformation mirror. All mutation of the basis during block reduction
//! goes through the row operations here, so the μ/r data can be invalidated
//! and recomputed lazily from the lowest touched row.
//!
//! # Numerical stability
//!
//! The orthogonalization uses Modified Gram-Schmidt with one
//! re-orthogonalization pass and compensated (Kahan) dot products, which
//! keeps μ accurate on the ill-conditioned bases block reduction produces
//! mid-tour.
//!
//! # Invariants
//!
//! - Rows `[0, valid)` have μ/r consistent with the current basis; rows at or
//!   after the lowest mutated index are stale until `update_gso` runs.
//! - If a transformation mirror is attached, `u * b_input == b_current` and
//!   `det(u) = ±1` hold after every operation (all ops are unimodular).

use crate::error::RedStatus;

/// Integer basis: one inner vector per row.
pub type IntMatrix = Vec<Vec<i64>>;

/// Basis state: integer rows, optional transformation mirror, μ/r data.
#[derive(Debug, Clone)]
pub struct MatGso {
    b: Vec<Vec<i64>>,
    u: Option<Vec<Vec<i64>>>,
    bstar: Vec<Vec<f64>>,
    mu: Vec<Vec<f64>>,
    r: Vec<f64>,
    valid: usize,
}

impl MatGso {
    /// Create a basis state without a transformation mirror.
    ///
    /// Fails with `ParamFailure` if the basis is empty or ragged.
    pub fn from_basis(b: IntMatrix) -> Result<Self, RedStatus> {
        Self::build(b, false)
    }

    /// Create a basis state that mirrors every row operation onto an
    /// identity-initialized transformation matrix.
    pub fn with_transform(b: IntMatrix) -> Result<Self, RedStatus> {
        Self::build(b, true)
    }

    fn build(b: IntMatrix, with_u: bool) -> Result<Self, RedStatus> {
        if b.is_empty() || b[0].is_empty() {
            return Err(RedStatus::ParamFailure);
        }
        let dim = b[0].len();
        if b.iter().any(|row| row.len() != dim) {
            return Err(RedStatus::ParamFailure);
        }
        let d = b.len();
        let u = if with_u {
            let mut ident = vec![vec![0i64; d]; d];
            for (i, row) in ident.iter_mut().enumerate() {
                row[i] = 1;
            }
            Some(ident)
        } else {
            None
        };
        Ok(Self {
            b,
            u,
            bstar: Vec::new(),
            mu: Vec::new(),
            r: Vec::new(),
            valid: 0,
        })
    }

    /// Number of basis rows.
    pub fn d(&self) -> usize {
        self.b.len()
    }

    /// Ambient dimension (row length).
    pub fn dim(&self) -> usize {
        self.b[0].len()
    }

    pub fn basis(&self) -> &IntMatrix {
        &self.b
    }

    pub fn transform(&self) -> Option<&IntMatrix> {
        self.u.as_ref()
    }

    /// Consume the state, returning the basis and the transformation mirror.
    pub fn into_parts(self) -> (IntMatrix, Option<IntMatrix>) {
        (self.b, self.u)
    }

    /// Squared norm of the i-th orthogonalized row. Requires fresh GSO.
    pub fn get_r(&self, i: usize) -> f64 {
        debug_assert!(i < self.valid, "stale GSO row {}", i);
        self.r[i]
    }

    /// μ[i][j] for j < i. Requires fresh GSO.
    pub fn get_mu(&self, i: usize, j: usize) -> f64 {
        debug_assert!(j < i && i < self.valid);
        self.mu[i][j]
    }

    /// Copy of the block-local μ (unit lower triangular, stored ragged) and r
    /// for rows `[kappa, kappa + block_size)`. The μ/r of the projected
    /// sublattice are exactly the global μ/r restricted to the block.
    pub fn block_mu_r(&self, kappa: usize, block_size: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
        debug_assert!(kappa + block_size <= self.valid);
        let mut mu = Vec::with_capacity(block_size);
        for i in 0..block_size {
            let mut row = vec![0.0; i];
            for (j, item) in row.iter_mut().enumerate() {
                *item = self.mu[kappa + i][kappa + j];
            }
            mu.push(row);
        }
        let r = self.r[kappa..kappa + block_size].to_vec();
        (mu, r)
    }

    pub fn is_zero_row(&self, i: usize) -> bool {
        self.b[i].iter().all(|&x| x == 0)
    }

    fn invalidate_from(&mut self, row: usize) {
        self.valid = self.valid.min(row);
    }

    /// Recompute μ/r for all stale rows.
    ///
    /// Zero rows (r = 0) are tolerated; they appear transiently while a
    /// linear dependency is being eliminated. Non-finite values are a
    /// numeric fault.
    pub fn update_gso(&mut self) -> Result<(), RedStatus> {
        self.ensure_valid(self.b.len())
    }

    /// Recompute μ/r so that rows `[0, upto)` are fresh.
    pub fn ensure_valid(&mut self, upto: usize) -> Result<(), RedStatus> {
        debug_assert!(upto <= self.b.len());
        self.bstar.truncate(self.valid);
        self.mu.truncate(self.valid);
        self.r.truncate(self.valid);
        for i in self.valid..upto {
            let mut v: Vec<f64> = self.b[i].iter().map(|&x| x as f64).collect();
            let mut mu_row = vec![0.0; i];
            // first orthogonalization pass
            for j in 0..i {
                if self.r[j] > 0.0 {
                    let c = kahan_dot(&v, &self.bstar[j]) / self.r[j];
                    axpy(&mut v, &self.bstar[j], -c);
                    mu_row[j] = c;
                }
            }
            // re-orthogonalization pass
            for j in 0..i {
                if self.r[j] > 0.0 {
                    let c = kahan_dot(&v, &self.bstar[j]) / self.r[j];
                    axpy(&mut v, &self.bstar[j], -c);
                    mu_row[j] += c;
                }
            }
            let norm_sq = kahan_dot(&v, &v);
            if !norm_sq.is_finite() || mu_row.iter().any(|m| !m.is_finite()) {
                return Err(RedStatus::BkzFailure);
            }
            self.bstar.push(v);
            self.mu.push(mu_row);
            self.r.push(norm_sq);
            self.valid = i + 1;
        }
        Ok(())
    }

    pub fn swap_rows(&mut self, i: usize, j: usize) {
        if i == j {
            return;
        }
        self.b.swap(i, j);
        if let Some(u) = self.u.as_mut() {
            u.swap(i, j);
        }
        self.invalidate_from(i.min(j));
    }

    /// Remove the row at `from` and reinsert it at `to`, shifting the rows in
    /// between by one.
    pub fn move_row(&mut self, from: usize, to: usize) {
        if from == to {
            return;
        }
        let row = self.b.remove(from);
        self.b.insert(to, row);
        if let Some(u) = self.u.as_mut() {
            let row = u.remove(from);
            u.insert(to, row);
        }
        self.invalidate_from(from.min(to));
    }

    /// b[target] += x * b[source], mirrored on the transform. The update is
    /// computed in i128 and committed only if every entry fits back in i64;
    /// overflow is a numeric fault and leaves the row unchanged.
    pub fn row_addmul(&mut self, target: usize, source: usize, x: i64) -> Result<(), RedStatus> {
        debug_assert_ne!(target, source);
        if x == 0 {
            return Ok(());
        }
        let new_row = addmul_checked(&self.b[target], &self.b[source], x)?;
        self.b[target] = new_row;
        if let Some(u) = self.u.as_mut() {
            let new_row = addmul_checked(&u[target], &u[source], x)?;
            u[target] = new_row;
        }
        self.invalidate_from(target);
        Ok(())
    }

    pub fn negate_row(&mut self, i: usize) {
        for x in self.b[i].iter_mut() {
            *x = -*x;
        }
        if let Some(u) = self.u.as_mut() {
            for x in u[i].iter_mut() {
                *x = -*x;
            }
        }
        self.invalidate_from(i);
    }

    /// Append a zero row (used while inserting a linear combination that
    /// temporarily makes the generating set dependent).
    pub fn create_row(&mut self) {
        self.b.push(vec![0; self.dim()]);
        if let Some(u) = self.u.as_mut() {
            let width = u[0].len();
            u.push(vec![0; width]);
        }
    }

    /// Drop the last row. The caller guarantees it is zero (its mirror row is
    /// then zero as well, because the input rows are independent).
    pub fn remove_last_row(&mut self) {
        debug_assert!(self.is_zero_row(self.b.len() - 1));
        self.b.pop();
        if let Some(u) = self.u.as_mut() {
            u.pop();
        }
        let d = self.b.len();
        self.invalidate_from(d);
    }

    /// Nearest-plane size reduction of `row` against rows `[0, limit)`.
    ///
    /// Projection coefficients are recomputed directly against the
    /// orthogonalized rows, so the row itself may be stale.
    pub fn babai(&mut self, row: usize, limit: usize) -> Result<(), RedStatus> {
        debug_assert!(limit <= row);
        self.ensure_valid(limit).map_err(|_| RedStatus::BabaiFailure)?;
        for j in (0..limit).rev() {
            if self.r[j] <= 0.0 {
                continue;
            }
            let bf: Vec<f64> = self.b[row].iter().map(|&x| x as f64).collect();
            let c = kahan_dot(&bf, &self.bstar[j]) / self.r[j];
            if !c.is_finite() || c.abs() >= i64::MAX as f64 {
                return Err(RedStatus::BabaiFailure);
            }
            let q = c.round() as i64;
            if q != 0 {
                self.row_addmul(row, j, -q)
                    .map_err(|_| RedStatus::BabaiFailure)?;
            }
        }
        Ok(())
    }
}

fn addmul_checked(target: &[i64], source: &[i64], x: i64) -> Result<Vec<i64>, RedStatus> {
    let mut out = Vec::with_capacity(target.len());
    for (&t, &s) in target.iter().zip(source.iter()) {
        let v = t as i128 + x as i128 * s as i128;
        let v = i64::try_from(v).map_err(|_| RedStatus::BkzFailure)?;
        out.push(v);
    }
    Ok(out)
}

/// Compensated dot product (Kahan summation).
#[inline]
pub fn kahan_dot(x: &[f64], y: &[f64]) -> f64 {
    let mut sum = 0.0;
    let mut c = 0.0;
    for (&xi, &yi) in x.iter().zip(y.iter()) {
        let prod = xi * yi;
        let y_corr = prod - c;
        let t = sum + y_corr;
        c = (t - sum) - y_corr;
        sum = t;
    }
    sum
}

/// y += alpha * x
#[inline]
fn axpy(y: &mut [f64], x: &[f64], alpha: f64) {
    for (yi, &xi) in y.iter_mut().zip(x.iter()) {
        *yi += alpha * xi;
    }
}
