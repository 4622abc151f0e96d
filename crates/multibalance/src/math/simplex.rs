//! Dense two-phase simplex for small equality-form linear programs.
//!
//! Solves `min c'x  s.t.  Ax = b, x >= 0`. Phase one drives a full set of
//! artificial variables to zero to find a feasible basis (and detects
//! redundant equality rows); phase two optimises the real objective from
//! there.
//!
//! Entering columns follow Dantzig's rule until a run of degenerate pivots,
//! then Bland's rule. Leaving rows come from a two-pass Harris ratio test
//! that prefers large pivot elements. The tableau is rebuilt from the
//! original rows every [`REFACTOR_INTERVAL`] pivots and at the end of each
//! phase, so round-off does not accumulate across pivots.
use ndarray::{s, Array2, Axis};
use thiserror::Error;

/// Pivots between two rebuilds of the tableau from the original rows.
pub const REFACTOR_INTERVAL: usize = 64;

/// Consecutive degenerate pivots (on top of the row count) before the
/// entering rule switches to Bland's.
const STALL_LIMIT: usize = 50;

/// Elimination pivots at or below this magnitude mark the basis singular.
const SINGULAR_PIVOT: f64 = 1e-12;

/// One equality row `sum(coef * x[var]) = rhs`. Repeated variables add up.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearConstraint {
    pub terms: Vec<(usize, f64)>,
    pub rhs: f64,
}

impl LinearConstraint {
    pub fn new(rhs: f64) -> Self {
        Self {
            terms: Vec::new(),
            rhs,
        }
    }

    pub fn add_term(&mut self, var: usize, coef: f64) {
        if coef != 0.0 {
            self.terms.push((var, coef));
        }
    }

    /// Dense coefficient row over `n_vars` variables.
    pub fn dense(&self, n_vars: usize) -> Vec<f64> {
        let mut row = vec![0.0; n_vars];
        for &(var, coef) in &self.terms {
            row[var] += coef;
        }
        row
    }
}

#[derive(Debug, Clone)]
pub struct LinearProgram {
    pub n_vars: usize,
    /// Cost per variable, minimised.
    pub objective: Vec<f64>,
    pub constraints: Vec<LinearConstraint>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimplexConfig {
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for SimplexConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-9,
            max_iterations: 50_000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LpSolution {
    pub x: Vec<f64>,
    pub objective: f64,
    pub iterations: usize,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimplexError {
    #[error("constraints are infeasible (phase-one residual {residual:.3e})")]
    Infeasible { residual: f64 },
    #[error("objective is unbounded below")]
    Unbounded,
    #[error("iteration limit of {limit} pivots reached")]
    IterationLimit { limit: usize },
    #[error("basis matrix is numerically singular")]
    Singular,
}

/// Working tableau. The last row holds reduced costs and, in its last
/// column, the negated objective value. The last column holds the basic
/// variable values.
struct Tableau {
    /// Original constraint columns followed by the right-hand side.
    source: Array2<f64>,
    /// Cost of every source column except the right-hand side.
    cost: Vec<f64>,
    t: Array2<f64>,
    basis: Vec<usize>,
    /// Columns `0..n_vars` may enter the basis.
    n_vars: usize,
    tol: f64,
    iterations: usize,
    max_iterations: usize,
    since_refactor: usize,
}

impl Tableau {
    fn new(
        source: Array2<f64>,
        cost: Vec<f64>,
        basis: Vec<usize>,
        n_vars: usize,
        config: &SimplexConfig,
        iterations: usize,
    ) -> Result<Self, SimplexError> {
        let (m, width) = source.dim();
        let mut tab = Tableau {
            source,
            cost,
            t: Array2::zeros((m + 1, width)),
            basis,
            n_vars,
            tol: config.tolerance,
            iterations,
            max_iterations: config.max_iterations,
            since_refactor: 0,
        };
        if !tab.refactor() {
            return Err(SimplexError::Singular);
        }
        Ok(tab)
    }

    fn n_rows(&self) -> usize {
        self.t.nrows() - 1
    }

    fn rhs_col(&self) -> usize {
        self.t.ncols() - 1
    }

    /// Recompute `B^-1 [A | b]` and the reduced costs for the current basis
    /// by Gauss-Jordan elimination with partial pivoting. Returns `false`,
    /// leaving the tableau untouched, when the basis matrix is singular.
    fn refactor(&mut self) -> bool {
        let m = self.n_rows();
        let width = self.source.ncols();
        let mut aug = Array2::<f64>::zeros((m, m + width));
        for (c, &var) in self.basis.iter().enumerate() {
            aug.column_mut(c).assign(&self.source.column(var));
        }
        aug.slice_mut(s![.., m..]).assign(&self.source);

        for c in 0..m {
            let p = (c..m)
                .max_by(|&a, &b| aug[[a, c]].abs().total_cmp(&aug[[b, c]].abs()))
                .unwrap_or(c);
            if aug[[p, c]].abs() <= SINGULAR_PIVOT {
                return false;
            }
            if p != c {
                for j in 0..aug.ncols() {
                    aug.swap([p, j], [c, j]);
                }
            }
            let pivot = aug[[c, c]];
            aug.row_mut(c).mapv_inplace(|v| v / pivot);
            let pivot_row = aug.row(c).to_owned();
            for r in 0..m {
                if r == c {
                    continue;
                }
                let factor = aug[[r, c]];
                if factor != 0.0 {
                    aug.row_mut(r).scaled_add(-factor, &pivot_row);
                }
            }
        }

        self.t.slice_mut(s![..m, ..]).assign(&aug.slice(s![.., m..]));
        let rhs = width - 1;
        for j in 0..width {
            let mut reduced = if j < rhs { self.cost[j] } else { 0.0 };
            for r in 0..m {
                let cb = self.cost[self.basis[r]];
                if cb != 0.0 {
                    reduced -= cb * self.t[[r, j]];
                }
            }
            self.t[[m, j]] = reduced;
        }
        self.snap_rhs();
        self.since_refactor = 0;
        true
    }

    /// Clear basic values within tolerance below zero.
    fn snap_rhs(&mut self) {
        let rhs = self.rhs_col();
        let tol = self.tol;
        for r in 0..self.n_rows() {
            let v = &mut self.t[[r, rhs]];
            if *v < 0.0 && *v >= -tol {
                *v = 0.0;
            }
        }
    }

    fn pivot(&mut self, row: usize, col: usize) {
        let p = self.t[[row, col]];
        self.t.row_mut(row).mapv_inplace(|v| v / p);
        let pivot_row = self.t.row(row).to_owned();
        for r in 0..self.t.nrows() {
            if r == row {
                continue;
            }
            let factor = self.t[[r, col]];
            if factor != 0.0 {
                self.t.row_mut(r).scaled_add(-factor, &pivot_row);
            }
        }
        self.basis[row] = col;
        self.iterations += 1;
        self.since_refactor += 1;
        self.snap_rhs();
        if self.since_refactor >= REFACTOR_INTERVAL && !self.refactor() {
            log::trace!("[multibalance::simplex] skipped refactor of a near-singular basis");
            self.since_refactor = 0;
        }
    }

    fn entering(&self, bland: bool) -> Option<usize> {
        let m = self.n_rows();
        let mut candidates = (0..self.n_vars).filter(|&j| self.t[[m, j]] < -self.tol);
        if bland {
            candidates.next()
        } else {
            candidates.min_by(|&a, &b| self.t[[m, a]].total_cmp(&self.t[[m, b]]))
        }
    }

    /// Two-pass ratio test on column `e`. Pass one bounds the step by the
    /// Harris relaxation (or the exact minimum ratio under Bland's rule);
    /// pass two picks, among rows within that bound, the largest pivot
    /// element (or the lowest basic index under Bland's rule).
    fn leaving(&self, e: usize, bland: bool) -> Option<usize> {
        let m = self.n_rows();
        let rhs = self.rhs_col();
        let col_norm = (0..m).map(|r| self.t[[r, e]].abs()).fold(0.0, f64::max);
        let pivot_tol = self.tol * col_norm.max(1.0);

        let mut harris = f64::INFINITY;
        let mut min_ratio = f64::INFINITY;
        for r in 0..m {
            let a = self.t[[r, e]];
            if a > pivot_tol {
                let b = self.t[[r, rhs]].max(0.0);
                harris = harris.min((b + self.tol) / a);
                min_ratio = min_ratio.min(b / a);
            }
        }
        if !harris.is_finite() {
            return None;
        }
        let bound = if bland { min_ratio + self.tol } else { harris };

        let mut best: Option<usize> = None;
        for r in 0..m {
            let a = self.t[[r, e]];
            if a <= pivot_tol || self.t[[r, rhs]].max(0.0) / a > bound {
                continue;
            }
            best = match best {
                None => Some(r),
                Some(b) => {
                    let prefer = if bland {
                        self.basis[r] < self.basis[b]
                    } else {
                        let current = self.t[[b, e]];
                        a > current || (a == current && self.basis[r] < self.basis[b])
                    };
                    Some(if prefer { r } else { b })
                }
            };
        }
        best
    }

    /// Pivot until no enterable column has a negative reduced cost.
    fn optimise(&mut self) -> Result<(), SimplexError> {
        let m = self.n_rows();
        let rhs = self.rhs_col();
        let mut degenerate_run = 0;
        loop {
            let bland = degenerate_run > STALL_LIMIT + m;
            let Some(e) = self.entering(bland) else {
                return Ok(());
            };
            let Some(r) = self.leaving(e, bland) else {
                return Err(SimplexError::Unbounded);
            };
            if self.iterations >= self.max_iterations {
                return Err(SimplexError::IterationLimit {
                    limit: self.max_iterations,
                });
            }
            let step = self.t[[r, rhs]].max(0.0) / self.t[[r, e]];
            if step <= self.tol {
                degenerate_run += 1;
            } else {
                degenerate_run = 0;
            }
            log::trace!("[multibalance::simplex] pivot row {} col {}", r, e);
            self.pivot(r, e);
        }
    }
}

pub fn solve(lp: &LinearProgram, config: &SimplexConfig) -> Result<LpSolution, SimplexError> {
    let n = lp.n_vars;
    let tol = config.tolerance;
    let feasibility_tol = tol.sqrt();

    let mut rows: Vec<(Vec<f64>, f64)> = Vec::with_capacity(lp.constraints.len());
    for c in &lp.constraints {
        let dense = c.dense(n);
        if dense.iter().all(|v| v.abs() <= tol) {
            if c.rhs.abs() > feasibility_tol {
                return Err(SimplexError::Infeasible {
                    residual: c.rhs.abs(),
                });
            }
            continue;
        }
        rows.push((dense, c.rhs));
    }
    let m = rows.len();
    let rhs = n + m;

    // Phase one: artificial variable per row, b made nonnegative.
    let mut source = Array2::<f64>::zeros((m, n + m + 1));
    for (r, (coefs, b)) in rows.iter().enumerate() {
        let sign = if *b < 0.0 { -1.0 } else { 1.0 };
        for (j, &a) in coefs.iter().enumerate() {
            source[[r, j]] = sign * a;
        }
        source[[r, n + r]] = 1.0;
        source[[r, rhs]] = sign * b;
    }
    let mut phase_one_cost = vec![0.0; n + m];
    phase_one_cost[n..].fill(1.0);

    let mut tab = Tableau::new(source, phase_one_cost, (n..n + m).collect(), n, config, 0)?;
    tab.optimise()?;
    if !tab.refactor() {
        return Err(SimplexError::Singular);
    }

    let residual = -tab.t[[m, rhs]];
    if residual > feasibility_tol {
        return Err(SimplexError::Infeasible { residual });
    }
    log::trace!(
        "[multibalance::simplex] phase one done after {} pivots",
        tab.iterations
    );

    // Pivot remaining artificials out of the basis. A row where that is
    // impossible makes the original row of its artificial a linear
    // combination of the others.
    let mut redundant = Vec::new();
    for r in 0..m {
        if tab.basis[r] < n {
            continue;
        }
        let best = (0..n)
            .map(|j| (j, tab.t[[r, j]].abs()))
            .filter(|&(_, a)| a > tol)
            .max_by(|a, b| a.1.total_cmp(&b.1));
        match best {
            Some((j, _)) => tab.pivot(r, j),
            None => redundant.push(r),
        }
    }
    if !redundant.is_empty() {
        log::trace!(
            "[multibalance::simplex] dropping {} redundant rows",
            redundant.len()
        );
    }

    let dropped: Vec<usize> = redundant.iter().map(|&r| tab.basis[r] - n).collect();
    let keep_rows: Vec<usize> = (0..m).filter(|q| !dropped.contains(q)).collect();
    let basis: Vec<usize> = (0..m)
        .filter(|r| !redundant.contains(r))
        .map(|r| tab.basis[r])
        .collect();
    let mut col_idx: Vec<usize> = (0..n).collect();
    col_idx.push(rhs);
    let source = tab
        .source
        .select(Axis(0), &keep_rows)
        .select(Axis(1), &col_idx);

    // Phase two on the original rows with the real objective.
    let mut tab = Tableau::new(source, lp.objective.clone(), basis, n, config, tab.iterations)?;
    tab.optimise()?;
    if !tab.refactor() {
        return Err(SimplexError::Singular);
    }

    let rhs2 = n;
    let mut x = vec![0.0; n];
    for (r, &var) in tab.basis.iter().enumerate() {
        x[var] = tab.t[[r, rhs2]];
    }
    let objective = x.iter().zip(&lp.objective).map(|(xi, ci)| xi * ci).sum();

    Ok(LpSolution {
        x,
        objective,
        iterations: tab.iterations,
    })
}
