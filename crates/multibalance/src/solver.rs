//! Joint linear program over every group's relabeling matrix.
//!
//! The fairness rows couple groups, so all `G * K * K` variables are solved
//! in one program rather than group by group.
use ndarray::Array2;

use crate::config::{BalanceConfig, CostMatrix, FairnessGoal, LossAggregation};
use crate::constraints::build_constraints;
use crate::error::{BalanceError, Result};
use crate::math::{self, LinearProgram, SimplexConfig};
use crate::objective::{build_objective, expected_loss};
use crate::predictor::RelabelingMatrix;
use crate::stats::ConfusionEstimate;

/// Maps `(group, original prediction, adjusted label)` to an LP column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariableLayout {
    pub n_groups: usize,
    pub n_classes: usize,
}

impl VariableLayout {
    pub fn new(n_groups: usize, n_classes: usize) -> Self {
        Self {
            n_groups,
            n_classes,
        }
    }

    pub fn n_vars(&self) -> usize {
        self.n_groups * self.n_classes * self.n_classes
    }

    #[inline]
    pub fn index(&self, group: usize, pred: usize, adjusted: usize) -> usize {
        (group * self.n_classes + pred) * self.n_classes + adjusted
    }
}

/// A solved adjustment. Replaced wholesale on every successful `adjust`.
#[derive(Debug, Clone)]
pub struct AdjustmentResult {
    pub goal: FairnessGoal,
    pub loss: LossAggregation,
    pub cost: CostMatrix,
    /// One matrix per group, in group-domain order.
    pub relabelings: Vec<RelabelingMatrix>,
    /// Loss of the adjusted rule, without the tie-break term.
    pub objective: f64,
    /// Loss of the original predictions under the same policy and costs.
    pub baseline_objective: f64,
    pub feasible: bool,
    pub iterations: usize,
}

/// Build and solve the LP for `config`, returning per-group relabelings.
pub fn solve_relabeling(
    estimate: &ConfusionEstimate,
    config: &BalanceConfig,
) -> Result<AdjustmentResult> {
    config.solver.validate()?;
    let n_classes = estimate.n_classes;
    let cost = config.cost_matrix(n_classes)?;
    let layout = VariableLayout::new(estimate.n_groups(), n_classes);

    let lp = LinearProgram {
        n_vars: layout.n_vars(),
        objective: build_objective(
            estimate,
            config.loss,
            &cost,
            &layout,
            config.solver.tie_break,
        ),
        constraints: build_constraints(config.goal, estimate, &layout),
    };
    log::debug!(
        "[multibalance::solver] LP with {} variables and {} equality rows",
        lp.n_vars,
        lp.constraints.len()
    );

    let simplex_config = SimplexConfig {
        tolerance: config.solver.tolerance,
        max_iterations: config.solver.max_iterations,
    };
    let solution = math::solve(&lp, &simplex_config).map_err(|e| {
        BalanceError::InfeasibleAdjustment {
            reason: e.to_string(),
        }
    })?;
    log::debug!(
        "[multibalance::solver] solved in {} pivots",
        solution.iterations
    );

    let matrices = extract_matrices(&solution.x, &layout, config.solver.tolerance)?;
    let objective = expected_loss(estimate, &matrices, config.loss, &cost);
    let identity: Vec<Array2<f64>> = (0..layout.n_groups).map(|_| Array2::eye(n_classes)).collect();
    let baseline_objective = expected_loss(estimate, &identity, config.loss, &cost);

    let acceptance = config.solver.tolerance.sqrt();
    let relabelings = matrices
        .into_iter()
        .map(|m| RelabelingMatrix::from_array(m, acceptance))
        .collect::<Result<Vec<_>>>()
        .map_err(|e| BalanceError::InfeasibleAdjustment {
            reason: e.to_string(),
        })?;

    Ok(AdjustmentResult {
        goal: config.goal,
        loss: config.loss,
        cost,
        relabelings,
        objective,
        baseline_objective,
        feasible: true,
        iterations: solution.iterations,
    })
}

/// Reshape the LP solution into per-group matrices, clearing round-off
/// negatives and renormalising rows.
fn extract_matrices(x: &[f64], layout: &VariableLayout, tolerance: f64) -> Result<Vec<Array2<f64>>> {
    let k = layout.n_classes;
    let slack = tolerance.sqrt();
    let mut out = Vec::with_capacity(layout.n_groups);
    for g in 0..layout.n_groups {
        let mut t = Array2::<f64>::zeros((k, k));
        for j in 0..k {
            for adjusted in 0..k {
                let v = x[layout.index(g, j, adjusted)];
                if v < -slack {
                    return Err(BalanceError::InfeasibleAdjustment {
                        reason: format!("solution entry {} below zero beyond tolerance", v),
                    });
                }
                t[[j, adjusted]] = v.max(0.0);
            }
            let sum: f64 = t.row(j).sum();
            if (sum - 1.0).abs() > slack {
                return Err(BalanceError::InfeasibleAdjustment {
                    reason: format!("relabeling row sums to {} after solving", sum),
                });
            }
            t.row_mut(j).mapv_inplace(|v| v / sum);
        }
        out.push(t);
    }
    Ok(out)
}
