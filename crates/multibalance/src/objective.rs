//! Linear cost of a candidate set of relabeling matrices.
//!
//! The coefficient on `T_a[j][k]` is the expected cost contributed by group-`a`
//! samples originally predicted `j` and relabeled `k`:
//! `sum_i w(a, i) * n[a][i][j] * cost(i, k)`, where the class weight `w`
//! depends on the aggregation policy.
use ndarray::Array2;

use crate::config::{CostMatrix, LossAggregation};
use crate::solver::VariableLayout;
use crate::stats::ConfusionEstimate;

/// Weight applied to one sample count of true class `class` in group `group`.
pub trait ObjectiveStrategy {
    fn class_weight(&self, estimate: &ConfusionEstimate, group: usize, class: usize) -> f64;
}

/// Each sample counts `1 / n`; the objective is the overall expected cost.
pub struct MicroLoss;

/// Each sample counts `1 / (K * n_i)`; the objective is the mean over true
/// classes of the per-class expected cost.
pub struct MacroLoss;

impl ObjectiveStrategy for MicroLoss {
    fn class_weight(&self, estimate: &ConfusionEstimate, _group: usize, _class: usize) -> f64 {
        1.0 / estimate.n_samples.max(1) as f64
    }
}

impl ObjectiveStrategy for MacroLoss {
    fn class_weight(&self, estimate: &ConfusionEstimate, _group: usize, class: usize) -> f64 {
        // Every class of the domain occurs among the true labels.
        let n_i = estimate.class_totals[class].max(1);
        1.0 / (estimate.n_classes as f64 * n_i as f64)
    }
}

pub fn strategy_for(loss: LossAggregation) -> Box<dyn ObjectiveStrategy> {
    match loss {
        LossAggregation::Micro => Box::new(MicroLoss),
        LossAggregation::Macro => Box::new(MacroLoss),
    }
}

/// Per-group `K x K` coefficient matrices indexed `[[j, k]]`.
pub fn loss_coefficients(
    estimate: &ConfusionEstimate,
    loss: LossAggregation,
    cost: &CostMatrix,
) -> Vec<Array2<f64>> {
    let strategy = strategy_for(loss);
    let k = estimate.n_classes;
    estimate
        .groups
        .iter()
        .enumerate()
        .map(|(g, dist)| {
            let mut coef = Array2::<f64>::zeros((k, k));
            for i in 0..k {
                if !dist.has_support(i) {
                    continue;
                }
                let w = strategy.class_weight(estimate, g, i);
                for j in 0..k {
                    let n = dist.counts[[i, j]];
                    if n == 0 {
                        continue;
                    }
                    let mass = w * n as f64;
                    for adjusted in 0..k {
                        coef[[j, adjusted]] += mass * cost.cost(i, adjusted);
                    }
                }
            }
            coef
        })
        .collect()
}

/// Flat objective vector in LP variable order, with the off-diagonal
/// tie-break added.
pub fn build_objective(
    estimate: &ConfusionEstimate,
    loss: LossAggregation,
    cost: &CostMatrix,
    layout: &VariableLayout,
    tie_break: f64,
) -> Vec<f64> {
    let coefficients = loss_coefficients(estimate, loss, cost);
    let mut objective = vec![0.0; layout.n_vars()];
    for (g, coef) in coefficients.iter().enumerate() {
        let share = estimate.group_weight(g);
        for j in 0..layout.n_classes {
            for k in 0..layout.n_classes {
                let penalty = if j == k { 0.0 } else { tie_break * share };
                objective[layout.index(g, j, k)] = coef[[j, k]] + penalty;
            }
        }
    }
    objective
}

/// Expected cost of applying `relabelings` (one per group). Identity matrices
/// give the loss of the original predictions.
pub fn expected_loss(
    estimate: &ConfusionEstimate,
    relabelings: &[Array2<f64>],
    loss: LossAggregation,
    cost: &CostMatrix,
) -> f64 {
    loss_coefficients(estimate, loss, cost)
        .iter()
        .zip(relabelings)
        .map(|(coef, t)| (coef * t).sum())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::GroupJointDistribution;

    fn estimate(groups: Vec<GroupJointDistribution>) -> ConfusionEstimate {
        let n_classes = groups[0].n_classes();
        let mut class_totals = vec![0; n_classes];
        for g in &groups {
            for (t, c) in class_totals.iter_mut().zip(&g.class_counts) {
                *t += c;
            }
        }
        let n_samples = groups.iter().map(|g| g.n_samples).sum();
        ConfusionEstimate {
            groups,
            class_totals,
            n_samples,
            n_classes,
        }
    }

    #[test]
    fn identity_loss_matches_error_rates() {
        // 8 samples of class 0 (2 wrong), 2 of class 1 (1 wrong).
        let mut pairs = vec![(0, 0); 6];
        pairs.extend(vec![(0, 1); 2]);
        pairs.push((1, 1));
        pairs.push((1, 0));
        let est = estimate(vec![GroupJointDistribution::from_pairs(2, pairs)]);
        let cost = CostMatrix::zero_one(2);
        let identity = vec![Array2::eye(2)];

        let micro = expected_loss(&est, &identity, LossAggregation::Micro, &cost);
        assert!((micro - 0.3).abs() < 1e-12);

        let macro_ = expected_loss(&est, &identity, LossAggregation::Macro, &cost);
        assert!((macro_ - (0.25 + 0.5) / 2.0).abs() < 1e-12);
    }

    #[test]
    fn macro_weight_splits_evenly_across_classes() {
        // Class 0 in group 0 only, class 1 in group 1 only: each class still
        // carries 1 / K of the loss.
        let est = estimate(vec![
            GroupJointDistribution::from_pairs(2, vec![(0, 0), (0, 1), (0, 0), (0, 0)]),
            GroupJointDistribution::from_pairs(2, vec![(1, 1)]),
        ]);
        let macro_loss = MacroLoss;
        assert!((macro_loss.class_weight(&est, 0, 0) - 1.0 / 8.0).abs() < 1e-15);
        assert!((macro_loss.class_weight(&est, 1, 1) - 1.0 / 2.0).abs() < 1e-15);
    }

    #[test]
    fn tie_break_only_touches_off_diagonal() {
        let est = estimate(vec![GroupJointDistribution::from_pairs(2, vec![(0, 0), (1, 1)])]);
        let layout = VariableLayout::new(1, 2);
        let cost = CostMatrix::zero_one(2);
        let plain = build_objective(&est, LossAggregation::Micro, &cost, &layout, 0.0);
        let tied = build_objective(&est, LossAggregation::Micro, &cost, &layout, 1e-3);
        assert_eq!(plain[layout.index(0, 0, 0)], tied[layout.index(0, 0, 0)]);
        assert!((tied[layout.index(0, 0, 1)] - plain[layout.index(0, 0, 1)] - 1e-3).abs() < 1e-15);
    }

    #[test]
    fn custom_cost_scales_coefficients() {
        let est = estimate(vec![GroupJointDistribution::from_pairs(2, vec![(0, 0), (1, 1)])]);
        let cost = CostMatrix(vec![vec![0.0, 5.0], vec![1.0, 0.0]]);
        let coef = loss_coefficients(&est, LossAggregation::Micro, &cost);
        // a class-0 sample moved to class 1 costs 5 / n
        assert!((coef[0][[0, 1]] - 2.5).abs() < 1e-12);
        assert!((coef[0][[1, 0]] - 0.5).abs() < 1e-12);
    }
}
