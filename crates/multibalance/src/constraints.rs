//! Linear equality constraints over the relabeling variables.
//!
//! Every goal shares the simplex rows (each `T_a` row sums to one;
//! nonnegativity is implicit in the LP). The goal-specific rows tie each
//! group's adjusted rates to those of a reference group.
use crate::config::FairnessGoal;
use crate::math::LinearConstraint;
use crate::solver::VariableLayout;
use crate::stats::ConfusionEstimate;

/// Emits the fairness rows for one goal.
pub trait ConstraintStrategy {
    fn goal(&self) -> FairnessGoal;

    fn fairness_constraints(
        &self,
        estimate: &ConfusionEstimate,
        layout: &VariableLayout,
    ) -> Vec<LinearConstraint>;
}

/// `P(adjusted = k | y = i, a)` equal across groups for every `i`, `k`.
pub struct EqualizedOdds;

/// `P(adjusted = k | a)` equal across groups for every `k`.
pub struct StrictParity;

/// `P(adjusted = i | y = i, a)` equal across groups for every `i`.
pub struct EqualOpportunity;

pub fn strategy_for(goal: FairnessGoal) -> Box<dyn ConstraintStrategy> {
    match goal {
        FairnessGoal::Odds => Box::new(EqualizedOdds),
        FairnessGoal::Strict => Box::new(StrictParity),
        FairnessGoal::Opportunity => Box::new(EqualOpportunity),
    }
}

/// `sum_k T_a[j][k] = 1` for every group `a` and original prediction `j`.
pub fn simplex_constraints(layout: &VariableLayout) -> Vec<LinearConstraint> {
    let mut rows = Vec::with_capacity(layout.n_groups * layout.n_classes);
    for g in 0..layout.n_groups {
        for j in 0..layout.n_classes {
            let mut c = LinearConstraint::new(1.0);
            for k in 0..layout.n_classes {
                c.add_term(layout.index(g, j, k), 1.0);
            }
            rows.push(c);
        }
    }
    rows
}

/// Simplex rows followed by the fairness rows for `goal`.
pub fn build_constraints(
    goal: FairnessGoal,
    estimate: &ConfusionEstimate,
    layout: &VariableLayout,
) -> Vec<LinearConstraint> {
    let mut rows = simplex_constraints(layout);
    let strategy = strategy_for(goal);
    let fairness = strategy.fairness_constraints(estimate, layout);
    log::debug!(
        "[multibalance::constraints] {} simplex rows, {} '{}' rows",
        rows.len(),
        fairness.len(),
        strategy.goal()
    );
    rows.extend(fairness);
    rows
}

/// Groups with at least one sample of true class `class`, in group order.
pub fn supported_groups(estimate: &ConfusionEstimate, class: usize) -> Vec<usize> {
    (0..estimate.n_groups())
        .filter(|&g| estimate.groups[g].has_support(class))
        .collect()
}

/// Row `sum_j w_a[j] T_a[j][k] - sum_j w_r[j] T_r[j][k] = 0`.
fn equality_row(
    layout: &VariableLayout,
    group: usize,
    group_weights: &[f64],
    reference: usize,
    reference_weights: &[f64],
    adjusted: usize,
) -> LinearConstraint {
    let mut c = LinearConstraint::new(0.0);
    for j in 0..layout.n_classes {
        c.add_term(layout.index(group, j, adjusted), group_weights[j]);
        c.add_term(layout.index(reference, j, adjusted), -reference_weights[j]);
    }
    c
}

/// Class-conditional equality rows for the adjusted classes picked by
/// `adjusted_for`. Groups without support for a class are left out of that
/// class's rows.
fn conditional_rows<F>(
    estimate: &ConfusionEstimate,
    layout: &VariableLayout,
    adjusted_for: F,
) -> Vec<LinearConstraint>
where
    F: Fn(usize) -> Vec<usize>,
{
    let mut rows = Vec::new();
    for i in 0..layout.n_classes {
        let groups = supported_groups(estimate, i);
        let Some((&reference, others)) = groups.split_first() else {
            continue;
        };
        let conditional = |g: usize| -> Vec<f64> {
            estimate.groups[g]
                .conditional_row(i)
                .map(|r| r.to_vec())
                .unwrap_or_else(|| vec![0.0; layout.n_classes])
        };
        let reference_weights = conditional(reference);
        for &g in others {
            let weights = conditional(g);
            for k in adjusted_for(i) {
                rows.push(equality_row(layout, g, &weights, reference, &reference_weights, k));
            }
        }
    }
    rows
}

impl ConstraintStrategy for EqualizedOdds {
    fn goal(&self) -> FairnessGoal {
        FairnessGoal::Odds
    }

    fn fairness_constraints(
        &self,
        estimate: &ConfusionEstimate,
        layout: &VariableLayout,
    ) -> Vec<LinearConstraint> {
        let n_classes = layout.n_classes;
        conditional_rows(estimate, layout, |_| (0..n_classes).collect())
    }
}

impl ConstraintStrategy for EqualOpportunity {
    fn goal(&self) -> FairnessGoal {
        FairnessGoal::Opportunity
    }

    fn fairness_constraints(
        &self,
        estimate: &ConfusionEstimate,
        layout: &VariableLayout,
    ) -> Vec<LinearConstraint> {
        conditional_rows(estimate, layout, |i| vec![i])
    }
}

impl ConstraintStrategy for StrictParity {
    fn goal(&self) -> FairnessGoal {
        FairnessGoal::Strict
    }

    fn fairness_constraints(
        &self,
        estimate: &ConfusionEstimate,
        layout: &VariableLayout,
    ) -> Vec<LinearConstraint> {
        // P(y_hat = j | a): column sums of the within-group joint.
        let marginals: Vec<Vec<f64>> = estimate
            .groups
            .iter()
            .map(|d| d.joint.sum_axis(ndarray::Axis(0)).to_vec())
            .collect();

        let mut rows = Vec::new();
        let reference = 0;
        for g in 1..layout.n_groups {
            for k in 0..layout.n_classes {
                rows.push(equality_row(
                    layout,
                    g,
                    &marginals[g],
                    reference,
                    &marginals[reference],
                    k,
                ));
            }
        }
        rows
    }
}
