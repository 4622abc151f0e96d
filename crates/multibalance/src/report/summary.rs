//! Structured before/after report for a balancer.
//!
//! Everything here is derived from the stored confusion estimate and the
//! latest adjustment; no linear program is solved.
use std::fmt;

use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::config::{FairnessGoal, LossAggregation};
use crate::constraints::supported_groups;
use crate::data_handling::LabelDomain;
use crate::objective::expected_loss;
use crate::solver::AdjustmentResult;
use crate::stats::{row_conditional, ConfusionEstimate};

/// Largest cross-group gap still reported as satisfying the goal.
pub const FAIRNESS_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub classes: Vec<String>,
    pub n_samples: usize,
    pub groups: Vec<GroupSummary>,
    /// Loss of the rule being described: the adjusted rule when an
    /// adjustment exists, otherwise the raw 0/1 error rate.
    pub objective: f64,
    /// Loss of the original predictions under the same policy.
    pub baseline_objective: f64,
    pub accuracy_before: f64,
    pub accuracy_after: Option<f64>,
    pub adjustment: Option<AdjustmentSummary>,
    /// True classes absent from a group, left out of that group's
    /// class-conditional equality rows.
    pub zero_support: Vec<ExcludedClass>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentSummary {
    pub goal: FairnessGoal,
    pub loss: LossAggregation,
    pub iterations: usize,
    pub fairness: FairnessCheck,
}

/// Largest cross-group difference in the quantities the goal equalises.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FairnessCheck {
    pub disparity_before: f64,
    pub disparity_after: f64,
    pub tolerance: f64,
    pub satisfied: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub name: String,
    pub n_samples: usize,
    pub class_counts: Vec<usize>,
    /// `P(y = i | a)`.
    pub class_priors: Vec<f64>,
    /// Within-group joint of (true, predicted); sums to 1.
    pub original_confusion: Vec<Vec<f64>>,
    /// Joint of (true, adjusted): the original joint composed with the
    /// group's relabeling.
    pub adjusted_confusion: Option<Vec<Vec<f64>>>,
    /// `P(y_hat = j | y = i, a)`; rows of absent classes are zero.
    pub original_rates: Vec<Vec<f64>>,
    /// `P(adjusted = k | y = i, a)`.
    pub adjusted_rates: Option<Vec<Vec<f64>>>,
    pub relabeling: Option<Vec<Vec<f64>>>,
    /// Per true class `1 - P(correct | y = i, a)`; `None` for absent classes.
    pub error_before: Vec<Option<f64>>,
    pub error_after: Option<Vec<Option<f64>>>,
    pub accuracy_before: f64,
    pub accuracy_after: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcludedClass {
    pub group: String,
    pub class: String,
}

fn to_rows(m: &Array2<f64>) -> Vec<Vec<f64>> {
    m.rows().into_iter().map(|r| r.to_vec()).collect()
}

fn per_class_error(rates: &Array2<f64>, class_counts: &[usize]) -> Vec<Option<f64>> {
    class_counts
        .iter()
        .enumerate()
        .map(|(i, &n)| (n > 0).then(|| 1.0 - rates[[i, i]]))
        .collect()
}

/// Adjusted joint distributions `C_a T_a`, one per group.
fn adjusted_joints(estimate: &ConfusionEstimate, relabelings: &[Array2<f64>]) -> Vec<Array2<f64>> {
    estimate
        .groups
        .iter()
        .zip(relabelings)
        .map(|(dist, t)| dist.compose(t))
        .collect()
}

fn weighted_accuracy(estimate: &ConfusionEstimate, joints: &[Array2<f64>]) -> f64 {
    joints
        .iter()
        .enumerate()
        .map(|(g, joint)| estimate.group_weight(g) * joint.diag().sum())
        .sum()
}

fn range(values: impl IntoIterator<Item = f64>) -> f64 {
    let (lo, hi) = values
        .into_iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if lo.is_finite() {
        hi - lo
    } else {
        0.0
    }
}

/// Largest cross-group gap for `goal` when each group applies its matrix in
/// `relabelings`.
pub fn disparity(
    goal: FairnessGoal,
    estimate: &ConfusionEstimate,
    relabelings: &[Array2<f64>],
) -> f64 {
    let joints = adjusted_joints(estimate, relabelings);
    let k = estimate.n_classes;
    match goal {
        FairnessGoal::Strict => {
            let marginals: Vec<_> = joints.iter().map(|j| j.sum_axis(Axis(0))).collect();
            (0..k)
                .map(|adjusted| range(marginals.iter().map(|m| m[adjusted])))
                .fold(0.0, f64::max)
        }
        FairnessGoal::Odds | FairnessGoal::Opportunity => {
            let rates: Vec<_> = joints
                .iter()
                .zip(&estimate.groups)
                .map(|(j, dist)| row_conditional(j, &dist.priors))
                .collect();
            let mut worst: f64 = 0.0;
            for i in 0..k {
                let groups = supported_groups(estimate, i);
                let targets: Vec<usize> = if goal == FairnessGoal::Odds {
                    (0..k).collect()
                } else {
                    vec![i]
                };
                for adjusted in targets {
                    worst = worst.max(range(groups.iter().map(|&g| rates[g][[i, adjusted]])));
                }
            }
            worst
        }
    }
}

/// Assemble the report for the raw state (`result == None`) or for an
/// adjustment.
pub fn build_summary(
    classes: &LabelDomain,
    groups: &LabelDomain,
    estimate: &ConfusionEstimate,
    result: Option<&AdjustmentResult>,
) -> Summary {
    let k = estimate.n_classes;
    let identity: Vec<Array2<f64>> = (0..estimate.n_groups()).map(|_| Array2::eye(k)).collect();
    let original_joints: Vec<Array2<f64>> =
        estimate.groups.iter().map(|d| d.joint.clone()).collect();
    let accuracy_before = weighted_accuracy(estimate, &original_joints);

    let adjusted: Option<Vec<Array2<f64>>> = result.map(|r| {
        r.relabelings
            .iter()
            .map(|t| t.as_array().clone())
            .collect()
    });
    let adjusted_joints_opt = adjusted.as_ref().map(|t| adjusted_joints(estimate, t));

    let group_summaries = estimate
        .groups
        .iter()
        .enumerate()
        .map(|(g, dist)| {
            let original_rates = dist.conditional();
            let after = adjusted_joints_opt
                .as_ref()
                .map(|joints| row_conditional(&joints[g], &dist.priors));
            GroupSummary {
                name: groups.label(g).to_string(),
                n_samples: dist.n_samples,
                class_counts: dist.class_counts.clone(),
                class_priors: dist.priors.clone(),
                original_confusion: to_rows(&dist.joint),
                adjusted_confusion: adjusted_joints_opt.as_ref().map(|j| to_rows(&j[g])),
                error_before: per_class_error(&original_rates, &dist.class_counts),
                error_after: after
                    .as_ref()
                    .map(|r| per_class_error(r, &dist.class_counts)),
                accuracy_before: dist.joint.diag().sum(),
                accuracy_after: adjusted_joints_opt.as_ref().map(|j| j[g].diag().sum()),
                original_rates: to_rows(&original_rates),
                adjusted_rates: after.as_ref().map(to_rows),
                relabeling: adjusted.as_ref().map(|t| to_rows(&t[g])),
            }
        })
        .collect();

    let zero_support = estimate
        .zero_support()
        .into_iter()
        .map(|z| ExcludedClass {
            group: groups.label(z.group).to_string(),
            class: classes.label(z.class).to_string(),
        })
        .collect();

    let (objective, baseline_objective, adjustment, accuracy_after) = match (result, &adjusted) {
        (Some(r), Some(t)) => {
            let before = disparity(r.goal, estimate, &identity);
            let after = disparity(r.goal, estimate, t);
            let fairness = FairnessCheck {
                disparity_before: before,
                disparity_after: after,
                tolerance: FAIRNESS_TOLERANCE,
                satisfied: after <= FAIRNESS_TOLERANCE,
            };
            let accuracy_after = adjusted_joints_opt
                .as_ref()
                .map(|j| weighted_accuracy(estimate, j));
            (
                r.objective,
                r.baseline_objective,
                Some(AdjustmentSummary {
                    goal: r.goal,
                    loss: r.loss,
                    iterations: r.iterations,
                    fairness,
                }),
                accuracy_after,
            )
        }
        _ => {
            let raw = expected_loss(
                estimate,
                &identity,
                LossAggregation::Micro,
                &crate::config::CostMatrix::zero_one(k),
            );
            (raw, raw, None, None)
        }
    };

    Summary {
        classes: classes.labels().to_vec(),
        n_samples: estimate.n_samples,
        groups: group_summaries,
        objective,
        baseline_objective,
        accuracy_before,
        accuracy_after,
        adjustment,
        zero_support,
    }
}

impl Summary {
    pub fn is_adjusted(&self) -> bool {
        self.adjustment.is_some()
    }

    pub fn group(&self, name: &str) -> Option<&GroupSummary> {
        self.groups.iter().find(|g| g.name == name)
    }
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map_or_else(|| "-".to_string(), |x| format!("{:.4}", x))
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} samples, {} groups, classes: {}",
            self.n_samples,
            self.groups.len(),
            self.classes.join(", ")
        )?;
        match &self.adjustment {
            Some(adj) => {
                writeln!(f, "Adjustment: goal={} loss={}", adj.goal, adj.loss)?;
                writeln!(
                    f,
                    "  loss {:.4} (original {:.4}, change {:+.4})",
                    self.objective,
                    self.baseline_objective,
                    self.objective - self.baseline_objective
                )?;
                writeln!(
                    f,
                    "  accuracy {:.4} -> {}",
                    self.accuracy_before,
                    fmt_opt(self.accuracy_after)
                )?;
                writeln!(
                    f,
                    "  max group disparity {:.4} -> {:.2e} ({})",
                    adj.fairness.disparity_before,
                    adj.fairness.disparity_after,
                    if adj.fairness.satisfied { "satisfied" } else { "NOT satisfied" }
                )?;
            }
            None => {
                writeln!(f, "Unadjusted")?;
                writeln!(
                    f,
                    "  0/1 loss {:.4}, accuracy {:.4}",
                    self.objective, self.accuracy_before
                )?;
            }
        }

        for g in &self.groups {
            writeln!(f)?;
            writeln!(
                f,
                "Group '{}' (n={}): accuracy {:.4} -> {}",
                g.name,
                g.n_samples,
                g.accuracy_before,
                fmt_opt(g.accuracy_after)
            )?;
            writeln!(f, "  {:<12} {:>8} {:>10} {:>10}", "class", "prior", "err.orig", "err.adj")?;
            for (i, class) in self.classes.iter().enumerate() {
                let after = g.error_after.as_ref().and_then(|e| e[i]);
                writeln!(
                    f,
                    "  {:<12} {:>8.4} {:>10} {:>10}",
                    class,
                    g.class_priors[i],
                    fmt_opt(g.error_before[i]),
                    fmt_opt(after)
                )?;
            }
            if let Some(t) = &g.relabeling {
                writeln!(f, "  relabeling (row = original prediction):")?;
                for (class, row) in self.classes.iter().zip(t) {
                    let cells: Vec<String> = row.iter().map(|v| format!("{:.3}", v)).collect();
                    writeln!(f, "    {:<10} {}", class, cells.join(" "))?;
                }
            }
        }

        if !self.zero_support.is_empty() {
            writeln!(f)?;
            for z in &self.zero_support {
                writeln!(
                    f,
                    "class '{}' has no samples in group '{}'; excluded from its equality rows",
                    z.class, z.group
                )?;
            }
        }
        Ok(())
    }
}
