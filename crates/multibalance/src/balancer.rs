//! `MulticlassBalancer`: the entry point tying the components together.
//!
//! A balancer is built once from a fixed sample set. Each `adjust` call
//! solves a fresh linear program from that data and, only on success,
//! replaces the stored adjustment. Reads (`summary`, `plot`, prediction)
//! take `&self` and always see the latest completed adjustment, or the
//! identity rule before the first one.
use plotly::Plot;
use rand::Rng;

use crate::config::{BalanceConfig, FairnessGoal, LossAggregation};
use crate::data_handling::SampleSet;
use crate::error::{LabelKind, Result};
use crate::predictor::{RandomizedPredictor, RelabelingMatrix};
use crate::report::plots::plot_summary;
use crate::report::summary::{build_summary, Summary};
use crate::solver::{solve_relabeling, AdjustmentResult};
use crate::stats::{estimate_confusion, ConfusionEstimate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalancerState {
    Unadjusted,
    Adjusted,
}

#[derive(Debug, Clone)]
pub struct MulticlassBalancer {
    samples: SampleSet,
    estimate: ConfusionEstimate,
    identity: Vec<RelabelingMatrix>,
    result: Option<AdjustmentResult>,
}

impl MulticlassBalancer {
    /// Build a balancer from parallel sequences of true labels, original
    /// predictions and group labels.
    ///
    /// # Errors
    ///
    /// * `DimensionMismatch` if the sequences differ in length.
    /// * `EmptyInput` if they are empty.
    /// * `DomainMismatch` if a predicted label never occurs as a true label.
    pub fn new<S: AsRef<str>, G: AsRef<str>>(y_true: &[S], y_pred: &[S], groups: &[G]) -> Result<Self> {
        let samples = SampleSet::from_labels(y_true, y_pred, groups)?;
        samples.log_input_data_summary();
        let estimate = estimate_confusion(&samples);

        let zero_support = estimate.zero_support();
        for z in &zero_support {
            log::warn!(
                "[multibalance::balancer] class '{}' has no samples in group '{}'; it is left out of that group's class-conditional constraints",
                samples.classes.label(z.class),
                samples.groups.label(z.group)
            );
        }

        let identity = (0..samples.n_groups())
            .map(|_| RelabelingMatrix::identity(samples.n_classes()))
            .collect();

        Ok(Self {
            samples,
            estimate,
            identity,
            result: None,
        })
    }

    pub fn classes(&self) -> &[String] {
        self.samples.classes.labels()
    }

    pub fn groups(&self) -> &[String] {
        self.samples.groups.labels()
    }

    pub fn n_samples(&self) -> usize {
        self.samples.len()
    }

    pub fn confusion(&self) -> &ConfusionEstimate {
        &self.estimate
    }

    pub fn state(&self) -> BalancerState {
        match self.result {
            Some(_) => BalancerState::Adjusted,
            None => BalancerState::Unadjusted,
        }
    }

    /// The latest successful adjustment, if any.
    pub fn result(&self) -> Option<&AdjustmentResult> {
        self.result.as_ref()
    }

    /// Solve for `config` without touching the stored adjustment.
    pub fn solve(&self, config: &BalanceConfig) -> Result<AdjustmentResult> {
        solve_relabeling(&self.estimate, config)
    }

    /// Adjust with default solver settings and 0/1 costs.
    pub fn adjust(&mut self, goal: FairnessGoal, loss: LossAggregation) -> Result<&AdjustmentResult> {
        self.adjust_with(&BalanceConfig::new(goal, loss))
    }

    /// Adjust with goal and loss given by name (`"odds"`, `"strict"`,
    /// `"opportunity"`; `"macro"`, `"micro"`).
    ///
    /// # Errors
    ///
    /// `InvalidConfiguration` for any other name; the stored adjustment is
    /// left as it was.
    pub fn adjust_named(&mut self, goal: &str, loss: &str) -> Result<&AdjustmentResult> {
        let goal: FairnessGoal = goal.parse()?;
        let loss: LossAggregation = loss.parse()?;
        self.adjust(goal, loss)
    }

    pub fn adjust_with(&mut self, config: &BalanceConfig) -> Result<&AdjustmentResult> {
        match self.solve(config) {
            Ok(result) => {
                log::info!(
                    "[multibalance::balancer] adjusted for goal={} loss={}: loss {:.4} (original {:.4})",
                    result.goal,
                    result.loss,
                    result.objective,
                    result.baseline_objective
                );
                Ok(self.result.insert(result))
            }
            Err(e) => {
                log::warn!(
                    "[multibalance::balancer] adjust(goal={}, loss={}) failed: {}",
                    config.goal,
                    config.loss,
                    e
                );
                Err(e)
            }
        }
    }

    /// Per-group relabeling matrices currently in force.
    pub fn relabelings(&self) -> &[RelabelingMatrix] {
        match &self.result {
            Some(r) => &r.relabelings,
            None => &self.identity,
        }
    }

    pub fn relabeling(&self, group: &str) -> Result<&RelabelingMatrix> {
        let g = self.samples.groups.encode(group, LabelKind::Group)?;
        Ok(&self.relabelings()[g])
    }

    pub fn predictor(&self) -> RandomizedPredictor<'_> {
        RandomizedPredictor::new(&self.samples.classes, &self.samples.groups, self.relabelings())
    }

    /// Sample adjusted labels for new predictions using the caller's `rng`.
    pub fn predict<S, G, R>(&self, y_pred: &[S], groups: &[G], rng: &mut R) -> Result<Vec<String>>
    where
        S: AsRef<str>,
        G: AsRef<str>,
        R: Rng + ?Sized,
    {
        self.predictor().predict(y_pred, groups, rng)
    }

    /// Adjusted label probabilities for new predictions.
    pub fn predict_proba<S, G>(&self, y_pred: &[S], groups: &[G]) -> Result<Vec<Vec<f64>>>
    where
        S: AsRef<str>,
        G: AsRef<str>,
    {
        self.predictor().predict_proba(y_pred, groups)
    }

    pub fn summary(&self) -> Summary {
        build_summary(
            &self.samples.classes,
            &self.samples.groups,
            &self.estimate,
            self.result.as_ref(),
        )
    }

    /// Chart of the current summary.
    pub fn plot(&self) -> Plot {
        plot_summary(&self.summary())
    }
}
