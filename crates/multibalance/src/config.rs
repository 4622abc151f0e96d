use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{BalanceError, Result};

/// Fairness criterion the adjusted predictor must satisfy across groups.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FairnessGoal {
    /// Equalized odds: `P(adjusted = k | y = i, a)` is the same for every group.
    #[default]
    Odds,
    /// Group independence: `P(adjusted = k | a)` is the same for every group.
    Strict,
    /// Equal opportunity: `P(adjusted = i | y = i, a)` is the same for every group.
    Opportunity,
}

/// How per-class losses are aggregated into the objective.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LossAggregation {
    /// Every true class weighs the same regardless of prevalence.
    #[default]
    Macro,
    /// True classes weigh in proportion to their empirical frequency.
    Micro,
}

impl FairnessGoal {
    pub const ALL: [FairnessGoal; 3] = [
        FairnessGoal::Odds,
        FairnessGoal::Strict,
        FairnessGoal::Opportunity,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            FairnessGoal::Odds => "odds",
            FairnessGoal::Strict => "strict",
            FairnessGoal::Opportunity => "opportunity",
        }
    }
}

impl LossAggregation {
    pub const ALL: [LossAggregation; 2] = [LossAggregation::Macro, LossAggregation::Micro];

    pub fn name(&self) -> &'static str {
        match self {
            LossAggregation::Macro => "macro",
            LossAggregation::Micro => "micro",
        }
    }
}

impl FromStr for FairnessGoal {
    type Err = BalanceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "odds" | "equalized_odds" => Ok(FairnessGoal::Odds),
            "strict" | "demographic_parity" => Ok(FairnessGoal::Strict),
            "opportunity" | "equal_opportunity" => Ok(FairnessGoal::Opportunity),
            _ => Err(BalanceError::InvalidConfiguration(format!(
                "unknown fairness goal '{}', expected one of: odds, strict, opportunity",
                s
            ))),
        }
    }
}

impl FromStr for LossAggregation {
    type Err = BalanceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "macro" => Ok(LossAggregation::Macro),
            "micro" => Ok(LossAggregation::Micro),
            _ => Err(BalanceError::InvalidConfiguration(format!(
                "unknown loss aggregation '{}', expected one of: macro, micro",
                s
            ))),
        }
    }
}

impl fmt::Display for FairnessGoal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for LossAggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-sample cost of predicting class `k` when the true class is `i`.
///
/// Rows are indexed by true class, columns by adjusted class, both in the
/// balancer's sorted class order.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct CostMatrix(pub Vec<Vec<f64>>);

impl CostMatrix {
    /// Plain misclassification cost: 0 on the diagonal, 1 elsewhere.
    pub fn zero_one(n_classes: usize) -> Self {
        CostMatrix(
            (0..n_classes)
                .map(|i| (0..n_classes).map(|k| if i == k { 0.0 } else { 1.0 }).collect())
                .collect(),
        )
    }

    pub fn n_classes(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn cost(&self, true_class: usize, adjusted: usize) -> f64 {
        self.0[true_class][adjusted]
    }

    pub fn validate(&self, n_classes: usize) -> Result<()> {
        if self.0.len() != n_classes || self.0.iter().any(|row| row.len() != n_classes) {
            return Err(BalanceError::InvalidConfiguration(format!(
                "cost matrix must be {0}x{0} to match the class domain",
                n_classes
            )));
        }
        if self.0.iter().flatten().any(|&c| !c.is_finite() || c < 0.0) {
            return Err(BalanceError::InvalidConfiguration(
                "cost matrix entries must be finite and nonnegative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Numerical settings for the linear-programming solve.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SolverConfig {
    /// Values with magnitude below this are treated as zero when pivoting.
    pub tolerance: f64,
    /// Upper bound on simplex pivots across both phases.
    pub max_iterations: usize,
    /// Small per-unit cost on moving mass off the diagonal, so that among
    /// equally good rules the one closest to the original predictions wins.
    pub tie_break: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-8,
            max_iterations: 50_000,
            tie_break: 1e-7,
        }
    }
}

impl SolverConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.tolerance.is_finite() && self.tolerance > 0.0 && self.tolerance < 1.0) {
            return Err(BalanceError::InvalidConfiguration(format!(
                "solver tolerance must lie in (0, 1), got {}",
                self.tolerance
            )));
        }
        if self.max_iterations == 0 {
            return Err(BalanceError::InvalidConfiguration(
                "solver iteration budget must be positive".to_string(),
            ));
        }
        if !(self.tie_break.is_finite() && self.tie_break >= 0.0) {
            return Err(BalanceError::InvalidConfiguration(format!(
                "tie-break weight must be finite and nonnegative, got {}",
                self.tie_break
            )));
        }
        Ok(())
    }
}

/// Everything one `adjust` call needs besides the data.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct BalanceConfig {
    pub goal: FairnessGoal,
    pub loss: LossAggregation,
    pub solver: SolverConfig,
    /// Custom cost matrix; `None` means 0/1 loss.
    pub cost: Option<CostMatrix>,
}

impl BalanceConfig {
    pub fn new(goal: FairnessGoal, loss: LossAggregation) -> Self {
        Self {
            goal,
            loss,
            ..Default::default()
        }
    }

    pub fn with_cost(mut self, cost: CostMatrix) -> Self {
        self.cost = Some(cost);
        self
    }

    pub fn with_solver(mut self, solver: SolverConfig) -> Self {
        self.solver = solver;
        self
    }

    /// Resolve the cost matrix for `n_classes`, validating a custom one.
    pub fn cost_matrix(&self, n_classes: usize) -> Result<CostMatrix> {
        match &self.cost {
            Some(cost) => {
                cost.validate(n_classes)?;
                Ok(cost.clone())
            }
            None => Ok(CostMatrix::zero_one(n_classes)),
        }
    }
}
