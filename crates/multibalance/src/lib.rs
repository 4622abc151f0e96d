//! multibalance: fairness post-processing for multiclass classifiers.
//!
//! Given true labels, a classifier's predicted labels and a group attribute,
//! the balancer finds one randomized relabeling matrix per group so that the
//! adjusted predictions satisfy a fairness goal (equalized odds, equal
//! opportunity or group-independent outputs) at minimum expected loss. The
//! matrices come from a single linear program spanning all groups.
//!
//! ```no_run
//! use multibalance::{FairnessGoal, LossAggregation, MulticlassBalancer};
//!
//! # fn main() -> multibalance::Result<()> {
//! let y_true = ["low", "high", "high", "low"];
//! let y_pred = ["low", "high", "low", "low"];
//! let groups = ["a", "a", "b", "b"];
//! let mut balancer = MulticlassBalancer::new(&y_true, &y_pred, &groups)?;
//! balancer.adjust(FairnessGoal::Odds, LossAggregation::Macro)?;
//! println!("{}", balancer.summary());
//! # Ok(())
//! # }
//! ```
pub mod balancer;
pub mod config;
pub mod constraints;
pub mod data_handling;
pub mod error;
pub mod io;
pub mod math;
pub mod objective;
pub mod predictor;
pub mod report;
pub mod solver;
pub mod stats;

pub use balancer::{BalancerState, MulticlassBalancer};
pub use config::{BalanceConfig, CostMatrix, FairnessGoal, LossAggregation, SolverConfig};
pub use error::{BalanceError, Result};
pub use predictor::{RandomizedPredictor, RelabelingMatrix};
pub use report::Summary;
pub use solver::AdjustmentResult;
