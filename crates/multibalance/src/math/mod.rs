//! Numerical building blocks.
//!
//! `simplex` is a small dense linear-programming solver sized for the joint
//! relabeling problem: a few hundred variables at most, one equality row per
//! simplex or fairness constraint.
pub mod simplex;

pub use simplex::{solve, LinearConstraint, LinearProgram, LpSolution, SimplexConfig, SimplexError};
