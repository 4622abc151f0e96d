//! Report builder and its downstream renderers.
//!
//! `summary` produces the structured, serializable report. `plots` and
//! `html` only ever consume a `Summary`.
pub mod html;
pub mod plots;
pub mod summary;

pub use summary::{build_summary, AdjustmentSummary, ExcludedClass, FairnessCheck, GroupSummary, Summary};
