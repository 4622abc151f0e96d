use thiserror::Error;

/// Failures reported by the balancer and its components.
///
/// None of these are fatal to the process: a failed `adjust` leaves the
/// balancer with whatever adjustment it held before the call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BalanceError {
    /// The true-label, predicted-label and group sequences differ in length.
    #[error("input lengths disagree: {y_true} true labels, {y_pred} predicted labels, {groups} group labels")]
    DimensionMismatch {
        y_true: usize,
        y_pred: usize,
        groups: usize,
    },

    /// A prediction call got a different number of predicted labels and
    /// group labels.
    #[error("prediction input lengths disagree: {predictions} predicted labels, {groups} group labels")]
    PredictionLengthMismatch { predictions: usize, groups: usize },

    /// Predicted labels that never occur among the true labels.
    #[error("predicted labels outside the true-label domain: {}", .labels.join(", "))]
    DomainMismatch { labels: Vec<String> },

    #[error("no samples were provided")]
    EmptyInput,

    /// Unknown goal/loss names, malformed cost matrices or solver settings.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The joint linear program could not be solved within tolerance and
    /// the iteration budget.
    #[error("no fair relabeling found: {reason}")]
    InfeasibleAdjustment { reason: String },

    /// A class or group label that was not seen when the balancer was built.
    #[error("unknown {kind} label '{label}'")]
    UnknownLabel { kind: LabelKind, label: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelKind {
    Class,
    Group,
}

impl std::fmt::Display for LabelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LabelKind::Class => write!(f, "class"),
            LabelKind::Group => write!(f, "group"),
        }
    }
}

pub type Result<T> = std::result::Result<T, BalanceError>;
