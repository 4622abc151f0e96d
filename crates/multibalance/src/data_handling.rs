//! Label domains and the encoded sample set the balancer is built from.
//!
//! Class and group labels are arbitrary strings on the way in. They are
//! sorted, deduplicated and replaced by dense indices so every downstream
//! component works on `usize` positions into fixed-size matrices.
use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{BalanceError, LabelKind, Result};

/// A sorted, deduplicated set of categorical labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct LabelDomain {
    labels: Vec<String>,
    index: HashMap<String, usize>,
}

impl LabelDomain {
    pub fn from_values<S: AsRef<str>>(values: &[S]) -> Self {
        let unique: BTreeSet<&str> = values.iter().map(|v| v.as_ref()).collect();
        Self::from(unique.into_iter().map(str::to_string).collect::<Vec<_>>())
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn label(&self, idx: usize) -> &str {
        &self.labels[idx]
    }

    pub fn position(&self, label: &str) -> Option<usize> {
        self.index.get(label).copied()
    }

    pub fn encode(&self, label: &str, kind: LabelKind) -> Result<usize> {
        self.position(label).ok_or_else(|| BalanceError::UnknownLabel {
            kind,
            label: label.to_string(),
        })
    }
}

impl From<Vec<String>> for LabelDomain {
    fn from(mut labels: Vec<String>) -> Self {
        labels.sort();
        labels.dedup();
        let index = labels
            .iter()
            .enumerate()
            .map(|(i, l)| (l.clone(), i))
            .collect();
        LabelDomain { labels, index }
    }
}

impl From<LabelDomain> for Vec<String> {
    fn from(domain: LabelDomain) -> Self {
        domain.labels
    }
}

/// Samples `(y, y_hat, a)` with every label replaced by its domain index.
#[derive(Debug, Clone)]
pub struct SampleSet {
    pub classes: LabelDomain,
    pub groups: LabelDomain,
    pub y_true: Vec<usize>,
    pub y_pred: Vec<usize>,
    pub group: Vec<usize>,
}

impl SampleSet {
    /// Validate and encode three parallel label sequences.
    ///
    /// The class domain is the set of distinct true labels; every predicted
    /// label must belong to it.
    pub fn from_labels<S: AsRef<str>, G: AsRef<str>>(
        y_true: &[S],
        y_pred: &[S],
        groups: &[G],
    ) -> Result<Self> {
        if y_true.len() != y_pred.len() || y_true.len() != groups.len() {
            return Err(BalanceError::DimensionMismatch {
                y_true: y_true.len(),
                y_pred: y_pred.len(),
                groups: groups.len(),
            });
        }
        if y_true.is_empty() {
            return Err(BalanceError::EmptyInput);
        }

        let classes = LabelDomain::from_values(y_true);
        let group_domain = LabelDomain::from_values(groups);

        let outside: BTreeSet<&str> = y_pred
            .iter()
            .map(|p| p.as_ref())
            .filter(|p| classes.position(p).is_none())
            .collect();
        if !outside.is_empty() {
            return Err(BalanceError::DomainMismatch {
                labels: outside.into_iter().map(str::to_string).collect(),
            });
        }

        let encode_all = |values: &[S], domain: &LabelDomain, kind| -> Result<Vec<usize>> {
            values
                .iter()
                .map(|v| domain.encode(v.as_ref(), kind))
                .collect()
        };
        let y_true_idx = encode_all(y_true, &classes, LabelKind::Class)?;
        let y_pred_idx = encode_all(y_pred, &classes, LabelKind::Class)?;
        let group_idx = groups
            .iter()
            .map(|g| group_domain.encode(g.as_ref(), LabelKind::Group))
            .collect::<Result<Vec<_>>>()?;

        Ok(SampleSet {
            classes,
            groups: group_domain,
            y_true: y_true_idx,
            y_pred: y_pred_idx,
            group: group_idx,
        })
    }

    pub fn len(&self) -> usize {
        self.y_true.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y_true.is_empty()
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn n_groups(&self) -> usize {
        self.groups.len()
    }

    /// Sample indices belonging to each group, in group-domain order.
    pub fn partition_by_group(&self) -> Vec<Vec<usize>> {
        let mut parts = vec![Vec::new(); self.n_groups()];
        for (i, &g) in self.group.iter().enumerate() {
            parts[g].push(i);
        }
        parts
    }

    pub fn log_input_data_summary(&self) {
        log::info!(
            "[multibalance::data] {} samples, {} classes ({}), {} groups ({})",
            self.len(),
            self.n_classes(),
            self.classes.labels().join(", "),
            self.n_groups(),
            self.groups.labels().join(", ")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_is_sorted_and_deduplicated() {
        let d = LabelDomain::from_values(&["b", "a", "c", "a"]);
        assert_eq!(d.labels(), &["a", "b", "c"]);
        assert_eq!(d.position("c"), Some(2));
        assert_eq!(d.position("z"), None);
    }

    #[test]
    fn predicted_labels_may_use_a_subset_of_classes() {
        let set = SampleSet::from_labels(&["x", "y", "z"], &["x", "x", "y"], &["g", "g", "h"])
            .unwrap();
        assert_eq!(set.n_classes(), 3);
        assert_eq!(set.y_pred, vec![0, 0, 1]);
        assert_eq!(set.partition_by_group(), vec![vec![0, 1], vec![2]]);
    }

    #[test]
    fn domain_round_trips_through_serde() {
        let d = LabelDomain::from_values(&["hi", "lo"]);
        let json = serde_json::to_string(&d).unwrap();
        assert_eq!(json, r#"["hi","lo"]"#);
        let back: LabelDomain = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d);
    }
}
