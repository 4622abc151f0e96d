use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data_handling::SampleSet;

/// Empirical joint distribution of (true class, predicted class) in one group.
#[derive(Debug, Clone)]
pub struct GroupJointDistribution {
    /// `counts[[i, j]]`: samples in the group with true class `i` predicted as `j`.
    pub counts: Array2<usize>,
    /// `counts` divided by the group size, so the matrix sums to 1.
    pub joint: Array2<f64>,
    /// Samples per true class in the group.
    pub class_counts: Vec<usize>,
    /// `P(y = i | a)`.
    pub priors: Vec<f64>,
    pub n_samples: usize,
}

/// A true class that never occurs in a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZeroSupport {
    pub group: usize,
    pub class: usize,
}

/// Output of the confusion estimator for the whole sample set.
#[derive(Debug, Clone)]
pub struct ConfusionEstimate {
    pub groups: Vec<GroupJointDistribution>,
    /// Samples per true class over all groups.
    pub class_totals: Vec<usize>,
    pub n_samples: usize,
    pub n_classes: usize,
}

impl GroupJointDistribution {
    /// Tally `(true, predicted)` index pairs into a `n_classes x n_classes` table.
    pub fn from_pairs<I>(n_classes: usize, pairs: I) -> Self
    where
        I: IntoIterator<Item = (usize, usize)>,
    {
        let mut counts = Array2::<usize>::zeros((n_classes, n_classes));
        for (y, y_hat) in pairs {
            counts[[y, y_hat]] += 1;
        }
        Self::from_counts(counts)
    }

    pub fn from_counts(counts: Array2<usize>) -> Self {
        let n_samples: usize = counts.iter().sum();
        let class_counts: Vec<usize> = counts.rows().into_iter().map(|r| r.sum()).collect();
        let denom = n_samples.max(1) as f64;
        let joint = counts.mapv(|c| c as f64 / denom);
        let priors = class_counts.iter().map(|&c| c as f64 / denom).collect();
        GroupJointDistribution {
            counts,
            joint,
            class_counts,
            priors,
            n_samples,
        }
    }

    pub fn n_classes(&self) -> usize {
        self.class_counts.len()
    }

    #[inline]
    pub fn has_support(&self, class: usize) -> bool {
        self.class_counts[class] > 0
    }

    /// `P(y_hat = j | y = i, a)` for a supported class `i`.
    pub fn conditional_row(&self, class: usize) -> Option<Array1<f64>> {
        if !self.has_support(class) {
            return None;
        }
        let n = self.class_counts[class] as f64;
        Some(self.counts.row(class).mapv(|c| c as f64 / n))
    }

    /// Row-conditional confusion matrix. Rows of unsupported classes are zero.
    pub fn conditional(&self) -> Array2<f64> {
        row_conditional(&self.joint, &self.priors)
    }

    /// Joint distribution of (true class, adjusted class) under `relabeling`.
    pub fn compose(&self, relabeling: &Array2<f64>) -> Array2<f64> {
        self.joint.dot(relabeling)
    }
}

/// Divide every row of a joint matrix by its class prior, leaving rows with
/// zero prior at zero.
pub fn row_conditional(joint: &Array2<f64>, priors: &[f64]) -> Array2<f64> {
    let mut out = joint.clone();
    for (mut row, &p) in out.rows_mut().into_iter().zip(priors) {
        if p > 0.0 {
            row.mapv_inplace(|v| v / p);
        } else {
            row.fill(0.0);
        }
    }
    out
}

impl ConfusionEstimate {
    pub fn n_groups(&self) -> usize {
        self.groups.len()
    }

    /// Every (group, class) pair where the class has no samples in the group.
    pub fn zero_support(&self) -> Vec<ZeroSupport> {
        self.groups
            .iter()
            .enumerate()
            .flat_map(|(g, dist)| {
                (0..self.n_classes)
                    .filter(move |&i| !dist.has_support(i))
                    .map(move |i| ZeroSupport { group: g, class: i })
            })
            .collect()
    }

    /// Share of all samples that belong to group `g`.
    pub fn group_weight(&self, g: usize) -> f64 {
        self.groups[g].n_samples as f64 / self.n_samples.max(1) as f64
    }
}

/// Build per-group joint distributions from an encoded sample set.
///
/// Groups have no data dependency on each other, so they are tallied in
/// parallel and collected back in group order.
pub fn estimate_confusion(samples: &SampleSet) -> ConfusionEstimate {
    let n_classes = samples.n_classes();
    let partitions = samples.partition_by_group();

    let groups: Vec<GroupJointDistribution> = partitions
        .into_par_iter()
        .map(|indices| {
            GroupJointDistribution::from_pairs(
                n_classes,
                indices
                    .iter()
                    .map(|&i| (samples.y_true[i], samples.y_pred[i])),
            )
        })
        .collect();

    let mut class_totals = vec![0usize; n_classes];
    for dist in &groups {
        for (total, &c) in class_totals.iter_mut().zip(&dist.class_counts) {
            *total += c;
        }
    }

    for (g, dist) in groups.iter().enumerate() {
        log::debug!(
            "[multibalance::stats] group '{}': {} samples, class counts {:?}",
            samples.groups.label(g),
            dist.n_samples,
            dist.class_counts
        );
    }

    ConfusionEstimate {
        groups,
        class_totals,
        n_samples: samples.len(),
        n_classes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joint_is_normalised_within_group() {
        let dist = GroupJointDistribution::from_pairs(2, vec![(0, 0), (0, 1), (1, 1), (1, 1)]);
        assert_eq!(dist.n_samples, 4);
        assert!((dist.joint.sum() - 1.0).abs() < 1e-12);
        assert_eq!(dist.class_counts, vec![2, 2]);
        assert!((dist.joint[[1, 1]] - 0.5).abs() < 1e-12);
        let cond = dist.conditional();
        assert!((cond[[0, 1]] - 0.5).abs() < 1e-12);
        assert!((cond[[1, 1]] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn unsupported_class_has_no_conditional_row() {
        let dist = GroupJointDistribution::from_pairs(3, vec![(0, 0), (1, 2)]);
        assert!(!dist.has_support(2));
        assert!(dist.conditional_row(2).is_none());
        assert_eq!(dist.priors[2], 0.0);
        assert!(dist.conditional().row(2).iter().all(|&v| v == 0.0));
    }
}
