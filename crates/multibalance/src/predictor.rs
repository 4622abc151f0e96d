//! Applying solved relabeling matrices to new predictions.
use ndarray::{Array2, ArrayView1};
use rand::Rng;

use crate::data_handling::LabelDomain;
use crate::error::{BalanceError, LabelKind, Result};

/// Row-stochastic `K x K` matrix: row `j` is the distribution of the adjusted
/// label for an original prediction `j`.
#[derive(Debug, Clone, PartialEq)]
pub struct RelabelingMatrix {
    matrix: Array2<f64>,
}

impl RelabelingMatrix {
    pub fn identity(n_classes: usize) -> Self {
        Self {
            matrix: Array2::eye(n_classes),
        }
    }

    /// Wrap a square matrix whose rows are probability vectors within `tol`.
    pub fn from_array(matrix: Array2<f64>, tol: f64) -> Result<Self> {
        if matrix.nrows() != matrix.ncols() {
            return Err(BalanceError::InvalidConfiguration(format!(
                "relabeling matrix must be square, got {:?}",
                matrix.shape()
            )));
        }
        for (j, row) in matrix.rows().into_iter().enumerate() {
            let sum: f64 = row.sum();
            if (sum - 1.0).abs() > tol || row.iter().any(|&v| v < -tol || !v.is_finite()) {
                return Err(BalanceError::InvalidConfiguration(format!(
                    "relabeling row {} is not a probability vector (sum {})",
                    j, sum
                )));
            }
        }
        Ok(Self { matrix })
    }

    pub fn n_classes(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn as_array(&self) -> &Array2<f64> {
        &self.matrix
    }

    /// Distribution of the adjusted label for original prediction `pred`.
    pub fn row(&self, pred: usize) -> ArrayView1<'_, f64> {
        self.matrix.row(pred)
    }

    /// Draw an adjusted label for original prediction `pred`.
    pub fn sample<R: Rng + ?Sized>(&self, pred: usize, rng: &mut R) -> usize {
        let row = self.matrix.row(pred);
        let u: f64 = rng.gen::<f64>();
        let mut cumulative = 0.0;
        let mut last_positive = pred;
        for (k, &p) in row.iter().enumerate() {
            if p <= 0.0 {
                continue;
            }
            cumulative += p;
            last_positive = k;
            if u < cumulative {
                return k;
            }
        }
        // u landed in the rounding slack above the last cumulative sum
        last_positive
    }

    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.matrix.rows().into_iter().map(|r| r.to_vec()).collect()
    }

    /// Largest absolute deviation from the identity matrix.
    pub fn distance_from_identity(&self) -> f64 {
        self.matrix
            .indexed_iter()
            .map(|((j, k), &v)| (v - if j == k { 1.0 } else { 0.0 }).abs())
            .fold(0.0, f64::max)
    }
}

/// The adjusted randomized classifier: one relabeling matrix per group.
#[derive(Debug, Clone, Copy)]
pub struct RandomizedPredictor<'a> {
    classes: &'a LabelDomain,
    groups: &'a LabelDomain,
    rules: &'a [RelabelingMatrix],
}

impl<'a> RandomizedPredictor<'a> {
    pub fn new(
        classes: &'a LabelDomain,
        groups: &'a LabelDomain,
        rules: &'a [RelabelingMatrix],
    ) -> Self {
        Self {
            classes,
            groups,
            rules,
        }
    }

    fn encode(&self, pred: &str, group: &str) -> Result<(usize, usize)> {
        Ok((
            self.classes.encode(pred, LabelKind::Class)?,
            self.groups.encode(group, LabelKind::Group)?,
        ))
    }

    /// Adjusted label probabilities, in class-domain order.
    pub fn proba_one(&self, pred: &str, group: &str) -> Result<Vec<f64>> {
        let (j, g) = self.encode(pred, group)?;
        Ok(self.rules[g].row(j).to_vec())
    }

    pub fn predict_one<R: Rng + ?Sized>(&self, pred: &str, group: &str, rng: &mut R) -> Result<&'a str> {
        let (j, g) = self.encode(pred, group)?;
        Ok(self.classes.label(self.rules[g].sample(j, rng)))
    }

    /// Sampled adjusted labels for parallel prediction/group sequences.
    ///
    /// Samples are drawn in input order, so a seeded `rng` reproduces the
    /// same output.
    pub fn predict<S, G, R>(&self, preds: &[S], groups: &[G], rng: &mut R) -> Result<Vec<String>>
    where
        S: AsRef<str>,
        G: AsRef<str>,
        R: Rng + ?Sized,
    {
        check_lengths(preds.len(), groups.len())?;
        preds
            .iter()
            .zip(groups)
            .map(|(p, g)| self.predict_one(p.as_ref(), g.as_ref(), rng).map(str::to_string))
            .collect()
    }

    pub fn predict_proba<S, G>(&self, preds: &[S], groups: &[G]) -> Result<Vec<Vec<f64>>>
    where
        S: AsRef<str>,
        G: AsRef<str>,
    {
        check_lengths(preds.len(), groups.len())?;
        preds
            .iter()
            .zip(groups)
            .map(|(p, g)| self.proba_one(p.as_ref(), g.as_ref()))
            .collect()
    }
}

fn check_lengths(preds: usize, groups: usize) -> Result<()> {
    if preds != groups {
        return Err(BalanceError::PredictionLengthMismatch {
            predictions: preds,
            groups,
        });
    }
    Ok(())
}
