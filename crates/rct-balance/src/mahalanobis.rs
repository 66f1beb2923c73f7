use nalgebra::{DMatrix, DVector};
use rct_core::errors::{ErrorInfo, RctError};
use rct_core::{Assignment, Dataset};

use crate::aggregate::Aggregator;
use crate::objective::BalanceObjective;
use crate::score::Score;

/// Column label of the pairwise distance table.
pub const DISTANCE_COLUMN: &str = "mahalanobis";

/// Negated Mahalanobis distance between arm mean vectors.
///
/// The inverse covariance is estimated once over the whole dataset, so every
/// arm pair is measured in the same metric.
#[derive(Debug, Clone, Default)]
pub struct MahalanobisBalance {
    /// Covariates to balance; `None` selects every column.
    pub columns: Option<Vec<String>>,
    /// Reduction across arm pairs.
    pub treatment_aggregator: Aggregator,
}

impl MahalanobisBalance {
    /// Objective over every column with per-pair output.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the objective to the named covariates.
    pub fn with_columns<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the reduction across arm pairs.
    pub fn with_treatment_aggregator(mut self, aggregator: Aggregator) -> Self {
        self.treatment_aggregator = aggregator;
        self
    }

    /// Unnegated, unreduced distances with one row per arm pair `"a-b"`.
    pub fn distances(&self, dataset: &Dataset, assignment: &Assignment) -> Result<Score, RctError> {
        let data = numeric_matrix(dataset, self.columns.as_deref())?;
        let inverse_cov = inverse_covariance(&data)?;
        let arms = assignment.resolve(dataset.len())?;

        let mut means = Vec::with_capacity(arms.len());
        for arm in 0..arms.len() {
            let members: Vec<usize> = arms.members(arm).collect();
            if members.is_empty() {
                return Err(RctError::Balance(
                    ErrorInfo::new("balance-empty-arm", "arm has no units to average")
                        .with_context("arm", arm),
                ));
            }
            let mut mean = DVector::<f64>::zeros(data.ncols());
            for &unit in &members {
                mean += data.row(unit).transpose();
            }
            means.push(mean / members.len() as f64);
        }

        let mut labels = Vec::new();
        let mut distances = Vec::new();
        for a in 0..means.len() {
            for b in (a + 1)..means.len() {
                let delta = &means[a] - &means[b];
                let distance = (delta.transpose() * &inverse_cov * &delta)[(0, 0)];
                labels.push(format!("{a}-{b}"));
                distances.push(distance);
            }
        }
        Score::from_columns(labels, vec![(DISTANCE_COLUMN.to_string(), distances)])
    }
}

impl BalanceObjective for MahalanobisBalance {
    fn name(&self) -> &'static str {
        "mahalanobis"
    }

    fn score(&self, dataset: &Dataset, assignment: &Assignment) -> Result<Score, RctError> {
        let distances = self.distances(dataset, assignment)?;
        Ok(-distances.reduce_rows(&self.treatment_aggregator))
    }
}

/// Units by selected numeric covariates.
pub(crate) fn numeric_matrix(
    dataset: &Dataset,
    columns: Option<&[String]>,
) -> Result<DMatrix<f64>, RctError> {
    let selected = dataset.select(columns)?;
    if selected.is_empty() {
        return Err(RctError::Balance(ErrorInfo::new(
            "balance-no-covariates",
            "no covariates selected",
        )));
    }
    let mut data = DMatrix::<f64>::zeros(dataset.len(), selected.len());
    for (c, column) in selected.iter().enumerate() {
        let values = dataset.numeric(&column.name)?;
        for (r, &value) in values.iter().enumerate() {
            data[(r, c)] = value;
        }
    }
    Ok(data)
}

/// Inverse of the sample (n - 1) covariance of the columns of `data`.
fn inverse_covariance(data: &DMatrix<f64>) -> Result<DMatrix<f64>, RctError> {
    let n = data.nrows();
    if n < 2 {
        return Err(RctError::Balance(
            ErrorInfo::new("balance-too-few-units", "covariance needs at least two units")
                .with_context("units", n),
        ));
    }
    let means = data.row_mean();
    let mut centered = data.clone();
    for mut row in centered.row_iter_mut() {
        row -= &means;
    }
    let cov = centered.transpose() * &centered / (n as f64 - 1.0);
    let singular = || {
        RctError::Balance(
            ErrorInfo::new("balance-singular-covariance", "covariance matrix is not invertible")
                .with_context("covariates", data.ncols())
                .with_context("units", n)
                .with_hint("drop degenerate covariates or collect more units"),
        )
    };
    let inverse = cov.cholesky().ok_or_else(singular)?.inverse();
    if inverse.iter().all(|value| value.is_finite()) {
        Ok(inverse)
    } else {
        Err(singular())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_covariate_reduces_to_scaled_mean_gap() {
        let x = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let dataset = Dataset::from_numeric([("x", x.clone())]).unwrap();
        let assignment = Assignment::Labels(vec![0, 0, 0, 1, 1, 1]);
        let mean = x.iter().sum::<f64>() / 6.0;
        let var = x.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / 5.0;
        let expected = (2.0 - 5.0f64).powi(2) / var;

        let distances = MahalanobisBalance::new().distances(&dataset, &assignment).unwrap();
        assert_eq!(distances.rows(), &["0-1".to_string()]);
        assert!((distances.as_scalar().unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn constant_covariate_is_singular() {
        let dataset =
            Dataset::from_numeric([("x", vec![1.0, 2.0, 3.0, 4.0]), ("c", vec![1.0; 4])]).unwrap();
        let err = MahalanobisBalance::new()
            .score(&dataset, &Assignment::Labels(vec![0, 1, 0, 1]))
            .unwrap_err();
        assert_eq!(err.code(), "balance-singular-covariance");
    }

    #[test]
    fn three_arms_give_three_pairs() {
        let dataset = Dataset::from_numeric([
            ("x", vec![0.3, 1.2, -0.7, 0.9, 2.1, -1.4]),
            ("y", vec![1.1, -0.2, 0.4, 0.8, -1.3, 0.6]),
        ])
        .unwrap();
        let score = MahalanobisBalance::new()
            .score(&dataset, &Assignment::Labels(vec![0, 1, 2, 0, 1, 2]))
            .unwrap();
        assert_eq!(score.rows(), &["0-1", "0-2", "1-2"]);
        assert!(score.values().iter().all(|&v| v <= 0.0));
        let closest = MahalanobisBalance::new()
            .with_treatment_aggregator(Aggregator::Min)
            .score(&dataset, &Assignment::Labels(vec![0, 1, 2, 0, 1, 2]))
            .unwrap();
        let expected = score.values().iter().copied().fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(closest.as_scalar().unwrap(), expected);
    }
}
