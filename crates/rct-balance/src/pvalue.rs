use nalgebra::{DMatrix, DVector};
use rct_core::errors::{ErrorInfo, RctError};
use rct_core::{Assignment, Dataset};
use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::aggregate::Aggregator;
use crate::objective::BalanceObjective;
use crate::score::Score;

/// Regression p-value balance.
///
/// Each covariate is regressed on an intercept plus arm dummies; the p-values
/// of the dummy coefficients test whether an arm differs from the baseline
/// arm. Larger p-values mean the arms are statistically indistinguishable, so
/// no sign flip is applied.
#[derive(Debug, Clone, Default)]
pub struct PValueBalance {
    /// Covariates to balance; `None` selects every column.
    pub columns: Option<Vec<String>>,
    /// Reduction across arm dummies, per covariate.
    pub treatment_aggregator: Aggregator,
    /// Reduction across covariates.
    pub covariate_aggregator: Aggregator,
}

impl PValueBalance {
    /// Objective over every column with unreduced output.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the objective to the named covariates.
    pub fn with_columns<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the reduction across arm dummies.
    pub fn with_treatment_aggregator(mut self, aggregator: Aggregator) -> Self {
        self.treatment_aggregator = aggregator;
        self
    }

    /// Sets the reduction across covariates.
    pub fn with_covariate_aggregator(mut self, aggregator: Aggregator) -> Self {
        self.covariate_aggregator = aggregator;
        self
    }

    /// Unreduced p-values: one row per included arm dummy (`t{arm}`), one
    /// column per selected covariate.
    pub fn pvalues(&self, dataset: &Dataset, assignment: &Assignment) -> Result<Score, RctError> {
        let units = dataset.len();
        let resolved = assignment.resolve(units)?;
        let mut dummies = assignment.declared_masks(units)?;
        // Dummies summing to the intercept would make the design rank deficient.
        if !resolved.has_implicit() {
            dummies.pop();
        }
        if dummies.is_empty() {
            return Err(RctError::Balance(
                ErrorInfo::new("balance-no-contrast", "p-value balance needs at least two arms")
                    .with_context("arms", resolved.len()),
            ));
        }
        let fit = TreatmentRegression::new(&dummies)?;

        let selected = dataset.select(self.columns.as_deref())?;
        let mut columns = Vec::with_capacity(selected.len());
        for column in selected {
            let values = dataset.numeric(&column.name)?;
            let pvalues = fit.pvalues(values).map_err(|err| match err {
                RctError::Balance(info) => {
                    RctError::Balance(info.with_context("column", &column.name))
                }
                other => other,
            })?;
            columns.push((column.name.clone(), pvalues));
        }
        let rows = (0..dummies.len()).map(|arm| format!("t{arm}")).collect();
        Score::from_columns(rows, columns)
    }
}

impl BalanceObjective for PValueBalance {
    fn name(&self) -> &'static str {
        "pvalue"
    }

    fn score(&self, dataset: &Dataset, assignment: &Assignment) -> Result<Score, RctError> {
        Ok(self
            .pvalues(dataset, assignment)?
            .reduce_rows(&self.treatment_aggregator)
            .reduce_columns(&self.covariate_aggregator))
    }
}

/// Relative residual size below which a fit counts as exact.
const FIT_TOLERANCE: f64 = 1e3 * f64::EPSILON;

/// OLS design `[1, d_1, .., d_m]` shared by every covariate of one assignment.
struct TreatmentRegression {
    design: DMatrix<f64>,
    gram_inverse: DMatrix<f64>,
    dist: StudentsT,
    dof: usize,
}

impl TreatmentRegression {
    fn new(dummies: &[Vec<bool>]) -> Result<Self, RctError> {
        let units = dummies.first().map_or(0, Vec::len);
        let params = dummies.len() + 1;
        if units <= params {
            return Err(RctError::Balance(
                ErrorInfo::new("balance-no-residual-dof", "regression has no residual degrees of freedom")
                    .with_context("units", units)
                    .with_context("parameters", params),
            ));
        }
        let design = DMatrix::from_fn(units, params, |r, c| {
            if c == 0 || dummies[c - 1][r] {
                1.0
            } else {
                0.0
            }
        });
        let gram = design.transpose() * &design;
        let gram_inverse = gram
            .cholesky()
            .ok_or_else(|| {
                RctError::Balance(
                    ErrorInfo::new("balance-rank-deficient", "treatment dummies are collinear")
                        .with_context("parameters", params)
                        .with_hint("every arm needs at least one unit"),
                )
            })?
            .inverse();
        let dof = units - params;
        let dist = StudentsT::new(0.0, 1.0, dof as f64).map_err(|err| {
            RctError::Balance(ErrorInfo::new("balance-student-t", err.to_string()))
        })?;
        Ok(Self {
            design,
            gram_inverse,
            dist,
            dof,
        })
    }

    /// Two-sided p-values of the non-intercept coefficients.
    fn pvalues(&self, values: &[f64]) -> Result<Vec<f64>, RctError> {
        // The intercept absorbs the location, so centring leaves the slopes
        // unchanged and keeps large offsets from swamping the spread.
        let units = values.len() as f64;
        let mean = values.iter().sum::<f64>() / units;
        let y = DVector::from_iterator(values.len(), values.iter().map(|value| value - mean));
        let beta = &self.gram_inverse * (self.design.transpose() * &y);
        let residuals = &y - &self.design * &beta;
        let rss = residuals.norm_squared();
        let noise_floor = FIT_TOLERANCE.powi(2) * (y.norm_squared() + units * mean * mean);
        let sigma2 = rss / self.dof as f64;
        if !(rss.is_finite() && rss > noise_floor) {
            return Err(RctError::Balance(
                ErrorInfo::new("balance-degenerate-fit", "residual variance vanishes")
                    .with_hint("covariate is constant within every arm"),
            ));
        }
        let mut pvalues = Vec::with_capacity(beta.len() - 1);
        for j in 1..beta.len() {
            let se = (sigma2 * self.gram_inverse[(j, j)]).sqrt();
            let t = beta[j] / se;
            let p = 2.0 * (1.0 - self.dist.cdf(t.abs()));
            if !p.is_finite() {
                return Err(RctError::Balance(
                    ErrorInfo::new("balance-degenerate-fit", "non-finite p-value")
                        .with_context("coefficient", j),
                ));
            }
            pvalues.push(p.clamp(0.0, 1.0));
        }
        Ok(pvalues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_arm_means_give_unit_pvalue() {
        let dataset = Dataset::from_numeric([("x", vec![1.0, 3.0, 1.0, 3.0, 2.0, 2.0])]).unwrap();
        let score = PValueBalance::new()
            .pvalues(&dataset, &Assignment::Labels(vec![0, 0, 1, 1, 0, 1]))
            .unwrap();
        assert_eq!(score.shape(), (1, 1));
        assert!((score.as_scalar().unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn two_sample_t_test_matches_textbook_value() {
        // Pooled two-sample t statistic for {1,2,3} vs {4,5,6}: t = -3.6742, df = 4.
        let dataset = Dataset::from_numeric([("x", vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0])]).unwrap();
        let score = PValueBalance::new()
            .pvalues(&dataset, &Assignment::Labels(vec![0, 0, 0, 1, 1, 1]))
            .unwrap();
        let p = score.as_scalar().unwrap();
        assert!((p - 0.021312).abs() < 1e-4, "p = {p}");
    }

    #[test]
    fn uncovered_units_form_the_baseline() {
        let dataset = Dataset::from_numeric([
            ("a", vec![0.5, 1.5, 0.2, 0.9, 1.1, 0.3, 0.8, 1.4, 0.1]),
            ("b", vec![2.0, 1.0, 3.0, 2.5, 1.5, 2.2, 1.8, 2.9, 1.2]),
        ])
        .unwrap();
        let assignment = Assignment::from_positions(vec![vec![0, 1, 2], vec![3, 4, 5]]);
        let score = PValueBalance::new().pvalues(&dataset, &assignment).unwrap();
        assert_eq!(score.shape(), (2, 2));
        assert_eq!(score.columns(), &["a", "b"]);
        assert!(score.values().iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn constant_covariate_surfaces_regression_failure() {
        let dataset = Dataset::from_numeric([("c", vec![4.0; 6])]).unwrap();
        let err = PValueBalance::new()
            .score(&dataset, &Assignment::Labels(vec![0, 1, 0, 1, 0, 1]))
            .unwrap_err();
        assert_eq!(err.code(), "balance-degenerate-fit");
        assert_eq!(err.info().context["column"], "c");
    }

    #[test]
    fn pvalues_ignore_covariate_location() {
        let offsets = vec![3.0, -12.0, 25.0, 7.5, -20.0, 14.0, -3.5, 9.0, -25.0, 1.0];
        let shifted: Vec<f64> = offsets.iter().map(|v| v + 1.7e9).collect();
        let labels = Assignment::Labels(vec![0, 1, 0, 1, 0, 1, 0, 1, 0, 1]);
        let dataset = Dataset::from_numeric([("offset", offsets), ("enrolled_at", shifted)]).unwrap();
        let score = PValueBalance::new().pvalues(&dataset, &labels).unwrap();
        let (near, far) = (score.row(0)[0], score.row(0)[1]);
        assert!(near > 0.0 && near < 1.0);
        assert!((near - far).abs() < 1e-6, "{near} vs {far}");

        let constant = Dataset::from_numeric([("c", vec![1.7e9 + 0.1; 10])]).unwrap();
        let err = PValueBalance::new().pvalues(&constant, &labels).unwrap_err();
        assert_eq!(err.code(), "balance-degenerate-fit");
    }

    #[test]
    fn empty_arm_is_rank_deficient() {
        let dataset = Dataset::from_numeric([("x", vec![1.0, 2.0, 3.0, 4.0, 5.0])]).unwrap();
        let assignment = Assignment::from_positions(vec![vec![0, 1], vec![]]);
        let err = PValueBalance::new().score(&dataset, &assignment).unwrap_err();
        assert_eq!(err.code(), "balance-rank-deficient");
    }
}
