use rct_core::errors::{ErrorInfo, RctError};
use rct_core::{Assignment, Dataset};

use crate::aggregate::Aggregator;
use crate::objective::BalanceObjective;
use crate::score::Score;

/// Categorical block balance.
///
/// Counts units per covariate level in every arm and measures how far each
/// arm's counts stray from the per-level median across arms.
#[derive(Debug, Clone)]
pub struct BlockBalance {
    /// Covariates to balance; `None` selects every column.
    pub columns: Option<Vec<String>>,
    /// Reduction across arms, per covariate.
    pub treatment_aggregator: Aggregator,
    /// Reduction across covariates.
    pub covariate_aggregator: Aggregator,
    /// Reduction of one arm's relative deviations across levels.
    pub category_aggregator: Aggregator,
}

impl Default for BlockBalance {
    fn default() -> Self {
        Self {
            columns: None,
            treatment_aggregator: Aggregator::Identity,
            covariate_aggregator: Aggregator::Identity,
            category_aggregator: Aggregator::MaxAbs,
        }
    }
}

impl BlockBalance {
    /// Objective over every column with per-arm, per-covariate output.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the objective to the named covariates.
    pub fn with_columns<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the reduction across arms.
    pub fn with_treatment_aggregator(mut self, aggregator: Aggregator) -> Self {
        self.treatment_aggregator = aggregator;
        self
    }

    /// Sets the reduction across covariates.
    pub fn with_covariate_aggregator(mut self, aggregator: Aggregator) -> Self {
        self.covariate_aggregator = aggregator;
        self
    }

    /// Sets the reduction across category levels.
    pub fn with_category_aggregator(mut self, aggregator: Aggregator) -> Self {
        self.category_aggregator = aggregator;
        self
    }

    /// Per-arm unit counts of every level of `column` (arms x sorted levels).
    pub fn level_counts(
        &self,
        dataset: &Dataset,
        assignment: &Assignment,
        column: &str,
    ) -> Result<Vec<Vec<usize>>, RctError> {
        let arms = assignment.resolve(dataset.len())?;
        let (levels, level_count) = dataset.column(column)?.values.level_indices();
        Ok(arms
            .masks()
            .iter()
            .map(|mask| {
                let mut counts = vec![0usize; level_count];
                for (&level, &member) in levels.iter().zip(mask) {
                    if member {
                        counts[level] += 1;
                    }
                }
                counts
            })
            .collect())
    }

    /// Relative deviations reduced across levels: rows `t{arm}`, one column
    /// per covariate. Not yet reduced across arms or covariates.
    pub fn deviations(&self, dataset: &Dataset, assignment: &Assignment) -> Result<Score, RctError> {
        if self.category_aggregator.is_identity() {
            return Err(RctError::Balance(
                ErrorInfo::new("balance-category-aggregator", "levels must be reduced to one value per arm")
                    .with_hint("use max-abs, mean or another reducing aggregator"),
            ));
        }
        let arms = assignment.resolve(dataset.len())?.len();
        let selected = dataset.select(self.columns.as_deref())?;
        let mut columns = Vec::with_capacity(selected.len());
        for column in selected {
            let counts = self.level_counts(dataset, assignment, &column.name)?;
            let medians = level_medians(&counts);
            let per_arm = counts
                .iter()
                .map(|arm_counts| {
                    let relative: Vec<f64> = arm_counts
                        .iter()
                        .zip(&medians)
                        .map(|(&count, &median)| relative_deviation(count as f64, median))
                        .collect();
                    self.category_aggregator.reduce(&relative).unwrap_or(f64::NAN)
                })
                .collect();
            columns.push((column.name.clone(), per_arm));
        }
        let rows = (0..arms).map(|arm| format!("t{arm}")).collect();
        Score::from_columns(rows, columns)
    }
}

impl BalanceObjective for BlockBalance {
    fn name(&self) -> &'static str {
        "block"
    }

    fn score(&self, dataset: &Dataset, assignment: &Assignment) -> Result<Score, RctError> {
        let deviations = self
            .deviations(dataset, assignment)?
            .reduce_rows(&self.treatment_aggregator)
            .reduce_columns(&self.covariate_aggregator);
        Ok(-deviations)
    }
}

fn level_medians(counts: &[Vec<usize>]) -> Vec<f64> {
    let levels = counts.first().map_or(0, Vec::len);
    (0..levels)
        .map(|level| {
            let mut column: Vec<usize> = counts.iter().map(|arm| arm[level]).collect();
            column.sort_unstable();
            let mid = column.len() / 2;
            if column.len() % 2 == 0 {
                (column[mid - 1] + column[mid]) as f64 / 2.0
            } else {
                column[mid] as f64
            }
        })
        .collect()
}

/// `(count - median) / median`; an empty median level is balanced only when
/// the arm is empty at that level too.
fn relative_deviation(count: f64, median: f64) -> f64 {
    if median > 0.0 {
        (count - median) / median
    } else if count == 0.0 {
        0.0
    } else {
        f64::INFINITY
    }
}
