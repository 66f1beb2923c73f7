//! Balance results: scalars or small labelled tables.

use std::ops::Neg;

use rct_core::errors::{ErrorInfo, RctError};
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregator;

/// Label used for both axes of a scalar score.
pub const SCALAR_LABEL: &str = "value";

/// Result of a balance objective.
///
/// Rows are keyed by arm or arm pair, columns by covariate. A 1x1 table is a
/// scalar; arithmetic broadcasts a scalar against any table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    rows: Vec<String>,
    columns: Vec<String>,
    values: Vec<f64>,
}

impl Score {
    /// A scalar score.
    pub fn scalar(value: f64) -> Self {
        Self {
            rows: vec![SCALAR_LABEL.to_string()],
            columns: vec![SCALAR_LABEL.to_string()],
            values: vec![value],
        }
    }

    /// Builds a table from row-major values.
    pub fn table(
        rows: Vec<String>,
        columns: Vec<String>,
        values: Vec<Vec<f64>>,
    ) -> Result<Self, RctError> {
        if values.len() != rows.len() || values.iter().any(|row| row.len() != columns.len()) {
            return Err(RctError::Balance(
                ErrorInfo::new("score-shape", "table values do not match its labels")
                    .with_context("rows", rows.len())
                    .with_context("columns", columns.len()),
            ));
        }
        Ok(Self {
            rows,
            columns,
            values: values.into_iter().flatten().collect(),
        })
    }

    /// Builds a table from per-column values (each of length `rows.len()`).
    pub fn from_columns(
        rows: Vec<String>,
        columns: Vec<(String, Vec<f64>)>,
    ) -> Result<Self, RctError> {
        let (names, cols): (Vec<String>, Vec<Vec<f64>>) = columns.into_iter().unzip();
        if cols.iter().any(|col| col.len() != rows.len()) {
            return Err(RctError::Balance(
                ErrorInfo::new("score-shape", "column length differs from row count")
                    .with_context("rows", rows.len()),
            ));
        }
        let values = (0..rows.len())
            .map(|r| cols.iter().map(|col| col[r]).collect())
            .collect();
        Self::table(rows, names, values)
    }

    /// Row labels.
    pub fn rows(&self) -> &[String] {
        &self.rows
    }

    /// Column labels.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// `(rows, columns)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.columns.len())
    }

    /// Row-major values.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Value at `(row, column)`.
    pub fn get(&self, row: usize, column: usize) -> Option<f64> {
        if row < self.rows.len() && column < self.columns.len() {
            Some(self.values[row * self.columns.len() + column])
        } else {
            None
        }
    }

    /// Values of one row.
    pub fn row(&self, row: usize) -> &[f64] {
        let width = self.columns.len();
        &self.values[row * width..(row + 1) * width]
    }

    /// Values of one column.
    pub fn column(&self, column: usize) -> Vec<f64> {
        (0..self.rows.len())
            .map(|row| self.values[row * self.columns.len() + column])
            .collect()
    }

    /// Whether the score holds exactly one value.
    pub fn is_scalar(&self) -> bool {
        self.values.len() == 1
    }

    /// The single value of a scalar score.
    pub fn as_scalar(&self) -> Result<f64, RctError> {
        if self.is_scalar() {
            Ok(self.values[0])
        } else {
            Err(RctError::Balance(
                ErrorInfo::new("score-not-scalar", "balance score is not reduced to one value")
                    .with_context("rows", self.rows.len())
                    .with_context("columns", self.columns.len())
                    .with_hint("configure treatment and covariate aggregators"),
            ))
        }
    }

    /// Replaces the row labels.
    pub fn with_row_labels(mut self, rows: Vec<String>) -> Result<Self, RctError> {
        if rows.len() != self.rows.len() {
            return Err(RctError::Balance(
                ErrorInfo::new("score-shape", "row label count differs from row count")
                    .with_context("expected", self.rows.len())
                    .with_context("actual", rows.len()),
            ));
        }
        self.rows = rows;
        Ok(self)
    }

    /// Applies `f` to every value.
    pub fn map(mut self, f: impl Fn(f64) -> f64) -> Self {
        for value in &mut self.values {
            *value = f(*value);
        }
        self
    }

    /// Reduces every column across rows (arms or arm pairs).
    pub fn reduce_rows(self, aggregator: &Aggregator) -> Self {
        if aggregator.is_identity() {
            return self;
        }
        let values = (0..self.columns.len())
            .map(|c| aggregator.reduce(&self.column(c)).unwrap_or(f64::NAN))
            .collect();
        Self {
            rows: vec![aggregator.label().to_string()],
            columns: self.columns,
            values,
        }
    }

    /// Reduces every row across columns (covariates).
    pub fn reduce_columns(self, aggregator: &Aggregator) -> Self {
        if aggregator.is_identity() {
            return self;
        }
        let values = (0..self.rows.len())
            .map(|r| aggregator.reduce(self.row(r)).unwrap_or(f64::NAN))
            .collect();
        Self {
            rows: self.rows,
            columns: vec![aggregator.label().to_string()],
            values,
        }
    }

    /// Elementwise combination; a scalar operand broadcasts.
    pub fn zip_with(
        &self,
        other: &Score,
        op: &str,
        f: impl Fn(f64, f64) -> f64,
    ) -> Result<Score, RctError> {
        if other.is_scalar() {
            let rhs = other.values[0];
            return Ok(self.clone().map(|lhs| f(lhs, rhs)));
        }
        if self.is_scalar() {
            let lhs = self.values[0];
            return Ok(other.clone().map(|rhs| f(lhs, rhs)));
        }
        if self.shape() != other.shape() {
            return Err(RctError::Balance(
                ErrorInfo::new("score-shape-mismatch", "cannot combine scores of different shapes")
                    .with_context("op", op)
                    .with_context("lhs", format!("{:?}", self.shape()))
                    .with_context("rhs", format!("{:?}", other.shape())),
            ));
        }
        Ok(Score {
            rows: self.rows.clone(),
            columns: self.columns.clone(),
            values: self
                .values
                .iter()
                .zip(&other.values)
                .map(|(&lhs, &rhs)| f(lhs, rhs))
                .collect(),
        })
    }
}

impl Neg for Score {
    type Output = Score;

    fn neg(self) -> Score {
        self.map(|value| -value)
    }
}

impl From<f64> for Score {
    fn from(value: f64) -> Self {
        Score::scalar(value)
    }
}
