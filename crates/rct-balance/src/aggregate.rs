//! Reductions applied across arms, covariates or category levels.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Reduction of a slice of balance values to one number.
///
/// `Identity` means "do not reduce": the objective keeps that axis of its
/// result table.
#[derive(Clone, Default)]
pub enum Aggregator {
    /// Keep the axis unreduced.
    #[default]
    Identity,
    /// Arithmetic mean.
    Mean,
    /// Minimum value.
    Min,
    /// Maximum value.
    Max,
    /// Sum of values.
    Sum,
    /// Maximum absolute value.
    MaxAbs,
    /// Caller supplied reduction.
    Custom(Arc<dyn Fn(&[f64]) -> f64 + Send + Sync>),
}

impl Aggregator {
    /// Wraps a closure as a custom aggregator.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&[f64]) -> f64 + Send + Sync + 'static,
    {
        Aggregator::Custom(Arc::new(f))
    }

    /// Returns `true` for the non-reducing aggregator.
    pub fn is_identity(&self) -> bool {
        matches!(self, Aggregator::Identity)
    }

    /// Reduces `values`; `None` for [`Aggregator::Identity`].
    pub fn reduce(&self, values: &[f64]) -> Option<f64> {
        let reduced = match self {
            Aggregator::Identity => return None,
            Aggregator::Mean => values.iter().sum::<f64>() / values.len() as f64,
            Aggregator::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Aggregator::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Aggregator::Sum => values.iter().sum(),
            Aggregator::MaxAbs => values.iter().map(|v| v.abs()).fold(0.0, f64::max),
            Aggregator::Custom(f) => f(values),
        };
        Some(reduced)
    }

    /// Label used for the reduced row or column.
    pub fn label(&self) -> &'static str {
        match self {
            Aggregator::Identity => "identity",
            Aggregator::Mean => "mean",
            Aggregator::Min => "min",
            Aggregator::Max => "max",
            Aggregator::Sum => "sum",
            Aggregator::MaxAbs => "max-abs",
            Aggregator::Custom(_) => "custom",
        }
    }
}

impl fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Aggregator({})", self.label())
    }
}

/// Serializable aggregator names used by configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum AggregatorName {
    /// See [`Aggregator::Identity`].
    #[default]
    Identity,
    /// See [`Aggregator::Mean`].
    Mean,
    /// See [`Aggregator::Min`].
    Min,
    /// See [`Aggregator::Max`].
    Max,
    /// See [`Aggregator::Sum`].
    Sum,
    /// See [`Aggregator::MaxAbs`].
    MaxAbs,
}

impl From<AggregatorName> for Aggregator {
    fn from(name: AggregatorName) -> Self {
        match name {
            AggregatorName::Identity => Aggregator::Identity,
            AggregatorName::Mean => Aggregator::Mean,
            AggregatorName::Min => Aggregator::Min,
            AggregatorName::Max => Aggregator::Max,
            AggregatorName::Sum => Aggregator::Sum,
            AggregatorName::MaxAbs => Aggregator::MaxAbs,
        }
    }
}
