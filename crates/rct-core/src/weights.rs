//! Arm probability vectors.

use serde::{Deserialize, Serialize};

use crate::errors::{ErrorInfo, RctError};

/// Tolerance under which a weight sum is considered to be exactly one.
pub const WEIGHT_TOLERANCE: f64 = 1e-9;

/// Weights as written by a caller: a treatment probability or a vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WeightSpec {
    /// Probability of the single treatment arm of a two-arm design.
    Scalar(f64),
    /// One weight per arm, possibly leaving a shortfall for arm 0.
    Vector(Vec<f64>),
}

impl WeightSpec {
    /// Normalizes the weights into a full distribution.
    pub fn normalize(&self) -> Result<WeightVector, RctError> {
        match self {
            WeightSpec::Scalar(p) => WeightVector::from_scalar(*p),
            WeightSpec::Vector(weights) => WeightVector::normalize(weights),
        }
    }
}

impl From<f64> for WeightSpec {
    fn from(value: f64) -> Self {
        WeightSpec::Scalar(value)
    }
}

impl From<Vec<f64>> for WeightSpec {
    fn from(value: Vec<f64>) -> Self {
        WeightSpec::Vector(value)
    }
}

/// Full arm probability distribution: non-negative, sums to one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightVector(Vec<f64>);

impl WeightVector {
    /// Two-arm design `[1 - p, p]`.
    pub fn from_scalar(p: f64) -> Result<Self, RctError> {
        Self::normalize(&[p])
    }

    /// Validates the weights and prepends the shortfall arm when they sum to
    /// less than one. Sums above one are rejected rather than rescaled.
    pub fn normalize(weights: &[f64]) -> Result<Self, RctError> {
        if weights.is_empty() {
            return Err(RctError::Weights(ErrorInfo::new(
                "weights-empty",
                "at least one arm weight is required",
            )));
        }
        for (arm, &weight) in weights.iter().enumerate() {
            if !weight.is_finite() || weight < 0.0 {
                return Err(RctError::Weights(
                    ErrorInfo::new("weights-invalid-entry", "weights must be finite and non-negative")
                        .with_context("arm", arm)
                        .with_context("weight", weight),
                ));
            }
        }
        let total: f64 = weights.iter().sum();
        if total > 1.0 + WEIGHT_TOLERANCE {
            return Err(RctError::Weights(
                ErrorInfo::new("weights-sum-exceeds-one", "arm weights sum to more than one")
                    .with_context("sum", total)
                    .with_hint("weights are used as probabilities and are never rescaled"),
            ));
        }
        let mut normalized = Vec::with_capacity(weights.len() + 1);
        if total < 1.0 - WEIGHT_TOLERANCE {
            normalized.push(1.0 - total);
        }
        normalized.extend_from_slice(weights);
        Ok(Self(normalized))
    }

    /// Number of arms in the design.
    pub fn arms(&self) -> usize {
        self.0.len()
    }

    /// Arm probabilities in arm order.
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-12, "{actual:?} != {expected:?}");
        }
    }

    #[test]
    fn scalar_becomes_two_arm_design() {
        assert_close(WeightVector::from_scalar(0.1).unwrap().as_slice(), &[0.9, 0.1]);
    }

    #[test]
    fn shortfall_is_prepended() {
        assert_close(
            WeightVector::normalize(&[0.1, 0.3]).unwrap().as_slice(),
            &[0.6, 0.1, 0.3],
        );
    }

    #[test]
    fn complete_vector_is_untouched() {
        assert_close(WeightVector::normalize(&[0.1, 0.9]).unwrap().as_slice(), &[0.1, 0.9]);
    }

    #[test]
    fn invalid_vectors_fail_fast() {
        assert_eq!(
            WeightVector::normalize(&[0.6, 0.6]).unwrap_err().code(),
            "weights-sum-exceeds-one"
        );
        assert_eq!(
            WeightVector::normalize(&[-0.1, 0.5]).unwrap_err().code(),
            "weights-invalid-entry"
        );
        assert_eq!(WeightVector::normalize(&[]).unwrap_err().code(), "weights-empty");
    }

    #[test]
    fn weight_spec_deserializes_scalar_or_vector() {
        let scalar: WeightSpec = serde_json::from_str("0.5").unwrap();
        let vector: WeightSpec = serde_json::from_str("[0.3, 0.3]").unwrap();
        assert_eq!(scalar.normalize().unwrap().arms(), 2);
        assert_eq!(vector.normalize().unwrap().arms(), 3);
    }
}
