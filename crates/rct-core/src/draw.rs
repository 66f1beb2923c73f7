//! Random arm-label draws driven by an explicit RNG handle.

use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::errors::{ErrorInfo, RctError};
use crate::rng::RngHandle;
use crate::weights::WeightVector;

/// How candidate label vectors are generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DrawMethod {
    /// Each unit draws its arm independently from the weights.
    Iid,
    /// Exact proportional arm counts, randomly permuted.
    #[default]
    Shuffled,
}

impl DrawMethod {
    /// Draws one label vector of length `units`.
    pub fn draw(
        &self,
        weights: &WeightVector,
        units: usize,
        rng: &mut RngHandle,
    ) -> Result<Vec<usize>, RctError> {
        match self {
            DrawMethod::Iid => draw_iid(weights, units, rng),
            DrawMethod::Shuffled => Ok(draw_shuffled(weights, units, rng)),
        }
    }

    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            DrawMethod::Iid => "iid",
            DrawMethod::Shuffled => "shuffled",
        }
    }
}

/// Independent weighted draw of one label per unit.
pub fn draw_iid(
    weights: &WeightVector,
    units: usize,
    rng: &mut RngHandle,
) -> Result<Vec<usize>, RctError> {
    let dist = WeightedIndex::new(weights.as_slice()).map_err(|err| {
        RctError::Rng(
            ErrorInfo::new("draw-weighted-index", err.to_string())
                .with_context("arms", weights.arms()),
        )
    })?;
    Ok((0..units).map(|_| dist.sample(rng)).collect())
}

/// Arm `i` receives `ceil(w_i * units)` slots; the slots are shuffled and the
/// first `units` kept, so over-allocation from rounding never lengthens the
/// label vector.
pub fn draw_shuffled(weights: &WeightVector, units: usize, rng: &mut RngHandle) -> Vec<usize> {
    let mut labels: Vec<usize> = weights
        .as_slice()
        .iter()
        .enumerate()
        .flat_map(|(arm, &weight)| {
            let count = (weight * units as f64 - 1e-9).ceil().max(0.0) as usize;
            std::iter::repeat(arm).take(count)
        })
        .collect();
    labels.shuffle(rng);
    labels.truncate(units);
    labels
}
