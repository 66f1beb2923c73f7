//! Rerandomization search over seeded candidate draws.

use std::io::Write;

use csv::WriterBuilder;
use rand::Rng;
use rct_balance::{BalanceObjective, Objective};
use rct_core::errors::{ErrorInfo, RctError};
use rct_core::{Assignment, Dataset, DrawMethod, RngHandle, WeightVector};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::determinism::{self, PICK_SUBSTREAM};
use crate::quantile::TopK;

/// How a design selects its final assignment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SearchPolicy {
    /// Accept the first draw.
    Plain,
    /// Keep the best of `k` draws.
    Rerandomized {
        /// Number of draws; defaults to the sample size.
        #[serde(default)]
        k: Option<usize>,
    },
    /// Pick uniformly among the top `quantile` of `k` draws.
    QuantileTarget {
        /// Number of draws; defaults to the sample size.
        #[serde(default)]
        k: Option<usize>,
        /// Fraction of the draws (`<= 1`) or absolute count (`> 1`) retained.
        quantile: f64,
    },
}

impl SearchPolicy {
    fn as_str(&self) -> &'static str {
        match self {
            SearchPolicy::Plain => "plain",
            SearchPolicy::Rerandomized { .. } => "rerandomized",
            SearchPolicy::QuantileTarget { .. } => "quantile-target",
        }
    }
}

/// Spread of the candidate scores seen by one search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchSummary {
    /// Lowest candidate score.
    pub min: f64,
    /// Mean candidate score.
    pub mean: f64,
    /// Highest candidate score.
    pub max: f64,
}

/// Balance failures that depend on the drawn labels rather than the data.
const CANDIDATE_FAILURES: [&str; 4] = [
    "balance-empty-arm",
    "balance-rank-deficient",
    "balance-no-contrast",
    "balance-degenerate-fit",
];

fn is_candidate_failure(err: &RctError) -> bool {
    matches!(err, RctError::Balance(info) if CANDIDATE_FAILURES.contains(&info.code.as_str()))
}

#[derive(Default)]
struct ScoreStats {
    count: usize,
    rejected: usize,
    first_rejection: Option<RctError>,
    sum: f64,
    min: f64,
    max: f64,
}

impl ScoreStats {
    fn push(&mut self, score: f64) {
        if self.count == 0 {
            self.min = score;
            self.max = score;
        } else {
            self.min = self.min.min(score);
            self.max = self.max.max(score);
        }
        self.sum += score;
        self.count += 1;
    }

    fn reject(&mut self, err: RctError) {
        self.rejected += 1;
        if self.first_rejection.is_none() {
            self.first_rejection = Some(err);
        }
    }

    /// Error for a search in which no draw could be scored.
    fn exhausted(&mut self, draws: usize) -> RctError {
        self.first_rejection.take().unwrap_or_else(|| {
            RctError::Search(
                ErrorInfo::new("search-no-draws", "search produced no candidates")
                    .with_context("draws", draws),
            )
        })
    }

    fn summary(&self) -> Option<SearchSummary> {
        (self.count > 0).then(|| SearchSummary {
            min: self.min,
            mean: self.sum / self.count as f64,
            max: self.max,
        })
    }
}

/// Result of one design run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignOutcome {
    /// One arm label per unit, in dataset order.
    pub labels: Vec<usize>,
    /// Balance score of the chosen assignment, when an objective is set.
    pub score: Option<f64>,
    /// Number of candidate draws.
    pub draws: usize,
    /// Candidates the final pick was made from.
    pub retained: usize,
    /// Draws the objective could not score (for example an empty arm).
    #[serde(default)]
    pub rejected: usize,
    /// Spread of the scored candidates.
    pub summary: Option<SearchSummary>,
    /// Units per arm, one entry per weight.
    pub arm_counts: Vec<usize>,
    /// Working seed of the run.
    pub seed: u64,
}

impl DesignOutcome {
    /// Chosen assignment as labels.
    pub fn assignment(&self) -> Assignment {
        Assignment::Labels(self.labels.clone())
    }

    /// Writes the labels as a single `t` column.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), RctError> {
        let mut wtr = WriterBuilder::new().from_writer(writer);
        wtr.write_record(["t"])
            .map_err(|err| RctError::Serde(ErrorInfo::new("assignment-csv-header", err.to_string())))?;
        for label in &self.labels {
            wtr.write_record([label.to_string()]).map_err(|err| {
                RctError::Serde(ErrorInfo::new("assignment-csv-record", err.to_string()))
            })?;
        }
        wtr.flush()
            .map_err(|err| RctError::Serde(ErrorInfo::new("assignment-csv-flush", err.to_string())))
    }
}

/// A seeded RCT design over one dataset.
///
/// The working seed is fixed at construction from the dataset content hash
/// and the seed shift. Every call to [`Design::assign`] restarts from that
/// seed, so repeated calls return the same assignment.
#[derive(Debug, Clone)]
pub struct Design {
    dataset: Dataset,
    weights: WeightVector,
    objective: Option<Objective>,
    policy: SearchPolicy,
    seed_shift: u64,
    seed: u64,
}

impl Design {
    /// Plain design accepting the first draw.
    pub fn new(dataset: Dataset, weights: WeightVector) -> Self {
        let seed = determinism::design_seed(&dataset, 0);
        Self {
            dataset,
            weights,
            objective: None,
            policy: SearchPolicy::Plain,
            seed_shift: 0,
            seed,
        }
    }

    /// Best of `k` draws under `objective`.
    pub fn rerandomized(
        dataset: Dataset,
        weights: WeightVector,
        objective: impl Into<Objective>,
        k: Option<usize>,
    ) -> Self {
        Self::new(dataset, weights)
            .with_objective(objective)
            .with_policy(SearchPolicy::Rerandomized { k })
    }

    /// Uniform pick among the top `quantile` of `k` draws under `objective`.
    pub fn quantile_target(
        dataset: Dataset,
        weights: WeightVector,
        objective: impl Into<Objective>,
        k: Option<usize>,
        quantile: f64,
    ) -> Self {
        Self::new(dataset, weights)
            .with_objective(objective)
            .with_policy(SearchPolicy::QuantileTarget { k, quantile })
    }

    /// Sets the balance objective.
    pub fn with_objective(mut self, objective: impl Into<Objective>) -> Self {
        self.objective = Some(objective.into());
        self
    }

    /// Sets the search policy.
    pub fn with_policy(mut self, policy: SearchPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Shifts the working seed away from the content hash.
    pub fn with_seed_shift(mut self, seed_shift: u64) -> Self {
        self.seed_shift = seed_shift;
        self.seed = determinism::design_seed(&self.dataset, seed_shift);
        self
    }

    /// Dataset being assigned.
    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Normalized arm weights.
    pub fn weights(&self) -> &WeightVector {
        &self.weights
    }

    /// Configured objective, if any.
    pub fn objective(&self) -> Option<&Objective> {
        self.objective.as_ref()
    }

    /// Search policy.
    pub fn policy(&self) -> SearchPolicy {
        self.policy
    }

    /// Seed shift supplied by the caller.
    pub fn seed_shift(&self) -> u64 {
        self.seed_shift
    }

    /// Working seed `(content_hash + seed_shift) mod 2^32`.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of units.
    pub fn sample_size(&self) -> usize {
        self.dataset.len()
    }

    /// Scalar balance of a label vector under the configured objective.
    pub fn balance(&self, labels: &[usize]) -> Result<f64, RctError> {
        self.score_candidate(self.require_objective()?, labels)
    }

    /// Runs the configured search with `method` draws.
    pub fn assign(&self, method: DrawMethod) -> Result<DesignOutcome, RctError> {
        let mut rng = RngHandle::from_seed(self.seed);
        let outcome = match self.policy {
            SearchPolicy::Plain => self.plain(method, &mut rng)?,
            SearchPolicy::Rerandomized { k } => self.best_of(self.draw_count(k)?, method, &mut rng)?,
            SearchPolicy::QuantileTarget { k, quantile } => {
                self.pick_from_quantile(self.draw_count(k)?, quantile, method, &mut rng)?
            }
        };
        info!(
            policy = self.policy.as_str(),
            draws = outcome.draws,
            retained = outcome.retained,
            rejected = outcome.rejected,
            score = ?outcome.score,
            "design search complete"
        );
        Ok(outcome)
    }

    fn require_objective(&self) -> Result<&Objective, RctError> {
        self.objective.as_ref().ok_or_else(|| {
            RctError::Search(
                ErrorInfo::new("search-missing-objective", "policy needs a balance objective")
                    .with_context("policy", self.policy.as_str()),
            )
        })
    }

    fn score_candidate(&self, objective: &Objective, labels: &[usize]) -> Result<f64, RctError> {
        objective.scalar(&self.dataset, &Assignment::Labels(labels.to_vec()))
    }

    /// Scores one draw; `Ok(None)` when the draw itself cannot be scored.
    fn try_candidate(
        &self,
        objective: &Objective,
        labels: &[usize],
        draw: usize,
        stats: &mut ScoreStats,
    ) -> Result<Option<f64>, RctError> {
        match self.score_candidate(objective, labels) {
            Ok(score) => {
                trace!(draw, score, "scored candidate");
                stats.push(score);
                Ok(Some(score))
            }
            Err(err) if is_candidate_failure(&err) => {
                debug!(draw, code = err.code(), "candidate rejected");
                stats.reject(err);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    fn draw_count(&self, k: Option<usize>) -> Result<usize, RctError> {
        let k = k.unwrap_or_else(|| self.sample_size());
        if k == 0 {
            return Err(RctError::Search(
                ErrorInfo::new("search-no-draws", "rerandomization needs at least one draw")
                    .with_context("units", self.sample_size())
                    .with_hint("set k or supply a non-empty dataset"),
            ));
        }
        Ok(k)
    }

    fn plain(&self, method: DrawMethod, rng: &mut RngHandle) -> Result<DesignOutcome, RctError> {
        debug!(seed = self.seed, draw = method.as_str(), "plain design draw");
        let labels = method.draw(&self.weights, self.sample_size(), rng)?;
        let mut stats = ScoreStats::default();
        let score = match &self.objective {
            Some(objective) => self.try_candidate(objective, &labels, 0, &mut stats)?,
            None => None,
        };
        Ok(self.outcome(labels, score, 1, 1, stats))
    }

    fn best_of(
        &self,
        k: usize,
        method: DrawMethod,
        rng: &mut RngHandle,
    ) -> Result<DesignOutcome, RctError> {
        let objective = self.require_objective()?;
        debug!(
            seed = self.seed,
            k,
            draw = method.as_str(),
            objective = objective.name(),
            "k-rerandomization search"
        );
        let mut stats = ScoreStats::default();
        let mut best: Option<(f64, Vec<usize>)> = None;
        for draw in 0..k {
            let labels = method.draw(&self.weights, self.sample_size(), rng)?;
            let Some(score) = self.try_candidate(objective, &labels, draw, &mut stats)? else {
                continue;
            };
            let improves = match &best {
                None => true,
                Some((current, _)) => score > *current || (current.is_nan() && !score.is_nan()),
            };
            if improves {
                best = Some((score, labels));
            }
        }
        let Some((score, labels)) = best else {
            return Err(stats.exhausted(k));
        };
        Ok(self.outcome(labels, Some(score), k, 1, stats))
    }

    fn pick_from_quantile(
        &self,
        k: usize,
        quantile: f64,
        method: DrawMethod,
        rng: &mut RngHandle,
    ) -> Result<DesignOutcome, RctError> {
        let objective = self.require_objective()?;
        let mut top = TopK::from_quantile(quantile, k)?;
        debug!(
            seed = self.seed,
            k,
            quantile,
            capacity = top.capacity(),
            draw = method.as_str(),
            objective = objective.name(),
            "quantile-target search"
        );
        if top.capacity() > k {
            warn!(
                capacity = top.capacity(),
                k, "quantile capacity exceeds the number of draws; every candidate is retained"
            );
        }
        let mut stats = ScoreStats::default();
        for draw in 0..k {
            let labels = method.draw(&self.weights, self.sample_size(), rng)?;
            if let Some(score) = self.try_candidate(objective, &labels, draw, &mut stats)? {
                top.offer(score, labels);
            }
        }

        let mut picker = RngHandle::substream(self.seed, PICK_SUBSTREAM);
        let retained = top.len();
        let mut entries = top.into_sorted();
        if entries.is_empty() {
            return Err(stats.exhausted(k));
        }
        let pick = picker.gen_range(0..entries.len());
        let (score, labels) = entries.swap_remove(pick);
        Ok(self.outcome(labels, Some(score), k, retained, stats))
    }

    fn outcome(
        &self,
        labels: Vec<usize>,
        score: Option<f64>,
        draws: usize,
        retained: usize,
        stats: ScoreStats,
    ) -> DesignOutcome {
        let mut arm_counts = vec![0usize; self.weights.arms()];
        for &label in &labels {
            if let Some(count) = arm_counts.get_mut(label) {
                *count += 1;
            }
        }
        DesignOutcome {
            labels,
            score,
            draws,
            retained,
            rejected: stats.rejected,
            summary: stats.summary(),
            arm_counts,
            seed: self.seed,
        }
    }
}
