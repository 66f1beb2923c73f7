use std::fs;
use std::path::Path;

use rct_balance::{AggregatorName, BlockBalance, MahalanobisBalance, Objective, PValueBalance};
use rct_core::errors::{ErrorInfo, RctError};
use rct_core::{Dataset, DrawMethod, WeightSpec};
use serde::{Deserialize, Serialize};

use crate::design::{Design, SearchPolicy};

/// YAML-configurable parameters of a design run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignConfig {
    /// Arm weights: a treatment probability or one weight per arm.
    pub weights: WeightSpec,
    /// Balance objective; a plain design is run when absent.
    #[serde(default)]
    pub objective: Option<ObjectiveSpec>,
    /// Number of candidate draws; defaults to the sample size.
    #[serde(default)]
    pub k: Option<usize>,
    /// Switches the search to quantile targeting.
    #[serde(default)]
    pub target_quantile: Option<f64>,
    /// Added to the dataset content hash to form the working seed.
    #[serde(default)]
    pub seed_shift: u64,
    /// Candidate draw method.
    #[serde(default)]
    pub draw: DrawMethod,
}

/// Catalog objective with its column subset and aggregators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ObjectiveSpec {
    /// Negated Mahalanobis distance between arm means.
    Mahalanobis {
        /// Covariates to balance; all when absent.
        #[serde(default)]
        columns: Option<Vec<String>>,
        /// Reduction across arm pairs.
        #[serde(default)]
        treatment_aggregator: AggregatorName,
    },
    /// Regression p-values of arm dummies.
    #[serde(rename = "pvalue", alias = "p-value")]
    PValue {
        /// Covariates to balance; all when absent.
        #[serde(default)]
        columns: Option<Vec<String>>,
        /// Reduction across arm dummies.
        #[serde(default)]
        treatment_aggregator: AggregatorName,
        /// Reduction across covariates.
        #[serde(default)]
        covariate_aggregator: AggregatorName,
    },
    /// Negated relative deviation of per-level counts.
    Block {
        /// Covariates to balance; all when absent.
        #[serde(default)]
        columns: Option<Vec<String>>,
        /// Reduction across arms.
        #[serde(default)]
        treatment_aggregator: AggregatorName,
        /// Reduction across covariates.
        #[serde(default)]
        covariate_aggregator: AggregatorName,
        /// Reduction across category levels.
        #[serde(default = "default_category_aggregator")]
        category_aggregator: AggregatorName,
    },
}

fn default_category_aggregator() -> AggregatorName {
    AggregatorName::MaxAbs
}

impl ObjectiveSpec {
    /// Builds the configured objective.
    pub fn to_objective(&self) -> Objective {
        match self {
            ObjectiveSpec::Mahalanobis {
                columns,
                treatment_aggregator,
            } => {
                let mut objective =
                    MahalanobisBalance::new().with_treatment_aggregator((*treatment_aggregator).into());
                objective.columns = columns.clone();
                objective.into()
            }
            ObjectiveSpec::PValue {
                columns,
                treatment_aggregator,
                covariate_aggregator,
            } => {
                let mut objective = PValueBalance::new()
                    .with_treatment_aggregator((*treatment_aggregator).into())
                    .with_covariate_aggregator((*covariate_aggregator).into());
                objective.columns = columns.clone();
                objective.into()
            }
            ObjectiveSpec::Block {
                columns,
                treatment_aggregator,
                covariate_aggregator,
                category_aggregator,
            } => {
                let mut objective = BlockBalance::new()
                    .with_treatment_aggregator((*treatment_aggregator).into())
                    .with_covariate_aggregator((*covariate_aggregator).into())
                    .with_category_aggregator((*category_aggregator).into());
                objective.columns = columns.clone();
                objective.into()
            }
        }
    }
}

impl DesignConfig {
    /// Parses a YAML document.
    pub fn from_yaml_str(contents: &str) -> Result<Self, RctError> {
        serde_yaml::from_str(contents)
            .map_err(|err| RctError::Serde(ErrorInfo::new("config-parse", err.to_string())))
    }

    /// Reads and parses a YAML file.
    pub fn from_path(path: &Path) -> Result<Self, RctError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            RctError::Serde(
                ErrorInfo::new("config-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        Self::from_yaml_str(&contents).map_err(|err| match err {
            RctError::Serde(info) => {
                RctError::Serde(info.with_context("path", path.display().to_string()))
            }
            other => other,
        })
    }

    /// Serializes the configuration as YAML.
    pub fn to_yaml_string(&self) -> Result<String, RctError> {
        serde_yaml::to_string(self)
            .map_err(|err| RctError::Serde(ErrorInfo::new("config-serialize", err.to_string())))
    }

    /// Search policy implied by the objective, `k` and target quantile.
    pub fn policy(&self) -> SearchPolicy {
        match (&self.objective, self.target_quantile) {
            (None, _) => SearchPolicy::Plain,
            (Some(_), Some(quantile)) => SearchPolicy::QuantileTarget { k: self.k, quantile },
            (Some(_), None) => SearchPolicy::Rerandomized { k: self.k },
        }
    }

    /// Builds a design over `dataset`.
    pub fn build(&self, dataset: Dataset) -> Result<Design, RctError> {
        let weights = self.weights.normalize()?;
        let mut design = Design::new(dataset, weights)
            .with_seed_shift(self.seed_shift)
            .with_policy(self.policy());
        if let Some(spec) = &self.objective {
            design = design.with_objective(spec.to_objective());
        }
        Ok(design)
    }
}
