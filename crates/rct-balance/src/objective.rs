//! Balance objective capability and the fixed catalog.

use rct_core::errors::{ErrorInfo, RctError};
use rct_core::{Assignment, Dataset};

use crate::algebra::BalanceFn;
use crate::block::BlockBalance;
use crate::mahalanobis::MahalanobisBalance;
use crate::pvalue::PValueBalance;
use crate::score::Score;

/// Pure scoring of an assignment; higher always means better balanced.
pub trait BalanceObjective: Send + Sync {
    /// Catalog name of the objective.
    fn name(&self) -> &'static str;

    /// Scores `assignment` on `dataset`.
    fn score(&self, dataset: &Dataset, assignment: &Assignment) -> Result<Score, RctError>;

    /// Scores and requires a scalar result.
    fn scalar(&self, dataset: &Dataset, assignment: &Assignment) -> Result<f64, RctError> {
        self.score(dataset, assignment)?.as_scalar()
    }
}

/// Objective selected for a design run.
#[derive(Debug, Clone)]
pub enum Objective {
    /// Negated Mahalanobis distance between arm means.
    Mahalanobis(MahalanobisBalance),
    /// Regression p-values of arm dummies.
    PValue(PValueBalance),
    /// Negated relative deviation of per-level counts.
    Block(BlockBalance),
    /// User composite built with the balance algebra.
    Composite(BalanceFn),
}

impl Objective {
    /// Default objective for a catalog name. Matching ignores case and
    /// surrounding whitespace.
    pub fn from_name(name: &str) -> Result<Self, RctError> {
        match name.trim().to_lowercase().as_str() {
            "mahalanobis" => Ok(Objective::Mahalanobis(MahalanobisBalance::new())),
            "pvalue" | "p-value" => Ok(Objective::PValue(PValueBalance::new())),
            "block" | "blocking" => Ok(Objective::Block(BlockBalance::new())),
            _ => Err(RctError::Balance(
                ErrorInfo::new("balance-unknown-objective", "no balance objective with this name")
                    .with_context("name", name)
                    .with_hint("expected one of: mahalanobis, pvalue, block"),
            )),
        }
    }

    /// Lazily composable function view of the objective.
    pub fn balance_fn(&self) -> BalanceFn {
        match self {
            Objective::Mahalanobis(objective) => BalanceFn::from_objective(objective.clone()),
            Objective::PValue(objective) => BalanceFn::from_objective(objective.clone()),
            Objective::Block(objective) => BalanceFn::from_objective(objective.clone()),
            Objective::Composite(f) => f.clone(),
        }
    }
}

impl BalanceObjective for Objective {
    fn name(&self) -> &'static str {
        match self {
            Objective::Mahalanobis(objective) => objective.name(),
            Objective::PValue(objective) => objective.name(),
            Objective::Block(objective) => objective.name(),
            Objective::Composite(f) => f.name(),
        }
    }

    fn score(&self, dataset: &Dataset, assignment: &Assignment) -> Result<Score, RctError> {
        match self {
            Objective::Mahalanobis(objective) => objective.score(dataset, assignment),
            Objective::PValue(objective) => objective.score(dataset, assignment),
            Objective::Block(objective) => objective.score(dataset, assignment),
            Objective::Composite(f) => f.score(dataset, assignment),
        }
    }
}

impl From<MahalanobisBalance> for Objective {
    fn from(objective: MahalanobisBalance) -> Self {
        Objective::Mahalanobis(objective)
    }
}

impl From<PValueBalance> for Objective {
    fn from(objective: PValueBalance) -> Self {
        Objective::PValue(objective)
    }
}

impl From<BlockBalance> for Objective {
    fn from(objective: BlockBalance) -> Self {
        Objective::Block(objective)
    }
}

impl From<BalanceFn> for Objective {
    fn from(f: BalanceFn) -> Self {
        Objective::Composite(f)
    }
}
