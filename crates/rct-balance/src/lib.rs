#![deny(missing_docs)]
//! Covariate balance objectives for RCT assignments.
//!
//! Three metrics are provided (Mahalanobis distance between arm means,
//! regression p-values of arm dummies, categorical block counts) together
//! with an algebra for combining them into composite objectives. Every
//! objective follows the same sign convention: higher is better balanced.

/// Reductions across arms, covariates and levels.
pub mod aggregate;
/// Lazily composed balance functions.
pub mod algebra;
/// Categorical count balance.
pub mod block;
/// Mahalanobis distance balance.
pub mod mahalanobis;
/// Objective trait and catalog.
pub mod objective;
/// Regression p-value balance.
pub mod pvalue;
/// P-value report for external diagnostics.
pub mod report;
/// Scalar and table scores.
pub mod score;

pub use aggregate::{Aggregator, AggregatorName};
pub use algebra::BalanceFn;
pub use block::BlockBalance;
pub use mahalanobis::MahalanobisBalance;
pub use objective::{BalanceObjective, Objective};
pub use pvalue::PValueBalance;
pub use report::{pvalues_report, BalanceReport};
pub use score::Score;
