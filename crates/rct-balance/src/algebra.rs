//! Lazily composed balance functions.

use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};
use std::sync::Arc;

use rct_core::{Assignment, Dataset, RctError};

use crate::objective::BalanceObjective;
use crate::score::Score;

type ScoreFn = dyn Fn(&Dataset, &Assignment) -> Result<Score, RctError> + Send + Sync;

/// Number-valued function of `(dataset, assignment)`.
///
/// Operators build new functions that evaluate their operands only when the
/// result is called, so composites such as "Mahalanobis balance on `a, b` plus
/// block balance on `site`" stay pure and cheap to construct.
#[derive(Clone)]
pub struct BalanceFn {
    func: Arc<ScoreFn>,
}

impl BalanceFn {
    /// Wraps a scoring closure.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Dataset, &Assignment) -> Result<Score, RctError> + Send + Sync + 'static,
    {
        Self { func: Arc::new(f) }
    }

    /// Wraps a concrete objective.
    pub fn from_objective<O>(objective: O) -> Self
    where
        O: BalanceObjective + 'static,
    {
        Self::new(move |dataset, assignment| objective.score(dataset, assignment))
    }

    /// Evaluates the function.
    pub fn call(&self, dataset: &Dataset, assignment: &Assignment) -> Result<Score, RctError> {
        (self.func)(dataset, assignment)
    }

    fn combine(
        self,
        other: BalanceFn,
        op: &'static str,
        f: fn(f64, f64) -> f64,
    ) -> BalanceFn {
        BalanceFn::new(move |dataset, assignment| {
            let lhs = self.call(dataset, assignment)?;
            let rhs = other.call(dataset, assignment)?;
            lhs.zip_with(&rhs, op, f)
        })
    }
}

impl fmt::Debug for BalanceFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BalanceFn: number valued function")
    }
}

impl BalanceObjective for BalanceFn {
    fn name(&self) -> &'static str {
        "composite"
    }

    fn score(&self, dataset: &Dataset, assignment: &Assignment) -> Result<Score, RctError> {
        self.call(dataset, assignment)
    }
}

impl Add for BalanceFn {
    type Output = BalanceFn;

    fn add(self, other: BalanceFn) -> BalanceFn {
        self.combine(other, "+", |a, b| a + b)
    }
}

impl Sub for BalanceFn {
    type Output = BalanceFn;

    fn sub(self, other: BalanceFn) -> BalanceFn {
        self.combine(other, "-", |a, b| a - b)
    }
}

impl Mul for BalanceFn {
    type Output = BalanceFn;

    fn mul(self, other: BalanceFn) -> BalanceFn {
        self.combine(other, "*", |a, b| a * b)
    }
}

impl Neg for BalanceFn {
    type Output = BalanceFn;

    fn neg(self) -> BalanceFn {
        BalanceFn::new(move |dataset, assignment| Ok(-self.call(dataset, assignment)?))
    }
}

impl Mul<f64> for BalanceFn {
    type Output = BalanceFn;

    fn mul(self, factor: f64) -> BalanceFn {
        BalanceFn::new(move |dataset, assignment| {
            Ok(self.call(dataset, assignment)?.map(|value| value * factor))
        })
    }
}

impl Mul<BalanceFn> for f64 {
    type Output = BalanceFn;

    fn mul(self, f: BalanceFn) -> BalanceFn {
        f * self
    }
}
