//! Bounded streaming selector keeping the best-scoring candidates.

use std::cmp::Ordering;

use rct_core::errors::{ErrorInfo, RctError};

/// Slack subtracted before rounding `q * len` up.
const CAPACITY_GUARD: f64 = 1e-9;

/// Capacity of a selector targeting quantile `q` of a stream of `len` items.
///
/// `q <= 1` is a fraction of the stream, `q > 1` an absolute count.
pub fn capacity_for(q: f64, len: usize) -> Result<usize, RctError> {
    if !q.is_finite() || q <= 0.0 {
        return Err(RctError::Search(
            ErrorInfo::new("quantile-invalid-target", "target quantile must be a positive finite number")
                .with_context("quantile", q),
        ));
    }
    let capacity = if q <= 1.0 {
        (q * len as f64 - CAPACITY_GUARD).ceil().max(0.0) as usize
    } else {
        q.floor() as usize
    };
    if capacity == 0 {
        return Err(RctError::Search(
            ErrorInfo::new("quantile-empty-capacity", "target quantile retains no candidates")
                .with_context("quantile", q)
                .with_context("stream_length", len)
                .with_hint("raise the quantile or the number of draws"),
        ));
    }
    Ok(capacity)
}

/// `true` when `(sa, a)` is strictly greater than `(sb, b)` in lexicographic
/// order. Incomparable pairs are never greater.
fn lex_greater<T: PartialOrd>(sa: f64, a: &T, sb: f64, b: &T) -> bool {
    match sa.partial_cmp(&sb) {
        Some(Ordering::Greater) => true,
        Some(Ordering::Equal) => matches!(a.partial_cmp(b), Some(Ordering::Greater)),
        Some(Ordering::Less) | None => false,
    }
}

/// Top-K buffer ordered ascending by `(score, item)`.
///
/// While fewer than `capacity` entries are held every offer is inserted; once
/// full, an offer replaces the smallest entry only when strictly greater.
#[derive(Debug, Clone)]
pub struct TopK<T> {
    capacity: usize,
    entries: Vec<(f64, T)>,
    offered: usize,
}

impl<T: PartialOrd> TopK<T> {
    /// Selector holding at most `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Result<Self, RctError> {
        if capacity == 0 {
            return Err(RctError::Search(ErrorInfo::new(
                "quantile-empty-capacity",
                "selector capacity must be positive",
            )));
        }
        Ok(Self {
            capacity,
            entries: Vec::with_capacity(capacity),
            offered: 0,
        })
    }

    /// Selector for quantile `q` of a stream of `len` items.
    pub fn from_quantile(q: f64, len: usize) -> Result<Self, RctError> {
        Self::with_capacity(capacity_for(q, len)?)
    }

    /// Maximum number of retained entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when nothing is retained.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` once `capacity` entries are retained.
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// Number of offers seen so far.
    pub fn offered(&self) -> usize {
        self.offered
    }

    /// Retained entries, ascending.
    pub fn entries(&self) -> &[(f64, T)] {
        &self.entries
    }

    /// Smallest retained score.
    pub fn min_score(&self) -> Option<f64> {
        self.entries.first().map(|(score, _)| *score)
    }

    /// Offers one scored item; returns whether it was retained.
    pub fn offer(&mut self, score: f64, item: T) -> bool {
        self.offered += 1;
        if self.is_full() {
            let improves = match self.entries.first() {
                Some((low, low_item)) => lex_greater(score, &item, *low, low_item),
                None => false,
            };
            if !improves {
                return false;
            }
            self.entries.remove(0);
        }
        let at = self
            .entries
            .partition_point(|(s, it)| !lex_greater(*s, it, score, &item));
        self.entries.insert(at, (score, item));
        true
    }

    /// Scores and offers every item of `items`, stopping at the first scoring
    /// failure.
    pub fn extend_scored<I, F>(&mut self, items: I, mut score: F) -> Result<(), RctError>
    where
        I: IntoIterator<Item = T>,
        F: FnMut(&T) -> Result<f64, RctError>,
    {
        for item in items {
            let value = score(&item)?;
            self.offer(value, item);
        }
        Ok(())
    }

    /// Consumes the selector, returning entries ascending.
    pub fn into_sorted(self) -> Vec<(f64, T)> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_rounds_fractions_up() {
        assert_eq!(capacity_for(0.2, 10).unwrap(), 2);
        assert_eq!(capacity_for(0.25, 10).unwrap(), 3);
        assert_eq!(capacity_for(0.3, 10).unwrap(), 3);
        assert_eq!(capacity_for(1.0, 7).unwrap(), 7);
        assert_eq!(capacity_for(5.9, 3).unwrap(), 5);
        assert_eq!(capacity_for(0.01, 10).unwrap(), 1);
        assert_eq!(capacity_for(0.0, 10).unwrap_err().code(), "quantile-invalid-target");
        assert_eq!(capacity_for(f64::NAN, 10).unwrap_err().code(), "quantile-invalid-target");
        assert_eq!(capacity_for(0.5, 0).unwrap_err().code(), "quantile-empty-capacity");
    }

    #[test]
    fn offers_follow_lexicographic_order() {
        let mut top = TopK::from_quantile(0.2, 10).unwrap();
        assert!(top.offer(0.0, 1.0));
        assert_eq!(top.entries(), &[(0.0, 1.0)]);
        assert!(top.offer(3.0, 2.0));
        assert_eq!(top.entries(), &[(0.0, 1.0), (3.0, 2.0)]);
        assert!(top.offer(2.0, 6.0));
        assert_eq!(top.entries(), &[(2.0, 6.0), (3.0, 2.0)]);
        // incomparable tie-break is no improvement
        assert!(!top.offer(2.0, f64::NAN));
        assert_eq!(top.entries(), &[(2.0, 6.0), (3.0, 2.0)]);
        assert_eq!(top.offered(), 4);
    }

    #[test]
    fn streamed_scores_keep_the_top_quantile() {
        let mut top = TopK::from_quantile(0.2, 10).unwrap();
        top.extend_scored(0..10i32, |&x| Ok(f64::from(-x * x + 2 * x)))
            .unwrap();
        assert_eq!(top.into_sorted(), vec![(0.0, 2), (1.0, 1)]);
    }

    #[test]
    fn equal_pairs_insert_after_existing() {
        let mut top = TopK::with_capacity(3).unwrap();
        top.offer(1.0, 5);
        top.offer(1.0, 5);
        top.offer(0.5, 9);
        assert_eq!(top.entries(), &[(0.5, 9), (1.0, 5), (1.0, 5)]);
        // equal to the smallest is not strictly greater
        assert!(!top.offer(0.5, 9));
        assert!(top.offer(0.5, 10));
        assert_eq!(top.entries(), &[(0.5, 10), (1.0, 5), (1.0, 5)]);
    }

    #[test]
    fn scoring_failure_aborts_the_stream() {
        let mut top = TopK::with_capacity(2).unwrap();
        let err = top
            .extend_scored(0..5usize, |&x| {
                if x == 3 {
                    Err(RctError::Balance(ErrorInfo::new("balance-test", "boom")))
                } else {
                    Ok(x as f64)
                }
            })
            .unwrap_err();
        assert_eq!(err.code(), "balance-test");
        assert_eq!(top.offered(), 3);
    }
}
