mod common;

use rct_balance::{Aggregator, BlockBalance, PValueBalance};
use rct_core::{DrawMethod, RngHandle, WeightVector};
use rct_design::{Design, SearchPolicy, TopK};

fn halves() -> WeightVector {
    WeightVector::from_scalar(0.5).unwrap()
}

/// Replays the candidate stream of `design` and scores every draw.
fn replay(design: &Design, k: usize) -> Vec<(f64, Vec<usize>)> {
    let mut rng = RngHandle::from_seed(design.seed());
    (0..k)
        .map(|_| {
            let labels = DrawMethod::Shuffled
                .draw(design.weights(), design.sample_size(), &mut rng)
                .unwrap();
            (design.balance(&labels).unwrap(), labels)
        })
        .collect()
}

#[test]
fn rerandomized_score_dominates_every_candidate() {
    let design = Design::rerandomized(common::covariates(), halves(), common::mahalanobis_xy(), Some(25))
        .with_seed_shift(1);
    let outcome = design.assign(DrawMethod::Shuffled).unwrap();
    let candidates = replay(&design, 25);
    let best = outcome.score.unwrap();
    assert!(candidates.iter().all(|(score, _)| best >= *score));
    let first_max = candidates
        .iter()
        .find(|(score, _)| *score == best)
        .map(|(_, labels)| labels.clone())
        .unwrap();
    assert_eq!(outcome.labels, first_max);
    assert_eq!(outcome.draws, 25);
    assert_eq!(outcome.retained, 1);
    let summary = outcome.summary.unwrap();
    assert_eq!(summary.max, best);
    assert!(summary.min <= summary.mean && summary.mean <= summary.max);
}

#[test]
fn quantile_pick_comes_from_the_retained_set() {
    let design = Design::quantile_target(
        common::covariates(),
        halves(),
        common::mahalanobis_xy(),
        Some(30),
        0.2,
    )
    .with_seed_shift(4);
    let outcome = design.assign(DrawMethod::Shuffled).unwrap();

    let mut top = TopK::from_quantile(0.2, 30).unwrap();
    for (score, labels) in replay(&design, 30) {
        top.offer(score, labels);
    }
    assert_eq!(outcome.retained, 6);
    assert!(top
        .entries()
        .iter()
        .any(|(score, labels)| *labels == outcome.labels && Some(*score) == outcome.score));
}

#[test]
fn oversized_quantile_retains_every_draw() {
    let design = Design::quantile_target(
        common::covariates(),
        halves(),
        common::mahalanobis_xy(),
        Some(8),
        50.0,
    );
    let outcome = design.assign(DrawMethod::Shuffled).unwrap();
    assert_eq!(outcome.draws, 8);
    assert_eq!(outcome.retained, 8);
}

#[test]
fn k_defaults_to_the_sample_size() {
    let design = Design::rerandomized(common::covariates(), halves(), common::mahalanobis_xy(), None);
    let outcome = design.assign(DrawMethod::Shuffled).unwrap();
    assert_eq!(outcome.draws, 12);
    assert_eq!(outcome.arm_counts, vec![6, 6]);
}

#[test]
fn plain_design_takes_the_first_draw() {
    let design = Design::new(common::covariates(), WeightVector::normalize(&[0.25, 0.25, 0.5]).unwrap());
    let outcome = design.assign(DrawMethod::Shuffled).unwrap();
    let mut rng = RngHandle::from_seed(design.seed());
    let first = DrawMethod::Shuffled.draw(design.weights(), 12, &mut rng).unwrap();
    assert_eq!(outcome.labels, first);
    assert_eq!(outcome.arm_counts, vec![3, 3, 6]);
    assert_eq!(outcome.score, None);
    assert_eq!(outcome.draws, 1);

    let iid = design.assign(DrawMethod::Iid).unwrap();
    assert_eq!(iid.labels.len(), 12);
    assert!(iid.labels.iter().all(|&label| label < 3));
}

#[test]
fn search_policies_need_an_objective() {
    let err = Design::new(common::covariates(), halves())
        .with_policy(SearchPolicy::Rerandomized { k: Some(3) })
        .assign(DrawMethod::Shuffled)
        .unwrap_err();
    assert_eq!(err.code(), "search-missing-objective");

    let err = Design::rerandomized(common::covariates(), halves(), common::mahalanobis_xy(), Some(0))
        .assign(DrawMethod::Shuffled)
        .unwrap_err();
    assert_eq!(err.code(), "search-no-draws");
}

#[test]
fn objective_failures_abort_the_search() {
    // site is categorical, so the p-value regression cannot use it
    let objective = PValueBalance::new()
        .with_treatment_aggregator(Aggregator::Min)
        .with_covariate_aggregator(Aggregator::Min);
    let err = Design::rerandomized(common::covariates(), halves(), objective, Some(5))
        .assign(DrawMethod::Shuffled)
        .unwrap_err();
    assert_eq!(err.code(), "dataset-not-numeric");
}

#[test]
fn block_balance_search_levels_site_counts() {
    let objective = BlockBalance::new()
        .with_columns(["site"])
        .with_treatment_aggregator(Aggregator::Max)
        .with_covariate_aggregator(Aggregator::Max);
    let design = Design::rerandomized(common::covariates(), halves(), objective, Some(40));
    let outcome = design.assign(DrawMethod::Shuffled).unwrap();
    let score = outcome.score.unwrap();
    assert!(score <= 0.0);
    let summary = outcome.summary.unwrap();
    assert!(score >= summary.min);
}

fn twenty_units() -> rct_core::Dataset {
    let x = (0..20).map(|i| ((i * 7) % 11) as f64 - 5.0).collect();
    let y = (0..20).map(|i| ((i * 13) % 17) as f64 * 0.3).collect();
    rct_core::Dataset::from_numeric([("x", x), ("y", y)]).unwrap()
}

#[test]
fn iid_draws_with_empty_arms_are_skipped() {
    let weights = WeightVector::from_scalar(0.9).unwrap();
    let mut rejected = 0;
    for shift in 0..20u64 {
        let design = Design::rerandomized(
            twenty_units(),
            weights.clone(),
            rct_balance::MahalanobisBalance::new(),
            None,
        )
        .with_seed_shift(shift);
        let outcome = design.assign(DrawMethod::Iid).unwrap();
        assert_eq!(outcome.draws, 20);
        assert!(outcome.arm_counts.iter().all(|&count| count > 0));
        assert!(outcome.score.unwrap().is_finite());
        rejected += outcome.rejected;

        let quantile = Design::quantile_target(
            twenty_units(),
            weights.clone(),
            rct_balance::MahalanobisBalance::new(),
            None,
            0.25,
        )
        .with_seed_shift(shift)
        .assign(DrawMethod::Iid)
        .unwrap();
        assert!(quantile.arm_counts.iter().all(|&count| count > 0));
    }
    // P(no unit in arm 0) = 0.9^20, so some of the 400 draws hit it
    assert!(rejected > 0);
}

#[test]
fn search_fails_when_no_draw_can_be_scored() {
    let dataset = rct_core::Dataset::from_numeric([("c", vec![2.5; 12])]).unwrap();
    let objective = PValueBalance::new()
        .with_treatment_aggregator(Aggregator::Min)
        .with_covariate_aggregator(Aggregator::Min);
    let err = Design::rerandomized(dataset, halves(), objective, Some(4))
        .assign(DrawMethod::Shuffled)
        .unwrap_err();
    assert_eq!(err.code(), "balance-degenerate-fit");

    let singular = rct_core::Dataset::from_numeric([("c", vec![2.5; 12])]).unwrap();
    let err = Design::rerandomized(singular, halves(), rct_balance::MahalanobisBalance::new(), Some(4))
        .assign(DrawMethod::Iid)
        .unwrap_err();
    assert_eq!(err.code(), "balance-singular-covariance");
}

#[test]
fn quantile_pick_uses_the_pick_substream() {
    use rand::Rng;

    let design = Design::quantile_target(
        common::covariates(),
        halves(),
        common::mahalanobis_xy(),
        Some(20),
        0.25,
    )
    .with_seed_shift(2);
    let outcome = design.assign(DrawMethod::Shuffled).unwrap();

    let mut top = TopK::from_quantile(0.25, 20).unwrap();
    for (score, labels) in replay(&design, 20) {
        top.offer(score, labels);
    }
    let mut entries = top.into_sorted();
    let mut picker = RngHandle::substream(design.seed(), rct_design::PICK_SUBSTREAM);
    let (score, labels) = entries.swap_remove(picker.gen_range(0..entries.len()));
    assert_eq!(outcome.labels, labels);
    assert_eq!(outcome.score, Some(score));
    assert_eq!(outcome.rejected, 0);
}
