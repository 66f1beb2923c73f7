use criterion::{criterion_group, criterion_main, Criterion};
use rct_balance::{Aggregator, MahalanobisBalance, PValueBalance};
use rct_core::{Dataset, DrawMethod, WeightVector};
use rct_design::Design;

fn sample_dataset(units: usize) -> Dataset {
    let x = (0..units).map(|i| ((i * 37) % 101) as f64 / 10.0).collect();
    let y = (0..units).map(|i| ((i * 53) % 89) as f64 - 44.0).collect();
    let z = (0..units).map(|i| (i % 7) as f64 * 0.5).collect();
    Dataset::from_numeric([("x", x), ("y", y), ("z", z)]).unwrap()
}

fn bench_search(c: &mut Criterion) {
    let weights = WeightVector::normalize(&[0.3, 0.3, 0.4]).unwrap();
    let mahalanobis = Design::rerandomized(
        sample_dataset(200),
        weights.clone(),
        MahalanobisBalance::new().with_treatment_aggregator(Aggregator::Max),
        Some(100),
    );
    let pvalue = Design::quantile_target(
        sample_dataset(200),
        weights,
        PValueBalance::new()
            .with_treatment_aggregator(Aggregator::Min)
            .with_covariate_aggregator(Aggregator::Min),
        Some(100),
        0.1,
    );

    c.bench_function("rerandomize_mahalanobis", |b| {
        b.iter(|| {
            let _ = mahalanobis.assign(DrawMethod::Shuffled).unwrap();
        })
    });
    c.bench_function("quantile_target_pvalue", |b| {
        b.iter(|| {
            let _ = pvalue.assign(DrawMethod::Shuffled).unwrap();
        })
    });
}

criterion_group!(benches, bench_search);
criterion_main!(benches);
