use rct_core::{Covariate, Dataset};

/// Fixed draws from a standard normal, ten units by two covariates.
pub const A: [f64; 10] = [
    1.764052, 0.400157, 0.978738, 2.240893, 1.867558, -0.977278, 0.950088, -0.151357, -0.103219,
    0.410599,
];
pub const B: [f64; 10] = [
    0.144044, 1.454274, 0.761038, 0.121675, 0.443863, 0.333674, 1.494079, -0.205158, 0.313068,
    -0.854096,
];

pub fn normal_table() -> Dataset {
    Dataset::from_numeric([("a", A.to_vec()), ("b", B.to_vec())]).expect("dataset")
}

pub fn mixed_table() -> Dataset {
    let site = ["n", "s", "n", "e", "s", "n", "e", "s", "n", "s"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    Dataset::new(vec![
        ("a".to_string(), Covariate::Numeric(A.to_vec())),
        ("b".to_string(), Covariate::Numeric(B.to_vec())),
        ("site".to_string(), Covariate::Categorical(site)),
    ])
    .expect("dataset")
}
