use rct_balance::MahalanobisBalance;
use rct_core::Dataset;

pub const COVARIATES_CSV: &str = "\
x,y,site
0.50,12.1,north
1.20,10.4,south
-0.30,11.8,north
2.10,9.7,east
0.90,10.9,south
-1.40,12.6,north
0.10,11.2,east
1.70,9.9,south
-0.80,12.3,north
0.40,10.1,east
1.10,11.5,south
-0.20,10.8,north
";

pub fn covariates() -> Dataset {
    Dataset::from_csv_bytes(COVARIATES_CSV.as_bytes()).expect("fixture parses")
}

pub fn mahalanobis_xy() -> MahalanobisBalance {
    MahalanobisBalance::new().with_columns(["x", "y"])
}
