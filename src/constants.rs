pub const DEFAULT_SEED: u64 = 123;
pub const DEFAULT_N_FOLDS: usize = 5;
pub const DEFAULT_N_GROUPS: usize = 4;
pub const DEFAULT_N_BOOTSTRAP: usize = 1000;
pub const DEFAULT_PROPENSITY_CLIP: f64 = 1e-3;
pub const DEFAULT_PERCENTILE_LOW: f64 = 5.0;
pub const DEFAULT_PERCENTILE_HIGH: f64 = 95.0;
pub const DEFAULT_N_PERCENTILES: usize = 50;
pub const PIVOT_EPS: f64 = 1e-12;
