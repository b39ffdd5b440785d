#![allow(dead_code)]
use rand::distributions::Uniform;
use rand::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Column-major features, binary treatments and outcomes with effect `2 * x0`.
pub(crate) fn create_data(n_samples: usize, n_features: usize, seed: u64) -> (Vec<f64>, Vec<i64>, Vec<f64>) {
    // reproducible seed
    let mut rng = StdRng::seed_from_u64(seed);

    // feature distributions
    let feature_distribution = Uniform::new(-1.0, 1.0);
    let noise_distribution = Uniform::new(-1.0, 1.0);
    let weight_distribution = Uniform::new(-1.0, 1.0);

    let mut feature_space: Vec<Vec<f64>> = vec![Vec::with_capacity(n_samples); n_features];
    let mut treatment: Vec<i64> = Vec::with_capacity(n_samples);
    let mut target_variable: Vec<f64> = Vec::with_capacity(n_samples);

    // baseline outcome is linear in the features
    let weights: Vec<f64> = (0..n_features).map(|_| rng.sample(weight_distribution)).collect();

    for _ in 0..n_samples {
        let mut x_sample = Vec::with_capacity(n_features);
        for col in feature_space.iter_mut() {
            let v = rng.sample(feature_distribution);
            col.push(v);
            x_sample.push(v);
        }
        let d = i64::from(rng.gen_bool(0.5));
        let baseline: f64 = x_sample.iter().zip(weights.iter()).map(|(x, w)| x * w).sum();
        let y = baseline + d as f64 * 2.0 * x_sample[0] + rng.sample(noise_distribution);
        treatment.push(d);
        target_variable.push(y);
    }

    // flatten into column-major
    let mut data = Vec::with_capacity(n_samples * n_features);
    for col in feature_space {
        data.extend(col);
    }

    (data, treatment, target_variable)
}
