//! Folds
//!
//! Cross-validation splits used to cross-fit nuisance models.
use crate::errors::DRTesterError;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// One train/test split, as row indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fold {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// How the sample is split for cross-fitting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CvSpec {
    /// Number of shuffled folds, stratified by treatment.
    Folds(usize),
    /// Caller-provided splits.
    Explicit(Vec<Fold>),
}

impl Default for CvSpec {
    fn default() -> Self {
        CvSpec::Folds(crate::constants::DEFAULT_N_FOLDS)
    }
}

impl CvSpec {
    /// Materialize the splits for a sample with the given arm labels.
    ///
    /// Explicit splits are validated: indices must be in range, no fold may
    /// train on its own test rows, and every row must be held out exactly once.
    pub fn splits(&self, arms: &[usize], seed: u64) -> Result<Vec<Fold>, DRTesterError> {
        match self {
            CvSpec::Folds(k) => stratified_k_fold(arms, *k, seed),
            CvSpec::Explicit(folds) => {
                validate_folds(folds, arms.len())?;
                Ok(folds.clone())
            }
        }
    }
}

/// Shuffled k-fold splits, stratified by `labels`.
///
/// Rows of every label are shuffled with a seeded generator and dealt to
/// the folds round robin, continuing the rotation from one label to the
/// next so fold sizes differ by at most one.
pub fn stratified_k_fold(labels: &[usize], k: usize, seed: u64) -> Result<Vec<Fold>, DRTesterError> {
    let n = labels.len();
    if k < 2 || k > n {
        return Err(DRTesterError::InvalidParameter(
            "cv".to_string(),
            format!("number of folds between 2 and {}", n),
            k.to_string(),
        ));
    }
    let n_labels = labels.iter().copied().max().map_or(0, |m| m + 1);
    let mut by_label: Vec<Vec<usize>> = vec![Vec::new(); n_labels];
    for (i, &l) in labels.iter().enumerate() {
        by_label[l].push(i);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut assignment = vec![0usize; n];
    let mut next = 0usize;
    for rows in by_label.iter_mut() {
        rows.shuffle(&mut rng);
        for &i in rows.iter() {
            assignment[i] = next % k;
            next += 1;
        }
    }

    Ok((0..k)
        .map(|f| {
            let (test, train): (Vec<usize>, Vec<usize>) = (0..n).partition(|&i| assignment[i] == f);
            Fold { train, test }
        })
        .collect())
}

fn validate_folds(folds: &[Fold], n: usize) -> Result<(), DRTesterError> {
    if folds.is_empty() {
        return Err(DRTesterError::InvalidParameter(
            "cv".to_string(),
            "at least one fold".to_string(),
            "0".to_string(),
        ));
    }
    let mut held_out = vec![0usize; n];
    for (f, fold) in folds.iter().enumerate() {
        if let Some(&bad) = fold.train.iter().chain(fold.test.iter()).find(|&&i| i >= n) {
            return Err(DRTesterError::ShapeMismatch(format!(
                "fold {} references row {} of a {} row sample",
                f, bad, n
            )));
        }
        let mut in_test = vec![false; n];
        for &i in &fold.test {
            held_out[i] += 1;
            in_test[i] = true;
        }
        if let Some(&i) = fold.train.iter().find(|&&i| in_test[i]) {
            return Err(DRTesterError::InvalidParameter(
                "cv".to_string(),
                "train and test rows disjoint".to_string(),
                format!("fold {} trains on held out row {}", f, i),
            ));
        }
    }
    if let Some(i) = held_out.iter().position(|&c| c != 1) {
        return Err(DRTesterError::InvalidParameter(
            "cv".to_string(),
            "folds holding out every row exactly once".to_string(),
            format!("row {} held out {} times", i, held_out[i]),
        ));
    }
    Ok(())
}
