//! Linalg
//!
//! Small dense solvers for the normal equations of the regression based
//! tests and reference models. Matrices are row-major `d x d` slices.
use crate::constants::PIVOT_EPS;
use crate::errors::DRTesterError;

/// Cholesky factor `L` of a symmetric positive definite matrix, `A = L L^T`.
pub fn cholesky(a: &[f64], d: usize) -> Result<Vec<f64>, DRTesterError> {
    let mut l = vec![0.0; d * d];
    // scale-aware pivot threshold
    let max_diag = (0..d).map(|i| a[i * d + i].abs()).fold(0.0, f64::max);
    let tol = PIVOT_EPS * max_diag.max(1.0);

    for i in 0..d {
        for j in 0..=i {
            let mut sum = a[i * d + j];
            for k in 0..j {
                sum -= l[i * d + k] * l[j * d + k];
            }
            if i == j {
                if sum.is_nan() || sum <= tol {
                    return Err(DRTesterError::SingularMatrix);
                }
                l[i * d + i] = sum.sqrt();
            } else {
                l[i * d + j] = sum / l[j * d + j];
            }
        }
    }
    Ok(l)
}

/// Solve `L L^T x = b` given the Cholesky factor.
pub fn solve_cholesky(l: &[f64], b: &[f64], d: usize) -> Vec<f64> {
    // forward substitution: L y = b
    let mut y = vec![0.0; d];
    for i in 0..d {
        let mut sum = b[i];
        for j in 0..i {
            sum -= l[i * d + j] * y[j];
        }
        y[i] = sum / l[i * d + i];
    }
    // backward substitution: L^T x = y
    let mut x = vec![0.0; d];
    for i in (0..d).rev() {
        let mut sum = y[i];
        for j in (i + 1)..d {
            sum -= l[j * d + i] * x[j];
        }
        x[i] = sum / l[i * d + i];
    }
    x
}

/// Solve `A x = b` for symmetric positive definite `A`.
pub fn solve_spd(a: &[f64], b: &[f64], d: usize) -> Result<Vec<f64>, DRTesterError> {
    let l = cholesky(a, d)?;
    Ok(solve_cholesky(&l, b, d))
}

/// Inverse of a symmetric positive definite matrix.
pub fn invert_spd(a: &[f64], d: usize) -> Result<Vec<f64>, DRTesterError> {
    let l = cholesky(a, d)?;
    let mut inv = vec![0.0; d * d];
    let mut e = vec![0.0; d];
    for j in 0..d {
        e.iter_mut().for_each(|v| *v = 0.0);
        e[j] = 1.0;
        let col = solve_cholesky(&l, &e, d);
        for i in 0..d {
            inv[i * d + j] = col[i];
        }
    }
    Ok(inv)
}

/// `A B A` for row-major `d x d` matrices, the sandwich of a robust covariance.
pub fn sandwich(bread: &[f64], meat: &[f64], d: usize) -> Vec<f64> {
    let mut tmp = vec![0.0; d * d];
    for i in 0..d {
        for j in 0..d {
            tmp[i * d + j] = (0..d).map(|k| bread[i * d + k] * meat[k * d + j]).sum();
        }
    }
    let mut out = vec![0.0; d * d];
    for i in 0..d {
        for j in 0..d {
            out[i * d + j] = (0..d).map(|k| tmp[i * d + k] * bread[k * d + j]).sum();
        }
    }
    out
}
