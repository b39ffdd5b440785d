use crate::errors::DRTesterError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Contiguous Column Major Matrix data container.
///
/// Borrowed view over feature data handed to the nuisance and CATE models.
/// It follows column-major order (Fortran-style), so a single feature column
/// is a contiguous slice.
///
/// # Type Parameters
/// * `T` - The numeric type of the data (e.g., `f32`, `f64`).
#[derive(Debug, Clone, Copy)]
pub struct Matrix<'a, T> {
    /// The raw data stored in a single slice.
    pub data: &'a [T],
    /// Number of rows in the matrix.
    pub rows: usize,
    /// Number of columns in the matrix.
    pub cols: usize,
}

impl<'a, T> Matrix<'a, T> {
    /// Create a new Matrix.
    pub fn new(data: &'a [T], rows: usize, cols: usize) -> Self {
        debug_assert_eq!(data.len(), rows * cols);
        Matrix { data, rows, cols }
    }

    /// Get a single reference to an item in the matrix.
    ///
    /// * `i` - The ith row of the data to get.
    /// * `j` - the jth column of the data to get.
    pub fn get(&self, i: usize, j: usize) -> &T {
        &self.data[j * self.rows + i]
    }

    /// Get access to a row of the data, as an iterator.
    pub fn get_row_iter(&self, row: usize) -> std::iter::StepBy<std::iter::Skip<std::slice::Iter<'a, T>>> {
        self.data.iter().skip(row).step_by(self.rows)
    }

    /// Get an entire column in the matrix.
    ///
    /// * `col` - The index of the column to get.
    pub fn get_col(&self, col: usize) -> &'a [T] {
        &self.data[col * self.rows..(col + 1) * self.rows]
    }
}

impl<'a, T> Matrix<'a, T>
where
    T: Copy,
{
    /// Get a row of the data as a vector.
    pub fn get_row(&self, row: usize) -> Vec<T> {
        self.get_row_iter(row).copied().collect()
    }

    /// Copy a subset of rows into a new column-major buffer.
    ///
    /// The result has `rows.len()` rows and `self.cols` columns and can be
    /// wrapped with [`Matrix::new`].
    pub fn select_rows(&self, rows: &[usize]) -> Vec<T> {
        let mut out = Vec::with_capacity(rows.len() * self.cols);
        for j in 0..self.cols {
            let col = self.get_col(j);
            out.extend(rows.iter().map(|&i| col[i]));
        }
        out
    }
}

impl<'a, T> fmt::Display for Matrix<'a, T>
where
    T: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for i in 0..self.rows {
            for j in 0..self.cols {
                write!(f, "{}", self.get(i, j))?;
                if j == (self.cols - 1) {
                    writeln!(f)?;
                } else {
                    write!(f, " ")?;
                }
            }
        }
        Ok(())
    }
}

/// Owned column major matrix with one column per treatment arm.
///
/// Holds nuisance predictions (`n x arms`), doubly robust outcomes and CATE
/// predictions (`n x non-control arms`). It is always two dimensional, a
/// single arm is stored as one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArmMatrix {
    /// The raw data in column-major order.
    pub data: Vec<f64>,
    /// Number of rows.
    pub rows: usize,
    /// Number of columns.
    pub cols: usize,
}

impl ArmMatrix {
    /// Create a matrix filled with zeros.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        ArmMatrix {
            data: vec![0.0; rows * cols],
            rows,
            cols,
        }
    }

    /// Create a matrix from column-major data.
    pub fn new(data: Vec<f64>, rows: usize, cols: usize) -> Result<Self, DRTesterError> {
        if data.len() != rows * cols {
            return Err(DRTesterError::ShapeMismatch(format!(
                "{} values cannot fill a {} x {} matrix",
                data.len(),
                rows,
                cols
            )));
        }
        Ok(ArmMatrix { data, rows, cols })
    }

    /// Stack equally long columns side by side.
    pub fn from_columns(columns: Vec<Vec<f64>>) -> Result<Self, DRTesterError> {
        let rows = columns.first().map_or(0, |c| c.len());
        let cols = columns.len();
        let mut data = Vec::with_capacity(rows * cols);
        for (j, col) in columns.into_iter().enumerate() {
            if col.len() != rows {
                return Err(DRTesterError::ShapeMismatch(format!(
                    "column {} has {} rows, expected {}",
                    j,
                    col.len(),
                    rows
                )));
            }
            data.extend(col);
        }
        Ok(ArmMatrix { data, rows, cols })
    }

    /// Create a matrix from row-major data, as returned by most classifiers.
    pub fn from_row_major(data: &[f64], rows: usize, cols: usize) -> Result<Self, DRTesterError> {
        if data.len() != rows * cols {
            return Err(DRTesterError::ShapeMismatch(format!(
                "{} values cannot fill a {} x {} matrix",
                data.len(),
                rows,
                cols
            )));
        }
        let mut out = ArmMatrix::zeros(rows, cols);
        for i in 0..rows {
            for j in 0..cols {
                out.set(i, j, data[i * cols + j]);
            }
        }
        Ok(out)
    }

    /// Get a single item.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[j * self.rows + i]
    }

    /// Set a single item.
    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        self.data[j * self.rows + i] = value;
    }

    /// Get an entire column.
    pub fn col(&self, col: usize) -> &[f64] {
        &self.data[col * self.rows..(col + 1) * self.rows]
    }

    /// Get an entire column, mutably.
    pub fn col_mut(&mut self, col: usize) -> &mut [f64] {
        &mut self.data[col * self.rows..(col + 1) * self.rows]
    }

    /// Get a row as a vector.
    pub fn row(&self, row: usize) -> Vec<f64> {
        (0..self.cols).map(|j| self.get(row, j)).collect()
    }

    /// Write the rows of `block` into the given row positions of `self`.
    pub fn scatter_rows(&mut self, rows: &[usize], block: &ArmMatrix) {
        debug_assert_eq!(rows.len(), block.rows);
        debug_assert_eq!(self.cols, block.cols);
        for j in 0..self.cols {
            let src = block.col(j);
            let dst = self.col_mut(j);
            for (r, &i) in rows.iter().enumerate() {
                dst[i] = src[r];
            }
        }
    }
}
