//! Dense matrices over GF(256) and construction of the systematic generator matrix.

use std::fmt;

use crate::error::CodingError;
use crate::galois::{self, Kernel};

/// Row-major matrix of field elements.
#[derive(Clone, PartialEq, Eq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<u8>,
}

impl Matrix {
    /// Zero matrix of the given shape.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols, data: vec![0u8; rows * cols] }
    }

    /// Builds a matrix from row slices, which must all have the same length.
    pub fn from_rows<R: AsRef<[u8]>>(rows: &[R]) -> Result<Self, CodingError> {
        let cols = rows.first().map_or(0, |row| row.as_ref().len());
        let mut matrix = Self::new(rows.len(), cols);
        for (r, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != cols {
                return Err(CodingError::MatrixShape("rows have different lengths"));
            }
            matrix.row_mut(r).copy_from_slice(row);
        }
        Ok(matrix)
    }

    /// Creates the identity matrix.
    ///
    /// # Arguments
    /// * `size` - Number of rows and columns
    ///
    /// # Returns
    /// A `size` x `size` matrix with ones on the diagonal
    pub fn identity(size: usize) -> Self {
        let mut matrix = Self::new(size, size);
        for i in 0..size {
            matrix.set(i, i, 1);
        }
        matrix
    }

    /// `v[r][c] = r^c`, with row indices taken as field elements.
    ///
    /// Any `cols` rows are linearly independent as long as `rows <= 256`.
    pub fn vandermonde(rows: usize, cols: usize) -> Self {
        let mut matrix = Self::new(rows, cols);
        for (r, x) in (0..rows).zip(0u8..=255) {
            for (c, value) in matrix.row_mut(r).iter_mut().enumerate() {
                *value = galois::exp(x, c);
            }
        }
        matrix
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    /// Reads one element.
    ///
    /// # Arguments
    /// * `r` - Row index
    /// * `c` - Column index
    ///
    /// # Returns
    /// The element at (`r`, `c`)
    #[inline]
    pub fn get(&self, r: usize, c: usize) -> u8 {
        self.data[r * self.cols + c]
    }

    /// Overwrites one element.
    ///
    /// # Arguments
    /// * `r` - Row index
    /// * `c` - Column index
    /// * `value` - New element
    #[inline]
    pub fn set(&mut self, r: usize, c: usize, value: u8) {
        self.data[r * self.cols + c] = value;
    }

    #[inline]
    pub fn row(&self, r: usize) -> &[u8] {
        &self.data[r * self.cols..(r + 1) * self.cols]
    }

    #[inline]
    pub fn row_mut(&mut self, r: usize) -> &mut [u8] {
        &mut self.data[r * self.cols..(r + 1) * self.cols]
    }

    pub fn swap_rows(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        let (low, high) = (a.min(b), a.max(b));
        let (head, tail) = self.data.split_at_mut(high * self.cols);
        head[low * self.cols..(low + 1) * self.cols].swap_with_slice(&mut tail[..self.cols]);
    }

    /// Matrix product `self × rhs`.
    pub fn multiply(&self, rhs: &Self) -> Result<Self, CodingError> {
        if self.cols != rhs.rows {
            return Err(CodingError::MatrixShape("left columns must equal right rows"));
        }
        let mut result = Self::new(self.rows, rhs.cols);
        for r in 0..self.rows {
            for c in 0..rhs.cols {
                let value = (0..self.cols).fold(0u8, |acc, k| acc ^ galois::mul(self.get(r, k), rhs.get(k, c)));
                result.set(r, c, value);
            }
        }
        Ok(result)
    }

    /// Concatenates `rhs` to the right of `self`.
    pub fn augment(&self, rhs: &Self) -> Result<Self, CodingError> {
        if self.rows != rhs.rows {
            return Err(CodingError::MatrixShape("augmented matrices must have the same number of rows"));
        }
        let mut result = Self::new(self.rows, self.cols + rhs.cols);
        for r in 0..self.rows {
            let (left, right) = result.row_mut(r).split_at_mut(self.cols);
            left.copy_from_slice(self.row(r));
            right.copy_from_slice(rhs.row(r));
        }
        Ok(result)
    }

    /// Rows `rmin..rmax` and columns `cmin..cmax`.
    pub fn sub_matrix(&self, rmin: usize, cmin: usize, rmax: usize, cmax: usize) -> Result<Self, CodingError> {
        if rmin > rmax || cmin > cmax || rmax > self.rows || cmax > self.cols {
            return Err(CodingError::MatrixShape("sub-matrix bounds out of range"));
        }
        let mut result = Self::new(rmax - rmin, cmax - cmin);
        for r in rmin..rmax {
            result.row_mut(r - rmin).copy_from_slice(&self.row(r)[cmin..cmax]);
        }
        Ok(result)
    }

    /// Inverse of a square matrix by Gauss-Jordan elimination.
    pub fn invert(&self) -> Result<Self, CodingError> {
        if !self.is_square() {
            return Err(CodingError::MatrixShape("only square matrices can be inverted"));
        }
        let size = self.rows;
        let mut work = self.augment(&Self::identity(size))?;
        work.gaussian_elimination()?;
        work.sub_matrix(0, size, size, size * 2)
    }

    fn gaussian_elimination(&mut self) -> Result<(), CodingError> {
        let rows = self.rows;

        // Clear everything below the diagonal, pivoting on the first usable row.
        for r in 0..rows {
            if self.get(r, r) == 0 {
                let pivot = (r + 1..rows).find(|&below| self.get(below, r) != 0).ok_or(CodingError::MatrixNotInvertible)?;
                self.swap_rows(r, pivot);
            }

            let diagonal = self.get(r, r);
            if diagonal != 1 {
                let scale = galois::inv(diagonal)?;
                let row = self.row(r).to_vec();
                Kernel::Scalar.mul_slice(scale, &row, self.row_mut(r));
            }

            let pivot_row = self.row(r).to_vec();
            for below in r + 1..rows {
                let factor = self.get(below, r);
                if factor != 0 {
                    Kernel::Scalar.mul_slice_xor(factor, &pivot_row, self.row_mut(below));
                }
            }
        }

        // Then everything above it.
        for d in 0..rows {
            let pivot_row = self.row(d).to_vec();
            for above in 0..d {
                let factor = self.get(above, d);
                if factor != 0 {
                    Kernel::Scalar.mul_slice_xor(factor, &pivot_row, self.row_mut(above));
                }
            }
        }

        Ok(())
    }
}

impl fmt::Debug for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries((0..self.rows).map(|r| self.row(r))).finish()
    }
}

/// Builds the `total_shards × data_shards` generator matrix.
///
/// A Vandermonde matrix already has the property that any square subset of
/// rows is invertible, but it does not leave data shards unchanged. Multiplying
/// by the inverse of its top square turns that square into the identity while
/// preserving the property.
pub fn build_matrix(data_shards: usize, total_shards: usize) -> Result<Matrix, CodingError> {
    let vandermonde = Matrix::vandermonde(total_shards, data_shards);
    let top = vandermonde.sub_matrix(0, 0, data_shards, data_shards)?;
    vandermonde.multiply(&top.invert()?)
}
