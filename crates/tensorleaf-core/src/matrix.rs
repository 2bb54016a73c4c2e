// Matrix: column-major 2-D buffer holding a parameter's values
//
// Every parameter value, whatever its tensor rank, is stored as a dense
// rows x cols matrix in column-major order: element (r, c) lives at index
// c * rows + r. A tensor shape maps onto this view through
// `TensorShape::as_matrix_dims`, so reshaping never copies.
//
// RANDOM FILLS:
//
//   fill_uniform(low, high, seed)  U[low, high], inclusive finite bounds
//   fill_gaussian(mean, std, seed) N(mean, std)
//
// Both draw from `StdRng::seed_from_u64(seed)` in storage order, so the same
// seed and the same geometry always give the same buffer, bit for bit.
//
// LOCATION:
//
// The matrix records the device it is resident on. `transfer_to_device_if_not_there`
// moves it; the data itself stays in host memory.

use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::Normal;

use crate::device::DeviceId;
use crate::dtype::Element;
use crate::error::{Error, Result};

/// Dense column-major matrix resident on a device.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix<E: Element> {
    rows: usize,
    cols: usize,
    data: Vec<E>,
    device: DeviceId,
}

impl<E: Element> Matrix<E> {
    /// A zero-filled rows x cols matrix.
    pub fn zeros(rows: usize, cols: usize, device: DeviceId) -> Self {
        Matrix {
            rows,
            cols,
            data: vec![E::zero(); rows * cols],
            device,
        }
    }

    /// A 0 x 0 matrix.
    pub fn empty(device: DeviceId) -> Self {
        Self::zeros(0, 0, device)
    }

    /// Wrap column-major data. Fails if `data.len() != rows * cols`.
    pub fn from_col_major(rows: usize, cols: usize, data: Vec<E>, device: DeviceId) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::invalid_argument(format!(
                "matrix [{rows} x {cols}] requires {} elements, got {}",
                rows * cols,
                data.len()
            )));
        }
        Ok(Matrix {
            rows,
            cols,
            data,
            device,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn device(&self) -> DeviceId {
        self.device
    }

    /// The column-major storage.
    pub fn as_slice(&self) -> &[E] {
        &self.data
    }

    /// Element at (row, col).
    pub fn get(&self, row: usize, col: usize) -> Option<E> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.data.get(col * self.rows + row).copied()
    }

    /// Resize to rows x cols, discarding the contents (all zeros after).
    pub fn resize(&mut self, rows: usize, cols: usize) {
        self.rows = rows;
        self.cols = cols;
        self.data.clear();
        self.data.resize(rows * cols, E::zero());
    }

    /// Reinterpret the storage with a new geometry of the same element count.
    pub fn reshape(&mut self, rows: usize, cols: usize) -> Result<()> {
        if rows * cols != self.data.len() {
            return Err(Error::logic(format!(
                "cannot reshape [{} x {}] matrix to [{rows} x {cols}]",
                self.rows, self.cols
            )));
        }
        self.rows = rows;
        self.cols = cols;
        Ok(())
    }

    /// Set every element to `value`.
    pub fn fill(&mut self, value: E) {
        self.data.iter_mut().for_each(|x| *x = value);
    }

    /// Fill with draws from U[low, high] using a seeded generator. The
    /// bounds must be finite with `low <= high`.
    pub fn fill_uniform(&mut self, low: E, high: E, seed: u64) -> Result<()> {
        let (lo, hi) = (low.as_f64(), high.as_f64());
        if !(lo.is_finite() && hi.is_finite() && lo <= hi) {
            return Err(Error::invalid_argument(format!(
                "invalid uniform U[{low}, {high}]: bounds must be finite and ordered"
            )));
        }
        let dist = Uniform::new_inclusive(lo, hi);
        let mut rng = StdRng::seed_from_u64(seed);
        for x in self.data.iter_mut() {
            *x = E::from_f64(dist.sample(&mut rng));
        }
        Ok(())
    }

    /// Fill with draws from N(mean, std) using a seeded generator.
    pub fn fill_gaussian(&mut self, mean: E, std: E, seed: u64) -> Result<()> {
        if !(mean.as_f64().is_finite() && std.as_f64().is_finite()) {
            return Err(Error::invalid_argument(format!(
                "invalid gaussian N({mean}, {std}): parameters must be finite"
            )));
        }
        let dist = Normal::new(mean.as_f64(), std.as_f64()).map_err(|e| {
            Error::invalid_argument(format!("invalid gaussian N({mean}, {std}): {e}"))
        })?;
        let mut rng = StdRng::seed_from_u64(seed);
        for x in self.data.iter_mut() {
            *x = E::from_f64(dist.sample(&mut rng));
        }
        Ok(())
    }

    /// Move the matrix to `device` unless it is already resident there.
    /// Returns true if a transfer took place.
    pub fn transfer_to_device_if_not_there(&mut self, device: DeviceId) -> bool {
        if self.device == device {
            return false;
        }
        log::debug!(
            "transferring [{} x {}] matrix from {} to {}",
            self.rows,
            self.cols,
            self.device,
            device
        );
        self.device = device;
        true
    }

    /// Values as one Vec per matrix row (for printing and tests).
    pub fn to_rows(&self) -> Vec<Vec<E>> {
        (0..self.rows)
            .map(|r| (0..self.cols).map(|c| self.data[c * self.rows + r]).collect())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_col_major_indexing() {
        // [[1, 3, 5],
        //  [2, 4, 6]]
        let m = Matrix::<f64>::from_col_major(2, 3, vec![1., 2., 3., 4., 5., 6.], DeviceId::Cpu)
            .unwrap();
        assert_eq!(m.get(0, 2), Some(5.0));
        assert_eq!(m.get(1, 0), Some(2.0));
        assert_eq!(m.get(2, 0), None);
        assert_eq!(m.to_rows(), vec![vec![1., 3., 5.], vec![2., 4., 6.]]);
    }

    #[test]
    fn test_from_col_major_rejects_bad_len() {
        assert!(Matrix::<f32>::from_col_major(2, 2, vec![1.0; 3], DeviceId::Cpu).is_err());
    }

    #[test]
    fn test_reshape_keeps_data() {
        let mut m = Matrix::<f32>::from_col_major(4, 6, (0..24).map(|x| x as f32).collect(), DeviceId::Cpu)
            .unwrap();
        m.reshape(8, 3).unwrap();
        assert_eq!(m.rows(), 8);
        assert_eq!(m.as_slice()[23], 23.0);
        assert!(m.reshape(5, 5).is_err());
    }

    #[test]
    fn test_uniform_bounds_and_determinism() {
        let mut a = Matrix::<f64>::zeros(20, 30, DeviceId::Cpu);
        let mut b = Matrix::<f64>::zeros(20, 30, DeviceId::Cpu);
        a.fill_uniform(-0.05, 0.05, 7).unwrap();
        b.fill_uniform(-0.05, 0.05, 7).unwrap();
        assert_eq!(a, b);
        assert!(a.as_slice().iter().all(|&x| (-0.05..=0.05).contains(&x)));

        let mut c = Matrix::<f64>::zeros(20, 30, DeviceId::Cpu);
        c.fill_uniform(-0.05, 0.05, 8).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_gaussian_stats() {
        let mut m = Matrix::<f64>::zeros(100, 100, DeviceId::Cpu);
        m.fill_gaussian(0.0, 0.5, 1).unwrap();
        let n = m.len() as f64;
        let mean = m.as_slice().iter().sum::<f64>() / n;
        let var = m.as_slice().iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        assert!(mean.abs() < 0.02, "mean {} too far from 0", mean);
        assert!((var.sqrt() - 0.5).abs() < 0.02, "std {} too far from 0.5", var.sqrt());
    }

    #[test]
    fn test_gaussian_rejects_negative_std() {
        let mut m = Matrix::<f32>::zeros(2, 2, DeviceId::Cpu);
        assert!(m.fill_gaussian(0.0, -1.0, 1).is_err());
    }

    #[test]
    fn test_uniform_rejects_bad_bounds() {
        let mut m = Matrix::<f32>::zeros(2, 2, DeviceId::Cpu);
        assert!(m.fill_uniform(0.05, -0.05, 1).is_err());
        assert!(m.fill_uniform(f32::NEG_INFINITY, f32::INFINITY, 1).is_err());
        assert!(m.fill_uniform(f32::NAN, 1.0, 1).is_err());
        assert!(m.as_slice().iter().all(|&x| x == 0.0));
        // A degenerate range is allowed.
        m.fill_uniform(0.25, 0.25, 1).unwrap();
        assert!(m.as_slice().iter().all(|&x| x == 0.25));
    }

    #[test]
    fn test_gaussian_rejects_non_finite() {
        let mut m = Matrix::<f32>::zeros(2, 2, DeviceId::Cpu);
        let err = m.fill_gaussian(0.0, f32::INFINITY, 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(m.fill_gaussian(f32::NAN, 1.0, 1).is_err());
    }

    #[test]
    fn test_transfer() {
        let mut m = Matrix::<f32>::zeros(1, 1, DeviceId::Gpu(0));
        assert!(m.transfer_to_device_if_not_there(DeviceId::Cpu));
        assert!(!m.transfer_to_device_if_not_there(DeviceId::Cpu));
        assert_eq!(m.device(), DeviceId::Cpu);
    }
}
