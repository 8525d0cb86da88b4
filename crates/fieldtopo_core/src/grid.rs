//! Dense 2D grids with bounds-checked access.
//!
//! Both grids store values row-major with `x` varying fastest. Vector grids
//! interleave the two components (`[vx0, vy0, vx1, vy1, ...]`), which is the
//! layout a host volume of two-channel voxels hands over.

use crate::interpolation::sample_vector;
use crate::traits::{GridValue, VectorField};
use crate::types::{Position, Velocity};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GridError {
    #[error("Grid must be at least 2x2, got {width}x{height}.")]
    TooSmall { width: usize, height: usize },
    #[error("Grid data length mismatch: expected {expected} values, got {actual}.")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("Grid depth must be at least 1.")]
    ZeroDepth,
}

fn check_dims(width: usize, height: usize) -> Result<(), GridError> {
    if width < 2 || height < 2 {
        return Err(GridError::TooSmall { width, height });
    }
    Ok(())
}

/// An immutable 2D grid of two-component vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorGrid<T: GridValue = f64> {
    width: usize,
    height: usize,
    data: Vec<T>,
}

impl<T: GridValue> VectorGrid<T> {
    /// Wraps interleaved `(vx, vy)` data of a `width x height` lattice.
    pub fn new(width: usize, height: usize, data: Vec<T>) -> Result<Self, GridError> {
        check_dims(width, height)?;
        let expected = width * height * 2;
        if data.len() != expected {
            return Err(GridError::LengthMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Takes the `z = 0` slice of a two-channel volume.
    pub fn from_volume(
        width: usize,
        height: usize,
        depth: usize,
        mut data: Vec<T>,
    ) -> Result<Self, GridError> {
        if depth == 0 {
            return Err(GridError::ZeroDepth);
        }
        check_dims(width, height)?;
        let slice = width * height * 2;
        if data.len() != slice * depth {
            return Err(GridError::LengthMismatch {
                expected: slice * depth,
                actual: data.len(),
            });
        }
        if depth > 1 {
            log::warn!("Vector volume has depth {depth}; only the first slice is used.");
            data.truncate(slice);
        }
        Self::new(width, height, data)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the vector stored at lattice point `(x, y)`, or `None` outside the grid.
    pub fn get(&self, x: usize, y: usize) -> Option<Velocity> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = 2 * (y * self.width + x);
        Some(Velocity::new(
            to_f64(self.data[idx]),
            to_f64(self.data[idx + 1]),
        ))
    }

    /// Like [`get`](Self::get) but returns the zero vector outside the grid.
    pub fn get_or_zero(&self, x: usize, y: usize) -> Velocity {
        self.get(x, y).unwrap_or_else(Velocity::zeros)
    }
}

impl VectorGrid<f64> {
    /// Samples `f(x, y)` at every lattice point.
    pub fn from_fn(
        width: usize,
        height: usize,
        f: impl Fn(f64, f64) -> (f64, f64),
    ) -> Result<Self, GridError> {
        check_dims(width, height)?;
        let mut data = Vec::with_capacity(width * height * 2);
        for y in 0..height {
            for x in 0..width {
                let (vx, vy) = f(x as f64, y as f64);
                data.push(vx);
                data.push(vy);
            }
        }
        Self::new(width, height, data)
    }
}

impl<T: GridValue> VectorField for VectorGrid<T> {
    fn dims(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn velocity(&self, position: &Position) -> Velocity {
        sample_vector(self, position)
    }
}

/// An immutable 2D grid of scalars. Also used for grayscale textures.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarGrid<T: GridValue = f64> {
    width: usize,
    height: usize,
    data: Vec<T>,
}

impl<T: GridValue> ScalarGrid<T> {
    pub fn new(width: usize, height: usize, data: Vec<T>) -> Result<Self, GridError> {
        check_dims(width, height)?;
        let expected = width * height;
        if data.len() != expected {
            return Err(GridError::LengthMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn dims(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn get(&self, x: usize, y: usize) -> Option<f64> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(to_f64(self.data[y * self.width + x]))
    }

    pub fn get_or_zero(&self, x: usize, y: usize) -> f64 {
        self.get(x, y).unwrap_or(0.0)
    }

    pub fn raw(&self) -> &[T] {
        &self.data
    }

    pub fn into_raw(self) -> Vec<T> {
        self.data
    }

    /// Returns `(min, max)` over all finite values, or `None` if there are none.
    pub fn value_range(&self) -> Option<(f64, f64)> {
        self.data
            .iter()
            .map(|v| to_f64(*v))
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    pub fn map<U: GridValue>(&self, f: impl Fn(f64) -> U) -> ScalarGrid<U> {
        ScalarGrid {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(|v| f(to_f64(*v))).collect(),
        }
    }
}

impl<T: GridValue> ScalarGrid<T> {
    pub fn from_fn(
        width: usize,
        height: usize,
        f: impl Fn(usize, usize) -> T,
    ) -> Result<Self, GridError> {
        check_dims(width, height)?;
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self::new(width, height, data)
    }
}

fn to_f64<T: GridValue>(value: T) -> f64 {
    value.to_f64().unwrap_or(0.0)
}
