//! Shared numeric types.

use nalgebra::{Matrix2, Point2, Vector2};

/// A continuous position in grid-index space.
pub type Position = Point2<f64>;

/// A sampled flow vector.
pub type Velocity = Vector2<f64>;

/// `[[dvx/dx, dvx/dy], [dvy/dx, dvy/dy]]`
pub type Jacobian = Matrix2<f64>;

/// Straight RGBA in `[0, 1]`.
pub type Rgba = [f32; 4];

/// Integration direction along a streamline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

impl Direction {
    pub fn sign(self) -> f64 {
        match self {
            Direction::Forward => 1.0,
            Direction::Backward => -1.0,
        }
    }

    pub fn reversed(self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }

    /// `Forward` for `sign >= 0`, `Backward` otherwise.
    pub fn from_sign(sign: f64) -> Self {
        if sign < 0.0 {
            Direction::Backward
        } else {
            Direction::Forward
        }
    }
}
