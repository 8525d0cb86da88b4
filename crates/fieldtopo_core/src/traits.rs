use crate::types::{Position, Velocity};
use num_traits::ToPrimitive;
use std::fmt::Debug;

/// A trait for types that can be stored in a grid.
/// Values are always read back as `f64`, so integer textures and `f32` volumes
/// share the same sampling code.
pub trait GridValue: ToPrimitive + Copy + Debug + 'static {}

impl<T: ToPrimitive + Copy + Debug + 'static> GridValue for T {}

/// Represents a continuous, steady 2D flow over a rectangular grid domain.
pub trait VectorField {
    /// Returns `(width, height)` of the underlying lattice.
    fn dims(&self) -> (usize, usize);

    /// Evaluates the flow at a continuous position in grid-index space.
    /// Positions outside the domain must return the zero vector.
    fn velocity(&self, position: &Position) -> Velocity;

    /// Returns true when `position` lies inside `[0, width-1] x [0, height-1]`.
    fn contains(&self, position: &Position) -> bool {
        let (width, height) = self.dims();
        position.x >= 0.0
            && position.y >= 0.0
            && position.x <= (width.saturating_sub(1)) as f64
            && position.y <= (height.saturating_sub(1)) as f64
    }
}

impl<F: VectorField + ?Sized> VectorField for &F {
    fn dims(&self) -> (usize, usize) {
        (**self).dims()
    }

    fn velocity(&self, position: &Position) -> Velocity {
        (**self).velocity(position)
    }

    fn contains(&self, position: &Position) -> bool {
        (**self).contains(position)
    }
}

/// A trait for integrators that advance a position along a field.
pub trait Stepper {
    /// Performs one step of size `step_size` (negative integrates backward).
    /// normalized: integrate the direction field instead of the flow field
    fn step(
        &self,
        field: &impl VectorField,
        position: &Position,
        step_size: f64,
        normalized: bool,
    ) -> Position;
}
