use crate::traits::{Stepper, VectorField};
use crate::types::{Position, Velocity};
use serde::{Deserialize, Serialize};

/// Rescales `v` to unit length; the zero vector is returned unchanged.
fn unit_or_zero(v: Velocity) -> Velocity {
    let norm = v.norm();
    if norm > 0.0 {
        v / norm
    } else {
        v
    }
}

/// One classic Runge-Kutta 4th order step.
///
/// With `normalized`, every stage is rescaled to unit length before the
/// weighted combination, which integrates the direction field.
pub fn rk4_step(
    field: &impl VectorField,
    position: &Position,
    step_size: f64,
    normalized: bool,
) -> Position {
    let half = step_size / 2.0;

    // k1 = f(x)
    let mut v1 = field.velocity(position);
    if normalized {
        v1 = unit_or_zero(v1);
    }
    // k2 = f(x + h/2 k1)
    let mut v2 = field.velocity(&(position + v1 * half));
    if normalized {
        v2 = unit_or_zero(v2);
    }
    // k3 = f(x + h/2 k2)
    let mut v3 = field.velocity(&(position + v2 * half));
    if normalized {
        v3 = unit_or_zero(v3);
    }
    // k4 = f(x + h k3)
    let mut v4 = field.velocity(&(position + v3 * step_size));
    if normalized {
        v4 = unit_or_zero(v4);
    }

    let direction = v1 / 6.0 + v2 / 3.0 + v3 / 3.0 + v4 / 6.0;
    position + direction * step_size
}

/// One forward Euler step, `x + h f(x)`.
pub fn euler_step(
    field: &impl VectorField,
    position: &Position,
    step_size: f64,
    normalized: bool,
) -> Position {
    let mut v = field.velocity(position);
    if normalized {
        v = unit_or_zero(v);
    }
    position + v * step_size
}

/// Classic Runge-Kutta 4th Order Solver
#[derive(Debug, Clone, Copy, Default)]
pub struct Rk4;

impl Stepper for Rk4 {
    fn step(
        &self,
        field: &impl VectorField,
        position: &Position,
        step_size: f64,
        normalized: bool,
    ) -> Position {
        rk4_step(field, position, step_size, normalized)
    }
}

/// Forward Euler, kept as the lower-fidelity reference integrator.
#[derive(Debug, Clone, Copy, Default)]
pub struct Euler;

impl Stepper for Euler {
    fn step(
        &self,
        field: &impl VectorField,
        position: &Position,
        step_size: f64,
        normalized: bool,
    ) -> Position {
        euler_step(field, position, step_size, normalized)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationMethod {
    #[default]
    Rk4,
    Euler,
}

impl IntegrationMethod {
    pub fn step(
        self,
        field: &impl VectorField,
        position: &Position,
        step_size: f64,
        normalized: bool,
    ) -> Position {
        match self {
            IntegrationMethod::Rk4 => Rk4.step(field, position, step_size, normalized),
            IntegrationMethod::Euler => Euler.step(field, position, step_size, normalized),
        }
    }
}
