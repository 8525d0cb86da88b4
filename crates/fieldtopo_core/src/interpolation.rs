//! Bilinear sampling and finite-difference Jacobians.
//!
//! Out-of-domain policy: any position outside `[0, width-1] x [0, height-1]`
//! (or with a non-finite coordinate) samples as zero. Streamline stopping
//! conditions rely on this as "no flow".

use crate::grid::{ScalarGrid, VectorGrid};
use crate::traits::{GridValue, VectorField};
use crate::types::{Jacobian, Position, Velocity};

/// Finite-difference step used by [`sample_jacobian`].
pub const JACOBIAN_STEP: f64 = 1e-3;

/// Lower-left corner of the cell containing `position` plus fractional offsets.
/// The corner is clamped so that `(x0 + 1, y0 + 1)` stays on the lattice.
fn cell_corner(
    width: usize,
    height: usize,
    position: &Position,
) -> Option<(usize, usize, f64, f64)> {
    let max_x = (width - 1) as f64;
    let max_y = (height - 1) as f64;
    if !(position.x >= 0.0 && position.x <= max_x && position.y >= 0.0 && position.y <= max_y) {
        return None;
    }
    let x0 = (position.x.floor() as usize).min(width - 2);
    let y0 = (position.y.floor() as usize).min(height - 2);
    Some((x0, y0, position.x - x0 as f64, position.y - y0 as f64))
}

fn bilerp(f00: f64, f10: f64, f01: f64, f11: f64, tx: f64, ty: f64) -> f64 {
    // Weighted form so that t = 0 and t = 1 return the corner values exactly.
    let bottom = f00 * (1.0 - tx) + f10 * tx;
    let top = f01 * (1.0 - tx) + f11 * tx;
    bottom * (1.0 - ty) + top * ty
}

/// Bilinearly interpolates both vector components at `position`.
pub fn sample_vector<T: GridValue>(grid: &VectorGrid<T>, position: &Position) -> Velocity {
    let Some((x0, y0, tx, ty)) = cell_corner(grid.width(), grid.height(), position) else {
        return Velocity::zeros();
    };
    let f00 = grid.get_or_zero(x0, y0);
    let f10 = grid.get_or_zero(x0 + 1, y0);
    let f01 = grid.get_or_zero(x0, y0 + 1);
    let f11 = grid.get_or_zero(x0 + 1, y0 + 1);
    Velocity::new(
        bilerp(f00.x, f10.x, f01.x, f11.x, tx, ty),
        bilerp(f00.y, f10.y, f01.y, f11.y, tx, ty),
    )
}

/// Bilinearly interpolates a scalar grid at `position`.
pub fn sample_scalar<T: GridValue>(grid: &ScalarGrid<T>, position: &Position) -> f64 {
    let Some((x0, y0, tx, ty)) = cell_corner(grid.width(), grid.height(), position) else {
        return 0.0;
    };
    bilerp(
        grid.get_or_zero(x0, y0),
        grid.get_or_zero(x0 + 1, y0),
        grid.get_or_zero(x0, y0 + 1),
        grid.get_or_zero(x0 + 1, y0 + 1),
        tx,
        ty,
    )
}

/// Jacobian of `field` at `position` by central differences.
///
/// Near the boundary the stencil is shifted inward (one-sided differences), so
/// the zero-vector sentinel outside the domain never enters the derivative.
pub fn sample_jacobian(field: &impl VectorField, position: &Position) -> Jacobian {
    let (width, height) = field.dims();
    let max_x = width.saturating_sub(1) as f64;
    let max_y = height.saturating_sub(1) as f64;
    let h = JACOBIAN_STEP;

    let (x_lo, x_hi) = stencil(position.x, h, max_x);
    let (y_lo, y_hi) = stencil(position.y, h, max_y);

    let dvdx = (field.velocity(&Position::new(x_hi, position.y))
        - field.velocity(&Position::new(x_lo, position.y)))
        / (x_hi - x_lo);
    let dvdy = (field.velocity(&Position::new(position.x, y_hi))
        - field.velocity(&Position::new(position.x, y_lo)))
        / (y_hi - y_lo);

    Jacobian::new(dvdx.x, dvdy.x, dvdx.y, dvdy.y)
}

fn stencil(center: f64, h: f64, max: f64) -> (f64, f64) {
    let lo = (center - h).max(0.0);
    let hi = (center + h).min(max);
    if hi - lo <= 0.0 {
        // Degenerate extent; fall back to an unclamped stencil.
        return (center - h, center + h);
    }
    (lo, hi)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> VectorGrid<f64> {
        VectorGrid::from_fn(4, 3, |x, y| (x * x + y, 2.0 * x - y * y)).expect("grid")
    }

    #[test]
    fn sample_reproduces_lattice_values() {
        let grid = ramp();
        for y in 0..3 {
            for x in 0..4 {
                let expected = grid.get(x, y).expect("in bounds");
                let sampled = sample_vector(&grid, &Position::new(x as f64, y as f64));
                assert_eq!(sampled, expected, "lattice point ({x}, {y})");
            }
        }
    }

    #[test]
    fn sample_is_linear_along_cell_edges() {
        let grid = ramp();
        let a = grid.get(1, 2).expect("a");
        let b = grid.get(2, 2).expect("b");
        for i in 0..=10 {
            let t = i as f64 / 10.0;
            let sampled = sample_vector(&grid, &Position::new(1.0 + t, 2.0));
            let expected = a + (b - a) * t;
            assert!((sampled - expected).norm() < 1e-12, "t = {t}");
        }
        let c = grid.get(3, 0).expect("c");
        let d = grid.get(3, 1).expect("d");
        let sampled = sample_vector(&grid, &Position::new(3.0, 0.25));
        assert!((sampled - (c + (d - c) * 0.25)).norm() < 1e-12);
    }

    #[test]
    fn sample_outside_domain_is_zero() {
        let grid = ramp();
        assert_eq!(sample_vector(&grid, &Position::new(-0.01, 1.0)), Velocity::zeros());
        assert_eq!(sample_vector(&grid, &Position::new(1.0, 2.5)), Velocity::zeros());
        assert_eq!(
            sample_vector(&grid, &Position::new(f64::NAN, 1.0)),
            Velocity::zeros()
        );
    }

    #[test]
    fn sample_scalar_matches_bilinear_center() {
        let grid = ScalarGrid::new(2, 2, vec![0.0, 1.0, 2.0, 3.0]).expect("grid");
        assert!((sample_scalar(&grid, &Position::new(0.5, 0.5)) - 1.5).abs() < 1e-12);
        assert_eq!(sample_scalar(&grid, &Position::new(1.0, 1.0)), 3.0);
        assert_eq!(sample_scalar(&grid, &Position::new(2.0, 1.0)), 0.0);
    }

    #[test]
    fn jacobian_of_linear_field_is_exact() {
        let grid =
            VectorGrid::from_fn(6, 6, |x, y| (2.0 * x - y, 0.5 * x + 3.0 * y)).expect("grid");
        for position in [
            Position::new(2.3, 2.7),
            Position::new(0.0, 0.0),
            Position::new(5.0, 5.0),
            Position::new(5.0, 1.5),
        ] {
            let jac = sample_jacobian(&grid, &position);
            let expected = Jacobian::new(2.0, -1.0, 0.5, 3.0);
            assert!((jac - expected).norm() < 1e-9, "at {position:?}: {jac:?}");
        }
    }
}
