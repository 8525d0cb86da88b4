//! Adaptive quad-subdivision search for zeros of a 2D vector field.
//!
//! A cell is refined only while its corner values can still enclose a zero,
//! which prunes the vast majority of the grid after one evaluation per cell.
//! A leaf is reported by its lower-left corner once the cell is smaller than
//! the tolerance and the field magnitude at that corner is below it too;
//! candidates that never get there before the depth ceiling are dropped.
//!
//! Known limitations:
//! - The sign test is necessary, not sufficient; non-monotonic fields can
//!   produce false positives and, in rare cases, miss a zero.
//! - Cells sharing an edge or corner with a zero may each report it; no
//!   deduplication happens across cells.

use crate::settings::check_range;
use crate::traits::VectorField;
use crate::types::{Position, Velocity};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Absolute cap on the subdivision depth, independent of the tolerance.
pub const MAX_SUBDIVISION_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroSearchMode {
    /// Assume at most one zero per initial cell and stop at the first leaf.
    #[default]
    FirstHit,
    /// Report every leaf that passes the sign test.
    AllLeaves,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZeroSearchSettings {
    /// Leaf cell size; cells smaller than this are reported.
    pub tolerance: f64,
    /// Edge length of the cells seeded over the grid.
    pub initial_cell_size: f64,
    pub mode: ZeroSearchMode,
}

impl Default for ZeroSearchSettings {
    fn default() -> Self {
        Self {
            tolerance: 0.02,
            initial_cell_size: 1.0,
            mode: ZeroSearchMode::FirstHit,
        }
    }
}

impl ZeroSearchSettings {
    pub fn validate(&self) -> Result<()> {
        check_range("tolerance", self.tolerance, 1e-5, 1.0)?;
        check_range("initial_cell_size", self.initial_cell_size, 1e-5, 1.0)?;
        Ok(())
    }

    /// Deepest subdivision level needed to get from `cell_size` below the tolerance.
    pub fn depth_limit(&self, cell_size: f64) -> usize {
        if cell_size < self.tolerance {
            return 0;
        }
        let levels = (cell_size / self.tolerance).log2().ceil();
        if levels.is_finite() && levels >= 0.0 {
            (levels as usize + 1).min(MAX_SUBDIVISION_DEPTH)
        } else {
            MAX_SUBDIVISION_DEPTH
        }
    }
}

/// True unless all values share one strict sign.
fn straddles_zero(values: [f64; 4]) -> bool {
    let all_positive = values.iter().all(|v| *v > 0.0);
    let all_negative = values.iter().all(|v| *v < 0.0);
    !all_positive && !all_negative
}

/// Candidate test on the four corner values of a cell: both components must
/// be able to vanish inside it. Zeros count as either sign, so a field that
/// vanishes exactly on a lattice point is still found.
pub fn has_sign_change(corners: &[Velocity; 4]) -> bool {
    straddles_zero([corners[0].x, corners[1].x, corners[2].x, corners[3].x])
        && straddles_zero([corners[0].y, corners[1].y, corners[2].y, corners[3].y])
}

struct Cell {
    origin: Position,
    size: f64,
    depth: usize,
}

/// Searches the square `[origin, origin + cell_size]` for zeros.
///
/// Subdivision runs on an explicit stack. Quadrants are visited in the order
/// lower-left, lower-right, upper-right, upper-left.
pub fn find_zeros_in_cell(
    field: &impl VectorField,
    origin: Position,
    cell_size: f64,
    settings: &ZeroSearchSettings,
) -> Vec<Position> {
    let mut found = Vec::new();
    let max_depth = settings.depth_limit(cell_size);
    let (width, height) = field.dims();
    let max_x = width.saturating_sub(1) as f64;
    let max_y = height.saturating_sub(1) as f64;
    let mut stack = vec![Cell {
        origin,
        size: cell_size,
        depth: 0,
    }];

    while let Some(cell) = stack.pop() {
        let s = cell.size;
        let o = cell.origin;
        // Far corners are clamped so rounding never samples outside the domain.
        let x1 = (o.x + s).min(max_x);
        let y1 = (o.y + s).min(max_y);
        let corners = [
            field.velocity(&o),
            field.velocity(&Position::new(x1, o.y)),
            field.velocity(&Position::new(x1, y1)),
            field.velocity(&Position::new(o.x, y1)),
        ];
        if !has_sign_change(&corners) {
            continue;
        }

        let resolved = s < settings.tolerance || cell.depth >= max_depth;
        if resolved && corners[0].norm() < settings.tolerance {
            log::trace!("Zero candidate at ({:.4}, {:.4})", o.x, o.y);
            found.push(o);
            if settings.mode == ZeroSearchMode::FirstHit {
                break;
            }
            continue;
        }
        if cell.depth >= MAX_SUBDIVISION_DEPTH {
            log::trace!("Dropping unresolved cell at ({:.4}, {:.4})", o.x, o.y);
            continue;
        }

        let h = s / 2.0;
        let depth = cell.depth + 1;
        // Pushed in reverse so the lower-left quadrant is popped first.
        for quadrant in [
            Position::new(o.x, o.y + h),
            Position::new(o.x + h, o.y + h),
            Position::new(o.x + h, o.y),
            o,
        ] {
            stack.push(Cell {
                origin: quadrant,
                size: h,
                depth,
            });
        }
    }
    found
}

/// Number of cells of `size` needed to cover `extent`, and the origin of cell `i`.
/// The last cell is shifted back so it ends on the boundary instead of past it.
fn cell_count(extent: f64, size: f64) -> usize {
    if extent < size {
        return 0;
    }
    (extent / size - 1e-9).ceil() as usize
}

fn cell_origin(i: usize, extent: f64, size: f64) -> f64 {
    (i as f64 * size).min(extent - size)
}

/// Scans every grid cell and collects the zeros found in each.
pub fn find_zeros(
    field: &impl VectorField,
    settings: &ZeroSearchSettings,
) -> Result<Vec<Position>> {
    settings.validate()?;
    let (width, height) = field.dims();
    let size = settings.initial_cell_size;
    let extent_x = width.saturating_sub(1) as f64;
    let extent_y = height.saturating_sub(1) as f64;
    let cells_x = cell_count(extent_x, size);
    let cells_y = cell_count(extent_y, size);

    let mut zeros = Vec::new();
    for iy in 0..cells_y {
        for ix in 0..cells_x {
            let origin = Position::new(
                cell_origin(ix, extent_x, size),
                cell_origin(iy, extent_y, size),
            );
            zeros.extend(find_zeros_in_cell(field, origin, size, settings));
        }
    }
    log::debug!(
        "Zero search over {}x{} cells found {} candidates",
        cells_x,
        cells_y,
        zeros.len()
    );
    Ok(zeros)
}
