//! Marching squares over a scalar grid.

use crate::grid::ScalarGrid;
use crate::mesh::{Connectivity, DrawType, MeshSink, Vertex};
use crate::settings::{check_count, check_positive};
use crate::traits::GridValue;
use crate::types::Rgba;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

const LOW_COLOR: Rgba = [0.0, 0.0, 1.0, 1.0];
const HIGH_COLOR: Rgba = [1.0, 0.0, 0.0, 1.0];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum IsoLevels {
    Single { value: f64 },
    /// `count` levels spread evenly strictly inside the data range.
    Multiple { count: usize },
}

/// Resolution of the ambiguous case where all four cell edges are crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decider {
    #[default]
    Midpoint,
    Asymptotic,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GaussianSettings {
    pub radius: usize,
    pub sigma: f64,
}

impl Default for GaussianSettings {
    fn default() -> Self {
        Self {
            radius: 3,
            sigma: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IsocontourSettings {
    pub levels: IsoLevels,
    pub decider: Decider,
    /// Color of a single contour. Multiple contours use the blue to red ramp.
    pub iso_color: Rgba,
    pub show_grid: bool,
    pub grid_color: Rgba,
    pub smoothing: Option<GaussianSettings>,
}

impl Default for IsocontourSettings {
    fn default() -> Self {
        Self {
            levels: IsoLevels::Single { value: 0.0 },
            decider: Decider::Midpoint,
            iso_color: [0.0, 0.0, 1.0, 1.0],
            show_grid: false,
            grid_color: [0.0, 0.0, 0.0, 1.0],
            smoothing: None,
        }
    }
}

impl IsocontourSettings {
    pub fn validate(&self) -> Result<()> {
        match self.levels {
            IsoLevels::Single { value } => {
                if !value.is_finite() {
                    bail!("Iso value must be finite, got {value}.");
                }
            }
            IsoLevels::Multiple { count } => check_count("count", count, 1, 50)?,
        }
        if let Some(gaussian) = &self.smoothing {
            check_count("radius", gaussian.radius, 1, 32)?;
            check_positive("sigma", gaussian.sigma)?;
        }
        Ok(())
    }
}

/// Iso values for `levels` over the data range `(min, max)`.
pub fn iso_values(levels: &IsoLevels, range: (f64, f64)) -> Vec<f64> {
    match *levels {
        IsoLevels::Single { value } => vec![value],
        IsoLevels::Multiple { count } => {
            let width = (range.1 - range.0) / (count + 1) as f64;
            (0..count).map(|i| range.0 + width * (i + 1) as f64).collect()
        }
    }
}

/// Two-point transfer function: blue at the data minimum, red at the maximum.
pub fn transfer_color(value: f64, range: (f64, f64)) -> Rgba {
    let span = range.1 - range.0;
    let t = if span > 0.0 {
        ((value - range.0) / span).clamp(0.0, 1.0) as f32
    } else {
        0.5
    };
    let mut color = [0.0; 4];
    for (c, (lo, hi)) in color.iter_mut().zip(LOW_COLOR.iter().zip(HIGH_COLOR.iter())) {
        *c = lo + (hi - lo) * t;
    }
    color
}

/// Edge-clamped Gaussian blur with a `(2 * radius + 1)^2` kernel.
pub fn gaussian_smooth<T: GridValue>(
    grid: &ScalarGrid<T>,
    radius: usize,
    sigma: f64,
) -> Result<ScalarGrid<f64>> {
    let r = radius as isize;
    let mut kernel = Vec::with_capacity((2 * radius + 1).pow(2));
    let mut total = 0.0;
    for dy in -r..=r {
        for dx in -r..=r {
            let w = (-((dx * dx + dy * dy) as f64) / (2.0 * sigma * sigma)).exp();
            kernel.push((dx, dy, w));
            total += w;
        }
    }

    let (width, height) = grid.dims();
    let max_x = width as isize - 1;
    let max_y = height as isize - 1;
    let data = (0..height)
        .flat_map(|y| (0..width).map(move |x| (x as isize, y as isize)))
        .map(|(x, y)| {
            kernel
                .iter()
                .map(|&(dx, dy, w)| {
                    let sx = (x + dx).clamp(0, max_x) as usize;
                    let sy = (y + dy).clamp(0, max_y) as usize;
                    w * grid.get_or_zero(sx, sy)
                })
                .sum::<f64>()
                / total
        })
        .collect();
    Ok(ScalarGrid::new(width, height, data)?)
}

/// Where the level crosses the edge `a -> b`, as a fraction of its length.
fn crossing(a: f64, b: f64, level: f64) -> Option<f64> {
    if (a < level && b > level) || (a > level && b < level) {
        Some((level - a) / (b - a))
    } else {
        None
    }
}

/// Contour segments inside one cell, in cell-local coordinates `[0, 1]^2`.
///
/// Corners are `[f00, f10, f01, f11]`. Intersections are collected in the
/// order bottom, left, top, right.
pub fn cell_segments(corners: [f64; 4], level: f64, decider: Decider) -> Vec<([f64; 2], [f64; 2])> {
    let [f00, f10, f01, f11] = corners;
    let mut points: Vec<[f64; 2]> = Vec::with_capacity(4);
    if let Some(t) = crossing(f00, f10, level) {
        points.push([t, 0.0]);
    }
    if let Some(t) = crossing(f00, f01, level) {
        points.push([0.0, t]);
    }
    if let Some(t) = crossing(f01, f11, level) {
        points.push([t, 1.0]);
    }
    if let Some(t) = crossing(f10, f11, level) {
        points.push([1.0, t]);
    }

    match points.len() {
        2 => vec![(points[0], points[1])],
        4 => match decider {
            Decider::Midpoint => {
                let midpoint = 0.25 * (f00 + f10 + f01 + f11);
                if (midpoint < level) == (f00 < level) {
                    // f00 and the center share a side: cut off f01 and f10.
                    vec![(points[1], points[2]), (points[0], points[3])]
                } else {
                    vec![(points[0], points[1]), (points[2], points[3])]
                }
            }
            Decider::Asymptotic => {
                points.sort_by(|a, b| a[0].partial_cmp(&b[0]).unwrap_or(Ordering::Equal));
                vec![(points[0], points[1]), (points[2], points[3])]
            }
        },
        _ => Vec::new(),
    }
}

/// Extracts contour lines (and optionally the grid) into one `Lines` buffer in
/// unit-square coordinates. Returns the number of contour segments written.
pub fn extract_isocontours<T: GridValue>(
    grid: &ScalarGrid<T>,
    settings: &IsocontourSettings,
    sink: &mut impl MeshSink,
) -> Result<usize> {
    settings.validate()?;
    let Some(range) = grid.value_range() else {
        bail!("Scalar field has no finite values.");
    };
    log::debug!("Scalar field contains values between {} and {}", range.0, range.1);

    let (width, height) = grid.dims();
    let cell_w = 1.0 / (width - 1) as f64;
    let cell_h = 1.0 / (height - 1) as f64;
    let buffer = sink.add_index_buffer(DrawType::Lines, Connectivity::None);

    if settings.show_grid {
        let color = settings.grid_color;
        for i in 0..width {
            let x = i as f64 * cell_w;
            sink.push_segment(buffer, Vertex::flat(x, 0.0, color), Vertex::flat(x, 1.0, color));
        }
        for j in 0..height {
            let y = j as f64 * cell_h;
            sink.push_segment(buffer, Vertex::flat(0.0, y, color), Vertex::flat(1.0, y, color));
        }
    }

    let smoothed = settings
        .smoothing
        .map(|g| gaussian_smooth(grid, g.radius, g.sigma))
        .transpose()?;
    let value = |x: usize, y: usize| match &smoothed {
        Some(s) => s.get_or_zero(x, y),
        None => grid.get_or_zero(x, y),
    };

    let mut segments = 0;
    for level in iso_values(&settings.levels, range) {
        let color = match settings.levels {
            IsoLevels::Single { .. } => settings.iso_color,
            IsoLevels::Multiple { .. } => transfer_color(level, range),
        };
        for x in 0..width - 1 {
            for y in 0..height - 1 {
                let corners = [value(x, y), value(x + 1, y), value(x, y + 1), value(x + 1, y + 1)];
                for (a, b) in cell_segments(corners, level, settings.decider) {
                    let to_unit = |p: [f64; 2]| {
                        Vertex::flat((x as f64 + p[0]) * cell_w, (y as f64 + p[1]) * cell_h, color)
                    };
                    sink.push_segment(buffer, to_unit(a), to_unit(b));
                    segments += 1;
                }
            }
        }
    }
    log::debug!("Marching squares produced {segments} segments");
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{BufferId, Mesh};
    use crate::settings::assert_err_contains;

    fn ramp() -> ScalarGrid<f64> {
        ScalarGrid::from_fn(6, 4, |x, _| x as f64).expect("grid")
    }

    #[test]
    fn single_level_on_ramp_is_a_vertical_line() {
        let mut mesh = Mesh::new();
        let settings = IsocontourSettings {
            levels: IsoLevels::Single { value: 2.5 },
            ..IsocontourSettings::default()
        };
        let count = extract_isocontours(&ramp(), &settings, &mut mesh).expect("contours");
        assert_eq!(count, 3);
        for v in mesh.buffer_vertices(BufferId(0)) {
            assert!((v.position[0] - 0.5).abs() < 1e-12);
            assert_eq!(v.color, settings.iso_color);
        }
        assert_eq!(mesh.index_buffers[0].draw_type, DrawType::Lines);
        assert_eq!(mesh.index_buffers[0].connectivity, Connectivity::None);
    }

    #[test]
    fn level_on_lattice_value_is_skipped() {
        let mut mesh = Mesh::new();
        let settings = IsocontourSettings {
            levels: IsoLevels::Single { value: 2.0 },
            ..IsocontourSettings::default()
        };
        assert_eq!(extract_isocontours(&ramp(), &settings, &mut mesh).expect("contours"), 0);
    }

    #[test]
    fn multiple_levels_are_interior_and_colored() {
        assert_eq!(
            iso_values(&IsoLevels::Multiple { count: 3 }, (0.0, 4.0)),
            vec![1.0, 2.0, 3.0]
        );
        assert_eq!(transfer_color(0.0, (0.0, 4.0)), LOW_COLOR);
        assert_eq!(transfer_color(4.0, (0.0, 4.0)), HIGH_COLOR);
        assert_eq!(transfer_color(2.0, (0.0, 4.0)), [0.5, 0.0, 0.5, 1.0]);

        let grid = ScalarGrid::from_fn(6, 3, |x, _| x as f64).expect("grid");
        let mut mesh = Mesh::new();
        let settings = IsocontourSettings {
            levels: IsoLevels::Multiple { count: 9 },
            ..IsocontourSettings::default()
        };
        // Levels step by 0.5; only the five half-integer ones cross, two cells each.
        assert_eq!(extract_isocontours(&grid, &settings, &mut mesh).expect("contours"), 10);
    }

    #[test]
    fn midpoint_decider_follows_center_value() {
        // Center above the level: the high corners stay connected.
        let segments = cell_segments([1.0, 0.0, 0.0, 1.0], 0.5, Decider::Midpoint);
        assert_eq!(
            segments,
            vec![([0.0, 0.5], [0.5, 1.0]), ([0.5, 0.0], [1.0, 0.5])]
        );
        // Center below the level: the high corners are cut off.
        let segments = cell_segments([0.6, 0.0, 0.0, 0.6], 0.5, Decider::Midpoint);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].0[1], 0.0);
        assert_eq!(segments[0].1[0], 0.0);
    }

    #[test]
    fn asymptotic_decider_pairs_by_x_order() {
        let segments = cell_segments([1.0, 0.0, 0.0, 3.0], 0.5, Decider::Asymptotic);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].0, [0.0, 0.5]);
        assert_eq!(segments[0].1[1], 1.0);
        assert_eq!(segments[1].1, [1.0, 0.5 / 3.0]);
    }

    #[test]
    fn uniform_cell_has_no_segments() {
        assert!(cell_segments([1.0; 4], 0.5, Decider::Midpoint).is_empty());
    }

    #[test]
    fn grid_lines_cover_every_lattice_line() {
        let mut mesh = Mesh::new();
        let settings = IsocontourSettings {
            levels: IsoLevels::Single { value: 100.0 },
            show_grid: true,
            ..IsocontourSettings::default()
        };
        extract_isocontours(&ramp(), &settings, &mut mesh).expect("contours");
        assert_eq!(mesh.vertices.len(), 2 * (6 + 4));
    }

    #[test]
    fn gaussian_keeps_constants_and_spreads_spikes() {
        let flat = ScalarGrid::from_fn(5, 5, |_, _| 2.0).expect("grid");
        let smoothed = gaussian_smooth(&flat, 2, 1.0).expect("smooth");
        assert!(smoothed.raw().iter().all(|v| (v - 2.0).abs() < 1e-12));

        let spike = ScalarGrid::from_fn(9, 9, |x, y| if (x, y) == (4, 4) { 1.0 } else { 0.0 })
            .expect("grid");
        let smoothed = gaussian_smooth(&spike, 3, 1.0).expect("smooth");
        let center = smoothed.get_or_zero(4, 4);
        assert!(center < 1.0 && center > smoothed.get_or_zero(5, 4));
        let total: f64 = smoothed.raw().iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let mut mesh = Mesh::new();
        let settings = IsocontourSettings {
            levels: IsoLevels::Multiple { count: 0 },
            ..IsocontourSettings::default()
        };
        assert_err_contains(extract_isocontours(&ramp(), &settings, &mut mesh), "count");
        let settings = IsocontourSettings {
            smoothing: Some(GaussianSettings {
                radius: 2,
                sigma: 0.0,
            }),
            ..IsocontourSettings::default()
        };
        assert_err_contains(extract_isocontours(&ramp(), &settings, &mut mesh), "sigma");
    }
}
