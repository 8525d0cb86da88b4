//! Streamline tracing and seeding.

use crate::grid::VectorGrid;
use crate::interpolation::sample_vector;
use crate::mesh::{Connectivity, DrawType, MeshSink, Vertex};
use crate::settings::{check_count, check_range};
use crate::solvers::IntegrationMethod;
use crate::traits::{GridValue, VectorField};
use crate::types::{Direction, Position, Rgba};
use anyhow::{bail, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Displacement per step below which a trace counts as stagnated.
pub const STAGNATION_THRESHOLD: f64 = 1e-3;

const SEED_COLOR: Rgba = [0.0, 0.0, 0.0, 1.0];
const LINE_COLOR: Rgba = [0.0, 0.0, 1.0, 1.0];

/// Settings for a single streamline trace.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceSettings {
    pub step_size: f64,
    pub max_steps: usize,
    pub direction: Direction,
    /// Integrate the normalized direction field instead of the flow field.
    pub normalized: bool,
    /// Stop once the accumulated arc length would exceed this value.
    pub arc_length_budget: Option<f64>,
    pub method: IntegrationMethod,
    pub min_velocity: f64,
}

impl Default for TraceSettings {
    fn default() -> Self {
        Self {
            step_size: 0.1,
            max_steps: 30,
            direction: Direction::Forward,
            normalized: false,
            arc_length_budget: None,
            method: IntegrationMethod::Rk4,
            min_velocity: STAGNATION_THRESHOLD,
        }
    }
}

impl TraceSettings {
    pub fn validate(&self) -> Result<()> {
        check_range("step_size", self.step_size, 0.0, 10.0)?;
        check_count("max_steps", self.max_steps, 0, 100_000)?;
        if let Some(budget) = self.arc_length_budget {
            check_range("arc_length_budget", budget, 0.0, 1.0e6)?;
        }
        check_range("min_velocity", self.min_velocity, 0.0, 1.0)?;
        Ok(())
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }
}

/// Why a trace ended. All of these are normal termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    MaxSteps,
    ArcLength,
    LeftDomain,
    Stagnated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Streamline {
    /// Seed first, then one position per recorded step.
    pub points: Vec<Position>,
    /// Integration steps performed, including a final unrecorded one.
    pub steps: usize,
    pub arc_length: f64,
    pub stop_reason: StopReason,
}

impl Streamline {
    pub fn seed(&self) -> Position {
        self.points[0]
    }
}

/// Traces one streamline from `seed`.
///
/// A step that leaves the domain is recorded clipped onto the boundary, so
/// the polyline ends where the flow exits. Arc-length and stagnation stops
/// drop the offending step.
pub fn trace(field: &impl VectorField, seed: Position, settings: &TraceSettings) -> Streamline {
    let mut points = vec![seed];
    if !field.contains(&seed) {
        return Streamline {
            points,
            steps: 0,
            arc_length: 0.0,
            stop_reason: StopReason::LeftDomain,
        };
    }

    let h = settings.step_size * settings.direction.sign();
    let mut position = seed;
    let mut arc_length = 0.0;
    let mut steps = 0usize;

    let stop_reason = loop {
        if steps >= settings.max_steps {
            break StopReason::MaxSteps;
        }
        let next = settings
            .method
            .step(field, &position, h, settings.normalized);
        steps += 1;
        let velocity = (next - position).norm();

        if let Some(budget) = settings.arc_length_budget {
            if arc_length + velocity > budget {
                break StopReason::ArcLength;
            }
        }

        if !field.contains(&next) {
            if next.x.is_finite() && next.y.is_finite() {
                let clipped = clip_to_domain(field.dims(), &position, &next);
                if clipped != position {
                    arc_length += (clipped - position).norm();
                    points.push(clipped);
                }
            }
            break StopReason::LeftDomain;
        }

        if velocity == 0.0 || velocity < settings.min_velocity {
            break StopReason::Stagnated;
        }

        arc_length += velocity;
        points.push(next);
        position = next;
    };

    log::trace!(
        "Streamline from ({:.3}, {:.3}) stopped after {} steps: {:?}",
        seed.x,
        seed.y,
        steps,
        stop_reason
    );

    Streamline {
        points,
        steps,
        arc_length,
        stop_reason,
    }
}

/// Traces backward and forward from `seed` and joins both halves.
/// Returns the joined polyline and the index of the seed inside it.
pub fn trace_bidirectional(
    field: &impl VectorField,
    seed: Position,
    settings: &TraceSettings,
) -> (Vec<Position>, usize) {
    let backward = trace(field, seed, &settings.with_direction(Direction::Backward));
    let forward = trace(field, seed, &settings.with_direction(Direction::Forward));

    let mut points: Vec<Position> = backward.points[1..].iter().rev().copied().collect();
    let seed_index = points.len();
    points.push(seed);
    points.extend_from_slice(&forward.points[1..]);
    (points, seed_index)
}

/// Point where the segment `inside -> outside` crosses the domain boundary.
fn clip_to_domain(dims: (usize, usize), inside: &Position, outside: &Position) -> Position {
    let max_x = dims.0.saturating_sub(1) as f64;
    let max_y = dims.1.saturating_sub(1) as f64;
    let delta = outside - inside;
    let mut t: f64 = 1.0;
    for (p, d, max) in [(inside.x, delta.x, max_x), (inside.y, delta.y, max_y)] {
        if p + d > max && d != 0.0 {
            t = t.min((max - p) / d);
        }
        if p + d < 0.0 && d != 0.0 {
            t = t.min(-p / d);
        }
    }
    let t = t.clamp(0.0, 1.0);
    let clipped = inside + delta * t;
    Position::new(clipped.x.clamp(0.0, max_x), clipped.y.clamp(0.0, max_y))
}

/// How to place streamline seeds over the domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SeedStrategy {
    Single { point: Position },
    Random { count: usize, seed: u64 },
    UniformGrid { nx: usize, ny: usize },
    /// Draws seeds from the distribution of field magnitudes sampled on a
    /// `grid_points x grid_points` lattice.
    MagnitudeWeighted {
        count: usize,
        grid_points: usize,
        seed: u64,
    },
}

impl Default for SeedStrategy {
    fn default() -> Self {
        SeedStrategy::Single {
            point: Position::new(0.5, 0.5),
        }
    }
}

impl SeedStrategy {
    pub fn validate(&self) -> Result<()> {
        match self {
            SeedStrategy::Single { point } => {
                if !(point.x.is_finite() && point.y.is_finite()) {
                    bail!("Seed point must be finite.");
                }
            }
            SeedStrategy::Random { count, .. } => check_count("count", *count, 1, 200)?,
            SeedStrategy::UniformGrid { nx, ny } => {
                check_count("nx", *nx, 1, 50)?;
                check_count("ny", *ny, 1, 50)?;
            }
            SeedStrategy::MagnitudeWeighted {
                count, grid_points, ..
            } => {
                check_count("count", *count, 1, 200)?;
                check_count("grid_points", *grid_points, 2, 100)?;
            }
        }
        Ok(())
    }
}

/// Lattice coordinate `i` of `n` evenly spaced points across `[0, range]`.
fn lattice(i: usize, n: usize, range: f64) -> f64 {
    if n <= 1 {
        range / 2.0
    } else {
        i as f64 * range / (n - 1) as f64
    }
}

/// Generates seed positions for `strategy` in grid-index space.
pub fn seed_points<T: GridValue>(field: &VectorGrid<T>, strategy: &SeedStrategy) -> Vec<Position> {
    let range_x = (field.width() - 1) as f64;
    let range_y = (field.height() - 1) as f64;

    match strategy {
        SeedStrategy::Single { point } => vec![*point],
        SeedStrategy::Random { count, seed } => {
            let mut rng = StdRng::seed_from_u64(*seed);
            (0..*count)
                .map(|_| {
                    Position::new(
                        rng.random_range(0.0..=range_x),
                        rng.random_range(0.0..=range_y),
                    )
                })
                .collect()
        }
        SeedStrategy::UniformGrid { nx, ny } => {
            let mut seeds = Vec::with_capacity(nx * ny);
            for ix in 0..*nx {
                for iy in 0..*ny {
                    seeds.push(Position::new(
                        lattice(ix, *nx, range_x),
                        lattice(iy, *ny, range_y),
                    ));
                }
            }
            seeds
        }
        SeedStrategy::MagnitudeWeighted {
            count,
            grid_points,
            seed,
        } => {
            let n = (*grid_points).max(2);
            let mut lattice_points = Vec::with_capacity(n * n);
            let mut weights = Vec::with_capacity(n * n);
            for iy in 0..n {
                for ix in 0..n {
                    let p = Position::new(lattice(ix, n, range_x), lattice(iy, n, range_y));
                    weights.push(sample_vector(field, &p).norm());
                    lattice_points.push(p);
                }
            }
            let total: f64 = weights.iter().sum();
            if !(total > 0.0) {
                log::warn!("Field magnitude is zero everywhere; no weighted seeds generated.");
                return Vec::new();
            }

            let mut rng = StdRng::seed_from_u64(*seed);
            let mut seeds = Vec::with_capacity(*count);
            for _ in 0..*count {
                let target: f64 = rng.random_range(0.0..1.0);
                let mut cumulative = 0.0;
                let mut chosen = lattice_points[lattice_points.len() - 1];
                for (p, w) in lattice_points.iter().zip(&weights) {
                    cumulative += w / total;
                    if target < cumulative {
                        chosen = *p;
                        break;
                    }
                }
                seeds.push(chosen);
            }
            seeds
        }
    }
}

/// Traces one streamline per seed of `strategy`.
pub fn trace_streamlines<T: GridValue>(
    field: &VectorGrid<T>,
    strategy: &SeedStrategy,
    settings: &TraceSettings,
) -> Result<Vec<Streamline>> {
    strategy.validate()?;
    settings.validate()?;
    let seeds = seed_points(field, strategy);
    log::debug!("Tracing {} streamlines", seeds.len());
    Ok(seeds
        .into_iter()
        .map(|seed| trace(field, seed, settings))
        .collect())
}

/// Emits each streamline as a point buffer plus a line strip, in unit-square coordinates.
pub fn write_streamlines(
    streamlines: &[Streamline],
    dims: (usize, usize),
    sink: &mut impl MeshSink,
) {
    let scale_x = dims.0.saturating_sub(1).max(1) as f64;
    let scale_y = dims.1.saturating_sub(1).max(1) as f64;
    for line in streamlines {
        let points = sink.add_index_buffer(DrawType::Points, Connectivity::None);
        let strip = sink.add_index_buffer(DrawType::Lines, Connectivity::Strip);
        for (i, p) in line.points.iter().enumerate() {
            let color = if i == 0 { SEED_COLOR } else { LINE_COLOR };
            let index = sink.push(points, Vertex::flat(p.x / scale_x, p.y / scale_y, color));
            sink.add_index(strip, index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Mesh;

    fn rotation() -> VectorGrid<f64> {
        VectorGrid::from_fn(11, 11, |x, y| (-(y - 5.0), x - 5.0)).expect("grid")
    }

    fn uniform(vx: f64, vy: f64) -> VectorGrid<f64> {
        VectorGrid::from_fn(10, 10, move |_, _| (vx, vy)).expect("grid")
    }

    #[test]
    fn zero_max_steps_returns_seed_only() {
        let field = rotation();
        let settings = TraceSettings {
            max_steps: 0,
            ..TraceSettings::default()
        };
        let line = trace(&field, Position::new(10.0, 10.0), &settings);
        assert_eq!(line.points, vec![Position::new(10.0, 10.0)]);
        assert_eq!(line.stop_reason, StopReason::MaxSteps);
        assert_eq!(line.steps, 0);
    }

    #[test]
    fn large_step_exits_after_one_recorded_step() {
        let field = uniform(1.0, 0.0);
        let settings = TraceSettings {
            step_size: 10.0,
            max_steps: 30,
            ..TraceSettings::default()
        };
        let line = trace(&field, Position::new(5.0, 5.0), &settings);
        assert_eq!(line.stop_reason, StopReason::LeftDomain);
        assert_eq!(line.steps, 1);
        assert_eq!(line.points.len(), 2);
        assert_eq!(line.points[1], Position::new(9.0, 5.0));
    }

    #[test]
    fn forward_then_backward_returns_to_seed() {
        let field = rotation();
        let seed = Position::new(7.0, 5.0);
        let settings = TraceSettings {
            step_size: 0.02,
            max_steps: 40,
            ..TraceSettings::default()
        };
        let forward = trace(&field, seed, &settings);
        assert_eq!(forward.stop_reason, StopReason::MaxSteps);
        let end = *forward.points.last().expect("endpoint");

        let backward = trace(&field, end, &settings.with_direction(Direction::Backward));
        assert_eq!(backward.points.len(), forward.points.len());
        let back_at = *backward.points.last().expect("endpoint");
        assert!((back_at - seed).norm() < 1e-6, "returned to {back_at:?}");
    }

    #[test]
    fn stagnation_stops_at_critical_point() {
        let field = VectorGrid::from_fn(10, 10, |x, y| (-(x - 5.0), -(y - 5.0))).expect("grid");
        let settings = TraceSettings {
            step_size: 0.5,
            max_steps: 10_000,
            ..TraceSettings::default()
        };
        let line = trace(&field, Position::new(8.0, 8.0), &settings);
        assert_eq!(line.stop_reason, StopReason::Stagnated);
        assert!(line.steps < 10_000);
        let last = line.points.last().expect("points");
        assert!((last - Position::new(5.0, 5.0)).norm() < 0.01);
    }

    #[test]
    fn arc_length_budget_limits_trace() {
        let field = uniform(1.0, 0.0);
        let settings = TraceSettings {
            step_size: 0.1,
            max_steps: 1000,
            arc_length_budget: Some(0.55),
            ..TraceSettings::default()
        };
        let line = trace(&field, Position::new(1.0, 1.0), &settings);
        assert_eq!(line.stop_reason, StopReason::ArcLength);
        assert_eq!(line.points.len(), 6);
        assert!(line.arc_length <= 0.55);
    }

    #[test]
    fn seed_outside_domain_is_returned_alone() {
        let field = uniform(1.0, 0.0);
        let line = trace(&field, Position::new(-1.0, 3.0), &TraceSettings::default());
        assert_eq!(line.points.len(), 1);
        assert_eq!(line.stop_reason, StopReason::LeftDomain);
    }

    #[test]
    fn bidirectional_trace_places_seed_in_middle() {
        let field = uniform(1.0, 0.0);
        let settings = TraceSettings {
            step_size: 0.5,
            max_steps: 4,
            ..TraceSettings::default()
        };
        let (points, seed_index) = trace_bidirectional(&field, Position::new(4.0, 4.0), &settings);
        assert_eq!(seed_index, 4);
        assert_eq!(points.len(), 9);
        assert_eq!(points[seed_index], Position::new(4.0, 4.0));
        assert!(points.windows(2).all(|w| w[1].x > w[0].x));
    }

    #[test]
    fn uniform_grid_seeds_cover_corners() {
        let field = uniform(1.0, 0.0);
        let seeds = seed_points(&field, &SeedStrategy::UniformGrid { nx: 3, ny: 2 });
        assert_eq!(seeds.len(), 6);
        assert!(seeds.contains(&Position::new(0.0, 0.0)));
        assert!(seeds.contains(&Position::new(9.0, 9.0)));
        assert!(seeds.contains(&Position::new(4.5, 0.0)));
    }

    #[test]
    fn random_seeds_are_reproducible_and_in_domain() {
        let field = uniform(1.0, 0.0);
        let strategy = SeedStrategy::Random { count: 50, seed: 3 };
        let a = seed_points(&field, &strategy);
        let b = seed_points(&field, &strategy);
        assert_eq!(a, b);
        assert!(a.iter().all(|p| field.contains(p)));
    }

    #[test]
    fn magnitude_weighted_seeds_avoid_still_regions() {
        // Flow only in the right half of the domain.
        let field =
            VectorGrid::from_fn(10, 10, |x, _| if x >= 5.0 { (0.0, 1.0) } else { (0.0, 0.0) })
                .expect("grid");
        let strategy = SeedStrategy::MagnitudeWeighted {
            count: 40,
            grid_points: 10,
            seed: 11,
        };
        let seeds = seed_points(&field, &strategy);
        assert_eq!(seeds.len(), 40);
        assert!(seeds.iter().all(|p| p.x >= 5.0), "{seeds:?}");
    }

    #[test]
    fn strategy_validation_rejects_empty_counts() {
        crate::settings::assert_err_contains(
            SeedStrategy::UniformGrid { nx: 0, ny: 3 }.validate(),
            "nx",
        );
        crate::settings::assert_err_contains(
            TraceSettings {
                step_size: -1.0,
                ..TraceSettings::default()
            }
            .validate(),
            "step_size",
        );
    }

    #[test]
    fn write_streamlines_emits_points_and_strip_per_line() {
        let field = uniform(1.0, 0.0);
        let lines = trace_streamlines(
            &field,
            &SeedStrategy::UniformGrid { nx: 2, ny: 1 },
            &TraceSettings::default(),
        )
        .expect("trace");
        let mut mesh = Mesh::new();
        write_streamlines(&lines, field.dims(), &mut mesh);
        assert_eq!(mesh.index_buffers.len(), 4);
        assert_eq!(mesh.index_buffers[1].connectivity, Connectivity::Strip);
        assert_eq!(mesh.vertices[0].color, SEED_COLOR);
        let total_points: usize = lines.iter().map(|l| l.points.len()).sum();
        assert_eq!(mesh.vertices.len(), total_points);
    }
}
