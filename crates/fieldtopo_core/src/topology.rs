//! Topological skeleton extraction: critical points, their classification and
//! the separatrices leaving each saddle.

use crate::critical::{classify, separatrix_directions, CriticalPoint, CriticalPointType};
use crate::interpolation::sample_jacobian;
use crate::mesh::{Connectivity, DrawType, MeshSink, Vertex};
use crate::settings::check_range;
use crate::streamline::{trace, Streamline, TraceSettings};
use crate::traits::VectorField;
use crate::types::{Direction, Position, Rgba};
use crate::zeros::{find_zeros, ZeroSearchSettings};
use anyhow::Result;
use serde::{Deserialize, Serialize};

const BOUNDARY_POINT_COLOR: Rgba = [0.4, 0.4, 0.4, 1.0];
const SEPARATRIX_COLOR: Rgba = [1.0, 1.0, 1.0, 1.0];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologySettings {
    pub zero_search: ZeroSearchSettings,
    /// Offset of each separatrix seed from its saddle along the eigenvector.
    pub separatrix_seed_distance: f64,
    pub separatrix_trace: TraceSettings,
    /// Also locate points where the flow is tangent to the domain boundary.
    pub boundary_switch_points: bool,
}

impl Default for TopologySettings {
    fn default() -> Self {
        Self {
            zero_search: ZeroSearchSettings::default(),
            separatrix_seed_distance: 0.1,
            separatrix_trace: TraceSettings {
                step_size: 0.01,
                max_steps: 10_000,
                min_velocity: 1e-6,
                ..TraceSettings::default()
            },
            boundary_switch_points: false,
        }
    }
}

impl TopologySettings {
    pub fn validate(&self) -> Result<()> {
        self.zero_search.validate()?;
        check_range(
            "separatrix_seed_distance",
            self.separatrix_seed_distance,
            1e-5,
            1.0,
        )?;
        self.separatrix_trace.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Separatrix {
    pub saddle: Position,
    pub seed: Position,
    pub direction: Direction,
    pub streamline: Streamline,
}

impl Separatrix {
    /// The separatrix as drawn: the saddle followed by the traced points.
    pub fn polyline(&self) -> Vec<Position> {
        let mut points = Vec::with_capacity(self.streamline.points.len() + 1);
        points.push(self.saddle);
        points.extend_from_slice(&self.streamline.points);
        points
    }
}

/// A point on the domain boundary where the flow runs tangent to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundarySwitchPoint {
    pub position: Position,
    pub forward: Streamline,
    pub backward: Streamline,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopologySkeleton {
    pub critical_points: Vec<CriticalPoint>,
    /// Zeros with a singular Jacobian. Kept for inspection, never drawn.
    pub degenerate_points: Vec<Position>,
    pub separatrices: Vec<Separatrix>,
    pub boundary_switch_points: Vec<BoundarySwitchPoint>,
}

impl TopologySkeleton {
    pub fn saddles(&self) -> impl Iterator<Item = &CriticalPoint> {
        self.critical_points
            .iter()
            .filter(|p| p.kind == CriticalPointType::Saddle)
    }

    pub fn count(&self, kind: CriticalPointType) -> usize {
        self.critical_points.iter().filter(|p| p.kind == kind).count()
    }

    /// Emits critical points and boundary switch points into one point
    /// buffer, then one line strip per separatrix and boundary trace.
    pub fn write_mesh(&self, sink: &mut impl MeshSink, dims: (usize, usize)) {
        let scale = (
            dims.0.saturating_sub(1).max(1) as f64,
            dims.1.saturating_sub(1).max(1) as f64,
        );

        let points = sink.add_index_buffer(DrawType::Points, Connectivity::None);
        for cp in &self.critical_points {
            sink.push(points, scaled_vertex(&cp.position, scale, cp.kind.color()));
        }
        for bp in &self.boundary_switch_points {
            sink.push(points, scaled_vertex(&bp.position, scale, BOUNDARY_POINT_COLOR));
        }

        for separatrix in &self.separatrices {
            write_strip(sink, &separatrix.polyline(), scale);
        }
        for bp in &self.boundary_switch_points {
            let mut line: Vec<Position> = bp.backward.points.iter().rev().copied().collect();
            line.extend_from_slice(&bp.forward.points[1..]);
            write_strip(sink, &line, scale);
        }
    }
}

fn scaled_vertex(p: &Position, scale: (f64, f64), color: Rgba) -> Vertex {
    Vertex::flat(p.x / scale.0, p.y / scale.1, color)
}

fn write_strip(sink: &mut impl MeshSink, line: &[Position], scale: (f64, f64)) {
    let buffer = sink.add_index_buffer(DrawType::Lines, Connectivity::Strip);
    for p in line {
        sink.push(buffer, scaled_vertex(p, scale, SEPARATRIX_COLOR));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopologyPhase {
    Scanning,
    Classifying,
    Tracing,
    Done,
}

/// Runs the extraction one phase at a time. The field may be owned or
/// borrowed, since `&F` is itself a [`VectorField`].
pub struct TopologyExtractor<F: VectorField> {
    field: F,
    settings: TopologySettings,
    phase: TopologyPhase,
    candidates: Vec<Position>,
    skeleton: TopologySkeleton,
}

impl<F: VectorField> TopologyExtractor<F> {
    pub fn new(field: F, settings: TopologySettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            field,
            settings,
            phase: TopologyPhase::Scanning,
            candidates: Vec::new(),
            skeleton: TopologySkeleton::default(),
        })
    }

    pub fn phase(&self) -> TopologyPhase {
        self.phase
    }

    pub fn field(&self) -> &F {
        &self.field
    }

    pub fn skeleton(&self) -> &TopologySkeleton {
        &self.skeleton
    }

    /// Runs the current phase and moves to the next one.
    pub fn advance(&mut self) -> Result<TopologyPhase> {
        let next = match self.phase {
            TopologyPhase::Scanning => {
                self.candidates = find_zeros(&self.field, &self.settings.zero_search)?;
                TopologyPhase::Classifying
            }
            TopologyPhase::Classifying => {
                self.classify_candidates();
                TopologyPhase::Tracing
            }
            TopologyPhase::Tracing => {
                self.trace_separatrices();
                if self.settings.boundary_switch_points {
                    self.trace_boundary_switch_points();
                }
                TopologyPhase::Done
            }
            TopologyPhase::Done => TopologyPhase::Done,
        };
        if next != self.phase {
            log::debug!("Topology extraction: {:?} -> {:?}", self.phase, next);
        }
        self.phase = next;
        Ok(next)
    }

    pub fn finish(mut self) -> Result<TopologySkeleton> {
        while self.phase != TopologyPhase::Done {
            self.advance()?;
        }
        Ok(self.skeleton)
    }

    fn classify_candidates(&mut self) {
        for position in self.candidates.drain(..) {
            let jacobian = sample_jacobian(&self.field, &position);
            match classify(&jacobian) {
                Some((kind, eigen)) => self.skeleton.critical_points.push(CriticalPoint {
                    position,
                    jacobian,
                    eigen,
                    kind,
                }),
                None => {
                    log::debug!(
                        "Skipping degenerate zero at ({:.3}, {:.3})",
                        position.x,
                        position.y
                    );
                    self.skeleton.degenerate_points.push(position);
                }
            }
        }
    }

    fn trace_separatrices(&mut self) {
        let distance = self.settings.separatrix_seed_distance;
        let mut separatrices = Vec::new();
        for saddle in self.skeleton.saddles() {
            let directions = separatrix_directions(&saddle.eigen);
            for (eigenvector, sign) in saddle.eigen.eigenvectors.iter().zip(directions) {
                let direction = Direction::from_sign(sign);
                let settings = self.settings.separatrix_trace.with_direction(direction);
                for offset in [*eigenvector * distance, -*eigenvector * distance] {
                    let seed = saddle.position + offset;
                    if !self.field.contains(&seed) {
                        log::trace!("Skipping separatrix seed outside the domain: {:?}", seed);
                        continue;
                    }
                    separatrices.push(Separatrix {
                        saddle: saddle.position,
                        seed,
                        direction,
                        streamline: trace(&self.field, seed, &settings),
                    });
                }
            }
        }
        log::debug!("Traced {} separatrices", separatrices.len());
        self.skeleton.separatrices = separatrices;
    }

    fn trace_boundary_switch_points(&mut self) {
        let trace_settings = self.settings.separatrix_trace;
        self.skeleton.boundary_switch_points = boundary_switch_points(&self.field)
            .into_iter()
            .map(|position| BoundarySwitchPoint {
                position,
                forward: trace(
                    &self.field,
                    position,
                    &trace_settings.with_direction(Direction::Forward),
                ),
                backward: trace(
                    &self.field,
                    position,
                    &trace_settings.with_direction(Direction::Backward),
                ),
            })
            .collect();
    }
}

/// Extracts the full topological skeleton of `field`.
pub fn extract_topology(
    field: &impl VectorField,
    settings: &TopologySettings,
) -> Result<TopologySkeleton> {
    let skeleton = TopologyExtractor::new(field, *settings)?.finish()?;
    log::info!(
        "Found {} critical points ({} saddles, {} degenerate)",
        skeleton.critical_points.len(),
        skeleton.count(CriticalPointType::Saddle),
        skeleton.degenerate_points.len()
    );
    Ok(skeleton)
}

/// Points on the domain boundary where the boundary-normal flow component
/// changes sign strictly between two adjacent lattice samples. Each is located
/// by linear interpolation along the edge.
pub fn boundary_switch_points(field: &impl VectorField) -> Vec<Position> {
    let (width, height) = field.dims();
    if width < 2 || height < 2 {
        return Vec::new();
    }
    let max_x = (width - 1) as f64;
    let max_y = (height - 1) as f64;
    let mut found = Vec::new();

    // Vertical edges: the normal component is vx, walk along y.
    for x in [0.0, max_x] {
        for j in 0..height - 1 {
            let a = Position::new(x, j as f64);
            let b = Position::new(x, (j + 1) as f64);
            if let Some(t) = crossing(field.velocity(&a).x, field.velocity(&b).x) {
                found.push(Position::new(x, j as f64 + t));
            }
        }
    }
    // Horizontal edges: the normal component is vy, walk along x.
    for y in [0.0, max_y] {
        for i in 0..width - 1 {
            let a = Position::new(i as f64, y);
            let b = Position::new((i + 1) as f64, y);
            if let Some(t) = crossing(field.velocity(&a).y, field.velocity(&b).y) {
                found.push(Position::new(i as f64 + t, y));
            }
        }
    }
    found
}

fn crossing(a: f64, b: f64) -> Option<f64> {
    if (a < 0.0 && b > 0.0) || (a > 0.0 && b < 0.0) {
        Some(a / (a - b))
    } else {
        None
    }
}
