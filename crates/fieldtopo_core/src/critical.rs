//! Eigen-analysis and classification of first-order critical points.

use crate::types::{Jacobian, Position, Rgba, Velocity};
use num_complex::Complex;
use serde::{Deserialize, Serialize};

/// All possible first order critical points in 2D vector fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriticalPointType {
    Saddle,
    AttractingNode,
    RepellingNode,
    AttractingFocus,
    RepellingFocus,
    Center,
}

impl CriticalPointType {
    pub const ALL: [CriticalPointType; 6] = [
        CriticalPointType::Saddle,
        CriticalPointType::AttractingNode,
        CriticalPointType::RepellingNode,
        CriticalPointType::AttractingFocus,
        CriticalPointType::RepellingFocus,
        CriticalPointType::Center,
    ];

    /// Marker color used for this type in the output mesh.
    pub fn color(self) -> Rgba {
        match self {
            CriticalPointType::Saddle => [1.0, 1.0, 0.0, 1.0],
            CriticalPointType::AttractingNode => [0.0, 0.0, 1.0, 1.0],
            CriticalPointType::RepellingNode => [1.0, 0.0, 0.0, 1.0],
            CriticalPointType::AttractingFocus => [0.5, 0.0, 1.0, 1.0],
            CriticalPointType::RepellingFocus => [1.0, 0.5, 0.0, 1.0],
            CriticalPointType::Center => [0.0, 1.0, 0.0, 1.0],
        }
    }
}

/// Eigenvalues and real eigenvectors of a 2x2 Jacobian.
///
/// For a real pair the vectors are unit eigenvectors matching `eigenvalues`.
/// For a complex-conjugate pair they are the normalized real and imaginary
/// parts of the eigenvector of `eigenvalues[0]`, which span the rotation plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EigenResult {
    pub eigenvalues: [Complex<f64>; 2],
    pub eigenvectors: [Velocity; 2],
}

impl EigenResult {
    pub fn is_real(&self) -> bool {
        self.eigenvalues[0].im == 0.0 && self.eigenvalues[1].im == 0.0
    }
}

/// A classified critical point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CriticalPoint {
    pub position: Position,
    pub jacobian: Jacobian,
    pub eigen: EigenResult,
    pub kind: CriticalPointType,
}

/// Relative size below which a negative discriminant is rounding noise.
const REPEATED_ROOT_EPS: f64 = 1e-12;

pub fn determinant(jacobian: &Jacobian) -> f64 {
    jacobian[(0, 0)] * jacobian[(1, 1)] - jacobian[(0, 1)] * jacobian[(1, 0)]
}

/// Closed-form eigen-decomposition of a 2x2 matrix.
pub fn eigen_analysis(jacobian: &Jacobian) -> EigenResult {
    let a = jacobian[(0, 0)];
    let b = jacobian[(0, 1)];
    let c = jacobian[(1, 0)];
    let d = jacobian[(1, 1)];
    let half_trace = 0.5 * (a + d);
    // Same as half_trace^2 - det, but cannot go negative through rounding
    // when the off-diagonal product is zero (repeated eigenvalues).
    let half_gap = 0.5 * (a - d);
    let mut disc = half_gap * half_gap + b * c;
    if disc < 0.0 && -disc <= REPEATED_ROOT_EPS * half_trace * half_trace {
        disc = 0.0;
    }

    if disc >= 0.0 {
        let root = disc.sqrt();
        let l1 = half_trace + root;
        let l2 = half_trace - root;
        EigenResult {
            eigenvalues: [Complex::new(l1, 0.0), Complex::new(l2, 0.0)],
            eigenvectors: [
                real_eigenvector(a, b, c, d, l1, Velocity::x()),
                real_eigenvector(a, b, c, d, l2, Velocity::y()),
            ],
        }
    } else {
        let im = (-disc).sqrt();
        let lambda = Complex::new(half_trace, im);
        // (J - λI) v = 0 with v = (λ - d, c) or (b, λ - a).
        let (vx, vy) = if c != 0.0 {
            (lambda - d, Complex::new(c, 0.0))
        } else {
            (Complex::new(b, 0.0), lambda - a)
        };
        let re = unit_or(Velocity::new(vx.re, vy.re), Velocity::x());
        let imag = unit_or(Velocity::new(vx.im, vy.im), Velocity::y());
        EigenResult {
            eigenvalues: [lambda, lambda.conj()],
            eigenvectors: [re, imag],
        }
    }
}

fn real_eigenvector(a: f64, b: f64, c: f64, d: f64, lambda: f64, fallback: Velocity) -> Velocity {
    // Pick the better conditioned of the two row-derived candidates.
    let from_lower = Velocity::new(lambda - d, c);
    let from_upper = Velocity::new(b, lambda - a);
    let candidate = if from_lower.norm_squared() >= from_upper.norm_squared() {
        from_lower
    } else {
        from_upper
    };
    unit_or(candidate, fallback)
}

fn unit_or(v: Velocity, fallback: Velocity) -> Velocity {
    let norm = v.norm();
    if norm > 0.0 && norm.is_finite() {
        v / norm
    } else {
        fallback
    }
}

/// Classifies a first-order critical point from its Jacobian.
///
/// Returns `None` for a singular Jacobian (`det == 0`); such higher-order
/// zeros are deliberately left unclassified.
pub fn classify(jacobian: &Jacobian) -> Option<(CriticalPointType, EigenResult)> {
    if determinant(jacobian) == 0.0 {
        return None;
    }
    let eigen = eigen_analysis(jacobian);
    let re0 = eigen.eigenvalues[0].re;
    let re1 = eigen.eigenvalues[1].re;

    let kind = if eigen.is_real() {
        if re0 * re1 < 0.0 {
            CriticalPointType::Saddle
        } else if re0 < 0.0 {
            CriticalPointType::AttractingNode
        } else {
            CriticalPointType::RepellingNode
        }
    } else if re0 == 0.0 {
        CriticalPointType::Center
    } else if re0 < 0.0 {
        CriticalPointType::AttractingFocus
    } else {
        CriticalPointType::RepellingFocus
    };
    Some((kind, eigen))
}

/// Integration directions for the two eigenvector branches of a saddle.
/// Outgoing (repelling) branches integrate forward, incoming ones backward.
pub fn separatrix_directions(eigen: &EigenResult) -> [f64; 2] {
    [
        if eigen.eigenvalues[0].re > 0.0 { 1.0 } else { -1.0 },
        if eigen.eigenvalues[1].re < 0.0 { -1.0 } else { 1.0 },
    ]
}
