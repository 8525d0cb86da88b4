pub mod critical;
pub mod grid;
pub mod interpolation;
pub mod isocontour;
pub mod lic;
pub mod mesh;
pub mod settings;
pub mod solvers;
pub mod streamline;
pub mod topology;
/// The `fieldtopo_core` crate provides the numerical engine behind the 2D flow
/// visualization processors. It only reads caller-owned grids and writes into a
/// caller-provided mesh sink, so it carries no rendering or GUI concerns.
///
/// Key components:
/// - **Traits**: `GridValue` (grid element abstraction), `VectorField` (continuous flow), `Stepper` (integrators).
/// - **Grid / Interpolation**: dense grids with bounds-checked access, bilinear sampling and finite-difference Jacobians.
/// - **Solvers / Streamline**: RK4 and Euler steps, streamline tracing and seeding.
/// - **Zeros / Critical / Topology**: adaptive critical point search, eigen classification and separatrix tracing.
/// - **Isocontour / LIC**: marching squares and line integral convolution over the same sampling core.
pub mod traits;
pub mod types;
pub mod zeros;
