//! Vector field wrapper: sampling, topology, streamlines and LIC.

use crate::{js_error, serialize, settings_or_default};
use fieldtopo_core::grid::{ScalarGrid, VectorGrid};
use fieldtopo_core::interpolation::sample_jacobian;
use fieldtopo_core::lic::{compute_lic, LicSettings};
use fieldtopo_core::mesh::Mesh;
use fieldtopo_core::streamline::{trace_streamlines, write_streamlines, SeedStrategy, TraceSettings};
use fieldtopo_core::topology::{extract_topology, TopologySettings};
use fieldtopo_core::traits::VectorField;
use fieldtopo_core::types::Position;
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub struct WasmVectorField {
    pub(crate) grid: VectorGrid<f64>,
}

#[wasm_bindgen]
impl WasmVectorField {
    /// `data` holds interleaved `(vx, vy)` pairs, row-major, slice after slice.
    /// Only the first slice of a 3D volume is used.
    #[wasm_bindgen(constructor)]
    pub fn new(
        width: u32,
        height: u32,
        depth: u32,
        data: Vec<f64>,
    ) -> Result<WasmVectorField, JsValue> {
        console_error_panic_hook::set_once();
        let grid = VectorGrid::from_volume(width as usize, height as usize, depth as usize, data)
            .map_err(|e| js_error("Invalid vector field", e))?;
        Ok(WasmVectorField { grid })
    }

    pub fn width(&self) -> u32 {
        self.grid.width() as u32
    }

    pub fn height(&self) -> u32 {
        self.grid.height() as u32
    }

    /// Bilinearly interpolated `[vx, vy]`; zero outside the domain.
    pub fn sample(&self, x: f64, y: f64) -> Vec<f64> {
        let v = self.grid.velocity(&Position::new(x, y));
        vec![v.x, v.y]
    }

    /// Row-major `[dvx/dx, dvx/dy, dvy/dx, dvy/dy]`.
    pub fn jacobian(&self, x: f64, y: f64) -> Vec<f64> {
        let j = sample_jacobian(&self.grid, &Position::new(x, y));
        vec![j[(0, 0)], j[(0, 1)], j[(1, 0)], j[(1, 1)]]
    }

    pub fn extract_topology(&self, settings: JsValue) -> Result<JsValue, JsValue> {
        let settings: TopologySettings = settings_or_default(settings)?;
        let skeleton = extract_topology(&self.grid, &settings)
            .map_err(|e| js_error("Topology extraction failed", e))?;
        serialize(&skeleton)
    }

    /// Topology rendered into a mesh in unit-square coordinates.
    pub fn topology_mesh(&self, settings: JsValue) -> Result<JsValue, JsValue> {
        let settings: TopologySettings = settings_or_default(settings)?;
        let skeleton = extract_topology(&self.grid, &settings)
            .map_err(|e| js_error("Topology extraction failed", e))?;
        let mut mesh = Mesh::new();
        skeleton.write_mesh(&mut mesh, self.grid.dims());
        serialize(&mesh)
    }

    pub fn trace_streamlines(&self, seeds: JsValue, settings: JsValue) -> Result<JsValue, JsValue> {
        let strategy: SeedStrategy = settings_or_default(seeds)?;
        let settings: TraceSettings = settings_or_default(settings)?;
        let lines = trace_streamlines(&self.grid, &strategy, &settings)
            .map_err(|e| js_error("Streamline tracing failed", e))?;
        serialize(&lines)
    }

    pub fn streamline_mesh(&self, seeds: JsValue, settings: JsValue) -> Result<JsValue, JsValue> {
        let strategy: SeedStrategy = settings_or_default(seeds)?;
        let settings: TraceSettings = settings_or_default(settings)?;
        let lines = trace_streamlines(&self.grid, &strategy, &settings)
            .map_err(|e| js_error("Streamline tracing failed", e))?;
        let mut mesh = Mesh::new();
        write_streamlines(&lines, self.grid.dims(), &mut mesh);
        serialize(&mesh)
    }

    /// Convolves a row-major gray noise texture along the flow. The result has
    /// the texture's size.
    pub fn compute_lic(
        &self,
        noise_width: u32,
        noise_height: u32,
        noise: Vec<u8>,
        settings: JsValue,
    ) -> Result<Vec<u8>, JsValue> {
        let settings: LicSettings = settings_or_default(settings)?;
        let noise = ScalarGrid::new(noise_width as usize, noise_height as usize, noise)
            .map_err(|e| js_error("Invalid noise texture", e))?;
        let image = compute_lic(&self.grid, &noise, &settings)
            .map_err(|e| js_error("LIC failed", e))?;
        Ok(image.into_raw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldtopo_core::critical::CriticalPointType;
    use fieldtopo_core::topology::TopologySkeleton;
    use serde_wasm_bindgen::{from_value, to_value};
    use wasm_bindgen_test::wasm_bindgen_test;

    fn saddle_data(width: usize, height: usize) -> Vec<f64> {
        let mut data = Vec::with_capacity(width * height * 2);
        for y in 0..height {
            for x in 0..width {
                data.push(x as f64 - 4.5);
                data.push(-(y as f64 - 4.5));
            }
        }
        data
    }

    #[wasm_bindgen_test]
    fn rejects_mismatched_data_length() {
        let message = WasmVectorField::new(4, 4, 1, vec![0.0; 7])
            .err()
            .and_then(|err| err.as_string())
            .unwrap_or_default();
        assert!(message.contains("length mismatch"), "{message}");
    }

    #[wasm_bindgen_test]
    fn samples_and_jacobian_of_saddle() {
        let field = WasmVectorField::new(10, 10, 1, saddle_data(10, 10)).expect("field");
        assert_eq!(field.sample(2.0, 3.0), vec![-2.5, 1.5]);
        let j = field.jacobian(4.0, 4.0);
        assert!((j[0] - 1.0).abs() < 1e-9);
        assert!(j[1].abs() < 1e-9);
        assert!((j[3] + 1.0).abs() < 1e-9);
    }

    #[wasm_bindgen_test]
    fn extracts_saddle_with_default_settings() {
        let field = WasmVectorField::new(10, 10, 1, saddle_data(10, 10)).expect("field");
        let skeleton: TopologySkeleton =
            from_value(field.extract_topology(JsValue::UNDEFINED).expect("topology"))
                .expect("decode");
        assert_eq!(skeleton.count(CriticalPointType::Saddle), 1);
        assert_eq!(skeleton.separatrices.len(), 4);
    }

    #[wasm_bindgen_test]
    fn invalid_topology_settings_are_reported() {
        let field = WasmVectorField::new(10, 10, 1, saddle_data(10, 10)).expect("field");
        let settings = TopologySettings {
            separatrix_seed_distance: 5.0,
            ..TopologySettings::default()
        };
        let message = field
            .topology_mesh(to_value(&settings).expect("settings"))
            .err()
            .and_then(|err| err.as_string())
            .unwrap_or_default();
        assert!(message.contains("separatrix_seed_distance"), "{message}");
    }

    #[wasm_bindgen_test]
    fn lic_keeps_texture_size() {
        let field = WasmVectorField::new(10, 10, 1, saddle_data(10, 10)).expect("field");
        let noise: Vec<u8> = (0..64).map(|i| (i * 4) as u8).collect();
        let image = field
            .compute_lic(8, 8, noise, JsValue::UNDEFINED)
            .expect("lic");
        assert_eq!(image.len(), 64);
    }
}
