//! Stepped topology extraction, one phase per call, so the UI can report progress.

use crate::{js_error, serialize, settings_or_default};
use fieldtopo_core::grid::VectorGrid;
use fieldtopo_core::mesh::Mesh;
use fieldtopo_core::topology::{TopologyExtractor, TopologyPhase, TopologySettings};
use fieldtopo_core::traits::VectorField;
use serde::Serialize;
use wasm_bindgen::prelude::*;

#[derive(Serialize)]
struct TopologyProgress {
    phase: TopologyPhase,
    done: bool,
    critical_points: usize,
    degenerate_points: usize,
    separatrices: usize,
}

#[wasm_bindgen]
pub struct WasmTopologyRunner {
    extractor: TopologyExtractor<VectorGrid<f64>>,
}

#[wasm_bindgen]
impl WasmTopologyRunner {
    #[wasm_bindgen(constructor)]
    pub fn new(
        width: u32,
        height: u32,
        depth: u32,
        data: Vec<f64>,
        settings: JsValue,
    ) -> Result<WasmTopologyRunner, JsValue> {
        console_error_panic_hook::set_once();
        let grid = VectorGrid::from_volume(width as usize, height as usize, depth as usize, data)
            .map_err(|e| js_error("Invalid vector field", e))?;
        let settings: TopologySettings = settings_or_default(settings)?;
        let extractor = TopologyExtractor::new(grid, settings)
            .map_err(|e| js_error("Invalid topology settings", e))?;
        Ok(WasmTopologyRunner { extractor })
    }

    /// Runs the next phase and returns the progress after it.
    pub fn run_phase(&mut self) -> Result<JsValue, JsValue> {
        self.extractor
            .advance()
            .map_err(|e| js_error("Topology extraction failed", e))?;
        self.get_progress()
    }

    pub fn get_progress(&self) -> Result<JsValue, JsValue> {
        let skeleton = self.extractor.skeleton();
        let phase = self.extractor.phase();
        serialize(&TopologyProgress {
            phase,
            done: phase == TopologyPhase::Done,
            critical_points: skeleton.critical_points.len(),
            degenerate_points: skeleton.degenerate_points.len(),
            separatrices: skeleton.separatrices.len(),
        })
    }

    pub fn get_result(&self) -> Result<JsValue, JsValue> {
        if self.extractor.phase() != TopologyPhase::Done {
            return Err(JsValue::from_str("Topology extraction has not finished."));
        }
        serialize(self.extractor.skeleton())
    }

    pub fn get_mesh(&self) -> Result<JsValue, JsValue> {
        if self.extractor.phase() != TopologyPhase::Done {
            return Err(JsValue::from_str("Topology extraction has not finished."));
        }
        let mut mesh = Mesh::new();
        self.extractor
            .skeleton()
            .write_mesh(&mut mesh, self.extractor.field().dims());
        serialize(&mesh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasm_bindgen_test::wasm_bindgen_test;

    fn center_data() -> Vec<f64> {
        let mut data = Vec::with_capacity(200);
        for y in 0..10 {
            for x in 0..10 {
                data.push(-(y as f64 - 4.5));
                data.push(x as f64 - 4.5);
            }
        }
        data
    }

    #[wasm_bindgen_test]
    fn runner_reaches_done_after_three_phases() {
        let mut runner =
            WasmTopologyRunner::new(10, 10, 1, center_data(), JsValue::UNDEFINED).expect("runner");
        assert!(runner.get_result().is_err());
        for _ in 0..3 {
            runner.run_phase().expect("phase");
        }
        assert_eq!(runner.extractor.phase(), TopologyPhase::Done);
        assert_eq!(runner.extractor.skeleton().critical_points.len(), 1);
        assert!(runner.get_result().is_ok());
        assert!(runner.get_mesh().is_ok());
    }
}
