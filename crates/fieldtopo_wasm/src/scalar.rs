use crate::{js_error, serialize, settings_or_default};
use fieldtopo_core::grid::ScalarGrid;
use fieldtopo_core::isocontour::{extract_isocontours, IsocontourSettings};
use fieldtopo_core::mesh::Mesh;
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub struct WasmScalarField {
    grid: ScalarGrid<f64>,
}

#[wasm_bindgen]
impl WasmScalarField {
    #[wasm_bindgen(constructor)]
    pub fn new(width: u32, height: u32, data: Vec<f64>) -> Result<WasmScalarField, JsValue> {
        console_error_panic_hook::set_once();
        let grid = ScalarGrid::new(width as usize, height as usize, data)
            .map_err(|e| js_error("Invalid scalar field", e))?;
        Ok(WasmScalarField { grid })
    }

    /// `[min, max]` over the finite values, empty if there are none.
    pub fn value_range(&self) -> Vec<f64> {
        self.grid
            .value_range()
            .map(|(lo, hi)| vec![lo, hi])
            .unwrap_or_default()
    }

    pub fn isocontours(&self, settings: JsValue) -> Result<JsValue, JsValue> {
        let settings: IsocontourSettings = settings_or_default(settings)?;
        let mut mesh = Mesh::new();
        extract_isocontours(&self.grid, &settings, &mut mesh)
            .map_err(|e| js_error("Isocontour extraction failed", e))?;
        serialize(&mesh)
    }
}
