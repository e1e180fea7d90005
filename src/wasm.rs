//! Browser bindings
//!
//! Thin wrapper over `Session` for a JS render loop. Structured data crosses
//! the boundary as JSON strings; errors become `JsError`.

use wasm_bindgen::prelude::*;

use crate::session::Session;
use crate::tuning::Tuning;

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    // A second init (module re-instantiated by a dev server) is harmless
    let _ = console_log::init_with_level(log::Level::Info);
    log::info!("plinko-drop {} loaded", env!("CARGO_PKG_VERSION"));
}

#[wasm_bindgen(js_name = PlinkoSession)]
pub struct WasmSession {
    inner: Session,
}

#[wasm_bindgen(js_class = PlinkoSession)]
impl WasmSession {
    #[wasm_bindgen(constructor)]
    pub fn new(width: f32, height: f32) -> WasmSession {
        Self {
            inner: Session::new(width, height),
        }
    }

    /// Session with tuning overrides given as JSON and an optional seed
    #[wasm_bindgen(js_name = withTuning)]
    pub fn with_tuning(
        width: f32,
        height: f32,
        tuning_json: &str,
        seed: Option<u64>,
    ) -> Result<WasmSession, JsError> {
        let tuning = Tuning::from_json(tuning_json)?;
        let inner = Session::with_tuning(width, height, tuning, seed)?;
        Ok(Self { inner })
    }

    #[wasm_bindgen(js_name = canvasResized)]
    pub fn canvas_resized(&mut self, width: f32, height: f32) {
        self.inner.canvas_resized(width, height);
    }

    /// Returns the accepted bucket index
    #[wasm_bindgen(js_name = requestDrop)]
    pub fn request_drop(&mut self, target: u32, now_ms: f64) -> Result<u32, JsError> {
        Ok(self.inner.request_drop(target, now_ms)?.get())
    }

    #[wasm_bindgen(js_name = requestRandomDrop)]
    pub fn request_random_drop(&mut self, now_ms: f64) -> Result<u32, JsError> {
        Ok(self.inner.request_random_drop(now_ms)?.get())
    }

    #[wasm_bindgen(js_name = requestReset)]
    pub fn request_reset(&mut self) {
        self.inner.request_reset();
    }

    /// `[x, y]` to draw, or an empty array when no ball is on the board
    pub fn tick(&mut self, now_ms: f64) -> Vec<f32> {
        match self.inner.tick(now_ms) {
            Some(pos) => vec![pos.x, pos.y],
            None => Vec::new(),
        }
    }

    /// JSON array of events since the last call
    #[wasm_bindgen(js_name = drainEvents)]
    pub fn drain_events(&mut self) -> Result<String, JsError> {
        Ok(serde_json::to_string(&self.inner.drain_events())?)
    }

    pub fn diagnostics(&self) -> Result<String, JsError> {
        Ok(self.inner.diagnostics().to_json()?)
    }

    /// Pegs and buckets for drawing
    pub fn board(&self) -> Result<String, JsError> {
        Ok(serde_json::to_string(self.inner.board())?)
    }

    /// Keyframes of the current drop, `null` when idle
    pub fn trajectory(&self) -> Result<String, JsError> {
        let trajectory = self.inner.playback().map(|p| p.trajectory());
        Ok(serde_json::to_string(&trajectory)?)
    }

    pub fn phase(&self) -> Result<String, JsError> {
        Ok(serde_json::to_string(&self.inner.phase())?)
    }

    #[wasm_bindgen(js_name = totalDrops)]
    pub fn total_drops(&self) -> u64 {
        self.inner.stats().total_drops
    }

    #[wasm_bindgen(js_name = successfulDrops)]
    pub fn successful_drops(&self) -> u64 {
        self.inner.stats().successful_drops
    }
}
