//! WASM bindings for voxel-scene.
//!
//! This module provides JavaScript-friendly APIs for use in the browser.

use crate::{ControlMessage, SceneBuilder, SceneConfig};
use wasm_bindgen::prelude::*;

#[wasm_bindgen(start)]
pub fn init() {
    // Set up better panic messages in the browser console
    console_error_panic_hook::set_once();
}

/// Build options.
#[wasm_bindgen]
#[derive(Default)]
pub struct SceneOptions {
    config_json: Option<String>,
    camera_scale: Option<f64>,
    dedupe: bool,
    sunlight: Option<f32>,
    godrays: Option<f32>,
}

#[wasm_bindgen]
impl SceneOptions {
    #[wasm_bindgen(constructor)]
    pub fn new() -> SceneOptions {
        SceneOptions::default()
    }

    /// Full configuration as JSON; the other setters override it.
    #[wasm_bindgen(setter)]
    pub fn set_config_json(&mut self, value: String) {
        self.config_json = Some(value);
    }

    #[wasm_bindgen(setter)]
    pub fn set_camera_scale(&mut self, value: f64) {
        self.camera_scale = Some(value);
    }

    #[wasm_bindgen(setter)]
    pub fn set_dedupe(&mut self, value: bool) {
        self.dedupe = value;
    }

    #[wasm_bindgen(setter)]
    pub fn set_sunlight(&mut self, value: f32) {
        self.sunlight = Some(value);
    }

    #[wasm_bindgen(setter)]
    pub fn set_godrays(&mut self, value: f32) {
        self.godrays = Some(value);
    }
}

impl SceneOptions {
    fn into_config(self) -> crate::Result<SceneConfig> {
        let mut config = match &self.config_json {
            Some(json) => SceneConfig::from_json_str(json)?,
            None => SceneConfig::default(),
        };
        if let Some(factor) = self.camera_scale {
            config = config.with_camera_scale(factor);
        }
        if self.dedupe {
            config = config.with_dedupe(true);
        }
        let current = config.initial_environment;
        config = config.with_initial_environment(crate::EnvironmentState::new(
            self.sunlight.unwrap_or(current.time_of_day),
            self.godrays.unwrap_or(current.god_ray_intensity),
        ));
        config.validate()?;
        Ok(config)
    }
}

/// Build result containing the document.
#[wasm_bindgen]
pub struct SceneResult {
    html: String,
    voxel_count: usize,
    used_fallback: bool,
    passthrough: bool,
    error: Option<String>,
    guide_json: String,
}

#[wasm_bindgen]
impl SceneResult {
    /// Get the standalone HTML document.
    #[wasm_bindgen(getter)]
    pub fn html(&self) -> String {
        self.html.clone()
    }

    #[wasm_bindgen(getter)]
    pub fn voxel_count(&self) -> usize {
        self.voxel_count
    }

    /// Check if the fallback structure replaced the program's output.
    #[wasm_bindgen(getter)]
    pub fn used_fallback(&self) -> bool {
        self.used_fallback
    }

    #[wasm_bindgen(getter)]
    pub fn passthrough(&self) -> bool {
        self.passthrough
    }

    /// Message shown in the document's error panel.
    #[wasm_bindgen(getter)]
    pub fn error(&self) -> Option<String> {
        self.error.clone()
    }

    /// Material totals and layers as JSON.
    #[wasm_bindgen(getter)]
    pub fn guide_json(&self) -> String {
        self.guide_json.clone()
    }
}

/// Build a scene document from generator output.
#[wasm_bindgen]
pub fn build_scene(text: &str, options: Option<SceneOptions>) -> Result<SceneResult, JsError> {
    let config = options
        .unwrap_or_default()
        .into_config()
        .map_err(|e| JsError::new(&e.to_string()))?;

    let output = SceneBuilder::new(config)
        .build(text)
        .map_err(|e| JsError::new(&e.to_string()))?;
    let guide_json = serde_json::to_string(&output.guide).map_err(|e| JsError::new(&e.to_string()))?;

    Ok(SceneResult {
        voxel_count: output.voxels.len(),
        used_fallback: output.used_fallback(),
        passthrough: output.is_passthrough(),
        error: output.error,
        guide_json,
        html: output.html,
    })
}

#[wasm_bindgen]
pub fn extract_document(text: &str) -> String {
    crate::extract_document(text)
}

#[wasm_bindgen]
pub fn suppress_overlay_text(document: &str) -> String {
    crate::suppress_overlay_text(document)
}

#[wasm_bindgen]
pub fn rescale_initial_camera(document: &str, factor: f64) -> String {
    crate::rescale_initial_camera(document, factor)
}

/// `postMessage` payload setting time of day and god rays.
#[wasm_bindgen]
pub fn environment_message(sunlight: f64, godrays: f64) -> Result<String, JsError> {
    ControlMessage::Environment { sunlight, godrays }
        .to_json()
        .map_err(|e| JsError::new(&e.to_string()))
}

/// `postMessage` payload toggling the build guide.
#[wasm_bindgen]
pub fn toggle_message() -> Result<String, JsError> {
    ControlMessage::ToggleInstructions
        .to_json()
        .map_err(|e| JsError::new(&e.to_string()))
}

#[wasm_bindgen]
pub fn embed_frame(document: &str) -> String {
    crate::host::embed_frame(document)
}
