//! Rendering of the standalone HTML document.
//!
//! A document is one HTML string with everything inlined: styles, the build
//! guide panel, the error panel, the scene description as JSON and the
//! runtime script. Its only external reference is the `three` entry of an
//! import map.

use crate::error::Result;
use crate::guide::BuildGuide;
use crate::postprocess::{format_number, BUILD_GUIDE_ID};
use crate::scene::{CameraFraming, SceneDescription};
use serde::Serialize;
use std::fmt::Write;

/// Id of the persistent error panel.
pub const ERROR_PANEL_ID: &str = "scene-error";
/// Id of the `application/json` script holding the scene payload.
pub const SCENE_DATA_ID: &str = "scene-data";

pub const DEFAULT_THREE_MODULE_URL: &str = "https://unpkg.com/three@0.160.0/build/three.module.js";

const RUNTIME_JS: &str = include_str!("runtime.js");

const STYLE: &str = r#"html, body { margin: 0; height: 100%; overflow: hidden; background: #111; font-family: system-ui, sans-serif; }
canvas { display: block; }
#build-guide { position: fixed; top: 12px; right: 12px; max-height: calc(100% - 24px); width: 260px; overflow-y: auto; padding: 10px 14px; border-radius: 8px; background: rgba(20, 20, 24, 0.82); color: #eee; font-size: 13px; }
#build-guide h2 { margin: 0 0 6px; font-size: 15px; }
#build-guide h3 { margin: 10px 0 4px; font-size: 13px; text-transform: uppercase; letter-spacing: 0.04em; color: #bbb; }
#build-guide h4 { margin: 8px 0 2px; font-size: 13px; }
#build-guide ul { margin: 0; padding-left: 18px; }
#build-guide[hidden], #scene-error[hidden] { display: none; }
#scene-error { position: fixed; left: 12px; bottom: 12px; max-width: 60%; padding: 10px 14px; border-radius: 8px; background: rgba(140, 20, 20, 0.9); color: #fff; font: 12px/1.4 ui-monospace, monospace; white-space: pre-wrap; z-index: 10; }"#;

/// Escape text for HTML content and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// JSON that is safe inside a `<script>` element.
fn script_safe_json(json: &str) -> String {
    json.replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026")
}

/// Camera coordinates are written rounded to three decimals.
fn camera_number(value: f32) -> String {
    format_number((f64::from(value) * 1000.0).round() / 1000.0)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Payload<'a> {
    scene: Option<&'a SceneDescription>,
    error: Option<&'a str>,
}

/// Document chrome shared by every build.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentTemplate {
    pub title: String,
    pub three_module_url: String,
    /// Whether the build guide starts visible.
    pub instructions_visible: bool,
}

impl Default for DocumentTemplate {
    fn default() -> Self {
        Self {
            title: "Voxel Scene".to_string(),
            three_module_url: DEFAULT_THREE_MODULE_URL.to_string(),
            instructions_visible: true,
        }
    }
}

/// What goes into one document.
#[derive(Debug, Clone, Copy)]
pub struct DocumentContent<'a> {
    /// `None` when assembly failed; the document then shows only its chrome.
    pub scene: Option<&'a SceneDescription>,
    pub guide: &'a BuildGuide,
    /// Shown in the error panel from the start.
    pub error: Option<&'a str>,
    /// Camera used when there is no scene.
    pub fallback_camera: CameraFraming,
}

impl DocumentTemplate {
    pub fn render(&self, content: &DocumentContent<'_>) -> Result<String> {
        let payload = Payload {
            scene: content.scene,
            error: content.error,
        };
        let data = script_safe_json(&serde_json::to_string(&payload)?);
        let import_map = script_safe_json(&serde_json::to_string(&serde_json::json!({
            "imports": { "three": self.three_module_url }
        }))?);

        let camera = content.scene.map_or(content.fallback_camera, |scene| scene.camera);
        let [px, py, pz] = camera.position.to_array().map(camera_number);
        let [tx, ty, tz] = camera.target.to_array().map(camera_number);

        let mut html = String::with_capacity(data.len() + RUNTIME_JS.len() + 4096);
        html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
        html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
        let _ = writeln!(html, "<title>{}</title>", escape_html(&self.title));
        let _ = writeln!(html, "<style>\n{}\n</style>", STYLE);
        let _ = writeln!(html, "<script type=\"importmap\">{}</script>", import_map);
        html.push_str("</head>\n<body>\n");

        let _ = writeln!(
            html,
            "<div id=\"{}\"{}>\n<h2>Build guide</h2>\n<div class=\"guide-body\">\n{}</div>\n</div>",
            BUILD_GUIDE_ID,
            if self.instructions_visible { "" } else { " hidden" },
            content.guide.to_html()
        );

        match content.error {
            Some(message) => {
                let _ = writeln!(
                    html,
                    "<div id=\"{}\" role=\"alert\"><div>{}</div></div>",
                    ERROR_PANEL_ID,
                    escape_html(message)
                );
            }
            None => {
                let _ = writeln!(html, "<div id=\"{}\" role=\"alert\" hidden></div>", ERROR_PANEL_ID);
            }
        }

        let _ = writeln!(
            html,
            "<script type=\"application/json\" id=\"{}\">{}</script>",
            SCENE_DATA_ID, data
        );

        html.push_str("<script type=\"module\">\nimport * as THREE from 'three';\n\n");
        let _ = writeln!(
            html,
            "const camera = new THREE.PerspectiveCamera({}, window.innerWidth / window.innerHeight, 0.1, 2000);",
            camera_number(camera.fov)
        );
        let _ = writeln!(html, "camera.position.set({}, {}, {});", px, py, pz);
        let _ = writeln!(html, "camera.lookAt({}, {}, {});\n", tx, ty, tz);
        html.push_str(RUNTIME_JS);
        html.push_str("</script>\n</body>\n</html>\n");

        Ok(html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::EnvironmentState;
    use crate::postprocess::{extract_document, rescale_initial_camera};
    use crate::scene::{FramingConfig, SceneAssembler};
    use crate::types::{Voxel, VoxelList};

    fn voxels() -> VoxelList {
        VoxelList::from(vec![
            Voxel::new(0, 0, 0, "stone"),
            Voxel::new(1, 0, 0, "stone"),
            Voxel::new(0, 1, 0, "dirt"),
        ])
    }

    fn render(error: Option<&str>, with_scene: bool) -> String {
        let voxels = voxels();
        let scene = SceneAssembler::default()
            .assemble(&voxels, EnvironmentState::default())
            .unwrap();
        let guide = BuildGuide::from_voxels(&voxels);
        DocumentTemplate::default()
            .render(&DocumentContent {
                scene: with_scene.then_some(&scene),
                guide: &guide,
                error,
                fallback_camera: CameraFraming::frame(None, &FramingConfig::default()),
            })
            .unwrap()
    }

    fn scene_data(html: &str) -> serde_json::Value {
        let open = format!("<script type=\"application/json\" id=\"{}\">", SCENE_DATA_ID);
        let start = html.find(&open).unwrap() + open.len();
        let end = start + html[start..].find("</script>").unwrap();
        serde_json::from_str(&html[start..end]).unwrap()
    }

    #[test]
    fn test_document_is_complete_and_extractable() {
        let html = render(None, true);
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert_eq!(html.matches("</html>").count(), 1);
        assert_eq!(extract_document(&format!("Here you go:\n{}\nEnjoy!", html)), html.trim_end());
    }

    #[test]
    fn test_single_declared_import() {
        let html = render(None, true);
        assert_eq!(html.matches(DEFAULT_THREE_MODULE_URL).count(), 1);
        assert_eq!(html.matches("<script type=\"importmap\">").count(), 1);
        assert!(!html.contains("<script src"));
        assert!(!html.contains("<link"));
    }

    #[test]
    fn test_scene_data_round_trips() {
        let data = scene_data(&render(None, true));
        assert_eq!(data["scene"]["voxels"].as_array().unwrap().len(), 3);
        assert!(data["error"].is_null());
    }

    #[test]
    fn test_script_content_cannot_close_the_tag() {
        let voxels = VoxelList::from(vec![Voxel::new(0, 0, 0, "</script><b>x")]);
        let scene = SceneAssembler::default()
            .assemble(&voxels, EnvironmentState::default())
            .unwrap();
        let guide = BuildGuide::from_voxels(&voxels);
        let html = DocumentTemplate::default()
            .render(&DocumentContent {
                scene: Some(&scene),
                guide: &guide,
                error: Some("</script> broke"),
                fallback_camera: scene.camera,
            })
            .unwrap();
        assert_eq!(html.matches("</script>").count(), 3);
        let data = scene_data(&html);
        assert_eq!(data["scene"]["materials"][0]["blockType"], "</script><b>x");
        assert_eq!(data["error"], "</script> broke");
    }

    #[test]
    fn test_camera_literal_is_rescalable() {
        let html = render(None, true);
        let line = html.lines().find(|l| l.starts_with("camera.position.set(")).unwrap();
        // Bounds (0,0,0)-(1,1,0): largest span 1, offset 1.2 + 8.
        assert_eq!(line, "camera.position.set(9.7, 9.7, 9.2);");
        let rescaled = rescale_initial_camera(&html, 2.0);
        assert!(rescaled.contains("camera.position.set(19.4, 19.4, 18.4);"));
        assert!(rescaled.contains("camera.lookAt(0.5, 0.5, 0);"));
    }

    #[test]
    fn test_panels_present() {
        let html = render(None, true);
        assert!(html.contains("<div id=\"build-guide\">"));
        assert!(html.contains("Layer 1 (Y = 0)"));
        assert!(html.contains("<div id=\"scene-error\" role=\"alert\" hidden></div>"));
        assert!(html.contains("window.onerror"));
        assert!(html.contains("unhandledrejection"));
        assert!(html.contains("addEventListener('message'"));
        assert!(html.contains("cancelAnimationFrame"));
        assert!(html.contains("THREE.NearestFilter"));
        assert!(html.contains("THREE.SRGBColorSpace"));
        assert!(html.contains("THREE.AdditiveBlending"));
    }

    #[test]
    fn test_error_panel_prefilled_without_scene() {
        let html = render(Some("Scene assembly error: <bad>"), false);
        assert!(html.contains("<div id=\"scene-error\" role=\"alert\"><div>Scene assembly error: &lt;bad&gt;</div></div>"));
        assert!(scene_data(&html)["scene"].is_null());
        // Default framing when nothing was assembled.
        assert!(html.contains("camera.position.set(20, 20, 20);"));
        // The guide and listener survive.
        assert!(html.contains("Total materials"));
        assert!(html.contains("toggleInstructions"));
    }

    #[test]
    fn test_hidden_guide() {
        let voxels = voxels();
        let guide = BuildGuide::from_voxels(&voxels);
        let html = DocumentTemplate {
            instructions_visible: false,
            ..DocumentTemplate::default()
        }
        .render(&DocumentContent {
            scene: None,
            guide: &guide,
            error: None,
            fallback_camera: CameraFraming::frame(None, &FramingConfig::default()),
        })
        .unwrap();
        assert!(html.contains("<div id=\"build-guide\" hidden>"));
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a<b>&\"c'"), "a&lt;b&gt;&amp;&quot;c&#39;");
    }
}
