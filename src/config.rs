//! Top-level configuration for scene builds.

use crate::control::{EnvironmentState, LightingConfig};
use crate::document::{DocumentTemplate, DEFAULT_THREE_MODULE_URL};
use crate::error::{Result, SceneError};
use crate::interpreter::InterpreterConfig;
use crate::scene::{EnvironmentConfig, FramingConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Largest length, in blocks, any scene setting may take.
pub const MAX_EXTENT: f32 = 100_000.0;

/// `value` must be finite and within `min..=max`.
pub(crate) fn check_range(name: &str, value: f32, min: f32, max: f32) -> Result<()> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(SceneError::Config(format!(
            "{} must be between {} and {}, got {}",
            name, min, max, value
        )))
    }
}

pub(crate) fn check_length(name: &str, value: f32) -> Result<()> {
    check_range(name, value, 0.0, MAX_EXTENT)
}

pub(crate) fn check_count(name: &str, value: usize, max: usize) -> Result<()> {
    if value <= max {
        Ok(())
    } else {
        Err(SceneError::Config(format!("{} must be at most {}, got {}", name, max, value)))
    }
}

/// Every setting a build reads. Missing fields take their defaults, so an
/// empty JSON object is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SceneConfig {
    pub interpreter: InterpreterConfig,
    pub environment: EnvironmentConfig,
    pub lighting: LightingConfig,
    pub framing: FramingConfig,
    /// State the document starts in before its first environment update.
    pub initial_environment: EnvironmentState,
    /// Factor applied to literal initial camera placements; 1.0 leaves them.
    pub camera_scale: f64,
    /// Collapse duplicate coordinates, keeping the last placement.
    pub dedupe_voxels: bool,
    pub instructions_visible: bool,
    pub title: String,
    pub three_module_url: String,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            interpreter: InterpreterConfig::default(),
            environment: EnvironmentConfig::default(),
            lighting: LightingConfig::default(),
            framing: FramingConfig::default(),
            initial_environment: EnvironmentState::default(),
            camera_scale: 1.0,
            dedupe_voxels: false,
            instructions_visible: true,
            title: "Voxel Scene".to_string(),
            three_module_url: DEFAULT_THREE_MODULE_URL.to_string(),
        }
    }
}

impl SceneConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        log::debug!("loaded config from {}", path.as_ref().display());
        Self::from_json_str(&text)
    }

    /// Reject values that would make a build fail partway or produce a
    /// scene that cannot be rendered.
    pub fn validate(&self) -> Result<()> {
        self.interpreter.validate()?;
        self.environment.validate()?;
        self.lighting.validate()?;
        self.framing.validate()?;
        if !self.camera_scale.is_finite() || self.camera_scale <= 0.0 {
            return Err(SceneError::Config(format!(
                "camera scale must be a positive number, got {}",
                self.camera_scale
            )));
        }
        if self.three_module_url.trim().is_empty() {
            return Err(SceneError::Config("three module URL is empty".to_string()));
        }
        Ok(())
    }

    pub fn with_interpreter(mut self, interpreter: InterpreterConfig) -> Self {
        self.interpreter = interpreter;
        self
    }

    pub fn with_environment(mut self, environment: EnvironmentConfig) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_lighting(mut self, lighting: LightingConfig) -> Self {
        self.lighting = lighting;
        self
    }

    pub fn with_framing(mut self, framing: FramingConfig) -> Self {
        self.framing = framing;
        self
    }

    pub fn with_initial_environment(mut self, state: EnvironmentState) -> Self {
        self.initial_environment = state.clamped();
        self
    }

    pub fn with_camera_scale(mut self, factor: f64) -> Self {
        self.camera_scale = factor;
        self
    }

    pub fn with_dedupe(mut self, dedupe: bool) -> Self {
        self.dedupe_voxels = dedupe;
        self
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn document_template(&self) -> DocumentTemplate {
        DocumentTemplate {
            title: self.title.clone(),
            three_module_url: self.three_module_url.clone(),
            instructions_visible: self.instructions_visible,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_object_is_default() {
        assert_eq!(SceneConfig::from_json_str("{}").unwrap(), SceneConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let config = SceneConfig::from_json_str(
            r#"{
                "cameraScale": 0.5,
                "dedupeVoxels": true,
                "interpreter": { "entry_point": "main" },
                "lighting": { "nightThreshold": 0.0 },
                "initialEnvironment": { "timeOfDay": 0.6 }
            }"#,
        )
        .unwrap();
        assert_eq!(config.camera_scale, 0.5);
        assert!(config.dedupe_voxels);
        assert_eq!(config.interpreter.entry_point, "main");
        assert_eq!(config.interpreter.max_voxels, InterpreterConfig::default().max_voxels);
        assert_eq!(config.lighting.night_threshold, 0.0);
        assert_eq!(config.initial_environment.time_of_day, 0.6);
        assert_eq!(config.initial_environment.god_ray_intensity, 0.5);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            SceneConfig::from_json_str(r#"{"cameraScale": 0}"#),
            Err(SceneError::Config(_))
        ));
        assert!(matches!(
            SceneConfig::from_json_str(r#"{"interpreter": {"entry_point": " "}}"#),
            Err(SceneError::Config(_))
        ));
        assert!(matches!(SceneConfig::from_json_str("[1, 2]"), Err(SceneError::Json(_))));

        for json in [
            r#"{"environment": {"ground_size": 1e39}}"#,
            r#"{"environment": {"ground_size": 0}}"#,
            r#"{"environment": {"tree_radius": -4}}"#,
            r#"{"environment": {"radial_jitter": 3e38}}"#,
            r#"{"environment": {"leaf_probability": 1.5}}"#,
            r#"{"environment": {"ground_cover_clearance": 1e39}}"#,
            r#"{"environment": {"ground_cover_count": 1000000000}}"#,
            r#"{"environment": {"trunk_height_max": 100000}}"#,
            r#"{"environment": {"trunk_height_min": 0}}"#,
            r#"{"lighting": {"orbitRadius": 1e39}}"#,
            r#"{"lighting": {"godRayMaxOpacity": 2}}"#,
            r#"{"lighting": {"sunIntensity": -1}}"#,
            r#"{"framing": {"fov": 0}}"#,
            r#"{"framing": {"margin": 1e39}}"#,
            r#"{"framing": {"defaultOffset": [1, 2, 1e39]}}"#,
            r#"{"interpreter": {"max_voxels": 0}}"#,
            r#"{"interpreter": {"max_call_depth": 100000}}"#,
        ] {
            assert!(
                matches!(SceneConfig::from_json_str(json), Err(SceneError::Config(_))),
                "{} should be rejected",
                json
            );
        }
    }

    #[test]
    fn test_programmatic_configs_are_validated() {
        let environment = EnvironmentConfig {
            ground_size: f32::INFINITY,
            ..EnvironmentConfig::default()
        };
        let config = SceneConfig::default().with_environment(environment);
        assert!(matches!(config.validate(), Err(SceneError::Config(_))));

        let lighting = LightingConfig::default().with_night_threshold(f32::NAN);
        assert!(SceneConfig::default().with_lighting(lighting).validate().is_err());

        let environment = EnvironmentConfig {
            leaf_probability: f64::NAN,
            ..EnvironmentConfig::default()
        };
        assert!(SceneConfig::default().with_environment(environment).validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"title": "Castle", "environment": {{"tree_count": 3}}}}"#).unwrap();
        let config = SceneConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.title, "Castle");
        assert_eq!(config.environment.tree_count, 3);
        assert_eq!(config.document_template().title, "Castle");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = SceneConfig::from_json_file(dir.path().join("absent.json"));
        assert!(matches!(result, Err(SceneError::Io(_))));
    }

    #[test]
    fn test_initial_environment_is_clamped() {
        let config = SceneConfig::default().with_initial_environment(EnvironmentState {
            time_of_day: 3.0,
            god_ray_intensity: -1.0,
        });
        assert_eq!(config.initial_environment, EnvironmentState::new(1.0, 0.0));
    }
}
