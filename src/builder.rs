//! The build pipeline: generated text in, standalone document out.

use crate::config::SceneConfig;
use crate::document::DocumentContent;
use crate::error::Result;
use crate::guide::BuildGuide;
use crate::interpreter::{Interpreter, Outcome};
use crate::postprocess::{extract_document, is_complete_document, rescale_initial_camera, suppress_overlay_text};
use crate::scene::{CameraFraming, SceneAssembler};
use crate::types::VoxelList;

/// Everything one build produced.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub html: String,
    /// Voxels the scene was assembled from. Empty for pass-through documents.
    pub voxels: VoxelList,
    pub guide: BuildGuide,
    /// How interpretation ended; `None` for pass-through documents.
    pub outcome: Option<Outcome>,
    /// Message shown in the document's error panel, if any.
    pub error: Option<String>,
}

impl BuildOutput {
    pub fn used_fallback(&self) -> bool {
        matches!(self.outcome, Some(Outcome::Fallback(_)))
    }

    /// The generator returned a complete document, which was only cleaned.
    pub fn is_passthrough(&self) -> bool {
        self.outcome.is_none()
    }
}

/// Runs builds under one configuration, sharing the material cache between
/// them.
#[derive(Debug, Default)]
pub struct SceneBuilder {
    config: SceneConfig,
    interpreter: Interpreter,
    assembler: SceneAssembler,
}

impl SceneBuilder {
    pub fn new(config: SceneConfig) -> Self {
        let interpreter = Interpreter::new(config.interpreter.clone());
        let assembler = SceneAssembler::new(config.environment.clone(), config.lighting, config.framing);
        Self {
            config,
            interpreter,
            assembler,
        }
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    /// Build a document from raw generator output.
    ///
    /// Program failures and assembly failures still produce a document;
    /// only serialization of the document itself can fail.
    pub fn build(&mut self, generated: &str) -> Result<BuildOutput> {
        self.config.validate()?;
        let extracted = extract_document(generated);

        if is_complete_document(&extracted) {
            log::info!("generator returned a complete document, passing it through");
            return Ok(BuildOutput {
                html: self.finish(&extracted),
                voxels: VoxelList::new(),
                guide: BuildGuide::default(),
                outcome: None,
                error: None,
            });
        }

        let interpretation = self.interpreter.run(&extracted);
        let failure = interpretation
            .error_message()
            .map(|message| format!("Program failed, showing fallback structure: {}", message));
        let voxels = if self.config.dedupe_voxels {
            interpretation.voxels.deduplicated()
        } else {
            interpretation.voxels
        };
        let guide = BuildGuide::from_voxels(&voxels);

        let (scene, error) = match self.assembler.assemble(&voxels, self.config.initial_environment) {
            Ok(scene) => (Some(scene), failure),
            Err(e) => {
                log::warn!("scene assembly failed: {}", e);
                (None, Some(e.to_string()))
            }
        };

        let document = self.config.document_template().render(&DocumentContent {
            scene: scene.as_ref(),
            guide: &guide,
            error: error.as_deref(),
            fallback_camera: CameraFraming::frame(None, &self.config.framing),
        })?;

        log::info!(
            "built document: {} voxel(s), {} layer(s), {} bytes",
            voxels.len(),
            guide.layers.len(),
            document.len()
        );

        Ok(BuildOutput {
            html: self.finish(&document),
            voxels,
            guide,
            outcome: Some(interpretation.outcome),
            error,
        })
    }

    fn finish(&self, document: &str) -> String {
        let cleaned = suppress_overlay_text(document);
        if self.config.camera_scale == 1.0 {
            cleaned
        } else {
            rescale_initial_camera(&cleaned, self.config.camera_scale)
        }
    }
}
