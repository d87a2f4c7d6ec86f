//! Scene assembly: from a voxel list to a renderable scene description.
//!
//! The description is plain data. The document runtime turns it into a
//! three.js scene graph: one mesh per voxel sharing a unit box geometry,
//! one material per block type, and one texture per (type, face).

mod camera;
mod environment;
mod lighting;

pub use camera::{CameraFraming, FramingConfig};
pub use environment::{EnvironmentConfig, EnvironmentDressing, GroundCover, Tree};
pub use lighting::{DirectionalLight, GodRayCone, HemisphereLight, LightingRig};

use crate::control::{CelestialState, EnvironmentState, LightingConfig, SkyBand, SKY_BANDS};
use crate::error::{Result, SceneError};
use crate::texture::{FaceKind, MaterialCache, TextureCache};
use crate::types::VoxelList;
use serde::Serialize;
use std::collections::HashMap;

/// Ground texture repeats once per this many blocks.
const GROUND_TILE: f32 = 1.0;

/// `[x, y, z, material index]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VoxelInstance(pub i32, pub i32, pub i32, pub usize);

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundCoverInstance {
    pub x: f32,
    pub z: f32,
    pub scale: f32,
    pub material: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextureEntry {
    pub key: String,
    /// `data:image/png;base64,...`
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialEntry {
    pub block_type: String,
    /// Texture indices in box face order (+X, -X, +Y, -Y, +Z, -Z).
    pub faces: [usize; 6],
    pub transparent: bool,
    pub alpha_test: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundPlane {
    pub size: f32,
    pub texture: usize,
    pub repeat: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Fog {
    pub near: f32,
    pub far: f32,
}

/// Everything the document needs to build and drive its scene.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneDescription {
    pub voxels: Vec<VoxelInstance>,
    /// Tree blocks around the build.
    pub decorations: Vec<VoxelInstance>,
    pub ground_cover: Vec<GroundCoverInstance>,
    pub materials: Vec<MaterialEntry>,
    pub textures: Vec<TextureEntry>,
    pub ground: GroundPlane,
    pub camera: CameraFraming,
    pub fog: Fog,
    pub lighting: LightingRig,
    pub lighting_config: LightingConfig,
    pub environment: EnvironmentState,
    pub bands: Vec<SkyBand>,
}

impl SceneDescription {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Builds scene descriptions, memoising materials across builds.
#[derive(Debug, Default)]
pub struct SceneAssembler {
    environment: EnvironmentConfig,
    lighting: LightingConfig,
    framing: FramingConfig,
    materials: MaterialCache,
}

impl SceneAssembler {
    pub fn new(environment: EnvironmentConfig, lighting: LightingConfig, framing: FramingConfig) -> Self {
        Self {
            environment,
            lighting,
            framing,
            materials: MaterialCache::new(),
        }
    }

    pub fn material_cache(&self) -> &MaterialCache {
        &self.materials
    }

    pub fn assemble(&mut self, voxels: &VoxelList, initial: EnvironmentState) -> Result<SceneDescription> {
        if let Some(bad) = voxels.iter().find(|v| v.block_type.is_empty()) {
            return Err(SceneError::Assembly(format!(
                "voxel at ({}, {}, {}) has an empty block type",
                bad.x, bad.y, bad.z
            )));
        }

        let mut registry = Registry::new(&mut self.materials);

        let instances = voxels
            .iter()
            .map(|v| -> Result<VoxelInstance> {
                Ok(VoxelInstance(v.x, v.y, v.z, registry.material(&v.block_type)?))
            })
            .collect::<Result<Vec<_>>>()?;

        let dressing = EnvironmentDressing::generate(&self.environment);
        let decorations = dressing
            .tree_blocks
            .iter()
            .map(|v| -> Result<VoxelInstance> {
                Ok(VoxelInstance(v.x, v.y, v.z, registry.material(&v.block_type)?))
            })
            .collect::<Result<Vec<_>>>()?;
        let ground_cover = dressing
            .ground_cover
            .iter()
            .map(|accent| -> Result<GroundCoverInstance> {
                Ok(GroundCoverInstance {
                    x: accent.x,
                    z: accent.z,
                    scale: accent.scale,
                    material: registry.material(&accent.block_type)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let ground = GroundPlane {
            size: dressing.ground_size,
            texture: registry.texture("grass_block", FaceKind::Top)?,
            repeat: dressing.ground_size / GROUND_TILE,
        };

        let camera = CameraFraming::frame(voxels.bounds().as_ref(), &self.framing);
        let distance = camera.distance();
        let fog = Fog {
            near: distance * 1.2 + 10.0,
            far: distance * 1.2 + 10.0 + dressing.ground_size * 0.6,
        };

        let environment = initial.clamped();
        let celestial = CelestialState::compute(&environment, &self.lighting);
        let lighting = LightingRig::from_state(&celestial, &self.lighting);

        let Registry {
            materials, textures, ..
        } = registry;

        log::info!(
            "assembled scene: {} voxel(s), {} decoration block(s), {} material(s), {} texture(s)",
            instances.len(),
            decorations.len(),
            materials.len(),
            textures.len()
        );

        Ok(SceneDescription {
            voxels: instances,
            decorations,
            ground_cover,
            materials,
            textures,
            ground,
            camera,
            fog,
            lighting,
            lighting_config: self.lighting,
            environment,
            bands: SKY_BANDS.to_vec(),
        })
    }
}

/// Assigns dense indices to the materials and textures one scene uses.
struct Registry<'a> {
    cache: &'a mut MaterialCache,
    materials: Vec<MaterialEntry>,
    material_index: HashMap<String, usize>,
    textures: Vec<TextureEntry>,
    texture_index: HashMap<String, usize>,
}

impl<'a> Registry<'a> {
    fn new(cache: &'a mut MaterialCache) -> Self {
        Self {
            cache,
            materials: Vec::new(),
            material_index: HashMap::new(),
            textures: Vec::new(),
            texture_index: HashMap::new(),
        }
    }

    fn material(&mut self, block_type: &str) -> Result<usize> {
        if let Some(&index) = self.material_index.get(block_type) {
            return Ok(index);
        }

        let material = self.cache.material(block_type);
        let mut faces = [0usize; 6];
        for (slot, (key, texture)) in faces
            .iter_mut()
            .zip(material.face_keys.iter().zip(material.face_textures.iter()))
        {
            *slot = self.register_texture(key, || texture.to_data_uri())?;
        }

        let index = self.materials.len();
        self.materials.push(MaterialEntry {
            block_type: block_type.to_string(),
            faces,
            transparent: material.transparent,
            alpha_test: material.alpha_test,
        });
        self.material_index.insert(block_type.to_string(), index);
        Ok(index)
    }

    fn texture(&mut self, block_type: &str, face: FaceKind) -> Result<usize> {
        let key = TextureCache::key(block_type, face);
        let texture = self.cache.textures_mut().get(block_type, face);
        self.register_texture(&key, || texture.to_data_uri())
    }

    fn register_texture(&mut self, key: &str, encode: impl FnOnce() -> Result<String>) -> Result<usize> {
        if let Some(&index) = self.texture_index.get(key) {
            return Ok(index);
        }
        let uri = encode().map_err(|e| SceneError::Assembly(format!("texture '{}': {}", key, e)))?;
        let index = self.textures.len();
        self.textures.push(TextureEntry {
            key: key.to_string(),
            uri,
        });
        self.texture_index.insert(key.to_string(), index);
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Voxel;

    fn assemble(voxels: &VoxelList) -> SceneDescription {
        SceneAssembler::default()
            .assemble(voxels, EnvironmentState::default())
            .unwrap()
    }

    #[test]
    fn test_one_instance_per_voxel_with_shared_materials() {
        let voxels: VoxelList = (0..300)
            .map(|i| Voxel::new(i % 10, i / 100, (i / 10) % 10, if i % 2 == 0 { "stone" } else { "glass" }))
            .collect();
        let scene = assemble(&voxels);
        assert_eq!(scene.voxels.len(), 300);

        let stone = scene.materials.iter().position(|m| m.block_type == "stone").unwrap();
        let glass = scene.materials.iter().position(|m| m.block_type == "glass").unwrap();
        assert!(scene.voxels.iter().all(|v| v.3 == stone || v.3 == glass));
        assert!(scene.materials[glass].transparent);
        assert!(!scene.materials[stone].transparent);
    }

    #[test]
    fn test_textures_are_deduplicated() {
        let voxels = VoxelList::from(vec![
            Voxel::new(0, 0, 0, "grass_block"),
            Voxel::new(1, 0, 0, "grass_block"),
        ]);
        let scene = assemble(&voxels);
        let mut keys: Vec<&str> = scene.textures.iter().map(|t| t.key.as_str()).collect();
        let count = keys.len();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), count);
        assert!(scene.textures.iter().all(|t| t.uri.starts_with("data:image/png;base64,")));

        // The ground reuses the grass top texture.
        let grass = &scene.materials[scene.voxels[0].3];
        assert_eq!(scene.ground.texture, grass.faces[2]);
    }

    #[test]
    fn test_materials_survive_across_builds() {
        let voxels = VoxelList::from(vec![Voxel::new(0, 0, 0, "oak_planks")]);
        let mut assembler = SceneAssembler::default();
        assembler.assemble(&voxels, EnvironmentState::default()).unwrap();
        let generated = assembler.material_cache().textures().generated_count();
        assembler.assemble(&voxels, EnvironmentState::default()).unwrap();
        assert_eq!(assembler.material_cache().textures().generated_count(), generated);
    }

    #[test]
    fn test_camera_frames_voxels_not_dressing() {
        let voxels = VoxelList::from(vec![Voxel::new(-2, 0, -1, "stone"), Voxel::new(2, 3, 1, "stone")]);
        let scene = assemble(&voxels);
        assert_eq!(scene.camera.target, glam::Vec3::new(0.0, 1.5, 0.0));
        assert!(!scene.decorations.is_empty());
        assert!(scene.fog.far > scene.fog.near);
    }

    #[test]
    fn test_description_serializes() {
        let voxels = VoxelList::from(vec![Voxel::new(1, 2, 3, "stone")]);
        let json = assemble(&voxels).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["voxels"][0], serde_json::json!([1, 2, 3, 0]));
        assert_eq!(value["bands"].as_array().unwrap().len(), 5);
        let threshold = value["lightingConfig"]["nightThreshold"].as_f64().unwrap();
        assert!((threshold + 0.1).abs() < 1e-6);
        assert!(value["camera"]["position"].is_array());
    }

    #[test]
    fn test_empty_block_type_is_an_assembly_error() {
        let voxels = VoxelList::from(vec![Voxel {
            x: 0,
            y: 0,
            z: 0,
            block_type: String::new(),
        }]);
        let result = SceneAssembler::default().assemble(&voxels, EnvironmentState::default());
        assert!(matches!(result, Err(SceneError::Assembly(_))));
    }
}
