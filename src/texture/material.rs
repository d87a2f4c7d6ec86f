//! Block materials composed from face textures.

use super::data::TextureData;
use super::generator::{FaceKind, TextureCache};
use super::palette::{classify, BlockFamily};
use crate::types::Direction;
use std::collections::HashMap;
use std::sync::Arc;

/// Alpha cut-off used by cut-out materials (leaves).
const LEAVES_ALPHA_TEST: f32 = 0.5;
/// Alpha cut-off used by blended materials (glass), discarding empty texels.
const GLASS_ALPHA_TEST: f32 = 0.05;

/// A renderable surface set for one block type.
#[derive(Debug)]
pub struct BlockMaterial {
    /// Normalized block type this material was built for.
    pub block_type: String,
    pub family: BlockFamily,
    /// Texture cache keys in box face order (+X, -X, +Y, -Y, +Z, -Z).
    pub face_keys: [String; 6],
    /// Texture handles in box face order.
    pub face_textures: [Arc<TextureData>; 6],
    /// Enable alpha blending.
    pub transparent: bool,
    /// Alpha-test threshold; 0.0 disables the cut-out.
    pub alpha_test: f32,
}

impl BlockMaterial {
    /// Whether all six faces share one texture.
    pub fn is_uniform(&self) -> bool {
        self.face_keys.iter().all(|key| key == &self.face_keys[0])
    }

    /// Distinct texture keys used by this material, in first-use order.
    pub fn texture_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = Vec::with_capacity(3);
        for key in &self.face_keys {
            if !keys.contains(&key.as_str()) {
                keys.push(key);
            }
        }
        keys
    }

    /// Texture on the face pointing in `direction`.
    pub fn face(&self, direction: Direction) -> &Arc<TextureData> {
        let idx = Direction::BOX_ORDER
            .iter()
            .position(|d| *d == direction)
            .unwrap_or(0);
        &self.face_textures[idx]
    }
}

/// Memoised materials keyed by normalized block type.
#[derive(Debug, Default)]
pub struct MaterialCache {
    textures: TextureCache,
    materials: HashMap<String, Arc<BlockMaterial>>,
}

impl MaterialCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the material for a normalized block type, building it on first use.
    pub fn material(&mut self, block_type: &str) -> Arc<BlockMaterial> {
        if let Some(material) = self.materials.get(block_type) {
            return Arc::clone(material);
        }

        let material = Arc::new(self.build(block_type));
        log::debug!(
            "built material '{}' ({:?}, {} texture(s))",
            block_type,
            material.family,
            material.texture_keys().len()
        );
        self.materials
            .insert(block_type.to_string(), Arc::clone(&material));
        material
    }

    fn build(&mut self, block_type: &str) -> BlockMaterial {
        let family = classify(block_type).family;

        let face_kinds = Direction::BOX_ORDER.map(|dir| FaceKind::for_direction(family, dir));
        let face_keys = face_kinds.map(|face| TextureCache::key(block_type, face));
        let face_textures = face_kinds.map(|face| self.textures.get(block_type, face));

        let (transparent, alpha_test) = match family {
            BlockFamily::Glass => (true, GLASS_ALPHA_TEST),
            BlockFamily::Leaves => (true, LEAVES_ALPHA_TEST),
            _ => (false, 0.0),
        };

        BlockMaterial {
            block_type: block_type.to_string(),
            family,
            face_keys,
            face_textures,
            transparent,
            alpha_test,
        }
    }

    /// The texture cache backing these materials.
    pub fn textures(&self) -> &TextureCache {
        &self.textures
    }

    /// Mutable access to the texture cache, for textures outside any block material.
    pub fn textures_mut(&mut self) -> &mut TextureCache {
        &mut self.textures
    }

    /// Number of materials built so far.
    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}
