//! Procedural block textures and materials.
//!
//! Every block type is drawn as a 16x16 pixel-art texture synthesized from a
//! base-colour table and a per-family pattern. Textures and materials are
//! memoised, so a scene with hundreds of voxels of a few types only pays for
//! a handful of generated images.

mod data;
mod generator;
mod material;
mod palette;

pub use data::{TextureData, TEXTURE_SIZE};
pub use generator::{FaceKind, TextureCache};
pub use material::{BlockMaterial, MaterialCache};
pub use palette::{classify, BlockFamily, BlockStyle, FALLBACK_COLOR};
