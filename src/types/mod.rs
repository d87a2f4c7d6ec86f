//! Shared types used throughout the library.

mod direction;

pub use direction::Direction;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A block position in 3D space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockPosition {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPosition {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.x as f32, self.y as f32, self.z as f32]
    }
}

/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl BoundingBox {
    pub fn new(min: [f32; 3], max: [f32; 3]) -> Self {
        Self { min, max }
    }

    pub fn from_points(points: impl Iterator<Item = [f32; 3]>) -> Option<Self> {
        let mut min = [f32::MAX; 3];
        let mut max = [f32::MIN; 3];
        let mut has_points = false;

        for p in points {
            has_points = true;
            for i in 0..3 {
                min[i] = min[i].min(p[i]);
                max[i] = max[i].max(p[i]);
            }
        }

        if has_points {
            Some(Self { min, max })
        } else {
            None
        }
    }

    pub fn dimensions(&self) -> [f32; 3] {
        [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ]
    }

    pub fn center(&self) -> [f32; 3] {
        [
            (self.min[0] + self.max[0]) * 0.5,
            (self.min[1] + self.max[1]) * 0.5,
            (self.min[2] + self.max[2]) * 0.5,
        ]
    }

    /// The largest extent along any axis.
    pub fn largest_dimension(&self) -> f32 {
        let [dx, dy, dz] = self.dimensions();
        dx.max(dy).max(dz)
    }
}

/// Normalize a block type token: trimmed, lowercase, whitespace runs become `_`.
pub fn normalize_block_type(raw: &str) -> String {
    raw.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}

/// One placed block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voxel {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    #[serde(rename = "type")]
    pub block_type: String,
}

impl Voxel {
    /// Create a voxel, normalizing the block type.
    pub fn new(x: i32, y: i32, z: i32, block_type: &str) -> Self {
        Self {
            x,
            y,
            z,
            block_type: normalize_block_type(block_type),
        }
    }

    pub fn position(&self) -> BlockPosition {
        BlockPosition::new(self.x, self.y, self.z)
    }
}

/// The ordered, append-only list of placements from one interpretation pass.
///
/// Duplicate coordinates are kept: the later entry renders on top, and both
/// are counted by the build guide.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoxelList {
    voxels: Vec<Voxel>,
}

impl VoxelList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, voxel: Voxel) {
        self.voxels.push(voxel);
    }

    pub fn len(&self) -> usize {
        self.voxels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voxels.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Voxel> {
        self.voxels.iter()
    }

    pub fn as_slice(&self) -> &[Voxel] {
        &self.voxels
    }

    /// Bounding box of all voxel positions (cell origins, not cell extents).
    pub fn bounds(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(self.voxels.iter().map(|v| v.position().to_array()))
    }

    /// Last-write-wins de-duplication by coordinate, keeping first-seen order.
    pub fn deduplicated(&self) -> VoxelList {
        let mut slots: HashMap<BlockPosition, usize> = HashMap::new();
        let mut voxels: Vec<Voxel> = Vec::with_capacity(self.voxels.len());

        for voxel in &self.voxels {
            match slots.get(&voxel.position()) {
                Some(&idx) => voxels[idx] = voxel.clone(),
                None => {
                    slots.insert(voxel.position(), voxels.len());
                    voxels.push(voxel.clone());
                }
            }
        }

        VoxelList { voxels }
    }
}

impl From<Vec<Voxel>> for VoxelList {
    fn from(voxels: Vec<Voxel>) -> Self {
        Self { voxels }
    }
}

impl FromIterator<Voxel> for VoxelList {
    fn from_iter<I: IntoIterator<Item = Voxel>>(iter: I) -> Self {
        Self {
            voxels: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a VoxelList {
    type Item = &'a Voxel;
    type IntoIter = std::slice::Iter<'a, Voxel>;

    fn into_iter(self) -> Self::IntoIter {
        self.voxels.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_block_type() {
        assert_eq!(normalize_block_type("Stone"), "stone");
        assert_eq!(normalize_block_type("  Oak  Planks "), "oak_planks");
        assert_eq!(normalize_block_type("red wool"), "red_wool");
        assert_eq!(normalize_block_type(""), "");
    }

    #[test]
    fn test_duplicates_are_retained() {
        let mut list = VoxelList::new();
        list.push(Voxel::new(0, 0, 0, "stone"));
        list.push(Voxel::new(0, 0, 0, "dirt"));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_deduplicated_last_write_wins() {
        let list: VoxelList = vec![
            Voxel::new(0, 0, 0, "stone"),
            Voxel::new(1, 0, 0, "glass"),
            Voxel::new(0, 0, 0, "dirt"),
        ]
        .into();

        let deduped = list.deduplicated();
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped.as_slice()[0].block_type, "dirt");
        assert_eq!(deduped.as_slice()[1].block_type, "glass");
    }

    #[test]
    fn test_bounds() {
        let list: VoxelList = vec![Voxel::new(-2, 0, 1, "stone"), Voxel::new(2, 3, -1, "stone")].into();
        let bounds = list.bounds().unwrap();
        assert_eq!(bounds.min, [-2.0, 0.0, -1.0]);
        assert_eq!(bounds.max, [2.0, 3.0, 1.0]);
        assert_eq!(bounds.largest_dimension(), 4.0);
        assert_eq!(bounds.center(), [0.0, 1.5, 0.0]);

        assert!(VoxelList::new().bounds().is_none());
    }

    #[test]
    fn test_voxel_serializes_type_field() {
        let json = serde_json::to_string(&Voxel::new(1, 2, 3, "stone")).unwrap();
        assert_eq!(json, r#"{"x":1,"y":2,"z":3,"type":"stone"}"#);
    }
}
