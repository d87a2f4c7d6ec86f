//! Initial camera placement from the bounds of the placed voxels.

use crate::config::{check_range, MAX_EXTENT};
use crate::error::Result;
use crate::types::BoundingBox;
use glam::Vec3;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FramingConfig {
    /// Offset per axis per block of the largest span.
    pub scale: f32,
    /// Offset added on every axis regardless of size.
    pub margin: f32,
    /// Offset used when there is nothing to frame.
    pub default_offset: [f32; 3],
    pub fov: f32,
}

impl Default for FramingConfig {
    fn default() -> Self {
        Self {
            scale: 1.2,
            margin: 8.0,
            default_offset: [20.0, 20.0, 20.0],
            fov: 60.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraFraming {
    pub position: Vec3,
    pub target: Vec3,
    pub fov: f32,
}

impl FramingConfig {
    pub fn validate(&self) -> Result<()> {
        check_range("framing scale", self.scale, -1_000.0, 1_000.0)?;
        check_range("framing margin", self.margin, -MAX_EXTENT, MAX_EXTENT)?;
        for component in self.default_offset {
            check_range("framing default offset", component, -MAX_EXTENT, MAX_EXTENT)?;
        }
        check_range("framing field of view", self.fov, 1.0, 179.0)
    }
}

impl CameraFraming {
    /// Look at the bounding-box centre from `scale * largest_span + margin`
    /// along each axis; with no bounds, use the default offset from the origin.
    pub fn frame(bounds: Option<&BoundingBox>, config: &FramingConfig) -> Self {
        let (target, offset) = match bounds {
            Some(bounds) => {
                let distance = config.scale * bounds.largest_dimension() + config.margin;
                (Vec3::from_array(bounds.center()), Vec3::splat(distance))
            }
            None => (Vec3::ZERO, Vec3::from_array(config.default_offset)),
        };
        Self {
            position: target + offset,
            target,
            fov: config.fov,
        }
    }

    pub fn offset(&self) -> Vec3 {
        self.position - self.target
    }

    pub fn distance(&self) -> f32 {
        self.offset().length()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Voxel, VoxelList};

    #[test]
    fn test_frames_bounding_box_center() {
        let voxels = VoxelList::from(vec![
            Voxel::new(-2, 0, -1, "stone"),
            Voxel::new(2, 3, 1, "stone"),
            Voxel::new(0, 1, 0, "dirt"),
        ]);
        let bounds = voxels.bounds().unwrap();
        let config = FramingConfig::default();
        let camera = CameraFraming::frame(Some(&bounds), &config);

        assert_eq!(camera.target, Vec3::new(0.0, 1.5, 0.0));
        let expected = config.scale * 4.0 + config.margin;
        assert!((camera.offset() - Vec3::splat(expected)).abs().max_element() < 1e-4);
    }

    #[test]
    fn test_offset_grows_with_span() {
        let config = FramingConfig::default();
        let small = BoundingBox::new([0.0; 3], [2.0, 1.0, 1.0]);
        let large = BoundingBox::new([0.0; 3], [20.0, 1.0, 1.0]);
        let small = CameraFraming::frame(Some(&small), &config);
        let large = CameraFraming::frame(Some(&large), &config);
        assert!(large.distance() > small.distance());
        assert!((large.offset().x - small.offset().x - config.scale * 18.0).abs() < 1e-4);
    }

    #[test]
    fn test_empty_uses_default() {
        let config = FramingConfig::default();
        let camera = CameraFraming::frame(None, &config);
        assert_eq!(camera.target, Vec3::ZERO);
        assert_eq!(camera.position, Vec3::new(20.0, 20.0, 20.0));
    }

    #[test]
    fn test_single_voxel_uses_margin_only() {
        let bounds = BoundingBox::new([3.0, 4.0, 5.0], [3.0, 4.0, 5.0]);
        let camera = CameraFraming::frame(Some(&bounds), &FramingConfig::default());
        assert_eq!(camera.target, Vec3::new(3.0, 4.0, 5.0));
        assert_eq!(camera.offset(), Vec3::splat(8.0));
    }
}
