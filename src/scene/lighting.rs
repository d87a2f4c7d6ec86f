//! The lighting rig: sun, moon, hemisphere fill and the god-ray cone.

use crate::control::{CelestialState, LightingConfig};
use glam::Vec3;
use serde::Serialize;

const SUN_COLOR: u32 = 0xfff1d6;
const MOON_COLOR: u32 = 0x9fb4ff;
const HEMISPHERE_GROUND: u32 = 0x4a3b2a;
const GOD_RAY_COLOR: u32 = 0xffe2a8;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectionalLight {
    pub position: Vec3,
    pub color: u32,
    pub intensity: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HemisphereLight {
    pub ground_color: u32,
    pub intensity: f32,
}

/// Additive cone from the sun towards the origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GodRayCone {
    pub position: Vec3,
    /// Unit vector from the sun to the origin.
    pub direction: Vec3,
    pub length: f32,
    pub radius: f32,
    pub color: u32,
    pub opacity: f32,
    pub visible: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LightingRig {
    pub sun: DirectionalLight,
    pub moon: DirectionalLight,
    pub hemisphere: HemisphereLight,
    pub god_rays: GodRayCone,
}

impl LightingRig {
    pub fn from_state(state: &CelestialState, config: &LightingConfig) -> Self {
        let direction = (-state.sun_position).normalize_or_zero();
        Self {
            sun: DirectionalLight {
                position: state.sun_position,
                color: SUN_COLOR,
                intensity: state.sun_intensity,
            },
            moon: DirectionalLight {
                position: state.moon_position,
                color: MOON_COLOR,
                intensity: state.moon_intensity,
            },
            hemisphere: HemisphereLight {
                ground_color: HEMISPHERE_GROUND,
                intensity: state.hemisphere_intensity,
            },
            god_rays: GodRayCone {
                position: state.sun_position,
                direction,
                length: config.god_ray_length,
                radius: config.god_ray_radius,
                color: GOD_RAY_COLOR,
                opacity: state.god_rays.opacity,
                visible: state.god_rays.visible,
            },
        }
    }

    /// Centre of the cone, halfway from the sun towards the origin.
    pub fn god_ray_center(&self) -> Vec3 {
        self.god_rays.position + self.god_rays.direction * (self.god_rays.length * 0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::EnvironmentState;

    fn rig(sunlight: f32, godrays: f32) -> LightingRig {
        let config = LightingConfig::default();
        let state = CelestialState::compute(&EnvironmentState::new(sunlight, godrays), &config);
        LightingRig::from_state(&state, &config)
    }

    #[test]
    fn test_exactly_one_directional_light() {
        for sunlight in [0.0, 0.1, 0.25, 0.5, 0.6, 0.75, 0.9, 1.0] {
            let rig = rig(sunlight, 1.0);
            assert!((rig.sun.intensity > 0.0) ^ (rig.moon.intensity > 0.0));
        }
    }

    #[test]
    fn test_cone_aims_at_origin() {
        let rig = rig(0.2, 1.0);
        let to_origin = (-rig.god_rays.position).normalize();
        assert!((rig.god_rays.direction - to_origin).length() < 1e-5);
        assert!(rig.god_rays.visible);
        assert!(rig.god_ray_center().length() < rig.god_rays.position.length());
    }

    #[test]
    fn test_cone_hidden_at_night() {
        let rig = rig(0.7, 1.0);
        assert!(!rig.god_rays.visible);
        assert_eq!(rig.god_rays.opacity, 0.0);
    }
}
