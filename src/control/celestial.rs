//! Sun, moon, sky and god-ray state derived from the environment.

use super::sky::{band_for, BandKind, Hsl};
use super::EnvironmentState;
use crate::config::{check_length, check_range};
use crate::error::Result;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;

/// Tunables for the lighting rig.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LightingConfig {
    /// Radius of the sun/moon orbit around the origin.
    pub orbit_radius: f32,
    /// Fraction of the radius the sun sits off the orbit plane along +Z.
    pub depth_factor: f32,
    /// The sun is lit while its normalized height exceeds this.
    pub night_threshold: f32,
    pub sun_intensity: f32,
    pub moon_intensity: f32,
    /// Opacity of the god-ray cone at full intensity with the sun overhead.
    pub god_ray_max_opacity: f32,
    pub god_ray_length: f32,
    pub god_ray_radius: f32,
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            orbit_radius: 80.0,
            depth_factor: 0.35,
            night_threshold: -0.1,
            sun_intensity: 1.2,
            moon_intensity: 0.35,
            god_ray_max_opacity: 0.35,
            god_ray_length: 90.0,
            god_ray_radius: 14.0,
        }
    }
}

impl LightingConfig {
    pub fn with_night_threshold(mut self, threshold: f32) -> Self {
        self.night_threshold = threshold;
        self
    }

    pub fn validate(&self) -> Result<()> {
        check_length("lighting orbit radius", self.orbit_radius)?;
        check_range("lighting depth factor", self.depth_factor, -10.0, 10.0)?;
        check_range("lighting night threshold", self.night_threshold, -1.0, 1.0)?;
        check_range("lighting sun intensity", self.sun_intensity, 0.0, 100.0)?;
        check_range("lighting moon intensity", self.moon_intensity, 0.0, 100.0)?;
        check_range("lighting god-ray opacity", self.god_ray_max_opacity, 0.0, 1.0)?;
        check_length("lighting god-ray length", self.god_ray_length)?;
        check_length("lighting god-ray radius", self.god_ray_radius)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GodRays {
    pub visible: bool,
    pub opacity: f32,
}

/// Everything the document applies after an environment update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CelestialState {
    /// Orbit angle in radians; 0 puts the sun on the eastern horizon.
    pub angle: f32,
    pub sun_position: Vec3,
    pub moon_position: Vec3,
    /// Sine of the orbit angle: 1 overhead, 0 on the horizon.
    pub sun_height: f32,
    pub sun_lit: bool,
    pub sun_intensity: f32,
    pub moon_intensity: f32,
    pub band: BandKind,
    pub sky: Hsl,
    pub fog: Hsl,
    pub hemisphere_intensity: f32,
    pub god_rays: GodRays,
}

impl CelestialState {
    pub fn compute(environment: &EnvironmentState, lighting: &LightingConfig) -> Self {
        let angle = environment.time_of_day * TAU;
        let radius = lighting.orbit_radius;
        let sun_position = Vec3::new(
            radius * angle.cos(),
            radius * angle.sin(),
            radius * lighting.depth_factor,
        );
        let moon_position = -sun_position;

        let sun_height = angle.sin();
        let sun_lit = sun_height > lighting.night_threshold;

        // A lit sun always has non-zero intensity, even just below the horizon.
        let (sun_intensity, moon_intensity) = if sun_lit {
            let elevation = sun_height.clamp(0.0, 1.0);
            (lighting.sun_intensity * (0.35 + 0.65 * elevation), 0.0)
        } else {
            (0.0, lighting.moon_intensity)
        };

        let god_rays = if sun_lit && sun_height > 0.0 && environment.god_ray_intensity > 0.0 {
            GodRays {
                visible: true,
                opacity: environment.god_ray_intensity
                    * sun_height.clamp(0.0, 1.0)
                    * lighting.god_ray_max_opacity,
            }
        } else {
            GodRays {
                visible: false,
                opacity: 0.0,
            }
        };

        let band = band_for(environment.time_of_day);

        Self {
            angle,
            sun_position,
            moon_position,
            sun_height,
            sun_lit,
            sun_intensity,
            moon_intensity,
            band: band.kind,
            sky: band.sky,
            fog: band.fog,
            hemisphere_intensity: band.hemisphere_intensity,
            god_rays,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(sunlight: f32, godrays: f32) -> CelestialState {
        CelestialState::compute(
            &EnvironmentState::new(sunlight, godrays),
            &LightingConfig::default(),
        )
    }

    #[test]
    fn test_sun_and_moon_never_both_lit() {
        for i in 0..=1000 {
            let state = at(i as f32 / 1000.0, 1.0);
            assert!(
                (state.sun_intensity > 0.0) != (state.moon_intensity > 0.0),
                "sunlight {}",
                i as f32 / 1000.0
            );
        }
    }

    #[test]
    fn test_moon_is_opposite_the_sun() {
        let state = at(0.2, 0.0);
        assert!((state.sun_position + state.moon_position).length() < 1e-4);
    }

    #[test]
    fn test_dawn_sun_on_horizon() {
        let state = at(0.0, 0.5);
        assert!(state.sun_lit);
        assert!(state.sun_position.y.abs() < 1e-4);
        assert_eq!(state.band, BandKind::Dawn);
        // Height is zero, so no god rays yet.
        assert!(!state.god_rays.visible);
    }

    #[test]
    fn test_noon_and_midnight() {
        let noon = at(0.25, 1.0);
        assert!(noon.sun_lit);
        assert!((noon.sun_height - 1.0).abs() < 1e-5);
        assert!(noon.god_rays.visible);
        assert!((noon.god_rays.opacity - LightingConfig::default().god_ray_max_opacity).abs() < 1e-4);

        let midnight = at(0.75, 1.0);
        assert!(!midnight.sun_lit);
        assert_eq!(midnight.sun_intensity, 0.0);
        assert!(midnight.moon_intensity > 0.0);
        assert!(!midnight.god_rays.visible);
    }

    #[test]
    fn test_threshold_keeps_sun_lit_just_below_horizon() {
        // sin(0.51 * TAU) is about -0.063, still above the -0.1 threshold.
        let state = at(0.51, 1.0);
        assert!(state.sun_height < 0.0);
        assert!(state.sun_lit);
        assert!(!state.god_rays.visible);

        let strict = CelestialState::compute(
            &EnvironmentState::new(0.51, 1.0),
            &LightingConfig::default().with_night_threshold(0.0),
        );
        assert!(!strict.sun_lit);
    }

    #[test]
    fn test_god_rays_scale_with_intensity() {
        let off = at(0.2, 0.0);
        assert!(!off.god_rays.visible);
        let half = at(0.25, 0.5);
        let full = at(0.25, 1.0);
        assert!((full.god_rays.opacity - 2.0 * half.god_rays.opacity).abs() < 1e-5);
    }

    #[test]
    fn test_band_follows_slider() {
        assert_eq!(at(0.45, 0.0).band, BandKind::Night);
        assert_eq!(at(0.45, 0.0).hemisphere_intensity, 0.15);
    }
}
