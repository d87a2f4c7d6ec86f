//! Discrete sky and fog colour bands over the time-of-day slider.

use serde::Serialize;

/// An HSL colour with all components in `[0, 1]` (three.js `setHSL` order).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Hsl {
    pub h: f32,
    pub s: f32,
    pub l: f32,
}

const fn hsl(h: f32, s: f32, l: f32) -> Hsl {
    Hsl { h, s, l }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BandKind {
    Dawn,
    Day,
    Sunset,
    Night,
    Sunrise,
}

/// One band; `start` is inclusive, `end` exclusive except for the last band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkyBand {
    pub kind: BandKind,
    pub start: f32,
    pub end: f32,
    pub sky: Hsl,
    pub fog: Hsl,
    pub hemisphere_intensity: f32,
}

pub const SKY_BANDS: [SkyBand; 5] = [
    SkyBand {
        kind: BandKind::Dawn,
        start: 0.0,
        end: 0.10,
        sky: hsl(0.07, 0.60, 0.66),
        fog: hsl(0.07, 0.45, 0.72),
        hemisphere_intensity: 0.45,
    },
    SkyBand {
        kind: BandKind::Day,
        start: 0.10,
        end: 0.30,
        sky: hsl(0.57, 0.65, 0.70),
        fog: hsl(0.57, 0.45, 0.80),
        hemisphere_intensity: 0.60,
    },
    SkyBand {
        kind: BandKind::Sunset,
        start: 0.30,
        end: 0.40,
        sky: hsl(0.04, 0.70, 0.55),
        fog: hsl(0.05, 0.55, 0.60),
        hemisphere_intensity: 0.40,
    },
    SkyBand {
        kind: BandKind::Night,
        start: 0.40,
        end: 0.85,
        sky: hsl(0.64, 0.50, 0.08),
        fog: hsl(0.64, 0.40, 0.10),
        hemisphere_intensity: 0.15,
    },
    SkyBand {
        kind: BandKind::Sunrise,
        start: 0.85,
        end: 1.0,
        sky: hsl(0.10, 0.60, 0.60),
        fog: hsl(0.10, 0.50, 0.66),
        hemisphere_intensity: 0.40,
    },
];

/// The band containing a (clamped) slider value.
pub fn band_for(sunlight: f32) -> &'static SkyBand {
    let t = if sunlight.is_nan() { 0.0 } else { sunlight.clamp(0.0, 1.0) };
    SKY_BANDS
        .iter()
        .find(|band| t < band.end)
        .unwrap_or(&SKY_BANDS[SKY_BANDS.len() - 1])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_documented_points() {
        assert_eq!(band_for(0.0).kind, BandKind::Dawn);
        assert_eq!(band_for(0.45).kind, BandKind::Night);
        assert_eq!(band_for(0.2).kind, BandKind::Day);
        assert_eq!(band_for(0.35).kind, BandKind::Sunset);
        assert_eq!(band_for(0.9).kind, BandKind::Sunrise);
        assert_eq!(band_for(1.0).kind, BandKind::Sunrise);
    }

    #[test]
    fn test_lower_bounds_are_inclusive() {
        for band in &SKY_BANDS {
            assert_eq!(band_for(band.start).kind, band.kind);
        }
    }

    #[test]
    fn test_bands_tile_the_unit_interval() {
        assert_eq!(SKY_BANDS[0].start, 0.0);
        assert_eq!(SKY_BANDS[SKY_BANDS.len() - 1].end, 1.0);
        for pair in SKY_BANDS.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn test_out_of_range_is_clamped() {
        assert_eq!(band_for(-3.0).kind, BandKind::Dawn);
        assert_eq!(band_for(7.0).kind, BandKind::Sunrise);
        assert_eq!(band_for(f32::NAN).kind, BandKind::Dawn);
    }
}
