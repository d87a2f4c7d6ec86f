//! Per-family procedural texture patterns and the texture cache.

use super::data::{TextureData, TEXTURE_SIZE};
use super::palette::{classify, BlockFamily, BlockStyle, FALLBACK_COLOR};
use crate::types::Direction;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use std::sync::Arc;

/// Which face variant of a block a texture is drawn for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaceKind {
    /// Single texture used on every face.
    All,
    Top,
    Side,
    Bottom,
}

impl FaceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaceKind::All => "all",
            FaceKind::Top => "top",
            FaceKind::Side => "side",
            FaceKind::Bottom => "bottom",
        }
    }

    /// Face variant for a box face of a block in `family`.
    pub fn for_direction(family: BlockFamily, direction: Direction) -> Self {
        if !family.is_multi_face() {
            return FaceKind::All;
        }
        match direction {
            Direction::Up => FaceKind::Top,
            Direction::Down => FaceKind::Bottom,
            _ => FaceKind::Side,
        }
    }
}

impl std::fmt::Display for FaceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Memoised texture storage keyed by `"{block_type}#{face}"`.
#[derive(Debug, Default)]
pub struct TextureCache {
    textures: HashMap<String, Arc<TextureData>>,
    generated: usize,
}

impl TextureCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache key of a (block type, face) pair.
    pub fn key(block_type: &str, face: FaceKind) -> String {
        format!("{}#{}", block_type, face)
    }

    /// Get the texture for a normalized block type and face, generating it once.
    pub fn get(&mut self, block_type: &str, face: FaceKind) -> Arc<TextureData> {
        let key = Self::key(block_type, face);
        if let Some(texture) = self.textures.get(&key) {
            return Arc::clone(texture);
        }

        let style = classify(block_type);
        let mut noise = Noise::for_key(&key);
        let texture = Arc::new(generate(&style, face, &mut noise));

        self.generated += 1;
        self.textures.insert(key, Arc::clone(&texture));
        texture
    }

    /// Look up an already generated texture by key.
    pub fn lookup(&self, key: &str) -> Option<&Arc<TextureData>> {
        self.textures.get(key)
    }

    /// Number of textures synthesized so far (cache misses).
    pub fn generated_count(&self) -> usize {
        self.generated
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }
}

/// Deterministic per-texture noise source.
struct Noise {
    rng: ChaCha8Rng,
}

impl Noise {
    fn for_key(key: &str) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(fnv1a(key)),
        }
    }

    fn jitter(&mut self, variance: i32) -> i32 {
        if variance <= 0 {
            return 0;
        }
        self.rng.gen_range(-variance..=variance)
    }

    fn chance(&mut self, probability: f32) -> bool {
        self.rng.gen::<f32>() < probability
    }
}

/// 64-bit FNV-1a; stable across platforms and compiler versions.
pub(crate) fn fnv1a(text: &str) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    text.bytes()
        .fold(OFFSET, |hash, byte| (hash ^ byte as u64).wrapping_mul(PRIME))
}

fn shade(color: [u8; 3], delta: i32) -> [u8; 4] {
    [
        (color[0] as i32 + delta).clamp(0, 255) as u8,
        (color[1] as i32 + delta).clamp(0, 255) as u8,
        (color[2] as i32 + delta).clamp(0, 255) as u8,
        255,
    ]
}

fn generate(style: &BlockStyle, face: FaceKind, noise: &mut Noise) -> TextureData {
    match style.family {
        BlockFamily::Grass => match face {
            FaceKind::Side => grass_side(style.primary, style.secondary, noise),
            FaceKind::Bottom => dirt(style.secondary, noise),
            FaceKind::Top | FaceKind::All => uniform(style.primary, 14, noise),
        },
        BlockFamily::Log => match face {
            FaceKind::Top | FaceKind::Bottom => log_end(style.primary, style.secondary, noise),
            FaceKind::Side | FaceKind::All => log_side(style.primary, noise),
        },
        BlockFamily::Dirt => dirt(style.primary, noise),
        BlockFamily::Stone => uniform(style.primary, 10, noise),
        BlockFamily::Sand => uniform(style.primary, 7, noise),
        BlockFamily::Water => uniform(style.primary, 6, noise),
        BlockFamily::Solid => uniform(style.primary, 8, noise),
        BlockFamily::Planks => planks(style.primary, noise),
        BlockFamily::Leaves => leaves(style.primary, noise),
        BlockFamily::Brick => brick(style.primary, style.secondary, noise),
        BlockFamily::Cobblestone => cobblestone(style.primary, style.secondary, noise),
        BlockFamily::Glass => glass(style.primary, noise),
        BlockFamily::Ore => ore(style.secondary, style.primary, noise),
        BlockFamily::Unknown => uniform(FALLBACK_COLOR, 12, noise),
    }
}

fn uniform(color: [u8; 3], variance: i32, noise: &mut Noise) -> TextureData {
    let mut tex = TextureData::filled([0, 0, 0, 255]);
    for y in 0..TEXTURE_SIZE {
        for x in 0..TEXTURE_SIZE {
            tex.set_pixel(x, y, shade(color, noise.jitter(variance)));
        }
    }
    tex
}

fn dirt(color: [u8; 3], noise: &mut Noise) -> TextureData {
    let mut tex = uniform(color, 8, noise);
    for y in 0..TEXTURE_SIZE {
        for x in 0..TEXTURE_SIZE {
            // Darker clumps on a coarse diagonal lattice.
            if ((x / 2) + (y / 2)) % 3 == 0 && noise.chance(0.5) {
                tex.set_pixel(x, y, shade(color, -22 + noise.jitter(4)));
            }
        }
    }
    tex
}

fn grass_side(grass: [u8; 3], soil: [u8; 3], noise: &mut Noise) -> TextureData {
    let mut tex = dirt(soil, noise);
    for x in 0..TEXTURE_SIZE {
        // Fringe depth 3..=5 drips unevenly down each column.
        let depth = 3 + noise.rng.gen_range(0..=2);
        for y in 0..depth {
            tex.set_pixel(x, y, shade(grass, noise.jitter(12)));
        }
    }
    tex
}

fn planks(color: [u8; 3], noise: &mut Noise) -> TextureData {
    let mut tex = TextureData::filled([0, 0, 0, 255]);
    let board = TEXTURE_SIZE / 4;

    for y in 0..TEXTURE_SIZE {
        let row = y / board;
        for x in 0..TEXTURE_SIZE {
            let pixel = if y % board == board - 1 {
                shade(color, -45)
            } else {
                let grain = if (x + row * 5) % 7 == 0 { -10 } else { 0 };
                shade(color, grain + noise.jitter(6))
            };
            tex.set_pixel(x, y, pixel);
        }

        // Nail holes near alternating board ends.
        if y % board == 1 {
            let nail_x = if row % 2 == 0 { 1 } else { TEXTURE_SIZE - 2 };
            tex.set_pixel(nail_x, y, shade(color, -70));
        }
    }
    tex
}

fn log_side(bark: [u8; 3], noise: &mut Noise) -> TextureData {
    let mut tex = TextureData::filled([0, 0, 0, 255]);
    let streaks: Vec<i32> = (0..TEXTURE_SIZE)
        .map(|_| if noise.chance(0.35) { -24 } else { 0 })
        .collect();

    for y in 0..TEXTURE_SIZE {
        for x in 0..TEXTURE_SIZE {
            let delta = streaks[x as usize] + noise.jitter(7);
            tex.set_pixel(x, y, shade(bark, delta));
        }
    }
    tex
}

fn log_end(bark: [u8; 3], ring: [u8; 3], noise: &mut Noise) -> TextureData {
    let mut tex = TextureData::filled([0, 0, 0, 255]);
    let center = (TEXTURE_SIZE as f32 - 1.0) / 2.0;

    for y in 0..TEXTURE_SIZE {
        for x in 0..TEXTURE_SIZE {
            let dx = x as f32 - center;
            let dy = y as f32 - center;
            let distance = (dx * dx + dy * dy).sqrt();

            let pixel = if distance > center - 0.5 {
                shade(bark, noise.jitter(6))
            } else if (distance as u32) % 2 == 0 {
                shade(ring, -20 + noise.jitter(4))
            } else {
                shade(ring, noise.jitter(4))
            };
            tex.set_pixel(x, y, pixel);
        }
    }
    tex
}

fn leaves(color: [u8; 3], noise: &mut Noise) -> TextureData {
    let mut tex = TextureData::filled([0, 0, 0, 255]);
    for y in 0..TEXTURE_SIZE {
        for x in 0..TEXTURE_SIZE {
            let pixel = if noise.chance(0.12) {
                [0, 0, 0, 0]
            } else {
                shade(color, noise.jitter(32))
            };
            tex.set_pixel(x, y, pixel);
        }
    }
    tex
}

fn brick(brick: [u8; 3], mortar: [u8; 3], noise: &mut Noise) -> TextureData {
    let mut tex = TextureData::filled([0, 0, 0, 255]);
    for y in 0..TEXTURE_SIZE {
        let offset = if (y / 4) % 2 == 0 { 0 } else { 4 };
        for x in 0..TEXTURE_SIZE {
            let is_mortar = y % 4 == 3 || (x + offset) % 8 == 0;
            let pixel = if is_mortar {
                shade(mortar, noise.jitter(4))
            } else {
                shade(brick, noise.jitter(10))
            };
            tex.set_pixel(x, y, pixel);
        }
    }
    tex
}

fn cobblestone(stone: [u8; 3], accent: [u8; 3], noise: &mut Noise) -> TextureData {
    const CELL: u32 = 4;
    let cells = (TEXTURE_SIZE / CELL) as usize;
    let mut tex = TextureData::filled([0, 0, 0, 255]);

    // One shade per stone, so each block reads as a single stroke.
    let mut cell_shades = vec![0i32; cells * (cells + 1)];
    for value in cell_shades.iter_mut() {
        *value = noise.jitter(22);
    }
    let mossy = accent != stone;

    for y in 0..TEXTURE_SIZE {
        let row = y / CELL;
        let offset = if row % 2 == 0 { 0 } else { CELL / 2 };
        for x in 0..TEXTURE_SIZE {
            let col = (x + offset) / CELL;
            let is_stroke = (x + offset) % CELL == 0 || y % CELL == 0;

            let pixel = if is_stroke {
                shade(stone, -48 + noise.jitter(6))
            } else if mossy && noise.chance(0.25) {
                shade(accent, noise.jitter(10))
            } else {
                let idx = row as usize * (cells + 1) + col as usize;
                shade(stone, cell_shades[idx] + noise.jitter(5))
            };
            tex.set_pixel(x, y, pixel);
        }
    }
    tex
}

fn glass(tint: [u8; 3], noise: &mut Noise) -> TextureData {
    let mut tex = TextureData::filled([0, 0, 0, 0]);
    let last = TEXTURE_SIZE - 1;

    for y in 0..TEXTURE_SIZE {
        for x in 0..TEXTURE_SIZE {
            let border = x == 0 || y == 0 || x == last || y == last;
            let highlight = (x + y == 5 || x + y == 7) && x > 1 && y > 1 && noise.chance(0.8);

            let pixel = if border {
                let [r, g, b, _] = shade(tint, 20);
                [r, g, b, 230]
            } else if highlight {
                [250, 255, 255, 200]
            } else {
                let [r, g, b, _] = shade(tint, noise.jitter(3));
                [r, g, b, 50]
            };
            tex.set_pixel(x, y, pixel);
        }
    }
    tex
}

fn ore(host: [u8; 3], fleck: [u8; 3], noise: &mut Noise) -> TextureData {
    let mut tex = uniform(host, 10, noise);
    for y in 1..TEXTURE_SIZE - 1 {
        for x in 1..TEXTURE_SIZE - 1 {
            if noise.chance(0.1) {
                tex.set_pixel(x, y, shade(fleck, 30));
                tex.set_pixel(x + 1, y + 1, shade(fleck, -15));
            }
        }
    }
    tex
}

#[cfg(test)]
mod tests {
    use super::*;

    fn distinct_colors(tex: &TextureData) -> usize {
        let mut colors: Vec<[u8; 4]> = tex.pixels.chunks(4).map(|p| [p[0], p[1], p[2], p[3]]).collect();
        colors.sort();
        colors.dedup();
        colors.len()
    }

    #[test]
    fn test_textures_are_block_sized() {
        let mut cache = TextureCache::new();
        for block in ["stone", "oak_planks", "grass_block", "oak_log", "glass", "bricks", "cobblestone", "oak_leaves", "zzz"] {
            let tex = cache.get(block, FaceKind::All);
            assert_eq!(tex.width, TEXTURE_SIZE);
            assert_eq!(tex.height, TEXTURE_SIZE);
            assert_eq!(tex.pixels.len(), (TEXTURE_SIZE * TEXTURE_SIZE * 4) as usize);
        }
    }

    #[test]
    fn test_cache_returns_same_handle() {
        let mut cache = TextureCache::new();
        let a = cache.get("stone", FaceKind::All);
        let b = cache.get("stone", FaceKind::All);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.generated_count(), 1);

        let top = cache.get("grass_block", FaceKind::Top);
        let side = cache.get("grass_block", FaceKind::Side);
        assert!(!Arc::ptr_eq(&top, &side));
        assert_eq!(cache.generated_count(), 3);
        assert!(cache.lookup("grass_block#top").is_some());
    }

    #[test]
    fn test_generation_is_deterministic() {
        let mut first = TextureCache::new();
        let mut second = TextureCache::new();
        assert_eq!(
            *first.get("mossy_cobblestone", FaceKind::All),
            *second.get("mossy_cobblestone", FaceKind::All)
        );
    }

    #[test]
    fn test_uniform_noise_varies() {
        let mut cache = TextureCache::new();
        assert!(distinct_colors(&cache.get("stone", FaceKind::All)) > 4);
    }

    #[test]
    fn test_unknown_is_noisy_magenta() {
        let mut cache = TextureCache::new();
        let tex = cache.get("mystery_block", FaceKind::All);
        let [r, g, b, a] = tex.get_pixel(3, 3);
        assert!(r > 230 && g < 25 && b > 230);
        assert_eq!(a, 255);
        assert!(distinct_colors(&tex) > 1);
    }

    #[test]
    fn test_transparency_only_for_glass_and_leaves() {
        let mut cache = TextureCache::new();
        assert!(cache.get("glass", FaceKind::All).has_transparency());
        assert!(cache.get("oak_leaves", FaceKind::All).has_transparency());
        assert!(!cache.get("stone", FaceKind::All).has_transparency());
        assert!(!cache.get("water", FaceKind::All).has_transparency());
        assert!(!cache.get("grass_block", FaceKind::Side).has_transparency());
    }

    #[test]
    fn test_grass_faces_differ() {
        let mut cache = TextureCache::new();
        let top = cache.get("grass_block", FaceKind::Top);
        let side = cache.get("grass_block", FaceKind::Side);
        let bottom = cache.get("grass_block", FaceKind::Bottom);

        // Side has a green fringe over dirt.
        let [r, g, _, _] = side.get_pixel(8, 0);
        assert!(g > r);
        let [r, g, _, _] = side.get_pixel(8, 15);
        assert!(r > g);

        // Top is green, bottom is dirt.
        let [r, g, _, _] = top.get_pixel(8, 8);
        assert!(g > r);
        let [r, g, _, _] = bottom.get_pixel(8, 8);
        assert!(r > g);
    }

    #[test]
    fn test_plank_seams_are_darker() {
        let mut cache = TextureCache::new();
        let tex = cache.get("oak_planks", FaceKind::All);
        let seam = tex.get_pixel(5, 3);
        let board = tex.get_pixel(5, 2);
        assert!(seam[0] < board[0]);
    }

    #[test]
    fn test_log_end_has_bark_rim() {
        let mut cache = TextureCache::new();
        let end = cache.get("oak_log", FaceKind::Top);
        let rim = end.get_pixel(0, 0);
        let core = end.get_pixel(8, 8);
        // Oak bark is darker than the oak ring wood.
        assert!(rim[0] < core[0]);
    }

    #[test]
    fn test_for_direction() {
        assert_eq!(FaceKind::for_direction(BlockFamily::Grass, Direction::Up), FaceKind::Top);
        assert_eq!(FaceKind::for_direction(BlockFamily::Log, Direction::Down), FaceKind::Bottom);
        assert_eq!(FaceKind::for_direction(BlockFamily::Log, Direction::North), FaceKind::Side);
        assert_eq!(FaceKind::for_direction(BlockFamily::Stone, Direction::Up), FaceKind::All);
    }

    #[test]
    fn test_fnv1a_known_value() {
        assert_eq!(fnv1a(""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a("a"), 0xaf63_dc4c_8601_ec8c);
    }
}
