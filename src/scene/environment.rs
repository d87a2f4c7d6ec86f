//! Fixed environment dressing: ground plane, a ring of trees, ground cover.

use crate::config::{check_count, check_length};
use crate::error::{Result, SceneError};
use crate::types::{Voxel, VoxelList};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;

/// Dressing parameters. The dressing never depends on the voxel list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    pub seed: u64,
    /// Side length of the square ground plane, in blocks.
    pub ground_size: f32,
    pub tree_count: usize,
    /// Radius of the tree ring around the origin.
    pub tree_radius: f32,
    /// Maximum per-tree deviation from the ring radius.
    pub radial_jitter: f32,
    pub trunk_height_min: i32,
    pub trunk_height_max: i32,
    /// Chance that each candidate canopy cell gets a leaf block.
    pub leaf_probability: f64,
    pub ground_cover_count: usize,
    /// Ground cover stays outside this radius to keep the build area clear.
    pub ground_cover_clearance: f32,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            ground_size: 200.0,
            tree_count: 10,
            tree_radius: 32.0,
            radial_jitter: 6.0,
            trunk_height_min: 4,
            trunk_height_max: 6,
            leaf_probability: 0.75,
            ground_cover_count: 40,
            ground_cover_clearance: 14.0,
        }
    }
}

impl EnvironmentConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_tree_count(mut self, count: usize) -> Self {
        self.tree_count = count;
        self
    }

    pub fn validate(&self) -> Result<()> {
        check_length("environment ground size", self.ground_size)?;
        if self.ground_size < 1.0 {
            return Err(SceneError::Config(format!(
                "environment ground size must be at least 1, got {}",
                self.ground_size
            )));
        }
        check_length("environment tree radius", self.tree_radius)?;
        check_length("environment radial jitter", self.radial_jitter)?;
        check_length("environment ground cover clearance", self.ground_cover_clearance)?;
        check_count("environment tree count", self.tree_count, 1_000)?;
        check_count("environment ground cover count", self.ground_cover_count, 10_000)?;
        if !(1..=64).contains(&self.trunk_height_min) || !(1..=64).contains(&self.trunk_height_max) {
            return Err(SceneError::Config(format!(
                "environment trunk heights must be between 1 and 64, got {}..{}",
                self.trunk_height_min, self.trunk_height_max
            )));
        }
        if !(0.0..=1.0).contains(&self.leaf_probability) {
            return Err(SceneError::Config(format!(
                "environment leaf probability must be between 0 and 1, got {}",
                self.leaf_probability
            )));
        }
        Ok(())
    }
}

/// One decorative tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tree {
    pub x: i32,
    pub z: i32,
    pub trunk_height: i32,
}

/// A small accent cube resting on the ground.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundCover {
    pub x: f32,
    pub z: f32,
    pub block_type: String,
    /// Edge length relative to a full block.
    pub scale: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentDressing {
    pub ground_size: f32,
    pub trees: Vec<Tree>,
    /// Trunk and canopy blocks of every tree.
    pub tree_blocks: VoxelList,
    pub ground_cover: Vec<GroundCover>,
}

const GROUND_COVER_TYPES: &[(&str, f32)] = &[
    ("oak_leaves", 0.6),
    ("red_wool", 0.25),
    ("yellow_wool", 0.25),
    ("mossy_cobblestone", 0.4),
];

impl EnvironmentDressing {
    /// Generate the dressing; identical configs give identical dressings.
    pub fn generate(config: &EnvironmentConfig) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let mut trees = Vec::with_capacity(config.tree_count);
        let mut tree_blocks = VoxelList::new();

        let height_max = config.trunk_height_max.max(config.trunk_height_min);
        for i in 0..config.tree_count {
            let step = TAU / config.tree_count as f32;
            let angle = step * i as f32 + rng.gen_range(-0.25f32..=0.25) * step;
            let radius = config.tree_radius + jitter(&mut rng, config.radial_jitter);
            let tree = Tree {
                x: (angle.cos() * radius).round() as i32,
                z: (angle.sin() * radius).round() as i32,
                trunk_height: rng.gen_range(config.trunk_height_min..=height_max),
            };
            grow_tree(&tree, config.leaf_probability, &mut rng, &mut tree_blocks);
            trees.push(tree);
        }

        let half = config.ground_size * 0.5 - 1.0;
        let clearance = config.ground_cover_clearance.min(half);
        let mut ground_cover = Vec::with_capacity(config.ground_cover_count);
        while ground_cover.len() < config.ground_cover_count {
            let angle = rng.gen_range(0.0..TAU);
            let radius = rng.gen_range(clearance..=half.max(clearance));
            let (block_type, scale) = GROUND_COVER_TYPES[rng.gen_range(0..GROUND_COVER_TYPES.len())];
            ground_cover.push(GroundCover {
                x: angle.cos() * radius,
                z: angle.sin() * radius,
                block_type: block_type.to_string(),
                scale,
            });
        }

        log::debug!(
            "environment: {} tree(s), {} tree block(s), {} ground cover accent(s)",
            trees.len(),
            tree_blocks.len(),
            ground_cover.len()
        );

        Self {
            ground_size: config.ground_size,
            trees,
            tree_blocks,
            ground_cover,
        }
    }
}

fn jitter(rng: &mut ChaCha8Rng, amount: f32) -> f32 {
    if amount > 0.0 {
        rng.gen_range(-amount..=amount)
    } else {
        0.0
    }
}

fn grow_tree(tree: &Tree, leaf_probability: f64, rng: &mut ChaCha8Rng, out: &mut VoxelList) {
    for y in 0..tree.trunk_height {
        out.push(Voxel::new(tree.x, y, tree.z, "oak_log"));
    }

    let top = tree.trunk_height - 1;
    let probability = leaf_probability.clamp(0.0, 1.0);
    for dy in -1..=2 {
        let reach: i32 = if dy >= 1 { 1 } else { 2 };
        for dx in -reach..=reach {
            for dz in -reach..=reach {
                let y = top + dy;
                let in_trunk = dx == 0 && dz == 0 && y <= top;
                let corner = dx.abs() == reach && dz.abs() == reach && reach > 1;
                if in_trunk || corner {
                    continue;
                }
                // The cap above the trunk is always present.
                let cap = dx == 0 && dz == 0 && dy == 1;
                if cap || rng.gen_bool(probability) {
                    out.push(Voxel::new(tree.x + dx, y, tree.z + dz, "oak_leaves"));
                }
            }
        }
    }
}
