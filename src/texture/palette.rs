//! Block families and their base colours.
//!
//! The palette is documented but not enforced: any token classifies to
//! something, and tokens nothing recognises get the loud fallback colour.

/// Colour for unrecognised block types (visually loud on purpose).
pub const FALLBACK_COLOR: [u8; 3] = [255, 0, 255];

/// Pattern family of a block type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockFamily {
    /// Grassy top, dirt side with fringe, dirt bottom.
    Grass,
    Dirt,
    Stone,
    /// Horizontal plank seams with nail holes.
    Planks,
    /// Bark streaks on the sides, rings on top and bottom.
    Log,
    Leaves,
    Sand,
    Water,
    /// Staggered bricks with mortar lines.
    Brick,
    Cobblestone,
    Glass,
    /// Stone base with mineral flecks.
    Ore,
    /// Uniform noise over a fixed colour (wool, concrete, mineral blocks, ...).
    Solid,
    Unknown,
}

impl BlockFamily {
    /// Whether top, side and bottom faces get distinct textures.
    pub fn is_multi_face(&self) -> bool {
        matches!(self, BlockFamily::Grass | BlockFamily::Log)
    }

    /// Whether the material needs blending / alpha cut-outs.
    pub fn is_transparent(&self) -> bool {
        matches!(self, BlockFamily::Glass | BlockFamily::Leaves)
    }
}

/// Resolved appearance of a block type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockStyle {
    pub family: BlockFamily,
    /// Main colour.
    pub primary: [u8; 3],
    /// Secondary colour: mortar, log rings, grass side dirt, ore host rock.
    pub secondary: [u8; 3],
}

impl BlockStyle {
    fn new(family: BlockFamily, primary: [u8; 3], secondary: [u8; 3]) -> Self {
        Self {
            family,
            primary,
            secondary,
        }
    }

    fn solid(family: BlockFamily, color: [u8; 3]) -> Self {
        Self::new(family, color, color)
    }
}

const DIRT: [u8; 3] = [134, 96, 67];
const GRASS_TOP: [u8; 3] = [95, 159, 53];
const STONE: [u8; 3] = [125, 125, 125];

const WOOD_SPECIES: &[&str] = &[
    "oak", "spruce", "birch", "jungle", "acacia", "dark_oak", "mangrove", "cherry", "crimson",
    "warped",
];

const SHAPE_SUFFIXES: &[&str] = &["_stairs", "_slab", "_wall", "_fence", "_fence_gate", "_door", "_trapdoor"];

/// Classify a normalized block type into its family and colours.
pub fn classify(block_type: &str) -> BlockStyle {
    let base = strip_shape_suffix(block_type);

    if WOOD_SPECIES.contains(&base) {
        return planks(base);
    }

    if let Some(style) = classify_exact(base) {
        return style;
    }

    if let Some(style) = classify_colored(base) {
        return style;
    }

    if let Some(species) = base.strip_suffix("_planks") {
        return planks(species);
    }
    if let Some(species) = base
        .strip_suffix("_log")
        .or_else(|| base.strip_suffix("_wood"))
        .or_else(|| base.strip_suffix("_stem"))
    {
        return log(species);
    }
    if let Some(species) = base.strip_suffix("_leaves") {
        return leaves(species);
    }
    if let Some(mineral) = base.strip_suffix("_ore") {
        return ore(mineral.strip_prefix("deepslate_").unwrap_or(mineral));
    }
    if let Some(mineral) = base.strip_suffix("_block") {
        if let Some(color) = mineral_color(mineral) {
            return BlockStyle::solid(BlockFamily::Solid, color);
        }
    }

    // Loose families by keyword, most specific first.
    if base.contains("glass") {
        return BlockStyle::solid(BlockFamily::Glass, [200, 230, 240]);
    }
    if base.contains("brick") {
        return BlockStyle::new(BlockFamily::Brick, [150, 75, 60], [190, 180, 170]);
    }
    if base.contains("cobble") {
        return BlockStyle::solid(BlockFamily::Cobblestone, [127, 127, 127]);
    }
    if base.contains("plank") {
        return planks("oak");
    }
    if base.contains("log") {
        return log("oak");
    }
    if base.contains("leaves") || base.contains("leaf") {
        return leaves("oak");
    }
    if base.contains("stone") {
        return BlockStyle::solid(BlockFamily::Stone, STONE);
    }

    BlockStyle::solid(BlockFamily::Unknown, FALLBACK_COLOR)
}

fn strip_shape_suffix(block_type: &str) -> &str {
    SHAPE_SUFFIXES
        .iter()
        .find_map(|suffix| block_type.strip_suffix(suffix))
        .unwrap_or(block_type)
}

fn classify_exact(base: &str) -> Option<BlockStyle> {
    let style = match base {
        "grass" | "grass_block" => BlockStyle::new(BlockFamily::Grass, GRASS_TOP, DIRT),
        "dirt" | "dirt_path" | "farmland" => BlockStyle::solid(BlockFamily::Dirt, DIRT),
        "coarse_dirt" | "rooted_dirt" => BlockStyle::solid(BlockFamily::Dirt, [119, 85, 59]),
        "podzol" => BlockStyle::solid(BlockFamily::Dirt, [91, 63, 24]),
        "mud" => BlockStyle::solid(BlockFamily::Dirt, [60, 57, 60]),
        "stone" => BlockStyle::solid(BlockFamily::Stone, STONE),
        "smooth_stone" => BlockStyle::solid(BlockFamily::Stone, [158, 158, 158]),
        "andesite" | "polished_andesite" => BlockStyle::solid(BlockFamily::Stone, [136, 136, 137]),
        "diorite" | "polished_diorite" => BlockStyle::solid(BlockFamily::Stone, [188, 188, 188]),
        "granite" | "polished_granite" => BlockStyle::solid(BlockFamily::Stone, [149, 103, 85]),
        "deepslate" | "polished_deepslate" => BlockStyle::solid(BlockFamily::Stone, [80, 80, 82]),
        "gravel" => BlockStyle::solid(BlockFamily::Stone, [130, 125, 122]),
        "planks" | "wood" | "wooden_planks" => planks("oak"),
        "log" => log("oak"),
        "leaves" => leaves("oak"),
        "sand" => BlockStyle::solid(BlockFamily::Sand, [219, 207, 163]),
        "red_sand" => BlockStyle::solid(BlockFamily::Sand, [190, 102, 33]),
        "sandstone" | "smooth_sandstone" | "cut_sandstone" => {
            BlockStyle::solid(BlockFamily::Sand, [216, 203, 155])
        }
        "water" => BlockStyle::solid(BlockFamily::Water, [63, 118, 228]),
        "brick" | "bricks" => BlockStyle::new(BlockFamily::Brick, [150, 75, 60], [190, 180, 170]),
        "stone_brick" | "stone_bricks" => {
            BlockStyle::new(BlockFamily::Brick, [122, 121, 122], [88, 88, 88])
        }
        "mossy_stone_bricks" => BlockStyle::new(BlockFamily::Brick, [110, 120, 95], [80, 85, 70]),
        "nether_bricks" | "nether_brick" => {
            BlockStyle::new(BlockFamily::Brick, [45, 22, 26], [25, 12, 14])
        }
        "end_stone_bricks" => BlockStyle::new(BlockFamily::Brick, [218, 224, 162], [170, 172, 120]),
        "cobblestone" => BlockStyle::solid(BlockFamily::Cobblestone, [127, 127, 127]),
        "mossy_cobblestone" => BlockStyle::new(BlockFamily::Cobblestone, [115, 121, 105], [90, 110, 60]),
        "glass" | "glass_pane" => BlockStyle::solid(BlockFamily::Glass, [200, 230, 240]),
        "bedrock" => BlockStyle::solid(BlockFamily::Solid, [85, 85, 85]),
        "obsidian" => BlockStyle::solid(BlockFamily::Solid, [20, 18, 30]),
        "glowstone" => BlockStyle::solid(BlockFamily::Solid, [250, 210, 120]),
        "snow" | "snow_block" => BlockStyle::solid(BlockFamily::Solid, [250, 250, 250]),
        "ice" | "packed_ice" => BlockStyle::solid(BlockFamily::Solid, [145, 185, 250]),
        "netherrack" => BlockStyle::solid(BlockFamily::Solid, [110, 54, 52]),
        "quartz" | "quartz_block" => BlockStyle::solid(BlockFamily::Solid, [235, 229, 222]),
        "clay" => BlockStyle::solid(BlockFamily::Solid, [160, 166, 179]),
        "end_stone" => BlockStyle::solid(BlockFamily::Solid, [220, 222, 158]),
        "pumpkin" => BlockStyle::solid(BlockFamily::Solid, [198, 118, 24]),
        "melon" => BlockStyle::solid(BlockFamily::Solid, [111, 145, 30]),
        "hay_block" => BlockStyle::solid(BlockFamily::Solid, [166, 135, 20]),
        "tnt" => BlockStyle::solid(BlockFamily::Solid, [200, 60, 40]),
        "bookshelf" => planks("oak"),
        "crafting_table" => planks("spruce"),
        "lava" => BlockStyle::solid(BlockFamily::Solid, [230, 100, 20]),
        "sea_lantern" => BlockStyle::solid(BlockFamily::Solid, [172, 200, 190]),
        _ => return None,
    };
    Some(style)
}

/// Colour-keyed families such as `red_wool`, `wool_red`, `blue_concrete`.
fn classify_colored(base: &str) -> Option<BlockStyle> {
    const COLORED: &[&str] = &[
        "wool",
        "concrete",
        "concrete_powder",
        "terracotta",
        "glazed_terracotta",
        "carpet",
        "stained_glass",
        "stained_glass_pane",
    ];

    for kind in COLORED {
        let color_token = base
            .strip_suffix(kind)
            .and_then(|rest| rest.strip_suffix('_'))
            .or_else(|| base.strip_prefix(kind).and_then(|rest| rest.strip_prefix('_')));

        let Some(color) = color_token.and_then(dye_color) else {
            continue;
        };

        let style = match *kind {
            "stained_glass" | "stained_glass_pane" => BlockStyle::solid(BlockFamily::Glass, color),
            "terracotta" | "glazed_terracotta" => BlockStyle::solid(BlockFamily::Solid, scale(color, 0.75)),
            _ => BlockStyle::solid(BlockFamily::Solid, color),
        };
        return Some(style);
    }

    // Bare `terracotta` / `wool` without a colour token.
    match base {
        "wool" => Some(BlockStyle::solid(BlockFamily::Solid, [234, 236, 237])),
        "terracotta" => Some(BlockStyle::solid(BlockFamily::Solid, [152, 94, 67])),
        _ => None,
    }
}

/// The sixteen dye colours.
fn dye_color(token: &str) -> Option<[u8; 3]> {
    let color = match token {
        "white" => [234, 236, 237],
        "orange" => [240, 118, 19],
        "magenta" => [189, 68, 179],
        "light_blue" => [58, 175, 217],
        "yellow" => [248, 198, 39],
        "lime" => [112, 185, 25],
        "pink" => [237, 141, 172],
        "gray" | "grey" => [62, 68, 71],
        "light_gray" | "light_grey" | "silver" => [142, 142, 134],
        "cyan" => [21, 137, 145],
        "purple" => [121, 42, 172],
        "blue" => [53, 57, 157],
        "brown" => [114, 71, 40],
        "green" => [84, 109, 27],
        "red" => [160, 39, 34],
        "black" => [20, 21, 25],
        _ => return None,
    };
    Some(color)
}

fn mineral_color(mineral: &str) -> Option<[u8; 3]> {
    let color = match mineral {
        "gold" => [249, 212, 61],
        "iron" => [220, 220, 220],
        "diamond" => [98, 237, 228],
        "emerald" => [42, 203, 88],
        "lapis" => [31, 67, 140],
        "redstone" => [175, 24, 5],
        "coal" => [16, 16, 16],
        "copper" => [192, 107, 79],
        "netherite" => [66, 61, 63],
        "amethyst" => [133, 97, 191],
        "quartz" => [235, 229, 222],
        "snow" => [250, 250, 250],
        "hay" => [166, 135, 20],
        "slime" => [111, 192, 91],
        "honey" => [251, 185, 52],
        _ => return None,
    };
    Some(color)
}

fn ore(mineral: &str) -> BlockStyle {
    let fleck = match mineral {
        "coal" => [30, 30, 30],
        "iron" => [216, 175, 147],
        "gold" => [252, 238, 75],
        "diamond" => [93, 236, 245],
        "emerald" => [23, 221, 98],
        "redstone" => [255, 0, 0],
        "lapis" => [30, 60, 180],
        "copper" => [224, 128, 90],
        _ => [200, 200, 200],
    };
    BlockStyle::new(BlockFamily::Ore, fleck, STONE)
}

fn planks(species: &str) -> BlockStyle {
    let color = match species {
        "spruce" => [115, 85, 50],
        "birch" => [216, 200, 150],
        "jungle" => [170, 120, 85],
        "acacia" => [170, 90, 50],
        "dark_oak" => [70, 45, 22],
        "mangrove" => [118, 54, 48],
        "cherry" => [226, 178, 172],
        "crimson" => [101, 48, 70],
        "warped" => [43, 104, 99],
        _ => [180, 130, 80],
    };
    BlockStyle::solid(BlockFamily::Planks, color)
}

fn log(species: &str) -> BlockStyle {
    let bark = match species {
        "spruce" => [60, 40, 25],
        "birch" => [216, 215, 210],
        "jungle" => [90, 70, 30],
        "acacia" => [100, 95, 85],
        "dark_oak" => [60, 45, 25],
        "mangrove" => [84, 67, 41],
        "cherry" => [54, 33, 44],
        "crimson" => [92, 25, 29],
        "warped" => [58, 58, 77],
        _ => [110, 85, 50],
    };
    BlockStyle::new(BlockFamily::Log, bark, planks(species).primary)
}

fn leaves(species: &str) -> BlockStyle {
    let color = match species {
        "spruce" => [50, 90, 50],
        "birch" => [100, 150, 60],
        "jungle" => [50, 160, 40],
        "acacia" => [70, 130, 40],
        "dark_oak" => [40, 110, 30],
        "cherry" => [240, 170, 200],
        "azalea" | "flowering_azalea" => [90, 130, 50],
        _ => [60, 140, 50],
    };
    BlockStyle::solid(BlockFamily::Leaves, color)
}

fn scale(color: [u8; 3], factor: f32) -> [u8; 3] {
    color.map(|c| (c as f32 * factor).round().clamp(0.0, 255.0) as u8)
}
