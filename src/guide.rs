//! Build guide: material totals and per-layer counts derived from voxels.

use crate::document::escape_html;
use crate::types::VoxelList;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;

/// Block counts for one Y level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Layer {
    /// 1-based position in ascending Y order.
    pub number: usize,
    pub y: i32,
    pub counts: BTreeMap<String, usize>,
}

/// Aggregates over one finished voxel list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildGuide {
    pub totals: BTreeMap<String, usize>,
    /// Only Y levels that contain blocks, ascending.
    pub layers: Vec<Layer>,
}

impl BuildGuide {
    pub fn from_voxels(voxels: &VoxelList) -> Self {
        let mut totals = BTreeMap::new();
        let mut by_y: BTreeMap<i32, BTreeMap<String, usize>> = BTreeMap::new();

        for voxel in voxels {
            *totals.entry(voxel.block_type.clone()).or_insert(0) += 1;
            *by_y
                .entry(voxel.y)
                .or_default()
                .entry(voxel.block_type.clone())
                .or_insert(0) += 1;
        }

        let layers = by_y
            .into_iter()
            .enumerate()
            .map(|(i, (y, counts))| Layer {
                number: i + 1,
                y,
                counts,
            })
            .collect();

        Self { totals, layers }
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    pub fn total_blocks(&self) -> usize {
        self.totals.values().sum()
    }

    /// Render the panel body: a total materials list followed by one group
    /// per layer. An empty guide renders nothing.
    pub fn to_html(&self) -> String {
        if self.is_empty() {
            return String::new();
        }

        let mut html = String::new();
        html.push_str("<h3>Total materials</h3>\n<ul class=\"guide-totals\">\n");
        write_counts(&mut html, &self.totals);
        html.push_str("</ul>\n<h3>Layer guide</h3>\n");

        for layer in &self.layers {
            let _ = writeln!(
                html,
                "<section class=\"guide-layer\" data-y=\"{}\">\n<h4>Layer {} (Y = {})</h4>\n<ul>",
                layer.y, layer.number, layer.y
            );
            write_counts(&mut html, &layer.counts);
            html.push_str("</ul>\n</section>\n");
        }
        html
    }
}

fn write_counts(html: &mut String, counts: &BTreeMap<String, usize>) {
    for (block_type, count) in counts {
        let _ = writeln!(
            html,
            "<li><span class=\"guide-type\">{}</span> <span class=\"guide-count\">&times; {}</span></li>",
            escape_html(&display_name(block_type)),
            count
        );
    }
}

/// `oak_planks` -> `Oak Planks`.
pub fn display_name(block_type: &str) -> String {
    block_type
        .split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Voxel;

    fn sample() -> VoxelList {
        VoxelList::from(vec![
            Voxel::new(0, 0, 0, "stone"),
            Voxel::new(1, 0, 0, "stone"),
            Voxel::new(0, 1, 0, "dirt"),
        ])
    }

    #[test]
    fn test_totals_and_layers() {
        let guide = BuildGuide::from_voxels(&sample());
        assert_eq!(guide.totals.get("stone"), Some(&2));
        assert_eq!(guide.totals.get("dirt"), Some(&1));
        assert_eq!(guide.layers.len(), 2);

        assert_eq!((guide.layers[0].number, guide.layers[0].y), (1, 0));
        assert_eq!(guide.layers[0].counts.get("stone"), Some(&2));
        assert_eq!(guide.layers[0].counts.len(), 1);

        assert_eq!((guide.layers[1].number, guide.layers[1].y), (2, 1));
        assert_eq!(guide.layers[1].counts.get("dirt"), Some(&1));
        assert_eq!(guide.layers[1].counts.len(), 1);
    }

    #[test]
    fn test_layers_skip_missing_y_and_start_at_minimum() {
        let voxels = VoxelList::from(vec![
            Voxel::new(0, 5, 0, "glass"),
            Voxel::new(0, -3, 0, "bedrock"),
            Voxel::new(0, 5, 1, "glass"),
        ]);
        let guide = BuildGuide::from_voxels(&voxels);
        let ys: Vec<i32> = guide.layers.iter().map(|l| l.y).collect();
        assert_eq!(ys, vec![-3, 5]);
        assert_eq!(guide.layers[1].number, 2);
        assert_eq!(guide.total_blocks(), 3);
    }

    #[test]
    fn test_duplicates_are_counted() {
        let voxels = VoxelList::from(vec![
            Voxel::new(0, 0, 0, "stone"),
            Voxel::new(0, 0, 0, "stone"),
        ]);
        assert_eq!(BuildGuide::from_voxels(&voxels).totals.get("stone"), Some(&2));
    }

    #[test]
    fn test_empty_guide() {
        let guide = BuildGuide::from_voxels(&VoxelList::new());
        assert!(guide.is_empty());
        assert!(guide.layers.is_empty());
        assert_eq!(guide.to_html(), "");
    }

    #[test]
    fn test_html_lists() {
        let html = BuildGuide::from_voxels(&sample()).to_html();
        assert!(html.contains("Total materials"));
        assert!(html.contains("Layer guide"));
        assert!(html.contains("Layer 1 (Y = 0)"));
        assert!(html.contains("Layer 2 (Y = 1)"));
        assert!(html.contains("Stone</span> <span class=\"guide-count\">&times; 2"));
        assert!(html.find("Layer 1").unwrap() < html.find("Layer 2").unwrap());
    }

    #[test]
    fn test_html_is_escaped() {
        let voxels = VoxelList::from(vec![Voxel::new(0, 0, 0, "<script>alert(1)</script>")]);
        let html = BuildGuide::from_voxels(&voxels).to_html();
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("oak_planks"), "Oak Planks");
        assert_eq!(display_name("stone"), "Stone");
        assert_eq!(display_name("a__b"), "A B");
    }
}
