// arrange.rs — spatial placement of input maps on a padded 3D grid

use crate::error::MergeError;
use hlmerge_bsp::Map;
use hlmerge_common::{vector_subtract, Bounds, Vec3};
use tracing::{debug, info};

/// Ephemeral placement descriptor for one input map. Lives only for the
/// duration of a merge call.
#[derive(Debug, Clone)]
pub struct MapBlock {
    /// untranslated bounds as loaded
    pub bounds: Bounds,
    pub size: Vec3,
    /// translation this map must receive before merging
    pub offset: Vec3,
    /// index into the input map list
    pub slot: usize,
    /// unique name this map goes by inside the merged series
    pub merge_name: String,
}

impl MapBlock {
    pub fn placed_bounds(&self) -> Bounds {
        self.bounds.translate(&self.offset)
    }

    pub fn intersects(&self, other: &MapBlock) -> bool {
        self.placed_bounds().intersects(&other.placed_bounds())
    }
}

/// Lay the maps out on a grid (columns along X, rows along Y, layers
/// along Z) with `gap` padding between neighbors. The first map never
/// moves; with `nomove` nothing moves and overlaps become errors.
pub fn arrange_maps(maps: &[Map], gap: &Vec3, nomove: bool) -> Result<Vec<MapBlock>, MergeError> {
    if maps.len() < 2 {
        return Err(MergeError::TooFewMaps);
    }

    let mut blocks: Vec<MapBlock> = maps
        .iter()
        .enumerate()
        .map(|(slot, map)| {
            let bounds = map.bounding_box();
            MapBlock {
                bounds,
                size: bounds.size(),
                offset: [0.0; 3],
                slot,
                merge_name: map.name.clone(),
            }
        })
        .collect();
    assign_unique_merge_names(&mut blocks);

    if !nomove {
        place_on_grid(&mut blocks, gap);
    }

    // Overlap check runs either way: forced nomove is the usual offender.
    for i in 0..blocks.len() {
        for j in i + 1..blocks.len() {
            if blocks[i].intersects(&blocks[j]) {
                let (move_fixes, move_fixes2) =
                    suggest_intersection_fix(&blocks[i].placed_bounds(), &blocks[j].placed_bounds());
                return Err(MergeError::Collision {
                    first: blocks[i].merge_name.clone(),
                    second: blocks[j].merge_name.clone(),
                    move_fixes,
                    move_fixes2,
                });
            }
        }
    }

    info!(maps = blocks.len(), nomove, "arranged maps");
    Ok(blocks)
}

fn place_on_grid(blocks: &mut [MapBlock], gap: &Vec3) {
    let n = blocks.len();
    // cube side length: cols x cols per layer, wrapping into Z layers
    let cols = (n as f32).cbrt().ceil() as usize;
    let rows_per_layer = cols;

    // Anchor the grid at the first map's corner so it stays put.
    let anchor = blocks[0].bounds.mins;

    let mut cur = anchor;
    let mut row_depth = 0.0f32; // largest Y extent in the current row
    let mut layer_height = 0.0f32; // largest Z extent in the current layer
    let mut col = 0usize;
    let mut row = 0usize;

    for block in blocks.iter_mut() {
        if col == cols {
            col = 0;
            row += 1;
            cur[0] = anchor[0];
            cur[1] += row_depth + gap[1];
            row_depth = 0.0;
            if row == rows_per_layer {
                row = 0;
                cur[1] = anchor[1];
                cur[2] += layer_height + gap[2];
                layer_height = 0.0;
            }
        }

        block.offset = vector_subtract(&cur, &block.bounds.mins);
        debug!(
            map = %block.merge_name,
            offset = ?block.offset,
            "placed map"
        );

        cur[0] += block.size[0] + gap[0];
        row_depth = row_depth.max(block.size[1]);
        layer_height = layer_height.max(block.size[2]);
        col += 1;
    }
}

fn assign_unique_merge_names(blocks: &mut [MapBlock]) {
    for i in 0..blocks.len() {
        let mut name = blocks[i].merge_name.clone();
        let mut suffix = 2;
        while blocks[..i].iter().any(|b| b.merge_name == name) {
            name = format!("{}_{}", blocks[i].merge_name, suffix);
            suffix += 1;
        }
        blocks[i].merge_name = name;
    }
}

/// For two intersecting boxes, propose the translation of `b` that would
/// separate them: per axis the positive-direction push and the
/// negative-direction alternative, rounded up with a 1.5 unit bias.
pub fn suggest_intersection_fix(a: &Bounds, b: &Bounds) -> (Vec3, Vec3) {
    let mut fixes = [0.0f32; 3];
    let mut fixes2 = [0.0f32; 3];
    for i in 0..3 {
        let push_pos = a.maxs[i] - b.mins[i]; // move b toward +axis
        let push_neg = b.maxs[i] - a.mins[i]; // move b toward -axis
        fixes[i] = push_pos.max(0.0).ceil() + 1.5;
        fixes2[i] = -(push_neg.max(0.0).ceil() + 1.5);
    }
    (fixes, fixes2)
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use hlmerge_bsp::bspfile::DModel;

    fn boxed_map(name: &str, mins: Vec3, maxs: Vec3) -> Map {
        let mut map = Map::new(name);
        map.models.push(DModel {
            mins,
            maxs,
            ..Default::default()
        });
        map
    }

    #[test]
    fn two_maps_get_separated_along_x() {
        let a = boxed_map("a", [0.0; 3], [100.0; 3]);
        let b = boxed_map("b", [0.0; 3], [100.0; 3]);
        let blocks = arrange_maps(&[a, b], &[64.0, 0.0, 0.0], false).unwrap();
        assert_eq!(blocks[0].offset, [0.0; 3]);
        // placed at A's max + gap: translation of at least (164, 0, 0)
        assert_eq!(blocks[1].offset, [164.0, 0.0, 0.0]);
        assert!(!blocks[0].intersects(&blocks[1]));
    }

    #[test]
    fn first_map_never_moves() {
        let a = boxed_map("a", [-50.0; 3], [50.0; 3]);
        let b = boxed_map("b", [0.0; 3], [10.0; 3]);
        let c = boxed_map("c", [0.0; 3], [10.0; 3]);
        let blocks = arrange_maps(&[a, b, c], &[32.0, 32.0, 0.0], false).unwrap();
        assert_eq!(blocks[0].offset, [0.0; 3]);
        for i in 0..blocks.len() {
            for j in i + 1..blocks.len() {
                assert!(!blocks[i].intersects(&blocks[j]));
            }
        }
    }

    #[test]
    fn grid_wraps_into_rows() {
        let maps: Vec<Map> = (0..5)
            .map(|i| boxed_map(&format!("m{i}"), [0.0; 3], [10.0; 3]))
            .collect();
        let blocks = arrange_maps(&maps, &[8.0, 8.0, 8.0], false).unwrap();
        // 5 maps -> 3 columns, so at least one block moved along Y
        assert!(blocks.iter().any(|b| b.offset[1] > 0.0));
        for i in 0..blocks.len() {
            for j in i + 1..blocks.len() {
                assert!(!blocks[i].intersects(&blocks[j]));
            }
        }
    }

    #[test]
    fn grid_wraps_into_layers() {
        let maps: Vec<Map> = (0..5)
            .map(|i| boxed_map(&format!("m{i}"), [0.0; 3], [10.0; 3]))
            .collect();
        // 5 maps on a 2x2 layer: the fifth starts the next layer up
        let blocks = arrange_maps(&maps, &[8.0, 8.0, 8.0], false).unwrap();
        assert!(blocks[4].offset[2] > 0.0);
        assert_eq!(blocks[4].offset[0], 0.0);
        assert_eq!(blocks[4].offset[1], 0.0);
        for i in 0..blocks.len() {
            for j in i + 1..blocks.len() {
                assert!(!blocks[i].intersects(&blocks[j]));
            }
        }
    }

    #[test]
    fn nomove_reports_collision_with_fixes() {
        let a = boxed_map("a", [0.0; 3], [100.0; 3]);
        let b = boxed_map("b", [50.0; 3], [150.0; 3]);
        let err = arrange_maps(&[a, b], &[64.0, 0.0, 0.0], true).unwrap_err();
        match err {
            MergeError::Collision {
                move_fixes,
                move_fixes2,
                ..
            } => {
                let ab = Bounds::new([0.0; 3], [100.0; 3]);
                let bb = Bounds::new([50.0; 3], [150.0; 3]);
                for i in 0..3 {
                    assert!(move_fixes[i] > 0.0);
                    assert!(move_fixes2[i] < 0.0);
                    // either fix separates along its own axis
                    assert!(bb.mins[i] + move_fixes[i] >= ab.maxs[i]);
                    assert!(bb.maxs[i] + move_fixes2[i] <= ab.mins[i]);
                }
            }
            other => panic!("expected collision, got {other:?}"),
        }
    }

    #[test]
    fn nomove_accepts_pre_separated_maps() {
        let a = boxed_map("a", [0.0; 3], [100.0; 3]);
        let b = boxed_map("b", [200.0, 0.0, 0.0], [300.0, 100.0, 100.0]);
        let blocks = arrange_maps(&[a, b], &[64.0, 0.0, 0.0], true).unwrap();
        assert_eq!(blocks[1].offset, [0.0; 3]);
    }

    #[test]
    fn duplicate_map_names_are_disambiguated() {
        let a = boxed_map("depot", [0.0; 3], [10.0; 3]);
        let b = boxed_map("depot", [0.0; 3], [10.0; 3]);
        let blocks = arrange_maps(&[a, b], &[16.0, 0.0, 0.0], false).unwrap();
        assert_eq!(blocks[0].merge_name, "depot");
        assert_eq!(blocks[1].merge_name, "depot_2");
    }

    #[test]
    fn too_few_maps() {
        let a = boxed_map("a", [0.0; 3], [10.0; 3]);
        assert!(matches!(
            arrange_maps(&[a], &[0.0; 3], false),
            Err(MergeError::TooFewMaps)
        ));
    }
}
