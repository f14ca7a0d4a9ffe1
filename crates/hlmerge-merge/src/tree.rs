// tree.rs — joins two independent BSP trees under new head records

use crate::context::MergeContext;
use crate::error::{check_capacity, MergeError};
use hlmerge_bsp::bspfile::*;
use hlmerge_bsp::Map;
use tracing::debug;

/// An axis-aligned plane lying strictly between two disjoint boxes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeparationPlane {
    pub axis: usize,
    pub dist: f32,
    /// whether box `a` lies on the positive (front) side
    pub a_in_front: bool,
}

/// Pick the axis with the largest clearance between the boxes. Returns
/// None when the boxes overlap on every axis.
pub fn choose_separation_plane(
    a: &hlmerge_common::Bounds,
    b: &hlmerge_common::Bounds,
) -> Option<SeparationPlane> {
    let mut best: Option<(f32, SeparationPlane)> = None;
    for axis in 0..3 {
        let candidate = if a.maxs[axis] <= b.mins[axis] {
            Some(SeparationPlane {
                axis,
                dist: (a.maxs[axis] + b.mins[axis]) * 0.5,
                a_in_front: false,
            })
        } else if b.maxs[axis] <= a.mins[axis] {
            Some(SeparationPlane {
                axis,
                dist: (b.maxs[axis] + a.mins[axis]) * 0.5,
                a_in_front: true,
            })
        } else {
            None
        };
        if let Some(plane) = candidate {
            let clearance = if plane.a_in_front {
                a.mins[axis] - b.maxs[axis]
            } else {
                b.mins[axis] - a.maxs[axis]
            };
            if best.is_none_or(|(c, _)| clearance > c) {
                best = Some((clearance, plane));
            }
        }
    }
    best.map(|(_, p)| p)
}

/// Create the five new head records (render tree + hulls 1..3) whose
/// children are the accumulator's existing heads and the incoming map's
/// heads (already remapped by the lump mergers), split by `sep`. The
/// combined world model takes the new heads and the union bounds.
pub fn create_merge_headnodes(
    dst: &mut Map,
    ctx: &MergeContext,
    a_bounds: &hlmerge_common::Bounds,
    b_bounds: &hlmerge_common::Bounds,
    src_name: &str,
) -> Result<(), MergeError> {
    let sep = match choose_separation_plane(a_bounds, b_bounds) {
        Some(sep) => sep,
        None => {
            return Err(MergeError::NoSeparatingAxis {
                first: dst.name.clone(),
                second: src_name.to_string(),
            })
        }
    };

    check_capacity("planes", dst.planes.len() + 1, MAX_MAP_PLANES)?;
    check_capacity("nodes", dst.nodes.len() + 1, MAX_MAP_NODES)?;
    check_capacity(
        "clipnodes",
        dst.clipnodes.len() + (MAX_MAP_HULLS - 1),
        MAX_MAP_CLIPNODES,
    )?;

    let mut normal = [0.0f32; 3];
    normal[sep.axis] = 1.0;
    let plane_idx = dst.planes.len();
    dst.planes.push(DPlane {
        normal,
        dist: sep.dist,
        plane_type: sep.axis as i32,
    });

    let union = a_bounds.union(b_bounds);
    let a_head = dst.models[0].headnode;
    let b_head = ctx.src_world_headnode;

    // render tree: children encode leaves through the sign convention;
    // leaf-encoded incoming heads arrive already remapped
    let order = |a: i32, b: i32| -> [i16; 2] {
        if sep.a_in_front {
            [a as i16, b as i16]
        } else {
            [b as i16, a as i16]
        }
    };

    let new_node_idx = dst.nodes.len();
    dst.nodes.push(DNode {
        planenum: plane_idx as i32,
        children: order(a_head[0], b_head[0]),
        mins: clamp_short(&union.mins),
        maxs: clamp_short(&union.maxs),
        firstface: 0,
        numfaces: 0,
    });
    dst.models[0].headnode[0] = new_node_idx as i32;

    // one new clip head per hull; absent hulls carry contents sentinels
    for hull in 1..MAX_MAP_HULLS {
        let new_clip_idx = dst.clipnodes.len();
        dst.clipnodes.push(DClipNode {
            planenum: plane_idx as i32,
            children: order(a_head[hull], b_head[hull]),
        });
        dst.models[0].headnode[hull] = new_clip_idx as i32;
    }

    dst.models[0].mins = union.mins;
    dst.models[0].maxs = union.maxs;

    debug!(
        axis = sep.axis,
        dist = sep.dist,
        node = new_node_idx,
        "created merge head nodes"
    );
    Ok(())
}

fn clamp_short(v: &hlmerge_common::Vec3) -> [i16; 3] {
    let mut out = [0i16; 3];
    for i in 0..3 {
        out[i] = v[i].round().clamp(i16::MIN as f32, i16::MAX as f32) as i16;
    }
    out
}

// ============================================================
// Tests
// ============================================================
