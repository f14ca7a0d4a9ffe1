// lumps.rs — one merger per lump kind, run in strict dependency order
//
// Each merger appends the incoming map's records to the accumulator,
// rewrites foreign indices through the already-populated remap tables,
// and extends its own remap table. Planes and textures are appended
// verbatim even when identical records already exist; the remaps stay
// pure offsets and the output stays deterministic.

use crate::context::MergeContext;
use crate::error::{check_capacity, MergeError};
use crate::vis;
use hlmerge_bsp::bspfile::*;
use hlmerge_bsp::Map;
use tracing::{debug, warn};

pub fn merge_textures(dst: &mut Map, src: &Map, ctx: &mut MergeContext) -> Result<(), MergeError> {
    let total = ctx.base.textures + src.textures.len();
    check_capacity("textures", total, MAX_MAP_TEXTURES)?;
    let total_bytes = 4
        + total * 4
        + dst.textures
            .iter()
            .chain(src.textures.iter())
            .map(|t| t.bytes.len())
            .sum::<usize>();
    check_capacity("miptex", total_bytes, MAX_MAP_MIPTEX)?;

    ctx.tex_remap = (0..src.textures.len())
        .map(|i| ctx.base.textures + i)
        .collect();
    dst.textures.extend(src.textures.iter().cloned());
    Ok(())
}

pub fn merge_planes(dst: &mut Map, src: &Map, ctx: &mut MergeContext) -> Result<(), MergeError> {
    check_capacity("planes", ctx.base.planes + src.planes.len(), MAX_MAP_PLANES)?;
    ctx.plane_remap = (0..src.planes.len()).map(|i| ctx.base.planes + i).collect();
    dst.planes.extend_from_slice(&src.planes);
    Ok(())
}

pub fn merge_vertices(dst: &mut Map, src: &Map, ctx: &mut MergeContext) -> Result<(), MergeError> {
    check_capacity("vertices", ctx.base.vertices + src.vertices.len(), MAX_MAP_VERTS)?;
    dst.vertices.extend_from_slice(&src.vertices);
    Ok(())
}

pub fn merge_texinfo(dst: &mut Map, src: &Map, ctx: &mut MergeContext) -> Result<(), MergeError> {
    check_capacity("texinfo", ctx.base.texinfos + src.texinfos.len(), MAX_MAP_TEXINFO)?;
    ctx.texinfo_remap = Vec::with_capacity(src.texinfos.len());
    for ti in &src.texinfos {
        let mut out = *ti;
        out.miptex = ctx.tex_remap[ti.miptex as usize] as i32;
        ctx.texinfo_remap.push(dst.texinfos.len());
        dst.texinfos.push(out);
    }
    Ok(())
}

pub fn merge_edges(dst: &mut Map, src: &Map, ctx: &mut MergeContext) -> Result<(), MergeError> {
    check_capacity("edges", ctx.base.edges + src.edges.len(), MAX_MAP_EDGES)?;
    for e in &src.edges {
        dst.edges.push(DEdge {
            v: [
                e.v[0] + ctx.base.vertices as u16,
                e.v[1] + ctx.base.vertices as u16,
            ],
        });
    }
    Ok(())
}

pub fn merge_surfedges(dst: &mut Map, src: &Map, ctx: &mut MergeContext) -> Result<(), MergeError> {
    check_capacity(
        "surfedges",
        ctx.base.surfedges + src.surfedges.len(),
        MAX_MAP_SURFEDGES,
    )?;
    // the sign carries traversal direction and must survive the shift
    for &se in &src.surfedges {
        let shifted = if se >= 0 {
            se + ctx.base.edges as i32
        } else {
            se - ctx.base.edges as i32
        };
        dst.surfedges.push(shifted);
    }
    Ok(())
}

pub fn merge_faces(dst: &mut Map, src: &Map, ctx: &mut MergeContext) -> Result<(), MergeError> {
    check_capacity("faces", ctx.base.faces + src.faces.len(), MAX_MAP_FACES)?;
    ctx.face_remap = Vec::with_capacity(src.faces.len());
    for f in &src.faces {
        let mut out = *f;
        out.planenum = ctx.plane_remap[f.planenum as usize] as u16;
        out.texinfo = ctx.texinfo_remap[f.texinfo as usize] as u16;
        out.firstedge = f.firstedge + ctx.base.surfedges as i32;
        for s in &mut out.styles {
            *s = ctx.style_remap[*s as usize];
        }
        // lightofs is shifted by merge_lighting once the lighting lump
        // has actually grown
        ctx.face_remap.push(dst.faces.len());
        dst.faces.push(out);
    }
    Ok(())
}

pub fn merge_leaves(dst: &mut Map, src: &Map, ctx: &mut MergeContext) -> Result<(), MergeError> {
    check_capacity("leaves", ctx.base.leaves + src.leaves.len(), MAX_MAP_LEAFS)?;
    check_capacity(
        "marksurfaces",
        ctx.base.marksurfaces + src.marksurfaces.len(),
        MAX_MAP_MARKSURFACES,
    )?;

    for &m in &src.marksurfaces {
        dst.marksurfaces.push(ctx.face_remap[m as usize] as u16);
    }

    // The incoming solid leaf 0 is appended like any other leaf so the
    // remap stays a bijection; children that pointed at it still land
    // on a solid leaf.
    ctx.leaf_remap = Vec::with_capacity(src.leaves.len());
    for l in &src.leaves {
        let mut out = *l;
        out.firstmarksurface = l.firstmarksurface + ctx.base.marksurfaces as u16;
        // visofs rewritten by merge_vis
        ctx.leaf_remap.push(dst.leaves.len());
        dst.leaves.push(out);
    }
    Ok(())
}

pub fn merge_nodes(dst: &mut Map, src: &Map, ctx: &mut MergeContext) -> Result<(), MergeError> {
    check_capacity("nodes", ctx.base.nodes + src.nodes.len(), MAX_MAP_NODES)?;
    ctx.node_remap = Vec::with_capacity(src.nodes.len());
    for n in &src.nodes {
        let mut out = *n;
        out.planenum = ctx.plane_remap[n.planenum as usize] as i32;
        for c in &mut out.children {
            *c = match NodeChild::from_raw(*c) {
                NodeChild::Node(idx) => NodeChild::Node(idx + ctx.base.nodes),
                NodeChild::Leaf(idx) => NodeChild::Leaf(ctx.leaf_remap[idx]),
            }
            .to_raw();
        }
        out.firstface = n.firstface + ctx.base.faces as u16;
        ctx.node_remap.push(dst.nodes.len());
        dst.nodes.push(out);
    }
    Ok(())
}

pub fn merge_clipnodes(dst: &mut Map, src: &Map, ctx: &mut MergeContext) -> Result<(), MergeError> {
    check_capacity(
        "clipnodes",
        ctx.base.clipnodes + src.clipnodes.len(),
        MAX_MAP_CLIPNODES,
    )?;
    ctx.clipnode_remap = Vec::with_capacity(src.clipnodes.len());
    for cn in &src.clipnodes {
        let mut out = *cn;
        out.planenum = ctx.plane_remap[cn.planenum as usize] as i32;
        for c in &mut out.children {
            *c = match ClipChild::from_raw(*c) {
                ClipChild::Node(idx) => ClipChild::Node(idx + ctx.base.clipnodes),
                // contents sentinels pass through untouched
                contents @ ClipChild::Contents(_) => contents,
            }
            .to_raw();
        }
        ctx.clipnode_remap.push(dst.clipnodes.len());
        dst.clipnodes.push(out);
    }
    Ok(())
}

pub fn merge_models(dst: &mut Map, src: &Map, ctx: &mut MergeContext) -> Result<(), MergeError> {
    // the incoming worldspawn model dissolves into the rebuilt tree,
    // except in sub-model donor mode where it is kept like any other
    let dissolved = usize::from(!ctx.model_merge);
    let total = ctx.base.models + src.models.len().saturating_sub(dissolved);
    check_capacity("models", total, MAX_MAP_MODELS)?;

    ctx.model_remap = vec![0; src.models.len()];
    for (i, m) in src.models.iter().enumerate() {
        let mut headnode = m.headnode;
        if headnode[0] >= 0 {
            headnode[0] += ctx.base.nodes as i32;
        } else if headnode[0] != -1 {
            // leaf-encoded head; -1 is the no-geometry sentinel
            let leaf = (-headnode[0] - 1) as usize;
            headnode[0] = -(ctx.leaf_remap[leaf] as i32) - 1;
        }
        for h in headnode.iter_mut().skip(1) {
            if *h >= 0 {
                *h += ctx.base.clipnodes as i32;
            }
        }

        if i == 0 && !ctx.model_merge {
            // stash the remapped world heads for the tree rebuilder
            ctx.src_world_headnode = headnode;
            continue;
        }

        ctx.model_remap[i] = dst.models.len();
        dst.models.push(DModel {
            mins: m.mins,
            maxs: m.maxs,
            origin: m.origin,
            headnode,
            // not summed: the engine recomputes the effective set
            visleafs: m.visleafs,
            firstface: m.firstface + ctx.base.faces as i32,
            numfaces: m.numfaces,
        });
    }
    Ok(())
}

/// Logical recombination of the two visibility streams: every row is
/// decompressed at its original width, the incoming map's leaf bits are
/// shifted past the accumulator's leaves, and everything is recompressed
/// at the combined row width.
pub fn merge_vis(dst: &mut Map, src: &Map, ctx: &mut MergeContext) -> Result<(), MergeError> {
    let new_leaf_count = dst.leaves.len();
    if new_leaf_count == 0 || (ctx.base.visdata == 0 && src.visdata.is_empty()) {
        return Ok(());
    }

    let new_row = vis::row_bytes(new_leaf_count);
    let a_row = vis::row_bytes(ctx.base.leaves);
    let b_row = vis::row_bytes(ctx.src.leaves);
    let old_a_vis = std::mem::take(&mut dst.visdata);

    let mut new_vis: Vec<u8> = Vec::with_capacity(old_a_vis.len() + src.visdata.len());
    for leaf_idx in 1..new_leaf_count {
        let (data, visofs, shift, old_row) = if leaf_idx < ctx.base.leaves {
            (&old_a_vis, dst.leaves[leaf_idx].visofs, 0, a_row)
        } else {
            let src_leaf = leaf_idx - ctx.base.leaves;
            (&src.visdata, src.leaves[src_leaf].visofs, ctx.base.leaves, b_row)
        };

        if visofs < 0 || data.is_empty() {
            dst.leaves[leaf_idx].visofs = -1;
            continue;
        }

        let row = vis::decompress_row(data, visofs as usize, old_row)?;
        let mut widened = vec![0u8; new_row];
        for bit in 0..old_row * 8 {
            let leaf = bit + 1;
            if vis::row_bit(&row, leaf) {
                let new_leaf = leaf + shift;
                if new_leaf < new_leaf_count {
                    vis::set_row_bit(&mut widened, new_leaf);
                }
            }
        }

        dst.leaves[leaf_idx].visofs = new_vis.len() as i32;
        new_vis.extend(vis::compress_row(&widened));
    }

    check_capacity("visibility", new_vis.len(), MAX_MAP_VISIBILITY)?;
    debug!(
        bytes = new_vis.len(),
        leaves = new_leaf_count,
        "recombined visibility data"
    );
    dst.visdata = new_vis;
    Ok(())
}

/// Raw luxel bytes append verbatim; only the appended faces' stored
/// lightmap offsets move.
pub fn merge_lighting(dst: &mut Map, src: &Map, ctx: &mut MergeContext) -> Result<(), MergeError> {
    check_capacity(
        "lighting",
        ctx.base.lightdata + src.lightdata.len(),
        MAX_MAP_LIGHTING,
    )?;
    dst.lightdata.extend_from_slice(&src.lightdata);
    for f in &mut dst.faces[ctx.base.faces..] {
        if f.lightofs >= 0 {
            f.lightofs += ctx.base.lightdata as i32;
        }
    }
    Ok(())
}

/// Renumber the incoming map's switchable lightstyles (32..=62) around
/// the ones the accumulator already uses, so two named lights compiled
/// into the same style slot stay independently toggleable.
pub fn prepare_style_remap(dst: &Map, src: &Map, ctx: &mut MergeContext) {
    let mut used = [false; 256];
    for f in &dst.faces {
        for &s in &f.styles {
            used[s as usize] = true;
        }
    }

    let mut src_styles: Vec<u8> = src
        .faces
        .iter()
        .flat_map(|f| f.styles)
        .filter(|&s| (LS_FIRST_SWITCHABLE..=LS_LAST_SWITCHABLE).contains(&s))
        .collect();
    src_styles.sort_unstable();
    src_styles.dedup();

    // styles free in the accumulator keep their number; collisions are
    // assigned afterwards so one renumber cannot cascade into another
    let mut colliding = Vec::new();
    for s in src_styles {
        if used[s as usize] {
            colliding.push(s);
        } else {
            used[s as usize] = true;
        }
    }

    let mut next = LS_FIRST_SWITCHABLE;
    for s in colliding {
        while next <= LS_LAST_SWITCHABLE && used[next as usize] {
            next += 1;
        }
        if next > LS_LAST_SWITCHABLE {
            warn!(style = s, "out of switchable lightstyles, keeping colliding style");
            continue;
        }
        used[next as usize] = true;
        ctx.style_remap[s as usize] = next;
        debug!(from = s, to = next, "renumbered lightstyle");
    }
}

/// Entities are merged last: model references need the final model remap.
/// The incoming worldspawn is dropped; the accumulator's worldspawn keys
/// win for the combined map.
pub fn merge_entities(dst: &mut Map, src: &Map, ctx: &mut MergeContext) -> Result<(), MergeError> {
    let incoming = src
        .entities
        .iter()
        .filter(|e| e.classname() != "worldspawn")
        .count();
    check_capacity("entities", ctx.base.entities + incoming, MAX_MAP_ENTITIES)?;

    for ent in &src.entities {
        if ent.classname() == "worldspawn" {
            continue;
        }
        let mut e = ent.clone();
        if let Some(m) = e.model_ref() {
            if m < ctx.model_remap.len() {
                e.set_model_ref(ctx.model_remap[m]);
            }
        }
        if e.classname().starts_with("light") {
            if let Some(s) = e.get("style").and_then(|v| v.parse::<u8>().ok()) {
                let ns = ctx.style_remap[s as usize];
                if ns != s {
                    e.set("style", &ns.to_string());
                }
            }
        }
        dst.entities.push(e);
    }
    Ok(())
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use hlmerge_bsp::testutil::tiny_map;

    fn merged_pair() -> (Map, Map, MergeContext) {
        let mut a = tiny_map("a");
        let b = tiny_map("b");
        let mut ctx = MergeContext::capture(&a, &b);
        merge_textures(&mut a, &b, &mut ctx).unwrap();
        merge_planes(&mut a, &b, &mut ctx).unwrap();
        merge_vertices(&mut a, &b, &mut ctx).unwrap();
        merge_texinfo(&mut a, &b, &mut ctx).unwrap();
        merge_edges(&mut a, &b, &mut ctx).unwrap();
        merge_surfedges(&mut a, &b, &mut ctx).unwrap();
        merge_faces(&mut a, &b, &mut ctx).unwrap();
        merge_leaves(&mut a, &b, &mut ctx).unwrap();
        merge_nodes(&mut a, &b, &mut ctx).unwrap();
        merge_clipnodes(&mut a, &b, &mut ctx).unwrap();
        merge_models(&mut a, &b, &mut ctx).unwrap();
        merge_vis(&mut a, &b, &mut ctx).unwrap();
        merge_lighting(&mut a, &b, &mut ctx).unwrap();
        merge_entities(&mut a, &b, &mut ctx).unwrap();
        (a, b, ctx)
    }

    #[test]
    fn remap_tables_are_bijections_on_append() {
        let (_, b, ctx) = merged_pair();
        let checks: [(&[usize], usize); 5] = [
            (&ctx.plane_remap, b.planes.len()),
            (&ctx.tex_remap, b.textures.len()),
            (&ctx.texinfo_remap, b.texinfos.len()),
            (&ctx.face_remap, b.faces.len()),
            (&ctx.leaf_remap, b.leaves.len()),
        ];
        for (remap, src_count) in checks {
            assert_eq!(remap.len(), src_count);
            let mut seen = remap.to_vec();
            seen.sort_unstable();
            seen.dedup();
            assert_eq!(seen.len(), src_count, "remap not injective");
        }
    }

    #[test]
    fn appended_counts_are_exact_sums() {
        let (a, b, _) = merged_pair();
        let single = tiny_map("x");
        assert_eq!(a.faces.len(), single.faces.len() + b.faces.len());
        assert_eq!(a.planes.len(), single.planes.len() + b.planes.len());
        assert_eq!(a.leaves.len(), single.leaves.len() + b.leaves.len());
        // no de-duplication even though the maps are identical
        assert_eq!(a.textures.len(), 2);
    }

    #[test]
    fn node_children_preserve_leaf_sign() {
        let (a, b, ctx) = merged_pair();
        for (old, n) in b.nodes.iter().enumerate() {
            let merged = &a.nodes[ctx.node_remap[old]];
            for (c_old, c_new) in n.children.iter().zip(merged.children.iter()) {
                assert_eq!(
                    NodeChild::from_raw(*c_old).is_leaf(),
                    NodeChild::from_raw(*c_new).is_leaf(),
                    "sign convention broken by remap"
                );
            }
        }
    }

    #[test]
    fn clipnode_contents_pass_through() {
        let (a, b, ctx) = merged_pair();
        for (old, cn) in b.clipnodes.iter().enumerate() {
            let merged = &a.clipnodes[ctx.clipnode_remap[old]];
            for (c_old, c_new) in cn.children.iter().zip(merged.children.iter()) {
                match (ClipChild::from_raw(*c_old), ClipChild::from_raw(*c_new)) {
                    (ClipChild::Contents(a), ClipChild::Contents(b)) => assert_eq!(a, b),
                    (ClipChild::Node(_), ClipChild::Node(_)) => {}
                    other => panic!("child kind changed: {other:?}"),
                }
            }
        }
    }

    #[test]
    fn surfedge_direction_survives_shift() {
        let (a, b, ctx) = merged_pair();
        let base = ctx.base.surfedges;
        for (i, &se) in b.surfedges.iter().enumerate() {
            let merged = a.surfedges[base + i];
            assert_eq!(se.signum(), merged.signum());
            assert_eq!(se.unsigned_abs() + ctx.base.edges as u32, merged.unsigned_abs());
        }
    }

    #[test]
    fn lighting_offsets_shift_by_prior_length() {
        let (a, b, ctx) = merged_pair();
        assert_eq!(a.lightdata.len(), ctx.base.lightdata + b.lightdata.len());
        for (old, f) in b.faces.iter().enumerate() {
            let merged = &a.faces[ctx.face_remap[old]];
            if f.lightofs >= 0 {
                assert_eq!(merged.lightofs, f.lightofs + ctx.base.lightdata as i32);
            } else {
                assert_eq!(merged.lightofs, -1);
            }
        }
    }

    #[test]
    fn incoming_world_model_is_not_appended() {
        let (a, b, ctx) = merged_pair();
        let single = tiny_map("x");
        assert_eq!(a.models.len(), single.models.len() + b.models.len() - 1);
        assert!(ctx.src_world_headnode[0] >= 0);
        assert_eq!(
            ctx.src_world_headnode[0] as usize,
            b.models[0].headnode[0] as usize + ctx.base.nodes
        );
    }

    #[test]
    fn texture_overflow_detected() {
        let mut a = tiny_map("a");
        let b = tiny_map("b");
        // inflate the accumulator to the ceiling
        let filler = a.textures[0].clone();
        while a.textures.len() < MAX_MAP_TEXTURES {
            a.textures.push(filler.clone());
        }
        let mut ctx = MergeContext::capture(&a, &b);
        let err = merge_textures(&mut a, &b, &mut ctx).unwrap_err();
        assert!(err.is_overflow());
        match err {
            MergeError::Overflow { lump, count, max } => {
                assert_eq!(lump, "textures");
                assert_eq!(count, MAX_MAP_TEXTURES + 1);
                assert_eq!(max, MAX_MAP_TEXTURES);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn vis_rows_shift_incoming_leaf_bits() {
        let mut a = tiny_map("a");
        let mut b = tiny_map("b");
        // each map: leaf 1 sees itself (bit 0 of a 1-byte row)
        a.visdata = crate::vis::compress_row(&[0x01]);
        a.leaves[1].visofs = 0;
        b.visdata = crate::vis::compress_row(&[0x01]);
        b.leaves[1].visofs = 0;

        let mut ctx = MergeContext::capture(&a, &b);
        let a_leaves = a.leaves.len();
        merge_textures(&mut a, &b, &mut ctx).unwrap();
        merge_planes(&mut a, &b, &mut ctx).unwrap();
        merge_vertices(&mut a, &b, &mut ctx).unwrap();
        merge_texinfo(&mut a, &b, &mut ctx).unwrap();
        merge_edges(&mut a, &b, &mut ctx).unwrap();
        merge_surfedges(&mut a, &b, &mut ctx).unwrap();
        merge_faces(&mut a, &b, &mut ctx).unwrap();
        merge_leaves(&mut a, &b, &mut ctx).unwrap();
        merge_vis(&mut a, &b, &mut ctx).unwrap();

        let total = a.leaves.len();
        let row_len = vis::row_bytes(total);

        // accumulator leaf 1 still sees leaf 1
        let ofs = a.leaves[1].visofs;
        assert!(ofs >= 0);
        let row = vis::decompress_row(&a.visdata, ofs as usize, row_len).unwrap();
        assert!(vis::row_bit(&row, 1));

        // incoming leaf 1 landed at a_leaves + 1 and sees itself there
        let merged_leaf = a_leaves + 1;
        let ofs = a.leaves[merged_leaf].visofs;
        assert!(ofs >= 0);
        let row = vis::decompress_row(&a.visdata, ofs as usize, row_len).unwrap();
        assert!(vis::row_bit(&row, merged_leaf));
        assert!(!vis::row_bit(&row, 1));
    }

    #[test]
    fn style_remap_moves_colliding_switchable_styles() {
        let mut a = tiny_map("a");
        let mut b = tiny_map("b");
        a.faces[0].styles = [32, 255, 255, 255];
        b.faces[0].styles = [32, 33, 255, 255];
        let mut ctx = MergeContext::capture(&a, &b);
        prepare_style_remap(&a, &b, &mut ctx);
        // 33 is free in the accumulator and stays; the colliding 32 moves
        // to the first switchable slot free on both sides
        assert_eq!(ctx.style_remap[33], 33);
        assert_eq!(ctx.style_remap[32], 34);
        assert_eq!(ctx.style_remap[0], 0);
        assert_eq!(ctx.style_remap[255], 255);
    }

    #[test]
    fn leaf_encoded_model_headnode_is_remapped() {
        let mut a = tiny_map("a");
        let mut b = tiny_map("b");
        // a sub-model whose render head is leaf 1 directly
        let mut sub = b.models[0];
        sub.headnode[0] = NodeChild::Leaf(1).to_raw() as i32;
        b.models.push(sub);

        let mut ctx = MergeContext::capture(&a, &b);
        merge_textures(&mut a, &b, &mut ctx).unwrap();
        merge_planes(&mut a, &b, &mut ctx).unwrap();
        merge_vertices(&mut a, &b, &mut ctx).unwrap();
        merge_texinfo(&mut a, &b, &mut ctx).unwrap();
        merge_edges(&mut a, &b, &mut ctx).unwrap();
        merge_surfedges(&mut a, &b, &mut ctx).unwrap();
        merge_faces(&mut a, &b, &mut ctx).unwrap();
        merge_leaves(&mut a, &b, &mut ctx).unwrap();
        merge_nodes(&mut a, &b, &mut ctx).unwrap();
        merge_clipnodes(&mut a, &b, &mut ctx).unwrap();
        merge_models(&mut a, &b, &mut ctx).unwrap();

        let merged = &a.models[ctx.model_remap[1]];
        assert_eq!(merged.headnode[0], -(ctx.leaf_remap[1] as i32) - 1);
        // the remapped head still encodes a leaf
        assert!(merged.headnode[0] < 0);
    }

    #[test]
    fn no_geometry_sentinel_headnode_is_left_alone() {
        let mut a = tiny_map("a");
        let mut b = tiny_map("b");
        let mut sub = b.models[0];
        sub.headnode[0] = -1;
        b.models.push(sub);

        let mut ctx = MergeContext::capture(&a, &b);
        ctx.leaf_remap = vec![10, 11]; // must not be consulted for -1
        merge_models(&mut a, &b, &mut ctx).unwrap();
        assert_eq!(a.models[ctx.model_remap[1]].headnode[0], -1);
    }

    #[test]
    fn entities_keep_single_worldspawn_and_remap_models() {
        let mut a = tiny_map("a");
        let mut b = tiny_map("b");
        // give b a submodel and a door pointing at it
        let sub = b.models[0];
        b.models.push(sub);
        let mut door = hlmerge_bsp::Entity::new("func_door");
        door.set_model_ref(1);
        b.entities.push(door);

        let mut ctx = MergeContext::capture(&a, &b);
        merge_models(&mut a, &b, &mut ctx).unwrap();
        merge_entities(&mut a, &b, &mut ctx).unwrap();

        let worldspawns = a
            .entities
            .iter()
            .filter(|e| e.classname() == "worldspawn")
            .count();
        assert_eq!(worldspawns, 1);
        let door = a
            .entities
            .iter()
            .find(|e| e.classname() == "func_door")
            .unwrap();
        assert_eq!(door.model_ref(), Some(ctx.model_remap[1]));
    }
}
