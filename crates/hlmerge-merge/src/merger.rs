// merger.rs — the top-level merge driver: arrange, fold pairwise, reconcile

use crate::arrange::{arrange_maps, MapBlock};
use crate::context::MergeContext;
use crate::error::{check_capacity, MergeError};
use crate::lumps;
use crate::ripent;
use crate::tree::create_merge_headnodes;
use hlmerge_bsp::bspfile::MAX_MAP_ENTSTRING;
use hlmerge_bsp::entity::serialize_entities;
use hlmerge_bsp::Map;
use hlmerge_common::{vector_is_zero, Bounds, Vec3};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct MergeOptions {
    /// skip the series entity rewrites entirely
    pub noripent: bool,
    /// rewrite transitions but skip spawn management scripting
    pub noscript: bool,
    /// keep every map where it is; overlaps become errors
    pub nomove: bool,
    /// keep the incoming maps' lightstyle numbers as compiled
    pub no_merge_styles: bool,
    /// treat the incoming map as a sub-model donor: its world model is
    /// kept as an ordinary sub-model and the tree join and visibility
    /// recombination are skipped
    pub model_merge: bool,
}

/// A merge that could not produce a map, with whatever guidance the
/// failure carries.
#[derive(Debug)]
pub struct MergeFailure {
    pub error: MergeError,
    /// a format ceiling was exceeded; no amount of moving maps helps
    pub overflow: bool,
    /// for spatial collisions: the translation of the second map that
    /// would separate the pair, and the opposite-direction alternative
    pub move_fixes: Option<Vec3>,
    pub move_fixes2: Option<Vec3>,
}

impl MergeFailure {
    fn from_error(error: MergeError) -> Self {
        let (move_fixes, move_fixes2) = match &error {
            MergeError::Collision {
                move_fixes,
                move_fixes2,
                ..
            } => (Some(*move_fixes), Some(*move_fixes2)),
            _ => (None, None),
        };
        Self {
            overflow: error.is_overflow(),
            move_fixes,
            move_fixes2,
            error,
        }
    }
}

#[derive(Debug)]
pub enum MergeOutcome {
    Merged {
        map: Box<Map>,
        /// final map name, adjusted when the requested name would
        /// clobber one of the inputs
        output_name: String,
    },
    Failed(MergeFailure),
}

/// Merge `maps` into one. The inputs are never modified; all work
/// happens on translated copies. `output_name` is the map name (file
/// stem) the result should go by.
pub fn merge(maps: &[Map], gap: &Vec3, output_name: &str, opts: &MergeOptions) -> MergeOutcome {
    match merge_inner(maps, gap, output_name, opts) {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(error = %e, "merge failed");
            MergeOutcome::Failed(MergeFailure::from_error(e))
        }
    }
}

fn merge_inner(
    maps: &[Map],
    gap: &Vec3,
    output_name: &str,
    opts: &MergeOptions,
) -> Result<MergeOutcome, MergeError> {
    // corrupt-but-parseable input must surface as a structured error,
    // not a panic inside a lump merger
    for map in maps {
        map.validate()?;
    }

    let blocks = arrange_maps(maps, gap, opts.nomove)?;
    preflight_capacity(maps)?;

    // translated, renamed working copies; the inputs stay pristine
    let mut work: Vec<Map> = Vec::with_capacity(maps.len());
    for block in &blocks {
        let mut map = maps[block.slot].clone();
        map.name = block.merge_name.clone();
        if !vector_is_zero(&block.offset) {
            map.translate(&block.offset);
        }
        for ent in &mut map.entities {
            ent.source_map = block.merge_name.clone();
        }
        work.push(map);
    }

    let mut it = work.into_iter();
    let mut merged = it.next().ok_or(MergeError::TooFewMaps)?;
    for src in it {
        merge_pair(&mut merged, &src, opts)?;
    }

    let renamed = ripent::force_unique_ent_names_per_map(&mut merged.entities);
    if renamed > 0 {
        info!(renamed, "resolved cross-map targetname collisions");
    }
    if !opts.noripent {
        let series = series_of(&blocks);
        ripent::update_map_series_entity_logic(&mut merged, &series, opts.noscript);
    }

    check_capacity(
        "entity text",
        serialize_entities(&merged.entities).len(),
        MAX_MAP_ENTSTRING,
    )?;
    merged.validate()?;

    let output_name = resolve_output_name(output_name, maps);
    merged.name = output_name.clone();
    info!(
        map = %output_name,
        models = merged.models.len(),
        faces = merged.faces.len(),
        checksum = format_args!("{:08x}", merged.checksum()),
        "merge complete"
    );
    Ok(MergeOutcome::Merged {
        map: Box::new(merged),
        output_name,
    })
}

/// One pairwise merge: append every lump of `src` onto `dst` with index
/// remapping, then join the two world trees under new head nodes.
pub fn merge_pair(dst: &mut Map, src: &Map, opts: &MergeOptions) -> Result<(), MergeError> {
    let a_bounds = dst.bounding_box();
    let b_bounds = src.bounding_box();

    let mut ctx = MergeContext::capture(dst, src);
    ctx.model_merge = opts.model_merge;
    if !opts.no_merge_styles {
        lumps::prepare_style_remap(dst, src, &mut ctx);
    }

    lumps::merge_textures(dst, src, &mut ctx)?;
    lumps::merge_planes(dst, src, &mut ctx)?;
    lumps::merge_vertices(dst, src, &mut ctx)?;
    lumps::merge_texinfo(dst, src, &mut ctx)?;
    lumps::merge_edges(dst, src, &mut ctx)?;
    lumps::merge_surfedges(dst, src, &mut ctx)?;
    lumps::merge_faces(dst, src, &mut ctx)?;
    lumps::merge_leaves(dst, src, &mut ctx)?;
    lumps::merge_nodes(dst, src, &mut ctx)?;
    lumps::merge_clipnodes(dst, src, &mut ctx)?;
    lumps::merge_models(dst, src, &mut ctx)?;

    // a sub-model donor keeps the accumulator's world tree intact; its
    // leaves lie past the world's visleafs, so the existing visibility
    // data stays valid as-is
    if !opts.model_merge {
        create_merge_headnodes(dst, &ctx, &a_bounds, &b_bounds, &src.name)?;
        lumps::merge_vis(dst, src, &mut ctx)?;
    }

    lumps::merge_lighting(dst, src, &mut ctx)?;
    lumps::merge_entities(dst, src, &mut ctx)?;

    info!(first = %dst.name, second = %src.name, "merged map pair");
    Ok(())
}

/// Reject combinations whose summed counts already bust a format ceiling,
/// before any copying is done. The per-lump mergers re-check with exact
/// post-merge counts.
fn preflight_capacity(maps: &[Map]) -> Result<(), MergeError> {
    use hlmerge_bsp::bspfile::*;
    let sum = |f: fn(&Map) -> usize| maps.iter().map(f).sum::<usize>();
    check_capacity("textures", sum(|m| m.textures.len()), MAX_MAP_TEXTURES)?;
    check_capacity("planes", sum(|m| m.planes.len()), MAX_MAP_PLANES)?;
    check_capacity("vertices", sum(|m| m.vertices.len()), MAX_MAP_VERTS)?;
    check_capacity("texinfo", sum(|m| m.texinfos.len()), MAX_MAP_TEXINFO)?;
    check_capacity("edges", sum(|m| m.edges.len()), MAX_MAP_EDGES)?;
    check_capacity("surfedges", sum(|m| m.surfedges.len()), MAX_MAP_SURFEDGES)?;
    check_capacity("faces", sum(|m| m.faces.len()), MAX_MAP_FACES)?;
    check_capacity("leaves", sum(|m| m.leaves.len()), MAX_MAP_LEAFS)?;
    check_capacity(
        "marksurfaces",
        sum(|m| m.marksurfaces.len()),
        MAX_MAP_MARKSURFACES,
    )?;
    check_capacity("lighting", sum(|m| m.lightdata.len()), MAX_MAP_LIGHTING)?;
    Ok(())
}

fn series_of(blocks: &[MapBlock]) -> Vec<(String, Bounds)> {
    blocks
        .iter()
        .map(|b| (b.merge_name.clone(), b.placed_bounds()))
        .collect()
}

/// Writing the result over one of its own inputs is almost never meant;
/// steer such a request to a `_merged` name instead.
pub fn resolve_output_name(requested: &str, inputs: &[Map]) -> String {
    if inputs.iter().any(|m| m.name == requested) {
        let adjusted = format!("{requested}_merged");
        warn!(
            requested,
            using = %adjusted,
            "output name matches an input map"
        );
        adjusted
    } else {
        requested.to_string()
    }
}

// ============================================================
// Tests
// ============================================================
