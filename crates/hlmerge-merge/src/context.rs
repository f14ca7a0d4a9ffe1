// context.rs — per-invocation merge state: pre-merge counts and remap tables

use hlmerge_bsp::bspfile::MAX_MAP_HULLS;
use hlmerge_bsp::Map;

/// Record counts of every lump, captured at a point in time.
#[derive(Debug, Clone, Copy, Default)]
pub struct LumpCounts {
    pub planes: usize,
    pub textures: usize,
    pub vertices: usize,
    pub texinfos: usize,
    pub faces: usize,
    pub leaves: usize,
    pub marksurfaces: usize,
    pub edges: usize,
    pub surfedges: usize,
    pub nodes: usize,
    pub clipnodes: usize,
    pub models: usize,
    pub entities: usize,
    pub lightdata: usize,
    pub visdata: usize,
}

impl LumpCounts {
    pub fn of(map: &Map) -> Self {
        Self {
            planes: map.planes.len(),
            textures: map.textures.len(),
            vertices: map.vertices.len(),
            texinfos: map.texinfos.len(),
            faces: map.faces.len(),
            leaves: map.leaves.len(),
            marksurfaces: map.marksurfaces.len(),
            edges: map.edges.len(),
            surfedges: map.surfedges.len(),
            nodes: map.nodes.len(),
            clipnodes: map.clipnodes.len(),
            models: map.models.len(),
            entities: map.entities.len(),
            lightdata: map.lightdata.len(),
            visdata: map.visdata.len(),
        }
    }
}

/// Everything one pairwise merge needs to rewrite foreign indices.
/// Created fresh per invocation and discarded afterwards; never reused,
/// so a stale table cannot leak into a later merge.
#[derive(Debug)]
pub struct MergeContext {
    /// Accumulator counts before anything was appended. Every "shift by
    /// original count" rule reads from here, never from the live arrays.
    pub base: LumpCounts,
    /// Incoming map's counts, for remap-table sizing and assertions.
    pub src: LumpCounts,

    // old index in the incoming map -> new index in the combined map
    pub tex_remap: Vec<usize>,
    pub plane_remap: Vec<usize>,
    pub texinfo_remap: Vec<usize>,
    pub face_remap: Vec<usize>,
    pub leaf_remap: Vec<usize>,
    pub node_remap: Vec<usize>,
    pub clipnode_remap: Vec<usize>,
    pub model_remap: Vec<usize>,

    /// Lightstyle renumbering for the incoming map's faces and light
    /// entities. Identity unless style merging is enabled.
    pub style_remap: [u8; 256],

    /// The incoming worldspawn model's head nodes, already remapped into
    /// the combined index space. Consumed by the tree rebuilder.
    pub src_world_headnode: [i32; MAX_MAP_HULLS],

    /// Sub-model donor mode: the incoming world model is appended as an
    /// ordinary sub-model instead of dissolving into a rebuilt tree.
    pub model_merge: bool,
}

impl MergeContext {
    pub fn capture(dst: &Map, src: &Map) -> Self {
        let mut style_remap = [0u8; 256];
        for (i, s) in style_remap.iter_mut().enumerate() {
            *s = i as u8;
        }
        Self {
            base: LumpCounts::of(dst),
            src: LumpCounts::of(src),
            tex_remap: Vec::new(),
            plane_remap: Vec::new(),
            texinfo_remap: Vec::new(),
            face_remap: Vec::new(),
            leaf_remap: Vec::new(),
            node_remap: Vec::new(),
            clipnode_remap: Vec::new(),
            model_remap: Vec::new(),
            style_remap,
            src_world_headnode: [-1; MAX_MAP_HULLS],
            model_merge: false,
        }
    }
}
