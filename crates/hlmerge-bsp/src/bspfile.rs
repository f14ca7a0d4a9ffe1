// bspfile.rs — GoldSrc BSP v30 on-disk structures, limits and child encoding

use bitflags::bitflags;

pub const BSPVERSION: i32 = 30;

// ============================================================
// Lump directory
// ============================================================

pub const LUMP_ENTITIES: usize = 0;
pub const LUMP_PLANES: usize = 1;
pub const LUMP_TEXTURES: usize = 2;
pub const LUMP_VERTICES: usize = 3;
pub const LUMP_VISIBILITY: usize = 4;
pub const LUMP_NODES: usize = 5;
pub const LUMP_TEXINFO: usize = 6;
pub const LUMP_FACES: usize = 7;
pub const LUMP_LIGHTING: usize = 8;
pub const LUMP_CLIPNODES: usize = 9;
pub const LUMP_LEAVES: usize = 10;
pub const LUMP_MARKSURFACES: usize = 11;
pub const LUMP_EDGES: usize = 12;
pub const LUMP_SURFEDGES: usize = 13;
pub const LUMP_MODELS: usize = 14;
pub const HEADER_LUMPS: usize = 15;

pub const LUMP_NAMES: [&str; HEADER_LUMPS] = [
    "entities",
    "planes",
    "textures",
    "vertices",
    "visibility",
    "nodes",
    "texinfo",
    "faces",
    "lighting",
    "clipnodes",
    "leaves",
    "marksurfaces",
    "edges",
    "surfedges",
    "models",
];

#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[repr(C)]
pub struct LumpDir {
    pub fileofs: i32,
    pub filelen: i32,
}

/// version(4) + 15 directory entries of 8 bytes each
pub const HEADER_SIZE: usize = 4 + HEADER_LUMPS * 8;

// ============================================================
// Upper design bounds
// ============================================================

pub const MAX_MAP_HULLS: usize = 4;

pub const MAX_MAP_MODELS: usize = 400;
pub const MAX_MAP_ENTITIES: usize = 1024;
pub const MAX_MAP_ENTSTRING: usize = 128 * 1024;
pub const MAX_MAP_PLANES: usize = 32767;
pub const MAX_MAP_NODES: usize = 32767;
pub const MAX_MAP_CLIPNODES: usize = 32767;
pub const MAX_MAP_LEAFS: usize = 8192;
pub const MAX_MAP_VERTS: usize = 65535;
pub const MAX_MAP_FACES: usize = 65535;
pub const MAX_MAP_MARKSURFACES: usize = 65535;
pub const MAX_MAP_TEXINFO: usize = 8192;
pub const MAX_MAP_EDGES: usize = 256000;
pub const MAX_MAP_SURFEDGES: usize = 512000;
pub const MAX_MAP_TEXTURES: usize = 512;
pub const MAX_MAP_MIPTEX: usize = 0x200000;
pub const MAX_MAP_LIGHTING: usize = 0x200000;
pub const MAX_MAP_VISIBILITY: usize = 0x200000;

// ============================================================
// Contents (clipnode leaves store these directly, render leaves
// store them in the contents field)
// ============================================================

pub const CONTENTS_EMPTY: i32 = -1;
pub const CONTENTS_SOLID: i32 = -2;
pub const CONTENTS_WATER: i32 = -3;
pub const CONTENTS_SLIME: i32 = -4;
pub const CONTENTS_LAVA: i32 = -5;
pub const CONTENTS_SKY: i32 = -6;
pub const CONTENTS_ORIGIN: i32 = -7;
pub const CONTENTS_CLIP: i32 = -8;
pub const CONTENTS_TRANSLUCENT: i32 = -15;

// Plane types
pub const PLANE_X: i32 = 0;
pub const PLANE_Y: i32 = 1;
pub const PLANE_Z: i32 = 2;
pub const PLANE_ANYX: i32 = 3;
pub const PLANE_ANYY: i32 = 4;
pub const PLANE_ANYZ: i32 = 5;

// Lightstyles: 0 is the normal style, 1..31 are global animation
// patterns, 32..62 are assigned to switchable lights by the compiler,
// 255 marks an unused slot.
pub const LS_NORMAL: u8 = 0;
pub const LS_NONE: u8 = 255;
pub const LS_FIRST_SWITCHABLE: u8 = 32;
pub const LS_LAST_SWITCHABLE: u8 = 62;

pub const MAXLIGHTMAPS: usize = 4;

bitflags! {
    /// Texinfo flags. v30 only defines the one bit.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TexFlags: i32 {
        /// sky or liquid surface: no lightmap, no subdivision
        const SPECIAL = 1;
    }
}

// ============================================================
// Record structs (little-endian on disk; sizes asserted in tests)
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[repr(C)]
pub struct DPlane {
    pub normal: [f32; 3],
    pub dist: f32,
    pub plane_type: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[repr(C)]
pub struct DVertex {
    pub point: [f32; 3],
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[repr(C)]
pub struct DTexInfo {
    /// [s/t][x,y,z,offset]
    pub vecs: [[f32; 4]; 2],
    pub miptex: i32,
    pub flags: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[repr(C)]
pub struct DFace {
    pub planenum: u16,
    pub side: u16,
    pub firstedge: i32,
    pub numedges: u16,
    pub texinfo: u16,
    pub styles: [u8; MAXLIGHTMAPS],
    pub lightofs: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[repr(C)]
pub struct DNode {
    pub planenum: i32,
    /// negative children are leaves, encoded as -(leaf+1)
    pub children: [i16; 2],
    pub mins: [i16; 3],
    pub maxs: [i16; 3],
    pub firstface: u16,
    pub numfaces: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[repr(C)]
pub struct DClipNode {
    pub planenum: i32,
    /// negative children are CONTENTS_* values, not leaf indices
    pub children: [i16; 2],
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct DLeaf {
    pub contents: i32,
    /// byte offset into the visibility lump, -1 = sees everything
    pub visofs: i32,
    pub mins: [i16; 3],
    pub maxs: [i16; 3],
    pub firstmarksurface: u16,
    pub nummarksurfaces: u16,
    pub ambient_level: [u8; 4],
}

impl Default for DLeaf {
    fn default() -> Self {
        Self {
            contents: CONTENTS_EMPTY,
            visofs: -1,
            mins: [0; 3],
            maxs: [0; 3],
            firstmarksurface: 0,
            nummarksurfaces: 0,
            ambient_level: [0; 4],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[repr(C)]
pub struct DEdge {
    pub v: [u16; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[repr(C)]
pub struct DModel {
    pub mins: [f32; 3],
    pub maxs: [f32; 3],
    pub origin: [f32; 3],
    /// headnode[0] indexes nodes, headnode[1..3] index clipnodes
    pub headnode: [i32; MAX_MAP_HULLS],
    pub visleafs: i32,
    pub firstface: i32,
    pub numfaces: i32,
}

// On-disk record strides
pub const SIZEOF_DPLANE: usize = 20;
pub const SIZEOF_DVERTEX: usize = 12;
pub const SIZEOF_DTEXINFO: usize = 40;
pub const SIZEOF_DFACE: usize = 20;
pub const SIZEOF_DNODE: usize = 24;
pub const SIZEOF_DCLIPNODE: usize = 8;
pub const SIZEOF_DLEAF: usize = 28;
pub const SIZEOF_DEDGE: usize = 4;
pub const SIZEOF_DMODEL: usize = 64;

// Miptex blob layout inside the textures lump
pub const MIPTEX_NAME_LEN: usize = 16;
pub const MIPLEVELS: usize = 4;
pub const MIPTEX_HEADER_SIZE: usize = MIPTEX_NAME_LEN + 8 + MIPLEVELS * 4;

// ============================================================
// Tagged child references
// ============================================================

/// A render-tree child: the raw i16 encodes leaves as -(leaf+1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeChild {
    Node(usize),
    Leaf(usize),
}

impl NodeChild {
    pub fn from_raw(raw: i16) -> Self {
        if raw >= 0 {
            NodeChild::Node(raw as usize)
        } else {
            NodeChild::Leaf((-(raw as i32) - 1) as usize)
        }
    }

    pub fn to_raw(self) -> i16 {
        match self {
            NodeChild::Node(n) => n as i16,
            NodeChild::Leaf(l) => (-(l as i32) - 1) as i16,
        }
    }

    pub fn is_leaf(self) -> bool {
        matches!(self, NodeChild::Leaf(_))
    }
}

/// A clip-tree child: negative raw values are contents constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipChild {
    Node(usize),
    Contents(i32),
}

impl ClipChild {
    pub fn from_raw(raw: i16) -> Self {
        if raw >= 0 {
            ClipChild::Node(raw as usize)
        } else {
            ClipChild::Contents(raw as i32)
        }
    }

    pub fn to_raw(self) -> i16 {
        match self {
            ClipChild::Node(n) => n as i16,
            ClipChild::Contents(c) => c as i16,
        }
    }
}

// ============================================================
// Tests
// ============================================================
