// map.rs — typed in-memory BSP map: parsing, serialization, validation

use crate::bspfile::*;
use crate::entity::{self, Entity};
use crate::error::BspError;
use crc::{Crc, CRC_32_ISO_HDLC};
use hlmerge_common::{dot_product, vector_add, vector_is_zero, Bounds, Vec3};
use rayon::prelude::*;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Lumps with at least this many records are parsed in parallel.
const PARALLEL_LUMP_THRESHOLD: usize = 64;

// ============================================================
// Textures
// ============================================================

/// One miptex blob from the textures lump, kept verbatim. The four mip
/// offsets inside the blob are relative to the blob start, so a blob can
/// be relocated without rewriting it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Texture {
    pub bytes: Vec<u8>,
}

impl Texture {
    /// A slot whose directory offset was -1 (texture stripped from the map).
    pub fn is_placeholder(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn name(&self) -> String {
        if self.bytes.len() < MIPTEX_NAME_LEN {
            return String::new();
        }
        let raw = &self.bytes[..MIPTEX_NAME_LEN];
        let end = raw.iter().position(|&b| b == 0).unwrap_or(MIPTEX_NAME_LEN);
        String::from_utf8_lossy(&raw[..end]).into_owned()
    }

    pub fn width(&self) -> u32 {
        if self.bytes.len() < MIPTEX_HEADER_SIZE {
            return 0;
        }
        u32::from_le_bytes([
            self.bytes[16],
            self.bytes[17],
            self.bytes[18],
            self.bytes[19],
        ])
    }

    pub fn height(&self) -> u32 {
        if self.bytes.len() < MIPTEX_HEADER_SIZE {
            return 0;
        }
        u32::from_le_bytes([
            self.bytes[20],
            self.bytes[21],
            self.bytes[22],
            self.bytes[23],
        ])
    }
}

// ============================================================
// Map
// ============================================================

/// A fully parsed v30 map: one typed array per lump. All cross-lump
/// references are plain indices into these arrays.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Map {
    pub name: String,

    pub entities: Vec<Entity>,
    pub planes: Vec<DPlane>,
    pub textures: Vec<Texture>,
    pub vertices: Vec<DVertex>,
    pub visdata: Vec<u8>,
    pub nodes: Vec<DNode>,
    pub texinfos: Vec<DTexInfo>,
    pub faces: Vec<DFace>,
    pub lightdata: Vec<u8>,
    pub clipnodes: Vec<DClipNode>,
    pub leaves: Vec<DLeaf>,
    pub marksurfaces: Vec<u16>,
    pub edges: Vec<DEdge>,
    pub surfedges: Vec<i32>,
    pub models: Vec<DModel>,
}

// ============================================================
// Byte helpers
// ============================================================

fn r_i16(b: &[u8], o: usize) -> i16 {
    i16::from_le_bytes([b[o], b[o + 1]])
}

fn r_u16(b: &[u8], o: usize) -> u16 {
    u16::from_le_bytes([b[o], b[o + 1]])
}

fn r_i32(b: &[u8], o: usize) -> i32 {
    i32::from_le_bytes([b[o], b[o + 1], b[o + 2], b[o + 3]])
}

fn r_f32(b: &[u8], o: usize) -> f32 {
    f32::from_le_bytes([b[o], b[o + 1], b[o + 2], b[o + 3]])
}

fn w_i16(out: &mut Vec<u8>, v: i16) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn w_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn w_i32(out: &mut Vec<u8>, v: i32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn w_f32(out: &mut Vec<u8>, v: f32) {
    out.extend_from_slice(&v.to_le_bytes());
}

/// Validates stride alignment and returns the record count.
fn lump_count(name: &'static str, len: usize, stride: usize) -> Result<usize, BspError> {
    if len % stride != 0 {
        return Err(BspError::FunnyLumpSize { name, len });
    }
    Ok(len / stride)
}

// ============================================================
// Record codecs
// ============================================================

fn parse_plane(b: &[u8]) -> DPlane {
    DPlane {
        normal: [r_f32(b, 0), r_f32(b, 4), r_f32(b, 8)],
        dist: r_f32(b, 12),
        plane_type: r_i32(b, 16),
    }
}

fn parse_vertex(b: &[u8]) -> DVertex {
    DVertex {
        point: [r_f32(b, 0), r_f32(b, 4), r_f32(b, 8)],
    }
}

fn parse_texinfo(b: &[u8]) -> DTexInfo {
    let mut vecs = [[0f32; 4]; 2];
    for (i, row) in vecs.iter_mut().enumerate() {
        for (j, v) in row.iter_mut().enumerate() {
            *v = r_f32(b, i * 16 + j * 4);
        }
    }
    DTexInfo {
        vecs,
        miptex: r_i32(b, 32),
        flags: r_i32(b, 36),
    }
}

fn parse_face(b: &[u8]) -> DFace {
    DFace {
        planenum: r_u16(b, 0),
        side: r_u16(b, 2),
        firstedge: r_i32(b, 4),
        numedges: r_u16(b, 8),
        texinfo: r_u16(b, 10),
        styles: [b[12], b[13], b[14], b[15]],
        lightofs: r_i32(b, 16),
    }
}

fn parse_node(b: &[u8]) -> DNode {
    DNode {
        planenum: r_i32(b, 0),
        children: [r_i16(b, 4), r_i16(b, 6)],
        mins: [r_i16(b, 8), r_i16(b, 10), r_i16(b, 12)],
        maxs: [r_i16(b, 14), r_i16(b, 16), r_i16(b, 18)],
        firstface: r_u16(b, 20),
        numfaces: r_u16(b, 22),
    }
}

fn parse_clipnode(b: &[u8]) -> DClipNode {
    DClipNode {
        planenum: r_i32(b, 0),
        children: [r_i16(b, 4), r_i16(b, 6)],
    }
}

fn parse_leaf(b: &[u8]) -> DLeaf {
    DLeaf {
        contents: r_i32(b, 0),
        visofs: r_i32(b, 4),
        mins: [r_i16(b, 8), r_i16(b, 10), r_i16(b, 12)],
        maxs: [r_i16(b, 14), r_i16(b, 16), r_i16(b, 18)],
        firstmarksurface: r_u16(b, 20),
        nummarksurfaces: r_u16(b, 22),
        ambient_level: [b[24], b[25], b[26], b[27]],
    }
}

fn parse_model(b: &[u8]) -> DModel {
    DModel {
        mins: [r_f32(b, 0), r_f32(b, 4), r_f32(b, 8)],
        maxs: [r_f32(b, 12), r_f32(b, 16), r_f32(b, 20)],
        origin: [r_f32(b, 24), r_f32(b, 28), r_f32(b, 32)],
        headnode: [r_i32(b, 36), r_i32(b, 40), r_i32(b, 44), r_i32(b, 48)],
        visleafs: r_i32(b, 52),
        firstface: r_i32(b, 56),
        numfaces: r_i32(b, 60),
    }
}

/// Parse a fixed-stride lump, in parallel when it is large enough.
fn parse_records<T: Send>(slice: &[u8], stride: usize, f: fn(&[u8]) -> T) -> Vec<T> {
    let count = slice.len() / stride;
    if count >= PARALLEL_LUMP_THRESHOLD {
        (0..count)
            .into_par_iter()
            .map(|i| f(&slice[i * stride..(i + 1) * stride]))
            .collect()
    } else {
        slice.chunks_exact(stride).map(f).collect()
    }
}

impl Map {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    // ============================================================
    // Loading
    // ============================================================

    pub fn load(path: &Path) -> Result<Self, BspError> {
        let data = fs::read(path)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let map = Self::parse(&name, &data)?;
        info!(
            map = %map.name,
            faces = map.faces.len(),
            models = map.models.len(),
            checksum = format_args!("{:08x}", CRC32.checksum(&data)),
            "loaded map"
        );
        Ok(map)
    }

    pub fn parse(name: &str, data: &[u8]) -> Result<Self, BspError> {
        if data.len() < HEADER_SIZE {
            return Err(BspError::Truncated(data.len()));
        }
        let version = r_i32(data, 0);
        if version != BSPVERSION {
            return Err(BspError::BadVersion {
                name: name.to_string(),
                version,
            });
        }

        let mut dirs = [LumpDir::default(); HEADER_LUMPS];
        for (i, dir) in dirs.iter_mut().enumerate() {
            dir.fileofs = r_i32(data, 4 + i * 8);
            dir.filelen = r_i32(data, 8 + i * 8);
        }

        let lump = |idx: usize| -> Result<&[u8], BspError> {
            let d = &dirs[idx];
            let (ofs, len) = (d.fileofs as usize, d.filelen as usize);
            if d.fileofs < 0 || d.filelen < 0 || ofs.saturating_add(len) > data.len() {
                return Err(BspError::LumpOutOfRange {
                    name: LUMP_NAMES[idx],
                    ofs,
                    len,
                });
            }
            Ok(&data[ofs..ofs + len])
        };

        let mut map = Map::new(name);

        let ent_slice = lump(LUMP_ENTITIES)?;
        if ent_slice.len() > MAX_MAP_ENTSTRING {
            return Err(BspError::EntStringTooLarge {
                len: ent_slice.len(),
                max: MAX_MAP_ENTSTRING,
            });
        }
        let ent_text = String::from_utf8_lossy(ent_slice);
        map.entities = entity::parse_entities(&ent_text)?;

        let s = lump(LUMP_PLANES)?;
        lump_count("planes", s.len(), SIZEOF_DPLANE)?;
        map.planes = parse_records(s, SIZEOF_DPLANE, parse_plane);

        map.textures = Self::parse_textures(lump(LUMP_TEXTURES)?)?;

        let s = lump(LUMP_VERTICES)?;
        lump_count("vertices", s.len(), SIZEOF_DVERTEX)?;
        map.vertices = parse_records(s, SIZEOF_DVERTEX, parse_vertex);

        map.visdata = lump(LUMP_VISIBILITY)?.to_vec();

        let s = lump(LUMP_NODES)?;
        lump_count("nodes", s.len(), SIZEOF_DNODE)?;
        map.nodes = parse_records(s, SIZEOF_DNODE, parse_node);

        let s = lump(LUMP_TEXINFO)?;
        lump_count("texinfo", s.len(), SIZEOF_DTEXINFO)?;
        map.texinfos = parse_records(s, SIZEOF_DTEXINFO, parse_texinfo);

        let s = lump(LUMP_FACES)?;
        lump_count("faces", s.len(), SIZEOF_DFACE)?;
        map.faces = parse_records(s, SIZEOF_DFACE, parse_face);

        map.lightdata = lump(LUMP_LIGHTING)?.to_vec();

        let s = lump(LUMP_CLIPNODES)?;
        lump_count("clipnodes", s.len(), SIZEOF_DCLIPNODE)?;
        map.clipnodes = parse_records(s, SIZEOF_DCLIPNODE, parse_clipnode);

        let s = lump(LUMP_LEAVES)?;
        lump_count("leaves", s.len(), SIZEOF_DLEAF)?;
        map.leaves = parse_records(s, SIZEOF_DLEAF, parse_leaf);

        let s = lump(LUMP_MARKSURFACES)?;
        lump_count("marksurfaces", s.len(), 2)?;
        map.marksurfaces = parse_records(s, 2, |b| r_u16(b, 0));

        let s = lump(LUMP_EDGES)?;
        lump_count("edges", s.len(), SIZEOF_DEDGE)?;
        map.edges = parse_records(s, SIZEOF_DEDGE, |b| DEdge {
            v: [r_u16(b, 0), r_u16(b, 2)],
        });

        let s = lump(LUMP_SURFEDGES)?;
        lump_count("surfedges", s.len(), 4)?;
        map.surfedges = parse_records(s, 4, |b| r_i32(b, 0));

        let s = lump(LUMP_MODELS)?;
        lump_count("models", s.len(), SIZEOF_DMODEL)?;
        map.models = parse_records(s, SIZEOF_DMODEL, parse_model);

        debug!(map = %map.name, "parsed all lumps");
        Ok(map)
    }

    fn parse_textures(slice: &[u8]) -> Result<Vec<Texture>, BspError> {
        if slice.is_empty() {
            return Ok(Vec::new());
        }
        if slice.len() < 4 {
            return Err(BspError::FunnyLumpSize {
                name: "textures",
                len: slice.len(),
            });
        }
        let count = r_i32(slice, 0);
        if count < 0 || 4 + count as usize * 4 > slice.len() {
            return Err(BspError::FunnyLumpSize {
                name: "textures",
                len: slice.len(),
            });
        }
        let count = count as usize;

        let offsets: Vec<i32> = (0..count).map(|i| r_i32(slice, 4 + i * 4)).collect();

        // Blob extent = from its offset to the next-greater offset (or the
        // lump end). Offsets are not guaranteed to be in file order.
        let mut sorted: Vec<usize> = offsets
            .iter()
            .filter(|&&o| o >= 0)
            .map(|&o| o as usize)
            .collect();
        sorted.sort_unstable();

        let mut textures = Vec::with_capacity(count);
        for (i, &ofs) in offsets.iter().enumerate() {
            if ofs < 0 {
                textures.push(Texture::default());
                continue;
            }
            let start = ofs as usize;
            if start < 4 + count * 4 || start > slice.len() {
                return Err(BspError::BadReference {
                    lump: "textures",
                    index: i,
                    field: "offset",
                    value: ofs as i64,
                    limit: slice.len(),
                });
            }
            let end = sorted
                .iter()
                .find(|&&o| o > start)
                .copied()
                .unwrap_or(slice.len());
            textures.push(Texture {
                bytes: slice[start..end].to_vec(),
            });
        }
        Ok(textures)
    }

    // ============================================================
    // Serialization
    // ============================================================

    pub fn serialize(&self) -> Vec<u8> {
        let mut lumps: Vec<Vec<u8>> = vec![Vec::new(); HEADER_LUMPS];

        let mut ent_text = entity::serialize_entities(&self.entities).into_bytes();
        ent_text.push(0);
        lumps[LUMP_ENTITIES] = ent_text;

        let mut out = Vec::new();
        for p in &self.planes {
            w_f32(&mut out, p.normal[0]);
            w_f32(&mut out, p.normal[1]);
            w_f32(&mut out, p.normal[2]);
            w_f32(&mut out, p.dist);
            w_i32(&mut out, p.plane_type);
        }
        lumps[LUMP_PLANES] = out;

        lumps[LUMP_TEXTURES] = self.serialize_textures();

        let mut out = Vec::new();
        for v in &self.vertices {
            w_f32(&mut out, v.point[0]);
            w_f32(&mut out, v.point[1]);
            w_f32(&mut out, v.point[2]);
        }
        lumps[LUMP_VERTICES] = out;

        lumps[LUMP_VISIBILITY] = self.visdata.clone();

        let mut out = Vec::new();
        for n in &self.nodes {
            w_i32(&mut out, n.planenum);
            w_i16(&mut out, n.children[0]);
            w_i16(&mut out, n.children[1]);
            for v in n.mins {
                w_i16(&mut out, v);
            }
            for v in n.maxs {
                w_i16(&mut out, v);
            }
            w_u16(&mut out, n.firstface);
            w_u16(&mut out, n.numfaces);
        }
        lumps[LUMP_NODES] = out;

        let mut out = Vec::new();
        for ti in &self.texinfos {
            for row in &ti.vecs {
                for &v in row {
                    w_f32(&mut out, v);
                }
            }
            w_i32(&mut out, ti.miptex);
            w_i32(&mut out, ti.flags);
        }
        lumps[LUMP_TEXINFO] = out;

        let mut out = Vec::new();
        for f in &self.faces {
            w_u16(&mut out, f.planenum);
            w_u16(&mut out, f.side);
            w_i32(&mut out, f.firstedge);
            w_u16(&mut out, f.numedges);
            w_u16(&mut out, f.texinfo);
            out.extend_from_slice(&f.styles);
            w_i32(&mut out, f.lightofs);
        }
        lumps[LUMP_FACES] = out;

        lumps[LUMP_LIGHTING] = self.lightdata.clone();

        let mut out = Vec::new();
        for cn in &self.clipnodes {
            w_i32(&mut out, cn.planenum);
            w_i16(&mut out, cn.children[0]);
            w_i16(&mut out, cn.children[1]);
        }
        lumps[LUMP_CLIPNODES] = out;

        let mut out = Vec::new();
        for l in &self.leaves {
            w_i32(&mut out, l.contents);
            w_i32(&mut out, l.visofs);
            for v in l.mins {
                w_i16(&mut out, v);
            }
            for v in l.maxs {
                w_i16(&mut out, v);
            }
            w_u16(&mut out, l.firstmarksurface);
            w_u16(&mut out, l.nummarksurfaces);
            out.extend_from_slice(&l.ambient_level);
        }
        lumps[LUMP_LEAVES] = out;

        let mut out = Vec::new();
        for &m in &self.marksurfaces {
            w_u16(&mut out, m);
        }
        lumps[LUMP_MARKSURFACES] = out;

        let mut out = Vec::new();
        for e in &self.edges {
            w_u16(&mut out, e.v[0]);
            w_u16(&mut out, e.v[1]);
        }
        lumps[LUMP_EDGES] = out;

        let mut out = Vec::new();
        for &se in &self.surfedges {
            w_i32(&mut out, se);
        }
        lumps[LUMP_SURFEDGES] = out;

        let mut out = Vec::new();
        for m in &self.models {
            for v in m.mins {
                w_f32(&mut out, v);
            }
            for v in m.maxs {
                w_f32(&mut out, v);
            }
            for v in m.origin {
                w_f32(&mut out, v);
            }
            for h in m.headnode {
                w_i32(&mut out, h);
            }
            w_i32(&mut out, m.visleafs);
            w_i32(&mut out, m.firstface);
            w_i32(&mut out, m.numfaces);
        }
        lumps[LUMP_MODELS] = out;

        // Assemble: header, then lumps in file order, 4-byte aligned.
        let mut file = Vec::new();
        w_i32(&mut file, BSPVERSION);
        file.resize(HEADER_SIZE, 0);

        let mut dirs = [LumpDir::default(); HEADER_LUMPS];
        for (i, lump) in lumps.iter().enumerate() {
            while file.len() % 4 != 0 {
                file.push(0);
            }
            dirs[i].fileofs = file.len() as i32;
            dirs[i].filelen = lump.len() as i32;
            file.extend_from_slice(lump);
        }
        for (i, d) in dirs.iter().enumerate() {
            file[4 + i * 8..8 + i * 8].copy_from_slice(&d.fileofs.to_le_bytes());
            file[8 + i * 8..12 + i * 8].copy_from_slice(&d.filelen.to_le_bytes());
        }
        file
    }

    fn serialize_textures(&self) -> Vec<u8> {
        if self.textures.is_empty() {
            return Vec::new();
        }
        let count = self.textures.len();
        let mut out = Vec::new();
        w_i32(&mut out, count as i32);

        let header = 4 + count * 4;
        let mut running = header;
        let mut offsets = Vec::with_capacity(count);
        for tex in &self.textures {
            if tex.is_placeholder() {
                offsets.push(-1i32);
            } else {
                while running % 4 != 0 {
                    running += 1;
                }
                offsets.push(running as i32);
                running += tex.bytes.len();
            }
        }
        for &o in &offsets {
            w_i32(&mut out, o);
        }
        for tex in &self.textures {
            if !tex.is_placeholder() {
                while out.len() % 4 != 0 {
                    out.push(0);
                }
                out.extend_from_slice(&tex.bytes);
            }
        }
        out
    }

    pub fn write(&self, path: &Path) -> Result<(), BspError> {
        let data = self.serialize();
        fs::write(path, &data)?;
        info!(
            map = %self.name,
            path = %path.display(),
            bytes = data.len(),
            checksum = format_args!("{:08x}", CRC32.checksum(&data)),
            "wrote map"
        );
        Ok(())
    }

    pub fn checksum(&self) -> u32 {
        CRC32.checksum(&self.serialize())
    }

    // ============================================================
    // Geometry
    // ============================================================

    /// World bounds: the worldspawn model's box, or a vertex scan for a
    /// map with no models.
    pub fn bounding_box(&self) -> Bounds {
        if let Some(world) = self.models.first() {
            return Bounds::new(world.mins, world.maxs);
        }
        let mut b = Bounds::cleared();
        for v in &self.vertices {
            b.add_point(&v.point);
        }
        b
    }

    /// Translate all geometry and entity origins by `offset`.
    pub fn translate(&mut self, offset: &Vec3) {
        if vector_is_zero(offset) {
            return;
        }
        for v in &mut self.vertices {
            v.point = vector_add(&v.point, offset);
        }
        for p in &mut self.planes {
            p.dist += dot_product(&p.normal, offset);
        }
        for n in &mut self.nodes {
            translate_short_bounds(&mut n.mins, &mut n.maxs, offset);
        }
        for l in &mut self.leaves {
            translate_short_bounds(&mut l.mins, &mut l.maxs, offset);
        }
        for m in &mut self.models {
            m.mins = vector_add(&m.mins, offset);
            m.maxs = vector_add(&m.maxs, offset);
            if !vector_is_zero(&m.origin) {
                m.origin = vector_add(&m.origin, offset);
            }
        }
        for ent in &mut self.entities {
            if let Some(origin) = ent.origin() {
                ent.set_origin(&vector_add(&origin, offset));
            }
        }
        debug!(map = %self.name, ?offset, "translated map");
    }

    // ============================================================
    // Validation
    // ============================================================

    /// Check every cross-lump reference and walk every tree iteratively,
    /// rejecting out-of-range indices and repeated node visits.
    pub fn validate(&self) -> Result<(), BspError> {
        let bad = |lump, index, field, value: i64, limit| {
            Err(BspError::BadReference {
                lump,
                index,
                field,
                value,
                limit,
            })
        };

        for (i, ti) in self.texinfos.iter().enumerate() {
            if ti.miptex < 0 || ti.miptex as usize >= self.textures.len() {
                return bad("texinfo", i, "miptex", ti.miptex as i64, self.textures.len());
            }
        }

        for (i, f) in self.faces.iter().enumerate() {
            if f.planenum as usize >= self.planes.len() {
                return bad("faces", i, "planenum", f.planenum as i64, self.planes.len());
            }
            if f.texinfo as usize >= self.texinfos.len() {
                return bad("faces", i, "texinfo", f.texinfo as i64, self.texinfos.len());
            }
            let flags = TexFlags::from_bits_truncate(self.texinfos[f.texinfo as usize].flags);
            if flags.contains(TexFlags::SPECIAL) && f.lightofs >= 0 {
                debug!(map = %self.name, face = i, "special surface carries a lightmap offset");
            }
            let end = f.firstedge as i64 + f.numedges as i64;
            if f.firstedge < 0 || end > self.surfedges.len() as i64 {
                return bad("faces", i, "firstedge", end, self.surfedges.len());
            }
            if f.lightofs >= 0 && !self.lightdata.is_empty() {
                if f.lightofs as usize >= self.lightdata.len() {
                    return bad("faces", i, "lightofs", f.lightofs as i64, self.lightdata.len());
                }
            }
        }

        for (i, &m) in self.marksurfaces.iter().enumerate() {
            if m as usize >= self.faces.len() {
                return bad("marksurfaces", i, "face", m as i64, self.faces.len());
            }
        }

        for (i, l) in self.leaves.iter().enumerate() {
            let end = l.firstmarksurface as usize + l.nummarksurfaces as usize;
            if end > self.marksurfaces.len() {
                return bad("leaves", i, "marksurface range", end as i64, self.marksurfaces.len());
            }
            if l.visofs >= 0 && !self.visdata.is_empty() && l.visofs as usize >= self.visdata.len() {
                return bad("leaves", i, "visofs", l.visofs as i64, self.visdata.len());
            }
        }

        for (i, e) in self.edges.iter().enumerate() {
            for &v in &e.v {
                if v as usize >= self.vertices.len() && !(i == 0 && v == 0) {
                    return bad("edges", i, "vertex", v as i64, self.vertices.len());
                }
            }
        }

        for (i, &se) in self.surfedges.iter().enumerate() {
            if se.unsigned_abs() as usize >= self.edges.len() {
                return bad("surfedges", i, "edge", se as i64, self.edges.len());
            }
        }

        for (i, n) in self.nodes.iter().enumerate() {
            if n.planenum < 0 || n.planenum as usize >= self.planes.len() {
                return bad("nodes", i, "planenum", n.planenum as i64, self.planes.len());
            }
            for &c in &n.children {
                match NodeChild::from_raw(c) {
                    NodeChild::Node(idx) if idx >= self.nodes.len() => {
                        return bad("nodes", i, "child node", idx as i64, self.nodes.len());
                    }
                    NodeChild::Leaf(idx) if idx >= self.leaves.len() => {
                        return bad("nodes", i, "child leaf", idx as i64, self.leaves.len());
                    }
                    _ => {}
                }
            }
        }

        for (i, cn) in self.clipnodes.iter().enumerate() {
            if cn.planenum < 0 || cn.planenum as usize >= self.planes.len() {
                return bad("clipnodes", i, "planenum", cn.planenum as i64, self.planes.len());
            }
            for &c in &cn.children {
                if let ClipChild::Node(idx) = ClipChild::from_raw(c) {
                    if idx >= self.clipnodes.len() {
                        return bad("clipnodes", i, "child", idx as i64, self.clipnodes.len());
                    }
                }
            }
        }

        for (i, m) in self.models.iter().enumerate() {
            let end = m.firstface as i64 + m.numfaces as i64;
            if m.firstface < 0 || end > self.faces.len() as i64 {
                return bad("models", i, "face range", end, self.faces.len());
            }
            if m.headnode[0] >= 0 {
                if m.headnode[0] as usize >= self.nodes.len() {
                    return bad("models", i, "headnode", m.headnode[0] as i64, self.nodes.len());
                }
            } else if m.headnode[0] != -1 {
                // leaf-encoded head; -1 is the no-geometry sentinel
                let leaf = (-m.headnode[0] - 1) as usize;
                if leaf >= self.leaves.len() {
                    return bad("models", i, "headnode leaf", m.headnode[0] as i64, self.leaves.len());
                }
            }
            for h in 1..MAX_MAP_HULLS {
                if m.headnode[h] >= 0 && m.headnode[h] as usize >= self.clipnodes.len() {
                    return bad("models", i, "hull headnode", m.headnode[h] as i64, self.clipnodes.len());
                }
            }
        }

        self.check_trees()
    }

    /// Walk every model's render tree and clip trees with an explicit
    /// stack. A node seen twice in one walk means the tree has a cycle
    /// or a shared subtree, either of which the merge must never create.
    fn check_trees(&self) -> Result<(), BspError> {
        for m in &self.models {
            if m.headnode[0] >= 0 && !self.nodes.is_empty() {
                let mut visited = vec![false; self.nodes.len()];
                let mut stack = vec![m.headnode[0] as usize];
                while let Some(n) = stack.pop() {
                    if visited[n] {
                        return Err(BspError::CyclicTree { hull: 0, node: n });
                    }
                    visited[n] = true;
                    for &c in &self.nodes[n].children {
                        if let NodeChild::Node(idx) = NodeChild::from_raw(c) {
                            stack.push(idx);
                        }
                    }
                }
            }
            for hull in 1..MAX_MAP_HULLS {
                if m.headnode[hull] < 0 || self.clipnodes.is_empty() {
                    continue;
                }
                let mut visited = vec![false; self.clipnodes.len()];
                let mut stack = vec![m.headnode[hull] as usize];
                while let Some(n) = stack.pop() {
                    if visited[n] {
                        return Err(BspError::CyclicTree { hull, node: n });
                    }
                    visited[n] = true;
                    for &c in &self.clipnodes[n].children {
                        if let ClipChild::Node(idx) = ClipChild::from_raw(c) {
                            stack.push(idx);
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

fn translate_short_bounds(mins: &mut [i16; 3], maxs: &mut [i16; 3], offset: &Vec3) {
    for i in 0..3 {
        let lo = (mins[i] as f32 + offset[i]).round();
        let hi = (maxs[i] as f32 + offset[i]).round();
        mins[i] = lo.clamp(i16::MIN as f32, i16::MAX as f32) as i16;
        maxs[i] = hi.clamp(i16::MIN as f32, i16::MAX as f32) as i16;
    }
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::tiny_map;

    #[test]
    fn tiny_map_validates() {
        tiny_map("a").validate().unwrap();
    }

    #[test]
    fn serialize_parse_round_trip() {
        let map = tiny_map("roundtrip");
        let data = map.serialize();
        let again = Map::parse("roundtrip", &data).unwrap();
        assert_eq!(map.planes, again.planes);
        assert_eq!(map.vertices, again.vertices);
        assert_eq!(map.texinfos, again.texinfos);
        assert_eq!(map.faces, again.faces);
        assert_eq!(map.nodes, again.nodes);
        assert_eq!(map.clipnodes, again.clipnodes);
        assert_eq!(map.leaves, again.leaves);
        assert_eq!(map.marksurfaces, again.marksurfaces);
        assert_eq!(map.edges, again.edges);
        assert_eq!(map.surfedges, again.surfedges);
        assert_eq!(map.models, again.models);
        assert_eq!(map.textures, again.textures);
        assert_eq!(map.lightdata, again.lightdata);
        assert_eq!(map.entities, again.entities);
    }

    #[test]
    fn parse_rejects_wrong_version() {
        let mut data = tiny_map("v29").serialize();
        data[0..4].copy_from_slice(&29i32.to_le_bytes());
        assert!(matches!(
            Map::parse("v29", &data),
            Err(BspError::BadVersion { version: 29, .. })
        ));
    }

    #[test]
    fn parse_rejects_truncated_header() {
        assert!(matches!(
            Map::parse("small", &[0u8; 16]),
            Err(BspError::Truncated(16))
        ));
    }

    #[test]
    fn parse_rejects_lump_past_eof() {
        let mut data = tiny_map("eof").serialize();
        // point the faces lump past the end of the file
        let dir = 4 + LUMP_FACES * 8;
        let end = data.len() as i32;
        data[dir..dir + 4].copy_from_slice(&end.to_le_bytes());
        data[dir + 4..dir + 8].copy_from_slice(&400i32.to_le_bytes());
        assert!(matches!(
            Map::parse("eof", &data),
            Err(BspError::LumpOutOfRange { name: "faces", .. })
        ));
    }

    #[test]
    fn parse_rejects_funny_lump_size() {
        let mut data = tiny_map("odd").serialize();
        let dir = 4 + LUMP_PLANES * 8;
        let len = i32::from_le_bytes(data[dir + 4..dir + 8].try_into().unwrap());
        data[dir + 4..dir + 8].copy_from_slice(&(len - 1).to_le_bytes());
        assert!(matches!(
            Map::parse("odd", &data),
            Err(BspError::FunnyLumpSize { name: "planes", .. })
        ));
    }

    #[test]
    fn validate_catches_bad_face_plane() {
        let mut map = tiny_map("badplane");
        map.faces[0].planenum = 99;
        assert!(matches!(
            map.validate(),
            Err(BspError::BadReference { lump: "faces", .. })
        ));
    }

    #[test]
    fn validate_catches_bad_texinfo_miptex() {
        let mut map = tiny_map("badtex");
        map.texinfos[0].miptex = 5;
        assert!(map.validate().is_err());
    }

    #[test]
    fn validate_catches_node_cycle() {
        let mut map = tiny_map("cycle");
        map.nodes.push(DNode {
            planenum: 0,
            children: [0, NodeChild::Leaf(0).to_raw()],
            ..Default::default()
        });
        map.nodes[0].children[1] = 1; // 0 -> 1 -> 0
        map.models[0].headnode[0] = 0;
        assert!(matches!(map.validate(), Err(BspError::CyclicTree { hull: 0, .. })));
    }

    #[test]
    fn translate_moves_geometry_and_entities() {
        let mut map = tiny_map("move");
        map.translate(&[164.0, 0.0, 0.0]);
        assert_eq!(map.vertices[1].point, [228.0, 0.0, 0.0]);
        // plane 0 is z-up, unaffected; plane 1 is x-facing
        assert_eq!(map.planes[0].dist, 0.0);
        assert_eq!(map.planes[1].dist, 228.0);
        assert_eq!(map.models[0].mins[0], 164.0);
        assert_eq!(map.nodes[0].mins[0], 164);
        let start = map
            .entities
            .iter()
            .find(|e| e.classname() == "info_player_start")
            .unwrap();
        assert_eq!(start.origin(), Some([196.0, 32.0, 36.0]));
        map.validate().unwrap();
    }

    #[test]
    fn bounding_box_uses_world_model() {
        let map = tiny_map("bbox");
        let b = map.bounding_box();
        assert_eq!(b.mins, [0.0, 0.0, 0.0]);
        assert_eq!(b.maxs, [64.0, 64.0, 64.0]);
    }

    #[test]
    fn texture_accessors() {
        let map = tiny_map("tex");
        assert_eq!(map.textures[0].name(), "BRICK");
        assert_eq!(map.textures[0].width(), 16);
        assert_eq!(map.textures[0].height(), 16);
        assert!(!map.textures[0].is_placeholder());
    }

    #[test]
    fn placeholder_texture_round_trip() {
        let mut map = tiny_map("placeholder");
        map.textures.push(Texture::default());
        map.texinfos[0].miptex = 0;
        let again = Map::parse("placeholder", &map.serialize()).unwrap();
        assert_eq!(again.textures.len(), 2);
        assert!(again.textures[1].is_placeholder());
    }
}
