// testutil.rs — shared map fixture for tests across the workspace
//
// Compiled for this crate's own tests and, via the `test-fixtures`
// feature, for dependent crates' test targets.

use crate::bspfile::*;
use crate::entity::Entity;
use crate::map::{Map, Texture};

/// One-room map: a single floor face, two leaves (solid + room), one
/// render node, one clipnode, the world model and a spawn point.
/// Validates clean, so tests can start from a known-good input.
pub fn tiny_map(name: &str) -> Map {
    let mut map = Map::new(name);

    map.planes.push(DPlane {
        normal: [0.0, 0.0, 1.0],
        dist: 0.0,
        plane_type: PLANE_Z,
    });
    map.planes.push(DPlane {
        normal: [1.0, 0.0, 0.0],
        dist: 64.0,
        plane_type: PLANE_X,
    });

    let mut tex = Texture::default();
    tex.bytes = {
        let mut b = vec![0u8; MIPTEX_HEADER_SIZE];
        b[..5].copy_from_slice(b"BRICK");
        b[16..20].copy_from_slice(&16u32.to_le_bytes());
        b[20..24].copy_from_slice(&16u32.to_le_bytes());
        b
    };
    map.textures.push(tex);

    map.vertices.push(DVertex { point: [0.0, 0.0, 0.0] });
    map.vertices.push(DVertex { point: [64.0, 0.0, 0.0] });
    map.vertices.push(DVertex { point: [64.0, 64.0, 0.0] });
    map.vertices.push(DVertex { point: [0.0, 64.0, 0.0] });

    map.edges.push(DEdge { v: [0, 0] }); // edge 0 is unused by convention
    map.edges.push(DEdge { v: [0, 1] });
    map.edges.push(DEdge { v: [1, 2] });
    map.edges.push(DEdge { v: [2, 3] });
    map.edges.push(DEdge { v: [3, 0] });
    map.surfedges.extend_from_slice(&[1, 2, 3, 4]);

    map.texinfos.push(DTexInfo {
        vecs: [[1.0, 0.0, 0.0, 0.0], [0.0, 1.0, 0.0, 0.0]],
        miptex: 0,
        flags: 0,
    });

    map.faces.push(DFace {
        planenum: 0,
        side: 0,
        firstedge: 0,
        numedges: 4,
        texinfo: 0,
        styles: [0, 255, 255, 255],
        lightofs: 0,
    });
    map.lightdata = vec![255u8; 16 * 16 * 3];

    map.marksurfaces.push(0);

    // leaf 0: shared solid leaf; leaf 1: the room
    map.leaves.push(DLeaf {
        contents: CONTENTS_SOLID,
        ..Default::default()
    });
    map.leaves.push(DLeaf {
        contents: CONTENTS_EMPTY,
        visofs: -1,
        mins: [0, 0, 0],
        maxs: [64, 64, 64],
        firstmarksurface: 0,
        nummarksurfaces: 1,
        ambient_level: [0; 4],
    });

    map.nodes.push(DNode {
        planenum: 0,
        children: [NodeChild::Leaf(1).to_raw(), NodeChild::Leaf(0).to_raw()],
        mins: [0, 0, 0],
        maxs: [64, 64, 64],
        firstface: 0,
        numfaces: 1,
    });

    map.clipnodes.push(DClipNode {
        planenum: 0,
        children: [CONTENTS_EMPTY as i16, CONTENTS_SOLID as i16],
    });

    map.models.push(DModel {
        mins: [0.0, 0.0, 0.0],
        maxs: [64.0, 64.0, 64.0],
        origin: [0.0; 3],
        headnode: [0, 0, 0, 0],
        visleafs: 1,
        firstface: 0,
        numfaces: 1,
    });

    let mut world = Entity::new("worldspawn");
    world.set("wad", "halflife.wad");
    map.entities.push(world);
    let mut start = Entity::new("info_player_start");
    start.set_origin(&[32.0, 32.0, 36.0]);
    map.entities.push(start);

    map
}
