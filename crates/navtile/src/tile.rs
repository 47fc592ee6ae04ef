//! Tile data model
//!
//! The structures here make up the serialisable pathfinding tile produced by
//! the assembler. Downstream consumers (queries, tile I/O) only read them.

use glam::Vec3;

use crate::MAX_VERTS_PER_POLY;

/// What a tile polygon represents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum PolyType {
    /// A walkable surface polygon
    Ground,
    /// A 2-vertex off-mesh connection
    OffMeshConnection,
}

/// Tile header information
#[derive(Debug, Clone)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct TileHeader {
    /// Tile grid position
    pub x: i32,
    pub y: i32,
    /// Layer of the tile at its grid position
    pub layer: i32,
    /// User defined tile id
    pub user_id: u32,
    /// Number of polygons, off-mesh connection polygons included
    pub poly_count: i32,
    /// Number of vertices, off-mesh endpoints included
    pub vert_count: i32,
    /// Upper bound of links the tile's polygons can hold
    pub max_link_count: i32,
    /// The minimum bounds of the tile AABB
    pub bmin: Vec3,
    /// The maximum bounds of the tile AABB
    pub bmax: Vec3,
    /// Number of detail sub-meshes
    pub detail_mesh_count: i32,
    /// Number of unique detail vertices, polygon vertices excluded
    pub detail_vert_count: i32,
    /// Number of detail triangles
    pub detail_tri_count: i32,
    /// Quantisation factor of the BV tree bounds (inverse cell size)
    pub bv_quant_factor: f32,
    /// Index of the first off-mesh connection polygon
    pub off_mesh_base: i32,
    /// Number of stored off-mesh connections
    pub off_mesh_con_count: i32,
    /// Construction bound of the BV tree node array
    pub bv_node_count: i32,
    /// Agent height the tile was built for
    pub walkable_height: f32,
    /// Agent radius the tile was built for
    pub walkable_radius: f32,
    /// Maximum climb the tile was built for
    pub walkable_climb: f32,
}

/// Polygon in the tile
#[derive(Debug, Clone)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct TilePoly {
    /// Vertex indices into the tile vertex array
    pub verts: [u16; MAX_VERTS_PER_POLY],
    /// Per-edge neighbour codes: 0 = none, n+1 = internal neighbour n,
    /// [`crate::EXT_LINK`] | side = cross-tile portal
    pub neis: [u16; MAX_VERTS_PER_POLY],
    /// User defined polygon flags
    pub flags: u16,
    /// Number of vertices used
    pub vert_count: u8,
    /// Area id of the polygon
    pub area: u8,
    /// Polygon type
    pub poly_type: PolyType,
}

impl TilePoly {
    /// Creates an empty polygon
    pub fn new(area: u8, poly_type: PolyType, flags: u16) -> Self {
        Self {
            verts: [0; MAX_VERTS_PER_POLY],
            neis: [0; MAX_VERTS_PER_POLY],
            flags,
            vert_count: 0,
            area,
            poly_type,
        }
    }
}

/// Detail sub-mesh of a polygon
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct PolyDetail {
    /// First vertex in the detail vertex array
    pub vert_base: u32,
    /// First triangle in the detail triangle array
    pub tri_base: u32,
    /// Number of detail vertices beyond the polygon's own
    pub vert_count: u8,
    /// Number of detail triangles
    pub tri_count: u8,
}

/// Bounding volume tree node
///
/// Bounds are quantised to cell-size units. A non-negative index is a leaf
/// polygon index; a negative index is the escape offset past the node's
/// subtree, enabling stack-free traversal in preorder.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct BvNode {
    /// Quantised minimum bounds
    pub bmin: [u16; 3],
    /// Quantised maximum bounds
    pub bmax: [u16; 3],
    /// Leaf polygon index, or negative escape offset
    pub i: i32,
}

/// Off-mesh connection attached to the tile
#[derive(Debug, Clone)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct OffMeshConnection {
    /// Endpoint positions \[sx, sy, sz, ex, ey, ez\]
    pub pos: [f32; 6],
    /// Connection radius
    pub radius: f32,
    /// Index of the connection's 2-vertex polygon in the tile
    pub poly: u16,
    /// Link flags ([`crate::OFF_MESH_CON_BIDIR`])
    pub flags: u8,
    /// Tile edge the end point leaves through, 0xff when interior
    pub side: u8,
    /// User defined connection id
    pub user_id: u32,
}

/// A fully assembled pathfinding tile
#[derive(Debug, Clone)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct NavTile {
    /// Tile header
    pub header: TileHeader,
    /// World-space vertices [x, y, z, ...]
    pub verts: Vec<f32>,
    /// Tile polygons, off-mesh connection polygons at the end
    pub polys: Vec<TilePoly>,
    /// Detail sub-mesh per ground polygon
    pub detail_meshes: Vec<PolyDetail>,
    /// Detail vertices [x, y, z, ...]
    pub detail_verts: Vec<f32>,
    /// Detail triangles, 4 bytes each: 3 indices + boundary edge flags
    pub detail_tris: Vec<u8>,
    /// Bounding volume tree in preorder, empty when not built
    pub bv_nodes: Vec<BvNode>,
    /// Stored off-mesh connections
    pub off_mesh_cons: Vec<OffMeshConnection>,
}
