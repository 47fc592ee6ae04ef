//! Pathfinding tile assembly
//!
//! This crate packs the output of the upstream polygoniser into a pathfinding
//! tile: world-space vertices, polygons with edge adjacency and cross-tile
//! portal codes, a detail mesh, off-mesh connection polygons, and an optional
//! bounding-volume tree over the polygons.

mod builder;
mod tile;

pub use builder::{build_tile, classify_off_mesh_point, TileBuildParams};
pub use tile::{BvNode, NavTile, OffMeshConnection, PolyDetail, PolyType, TileHeader, TilePoly};

/// Maximum number of vertices per navigation polygon
pub const MAX_VERTS_PER_POLY: usize = 6;

/// Marks unused slots in polygon vertex arrays
pub const MESH_NULL_IDX: u16 = 0xffff;

/// High bit of a neighbour code, marking a cross-tile portal edge. The low
/// nibble encodes the side: 0 = x+, 2 = z+, 4 = x-, 6 = z-.
pub const EXT_LINK: u16 = 0x8000;

/// Off-mesh connection flag: traversable in both directions
pub const OFF_MESH_CON_BIDIR: u8 = 1;
