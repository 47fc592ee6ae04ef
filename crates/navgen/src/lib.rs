//! Contour extraction for navigation mesh generation
//!
//! This crate converts a voxelised compact heightfield that has already been
//! partitioned into connected regions into a set of simplified, oriented
//! boundary contours, one per region. The contours feed the downstream
//! polygoniser and tile assembler.

mod compact_heightfield;
mod config;
mod contour;

pub use compact_heightfield::{
    dir_offset_x, dir_offset_y, CompactCell, CompactHeightfield, CompactSpan, BORDER_REG,
    NOT_CONNECTED,
};
pub use config::ContourBuildConfig;
pub use contour::{
    Contour, ContourBuildFlags, ContourSet, AREA_BORDER, BORDER_VERTEX, REGION_MASK,
};
