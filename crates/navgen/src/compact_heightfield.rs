//! Compact heightfield input model
//!
//! The compact heightfield is the read-only input of the contour stage: a
//! width x height grid of cells, each indexing a run of open spans, with
//! per-direction horizontal neighbour links and a region id assigned by the
//! upstream watershed partitioning.

use glam::Vec3;

/// Sentinel for a missing neighbour link
pub const NOT_CONNECTED: u8 = 0x3f;

/// High bit of the region field, set on spans rasterised into the tile border
pub const BORDER_REG: u16 = 0x8000;

/// Offset in x for each of the four cardinal directions (x-, z+, x+, z-)
const DIR_OFFSET_X: [i32; 4] = [-1, 0, 1, 0];
/// Offset in z for each of the four cardinal directions
const DIR_OFFSET_Y: [i32; 4] = [0, 1, 0, -1];

/// Gets the x offset for a direction
#[inline]
pub fn dir_offset_x(dir: usize) -> i32 {
    DIR_OFFSET_X[dir & 0x3]
}

/// Gets the z offset for a direction
#[inline]
pub fn dir_offset_y(dir: usize) -> i32 {
    DIR_OFFSET_Y[dir & 0x3]
}

/// A cell column of the heightfield, indexing a run in the span array
#[derive(Debug, Clone, Copy, Default)]
pub struct CompactCell {
    /// Index of the first span in the cell
    pub index: usize,
    /// Number of spans in the cell
    pub count: usize,
}

/// An open span: walkable floor with per-direction neighbour links
#[derive(Debug, Clone, Copy)]
pub struct CompactSpan {
    /// Minimum height of the span in cell-height units
    pub y: u16,
    /// Region id, with the high bit reserved for [`BORDER_REG`]
    pub reg: u16,
    /// Neighbour links per direction: [`NOT_CONNECTED`] or an index into the
    /// destination cell's span run
    pub con: [u8; 4],
}

impl CompactSpan {
    /// Creates an unconnected span
    pub fn new(y: u16, reg: u16) -> Self {
        Self {
            y,
            reg,
            con: [NOT_CONNECTED; 4],
        }
    }
}

/// Compact heightfield structure
#[derive(Debug, Clone)]
pub struct CompactHeightfield {
    /// Width of the heightfield along the x-axis
    pub width: i32,
    /// Height (depth) of the heightfield along the z-axis
    pub height: i32,
    /// Size of the non-navigable border around the grid, in cells
    pub border_size: i32,
    /// Cell size (horizontal resolution)
    pub cs: f32,
    /// Cell height (vertical resolution)
    pub ch: f32,
    /// The minimum bounds of the heightfield's AABB
    pub bmin: Vec3,
    /// The maximum bounds of the heightfield's AABB
    pub bmax: Vec3,
    /// Highest region id assigned by the partitioning
    pub max_regions: u16,
    /// Grid of cells, indexed by `x + y * width`
    pub cells: Vec<CompactCell>,
    /// All spans of the grid
    pub spans: Vec<CompactSpan>,
    /// Area tag per span, parallel to `spans`
    pub areas: Vec<u8>,
}

impl CompactHeightfield {
    /// Creates an empty heightfield covering the given grid
    pub fn new(width: i32, height: i32, bmin: Vec3, bmax: Vec3, cs: f32, ch: f32) -> Self {
        Self {
            width,
            height,
            border_size: 0,
            cs,
            ch,
            bmin,
            bmax,
            max_regions: 0,
            cells: vec![CompactCell::default(); (width * height) as usize],
            spans: Vec::new(),
            areas: Vec::new(),
        }
    }

    /// Resolves the neighbour link of span `i` (located in cell `(x, y)`) in
    /// the given direction to a global span index.
    #[inline]
    pub fn neighbor_index(&self, x: i32, y: i32, i: usize, dir: usize) -> Option<usize> {
        let link = self.spans[i].con[dir];
        if link == NOT_CONNECTED {
            return None;
        }
        let ax = x + dir_offset_x(dir);
        let ay = y + dir_offset_y(dir);
        let cell = &self.cells[(ax + ay * self.width) as usize];
        Some(cell.index + link as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dir_offsets_are_cardinal() {
        for dir in 0..4 {
            assert_eq!(dir_offset_x(dir).abs() + dir_offset_y(dir).abs(), 1);
        }
        // Opposite directions cancel
        assert_eq!(dir_offset_x(0), -dir_offset_x(2));
        assert_eq!(dir_offset_y(1), -dir_offset_y(3));
    }

    #[test]
    fn test_neighbor_index_resolution() {
        let mut chf = CompactHeightfield::new(
            2,
            1,
            Vec3::ZERO,
            Vec3::new(2.0, 1.0, 1.0),
            1.0,
            1.0,
        );
        chf.cells[0] = CompactCell { index: 0, count: 1 };
        chf.cells[1] = CompactCell { index: 1, count: 1 };
        let mut a = CompactSpan::new(0, 1);
        a.con[2] = 0; // x+ link into cell (1, 0), first span
        chf.spans.push(a);
        chf.spans.push(CompactSpan::new(0, 1));
        chf.areas.extend_from_slice(&[1, 1]);

        assert_eq!(chf.neighbor_index(0, 0, 0, 2), Some(1));
        assert_eq!(chf.neighbor_index(0, 0, 0, 0), None);
    }
}
