//! Contour generation
//!
//! This module traces region boundaries on the compact heightfield, simplifies
//! the traced polylines under a deviation bound, and merges hole contours into
//! their enclosing outer contour. The produced contour set is the input of the
//! downstream polygoniser.

use glam::Vec3;
use navgen_common::{
    dist_point_segment_sqr_2d, dist_sqr_2d, left_on, polygon_area_2d, sqr, Result,
};

use crate::compact_heightfield::{dir_offset_x, dir_offset_y, CompactHeightfield, BORDER_REG};

/// Flag word bit marking a vertex on a special tile-border edge
pub const BORDER_VERTEX: i32 = 0x10000;
/// Flag word bit marking a vertex whose edge crosses into a different area
pub const AREA_BORDER: i32 = 0x20000;
/// Mask of the neighbouring-region id in a vertex flag word
pub const REGION_MASK: i32 = 0xffff;

/// Hard cap on boundary trace length, guards against malformed input
const MAX_TRACE_ITER: i32 = 40_000;

/// Which edge classes the length-split pass tessellates
#[derive(Debug, Clone, Copy)]
pub struct ContourBuildFlags {
    /// Split long edges facing unwalkable space
    pub tess_wall_edges: bool,
    /// Split long edges between different areas
    pub tess_area_edges: bool,
}

impl Default for ContourBuildFlags {
    fn default() -> Self {
        Self {
            tess_wall_edges: true,
            tess_area_edges: false,
        }
    }
}

/// A simplified region boundary
///
/// Vertices are stored as flat arrays of four ints: x and z in cell units,
/// y in cell-height units, and a flag word packing the neighbouring region id
/// ([`REGION_MASK`]) with [`BORDER_VERTEX`] and [`AREA_BORDER`].
#[derive(Debug, Clone)]
pub struct Contour {
    /// Simplified vertices, 4 ints each
    pub verts: Vec<i32>,
    /// Raw vertices from the boundary trace, 4 ints each
    pub raw_verts: Vec<i32>,
    /// Region id of the traced region
    pub reg: u16,
    /// Area tag of the traced region
    pub area: u8,
}

impl Contour {
    /// Number of simplified vertices
    pub fn nverts(&self) -> usize {
        self.verts.len() / 4
    }

    /// Number of raw vertices
    pub fn nraw_verts(&self) -> usize {
        self.raw_verts.len() / 4
    }
}

/// A set of contours in tile-frame coordinates
#[derive(Debug, Clone)]
pub struct ContourSet {
    /// Contours, at most one outer boundary per region plus unmerged holes
    pub contours: Vec<Contour>,
    /// The minimum bounds of the tile AABB
    pub bmin: Vec3,
    /// The maximum bounds of the tile AABB
    pub bmax: Vec3,
    /// Cell size (horizontal resolution)
    pub cs: f32,
    /// Cell height (vertical resolution)
    pub ch: f32,
    /// Logical width of the set, border excluded
    pub width: i32,
    /// Logical height (depth) of the set, border excluded
    pub height: i32,
    /// Border size the heightfield was built with, in cells
    pub border_size: i32,
    /// Simplification tolerance the set was built with
    pub max_error: f32,
}

impl ContourSet {
    /// Builds contours from a region-partitioned compact heightfield.
    ///
    /// `max_error` bounds the deviation of simplified edges from the raw
    /// trace in world units; `max_edge_len` splits long edges (0 disables).
    pub fn build(
        chf: &CompactHeightfield,
        max_error: f32,
        max_edge_len: i32,
        flags: ContourBuildFlags,
    ) -> Result<Self> {
        let w = chf.width;
        let h = chf.height;
        let border_size = chf.border_size;

        let mut bmin = chf.bmin;
        let mut bmax = chf.bmax;
        if border_size > 0 {
            // The heightfield was built with a border, shrink to the tile frame.
            let pad = border_size as f32 * chf.cs;
            bmin.x += pad;
            bmin.z += pad;
            bmax.x -= pad;
            bmax.z -= pad;
        }

        // Mark boundary edges: bit d set when the neighbour across d belongs
        // to a different region than the span.
        let mut edge_flags = vec![0u8; chf.spans.len()];
        for y in 0..h {
            for x in 0..w {
                let cell = &chf.cells[(x + y * w) as usize];
                for i in cell.index..cell.index + cell.count {
                    let reg = chf.spans[i].reg;
                    if reg == 0 || (reg & BORDER_REG) != 0 {
                        edge_flags[i] = 0;
                        continue;
                    }
                    let mut res = 0u8;
                    for dir in 0..4 {
                        let mut r = 0u16;
                        if let Some(ai) = chf.neighbor_index(x, y, i, dir) {
                            r = chf.spans[ai].reg;
                        }
                        if r == reg {
                            res |= 1 << dir;
                        }
                    }
                    edge_flags[i] = res ^ 0xf;
                }
            }
        }

        let mut contours: Vec<Contour> = Vec::new();
        let mut raw_verts = Vec::with_capacity(256);
        let mut simplified = Vec::with_capacity(64);

        for y in 0..h {
            for x in 0..w {
                let cell = &chf.cells[(x + y * w) as usize];
                for i in cell.index..cell.index + cell.count {
                    if edge_flags[i] == 0 || edge_flags[i] == 0xf {
                        edge_flags[i] = 0;
                        continue;
                    }
                    let reg = chf.spans[i].reg;
                    if reg == 0 || (reg & BORDER_REG) != 0 {
                        continue;
                    }
                    let area = chf.areas[i];

                    raw_verts.clear();
                    simplified.clear();
                    walk_contour(x, y, i, chf, &mut edge_flags, &mut raw_verts);
                    if raw_verts.is_empty() {
                        continue;
                    }

                    simplify_contour(&raw_verts, &mut simplified, max_error, max_edge_len, flags);
                    remove_degenerate_segments(&mut simplified);

                    if simplified.len() / 4 < 3 {
                        continue;
                    }

                    let mut verts = simplified.clone();
                    let mut raw = raw_verts.clone();
                    if border_size > 0 {
                        // Translate out of the border frame.
                        for v in verts.chunks_exact_mut(4) {
                            v[0] -= border_size;
                            v[2] -= border_size;
                        }
                        for v in raw.chunks_exact_mut(4) {
                            v[0] -= border_size;
                            v[2] -= border_size;
                        }
                    }

                    contours.push(Contour {
                        verts,
                        raw_verts: raw,
                        reg,
                        area,
                    });
                }
            }
        }

        merge_region_holes(&mut contours);
        // Merged holes leave their emptied contour behind.
        contours.retain(|c| !c.verts.is_empty());

        log::debug!(
            "built {} contours ({}x{} cells, border {})",
            contours.len(),
            w,
            h,
            border_size
        );

        Ok(Self {
            contours,
            bmin,
            bmax,
            cs: chf.cs,
            ch: chf.ch,
            width: w - border_size * 2,
            height: h - border_size * 2,
            border_size,
            max_error,
        })
    }

    /// Builds contours from a validated configuration
    pub fn build_with_config(
        chf: &CompactHeightfield,
        config: &crate::ContourBuildConfig,
    ) -> Result<Self> {
        config.validate()?;
        Self::build(
            chf,
            config.max_simplification_error,
            config.max_edge_len,
            config.flags,
        )
    }
}

/// Height and border-vertex classification of the corner that edge `dir` of
/// span `i` at `(x, y)` ends at.
///
/// The height is the maximum span minimum over the up-to-four spans meeting at
/// the corner. The border-vertex predicate looks for two equal exterior region
/// codes followed by two interior codes of one area, with no missing spans.
fn corner_height(x: i32, y: i32, i: usize, dir: usize, chf: &CompactHeightfield) -> (i32, bool) {
    let dirp = (dir + 1) & 0x3;
    let mut height = chf.spans[i].y as i32;

    // Region and area combined into one code so area transitions keep their
    // border vertices as well.
    let mut regs = [0u32; 4];
    regs[0] = chf.spans[i].reg as u32 | ((chf.areas[i] as u32) << 16);

    if let Some(ai) = chf.neighbor_index(x, y, i, dir) {
        height = height.max(chf.spans[ai].y as i32);
        regs[1] = chf.spans[ai].reg as u32 | ((chf.areas[ai] as u32) << 16);
        let ax = x + dir_offset_x(dir);
        let ay = y + dir_offset_y(dir);
        if let Some(ai2) = chf.neighbor_index(ax, ay, ai, dirp) {
            height = height.max(chf.spans[ai2].y as i32);
            regs[2] = chf.spans[ai2].reg as u32 | ((chf.areas[ai2] as u32) << 16);
        }
    }
    if let Some(ai) = chf.neighbor_index(x, y, i, dirp) {
        height = height.max(chf.spans[ai].y as i32);
        regs[3] = chf.spans[ai].reg as u32 | ((chf.areas[ai] as u32) << 16);
        let ax = x + dir_offset_x(dirp);
        let ay = y + dir_offset_y(dirp);
        if let Some(ai2) = chf.neighbor_index(ax, ay, ai, dir) {
            height = height.max(chf.spans[ai2].y as i32);
            regs[2] = chf.spans[ai2].reg as u32 | ((chf.areas[ai2] as u32) << 16);
        }
    }

    let mut is_border_vertex = false;
    for j in 0..4 {
        let a = j;
        let b = (j + 1) & 0x3;
        let c = (j + 2) & 0x3;
        let d = (j + 3) & 0x3;

        let two_same_exts =
            (regs[a] & regs[b] & BORDER_REG as u32) != 0 && regs[a] == regs[b];
        let two_ints = ((regs[c] | regs[d]) & BORDER_REG as u32) == 0;
        let ints_same_area = (regs[c] >> 16) == (regs[d] >> 16);
        let no_zeros = regs[a] != 0 && regs[b] != 0 && regs[c] != 0 && regs[d] != 0;

        if two_same_exts && two_ints && ints_same_area && no_zeros {
            is_border_vertex = true;
            break;
        }
    }

    (height, is_border_vertex)
}

/// Traces the boundary loop starting at span `i`, consuming its edge flags.
///
/// Emits one 4-int vertex per boundary edge corner. On the iteration cap or an
/// inconsistent neighbour link the trace is abandoned and `points` is left
/// empty, so callers only ever see closed loops.
fn walk_contour(
    mut x: i32,
    mut y: i32,
    mut i: usize,
    chf: &CompactHeightfield,
    flags: &mut [u8],
    points: &mut Vec<i32>,
) {
    // Start at the lowest-numbered boundary edge.
    let mut dir = 0usize;
    while flags[i] & (1 << dir) == 0 {
        dir += 1;
    }

    let start_dir = dir;
    let start_i = i;
    let area = chf.areas[i];

    let mut iter = 0;
    loop {
        iter += 1;
        if iter >= MAX_TRACE_ITER {
            log::warn!(
                "boundary trace of region {} exceeded {} steps, abandoning",
                chf.spans[start_i].reg,
                MAX_TRACE_ITER
            );
            points.clear();
            return;
        }

        if flags[i] & (1 << dir) != 0 {
            // Boundary edge: emit its end corner.
            let (py, is_border_vertex) = corner_height(x, y, i, dir, chf);
            let mut px = x;
            let mut pz = y;
            match dir {
                0 => pz += 1,
                1 => {
                    px += 1;
                    pz += 1;
                }
                2 => px += 1,
                _ => {}
            }

            let mut r = 0i32;
            let mut is_area_border = false;
            if let Some(ai) = chf.neighbor_index(x, y, i, dir) {
                r = chf.spans[ai].reg as i32;
                if area != chf.areas[ai] {
                    is_area_border = true;
                }
            }
            if is_border_vertex {
                r |= BORDER_VERTEX;
            }
            if is_area_border {
                r |= AREA_BORDER;
            }
            points.extend_from_slice(&[px, py, pz, r]);

            flags[i] &= !(1 << dir);
            dir = (dir + 1) & 0x3; // rotate clockwise
        } else {
            // Interior edge: step into the neighbour and keep hugging the
            // boundary on the left.
            let Some(ni) = chf.neighbor_index(x, y, i, dir) else {
                // An unflagged edge implies a same-region neighbour, so the
                // link table is inconsistent.
                log::warn!(
                    "missing neighbour link while tracing region {}, abandoning",
                    chf.spans[start_i].reg
                );
                points.clear();
                return;
            };
            x += dir_offset_x(dir);
            y += dir_offset_y(dir);
            i = ni;
            dir = (dir + 3) & 0x3; // rotate counter-clockwise
        }

        if i == start_i && dir == start_dir {
            break;
        }
    }
}

/// Inserts a 4-int vertex before position `at` of the simplified array
fn insert_point(simplified: &mut Vec<i32>, at: usize, x: i32, y: i32, z: i32, w: i32) {
    let idx = at * 4;
    simplified.splice(idx..idx, [x, y, z, w]);
}

/// Simplifies a raw closed polyline.
///
/// Simplified vertices temporarily store the raw index of their anchor in the
/// fourth slot; the final pass rewrites it to the flag word, taking the
/// region/area classification from the next raw vertex and the border-vertex
/// property from the anchor itself.
fn simplify_contour(
    points: &[i32],
    simplified: &mut Vec<i32>,
    max_error: f32,
    max_edge_len: i32,
    flags: ContourBuildFlags,
) {
    let pn = points.len() / 4;

    // Portal presence: any edge facing another region.
    let has_connections = points.chunks_exact(4).any(|v| v[3] & REGION_MASK != 0);

    if has_connections {
        // Break the contour wherever the neighbouring region or the area
        // border classification changes.
        for i in 0..pn {
            let ii = (i + 1) % pn;
            let different_regs =
                (points[i * 4 + 3] & REGION_MASK) != (points[ii * 4 + 3] & REGION_MASK);
            let area_borders =
                (points[i * 4 + 3] & AREA_BORDER) != (points[ii * 4 + 3] & AREA_BORDER);
            if different_regs || area_borders {
                simplified.extend_from_slice(&[
                    points[i * 4],
                    points[i * 4 + 1],
                    points[i * 4 + 2],
                    i as i32,
                ]);
            }
        }
    }

    if simplified.is_empty() {
        // Isolated contour: seed with the lexicographic extremes and let the
        // deviation pass refine the rest.
        let mut llx = points[0];
        let mut lly = points[1];
        let mut llz = points[2];
        let mut lli = 0usize;
        let mut urx = points[0];
        let mut ury = points[1];
        let mut urz = points[2];
        let mut uri = 0usize;
        for i in 0..pn {
            let x = points[i * 4];
            let y = points[i * 4 + 1];
            let z = points[i * 4 + 2];
            if x < llx || (x == llx && z < llz) {
                llx = x;
                lly = y;
                llz = z;
                lli = i;
            }
            if x > urx || (x == urx && z > urz) {
                urx = x;
                ury = y;
                urz = z;
                uri = i;
            }
        }
        simplified.extend_from_slice(&[llx, lly, llz, lli as i32]);
        simplified.extend_from_slice(&[urx, ury, urz, uri as i32]);
    }

    // Deviation pass: insert the worst-deviating raw vertex of each edge until
    // every raw vertex is within tolerance.
    let mut i = 0;
    while i < simplified.len() / 4 {
        let ii = (i + 1) % (simplified.len() / 4);

        let mut ax = simplified[i * 4];
        let mut az = simplified[i * 4 + 2];
        let ai = simplified[i * 4 + 3];
        let mut bx = simplified[ii * 4];
        let mut bz = simplified[ii * 4 + 2];
        let bi = simplified[ii * 4 + 3];

        // Traverse the raw polyline so the segment runs lexicographically
        // forward, keeping insertions deterministic for shared tile edges.
        let (mut ci, cinc, endi) = if bx > ax || (bx == ax && bz > az) {
            (
                (ai as usize + 1) % pn,
                1usize,
                bi as usize,
            )
        } else {
            let (ci, cinc, endi) = ((bi as usize + pn - 1) % pn, pn - 1, ai as usize);
            std::mem::swap(&mut ax, &mut bx);
            std::mem::swap(&mut az, &mut bz);
            (ci, cinc, endi)
        };

        let mut maxd = 0.0f32;
        let mut maxi = -1i32;

        // Only wall edges and area transitions are tessellated; portal edges
        // must stay in lockstep with the neighbouring region.
        if (points[ci * 4 + 3] & REGION_MASK) == 0 || (points[ci * 4 + 3] & AREA_BORDER) != 0 {
            while ci != endi {
                let d =
                    dist_point_segment_sqr_2d(points[ci * 4], points[ci * 4 + 2], ax, az, bx, bz);
                if d > maxd {
                    maxd = d;
                    maxi = ci as i32;
                }
                ci = (ci + cinc) % pn;
            }
        }

        if maxi != -1 && maxd > sqr(max_error) {
            let m = maxi as usize;
            insert_point(
                simplified,
                i + 1,
                points[m * 4],
                points[m * 4 + 1],
                points[m * 4 + 2],
                maxi,
            );
        } else {
            i += 1;
        }
    }

    // Length-split pass.
    if max_edge_len > 0 && (flags.tess_wall_edges || flags.tess_area_edges) {
        let mut i = 0;
        while i < simplified.len() / 4 {
            let ii = (i + 1) % (simplified.len() / 4);

            let ax = simplified[i * 4];
            let az = simplified[i * 4 + 2];
            let ai = simplified[i * 4 + 3];
            let bx = simplified[ii * 4];
            let bz = simplified[ii * 4 + 2];
            let bi = simplified[ii * 4 + 3];

            let ci = (ai as usize + 1) % pn;
            let tess = (flags.tess_wall_edges && (points[ci * 4 + 3] & REGION_MASK) == 0)
                || (flags.tess_area_edges && (points[ci * 4 + 3] & AREA_BORDER) != 0);

            let mut maxi = -1i32;
            if tess {
                let dx = bx - ax;
                let dz = bz - az;
                if dx * dx + dz * dz > sqr(max_edge_len) {
                    // Raw-index distance from a to b on the traversal side.
                    let n = if bi < ai { bi + pn as i32 - ai } else { bi - ai };
                    if n > 1 {
                        maxi = if bx > ax || (bx == ax && bz > az) {
                            (ai + n / 2) % pn as i32
                        } else {
                            (ai + (n + 1) / 2) % pn as i32
                        };
                    }
                }
            }

            if maxi != -1 {
                let m = maxi as usize;
                insert_point(
                    simplified,
                    i + 1,
                    points[m * 4],
                    points[m * 4 + 1],
                    points[m * 4 + 2],
                    maxi,
                );
            } else {
                i += 1;
            }
        }
    }

    // Rewrite the stored raw indices into vertex flag words.
    for i in 0..simplified.len() / 4 {
        let ai = ((simplified[i * 4 + 3] + 1) % pn as i32) as usize;
        let bi = simplified[i * 4 + 3] as usize;
        simplified[i * 4 + 3] = (points[ai * 4 + 3] & (REGION_MASK | AREA_BORDER))
            | (points[bi * 4 + 3] & BORDER_VERTEX);
    }
}

/// Removes simplified vertices equal to their successor on the XZ plane
fn remove_degenerate_segments(simplified: &mut Vec<i32>) {
    let mut i = 0;
    while i < simplified.len() / 4 {
        let npts = simplified.len() / 4;
        let ni = (i + 1) % npts;
        if simplified[i * 4] == simplified[ni * 4]
            && simplified[i * 4 + 2] == simplified[ni * 4 + 2]
        {
            // Recheck the same index, the next vertex may be a duplicate too.
            simplified.drain(i * 4..i * 4 + 4);
        } else {
            i += 1;
        }
    }
}

/// Finds the closest mutually visible vertex pair between an outer contour and
/// a hole, returning (outer index, hole index).
///
/// A hole vertex is admissible for an outer vertex when it lies on or to the
/// left of both outer edges meeting there; collinear bridges are allowed so
/// axis-aligned grid contours can always connect.
fn closest_bridge(outer: &[i32], hole: &[i32]) -> Option<(usize, usize)> {
    let na = outer.len() / 4;
    let nb = hole.len() / 4;
    let mut closest = i32::MAX;
    let mut pair = None;

    for i in 0..na {
        let inext = (i + 1) % na;
        let iprev = (i + na - 1) % na;
        let va = &outer[i * 4..i * 4 + 4];
        let van = &outer[inext * 4..inext * 4 + 4];
        let vap = &outer[iprev * 4..iprev * 4 + 4];

        for j in 0..nb {
            let vb = &hole[j * 4..j * 4 + 4];
            if left_on(vap, va, vb) && left_on(va, van, vb) {
                let d = dist_sqr_2d(va, vb);
                if d < closest {
                    closest = d;
                    pair = Some((i, j));
                }
            }
        }
    }

    pair
}

/// Splices a hole into its outer contour across the bridge (ia, ib).
///
/// Both traversals re-emit their start vertex, producing the duplicated seam
/// vertices of the bridge. The hole's vertex array is emptied.
fn merge_contours(outer: &mut Contour, hole: &mut Contour, ia: usize, ib: usize) {
    let na = outer.verts.len() / 4;
    let nb = hole.verts.len() / 4;
    let mut verts = Vec::with_capacity((na + nb + 2) * 4);

    for i in 0..=na {
        let src = ((ia + i) % na) * 4;
        verts.extend_from_slice(&outer.verts[src..src + 4]);
    }
    for i in 0..=nb {
        let src = ((ib + i) % nb) * 4;
        verts.extend_from_slice(&hole.verts[src..src + 4]);
    }

    outer.verts = verts;
    hole.verts = Vec::new();
}

/// Merges every hole contour into an outer contour of the same region.
///
/// Holes without a matching outer contour, or without a visible bridge, are
/// left untouched.
fn merge_region_holes(contours: &mut [Contour]) {
    for i in 0..contours.len() {
        if contours[i].verts.is_empty() || polygon_area_2d(&contours[i].verts) >= 0 {
            continue;
        }

        let mut outer = None;
        for j in 0..contours.len() {
            if i == j || contours[j].verts.is_empty() {
                continue;
            }
            if contours[j].reg == contours[i].reg && polygon_area_2d(&contours[j].verts) > 0 {
                outer = Some(j);
                break;
            }
        }
        let Some(j) = outer else {
            log::warn!(
                "hole contour of region {} has no outer contour, keeping as-is",
                contours[i].reg
            );
            continue;
        };

        let (outer, hole) = if j < i {
            let (head, tail) = contours.split_at_mut(i);
            (&mut head[j], &mut tail[0])
        } else {
            let (head, tail) = contours.split_at_mut(j);
            (&mut tail[0], &mut head[i])
        };

        match closest_bridge(&outer.verts, &hole.verts) {
            Some((ia, ib)) => merge_contours(outer, hole, ia, ib),
            None => log::warn!(
                "no visible bridge between hole and outer contour of region {}",
                outer.reg
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compact_heightfield::{CompactCell, CompactSpan};

    /// Builds a one-span-per-cell heightfield; `cell` returns (region, area)
    /// for open cells.
    fn grid_field(
        width: i32,
        height: i32,
        cell: impl Fn(i32, i32) -> Option<(u16, u8)>,
    ) -> CompactHeightfield {
        let mut chf = CompactHeightfield::new(
            width,
            height,
            Vec3::ZERO,
            Vec3::new(width as f32, 1.0, height as f32),
            1.0,
            1.0,
        );
        for y in 0..height {
            for x in 0..width {
                let ci = (x + y * width) as usize;
                if let Some((reg, area)) = cell(x, y) {
                    chf.cells[ci] = CompactCell {
                        index: chf.spans.len(),
                        count: 1,
                    };
                    chf.spans.push(CompactSpan::new(0, reg));
                    chf.areas.push(area);
                    chf.max_regions = chf.max_regions.max(reg & 0x7fff);
                } else {
                    chf.cells[ci] = CompactCell {
                        index: chf.spans.len(),
                        count: 0,
                    };
                }
            }
        }
        // Link neighbouring open cells.
        for y in 0..height {
            for x in 0..width {
                let ci = (x + y * width) as usize;
                if chf.cells[ci].count == 0 {
                    continue;
                }
                let si = chf.cells[ci].index;
                for dir in 0..4 {
                    let nx = x + dir_offset_x(dir);
                    let ny = y + dir_offset_y(dir);
                    if nx < 0 || ny < 0 || nx >= width || ny >= height {
                        continue;
                    }
                    if chf.cells[(nx + ny * width) as usize].count > 0 {
                        chf.spans[si].con[dir] = 0;
                    }
                }
            }
        }
        chf
    }

    fn vert_positions(contour: &Contour) -> Vec<(i32, i32)> {
        contour
            .verts
            .chunks_exact(4)
            .map(|v| (v[0], v[2]))
            .collect()
    }

    #[test]
    fn test_single_square_region() {
        let chf = grid_field(4, 4, |_, _| Some((1, 1)));
        let cset = ContourSet::build(&chf, 1.0, 0, ContourBuildFlags::default()).unwrap();

        assert_eq!(cset.contours.len(), 1);
        let contour = &cset.contours[0];
        assert_eq!(contour.reg, 1);
        assert_eq!(contour.nverts(), 4);
        assert!(polygon_area_2d(&contour.verts) > 0);

        let mut positions = vert_positions(contour);
        positions.sort_unstable();
        assert_eq!(positions, vec![(0, 0), (0, 4), (4, 0), (4, 4)]);
    }

    #[test]
    fn test_region_with_corner_notch() {
        // 4x4 square with one corner cell missing forms an L with 6 corners.
        let chf = grid_field(4, 4, |x, y| {
            if x == 3 && y == 3 {
                None
            } else {
                Some((1, 1))
            }
        });
        let cset = ContourSet::build(&chf, 0.1, 0, ContourBuildFlags::default()).unwrap();

        assert_eq!(cset.contours.len(), 1);
        let contour = &cset.contours[0];
        assert_eq!(contour.nverts(), 6);
        assert!(polygon_area_2d(&contour.verts) > 0);

        let mut positions = vert_positions(contour);
        positions.sort_unstable();
        assert_eq!(
            positions,
            vec![(0, 0), (0, 4), (3, 3), (3, 4), (4, 0), (4, 3)]
        );
    }

    #[test]
    fn test_annulus_merges_hole() {
        // 6x6 ring region around a 2x2 void.
        let in_hole = |x: i32, y: i32| (2..4).contains(&x) && (2..4).contains(&y);
        let chf = grid_field(6, 6, |x, y| if in_hole(x, y) { None } else { Some((1, 1)) });
        let cset = ContourSet::build(&chf, 0.1, 0, ContourBuildFlags::default()).unwrap();

        // Outer square and hole square merged into one polygon with two
        // duplicated seam vertices at the bridge.
        assert_eq!(cset.contours.len(), 1);
        let contour = &cset.contours[0];
        assert_eq!(contour.nverts(), 4 + 4 + 2);
        assert!(polygon_area_2d(&contour.verts) > 0);

        let mut counts = std::collections::HashMap::new();
        for pos in vert_positions(contour) {
            *counts.entry(pos).or_insert(0) += 1;
        }
        let dups: Vec<_> = counts.values().filter(|&&c| c == 2).collect();
        assert_eq!(dups.len(), 2);
        assert_eq!(counts.len(), 8);
    }

    #[test]
    fn test_long_edge_split() {
        let chf = grid_field(32, 2, |_, _| Some((1, 1)));

        let cset = ContourSet::build(&chf, 1.0, 8, ContourBuildFlags::default()).unwrap();
        assert_eq!(cset.contours.len(), 1);
        let split: Vec<_> = vert_positions(&cset.contours[0])
            .into_iter()
            .filter(|&(_, z)| z == 0)
            .collect();
        // 32-cell wall split into 4 edges of length 8.
        assert_eq!(split.len(), 5);

        let cset = ContourSet::build(&chf, 1.0, 0, ContourBuildFlags::default()).unwrap();
        let unsplit: Vec<_> = vert_positions(&cset.contours[0])
            .into_iter()
            .filter(|&(_, z)| z == 0)
            .collect();
        assert_eq!(unsplit.len(), 2);
    }

    #[test]
    fn test_portal_vertices_carry_neighbour_region() {
        // Two regions with different areas, split along x = 4.
        let chf = grid_field(8, 4, |x, _| {
            if x < 4 {
                Some((1, 1))
            } else {
                Some((2, 2))
            }
        });
        let cset = ContourSet::build(&chf, 1.0, 0, ContourBuildFlags::default()).unwrap();
        assert_eq!(cset.contours.len(), 2);

        for contour in &cset.contours {
            assert!(contour.nverts() >= 3);
            // Simplified vertices are pairwise distinct on the XZ plane.
            let positions = vert_positions(contour);
            for i in 0..positions.len() {
                assert_ne!(positions[i], positions[(i + 1) % positions.len()]);
            }
        }

        let region_one = cset.contours.iter().find(|c| c.reg == 1).unwrap();
        let portal: Vec<_> = region_one
            .verts
            .chunks_exact(4)
            .filter(|v| v[3] & REGION_MASK == 2)
            .collect();
        assert!(!portal.is_empty());
        // The area differs across the portal as well.
        assert!(portal.iter().any(|v| v[3] & AREA_BORDER != 0));
    }

    #[test]
    fn test_border_offset() {
        // 4x4 walkable region inside a one-cell border ring painted as four
        // distinct border regions, the way the upstream partitioning does.
        let mut chf = grid_field(6, 6, |x, y| {
            if x == 0 {
                Some((BORDER_REG | 1, 1))
            } else if x == 5 {
                Some((BORDER_REG | 2, 1))
            } else if y == 0 {
                Some((BORDER_REG | 3, 1))
            } else if y == 5 {
                Some((BORDER_REG | 4, 1))
            } else {
                Some((5, 1))
            }
        });
        chf.border_size = 1;

        let cset = ContourSet::build(&chf, 1.0, 0, ContourBuildFlags::default()).unwrap();
        assert_eq!(cset.width, 4);
        assert_eq!(cset.height, 4);
        assert_eq!(cset.border_size, 1);
        assert_eq!(cset.bmin.x, 1.0);
        assert_eq!(cset.bmax.x, 5.0);

        assert_eq!(cset.contours.len(), 1);
        let contour = &cset.contours[0];
        assert!(contour.nverts() >= 4);
        assert!(polygon_area_2d(&contour.verts) > 0);
        for (x, z) in vert_positions(contour) {
            assert!((0..=4).contains(&x));
            assert!((0..=4).contains(&z));
        }
    }

    #[test]
    fn test_remove_degenerate_segments() {
        let mut simplified = vec![
            0, 0, 0, 0, //
            0, 0, 0, 7, // same (x, z) as the previous vertex
            4, 0, 0, 0, //
            4, 0, 4, 0, //
        ];
        remove_degenerate_segments(&mut simplified);
        assert_eq!(simplified.len() / 4, 3);

        // A run of duplicates collapses to a single vertex.
        let mut simplified = vec![
            0, 0, 0, 0, //
            0, 0, 0, 1, //
            0, 0, 0, 2, //
            4, 0, 0, 0, //
            4, 0, 4, 0, //
        ];
        remove_degenerate_segments(&mut simplified);
        assert_eq!(simplified.len() / 4, 3);
        for (i, v) in simplified.chunks_exact(4).enumerate() {
            let next = simplified.chunks_exact(4).nth((i + 1) % 3).unwrap();
            assert!(v[0] != next[0] || v[2] != next[2]);
        }
    }

    #[test]
    fn test_closest_bridge_picks_nearest_visible_pair() {
        let outer = vec![
            0, 0, 0, 0, //
            0, 0, 10, 0, //
            10, 0, 10, 0, //
            10, 0, 0, 0, //
        ];
        let hole = vec![
            3, 0, 3, 0, //
            5, 0, 3, 0, //
            5, 0, 5, 0, //
            3, 0, 5, 0, //
        ];
        assert!(polygon_area_2d(&outer) > 0);
        assert!(polygon_area_2d(&hole) < 0);
        assert_eq!(closest_bridge(&outer, &hole), Some((0, 0)));
    }

    #[test]
    fn test_merge_contours_duplicates_seam() {
        let mut outer = Contour {
            verts: vec![
                0, 0, 0, 0, //
                0, 0, 10, 0, //
                10, 0, 10, 0, //
                10, 0, 0, 0, //
            ],
            raw_verts: Vec::new(),
            reg: 1,
            area: 1,
        };
        let mut hole = Contour {
            verts: vec![
                3, 0, 3, 0, //
                5, 0, 3, 0, //
                5, 0, 5, 0, //
                3, 0, 5, 0, //
            ],
            raw_verts: Vec::new(),
            reg: 1,
            area: 1,
        };

        merge_contours(&mut outer, &mut hole, 0, 0);
        assert!(hole.verts.is_empty());
        assert_eq!(outer.nverts(), 10);
        // The outer walk re-emits its start vertex before the hole block.
        assert_eq!(&outer.verts[0..3], &[0, 0, 0]);
        assert_eq!(&outer.verts[4 * 4..4 * 4 + 3], &[0, 0, 0]);
        // The hole walk re-emits its start vertex at the end.
        assert_eq!(&outer.verts[5 * 4..5 * 4 + 3], &[3, 0, 3]);
        assert_eq!(&outer.verts[9 * 4..9 * 4 + 3], &[3, 0, 3]);
    }

    #[test]
    fn test_hole_without_outer_is_kept() {
        let mut contours = vec![Contour {
            verts: vec![
                3, 0, 3, 0, //
                5, 0, 3, 0, //
                5, 0, 5, 0, //
                3, 0, 5, 0, //
            ],
            raw_verts: Vec::new(),
            reg: 9,
            area: 1,
        }];
        merge_region_holes(&mut contours);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].nverts(), 4);
    }
}
