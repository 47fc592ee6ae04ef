//! Tile assembly
//!
//! Packs polygon mesh data, detail meshes and off-mesh connections into a
//! [`NavTile`], encoding portal-edge adjacency and building the optional
//! bounding-volume tree.

use glam::Vec3;
use navgen_common::{Error, Result};

use crate::tile::{BvNode, NavTile, OffMeshConnection, PolyDetail, PolyType, TileHeader, TilePoly};
use crate::{EXT_LINK, MAX_VERTS_PER_POLY, MESH_NULL_IDX, OFF_MESH_CON_BIDIR};

/// Input of the tile assembler
///
/// All arrays are borrowed read-only for the duration of construction. The
/// polygon mesh uses the upstream polygoniser's layout: `polys` holds
/// `poly_count * nvp * 2` entries, per polygon `nvp` vertex indices (padded
/// with [`MESH_NULL_IDX`]) followed by `nvp` edge codes. An edge code with the
/// high bit set is a boundary edge carrying a direction nibble (0..3 cardinal,
/// 15 = non-portal border); otherwise it is the neighbour polygon index.
#[derive(Debug, Clone, Default)]
pub struct TileBuildParams<'a> {
    /// Polygon mesh vertices in cell units, 3 per vertex
    pub verts: &'a [u16],
    /// Number of polygon mesh vertices
    pub vert_count: usize,
    /// Polygon vertex indices and edge codes
    pub polys: &'a [u16],
    /// User defined flags per polygon
    pub poly_flags: &'a [u16],
    /// Area id per polygon
    pub poly_areas: &'a [u8],
    /// Number of polygons
    pub poly_count: usize,
    /// Maximum vertices per polygon of the mesh
    pub nvp: usize,

    /// Detail sub-mesh descriptors, 4 entries per polygon: vertex base,
    /// vertex count, triangle base, triangle count. Empty to synthesise a
    /// fan triangulation instead.
    pub detail_meshes: &'a [u32],
    /// Detail vertices, 3 per vertex; the first `vert_count` of each polygon
    /// equal the polygon's own vertices
    pub detail_verts: &'a [f32],
    /// Number of detail vertices
    pub detail_verts_count: usize,
    /// Detail triangles, 4 bytes each
    pub detail_tris: &'a [u8],
    /// Number of detail triangles
    pub detail_tri_count: usize,

    /// Off-mesh connection endpoint pairs in world units, 6 floats each
    pub off_mesh_con_verts: &'a [f32],
    /// Radius per connection
    pub off_mesh_con_rad: &'a [f32],
    /// User defined polygon flags per connection
    pub off_mesh_con_flags: &'a [u16],
    /// Area id per connection
    pub off_mesh_con_areas: &'a [u8],
    /// Direction per connection, bit 0 = bidirectional
    pub off_mesh_con_dir: &'a [u8],
    /// Optional user id per connection
    pub off_mesh_con_user_id: &'a [u32],
    /// Number of off-mesh connections
    pub off_mesh_con_count: usize,

    /// User defined tile id
    pub user_id: u32,
    /// Tile grid position
    pub tile_x: i32,
    pub tile_y: i32,
    /// Layer of the tile at its grid position
    pub tile_layer: i32,
    /// The minimum bounds of the tile AABB
    pub bmin: Vec3,
    /// The maximum bounds of the tile AABB
    pub bmax: Vec3,

    /// Agent height in world units
    pub walkable_height: f32,
    /// Agent radius in world units
    pub walkable_radius: f32,
    /// Maximum climb in world units
    pub walkable_climb: f32,
    /// Cell size the mesh was voxelised with
    pub cs: f32,
    /// Cell height the mesh was voxelised with
    pub ch: f32,

    /// Whether to build the bounding-volume tree
    pub build_bv_tree: bool,
}

/// Classifies an off-mesh connection endpoint against the tile AABB.
///
/// Returns the tile edge the point leaves through (0..7, matching the portal
/// side encoding halved) or 0xff when the point is inside the tile on x and z.
/// Points inside on x and z but outside the tile's vertical range are
/// reclassified 0 so they never count as interior.
pub fn classify_off_mesh_point(pt: Vec3, bmin: Vec3, bmax: Vec3) -> u8 {
    const XP: u8 = 1 << 0;
    const ZP: u8 = 1 << 1;
    const XM: u8 = 1 << 2;
    const ZM: u8 = 1 << 3;

    let mut outcode = 0u8;
    if pt.x >= bmax.x {
        outcode |= XP;
    }
    if pt.z >= bmax.z {
        outcode |= ZP;
    }
    if pt.x < bmin.x {
        outcode |= XM;
    }
    if pt.z < bmin.z {
        outcode |= ZM;
    }

    match outcode {
        o if o == XP => 0,
        o if o == XP | ZP => 1,
        o if o == ZP => 2,
        o if o == XM | ZP => 3,
        o if o == XM => 4,
        o if o == XM | ZM => 5,
        o if o == ZM => 6,
        o if o == XP | ZM => 7,
        _ => {
            if pt.y < bmin.y || pt.y > bmax.y {
                0
            } else {
                0xff
            }
        }
    }
}

fn vec3_at(verts: &[f32], i: usize) -> Vec3 {
    Vec3::new(verts[i * 3], verts[i * 3 + 1], verts[i * 3 + 2])
}

fn validate_params(params: &TileBuildParams) -> Result<()> {
    if params.nvp > MAX_VERTS_PER_POLY {
        return Err(Error::InvalidInput(format!(
            "{} vertices per polygon exceeds the limit of {}",
            params.nvp, MAX_VERTS_PER_POLY
        )));
    }
    if params.vert_count == 0 || params.verts.is_empty() {
        return Err(Error::InvalidInput("empty vertex array".to_string()));
    }
    if params.poly_count == 0 || params.polys.is_empty() {
        return Err(Error::InvalidInput("empty polygon array".to_string()));
    }
    if params.vert_count >= 0xffff {
        return Err(Error::InvalidInput(format!(
            "{} vertices do not fit 16-bit polygon indices",
            params.vert_count
        )));
    }
    if params.verts.len() != params.vert_count * 3 {
        return Err(Error::InvalidInput(
            "vertex array does not match vertex count".to_string(),
        ));
    }
    if params.polys.len() != params.poly_count * params.nvp * 2 {
        return Err(Error::InvalidInput(
            "polygon array does not match polygon count".to_string(),
        ));
    }
    Ok(())
}

/// Assembles a pathfinding tile from polygon mesh data.
///
/// Inputs are never mutated; on invalid parameters no tile is produced.
pub fn build_tile(params: &TileBuildParams) -> Result<NavTile> {
    validate_params(params)?;

    let nvp = params.nvp;

    // Classify off-mesh connection endpoints against the tile bounds. Only
    // connections whose start point lies inside the tile are stored.
    let mut off_mesh_con_class = vec![0u8; params.off_mesh_con_count * 2];
    let mut stored_off_mesh_con_count = 0usize;
    let mut off_mesh_con_link_count = 0usize;
    for i in 0..params.off_mesh_con_count {
        let p0 = vec3_at(params.off_mesh_con_verts, i * 2);
        let p1 = vec3_at(params.off_mesh_con_verts, i * 2 + 1);
        off_mesh_con_class[i * 2] = classify_off_mesh_point(p0, params.bmin, params.bmax);
        off_mesh_con_class[i * 2 + 1] = classify_off_mesh_point(p1, params.bmin, params.bmax);

        if off_mesh_con_class[i * 2] == 0xff {
            off_mesh_con_link_count += 1;
            stored_off_mesh_con_count += 1;
        }
        if off_mesh_con_class[i * 2 + 1] == 0xff {
            off_mesh_con_link_count += 1;
        }
    }

    // Count used polygon edges and cross-tile portal edges.
    let mut edge_count = 0usize;
    let mut portal_count = 0usize;
    for i in 0..params.poly_count {
        let p = &params.polys[i * 2 * nvp..];
        for j in 0..nvp {
            if p[j] == MESH_NULL_IDX {
                break;
            }
            edge_count += 1;
            if p[nvp + j] & EXT_LINK != 0 && p[nvp + j] & 0xf != 0xf {
                portal_count += 1;
            }
        }
    }
    let max_link_count = edge_count + portal_count * 2 + off_mesh_con_link_count * 2;

    let tot_poly_count = params.poly_count + stored_off_mesh_con_count;
    let tot_vert_count = params.vert_count + stored_off_mesh_con_count * 2;

    // Detail totals: with input detail data only the vertices beyond each
    // polygon's own are stored; without it a fan triangulation is synthesised.
    let mut detail_vert_count = 0usize;
    let mut detail_tri_count = 0usize;
    if !params.detail_meshes.is_empty() {
        detail_tri_count = params.detail_tri_count;
        for i in 0..params.poly_count {
            let p = &params.polys[i * 2 * nvp..];
            let mut nv = 0usize;
            for j in 0..nvp {
                if p[j] == MESH_NULL_IDX {
                    break;
                }
                nv += 1;
            }
            detail_vert_count += params.detail_meshes[i * 4 + 1] as usize - nv;
        }
    } else {
        for i in 0..params.poly_count {
            let p = &params.polys[i * 2 * nvp..];
            let mut nv = 0usize;
            for j in 0..nvp {
                if p[j] == MESH_NULL_IDX {
                    break;
                }
                nv += 1;
            }
            detail_tri_count += nv - 2;
        }
    }

    // Vertex store: mesh vertices to world space, then the endpoint pairs of
    // stored off-mesh connections.
    let mut verts = vec![0.0f32; tot_vert_count * 3];
    for i in 0..params.vert_count {
        verts[i * 3] = params.bmin.x + params.verts[i * 3] as f32 * params.cs;
        verts[i * 3 + 1] = params.bmin.y + params.verts[i * 3 + 1] as f32 * params.ch;
        verts[i * 3 + 2] = params.bmin.z + params.verts[i * 3 + 2] as f32 * params.cs;
    }
    let off_mesh_verts_base = params.vert_count;
    let mut n = 0usize;
    for i in 0..params.off_mesh_con_count {
        if off_mesh_con_class[i * 2] == 0xff {
            let link = &params.off_mesh_con_verts[i * 2 * 3..i * 2 * 3 + 6];
            let dst = (off_mesh_verts_base + n * 2) * 3;
            verts[dst..dst + 6].copy_from_slice(link);
            n += 1;
        }
    }

    // Polygon store.
    let mut polys = Vec::with_capacity(tot_poly_count);
    for i in 0..params.poly_count {
        let src = &params.polys[i * 2 * nvp..];
        let mut poly = TilePoly::new(params.poly_areas[i], PolyType::Ground, params.poly_flags[i]);
        for j in 0..nvp {
            if src[j] == MESH_NULL_IDX {
                break;
            }
            poly.verts[j] = src[j];
            poly.neis[j] = if src[nvp + j] & EXT_LINK != 0 {
                // Boundary edge: portals get their side code, plain borders 0.
                match src[nvp + j] & 0xf {
                    0 => EXT_LINK | 4,
                    1 => EXT_LINK | 2,
                    2 => EXT_LINK,
                    3 => EXT_LINK | 6,
                    _ => 0,
                }
            } else {
                src[nvp + j] + 1
            };
            poly.vert_count += 1;
        }
        polys.push(poly);
    }
    let off_mesh_poly_base = params.poly_count;
    let mut n = 0usize;
    for i in 0..params.off_mesh_con_count {
        if off_mesh_con_class[i * 2] == 0xff {
            let mut poly = TilePoly::new(
                params.off_mesh_con_areas[i],
                PolyType::OffMeshConnection,
                params.off_mesh_con_flags[i],
            );
            poly.verts[0] = (off_mesh_verts_base + n * 2) as u16;
            poly.verts[1] = (off_mesh_verts_base + n * 2 + 1) as u16;
            poly.vert_count = 2;
            polys.push(poly);
            n += 1;
        }
    }

    // Detail mesh store.
    let mut detail_meshes = Vec::with_capacity(params.poly_count);
    let mut detail_verts = Vec::with_capacity(detail_vert_count * 3);
    let mut detail_tris;
    if !params.detail_meshes.is_empty() {
        detail_tris = params.detail_tris.to_vec();
        let mut vbase = 0u32;
        for i in 0..params.poly_count {
            let vb = params.detail_meshes[i * 4] as usize;
            let ndv = params.detail_meshes[i * 4 + 1] as usize;
            let nv = polys[i].vert_count as usize;
            detail_meshes.push(PolyDetail {
                vert_base: vbase,
                tri_base: params.detail_meshes[i * 4 + 2],
                vert_count: (ndv - nv) as u8,
                tri_count: params.detail_meshes[i * 4 + 3] as u8,
            });
            // The first nv detail vertices equal the polygon's own vertices
            // and are not duplicated.
            if ndv > nv {
                let src = (vb + nv) * 3;
                detail_verts.extend_from_slice(&params.detail_verts[src..src + (ndv - nv) * 3]);
                vbase += (ndv - nv) as u32;
            }
        }
    } else {
        detail_tris = Vec::with_capacity(detail_tri_count * 4);
        let mut tbase = 0u32;
        for poly in polys.iter().take(params.poly_count) {
            let nv = poly.vert_count as usize;
            detail_meshes.push(PolyDetail {
                vert_base: 0,
                tri_base: tbase,
                vert_count: 0,
                tri_count: (nv - 2) as u8,
            });
            // Fan triangulation from vertex 0, flagging edges that lie on the
            // polygon boundary.
            for j in 2..nv {
                let mut flags = 1 << 2;
                if j == 2 {
                    flags |= 1 << 0;
                }
                if j == nv - 1 {
                    flags |= 1 << 4;
                }
                detail_tris.extend_from_slice(&[0, (j - 1) as u8, j as u8, flags]);
                tbase += 1;
            }
        }
    }

    let mut bv_nodes = Vec::new();
    if params.build_bv_tree {
        create_bv_tree(params, &mut bv_nodes);
    }

    // Off-mesh connection store.
    let mut off_mesh_cons = Vec::with_capacity(stored_off_mesh_con_count);
    let mut n = 0usize;
    for i in 0..params.off_mesh_con_count {
        if off_mesh_con_class[i * 2] == 0xff {
            let mut pos = [0.0f32; 6];
            pos.copy_from_slice(&params.off_mesh_con_verts[i * 2 * 3..i * 2 * 3 + 6]);
            off_mesh_cons.push(OffMeshConnection {
                pos,
                radius: params.off_mesh_con_rad[i],
                poly: (off_mesh_poly_base + n) as u16,
                flags: if params.off_mesh_con_dir[i] & 1 != 0 {
                    OFF_MESH_CON_BIDIR
                } else {
                    0
                },
                side: off_mesh_con_class[i * 2 + 1],
                user_id: params.off_mesh_con_user_id.get(i).copied().unwrap_or(0),
            });
            n += 1;
        }
    }

    let header = TileHeader {
        x: params.tile_x,
        y: params.tile_y,
        layer: params.tile_layer,
        user_id: params.user_id,
        poly_count: tot_poly_count as i32,
        vert_count: tot_vert_count as i32,
        max_link_count: max_link_count as i32,
        bmin: params.bmin,
        bmax: params.bmax,
        detail_mesh_count: params.poly_count as i32,
        detail_vert_count: detail_vert_count as i32,
        detail_tri_count: detail_tri_count as i32,
        bv_quant_factor: 1.0 / params.cs,
        off_mesh_base: params.poly_count as i32,
        off_mesh_con_count: stored_off_mesh_con_count as i32,
        bv_node_count: if params.build_bv_tree {
            (params.poly_count * 2) as i32
        } else {
            0
        },
        walkable_height: params.walkable_height,
        walkable_radius: params.walkable_radius,
        walkable_climb: params.walkable_climb,
    };

    log::debug!(
        "assembled tile ({}, {}, {}): {} polys, {} verts, {} bv nodes, {} off-mesh connections",
        header.x,
        header.y,
        header.layer,
        header.poly_count,
        header.vert_count,
        bv_nodes.len(),
        header.off_mesh_con_count
    );

    Ok(NavTile {
        header,
        verts,
        polys,
        detail_meshes,
        detail_verts,
        detail_tris,
        bv_nodes,
        off_mesh_cons,
    })
}

/// Work item of the BV tree builder
struct BvItem {
    i: i32,
    bmin: [u16; 3],
    bmax: [u16; 3],
}

/// Longest axis of an extent, ties resolved x before y before z
fn longest_axis(x: u16, y: u16, z: u16) -> usize {
    let mut axis = 0;
    let mut max_val = x;
    if y > max_val {
        axis = 1;
        max_val = y;
    }
    if z > max_val {
        axis = 2;
    }
    axis
}

fn calc_extends(items: &[BvItem], imin: usize, imax: usize) -> ([u16; 3], [u16; 3]) {
    let mut bmin = items[imin].bmin;
    let mut bmax = items[imin].bmax;
    for item in &items[imin + 1..imax] {
        for k in 0..3 {
            bmin[k] = bmin[k].min(item.bmin[k]);
            bmax[k] = bmax[k].max(item.bmax[k]);
        }
    }
    (bmin, bmax)
}

/// Emits the subtree over `items[imin..imax]` in preorder. Internal nodes
/// store the negative escape offset past their subtree.
fn subdivide(items: &mut [BvItem], imin: usize, imax: usize, nodes: &mut Vec<BvNode>) {
    let inum = imax - imin;
    let icur = nodes.len();

    if inum == 1 {
        let item = &items[imin];
        nodes.push(BvNode {
            bmin: item.bmin,
            bmax: item.bmax,
            i: item.i,
        });
        return;
    }

    let (bmin, bmax) = calc_extends(items, imin, imax);
    let axis = longest_axis(bmax[0] - bmin[0], bmax[1] - bmin[1], bmax[2] - bmin[2]);
    items[imin..imax].sort_unstable_by_key(|item| item.bmin[axis]);

    let node_index = nodes.len();
    nodes.push(BvNode { bmin, bmax, i: 0 });

    let isplit = imin + inum / 2;
    subdivide(items, imin, isplit, nodes);
    subdivide(items, isplit, imax, nodes);

    let iescape = (nodes.len() - icur) as i32;
    nodes[node_index].i = -iescape;
}

/// Builds the BV tree over the polygon bounds in cell units, with span
/// heights rescaled from cell-height to cell-size units.
fn create_bv_tree(params: &TileBuildParams, nodes: &mut Vec<BvNode>) {
    let nvp = params.nvp;
    let mut items = Vec::with_capacity(params.poly_count);

    for i in 0..params.poly_count {
        let p = &params.polys[i * 2 * nvp..];
        let v = p[0] as usize * 3;
        let mut bmin = [
            params.verts[v],
            params.verts[v + 1],
            params.verts[v + 2],
        ];
        let mut bmax = bmin;
        for j in 1..nvp {
            if p[j] == MESH_NULL_IDX {
                break;
            }
            let v = p[j] as usize * 3;
            for k in 0..3 {
                bmin[k] = bmin[k].min(params.verts[v + k]);
                bmax[k] = bmax[k].max(params.verts[v + k]);
            }
        }
        // Remap heights into cell-size units.
        bmin[1] = (bmin[1] as f32 * params.ch / params.cs).floor() as u16;
        bmax[1] = (bmax[1] as f32 * params.ch / params.cs).ceil() as u16;
        items.push(BvItem {
            i: i as i32,
            bmin,
            bmax,
        });
    }

    subdivide(&mut items, 0, params.poly_count, nodes);
}
