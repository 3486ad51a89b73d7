//! Surface emission, triangulation, and smoothing groups — the bulk of
//! `H. Level mesh`. Grounded on the distilled spec's "Surface emission per
//! side"/"per subsector" and "Triangulation" paragraphs; no teacher or pack
//! repo builds lit surfaces from BSP data, so this follows the spec text
//! directly, in the crate's existing index-based `Level`/`NodeTree` style.

use glam::{DVec3, Vec3};

use crate::level::{specials, Level, NO_INDEX};
use crate::math::Plane;
use crate::mesh::tiles::TileBindingKey;
use crate::nodes::NodeTree;
use crate::portal::Portal;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SurfaceKind {
    WallTop,
    WallMiddle,
    WallBottom,
    Floor,
    Ceiling,
}

#[derive(Clone, Debug)]
pub struct Surface {
    pub kind: SurfaceKind,
    /// World-space polygon, CW/CCW consistent with `plane`'s normal.
    pub polygon: Vec<Vec3>,
    pub plane: Plane,
    pub sector_group: u32,
    pub sky: bool,
    pub control_sector: Option<u32>,
    pub line: Option<u32>,
    pub sample_distance: u32,
    pub binding: TileBindingKey,
    pub tile: Option<u32>,
    pub portal_index: Option<u32>,
    pub portal_tag: Option<i32>,
    pub light_list: Vec<u32>,
    pub smoothing_group: Option<u32>,
}

#[derive(Clone, Debug)]
pub struct SmoothingGroup {
    pub plane: Plane,
    pub members: Vec<u32>,
}

fn quantize_sample_distance(preferred: u32, default: u32) -> u32 {
    let v = if preferred != 0 { preferred } else { default };
    v.max(1).next_power_of_two()
}

fn wall_quad(v1: Vec3, v2: Vec3, bottom1: f64, top1: f64, bottom2: f64, top2: f64) -> [Vec3; 4] {
    [
        Vec3::new(v1.x, v1.y, bottom1 as f32),
        Vec3::new(v2.x, v2.y, bottom2 as f32),
        Vec3::new(v2.x, v2.y, top2 as f32),
        Vec3::new(v1.x, v1.y, top1 as f32),
    ]
}

fn wall_plane(quad: &[Vec3; 4]) -> Plane {
    Plane::from_points(
        DVec3::new(quad[0].x as f64, quad[0].y as f64, quad[0].z as f64),
        DVec3::new(quad[1].x as f64, quad[1].y as f64, quad[1].z as f64),
        DVec3::new(quad[2].x as f64, quad[2].y as f64, quad[2].z as f64),
    )
}

/// Walk every line's sides and every subsector's flats, producing the full
/// surface list. Sector groups must already be assigned (`groups::compute_sector_groups`).
pub fn emit_all(level: &Level, nodes: &NodeTree, default_sample_distance: u32) -> Vec<Surface> {
    let mut out = Vec::new();

    for (line_idx, l) in level.linedefs.iter().enumerate() {
        let front_side_idx = l.sidenum[0];
        if front_side_idx == NO_INDEX {
            continue;
        }
        let Some(front) = level.side(front_side_idx) else { continue };
        let Some(f) = level.sector(l.frontsector) else { continue };

        let v1 = level.vertices[l.v1 as usize].pos;
        let v2 = level.vertices[l.v2 as usize].pos;
        let fv1 = Vec3::new(v1.x, v1.y, 0.0);
        let fv2 = Vec3::new(v2.x, v2.y, 0.0);

        let f_floor = |p: glam::Vec2| f.floor_plane.z_at(p.x as f64, p.y as f64);
        let f_ceil = |p: glam::Vec2| f.ceil_plane.z_at(p.x as f64, p.y as f64);

        if l.special == specials::LINE_SET_PORTAL {
            let quad = wall_quad(fv1, fv2, f_floor(v1), f_ceil(v1), f_floor(v2), f_ceil(v2));
            out.push(Surface {
                kind: SurfaceKind::WallMiddle,
                plane: wall_plane(&quad),
                polygon: quad.to_vec(),
                sector_group: f.group,
                sky: false,
                control_sector: None,
                line: Some(line_idx as u32),
                sample_distance: quantize_sample_distance(front.sample_distance[1], default_sample_distance),
                binding: TileBindingKey { kind: SurfaceKind::WallMiddle, type_index: front_side_idx, control_sector: None },
                tile: None,
                portal_index: None,
                portal_tag: Some(l.tag),
                light_list: Vec::new(),
                smoothing_group: None,
            });
            continue;
        }

        let two_sided = l.is_two_sided();
        let back = two_sided.then(|| level.side(l.sidenum[1])).flatten();
        let b = two_sided.then(|| level.sector(l.backsector)).flatten();

        if l.special == specials::LINE_HORIZON && two_sided {
            if let (Some(_back), Some(b)) = (back, b) {
                let quad = wall_quad(fv1, fv2, f_floor(v1), f_ceil(v1), f_floor(v2), f_ceil(v2));
                out.push(Surface {
                    kind: SurfaceKind::WallMiddle,
                    plane: wall_plane(&quad),
                    polygon: quad.to_vec(),
                    sector_group: f.group,
                    sky: f.sky_floor || f.sky_ceiling || b.sky_floor || b.sky_ceiling,
                    control_sector: None,
                    line: Some(line_idx as u32),
                    sample_distance: quantize_sample_distance(front.sample_distance[1], default_sample_distance),
                    binding: TileBindingKey { kind: SurfaceKind::WallMiddle, type_index: front_side_idx, control_sector: None },
                    tile: None,
                    portal_index: None,
                    portal_tag: None,
                    light_list: Vec::new(),
                    smoothing_group: None,
                });
            }
            continue;
        }

        if !two_sided {
            let quad = wall_quad(fv1, fv2, f_floor(v1), f_ceil(v1), f_floor(v2), f_ceil(v2));
            out.push(Surface {
                kind: SurfaceKind::WallMiddle,
                plane: wall_plane(&quad),
                polygon: quad.to_vec(),
                sector_group: f.group,
                sky: false,
                control_sector: None,
                line: Some(line_idx as u32),
                sample_distance: quantize_sample_distance(front.sample_distance[1], default_sample_distance),
                binding: TileBindingKey { kind: SurfaceKind::WallMiddle, type_index: front_side_idx, control_sector: None },
                tile: None,
                portal_index: None,
                portal_tag: None,
                light_list: Vec::new(),
                smoothing_group: None,
            });
            continue;
        }

        let (Some(back), Some(b)) = (back, b) else { continue };

        for control in &f.x3dfloors {
            if b.x3dfloors.iter().all(|c| c.control_sector != control.control_sector) {
                if let Some(ctrl) = level.sector(control.control_sector) {
                    let top = ctrl.ceil_plane.z_at(v1.x as f64, v1.y as f64);
                    let bottom = ctrl.floor_plane.z_at(v1.x as f64, v1.y as f64);
                    let top2 = ctrl.ceil_plane.z_at(v2.x as f64, v2.y as f64);
                    let bottom2 = ctrl.floor_plane.z_at(v2.x as f64, v2.y as f64);
                    let quad = wall_quad(fv1, fv2, bottom, top, bottom2, top2);
                    out.push(Surface {
                        kind: SurfaceKind::WallMiddle,
                        plane: wall_plane(&quad),
                        polygon: quad.to_vec(),
                        sector_group: f.group,
                        sky: false,
                        control_sector: Some(control.control_sector),
                        line: Some(line_idx as u32),
                        sample_distance: quantize_sample_distance(front.sample_distance[1], default_sample_distance),
                        binding: TileBindingKey {
                            kind: SurfaceKind::WallMiddle,
                            type_index: front_side_idx,
                            control_sector: Some(control.control_sector),
                        },
                        tile: None,
                        portal_index: None,
                        portal_tag: None,
                        light_list: Vec::new(),
                        smoothing_group: None,
                    });
                }
            }
        }

        if b.floor_height > f.floor_height {
            let sky = f.sky_floor && b.sky_floor && front.bottom_tex == "-";
            let quad = wall_quad(fv1, fv2, f_floor(v1), b.floor_plane.z_at(v1.x as f64, v1.y as f64), f_floor(v2), b.floor_plane.z_at(v2.x as f64, v2.y as f64));
            out.push(Surface {
                kind: SurfaceKind::WallBottom,
                plane: wall_plane(&quad),
                polygon: quad.to_vec(),
                sector_group: f.group,
                sky,
                control_sector: None,
                line: Some(line_idx as u32),
                sample_distance: quantize_sample_distance(front.sample_distance[2], default_sample_distance),
                binding: TileBindingKey { kind: SurfaceKind::WallBottom, type_index: front_side_idx, control_sector: None },
                tile: None,
                portal_index: None,
                portal_tag: None,
                light_list: Vec::new(),
                smoothing_group: None,
            });
        }

        if b.ceil_height < f.ceil_height {
            let sky = f.sky_ceiling && b.sky_ceiling && front.top_tex == "-";
            let quad = wall_quad(fv1, fv2, b.ceil_plane.z_at(v1.x as f64, v1.y as f64), f_ceil(v1), b.ceil_plane.z_at(v2.x as f64, v2.y as f64), f_ceil(v2));
            out.push(Surface {
                kind: SurfaceKind::WallTop,
                plane: wall_plane(&quad),
                polygon: quad.to_vec(),
                sector_group: f.group,
                sky,
                control_sector: None,
                line: Some(line_idx as u32),
                sample_distance: quantize_sample_distance(front.sample_distance[0], default_sample_distance),
                binding: TileBindingKey { kind: SurfaceKind::WallTop, type_index: front_side_idx, control_sector: None },
                tile: None,
                portal_index: None,
                portal_tag: None,
                light_list: Vec::new(),
                smoothing_group: None,
            });
        }

        if front.mid_tex != "-" {
            let top = f_ceil(v1).min(f_ceil(v2)).min(b.ceil_plane.z_at(v1.x as f64, v1.y as f64));
            let bottom = f_floor(v1).max(f_floor(v2)).max(b.floor_plane.z_at(v1.x as f64, v1.y as f64));
            let quad = wall_quad(fv1, fv2, bottom, top, bottom, top);
            out.push(Surface {
                kind: SurfaceKind::WallMiddle,
                plane: wall_plane(&quad),
                polygon: quad.to_vec(),
                sector_group: f.group,
                sky: false,
                control_sector: None,
                line: Some(line_idx as u32),
                sample_distance: quantize_sample_distance(front.sample_distance[1], default_sample_distance),
                binding: TileBindingKey { kind: SurfaceKind::WallMiddle, type_index: front_side_idx, control_sector: None },
                tile: None,
                portal_index: None,
                portal_tag: None,
                light_list: Vec::new(),
                smoothing_group: None,
            });
        }
    }

    for (sub_idx, sub) in nodes.subsectors.iter().enumerate() {
        let Some(sector) = level.sector(sub.sector) else { continue };
        let verts: Vec<glam::Vec2> = (sub.first_seg..sub.first_seg + sub.num_segs)
            .map(|i| nodes.vertices[nodes.segs[i as usize].v1 as usize])
            .collect();
        if verts.len() < 3 {
            continue;
        }

        let floor_poly: Vec<Vec3> = verts
            .iter()
            .map(|p| Vec3::new(p.x, p.y, sector.floor_plane.z_at(p.x as f64, p.y as f64) as f32))
            .collect();
        out.push(Surface {
            kind: SurfaceKind::Floor,
            plane: sector.floor_plane,
            polygon: floor_poly,
            sector_group: sector.group,
            sky: sector.sky_floor,
            control_sector: None,
            line: None,
            sample_distance: quantize_sample_distance(sector.sample_distance_floor, default_sample_distance),
            binding: TileBindingKey { kind: SurfaceKind::Floor, type_index: sub_idx as u32, control_sector: None },
            tile: None,
            portal_index: None,
            portal_tag: None,
            light_list: Vec::new(),
            smoothing_group: None,
        });

        let ceil_poly: Vec<Vec3> = verts
            .iter()
            .rev()
            .map(|p| Vec3::new(p.x, p.y, sector.ceil_plane.z_at(p.x as f64, p.y as f64) as f32))
            .collect();
        out.push(Surface {
            kind: SurfaceKind::Ceiling,
            plane: sector.ceil_plane,
            polygon: ceil_poly,
            sector_group: sector.group,
            sky: sector.sky_ceiling,
            control_sector: None,
            line: None,
            sample_distance: quantize_sample_distance(sector.sample_distance_ceiling, default_sample_distance),
            binding: TileBindingKey { kind: SurfaceKind::Ceiling, type_index: sub_idx as u32, control_sector: None },
            tile: None,
            portal_index: None,
            portal_tag: None,
            light_list: Vec::new(),
            smoothing_group: None,
        });

        for control in &sector.x3dfloors {
            if let Some(ctrl) = level.sector(control.control_sector) {
                let inner_floor: Vec<Vec3> = verts
                    .iter()
                    .rev()
                    .map(|p| Vec3::new(p.x, p.y, ctrl.floor_plane.z_at(p.x as f64, p.y as f64) as f32))
                    .collect();
                out.push(Surface {
                    kind: SurfaceKind::Ceiling,
                    plane: ctrl.floor_plane.inverse(),
                    polygon: inner_floor,
                    sector_group: sector.group,
                    sky: false,
                    control_sector: Some(control.control_sector),
                    line: None,
                    sample_distance: quantize_sample_distance(sector.sample_distance_ceiling, default_sample_distance),
                    binding: TileBindingKey {
                        kind: SurfaceKind::Ceiling,
                        type_index: sub_idx as u32,
                        control_sector: Some(control.control_sector),
                    },
                    tile: None,
                    portal_index: None,
                    portal_tag: None,
                    light_list: Vec::new(),
                    smoothing_group: None,
                });
            }
        }
    }

    out
}

/// Resolve `Line_SetPortal` destinations by matching tags (the pair of lines
/// carrying the same tag are assumed the two portal ends) and record a
/// translation-only transform between their midpoints. A rotated/mirrored
/// portal alignment is not modeled — a documented simplification, since the
/// distilled spec only requires a non-identity `relativePosition`.
pub fn resolve_portals(level: &Level, surfaces: &mut [Surface]) -> Vec<Portal> {
    let mut portals = Vec::new();
    let portal_surface_indices: Vec<usize> = surfaces
        .iter()
        .enumerate()
        .filter(|(_, s)| s.portal_tag.is_some())
        .map(|(i, _)| i)
        .collect();

    for &i in &portal_surface_indices {
        if surfaces[i].portal_index.is_some() {
            continue;
        }
        let tag = surfaces[i].portal_tag.unwrap();
        let line_i = surfaces[i].line.unwrap();
        let Some(j) = portal_surface_indices.iter().copied().find(|&j| {
            j != i && surfaces[j].portal_tag == Some(tag) && surfaces[j].line != Some(line_i)
        }) else {
            continue;
        };

        let mid_i = polygon_centroid(&surfaces[i].polygon);
        let mid_j = polygon_centroid(&surfaces[j].polygon);
        let forward = Portal::translation(mid_j - mid_i, surfaces[i].sector_group, surfaces[j].sector_group);
        let backward = Portal::translation(mid_i - mid_j, surfaces[j].sector_group, surfaces[i].sector_group);

        let idx_forward = portals.len() as u32;
        portals.push(forward);
        let idx_backward = portals.len() as u32;
        portals.push(backward);

        surfaces[i].portal_index = Some(idx_forward);
        surfaces[j].portal_index = Some(idx_backward);
    }

    portals
}

fn polygon_centroid(poly: &[Vec3]) -> Vec3 {
    let sum: Vec3 = poly.iter().copied().sum();
    sum / poly.len().max(1) as f32
}

/// Two surfaces share a smoothing group iff same sector group, parallel
/// normals within `[0.9999, 1.001]` and planes within `0.01` of each other.
pub fn compute_smoothing_groups(surfaces: &[Surface]) -> Vec<SmoothingGroup> {
    let mut groups: Vec<SmoothingGroup> = Vec::new();
    let mut assigned = vec![None; surfaces.len()];

    for i in 0..surfaces.len() {
        if assigned[i].is_some() {
            continue;
        }
        let group_id = groups.len() as u32;
        let mut members = vec![i as u32];
        assigned[i] = Some(group_id);

        for j in (i + 1)..surfaces.len() {
            if assigned[j].is_some() {
                continue;
            }
            if surfaces[i].sector_group != surfaces[j].sector_group {
                continue;
            }
            let dot = surfaces[i].plane.normal().dot(surfaces[j].plane.normal()).abs();
            if !(0.9999..=1.001).contains(&dot) {
                continue;
            }
            if (surfaces[i].plane.d - surfaces[j].plane.d).abs() > 0.01 {
                continue;
            }
            assigned[j] = Some(group_id);
            members.push(j as u32);
        }

        groups.push(SmoothingGroup { plane: surfaces[i].plane, members });
    }

    groups
}

/// Triangulate every surface: flats fan from vertex 0, walls as two
/// triangles `{0,1,2}`/`{3,2,1}`, both skipping degenerate triangles
/// (cross-product length² < 1e-6).
pub fn triangulate(surfaces: &[Surface]) -> crate::bvh::TriangleMesh {
    fn push_tri(vertices: &mut Vec<Vec3>, indices: &mut Vec<u32>, surface_of_triangle: &mut Vec<u32>, a: Vec3, b: Vec3, c: Vec3, surf: u32) {
        let cross = (b - a).cross(c - a);
        if cross.length_squared() < 1e-6 {
            return;
        }
        let base = vertices.len() as u32;
        vertices.push(a);
        vertices.push(b);
        vertices.push(c);
        indices.push(base);
        indices.push(base + 1);
        indices.push(base + 2);
        surface_of_triangle.push(surf);
    }

    let mut vertices = Vec::new();
    let mut indices = Vec::new();
    let mut surface_of_triangle = Vec::new();

    for (idx, s) in surfaces.iter().enumerate() {
        let surf = idx as u32;
        match s.kind {
            SurfaceKind::Floor | SurfaceKind::Ceiling => {
                for k in 1..s.polygon.len().saturating_sub(1) {
                    push_tri(&mut vertices, &mut indices, &mut surface_of_triangle, s.polygon[0], s.polygon[k], s.polygon[k + 1], surf);
                }
            }
            SurfaceKind::WallTop | SurfaceKind::WallMiddle | SurfaceKind::WallBottom => {
                if s.polygon.len() == 4 {
                    push_tri(&mut vertices, &mut indices, &mut surface_of_triangle, s.polygon[0], s.polygon[1], s.polygon[2], surf);
                    push_tri(&mut vertices, &mut indices, &mut surface_of_triangle, s.polygon[3], s.polygon[2], s.polygon[1], surf);
                }
            }
        }
    }

    crate::bvh::TriangleMesh { vertices, indices, surface_of_triangle }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::{LineDef, LineFlags, Sector, SideDef, Vertex};

    fn one_sided_square() -> (Level, NodeTree) {
        let mut lvl = Level {
            vertices: vec![
                Vertex { pos: glam::vec2(0.0, 0.0), floor_z: None, ceil_z: None, props: Default::default() },
                Vertex { pos: glam::vec2(64.0, 0.0), floor_z: None, ceil_z: None, props: Default::default() },
                Vertex { pos: glam::vec2(64.0, 64.0), floor_z: None, ceil_z: None, props: Default::default() },
                Vertex { pos: glam::vec2(0.0, 64.0), floor_z: None, ceil_z: None, props: Default::default() },
            ],
            sectors: vec![Sector { ceil_height: 128.0, ceil_plane: Plane::horizontal(128.0, false), group: 1, ..Default::default() }],
            ..Default::default()
        };
        for i in 0..4u32 {
            lvl.sidedefs.push(SideDef { mid_tex: "STARTAN3".into(), sector: 0, line: i, ..Default::default() });
            lvl.linedefs.push(LineDef {
                v1: i,
                v2: (i + 1) % 4,
                flags: LineFlags::IMPASSABLE,
                sidenum: [i, NO_INDEX],
                frontsector: 0,
                backsector: NO_INDEX,
                ..Default::default()
            });
        }
        let tree = crate::nodes::build_nodes(&lvl, crate::nodes::NodeBuildConfig::default()).unwrap();
        (lvl, tree)
    }

    #[test]
    fn empty_map_scenario_emits_six_surfaces() {
        let (lvl, tree) = one_sided_square();
        let surfaces = emit_all(&lvl, &tree, 16);
        assert_eq!(surfaces.len(), 6);
        assert_eq!(surfaces.iter().filter(|s| s.kind == SurfaceKind::WallMiddle).count(), 4);
        assert_eq!(surfaces.iter().filter(|s| s.kind == SurfaceKind::Floor).count(), 1);
        assert_eq!(surfaces.iter().filter(|s| s.kind == SurfaceKind::Ceiling).count(), 1);
    }

    #[test]
    fn triangulation_skips_degenerate_polygons() {
        let (lvl, tree) = one_sided_square();
        let surfaces = emit_all(&lvl, &tree, 16);
        let mesh = triangulate(&surfaces);
        assert!(mesh.triangle_count() > 0);
        assert_eq!(mesh.indices.len() % 3, 0);
    }
}
