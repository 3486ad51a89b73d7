//! Slope resolver — `D. Slope resolver`.
//!
//! Runs after the loader/pruner and before the node builder. Vertex-height
//! things and UDMF `zfloor`/`zceiling` keys feed triangular-sector plane
//! fitting; `Plane_Align`/`Plane_Copy` line specials fit or copy planes
//! between sectors. Grounded on ZDRay's `math/plane.cpp` plane-fit helpers
//! and the level loader's slope pass described in `level_udmf.cpp`.

use glam::{DVec2, DVec3};
use log::{debug, trace};

use crate::level::{specials, Level, NO_INDEX};
use crate::math::Plane;

const VERTEX_HEIGHT_FLOOR: u16 = 1504;
const VERTEX_HEIGHT_CEILING: u16 = 1505;
const VAVOOM_FLOOR: u16 = 1500;
const VAVOOM_CEILING: u16 = 1501;
const POINTLINE_FLOOR: u16 = 9500;
const POINTLINE_CEILING: u16 = 9501;
const SET_FLOOR_SLOPE: u16 = 9502;
const SET_CEILING_SLOPE: u16 = 9503;

pub fn resolve_slopes(level: &mut Level) {
    apply_vertex_height_things(level);
    apply_triangular_sector_planes(level);
    apply_plane_align(level);
    apply_plane_copy(level);
    stub_unimplemented_slope_things(level);
}

/// Things 1504/1505: record `z` at the vertex they sit on, if any.
fn apply_vertex_height_things(level: &mut Level) {
    for t in &level.things {
        if t.type_id != VERTEX_HEIGHT_FLOOR && t.type_id != VERTEX_HEIGHT_CEILING {
            continue;
        }
        let Some(v) = level
            .vertices
            .iter_mut()
            .find(|v| (v.pos - t.pos).length_squared() < 1.0)
        else {
            continue;
        };
        if t.type_id == VERTEX_HEIGHT_FLOOR {
            v.floor_z = Some(t.z_offset as f64);
        } else {
            v.ceil_z = Some(t.z_offset as f64);
        }
    }
}

/// For every sector bounded by exactly three distinct vertices, fit a floor
/// and ceiling plane through those vertices using any recorded heights
/// (falling back to the sector's flat heights where a vertex has none).
fn apply_triangular_sector_planes(level: &mut Level) {
    for sector_idx in 0..level.sectors.len() {
        let verts = triangle_vertices(level, sector_idx as u32);
        let Some([v1, v2, v3]) = verts else { continue };

        let floor_h = level.sectors[sector_idx].floor_height;
        let ceil_h = level.sectors[sector_idx].ceil_height;

        let h = |v: u32, override_z: fn(&crate::level::Vertex) -> Option<f64>, default: f64| {
            override_z(&level.vertices[v as usize]).unwrap_or(default)
        };

        let floor_plane = plane_through(
            level.vertices[v1 as usize].pos,
            h(v1, |v| v.floor_z, floor_h),
            level.vertices[v2 as usize].pos,
            h(v2, |v| v.floor_z, floor_h),
            level.vertices[v3 as usize].pos,
            h(v3, |v| v.floor_z, floor_h),
            true,
        );
        let ceil_plane = plane_through(
            level.vertices[v1 as usize].pos,
            h(v1, |v| v.ceil_z, ceil_h),
            level.vertices[v2 as usize].pos,
            h(v2, |v| v.ceil_z, ceil_h),
            level.vertices[v3 as usize].pos,
            h(v3, |v| v.ceil_z, ceil_h),
            false,
        );

        if let Some(p) = floor_plane {
            level.sectors[sector_idx].floor_plane = p;
        }
        if let Some(p) = ceil_plane {
            level.sectors[sector_idx].ceil_plane = p;
        }
    }
}

fn triangle_vertices(level: &Level, sector_idx: u32) -> Option<[u32; 3]> {
    let sector = &level.sectors[sector_idx as usize];
    let mut verts: Vec<u32> = Vec::new();
    for &line_idx in &sector.lines {
        let l = &level.linedefs[line_idx as usize];
        for v in [l.v1, l.v2] {
            if !verts.contains(&v) {
                verts.push(v);
            }
        }
    }
    if verts.len() == 3 {
        Some([verts[0], verts[1], verts[2]])
    } else {
        None
    }
}

/// Fit a plane through three `(x, y, z)` points, oriented so the normal faces
/// up (`want_up = true`, for floors) or down (ceilings).
fn plane_through(p1: Vec2Like, h1: f64, p2: Vec2Like, h2: f64, p3: Vec2Like, h3: f64, want_up: bool) -> Option<Plane> {
    let a = DVec3::new(p1.x as f64, p1.y as f64, h1);
    let b = DVec3::new(p2.x as f64, p2.y as f64, h2);
    let c = DVec3::new(p3.x as f64, p3.y as f64, h3);
    let mut normal = (b - c).cross(a - c);
    if normal.length_squared() < 1e-9 {
        return None;
    }
    if want_up && normal.z < 0.0 {
        normal = -normal;
    } else if !want_up && normal.z > 0.0 {
        normal = -normal;
    }
    let normal = normal.normalize();
    Some(Plane {
        a: normal.x,
        b: normal.y,
        c: normal.z,
        d: normal.dot(a),
    })
}

type Vec2Like = glam::Vec2;

/// `Plane_Align` (special 181). Decision: `args[0]` bit 0 applies to the
/// floor, bit 1 to the ceiling; the line's front sector is the destination
/// whose plane is fit, the back sector supplies the anchor height. Recorded
/// as an explicit choice since the distilled spec leaves the front/back
/// assignment unstated.
fn apply_plane_align(level: &mut Level) {
    for line_idx in 0..level.linedefs.len() {
        let l = level.linedefs[line_idx].clone();
        if l.special != specials::PLANE_ALIGN || !l.is_two_sided() {
            continue;
        }
        let dest = l.frontsector;
        let src = l.backsector;
        if dest == NO_INDEX || src == NO_INDEX {
            continue;
        }

        let far_vertex = far_vertex_in_sector(level, dest, l.v1, l.v2);
        let Some(far) = far_vertex else { continue };

        let p_v1 = level.vertices[l.v1 as usize].pos;
        let p_v2 = level.vertices[l.v2 as usize].pos;
        let p_far = level.vertices[far as usize].pos;

        if l.args[0] & 1 != 0 {
            let dest_h = level.sectors[dest as usize].floor_height;
            let src_h = level.sectors[src as usize].floor_height;
            if let Some(p) = plane_through(p_v1, dest_h, p_v2, dest_h, p_far, src_h, true) {
                level.sectors[dest as usize].floor_plane = p;
            }
        }
        if l.args[0] & 2 != 0 {
            let dest_h = level.sectors[dest as usize].ceil_height;
            let src_h = level.sectors[src as usize].ceil_height;
            if let Some(p) = plane_through(p_v1, dest_h, p_v2, dest_h, p_far, src_h, false) {
                level.sectors[dest as usize].ceil_plane = p;
            }
        }
    }
}

fn far_vertex_in_sector(level: &Level, sector_idx: u32, v1: u32, v2: u32) -> Option<u32> {
    let sector = &level.sectors[sector_idx as usize];
    let a = level.vertices[v1 as usize].pos;
    let b = level.vertices[v2 as usize].pos;
    let dir = (b - a).normalize_or_zero();
    let normal = DVec2::new(-dir.y as f64, dir.x as f64);

    let mut best: Option<(u32, f64)> = None;
    for &line_idx in &sector.lines {
        let l = &level.linedefs[line_idx as usize];
        for v in [l.v1, l.v2] {
            let p = level.vertices[v as usize].pos;
            let dist = ((p - a).as_dvec2()).dot(normal).abs();
            if best.is_none_or(|(_, d)| dist > d) {
                best = Some((v, dist));
            }
        }
    }
    best.map(|(v, _)| v)
}

/// `Plane_Copy` (special 118). `args[0..3]` are sector tags receiving the
/// line's front-floor / front-ceiling / back-floor / back-ceiling planes
/// (`0` = no copy); `args[4]` bits `0b0011` copy front onto the line's own
/// back sector directly, bits `0b1100` copy back onto front.
fn apply_plane_copy(level: &mut Level) {
    for line_idx in 0..level.linedefs.len() {
        let l = level.linedefs[line_idx].clone();
        if l.special != specials::PLANE_COPY {
            continue;
        }
        let front = l.frontsector;
        let back = l.backsector;

        let sources: [(i32, Option<(u32, bool)>); 4] = [
            (l.args[0], front_plane_ref(front, true)),
            (l.args[1], front_plane_ref(front, false)),
            (l.args[2], front_plane_ref(back, true)),
            (l.args[3], front_plane_ref(back, false)),
        ];
        for (tag, src) in sources {
            if tag == 0 {
                continue;
            }
            let Some((src_sector, is_floor)) = src else { continue };
            let plane = if is_floor {
                level.sectors[src_sector as usize].floor_plane
            } else {
                level.sectors[src_sector as usize].ceil_plane
            };
            for sector in &mut level.sectors {
                if sector.has_tag(tag) {
                    if is_floor {
                        sector.floor_plane = plane;
                    } else {
                        sector.ceil_plane = plane;
                    }
                }
            }
        }

        if front != NO_INDEX && back != NO_INDEX {
            if l.args[4] & 0b0011 != 0 {
                let (fp, cp) = (level.sectors[front as usize].floor_plane, level.sectors[front as usize].ceil_plane);
                if l.args[4] & 0b0001 != 0 {
                    level.sectors[back as usize].floor_plane = fp;
                }
                if l.args[4] & 0b0010 != 0 {
                    level.sectors[back as usize].ceil_plane = cp;
                }
            }
            if l.args[4] & 0b1100 != 0 {
                let (fp, cp) = (level.sectors[back as usize].floor_plane, level.sectors[back as usize].ceil_plane);
                if l.args[4] & 0b0100 != 0 {
                    level.sectors[front as usize].floor_plane = fp;
                }
                if l.args[4] & 0b1000 != 0 {
                    level.sectors[front as usize].ceil_plane = cp;
                }
            }
        }
    }
}

fn front_plane_ref(sector: u32, is_floor: bool) -> Option<(u32, bool)> {
    if sector == NO_INDEX {
        None
    } else {
        Some((sector, is_floor))
    }
}

/// Vavoom slope makers (1500/1501) and point-line slopes (9500/9501/9502/9503)
/// are stubbed: consumed and logged, never resolved into a plane.
fn stub_unimplemented_slope_things(level: &mut Level) {
    let before = level.things.len();
    level.things.retain(|t| {
        let stub = matches!(
            t.type_id,
            VAVOOM_FLOOR | VAVOOM_CEILING | POINTLINE_FLOOR | POINTLINE_CEILING | SET_FLOOR_SLOPE | SET_CEILING_SLOPE
        );
        if stub {
            trace!("stub slope-maker thing type {} consumed without effect", t.type_id);
        }
        !stub
    });
    let stubbed = before - level.things.len();
    if stubbed > 0 {
        debug!("consumed {stubbed} stubbed slope-maker thing(s)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::{LineDef, LineFlags, Sector, SideDef, Thing, Vertex};

    fn triangle_level(h1: f64, h2: f64, h3: f64) -> Level {
        let vertices = vec![
            Vertex { pos: glam::vec2(0.0, 0.0), floor_z: None, ceil_z: None, props: Default::default() },
            Vertex { pos: glam::vec2(64.0, 0.0), floor_z: None, ceil_z: None, props: Default::default() },
            Vertex { pos: glam::vec2(0.0, 64.0), floor_z: None, ceil_z: None, props: Default::default() },
        ];
        let mut sector = Sector { floor_height: 0.0, ceil_height: 128.0, ..Default::default() };
        sector.floor_plane = Plane::horizontal(0.0, true);
        sector.ceil_plane = Plane::horizontal(128.0, false);

        let mut lvl = Level {
            name: "MAP01".into(),
            vertices,
            linedefs: Vec::new(),
            sidedefs: Vec::new(),
            sectors: vec![sector],
            things: vec![
                Thing { pos: glam::vec2(0.0, 0.0), z_offset: h1 as i32, type_id: 1504, ..Default::default() },
                Thing { pos: glam::vec2(64.0, 0.0), z_offset: h2 as i32, type_id: 1504, ..Default::default() },
                Thing { pos: glam::vec2(0.0, 64.0), z_offset: h3 as i32, type_id: 1504, ..Default::default() },
            ],
            no_prune: false,
        };
        for i in 0..3u32 {
            lvl.linedefs.push(LineDef {
                v1: i,
                v2: (i + 1) % 3,
                flags: LineFlags::default(),
                special: 0,
                args: [0; 5],
                tag: 0,
                ids: Vec::new(),
                sidenum: [i, NO_INDEX],
                sample_distance: [0; 3],
                props: Default::default(),
                frontsector: 0,
                backsector: NO_INDEX,
            });
            lvl.sidedefs.push(SideDef {
                x_offset: 0,
                y_offset: 0,
                top_tex: "-".into(),
                bottom_tex: "-".into(),
                mid_tex: "-".into(),
                sector: 0,
                line: i,
                sample_distance: [0; 3],
                props: Default::default(),
            });
        }
        lvl.sectors[0].lines = vec![0, 1, 2];
        lvl
    }

    #[test]
    fn triangular_sector_floor_matches_vertex_heights() {
        let mut lvl = triangle_level(0.0, 0.0, 64.0);
        resolve_slopes(&mut lvl);
        let plane = lvl.sectors[0].floor_plane;
        assert!((plane.z_at(0.0, 0.0) - 0.0).abs() < 1e-3);
        assert!((plane.z_at(64.0, 0.0) - 0.0).abs() < 1e-3);
        assert!((plane.z_at(0.0, 64.0) - 64.0).abs() < 1e-3);
    }

    #[test]
    fn stub_things_are_consumed() {
        let mut lvl = triangle_level(0.0, 0.0, 0.0);
        lvl.things.push(Thing { pos: glam::vec2(1.0, 1.0), type_id: 1500, ..Default::default() });
        resolve_slopes(&mut lvl);
        assert!(lvl.things.iter().all(|t| t.type_id != 1500));
    }
}
