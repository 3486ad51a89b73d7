//! Binary map lump parsing — Doom and Hexen-extended THINGS/LINEDEFS, plus the
//! shared SIDEDEFS/VERTEXES/SECTORS formats.
//!
//! Grounded in the teacher crate's `wad::level` module (same `Cursor` +
//! `parse_vec!` shape), extended with Hexen's wider records (detected by the
//! presence of a `BEHAVIOR` lump in the map's lump span) and `NO_INDEX`
//! widening of the `0xffff` "no side" sentinel.

use byteorder::{LittleEndian as LE, ReadBytesExt};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::{Cursor, Read};

use crate::error::{BuildError, Result};
use crate::level::{LineDef, LineFlags, Level, Sector, SideDef, Thing, NO_INDEX};
use crate::math::{FixedPoint, Plane};
use crate::wad::Wad;

static MAP_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(E[1-4]M[1-9]|MAP[0-3][0-9])$").unwrap());

pub fn is_map_marker(name: &str) -> bool {
    MAP_MARKER.is_match(name)
}

/// Directory indices of every map marker lump in `wad`.
pub fn level_markers(wad: &Wad) -> Vec<usize> {
    wad.lumps()
        .iter()
        .enumerate()
        .filter(|(_, l)| l.size == 0 && is_map_marker(Wad::lump_name(&l.name)))
        .map(|(i, _)| i)
        .collect()
}

struct MapSpan {
    things: Option<usize>,
    linedefs: Option<usize>,
    sidedefs: Option<usize>,
    vertexes: Option<usize>,
    sectors: Option<usize>,
    is_hexen: bool,
}

fn scan_span(wad: &Wad, marker_idx: usize) -> MapSpan {
    let mut end = wad.lumps().len();
    for i in marker_idx + 1..wad.lumps().len() {
        if wad.lumps()[i].size == 0 && is_map_marker(Wad::lump_name(&wad.lumps()[i].name)) {
            end = i;
            break;
        }
    }
    let find = |name: &str| -> Option<usize> {
        wad.lumps()[marker_idx + 1..end]
            .iter()
            .position(|l| Wad::lump_name(&l.name) == name)
            .map(|rel| rel + marker_idx + 1)
    };
    MapSpan {
        things: find("THINGS"),
        linedefs: find("LINEDEFS"),
        sidedefs: find("SIDEDEFS"),
        vertexes: find("VERTEXES"),
        sectors: find("SECTORS"),
        is_hexen: find("BEHAVIOR").is_some(),
    }
}

macro_rules! parse_vec {
    ($buf:expr, $size:expr, $body:expr) => {{
        if $buf.len() % $size != 0 {
            return Err(BuildError::MalformedMap(format!(
                "lump size {} is not a multiple of record size {}",
                $buf.len(),
                $size
            )));
        }
        let mut cur = Cursor::new($buf);
        let mut v = Vec::with_capacity($buf.len() / $size);
        while (cur.position() as usize) < $buf.len() {
            v.push($body(&mut cur)?);
        }
        v
    }};
}

fn read_tex(c: &mut Cursor<&[u8]>) -> std::io::Result<String> {
    let mut buf = [0u8; 8];
    c.read_exact(&mut buf)?;
    Ok(Wad::lump_name(&buf).to_string())
}

/// Parse the map at `marker_idx` into a fresh `Level` using only the binary
/// lumps (THINGS/LINEDEFS/SIDEDEFS/VERTEXES/SECTORS). BSP/blockmap/reject
/// lumps present in the input are ignored — this tool always rebuilds them.
pub fn load_binary_map(wad: &Wad, marker_idx: usize) -> Result<Level> {
    let span = scan_span(wad, marker_idx);

    let things_idx = span
        .things
        .ok_or_else(|| BuildError::MalformedMap("THINGS lump missing".into()))?;
    let linedefs_idx = span
        .linedefs
        .ok_or_else(|| BuildError::MalformedMap("LINEDEFS lump missing".into()))?;
    let sidedefs_idx = span
        .sidedefs
        .ok_or_else(|| BuildError::MalformedMap("SIDEDEFS lump missing".into()))?;
    let vertexes_idx = span
        .vertexes
        .ok_or_else(|| BuildError::MalformedMap("VERTEXES lump missing".into()))?;
    let sectors_idx = span
        .sectors
        .ok_or_else(|| BuildError::MalformedMap("SECTORS lump missing".into()))?;

    let vertices = {
        let buf = wad.lump_bytes(vertexes_idx)?;
        let raw: Vec<(i16, i16)> = parse_vec!(buf, 4, |c: &mut Cursor<&[u8]>| -> std::io::Result<(i16, i16)> {
            Ok((c.read_i16::<LE>()?, c.read_i16::<LE>()?))
        });
        raw.into_iter()
            .map(|(x, y)| crate::level::Vertex {
                pos: glam::vec2(FixedPoint::from(x).to_f32(), FixedPoint::from(y).to_f32()),
                floor_z: None,
                ceil_z: None,
                props: Default::default(),
            })
            .collect::<Vec<_>>()
    };

    let things = if span.is_hexen {
        let buf = wad.lump_bytes(things_idx)?;
        parse_vec!(buf, 20, |c: &mut Cursor<&[u8]>| -> std::io::Result<Thing> {
            let tid = c.read_i16::<LE>()? as i32;
            let x = c.read_i16::<LE>()?;
            let y = c.read_i16::<LE>()?;
            let z = c.read_i16::<LE>()?;
            let angle = c.read_u16::<LE>()?;
            let type_id = c.read_u16::<LE>()?;
            let flags = c.read_u16::<LE>()?;
            let special = c.read_u8()? as i32;
            let mut args = [0i32; 5];
            for a in args.iter_mut() {
                *a = c.read_u8()? as i32;
            }
            Ok(Thing {
                pos: glam::vec2(x as f32, y as f32),
                angle: (angle as f32).to_radians(),
                z_offset: z as i32,
                type_id,
                flags,
                tid,
                special,
                args,
                props: Default::default(),
            })
        })
    } else {
        let buf = wad.lump_bytes(things_idx)?;
        parse_vec!(buf, 10, |c: &mut Cursor<&[u8]>| -> std::io::Result<Thing> {
            let x = c.read_i16::<LE>()?;
            let y = c.read_i16::<LE>()?;
            let angle = c.read_u16::<LE>()?;
            let type_id = c.read_u16::<LE>()?;
            let flags = c.read_u16::<LE>()?;
            Ok(Thing {
                pos: glam::vec2(x as f32, y as f32),
                angle: (angle as f32).to_radians(),
                z_offset: 0,
                type_id,
                flags,
                tid: 0,
                special: 0,
                args: [0; 5],
                props: Default::default(),
            })
        })
    };

    let linedefs = if span.is_hexen {
        let buf = wad.lump_bytes(linedefs_idx)?;
        parse_vec!(buf, 16, |c: &mut Cursor<&[u8]>| -> std::io::Result<LineDef> {
            let v1 = c.read_u16::<LE>()? as u32;
            let v2 = c.read_u16::<LE>()? as u32;
            let flags = c.read_u16::<LE>()?;
            let special = c.read_u8()? as u16;
            let mut args = [0i32; 5];
            for a in args.iter_mut() {
                *a = c.read_u8()? as i32;
            }
            let mut sidenum = [c.read_u16::<LE>()? as u32, c.read_u16::<LE>()? as u32];
            for s in sidenum.iter_mut() {
                if *s == 0xffff {
                    *s = NO_INDEX;
                }
            }
            Ok(LineDef {
                v1,
                v2,
                flags: LineFlags::from_bits_truncate(flags as u32),
                special,
                args,
                tag: 0,
                ids: Vec::new(),
                sidenum,
                sample_distance: [0; 3],
                props: Default::default(),
                frontsector: NO_INDEX,
                backsector: NO_INDEX,
            })
        })
    } else {
        let buf = wad.lump_bytes(linedefs_idx)?;
        parse_vec!(buf, 14, |c: &mut Cursor<&[u8]>| -> std::io::Result<LineDef> {
            let v1 = c.read_u16::<LE>()? as u32;
            let v2 = c.read_u16::<LE>()? as u32;
            let flags = c.read_u16::<LE>()?;
            let special = c.read_u16::<LE>()?;
            let tag = c.read_u16::<LE>()? as i32;
            let mut sidenum = [c.read_u16::<LE>()? as u32, c.read_u16::<LE>()? as u32];
            for s in sidenum.iter_mut() {
                if *s == 0xffff {
                    *s = NO_INDEX;
                }
            }
            Ok(LineDef {
                v1,
                v2,
                flags: LineFlags::from_bits_truncate(flags as u32),
                special,
                args: [0; 5],
                tag,
                ids: vec![tag],
                sidenum,
                sample_distance: [0; 3],
                props: Default::default(),
                frontsector: NO_INDEX,
                backsector: NO_INDEX,
            })
        })
    };

    let sidedefs = {
        let buf = wad.lump_bytes(sidedefs_idx)?;
        parse_vec!(buf, 30, |c: &mut Cursor<&[u8]>| -> std::io::Result<SideDef> {
            let x_offset = c.read_i16::<LE>()? as i32;
            let y_offset = c.read_i16::<LE>()? as i32;
            let top_tex = read_tex(c)?;
            let bottom_tex = read_tex(c)?;
            let mid_tex = read_tex(c)?;
            let sector = c.read_u16::<LE>()? as u32;
            Ok(SideDef {
                x_offset,
                y_offset,
                top_tex,
                bottom_tex,
                mid_tex,
                sector,
                line: NO_INDEX,
                sample_distance: [0; 3],
                props: Default::default(),
            })
        })
    };

    let sectors = {
        let buf = wad.lump_bytes(sectors_idx)?;
        parse_vec!(buf, 26, |c: &mut Cursor<&[u8]>| -> std::io::Result<Sector> {
            let floor_height = c.read_i16::<LE>()? as f64;
            let ceil_height = c.read_i16::<LE>()? as f64;
            let floor_tex = read_tex(c)?;
            let ceil_tex = read_tex(c)?;
            let light_level = c.read_i16::<LE>()? as i32;
            let special = c.read_i16::<LE>()? as i32;
            let tag = c.read_i16::<LE>()? as i32;
            let sky_floor = floor_tex.eq_ignore_ascii_case("F_SKY1");
            let sky_ceiling = ceil_tex.eq_ignore_ascii_case("F_SKY1");
            Ok(Sector {
                floor_height,
                ceil_height,
                floor_tex,
                ceil_tex,
                light_level,
                special,
                tag,
                tags: if tag != 0 { vec![tag] } else { Vec::new() },
                floor_plane: Plane::horizontal(floor_height, true),
                ceil_plane: Plane::horizontal(ceil_height, false),
                sample_distance_floor: 0,
                sample_distance_ceiling: 0,
                floor_lightdef: -1,
                ceiling_lightdef: -1,
                sky_floor,
                sky_ceiling,
                control_sector: false,
                x3dfloors: Vec::new(),
                lines: Vec::new(),
                portals: Vec::new(),
                group: 0,
                props: Default::default(),
            })
        })
    };

    Ok(Level {
        name: Wad::lump_name(&wad.lumps()[marker_idx].name).to_string(),
        vertices,
        linedefs,
        sidedefs,
        sectors,
        things,
        no_prune: false,
        hexen_format: span.is_hexen,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wad::{WadKind, WadWriter};

    fn le16(v: i16) -> [u8; 2] {
        v.to_le_bytes()
    }

    /// Build a minimal single-sector square map (scenario 1 from the
    /// distilled spec's end-to-end tests).
    fn square_room_wad() -> Vec<u8> {
        let mut w = WadWriter::new();
        w.push_marker("MAP01");

        // THINGS: single player 1 start at origin.
        let mut things = Vec::new();
        things.extend_from_slice(&le16(32));
        things.extend_from_slice(&le16(32));
        things.extend_from_slice(&0u16.to_le_bytes());
        things.extend_from_slice(&1u16.to_le_bytes());
        things.extend_from_slice(&7u16.to_le_bytes());
        w.push("THINGS", things);

        // VERTEXES: unit square.
        let mut vtx = Vec::new();
        for (x, y) in [(0i16, 0i16), (64, 0), (64, 64), (0, 64)] {
            vtx.extend_from_slice(&le16(x));
            vtx.extend_from_slice(&le16(y));
        }
        w.push("VERTEXES", vtx);

        // LINEDEFS: 4 one-sided lines around the square.
        let mut lines = Vec::new();
        for i in 0..4u16 {
            let v1 = i;
            let v2 = (i + 1) % 4;
            lines.extend_from_slice(&v1.to_le_bytes());
            lines.extend_from_slice(&v2.to_le_bytes());
            lines.extend_from_slice(&0u16.to_le_bytes()); // flags
            lines.extend_from_slice(&0u16.to_le_bytes()); // special
            lines.extend_from_slice(&0u16.to_le_bytes()); // tag
            lines.extend_from_slice(&(i).to_le_bytes()); // sidenum[0]
            lines.extend_from_slice(&0xffffu16.to_le_bytes()); // sidenum[1]
        }
        w.push("LINEDEFS", lines);

        // SIDEDEFS: 4 sides, all pointing at sector 0.
        let mut sides = Vec::new();
        for _ in 0..4 {
            sides.extend_from_slice(&0i16.to_le_bytes());
            sides.extend_from_slice(&0i16.to_le_bytes());
            sides.extend_from_slice(b"-\0\0\0\0\0\0\0");
            sides.extend_from_slice(b"-\0\0\0\0\0\0\0");
            sides.extend_from_slice(b"STARTAN3");
            sides.extend_from_slice(&0u16.to_le_bytes());
        }
        w.push("SIDEDEFS", sides);

        // SECTORS: one sector, floor 0 / ceiling 128.
        let mut sectors = Vec::new();
        sectors.extend_from_slice(&0i16.to_le_bytes());
        sectors.extend_from_slice(&128i16.to_le_bytes());
        sectors.extend_from_slice(b"FLOOR4_8");
        sectors.extend_from_slice(b"CEIL3_5\0");
        sectors.extend_from_slice(&160i16.to_le_bytes());
        sectors.extend_from_slice(&0i16.to_le_bytes());
        sectors.extend_from_slice(&0i16.to_le_bytes());
        w.push("SECTORS", sectors);

        w.to_bytes().unwrap()
    }

    #[test]
    fn loads_square_room() {
        let bytes = square_room_wad();
        let num_lumps = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
        let dir_offset = u32::from_le_bytes(bytes[8..12].try_into().unwrap());
        let wad = Wad::from_bytes(bytes, WadKind::Pwad, num_lumps, dir_offset).unwrap();

        let markers = level_markers(&wad);
        assert_eq!(markers.len(), 1);
        let level = load_binary_map(&wad, markers[0]).unwrap();

        assert_eq!(level.vertices.len(), 4);
        assert_eq!(level.linedefs.len(), 4);
        assert_eq!(level.sidedefs.len(), 4);
        assert_eq!(level.sectors.len(), 1);
        assert_eq!(level.things.len(), 1);
        assert_eq!(level.sectors[0].floor_height, 0.0);
        assert_eq!(level.sectors[0].ceil_height, 128.0);
        for ld in &level.linedefs {
            assert_ne!(ld.sidenum[0], NO_INDEX);
            assert_eq!(ld.sidenum[1], NO_INDEX);
        }
    }
}
