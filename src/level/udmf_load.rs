//! UDMF → `Level` conversion — the other half of `C. Level loader`'s input.
//!
//! Every recognized key updates a typed field; the full key/value map is also
//! kept verbatim in the entity's `props` bag (per the distilled spec) so
//! later passes and the writer can round-trip UDMF-only keys this loader
//! doesn't interpret (`lightcolor`, `xscalefloor`, …).

use crate::level::{LineDef, LineFlags, Level, Sector, SideDef, Thing, Vertex, NO_INDEX};
use crate::math::Plane;
use crate::udmf::{parse_blocks, Block, Value};

fn f64_field(b: &Block, key: &str, default: f64) -> f64 {
    b.fields.get(key).and_then(Value::as_f64).unwrap_or(default)
}

fn i32_field(b: &Block, key: &str, default: i32) -> i32 {
    b.fields.get(key).and_then(Value::as_i64).map(|v| v as i32).unwrap_or(default)
}

fn str_field(b: &Block, key: &str, default: &str) -> String {
    b.fields.get(key).and_then(Value::as_str).unwrap_or(default).to_string()
}

fn bool_field(b: &Block, key: &str) -> bool {
    b.fields.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn index_field(b: &Block, key: &str) -> u32 {
    b.fields
        .get(key)
        .and_then(Value::as_i64)
        .map(|v| if v < 0 { NO_INDEX } else { v as u32 })
        .unwrap_or(NO_INDEX)
}

pub fn load_udmf(name: &str, textmap: &str) -> Level {
    let blocks = parse_blocks(textmap);

    let mut vertices = Vec::new();
    let mut linedefs = Vec::new();
    let mut sidedefs = Vec::new();
    let mut sectors = Vec::new();
    let mut things = Vec::new();

    for b in &blocks {
        match b.kind.as_str() {
            "vertex" => {
                let x = f64_field(b, "x", 0.0) as f32;
                let y = f64_field(b, "y", 0.0) as f32;
                vertices.push(Vertex {
                    pos: glam::vec2(x, y),
                    floor_z: b.fields.get("zfloor").and_then(Value::as_f64),
                    ceil_z: b.fields.get("zceiling").and_then(Value::as_f64),
                    props: b.fields.clone(),
                });
            }
            "linedef" => {
                let mut flags = LineFlags::empty();
                if bool_field(b, "blocking") {
                    flags |= LineFlags::IMPASSABLE;
                }
                if bool_field(b, "blockmonsters") {
                    flags |= LineFlags::BLOCK_MONSTERS;
                }
                if bool_field(b, "twosided") {
                    flags |= LineFlags::TWO_SIDED;
                }
                if bool_field(b, "dontpegtop") {
                    flags |= LineFlags::UPPER_UNPEGGED;
                }
                if bool_field(b, "dontpegbottom") {
                    flags |= LineFlags::LOWER_UNPEGGED;
                }
                if bool_field(b, "secret") {
                    flags |= LineFlags::SECRET;
                }
                if bool_field(b, "blocksound") {
                    flags |= LineFlags::BLOCK_SOUND;
                }
                if bool_field(b, "dontdraw") {
                    flags |= LineFlags::NOT_ON_MAP;
                }

                let tag = i32_field(b, "id", 0);
                linedefs.push(LineDef {
                    v1: i32_field(b, "v1", 0) as u32,
                    v2: i32_field(b, "v2", 0) as u32,
                    flags,
                    special: i32_field(b, "special", 0) as u16,
                    args: [
                        i32_field(b, "arg0", 0),
                        i32_field(b, "arg1", 0),
                        i32_field(b, "arg2", 0),
                        i32_field(b, "arg3", 0),
                        i32_field(b, "arg4", 0),
                    ],
                    tag,
                    ids: if tag != 0 { vec![tag] } else { Vec::new() },
                    sidenum: [index_field(b, "sidefront"), index_field(b, "sideback")],
                    sample_distance: [0; 3],
                    props: b.fields.clone(),
                    frontsector: NO_INDEX,
                    backsector: NO_INDEX,
                });
            }
            "sidedef" => {
                sidedefs.push(SideDef {
                    x_offset: i32_field(b, "offsetx", 0),
                    y_offset: i32_field(b, "offsety", 0),
                    top_tex: str_field(b, "texturetop", "-"),
                    bottom_tex: str_field(b, "texturebottom", "-"),
                    mid_tex: str_field(b, "texturemiddle", "-"),
                    sector: i32_field(b, "sector", 0) as u32,
                    line: NO_INDEX,
                    sample_distance: [0; 3],
                    props: b.fields.clone(),
                });
            }
            "sector" => {
                let floor_height = f64_field(b, "heightfloor", 0.0);
                let ceil_height = f64_field(b, "heightceiling", 0.0);
                let floor_tex = str_field(b, "texturefloor", "-");
                let ceil_tex = str_field(b, "textureceiling", "-");
                let tag = i32_field(b, "id", 0);
                sectors.push(Sector {
                    floor_height,
                    ceil_height,
                    sky_floor: floor_tex.eq_ignore_ascii_case("F_SKY1"),
                    sky_ceiling: ceil_tex.eq_ignore_ascii_case("F_SKY1"),
                    floor_tex,
                    ceil_tex,
                    light_level: i32_field(b, "lightlevel", 160),
                    special: i32_field(b, "special", 0),
                    tag,
                    tags: if tag != 0 { vec![tag] } else { Vec::new() },
                    floor_plane: Plane::horizontal(floor_height, true),
                    ceil_plane: Plane::horizontal(ceil_height, false),
                    sample_distance_floor: 0,
                    sample_distance_ceiling: 0,
                    floor_lightdef: -1,
                    ceiling_lightdef: -1,
                    control_sector: bool_field(b, "control_sector"),
                    x3dfloors: Vec::new(),
                    lines: Vec::new(),
                    portals: Vec::new(),
                    group: 0,
                    props: b.fields.clone(),
                });
            }
            "thing" => {
                let angle_deg = f64_field(b, "angle", 0.0) as f32;
                let mut flags = 0u16;
                if bool_field(b, "skill1") {
                    flags |= 0x1;
                }
                if bool_field(b, "skill2") {
                    flags |= 0x2;
                }
                if bool_field(b, "skill3") {
                    flags |= 0x4;
                }
                if bool_field(b, "ambush") {
                    flags |= 0x8;
                }
                if bool_field(b, "single") {
                    flags |= 0x10;
                }
                if bool_field(b, "dm") {
                    flags |= 0x20;
                }
                if bool_field(b, "coop") {
                    flags |= 0x40;
                }
                if bool_field(b, "friend") {
                    flags |= 0x80;
                }
                things.push(Thing {
                    pos: glam::vec2(f64_field(b, "x", 0.0) as f32, f64_field(b, "y", 0.0) as f32),
                    angle: angle_deg.to_radians(),
                    z_offset: i32_field(b, "height", 0),
                    type_id: i32_field(b, "type", 0) as u16,
                    flags,
                    tid: i32_field(b, "id", 0),
                    special: i32_field(b, "special", 0),
                    args: [
                        i32_field(b, "arg0", 0),
                        i32_field(b, "arg1", 0),
                        i32_field(b, "arg2", 0),
                        i32_field(b, "arg3", 0),
                        i32_field(b, "arg4", 0),
                    ],
                    props: b.fields.clone(),
                });
            }
            _ => {}
        }
    }

    Level {
        name: name.to_string(),
        vertices,
        linedefs,
        sidedefs,
        sectors,
        things,
        no_prune: false,
        // UDMF things/linedefs already carry `tid`/`special`/`args`, so
        // re-serializing them loses no information in the Hexen layout.
        hexen_format: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_minimal_textmap() {
        let src = r#"
            namespace = "zdoom";
            vertex { x = 0.0; y = 0.0; }
            vertex { x = 64.0; y = 0.0; }
            vertex { x = 64.0; y = 64.0; }
            vertex { x = 0.0; y = 64.0; }

            sector { heightfloor = 0; heightceiling = 128; texturefloor = "FLOOR4_8"; textureceiling = "CEIL3_5"; lightlevel = 160; }

            sidedef { sector = 0; texturemiddle = "STARTAN3"; }

            linedef { v1 = 0; v2 = 1; sidefront = 0; blocking = true; }
            linedef { v1 = 1; v2 = 2; sidefront = 0; blocking = true; }
            linedef { v1 = 2; v2 = 3; sidefront = 0; blocking = true; }
            linedef { v1 = 3; v2 = 0; sidefront = 0; blocking = true; }

            thing { x = 32.0; y = 32.0; angle = 90; type = 1; single = true; }
        "#;
        let level = load_udmf("MAP01", src);
        assert_eq!(level.vertices.len(), 4);
        assert_eq!(level.sectors.len(), 1);
        assert_eq!(level.sidedefs.len(), 1);
        assert_eq!(level.linedefs.len(), 4);
        assert_eq!(level.things.len(), 1);
        assert!(level.linedefs[0].flags.contains(LineFlags::IMPASSABLE));
        assert_eq!(level.sectors[0].floor_height, 0.0);
        assert_eq!(level.things[0].flags & 0x10, 0x10);
    }
}
