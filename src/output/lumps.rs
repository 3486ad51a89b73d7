//! Map-lump re-serialization — `K. Output`'s `VERTEXES`/`LINEDEFS`/`SIDEDEFS`/
//! `SECTORS`/`THINGS`/`SEGS`/`SSECTORS`/`NODES`/`GL_*` families, grounded on
//! the teacher crate's `wad` read path run in reverse.

use byteorder::{LittleEndian as LE, WriteBytesExt};
use std::io::Write;

use crate::error::Result;
use crate::level::{Level, NO_INDEX};
use crate::math::FixedPoint;
use crate::nodes::{NodeTree, SUBSECTOR_BIT};

fn tex8(out: &mut Vec<u8>, name: &str) -> Result<()> {
    let mut bytes = [0u8; 8];
    for (i, b) in name.as_bytes().iter().take(8).enumerate() {
        bytes[i] = *b;
    }
    out.write_all(&bytes)?;
    Ok(())
}

fn short_index(idx: u32) -> i16 {
    if idx == NO_INDEX { -1 } else { idx as i16 }
}

pub fn write_vertexes(level: &Level) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(level.vertices.len() * 4);
    for v in &level.vertices {
        out.write_i16::<LE>(v.pos.x.round() as i16)?;
        out.write_i16::<LE>(v.pos.y.round() as i16)?;
    }
    Ok(out)
}

pub fn write_gl_vert(nodes: &NodeTree) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    out.write_all(b"gNd2")?;
    for v in &nodes.vertices[nodes.num_org_verts as usize..] {
        out.write_i32::<LE>(FixedPoint::from_f32(v.x).0)?;
        out.write_i32::<LE>(FixedPoint::from_f32(v.y).0)?;
    }
    Ok(out)
}

pub fn write_linedefs(level: &Level) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for l in &level.linedefs {
        out.write_i16::<LE>(l.v1 as i16)?;
        out.write_i16::<LE>(l.v2 as i16)?;
        if level.hexen_format {
            out.write_i16::<LE>(l.flags.bits() as i16)?;
            out.write_u8(l.special as u8)?;
            for a in l.args {
                out.write_u8(a as u8)?;
            }
        } else {
            out.write_i16::<LE>(l.flags.bits() as i16)?;
            out.write_i16::<LE>(l.special as i16)?;
            out.write_i16::<LE>(l.tag as i16)?;
        }
        out.write_i16::<LE>(short_index(l.sidenum[0]))?;
        out.write_i16::<LE>(short_index(l.sidenum[1]))?;
    }
    Ok(out)
}

pub fn write_sidedefs(level: &Level) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for s in &level.sidedefs {
        out.write_i16::<LE>(s.x_offset as i16)?;
        out.write_i16::<LE>(s.y_offset as i16)?;
        tex8(&mut out, &s.top_tex)?;
        tex8(&mut out, &s.bottom_tex)?;
        tex8(&mut out, &s.mid_tex)?;
        out.write_i16::<LE>(s.sector as i16)?;
    }
    Ok(out)
}

pub fn write_sectors(level: &Level) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for s in &level.sectors {
        out.write_i16::<LE>(s.floor_height as i16)?;
        out.write_i16::<LE>(s.ceil_height as i16)?;
        tex8(&mut out, &s.floor_tex)?;
        tex8(&mut out, &s.ceil_tex)?;
        out.write_i16::<LE>(s.light_level as i16)?;
        out.write_i16::<LE>(s.special as i16)?;
        out.write_i16::<LE>(s.tag as i16)?;
    }
    Ok(out)
}

pub fn write_things(level: &Level) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let angle_deg = |a: f32| (a.to_degrees().round() as i32).rem_euclid(360) as i16;
    for t in &level.things {
        if level.hexen_format {
            out.write_i16::<LE>(t.tid as i16)?;
            out.write_i16::<LE>(t.pos.x.round() as i16)?;
            out.write_i16::<LE>(t.pos.y.round() as i16)?;
            out.write_i16::<LE>(t.z_offset as i16)?;
            out.write_i16::<LE>(angle_deg(t.angle))?;
            out.write_i16::<LE>(t.type_id as i16)?;
            out.write_i16::<LE>(t.flags as i16)?;
            out.write_u8(t.special as u8)?;
            for a in t.args {
                out.write_u8(a as u8)?;
            }
        } else {
            out.write_i16::<LE>(t.pos.x.round() as i16)?;
            out.write_i16::<LE>(t.pos.y.round() as i16)?;
            out.write_i16::<LE>(angle_deg(t.angle))?;
            out.write_i16::<LE>(t.type_id as i16)?;
            out.write_i16::<LE>(t.flags as i16)?;
        }
    }
    Ok(out)
}

/// `true` if every count below fits a classic 16-bit lump (`SEGS`/`SSECTORS`/
/// `NODES` pick the compressed form otherwise, per the distilled spec's
/// "Output" paragraph).
pub fn fits_classic_counts(nodes: &NodeTree) -> bool {
    nodes.segs.len() <= 0xffff && nodes.subsectors.len() <= 0xffff && nodes.nodes.len() <= 0xffff && nodes.vertices.len() <= 0xffff
}

pub fn write_segs_classic(nodes: &NodeTree) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(nodes.segs.len() * 12);
    for s in &nodes.segs {
        out.write_i16::<LE>(s.v1 as i16)?;
        out.write_i16::<LE>(s.v2 as i16)?;
        out.write_i16::<LE>(0)?; // angle: unused by this tool's consumers
        out.write_i16::<LE>(s.line as i16)?;
        out.write_i16::<LE>(s.side as i16)?;
        out.write_i16::<LE>(0)?; // offset: recomputed by engines at load time
    }
    Ok(out)
}

pub fn write_ssectors_classic(nodes: &NodeTree) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(nodes.subsectors.len() * 4);
    for s in &nodes.subsectors {
        out.write_u16::<LE>(s.num_segs as u16)?;
        out.write_u16::<LE>(s.first_seg as u16)?;
    }
    Ok(out)
}

pub fn write_nodes_classic(nodes: &NodeTree) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(nodes.nodes.len() * 28);
    for n in &nodes.nodes {
        out.write_i16::<LE>(n.x as i16)?;
        out.write_i16::<LE>(n.y as i16)?;
        out.write_i16::<LE>(n.dx as i16)?;
        out.write_i16::<LE>(n.dy as i16)?;
        for bb in &n.bbox {
            out.write_i16::<LE>(bb.max.y as i16)?;
            out.write_i16::<LE>(bb.min.y as i16)?;
            out.write_i16::<LE>(bb.min.x as i16)?;
            out.write_i16::<LE>(bb.max.x as i16)?;
        }
        for &child in &n.children {
            out.write_u16::<LE>(classic_child(child))?;
        }
    }
    Ok(out)
}

/// Compressed variant for the counts classic form can't hold (`SSECTORS`'
/// entry count bit 31 marks the subsector tag; children keep the full-width
/// `SUBSECTOR_BIT`), per the spec's "classic vs compressed" selection.
pub fn write_nodes_compressed(nodes: &NodeTree) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(nodes.nodes.len() * 32);
    for n in &nodes.nodes {
        out.write_i16::<LE>(n.x as i16)?;
        out.write_i16::<LE>(n.y as i16)?;
        out.write_i16::<LE>(n.dx as i16)?;
        out.write_i16::<LE>(n.dy as i16)?;
        for bb in &n.bbox {
            out.write_i16::<LE>(bb.max.y as i16)?;
            out.write_i16::<LE>(bb.min.y as i16)?;
            out.write_i16::<LE>(bb.min.x as i16)?;
            out.write_i16::<LE>(bb.max.x as i16)?;
        }
        for &child in &n.children {
            out.write_u32::<LE>(child)?;
        }
    }
    Ok(out)
}

pub fn write_ssectors_compressed(nodes: &NodeTree) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(nodes.subsectors.len() * 8);
    for s in &nodes.subsectors {
        out.write_u32::<LE>(s.num_segs)?;
        out.write_u32::<LE>(s.first_seg)?;
    }
    Ok(out)
}

pub fn write_gl_segs(nodes: &NodeTree) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(nodes.segs.len() * 10);
    for s in &nodes.segs {
        out.write_u32::<LE>(s.v1)?;
        out.write_u32::<LE>(s.v2)?;
        out.write_i16::<LE>(s.line as i16)?;
        out.write_i16::<LE>(s.side as i16)?;
        out.write_i32::<LE>(s.partner as i32)?;
    }
    Ok(out)
}

pub fn write_gl_nodes_v5(nodes: &NodeTree) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    out.write_all(b"gNd5")?;
    out.extend_from_slice(&write_nodes_compressed(nodes)?);
    Ok(out)
}

pub fn write_gl_ssect_v5(nodes: &NodeTree) -> Result<Vec<u8>> {
    write_ssectors_compressed(nodes)
}

/// The 32-bit compressed/GL form tags a subsector child with the in-memory
/// `SUBSECTOR_BIT` (`0x8000_0000`) verbatim, so `write_nodes_compressed` can
/// write `child` straight through. The classic 16-bit form uses a different,
/// narrower tag bit (`0x8000`) on the truncated index — this remaps one to
/// the other instead of truncating the wide bit away.
fn classic_child(child: u32) -> u16 {
    if child & SUBSECTOR_BIT != 0 {
        0x8000 | (child & !SUBSECTOR_BIT) as u16
    } else {
        child as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::Vertex;

    #[test]
    fn vertexes_round_to_nearest_integer() {
        let mut level = Level::default();
        level.vertices.push(Vertex { pos: glam::vec2(10.6, -3.4), ..Default::default() });
        let bytes = write_vertexes(&level).unwrap();
        assert_eq!(bytes.len(), 4);
        assert_eq!(i16::from_le_bytes([bytes[0], bytes[1]]), 11);
        assert_eq!(i16::from_le_bytes([bytes[2], bytes[3]]), -3);
    }
}
