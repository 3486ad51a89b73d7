//! `LIGHTMAP` lump encoding — the last paragraph of `K. Output`.
//!
//! Header, per-surface records, per-surface UV coordinate blocks (reordered
//! from the triangulation's strip/fan layout back to a plain fan), then the
//! concatenated half-float RGB atlas pages, all behind one zlib stream.

use byteorder::{LittleEndian as LE, WriteBytesExt};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use glam::Vec3;
use half::f16;
use std::io::Write;

use crate::error::Result;
use crate::mesh::{LevelMesh, SurfaceKind};

const LIGHTMAP_VERSION: u32 = 1;

/// Reorders a wall's two-triangle strip (`{0,1,2},{3,2,1}`) into a plain
/// quad fan (`0,2,3,1`) the reader can walk with a single `firstCoordOffset`
/// stride — ceilings/floors already store n-gon vertices in fan order
/// (reversed for floors, per `emit_all`'s winding).
fn reorder_for_kind(kind: SurfaceKind, polygon_len: usize) -> Vec<u32> {
    match kind {
        SurfaceKind::Floor | SurfaceKind::Ceiling => (0..polygon_len as u32).collect(),
        _ if polygon_len == 4 => vec![0, 2, 3, 1],
        _ => (0..polygon_len as u32).collect(),
    }
}

fn write_header<W: Write>(w: &mut W, mesh: &LevelMesh, sun_dir: Vec3, sun_color: Vec3) -> Result<()> {
    w.write_u32::<LE>(LIGHTMAP_VERSION)?;
    let texture_size = mesh.tiles.iter().map(|t| t.width.max(t.height)).max().unwrap_or(0);
    w.write_u32::<LE>(texture_size)?;
    w.write_u32::<LE>(mesh.atlas_page_count)?;
    w.write_u32::<LE>(mesh.surfaces.len() as u32)?;
    let num_coords: usize = mesh.surfaces.iter().map(|s| s.polygon.len()).sum();
    w.write_u32::<LE>(num_coords as u32)?;
    w.write_u32::<LE>(0)?; // numSubsectors: this tool doesn't emit a separate per-subsector index
    for c in [sun_dir.x, sun_dir.y, sun_dir.z] {
        w.write_f32::<LE>(c)?;
    }
    for c in [sun_color.x, sun_color.y, sun_color.z] {
        w.write_f32::<LE>(c)?;
    }
    Ok(())
}

fn surface_type_code(kind: SurfaceKind) -> u32 {
    match kind {
        SurfaceKind::WallTop => 0,
        SurfaceKind::WallMiddle => 1,
        SurfaceKind::WallBottom => 2,
        SurfaceKind::Floor => 3,
        SurfaceKind::Ceiling => 4,
    }
}

/// Encodes the full `LIGHTMAP` lump (uncompressed payload then zlib-wrapped).
pub fn encode(mesh: &LevelMesh, sun_dir: Vec3, sun_color: Vec3) -> Result<Vec<u8>> {
    let mut payload = Vec::new();
    write_header(&mut payload, mesh, sun_dir, sun_color)?;

    let mut coord_offset = 0u32;
    let mut surface_records = Vec::with_capacity(mesh.surfaces.len());
    for s in &mesh.surfaces {
        surface_records.push((surface_type_code(s.kind), s.line.unwrap_or(u32::MAX), s.control_sector.unwrap_or(u32::MAX), s.tile, coord_offset));
        coord_offset += s.polygon.len() as u32;
    }
    for &(type_code, type_index, control_sector, tile, first_coord_offset) in &surface_records {
        payload.write_u32::<LE>(type_code)?;
        payload.write_u32::<LE>(type_index)?;
        payload.write_u32::<LE>(control_sector)?;
        payload.write_u32::<LE>(tile.map(|t| mesh.tiles[t as usize].atlas.map_or(0, |a| a.page)).unwrap_or(0))?;
        payload.write_u32::<LE>(first_coord_offset)?;
    }

    for s in &mesh.surfaces {
        let Some(tile_idx) = s.tile else {
            for _ in 0..s.polygon.len() {
                payload.write_f32::<LE>(0.0)?;
                payload.write_f32::<LE>(0.0)?;
            }
            continue;
        };
        let tile = &mesh.tiles[tile_idx as usize];
        let order = reorder_for_kind(s.kind, s.polygon.len());
        for &vi in &order {
            let world = s.polygon[vi as usize];
            let (u, v) = tile.transform.uv_local(world);
            let (atlas_u, atlas_v) = match tile.atlas {
                Some(a) => (a.x as f32 + u, a.y as f32 + v),
                None => (u, v),
            };
            payload.write_f32::<LE>(atlas_u)?;
            payload.write_f32::<LE>(atlas_v)?;
        }
    }

    let page_size = mesh.atlas_size as usize;
    for page in 0..mesh.atlas_page_count {
        let mut raster = vec![Vec3::ZERO; page_size * page_size];
        for tile in mesh.tiles.iter().filter(|t| t.atlas.map(|a| a.page) == Some(page)) {
            let Some(rect) = tile.atlas else { continue };
            for y in 0..tile.height {
                for x in 0..tile.width {
                    let dst = (rect.x + x) as usize + (rect.y + y) as usize * page_size;
                    raster[dst] = tile.pixels[tile.pixel_index(x, y)];
                }
            }
        }
        for c in raster {
            write_half3(&mut payload, c)?;
        }
    }

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&payload)?;
    Ok(encoder.finish()?)
}

fn write_half3<W: Write>(w: &mut W, c: Vec3) -> Result<()> {
    for v in [c.x, c.y, c.z] {
        w.write_u16::<LE>(f16::from_f32(v).to_bits())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reorder_converts_wall_strip_to_fan() {
        assert_eq!(reorder_for_kind(SurfaceKind::WallMiddle, 4), vec![0, 2, 3, 1]);
    }

    #[test]
    fn reorder_leaves_flats_in_place() {
        assert_eq!(reorder_for_kind(SurfaceKind::Floor, 5), vec![0, 1, 2, 3, 4]);
    }
}
