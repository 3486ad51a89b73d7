//! Output assembly — `K. Output`. Reassembles a map's lumps (re-serialized
//! from in-memory state) plus the baked `LIGHTMAP` lump into a `WadWriter`.

mod lightmap_lump;
mod lumps;

use glam::Vec3;

use crate::blockmap::Blockmap;
use crate::error::Result;
use crate::level::Level;
use crate::mesh::LevelMesh;
use crate::nodes::NodeTree;
use crate::wad::WadWriter;

#[derive(Clone, Debug)]
pub struct NodeEmitOptions {
    pub build_gl: bool,
    pub compress_gl: bool,
    pub compress_classic: bool,
    pub emit_extended: bool,
    pub gl_only: bool,
    pub gl_v5: bool,
}

impl Default for NodeEmitOptions {
    fn default() -> Self {
        NodeEmitOptions {
            build_gl: true,
            compress_gl: false,
            compress_classic: false,
            emit_extended: false,
            gl_only: false,
            gl_v5: false,
        }
    }
}

/// Append one map's full lump set (marker through `LIGHTMAP`) to `writer`.
pub fn write_map(
    writer: &mut WadWriter,
    level: &Level,
    nodes: &NodeTree,
    blockmap: Option<&Blockmap>,
    mesh: Option<&LevelMesh>,
    sun_dir: Vec3,
    sun_color: Vec3,
    opts: &NodeEmitOptions,
) -> Result<()> {
    writer.push_marker(&level.name);
    writer.push("VERTEXES", lumps::write_vertexes(level)?);
    writer.push("LINEDEFS", lumps::write_linedefs(level)?);
    writer.push("SIDEDEFS", lumps::write_sidedefs(level)?);
    writer.push("SECTORS", lumps::write_sectors(level)?);
    writer.push("THINGS", lumps::write_things(level)?);

    if !opts.gl_only {
        let classic_fits = !opts.emit_extended && lumps::fits_classic_counts(nodes);
        if classic_fits && !opts.compress_classic {
            writer.push("SEGS", lumps::write_segs_classic(nodes)?);
            writer.push("SSECTORS", lumps::write_ssectors_classic(nodes)?);
            writer.push("NODES", lumps::write_nodes_classic(nodes)?);
        } else {
            let raw = lumps::write_nodes_compressed(nodes)?;
            writer.push("NODES", zlib_compress(&raw)?);
            writer.push("SSECTORS", zlib_compress(&lumps::write_ssectors_compressed(nodes)?)?);
            writer.push("SEGS", zlib_compress(&lumps::write_segs_classic(nodes)?)?);
        }
    }

    if opts.build_gl {
        writer.push(&format!("GL_{}", &level.name), Vec::new());
        writer.push("GL_VERT", lumps::write_gl_vert(nodes)?);
        if opts.gl_v5 {
            let gl_nodes = lumps::write_gl_nodes_v5(nodes)?;
            let gl_ssect = lumps::write_gl_ssect_v5(nodes)?;
            writer.push("GL_SEGS", lumps::write_gl_segs(nodes)?);
            if opts.compress_gl {
                writer.push("GL_SSECT", zlib_compress(&gl_ssect)?);
                writer.push("GL_NODES", zlib_compress(&gl_nodes)?);
            } else {
                writer.push("GL_SSECT", gl_ssect);
                writer.push("GL_NODES", gl_nodes);
            }
        } else {
            writer.push("GL_SEGS", lumps::write_gl_segs(nodes)?);
            let gl_nodes = lumps::write_nodes_compressed(nodes)?;
            let gl_ssect = lumps::write_ssectors_compressed(nodes)?;
            if opts.compress_gl {
                writer.push("GL_SSECT", zlib_compress(&gl_ssect)?);
                writer.push("GL_NODES", zlib_compress(&gl_nodes)?);
            } else {
                writer.push("GL_SSECT", gl_ssect);
                writer.push("GL_NODES", gl_nodes);
            }
        }
    }

    if let Some(bm) = blockmap {
        writer.push("BLOCKMAP", write_blockmap(bm)?);
    }
    let num_sectors = level.sectors.len();
    writer.push("REJECT", vec![0u8; (num_sectors * num_sectors).div_ceil(8)]);

    if let Some(mesh) = mesh {
        writer.push("LIGHTMAP", lightmap_lump::encode(mesh, sun_dir, sun_color)?);
    }

    Ok(())
}

fn write_blockmap(bm: &Blockmap) -> Result<Vec<u8>> {
    use byteorder::{LittleEndian as LE, WriteBytesExt};
    let mut out = Vec::new();
    out.write_i16::<LE>(bm.origin.x as i16)?;
    out.write_i16::<LE>(bm.origin.y as i16)?;
    out.write_u16::<LE>(bm.width as u16)?;
    out.write_u16::<LE>(bm.height as u16)?;
    // Absolute word offset = 4-word header + one offset word per cell + the
    // cell's position within the pool.
    let header_words = 4u32 + bm.offsets.len() as u32;
    for &off in &bm.offsets {
        out.write_u16::<LE>((header_words + off as u32) as u16)?;
    }
    for &w in &bm.pool {
        out.write_u16::<LE>(w)?;
    }
    Ok(out)
}

fn zlib_compress(data: &[u8]) -> Result<Vec<u8>> {
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data)?;
    Ok(enc.finish()?)
}
