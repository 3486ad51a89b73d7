//! WAD assembly — `K. Output`.
//!
//! Collects named lumps in emission order and serializes the classic
//! `(header, lump bytes..., directory)` layout. Always emits a `PWAD` (this
//! tool never produces a standalone IWAD).

use byteorder::{LittleEndian as LE, WriteBytesExt};
use std::io::Write;

use crate::error::Result;
use crate::wad::Wad;

pub struct WadWriter {
    lumps: Vec<(String, Vec<u8>)>,
}

impl WadWriter {
    pub fn new() -> Self {
        WadWriter { lumps: Vec::new() }
    }

    /// Append a lump with `data`. Doom lump names are case-sensitive and
    /// truncated to 8 bytes; longer names are a caller error (never happens
    /// for the fixed names this tool emits).
    pub fn push(&mut self, name: &str, data: Vec<u8>) {
        self.lumps.push((name.to_string(), data));
    }

    pub fn push_marker(&mut self, name: &str) {
        self.push(name, Vec::new());
    }

    pub fn len(&self) -> usize {
        self.lumps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lumps.is_empty()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        out.write_all(b"PWAD")?;
        out.write_u32::<LE>(self.lumps.len() as u32)?;
        // Directory offset placeholder, patched below.
        let dir_offset_pos = out.len();
        out.write_u32::<LE>(0)?;

        let mut directory = Vec::with_capacity(self.lumps.len());
        for (name, data) in &self.lumps {
            let offset = out.len() as u32;
            out.write_all(data)?;
            directory.push((offset, data.len() as u32, Wad::name_to_bytes(name)));
        }

        let dir_offset = out.len() as u32;
        out[dir_offset_pos..dir_offset_pos + 4].copy_from_slice(&dir_offset.to_le_bytes());

        for (offset, size, name) in directory {
            out.write_u32::<LE>(offset)?;
            out.write_u32::<LE>(size)?;
            out.write_all(&name)?;
        }

        Ok(out)
    }

    pub fn write_to_file(&self, path: &std::path::Path) -> Result<()> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}

impl Default for WadWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wad::{Wad, WadKind};

    #[test]
    fn header_roundtrips_via_from_file_style_parse() {
        let mut w = WadWriter::new();
        w.push("AAAAAAA", vec![0xAB; 10]);
        let bytes = w.to_bytes().unwrap();
        assert_eq!(&bytes[0..4], b"PWAD");
        let num_lumps = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
        let dir_offset = u32::from_le_bytes(bytes[8..12].try_into().unwrap());
        assert_eq!(num_lumps, 1);
        let wad = Wad::from_bytes(bytes, WadKind::Pwad, num_lumps, dir_offset).unwrap();
        let idx = wad.find_lump("AAAAAAA").unwrap();
        assert_eq!(wad.lump_bytes(idx).unwrap(), &[0xAB; 10]);
    }
}
