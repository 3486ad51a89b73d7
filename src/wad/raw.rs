//! Doom WAD loader.
//!
//! * Reads the entire WAD (`IWAD` or `PWAD`) into RAM.
//! * Provides zero-copy access to individual lumps.
//! * Decodes binary lumps into typed vectors with `bincode` 2's fixed-int,
//!   little-endian configuration — the same trick the teacher crate used.

use bincode::{Decode, config, decode_from_slice};
use byteorder::{LittleEndian as LE, ReadBytesExt};
use std::{
    collections::HashMap,
    fs::File,
    io::{self, Read, Seek, SeekFrom},
    mem,
    path::Path,
};
use thiserror::Error;

const DIR_ENTRY_SIZE: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WadKind {
    Iwad,
    Pwad,
}

/// One entry in the lump directory (16 bytes on disk).
#[derive(Clone, Debug)]
pub struct LumpInfo {
    pub name: [u8; 8],
    pub offset: u32,
    pub size: u32,
}

/// Entire WAD in memory (raw bytes + parsed directory).
#[derive(Debug)]
pub struct Wad {
    pub kind: WadKind,
    lumps: Vec<LumpInfo>,
    bytes: Vec<u8>,
    by_name: HashMap<String, usize>,
}

#[derive(Error, Debug)]
pub enum WadError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("file is not an IWAD or PWAD")]
    BadMagic,

    #[error("directory extends beyond end of file")]
    DirectoryOutOfBounds,

    #[error("lump index {0} out of range")]
    BadIndex(usize),

    #[error("lump {name} (# {index}) slice {offset}+{size} past EOF ({file_size})")]
    BadOffset {
        index: usize,
        name: String,
        offset: u32,
        size: u32,
        file_size: usize,
    },

    #[error("lump {name} (# {index}) size {size} not multiple of element {elem_size}")]
    BadLumpSize {
        index: usize,
        name: String,
        size: usize,
        elem_size: usize,
    },

    #[error("lump {name} (# {index}) element {elem}: {source}")]
    BadElement {
        index: usize,
        name: String,
        elem: usize,
        source: bincode::error::DecodeError,
    },
}

impl Wad {
    // ------------------------------------------------------------------ //
    // Low-level helpers
    // ------------------------------------------------------------------ //

    pub fn lumps(&self) -> &[LumpInfo] {
        &self.lumps
    }

    /// Return `&str` view of an 8-byte lump name (trimmed at first NUL).
    pub fn lump_name(name: &[u8; 8]) -> &str {
        let end = name.iter().position(|&b| b == 0).unwrap_or(name.len());
        std::str::from_utf8(&name[..end]).unwrap_or("?")
    }

    pub fn name_to_bytes(name: &str) -> [u8; 8] {
        let mut out = [0u8; 8];
        for (i, b) in name.as_bytes().iter().take(8).enumerate() {
            out[i] = *b;
        }
        out
    }

    /// Raw bytes of lump `idx` (slice into `self.bytes`).
    pub fn lump_bytes(&self, idx: usize) -> Result<&[u8], WadError> {
        let l = self.lumps.get(idx).ok_or(WadError::BadIndex(idx))?;
        let start = l.offset as usize;
        let end = start + l.size as usize;
        if end > self.bytes.len() {
            return Err(WadError::BadOffset {
                index: idx,
                name: Self::lump_name(&l.name).into(),
                offset: l.offset,
                size: l.size,
                file_size: self.bytes.len(),
            });
        }
        Ok(&self.bytes[start..end])
    }

    /// Find the last lump with `name` (case-sensitive, like vanilla Doom).
    pub fn find_lump(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn lump_to_vec<T>(&self, idx: usize) -> Result<Vec<T>, WadError>
    where
        T: Decode<()>,
    {
        let bytes = self.lump_bytes(idx)?;
        let elem = mem::size_of::<T>();

        if bytes.is_empty() || bytes.len() % elem != 0 {
            return Err(WadError::BadLumpSize {
                index: idx,
                name: Self::lump_name(&self.lumps[idx].name).into(),
                size: bytes.len(),
                elem_size: elem,
            });
        }

        let cfg = config::standard()
            .with_fixed_int_encoding()
            .with_little_endian();
        let mut out = Vec::with_capacity(bytes.len() / elem);
        let mut slice = bytes;

        while !slice.is_empty() {
            let (val, read) = decode_from_slice::<T, _>(slice, cfg).map_err(|e| {
                WadError::BadElement {
                    index: idx,
                    name: Self::lump_name(&self.lumps[idx].name).into(),
                    elem: bytes.len(),
                    source: e,
                }
            })?;
            out.push(val);
            slice = &slice[read..];
        }
        Ok(out)
    }

    // ------------------------------------------------------------------ //
    // Loading
    // ------------------------------------------------------------------ //

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, WadError> {
        let mut file = File::open(path)?;

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        let kind = match &magic {
            b"IWAD" => WadKind::Iwad,
            b"PWAD" => WadKind::Pwad,
            _ => return Err(WadError::BadMagic),
        };

        let num_lumps = file.read_u32::<LE>()?;
        let dir_offset = file.read_u32::<LE>()?;

        let mut bytes = Vec::new();
        file.seek(SeekFrom::Start(0))?;
        file.read_to_end(&mut bytes)?;

        Self::from_bytes(bytes, kind, num_lumps, dir_offset)
    }

    pub fn from_bytes(bytes: Vec<u8>, kind: WadKind, num_lumps: u32, dir_offset: u32) -> Result<Self, WadError> {
        let dir_end = dir_offset as usize + num_lumps as usize * DIR_ENTRY_SIZE;
        if dir_end > bytes.len() {
            return Err(WadError::DirectoryOutOfBounds);
        }

        let mut lumps = Vec::with_capacity(num_lumps as usize);
        let mut cur = &bytes[dir_offset as usize..dir_end];

        for _ in 0..num_lumps {
            let off = cur.read_u32::<LE>()?;
            let size = cur.read_u32::<LE>()?;
            let mut name = [0u8; 8];
            cur.read_exact(&mut name)?;
            lumps.push(LumpInfo { name, offset: off, size });
        }

        for (i, l) in lumps.iter().enumerate() {
            let end = l.offset as usize + l.size as usize;
            if end > bytes.len() {
                return Err(WadError::BadOffset {
                    index: i,
                    name: Self::lump_name(&l.name).into(),
                    offset: l.offset,
                    size: l.size,
                    file_size: bytes.len(),
                });
            }
        }

        let mut by_name = HashMap::with_capacity(lumps.len());
        for (i, l) in lumps.iter().enumerate().rev() {
            by_name.entry(Self::lump_name(&l.name).to_owned()).or_insert(i);
        }

        Ok(Self { kind, lumps, bytes, by_name })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_test_wad() -> Wad {
        // Header + one lump ("FOO", 4 bytes) + directory.
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"PWAD");
        bytes.extend_from_slice(&1u32.to_le_bytes()); // numlumps
        let dir_offset_pos = bytes.len();
        bytes.extend_from_slice(&0u32.to_le_bytes()); // placeholder dir offset

        let lump_offset = bytes.len() as u32;
        bytes.extend_from_slice(&[1, 2, 3, 4]);

        let dir_offset = bytes.len() as u32;
        bytes[dir_offset_pos..dir_offset_pos + 4].copy_from_slice(&dir_offset.to_le_bytes());
        bytes.extend_from_slice(&lump_offset.to_le_bytes());
        bytes.extend_from_slice(&4u32.to_le_bytes());
        bytes.extend_from_slice(b"FOO\0\0\0\0\0");

        Wad::from_bytes(bytes, WadKind::Pwad, 1, dir_offset).unwrap()
    }

    #[test]
    fn finds_lump_by_name() {
        let wad = build_test_wad();
        let idx = wad.find_lump("FOO").unwrap();
        assert_eq!(wad.lump_bytes(idx).unwrap(), &[1, 2, 3, 4]);
    }

    #[test]
    fn directory_out_of_bounds_is_rejected() {
        let bytes = vec![0u8; 8];
        let err = Wad::from_bytes(bytes, WadKind::Pwad, 10, 0).unwrap_err();
        assert!(matches!(err, WadError::DirectoryOutOfBounds));
    }
}
