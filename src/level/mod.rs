//! In-memory level representation — `C. Level loader`.
//!
//! `Level` owns every entity array; all cross-references between `LineDef`,
//! `SideDef` and `Sector` are plain indices (never raw pointers), following
//! the distilled spec's "Design notes" on the back-pointer graph. `NO_INDEX`
//! (`u32::MAX`) marks an absent reference, matching the classic `0xffff`/
//! `0xffffffff` sentinels at the binary-format boundary.

pub mod binary;
pub mod groups;
pub mod prune;
pub mod slopes;
pub mod udmf_load;

use std::collections::BTreeMap;

use bitflags::bitflags;
use glam::Vec2;

use crate::math::Plane;
use crate::udmf::Value;

pub const NO_INDEX: u32 = u32::MAX;

/// Arbitrary UDMF key/value bag retained on every entity so that unrecognized
/// keys survive a load/save round trip even though this tool doesn't
/// interpret them.
pub type PropBag = BTreeMap<String, Value>;

#[derive(Clone, Debug, Default)]
pub struct Vertex {
    pub pos: Vec2,
    /// `Some` once resolved by the slope maker / `zfloor`/`zceiling` UDMF keys.
    pub floor_z: Option<f64>,
    pub ceil_z: Option<f64>,
    pub props: PropBag,
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct LineFlags: u32 {
        const IMPASSABLE      = 0x0001;
        const BLOCK_MONSTERS  = 0x0002;
        const TWO_SIDED       = 0x0004;
        const UPPER_UNPEGGED  = 0x0010;
        const LOWER_UNPEGGED  = 0x0020;
        const SECRET          = 0x0040;
        const BLOCK_SOUND     = 0x0080;
        const NOT_ON_MAP      = 0x0200;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WallPart {
    Top = 0,
    Middle = 1,
    Bottom = 2,
}

/// Line specials this crate interprets for their effect on geometry.
pub mod specials {
    pub const LINE_HORIZON: u16 = 9;
    pub const SECTOR_SET_3D_FLOOR: u16 = 160;
    pub const LINE_SET_PORTAL: u16 = 156;
    pub const SECTOR_SET_PORTAL: u16 = 1060;
    pub const PLANE_COPY: u16 = 118;
    pub const PLANE_ALIGN: u16 = 181;
}

#[derive(Clone, Debug, Default)]
pub struct LineDef {
    pub v1: u32,
    pub v2: u32,
    pub flags: LineFlags,
    pub special: u16,
    pub args: [i32; 5],
    pub tag: i32,
    pub ids: Vec<i32>,
    pub sidenum: [u32; 2],
    /// Per-wall-part sample-distance override (0 = inherit from the level default).
    pub sample_distance: [u32; 3],
    pub props: PropBag,

    // Resolved during `prune::fixup_backpointers` — valid only afterwards.
    pub frontsector: u32,
    pub backsector: u32,
}

impl LineDef {
    pub fn is_two_sided(&self) -> bool {
        self.sidenum[1] != NO_INDEX
    }
}

#[derive(Clone, Debug, Default)]
pub struct SideDef {
    pub x_offset: i32,
    pub y_offset: i32,
    pub top_tex: String,
    pub bottom_tex: String,
    pub mid_tex: String,
    pub sector: u32,
    pub line: u32,
    pub sample_distance: [u32; 3],
    pub props: PropBag,
}

#[derive(Clone, Debug)]
pub struct X3dFloor {
    pub control_sector: u32,
    pub line: u32,
}

#[derive(Clone, Debug, Default)]
pub struct Sector {
    pub floor_height: f64,
    pub ceil_height: f64,
    pub floor_tex: String,
    pub ceil_tex: String,
    pub light_level: i32,
    pub special: i32,
    pub tag: i32,
    pub tags: Vec<i32>,

    pub floor_plane: Plane,
    pub ceil_plane: Plane,

    pub sample_distance_floor: u32,
    pub sample_distance_ceiling: u32,

    pub floor_lightdef: i32,
    pub ceiling_lightdef: i32,

    pub sky_floor: bool,
    pub sky_ceiling: bool,
    pub control_sector: bool,

    pub x3dfloors: Vec<X3dFloor>,
    pub lines: Vec<u32>,
    pub portals: Vec<u32>,

    pub group: u32,
    pub props: PropBag,
}

impl Sector {
    pub fn has_tag(&self, tag: i32) -> bool {
        if self.tags.is_empty() && tag == 0 {
            return true;
        }
        self.tags.iter().any(|&t| t == tag)
    }
}

#[derive(Clone, Debug, Default)]
pub struct Thing {
    pub pos: Vec2,
    pub angle: f32,
    pub z_offset: i32,
    pub type_id: u16,
    pub flags: u16,
    /// Hexen/UDMF-extended fields (args, tid, special) — `0` for binary-Doom
    /// things that don't carry them.
    pub tid: i32,
    pub special: i32,
    pub args: [i32; 5],
    /// UDMF-only keys (`lightcolor`, `lightintensity`, `lightdistance`, …);
    /// empty for binary-format things.
    pub props: PropBag,
}

#[derive(Clone, Debug, Default)]
pub struct Level {
    pub name: String,
    pub vertices: Vec<Vertex>,
    pub linedefs: Vec<LineDef>,
    pub sidedefs: Vec<SideDef>,
    pub sectors: Vec<Sector>,
    pub things: Vec<Thing>,
    pub no_prune: bool,
    /// Whether `THINGS`/`LINEDEFS` should round-trip through the wider
    /// Hexen records (`tid`/`special`/`args` on things, byte-special +
    /// five byte-args on linedefs) rather than the classic Doom layout.
    pub hexen_format: bool,
}

impl Level {
    pub fn bounds(&self) -> crate::math::Aabb2 {
        let mut b = crate::math::Aabb2::empty();
        for v in &self.vertices {
            b.add_point(v.pos);
        }
        b
    }

    pub fn side(&self, idx: u32) -> Option<&SideDef> {
        if idx == NO_INDEX { None } else { self.sidedefs.get(idx as usize) }
    }

    pub fn sector(&self, idx: u32) -> Option<&Sector> {
        if idx == NO_INDEX { None } else { self.sectors.get(idx as usize) }
    }
}

/// Load the map at `marker_idx`, picking the binary or UDMF path by whether
/// the marker is immediately followed by a `TEXTMAP` lump.
pub fn load_level(wad: &crate::wad::Wad, marker_idx: usize) -> crate::error::Result<Level> {
    let name = crate::wad::Wad::lump_name(&wad.lumps()[marker_idx].name).to_string();
    let is_udmf = wad
        .lumps()
        .get(marker_idx + 1)
        .map(|l| crate::wad::Wad::lump_name(&l.name) == "TEXTMAP")
        .unwrap_or(false);

    if is_udmf {
        let textmap_idx = marker_idx + 1;
        let bytes = wad.lump_bytes(textmap_idx)?;
        let text = std::str::from_utf8(bytes)
            .map_err(|e| crate::error::BuildError::MalformedMap(format!("TEXTMAP is not UTF-8: {e}")))?;
        Ok(udmf_load::load_udmf(&name, text))
    } else {
        binary::load_binary_map(wad, marker_idx)
    }
}
