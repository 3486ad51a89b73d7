//! BSP node builder — `E. Node builder`.
//!
//! No teacher or pack repo builds BSP nodes at runtime (the teacher crate
//! only traverses a tree that was already baked into the WAD by an external
//! tool); this module is grounded directly on the distilled spec's recursive-
//! partition algorithm, in the same data-oriented, index-based style as the
//! rest of this crate (`Level`, `Blockmap`).

mod builder;

pub use builder::{build_nodes, NodeBuildConfig};

use glam::Vec2;

use crate::math::Aabb2;

pub const SUBSECTOR_BIT: u32 = 0x8000_0000;
pub const NO_PARTNER: u32 = u32::MAX;

#[derive(Clone, Copy, Debug)]
pub struct Seg {
    pub v1: u32,
    pub v2: u32,
    /// `NO_PARTNER`'s sibling sentinel: a mini-seg has no owning line.
    pub line: u32,
    pub side: u8,
    /// The other side of an internal edge (GL variant only); `NO_PARTNER` at a border.
    pub partner: u32,
}

impl Seg {
    pub fn is_miniseg(&self) -> bool {
        self.line == u32::MAX
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Subsector {
    pub first_seg: u32,
    pub num_segs: u32,
    pub sector: u32,
}

#[derive(Clone, Copy, Debug)]
pub struct Node {
    pub x: f32,
    pub y: f32,
    pub dx: f32,
    pub dy: f32,
    pub bbox: [Aabb2; 2],
    /// High bit (`SUBSECTOR_BIT`) marks a subsector leaf in the low bits.
    pub children: [u32; 2],
}

#[derive(Clone, Debug)]
pub struct NodeTree {
    /// Original level vertices followed by extra vertices created by splits.
    pub vertices: Vec<Vec2>,
    pub num_org_verts: usize,
    pub segs: Vec<Seg>,
    pub subsectors: Vec<Subsector>,
    pub nodes: Vec<Node>,
    /// Root child id; high bit set if the whole map is a single convex subsector.
    pub root: u32,
}
