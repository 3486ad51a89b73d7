//! Level mesh builder — `H. Level mesh`.
//!
//! Turns pruned, sloped geometry plus the BSP's subsectors into lightmap-
//! ready surfaces, tiles, an atlas layout, and the triangle-mesh BVH the
//! CPU/GPU tracers query. No teacher or pack repo performs this step at
//! runtime (it is baked offline by an external tool in the reference); the
//! surface/tile algorithms are grounded directly on the distilled spec's
//! "Level mesh builder" section.

mod surface;
mod tiles;

pub use surface::{SmoothingGroup, Surface, SurfaceKind};
pub use tiles::{AtlasRect, LightmapTile, TileBindingKey, TileTransform};

use crate::bvh::Bvh;
use crate::level::Level;
use crate::nodes::NodeTree;
use crate::portal::Portal;

pub struct LevelMesh {
    pub surfaces: Vec<Surface>,
    pub tiles: Vec<LightmapTile>,
    pub smoothing_groups: Vec<SmoothingGroup>,
    pub portals: Vec<Portal>,
    pub bvh: Bvh,
    pub atlas_page_count: u32,
    pub atlas_size: u32,
}

pub fn build(level: &Level, nodes: &NodeTree, atlas_size: u32, default_sample_distance: u32) -> LevelMesh {
    let mut surfaces = surface::emit_all(level, nodes, default_sample_distance);
    let portals = surface::resolve_portals(level, &mut surfaces);
    let smoothing_groups = surface::compute_smoothing_groups(&surfaces);

    let mesh = surface::triangulate(&surfaces);
    let bvh = Bvh::build(mesh);

    let tiles = tiles::bind_and_pack(&mut surfaces, atlas_size);
    let atlas_page_count = tiles.iter().filter_map(|t| t.atlas.map(|a| a.page + 1)).max().unwrap_or(0);

    LevelMesh { surfaces, tiles, smoothing_groups, portals, bvh, atlas_page_count, atlas_size }
}
