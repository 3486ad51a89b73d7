//! Lightmap tile binding, UV-projection transform, and shelf-pack atlas
//! layout — the back half of `H. Level mesh`'s "Lightmap tile binding"/
//! "Tile transform"/"Atlas packing" paragraphs.

use std::collections::HashMap;

use glam::Vec3;

use crate::math::{Aabb3, Plane, PlaneAxis};
use crate::mesh::surface::{Surface, SurfaceKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TileBindingKey {
    pub kind: SurfaceKind,
    pub type_index: u32,
    pub control_sector: Option<u32>,
}

#[derive(Clone, Copy, Debug)]
pub struct TileTransform {
    pub translate: Vec3,
    pub proj_u: Vec3,
    pub proj_v: Vec3,
}

impl TileTransform {
    pub fn uv_local(&self, world: Vec3) -> (f32, f32) {
        let rel = world - self.translate;
        (rel.dot(self.proj_u), rel.dot(self.proj_v))
    }
}

#[derive(Clone, Copy, Debug)]
pub struct AtlasRect {
    pub page: u32,
    pub x: u32,
    pub y: u32,
}

#[derive(Clone, Debug)]
pub struct LightmapTile {
    pub binding: TileBindingKey,
    pub bounds: Aabb3,
    pub plane: Plane,
    pub sample_dimension: u32,
    pub width: u32,
    pub height: u32,
    pub transform: TileTransform,
    pub atlas: Option<AtlasRect>,
    /// Row-major `width * height` radiance buffer, filled in by the path
    /// tracer; empty until then.
    pub pixels: Vec<Vec3>,
}

impl LightmapTile {
    pub fn pixel_index(&self, x: u32, y: u32) -> usize {
        (x + y * self.width) as usize
    }
}

fn round_to(v: f32, step: f32) -> f32 {
    (v / step).floor() * step
}

fn tile_transform(bounds: &Aabb3, plane: &Plane, sample_dimension: u32) -> (TileTransform, u32, u32) {
    let step = sample_dimension as f32;
    let min = Vec3::new(round_to(bounds.min.x, step) - step, round_to(bounds.min.y, step) - step, round_to(bounds.min.z, step) - step);
    let max = Vec3::new(bounds.max.x + step, bounds.max.y + step, bounds.max.z + step);

    let (axis_u, axis_v) = match plane.best_axis() {
        PlaneAxis::Yz => (Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, 0.0, 1.0)),
        PlaneAxis::Xz => (Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 1.0)),
        PlaneAxis::Xy => (Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0)),
    };

    let extent = max - min;
    let width = (extent.dot(axis_u) / step).ceil().max(1.0) as u32;
    let height = (extent.dot(axis_v) / step).ceil().max(1.0) as u32;

    (TileTransform { translate: min, proj_u: axis_u / step, proj_v: axis_v / step }, width, height)
}

/// Bind every surface to a tile (creating one per distinct `TileBindingKey`),
/// compute each tile's UV-projection transform, pack tiles into fixed-size
/// atlas pages via a shelf packer (sorted height-desc, then width-desc), and
/// stamp `surface.tile`/tile indices back onto the surfaces.
pub fn bind_and_pack(surfaces: &mut [Surface], atlas_size: u32) -> Vec<LightmapTile> {
    let mut by_binding: HashMap<TileBindingKey, usize> = HashMap::new();
    let mut tiles: Vec<LightmapTile> = Vec::new();
    let mut tile_bounds: Vec<Aabb3> = Vec::new();

    for s in surfaces.iter() {
        let idx = *by_binding.entry(s.binding).or_insert_with(|| {
            tile_bounds.push(Aabb3::empty());
            tiles.push(LightmapTile {
                binding: s.binding,
                bounds: Aabb3::empty(),
                plane: s.plane,
                sample_dimension: s.sample_distance,
                width: 1,
                height: 1,
                transform: TileTransform { translate: Vec3::ZERO, proj_u: Vec3::X, proj_v: Vec3::Y },
                atlas: None,
                pixels: Vec::new(),
            });
            tiles.len() - 1
        });
        for &p in &s.polygon {
            tile_bounds[idx].add_point(p);
        }
    }

    for (idx, tile) in tiles.iter_mut().enumerate() {
        tile.bounds = tile_bounds[idx];
        let (transform, width, height) = tile_transform(&tile.bounds, &tile.plane, tile.sample_dimension);
        tile.transform = transform;
        tile.width = width.min(atlas_size.saturating_sub(2)).max(1);
        tile.height = height.min(atlas_size.saturating_sub(2)).max(1);
        tile.pixels = vec![Vec3::ZERO; (tile.width * tile.height) as usize];
    }

    for s in surfaces.iter_mut() {
        s.tile = by_binding.get(&s.binding).map(|&i| i as u32);
    }

    let mut order: Vec<usize> = (0..tiles.len()).collect();
    order.sort_by(|&a, &b| {
        tiles[b]
            .height
            .cmp(&tiles[a].height)
            .then(tiles[b].width.cmp(&tiles[a].width))
    });

    let mut pages: Vec<ShelfPacker> = vec![ShelfPacker::new(atlas_size)];
    for idx in order {
        let (w, h) = (tiles[idx].width, tiles[idx].height);
        let placement = pages
            .iter_mut()
            .enumerate()
            .find_map(|(page_idx, packer)| packer.place(w, h).map(|(x, y)| (page_idx, x, y)))
            .unwrap_or_else(|| {
                pages.push(ShelfPacker::new(atlas_size));
                let page_idx = pages.len() - 1;
                let (x, y) = pages[page_idx].place(w, h).expect("fresh page fits any in-budget tile");
                (page_idx, x, y)
            });
        tiles[idx].atlas = Some(AtlasRect { page: placement.0 as u32, x: placement.1, y: placement.2 });
    }

    tiles
}

/// A row-shelf bin packer: each shelf tracks its height and the leftmost free
/// column; a new shelf opens when the current one can't fit the requested
/// height. Deterministic given a fixed input order (testable property 6).
struct ShelfPacker {
    page_size: u32,
    shelves: Vec<(u32, u32, u32)>, // (y, height, next_free_x)
}

impl ShelfPacker {
    fn new(page_size: u32) -> Self {
        ShelfPacker { page_size, shelves: Vec::new() }
    }

    fn place(&mut self, w: u32, h: u32) -> Option<(u32, u32)> {
        if w > self.page_size || h > self.page_size {
            return None;
        }
        for shelf in self.shelves.iter_mut() {
            if shelf.1 >= h && self.page_size - shelf.2 >= w {
                let x = shelf.2;
                shelf.2 += w;
                return Some((x, shelf.0));
            }
        }
        let top = self.shelves.iter().map(|s| s.0 + s.1).max().unwrap_or(0);
        if top + h > self.page_size {
            return None;
        }
        self.shelves.push((top, h, w));
        Some((0, top))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repacking_same_order_is_deterministic() {
        let mut packer_a = ShelfPacker::new(256);
        let mut packer_b = ShelfPacker::new(256);
        let sizes = [(32, 32), (64, 16), (16, 16), (128, 8)];
        let placed_a: Vec<_> = sizes.iter().map(|&(w, h)| packer_a.place(w, h)).collect();
        let placed_b: Vec<_> = sizes.iter().map(|&(w, h)| packer_b.place(w, h)).collect();
        assert_eq!(placed_a, placed_b);
    }

    #[test]
    fn tiles_never_exceed_the_atlas_page() {
        let mut packer = ShelfPacker::new(64);
        for _ in 0..4 {
            let (x, y) = packer.place(32, 16).unwrap();
            assert!(x + 32 <= 64);
            assert!(y + 16 <= 64);
        }
    }
}
