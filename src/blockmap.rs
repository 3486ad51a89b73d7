//! Blockmap builder — `F. Blockmap builder`.
//!
//! A uniform 128-unit grid index over every line, used at run time for quick
//! "which lines are near this point" queries. Grounded on ZDRay's
//! `FBlockmapBuilder` (`blockmapbuilder.h`): one combined list pool, each
//! per-cell list prefixed by a `0` word and terminated by `0xFFFF`, optionally
//! deduplicated ("packed") by identical byte sequence.

use std::collections::HashMap;

use glam::Vec2;

use crate::error::{BuildError, Result};
use crate::level::Level;

const CELL: f32 = 128.0;

#[derive(Clone, Debug)]
pub struct Blockmap {
    pub origin: Vec2,
    pub width: u32,
    pub height: u32,
    /// One offset per cell (row-major, `y * width + x`), indexing into `pool`
    /// at that cell's leading `0` word.
    pub offsets: Vec<u16>,
    pub pool: Vec<u16>,
}

impl Blockmap {
    pub fn cell_lines(&self, cx: u32, cy: u32) -> &[u16] {
        if cx >= self.width || cy >= self.height {
            return &[];
        }
        let start = self.offsets[(cy * self.width + cx) as usize] as usize + 1; // skip leading 0
        let end = self.pool[start..]
            .iter()
            .position(|&w| w == 0xFFFF)
            .map(|p| start + p)
            .unwrap_or(self.pool.len());
        &self.pool[start..end]
    }
}

pub fn build(level: &Level, pack: bool) -> Result<Blockmap> {
    let bounds = level.bounds();
    let origin = Vec2::new((bounds.min.x / 8.0).floor() * 8.0, (bounds.min.y / 8.0).floor() * 8.0);
    let width = (((bounds.max.x - origin.x) / CELL).ceil().max(1.0)) as u32;
    let height = (((bounds.max.y - origin.y) / CELL).ceil().max(1.0)) as u32;

    let mut cells: Vec<Vec<u16>> = vec![Vec::new(); (width * height) as usize];
    for (line_idx, l) in level.linedefs.iter().enumerate() {
        let p0 = level.vertices[l.v1 as usize].pos;
        let p1 = level.vertices[l.v2 as usize].pos;
        for (cx, cy) in cells_touched(p0, p1, origin, width, height) {
            cells[(cy * width + cx) as usize].push(line_idx as u16);
        }
    }

    let mut pool: Vec<u16> = Vec::new();
    let mut offsets = vec![0u16; cells.len()];
    let mut seen: HashMap<Vec<u16>, u16> = HashMap::new();

    for (i, list) in cells.iter().enumerate() {
        if pack {
            if let Some(&off) = seen.get(list) {
                offsets[i] = off;
                continue;
            }
        }
        let offset = pool.len();
        if offset > 0xFFFF {
            return Err(BuildError::BlockmapTooLarge(pool.len() + list.len() + 2));
        }
        offsets[i] = offset as u16;
        pool.push(0);
        pool.extend_from_slice(list);
        pool.push(0xFFFF);
        if pack {
            seen.insert(list.clone(), offset as u16);
        }
    }

    if pool.len() > 0x10000 {
        return Err(BuildError::BlockmapTooLarge(pool.len()));
    }

    Ok(Blockmap { origin, width, height, offsets, pool })
}

/// Every grid cell `(x, y)` (clamped to `[0, width) x [0, height)`) whose open
/// square the segment `p0..p1` passes through, via a fast voxel traversal
/// (Amanatides & Woo) over `CELL`-sized cells.
fn cells_touched(p0: Vec2, p1: Vec2, origin: Vec2, width: u32, height: u32) -> Vec<(u32, u32)> {
    let rel0 = (p0 - origin) / CELL;
    let rel1 = (p1 - origin) / CELL;

    let mut x = rel0.x.floor() as i64;
    let mut y = rel0.y.floor() as i64;
    let end_x = rel1.x.floor() as i64;
    let end_y = rel1.y.floor() as i64;

    let dx = rel1.x - rel0.x;
    let dy = rel1.y - rel0.y;

    let step_x: i64 = if dx > 0.0 { 1 } else if dx < 0.0 { -1 } else { 0 };
    let step_y: i64 = if dy > 0.0 { 1 } else if dy < 0.0 { -1 } else { 0 };

    let mut t_max_x = if step_x != 0 {
        let next_boundary = if step_x > 0 { (x + 1) as f32 } else { x as f32 };
        (next_boundary - rel0.x) / dx
    } else {
        f32::INFINITY
    };
    let mut t_max_y = if step_y != 0 {
        let next_boundary = if step_y > 0 { (y + 1) as f32 } else { y as f32 };
        (next_boundary - rel0.y) / dy
    } else {
        f32::INFINITY
    };
    let t_delta_x = if step_x != 0 { (1.0 / dx).abs() } else { f32::INFINITY };
    let t_delta_y = if step_y != 0 { (1.0 / dy).abs() } else { f32::INFINITY };

    let mut out = Vec::new();
    let in_bounds = |x: i64, y: i64| x >= 0 && y >= 0 && (x as u32) < width && (y as u32) < height;

    let max_steps = (width as i64 + height as i64 + 4) as usize;
    for _ in 0..max_steps {
        if in_bounds(x, y) {
            out.push((x as u32, y as u32));
        }
        if x == end_x && y == end_y {
            break;
        }
        if t_max_x < t_max_y {
            t_max_x += t_delta_x;
            x += step_x;
        } else {
            t_max_y += t_delta_y;
            y += step_y;
        }
        if step_x == 0 && step_y == 0 {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::{LineDef, LineFlags, Vertex, NO_INDEX};

    fn diagonal_level() -> Level {
        Level {
            vertices: vec![
                Vertex { pos: Vec2::new(0.0, 0.0), floor_z: None, ceil_z: None, props: Default::default() },
                Vertex { pos: Vec2::new(256.0, 256.0), floor_z: None, ceil_z: None, props: Default::default() },
            ],
            linedefs: vec![LineDef {
                v1: 0,
                v2: 1,
                flags: LineFlags::default(),
                special: 0,
                args: [0; 5],
                tag: 0,
                ids: Vec::new(),
                sidenum: [0, NO_INDEX],
                sample_distance: [0; 3],
                props: Default::default(),
                frontsector: NO_INDEX,
                backsector: NO_INDEX,
            }],
            ..Default::default()
        }
    }

    #[test]
    fn diagonal_line_touches_start_and_end_cells() {
        let lvl = diagonal_level();
        let bm = build(&lvl, false).unwrap();
        assert!(bm.width >= 2);
        assert!(bm.height >= 2);
        assert!(bm.cell_lines(0, 0).contains(&0));
        let last_cell_x = bm.width - 1;
        let last_cell_y = bm.height - 1;
        assert!(bm.cell_lines(last_cell_x, last_cell_y).contains(&0));
    }

    #[test]
    fn packing_deduplicates_identical_lists() {
        let lvl = diagonal_level();
        let unpacked = build(&lvl, false).unwrap();
        let packed = build(&lvl, true).unwrap();
        assert!(packed.pool.len() <= unpacked.pool.len());
    }
}
