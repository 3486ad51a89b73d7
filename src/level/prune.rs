//! Pruning and back-pointer fixup — the second half of `C. Level loader`.
//!
//! Grounded in the teacher crate's `wad::level` cleanup pass, extended per the
//! spec's pruning rules (zero-length lines, unused sides/sectors) and explicit
//! back-pointer resolution (never done more than once, never done lazily).

use log::warn;

use crate::error::{BuildError, Result};
use crate::level::{specials, Level, NO_INDEX};

/// Counts of what pruning removed, for the pipeline's summary log.
/// `REJECT` is always emitted all-zero (see `output::write_map`), so unlike
/// the teacher's reference tool this never needs to remap a copied-through
/// `REJECT` lump from old to new sector indices.
#[derive(Clone, Debug, Default)]
pub struct PruneReport {
    pub lines_removed: usize,
    pub sides_removed: usize,
    pub sectors_removed: usize,
}

pub fn prune(level: &mut Level) -> Result<PruneReport> {
    if !level.no_prune {
        let lines_removed = remove_degenerate_lines(level)?;
        let (sides_removed, sectors_removed) = compact_sides_and_sectors(level);
        fixup_backpointers(level);
        return Ok(PruneReport { lines_removed, sides_removed, sectors_removed });
    }
    fixup_backpointers(level);
    Ok(PruneReport::default())
}

fn remove_degenerate_lines(level: &mut Level) -> Result<usize> {
    let before = level.linedefs.len();
    level.linedefs.retain(|l| {
        if l.v1 == l.v2 {
            return false;
        }
        match (level.vertices.get(l.v1 as usize), level.vertices.get(l.v2 as usize)) {
            (Some(a), Some(b)) => (a.pos - b.pos).length_squared() > 0.0,
            _ => false,
        }
    });
    let removed = before - level.linedefs.len();
    if removed > 0 {
        warn!("pruned {removed} zero-length line(s)");
    }
    if level.linedefs.is_empty() {
        return Err(BuildError::MalformedMap("no lines remain after pruning".into()));
    }
    Ok(removed)
}

/// Compacts `sidedefs` (driven by lines) and `sectors` (driven by sides),
/// rewriting every index that refers to either array. Returns the number of
/// sides and sectors dropped.
fn compact_sides_and_sectors(level: &mut Level) -> (usize, usize) {
    let mut side_used = vec![false; level.sidedefs.len()];
    for l in &level.linedefs {
        for &s in &l.sidenum {
            if s != NO_INDEX {
                if let Some(flag) = side_used.get_mut(s as usize) {
                    *flag = true;
                } else {
                    warn!("line references out-of-range side {s}");
                }
            }
        }
        if l.sidenum[0] == NO_INDEX {
            warn!("line has no front side, retaining as one-sided horizon");
        }
    }

    let mut side_remap = vec![NO_INDEX; level.sidedefs.len()];
    let mut new_sides = Vec::with_capacity(level.sidedefs.len());
    for (old, keep) in side_used.iter().enumerate() {
        if *keep {
            side_remap[old] = new_sides.len() as u32;
            new_sides.push(level.sidedefs[old].clone());
        }
    }
    let dropped_sides = level.sidedefs.len() - new_sides.len();
    if dropped_sides > 0 {
        warn!("pruned {dropped_sides} unreferenced side(s)");
    }
    level.sidedefs = new_sides;

    for l in &mut level.linedefs {
        for s in &mut l.sidenum {
            *s = if *s == NO_INDEX { NO_INDEX } else { side_remap.get(*s as usize).copied().unwrap_or(NO_INDEX) };
        }
    }

    let mut sector_used = vec![false; level.sectors.len()];
    for s in &level.sidedefs {
        if let Some(flag) = sector_used.get_mut(s.sector as usize) {
            *flag = true;
        }
    }

    let mut sector_remap = vec![NO_INDEX; level.sectors.len()];
    let mut new_sectors = Vec::with_capacity(level.sectors.len());
    for (old, keep) in sector_used.iter().enumerate() {
        if *keep {
            sector_remap[old] = new_sectors.len() as u32;
            new_sectors.push(level.sectors[old].clone());
        }
    }
    let dropped_sectors = level.sectors.len() - new_sectors.len();
    if dropped_sectors > 0 {
        warn!("pruned {dropped_sectors} unreferenced sector(s)");
    }
    level.sectors = new_sectors;

    for s in &mut level.sidedefs {
        s.sector = sector_remap.get(s.sector as usize).copied().unwrap_or(NO_INDEX);
    }

    (dropped_sides, dropped_sectors)
}

/// Resolves `LineDef::frontsector/backsector`, `SideDef::line`, and every
/// `Sector::lines`/`Sector::portals` list. The only place these are computed.
fn fixup_backpointers(level: &mut Level) {
    for s in &mut level.sidedefs {
        s.line = NO_INDEX;
    }
    for (line_idx, l) in level.linedefs.iter_mut().enumerate() {
        l.frontsector = NO_INDEX;
        l.backsector = NO_INDEX;
        for (part, &side_idx) in l.sidenum.iter().enumerate() {
            if side_idx == NO_INDEX {
                continue;
            }
            let Some(side) = level.sidedefs.get_mut(side_idx as usize) else {
                continue;
            };
            side.line = line_idx as u32;
            if part == 0 {
                l.frontsector = side.sector;
            } else {
                l.backsector = side.sector;
            }
        }
    }

    for sector in &mut level.sectors {
        sector.lines.clear();
        sector.portals.clear();
    }
    for (line_idx, l) in level.linedefs.iter().enumerate() {
        for sector_idx in [l.frontsector, l.backsector] {
            if sector_idx == NO_INDEX {
                continue;
            }
            let Some(sector) = level.sectors.get_mut(sector_idx as usize) else {
                continue;
            };
            sector.lines.push(line_idx as u32);
            if l.special == specials::LINE_SET_PORTAL {
                sector.portals.push(line_idx as u32);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::{LineDef, LineFlags, Sector, SideDef, Vertex};

    fn square() -> Level {
        let mut lvl = Level {
            name: "MAP01".into(),
            vertices: vec![
                Vertex { pos: glam::vec2(0.0, 0.0), floor_z: None, ceil_z: None, props: Default::default() },
                Vertex { pos: glam::vec2(64.0, 0.0), floor_z: None, ceil_z: None, props: Default::default() },
                Vertex { pos: glam::vec2(64.0, 64.0), floor_z: None, ceil_z: None, props: Default::default() },
                Vertex { pos: glam::vec2(0.0, 64.0), floor_z: None, ceil_z: None, props: Default::default() },
                // degenerate coincident-pair vertex, referenced by a zero-length line below
                Vertex { pos: glam::vec2(64.0, 64.0), floor_z: None, ceil_z: None, props: Default::default() },
            ],
            linedefs: Vec::new(),
            sidedefs: Vec::new(),
            sectors: vec![Sector::default(), Sector::default()], // second sector unreferenced
            things: Vec::new(),
            no_prune: false,
        };
        for i in 0..4u32 {
            lvl.linedefs.push(LineDef {
                v1: i,
                v2: (i + 1) % 4,
                flags: LineFlags::IMPASSABLE,
                special: 0,
                args: [0; 5],
                tag: 0,
                ids: Vec::new(),
                sidenum: [lvl.sidedefs.len() as u32, NO_INDEX],
                sample_distance: [0; 3],
                props: Default::default(),
                frontsector: NO_INDEX,
                backsector: NO_INDEX,
            });
            lvl.sidedefs.push(SideDef {
                x_offset: 0,
                y_offset: 0,
                top_tex: "-".into(),
                bottom_tex: "-".into(),
                mid_tex: "STARTAN3".into(),
                sector: 0,
                line: NO_INDEX,
                sample_distance: [0; 3],
                props: Default::default(),
            });
        }
        // zero-length line between vertex 2 and the coincident vertex 4
        lvl.linedefs.push(LineDef {
            v1: 2,
            v2: 4,
            flags: LineFlags::default(),
            special: 0,
            args: [0; 5],
            tag: 0,
            ids: Vec::new(),
            sidenum: [NO_INDEX, NO_INDEX],
            sample_distance: [0; 3],
            props: Default::default(),
            frontsector: NO_INDEX,
            backsector: NO_INDEX,
        });
        lvl
    }

    #[test]
    fn removes_zero_length_lines_and_compacts_unused_sector() {
        let mut lvl = square();
        let report = prune(&mut lvl).unwrap();
        assert_eq!(lvl.linedefs.len(), 4);
        assert_eq!(lvl.sectors.len(), 1);
        assert_eq!(report.lines_removed, 1);
        assert_eq!(report.sectors_removed, 1);
        for l in &lvl.linedefs {
            assert_eq!(l.frontsector, 0);
            assert_eq!(l.backsector, NO_INDEX);
        }
        assert_eq!(lvl.sectors[0].lines.len(), 4);
    }

    #[test]
    fn fails_when_everything_prunes_away() {
        let mut lvl = Level {
            name: "MAP01".into(),
            vertices: vec![
                Vertex { pos: glam::vec2(0.0, 0.0), floor_z: None, ceil_z: None, props: Default::default() },
            ],
            linedefs: vec![LineDef {
                v1: 0,
                v2: 0,
                flags: LineFlags::default(),
                special: 0,
                args: [0; 5],
                tag: 0,
                ids: Vec::new(),
                sidenum: [NO_INDEX, NO_INDEX],
                sample_distance: [0; 3],
                props: Default::default(),
                frontsector: NO_INDEX,
                backsector: NO_INDEX,
            }],
            sidedefs: Vec::new(),
            sectors: Vec::new(),
            things: Vec::new(),
            no_prune: false,
        };
        assert!(matches!(prune(&mut lvl), Err(BuildError::MalformedMap(_))));
    }
}
