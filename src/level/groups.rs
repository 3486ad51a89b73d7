//! Sector group computation — flood fill through two-sided lines.
//!
//! Light propagation and BVH portal recursion are confined to a sector
//! group, so side/line/sector group ids must be assigned before surface
//! emission (`H. Level mesh`) can tag anything. Grounded on ZDRay's
//! `FloodFillType`/`mesh.cpp` group assignment, reduced to plain BFS.

use std::collections::VecDeque;

use crate::level::{Level, NO_INDEX};

/// Assigns every sector a 1-based group id and returns the number of groups
/// found. Two sectors land in the same group iff connected by a chain of
/// two-sided lines.
pub fn compute_sector_groups(level: &mut Level) -> u32 {
    let n = level.sectors.len();
    let mut adjacency: Vec<Vec<u32>> = vec![Vec::new(); n];
    for l in &level.linedefs {
        if l.frontsector == NO_INDEX || l.backsector == NO_INDEX || l.frontsector == l.backsector {
            continue;
        }
        adjacency[l.frontsector as usize].push(l.backsector);
        adjacency[l.backsector as usize].push(l.frontsector);
    }

    let mut group = vec![0u32; n];
    let mut next_group = 1u32;
    for start in 0..n {
        if group[start] != 0 {
            continue;
        }
        group[start] = next_group;
        let mut queue = VecDeque::new();
        queue.push_back(start);
        while let Some(cur) = queue.pop_front() {
            for &nb in &adjacency[cur] {
                if group[nb as usize] == 0 {
                    group[nb as usize] = next_group;
                    queue.push_back(nb as usize);
                }
            }
        }
        next_group += 1;
    }

    for (i, sector) in level.sectors.iter_mut().enumerate() {
        sector.group = group[i];
    }
    next_group - 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::{LineDef, LineFlags, Sector};

    fn line(front: u32, back: u32) -> LineDef {
        LineDef {
            v1: 0,
            v2: 1,
            flags: LineFlags::TWO_SIDED,
            special: 0,
            args: [0; 5],
            tag: 0,
            ids: Vec::new(),
            sidenum: [0, 1],
            sample_distance: [0; 3],
            props: Default::default(),
            frontsector: front,
            backsector: back,
        }
    }

    #[test]
    fn two_sectors_joined_by_two_sided_line_share_a_group() {
        let mut lvl = Level {
            sectors: vec![Sector::default(), Sector::default(), Sector::default()],
            linedefs: vec![line(0, 1)],
            ..Default::default()
        };
        let n = compute_sector_groups(&mut lvl);
        assert_eq!(n, 2);
        assert_eq!(lvl.sectors[0].group, lvl.sectors[1].group);
        assert_ne!(lvl.sectors[0].group, lvl.sectors[2].group);
    }

    #[test]
    fn one_sided_sector_gets_its_own_group() {
        let mut lvl = Level { sectors: vec![Sector::default()], ..Default::default() };
        let n = compute_sector_groups(&mut lvl);
        assert_eq!(n, 1);
        assert_eq!(lvl.sectors[0].group, 1);
    }
}
