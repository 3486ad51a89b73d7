//! Portal transforms — the coordinate relation between two sector groups
//! that `Line_SetPortal`/`Sector_SetPortal` establish, grounded on the
//! distilled spec's `Portal` data-model entry.

use glam::{Mat4, Vec3};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Portal {
    pub transform: Mat4,
    pub source_group: u32,
    pub target_group: u32,
}

impl Portal {
    pub fn identity(source_group: u32, target_group: u32) -> Self {
        Portal { transform: Mat4::IDENTITY, source_group, target_group }
    }

    /// A portal that only translates (the common `Line_SetPortal` case: two
    /// lines of equal length, aligned, offset by the vector between their
    /// midpoints).
    pub fn translation(offset: Vec3, source_group: u32, target_group: u32) -> Self {
        Portal { transform: Mat4::from_translation(offset), source_group, target_group }
    }

    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        self.transform.transform_point3(p)
    }

    /// Portals compare by sector-group pair and transform (distilled spec's
    /// `3. DATA MODEL`), not identity — two independently built portals that
    /// connect the same groups with the same transform are the same portal.
    pub fn same_as(&self, other: &Portal) -> bool {
        self.source_group == other.source_group
            && self.target_group == other.target_group
            && self.transform.abs_diff_eq(other.transform, 1e-4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translation_portal_moves_points_by_offset() {
        let p = Portal::translation(Vec3::new(10.0, 0.0, 0.0), 1, 2);
        let moved = p.transform_point(Vec3::ZERO);
        assert_eq!(moved, Vec3::new(10.0, 0.0, 0.0));
    }

    #[test]
    fn equal_transform_and_groups_compare_equal() {
        let a = Portal::translation(Vec3::new(1.0, 2.0, 3.0), 1, 2);
        let b = Portal::translation(Vec3::new(1.0, 2.0, 3.0), 1, 2);
        let c = Portal::translation(Vec3::new(1.0, 2.0, 3.0), 1, 3);
        assert!(a.same_as(&b));
        assert!(!a.same_as(&c));
    }
}
