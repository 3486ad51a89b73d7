//! Axis-aligned bounding boxes, 2D (map-space) and 3D (world-space, used by the BVH).

use glam::{Vec2, Vec3};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb2 {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb2 {
    pub fn empty() -> Self {
        Aabb2 {
            min: Vec2::splat(f32::MAX),
            max: Vec2::splat(f32::MIN),
        }
    }

    pub fn add_point(&mut self, p: Vec2) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    pub fn union(&self, other: &Aabb2) -> Aabb2 {
        Aabb2 {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn contains_point(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb3 {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb3 {
    pub fn empty() -> Self {
        Aabb3 {
            min: Vec3::splat(f32::MAX),
            max: Vec3::splat(f32::MIN),
        }
    }

    pub fn from_points(points: &[Vec3]) -> Self {
        let mut b = Self::empty();
        for &p in points {
            b.add_point(p);
        }
        b
    }

    pub fn add_point(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    pub fn union(&self, other: &Aabb3) -> Aabb3 {
        Aabb3 {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn expand(&self, radius: f32) -> Aabb3 {
        Aabb3 {
            min: self.min - Vec3::splat(radius),
            max: self.max + Vec3::splat(radius),
        }
    }

    pub fn contains(&self, other: &Aabb3) -> bool {
        other.min.x >= self.min.x - 1e-4
            && other.min.y >= self.min.y - 1e-4
            && other.min.z >= self.min.z - 1e-4
            && other.max.x <= self.max.x + 1e-4
            && other.max.y <= self.max.y + 1e-4
            && other.max.z <= self.max.z + 1e-4
    }

    pub fn contains_point(&self, p: Vec3) -> bool {
        p.x >= self.min.x - 1e-4
            && p.y >= self.min.y - 1e-4
            && p.z >= self.min.z - 1e-4
            && p.x <= self.max.x + 1e-4
            && p.y <= self.max.y + 1e-4
            && p.z <= self.max.z + 1e-4
    }

    pub fn overlaps_sphere(&self, center: Vec3, radius: f32) -> bool {
        let closest = center.clamp(self.min, self.max);
        closest.distance_squared(center) <= radius * radius
    }

    pub fn longest_axis(&self) -> usize {
        let ext = self.max - self.min;
        if ext.x >= ext.y && ext.x >= ext.z {
            0
        } else if ext.y >= ext.x && ext.y >= ext.z {
            1
        } else {
            2
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_contains_both_inputs() {
        let a = Aabb3 { min: Vec3::ZERO, max: Vec3::splat(1.0) };
        let b = Aabb3 { min: Vec3::splat(-1.0), max: Vec3::splat(0.5) };
        let u = a.union(&b);
        assert!(u.contains(&a));
        assert!(u.contains(&b));
    }

    #[test]
    fn sphere_overlap_detects_touching_box() {
        let b = Aabb3 { min: Vec3::ZERO, max: Vec3::splat(10.0) };
        assert!(b.overlaps_sphere(Vec3::new(15.0, 5.0, 5.0), 6.0));
        assert!(!b.overlaps_sphere(Vec3::new(100.0, 5.0, 5.0), 6.0));
    }
}
