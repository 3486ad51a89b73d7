//! Plane math, grounded on ZDRay's `math/plane.cpp`.

use glam::{DVec3, Vec3};

/// `a*x + b*y + c*z = d`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plane {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaneAxis {
    Yz,
    Xz,
    Xy,
}

impl Plane {
    pub const ZERO: Plane = Plane { a: 0.0, b: 0.0, c: 0.0, d: 0.0 };

    /// A horizontal plane at height `z` (normal pointing along `+z` for a floor,
    /// `-z` for a ceiling — callers pass the sign they need).
    pub fn horizontal(z: f64, up: bool) -> Plane {
        if up {
            Plane { a: 0.0, b: 0.0, c: 1.0, d: z }
        } else {
            Plane { a: 0.0, b: 0.0, c: -1.0, d: -z }
        }
    }

    /// Construct from three points, with the normal direction inferred from
    /// winding order (`(p2-p1) x (p3-p2)`, normalized).
    pub fn from_points(p1: DVec3, p2: DVec3, p3: DVec3) -> Plane {
        let normal = (p2 - p1).cross(p3 - p2).normalize_or_zero();
        Plane {
            a: normal.x,
            b: normal.y,
            c: normal.z,
            d: normal.dot(p1),
        }
    }

    #[inline]
    pub fn normal(&self) -> DVec3 {
        DVec3::new(self.a, self.b, self.c)
    }

    #[inline]
    pub fn normal_f32(&self) -> Vec3 {
        Vec3::new(self.a as f32, self.b as f32, self.c as f32)
    }

    pub fn distance(&self, p: DVec3) -> f64 {
        p.dot(self.normal()) - self.d
    }

    /// Z coordinate of the plane above `(x, y)`. Callers must guard against a
    /// near-zero `c` (a vertical plane is not representable this way); the
    /// slope resolver never produces one since it always anchors at least one
    /// vertex pair sharing a floor/ceiling height.
    pub fn z_at(&self, x: f64, y: f64) -> f64 {
        (self.d - self.a * x - self.b * y) / self.c
    }

    pub fn z_at_f32(&self, x: f32, y: f32) -> f32 {
        self.z_at(x as f64, y as f64) as f32
    }

    /// Dominant axis of the plane's normal — used to choose a 2D projection
    /// for lightmap tile UV axes.
    pub fn best_axis(&self) -> PlaneAxis {
        let na = self.a.abs();
        let nb = self.b.abs();
        let nc = self.c.abs();
        if na >= nb && na >= nc {
            PlaneAxis::Yz
        } else if nb >= na && nb >= nc {
            PlaneAxis::Xz
        } else {
            PlaneAxis::Xy
        }
    }

    pub fn inverse(&self) -> Plane {
        Plane { a: -self.a, b: -self.b, c: -self.c, d: -self.d }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn horizontal_z_at_matches_height() {
        let p = Plane::horizontal(128.0, true);
        assert_eq!(p.z_at(10.0, -5.0), 128.0);
    }

    #[test]
    fn best_axis_picks_dominant_component() {
        let p = Plane { a: 0.1, b: 0.9, c: 0.1, d: 0.0 };
        assert_eq!(p.best_axis(), PlaneAxis::Xz);
    }

    #[test]
    fn from_points_reproduces_anchor_heights() {
        let p1 = DVec3::new(0.0, 0.0, 0.0);
        let p2 = DVec3::new(64.0, 0.0, 64.0);
        let p3 = DVec3::new(0.0, 64.0, 0.0);
        let plane = Plane::from_points(p1, p2, p3);
        assert!((plane.z_at(0.0, 0.0) - 0.0).abs() < 1e-6);
        assert!((plane.z_at(64.0, 0.0) - 64.0).abs() < 1e-6);
    }
}
