//! Shared math kernel: fixed-point scalars, planes, and AABBs.
//!
//! Vectors, quaternions and 4x4 matrices are not reinvented here; the crate uses
//! `glam` throughout (as the teacher crate already did for `world::geometry`).

mod aabb;
mod fixed;
mod plane;

pub use aabb::{Aabb2, Aabb3};
pub use fixed::FixedPoint;
pub use plane::{Plane, PlaneAxis};
