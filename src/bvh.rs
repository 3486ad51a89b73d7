//! Triangle-mesh BVH — `G. BVH (TriangleMeshShape)`.
//!
//! A bounding-volume hierarchy over a flat triangle soup, supporting ray,
//! sphere, and sphere-sweep queries. Grounded on ZDRay's `collision.h`
//! (`CollisionBBox`/`CollisionNode`/`TriangleMeshShape`): same leaf
//! convention (`element_index` is the first vertex index of the triangle,
//! `left = right = -1` for leaves), same Möller-style ray-triangle test and
//! segmented long-ray tracing.

use glam::Vec3;

use crate::math::Aabb3;

const NO_CHILD: i32 = -1;
const EDGE_TOLERANCE_SCALE: f32 = -0.0001;

#[derive(Clone, Copy, Debug)]
pub struct BvhNode {
    pub aabb: Aabb3,
    pub left: i32,
    pub right: i32,
    pub element_index: i32,
}

impl BvhNode {
    pub fn is_leaf(&self) -> bool {
        self.element_index != NO_CHILD
    }
}

#[derive(Clone, Debug, Default)]
pub struct TriangleMesh {
    pub vertices: Vec<Vec3>,
    pub indices: Vec<u32>,
    pub surface_of_triangle: Vec<u32>,
}

impl TriangleMesh {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    fn triangle(&self, tri: usize) -> (Vec3, Vec3, Vec3) {
        let i = tri * 3;
        (
            self.vertices[self.indices[i] as usize],
            self.vertices[self.indices[i + 1] as usize],
            self.vertices[self.indices[i + 2] as usize],
        )
    }
}

#[derive(Clone, Debug)]
pub struct Bvh {
    pub nodes: Vec<BvhNode>,
    pub root: i32,
    mesh: TriangleMesh,
}

#[derive(Clone, Copy, Debug)]
pub struct RayHit {
    pub t: f32,
    pub triangle: usize,
}

impl Bvh {
    pub fn surface_of_triangle(&self, tri: usize) -> u32 {
        self.mesh.surface_of_triangle[tri]
    }

    pub fn build(mesh: TriangleMesh) -> Self {
        let n = mesh.triangle_count();
        let mut nodes = Vec::with_capacity(n.max(1) * 2);
        if n == 0 {
            return Bvh { nodes, root: NO_CHILD, mesh };
        }
        let centroids: Vec<Vec3> = (0..n)
            .map(|i| {
                let (a, b, c) = mesh.triangle(i);
                (a + b + c) / 3.0
            })
            .collect();
        let all: Vec<usize> = (0..n).collect();
        let root = build_recursive(&mesh, &centroids, &all, &mut nodes);
        Bvh { nodes, root, mesh }
    }

    /// Segment-trace, bounded to `[0, 1]` along `origin..origin+dir`. Long
    /// rays are chopped into pieces of length `max(100, total/20)` to keep
    /// the per-segment AABB tight, returning the first hit across segments.
    pub fn find_first_hit(&self, origin: Vec3, dir: Vec3) -> Option<RayHit> {
        let total_len = dir.length();
        if total_len < 1e-9 || self.root == NO_CHILD {
            return None;
        }
        let unit = dir / total_len;
        let step = (total_len / 20.0).max(100.0).min(total_len);
        let mut traveled = 0.0f32;
        while traveled < total_len {
            let this_len = step.min(total_len - traveled);
            let seg_origin = origin + unit * traveled;
            let seg_dir = unit * this_len;
            if let Some(hit) = self.trace_segment(seg_origin, seg_dir, false) {
                let global_t = (traveled + hit.t * this_len) / total_len;
                return Some(RayHit { t: global_t, triangle: hit.triangle });
            }
            traveled += this_len;
        }
        None
    }

    pub fn find_any_hit(&self, origin: Vec3, dir: Vec3) -> bool {
        self.trace_segment(origin, dir, true).is_some()
    }

    fn trace_segment(&self, origin: Vec3, dir: Vec3, any: bool) -> Option<RayHit> {
        if self.root == NO_CHILD {
            return None;
        }
        let mut best: Option<RayHit> = None;
        let mut stack = vec![self.root];
        while let Some(idx) = stack.pop() {
            let node = &self.nodes[idx as usize];
            let t_max_allowed = best.map(|h| h.t).unwrap_or(1.0);
            if !ray_aabb_slab_unbounded(origin, dir, &node.aabb, t_max_allowed) {
                continue;
            }
            if node.is_leaf() {
                let tri = node.element_index as usize / 3;
                if let Some(t) = ray_triangle(origin, dir, self.mesh.triangle(tri)) {
                    if t >= 0.0 && t <= 1.0 && t < best.map(|h| h.t).unwrap_or(f32::MAX) {
                        best = Some(RayHit { t, triangle: tri });
                        if any {
                            return best;
                        }
                    }
                }
                continue;
            }
            if node.left != NO_CHILD {
                stack.push(node.left);
            }
            if node.right != NO_CHILD {
                stack.push(node.right);
            }
        }
        best
    }

    /// Every triangle whose AABB overlaps `sphere` — used to enumerate lights
    /// touching a tile.
    pub fn find_all_hits(&self, center: Vec3, radius: f32) -> Vec<usize> {
        let mut out = Vec::new();
        if self.root == NO_CHILD {
            return out;
        }
        let mut stack = vec![self.root];
        while let Some(idx) = stack.pop() {
            let node = &self.nodes[idx as usize];
            if !node.aabb.overlaps_sphere(center, radius) {
                continue;
            }
            if node.is_leaf() {
                out.push(node.element_index as usize / 3);
                continue;
            }
            if node.left != NO_CHILD {
                stack.push(node.left);
            }
            if node.right != NO_CHILD {
                stack.push(node.right);
            }
        }
        out
    }

    /// Dynamic sphere-vs-mesh sweep from `center` to `target`; returns the
    /// smallest fraction in `[0, 1]` at which the sphere touches a triangle,
    /// or `1.0` for no hit.
    pub fn sweep(&self, center: Vec3, target: Vec3, radius: f32) -> f32 {
        if self.root == NO_CHILD {
            return 1.0;
        }
        let dir = target - center;
        let mut best = 1.0f32;
        let mut stack = vec![self.root];
        while let Some(idx) = stack.pop() {
            let node = &self.nodes[idx as usize];
            let expanded = node.aabb.expand(radius);
            if !ray_aabb_slab_unbounded(center, dir, &expanded, best) {
                continue;
            }
            if node.is_leaf() {
                let tri = node.element_index as usize / 3;
                let (a, b, c) = self.mesh.triangle(tri);
                if let Some(frac) = sphere_sweep_triangle(center, dir, radius, a, b, c) {
                    best = best.min(frac);
                }
                continue;
            }
            if node.left != NO_CHILD {
                stack.push(node.left);
            }
            if node.right != NO_CHILD {
                stack.push(node.right);
            }
        }
        best
    }
}

fn build_recursive(mesh: &TriangleMesh, centroids: &[Vec3], subset: &[usize], nodes: &mut Vec<BvhNode>) -> i32 {
    let aabb = {
        let mut b = Aabb3::empty();
        for &tri in subset {
            let (a, c, d) = mesh.triangle(tri);
            b.add_point(a);
            b.add_point(c);
            b.add_point(d);
        }
        b
    };

    if subset.len() == 1 {
        let idx = nodes.len() as i32;
        nodes.push(BvhNode { aabb, left: NO_CHILD, right: NO_CHILD, element_index: (subset[0] * 3) as i32 });
        return idx;
    }

    let axes_by_preference = preferred_axis_order(&aabb);
    let mut left_set = Vec::new();
    let mut right_set = Vec::new();
    let mut split_found = false;
    for axis in axes_by_preference {
        let mean: f32 = subset.iter().map(|&t| centroids[t][axis]).sum::<f32>() / subset.len() as f32;
        left_set = subset.iter().copied().filter(|&t| centroids[t][axis] < mean).collect();
        right_set = subset.iter().copied().filter(|&t| centroids[t][axis] >= mean).collect();
        if !left_set.is_empty() && !right_set.is_empty() {
            split_found = true;
            break;
        }
    }
    if !split_found {
        let mid = subset.len() / 2;
        left_set = subset[..mid].to_vec();
        right_set = subset[mid..].to_vec();
    }

    let left = build_recursive(mesh, centroids, &left_set, nodes);
    let right = build_recursive(mesh, centroids, &right_set, nodes);
    let idx = nodes.len() as i32;
    nodes.push(BvhNode { aabb, left, right, element_index: NO_CHILD });
    idx
}

fn preferred_axis_order(aabb: &Aabb3) -> [usize; 3] {
    let longest = aabb.longest_axis();
    match longest {
        0 => [0, 1, 2],
        1 => [1, 0, 2],
        _ => [2, 0, 1],
    }
}

fn ray_aabb_slab_unbounded(origin: Vec3, dir: Vec3, aabb: &Aabb3, t_max: f32) -> bool {
    let inv_dir = Vec3::new(1.0 / dir.x, 1.0 / dir.y, 1.0 / dir.z);
    let mut tmin = 0.0f32;
    let mut tmax = t_max;
    for axis in 0..3 {
        let o = origin[axis];
        let d = inv_dir[axis];
        let mut t0 = (aabb.min[axis] - o) * d;
        let mut t1 = (aabb.max[axis] - o) * d;
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }
        tmin = tmin.max(t0);
        tmax = tmax.min(t1);
        if tmax < tmin {
            return false;
        }
    }
    true
}

fn ray_triangle(origin: Vec3, dir: Vec3, (v0, v1, v2): (Vec3, Vec3, Vec3)) -> Option<f32> {
    let edge1 = v1 - v0;
    let edge2 = v2 - v0;
    let n = edge1.cross(edge2);
    let tolerance = EDGE_TOLERANCE_SCALE * n.length_squared();

    let pvec = dir.cross(edge2);
    let det = edge1.dot(pvec);
    if det.abs() < 1e-12 {
        return None;
    }
    let inv_det = 1.0 / det;
    let tvec = origin - v0;
    let u = tvec.dot(pvec) * inv_det;
    if u < tolerance || u > 1.0 - tolerance {
        return None;
    }
    let qvec = tvec.cross(edge1);
    let v = dir.dot(qvec) * inv_det;
    if v < tolerance || u + v > 1.0 - tolerance {
        return None;
    }
    let t = edge2.dot(qvec) * inv_det;
    Some(t)
}

/// Three-stage sphere-vs-triangle sweep: plane, then edges, then vertices.
fn sphere_sweep_triangle(center: Vec3, dir: Vec3, radius: f32, v0: Vec3, v1: Vec3, v2: Vec3) -> Option<f32> {
    let edge1 = v1 - v0;
    let edge2 = v2 - v0;
    let normal = edge1.cross(edge2).normalize_or_zero();
    if normal.length_squared() < 1e-12 {
        return None;
    }

    let denom = normal.dot(dir);
    let dist0 = normal.dot(center - v0);
    let offset = if dist0 >= 0.0 { radius } else { -radius };
    let plane_t = if denom.abs() > 1e-9 {
        Some((offset - dist0) / denom)
    } else {
        None
    };

    let mut best: Option<f32> = None;
    if let Some(t) = plane_t {
        if (0.0..=1.0).contains(&t) {
            let p = center + dir * t - normal * offset;
            if point_in_triangle(p, v0, v1, v2, normal) {
                best = Some(t);
            }
        }
    }

    for (a, b) in [(v0, v1), (v1, v2), (v2, v0)] {
        if let Some(t) = sweep_vs_segment(center, dir, radius, a, b) {
            best = Some(best.map_or(t, |b| b.min(t)));
        }
    }
    for v in [v0, v1, v2] {
        if let Some(t) = sweep_vs_point(center, dir, radius, v) {
            best = Some(best.map_or(t, |b| b.min(t)));
        }
    }
    best
}

fn point_in_triangle(p: Vec3, a: Vec3, b: Vec3, c: Vec3, normal: Vec3) -> bool {
    let edge_test = |p0: Vec3, p1: Vec3| (p1 - p0).cross(p - p0).dot(normal) >= 0.0;
    edge_test(a, b) && edge_test(b, c) && edge_test(c, a)
}

fn sweep_vs_point(center: Vec3, dir: Vec3, radius: f32, p: Vec3) -> Option<f32> {
    let m = center - p;
    let a = dir.dot(dir);
    if a < 1e-12 {
        return None;
    }
    let b = 2.0 * m.dot(dir);
    let c = m.dot(m) - radius * radius;
    solve_quadratic_earliest(a, b, c)
}

/// Approximates the sphere-vs-edge sweep by testing against the edge point
/// nearest the sweep's start; adequate for the short, mostly-planar sweeps
/// this tool issues against level geometry.
fn sweep_vs_segment(center: Vec3, dir: Vec3, radius: f32, a: Vec3, b: Vec3) -> Option<f32> {
    let seg = b - a;
    let seg_len_sq = seg.dot(seg);
    if seg_len_sq < 1e-12 {
        return sweep_vs_point(center, dir, radius, a);
    }
    let t = ((center - a).dot(seg) / seg_len_sq).clamp(0.0, 1.0);
    let footpoint = a + seg * t;
    sweep_vs_point(center, dir, radius, footpoint)
}

fn solve_quadratic_earliest(a: f32, b: f32, c: f32) -> Option<f32> {
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return None;
    }
    let sqrt_disc = disc.sqrt();
    let t0 = (-b - sqrt_disc) / (2.0 * a);
    let t1 = (-b + sqrt_disc) / (2.0 * a);
    let (lo, hi) = if t0 <= t1 { (t0, t1) } else { (t1, t0) };
    if hi < 0.0 || lo > 1.0 {
        return None;
    }
    Some(lo.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_triangle_mesh() -> TriangleMesh {
        TriangleMesh {
            vertices: vec![
                Vec3::new(-10.0, -10.0, 0.0),
                Vec3::new(10.0, -10.0, 0.0),
                Vec3::new(0.0, 10.0, 0.0),
            ],
            indices: vec![0, 1, 2],
            surface_of_triangle: vec![0],
        }
    }

    #[test]
    fn root_aabb_contains_all_vertices() {
        let mesh = single_triangle_mesh();
        let bvh = Bvh::build(mesh.clone());
        let root = &bvh.nodes[bvh.root as usize];
        for &v in &mesh.vertices {
            assert!(root.aabb.contains_point(v));
        }
    }

    #[test]
    fn ray_straight_down_hits_triangle() {
        let mesh = single_triangle_mesh();
        let bvh = Bvh::build(mesh);
        let hit = bvh.find_first_hit(Vec3::new(0.0, 0.0, 10.0), Vec3::new(0.0, 0.0, -20.0));
        assert!(hit.is_some());
    }

    #[test]
    fn ray_missing_triangle_returns_none() {
        let mesh = single_triangle_mesh();
        let bvh = Bvh::build(mesh);
        let hit = bvh.find_first_hit(Vec3::new(100.0, 100.0, 10.0), Vec3::new(0.0, 0.0, -20.0));
        assert!(hit.is_none());
    }

    #[test]
    fn find_all_hits_returns_triangle_near_sphere() {
        let mesh = single_triangle_mesh();
        let bvh = Bvh::build(mesh);
        let hits = bvh.find_all_hits(Vec3::new(0.0, 0.0, 0.0), 5.0);
        assert_eq!(hits, vec![0]);
    }
}
