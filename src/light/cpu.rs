//! CPU path tracer — `I. CPU path tracer`, grounded on ZDRay's `worker.cpp`
//! worker-pool shape (contiguous index-range jobs, per-thread scratch,
//! no work-stealing) and `lightmaprenderer.cpp`'s per-texel integration.

use glam::Vec3;

use crate::light::ThingLight;
use crate::mesh::LevelMesh;

#[derive(Clone, Debug)]
pub struct CpuTracerConfig {
    pub coverage_samples: u32,
    pub bounce_samples: u32,
    pub max_bounces: u32,
    pub thread_count: usize,
    pub sun_dir: Vec3,
    pub sun_color: Vec3,
}

impl Default for CpuTracerConfig {
    fn default() -> Self {
        CpuTracerConfig {
            coverage_samples: 256,
            bounce_samples: 2048,
            max_bounces: 0,
            thread_count: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4),
            sun_dir: Vec3::new(0.4, 0.4, -0.8).normalize(),
            sun_color: Vec3::ZERO,
        }
    }
}

#[derive(Clone, Copy)]
struct Job {
    tile: u32,
    x: u32,
    y: u32,
}

/// Union the light lists of every surface bound to each tile, so a single
/// per-pixel job tests the complete candidate set without re-walking
/// surfaces per texel.
fn tile_light_lists(mesh: &LevelMesh) -> Vec<Vec<u32>> {
    let mut out = vec![Vec::new(); mesh.tiles.len()];
    for surface in &mesh.surfaces {
        let Some(tile) = surface.tile else { continue };
        for &light in &surface.light_list {
            if !out[tile as usize].contains(&light) {
                out[tile as usize].push(light);
            }
        }
    }
    out
}

fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    if (edge1 - edge0).abs() < 1e-6 {
        return if x < edge0 { 0.0 } else { 1.0 };
    }
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

fn direct_light_at(
    mesh: &LevelMesh,
    light_ids: &[u32],
    lights: &[ThingLight],
    light_positions: &[Vec3],
    pos: Vec3,
    normal: Vec3,
) -> Vec3 {
    let mut accum = Vec3::ZERO;
    for &idx in light_ids {
        let light = &lights[idx as usize];
        let light_pos = light_positions[idx as usize];
        let to_light = light_pos - pos;
        let d = to_light.length();
        if d < 1e-4 || d > light.radius {
            continue;
        }
        let dir = to_light / d;
        let att_dist = (1.0 - d / light.radius).max(0.0);
        let att_angle = normal.dot(dir).max(0.0);
        let att_spot = if light.is_spot() {
            smoothstep(light.outer_angle_cos, light.inner_angle_cos, dir.dot(light.spot_dir))
        } else {
            1.0
        };
        let att = att_dist * att_angle * att_spot;
        if att <= 0.0 {
            continue;
        }
        if !mesh.bvh.find_any_hit(pos, to_light) {
            accum += light.rgb * light.intensity * att;
        }
    }
    accum
}

const SUN_TRACE_DISTANCE: f32 = 32768.0;

fn sun_contribution(mesh: &LevelMesh, pos: Vec3, normal: Vec3, config: &CpuTracerConfig) -> Vec3 {
    if config.sun_color == Vec3::ZERO {
        return Vec3::ZERO;
    }
    let n_dot_sun = normal.dot(config.sun_dir).max(0.0);
    if n_dot_sun <= 0.0 {
        return Vec3::ZERO;
    }
    let Some(hit) = mesh.bvh.find_first_hit(pos, config.sun_dir * SUN_TRACE_DISTANCE) else {
        return Vec3::ZERO;
    };
    let surf = mesh.bvh.surface_of_triangle(hit.triangle) as usize;
    if mesh.surfaces[surf].sky {
        config.sun_color * n_dot_sun
    } else {
        Vec3::ZERO
    }
}

/// Reverses the bits of `i` into a base-2 fraction (Van der Corput sequence).
fn radical_inverse_vdc(mut bits: u32) -> f32 {
    bits = (bits << 16) | (bits >> 16);
    bits = ((bits & 0x5555_5555) << 1) | ((bits & 0xaaaa_aaaa) >> 1);
    bits = ((bits & 0x3333_3333) << 2) | ((bits & 0xcccc_cccc) >> 2);
    bits = ((bits & 0x0f0f_0f0f) << 4) | ((bits & 0xf0f0_f0f0) >> 4);
    bits = ((bits & 0x00ff_00ff) << 8) | ((bits & 0xff00_ff00) >> 8);
    bits as f32 * 2.328_306_4e-10
}

fn hammersley(i: u32, n: u32) -> (f32, f32) {
    (i as f32 / n as f32, radical_inverse_vdc(i))
}

/// Importance-samples the GGX lobe with `roughness = 1`, returning a world
/// direction over the hemisphere around `normal`.
fn ggx_sample(xi: (f32, f32), normal: Vec3) -> Vec3 {
    let roughness = 1.0f32;
    let a = roughness * roughness;
    let phi = std::f32::consts::TAU * xi.0;
    let cos_theta = ((1.0 - xi.1) / (1.0 + (a * a - 1.0) * xi.1)).sqrt();
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();

    let tangent = if normal.x.abs() < 0.9 { Vec3::X } else { Vec3::Y };
    let t = tangent.cross(normal).normalize_or_zero();
    let b = normal.cross(t);

    let local = Vec3::new(sin_theta * phi.cos(), sin_theta * phi.sin(), cos_theta);
    (t * local.x + b * local.y + normal * local.z).normalize_or_zero()
}

const BOUNCE_TRACE_DISTANCE: f32 = 8192.0;
const INV_TWO_PI: f32 = 1.0 / std::f32::consts::TAU;

fn bounce_contribution(mesh: &LevelMesh, lights: &[ThingLight], light_positions: &[Vec3], pos: Vec3, normal: Vec3, config: &CpuTracerConfig) -> Vec3 {
    if config.max_bounces == 0 {
        return Vec3::ZERO;
    }
    let mut accum = Vec3::ZERO;
    let n = config.bounce_samples.max(1);
    for i in 0..n {
        let dir = ggx_sample(hammersley(i, n), normal);
        let n_dot_l = normal.dot(dir);
        if n_dot_l <= 0.0 {
            continue;
        }
        let Some(hit) = mesh.bvh.find_first_hit(pos, dir * BOUNCE_TRACE_DISTANCE) else { continue };
        let surf = mesh.bvh.surface_of_triangle(hit.triangle) as usize;
        let hit_pos = pos + dir * BOUNCE_TRACE_DISTANCE * hit.t;
        let hit_normal = mesh.surfaces[surf].plane.normal_f32();
        let incoming = direct_light_at(mesh, &mesh.surfaces[surf].light_list, lights, light_positions, hit_pos, hit_normal);
        accum += incoming * (n_dot_l * INV_TWO_PI);
    }
    accum / n as f32
}

const SURFACE_EPSILON: f32 = 0.1;

fn shade_job(mesh: &LevelMesh, job: Job, tile_lights: &[Vec<u32>], lights: &[ThingLight], light_positions: &[Vec3], config: &CpuTracerConfig) -> Vec3 {
    let tile = &mesh.tiles[job.tile as usize];
    // `proj_u`/`proj_v` are the tile axes pre-divided by `step` (see
    // `TileTransform::uv_local`); recovering a world position from an
    // integer pixel coordinate undoes that division twice over.
    let step = tile.sample_dimension as f32;
    let world = tile.transform.translate + tile.transform.proj_u * (job.x as f32 * step * step) + tile.transform.proj_v * (job.y as f32 * step * step);
    let normal = tile.plane.normal_f32();
    let pos = world + normal * SURFACE_EPSILON;

    let mut accum = direct_light_at(mesh, &tile_lights[job.tile as usize], lights, light_positions, pos, normal);
    accum += sun_contribution(mesh, pos, normal, config);
    accum += bounce_contribution(mesh, lights, light_positions, pos, normal, config);
    accum
}

/// Run the worker pool to completion, writing radiance into every
/// `tile.pixels` buffer. `light_positions[i]` must be `lights[i].world_origin`
/// precomputed by the caller (this function has no `Level` access).
pub fn bake(mesh: &mut LevelMesh, lights: &[ThingLight], light_positions: &[Vec3], config: &CpuTracerConfig) {
    let tile_lights = tile_light_lists(mesh);

    let mut jobs = Vec::new();
    for (idx, tile) in mesh.tiles.iter().enumerate() {
        for y in 0..tile.height {
            for x in 0..tile.width {
                jobs.push(Job { tile: idx as u32, x, y });
            }
        }
    }
    if jobs.is_empty() {
        return;
    }

    let worker_count = config.thread_count.max(1).min(jobs.len());
    let chunk_len = jobs.len().div_ceil(worker_count);
    let mut results = vec![Vec3::ZERO; jobs.len()];

    std::thread::scope(|scope| {
        for (job_chunk, result_chunk) in jobs.chunks(chunk_len).zip(results.chunks_mut(chunk_len)) {
            let mesh_ref = &*mesh;
            scope.spawn(move || {
                for (job, slot) in job_chunk.iter().zip(result_chunk.iter_mut()) {
                    *slot = shade_job(mesh_ref, *job, &tile_lights, lights, light_positions, config);
                }
            });
        }
    });

    for (job, color) in jobs.iter().zip(results.into_iter()) {
        let tile = &mut mesh.tiles[job.tile as usize];
        let idx = tile.pixel_index(job.x, job.y);
        tile.pixels[idx] = color;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radical_inverse_is_in_unit_range() {
        for i in [0u32, 1, 2, 1000, u32::MAX] {
            let v = radical_inverse_vdc(i);
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn smoothstep_is_monotonic_between_edges() {
        let a = smoothstep(0.0, 1.0, 0.2);
        let b = smoothstep(0.0, 1.0, 0.8);
        assert!(a < b);
        assert_eq!(smoothstep(0.0, 1.0, -1.0), 0.0);
        assert_eq!(smoothstep(0.0, 1.0, 2.0), 1.0);
    }

    #[test]
    fn ggx_sample_stays_on_hemisphere() {
        let normal = Vec3::Z;
        for i in 0..16 {
            let dir = ggx_sample(hammersley(i, 16), normal);
            assert!(dir.dot(normal) >= -1e-4);
            assert!((dir.length() - 1.0).abs() < 1e-3);
        }
    }
}
