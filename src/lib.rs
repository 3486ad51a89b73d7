//! `raybake` — offline node/blockmap/lightmap preprocessor for Doom-engine
//! WADs. Pipeline, leaves first: `C` level loader → `D` slope resolver →
//! `E` node builder → `F` blockmap builder → `H` level mesh → `I`/`J` path
//! tracer → `K` output. `B` (WAD/UDMF I/O) is invoked by `C` and `K`; `A`
//! (the math kernel) underlies everything; `G` (the BVH) is built by `H`
//! and consumed by `I`/`J`.

pub mod blockmap;
pub mod bvh;
pub mod cli;
pub mod config;
pub mod error;
pub mod level;
pub mod light;
pub mod math;
pub mod mesh;
pub mod nodes;
pub mod output;
pub mod portal;
pub mod wad;

use glam::Vec3;
use log::{info, warn};

use config::BuildConfig;
use error::Result;
use level::Level;
use wad::{Wad, WadWriter};

/// Runs the full pipeline over every map in `input` matching `config`'s map
/// filter, writing the result to `config.output_path`.
pub fn run(input: &std::path::Path, config: &BuildConfig) -> Result<()> {
    let wad = Wad::from_file(input)?;
    let markers = level::binary::level_markers(&wad);
    info!("{}: {} maps found", input.display(), markers.len());

    let mut writer = WadWriter::new();
    let mut built_any = false;

    for &marker_idx in &markers {
        let name = Wad::lump_name(&wad.lumps()[marker_idx].name);
        if let Some(filter) = &config.map_filter {
            if !name.eq_ignore_ascii_case(filter) {
                continue;
            }
        }
        info!("building {name}");
        build_map(&wad, marker_idx, config, &mut writer)?;
        built_any = true;
    }

    if !built_any {
        warn!("no map matched filter {:?}; output will contain no map lumps", config.map_filter);
    }

    writer.write_to_file(&config.output_path)?;
    info!("wrote {}", config.output_path.display());
    Ok(())
}

/// Lightmap sample spacing used when a side/line/sector doesn't override it
/// (the distilled spec's "level default"); `-Q` tunes coverage sampling, not
/// tile resolution, so it is kept separate from this constant.
const DEFAULT_SAMPLE_DISTANCE: u32 = 16;

fn build_map(wad: &Wad, marker_idx: usize, config: &BuildConfig, writer: &mut WadWriter) -> Result<()> {
    let mut lvl = level::load_level(wad, marker_idx)?;
    // `prune()` always runs: it's also where back-pointers get fixed up, and
    // that must never be skipped or deferred. `no_prune` only disables the
    // degenerate-line/compaction work inside it.
    lvl.no_prune = config.no_prune;
    let report = level::prune::prune(&mut lvl)?;
    info!("pruned: {report:?}");
    level::groups::compute_sector_groups(&mut lvl);
    level::slopes::resolve_slopes(&mut lvl);

    let node_tree = if config.disable_node_build {
        empty_node_tree(&lvl)
    } else {
        nodes::build_nodes(&lvl, config.node_build_config()).map_err(|e| {
            warn!("node build failed for this map: {e}");
            e
        })?
    };
    info!("node builder: {} nodes, {} subsectors", node_tree.nodes.len(), node_tree.subsectors.len());

    let blockmap = if config.blockmap_empty {
        None
    } else {
        Some(blockmap::build(&lvl, true)?)
    };

    let mesh = mesh::build(&lvl, &node_tree, config.atlas_size, DEFAULT_SAMPLE_DISTANCE);

    let (light_list, positions) = build_lights(&lvl, &node_tree, &mesh);
    let mut mesh = mesh;
    light::things::propagate(&mut mesh, &light_list, &lvl);

    let sun_dir = Vec3::new(0.4, 0.4, -0.8).normalize();
    let sun_color = Vec3::ZERO;
    let tracer_config = light::cpu::CpuTracerConfig {
        coverage_samples: config.lightmap_samples,
        thread_count: config.thread_count,
        sun_dir,
        sun_color,
        ..light::cpu::CpuTracerConfig::default()
    };
    light::cpu::bake(&mut mesh, &light_list, &positions, &tracer_config);

    output::write_map(writer, &lvl, &node_tree, blockmap.as_ref(), Some(&mesh), sun_dir, sun_color, &config.node_emit_options())
}

fn build_lights(level: &Level, nodes: &nodes::NodeTree, mesh: &mesh::LevelMesh) -> (Vec<light::ThingLight>, Vec<Vec3>) {
    let subsector_of_point = |p: glam::Vec2| subsector_containing(nodes, p);
    let sector_of_subsector = |sub: u32| nodes.subsectors.get(sub as usize).map(|s| s.sector);
    let lights = light::things::extract(level, subsector_of_point, sector_of_subsector);
    let _ = mesh;
    let positions = lights.iter().map(|l| l.world_origin(level)).collect();
    (lights, positions)
}

/// Walk the BSP from the root, following the half-plane each node's splitter
/// puts `p` on, until a subsector leaf is reached.
fn subsector_containing(tree: &nodes::NodeTree, p: glam::Vec2) -> Option<u32> {
    if tree.nodes.is_empty() {
        return (tree.root & nodes::SUBSECTOR_BIT != 0).then(|| tree.root & !nodes::SUBSECTOR_BIT);
    }
    let mut idx = tree.root;
    loop {
        if idx & nodes::SUBSECTOR_BIT != 0 {
            return Some(idx & !nodes::SUBSECTOR_BIT);
        }
        let node = tree.nodes.get(idx as usize)?;
        let side = (p.x - node.x) * node.dy - (p.y - node.y) * node.dx;
        idx = if side <= 0.0 { node.children[0] } else { node.children[1] };
    }
}

fn empty_node_tree(level: &Level) -> nodes::NodeTree {
    nodes::NodeTree {
        vertices: level.vertices.iter().map(|v| v.pos).collect(),
        num_org_verts: level.vertices.len(),
        segs: Vec::new(),
        subsectors: Vec::new(),
        nodes: Vec::new(),
        root: nodes::SUBSECTOR_BIT,
    }
}
