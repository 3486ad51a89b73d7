//! `BuildConfig` — every CLI-tunable knob, constructed once at the CLI
//! boundary and threaded by reference through the pipeline (no global state).

use crate::nodes::NodeBuildConfig;
use crate::output::NodeEmitOptions;

#[derive(Clone, Debug)]
pub struct BuildConfig {
    pub map_filter: Option<String>,
    pub output_path: std::path::PathBuf,

    pub build_gl: bool,
    pub gl_only_if_missing: bool,
    pub disable_node_build: bool,

    pub blockmap_empty: bool,
    pub reject_empty: bool,
    pub reject_zero: bool,
    pub reject_full: bool,
    pub reject_no_touch: bool,

    pub splitter_search_size: usize,
    pub split_cost: i32,
    pub axial_cost: i32,

    pub disable_polyobj_spots: bool,
    pub no_prune: bool,

    pub compress_gl: bool,
    pub compress_classic: bool,
    pub emit_extended: bool,
    pub gl_only: bool,
    pub gl_v5: bool,
    pub write_udmf_comments: bool,

    pub thread_count: usize,
    pub lightmap_samples: u32,
    pub atlas_size: u32,
}

impl BuildConfig {
    pub fn node_build_config(&self) -> NodeBuildConfig {
        NodeBuildConfig {
            build_gl: self.build_gl,
            max_segs: self.splitter_search_size,
            split_cost: self.split_cost,
            aa_preference: self.axial_cost,
            ..NodeBuildConfig::default()
        }
    }

    pub fn node_emit_options(&self) -> NodeEmitOptions {
        NodeEmitOptions {
            build_gl: self.build_gl,
            compress_gl: self.compress_gl,
            compress_classic: self.compress_classic,
            emit_extended: self.emit_extended,
            gl_only: self.gl_only,
            gl_v5: self.gl_v5,
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        BuildConfig {
            map_filter: None,
            output_path: std::path::PathBuf::from("out.wad"),
            build_gl: true,
            gl_only_if_missing: false,
            disable_node_build: false,
            blockmap_empty: false,
            reject_empty: false,
            reject_zero: false,
            reject_full: false,
            reject_no_touch: false,
            splitter_search_size: 64,
            split_cost: 8,
            axial_cost: 16,
            disable_polyobj_spots: false,
            no_prune: false,
            compress_gl: false,
            compress_classic: false,
            emit_extended: false,
            gl_only: false,
            gl_v5: false,
            write_udmf_comments: false,
            thread_count: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4),
            lightmap_samples: 256,
            atlas_size: 2048,
        }
    }
}
