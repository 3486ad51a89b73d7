//! Command-line surface — one field per flag in the distilled spec's
//! external-interfaces table, translated into a [`crate::config::BuildConfig`]
//! immediately after parsing.

use clap::Parser;

use crate::config::BuildConfig;

#[derive(Parser, Debug)]
#[command(name = "raybake", about = "Offline node/blockmap/lightmap builder for Doom-engine WADs")]
pub struct Args {
    /// Input WAD path.
    pub input: std::path::PathBuf,

    /// Restrict to one map.
    #[arg(short = 'm', long = "map")]
    pub map: Option<String>,

    /// Output WAD path.
    #[arg(short = 'o', default_value = "out.wad")]
    pub output: std::path::PathBuf,

    /// Build GL nodes.
    #[arg(short = 'g')]
    pub gl: bool,
    /// Build GL nodes only when the input has none.
    #[arg(short = 'G')]
    pub gl_if_missing: bool,
    /// Disable node build entirely.
    #[arg(short = 'N')]
    pub no_nodes: bool,

    /// Blockmap: emit an empty lump.
    #[arg(short = 'b')]
    pub blockmap_empty: bool,
    /// Reject: emit an empty lump.
    #[arg(short = 'r')]
    pub reject_empty: bool,
    /// Reject: emit an all-zero lump.
    #[arg(short = 'R')]
    pub reject_zero: bool,
    /// Reject: emit an all-ones (fully blocked) lump.
    #[arg(short = 'e')]
    pub reject_full: bool,
    /// Reject: mark untouched sector pairs only.
    #[arg(short = 'E')]
    pub reject_no_touch: bool,

    /// Splitter-search candidate pool size.
    #[arg(short = 'p', default_value_t = 64)]
    pub splitter_search_size: usize,
    /// Split cost weight.
    #[arg(short = 's', default_value_t = 8)]
    pub split_cost: i32,
    /// Axial-alignment bonus weight.
    #[arg(short = 'd', default_value_t = 16)]
    pub axial_cost: i32,

    /// Disable polyobj spot collection.
    #[arg(short = 'P')]
    pub no_polyobj_spots: bool,
    /// Disable pruning.
    #[arg(short = 'q')]
    pub no_prune: bool,

    /// Compress GL nodes (zlib).
    #[arg(short = 'z')]
    pub compress_gl: bool,
    /// Compress classic nodes (zlib).
    #[arg(short = 'Z')]
    pub compress_classic: bool,
    /// Emit extended (non-16-bit) node format.
    #[arg(short = 'X')]
    pub extended: bool,
    /// Emit GL nodes only (no classic SEGS/SSECTORS/NODES).
    #[arg(short = 'x')]
    pub gl_only: bool,
    /// Use V5 GL nodes.
    #[arg(short = '5')]
    pub gl_v5: bool,

    /// Write UDMF comments.
    #[arg(short = 'c')]
    pub udmf_comments: bool,

    /// Worker thread count.
    #[arg(short = 'j')]
    pub threads: Option<usize>,
    /// Lightmap sample count.
    #[arg(short = 'Q', default_value_t = 256)]
    pub lightmap_samples: u32,
    /// Lightmap atlas page size.
    #[arg(short = 'S', default_value_t = 2048)]
    pub atlas_size: u32,
}

impl Args {
    pub fn into_config(self) -> BuildConfig {
        let defaults = BuildConfig::default();
        BuildConfig {
            map_filter: self.map,
            output_path: self.output,
            build_gl: self.gl || (self.gl_if_missing && !self.no_nodes) || defaults.build_gl,
            gl_only_if_missing: self.gl_if_missing,
            disable_node_build: self.no_nodes,
            blockmap_empty: self.blockmap_empty,
            reject_empty: self.reject_empty,
            reject_zero: self.reject_zero,
            reject_full: self.reject_full,
            reject_no_touch: self.reject_no_touch,
            splitter_search_size: self.splitter_search_size,
            split_cost: self.split_cost,
            axial_cost: self.axial_cost,
            disable_polyobj_spots: self.no_polyobj_spots,
            no_prune: self.no_prune,
            compress_gl: self.compress_gl,
            compress_classic: self.compress_classic,
            emit_extended: self.extended,
            gl_only: self.gl_only,
            gl_v5: self.gl_v5,
            write_udmf_comments: self.udmf_comments,
            thread_count: self.threads.unwrap_or(defaults.thread_count),
            lightmap_samples: self.lightmap_samples,
            atlas_size: self.atlas_size,
        }
    }
}
