//! WAD container I/O: a sequence of named byte lumps with a directory.
//!
//! Grounded in the teacher crate's `wad::raw` module, extended with `PWAD`
//! support (the teacher only accepted `IWAD`) and a writer half for `K. Output`.

mod raw;
mod writer;

pub use raw::{LumpInfo, Wad, WadError, WadKind};
pub use writer::WadWriter;
