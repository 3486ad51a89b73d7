//! Pipeline-wide error type.
//!
//! Every stage from WAD loading to lightmap baking returns `Result<T, BuildError>`.
//! `BakeOverflow` is special: callers of the GPU/CPU bake dispatch loop catch it and
//! re-queue the offending tiles for the next batch rather than letting it propagate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("I/O error: {0}")]
    IoFailure(#[from] std::io::Error),

    #[error("malformed map: {0}")]
    MalformedMap(String),

    #[error("node build failed: {0}")]
    NodeBuildFailed(String),

    #[error("blockmap exceeds 0x10000 words ({0} words required)")]
    BlockmapTooLarge(usize),

    #[error("bake batch overflow: {0} tiles did not fit, re-queued")]
    BakeOverflow(usize),

    #[error("shader compile failed: {0}")]
    ShaderCompileFailed(String),

    #[error("out of memory: {0}")]
    OutOfMemory(String),
}

pub type Result<T> = std::result::Result<T, BuildError>;

impl From<crate::wad::WadError> for BuildError {
    fn from(e: crate::wad::WadError) -> Self {
        BuildError::MalformedMap(e.to_string())
    }
}
