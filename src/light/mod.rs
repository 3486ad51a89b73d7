//! Lightmap bake — `I. CPU path tracer` / `J. GPU path tracer`.
//!
//! `things` extracts `ThingLight`s from map things and propagates per-surface
//! light lists across portals; `cpu` runs the worker-pool path tracer that
//! fills every tile's texel buffer. `gpu` mirrors the same integral behind
//! the `gpu` feature.

pub mod cpu;
#[cfg(feature = "gpu")]
pub mod gpu;
pub mod things;

pub use things::ThingLight;
