//! Rendering adapter: renderer-agnostic interface over an assembled city.
//!
//! # Invariants
//! - Renderers never mutate the city; they consume a [`DrawList`] snapshot.
//! - One batch per (geometry, material) pair, in scene traversal order.

mod drawlist;
mod renderer;

pub use drawlist::{DrawBatch, DrawInstance, DrawList, LightInstance};
pub use renderer::{DebugTextRenderer, RenderError, Renderer};
