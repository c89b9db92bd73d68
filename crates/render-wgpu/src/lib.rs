//! wgpu render backend for the city.
//!
//! Each cached geometry is uploaded once; every draw-list batch becomes one
//! instanced draw call.
//!
//! # Invariants
//! - The renderer never mutates the city or the cache.
//! - Uploaded meshes are keyed by handle, so handles from a disposed cache
//!   never alias new resources.

mod gpu;
mod shaders;

pub use gpu::{WgpuFrame, WgpuRenderer};
