//! City kernel: the assembled scene and everything that owns it.
//!
//! [`CityBuilder`] turns a [`CityConfig`] into a [`City`]. The city owns the
//! resource cache, the entity arena and the scene graph; all mutation goes
//! through it on the frame-loop thread.
//!
//! # Invariants
//! - Entity ids are assigned in scene traversal order.
//! - Landmarks are always-active; everything else is conditionally active.
//! - Disposal releases entities before the cache and is idempotent.

mod builder;
mod city;
pub mod config;
pub mod scene;

pub use builder::{BuildError, CityBuilder};
pub use city::{City, VisibilitySet};
pub use config::{CityConfig, ConfigError, LandmarkConfig};
pub use scene::{Light, Node, NodeContent, NodeId, SceneGraph};
