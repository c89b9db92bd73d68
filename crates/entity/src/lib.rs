//! City entities.
//!
//! An [`Entity`] is built from an immutable [`skillcity_common::PlacementSpec`]
//! by the recipe for its kind. Parts reference geometry and materials owned by
//! the [`skillcity_assets::ResourceCache`]; an entity never owns GPU-side
//! state. Windows are emitted as one [`InstancedBatch`] per building.

mod entity;
mod part;
pub mod recipes;
pub mod windows;

pub use entity::{Entity, EntityError};
pub use part::{Glow, InstancedBatch, PartRole, VisualPart};
pub use recipes::{Animation, Assembly};
pub use windows::WindowGridConfig;
