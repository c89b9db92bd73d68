//! Shared types for the skill city: entity ids, transforms, placement specs,
//! bounding volumes, frustum math, and the perspective camera.
//!
//! # Invariants
//! - Ground plane is `y = 0` unless a config says otherwise; `Vec2` ground
//!   coordinates map `x -> x` and `y -> z`.
//! - Entity ids are dense and assigned in scene traversal order.

pub mod bounds;
pub mod camera;
pub mod frustum;
pub mod spec;
pub mod types;

pub use bounds::{Aabb, Ray, Rect};
pub use camera::Camera;
pub use frustum::{Frustum, Plane};
pub use spec::{EntityKind, PlacementSpec};
pub use types::{Color, EntityId, InfoRecord, Transform};
