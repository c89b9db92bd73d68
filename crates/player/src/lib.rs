//! Player side of the city: a third-person character controller, its visual
//! stand-in, and the orbit camera used when no character is driven.
//!
//! # Invariants
//! - Collision is a soft push: one fixed step per intersecting obstacle per
//!   tick, never a snap to the obstacle boundary.
//! - At rest with no contact, a tick leaves position and yaw unchanged.
//! - Swapping the avatar never changes the pose.

mod avatar;
mod controller;
mod orbit;

pub use avatar::{Avatar, Capsule, ModelAvatar};
pub use controller::{MotionState, PlayerConfig, PlayerController};
pub use orbit::{OrbitConfig, OrbitControls};
