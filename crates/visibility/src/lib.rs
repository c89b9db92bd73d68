//! Per-frame update scheduling.
//!
//! # Invariants
//! - Always-active entities get exactly one `update` per frame.
//! - Conditionally active entities are updated only when within the cutoff
//!   distance and inside the camera frustum.
//! - A failing entity never aborts the frame for the others.

mod scheduler;
mod timer;

pub use scheduler::{FrameStats, SchedulerConfig, UpdateScheduler};
pub use timer::FrameBudget;
