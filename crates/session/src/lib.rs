//! A running city: owns the assembled [`City`](skillcity_kernel::City) and
//! drives one frame at a time.
//!
//! Each frame drains finished asset loads, moves the player or the orbit
//! camera, resolves the interact pulse, then runs the update scheduler.
//!
//! # Invariants
//! - Load completions are applied only at the start of a frame.
//! - `dispose` is idempotent and closes the load queue first, so late
//!   completions are discarded.

mod config;
mod info;
mod session;

pub use config::{CameraMode, SessionConfig, SessionError};
pub use info::{InfoEvent, InfoSink, RecordingSink};
pub use session::CitySession;
