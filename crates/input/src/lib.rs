//! Input collaborator: the frame loop polls state, it never registers
//! listeners.
//!
//! # Invariants
//! - Movement flags are level-triggered; `interact` is a pulse consumed once.
//! - Every device maps onto the same [`Action`] set.

pub mod action;
mod bindings;
mod state;

pub use action::{Action, Control};
pub use bindings::{Bindings, InputSource, ScriptedInput};
pub use state::InputState;
