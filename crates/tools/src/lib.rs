//! Developer tooling: read-only inspection of an assembled city.
//!
//! # Invariants
//! - Inspection never mutates the city.

mod inspector;

pub use inspector::{CityInspector, CitySummary, EntitySummary};
