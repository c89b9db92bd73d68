//! Procedural placement: where buildings and props go.
//!
//! Two strategies share one set of exclusion zones:
//! - [`GridPlacer`] walks a regular grid, jitters each cell center, rejects
//!   points inside an exclusion, and draws the requested count from what
//!   survives. It never fails; a short pool just yields fewer points.
//! - [`ScatterPlacer`] places hand-authored anchors first, then fills the
//!   rest by bounded rejection sampling. Running out of attempts is reported
//!   as [`PlacementExhausted`] carrying the points placed so far.
//!
//! Both are deterministic for a given RNG seed.

mod grid;
mod scatter;
mod zones;

pub use grid::{GridPlacer, MAX_CELLS_PER_AXIS};
pub use scatter::{PlacementExhausted, ScatterPlacer, MAX_ATTEMPTS_PER_POINT};
pub use zones::ExclusionZones;
