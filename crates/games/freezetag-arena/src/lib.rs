//! Per-round game systems for freeze tag: the freeze authority, role
//! rotation, the Seeker detection cone, out-of-bounds exposure, and the
//! static arena they run against.
//!
//! Everything here is synchronous and driven by the caller's clock. The
//! server crate decides when each system ticks.

pub mod arena;
pub mod boundary;
pub mod detection;
pub mod freeze;
pub mod teams;

pub use arena::{Arena, ArenaSize, load_arena};
pub use boundary::BoundaryMonitor;
pub use detection::{DetectionEngine, DetectionHit, LineOfSight};
pub use freeze::{FreezeOutcome, FreezeTracker};
pub use teams::{AssignError, TeamAssigner, TeamSplit};
