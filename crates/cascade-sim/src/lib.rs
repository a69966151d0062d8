//! Physics tick planning: octant sub-pass order and seam jitter.
//!
//! The GPU work itself lives in the physics compute program; this crate
//! decides what each of the eight sub-passes receives.

pub mod jitter;
pub mod schedule;

pub use jitter::SeamJitter;
pub use schedule::{plan_tick, Octant, SubPass, OCTANT_ORDER};
