//! Turns per-track identity decisions into debounced attendance marks. See
//! `SPEC_FULL.md` §4.7.

pub mod debouncer;
pub mod quality;

pub use debouncer::{DebounceContext, DebounceDecision, Debouncer};
pub use quality::compute_quality;
