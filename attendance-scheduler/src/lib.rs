//! Motion gate and adaptive scheduler. See `SPEC_FULL.md` §4.1/§4.2.

pub mod motion_gate;
pub mod scheduler;

pub use motion_gate::{MotionGate, MotionReading, RawFrame};
pub use scheduler::{Mode, Scheduler, SchedulerEvent};
