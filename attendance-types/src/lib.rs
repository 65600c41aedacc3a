//! Shared data model for the attendance pipeline: opaque identifiers,
//! geometry helpers, the per-camera track arena, gallery matching, write
//! jobs, and the voice-event type. See `SPEC_FULL.md` §3.

pub mod company;
pub mod detection;
pub mod error;
pub mod gallery;
pub mod geometry;
pub mod ids;
pub mod jobs;
pub mod stream;
pub mod track;
pub mod voice;

pub use error::{Error, Result};
pub use ids::{CameraId, CompanyId, EmployeeId};
