//! Gallery matching, identity hysteresis, and anti-spoof gating. See
//! `SPEC_FULL.md` §4.5/§4.6.

pub mod anti_spoof;
pub mod error;
pub mod gallery_cache;
pub mod recognizer;

pub use anti_spoof::{AntiSpoofGate, ConstantLiveness, LivenessModel, SpoofReason};
pub use error::{Error, Result};
pub use gallery_cache::{BackendGalleryClient, GalleryCache};
pub use recognizer::{effective_kps_age_ok, recognize_track};
