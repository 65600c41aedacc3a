//! Face detector and embedder: external-model collaborators specified only
//! by their input/output contracts (`spec.md` §1). Real deployments wire in
//! an ONNX Runtime session behind these traits; this workspace ships a
//! deterministic no-op stand-in so the rest of the pipeline is fully
//! exercisable without a model file.

use attendance_scheduler::motion_gate::RawFrame;
use attendance_types::detection::Detection;
use attendance_types::geometry::BBox;

/// Produces bounding boxes, landmarks, and a detection score for one frame.
/// Called only from the GPU arbiter's single worker thread, per the
/// mutex-around-the-model discipline in Design Notes §9.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &dyn RawFrame, det_size: u32) -> Vec<Detection>;
}

/// Produces a unit-norm embedding for an aligned crop of `frame` at `bbox`.
pub trait FaceEmbedder: Send {
    fn embed(&mut self, frame: &dyn RawFrame, bbox: BBox) -> Option<Vec<f32>>;
}

/// Always reports no detections. Stands in until a real model is wired in;
/// keeps the recognition worker's control flow (submit, fuse, recognize,
/// debounce) exercisable without one.
#[derive(Default)]
pub struct NullDetector;

impl FaceDetector for NullDetector {
    fn detect(&mut self, _frame: &dyn RawFrame, _det_size: u32) -> Vec<Detection> {
        Vec::new()
    }
}

/// Always reports no embedding, so tracks fed only by `NullDetector` never
/// spuriously acquire an identity.
#[derive(Default)]
pub struct NullEmbedder;

impl FaceEmbedder for NullEmbedder {
    fn embed(&mut self, _frame: &dyn RawFrame, _bbox: BBox) -> Option<Vec<f32>> {
        None
    }
}
