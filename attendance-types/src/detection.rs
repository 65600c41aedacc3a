use crate::geometry::{BBox, Keypoints};

/// One face detector output for a single frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub bbox: BBox,
    pub kps: Option<Keypoints>,
    pub det_score: f32,
}

/// The detector's output for one frame, carrying a monotonic `seq` per camera
/// (see the GPU arbiter contract).
#[derive(Debug, Clone)]
pub struct DetectionResult {
    pub seq: u64,
    pub ts: f64,
    pub detections: Vec<Detection>,
}
