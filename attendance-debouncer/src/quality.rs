use attendance_types::geometry::BBox;

/// Single weighted-sum attendance-mark quality score in `[0, 1]`: bbox area
/// fraction of the frame, detector confidence, and landmark presence. See
/// `SPEC_FULL.md` §9's Open Question resolution — either of the two
/// historical weightings satisfies §4.7 as long as `min_att_quality` gates
/// it, so one fixed weighting is provided here.
pub fn compute_quality(bbox: &BBox, frame_w: u32, frame_h: u32, det_score: f32, has_kps: bool) -> f32 {
    let frame_area = (frame_w as f64 * frame_h as f64).max(1.0);
    let area_fraction = (bbox.area() / frame_area).clamp(0.0, 1.0) as f32;
    let kps_term = if has_kps { 1.0 } else { 0.0 };
    0.5 * area_fraction + 0.35 * det_score.clamp(0.0, 1.0) + 0.15 * kps_term
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn full_frame_face_with_kps_and_perfect_score_is_max_quality() {
        let bbox = BBox::new(0, 0, 100, 100);
        let q = compute_quality(&bbox, 100, 100, 1.0, true);
        assert_relative_eq!(q, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn tiny_face_without_kps_scores_low() {
        let bbox = BBox::new(0, 0, 5, 5);
        let q = compute_quality(&bbox, 1000, 1000, 0.2, false);
        assert!(q < 0.1);
    }
}
