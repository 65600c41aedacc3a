use std::collections::HashMap;

use attendance_config::TrackerConfig;
use attendance_types::detection::Detection;
use attendance_types::geometry::BBox;
use attendance_types::track::{Identity, Track, TrackArena, TrackId};

use crate::single_object::{IouTracker, SingleObjectTracker};
use crate::Result;

/// Per-camera face track set, reconciling short-horizon single-object
/// trackers with burst-wise detector updates. See `SPEC_FULL.md` §4.4.
pub struct TrackerManager<T: SingleObjectTracker = IouTracker> {
    arena: TrackArena,
    trackers: HashMap<TrackId, T>,
}

impl<T: SingleObjectTracker> Default for TrackerManager<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: SingleObjectTracker> TrackerManager<T> {
    pub fn new() -> Self {
        TrackerManager {
            arena: TrackArena::new(),
            trackers: HashMap::new(),
        }
    }

    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.arena.iter()
    }

    pub fn get(&self, id: TrackId) -> Option<&Track> {
        self.arena.get(id)
    }

    pub fn get_mut(&mut self, id: TrackId) -> Option<&mut Track> {
        self.arena.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn mark_for_recognition(&mut self, id: TrackId, until_ts: f64) -> Result<()> {
        let track = self
            .arena
            .get_mut(id)
            .ok_or(attendance_types::Error::UnknownTrack(id))?;
        track.force_recognition_until_ts = track.force_recognition_until_ts.max(until_ts);
        Ok(())
    }

    /// Per-frame step: advances every track's single-object tracker and ages
    /// out anything that has been lost too long.
    pub fn update(&mut self, now: f64, cfg: &TrackerConfig) {
        let mut lost = Vec::new();
        for track in self.arena.iter_mut() {
            let tracker = match self.trackers.get_mut(&track.id) {
                Some(t) => t,
                None => continue,
            };
            match tracker.step(now) {
                Some(bbox) => {
                    track.bbox = bbox;
                }
                None => {
                    track.lost_frames += 1;
                }
            }
            track.last_seen_ts = now;
            if track.lost_frames > max_age_frames(track, cfg) {
                lost.push(track.id);
            }
        }
        for id in lost {
            tracing::debug!(target: "tracker", track = ?id, "pruning track lost for too many frames");
            self.arena.remove(id);
            self.trackers.remove(&id);
        }
    }

    /// Reconciles detector output against the current track set. Returns
    /// the ids of newly spawned tracks.
    pub fn apply_detections(
        &mut self,
        detections: &[Detection],
        now: f64,
        cfg: &TrackerConfig,
    ) -> Vec<TrackId> {
        for track in self.arena.iter_mut() {
            track.det_misses += 1;
        }

        let track_ids: Vec<TrackId> = self.arena.iter().map(|t| t.id).collect();
        let mut candidates: Vec<(f64, TrackId, usize)> = Vec::new();
        for &track_id in &track_ids {
            let track = self.arena.get(track_id).expect("just collected");
            for (det_idx, det) in detections.iter().enumerate() {
                if let Some(score) = match_score(track.bbox, det.bbox, cfg) {
                    candidates.push((score, track_id, det_idx));
                }
            }
        }
        candidates.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        let mut track_used = std::collections::HashSet::new();
        let mut det_used = std::collections::HashSet::new();
        let mut assignments = Vec::new();
        for (_, track_id, det_idx) in candidates {
            if track_used.contains(&track_id) || det_used.contains(&det_idx) {
                continue;
            }
            track_used.insert(track_id);
            det_used.insert(det_idx);
            assignments.push((track_id, det_idx));
        }

        for (track_id, det_idx) in assignments {
            let det = &detections[det_idx];
            let track = self.arena.get_mut(track_id).expect("matched track exists");
            let prior_bbox = track.bbox;
            let iou = prior_bbox.iou(&det.bbox);
            let center_dist = prior_bbox.center_distance(&det.bbox);
            let max_dim = prior_bbox.max_dim().max(det.bbox.max_dim()) as f64;

            if track.is_known()
                && (iou < cfg.track_known_reacquire_clear_iou
                    || center_dist > cfg.track_known_reacquire_clear_center_ratio * max_dim)
            {
                tracing::debug!(
                    target: "tracker",
                    track = ?track.id,
                    iou,
                    center_dist,
                    "weak reassociation, clearing known identity"
                );
                track.identity = Identity::Unknown {
                    unknown_since_ts: now,
                };
                track.force_recognition_until_ts =
                    track.force_recognition_until_ts.max(now + 2.0);
            }

            track.bbox = det.bbox;
            track.kps = det.kps.clone();
            track.det_score = det.det_score;
            track.last_det_ts = now;
            track.last_seen_ts = now;
            track.lost_frames = 0;
            track.det_misses = 0;

            if let Some(tracker) = self.trackers.get_mut(&track_id) {
                *tracker = T::init(det.bbox, now);
            } else {
                self.trackers.insert(track_id, T::init(det.bbox, now));
            }
        }

        let mut new_ids = Vec::new();
        for (det_idx, det) in detections.iter().enumerate() {
            if det_used.contains(&det_idx) {
                continue;
            }
            let id = self.arena.insert(det.bbox, now);
            if let Some(track) = self.arena.get_mut(id) {
                track.kps = det.kps.clone();
                track.det_score = det.det_score;
                track.last_det_ts = now;
            }
            self.trackers.insert(id, T::init(det.bbox, now));
            tracing::debug!(target: "tracker", track = ?id, "spawned track from unmatched detection");
            new_ids.push(id);
        }

        self.arena.retain(|track| {
            let limit = if track.is_known() {
                cfg.track_max_det_misses_known
            } else {
                cfg.track_max_det_misses_unknown
            };
            let keep = track.det_misses <= limit;
            if !keep {
                tracing::debug!(target: "tracker", track = ?track.id, det_misses = track.det_misses, "pruning stale track");
            }
            keep
        });
        self.trackers
            .retain(|id, _| self.arena.get(*id).is_some());

        new_ids
    }
}

fn max_age_frames(track: &Track, cfg: &TrackerConfig) -> u32 {
    if track.is_known() {
        cfg.track_max_age_frames
    } else {
        (cfg.track_max_age_frames / 3).max(3)
    }
}

/// `None` if the pair is gated out; `Some(score)` otherwise, where a higher
/// score is a better match.
fn match_score(track_bbox: BBox, det_bbox: BBox, cfg: &TrackerConfig) -> Option<f64> {
    if track_bbox.area_ratio(&det_bbox) > 2.0 {
        return None;
    }
    let iou = track_bbox.iou(&det_bbox);
    let center_dist = track_bbox.center_distance(&det_bbox);
    let max_dim = track_bbox.max_dim().max(det_bbox.max_dim());

    let gated = iou >= cfg.track_iou_match_threshold
        || center_dist <= cfg.track_center_match_px.min(0.8 * max_dim);
    if !gated {
        return None;
    }
    Some(iou - center_dist / (4.0 * max_dim.max(1.0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use attendance_types::detection::Detection;

    fn cfg() -> TrackerConfig {
        TrackerConfig {
            track_iou_match_threshold: 0.3,
            track_center_match_px: 80.0,
            track_known_reacquire_clear_iou: 0.15,
            track_known_reacquire_clear_center_ratio: 0.5,
            track_max_age_frames: 30,
            track_max_det_misses_unknown: 5,
            track_max_det_misses_known: 15,
        }
    }

    fn det(bbox: BBox) -> Detection {
        Detection {
            bbox,
            kps: None,
            det_score: 0.9,
        }
    }

    #[test]
    fn unmatched_detection_spawns_a_new_track() {
        let mut mgr: TrackerManager = TrackerManager::new();
        let cfg = cfg();
        let new_ids = mgr.apply_detections(&[det(BBox::new(0, 0, 20, 20))], 0.0, &cfg);
        assert_eq!(new_ids.len(), 1);
        assert_eq!(mgr.len(), 1);
    }

    #[test]
    fn overlapping_detection_matches_existing_track_instead_of_spawning() {
        let mut mgr: TrackerManager = TrackerManager::new();
        let cfg = cfg();
        mgr.apply_detections(&[det(BBox::new(0, 0, 20, 20))], 0.0, &cfg);
        let new_ids = mgr.apply_detections(&[det(BBox::new(2, 2, 22, 22))], 0.1, &cfg);
        assert!(new_ids.is_empty());
        assert_eq!(mgr.len(), 1);
    }

    #[test]
    fn two_nearby_tracks_do_not_swap_identities_across_frames() {
        // Anti-swap property: two tracks on either side of the frame should
        // always match their own nearest detection, never cross over.
        let mut mgr: TrackerManager = TrackerManager::new();
        let cfg = cfg();
        mgr.apply_detections(
            &[det(BBox::new(0, 0, 20, 20)), det(BBox::new(200, 0, 220, 20))],
            0.0,
            &cfg,
        );
        let ids: Vec<_> = mgr.tracks().map(|t| (t.id, t.bbox)).collect();
        let left_id = ids.iter().find(|(_, b)| b.x1 < 100).unwrap().0;
        let right_id = ids.iter().find(|(_, b)| b.x1 >= 100).unwrap().0;

        mgr.apply_detections(
            &[det(BBox::new(3, 1, 23, 21)), det(BBox::new(203, 1, 223, 21))],
            0.1,
            &cfg,
        );

        let left_after = mgr.get(left_id).unwrap();
        let right_after = mgr.get(right_id).unwrap();
        assert!(left_after.bbox.x1 < 100);
        assert!(right_after.bbox.x1 >= 100);
    }

    #[test]
    fn known_track_weak_reassociation_clears_identity_and_forces_recognition() {
        let mut mgr: TrackerManager = TrackerManager::new();
        let cfg = cfg();
        let new_ids = mgr.apply_detections(&[det(BBox::new(0, 0, 20, 20))], 0.0, &cfg);
        let id = new_ids[0];
        {
            let track = mgr.get_mut(id).unwrap();
            track.identity = Identity::Known {
                person_id: attendance_types::EmployeeId::new("e1"),
                name: "Employee One".into(),
                similarity: 0.9,
                stable_id_hits: 5,
                last_known_ts: 0.0,
                last_known_bbox: BBox::new(0, 0, 20, 20),
                last_identity_change_ts: 0.0,
                verification: None,
            };
        }
        // A reassociation that still passes match_score's gate (center_dist
        // 12px <= min(track_center_match_px=80, 0.8*max_dim=16)) but trips the
        // known-reacquire clear check (center_dist 12 > 0.5*max_dim=10) should
        // clear identity rather than just drifting the held one.
        mgr.apply_detections(&[det(BBox::new(12, 0, 32, 20))], 0.1, &cfg);
        let track = mgr.get(id).unwrap();
        assert!(!track.is_known());
        assert!(track.force_recognition_until_ts > 0.1);
    }

    #[test]
    fn stale_track_is_pruned_after_too_many_detector_misses() {
        let mut mgr: TrackerManager = TrackerManager::new();
        let cfg = cfg();
        mgr.apply_detections(&[det(BBox::new(0, 0, 20, 20))], 0.0, &cfg);
        for i in 1..=(cfg.track_max_det_misses_unknown + 1) {
            mgr.apply_detections(&[], i as f64, &cfg);
        }
        assert!(mgr.is_empty());
    }
}
