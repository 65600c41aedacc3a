use attendance_config::RecognizerConfig;
use attendance_scheduler::SchedulerEvent;
use attendance_types::gallery::GalleryMatrix;
use attendance_types::track::{Identity, Track};

/// Whether the track's currently-held identity should survive a missing or
/// below-threshold embedding this tick (`SPEC_FULL.md` §4.5 step 1).
fn identity_hold_ok(track: &Track, now: f64, cfg: &RecognizerConfig) -> bool {
    match &track.identity {
        Identity::Known {
            last_known_ts,
            last_known_bbox,
            ..
        } => {
            let det_age = now - track.last_det_ts;
            let center_shift = track.bbox.center_distance(last_known_bbox);
            let max_dim = track.bbox.max_dim().max(last_known_bbox.max_dim());
            now - last_known_ts <= cfg.identity_hold_seconds
                && track.det_misses <= cfg.identity_hold_max_det_misses
                && det_age <= cfg.identity_hold_seconds.min(1.25)
                && track.bbox.iou(last_known_bbox) >= cfg.identity_hold_min_iou
                && center_shift <= cfg.identity_hold_max_center_shift_ratio * max_dim
        }
        Identity::Unknown { .. } => false,
    }
}

fn demote_to_unknown(track: &mut Track, now: f64) {
    if track.is_known() {
        tracing::debug!(target: "recognizer", track = ?track.id, "demoting known identity to unknown");
    }
    let unknown_since_ts = match track.identity {
        Identity::Unknown { unknown_since_ts } if unknown_since_ts != 0.0 => unknown_since_ts,
        _ => now,
    };
    track.identity = Identity::Unknown { unknown_since_ts };
}

fn below_threshold(track: &mut Track, now: f64, hold_ok: bool, cfg: &RecognizerConfig, events: &mut Vec<SchedulerEvent>) {
    if track.is_known() && hold_ok {
        return;
    }
    demote_to_unknown(track, now);
    if let Identity::Unknown { unknown_since_ts } = track.identity {
        if now - unknown_since_ts >= cfg.unknown_burst_after_seconds {
            events.push(SchedulerEvent::UnknownPersist);
        }
    }
}

/// Effective keypoints to hand the embedder: `None` if the detector's
/// keypoints are older than `kps_max_age_seconds`.
pub fn effective_kps_age_ok(track: &Track, now: f64, cfg: &RecognizerConfig) -> bool {
    now - track.last_det_ts <= cfg.kps_max_age_seconds
}

/// Runs one recognition decision for `track` given a (possibly absent)
/// embedding already computed by the caller's embedder collaborator.
/// Mutates `track.identity`/`last_embed_ts`/`force_recognition_until_ts` in
/// place and returns any scheduler events this tick should force a burst
/// for. See `SPEC_FULL.md` §4.5.
pub fn recognize_track(
    track: &mut Track,
    gallery: &GalleryMatrix,
    embedding: Option<Vec<f32>>,
    now: f64,
    cfg: &RecognizerConfig,
) -> Vec<SchedulerEvent> {
    let mut events = Vec::new();
    let hold_ok = identity_hold_ok(track, now, cfg);
    track.last_embed_ts = now;

    let Some(embedding) = embedding else {
        if track.is_known() && hold_ok {
            track.force_recognition_until_ts = track.force_recognition_until_ts.max(now + 0.5);
        } else {
            demote_to_unknown(track, now);
        }
        return events;
    };

    let current_person = track.identity.person_id().cloned();
    let stably_known = track.is_known();

    let accepted = gallery.best_match(&embedding).filter(|m| {
        m.score - m.best_other_score >= cfg.distinct_sim_margin
    });

    let Some(m) = accepted else {
        below_threshold(track, now, hold_ok, cfg, &mut events);
        return events;
    };

    if (m.score - cfg.similarity_threshold).abs() <= cfg.borderline_margin && !stably_known {
        events.push(SchedulerEvent::Borderline);
        track.force_recognition_until_ts = track.force_recognition_until_ts.max(now + 1.0);
    }

    let is_flip_or_new = current_person.as_ref() != Some(&m.employee_id);
    let effective_threshold = if is_flip_or_new {
        cfg.strict_similarity_threshold
    } else {
        cfg.similarity_threshold
    };

    if m.score < effective_threshold {
        below_threshold(track, now, hold_ok, cfg, &mut events);
        track.flip_candidate = None;
        return events;
    }

    // A flip away from an already-`Known` identity needs repeated evidence,
    // not one anomalous tick: clearing `strict_similarity_threshold` once
    // just forces a burst so the next few ticks get a fresh look.
    if is_flip_or_new && current_person.is_some() {
        let hits = match &track.flip_candidate {
            Some((candidate, hits)) if *candidate == m.employee_id => *hits + 1,
            _ => 1,
        };
        tracing::debug!(
            target: "recognizer",
            track = ?track.id,
            from = ?current_person,
            to = %m.employee_id,
            hits,
            required = cfg.flip_confirm_hits,
            "competing identity cleared strict threshold"
        );
        events.push(SchedulerEvent::IdentityFlip);
        if hits < cfg.flip_confirm_hits {
            track.flip_candidate = Some((m.employee_id, hits));
            return events;
        }
        tracing::debug!(target: "recognizer", track = ?track.id, to = %m.employee_id, "flip confirmed, adopting identity");
    }
    track.flip_candidate = None;

    let prior_change_ts = match &track.identity {
        Identity::Known {
            last_identity_change_ts,
            ..
        } => Some(*last_identity_change_ts),
        Identity::Unknown { .. } => None,
    };
    let stable_id_hits = if !is_flip_or_new {
        track.identity.stable_id_hits() + 1
    } else {
        1
    };
    track.identity = Identity::Known {
        person_id: m.employee_id,
        name: m.employee_name,
        similarity: m.score,
        stable_id_hits,
        last_known_ts: now,
        last_known_bbox: track.bbox,
        last_identity_change_ts: if is_flip_or_new {
            now
        } else {
            prior_change_ts.unwrap_or(now)
        },
        verification: None,
    };
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use attendance_types::geometry::BBox;
    use attendance_types::track::TrackArena;
    use attendance_types::{gallery::GalleryEntry, EmployeeId};

    fn cfg() -> RecognizerConfig {
        RecognizerConfig {
            similarity_threshold: 0.35,
            strict_similarity_threshold: 0.50,
            borderline_margin: 0.05,
            distinct_sim_margin: 0.08,
            identity_hold_seconds: 2.0,
            identity_hold_max_det_misses: 3,
            identity_hold_min_iou: 0.3,
            identity_hold_max_center_shift_ratio: 0.5,
            kps_max_age_seconds: 0.5,
            unknown_burst_after_seconds: 3.0,
            gallery_refresh_seconds: 300.0,
            min_att_quality: 0.4,
            flip_confirm_hits: 2,
        }
    }

    fn gallery() -> GalleryMatrix {
        GalleryMatrix::from_entries(vec![
            GalleryEntry {
                employee_id: EmployeeId::new("42"),
                employee_name: "Asif".into(),
                angle: "front".into(),
                embedding: vec![1.0, 0.0],
            },
            GalleryEntry {
                employee_id: EmployeeId::new("7"),
                employee_name: "Bilal".into(),
                angle: "front".into(),
                embedding: vec![0.0, 1.0],
            },
        ])
    }

    fn fresh_track() -> (TrackArena, attendance_types::track::TrackId) {
        let mut arena = TrackArena::new();
        let id = arena.insert(BBox::new(0, 0, 100, 100), 0.0);
        (arena, id)
    }

    #[test]
    fn strong_match_adopts_identity_with_stable_hits() {
        let (mut arena, id) = fresh_track();
        let cfg = cfg();
        let gallery = gallery();
        let track = arena.get_mut(id).unwrap();
        let events = recognize_track(track, &gallery, Some(vec![0.9, 0.1]), 0.0, &cfg);
        assert!(events.is_empty());
        assert_eq!(track.identity.person_id(), Some(&EmployeeId::new("42")));
        assert_eq!(track.identity.stable_id_hits(), 1);

        track.last_det_ts = 0.2;
        let events = recognize_track(track, &gallery, Some(vec![0.9, 0.1]), 0.2, &cfg);
        assert!(events.is_empty());
        assert_eq!(track.identity.stable_id_hits(), 2);
    }

    #[test]
    fn weak_match_without_hold_goes_unknown_and_eventually_bursts() {
        let (mut arena, id) = fresh_track();
        let cfg = cfg();
        let gallery = gallery();
        let track = arena.get_mut(id).unwrap();
        // score below similarity_threshold, no current identity to hold.
        // `now` starts at a small positive offset so it cannot collide with
        // the `unknown_since_ts == 0.0` "unset" sentinel.
        let events = recognize_track(track, &gallery, Some(vec![0.1, 0.05]), 0.5, &cfg);
        assert!(!track.is_known());
        assert!(events.is_empty()); // not yet past unknown_burst_after_seconds

        track.last_det_ts = 4.5;
        let events = recognize_track(track, &gallery, Some(vec![0.1, 0.05]), 4.5, &cfg);
        assert!(events.contains(&SchedulerEvent::UnknownPersist));
    }

    #[test]
    fn missing_embedding_holds_known_identity_briefly() {
        let (mut arena, id) = fresh_track();
        let cfg = cfg();
        let gallery = gallery();
        let track = arena.get_mut(id).unwrap();
        recognize_track(track, &gallery, Some(vec![0.9, 0.1]), 0.0, &cfg);
        track.last_det_ts = 0.1;
        let events = recognize_track(track, &gallery, None, 0.1, &cfg);
        assert!(events.is_empty());
        assert!(track.is_known());
    }

    #[test]
    fn single_competing_frame_does_not_flip_a_known_identity() {
        let (mut arena, id) = fresh_track();
        let cfg = cfg();
        let gallery = gallery();
        let track = arena.get_mut(id).unwrap();

        // Track settles on employee 42 at similarity 0.80.
        let events = recognize_track(track, &gallery, Some(vec![0.8, 0.0]), 0.0, &cfg);
        assert!(events.is_empty());
        assert_eq!(track.identity.person_id(), Some(&EmployeeId::new("42")));
        assert_eq!(track.identity.stable_id_hits(), 1);

        // A single tick scores 0.55 against employee 7 instead — clears
        // strict_similarity_threshold but must not flip or demote the track
        // on its own, and must not bump the stability counter.
        track.last_det_ts = 0.2;
        let events = recognize_track(track, &gallery, Some(vec![0.0, 0.55]), 0.2, &cfg);
        assert_eq!(track.identity.person_id(), Some(&EmployeeId::new("42")));
        assert_eq!(track.identity.stable_id_hits(), 1);
        assert!(events.contains(&SchedulerEvent::IdentityFlip));

        // A second consecutive competing tick for the same candidate is
        // sustained evidence: now the flip is adopted.
        track.last_det_ts = 0.4;
        let events = recognize_track(track, &gallery, Some(vec![0.0, 0.55]), 0.4, &cfg);
        assert_eq!(track.identity.person_id(), Some(&EmployeeId::new("7")));
        assert_eq!(track.identity.stable_id_hits(), 1);
        assert!(events.contains(&SchedulerEvent::IdentityFlip));
    }

    #[test]
    fn ambiguous_distinct_margin_is_treated_as_no_match() {
        let (mut arena, id) = fresh_track();
        let cfg = cfg();
        let gallery = gallery();
        let track = arena.get_mut(id).unwrap();
        // Equidistant from both entries: fails distinct_sim_margin.
        recognize_track(track, &gallery, Some(vec![0.6, 0.6]), 0.0, &cfg);
        assert!(!track.is_known());
    }
}
