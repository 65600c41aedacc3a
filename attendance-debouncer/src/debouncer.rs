use std::collections::HashMap;

use attendance_config::{DebounceConfig, RecognizerConfig};
use attendance_scheduler::SchedulerEvent;
use attendance_types::jobs::AttendanceWriteJob;
use attendance_types::stream::StreamType;
use attendance_types::track::{Identity, Track, TrackId, Verification};
use attendance_types::{CameraId, CompanyId, EmployeeId};

/// Per-tick inputs the debouncer needs but that aren't stored on the track
/// itself: the external wall-clock stamp for any emitted job, the active
/// viewer stream type, and the precomputed frame-quality score
/// ([`crate::quality::compute_quality`]).
pub struct DebounceContext<'a> {
    pub camera_id: &'a CameraId,
    pub camera_name: &'a str,
    pub company_id: Option<&'a CompanyId>,
    pub now: f64,
    pub timestamp_iso: &'a str,
    pub stream_type: StreamType,
    pub quality: f32,
    pub burst_seconds: f64,
    pub debounce_cfg: &'a DebounceConfig,
    pub recognizer_cfg: &'a RecognizerConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DebounceDecision {
    NoIdentity,
    GateRejected(&'static str),
    WithinDebounceWindow,
    VerificationStarted,
    VerificationPending,
    VerificationTimedOut,
    VerificationRejected,
    Marked(AttendanceWriteJob),
}

type MarkKey = (Option<CompanyId>, EmployeeId);

/// Turns per-track identity observations into at most one attendance job per
/// `(company, employee)` per `attendance_debounce_seconds`, with optional
/// multi-sample verification. See `SPEC_FULL.md` §4.7.
#[derive(Default)]
pub struct Debouncer {
    last_marked: HashMap<MarkKey, f64>,
    last_sampled_embed_ts: HashMap<TrackId, f64>,
}

impl Debouncer {
    pub fn new() -> Self {
        Debouncer {
            last_marked: HashMap::new(),
            last_sampled_embed_ts: HashMap::new(),
        }
    }

    /// Stamps `last_marked[key] = now` so downstream async writers cannot
    /// create duplicate jobs while their write is still in flight. Call this
    /// once a job from [`Self::process`] has actually been enqueued.
    pub fn mark_enqueued(&mut self, company_id: Option<&CompanyId>, employee_id: &EmployeeId, now: f64) {
        self.last_marked
            .insert((company_id.cloned(), employee_id.clone()), now);
    }

    pub fn process(&mut self, track: &mut Track, ctx: &DebounceContext) -> (DebounceDecision, Vec<SchedulerEvent>) {
        let mut events = Vec::new();

        let snapshot = match &track.identity {
            Identity::Unknown { .. } => {
                self.last_sampled_embed_ts.remove(&track.id);
                return (DebounceDecision::NoIdentity, events);
            }
            Identity::Known {
                person_id,
                name,
                similarity,
                stable_id_hits,
                last_identity_change_ts,
                verification,
                ..
            } => (
                person_id.clone(),
                name.clone(),
                *similarity,
                *stable_id_hits,
                *last_identity_change_ts,
                verification.is_some(),
            ),
        };
        let (person_id, name, similarity, stable_id_hits, last_identity_change_ts, has_verification) =
            snapshot;

        if has_verification {
            let decision = self.step_verification(track, ctx, &mut events);
            return (decision, events);
        }

        let required_similarity = ctx
            .recognizer_cfg
            .similarity_threshold
            .max(ctx.recognizer_cfg.strict_similarity_threshold);
        let identity_age = ctx.now - last_identity_change_ts;
        let embed_age = ctx.now - track.last_embed_ts;

        let gate_ok = stable_id_hits >= ctx.debounce_cfg.stable_id_confirmations
            && similarity >= required_similarity
            && identity_age >= ctx.debounce_cfg.attendance_min_identity_age_seconds
            && embed_age <= ctx.debounce_cfg.attendance_max_embed_age_seconds
            && ctx.quality >= ctx.recognizer_cfg.min_att_quality;
        if !gate_ok {
            tracing::debug!(target: "debouncer", track = ?track.id, employee = %person_id, "gate rejected, unstable or stale");
            return (DebounceDecision::GateRejected("unstable_or_stale"), events);
        }

        let key = (ctx.company_id.cloned(), person_id.clone());
        if let Some(&last) = self.last_marked.get(&key) {
            if ctx.now - last < ctx.debounce_cfg.attendance_debounce_seconds {
                self.last_marked.insert(key, ctx.now);
                return (DebounceDecision::WithinDebounceWindow, events);
            }
        }

        if ctx.debounce_cfg.verification_fast_path && ctx.debounce_cfg.verification_samples <= 1 {
            let job = self.build_job(&person_id, &name, similarity, ctx);
            return (DebounceDecision::Marked(job), events);
        }

        if let Identity::Known { verification, .. } = &mut track.identity {
            let mut samples = Vec::new();
            if embed_age <= ctx.debounce_cfg.attendance_max_embed_age_seconds {
                samples.push((person_id.clone(), similarity));
                self.last_sampled_embed_ts.insert(track.id, track.last_embed_ts);
            }
            *verification = Some(Verification {
                target_id: person_id,
                samples,
                started_ts: ctx.now,
            });
        }
        events.push(SchedulerEvent::Verify);
        (DebounceDecision::VerificationStarted, events)
    }

    fn step_verification(
        &mut self,
        track: &mut Track,
        ctx: &DebounceContext,
        events: &mut Vec<SchedulerEvent>,
    ) -> DebounceDecision {
        let (target_id, started_ts, current_person_id, current_similarity, current_name) =
            match &track.identity {
                Identity::Known {
                    verification: Some(v),
                    person_id,
                    similarity,
                    name,
                    ..
                } => (
                    v.target_id.clone(),
                    v.started_ts,
                    person_id.clone(),
                    *similarity,
                    name.clone(),
                ),
                _ => return DebounceDecision::NoIdentity,
            };

        if ctx.now > started_ts + ctx.burst_seconds + 2.0 {
            if let Identity::Known { verification, .. } = &mut track.identity {
                *verification = None;
            }
            self.last_sampled_embed_ts.remove(&track.id);
            return DebounceDecision::VerificationTimedOut;
        }

        let last_sampled = self
            .last_sampled_embed_ts
            .get(&track.id)
            .copied()
            .unwrap_or(f64::NEG_INFINITY);
        if track.last_embed_ts > last_sampled {
            self.last_sampled_embed_ts.insert(track.id, track.last_embed_ts);
            if let Identity::Known {
                verification: Some(v),
                ..
            } = &mut track.identity
            {
                v.samples.push((current_person_id, current_similarity));
            }
        }

        let n_collected = match &track.identity {
            Identity::Known {
                verification: Some(v),
                ..
            } => v.samples.len(),
            _ => 0,
        };
        if n_collected < ctx.debounce_cfg.verification_samples as usize {
            events.push(SchedulerEvent::Verify);
            return DebounceDecision::VerificationPending;
        }

        let (votes, avg) = match &track.identity {
            Identity::Known {
                verification: Some(v),
                ..
            } => {
                let target_scores: Vec<f32> = v
                    .samples
                    .iter()
                    .filter(|(id, _)| *id == v.target_id)
                    .map(|(_, score)| *score)
                    .collect();
                let votes = target_scores.len();
                let avg = if target_scores.is_empty() {
                    0.0
                } else {
                    target_scores.iter().sum::<f32>() / target_scores.len() as f32
                };
                (votes, avg)
            }
            _ => (0, 0.0),
        };
        let accept = votes >= n_collected / 2 + 1
            && avg >= ctx.recognizer_cfg.similarity_threshold + ctx.recognizer_cfg.borderline_margin;

        if let Identity::Known { verification, .. } = &mut track.identity {
            *verification = None;
        }
        self.last_sampled_embed_ts.remove(&track.id);

        if accept {
            tracing::debug!(target: "debouncer", track = ?track.id, employee = %target_id, votes, "verification accepted");
            DebounceDecision::Marked(self.build_job(&target_id, &current_name, avg, ctx))
        } else {
            tracing::debug!(target: "debouncer", track = ?track.id, employee = %target_id, votes, "verification rejected");
            DebounceDecision::VerificationRejected
        }
    }

    fn build_job(
        &self,
        employee_id: &EmployeeId,
        name: &str,
        similarity: f32,
        ctx: &DebounceContext,
    ) -> AttendanceWriteJob {
        AttendanceWriteJob {
            company_id: ctx.company_id.cloned(),
            camera_id: ctx.camera_id.clone(),
            camera_name: ctx.camera_name.to_string(),
            employee_id: employee_id.clone(),
            name: name.to_string(),
            similarity,
            timestamp_iso: ctx.timestamp_iso.to_string(),
            event_type: ctx.stream_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attendance_types::geometry::BBox;
    use attendance_types::track::TrackArena;

    fn debounce_cfg() -> DebounceConfig {
        DebounceConfig {
            attendance_debounce_seconds: 9.0,
            stable_id_confirmations: 3,
            attendance_min_identity_age_seconds: 1.0,
            attendance_max_embed_age_seconds: 2.0,
            verification_samples: 3,
            verification_fast_path: true,
        }
    }

    fn recognizer_cfg() -> RecognizerConfig {
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
            min_att_quality: 0.0,
            flip_confirm_hits: 2,
        }
    }

    fn known_track(now: f64, stable_id_hits: u32) -> (TrackArena, TrackId) {
        let mut arena = TrackArena::new();
        let id = arena.insert(BBox::new(0, 0, 100, 100), 0.0);
        let track = arena.get_mut(id).unwrap();
        track.last_embed_ts = now;
        track.identity = Identity::Known {
            person_id: EmployeeId::new("42"),
            name: "Asif".into(),
            similarity: 0.80,
            stable_id_hits,
            last_known_ts: now,
            last_known_bbox: track.bbox,
            last_identity_change_ts: 0.0,
            verification: None,
        };
        (arena, id)
    }

    fn ctx<'a>(
        camera_id: &'a CameraId,
        debounce_cfg: &'a DebounceConfig,
        recognizer_cfg: &'a RecognizerConfig,
        now: f64,
    ) -> DebounceContext<'a> {
        DebounceContext {
            camera_id,
            camera_name: "lobby",
            company_id: None,
            now,
            timestamp_iso: "2026-07-30T00:00:00Z",
            stream_type: StreamType::Attendance,
            quality: 1.0,
            burst_seconds: 8.0,
            debounce_cfg,
            recognizer_cfg,
        }
    }

    #[test]
    fn no_identity_yields_no_identity_decision() {
        let mut arena = TrackArena::new();
        let id = arena.insert(BBox::new(0, 0, 10, 10), 0.0);
        let track = arena.get_mut(id).unwrap();
        let camera = CameraId::new("cam-1");
        let dcfg = debounce_cfg();
        let rcfg = recognizer_cfg();
        let c = ctx(&camera, &dcfg, &rcfg, 2.0);
        let mut debouncer = Debouncer::new();
        let (decision, _) = debouncer.process(track, &c);
        assert_eq!(decision, DebounceDecision::NoIdentity);
    }

    #[test]
    fn fast_path_marks_immediately_then_extends_window_on_repeat() {
        let (mut arena, id) = known_track(2.0, 3);
        let track = arena.get_mut(id).unwrap();
        let camera = CameraId::new("cam-1");
        let mut dcfg = debounce_cfg();
        dcfg.verification_samples = 1;
        let rcfg = recognizer_cfg();
        let c = ctx(&camera, &dcfg, &rcfg, 2.0);
        let mut debouncer = Debouncer::new();

        let (decision, _) = debouncer.process(track, &c);
        assert!(matches!(decision, DebounceDecision::Marked(_)));
        debouncer.mark_enqueued(None, &EmployeeId::new("42"), 2.0);

        track.last_embed_ts = 5.0;
        let c2 = ctx(&camera, &dcfg, &rcfg, 5.0);
        let (decision2, _) = debouncer.process(track, &c2);
        assert_eq!(decision2, DebounceDecision::WithinDebounceWindow);
    }

    #[test]
    fn below_confirmation_threshold_is_gate_rejected() {
        let (mut arena, id) = known_track(2.0, 1);
        let track = arena.get_mut(id).unwrap();
        let camera = CameraId::new("cam-1");
        let dcfg = debounce_cfg();
        let rcfg = recognizer_cfg();
        let c = ctx(&camera, &dcfg, &rcfg, 2.0);
        let mut debouncer = Debouncer::new();
        let (decision, _) = debouncer.process(track, &c);
        assert!(matches!(decision, DebounceDecision::GateRejected(_)));
    }

    #[test]
    fn verification_accepts_after_enough_matching_samples() {
        let (mut arena, id) = known_track(2.0, 3);
        let track = arena.get_mut(id).unwrap();
        let camera = CameraId::new("cam-1");
        let dcfg = debounce_cfg();
        let rcfg = recognizer_cfg();
        let mut debouncer = Debouncer::new();

        let c = ctx(&camera, &dcfg, &rcfg, 2.0);
        let (decision, events) = debouncer.process(track, &c);
        assert_eq!(decision, DebounceDecision::VerificationStarted);
        assert!(events.contains(&SchedulerEvent::Verify));

        track.last_embed_ts = 2.2;
        let c = ctx(&camera, &dcfg, &rcfg, 2.2);
        let (decision, _) = debouncer.process(track, &c);
        assert_eq!(decision, DebounceDecision::VerificationPending);

        track.last_embed_ts = 2.4;
        let c = ctx(&camera, &dcfg, &rcfg, 2.4);
        let (decision, _) = debouncer.process(track, &c);
        assert!(matches!(decision, DebounceDecision::Marked(_)));
    }

    #[test]
    fn verification_times_out_and_resets() {
        let (mut arena, id) = known_track(2.0, 3);
        let track = arena.get_mut(id).unwrap();
        let camera = CameraId::new("cam-1");
        let dcfg = debounce_cfg();
        let rcfg = recognizer_cfg();
        let mut debouncer = Debouncer::new();

        let c = ctx(&camera, &dcfg, &rcfg, 2.0);
        debouncer.process(track, &c);

        let c = ctx(&camera, &dcfg, &rcfg, 20.0);
        let (decision, _) = debouncer.process(track, &c);
        assert_eq!(decision, DebounceDecision::VerificationTimedOut);
    }
}
