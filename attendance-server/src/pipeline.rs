//! Per-camera wiring: motion gate → scheduler → GPU arbiter submission →
//! tracker fusion → recognizer → anti-spoof gate → debouncer → writers. This
//! is the "recognition worker" from `spec.md` §5, run once per incoming
//! frame rather than as a self-driven loop, since frame capture itself is an
//! external collaborator (`spec.md` §1).

use std::sync::Arc;

use attendance_config::Config;
use attendance_debouncer::{DebounceContext, DebounceDecision, Debouncer};
use attendance_gpu_arbiter::GpuArbiter;
use attendance_recognizer::gallery_cache::BackendGalleryClient;
use attendance_recognizer::{recognize_track, AntiSpoofGate, GalleryCache};
use attendance_scheduler::{Mode, MotionGate, Scheduler, SchedulerEvent};
use attendance_tracker::{IouTracker, TrackerManager};
use attendance_types::stream::StreamType;
use attendance_types::track::TrackId;
use attendance_types::{CameraId, CompanyId};
use attendance_writers::{DbWriter, ErpPushQueue, RelayNotifier, ViewerRegistry, VoiceLog};

use crate::face_model::FaceEmbedder;
use crate::frame::OwnedFrame;

/// Detection results older than this are dropped rather than fused into the
/// tracker, per the ordering guarantee in `spec.md` §5 ("consumers must skip
/// results whose age exceeds `max_detection_result_age_seconds`"). Not yet
/// promoted to a config knob.
const MAX_DETECTION_RESULT_AGE_SECONDS: f64 = 2.0;

/// Cross-camera shared state, built once by [`crate::container::ServiceContainer`].
pub struct Services {
    pub arbiter: Arc<GpuArbiter<OwnedFrame>>,
    pub gallery_cache: Arc<GalleryCache>,
    pub gallery_client: Arc<dyn BackendGalleryClient>,
    pub anti_spoof: Arc<AntiSpoofGate>,
    pub db_writer: Arc<DbWriter>,
    pub erp_queue: Arc<ErpPushQueue>,
    pub voice_log: Arc<VoiceLog>,
    pub viewers: Arc<ViewerRegistry>,
    pub relay: Arc<RelayNotifier>,
}

/// Per-camera mutable pipeline state: one instance per configured camera,
/// owned exclusively by that camera's recognition worker.
pub struct CameraPipeline {
    camera_id: CameraId,
    camera_name: String,
    company_id: Option<CompanyId>,
    motion: MotionGate,
    scheduler: Scheduler,
    tracker: TrackerManager<IouTracker>,
    debouncer: Debouncer,
    last_detection_seq: u64,
}

impl CameraPipeline {
    pub fn new(
        camera_id: CameraId,
        camera_name: String,
        company_id: Option<CompanyId>,
        now: f64,
        cfg: &Config,
    ) -> Self {
        CameraPipeline {
            camera_id,
            camera_name,
            company_id,
            motion: MotionGate::new(&cfg.motion),
            scheduler: Scheduler::new(now),
            tracker: TrackerManager::new(),
            debouncer: Debouncer::new(),
            last_detection_seq: 0,
        }
    }

    pub fn camera_id(&self) -> &CameraId {
        &self.camera_id
    }

    pub fn mode(&self) -> Mode {
        self.scheduler.mode()
    }

    /// Advances the pipeline by one frame. `now`/`timestamp_iso` are the
    /// caller's clock reading for this frame (never read internally), so
    /// scenario tests can drive the whole pipeline deterministically.
    pub fn process_frame(
        &mut self,
        frame: &OwnedFrame,
        now: f64,
        timestamp_iso: &str,
        cfg: &Config,
        services: &Services,
        embedder: &mut dyn FaceEmbedder,
    ) -> attendance_recognizer::Result<()> {
        let ignore_boxes: Vec<_> = self
            .tracker
            .tracks()
            .filter(|t| t.is_known())
            .map(|t| t.bbox)
            .collect();
        let motion = self
            .motion
            .update(frame, &ignore_boxes, now, &cfg.motion);

        self.scheduler
            .update(now, motion.active, !self.tracker.is_empty(), &[], &cfg.scheduler);

        if self.scheduler.should_run_detection(now, &cfg.scheduler) {
            services
                .arbiter
                .submit(self.camera_id.clone(), frame.clone(), now);
        }

        self.tracker.update(now, &cfg.tracker);

        if let Some(result) = services.arbiter.get_latest_result(&self.camera_id) {
            if result.seq > self.last_detection_seq
                && now - result.ts <= MAX_DETECTION_RESULT_AGE_SECONDS
            {
                self.last_detection_seq = result.seq;
                let new_ids = self.tracker.apply_detections(&result.detections, now, &cfg.tracker);
                if !new_ids.is_empty() {
                    self.scheduler
                        .force_burst(now, &cfg.scheduler, SchedulerEvent::NewTrack);
                }
            }
        }

        let gallery = services.gallery_cache.get(
            self.company_id.as_ref(),
            now,
            cfg.recognizer.gallery_refresh_seconds,
            services.gallery_client.as_ref(),
        )?;

        let due_for_recognition: Vec<TrackId> = self
            .tracker
            .tracks()
            .filter(|t| self.scheduler.should_run_recognition(t, now, &cfg.scheduler))
            .map(|t| t.id)
            .collect();

        for track_id in due_for_recognition {
            let fresh_embedding = {
                let track = match self.tracker.get(track_id) {
                    Some(t) => t,
                    None => continue,
                };
                if attendance_recognizer::effective_kps_age_ok(track, now, &cfg.recognizer) {
                    embedder.embed(frame, track.bbox)
                } else {
                    None
                }
            };

            let events = {
                let track = match self.tracker.get_mut(track_id) {
                    Some(t) => t,
                    None => continue,
                };
                recognize_track(track, &gallery, fresh_embedding.clone(), now, &cfg.recognizer)
            };
            for event in events {
                self.scheduler.force_burst(now, &cfg.scheduler, event);
            }

            self.maybe_mark_attendance(track_id, fresh_embedding, now, timestamp_iso, cfg, services);
        }

        Ok(())
    }

    fn maybe_mark_attendance(
        &mut self,
        track_id: TrackId,
        fresh_embedding: Option<Vec<f32>>,
        now: f64,
        timestamp_iso: &str,
        cfg: &Config,
        services: &Services,
    ) {
        if !services.viewers.is_attendance_enabled(&self.camera_id) {
            return;
        }
        let stream_type = services
            .viewers
            .active_stream_type(&self.camera_id)
            .unwrap_or(StreamType::Attendance);

        let employee_id = match self.tracker.get(track_id) {
            Some(t) => match t.identity.person_id() {
                Some(id) => id.clone(),
                None => return,
            },
            None => return,
        };

        if let Some(embedding) = &fresh_embedding {
            let (accepted, _reason) = services.anti_spoof.check(
                &self.camera_id,
                &employee_id,
                embedding,
                now,
                &cfg.anti_spoof,
            );
            if !accepted {
                return;
            }
        }

        let quality = {
            let track = match self.tracker.get(track_id) {
                Some(t) => t,
                None => return,
            };
            attendance_debouncer::compute_quality(
                &track.bbox,
                cfg.ai_det_size,
                cfg.ai_det_size,
                track.det_score,
                track.kps.is_some(),
            )
        };

        let decision = {
            let track = match self.tracker.get_mut(track_id) {
                Some(t) => t,
                None => return,
            };
            let ctx = DebounceContext {
                camera_id: &self.camera_id,
                camera_name: &self.camera_name,
                company_id: self.company_id.as_ref(),
                now,
                timestamp_iso,
                stream_type,
                quality,
                burst_seconds: cfg.scheduler.burst_seconds,
                debounce_cfg: &cfg.debounce,
                recognizer_cfg: &cfg.recognizer,
            };
            let (decision, events) = self.debouncer.process(track, &ctx);
            for event in events {
                self.scheduler.force_burst(now, &cfg.scheduler, event);
            }
            decision
        };

        if let DebounceDecision::Marked(job) = decision {
            self.debouncer
                .mark_enqueued(job.company_id.as_ref(), &job.employee_id, now);

            if job.event_type == StreamType::Attendance {
                services.erp_queue.enqueue(attendance_types::jobs::ErpPushJob {
                    attendance_date: erp_date(timestamp_iso),
                    emp_id: job.employee_id.clone(),
                    in_time: erp_time(timestamp_iso),
                    in_location: job.camera_name.clone(),
                });
            }
            services.voice_log.push(
                job.company_id.clone(),
                job.employee_id.clone(),
                job.name.clone(),
                job.camera_id.clone(),
                job.camera_name.clone(),
                timestamp_iso.to_string(),
            );
            services.relay.notify(&job.camera_id, now);
            services.db_writer.enqueue(job);
        }
    }
}

/// `timestamp_iso` is `YYYY-MM-DDTHH:MM:SSZ`; the ERP wants `dd/mm/yyyy`.
fn erp_date(timestamp_iso: &str) -> String {
    let date_part = timestamp_iso.split('T').next().unwrap_or(timestamp_iso);
    let mut parts = date_part.split('-');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(y), Some(m), Some(d)) => format!("{d}/{m}/{y}"),
        _ => date_part.to_string(),
    }
}

/// `timestamp_iso` is `YYYY-MM-DDTHH:MM:SSZ`; the ERP wants `HH:MM:SS`.
fn erp_time(timestamp_iso: &str) -> String {
    timestamp_iso
        .split('T')
        .nth(1)
        .map(|t| t.trim_end_matches('Z').to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn erp_date_reformats_iso_to_ddmmyyyy() {
        assert_eq!(erp_date("2026-07-30T09:15:00Z"), "30/07/2026");
    }

    #[test]
    fn erp_time_strips_trailing_z() {
        assert_eq!(erp_time("2026-07-30T09:15:00Z"), "09:15:00");
    }
}
