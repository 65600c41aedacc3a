//! Builds the shared [`Services`], one [`CameraPipeline`] per configured
//! camera, and the detector worker thread — the only internally-spawned
//! thread this crate owns, per the threading model in `SPEC_FULL.md` §5
//! (frame capture, the HTTP/WebSocket surface, and enrollment are external
//! collaborators, not threads this process starts).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use attendance_config::Config;
use attendance_gpu_arbiter::GpuArbiter;
use attendance_recognizer::{AntiSpoofGate, ConstantLiveness, GalleryCache};
use attendance_types::CameraId;
use attendance_writers::{DbWriter, ErpPushQueue, RelayNotifier, ViewerRegistry, VoiceLog};
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::face_model::{FaceDetector, FaceEmbedder, NullDetector, NullEmbedder};
use crate::frame::OwnedFrame;
use crate::gallery_client::HttpGalleryClient;
use crate::pipeline::{CameraPipeline, Services};

const DETECTOR_POLL_TIMEOUT: Duration = Duration::from_millis(250);

/// Logs, and drops, jobs the ERP queue could not deliver after retrying.
fn log_erp_failure(job: &attendance_types::jobs::ErpPushJob, err: &attendance_writers::Error) {
    warn!(target: "server::erp", emp = %job.emp_id, error = %err, "erp push exhausted retries");
}

/// Owns every long-lived service for one deployment: the shared inference
/// arbiter, the attendance writers, and one [`CameraPipeline`] per camera.
pub struct ServiceContainer {
    services: Arc<Services>,
    cameras: Mutex<HashMap<CameraId, CameraPipeline>>,
    embedder: Mutex<Box<dyn FaceEmbedder>>,
    detector_shutdown: Arc<AtomicBool>,
    detector_thread: Option<JoinHandle<()>>,
}

impl ServiceContainer {
    pub fn build(cfg: &Config, now: f64) -> anyhow::Result<Self> {
        let arbiter = Arc::new(GpuArbiter::<OwnedFrame>::new(cfg.gpu_arbiter.queue_size));
        let gallery_client: Arc<dyn attendance_recognizer::gallery_cache::BackendGalleryClient> =
            Arc::new(HttpGalleryClient::new(cfg.backend.clone()));
        let anti_spoof = Arc::new(AntiSpoofGate::new(Box::new(ConstantLiveness(1.0))));
        let db_writer = Arc::new(DbWriter::spawn(
            cfg.backend.clone(),
            cfg.writers.db_queue_size,
            cfg.writers.drain_timeout_s,
        ));
        let erp_queue = Arc::new(ErpPushQueue::spawn(
            cfg.erp.clone(),
            cfg.writers.erp_queue_size,
            cfg.writers.erp_max_retries,
            cfg.writers.erp_retry_sleep_s,
            Box::new(log_erp_failure),
        ));
        let voice_log = Arc::new(VoiceLog::new(cfg.writers.voice_max_events, HashMap::new()));
        let viewers = Arc::new(ViewerRegistry::new());
        let relay = RelayNotifier::new(cfg.relay.clone());

        let services = Arc::new(Services {
            arbiter: arbiter.clone(),
            gallery_cache: Arc::new(GalleryCache::new()),
            gallery_client,
            anti_spoof,
            db_writer,
            erp_queue,
            voice_log,
            viewers,
            relay,
        });

        let mut cameras = HashMap::new();
        for cam in &cfg.cameras {
            let camera_id = CameraId::new(cam.camera_id.clone());
            let company_id = cfg.company_for_camera(&camera_id);
            cameras.insert(
                camera_id.clone(),
                CameraPipeline::new(camera_id, cam.name.clone(), company_id, now, cfg),
            );
        }

        let detector_shutdown = Arc::new(AtomicBool::new(false));
        let detector_thread = spawn_detector_worker(
            arbiter,
            Box::new(NullDetector),
            cfg.ai_det_size,
            detector_shutdown.clone(),
        );

        Ok(ServiceContainer {
            services,
            cameras: Mutex::new(cameras),
            embedder: Mutex::new(Box::new(NullEmbedder)),
            detector_shutdown,
            detector_thread: Some(detector_thread),
        })
    }

    pub fn services(&self) -> &Arc<Services> {
        &self.services
    }

    /// Runs one frame through `camera_id`'s pipeline. Returns `false` if
    /// `camera_id` is not configured.
    pub fn process_frame(
        &self,
        camera_id: &CameraId,
        frame: &OwnedFrame,
        now: f64,
        timestamp_iso: &str,
        cfg: &Config,
    ) -> anyhow::Result<bool> {
        let mut cameras = self.cameras.lock();
        let Some(pipeline) = cameras.get_mut(camera_id) else {
            return Ok(false);
        };
        let mut embedder = self.embedder.lock();
        pipeline.process_frame(frame, now, timestamp_iso, cfg, &self.services, embedder.as_mut())?;
        Ok(true)
    }

    pub fn camera_ids(&self) -> Vec<CameraId> {
        self.cameras.lock().keys().cloned().collect()
    }

    /// Tears the deployment down in the order `SPEC_FULL.md` §5 mandates:
    /// enrollment and the HLS segmenter have nothing running here to stop;
    /// the detector worker (the only recognition-side thread) stops next;
    /// capture is external; attendance writers drain last, DB before ERP.
    pub fn shutdown(mut self) {
        self.detector_shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.detector_thread.take() {
            let _ = handle.join();
        }
        info!(target: "server::container", "detector worker stopped");

        match Arc::try_unwrap(self.services) {
            Ok(services) => {
                if let Ok(db_writer) = Arc::try_unwrap(services.db_writer) {
                    db_writer.shutdown();
                }
                drop(services.erp_queue);
                info!(target: "server::container", "attendance writers drained");
            }
            Err(_) => {
                warn!(
                    target: "server::container",
                    "services still referenced elsewhere at shutdown, writers left to drop lazily"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_and_shutdown_with_no_cameras() {
        let cfg = Config::default();
        let container = ServiceContainer::build(&cfg, 0.0).expect("build");
        assert!(container.camera_ids().is_empty());
        container.shutdown();
    }

    #[test]
    fn process_frame_reports_unconfigured_camera() {
        let cfg = Config::default();
        let container = ServiceContainer::build(&cfg, 0.0).expect("build");
        let frame = OwnedFrame::new(2, 2, vec![0, 0, 0, 0]);
        let handled = container
            .process_frame(&CameraId::new("missing"), &frame, 1.0, "2026-07-30T00:00:00Z", &cfg)
            .expect("process_frame should not error for an unconfigured camera");
        assert!(!handled);
        container.shutdown();
    }
}

fn spawn_detector_worker(
    arbiter: Arc<GpuArbiter<OwnedFrame>>,
    mut detector: Box<dyn FaceDetector>,
    det_size: u32,
    shutdown: Arc<AtomicBool>,
) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("attendance-detector".to_string())
        .spawn(move || {
            while !shutdown.load(Ordering::SeqCst) {
                let Some(pending) = arbiter.pop_pending_blocking(DETECTOR_POLL_TIMEOUT) else {
                    continue;
                };
                let detections = detector.detect(&pending.frame, det_size);
                arbiter.complete_processing(pending.camera_id, pending.ts, detections);
            }
        })
        .expect("failed to spawn detector worker thread")
}
