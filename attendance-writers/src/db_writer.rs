//! Bounded-queue background writer that pushes completed attendance marks
//! to the backend's `create_attendance` endpoint. Grounded on
//! `erp_push_queue.py`'s bounded-queue-plus-worker-thread shape, generalized
//! to the DB write call (see `SPEC_FULL.md` §4.8).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use attendance_config::BackendConfig;
use attendance_types::jobs::AttendanceWriteJob;
use tracing::{debug, error, warn};

use crate::http_client::{block_on, post_json};

fn job_payload(job: &AttendanceWriteJob) -> serde_json::Value {
    serde_json::json!({
        "employee_id": job.employee_id.as_str(),
        "name": job.name,
        "timestamp": job.timestamp_iso,
        "camera_id": job.camera_id.as_str(),
        "camera_name": job.camera_name,
        "confidence": job.similarity,
        "event_type": job.event_type.as_str(),
        "company_id": job.company_id.as_ref().map(|c| c.as_str()),
    })
}

/// Owns the bounded job queue and the single background worker thread that
/// drains it into the backend.
pub struct DbWriter {
    sender: channellib::Sender<AttendanceWriteJob>,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl DbWriter {
    pub fn spawn(backend: BackendConfig, queue_size: usize, drain_timeout_s: f64) -> Self {
        let (sender, receiver) = channellib::bounded(queue_size);
        let shutdown = Arc::new(AtomicBool::new(false));
        let worker_shutdown = shutdown.clone();
        let handle = std::thread::Builder::new()
            .name("attendance-db-writer".to_string())
            .spawn(move || run(receiver, backend, drain_timeout_s, worker_shutdown))
            .expect("failed to spawn db writer thread");
        DbWriter {
            sender,
            shutdown,
            handle: Some(handle),
        }
    }

    /// Non-blocking enqueue. Drops and logs the job if the queue is full,
    /// matching the original service's `put_nowait` behavior.
    pub fn enqueue(&self, job: AttendanceWriteJob) {
        if let Err(e) = self.sender.try_send(job) {
            if e.is_full() {
                warn!(target: "writers::db", "db write queue full, dropping attendance mark");
            } else {
                error!(target: "writers::db", "db write queue disconnected");
            }
        }
    }

    /// Signals the worker to stop accepting new drains after
    /// `drain_timeout_s` and waits for it to exit.
    pub fn shutdown(mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run(
    receiver: channellib::Receiver<AttendanceWriteJob>,
    backend: BackendConfig,
    drain_timeout_s: f64,
    shutdown: Arc<AtomicBool>,
) {
    let url = format!("{}{}/attendance", backend.base_url, backend.api_prefix);
    loop {
        match receiver.recv_timeout(Duration::from_millis(250)) {
            Ok(job) => {
                let payload = job_payload(&job);
                if let Err(e) = block_on(post_json(&url, &payload)) {
                    error!(target: "writers::db", error = %e, "failed to write attendance mark");
                } else {
                    debug!(target: "writers::db", employee = %job.employee_id, "wrote attendance mark");
                }
            }
            Err(e) if e.is_timeout() => {
                if shutdown.load(Ordering::SeqCst) {
                    break;
                }
            }
            Err(_disconnected) => break,
        }
    }
    // Drain whatever is left, bounded by drain_timeout_s, then exit.
    let deadline = std::time::Instant::now() + Duration::from_secs_f64(drain_timeout_s.max(0.0));
    while std::time::Instant::now() < deadline {
        match receiver.try_recv() {
            Ok(job) => {
                let payload = job_payload(&job);
                if let Err(e) = block_on(post_json(&url, &payload)) {
                    error!(target: "writers::db", error = %e, "failed to drain attendance mark");
                }
            }
            Err(e) if e.is_empty() => break,
            Err(_disconnected) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attendance_types::{CameraId, CompanyId, EmployeeId};
    use attendance_types::stream::StreamType;

    #[test]
    fn job_payload_serializes_expected_fields() {
        let job = AttendanceWriteJob {
            company_id: Some(CompanyId::new("acme")),
            camera_id: CameraId::new("cam-1"),
            camera_name: "Front Door".to_string(),
            employee_id: EmployeeId::new("e1"),
            name: "Jane".to_string(),
            similarity: 0.9,
            timestamp_iso: "2026-01-01T00:00:00Z".to_string(),
            event_type: StreamType::Attendance,
        };
        let v = job_payload(&job);
        assert_eq!(v["employee_id"], "e1");
        assert_eq!(v["event_type"], "attendance");
        assert_eq!(v["company_id"], "acme");
    }
}
