//! ERP push queue: a second bounded queue feeding a worker thread that
//! retries each job a fixed number of times with a fixed sleep between
//! attempts, then hands it to an `on_error` callback. Grounded directly on
//! `erp_push_queue.py`.

use std::thread::JoinHandle;
use std::time::Duration;

use attendance_config::ErpConfig;
use attendance_types::jobs::ErpPushJob;
use tracing::{debug, error, warn};

use crate::http_client::{block_on, post_json};

fn job_payload(job: &ErpPushJob) -> serde_json::Value {
    serde_json::json!({
        "emp_id": job.emp_id.as_str(),
        "attendance_date": job.attendance_date,
        "in_time": job.in_time,
        "in_location": job.in_location,
    })
}

/// Called with the job and the final error once all retries are exhausted.
pub type OnError = Box<dyn Fn(&ErpPushJob, &crate::error::Error) + Send + Sync>;

pub struct ErpPushQueue {
    sender: Option<channellib::Sender<ErpPushJob>>,
    handle: Option<JoinHandle<()>>,
}

impl ErpPushQueue {
    pub fn spawn(
        erp: ErpConfig,
        queue_size: usize,
        max_retries: u32,
        retry_sleep_s: f64,
        on_error: OnError,
    ) -> Self {
        let (sender, receiver) = channellib::bounded(queue_size);
        let handle = std::thread::Builder::new()
            .name("attendance-erp-push".to_string())
            .spawn(move || run(receiver, erp, max_retries, retry_sleep_s, on_error))
            .expect("failed to spawn erp push thread");
        ErpPushQueue {
            sender: Some(sender),
            handle: Some(handle),
        }
    }

    /// Non-blocking enqueue, dropping the job and logging if the queue is full.
    pub fn enqueue(&self, job: ErpPushJob) {
        let Some(sender) = &self.sender else {
            return;
        };
        if let Err(e) = sender.try_send(job) {
            if e.is_full() {
                warn!(target: "writers::erp", "erp push queue full, dropping job");
            } else {
                error!(target: "writers::erp", "erp push queue disconnected");
            }
        }
    }
}

impl Drop for ErpPushQueue {
    fn drop(&mut self) {
        // Drop the sender first so the worker's polling `recv_timeout` sees
        // disconnection and exits once the queue is drained.
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run(
    receiver: channellib::Receiver<ErpPushJob>,
    erp: ErpConfig,
    max_retries: u32,
    retry_sleep_s: f64,
    on_error: OnError,
) {
    let url = format!("{}/{}/manual-attendance", erp.base_url, erp.api_version);
    loop {
        match receiver.recv_timeout(Duration::from_millis(250)) {
            Ok(job) => push_with_retries(&url, &job, max_retries, retry_sleep_s, &on_error),
            Err(e) if e.is_timeout() => continue,
            Err(_disconnected) => break,
        }
    }
}

fn push_with_retries(
    url: &str,
    job: &ErpPushJob,
    max_retries: u32,
    retry_sleep_s: f64,
    on_error: &OnError,
) {
    let payload = job_payload(job);
    let mut last_err = None;
    for attempt in 0..=max_retries {
        match block_on(post_json(url, &payload)) {
            Ok(_) => {
                debug!(target: "writers::erp", emp = %job.emp_id, attempt, "pushed to erp");
                return;
            }
            Err(e) => {
                warn!(target: "writers::erp", emp = %job.emp_id, attempt, error = %e, "erp push failed");
                last_err = Some(e);
                if attempt < max_retries {
                    std::thread::sleep(Duration::from_secs_f64(retry_sleep_s.max(0.0)));
                }
            }
        }
    }
    if let Some(e) = last_err {
        on_error(job, &e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attendance_types::EmployeeId;

    #[test]
    fn job_payload_serializes_expected_fields() {
        let job = ErpPushJob {
            attendance_date: "01/01/2026".to_string(),
            emp_id: EmployeeId::new("e1"),
            in_time: "09:00:00".to_string(),
            in_location: "Front Door".to_string(),
        };
        let v = job_payload(&job);
        assert_eq!(v["emp_id"], "e1");
        assert_eq!(v["in_time"], "09:00:00");
    }
}
