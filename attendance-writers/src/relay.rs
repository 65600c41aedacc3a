//! Rate-limited fire-and-forget relay GET, used to pulse a physical
//! turnstile/door on a successful attendance mark. See `SPEC_FULL.md` §4.10.

use std::collections::HashMap;
use std::sync::Arc;

use attendance_config::RelayConfig;
use attendance_types::CameraId;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::http_client::{block_on, get};

pub struct RelayNotifier {
    url: Option<String>,
    min_interval_s: f64,
    last_fired: Mutex<HashMap<CameraId, f64>>,
}

impl RelayNotifier {
    pub fn new(cfg: RelayConfig) -> Arc<Self> {
        Arc::new(RelayNotifier {
            url: cfg.url,
            min_interval_s: cfg.relay_min_interval_s,
            last_fired: Mutex::new(HashMap::new()),
        })
    }

    /// Called once per successful attendance mark. Rate-limits per camera
    /// and never blocks the caller: the actual GET runs on a detached
    /// thread.
    pub fn notify(self: &Arc<Self>, camera_id: &CameraId, now: f64) {
        let Some(url) = self.url.clone() else {
            return;
        };
        {
            let mut last_fired = self.last_fired.lock();
            if let Some(&last) = last_fired.get(camera_id) {
                if now - last < self.min_interval_s {
                    return;
                }
            }
            last_fired.insert(camera_id.clone(), now);
        }
        let camera_id = camera_id.clone();
        std::thread::spawn(move || match block_on(get(&url)) {
            Ok(_) => debug!(target: "writers::relay", %camera_id, "relay pulsed"),
            Err(e) => warn!(target: "writers::relay", %camera_id, error = %e, "relay pulse failed"),
        });
    }
}
