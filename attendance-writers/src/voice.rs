//! Per-company voice-event log with a condvar-backed long-poll reader. See
//! `SPEC_FULL.md` §4.8.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use attendance_types::voice::VoiceEvent;
use attendance_types::{CameraId, CompanyId, EmployeeId};
use parking_lot::{Condvar, Mutex};

const HONORIFIC_STOPWORDS: &[&str] = &[
    "mr", "mrs", "ms", "md", "dr", "allama", "mohammad", "s.m", "al",
];

/// Derives the spoken alias for a voice event: an exact-name override wins,
/// otherwise the first name token surviving honorific stopword stripping.
fn derive_alias(name: &str, overrides: &HashMap<String, String>) -> String {
    if let Some(alias) = overrides.get(name) {
        return alias.clone();
    }
    for tok in name.split_whitespace() {
        let cleaned: String = tok
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '.')
            .collect();
        if cleaned.is_empty() {
            continue;
        }
        if HONORIFIC_STOPWORDS.contains(&cleaned.to_ascii_lowercase().as_str()) {
            continue;
        }
        return cleaned;
    }
    name.trim().to_string()
}

struct CompanyLog {
    next_seq: u64,
    events: VecDeque<VoiceEvent>,
}

impl CompanyLog {
    fn new() -> Self {
        CompanyLog {
            next_seq: 1,
            events: VecDeque::new(),
        }
    }
}

/// Append-only, per-company voice-event log with a bounded retention
/// window and a condvar long-poll for readers.
pub struct VoiceLog {
    max_events: usize,
    overrides: HashMap<String, String>,
    logs: Mutex<HashMap<Option<CompanyId>, CompanyLog>>,
    condvar: Condvar,
}

impl VoiceLog {
    pub fn new(max_events: usize, overrides: HashMap<String, String>) -> Self {
        VoiceLog {
            max_events,
            overrides,
            logs: Mutex::new(HashMap::new()),
            condvar: Condvar::new(),
        }
    }

    /// Appends a new event for `company_id` and wakes any long-polling readers.
    pub fn push(
        &self,
        company_id: Option<CompanyId>,
        employee_id: EmployeeId,
        name: String,
        camera_id: CameraId,
        camera_name: String,
        at_iso: String,
    ) -> VoiceEvent {
        let text = format!("Thank you, {}.", derive_alias(&name, &self.overrides));
        let mut logs = self.logs.lock();
        let log = logs.entry(company_id.clone()).or_insert_with(CompanyLog::new);
        let seq = log.next_seq;
        log.next_seq += 1;
        let event = VoiceEvent {
            seq,
            text,
            employee_id,
            name,
            camera_id,
            camera_name,
            company_id,
            at_iso,
        };
        log.events.push_back(event.clone());
        if self.max_events > 0 {
            while log.events.len() > self.max_events {
                log.events.pop_front();
            }
        }
        drop(logs);
        self.condvar.notify_all();
        event
    }

    /// Long-polls for events after `after_seq`, waiting up to `wait` for new
    /// ones to arrive. Always returns, even with an empty result.
    pub fn get_voice_events(
        &self,
        company_id: Option<&CompanyId>,
        after_seq: u64,
        limit: usize,
        wait: Duration,
    ) -> (u64, Vec<VoiceEvent>) {
        let mut logs = self.logs.lock();
        let deadline = std::time::Instant::now() + wait;
        loop {
            let latest_seq = logs
                .get(&company_id.cloned())
                .map(|l| l.next_seq.saturating_sub(1))
                .unwrap_or(0);
            if latest_seq > after_seq || std::time::Instant::now() >= deadline {
                let events = logs
                    .get(&company_id.cloned())
                    .map(|l| {
                        l.events
                            .iter()
                            .filter(|e| e.seq > after_seq)
                            .take(limit.max(1))
                            .cloned()
                            .collect()
                    })
                    .unwrap_or_default();
                return (latest_seq, events);
            }
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            let timed_out = self.condvar.wait_for(&mut logs, remaining).timed_out();
            if timed_out {
                continue;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mk(name: &str) -> VoiceEvent {
        let log = VoiceLog::new(0, HashMap::new());
        log.push(
            None,
            EmployeeId::new("e1"),
            name.to_string(),
            CameraId::new("cam-1"),
            "Front".to_string(),
            "2026-01-01T00:00:00Z".to_string(),
        )
    }

    #[test]
    fn strips_honorific_and_picks_first_name() {
        assert_eq!(mk("Dr. Asif Khan").text, "Thank you, Asif.");
        assert_eq!(mk("Mohammad Ali").text, "Thank you, Ali.");
        assert_eq!(mk("Asif").text, "Thank you, Asif.");
    }

    #[test]
    fn override_map_wins_over_derivation() {
        let mut overrides = HashMap::new();
        overrides.insert("Dr. A.B. Siddiqui".to_string(), "Doctor Siddiqui".to_string());
        let log = VoiceLog::new(0, overrides);
        let event = log.push(
            None,
            EmployeeId::new("e2"),
            "Dr. A.B. Siddiqui".to_string(),
            CameraId::new("cam-1"),
            "Front".to_string(),
            "2026-01-01T00:00:00Z".to_string(),
        );
        assert_eq!(event.text, "Thank you, Doctor Siddiqui.");
    }

    #[test]
    fn seq_is_monotone_and_retention_trims_head() {
        let log = VoiceLog::new(2, HashMap::new());
        for i in 0..5 {
            log.push(
                None,
                EmployeeId::new("e1"),
                format!("Person{i}"),
                CameraId::new("cam-1"),
                "Front".to_string(),
                "2026-01-01T00:00:00Z".to_string(),
            );
        }
        let (latest, events) = log.get_voice_events(None, 0, 50, Duration::from_millis(1));
        assert_eq!(latest, 5);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].seq, 4);
        assert_eq!(events[1].seq, 5);
    }

    #[test]
    fn long_poll_returns_immediately_once_event_available() {
        use std::sync::Arc;
        let log = Arc::new(VoiceLog::new(0, HashMap::new()));
        let log2 = log.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            log2.push(
                None,
                EmployeeId::new("e1"),
                "Asif".to_string(),
                CameraId::new("cam-1"),
                "Front".to_string(),
                "2026-01-01T00:00:00Z".to_string(),
            );
        });
        let start = std::time::Instant::now();
        let (latest, events) = log.get_voice_events(None, 0, 50, Duration::from_millis(500));
        handle.join().unwrap();
        assert_eq!(latest, 1);
        assert_eq!(events.len(), 1);
        assert!(start.elapsed() < Duration::from_millis(400));
    }
}
