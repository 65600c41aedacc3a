//! Per-camera viewer ref-counting by stream type. See `SPEC_FULL.md` §4.9.

use std::collections::HashMap;

use attendance_types::stream::StreamType;
use attendance_types::CameraId;
use parking_lot::Mutex;

#[derive(Default)]
struct Counts([u32; 3]);

impl Counts {
    fn idx(stream_type: StreamType) -> usize {
        match stream_type {
            StreamType::Attendance => 0,
            StreamType::Headcount => 1,
            StreamType::Ot => 2,
        }
    }

    fn iter(&self) -> impl Iterator<Item = (StreamType, u32)> + '_ {
        [StreamType::Attendance, StreamType::Headcount, StreamType::Ot]
            .into_iter()
            .map(move |st| (st, self.0[Self::idx(st)]))
    }
}

/// Tracks how many viewers are watching each `(camera, stream_type)` pair.
/// Attendance is enabled for a camera iff at least one viewer of any stream
/// type is present; the *active* stream type (used to tag write jobs) is
/// the highest-priority type with a nonzero count.
pub struct ViewerRegistry {
    counts: Mutex<HashMap<CameraId, Counts>>,
}

impl ViewerRegistry {
    pub fn new() -> Self {
        ViewerRegistry {
            counts: Mutex::new(HashMap::new()),
        }
    }

    pub fn add_viewer(&self, camera_id: &CameraId, stream_type: StreamType) {
        let mut counts = self.counts.lock();
        let entry = counts.entry(camera_id.clone()).or_default();
        entry.0[Counts::idx(stream_type)] += 1;
    }

    pub fn remove_viewer(&self, camera_id: &CameraId, stream_type: StreamType) {
        let mut counts = self.counts.lock();
        if let Some(entry) = counts.get_mut(camera_id) {
            let idx = Counts::idx(stream_type);
            entry.0[idx] = entry.0[idx].saturating_sub(1);
        }
    }

    pub fn is_attendance_enabled(&self, camera_id: &CameraId) -> bool {
        self.active_stream_type(camera_id).is_some()
    }

    pub fn active_stream_type(&self, camera_id: &CameraId) -> Option<StreamType> {
        let counts = self.counts.lock();
        counts
            .get(camera_id)
            .and_then(|entry| StreamType::active_of(entry.iter()))
    }
}

impl Default for ViewerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_viewers_disables_attendance() {
        let reg = ViewerRegistry::new();
        let cam = CameraId::new("cam-1");
        assert!(!reg.is_attendance_enabled(&cam));
    }

    #[test]
    fn highest_priority_active_type_wins() {
        let reg = ViewerRegistry::new();
        let cam = CameraId::new("cam-1");
        reg.add_viewer(&cam, StreamType::Ot);
        reg.add_viewer(&cam, StreamType::Headcount);
        assert_eq!(reg.active_stream_type(&cam), Some(StreamType::Headcount));
        reg.add_viewer(&cam, StreamType::Attendance);
        assert_eq!(reg.active_stream_type(&cam), Some(StreamType::Attendance));
    }

    #[test]
    fn removing_last_viewer_disables_attendance() {
        let reg = ViewerRegistry::new();
        let cam = CameraId::new("cam-1");
        reg.add_viewer(&cam, StreamType::Attendance);
        reg.remove_viewer(&cam, StreamType::Attendance);
        assert!(!reg.is_attendance_enabled(&cam));
    }
}
