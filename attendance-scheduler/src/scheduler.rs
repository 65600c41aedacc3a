use std::collections::VecDeque;

use attendance_config::SchedulerConfig;
use attendance_types::track::Track;

const REASON_RING_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Idle,
    Normal,
    Burst,
}

/// Events that force the scheduler into BURST mode (`SPEC_FULL.md` §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerEvent {
    NewTrack,
    Verify,
    Borderline,
    UnknownPersist,
    IdentityFlip,
    Enrollment,
}

impl SchedulerEvent {
    fn reason(&self) -> &'static str {
        match self {
            SchedulerEvent::NewTrack => "new_track",
            SchedulerEvent::Verify => "verify",
            SchedulerEvent::Borderline => "borderline",
            SchedulerEvent::UnknownPersist => "unknown_persist",
            SchedulerEvent::IdentityFlip => "identity_flip",
            SchedulerEvent::Enrollment => "enrollment",
        }
    }
}

/// Per-camera adaptive scheduler state. See `SPEC_FULL.md` §4.2.
pub struct Scheduler {
    mode: Mode,
    last_mode_change_ts: f64,
    last_activity_ts: f64,
    burst_until_ts: f64,
    last_detection_ts: f64,
    reasons: VecDeque<(f64, &'static str)>,
}

impl Scheduler {
    pub fn new(now: f64) -> Self {
        Scheduler {
            mode: Mode::Idle,
            last_mode_change_ts: now,
            last_activity_ts: now,
            burst_until_ts: f64::NEG_INFINITY,
            last_detection_ts: f64::NEG_INFINITY,
            reasons: VecDeque::with_capacity(REASON_RING_CAPACITY),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn recent_reasons(&self) -> impl Iterator<Item = &(f64, &'static str)> {
        self.reasons.iter()
    }

    /// Forces BURST until at least `now + burst_seconds`, extending any
    /// existing burst window rather than shortening it.
    pub fn force_burst(&mut self, now: f64, cfg: &SchedulerConfig, event: SchedulerEvent) {
        self.burst_until_ts = self.burst_until_ts.max(now + cfg.burst_seconds);
        if self.reasons.len() == REASON_RING_CAPACITY {
            self.reasons.pop_front();
        }
        self.reasons.push_back((now, event.reason()));
    }

    /// Advances the mode state machine. `events` are this tick's forcing
    /// events (may be empty).
    pub fn update(
        &mut self,
        now: f64,
        motion_active: bool,
        tracks_present: bool,
        events: &[SchedulerEvent],
        cfg: &SchedulerConfig,
    ) {
        for event in events {
            self.force_burst(now, cfg, *event);
        }

        let active = motion_active || tracks_present;
        if active {
            self.last_activity_ts = now;
        }

        let new_mode = if now < self.burst_until_ts {
            Mode::Burst
        } else {
            let desired = if active { Mode::Normal } else { Mode::Idle };
            if desired == Mode::Idle && now - self.last_activity_ts < cfg.idle_seconds {
                Mode::Normal
            } else {
                desired
            }
        };

        if new_mode != self.mode {
            tracing::debug!(target: "scheduler", from = ?self.mode, to = ?new_mode, "mode transition");
            self.mode = new_mode;
            self.last_mode_change_ts = now;
        }
    }

    fn target_fps(&self, cfg: &SchedulerConfig) -> f64 {
        match self.mode {
            Mode::Idle => cfg.detection_fps_idle,
            Mode::Normal => cfg.detection_fps_normal,
            Mode::Burst => cfg.detection_fps_burst,
        }
    }

    /// Whether detection should run this tick; advances `last_detection_ts`
    /// when it returns `true`.
    pub fn should_run_detection(&mut self, now: f64, cfg: &SchedulerConfig) -> bool {
        let fps = self.target_fps(cfg);
        if fps <= 0.0 {
            return false;
        }
        let period = 1.0 / fps;
        if now - self.last_detection_ts >= period {
            self.last_detection_ts = now;
            true
        } else {
            false
        }
    }

    /// Whether a per-track recognition pass should run this tick.
    pub fn should_run_recognition(&self, track: &Track, now: f64, cfg: &SchedulerConfig) -> bool {
        let forced = now < track.force_recognition_until_ts;
        if forced {
            let period = (1.0 / cfg.detection_fps_burst.max(f64::MIN_POSITIVE)).max(0.05);
            return now - track.last_embed_ts >= period;
        }
        if self.mode == Mode::Idle {
            return false;
        }
        let refresh = if track.is_known() {
            cfg.embed_refresh_seconds
        } else {
            cfg.embed_refresh_seconds_unknown
        };
        now - track.last_embed_ts >= refresh
    }

    pub fn last_mode_change_ts(&self) -> f64 {
        self.last_mode_change_ts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attendance_types::geometry::BBox;
    use attendance_types::track::TrackArena;

    fn cfg() -> SchedulerConfig {
        SchedulerConfig {
            detection_fps_idle: 0.0,
            detection_fps_normal: 2.0,
            detection_fps_burst: 10.0,
            burst_seconds: 5.0,
            idle_seconds: 3.0,
            embed_refresh_seconds: 1.0,
            embed_refresh_seconds_unknown: 0.25,
        }
    }

    #[test]
    fn starts_idle_and_moves_to_normal_when_active() {
        let cfg = cfg();
        let mut s = Scheduler::new(0.0);
        assert_eq!(s.mode(), Mode::Idle);
        s.update(1.0, true, false, &[], &cfg);
        assert_eq!(s.mode(), Mode::Normal);
    }

    #[test]
    fn stays_normal_during_idle_grace_period_then_goes_idle() {
        let cfg = cfg();
        let mut s = Scheduler::new(0.0);
        s.update(1.0, true, false, &[], &cfg);
        s.update(2.0, false, false, &[], &cfg); // within idle_seconds of last activity
        assert_eq!(s.mode(), Mode::Normal);
        s.update(10.0, false, false, &[], &cfg);
        assert_eq!(s.mode(), Mode::Idle);
    }

    #[test]
    fn event_forces_burst_and_extends_window() {
        let cfg = cfg();
        let mut s = Scheduler::new(0.0);
        s.update(0.0, false, false, &[SchedulerEvent::IdentityFlip], &cfg);
        assert_eq!(s.mode(), Mode::Burst);
        assert_eq!(s.recent_reasons().count(), 1);
        s.update(1.0, false, false, &[], &cfg);
        assert_eq!(s.mode(), Mode::Burst); // still within burst_until_ts
    }

    #[test]
    fn idle_mode_disables_detection_entirely() {
        let cfg = cfg();
        let mut s = Scheduler::new(0.0);
        assert!(!s.should_run_detection(100.0, &cfg));
    }

    #[test]
    fn detection_respects_cadence_for_mode() {
        let cfg = cfg();
        let mut s = Scheduler::new(0.0);
        s.update(0.0, true, false, &[], &cfg); // -> Normal, 2fps => period 0.5s
        assert!(s.should_run_detection(0.0, &cfg));
        assert!(!s.should_run_detection(0.2, &cfg));
        assert!(s.should_run_detection(0.5, &cfg));
    }

    #[test]
    fn recognition_disabled_in_idle_unless_forced() {
        let cfg = cfg();
        let s = Scheduler::new(0.0);
        let mut arena = TrackArena::new();
        let id = arena.insert(BBox::new(0, 0, 10, 10), 0.0);
        let track = arena.get(id).unwrap();
        assert!(!s.should_run_recognition(track, 10.0, &cfg));
    }

    #[test]
    fn forced_recognition_uses_fast_cadence() {
        let cfg = cfg();
        let s = Scheduler::new(0.0);
        let mut arena = TrackArena::new();
        let id = arena.insert(BBox::new(0, 0, 10, 10), 0.0);
        let track = arena.get_mut(id).unwrap();
        track.force_recognition_until_ts = 5.0;
        track.last_embed_ts = 0.0;
        let track = arena.get(id).unwrap();
        assert!(s.should_run_recognition(track, 1.0, &cfg));
    }
}
