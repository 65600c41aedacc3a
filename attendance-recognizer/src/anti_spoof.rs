use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

use attendance_config::{AntiSpoofConfig, PoseCheckMode};
use attendance_types::{CameraId, EmployeeId};

/// The liveness scorer. Real deployments run an ONNX model behind this
/// trait; the core only ever calls through the trait object under a mutex,
/// per the model-call discipline in Design Notes §9.
pub trait LivenessModel: Send {
    /// A score in `[0, 1]`, higher is more likely to be a live face.
    fn score(&mut self, embedding: &[f32]) -> f32;
}

/// Deterministic test double: always returns the same score.
pub struct ConstantLiveness(pub f32);

impl LivenessModel for ConstantLiveness {
    fn score(&mut self, _embedding: &[f32]) -> f32 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpoofReason {
    Ok,
    NeedPoseChange,
    LowScore,
    SkippedLaptop,
    CooldownBypass,
}

impl SpoofReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpoofReason::Ok => "ok",
            SpoofReason::NeedPoseChange => "need_pose_change",
            SpoofReason::LowScore => "low_score",
            SpoofReason::SkippedLaptop => "skipped_laptop",
            SpoofReason::CooldownBypass => "cooldown_bypass",
        }
    }
}

struct PersonState {
    yaw_samples: VecDeque<(f64, f32)>,
    motion_samples: VecDeque<(f64, bool)>,
    passed_until_ts: f64,
}

impl PersonState {
    fn new() -> Self {
        PersonState {
            yaw_samples: VecDeque::new(),
            motion_samples: VecDeque::new(),
            passed_until_ts: f64::NEG_INFINITY,
        }
    }

    fn prune(&mut self, now: f64, window: f64) {
        while matches!(self.yaw_samples.front(), Some((ts, _)) if now - ts > window) {
            self.yaw_samples.pop_front();
        }
        while matches!(self.motion_samples.front(), Some((ts, _)) if now - ts > window) {
            self.motion_samples.pop_front();
        }
    }

    fn yaw_range(&self) -> f32 {
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for &(_, yaw) in &self.yaw_samples {
            min = min.min(yaw);
            max = max.max(yaw);
        }
        if max.is_finite() && min.is_finite() {
            max - min
        } else {
            0.0
        }
    }

    fn has_motion(&self) -> bool {
        self.motion_samples.iter().any(|(_, moved)| *moved)
    }
}

/// Per-(camera, person) anti-spoof state machine. See `SPEC_FULL.md` §4.6.
pub struct AntiSpoofGate {
    model: Mutex<Box<dyn LivenessModel>>,
    state: Mutex<HashMap<(CameraId, EmployeeId), PersonState>>,
}

impl AntiSpoofGate {
    pub fn new(model: Box<dyn LivenessModel>) -> Self {
        AntiSpoofGate {
            model: Mutex::new(model),
            state: Mutex::new(HashMap::new()),
        }
    }

    /// Records a pose/motion observation for `(camera_id, employee_id)` at
    /// `now`, ahead of a later [`Self::check`] call.
    pub fn observe(
        &self,
        camera_id: &CameraId,
        employee_id: &EmployeeId,
        yaw: Option<f32>,
        motion_active: bool,
        now: f64,
        cfg: &AntiSpoofConfig,
    ) {
        let mut state = self.state.lock();
        let entry = state
            .entry((camera_id.clone(), employee_id.clone()))
            .or_insert_with(PersonState::new);
        entry.prune(now, cfg.motion_window_sec);
        if let Some(yaw) = yaw {
            entry.yaw_samples.push_back((now, yaw));
        }
        entry.motion_samples.push_back((now, motion_active));
    }

    /// Evaluates the gate for `(camera_id, employee_id)` using `embedding`
    /// for the liveness model. Returns `(accepted, reason)`.
    pub fn check(
        &self,
        camera_id: &CameraId,
        employee_id: &EmployeeId,
        embedding: &[f32],
        now: f64,
        cfg: &AntiSpoofConfig,
    ) -> (bool, SpoofReason) {
        if cfg.bypass_laptop_sources && camera_id.is_laptop_source() {
            return (true, SpoofReason::SkippedLaptop);
        }

        let mut state = self.state.lock();
        let entry = state
            .entry((camera_id.clone(), employee_id.clone()))
            .or_insert_with(PersonState::new);
        entry.prune(now, cfg.motion_window_sec);

        if now < entry.passed_until_ts {
            return (true, SpoofReason::CooldownBypass);
        }

        let pose_ok = match cfg.pose_check_mode {
            PoseCheckMode::Yaw => entry.yaw_range() > cfg.min_yaw_range,
            PoseCheckMode::MotionPixels => entry.has_motion(),
        };
        if !pose_ok {
            return (false, SpoofReason::NeedPoseChange);
        }

        let score = self.model.lock().score(embedding);
        if score < cfg.fas_threshold {
            return (false, SpoofReason::LowScore);
        }

        entry.passed_until_ts = now + cfg.cooldown_sec;
        (true, SpoofReason::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> AntiSpoofConfig {
        AntiSpoofConfig {
            fas_threshold: 0.6,
            min_yaw_range: 10.0,
            motion_window_sec: 2.0,
            cooldown_sec: 30.0,
            bypass_laptop_sources: true,
            pose_check_mode: PoseCheckMode::Yaw,
        }
    }

    #[test]
    fn laptop_source_bypasses_gate() {
        let gate = AntiSpoofGate::new(Box::new(ConstantLiveness(0.0)));
        let (ok, reason) = gate.check(
            &CameraId::new("laptop-acme"),
            &EmployeeId::new("1"),
            &[0.1, 0.2],
            0.0,
            &cfg(),
        );
        assert!(ok);
        assert_eq!(reason, SpoofReason::SkippedLaptop);
    }

    #[test]
    fn rejects_without_enough_pose_change() {
        let gate = AntiSpoofGate::new(Box::new(ConstantLiveness(0.9)));
        let camera = CameraId::new("cam-1");
        let employee = EmployeeId::new("1");
        gate.observe(&camera, &employee, Some(0.0), true, 0.0, &cfg());
        let (ok, reason) = gate.check(&camera, &employee, &[0.1], 0.1, &cfg());
        assert!(!ok);
        assert_eq!(reason, SpoofReason::NeedPoseChange);
    }

    #[test]
    fn accepts_with_pose_change_and_high_score_then_cooldown_bypasses() {
        let gate = AntiSpoofGate::new(Box::new(ConstantLiveness(0.9)));
        let camera = CameraId::new("cam-1");
        let employee = EmployeeId::new("1");
        gate.observe(&camera, &employee, Some(-8.0), true, 0.0, &cfg());
        gate.observe(&camera, &employee, Some(8.0), true, 0.5, &cfg());
        let (ok, reason) = gate.check(&camera, &employee, &[0.1], 0.6, &cfg());
        assert!(ok);
        assert_eq!(reason, SpoofReason::Ok);

        let (ok, reason) = gate.check(&camera, &employee, &[0.1], 1.0, &cfg());
        assert!(ok);
        assert_eq!(reason, SpoofReason::CooldownBypass);
    }

    #[test]
    fn low_liveness_score_is_rejected_after_pose_check_passes() {
        let gate = AntiSpoofGate::new(Box::new(ConstantLiveness(0.1)));
        let camera = CameraId::new("cam-1");
        let employee = EmployeeId::new("1");
        gate.observe(&camera, &employee, Some(-8.0), true, 0.0, &cfg());
        gate.observe(&camera, &employee, Some(8.0), true, 0.5, &cfg());
        let (ok, reason) = gate.check(&camera, &employee, &[0.1], 0.6, &cfg());
        assert!(!ok);
        assert_eq!(reason, SpoofReason::LowScore);
    }
}
