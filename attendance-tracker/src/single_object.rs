use attendance_types::geometry::BBox;

/// A short-horizon, per-track visual tracker. Real implementations (CSRT,
/// KCF, MIL) predict a box between detector results; `step` returns `None`
/// when it has lost the target.
pub trait SingleObjectTracker: Send {
    fn init(bbox: BBox, now: f64) -> Self
    where
        Self: Sized;

    /// Advances the tracker to `now`, returning its predicted box.
    fn step(&mut self, now: f64) -> Option<BBox>;
}

/// Constant-velocity bbox predictor. Stands in for the `csrt`/`kcf`/`mil`
/// fallback chain (`SPEC_FULL.md` §4.4) — all three tiers resolve to this
/// implementation today.
pub struct IouTracker {
    bbox: BBox,
    velocity: (f64, f64),
    last_update_ts: f64,
}

const MAX_VELOCITY_PX_PER_SEC: f64 = 400.0;

impl SingleObjectTracker for IouTracker {
    fn init(bbox: BBox, now: f64) -> Self {
        IouTracker {
            bbox,
            velocity: (0.0, 0.0),
            last_update_ts: now,
        }
    }

    fn step(&mut self, now: f64) -> Option<BBox> {
        let dt = (now - self.last_update_ts).max(0.0);
        let (cx, cy) = self.bbox.center();
        let dx = (self.velocity.0 * dt).clamp(-MAX_VELOCITY_PX_PER_SEC, MAX_VELOCITY_PX_PER_SEC);
        let dy = (self.velocity.1 * dt).clamp(-MAX_VELOCITY_PX_PER_SEC, MAX_VELOCITY_PX_PER_SEC);
        let w = self.bbox.width();
        let h = self.bbox.height();
        let ncx = cx + dx;
        let ncy = cy + dy;
        Some(BBox::new(
            (ncx - w / 2.0).round() as i32,
            (ncy - h / 2.0).round() as i32,
            (ncx + w / 2.0).round() as i32,
            (ncy + h / 2.0).round() as i32,
        ))
    }
}

impl IouTracker {
    /// Re-initializes the tracker from a fresh detector box, estimating
    /// velocity from the displacement since the last reinit.
    pub fn reinit(&mut self, bbox: BBox, now: f64) {
        let dt = (now - self.last_update_ts).max(1e-3);
        let (px, py) = self.bbox.center();
        let (nx, ny) = bbox.center();
        self.velocity = ((nx - px) / dt, (ny - py) / dt);
        self.bbox = bbox;
        self.last_update_ts = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stationary_tracker_holds_its_box() {
        let mut t = IouTracker::init(BBox::new(0, 0, 10, 10), 0.0);
        let predicted = t.step(1.0).unwrap();
        assert_eq!(predicted, BBox::new(0, 0, 10, 10));
    }

    #[test]
    fn reinit_estimates_velocity_and_step_extrapolates() {
        let mut t = IouTracker::init(BBox::new(0, 0, 10, 10), 0.0);
        t.reinit(BBox::new(10, 0, 20, 10), 1.0); // center moved +10px in 1s
        let predicted = t.step(2.0).unwrap(); // 1s further at same velocity
        assert_eq!(predicted, BBox::new(20, 0, 30, 10));
    }
}
