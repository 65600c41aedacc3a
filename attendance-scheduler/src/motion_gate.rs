use attendance_config::MotionConfig;
use attendance_types::geometry::BBox;

/// A raw camera frame, addressable as 8-bit luma samples. The actual
/// decode/color-space conversion lives in the external frame-source
/// collaborator (`SPEC_FULL.md` §1); the motion gate only needs to sample
/// pixels to build its own downscaled grayscale buffer.
pub trait RawFrame {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    /// Luma (brightness) sample at `(x, y)`, `0..width`/`0..height`.
    fn luma_at(&self, x: u32, y: u32) -> u8;
}

/// Cheap CPU-only "is anything changing?" signal. See `SPEC_FULL.md` §4.1.
pub struct MotionGate {
    resize_w: u32,
    resize_h: u32,
    prev: Option<Vec<u8>>,
    active: bool,
    last_change_ts: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionReading {
    pub active: bool,
    pub score: f64,
}

impl MotionGate {
    pub fn new(cfg: &MotionConfig) -> Self {
        MotionGate {
            resize_w: cfg.resize_w,
            resize_h: cfg.resize_h,
            prev: None,
            active: false,
            last_change_ts: f64::NEG_INFINITY,
        }
    }

    /// Downscales `frame` to a grayscale buffer, blurs it, diffs it against
    /// the previous frame, and applies ON/OFF hysteresis with a cooldown.
    ///
    /// `ignore_boxes` are given in the *original* frame's pixel coordinates
    /// (e.g. stable known tracks); pixels inside them are excluded from both
    /// the diff mask and the denominator, per `SPEC_FULL.md` §4.1.
    pub fn update<F: RawFrame>(
        &mut self,
        frame: &F,
        ignore_boxes: &[BBox],
        now: f64,
        cfg: &MotionConfig,
    ) -> MotionReading {
        if cfg.resize_w != self.resize_w || cfg.resize_h != self.resize_h {
            self.resize_w = cfg.resize_w;
            self.resize_h = cfg.resize_h;
            self.prev = None;
        }

        let downscaled = downscale_grayscale(frame, self.resize_w, self.resize_h);
        let blurred = box_blur_5x5(&downscaled, self.resize_w, self.resize_h);

        let Some(prev) = self.prev.replace(blurred.clone()) else {
            self.active = false;
            self.last_change_ts = now;
            return MotionReading {
                active: false,
                score: 0.0,
            };
        };

        let scaled_ignore: Vec<ScaledBox> = ignore_boxes
            .iter()
            .map(|b| scale_box(b, frame.width(), frame.height(), self.resize_w, self.resize_h))
            .collect();

        let mut changed = 0u32;
        let mut counted = 0u32;
        for y in 0..self.resize_h {
            for x in 0..self.resize_w {
                if scaled_ignore.iter().any(|b| b.contains(x, y)) {
                    continue;
                }
                let idx = (y * self.resize_w + x) as usize;
                let diff = (blurred[idx] as i16 - prev[idx] as i16).unsigned_abs() as u8;
                counted += 1;
                if diff > cfg.diff_threshold {
                    changed += 1;
                }
            }
        }

        let score = if counted == 0 {
            0.0
        } else {
            changed as f64 / counted as f64
        };

        let cooldown_elapsed = now - self.last_change_ts >= cfg.cooldown_seconds;
        let new_active = if !self.active {
            cooldown_elapsed && score >= cfg.on_threshold
        } else {
            !(cooldown_elapsed && score <= cfg.on_threshold * cfg.hysteresis_ratio)
        };

        if new_active != self.active {
            self.active = new_active;
            self.last_change_ts = now;
        }

        MotionReading {
            active: self.active,
            score,
        }
    }
}

struct ScaledBox {
    x1: u32,
    y1: u32,
    x2: u32,
    y2: u32,
}

impl ScaledBox {
    fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x1 && x < self.x2 && y >= self.y1 && y < self.y2
    }
}

fn scale_box(b: &BBox, src_w: u32, src_h: u32, dst_w: u32, dst_h: u32) -> ScaledBox {
    let sx = dst_w as f64 / src_w.max(1) as f64;
    let sy = dst_h as f64 / src_h.max(1) as f64;
    ScaledBox {
        x1: ((b.x1 as f64) * sx).floor().max(0.0) as u32,
        y1: ((b.y1 as f64) * sy).floor().max(0.0) as u32,
        x2: ((b.x2 as f64) * sx).ceil().min(dst_w as f64) as u32,
        y2: ((b.y2 as f64) * sy).ceil().min(dst_h as f64) as u32,
    }
}

fn downscale_grayscale<F: RawFrame>(frame: &F, dst_w: u32, dst_h: u32) -> Vec<u8> {
    let (src_w, src_h) = (frame.width().max(1), frame.height().max(1));
    let mut out = vec![0u8; (dst_w * dst_h) as usize];
    for y in 0..dst_h {
        let sy = (y as u64 * src_h as u64 / dst_h.max(1) as u64) as u32;
        for x in 0..dst_w {
            let sx = (x as u64 * src_w as u64 / dst_w.max(1) as u64) as u32;
            out[(y * dst_w + x) as usize] = frame.luma_at(sx.min(src_w - 1), sy.min(src_h - 1));
        }
    }
    out
}

/// Box blur, a cheap stand-in for the spec's 5x5 Gaussian blur.
fn box_blur_5x5(buf: &[u8], w: u32, h: u32) -> Vec<u8> {
    if w == 0 || h == 0 {
        return buf.to_vec();
    }
    let mut out = vec![0u8; buf.len()];
    let (w, h) = (w as i64, h as i64);
    for y in 0..h {
        for x in 0..w {
            let mut sum = 0u32;
            let mut count = 0u32;
            for dy in -2..=2i64 {
                for dx in -2..=2i64 {
                    let (nx, ny) = (x + dx, y + dy);
                    if nx >= 0 && nx < w && ny >= 0 && ny < h {
                        sum += buf[(ny * w + nx) as usize] as u32;
                        count += 1;
                    }
                }
            }
            out[(y * w + x) as usize] = (sum / count.max(1)) as u8;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SolidFrame {
        w: u32,
        h: u32,
        value: u8,
    }

    impl RawFrame for SolidFrame {
        fn width(&self) -> u32 {
            self.w
        }
        fn height(&self) -> u32 {
            self.h
        }
        fn luma_at(&self, _x: u32, _y: u32) -> u8 {
            self.value
        }
    }

    struct HalfFrame {
        w: u32,
        h: u32,
    }

    impl RawFrame for HalfFrame {
        fn width(&self) -> u32 {
            self.w
        }
        fn height(&self) -> u32 {
            self.h
        }
        fn luma_at(&self, x: u32, _y: u32) -> u8 {
            if x < self.w / 2 {
                0
            } else {
                255
            }
        }
    }

    #[test]
    fn first_frame_is_inactive_with_zero_score() {
        let cfg = MotionConfig::default();
        let mut gate = MotionGate::new(&cfg);
        let frame = SolidFrame {
            w: 640,
            h: 480,
            value: 10,
        };
        let reading = gate.update(&frame, &[], 0.0, &cfg);
        assert_eq!(reading, MotionReading { active: false, score: 0.0 });
    }

    #[test]
    fn identical_frames_keep_gate_off() {
        let cfg = MotionConfig::default();
        let mut gate = MotionGate::new(&cfg);
        let frame = SolidFrame {
            w: 640,
            h: 480,
            value: 10,
        };
        gate.update(&frame, &[], 0.0, &cfg);
        let reading = gate.update(&frame, &[], 1.0, &cfg);
        assert!(!reading.active);
        assert_eq!(reading.score, 0.0);
    }

    #[test]
    fn large_change_turns_gate_on_after_cooldown_then_off_with_hysteresis() {
        let mut cfg = MotionConfig::default();
        cfg.cooldown_seconds = 0.0;
        cfg.on_threshold = 0.1;
        cfg.hysteresis_ratio = 0.5;
        let mut gate = MotionGate::new(&cfg);

        let black = SolidFrame {
            w: 640,
            h: 480,
            value: 0,
        };
        gate.update(&black, &[], 0.0, &cfg);

        let half = HalfFrame { w: 640, h: 480 };
        let reading = gate.update(&half, &[], 1.0, &cfg);
        assert!(reading.active);
        assert!(reading.score >= 0.1);
    }
}
