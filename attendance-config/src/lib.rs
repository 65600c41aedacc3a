//! Loads the immutable [`Config`] value consumed by every other crate, from
//! a TOML file plus the environment variable overrides listed in
//! `SPEC_FULL.md` §6. Modeled on `braid-config-data::parse_config_file`:
//! parse, fix up relative paths, then let a narrow set of env vars win.

pub mod error;

pub use error::{Error, Result};

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use attendance_types::{CameraId, CompanyId};

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrtProvider {
    Auto,
    Cuda,
    Tensorrt,
    Cpu,
}

impl Default for OrtProvider {
    fn default() -> Self {
        OrtProvider::Auto
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoseCheckMode {
    /// Require yaw range motion within the window (default, newer variant).
    Yaw,
    /// Require a minimum fraction of moving pixels within the window.
    MotionPixels,
}

impl Default for PoseCheckMode {
    fn default() -> Self {
        PoseCheckMode::Yaw
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MotionConfig {
    #[serde(default = "default_motion_resize_w")]
    pub resize_w: u32,
    #[serde(default = "default_motion_resize_h")]
    pub resize_h: u32,
    #[serde(default = "default_diff_threshold")]
    pub diff_threshold: u8,
    #[serde(default = "default_motion_on_threshold")]
    pub on_threshold: f64,
    #[serde(default = "default_hysteresis_ratio")]
    pub hysteresis_ratio: f64,
    #[serde(default = "default_motion_cooldown_seconds")]
    pub cooldown_seconds: f64,
}

fn default_motion_resize_w() -> u32 {
    160
}
fn default_motion_resize_h() -> u32 {
    120
}
fn default_diff_threshold() -> u8 {
    25
}
fn default_motion_on_threshold() -> f64 {
    0.02
}
fn default_hysteresis_ratio() -> f64 {
    0.5
}
fn default_motion_cooldown_seconds() -> f64 {
    1.0
}

impl Default for MotionConfig {
    fn default() -> Self {
        MotionConfig {
            resize_w: default_motion_resize_w(),
            resize_h: default_motion_resize_h(),
            diff_threshold: default_diff_threshold(),
            on_threshold: default_motion_on_threshold(),
            hysteresis_ratio: default_hysteresis_ratio(),
            cooldown_seconds: default_motion_cooldown_seconds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    #[serde(default = "default_detection_fps_idle")]
    pub detection_fps_idle: f64,
    #[serde(default = "default_detection_fps_normal")]
    pub detection_fps_normal: f64,
    #[serde(default = "default_detection_fps_burst")]
    pub detection_fps_burst: f64,
    #[serde(default = "default_burst_seconds")]
    pub burst_seconds: f64,
    #[serde(default = "default_idle_seconds")]
    pub idle_seconds: f64,
    #[serde(default = "default_embed_refresh_seconds")]
    pub embed_refresh_seconds: f64,
    #[serde(default = "default_embed_refresh_seconds_unknown")]
    pub embed_refresh_seconds_unknown: f64,
}

fn default_detection_fps_idle() -> f64 {
    0.0
}
fn default_detection_fps_normal() -> f64 {
    3.0
}
fn default_detection_fps_burst() -> f64 {
    12.0
}
fn default_burst_seconds() -> f64 {
    8.0
}
fn default_idle_seconds() -> f64 {
    15.0
}
fn default_embed_refresh_seconds() -> f64 {
    1.0
}
fn default_embed_refresh_seconds_unknown() -> f64 {
    0.3
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            detection_fps_idle: default_detection_fps_idle(),
            detection_fps_normal: default_detection_fps_normal(),
            detection_fps_burst: default_detection_fps_burst(),
            burst_seconds: default_burst_seconds(),
            idle_seconds: default_idle_seconds(),
            embed_refresh_seconds: default_embed_refresh_seconds(),
            embed_refresh_seconds_unknown: default_embed_refresh_seconds_unknown(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GpuArbiterConfig {
    #[serde(default = "default_gpu_queue_size")]
    pub queue_size: usize,
}

fn default_gpu_queue_size() -> usize {
    3
}

impl Default for GpuArbiterConfig {
    fn default() -> Self {
        GpuArbiterConfig {
            queue_size: default_gpu_queue_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrackerConfig {
    #[serde(default = "default_track_iou_match_threshold")]
    pub track_iou_match_threshold: f64,
    #[serde(default = "default_track_center_match_px")]
    pub track_center_match_px: f64,
    #[serde(default = "default_track_known_reacquire_clear_iou")]
    pub track_known_reacquire_clear_iou: f64,
    #[serde(default = "default_track_known_reacquire_clear_center_ratio")]
    pub track_known_reacquire_clear_center_ratio: f64,
    #[serde(default = "default_track_max_age_frames")]
    pub track_max_age_frames: u32,
    #[serde(default = "default_track_max_det_misses_unknown")]
    pub track_max_det_misses_unknown: u32,
    #[serde(default = "default_track_max_det_misses_known")]
    pub track_max_det_misses_known: u32,
}

fn default_track_iou_match_threshold() -> f64 {
    0.3
}
fn default_track_center_match_px() -> f64 {
    80.0
}
fn default_track_known_reacquire_clear_iou() -> f64 {
    0.15
}
fn default_track_known_reacquire_clear_center_ratio() -> f64 {
    0.5
}
fn default_track_max_age_frames() -> u32 {
    30
}
fn default_track_max_det_misses_unknown() -> u32 {
    5
}
fn default_track_max_det_misses_known() -> u32 {
    15
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            track_iou_match_threshold: default_track_iou_match_threshold(),
            track_center_match_px: default_track_center_match_px(),
            track_known_reacquire_clear_iou: default_track_known_reacquire_clear_iou(),
            track_known_reacquire_clear_center_ratio:
                default_track_known_reacquire_clear_center_ratio(),
            track_max_age_frames: default_track_max_age_frames(),
            track_max_det_misses_unknown: default_track_max_det_misses_unknown(),
            track_max_det_misses_known: default_track_max_det_misses_known(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecognizerConfig {
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    #[serde(default = "default_strict_similarity_threshold")]
    pub strict_similarity_threshold: f32,
    #[serde(default = "default_borderline_margin")]
    pub borderline_margin: f32,
    #[serde(default = "default_distinct_sim_margin")]
    pub distinct_sim_margin: f32,
    #[serde(default = "default_identity_hold_seconds")]
    pub identity_hold_seconds: f64,
    #[serde(default = "default_identity_hold_max_det_misses")]
    pub identity_hold_max_det_misses: u32,
    #[serde(default = "default_identity_hold_min_iou")]
    pub identity_hold_min_iou: f64,
    #[serde(default = "default_identity_hold_max_center_shift_ratio")]
    pub identity_hold_max_center_shift_ratio: f64,
    #[serde(default = "default_kps_max_age_seconds")]
    pub kps_max_age_seconds: f64,
    #[serde(default = "default_unknown_burst_after_seconds")]
    pub unknown_burst_after_seconds: f64,
    #[serde(default = "default_gallery_refresh_seconds")]
    pub gallery_refresh_seconds: f64,
    #[serde(default = "default_min_att_quality")]
    pub min_att_quality: f32,
    #[serde(default = "default_flip_confirm_hits")]
    pub flip_confirm_hits: u32,
}

fn default_similarity_threshold() -> f32 {
    0.35
}
fn default_strict_similarity_threshold() -> f32 {
    0.50
}
fn default_borderline_margin() -> f32 {
    0.05
}
fn default_distinct_sim_margin() -> f32 {
    0.08
}
fn default_identity_hold_seconds() -> f64 {
    2.0
}
fn default_identity_hold_max_det_misses() -> u32 {
    3
}
fn default_identity_hold_min_iou() -> f64 {
    0.3
}
fn default_identity_hold_max_center_shift_ratio() -> f64 {
    0.5
}
fn default_kps_max_age_seconds() -> f64 {
    0.5
}
fn default_unknown_burst_after_seconds() -> f64 {
    3.0
}
fn default_gallery_refresh_seconds() -> f64 {
    300.0
}
fn default_min_att_quality() -> f32 {
    0.4
}
/// Consecutive ticks a competing identity must clear the strict threshold
/// before it overwrites an already-`Known` track (`SPEC_FULL.md` §8 Scenario
/// B: a single anomalous frame must not flip a held identity).
fn default_flip_confirm_hits() -> u32 {
    2
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        RecognizerConfig {
            similarity_threshold: default_similarity_threshold(),
            strict_similarity_threshold: default_strict_similarity_threshold(),
            borderline_margin: default_borderline_margin(),
            distinct_sim_margin: default_distinct_sim_margin(),
            identity_hold_seconds: default_identity_hold_seconds(),
            identity_hold_max_det_misses: default_identity_hold_max_det_misses(),
            identity_hold_min_iou: default_identity_hold_min_iou(),
            identity_hold_max_center_shift_ratio: default_identity_hold_max_center_shift_ratio(),
            kps_max_age_seconds: default_kps_max_age_seconds(),
            unknown_burst_after_seconds: default_unknown_burst_after_seconds(),
            gallery_refresh_seconds: default_gallery_refresh_seconds(),
            min_att_quality: default_min_att_quality(),
            flip_confirm_hits: default_flip_confirm_hits(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AntiSpoofConfig {
    #[serde(default = "default_fas_threshold")]
    pub fas_threshold: f32,
    #[serde(default = "default_min_yaw_range")]
    pub min_yaw_range: f32,
    #[serde(default = "default_motion_window_sec")]
    pub motion_window_sec: f64,
    #[serde(default = "default_antispoof_cooldown_sec")]
    pub cooldown_sec: f64,
    #[serde(default = "default_true")]
    pub bypass_laptop_sources: bool,
    #[serde(default)]
    pub pose_check_mode: PoseCheckMode,
}

fn default_fas_threshold() -> f32 {
    0.6
}
fn default_min_yaw_range() -> f32 {
    10.0
}
fn default_motion_window_sec() -> f64 {
    2.0
}
fn default_antispoof_cooldown_sec() -> f64 {
    30.0
}

impl Default for AntiSpoofConfig {
    fn default() -> Self {
        AntiSpoofConfig {
            fas_threshold: default_fas_threshold(),
            min_yaw_range: default_min_yaw_range(),
            motion_window_sec: default_motion_window_sec(),
            cooldown_sec: default_antispoof_cooldown_sec(),
            bypass_laptop_sources: true,
            pose_check_mode: PoseCheckMode::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DebounceConfig {
    #[serde(default = "default_attendance_debounce_seconds")]
    pub attendance_debounce_seconds: f64,
    #[serde(default = "default_stable_id_confirmations")]
    pub stable_id_confirmations: u32,
    #[serde(default = "default_attendance_min_identity_age_seconds")]
    pub attendance_min_identity_age_seconds: f64,
    #[serde(default = "default_attendance_max_embed_age_seconds")]
    pub attendance_max_embed_age_seconds: f64,
    #[serde(default = "default_verification_samples")]
    pub verification_samples: u32,
    #[serde(default = "default_true")]
    pub verification_fast_path: bool,
}

fn default_attendance_debounce_seconds() -> f64 {
    9.0
}
fn default_stable_id_confirmations() -> u32 {
    3
}
fn default_attendance_min_identity_age_seconds() -> f64 {
    1.0
}
fn default_attendance_max_embed_age_seconds() -> f64 {
    2.0
}
fn default_verification_samples() -> u32 {
    3
}

impl Default for DebounceConfig {
    fn default() -> Self {
        DebounceConfig {
            attendance_debounce_seconds: default_attendance_debounce_seconds(),
            stable_id_confirmations: default_stable_id_confirmations(),
            attendance_min_identity_age_seconds: default_attendance_min_identity_age_seconds(),
            attendance_max_embed_age_seconds: default_attendance_max_embed_age_seconds(),
            verification_samples: default_verification_samples(),
            verification_fast_path: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WritersConfig {
    #[serde(default = "default_db_queue_size")]
    pub db_queue_size: usize,
    #[serde(default = "default_drain_timeout_s")]
    pub drain_timeout_s: f64,
    #[serde(default = "default_erp_queue_size")]
    pub erp_queue_size: usize,
    #[serde(default = "default_erp_max_retries")]
    pub erp_max_retries: u32,
    #[serde(default = "default_erp_retry_sleep_s")]
    pub erp_retry_sleep_s: f64,
    #[serde(default = "default_voice_max_events")]
    pub voice_max_events: usize,
}

fn default_db_queue_size() -> usize {
    1000
}
fn default_drain_timeout_s() -> f64 {
    5.0
}
fn default_erp_queue_size() -> usize {
    2000
}
fn default_erp_max_retries() -> u32 {
    3
}
fn default_erp_retry_sleep_s() -> f64 {
    1.0
}
fn default_voice_max_events() -> usize {
    200
}

impl Default for WritersConfig {
    fn default() -> Self {
        WritersConfig {
            db_queue_size: default_db_queue_size(),
            drain_timeout_s: default_drain_timeout_s(),
            erp_queue_size: default_erp_queue_size(),
            erp_max_retries: default_erp_max_retries(),
            erp_retry_sleep_s: default_erp_retry_sleep_s(),
            voice_max_events: default_voice_max_events(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelayConfig {
    pub url: Option<String>,
    #[serde(default = "default_relay_min_interval_s")]
    pub relay_min_interval_s: f64,
}

fn default_relay_min_interval_s() -> f64 {
    2.0
}

impl Default for RelayConfig {
    fn default() -> Self {
        RelayConfig {
            url: None,
            relay_min_interval_s: default_relay_min_interval_s(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    #[serde(default = "default_backend_base_url")]
    pub base_url: String,
    #[serde(default = "default_backend_api_prefix")]
    pub api_prefix: String,
}

fn default_backend_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}
fn default_backend_api_prefix() -> String {
    "/api/v1".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig {
            base_url: default_backend_base_url(),
            api_prefix: default_backend_api_prefix(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ErpConfig {
    #[serde(default = "default_erp_base_url")]
    pub base_url: String,
    #[serde(default = "default_erp_api_version")]
    pub api_version: String,
}

fn default_erp_base_url() -> String {
    "http://127.0.0.1:9000".to_string()
}
fn default_erp_api_version() -> String {
    "v1".to_string()
}

impl Default for ErpConfig {
    fn default() -> Self {
        ErpConfig {
            base_url: default_erp_base_url(),
            api_version: default_erp_api_version(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CameraConfig {
    pub camera_id: String,
    pub company_id: Option<String>,
    pub name: String,
    /// RTSP URL, local device path, or `webrtc` for a signalling-injected source.
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub cameras: Vec<CameraConfig>,

    #[serde(default = "default_true")]
    pub use_gpu: bool,
    #[serde(default)]
    pub ort_provider: OrtProvider,
    #[serde(default = "default_ai_fps")]
    pub ai_fps: f64,
    #[serde(default = "default_ai_det_size")]
    pub ai_det_size: u32,
    #[serde(default = "default_frame_stale_sec")]
    pub frame_stale_sec: f64,
    #[serde(default = "default_frame_max_fails")]
    pub frame_max_fails: u32,

    #[serde(default)]
    pub motion: MotionConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub gpu_arbiter: GpuArbiterConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub recognizer: RecognizerConfig,
    #[serde(default)]
    pub anti_spoof: AntiSpoofConfig,
    #[serde(default)]
    pub debounce: DebounceConfig,
    #[serde(default)]
    pub writers: WritersConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub erp: ErpConfig,
}

fn default_ai_fps() -> f64 {
    8.0
}
fn default_ai_det_size() -> u32 {
    640
}
fn default_frame_stale_sec() -> f64 {
    5.0
}
fn default_frame_max_fails() -> u32 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Config {
            cameras: Vec::new(),
            use_gpu: true,
            ort_provider: OrtProvider::default(),
            ai_fps: default_ai_fps(),
            ai_det_size: default_ai_det_size(),
            frame_stale_sec: default_frame_stale_sec(),
            frame_max_fails: default_frame_max_fails(),
            motion: MotionConfig::default(),
            scheduler: SchedulerConfig::default(),
            gpu_arbiter: GpuArbiterConfig::default(),
            tracker: TrackerConfig::default(),
            recognizer: RecognizerConfig::default(),
            anti_spoof: AntiSpoofConfig::default(),
            debounce: DebounceConfig::default(),
            writers: WritersConfig::default(),
            relay: RelayConfig::default(),
            backend: BackendConfig::default(),
            erp: ErpConfig::default(),
        }
    }
}

impl Config {
    /// Operator-set `camera_id -> company_id` table, falling back to the
    /// `laptop-<companyId>` convention when a camera has no explicit entry.
    pub fn company_for_camera(&self, camera_id: &CameraId) -> Option<CompanyId> {
        if let Some(cam) = self
            .cameras
            .iter()
            .find(|c| c.camera_id == camera_id.as_str())
        {
            if let Some(company) = &cam.company_id {
                return Some(CompanyId::new(company.clone()));
            }
        }
        attendance_types::company::infer_company_id_from_camera_id(camera_id)
    }
}

/// Loads `path` as TOML, then applies the environment variable overrides
/// listed in `SPEC_FULL.md` §6.
pub fn parse_config_file(path: &Path) -> Result<Config> {
    let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut config: Config = toml::from_str(&text)?;
    apply_env_overrides(&mut config)?;
    Ok(config)
}

fn env_override<T, F>(name: &'static str, parse: F) -> Result<Option<T>>
where
    F: FnOnce(&str) -> Option<T>,
{
    match std::env::var(name) {
        Ok(value) => parse(&value)
            .map(Some)
            .ok_or(Error::BadEnvVar { name, value }),
        Err(_) => Ok(None),
    }
}

/// Applies the subset of `SPEC_FULL.md` §6's environment variables that are
/// scalar overrides of an already-loaded [`Config`]. Unset variables leave
/// the TOML-derived (or default) value untouched.
pub fn apply_env_overrides(config: &mut Config) -> Result<()> {
    if let Some(v) = env_override("USE_GPU", |s| s.parse::<bool>().ok())? {
        config.use_gpu = v;
    }
    if let Some(v) = env_override("ORT_PROVIDER", |s| match s.to_ascii_lowercase().as_str() {
        "auto" => Some(OrtProvider::Auto),
        "cuda" => Some(OrtProvider::Cuda),
        "tensorrt" => Some(OrtProvider::Tensorrt),
        "cpu" => Some(OrtProvider::Cpu),
        _ => None,
    })? {
        config.ort_provider = v;
    }
    if let Some(v) = env_override("AI_FPS", |s| s.parse::<f64>().ok())? {
        config.ai_fps = v;
    }
    if let Some(v) = env_override("AI_DET_SIZE", |s| s.parse::<u32>().ok())? {
        config.ai_det_size = v;
    }
    if let Some(v) = env_override("FRAME_STALE_SEC", |s| s.parse::<f64>().ok())? {
        config.frame_stale_sec = v;
    }
    if let Some(v) = env_override("FRAME_MAX_FAILS", |s| s.parse::<u32>().ok())? {
        config.frame_max_fails = v;
    }
    if let Some(v) = env_override("SIMILARITY_THRESHOLD", |s| s.parse::<f32>().ok())? {
        config.recognizer.similarity_threshold = v;
    }
    if let Some(v) = env_override("STRICT_SIM_THRESHOLD", |s| s.parse::<f32>().ok())? {
        config.recognizer.strict_similarity_threshold = v;
    }
    if let Some(v) = env_override("BORDERLINE_MARGIN", |s| s.parse::<f32>().ok())? {
        config.recognizer.borderline_margin = v;
    }
    if let Some(v) = env_override("MIN_ATT_QUALITY", |s| s.parse::<f32>().ok())? {
        config.recognizer.min_att_quality = v;
    }
    if let Some(v) = env_override("ATTENDANCE_DEBOUNCE_SECONDS", |s| s.parse::<f64>().ok())? {
        config.debounce.attendance_debounce_seconds = v;
    }
    if let Some(v) = env_override("STABLE_ID_CONFIRMATIONS", |s| s.parse::<u32>().ok())? {
        config.debounce.stable_id_confirmations = v;
    }
    if let Some(v) = env_override("VERIFICATION_SAMPLES", |s| s.parse::<u32>().ok())? {
        config.debounce.verification_samples = v;
    }
    if let Some(v) = env_override("GPU_QUEUE_SIZE", |s| s.parse::<usize>().ok())? {
        config.gpu_arbiter.queue_size = v;
    }
    if let Some(v) = env_override("MOTION_THRESHOLD", |s| s.parse::<f64>().ok())? {
        config.motion.on_threshold = v;
    }
    if let Some(v) = env_override("DETECTION_FPS_IDLE", |s| s.parse::<f64>().ok())? {
        config.scheduler.detection_fps_idle = v;
    }
    if let Some(v) = env_override("DETECTION_FPS_NORMAL", |s| s.parse::<f64>().ok())? {
        config.scheduler.detection_fps_normal = v;
    }
    if let Some(v) = env_override("DETECTION_FPS_BURST", |s| s.parse::<f64>().ok())? {
        config.scheduler.detection_fps_burst = v;
    }
    if let Some(v) = env_override("BURST_SECONDS", |s| s.parse::<f64>().ok())? {
        config.scheduler.burst_seconds = v;
    }
    if let Some(v) = env_override("EMBED_REFRESH_SECONDS", |s| s.parse::<f64>().ok())? {
        config.scheduler.embed_refresh_seconds = v;
    }
    if let Some(v) = env_override("FAS_THRESHOLD", |s| s.parse::<f32>().ok())? {
        config.anti_spoof.fas_threshold = v;
    }
    if let Some(v) = env_override("FAS_MIN_YAW_RANGE", |s| s.parse::<f32>().ok())? {
        config.anti_spoof.min_yaw_range = v;
    }
    if let Some(v) = env_override("BACKEND_BASE_URL", |s| Some(s.to_string()))? {
        config.backend.base_url = v;
    }
    if let Some(v) = env_override("BACKEND_API_PREFIX", |s| Some(s.to_string()))? {
        config.backend.api_prefix = v;
    }
    if let Some(v) = env_override("ERP_BASE_URL", |s| Some(s.to_string()))? {
        config.erp.base_url = v;
    }
    if let Some(v) = env_override("ERP_MAX_RETRIES", |s| s.parse::<u32>().ok())? {
        config.writers.erp_max_retries = v;
    }
    if let Some(v) = env_override("RELAY_URL", |s| Some(s.to_string()))? {
        config.relay.url = Some(v);
    }
    if let Some(v) = env_override("RELAY_MIN_INTERVAL_S", |s| s.parse::<f64>().ok())? {
        config.relay.relay_min_interval_s = v;
    }
    Ok(())
}

/// Expands `~` and shell variables in a path-like config string, matching
/// `braid-config-data`'s treatment of filesystem paths.
pub fn expand_path(raw: &str) -> Result<std::path::PathBuf> {
    Ok(std::path::PathBuf::from(shellexpand::full(raw)?.to_string()))
}
