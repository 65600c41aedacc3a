use serde::{Deserialize, Serialize};

use crate::ids::{CameraId, CompanyId, EmployeeId};

/// A UI-facing announcement for a successful attendance mark. `seq` is
/// strictly monotone per company; see `attendance-writers::voice` for the
/// log that assigns and serves these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceEvent {
    pub seq: u64,
    pub text: String,
    pub employee_id: EmployeeId,
    pub name: String,
    pub camera_id: CameraId,
    pub camera_name: String,
    pub company_id: Option<CompanyId>,
    pub at_iso: String,
}
