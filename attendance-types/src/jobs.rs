use crate::ids::{CameraId, CompanyId, EmployeeId};
use crate::stream::StreamType;

/// A completed identity decision destined for the backend attendance store.
#[derive(Debug, Clone)]
pub struct AttendanceWriteJob {
    pub company_id: Option<CompanyId>,
    pub camera_id: CameraId,
    pub camera_name: String,
    pub employee_id: EmployeeId,
    pub name: String,
    pub similarity: f32,
    pub timestamp_iso: String,
    pub event_type: StreamType,
}

/// A completed identity decision destined for the external ERP system.
/// Only produced when `event_type == StreamType::Attendance`.
#[derive(Debug, Clone)]
pub struct ErpPushJob {
    /// `dd/mm/yyyy`
    pub attendance_date: String,
    pub emp_id: EmployeeId,
    /// `HH:MM:SS`
    pub in_time: String,
    pub in_location: String,
}
