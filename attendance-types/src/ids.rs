use serde::{Deserialize, Serialize};

/// Opaque camera identifier, e.g. `"cam-1"` or `"laptop-acme"`.
///
/// The `laptop-<companyId>` prefix convention is handled by
/// [`crate::company::infer_company_id_from_camera_id`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CameraId(String);

impl CameraId {
    pub fn new(s: impl Into<String>) -> Self {
        CameraId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_laptop_source(&self) -> bool {
        self.0.starts_with("laptop-")
    }
}

impl std::fmt::Display for CameraId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for CameraId {
    fn from(s: String) -> Self {
        CameraId(s)
    }
}

impl From<&str> for CameraId {
    fn from(s: &str) -> Self {
        CameraId(s.to_string())
    }
}

/// Opaque per-company identifier. `None` means the default company.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CompanyId(String);

impl CompanyId {
    pub fn new(s: impl Into<String>) -> Self {
        CompanyId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CompanyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque employee identifier, as assigned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EmployeeId(String);

impl EmployeeId {
    pub fn new(s: impl Into<String>) -> Self {
        EmployeeId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EmployeeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn laptop_prefix_detected() {
        assert!(CameraId::new("laptop-acme").is_laptop_source());
        assert!(!CameraId::new("cam-1").is_laptop_source());
    }
}
