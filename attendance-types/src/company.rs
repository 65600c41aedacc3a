use crate::ids::{CameraId, CompanyId};

/// `laptop-<companyId>` cameras carry their company in the id itself; other
/// camera ids are mapped to a company through the operator-set table held by
/// the top-level `Config` (see `attendance-config`), falling back to the
/// default company when absent.
pub fn infer_company_id_from_camera_id(camera_id: &CameraId) -> Option<CompanyId> {
    let s = camera_id.as_str();
    let rest = s.strip_prefix("laptop-")?;
    let rest = rest.trim();
    if rest.is_empty() {
        None
    } else {
        Some(CompanyId::new(rest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_company_from_laptop_prefix() {
        let cam = CameraId::new("laptop-acme");
        assert_eq!(
            infer_company_id_from_camera_id(&cam),
            Some(CompanyId::new("acme"))
        );
    }

    #[test]
    fn non_laptop_camera_has_no_inferred_company() {
        let cam = CameraId::new("cam-1");
        assert_eq!(infer_company_id_from_camera_id(&cam), None);
    }

    #[test]
    fn empty_suffix_has_no_inferred_company() {
        let cam = CameraId::new("laptop-");
        assert_eq!(infer_company_id_from_camera_id(&cam), None);
    }
}
