use crate::auth::{Claims, Role};
use crate::error::ApiError;

/// Everything a caller can ask the API to do, expressed independently of the
/// HTTP route that asked for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ReadStudentProfile,
    ReadRecords,
    /// Listing certificates is self-service only; staff reach certificates
    /// through the records view and the download route instead.
    ListCertificates,
    DownloadCertificate,
    UpdateHostelDetails,
    CreateRecord,
    IssueCertificate,
    ViewStaffDashboard,
}

/// Single authorization decision point, called by every handler on every
/// request. Pure function of the verified claims, the owner of the resource
/// being touched (where one exists), and the requested action.
pub fn authorize(
    claims: &Claims,
    resource_owner: Option<&str>,
    action: Action,
) -> Result<(), ApiError> {
    let owns = |claims: &Claims| resource_owner.is_some_and(|owner| owner == claims.sub);

    let allowed = match (claims.role, action) {
        // Students read only their own data and write only their own
        // hostel/room fields.
        (Role::Student, Action::ReadStudentProfile)
        | (Role::Student, Action::ReadRecords)
        | (Role::Student, Action::ListCertificates)
        | (Role::Student, Action::DownloadCertificate)
        | (Role::Student, Action::UpdateHostelDetails) => owns(claims),

        // Staff read any student's data and create records/certificates for
        // any student, but never touch hostel details.
        (Role::MedicalStaff, Action::ReadStudentProfile)
        | (Role::MedicalStaff, Action::ReadRecords)
        | (Role::MedicalStaff, Action::DownloadCertificate)
        | (Role::MedicalStaff, Action::CreateRecord)
        | (Role::MedicalStaff, Action::IssueCertificate)
        | (Role::MedicalStaff, Action::ViewStaffDashboard) => true,

        (Role::MedicalStaff, Action::ListCertificates)
        | (Role::MedicalStaff, Action::UpdateHostelDetails)
        | (Role::Student, Action::CreateRecord)
        | (Role::Student, Action::IssueCertificate)
        | (Role::Student, Action::ViewStaffDashboard) => false,
    };

    if allowed {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "insufficient permissions for this resource.".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn claims(roll_no: &str, role: Role) -> Claims {
        let now = Utc::now().timestamp() as usize;
        Claims {
            sub: roll_no.to_string(),
            role,
            name: "Test User".to_string(),
            iat: now,
            exp: now + 3600,
        }
    }

    #[test]
    fn student_reads_own_data_only() {
        let student = claims("22UCS123", Role::Student);

        assert!(authorize(&student, Some("22UCS123"), Action::ReadRecords).is_ok());
        assert!(authorize(&student, Some("22MCS456"), Action::ReadRecords).is_err());
        assert!(authorize(&student, Some("22MCS456"), Action::ReadStudentProfile).is_err());
        assert!(authorize(&student, Some("22MCS456"), Action::ListCertificates).is_err());
        assert!(authorize(&student, Some("22MCS456"), Action::DownloadCertificate).is_err());
        assert!(authorize(&student, None, Action::ReadRecords).is_err());
    }

    #[test]
    fn student_never_writes_clinical_data() {
        let student = claims("22UCS123", Role::Student);

        assert!(authorize(&student, Some("22UCS123"), Action::CreateRecord).is_err());
        assert!(authorize(&student, Some("22UCS123"), Action::IssueCertificate).is_err());
        assert!(authorize(&student, None, Action::ViewStaffDashboard).is_err());
    }

    #[test]
    fn student_updates_only_own_hostel_details() {
        let student = claims("22UCS123", Role::Student);

        assert!(authorize(&student, Some("22UCS123"), Action::UpdateHostelDetails).is_ok());
        assert!(authorize(&student, Some("22MCS456"), Action::UpdateHostelDetails).is_err());
    }

    #[test]
    fn staff_reads_and_writes_any_student() {
        let staff = claims("medstaff", Role::MedicalStaff);

        assert!(authorize(&staff, Some("22UCS123"), Action::ReadRecords).is_ok());
        assert!(authorize(&staff, Some("22UCS123"), Action::ReadStudentProfile).is_ok());
        assert!(authorize(&staff, Some("22UCS123"), Action::DownloadCertificate).is_ok());
        assert!(authorize(&staff, Some("22UCS123"), Action::CreateRecord).is_ok());
        assert!(authorize(&staff, Some("22UCS123"), Action::IssueCertificate).is_ok());
        assert!(authorize(&staff, None, Action::ViewStaffDashboard).is_ok());
    }

    #[test]
    fn staff_cannot_touch_hostel_details_or_list_certificates() {
        let staff = claims("medstaff", Role::MedicalStaff);

        assert!(authorize(&staff, Some("22UCS123"), Action::UpdateHostelDetails).is_err());
        assert!(authorize(&staff, Some("medstaff"), Action::UpdateHostelDetails).is_err());
        assert!(authorize(&staff, Some("22UCS123"), Action::ListCertificates).is_err());
    }
}
