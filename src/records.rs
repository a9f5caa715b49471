use actix_web::web;
use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::DbPool;
use crate::auth::Claims;
use crate::db::{self, models::NewMedicalRecord};
use crate::error::ApiError;
use crate::policy::{Action, authorize};

#[derive(Debug, Deserialize)]
pub struct NewRecordRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub roll_no: String,
    #[serde(default)]
    pub diagnosis: String,
    #[serde(default)]
    pub medications: String,
    #[serde(default)]
    pub date: String,
}

/// One ledger entry as returned to students and staff, with the certificate
/// download path attached when a certificate has been issued against it.
#[derive(Debug, Serialize)]
pub struct RecordWithCertificate {
    pub id: i32,
    pub date: NaiveDate,
    pub diagnosis: String,
    pub medications: String,
    pub certificate_download_path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StaffDashboardRow {
    #[serde(rename = "recordId")]
    pub record_id: i32,
    pub name: String,
    pub roll_no: String,
    pub diagnosis: String,
    pub medications: String,
    pub created_at: NaiveDateTime,
    #[serde(rename = "hasCertificate")]
    pub has_certificate: bool,
}

pub fn download_path(file_name: &str) -> String {
    format!("/download/certificate/{}", file_name)
}

/// Appends a diagnosis entry for a student. Staff only; entries are
/// immutable once created and there is no cap per student.
pub async fn create_entry(
    pool: &DbPool,
    claims: &Claims,
    request: NewRecordRequest,
) -> Result<(), ApiError> {
    authorize(claims, Some(&request.roll_no), Action::CreateRecord)?;

    if request.name.trim().is_empty()
        || request.roll_no.trim().is_empty()
        || request.diagnosis.trim().is_empty()
        || request.medications.trim().is_empty()
        || request.date.trim().is_empty()
    {
        return Err(ApiError::Validation("Missing required fields.".to_string()));
    }

    let date = NaiveDate::parse_from_str(request.date.trim(), "%Y-%m-%d")
        .map_err(|_| ApiError::Validation("Date must be in YYYY-MM-DD format.".to_string()))?;

    let record = NewMedicalRecord {
        roll_no: request.roll_no.trim().to_string(),
        date,
        diagnosis: request.diagnosis.trim().to_string(),
        medications: request.medications.trim().to_string(),
        created_at: Local::now().naive_local(),
    };

    let pool = pool.clone();
    web::block(move || -> Result<(), ApiError> {
        let mut conn = pool.get().map_err(ApiError::internal)?;
        db::insert_record(&mut conn, &record)?;
        Ok(())
    })
    .await??;

    tracing::info!(staff = %claims.sub, "medical record created");
    Ok(())
}

/// Lists one student's entries newest first, policy-checked against the
/// requester. Entries without a certificate carry a null download path
/// rather than an error.
pub async fn list_entries(
    pool: &DbPool,
    claims: &Claims,
    roll_no: &str,
) -> Result<Vec<RecordWithCertificate>, ApiError> {
    authorize(claims, Some(roll_no), Action::ReadRecords)?;

    let pool = pool.clone();
    let roll_no = roll_no.to_string();
    let rows = web::block(move || -> Result<_, ApiError> {
        let mut conn = pool.get().map_err(ApiError::internal)?;
        db::records_with_certificates(&mut conn, &roll_no).map_err(ApiError::from)
    })
    .await??;

    Ok(rows
        .into_iter()
        .map(|(record, file_name)| RecordWithCertificate {
            id: record.id,
            date: record.date,
            diagnosis: record.diagnosis,
            medications: record.medications,
            certificate_download_path: file_name.as_deref().map(download_path),
        })
        .collect())
}

/// Exactly four digits, dash, two digits, dash, two digits. chrono's `%Y`
/// also accepts extended years like `+262142`, which would overflow the
/// day-range arithmetic downstream, so the shape is checked first.
fn is_strict_date_shape(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        })
}

/// Resolves the staff dashboard date parameter. Anything that is not a
/// strict `YYYY-MM-DD` calendar date falls back to today in server-local
/// time; the request itself never fails over a bad date. The parsed value
/// reaches the query only as a bound parameter.
pub fn resolve_dashboard_date(raw: Option<&str>) -> NaiveDate {
    raw.filter(|value| is_strict_date_shape(value))
        .and_then(|value| NaiveDate::parse_from_str(value, "%Y-%m-%d").ok())
        .unwrap_or_else(|| Local::now().date_naive())
}

/// Staff triage view: all entries ingested on the given day, flagged with
/// whether a certificate has already been issued.
pub async fn list_for_staff_by_date(
    pool: &DbPool,
    claims: &Claims,
    date: Option<&str>,
) -> Result<Vec<StaffDashboardRow>, ApiError> {
    authorize(claims, None, Action::ViewStaffDashboard)?;

    let day = resolve_dashboard_date(date);
    let pool = pool.clone();
    let rows = web::block(move || -> Result<_, ApiError> {
        let mut conn = pool.get().map_err(ApiError::internal)?;
        db::records_for_day(&mut conn, day).map_err(ApiError::from)
    })
    .await??;

    Ok(rows
        .into_iter()
        .map(|(record, name, certificate_id)| StaffDashboardRow {
            record_id: record.id,
            name,
            roll_no: record.roll_no,
            diagnosis: record.diagnosis,
            medications: record.medications,
            created_at: record.created_at,
            has_certificate: certificate_id.is_some(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_date_is_used_as_given() {
        let day = resolve_dashboard_date(Some("2024-05-02"));
        assert_eq!(day, NaiveDate::from_ymd_opt(2024, 5, 2).unwrap());
    }

    #[test]
    fn impossible_calendar_date_falls_back_to_today() {
        let today = Local::now().date_naive();
        assert_eq!(resolve_dashboard_date(Some("2024-13-99")), today);
    }

    #[test]
    fn injection_attempt_falls_back_to_today() {
        let today = Local::now().date_naive();
        assert_eq!(resolve_dashboard_date(Some("'; DROP TABLE users;")), today);
        assert_eq!(resolve_dashboard_date(Some("2024-05-02' OR '1'='1")), today);
    }

    #[test]
    fn missing_date_falls_back_to_today() {
        let today = Local::now().date_naive();
        assert_eq!(resolve_dashboard_date(None), today);
        assert_eq!(resolve_dashboard_date(Some("")), today);
    }

    #[test]
    fn extended_year_forms_fall_back_to_today() {
        // chrono would parse these, but the day-range arithmetic in the
        // query layer cannot take a year like +262142. The shape check
        // rejects them before parsing.
        let today = Local::now().date_naive();
        assert_eq!(resolve_dashboard_date(Some("+262142-12-31")), today);
        assert_eq!(resolve_dashboard_date(Some("-262143-01-01")), today);
        assert_eq!(resolve_dashboard_date(Some("12024-05-02")), today);
        assert_eq!(resolve_dashboard_date(Some("024-05-02")), today);
    }

    #[test]
    fn four_digit_years_survive_the_shape_check() {
        assert_eq!(
            resolve_dashboard_date(Some("0001-01-01")),
            NaiveDate::from_ymd_opt(1, 1, 1).unwrap()
        );
        assert_eq!(
            resolve_dashboard_date(Some("9999-12-30")),
            NaiveDate::from_ymd_opt(9999, 12, 30).unwrap()
        );
    }
}
