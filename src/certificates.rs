use std::path::PathBuf;

use actix_web::web;
use chrono::{Local, NaiveDate, NaiveDateTime};
use diesel::result::DatabaseErrorKind;
use serde::Serialize;

use crate::DbPool;
use crate::auth::Claims;
use crate::db::{self, models::NewCertificate};
use crate::error::ApiError;
use crate::policy::{Action, authorize};
use crate::records::download_path;
use crate::storage::FileStore;

/// Raw multipart form fields, as received. Everything arrives as text;
/// `validate` turns them into typed metadata or a `ValidationError`.
#[derive(Debug, Default)]
pub struct CertificateForm {
    pub roll_no: String,
    pub name: String,
    pub date: String,
    pub diagnosis: String,
    pub medications: String,
    pub age: String,
    pub gender: String,
    pub relaxations: Option<String>,
    pub serial_no: String,
    pub record_id: String,
}

#[derive(Debug)]
pub struct CertificateMetadata {
    pub roll_no: String,
    pub name: String,
    pub date: NaiveDate,
    pub diagnosis: String,
    pub medications: String,
    pub age: i32,
    pub gender: String,
    pub relaxations: Option<String>,
    pub serial_no: String,
    pub record_id: i32,
}

impl CertificateForm {
    pub fn validate(self) -> Result<CertificateMetadata, ApiError> {
        let missing = [
            &self.roll_no,
            &self.name,
            &self.date,
            &self.diagnosis,
            &self.medications,
            &self.age,
            &self.gender,
            &self.serial_no,
            &self.record_id,
        ]
        .iter()
        .any(|field| field.trim().is_empty());
        if missing {
            return Err(ApiError::Validation(
                "Missing required fields for certificate generation.".to_string(),
            ));
        }

        let date = NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d")
            .map_err(|_| ApiError::Validation("Date must be in YYYY-MM-DD format.".to_string()))?;
        let age: i32 = self
            .age
            .trim()
            .parse()
            .map_err(|_| ApiError::Validation("Age must be a number.".to_string()))?;
        let record_id: i32 = self
            .record_id
            .trim()
            .parse()
            .map_err(|_| ApiError::Validation("Record id must be a number.".to_string()))?;

        Ok(CertificateMetadata {
            roll_no: self.roll_no.trim().to_string(),
            name: self.name.trim().to_string(),
            date,
            diagnosis: self.diagnosis.trim().to_string(),
            medications: self.medications.trim().to_string(),
            age,
            gender: self.gender.trim().to_string(),
            relaxations: self
                .relaxations
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty()),
            serial_no: self.serial_no.trim().to_string(),
            record_id,
        })
    }
}

/// The uploaded part must declare itself as a PDF; the filename the client
/// chose is never trusted for this.
pub fn require_pdf_content_type(declared: Option<&str>) -> Result<(), ApiError> {
    match declared {
        Some("application/pdf") => Ok(()),
        _ => Err(ApiError::Validation("Only PDF files are allowed!".to_string())),
    }
}

#[derive(Debug, Serialize)]
pub struct IssuedCertificate {
    pub file_name: String,
    pub pdf_path: String,
}

#[derive(Debug, Serialize)]
pub struct CertificateSummary {
    pub id: i32,
    pub name: String,
    pub date: NaiveDate,
    pub diagnosis: String,
    pub medications: String,
    pub serial_no: String,
    pub created_at: NaiveDateTime,
    #[serde(rename = "downloadPath")]
    pub download_path: String,
}

/// Compensating action for any failure after the certificate file was made
/// durable: the file is deleted (best effort, logged) before the error is
/// surfaced, so no stored file outlives a failed issuance beyond this call.
fn compensate_failed_issue(store: &FileStore, file_name: &str, err: ApiError) -> ApiError {
    store.delete(file_name);
    tracing::warn!(
        file = file_name,
        "certificate issuance failed after file write, stored file removed"
    );
    err
}

fn map_insert_error(err: diesel::result::Error) -> ApiError {
    match err {
        diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            ApiError::Conflict(
                "A certificate already exists for this specific medical record entry.".to_string(),
            )
        }
        other => ApiError::internal(other),
    }
}

/// Binds an uploaded PDF to one ledger entry. The file is made durable
/// before the row insert; if the insert fails for any reason the file is
/// deleted again before the error is surfaced. Two concurrent attempts for
/// the same record race on the unique constraint, never on a lock: one
/// commits, the other gets `Conflict` and cleans up its own file.
pub async fn issue(
    pool: &DbPool,
    store: &FileStore,
    claims: &Claims,
    metadata: CertificateMetadata,
    pdf_bytes: Vec<u8>,
) -> Result<IssuedCertificate, ApiError> {
    authorize(claims, Some(&metadata.roll_no), Action::IssueCertificate)?;

    let file_name = FileStore::make_cert_filename(&metadata.roll_no);

    let saved = {
        let store = store.clone();
        let name = file_name.clone();
        web::block(move || store.save(&name, &pdf_bytes).map(|_| ()))
            .await
            .map_err(ApiError::internal)
            .and_then(|result| result)
    };
    if let Err(err) = saved {
        // save() may have failed after creating the file.
        return Err(compensate_failed_issue(store, &file_name, err));
    }

    let row = NewCertificate {
        roll_no: metadata.roll_no.clone(),
        name: metadata.name,
        date: metadata.date,
        diagnosis: metadata.diagnosis,
        medications: metadata.medications,
        age: metadata.age,
        gender: metadata.gender,
        relaxations: metadata.relaxations,
        serial_no: metadata.serial_no,
        file_name: file_name.clone(),
        created_at: Local::now().naive_local(),
        record_id: metadata.record_id,
    };

    let insert = {
        let pool = pool.clone();
        web::block(move || -> Result<(), ApiError> {
            let mut conn = pool.get().map_err(ApiError::internal)?;
            db::insert_certificate(&mut conn, &row)
                .map(|_| ())
                .map_err(map_insert_error)
        })
        .await
        .map_err(ApiError::internal)
        .and_then(|result| result)
    };

    if let Err(err) = insert {
        return Err(compensate_failed_issue(store, &file_name, err));
    }

    tracing::info!(
        roll_no = %metadata.roll_no,
        record_id = metadata.record_id,
        file = %file_name,
        staff = %claims.sub,
        "certificate issued"
    );

    Ok(IssuedCertificate {
        pdf_path: download_path(&file_name),
        file_name,
    })
}

/// Lists a student's certificates, self-service only. Rows whose file
/// reference is empty are skipped instead of failing the listing.
pub async fn list_for_student(
    pool: &DbPool,
    claims: &Claims,
    roll_no: &str,
) -> Result<Vec<CertificateSummary>, ApiError> {
    authorize(claims, Some(roll_no), Action::ListCertificates)?;

    let pool = pool.clone();
    let roll_no = roll_no.to_string();
    let rows = web::block(move || -> Result<_, ApiError> {
        let mut conn = pool.get().map_err(ApiError::internal)?;
        db::certificates_for_student(&mut conn, &roll_no).map_err(ApiError::from)
    })
    .await??;

    Ok(rows
        .into_iter()
        .filter(|cert| !cert.file_name.is_empty())
        .map(|cert| CertificateSummary {
            id: cert.id,
            name: cert.name,
            date: cert.date,
            diagnosis: cert.diagnosis,
            medications: cert.medications,
            serial_no: cert.serial_no,
            created_at: cert.created_at,
            download_path: download_path(&cert.file_name),
        })
        .collect())
}

/// Resolves a download request to an on-disk path. The filename is rejected
/// before any filesystem or database access unless it is a bare name, the
/// owner is taken from the certificate row, and the requester must be that
/// student or staff. A row whose file has gone missing is integrity drift:
/// logged, reported as 404, never masked.
pub async fn resolve_download(
    pool: &DbPool,
    store: &FileStore,
    claims: &Claims,
    filename: &str,
) -> Result<PathBuf, ApiError> {
    FileStore::validate_filename(filename)?;

    let pool = pool.clone();
    let lookup = filename.to_string();
    let certificate = web::block(move || -> Result<_, ApiError> {
        let mut conn = pool.get().map_err(ApiError::internal)?;
        db::certificate_by_filename(&mut conn, &lookup).map_err(ApiError::from)
    })
    .await??
    .ok_or_else(|| ApiError::NotFound("Certificate record not found.".to_string()))?;

    authorize(claims, Some(&certificate.roll_no), Action::DownloadCertificate)?;

    let path = store.path_for(filename)?;
    if !path.is_file() {
        tracing::warn!(
            file = filename,
            roll_no = %certificate.roll_no,
            "certificate row exists but file is missing"
        );
        return Err(ApiError::NotFound("File not found on server.".to_string()));
    }

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::ResponseError;

    fn complete_form() -> CertificateForm {
        CertificateForm {
            roll_no: "22UCS123".to_string(),
            name: "Alice Johnson".to_string(),
            date: "2024-05-02".to_string(),
            diagnosis: "Viral fever".to_string(),
            medications: "Paracetamol".to_string(),
            age: "20".to_string(),
            gender: "F".to_string(),
            relaxations: None,
            serial_no: "MC-2024-0042".to_string(),
            record_id: "7".to_string(),
        }
    }

    #[test]
    fn complete_form_validates() {
        let metadata = complete_form().validate().unwrap();
        assert_eq!(metadata.roll_no, "22UCS123");
        assert_eq!(metadata.age, 20);
        assert_eq!(metadata.record_id, 7);
        assert_eq!(metadata.date, NaiveDate::from_ymd_opt(2024, 5, 2).unwrap());
        assert_eq!(metadata.relaxations, None);
    }

    #[test]
    fn any_missing_field_fails_validation() {
        let mut form = complete_form();
        form.serial_no = String::new();
        assert!(matches!(form.validate(), Err(ApiError::Validation(_))));

        let mut form = complete_form();
        form.record_id = "  ".to_string();
        assert!(matches!(form.validate(), Err(ApiError::Validation(_))));
    }

    #[test]
    fn non_numeric_age_and_record_id_fail_validation() {
        let mut form = complete_form();
        form.age = "twenty".to_string();
        assert!(matches!(form.validate(), Err(ApiError::Validation(_))));

        let mut form = complete_form();
        form.record_id = "7; DROP TABLE certificates".to_string();
        assert!(matches!(form.validate(), Err(ApiError::Validation(_))));
    }

    #[test]
    fn empty_relaxations_normalizes_to_none() {
        let mut form = complete_form();
        form.relaxations = Some("   ".to_string());
        assert_eq!(form.validate().unwrap().relaxations, None);

        let mut form = complete_form();
        form.relaxations = Some("No PT for 2 weeks".to_string());
        assert_eq!(
            form.validate().unwrap().relaxations.as_deref(),
            Some("No PT for 2 weeks")
        );
    }

    #[test]
    fn content_type_check_trusts_declaration_not_filename() {
        assert!(require_pdf_content_type(Some("application/pdf")).is_ok());
        assert!(require_pdf_content_type(Some("image/png")).is_err());
        assert!(require_pdf_content_type(Some("text/html")).is_err());
        assert!(require_pdf_content_type(None).is_err());
    }

    #[test]
    fn unique_violation_maps_to_conflict() {
        let err = diesel::result::Error::DatabaseError(
            DatabaseErrorKind::UniqueViolation,
            Box::new("duplicate key value violates unique constraint".to_string()),
        );
        let mapped = map_insert_error(err);
        assert_eq!(mapped.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn post_write_failure_deletes_the_stored_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf(), 1024);
        let file_name = "cert-22UCS123-1714650000000-12345.pdf";
        let path = store.save(file_name, b"%PDF-1.4 test").unwrap();
        assert!(path.exists());

        // Any failure after the durable write takes this path, whether the
        // insert itself failed or the blocking pool did.
        let surfaced = compensate_failed_issue(
            &store,
            file_name,
            ApiError::Conflict("duplicate".to_string()),
        );
        assert_eq!(surfaced.status_code(), StatusCode::CONFLICT);
        assert!(!path.exists());

        let path = store.save(file_name, b"%PDF-1.4 test").unwrap();
        let surfaced = compensate_failed_issue(
            &store,
            file_name,
            ApiError::internal(anyhow::anyhow!("blocking pool gone")),
        );
        assert_eq!(surfaced.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!path.exists());
    }

    #[test]
    fn other_database_errors_map_to_internal() {
        let err = diesel::result::Error::DatabaseError(
            DatabaseErrorKind::ForeignKeyViolation,
            Box::new("referenced record does not exist".to_string()),
        );
        let mapped = map_insert_error(err);
        assert_eq!(mapped.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let mapped = map_insert_error(diesel::result::Error::RollbackTransaction);
        assert_eq!(mapped.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
