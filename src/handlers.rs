use actix_files::NamedFile;
use actix_multipart::{Field, Multipart};
use actix_web::{HttpResponse, web};
use futures::{StreamExt, TryStreamExt};
use serde::Deserialize;
use serde_json::json;

use crate::DbPool;
use crate::auth::{self, Claims, Role, TokenIssuer};
use crate::certificates::{self, CertificateForm, require_pdf_content_type};
use crate::db;
use crate::error::ApiError;
use crate::policy::{Action, authorize};
use crate::records::{self, NewRecordRequest};
use crate::storage::FileStore;

const MAX_TEXT_FIELD_BYTES: usize = 4096;
const MAX_DETAIL_LEN: usize = 50;

pub fn configure(cfg: &mut web::ServiceConfig) {
    // Malformed JSON bodies and unknown routes get the same JSON error shape
    // as everything else.
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        ApiError::Validation(format!("Invalid request body: {err}")).into()
    }))
    .route("/login", web::post().to(login))
        .route("/student/hostel-details", web::put().to(update_hostel_details))
        .route("/student/certificates/{rollno}", web::get().to(student_certificates))
        .route("/student/{rollno}", web::get().to(get_student))
        .route("/records/{rollno}", web::get().to(get_records))
        .route("/medical/staff/records", web::get().to(staff_records))
        .route("/medical/staff/record", web::post().to(create_record))
        .route(
            "/generate-and-save-certificate",
            web::post().to(generate_and_save_certificate),
        )
        .route(
            "/download/certificate/{filename}",
            web::get().to(download_certificate),
        )
        .default_service(web::route().to(not_found));
}

async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(json!({
        "success": false,
        "error": "Not Found",
    }))
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    #[serde(default)]
    roll_no: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    role: String,
}

async fn login(
    pool: web::Data<DbPool>,
    issuer: web::Data<TokenIssuer>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    if body.roll_no.is_empty() || body.password.is_empty() || body.role.is_empty() {
        return Err(ApiError::Validation(
            "Missing required fields (roll_no, password, role).".to_string(),
        ));
    }
    let role = Role::parse(&body.role)
        .ok_or_else(|| ApiError::Validation("Unknown role.".to_string()))?;

    let (user, token) =
        auth::authenticate(&pool, &issuer, &body.roll_no, &body.password, role).await?;

    let mut response = json!({
        "success": true,
        "token": token,
        "role": user.role,
        "name": user.name,
    });
    // Hostel details only make sense for students; staff logins omit them.
    if role == Role::Student {
        response["hostel_no"] = json!(user.hostel_no);
        response["room_no"] = json!(user.room_no);
    }
    Ok(HttpResponse::Ok().json(response))
}

#[derive(Debug, Deserialize)]
struct HostelDetailsRequest {
    hostel_no: Option<String>,
    room_no: Option<String>,
}

fn clean_detail(value: Option<String>, label: &str) -> Result<Option<String>, ApiError> {
    match value {
        None => Ok(None),
        Some(raw) => {
            let trimmed = raw.trim();
            if trimmed.len() > MAX_DETAIL_LEN {
                return Err(ApiError::Validation(format!(
                    "{label} must be at most {MAX_DETAIL_LEN} characters."
                )));
            }
            if trimmed.is_empty() {
                Ok(None)
            } else {
                Ok(Some(trimmed.to_string()))
            }
        }
    }
}

async fn update_hostel_details(
    pool: web::Data<DbPool>,
    claims: Claims,
    body: web::Json<HostelDetailsRequest>,
) -> Result<HttpResponse, ApiError> {
    authorize(&claims, Some(&claims.sub), Action::UpdateHostelDetails)?;

    let body = body.into_inner();
    let hostel_no = clean_detail(body.hostel_no, "hostel_no")?;
    let room_no = clean_detail(body.room_no, "room_no")?;

    let pool = pool.get_ref().clone();
    let roll_no = claims.sub.clone();
    let updated = web::block(move || -> Result<usize, ApiError> {
        let mut conn = pool.get().map_err(ApiError::internal)?;
        db::update_hostel_details(&mut conn, &roll_no, hostel_no.as_deref(), room_no.as_deref())
            .map_err(ApiError::from)
    })
    .await??;

    if updated == 1 {
        tracing::info!(roll_no = %claims.sub, "hostel details updated");
        Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Hostel details updated successfully.",
        })))
    } else {
        Err(ApiError::NotFound(
            "Student not found or update failed.".to_string(),
        ))
    }
}

async fn get_student(
    pool: web::Data<DbPool>,
    claims: Claims,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let roll_no = path.into_inner();
    authorize(&claims, Some(&roll_no), Action::ReadStudentProfile)?;

    let pool = pool.get_ref().clone();
    let lookup = roll_no.clone();
    let name = web::block(move || -> Result<Option<String>, ApiError> {
        let mut conn = pool.get().map_err(ApiError::internal)?;
        db::find_student_name(&mut conn, &lookup).map_err(ApiError::from)
    })
    .await??
    .ok_or_else(|| ApiError::NotFound("Student not found".to_string()))?;

    Ok(HttpResponse::Ok().json(json!({ "success": true, "name": name })))
}

async fn get_records(
    pool: web::Data<DbPool>,
    claims: Claims,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let roll_no = path.into_inner();
    let data = records::list_entries(&pool, &claims, &roll_no).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data })))
}

#[derive(Debug, Deserialize)]
struct DashboardQuery {
    date: Option<String>,
}

async fn staff_records(
    pool: web::Data<DbPool>,
    claims: Claims,
    query: web::Query<DashboardQuery>,
) -> Result<HttpResponse, ApiError> {
    let data = records::list_for_staff_by_date(&pool, &claims, query.date.as_deref()).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data })))
}

async fn create_record(
    pool: web::Data<DbPool>,
    claims: Claims,
    body: web::Json<NewRecordRequest>,
) -> Result<HttpResponse, ApiError> {
    records::create_entry(&pool, &claims, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "Medical record saved successfully.",
    })))
}

async fn read_field_bytes(
    field: &mut Field,
    limit: usize,
    too_large: &str,
) -> Result<Vec<u8>, ApiError> {
    let mut buf = Vec::new();
    while let Some(chunk) = field.next().await {
        let chunk =
            chunk.map_err(|_| ApiError::Validation("Malformed multipart payload.".to_string()))?;
        if buf.len() + chunk.len() > limit {
            return Err(ApiError::Validation(too_large.to_string()));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

async fn read_field_text(field: &mut Field) -> Result<String, ApiError> {
    let bytes =
        read_field_bytes(field, MAX_TEXT_FIELD_BYTES, "Form field is too long.").await?;
    String::from_utf8(bytes)
        .map_err(|_| ApiError::Validation("Form fields must be valid UTF-8.".to_string()))
}

async fn generate_and_save_certificate(
    pool: web::Data<DbPool>,
    store: web::Data<FileStore>,
    claims: Claims,
    mut payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    // Authorize before consuming the upload, so an unauthorized caller never
    // gets a file written on their behalf.
    authorize(&claims, None, Action::IssueCertificate)?;

    let mut form = CertificateForm::default();
    let mut pdf_bytes: Option<Vec<u8>> = None;

    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|_| ApiError::Validation("Malformed multipart payload.".to_string()))?
    {
        let field_name = field.name().to_string();
        match field_name.as_str() {
            "pdf" => {
                require_pdf_content_type(field.content_type().map(|m| m.essence_str()))?;
                let too_large = format!(
                    "File upload failed: File too large. Maximum size allowed is {}MB.",
                    store.max_bytes() / 1024 / 1024
                );
                pdf_bytes =
                    Some(read_field_bytes(&mut field, store.max_bytes(), &too_large).await?);
            }
            "rollNo" => form.roll_no = read_field_text(&mut field).await?,
            "name" => form.name = read_field_text(&mut field).await?,
            "date" => form.date = read_field_text(&mut field).await?,
            "diagnosis" => form.diagnosis = read_field_text(&mut field).await?,
            "medications" => form.medications = read_field_text(&mut field).await?,
            "age" => form.age = read_field_text(&mut field).await?,
            "gender" => form.gender = read_field_text(&mut field).await?,
            "relaxations" => form.relaxations = Some(read_field_text(&mut field).await?),
            "serialNo" => form.serial_no = read_field_text(&mut field).await?,
            "recordId" => form.record_id = read_field_text(&mut field).await?,
            _ => {
                // Drain unknown parts so the stream stays consumable.
                let _ =
                    read_field_bytes(&mut field, MAX_TEXT_FIELD_BYTES, "Form field is too long.")
                        .await;
            }
        }
    }

    let pdf_bytes = pdf_bytes.ok_or_else(|| {
        ApiError::Validation("Certificate generation failed: PDF file is required.".to_string())
    })?;
    let metadata = form.validate()?;

    let issued = certificates::issue(&pool, &store, &claims, metadata, pdf_bytes).await?;

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "Certificate saved successfully.",
        "pdfPath": issued.pdf_path,
    })))
}

async fn student_certificates(
    pool: web::Data<DbPool>,
    claims: Claims,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let roll_no = path.into_inner();
    let certificates = certificates::list_for_student(&pool, &claims, &roll_no).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "certificates": certificates,
    })))
}

async fn download_certificate(
    pool: web::Data<DbPool>,
    store: web::Data<FileStore>,
    claims: Claims,
    path: web::Path<String>,
) -> Result<NamedFile, ApiError> {
    let filename = path.into_inner();
    let file_path = certificates::resolve_download(&pool, &store, &claims, &filename).await?;

    // The existence check in resolve_download can race with deletion; treat
    // a failed open the same as a missing file.
    NamedFile::open(file_path)
        .map_err(|_| ApiError::NotFound("File not found on server.".to_string()))
}
