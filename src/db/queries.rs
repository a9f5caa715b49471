use chrono::{NaiveDateTime, NaiveTime};
use diesel::prelude::*;

use crate::db::models::{Certificate, MedicalRecord, NewCertificate, NewMedicalRecord, User};
use crate::db::schema::{certificates, medical_records, users};

// Every query here goes through the diesel DSL, so all runtime values are
// bound parameters. The staff dashboard date in particular is never spliced
// into SQL text, even after validation.

pub fn find_user(conn: &mut PgConnection, roll_no: &str, role: &str) -> QueryResult<Option<User>> {
    users::table
        .filter(users::roll_no.eq(roll_no))
        .filter(users::role.eq(role))
        .select(User::as_select())
        .first(conn)
        .optional()
}

pub fn find_student_name(conn: &mut PgConnection, roll_no: &str) -> QueryResult<Option<String>> {
    users::table
        .filter(users::roll_no.eq(roll_no))
        .filter(users::role.eq("student"))
        .select(users::name)
        .first(conn)
        .optional()
}

pub fn update_hostel_details(
    conn: &mut PgConnection,
    roll_no: &str,
    hostel_no: Option<&str>,
    room_no: Option<&str>,
) -> QueryResult<usize> {
    diesel::update(
        users::table
            .filter(users::roll_no.eq(roll_no))
            .filter(users::role.eq("student")),
    )
    .set((users::hostel_no.eq(hostel_no), users::room_no.eq(room_no)))
    .execute(conn)
}

pub fn insert_record(conn: &mut PgConnection, record: &NewMedicalRecord) -> QueryResult<usize> {
    diesel::insert_into(medical_records::table)
        .values(record)
        .execute(conn)
}

/// Records for one student, newest first, with the certificate file name
/// attached where one exists. The unique constraint on `record_id` keeps the
/// left join at most 1:1, so no grouping is needed.
pub fn records_with_certificates(
    conn: &mut PgConnection,
    roll_no: &str,
) -> QueryResult<Vec<(MedicalRecord, Option<String>)>> {
    medical_records::table
        .left_join(certificates::table)
        .filter(medical_records::roll_no.eq(roll_no))
        .order((medical_records::date.desc(), medical_records::created_at.desc()))
        .select((MedicalRecord::as_select(), certificates::file_name.nullable()))
        .load(conn)
}

/// Records ingested on the given day (by `created_at`), with the student's
/// current name and a marker for whether a certificate has been issued
/// against each.
pub fn records_for_day(
    conn: &mut PgConnection,
    day: chrono::NaiveDate,
) -> QueryResult<Vec<(MedicalRecord, String, Option<i32>)>> {
    let start = NaiveDateTime::new(day, NaiveTime::MIN);
    let end = start + chrono::Duration::days(1);

    medical_records::table
        .inner_join(users::table)
        .left_join(certificates::table)
        .filter(medical_records::created_at.ge(start))
        .filter(medical_records::created_at.lt(end))
        .order(medical_records::created_at.desc())
        .select((
            MedicalRecord::as_select(),
            users::name,
            certificates::id.nullable(),
        ))
        .load(conn)
}

pub fn insert_certificate(
    conn: &mut PgConnection,
    certificate: &NewCertificate,
) -> QueryResult<usize> {
    diesel::insert_into(certificates::table)
        .values(certificate)
        .execute(conn)
}

pub fn certificates_for_student(
    conn: &mut PgConnection,
    roll_no: &str,
) -> QueryResult<Vec<Certificate>> {
    certificates::table
        .filter(certificates::roll_no.eq(roll_no))
        .order((certificates::date.desc(), certificates::created_at.desc()))
        .select(Certificate::as_select())
        .load(conn)
}

pub fn certificate_by_filename(
    conn: &mut PgConnection,
    file_name: &str,
) -> QueryResult<Option<Certificate>> {
    certificates::table
        .filter(certificates::file_name.eq(file_name))
        .select(Certificate::as_select())
        .first(conn)
        .optional()
}
