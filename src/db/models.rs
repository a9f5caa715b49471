use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::db::schema::{certificates, medical_records, users};

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = users)]
pub struct User {
    pub roll_no: String,
    pub name: String,
    pub password_hash: String,
    pub role: String,
    pub hostel_no: Option<String>,
    pub room_no: Option<String>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub roll_no: String,
    pub name: String,
    pub password_hash: String,
    pub role: String,
    pub hostel_no: Option<String>,
    pub room_no: Option<String>,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = medical_records)]
pub struct MedicalRecord {
    pub id: i32,
    pub roll_no: String,
    pub date: NaiveDate,
    pub diagnosis: String,
    pub medications: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = medical_records)]
pub struct NewMedicalRecord {
    pub roll_no: String,
    pub date: NaiveDate,
    pub diagnosis: String,
    pub medications: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = certificates)]
pub struct Certificate {
    pub id: i32,
    pub roll_no: String,
    pub name: String,
    pub date: NaiveDate,
    pub diagnosis: String,
    pub medications: String,
    pub age: i32,
    pub gender: String,
    pub relaxations: Option<String>,
    pub serial_no: String,
    pub file_name: String,
    pub created_at: NaiveDateTime,
    pub record_id: i32,
}

#[derive(Debug, Clone, Insertable, Deserialize)]
#[diesel(table_name = certificates)]
pub struct NewCertificate {
    pub roll_no: String,
    pub name: String,
    pub date: NaiveDate,
    pub diagnosis: String,
    pub medications: String,
    pub age: i32,
    pub gender: String,
    pub relaxations: Option<String>,
    pub serial_no: String,
    pub file_name: String,
    pub created_at: NaiveDateTime,
    pub record_id: i32,
}
