//! Provisioning tool: wipes the clinic tables and inserts one medical-staff
//! account plus a couple of sample students, all sharing one test password.
//! Never part of the serving path.

use anyhow::{Context, Result};
use diesel::prelude::*;

use medicert::db::models::NewUser;
use medicert::db::schema::{certificates, medical_records, users};

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let mut conn = PgConnection::establish(&database_url)
        .context("failed to connect to database")?;

    let password = std::env::var("SEED_PASSWORD").unwrap_or_else(|_| "test123".to_string());
    let password_hash = bcrypt::hash(&password, bcrypt::DEFAULT_COST)?;

    // Children first so foreign keys stay satisfied during the wipe.
    diesel::delete(certificates::table).execute(&mut conn)?;
    diesel::delete(medical_records::table).execute(&mut conn)?;
    diesel::delete(users::table).execute(&mut conn)?;
    println!("Cleared certificates, medical_records and users tables.");

    let seed_users = vec![
        NewUser {
            roll_no: "medstaff".to_string(),
            name: "Dr. Chand Singh Panwar".to_string(),
            password_hash: password_hash.clone(),
            role: "medical-staff".to_string(),
            hostel_no: None,
            room_no: None,
        },
        NewUser {
            roll_no: "22UCS123".to_string(),
            name: "Alice Johnson".to_string(),
            password_hash: password_hash.clone(),
            role: "student".to_string(),
            hostel_no: None,
            room_no: None,
        },
        NewUser {
            roll_no: "22MCS456".to_string(),
            name: "Bob Williams".to_string(),
            password_hash,
            role: "student".to_string(),
            hostel_no: None,
            room_no: None,
        },
    ];

    diesel::insert_into(users::table)
        .values(&seed_users)
        .execute(&mut conn)?;

    for user in &seed_users {
        println!("Created {} user: {}", user.role, user.roll_no);
    }
    println!("Shared password: {}", password);

    Ok(())
}
