use diesel::PgConnection;
use diesel::r2d2::{self, ConnectionManager};

pub mod auth;
pub mod certificates;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod policy;
pub mod records;
pub mod storage;

// Database connection pool type
pub type DbPool = r2d2::Pool<ConnectionManager<PgConnection>>;
