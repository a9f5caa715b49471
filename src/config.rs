use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

const DEFAULT_MAX_FILE_SIZE: usize = 5 * 1024 * 1024; // 5 MiB
const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;

/// Runtime configuration, read once from the environment at startup and
/// passed down to the components that need it. Nothing in the request path
/// reads `env::var` directly.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub upload_dir: PathBuf,
    pub max_file_size: usize,
    pub dev_mode: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET must be set")?;

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());

        let token_ttl_hours = match env::var("TOKEN_TTL_HOURS") {
            Ok(raw) => raw
                .parse::<i64>()
                .context("TOKEN_TTL_HOURS must be an integer")?,
            Err(_) => DEFAULT_TOKEN_TTL_HOURS,
        };

        let upload_dir = env::var("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("uploads/certificates"));

        let max_file_size = match env::var("MAX_FILE_SIZE") {
            Ok(raw) => raw
                .parse::<usize>()
                .context("MAX_FILE_SIZE must be a byte count")?,
            Err(_) => DEFAULT_MAX_FILE_SIZE,
        };

        let dev_mode = env::var("DEV_MODE").map(|v| v == "true").unwrap_or(false);

        Ok(Config {
            database_url,
            bind_addr,
            jwt_secret,
            token_ttl_hours,
            upload_dir,
            max_file_size,
            dev_mode,
        })
    }
}
