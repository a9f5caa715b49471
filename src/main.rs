use actix_web::{App, HttpServer, middleware::Logger, web};
use diesel::PgConnection;
use diesel::r2d2::{self, ConnectionManager};
use dotenvy::dotenv;
use tracing_subscriber::EnvFilter;

use medicert::auth::TokenIssuer;
use medicert::config::Config;
use medicert::storage::FileStore;
use medicert::{error, handlers};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    error::set_dev_mode(config.dev_mode);

    // create db connection pool
    let manager = ConnectionManager::<PgConnection>::new(&config.database_url);
    let pool = r2d2::Pool::builder().build(manager)?;

    let store = FileStore::new(config.upload_dir.clone(), config.max_file_size);
    store.ensure_dir()?;

    let issuer = TokenIssuer::new(&config.jwt_secret, config.token_ttl_hours);

    tracing::info!(
        addr = %config.bind_addr,
        upload_dir = %config.upload_dir.display(),
        "starting medicert server"
    );

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(store.clone()))
            .app_data(web::Data::new(issuer.clone()))
            .wrap(Logger::default())
            .configure(handlers::configure)
    })
    .bind(&config.bind_addr)?
    .run()
    .await?;

    Ok(())
}
