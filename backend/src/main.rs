use axum::routing::get;
use axum::Router;
use diesel::prelude::*;
use std::net::SocketAddr;

mod admin;
mod auth;
mod bookings;
mod config;
mod conversations;
mod db;
mod error;
mod listings;
mod maintenance;
mod models;
mod providers;
mod schema;

#[derive(Clone)]
pub struct AppState {
    pub config: config::AppConfig,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let config = config::AppConfig::load()?;
    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));

    // Fail fast when the database is unreachable.
    let mut conn = db::connect(&config.database_url)?;
    let probe: i32 = diesel::select(diesel::dsl::sql::<diesel::sql_types::Integer>("1"))
        .get_result(&mut conn)?;
    log::info!("Database probe returned {}", probe);
    drop(conn);

    log::info!("Starting server on {}", addr);

    let state = AppState { config };
    let app = Router::new()
        .route("/", get(|| async { "KasiStays API" }))
        .merge(auth::router())
        .merge(listings::router())
        .merge(bookings::router())
        .merge(conversations::router())
        .merge(maintenance::router())
        .merge(providers::router())
        .nest("/admin", admin::router())
        .with_state(state);

    axum::serve(
        tokio::net::TcpListener::bind(addr).await?,
        app.into_make_service(),
    )
    .await?;

    Ok(())
}
