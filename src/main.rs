mod auth;
mod call;
mod chat;
mod config;
mod db;
mod error;
mod matchmaking;
mod routes;
mod state;
mod store;
mod ws;

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;

use config::{generate_config_template, Config};
use state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    if config.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    init_tracing(config.json_logs);
    tracing::info!("Amora gateway v{} starting", env!("CARGO_PKG_VERSION"));

    let db = db::init_db(&config.data_dir)?;
    let jwt_secret = auth::jwt::load_or_generate_jwt_secret(&config.data_dir)?;
    let state = AppState::new(db, jwt_secret, Duration::from_millis(config.call_grace_ms));

    let addr: SocketAddr = format!("{}:{}", config.bind_address, config.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, routes::build_router(state)).await?;
    Ok(())
}

/// RUST_LOG wins when set; otherwise only this crate logs, at info.
fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "amora_gateway=info".parse().unwrap());
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.pretty().init();
    }
}
