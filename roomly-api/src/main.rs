use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use roomly_api::{
    app,
    state::{AppState, AuthConfig},
};
use roomly_core::BookingService;
use roomly_store::{
    DbClient, PostgresBookingRepository, PostgresRoomRepository, PostgresTicketRepository,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roomly_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = roomly_store::app_config::Config::load().context("Failed to load config")?;
    tracing::info!("Starting Roomly API on port {}", config.server.port);

    let db = DbClient::new(&config.database.url)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;

    let bookings = BookingService::new(
        Arc::new(PostgresBookingRepository {
            pool: db.pool.clone(),
        }),
        Arc::new(PostgresRoomRepository {
            pool: db.pool.clone(),
        }),
        Arc::new(PostgresTicketRepository {
            pool: db.pool.clone(),
        }),
    );

    let app_state = AppState {
        bookings: Arc::new(bookings),
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
        },
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
