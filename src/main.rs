//! GeoPlan Ciudad Viva server.
//!
//! # API Endpoints
//!
//! - `POST /api/simulations/simulate` - Run a climate strategy simulation
//! - `GET /api/simulations/strategies` - Strategy catalog
//! - `POST /api/gamification/add-points` - Credit an activity to a user
//! - `GET /api/gamification/progress/:userId` - Level, certificates, achievements
//! - `POST /api/rewards/unlock` - Unlock a reward for a user
//! - `GET /api/alerts/current` - Environmental alerts from NASA data
//! - `GET /api/alerts/notifications` - Notification feed
//! - `GET /health` - Health check
//!
//! See [`geoplan::api::router`] for the full surface.

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use geoplan::api::{AppState, router};
use geoplan::config::Config;
use geoplan::data_sources::EnvironmentService;
use geoplan::error::expose_error_details;
use geoplan::notifications::{NotificationBroker, NotificationScheduler};
use geoplan::random::SimRng;
use geoplan::storage::Storage;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("geoplan=info".parse()?))
        .init();

    let config = Config::from_env();
    expose_error_details(!config.is_production());

    info!(
        port = config.port,
        db_url = %config.database_url,
        environment = ?config.environment,
        firms = config.firms_map_key.is_some(),
        seeded = config.random_seed.is_some(),
        "Starting GeoPlan server"
    );

    let storage = Storage::new(&config.database_url).await?;
    info!("Database initialized");

    // Separate streams so notification rolls don't shift simulation results.
    let broker = NotificationBroker::in_memory(Box::new(SimRng::seeded_or_entropy(
        config.random_seed.map(|s| s.wrapping_add(1)),
    )));
    let environment = EnvironmentService::from_config(&config);
    let state = AppState::new(
        storage,
        broker.clone(),
        environment,
        Box::new(SimRng::seeded_or_entropy(config.random_seed)),
    );

    let mut events = broker.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(n) => info!(
                    id = %n.id,
                    kind = %n.kind,
                    priority = n.priority.as_str(),
                    title = %n.title,
                    "New notification"
                ),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Notification log lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let scheduler =
        NotificationScheduler::start(broker, config.info_interval, config.critical_interval);

    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;

    info!(%addr, "GeoPlan is listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    scheduler.stop();

    Ok(())
}
