//! FlightWX server - weather monitoring and rescheduling for flight training

use anyhow::Result;
use axum::routing::get;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flightwx_server::config::Config;
use flightwx_server::loops;
use flightwx_server::notify::NotificationPublisher;
use flightwx_server::persistence::db::init_database;
use flightwx_server::state::AppState;
use flightwx_server::suggest::llm::LlmSuggester;
use flightwx_server::{api, suggest::SuggestionSource};
use flightwx_weather::{ObservationSource, WeatherClient, WeatherConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("flightwx_server=debug".parse()?),
        )
        .init();

    tracing::info!("Starting FlightWX server...");

    let config = Config::from_env();
    let port = config.server_port;

    let db = init_database(&config.database_path, 5).await?;
    let state = Arc::new(AppState::new(db));

    let weather: Arc<dyn ObservationSource> = Arc::new(WeatherClient::new(WeatherConfig {
        base_url: config.weather_base_url.clone(),
        api_key: config.weather_api_key.clone(),
        ..WeatherConfig::default()
    })?);
    let suggester: Arc<dyn SuggestionSource> = Arc::new(LlmSuggester::new(
        config.llm_base_url.clone(),
        config.llm_api_key.clone(),
        config.llm_model.clone(),
    )?);
    let publisher = NotificationPublisher::new(config.notify_url.clone())?;

    let (shutdown_tx, _) = tokio::sync::broadcast::channel(1);

    // Start background loops
    tokio::spawn(loops::run_monitor_loop(
        state.clone(),
        config.clone(),
        weather.clone(),
        shutdown_tx.subscribe(),
    ));
    tokio::spawn(loops::run_reschedule_loop(
        state.clone(),
        config,
        weather,
        suggester,
        publisher,
        shutdown_tx.subscribe(),
    ));

    // Build the app
    let app = api::routes()
        .route("/health", get(|| async { "OK" }))
        .with_state(state)
        .layer(CorsLayer::permissive());

    // Run server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
            let _ = shutdown_tx.send(());
        })
        .await?;

    Ok(())
}
