use std::sync::Arc;

use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use slotbook::config::{AppConfig, BookingEndPolicy};
use slotbook::db;
use slotbook::handlers;
use slotbook::services::notify::webhook::WebhookSink;
use slotbook::services::notify::{LogSink, NotificationSink};
use slotbook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;

    let notifier: Arc<dyn NotificationSink> = if config.notify_webhook_url.is_empty() {
        tracing::info!("booking events go to the log only");
        Arc::new(LogSink)
    } else {
        if config.notify_webhook_secret.is_empty() {
            tracing::warn!("NOTIFY_WEBHOOK_SECRET is empty; webhook deliveries will be unsigned");
        }
        tracing::info!("booking events webhook: {}", config.notify_webhook_url);
        Arc::new(WebhookSink::new(
            config.notify_webhook_url.clone(),
            config.notify_webhook_secret.clone(),
        ))
    };

    tracing::info!(
        end_policy = match config.scheduling.end_policy {
            BookingEndPolicy::ServiceDuration => "service_duration",
            BookingEndPolicy::UnitEnd => "unit_end",
        },
        max_generation_days = config.scheduling.max_generation_days,
        legacy_slot_minutes = config.scheduling.legacy_slot_minutes,
        "scheduling config"
    );

    let state = Arc::new(AppState::new(conn, config.clone(), notifier));

    let app = handlers::router(state).layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
