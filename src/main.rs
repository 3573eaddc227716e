use std::env;
use std::sync::Arc;
use std::time::Duration;

use actix_web::{web, App, HttpResponse, HttpServer};
use dotenv::dotenv;
use serde::Deserialize;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod alerts;
mod directory;
mod dispatch;
mod email;
mod emergency;
mod errors;
mod model;
mod realtime;
mod recipients;
mod service;
#[cfg(test)]
mod testutil;
mod thresholds;
mod websockets;

use crate::alerts::PgAlertStore;
use crate::directory::PgCareDirectory;
use crate::dispatch::PgNotificationStore;
use crate::email::{HttpEmailSender, Sender};
use crate::errors::EngineError;
use crate::model::{AlertStatus, NewMeasurement};
use crate::realtime::RealtimeHub;
use crate::service::AlertEngine;
use crate::websockets::ws_handler;

/// **Global Application State**
///
/// Shared across every request and WebSocket session:
/// - `engine`: the alert engine with its stores and channels wired in.
/// - `hub`: the broadcast channel feeding live dashboard sessions.
pub struct AppState {
    pub engine: Arc<AlertEngine>,
    pub hub: RealtimeHub,
}

/// **POST /api/measurements**
///
/// Submit one vital-sign reading: evaluates thresholds, persists any alerts,
/// sets the derived alert level and fans out notifications.
async fn submit_measurement(
    data: web::Data<AppState>,
    body: web::Json<NewMeasurement>,
) -> Result<HttpResponse, EngineError> {
    let outcome = data.engine.submit_measurement(body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

/// **POST /api/emergency**
///
/// Submit a raw emergency signal. The body is deliberately untyped: identity
/// resolution handles the producers' divergent shapes.
async fn submit_emergency(
    data: web::Data<AppState>,
    body: web::Json<serde_json::Value>,
) -> Result<HttpResponse, EngineError> {
    let outcome = data.engine.submit_emergency_signal(&body).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

#[derive(Debug, Deserialize)]
struct ActorBody {
    actor_id: Uuid,
}

async fn acknowledge_alert(
    data: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<ActorBody>,
) -> Result<HttpResponse, EngineError> {
    let alert = data
        .engine
        .acknowledge_alert(path.into_inner(), body.actor_id)
        .await?;
    Ok(HttpResponse::Ok().json(alert))
}

async fn resolve_alert(
    data: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<ActorBody>,
) -> Result<HttpResponse, EngineError> {
    let alert = data
        .engine
        .resolve_alert(path.into_inner(), body.actor_id)
        .await?;
    Ok(HttpResponse::Ok().json(alert))
}

async fn mark_emergency_contacted(
    data: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, EngineError> {
    let alert = data.engine.mark_emergency_contacted(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(alert))
}

async fn mark_next_of_kin_notified(
    data: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, EngineError> {
    let alert = data
        .engine
        .mark_next_of_kin_notified(path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(alert))
}

#[derive(Debug, Deserialize)]
struct AlertsQuery {
    elder_id: Option<Uuid>,
    status: Option<String>,
}

/// **GET /api/alerts** — recent alerts, optionally filtered.
async fn list_alerts(
    data: web::Data<AppState>,
    query: web::Query<AlertsQuery>,
) -> Result<HttpResponse, EngineError> {
    let status = match &query.status {
        Some(raw) => Some(
            AlertStatus::from_str(raw)
                .ok_or_else(|| EngineError::validation(format!("unknown status '{raw}'")))?,
        ),
        None => None,
    };
    let alerts = data.engine.list_alerts(query.elder_id, status).await?;
    Ok(HttpResponse::Ok().json(alerts))
}

/// **Application Entry Point**
///
/// Wires the database pool, the broadcast hub, the email sender and the
/// engine, then starts the HTTP server.
#[tokio::main]
async fn main() -> std::io::Result<()> {
    // 1. Environment + logging
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // 2. Database pool
    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(3))
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres.");

    // 3. Broadcast hub (capacity 100: drop oldest if overwhelmed)
    let hub = RealtimeHub::new(100);

    // 4. Email sender: disabled unless a provider endpoint is configured
    let email: Arc<dyn email::EmailSender> =
        match (env::var("EMAIL_API_URL"), env::var("EMAIL_API_KEY")) {
            (Ok(api_url), Ok(api_key)) => {
                let from = env::var("EMAIL_FROM")
                    .unwrap_or_else(|_| "alerts@vitalguard.example".to_string());
                let client = reqwest::Client::builder()
                    .timeout(Duration::from_secs(10))
                    .build()
                    .expect("Failed to build HTTP client");
                Arc::new(Sender::Http(HttpEmailSender::new(client, api_url, api_key, from)))
            }
            _ => {
                println!("📭 Email delivery disabled (EMAIL_API_URL / EMAIL_API_KEY not set)");
                Arc::new(Sender::Disabled)
            }
        };

    let channel_timeout = env::var("CHANNEL_TIMEOUT_SECS")
        .ok()
        .and_then(|raw| raw.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(10));

    // 5. The engine itself
    let engine = Arc::new(AlertEngine::new(
        Arc::new(PgCareDirectory::new(pool.clone())),
        Arc::new(PgAlertStore::new(pool.clone())),
        Arc::new(PgNotificationStore::new(pool.clone())),
        email,
        hub.clone(),
        channel_timeout,
    ));

    let app_state = web::Data::new(AppState { engine, hub });

    let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    println!("🚀 VitalGuard alert engine listening at http://{bind_addr}");

    // 6. HTTP server
    HttpServer::new(move || {
        let cors = actix_cors::Cors::permissive();

        App::new()
            .wrap(cors)
            .app_data(app_state.clone())
            .route("/api/measurements", web::post().to(submit_measurement))
            .route("/api/emergency", web::post().to(submit_emergency))
            .route("/api/alerts", web::get().to(list_alerts))
            .route("/api/alerts/{id}/acknowledge", web::post().to(acknowledge_alert))
            .route("/api/alerts/{id}/resolve", web::post().to(resolve_alert))
            .route(
                "/api/alerts/{id}/emergency-contacted",
                web::post().to(mark_emergency_contacted),
            )
            .route(
                "/api/alerts/{id}/next-of-kin-notified",
                web::post().to(mark_next_of_kin_notified),
            )
            .route("/ws", web::get().to(ws_handler))
    })
    .bind(bind_addr)?
    .run()
    .await
}
