use std::error::Error;
use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::serve;
use axum::{Json, Router};
use footway_router::common::config::{RouteRequest, ServerConfig, UserRouteRequest};
use footway_router::common::error::RouteError;
use footway_router::common::session::SessionRegistry;
use footway_router::enrichment::postgres::PgEnrichment;
use footway_router::loading::postgres::PgGraphEngine;
use footway_router::routing::pedestrian::compute_route;
use footway_router::routing::structs::RouteResponse;
use serde::Deserialize;
use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use std::time::Instant;

#[derive(Clone)]
struct AppState {
    registry: Arc<SessionRegistry>,
    engine: Arc<PgGraphEngine>,
    enrichment: Arc<PgEnrichment>,
    config: Arc<ServerConfig>,
}

#[derive(Deserialize, Debug)]
struct CancelRequest {
    session_id: String,
}

async fn get_route(
    State(state): State<AppState>,
    Json(body): Json<UserRouteRequest>,
) -> Result<Json<RouteResponse>, RouteError> {
    let now = Instant::now();

    let request: RouteRequest = body.try_into()?;
    let session_id = request.session_id.clone();

    // The computation gets its own task, so that a dropped connection can't
    // interrupt the removal of its subgraph
    let task = tokio::spawn(async move {
        compute_route(
            &state.registry,
            state.engine.as_ref(),
            state.enrichment.as_ref(),
            &state.config,
            request,
        )
        .await
    });

    let response = task
        .await
        .map_err(|err| RouteError::Internal(format!("Route task failed: {err}")))??;

    log::info!("Route for {session_id} took {:.2?}", now.elapsed());

    Ok(Json(response))
}

async fn cancel_request(
    State(state): State<AppState>,
    Json(body): Json<CancelRequest>,
) -> impl IntoResponse {
    let cancelled = state.registry.request_cancel(&body.session_id);
    if cancelled {
        log::info!("Cancellation requested for {}", body.session_id);
    }

    Json(json!({
        "session_id": body.session_id,
        "cancelled": cancelled,
    }))
}

async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "active_sessions": state.registry.active_sessions(),
        "max_active_sessions": state.registry.max_active(),
    }))
}

async fn health_check() -> impl IntoResponse {
    let msg = "Hello World!";

    let json_response = json!({
        "status": "success",
        "message": msg
    });

    Json(json_response)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.worker_pool_size as u32)
        .connect(&config.database_url)
        .await?;

    let state = AppState {
        registry: Arc::new(SessionRegistry::new(config.worker_pool_size)),
        engine: Arc::new(PgGraphEngine::new(pool.clone(), &config.tables.routing)),
        enrichment: Arc::new(PgEnrichment::new(pool, config.tables.clone())),
        config: Arc::new(config.clone()),
    };

    let router = Router::new()
        .route("/healthcheck", get(health_check))
        .route("/get_status", get(get_status))
        .route("/get_route", post(get_route))
        .route("/cancel_request", post(cancel_request))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    log::info!("Listening on {}", config.bind_address);
    serve(listener, router).await?;

    Ok(())
}
