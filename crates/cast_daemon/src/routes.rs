use std::convert::Infallible;
use std::sync::atomic::Ordering;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, Method, StatusCode},
    response::{
        sse::{Event, Sse},
        Json,
    },
    routing::{get, post},
    Router,
};
use cast_core::{EventEnvelope, Heat, Product};
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::telemetry::TelemetryFrame;

#[cfg(test)]
pub fn make_router(state: AppState) -> Router {
    make_router_with_cors(state, "http://localhost:5173")
}

pub fn make_router_with_cors(state: AppState, cors_origin: &str) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(cors_origin.parse::<axum::http::HeaderValue>().unwrap())
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/api/heatschedule", get(heat_schedule).post(replace_heat_schedule))
        .route("/api/cutschedule", get(cut_schedule).post(replace_cut_schedule))
        .route("/api/products", get(products).post(replace_products))
        .route("/api/meta", get(meta_handler))
        .route("/api/snapshot", get(snapshot_handler))
        .route("/api/telemetry", get(telemetry_handler))
        .route("/api/stream", get(stream_handler))
        .route("/api/pause", post(pause_handler))
        .route("/api/resume", post(resume_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Schedule resources
// ---------------------------------------------------------------------------

async fn heat_schedule(State(app): State<AppState>) -> Json<Vec<Heat>> {
    let sim = app.sim.lock();
    Json(sim.cast_state.sequence.heats.values().cloned().collect())
}

async fn replace_heat_schedule(
    State(app): State<AppState>,
    Json(heats): Json<Vec<Heat>>,
) -> (StatusCode, Json<serde_json::Value>) {
    let mut sim = app.sim.lock();
    for heat in &heats {
        if sim.content.catalog.get(&heat.grade_id).is_none() {
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(serde_json::json!({
                    "error": format!("heat {} references unknown grade {}", heat.id, heat.grade_id)
                })),
            );
        }
        if !heat.net_weight_kg.is_finite() || heat.net_weight_kg <= 0.0 {
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(serde_json::json!({
                    "error": format!("heat {} has non-positive weight {}", heat.id, heat.net_weight_kg)
                })),
            );
        }
    }
    sim.cast_state.sequence.heats = heats.into_iter().map(|h| (h.id, h)).collect();
    (StatusCode::NO_CONTENT, Json(serde_json::json!({})))
}

async fn cut_schedule(State(app): State<AppState>) -> Json<Vec<Product>> {
    let sim = app.sim.lock();
    Json(sim.cast_state.sequence.schedule.snapshot())
}

async fn replace_cut_schedule(
    State(app): State<AppState>,
    Json(products): Json<Vec<Product>>,
) -> (StatusCode, Json<serde_json::Value>) {
    for product in &products {
        if let Err(err) = product.validate() {
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(serde_json::json!({"error": err.to_string()})),
            );
        }
    }
    let mut sim = app.sim.lock();
    sim.cast_state.sequence.schedule.replace(products);
    (StatusCode::NO_CONTENT, Json(serde_json::json!({})))
}

async fn products(State(app): State<AppState>) -> Json<Vec<Product>> {
    let sim = app.sim.lock();
    Json(sim.cast_state.cut_products.clone())
}

async fn replace_products(
    State(app): State<AppState>,
    Json(products): Json<Vec<Product>>,
) -> (StatusCode, Json<serde_json::Value>) {
    for product in &products {
        if let Err(err) = product.validate() {
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(serde_json::json!({"error": err.to_string()})),
            );
        }
    }
    let mut sim = app.sim.lock();
    sim.cast_state.cut_products = products;
    (StatusCode::NO_CONTENT, Json(serde_json::json!({})))
}

// ---------------------------------------------------------------------------
// Meta, snapshot, telemetry
// ---------------------------------------------------------------------------

async fn meta_handler(State(app): State<AppState>) -> Json<serde_json::Value> {
    let sim = app.sim.lock();
    Json(serde_json::json!({
        "tick": sim.cast_state.meta.tick,
        "seed": sim.cast_state.meta.seed,
        "sequence_id": sim.cast_state.sequence.id,
        "casting_finished": sim.cast_state.casting_finished,
        "ticks_per_sec": app.ticks_per_sec,
        "paused": app.paused.load(Ordering::Relaxed),
    }))
}

async fn snapshot_handler(
    State(app): State<AppState>,
) -> (StatusCode, [(header::HeaderName, &'static str); 1], String) {
    let sim = app.sim.lock();
    match serde_json::to_string(&sim.cast_state) {
        Ok(json) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            json,
        ),
        Err(err) => {
            tracing::error!("snapshot serialization failed: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "application/json")],
                r#"{"error":"serialization failed"}"#.to_string(),
            )
        }
    }
}

async fn telemetry_handler(State(app): State<AppState>) -> Json<Vec<TelemetryFrame>> {
    let history = app.telemetry_history.lock();
    Json(history.iter().cloned().collect())
}

async fn pause_handler(State(app): State<AppState>) -> Json<serde_json::Value> {
    app.paused.store(true, Ordering::Relaxed);
    Json(serde_json::json!({"paused": true}))
}

async fn resume_handler(State(app): State<AppState>) -> Json<serde_json::Value> {
    app.paused.store(false, Ordering::Relaxed);
    Json(serde_json::json!({"paused": false}))
}

// ---------------------------------------------------------------------------
// SSE event stream
// ---------------------------------------------------------------------------

async fn stream_handler(
    State(app): State<AppState>,
) -> Sse<impl futures_core::Stream<Item = Result<Event, Infallible>>> {
    let mut rx = app.event_tx.subscribe();
    let sim = app.sim.clone();

    let stream = async_stream::stream! {
        let mut heartbeat = tokio::time::interval(Duration::from_millis(1000));
        heartbeat.tick().await; // discard the immediate first tick
        let mut flush = tokio::time::interval(Duration::from_millis(250));
        flush.tick().await; // discard the immediate first tick
        let mut pending: Vec<EventEnvelope> = Vec::new();
        loop {
            tokio::select! {
                result = rx.recv() => {
                    match result {
                        Ok(events) => pending.extend(events),
                        Err(broadcast::error::RecvError::Lagged(_)) => {}
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
                _ = flush.tick() => {
                    if !pending.is_empty() {
                        let data = serde_json::to_string(&pending).unwrap_or_default();
                        pending.clear();
                        yield Ok(Event::default().data(data));
                    }
                }
                _ = heartbeat.tick() => {
                    let tick = sim.lock().cast_state.meta.tick;
                    let hb = serde_json::json!({"heartbeat": true, "tick": tick});
                    yield Ok(Event::default().data(hb.to_string()));
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new().interval(Duration::from_secs(15)),
    )
}
