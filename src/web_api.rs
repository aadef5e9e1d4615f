//! Web API Server
//!
//! Provides the HTTP surface for the prediction pipeline.
//!
//! ## Endpoints
//!
//! - `GET  /` — Static prediction form
//! - `POST /predict` — Predict CO2 emissions for one vehicle (JSON)
//! - `GET  /health` — Health check
//! - `GET  /metrics` — Prometheus metrics

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Request, StatusCode},
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tracing::{error, field::Empty, info, info_span, Instrument};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::pipeline::PredictionPipeline;
use crate::{metrics, PredictionError};

// ============================================================================
// Types
// ============================================================================

/// JSON response body for `POST /predict`.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    /// Estimated CO2 emissions in grams per kilometre, rounded to two
    /// decimal places.
    pub prediction: f64,
}

/// Shared application state available to all handlers.
#[derive(Clone)]
struct AppState {
    pipeline: PredictionPipeline,
}

// ============================================================================
// Server
// ============================================================================

/// Start the web API server.
///
/// Binds to `config.host:config.port` and serves the prediction API plus the
/// static form, health, and metrics endpoints. Blocks until the server shuts
/// down.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
///
/// # Panics
///
/// This function never panics.
pub async fn start_server(
    config: ServerConfig,
    pipeline: PredictionPipeline,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = format!("{}:{}", config.host, config.port);

    let state = AppState { pipeline };

    let app = Router::new()
        .route("/", get(index_handler))
        .route("/predict", post(predict_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(middleware::from_fn_with_state(
            config.max_request_size,
            body_size_middleware,
        ))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(target: "emissions::api", %addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Middleware
// ============================================================================

/// Adds a unique `X-Request-ID` header to every response.
///
/// If the client sends an `X-Request-ID` header, it is preserved; otherwise
/// a new UUID v4 is generated. The id is also written back into the request
/// headers so handlers downstream see the same value the response carries.
///
/// # Panics
///
/// This function never panics.
async fn request_id_middleware(mut req: Request<Body>, next: Next) -> Response {
    let request_id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        req.headers_mut().insert("x-request-id", value);
    }

    let mut response = next.run(req).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }

    response
}

/// Rejects requests whose `Content-Length` exceeds `max_size` with 413.
///
/// # Panics
///
/// This function never panics.
async fn body_size_middleware(
    State(max_size): State<usize>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(content_length) = req
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<usize>().ok())
    {
        if content_length > max_size {
            return (
                StatusCode::PAYLOAD_TOO_LARGE,
                Json(serde_json::json!({"error": "Request body too large"})),
            )
                .into_response();
        }
    }

    next.run(req).await
}

// ============================================================================
// Handlers
// ============================================================================

/// `POST /predict` — Predict CO2 emissions for one vehicle.
///
/// Accepts a JSON object with the seven feature fields and returns the
/// rounded prediction. Client mistakes (missing fields, wrong types) map to
/// 400; everything else maps to an opaque 500.
///
/// # Panics
///
/// This function never panics.
async fn predict_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<serde_json::Value>,
) -> Result<Json<PredictResponse>, AppError> {
    metrics::inc_request("predict");

    let request_id = headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let span = info_span!(
        target: "emissions::api",
        "predict.request",
        request_id = %request_id,
        duration_ms = Empty,
        outcome = Empty,
        error_kind = Empty,
    );

    let started = Instant::now();
    let result = state
        .pipeline
        .predict_json(&payload)
        .instrument(span.clone())
        .await;
    span.record("duration_ms", started.elapsed().as_millis() as u64);

    match result {
        Ok(prediction) => {
            span.record("outcome", "ok");
            Ok(Json(PredictResponse { prediction }))
        }
        Err(err) => {
            span.record("outcome", "error");
            span.record("error_kind", err.kind());
            metrics::inc_error("predict", err.kind());
            if err.is_client_error() {
                info!(
                    target: "emissions::api",
                    request_id = %request_id,
                    error = %err,
                    "request rejected"
                );
            } else {
                error!(
                    target: "emissions::api",
                    request_id = %request_id,
                    error = %err,
                    "prediction failed"
                );
            }
            Err(AppError(err))
        }
    }
}

/// `GET /` — Serve the static prediction form.
///
/// # Panics
///
/// This function never panics.
async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// `GET /health` — Health check endpoint.
///
/// # Panics
///
/// This function never panics.
async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `GET /metrics` — Prometheus metrics endpoint.
///
/// # Panics
///
/// This function never panics.
async fn metrics_handler() -> String {
    crate::metrics::gather_metrics()
}

// ============================================================================
// Static Form
// ============================================================================

/// Static HTML page with the prediction form.
const INDEX_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>CO2 Emission Predictor</title>
  <style>
    body { font-family: sans-serif; max-width: 40rem; margin: 2rem auto; padding: 0 1rem; }
    label { display: block; margin-top: 0.75rem; }
    input { display: block; width: 100%; padding: 0.4rem; margin-top: 0.25rem; box-sizing: border-box; }
    button { margin-top: 1rem; padding: 0.5rem 1.5rem; }
    #result { margin-top: 1rem; font-weight: bold; }
    #result.error { color: #b00020; }
  </style>
</head>
<body>
  <h1>Vehicle CO2 Emission Predictor</h1>
  <p>Enter the vehicle details below to estimate its CO2 emissions in g/km.</p>
  <form id="predict-form">
    <label>Make
      <input name="Make" placeholder="TOYOTA" required>
    </label>
    <label>Model
      <input name="Model" placeholder="COROLLA" required>
    </label>
    <label>Vehicle Class
      <input name="Vehicle Class" placeholder="COMPACT" required>
    </label>
    <label>Transmission
      <input name="Transmission" placeholder="AS5" required>
    </label>
    <label>Fuel Type
      <input name="Fuel Type" placeholder="X" required>
    </label>
    <label>Engine Size (L)
      <input name="Engine Size(L)" type="number" step="0.1" min="0" placeholder="1.8" required>
    </label>
    <label>Cylinders
      <input name="Cylinders" type="number" step="1" min="1" placeholder="4" required>
    </label>
    <button type="submit">Predict</button>
  </form>
  <p id="result"></p>
  <script>
    const form = document.getElementById('predict-form');
    const result = document.getElementById('result');
    form.addEventListener('submit', async (event) => {
      event.preventDefault();
      const data = Object.fromEntries(new FormData(form));
      data['Engine Size(L)'] = parseFloat(data['Engine Size(L)']);
      data['Cylinders'] = parseInt(data['Cylinders'], 10);
      result.className = '';
      result.textContent = 'Predicting…';
      try {
        const resp = await fetch('/predict', {
          method: 'POST',
          headers: { 'Content-Type': 'application/json' },
          body: JSON.stringify(data),
        });
        const body = await resp.json();
        if (resp.ok) {
          result.textContent = 'Estimated CO2 emissions: ' + body.prediction + ' g/km';
        } else {
          result.className = 'error';
          result.textContent = 'Error: ' + body.error;
        }
      } catch (err) {
        result.className = 'error';
        result.textContent = 'Request failed: ' + err;
      }
    });
  </script>
</body>
</html>
"##;

// ============================================================================
// Error Type
// ============================================================================

/// Wraps a [`PredictionError`] so it can be returned from API handlers.
///
/// Client errors (missing field, bad type) map to 400 with a JSON body that
/// names the offending field. Everything else maps to 500 with an opaque
/// body; the detail lives in the logs.
#[derive(Debug)]
struct AppError(PredictionError);

impl From<PredictionError> for AppError {
    fn from(err: PredictionError) -> Self {
        Self(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.0.is_client_error() {
            let field = match &self.0 {
                PredictionError::MissingField { field }
                | PredictionError::TypeConversion { field, .. } => Some(field.clone()),
                _ => None,
            };
            let body = serde_json::json!({
                "error": self.0.to_string(),
                "field": field,
            });
            return (StatusCode::BAD_REQUEST, Json(body)).into_response();
        }

        // Internal detail stays out of the response body.
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": "prediction failed"})),
        )
            .into_response()
    }
}

// ============================================================================
// Tests
// ============================================================================
