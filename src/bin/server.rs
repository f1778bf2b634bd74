use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use strip_packer::config::{ServerConfig, SolverConfig};
use strip_packer::engine::CancelToken;
use strip_packer::types::{TrialReport, deserialize_u32_from_number};
use strip_packer::{Error, Item, Solver};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

#[derive(Deserialize, Serialize)]
struct SolveRequest {
    #[serde(deserialize_with = "deserialize_u32_from_number")]
    width: u32,
    items: Vec<ItemRequest>,
    #[serde(default)]
    timeout_ms: Option<u64>,
    #[serde(default)]
    speculative: Option<bool>,
}

#[derive(Deserialize, Serialize)]
struct ItemRequest {
    #[serde(default)]
    id: Option<String>,
    #[serde(deserialize_with = "deserialize_u32_from_number")]
    w: u32,
    #[serde(deserialize_with = "deserialize_u32_from_number")]
    h: u32,
}

#[derive(Serialize)]
struct SolveResponse {
    width: u32,
    height: u32,
    placements: Vec<PlacementResponse>,
    trials: Vec<TrialReport>,
}

#[derive(Serialize)]
struct PlacementResponse {
    id: String,
    x: u32,
    y: u32,
    w: u32,
    h: u32,
}

struct ApiError(Error);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            Error::EmptyInput => (StatusCode::BAD_REQUEST, "EMPTY_INPUT"),
            Error::InvalidWidth => (StatusCode::BAD_REQUEST, "INVALID_WIDTH"),
            Error::InvalidItem { .. } => (StatusCode::BAD_REQUEST, "INVALID_ITEM"),
            Error::DuplicateItem(_) => (StatusCode::BAD_REQUEST, "DUPLICATE_ITEM"),
            Error::SolverTimeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "SOLVER_TIMEOUT"),
            Error::SolverUnavailable(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "SOLVER_UNAVAILABLE")
            }
            Error::HeightCeilingExceeded { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "HEIGHT_CEILING_EXCEEDED")
            }
            Error::Cancelled => (StatusCode::SERVICE_UNAVAILABLE, "CANCELLED"),
        };
        if status.is_server_error() {
            tracing::error!(error = %self.0, "solve failed");
            sentry::capture_error(&self.0);
        }
        let body = Json(json!({
            "error": {
                "code": code,
                "message": self.0.to_string(),
            }
        }));
        (status, body).into_response()
    }
}

/// Stops the blocking solve when the request future is dropped before the
/// solve returns.
struct CancelOnDrop(Option<CancelToken>);

impl CancelOnDrop {
    fn disarm(mut self) {
        self.0 = None;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if let Some(token) = &self.0 {
            token.cancel();
        }
    }
}

async fn solve(
    State(defaults): State<Arc<SolverConfig>>,
    Json(req): Json<SolveRequest>,
) -> Result<Json<SolveResponse>, ApiError> {
    tracing::info!(
        body = serde_json::to_string(&req).unwrap_or_default(),
        "POST /solve"
    );

    let items: Vec<Item> = req
        .items
        .into_iter()
        .enumerate()
        .map(|(i, it)| Item::new(it.id.unwrap_or_else(|| (i + 1).to_string()), it.w, it.h))
        .collect();

    let mut config = (*defaults).clone();
    if let Some(ms) = req.timeout_ms {
        config.trial_timeout_ms = (ms > 0).then_some(ms);
    }
    if let Some(speculative) = req.speculative {
        config.speculative = speculative;
    }

    let solver = Solver::new(config).map_err(ApiError)?;
    let guard = CancelOnDrop(Some(solver.cancel_token()));
    let width = req.width;

    let (items, result) = tokio::task::spawn_blocking(move || {
        let result = solver.solve_strip(&items, width);
        (items, result)
    })
    .await
    .map_err(|e| ApiError(Error::SolverUnavailable(format!("solve task failed: {e}"))))?;
    guard.disarm();
    let result = result.map_err(ApiError)?;

    let placements = items
        .iter()
        .filter_map(|item| {
            result.get(&item.id).map(|p| PlacementResponse {
                id: item.id.clone(),
                x: p.x,
                y: p.y,
                w: item.w,
                h: item.h,
            })
        })
        .collect();

    Ok(Json(SolveResponse {
        width: result.width,
        height: result.height,
        placements,
        trials: result.trials,
    }))
}

fn app(defaults: SolverConfig) -> Router {
    Router::new()
        .route("/up", get(|| async { "ok" }))
        .route("/solve", post(solve))
        .with_state(Arc::new(defaults))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

#[tokio::main]
async fn main() {
    let config = ServerConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });

    let _sentry = config.sentry_dsn.as_deref().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open("development.log")
        .expect("failed to open development.log");

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_target(false)
        .with_ansi(false)
        .with_max_level(Level::INFO)
        .init();

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    eprintln!("Listening on {addr}");
    axum::serve(listener, app(config.solver)).await.unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn post_solve(body: &str) -> (StatusCode, serde_json::Value) {
        let response = app(SolverConfig::default())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/solve")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let response = app(SolverConfig::default())
            .oneshot(Request::builder().uri("/up").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_solve_stacks_wide_items() {
        let (status, body) = post_solve(
            r#"{"width":3,"items":[{"id":"a","w":3,"h":2},{"id":"b","w":3.0,"h":2}]}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["height"], 4);
        assert_eq!(body["placements"].as_array().unwrap().len(), 2);
        assert_eq!(body["trials"][0]["outcome"], "feasible");
    }

    #[tokio::test]
    async fn test_solve_numbers_anonymous_items() {
        let (status, body) = post_solve(r#"{"width":2,"items":[{"w":2,"h":2}]}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["placements"][0]["id"], "1");
        assert_eq!(body["placements"][0]["x"], 0);
    }

    #[tokio::test]
    async fn test_too_wide_item_is_bad_request() {
        let (status, body) = post_solve(r#"{"width":3,"items":[{"w":5,"h":1}]}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_ITEM");
    }

    #[tokio::test]
    async fn test_empty_items_is_bad_request() {
        let (status, body) = post_solve(r#"{"width":3,"items":[]}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "EMPTY_INPUT");
    }
}
