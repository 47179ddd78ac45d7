//! HTTP surface: funnel event ingestion, lead reports, health and the
//! Discord interaction endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::context::BotContext;

mod events;
mod interactions;

/// Largest request body accepted on any route.
const MAX_BODY_BYTES: usize = 1024 * 1024;

const SERVICE_NAME: &str = env!("CARGO_PKG_NAME");
const VERSION: &str = env!("CARGO_PKG_VERSION");

const ENDPOINTS: &[&str] = &[
    "GET /health",
    "POST /api/events/pageview",
    "POST /api/events/click-cta-mlg",
    "POST /api/events/submit-form-mlg",
    "GET /api/reports/events-by-email",
    "POST /interactions",
];

#[derive(Debug, thiserror::Error)]
pub(crate) enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("Assinatura da requisição inválida")]
    Unauthorized,
    #[error("O endpoint solicitado não existe")]
    NotFound,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match &self {
            Self::Validation(_) => (StatusCode::BAD_REQUEST, "Erro de validação"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "Requisição inválida"),
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "Não autorizado"),
            Self::NotFound => (StatusCode::NOT_FOUND, "Rota não encontrada"),
            Self::Database(e) => {
                error!(error = %e, "Database error while handling request");
                (StatusCode::INTERNAL_SERVER_ERROR, "Erro interno do servidor")
            }
        };
        let message = match &self {
            Self::Database(_) => "Ocorreu um erro inesperado".to_string(),
            other => other.to_string(),
        };
        (
            status,
            Json(json!({ "success": false, "error": error, "message": message })),
        )
            .into_response()
    }
}

pub(crate) fn now_rfc3339() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default()
}

pub(crate) fn router(ctx: Arc<BotContext>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/events/pageview", post(events::pageview))
        .route("/api/events/click-cta-mlg", post(events::click_cta))
        .route("/api/events/submit-form-mlg", post(events::submit_form))
        .route("/api/reports/events-by-email", get(events::events_by_email))
        .route("/interactions", post(interactions::handle))
        .fallback(not_found)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(ctx)
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": SERVICE_NAME,
        "version": VERSION,
        "status": "running",
        "endpoints": ENDPOINTS,
    }))
}

async fn health(State(ctx): State<Arc<BotContext>>) -> (StatusCode, Json<Value>) {
    let database_up = ctx.store.is_healthy().await;
    let status = if database_up {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(json!({
            "status": if database_up { "ok" } else { "degraded" },
            "service": SERVICE_NAME,
            "version": VERSION,
            "timestamp": now_rfc3339(),
            "database": if database_up { "connected" } else { "disconnected" },
            "uptime_seconds": ctx.started_at.elapsed().as_secs(),
        })),
    )
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}

#[cfg(test)]
pub(crate) mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::discord::verify::tests::public_key_hex;

    pub(crate) fn app() -> Router {
        router(Arc::new(BotContext::for_tests("http://127.0.0.1:1", &public_key_hex())))
    }

    pub(crate) async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    pub(crate) fn post_json(uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn root_lists_the_endpoints() {
        let (status, body) = send(app(), get("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], "marketing-bot");
        assert_eq!(body["endpoints"].as_array().unwrap().len(), ENDPOINTS.len());
    }

    #[tokio::test]
    async fn unknown_routes_answer_json_404() {
        let (status, body) = send(app(), get("/nope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Rota não encontrada");
    }

    #[tokio::test]
    async fn oversized_bodies_are_refused() {
        let body = "x".repeat(MAX_BODY_BYTES + 1);
        let request = Request::builder()
            .method("POST")
            .uri("/api/events/pageview")
            .header("content-type", "application/json")
            .header("content-length", body.len())
            .body(Body::from(body))
            .unwrap();

        let (status, _) = send(app(), request).await;

        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn health_reports_an_unreachable_database() {
        let (status, body) = send(app(), get("/health")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["database"], "disconnected");
        assert_eq!(body["status"], "degraded");
    }
}
