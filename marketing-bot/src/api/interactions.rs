use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use metrics::counter;
use serde_json::Value;
use tracing::warn;

use super::ApiError;
use crate::commands;
use crate::context::BotContext;
use crate::discord::Interaction;
use crate::discord::verify::{SIGNATURE_HEADER, TIMESTAMP_HEADER};

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, ApiError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthorized)
}

/// Discord posts every interaction here and expects an answer within three
/// seconds; unsigned or tampered requests must be refused with 401.
pub(super) async fn handle(
    State(ctx): State<Arc<BotContext>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let signature = header(&headers, SIGNATURE_HEADER)?;
    let timestamp = header(&headers, TIMESTAMP_HEADER)?;
    if let Err(e) = ctx.verifier.verify(signature, timestamp, &body) {
        counter!("marketing_bot.interaction.rejected").increment(1);
        warn!(error = %e, "Rejected interaction with an invalid signature");
        return Err(ApiError::Unauthorized);
    }

    let interaction: Interaction =
        serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(format!("Interação malformada: {e}")))?;
    Ok(Json(commands::dispatch(&ctx, interaction)))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::json;

    use super::*;
    use crate::api::tests::{app, send};
    use crate::discord::verify::tests::sign;

    fn signed(body: &str, signature: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/interactions")
            .header("content-type", "application/json")
            .header(SIGNATURE_HEADER, signature)
            .header(TIMESTAMP_HEADER, "1700000000")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn answers_signed_pings() {
        let body = r#"{"id":"1","application_id":"app","type":1,"token":"tok","version":1}"#;
        let (status, reply) = send(app(), signed(body, &sign("1700000000", body.as_bytes()))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply, json!({ "type": 1 }));
    }

    #[tokio::test]
    async fn refuses_bad_signatures() {
        let body = r#"{"id":"1","type":1,"token":"tok"}"#;
        let forged = sign("1700000000", br#"{"id":"2","type":1,"token":"tok"}"#);
        let (status, reply) = send(app(), signed(body, &forged)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(reply["success"], false);
    }

    #[tokio::test]
    async fn refuses_unsigned_requests() {
        let request = Request::builder()
            .method("POST")
            .uri("/interactions")
            .body(Body::from(r#"{"type":1}"#))
            .unwrap();
        let (status, _) = send(app(), request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn signed_garbage_is_a_bad_request() {
        let body = "not json";
        let (status, _) = send(app(), signed(body, &sign("1700000000", body.as_bytes()))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
