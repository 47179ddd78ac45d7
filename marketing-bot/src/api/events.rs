use core::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{ConnectInfo, Query, State};
use axum::http::header::USER_AGENT;
use axum::http::{HeaderMap, StatusCode};
use metrics::counter;
use serde::Deserialize;
use serde_json::{Value, json};
use time::macros::format_description;
use time::{Date, OffsetDateTime};
use tracing::info;
use url::Url;

use super::{ApiError, now_rfc3339};
use crate::context::BotContext;
use crate::store::{LeadEvent, PageviewEvent};

type Created = (StatusCode, Json<Value>);

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct PageviewInput {
    session_id: String,
    page_url: String,
    #[serde(default)]
    user_ip: Option<String>,
    #[serde(default)]
    user_agent: Option<String>,
    #[serde(default)]
    referrer: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    timestamp: Option<OffsetDateTime>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct LeadInput {
    session_id: String,
    #[serde(default)]
    lead_empresa: Option<String>,
    #[serde(default)]
    lead_nome: Option<String>,
    #[serde(default)]
    lead_email: Option<String>,
    #[serde(default)]
    lead_telefone: Option<String>,
    #[serde(default)]
    lead_estado: Option<String>,
    #[serde(default)]
    lead_cidade: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    medium: Option<String>,
    #[serde(default)]
    campaign: Option<String>,
    #[serde(default)]
    term: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    landing_page: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    timestamp: Option<OffsetDateTime>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EventsByEmailQuery {
    email: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
}

fn invalid(message: impl Into<String>) -> ApiError {
    ApiError::Validation(message.into())
}

/// Empty strings count as absent.
fn present(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn check_len(field: &str, value: Option<&str>, max: usize) -> Result<(), ApiError> {
    match value {
        Some(v) if v.chars().count() > max => Err(invalid(format!("\"{field}\" deve ter no máximo {max} caracteres"))),
        _ => Ok(()),
    }
}

fn check_url(field: &str, value: Option<&str>) -> Result<(), ApiError> {
    match value {
        Some(v) if Url::parse(v).is_err() => Err(invalid(format!("\"{field}\" deve ser uma URL válida"))),
        _ => Ok(()),
    }
}

fn check_email(value: Option<&str>) -> Result<(), ApiError> {
    let Some(email) = value else {
        return Ok(());
    };
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.') && !domain.ends_with('.'));
    if valid {
        Ok(())
    } else {
        Err(invalid("\"lead_email\" deve ser um e-mail válido"))
    }
}

fn check_session(session_id: &str) -> Result<(), ApiError> {
    if session_id.trim().is_empty() {
        return Err(invalid("\"session_id\" é obrigatório"));
    }
    check_len("session_id", Some(session_id), 255)
}

/// First hop of `X-Forwarded-For`, falling back to the peer address.
fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
}

fn header_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}

impl PageviewInput {
    fn into_event(self, headers: &HeaderMap, peer: Option<SocketAddr>) -> Result<PageviewEvent, ApiError> {
        check_session(&self.session_id)?;
        if Url::parse(self.page_url.trim()).is_err() {
            return Err(invalid("\"page_url\" deve ser uma URL válida"));
        }
        let referrer = present(self.referrer);
        check_url("referrer", referrer.as_deref())?;
        let user_agent = present(self.user_agent).or_else(|| header_user_agent(headers));
        check_len("user_agent", user_agent.as_deref(), 1000)?;
        let user_ip = match present(self.user_ip) {
            Some(ip) => {
                ip.parse::<IpAddr>()
                    .map_err(|_| invalid("\"user_ip\" deve ser um endereço IP válido"))?;
                Some(ip)
            }
            None => client_ip(headers, peer),
        };

        Ok(PageviewEvent {
            session_id: self.session_id.trim().to_string(),
            user_ip,
            user_agent,
            page_url: self.page_url.trim().to_string(),
            referrer,
            timestamp: self.timestamp.unwrap_or_else(OffsetDateTime::now_utc),
        })
    }
}

impl LeadInput {
    fn into_event(self) -> Result<LeadEvent, ApiError> {
        check_session(&self.session_id)?;
        let event = LeadEvent {
            session_id: self.session_id.trim().to_string(),
            lead_empresa: present(self.lead_empresa),
            lead_nome: present(self.lead_nome),
            lead_email: present(self.lead_email),
            lead_telefone: present(self.lead_telefone),
            lead_estado: present(self.lead_estado),
            lead_cidade: present(self.lead_cidade),
            source: present(self.source),
            medium: present(self.medium),
            campaign: present(self.campaign),
            term: present(self.term),
            content: present(self.content),
            landing_page: present(self.landing_page),
            timestamp: self.timestamp,
        };

        check_len("lead_empresa", event.lead_empresa.as_deref(), 255)?;
        check_len("lead_nome", event.lead_nome.as_deref(), 255)?;
        check_len("lead_email", event.lead_email.as_deref(), 255)?;
        check_email(event.lead_email.as_deref())?;
        check_len("lead_telefone", event.lead_telefone.as_deref(), 50)?;
        check_len("lead_estado", event.lead_estado.as_deref(), 100)?;
        check_len("lead_cidade", event.lead_cidade.as_deref(), 255)?;
        check_len("source", event.source.as_deref(), 100)?;
        check_len("medium", event.medium.as_deref(), 100)?;
        check_len("campaign", event.campaign.as_deref(), 255)?;
        check_len("term", event.term.as_deref(), 255)?;
        check_len("content", event.content.as_deref(), 255)?;
        check_url("landing_page", event.landing_page.as_deref())?;
        Ok(event)
    }
}

fn created(event_id: i64, message: &str) -> Created {
    (
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "event_id": event_id,
            "message": message,
            "timestamp": now_rfc3339(),
        })),
    )
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(input)| input)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

pub(super) async fn pageview(
    State(ctx): State<Arc<BotContext>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    payload: Result<Json<PageviewInput>, JsonRejection>,
) -> Result<Created, ApiError> {
    let event = body(payload)?.into_event(&headers, peer.map(|ConnectInfo(addr)| addr))?;
    let id = ctx.store.insert_pageview(&event).await?;
    counter!("marketing_bot.events.pageview").increment(1);
    info!(id, session_id = %event.session_id, page_url = %event.page_url, "Pageview recorded");
    Ok(created(id, "Evento pageview registrado com sucesso"))
}

pub(super) async fn click_cta(
    State(ctx): State<Arc<BotContext>>,
    payload: Result<Json<LeadInput>, JsonRejection>,
) -> Result<Created, ApiError> {
    let event = body(payload)?.into_event()?;
    let id = ctx.store.insert_click_cta(&event).await?;
    counter!("marketing_bot.events.click_cta").increment(1);
    info!(id, session_id = %event.session_id, campaign = ?event.campaign, "CTA click recorded");
    Ok(created(id, "Evento click-cta-mlg registrado com sucesso"))
}

pub(super) async fn submit_form(
    State(ctx): State<Arc<BotContext>>,
    payload: Result<Json<LeadInput>, JsonRejection>,
) -> Result<Created, ApiError> {
    let event = body(payload)?.into_event()?;
    let id = ctx.store.insert_submit_form(&event).await?;
    counter!("marketing_bot.events.submit_form").increment(1);
    info!(id, session_id = %event.session_id, campaign = ?event.campaign, "Form submission recorded");
    Ok(created(id, "Evento submit-form-mlg registrado com sucesso"))
}

fn parse_day(field: &str, value: Option<String>) -> Result<Option<Date>, ApiError> {
    present(value)
        .map(|v| {
            Date::parse(&v, format_description!("[year]-[month]-[day]"))
                .map_err(|_| invalid(format!("\"{field}\" deve ser uma data no formato AAAA-MM-DD")))
        })
        .transpose()
}

pub(super) async fn events_by_email(
    State(ctx): State<Arc<BotContext>>,
    query: Result<Query<EventsByEmailQuery>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(query) = query.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let email = present(query.email).ok_or_else(|| invalid("\"email\" é obrigatório"))?;
    check_email(Some(&email))?;
    let start = parse_day("start_date", query.start_date)?;
    let end = parse_day("end_date", query.end_date)?;

    let events = ctx.store.events_by_email(&email, start, end).await?;
    info!(total = events.total_events, "Lead events listed");
    Ok(Json(json!({ "success": true, "email": email, "data": events })))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::*;
    use crate::api::tests::{app, post_json, send};

    #[tokio::test]
    async fn unknown_fields_are_rejected() {
        let (status, body) = send(
            app(),
            post_json(
                "/api/events/pageview",
                &json!({ "session_id": "s1", "page_url": "https://4.events/pt-br/x", "utm": "nope" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Requisição inválida");
    }

    #[tokio::test]
    async fn pageview_requires_a_valid_page_url() {
        let (status, body) = send(
            app(),
            post_json("/api/events/pageview", &json!({ "session_id": "s1", "page_url": "not a url" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "\"page_url\" deve ser uma URL válida");
    }

    #[tokio::test]
    async fn lead_email_is_checked() {
        let (status, body) = send(
            app(),
            post_json("/api/events/submit-form-mlg", &json!({ "session_id": "s1", "lead_email": "ana@" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Erro de validação");
    }

    #[tokio::test]
    async fn report_requires_an_email() {
        let request = axum::http::Request::builder()
            .uri("/api/reports/events-by-email?start_date=2025-01-01")
            .body(axum::body::Body::empty())
            .unwrap();
        let (status, body) = send(app(), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "\"email\" é obrigatório");
    }

    #[test]
    fn pageview_fills_ip_and_user_agent_from_the_request() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        headers.insert(USER_AGENT, "Mozilla/5.0".parse().unwrap());
        let input: PageviewInput =
            serde_json::from_value(json!({ "session_id": " s1 ", "page_url": "https://4.events/pt-br/x", "referrer": "" }))
                .unwrap();

        let event = input.into_event(&headers, None).unwrap();

        assert_eq!(event.session_id, "s1");
        assert_eq!(event.user_ip.as_deref(), Some("203.0.113.7"));
        assert_eq!(event.user_agent.as_deref(), Some("Mozilla/5.0"));
        assert_eq!(event.referrer, None);
    }

    #[test]
    fn peer_address_is_the_ip_fallback() {
        let peer: SocketAddr = "198.51.100.4:5555".parse().unwrap();
        assert_eq!(client_ip(&HeaderMap::new(), Some(peer)).as_deref(), Some("198.51.100.4"));
        assert_eq!(client_ip(&HeaderMap::new(), None), None);
    }

    #[test]
    fn lead_limits() {
        let long: LeadInput =
            serde_json::from_value(json!({ "session_id": "s1", "lead_telefone": "9".repeat(51) })).unwrap();
        assert!(matches!(long.into_event(), Err(ApiError::Validation(m)) if m.contains("lead_telefone")));

        let ok: LeadInput = serde_json::from_value(json!({
            "session_id": "s1",
            "lead_email": "ana@example.com",
            "campaign": "summit",
            "landing_page": "https://4.events/pt-br/summit",
        }))
        .unwrap();
        let event = ok.into_event().unwrap();
        assert_eq!(event.campaign.as_deref(), Some("summit"));
        assert_eq!(event.timestamp, None);
    }

    #[test]
    fn report_dates_use_iso_days() {
        assert_eq!(
            parse_day("start_date", Some("2025-01-31".to_string())).unwrap(),
            Some(time::macros::date!(2025 - 01 - 31))
        );
        assert!(parse_day("start_date", Some("31/01/2025".to_string())).is_err());
        assert_eq!(parse_day("start_date", None).unwrap(), None);
    }
}
