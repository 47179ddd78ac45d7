//! Webhook client for the N8N automation flows that create CRM cards.

use common::AttemptResult;
use reqwest::{Client, Response};
use serde::Serialize;
use serde_json::{Value, json};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::discord::Requester;
use crate::validation::ValidDate;

const PLATFORM: &str = "Discord";

#[derive(Debug, Clone)]
pub(crate) struct TaskRequest {
    pub(crate) title: String,
    pub(crate) details: String,
    pub(crate) deadline: ValidDate,
    pub(crate) requester: Requester,
}

#[derive(Debug, Clone)]
pub(crate) struct PartnershipRequest {
    pub(crate) card_url: String,
    pub(crate) event_date: ValidDate,
    pub(crate) requester: Requester,
}

#[derive(Serialize)]
struct DatePayload<'a> {
    #[serde(rename = "dataFormatada")]
    formatted: &'a str,
    #[serde(rename = "dataISO")]
    iso: &'a str,
}

impl<'a> From<&'a ValidDate> for DatePayload<'a> {
    fn from(date: &'a ValidDate) -> Self {
        Self {
            formatted: &date.formatted,
            iso: &date.iso,
        }
    }
}

#[derive(Serialize)]
struct TaskPayload<'a> {
    #[serde(rename = "cardTitle")]
    card_title: &'a str,
    detalhes: &'a str,
    prazo: DatePayload<'a>,
    #[serde(rename = "solicitadoPor")]
    requested_by: &'a Requester,
    #[serde(with = "time::serde::rfc3339")]
    timestamp: OffsetDateTime,
    plataforma: &'static str,
}

#[derive(Serialize)]
struct PartnershipPayload<'a> {
    #[serde(rename = "cardURL")]
    card_url: &'a str,
    #[serde(rename = "dataEvento")]
    event_date: DatePayload<'a>,
    #[serde(rename = "solicitadoPor")]
    requested_by: &'a Requester,
    #[serde(with = "time::serde::rfc3339")]
    timestamp: OffsetDateTime,
    plataforma: &'static str,
}

#[derive(Clone)]
pub(crate) struct AutomationClient {
    http: Client,
    task_webhook_url: String,
    partnership_webhook_url: String,
}

impl AutomationClient {
    pub(crate) fn new(http: Client, task_webhook_url: String, partnership_webhook_url: String) -> Self {
        Self {
            http,
            task_webhook_url,
            partnership_webhook_url,
        }
    }

    /// Creates a marketing task card.
    ///
    /// HTTP-level failures are reported as [`AttemptResult::Failure`] so the
    /// retry policy can classify them; transport errors are returned as `Err`.
    pub(crate) async fn submit_task(&self, request: &TaskRequest) -> reqwest::Result<AttemptResult<Value>> {
        info!(
            title = %request.title,
            deadline = %request.deadline.formatted,
            requester = %request.requester.tag,
            "Sending task to automation webhook"
        );
        let payload = TaskPayload {
            card_title: &request.title,
            detalhes: &request.details,
            prazo: (&request.deadline).into(),
            requested_by: &request.requester,
            timestamp: OffsetDateTime::now_utc(),
            plataforma: PLATFORM,
        };
        let response = self.http.post(&self.task_webhook_url).json(&payload).send().await?;
        Ok(read_outcome(response).await)
    }

    /// Records a partnership against an existing card.
    pub(crate) async fn submit_partnership(
        &self,
        request: &PartnershipRequest,
    ) -> reqwest::Result<AttemptResult<Value>> {
        info!(
            card_url = %request.card_url,
            event_date = %request.event_date.formatted,
            requester = %request.requester.tag,
            "Sending partnership to automation webhook"
        );
        let payload = PartnershipPayload {
            card_url: &request.card_url,
            event_date: (&request.event_date).into(),
            requested_by: &request.requester,
            timestamp: OffsetDateTime::now_utc(),
            plataforma: PLATFORM,
        };
        let response = self
            .http
            .post(&self.partnership_webhook_url)
            .json(&payload)
            .send()
            .await?;
        Ok(read_outcome(response).await)
    }
}

async fn read_outcome(response: Response) -> AttemptResult<Value> {
    let status = response.status();
    if !status.is_success() {
        let reason = status.canonical_reason().unwrap_or("Unknown");
        warn!(status = status.as_u16(), reason, "Automation webhook rejected the request");
        return AttemptResult::failure(format!("HTTP error: {} - {reason}", status.as_u16()));
    }

    let body = match response.json::<Value>().await {
        Ok(body) => body,
        Err(e) => {
            debug!(error = %e, "Automation webhook returned a non-JSON body");
            json!({ "success": true })
        }
    };
    AttemptResult::Success(body)
}

/// Object carrying the card fields: the body itself, or its first element
/// when the flow answers with an array.
fn card_object(data: &Value) -> Option<&Value> {
    match data {
        Value::Array(items) => items.first(),
        Value::Object(_) => Some(data),
        _ => None,
    }
}

/// Link to the created card, if the flow reported one.
pub(crate) fn task_url(data: &Value) -> Option<String> {
    let card = card_object(data)?;
    ["url", "taskUrl", "cardUrl"]
        .iter()
        .find_map(|key| card.get(key).and_then(Value::as_str))
        .map(ToString::to_string)
}

/// Name of the card a partnership was attached to, if reported.
pub(crate) fn card_name(data: &Value) -> Option<String> {
    card_object(data)?
        .get("name")
        .and_then(Value::as_str)
        .map(ToString::to_string)
}
