//! Microsoft Clarity data export client.

use core::fmt;

use common::AttemptResult;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

const TRAFFIC_METRIC: &str = "Traffic";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Dimension {
    Page,
    Os,
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Page => "Page",
            Self::Os => "OS",
        })
    }
}

/// One metric of the live insights export, with its per-dimension rows.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct MetricGroup {
    #[serde(rename = "metricName")]
    pub(crate) metric_name: String,
    #[serde(default)]
    pub(crate) information: Vec<Map<String, Value>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct TrafficTotals {
    pub(crate) sessions: u64,
    pub(crate) bot_sessions: u64,
    pub(crate) distinct_users: u64,
}

impl TrafficTotals {
    pub(crate) fn real_sessions(&self) -> u64 {
        self.sessions.saturating_sub(self.bot_sessions)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub(crate) enum InsightsError {
    #[error("Nenhum dado encontrado na resposta da API")]
    Empty,
    #[error("Dados de tráfego não encontrados")]
    MissingTraffic,
    #[error("Nenhum dado encontrado para a URL: {0}")]
    NoMatchingPage(String),
}

#[derive(Clone)]
pub(crate) struct ClarityClient {
    http: Client,
    base_url: String,
    project_id: String,
    api_token: String,
}

impl ClarityClient {
    pub(crate) fn new(http: Client, base_url: String, project_id: String, api_token: String) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            project_id,
            api_token,
        }
    }

    /// Fetches the live insights of the last `num_days` days split by
    /// `dimension`. Non-2xx answers become failures for the retry policy.
    pub(crate) async fn live_insights(
        &self,
        num_days: i64,
        dimension: Dimension,
    ) -> reqwest::Result<AttemptResult<Vec<MetricGroup>>> {
        info!(project_id = %self.project_id, num_days, %dimension, "Querying Clarity live insights");
        let response = self
            .http
            .get(format!("{}/project-live-insights", self.base_url))
            .bearer_auth(&self.api_token)
            .query(&[("numOfDays", num_days.to_string()), ("dimension1", dimension.to_string())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let reason = status.canonical_reason().unwrap_or("Unknown");
            warn!(status = status.as_u16(), reason, "Clarity rejected the query");
            return Ok(AttemptResult::failure(format!("HTTP error: {} - {reason}", status.as_u16())));
        }
        Ok(AttemptResult::Success(response.json().await?))
    }
}

/// Clarity reports counts as strings; tolerate plain numbers as well.
fn count(row: &Map<String, Value>, key: &str) -> u64 {
    match row.get(key) {
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        _ => 0,
    }
}

/// Sums the `Traffic` rows, optionally keeping only pages whose URL contains
/// `page_filter` (case-insensitive).
pub(crate) fn traffic_totals(
    metrics: &[MetricGroup],
    page_filter: Option<&str>,
) -> Result<TrafficTotals, InsightsError> {
    if metrics.is_empty() {
        return Err(InsightsError::Empty);
    }
    let traffic = metrics
        .iter()
        .find(|metric| metric.metric_name == TRAFFIC_METRIC)
        .ok_or(InsightsError::MissingTraffic)?;

    let needle = page_filter.map(str::to_lowercase);
    let rows: Vec<&Map<String, Value>> = traffic
        .information
        .iter()
        .filter(|row| match &needle {
            Some(needle) => row
                .get("Page")
                .and_then(Value::as_str)
                .is_some_and(|page| page.to_lowercase().contains(needle.as_str())),
            None => true,
        })
        .collect();

    if let (Some(filter), true) = (page_filter, rows.is_empty()) {
        return Err(InsightsError::NoMatchingPage(filter.to_string()));
    }

    Ok(rows.iter().fold(TrafficTotals::default(), |totals, row| TrafficTotals {
        sessions: totals.sessions + count(row, "totalSessionCount"),
        bot_sessions: totals.bot_sessions + count(row, "totalBotSessionCount"),
        distinct_users: totals.distinct_users + count(row, "distantUserCount"),
    }))
}
