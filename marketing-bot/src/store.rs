//! Funnel event storage in Postgres.

use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::{Date, OffsetDateTime};
use tracing::{debug, info};

const MIGRATIONS: &[&str] = &[
    r"CREATE TABLE IF NOT EXISTS pageview_events (
        id BIGSERIAL PRIMARY KEY,
        session_id VARCHAR(255) NOT NULL,
        user_ip VARCHAR(45),
        user_agent TEXT,
        page_url TEXT NOT NULL,
        referrer TEXT,
        timestamp TIMESTAMPTZ NOT NULL DEFAULT now(),
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE INDEX IF NOT EXISTS idx_pageview_session_id ON pageview_events (session_id)",
    "CREATE INDEX IF NOT EXISTS idx_pageview_timestamp ON pageview_events (timestamp)",
    r"CREATE TABLE IF NOT EXISTS click_cta_events (
        id BIGSERIAL PRIMARY KEY,
        session_id VARCHAR(255) NOT NULL,
        lead_empresa VARCHAR(255),
        lead_nome VARCHAR(255),
        lead_email VARCHAR(255),
        lead_telefone VARCHAR(50),
        lead_estado VARCHAR(100),
        lead_cidade VARCHAR(255),
        source VARCHAR(100),
        medium VARCHAR(100),
        campaign VARCHAR(255),
        term VARCHAR(255),
        content VARCHAR(255),
        landing_page TEXT,
        timestamp TIMESTAMPTZ NOT NULL DEFAULT now(),
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE INDEX IF NOT EXISTS idx_click_cta_lead_email ON click_cta_events (lead_email)",
    "CREATE INDEX IF NOT EXISTS idx_click_cta_campaign ON click_cta_events (campaign)",
    "CREATE INDEX IF NOT EXISTS idx_click_cta_timestamp ON click_cta_events (timestamp)",
    r"CREATE TABLE IF NOT EXISTS submit_form_events (
        id BIGSERIAL PRIMARY KEY,
        session_id VARCHAR(255) NOT NULL,
        lead_empresa VARCHAR(255),
        lead_nome VARCHAR(255),
        lead_email VARCHAR(255),
        lead_telefone VARCHAR(50),
        lead_estado VARCHAR(100),
        lead_cidade VARCHAR(255),
        source VARCHAR(100),
        medium VARCHAR(100),
        campaign VARCHAR(255),
        term VARCHAR(255),
        content VARCHAR(255),
        landing_page TEXT,
        timestamp TIMESTAMPTZ NOT NULL DEFAULT now(),
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE INDEX IF NOT EXISTS idx_submit_form_lead_email ON submit_form_events (lead_email)",
    "CREATE INDEX IF NOT EXISTS idx_submit_form_campaign ON submit_form_events (campaign)",
    "CREATE INDEX IF NOT EXISTS idx_submit_form_timestamp ON submit_form_events (timestamp)",
];

const LEAD_COLUMNS: &str = "id, session_id, lead_empresa, lead_nome, lead_email, lead_telefone, \
     lead_estado, lead_cidade, source, medium, campaign, term, content, landing_page, timestamp";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LeadTable {
    ClickCta,
    SubmitForm,
}

impl LeadTable {
    fn name(self) -> &'static str {
        match self {
            Self::ClickCta => "click_cta_events",
            Self::SubmitForm => "submit_form_events",
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct PageviewEvent {
    pub(crate) session_id: String,
    pub(crate) user_ip: Option<String>,
    pub(crate) user_agent: Option<String>,
    pub(crate) page_url: String,
    pub(crate) referrer: Option<String>,
    pub(crate) timestamp: OffsetDateTime,
}

/// A CTA click or form submission, with the lead and UTM fields it carried.
#[derive(Debug, Clone, Default)]
pub(crate) struct LeadEvent {
    pub(crate) session_id: String,
    pub(crate) lead_empresa: Option<String>,
    pub(crate) lead_nome: Option<String>,
    pub(crate) lead_email: Option<String>,
    pub(crate) lead_telefone: Option<String>,
    pub(crate) lead_estado: Option<String>,
    pub(crate) lead_cidade: Option<String>,
    pub(crate) source: Option<String>,
    pub(crate) medium: Option<String>,
    pub(crate) campaign: Option<String>,
    pub(crate) term: Option<String>,
    pub(crate) content: Option<String>,
    pub(crate) landing_page: Option<String>,
    pub(crate) timestamp: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub(crate) struct LeadEventRow {
    pub(crate) id: i64,
    pub(crate) session_id: String,
    pub(crate) lead_empresa: Option<String>,
    pub(crate) lead_nome: Option<String>,
    pub(crate) lead_email: Option<String>,
    pub(crate) lead_telefone: Option<String>,
    pub(crate) lead_estado: Option<String>,
    pub(crate) lead_cidade: Option<String>,
    pub(crate) source: Option<String>,
    pub(crate) medium: Option<String>,
    pub(crate) campaign: Option<String>,
    pub(crate) term: Option<String>,
    pub(crate) content: Option<String>,
    pub(crate) landing_page: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub(crate) timestamp: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct EmailEvents {
    pub(crate) click_cta_events: Vec<LeadEventRow>,
    pub(crate) submit_form_events: Vec<LeadEventRow>,
    pub(crate) total_events: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, FromRow)]
pub(crate) struct FunnelCounts {
    pub(crate) total: i64,
    pub(crate) unique_emails: i64,
    pub(crate) distinct_cities: i64,
    pub(crate) distinct_campaigns: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub(crate) struct LeadsStats {
    pub(crate) clicks: FunnelCounts,
    pub(crate) submissions: FunnelCounts,
}

impl LeadsStats {
    /// Share of clicks that turned into a form submission, in percent.
    pub(crate) fn conversion_rate(&self) -> f64 {
        if self.clicks.total == 0 {
            return 0.0;
        }
        self.submissions.total as f64 / self.clicks.total as f64 * 100.0
    }
}

#[derive(Clone)]
pub(crate) struct EventStore {
    pool: PgPool,
}

impl EventStore {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub(crate) async fn migrate(&self) -> sqlx::Result<()> {
        for statement in MIGRATIONS {
            sqlx::query(*statement).execute(&self.pool).await?;
        }
        info!("Event tables verified");
        Ok(())
    }

    pub(crate) async fn is_healthy(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    pub(crate) async fn insert_pageview(&self, event: &PageviewEvent) -> sqlx::Result<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO pageview_events (session_id, user_ip, user_agent, page_url, referrer, timestamp) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
        )
        .bind(&event.session_id)
        .bind(&event.user_ip)
        .bind(&event.user_agent)
        .bind(&event.page_url)
        .bind(&event.referrer)
        .bind(event.timestamp)
        .fetch_one(&self.pool)
        .await?;
        debug!(id, session_id = %event.session_id, "Pageview stored");
        Ok(id)
    }

    pub(crate) async fn insert_click_cta(&self, event: &LeadEvent) -> sqlx::Result<i64> {
        self.insert_lead(LeadTable::ClickCta, event).await
    }

    pub(crate) async fn insert_submit_form(&self, event: &LeadEvent) -> sqlx::Result<i64> {
        self.insert_lead(LeadTable::SubmitForm, event).await
    }

    async fn insert_lead(&self, table: LeadTable, event: &LeadEvent) -> sqlx::Result<i64> {
        let sql = format!(
            "INSERT INTO {} (session_id, lead_empresa, lead_nome, lead_email, lead_telefone, \
             lead_estado, lead_cidade, source, medium, campaign, term, content, landing_page, timestamp) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, COALESCE($14, now())) \
             RETURNING id",
            table.name()
        );
        let id: i64 = sqlx::query_scalar(&sql)
            .bind(&event.session_id)
            .bind(&event.lead_empresa)
            .bind(&event.lead_nome)
            .bind(&event.lead_email)
            .bind(&event.lead_telefone)
            .bind(&event.lead_estado)
            .bind(&event.lead_cidade)
            .bind(&event.source)
            .bind(&event.medium)
            .bind(&event.campaign)
            .bind(&event.term)
            .bind(&event.content)
            .bind(&event.landing_page)
            .bind(event.timestamp)
            .fetch_one(&self.pool)
            .await?;
        debug!(id, table = table.name(), session_id = %event.session_id, "Lead event stored");
        Ok(id)
    }

    async fn lead_events(
        &self,
        table: LeadTable,
        email: &str,
        start: Option<Date>,
        end: Option<Date>,
    ) -> sqlx::Result<Vec<LeadEventRow>> {
        let sql = format!(
            "SELECT {LEAD_COLUMNS} FROM {} WHERE lead_email = $1 \
             AND ($2::date IS NULL OR timestamp::date >= $2) \
             AND ($3::date IS NULL OR timestamp::date <= $3) \
             ORDER BY timestamp DESC",
            table.name()
        );
        sqlx::query_as(&sql)
            .bind(email)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await
    }

    /// Every CTA click and form submission of one lead, newest first.
    pub(crate) async fn events_by_email(
        &self,
        email: &str,
        start: Option<Date>,
        end: Option<Date>,
    ) -> sqlx::Result<EmailEvents> {
        let click_cta_events = self.lead_events(LeadTable::ClickCta, email, start, end).await?;
        let submit_form_events = self.lead_events(LeadTable::SubmitForm, email, start, end).await?;
        Ok(EmailEvents {
            total_events: click_cta_events.len() + submit_form_events.len(),
            click_cta_events,
            submit_form_events,
        })
    }

    async fn funnel_counts(&self, table: LeadTable, days: i32, campaign: Option<&str>) -> sqlx::Result<FunnelCounts> {
        let sql = format!(
            "SELECT COUNT(*) AS total, \
             COUNT(DISTINCT lead_email) AS unique_emails, \
             COUNT(DISTINCT lead_cidade) AS distinct_cities, \
             COUNT(DISTINCT campaign) AS distinct_campaigns \
             FROM {} \
             WHERE timestamp::date >= CURRENT_DATE - $1::int \
             AND ($2::text IS NULL OR campaign ILIKE '%' || $2 || '%')",
            table.name()
        );
        sqlx::query_as(&sql)
            .bind(days - 1)
            .bind(campaign)
            .fetch_one(&self.pool)
            .await
    }

    /// Click and submission counts for the last `days` days, today included.
    pub(crate) async fn leads_stats(&self, days: i32, campaign: Option<&str>) -> sqlx::Result<LeadsStats> {
        Ok(LeadsStats {
            clicks: self.funnel_counts(LeadTable::ClickCta, days, campaign).await?,
            submissions: self.funnel_counts(LeadTable::SubmitForm, days, campaign).await?,
        })
    }
}
