use std::sync::Arc;

use common::{AttemptResult, ProgressMessage, RetryPolicy, retry_with_policy};
use serde_json::Value;
use time::Date;
use tracing::info;

use super::{failure_message, spawn_flow};
use crate::clarity::{ClarityClient, Dimension, TrafficTotals, traffic_totals};
use crate::context::BotContext;
use crate::discord::{Interaction, InteractionReply, render_final, response};
use crate::validation::{self, ValidDate, ValidationError, build_page_url, days_between, parse_query_date};

const DATE_OPTION: &str = "data_desejada";
const PAGE_OPTION: &str = "final_da_url_desejada";

#[derive(Debug, Clone, PartialEq, Eq)]
struct CroQuery {
    date: ValidDate,
    num_days: i64,
    page_url: Option<String>,
}

impl CroQuery {
    /// Without a date the last day is queried; a date means "from then until
    /// today", never less than one day.
    fn from_interaction(interaction: &Interaction, today: Date) -> Result<Self, ValidationError> {
        let date_input = interaction
            .option_str(DATE_OPTION)
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let (date, num_days) = match date_input {
            Some(input) => {
                let date = parse_query_date(input, today)?;
                let num_days = days_between(date.date, today).max(1);
                (date, num_days)
            }
            None => (ValidDate::new(today), 1),
        };
        let page_url = interaction
            .option_str(PAGE_OPTION)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(build_page_url);
        Ok(Self {
            date,
            num_days,
            page_url,
        })
    }

    fn dimension(&self) -> Dimension {
        if self.page_url.is_some() {
            Dimension::Page
        } else {
            Dimension::Os
        }
    }

    fn target(&self) -> &str {
        self.page_url.as_deref().unwrap_or("todas as páginas")
    }
}

pub(super) fn start(ctx: &Arc<BotContext>, interaction: Interaction) -> Value {
    let query = match CroQuery::from_interaction(&interaction, validation::today()) {
        Ok(query) => query,
        Err(e) => return response::ephemeral(&format!("❌ {e}")),
    };
    let ack = format!(
        "⏳ Consultando dados do Clarity para `{}` desde {} ({} dia(s))...",
        query.target(),
        query.date.formatted,
        query.num_days
    );
    let reply = InteractionReply::new(ctx.discord.clone(), interaction.token);
    let ctx = Arc::clone(ctx);
    spawn_flow("cro", async move { report(&ctx.retry_policy, &ctx.clarity, &reply, &query).await });
    response::message(&ack)
}

async fn report<M: ProgressMessage + Sync>(
    policy: &RetryPolicy,
    clarity: &ClarityClient,
    reply: &M,
    query: &CroQuery,
) -> anyhow::Result<()> {
    let result = retry_with_policy(policy, || clarity.live_insights(query.num_days, query.dimension())).await;
    let content = match result {
        AttemptResult::Success(metrics) => match traffic_totals(&metrics, query.page_url.as_deref()) {
            Ok(totals) => {
                info!(page = query.target(), sessions = totals.sessions, "CRO report ready");
                render(query, &totals)
            }
            Err(e) => format!("❌ **Erro ao processar dados**\n```{e}```\nTente novamente ou verifique os parâmetros."),
        },
        AttemptResult::Failure(error) => failure_message("Erro ao consultar Microsoft Clarity", &error, policy),
    };
    render_final(reply, &content).await
}

fn render(query: &CroQuery, totals: &TrafficTotals) -> String {
    format!(
        "📊 **Dados de performance (CRO)**\n\n\
         **Análise:** `{}`\n\
         **Período:** desde {} ({} dia(s))\n\
         **Total de sessões:** `{}`\n\
         **Sessões de bots:** `{}`\n\
         **Sessões reais:** `{}`\n\
         **Usuários distintos:** `{}`",
        query.target(),
        query.date.formatted,
        query.num_days,
        totals.sessions,
        totals.bot_sessions,
        totals.real_sessions(),
        totals.distinct_users,
    )
}
