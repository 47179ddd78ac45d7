use std::sync::Arc;

use common::ProgressMessage;
use serde_json::Value;
use tracing::error;

use super::spawn_flow;
use crate::context::BotContext;
use crate::discord::{Interaction, InteractionReply, render_final, response};
use crate::store::{EventStore, LeadsStats};

const DAYS_OPTION: &str = "dias";
const CAMPAIGN_OPTION: &str = "campanha";
const MAX_DAYS: i64 = 90;

#[derive(Debug, Clone, PartialEq, Eq)]
struct LeadsQuery {
    days: i32,
    campaign: Option<String>,
}

impl LeadsQuery {
    fn from_interaction(interaction: &Interaction) -> Self {
        let days = interaction.option_i64(DAYS_OPTION).unwrap_or(1).clamp(1, MAX_DAYS);
        Self {
            days: i32::try_from(days).unwrap_or(1),
            campaign: interaction
                .option_str(CAMPAIGN_OPTION)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string),
        }
    }
}

pub(super) fn start(ctx: &Arc<BotContext>, interaction: Interaction) -> Value {
    let query = LeadsQuery::from_interaction(&interaction);
    let reply = InteractionReply::new(ctx.discord.clone(), interaction.token);
    let ctx = Arc::clone(ctx);
    spawn_flow("leads", async move { report(&ctx.store, &reply, &query).await });
    response::message("⏳ Buscando estatísticas de leads...")
}

async fn report<M: ProgressMessage + Sync>(store: &EventStore, reply: &M, query: &LeadsQuery) -> anyhow::Result<()> {
    let content = match store.leads_stats(query.days, query.campaign.as_deref()).await {
        Ok(stats) => render(query, &stats),
        Err(e) => {
            error!(error = %e, days = query.days, "Failed to load lead statistics");
            format!("❌ **Erro ao buscar estatísticas de leads**\n```{e}```\nTente novamente ou entre em contato com o suporte.")
        }
    };
    render_final(reply, &content).await
}

fn render(query: &LeadsQuery, stats: &LeadsStats) -> String {
    let scope = match &query.campaign {
        Some(campaign) => format!("últimos {} dia(s), campanha `{campaign}`", query.days),
        None => format!("últimos {} dia(s)", query.days),
    };
    format!(
        "📈 **Estatísticas de leads** ({scope})\n\n\
         **Cliques no CTA:** `{}` ({} e-mails únicos, {} cidades, {} campanhas)\n\
         **Formulários enviados:** `{}` ({} e-mails únicos, {} cidades, {} campanhas)\n\
         **Conversão clique → envio:** `{:.1}%`",
        stats.clicks.total,
        stats.clicks.unique_emails,
        stats.clicks.distinct_cities,
        stats.clicks.distinct_campaigns,
        stats.submissions.total,
        stats.submissions.unique_emails,
        stats.submissions.distinct_cities,
        stats.submissions.distinct_campaigns,
        stats.conversion_rate(),
    )
}
