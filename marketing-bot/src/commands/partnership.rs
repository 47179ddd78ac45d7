use std::sync::Arc;

use common::{AttemptResult, ProgressMessage, RetryPolicy, retry_with_feedback};
use metrics::counter;
use serde_json::Value;
use time::Date;
use tracing::{error, info};

use super::{failure_message, spawn_flow};
use crate::context::BotContext;
use crate::discord::response::{self, TextInput};
use crate::discord::{Interaction, InteractionReply, Notifier, notify_channel, render_final};
use crate::n8n::{self, AutomationClient, PartnershipRequest};
use crate::validation::{self, ValidationError, parse_date, validate_card_url};

pub(super) const MODAL_ID: &str = "partnership_modal";
const OPERATION_NAME: &str = "registro de parceria";
const ACK: &str = "⏳ Registrando parceria...";

const CARD_URL_FIELD: &str = "url_do_card";
const EVENT_DATE_FIELD: &str = "data_do_evento";

pub(super) fn modal() -> Value {
    response::modal(
        MODAL_ID,
        "🤝 Registrar Nova Parceria",
        &[
            TextInput {
                custom_id: CARD_URL_FIELD,
                label: "URL do Card no Sistema",
                placeholder: "https://app.pipe.run/cards/...",
                paragraph: false,
                max_length: 500,
            },
            TextInput {
                custom_id: EVENT_DATE_FIELD,
                label: "Data do Evento (DD/MM/AAAA)",
                placeholder: "25/12/2025",
                paragraph: false,
                max_length: 10,
            },
        ],
    )
}

/// Event dates may lie in the past: partnerships are often recorded late.
fn parse_request(interaction: &Interaction, today: Date) -> Result<PartnershipRequest, ValidationError> {
    let field = |id: &'static str| interaction.field(id).ok_or(ValidationError::MissingField(id));
    Ok(PartnershipRequest {
        card_url: validate_card_url(field(CARD_URL_FIELD)?)?,
        event_date: parse_date(field(EVENT_DATE_FIELD)?, today)?,
        requester: interaction.requester(),
    })
}

pub(super) fn submit(ctx: &Arc<BotContext>, interaction: Interaction) -> Value {
    let request = match parse_request(&interaction, validation::today()) {
        Ok(request) => request,
        Err(e) => {
            info!(error = %e, "Partnership rejected");
            return response::ephemeral(&format!("❌ {e}"));
        }
    };
    let reply = InteractionReply::new(ctx.discord.clone(), interaction.token);
    let ctx = Arc::clone(ctx);
    spawn_flow("partnership", async move {
        record_partnership(
            &ctx.retry_policy,
            &ctx.automation,
            &ctx.discord,
            &ctx.channels.partnership,
            &reply,
            &request,
        )
        .await
    });
    response::message(ACK)
}

async fn record_partnership<M, N>(
    policy: &RetryPolicy,
    automation: &AutomationClient,
    notifier: &N,
    channel_id: &str,
    reply: &M,
    request: &PartnershipRequest,
) -> anyhow::Result<()>
where
    M: ProgressMessage + Sync,
    N: Notifier + Sync,
{
    let result = retry_with_feedback(policy, reply, OPERATION_NAME, &request.requester.tag, || {
        automation.submit_partnership(request)
    })
    .await;

    match result {
        AttemptResult::Success(data) => {
            let card_name = n8n::card_name(&data);
            counter!("marketing_bot.partnership.success").increment(1);
            info!(card_url = %request.card_url, card_name = ?card_name, "Partnership recorded");

            let rendered = render_final(reply, &recorded_message(request, card_name.as_deref())).await;
            notify_channel(notifier, channel_id, &alert_message(request, card_name.as_deref())).await;
            rendered
        }
        AttemptResult::Failure(error) => {
            counter!("marketing_bot.partnership.failure").increment(1);
            error!(card_url = %request.card_url, error = %error, "Partnership could not be recorded");
            render_final(reply, &failure_message("Erro ao registrar parceria", &error, policy)).await
        }
    }
}

fn recorded_message(request: &PartnershipRequest, card_name: Option<&str>) -> String {
    format!(
        "✅ **Parceria registrada com sucesso!**\n\n\
         **Card:** {}\n\
         **Data do evento:** {}\n\
         **Link:** {}\n\
         **Solicitado por:** {} ({})\n\
         **Registrado em:** {}",
        card_name.unwrap_or("-"),
        request.event_date.formatted,
        request.card_url,
        request.requester.display_name,
        request.requester.tag,
        validation::now_formatted(),
    )
}

fn alert_message(request: &PartnershipRequest, card_name: Option<&str>) -> String {
    format!(
        "🤝 **Nova parceria registrada!**\n\
         **Card:** {}\n\
         **Data do evento:** {}\n\
         **Solicitado por:** <@{}>\n\
         🔗 {}",
        card_name.unwrap_or("-"),
        request.event_date.formatted,
        request.requester.id,
        request.card_url,
    )
}

#[cfg(test)]
mod tests {
    use core::time::Duration;

    use super::*;
    use crate::commands::testing::{RecordingMessage, RecordingNotifier};
    use serde_json::json;
    use time::macros::date;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TODAY: Date = date!(2025 - 06 - 15);

    fn modal_submit(card_url: &str, event_date: &str) -> Interaction {
        serde_json::from_value(json!({
            "id": "1",
            "type": 5,
            "token": "tok",
            "user": { "id": "7", "username": "bob" },
            "data": {
                "custom_id": MODAL_ID,
                "components": [
                    { "type": 1, "components": [{ "type": 4, "custom_id": CARD_URL_FIELD, "value": card_url }] },
                    { "type": 1, "components": [{ "type": 4, "custom_id": EVENT_DATE_FIELD, "value": event_date }] },
                ],
            },
        }))
        .unwrap()
    }

    fn automation(server: &MockServer) -> AutomationClient {
        AutomationClient::new(
            reqwest::Client::new(),
            format!("{}/task", server.uri()),
            format!("{}/partnership", server.uri()),
        )
    }

    #[test]
    fn past_event_dates_are_accepted() {
        let request = parse_request(&modal_submit("https://app.pipe.run/c/7", "10/05/2025"), TODAY).unwrap();
        assert_eq!(request.event_date.formatted, "10/05/2025");
        assert_eq!(request.requester.tag, "bob");
    }

    #[test]
    fn card_url_must_be_a_crm_link() {
        assert_eq!(
            parse_request(&modal_submit("https://example.com/c/7", "10/05/2025"), TODAY).unwrap_err(),
            ValidationError::CardUrlDomain
        );
        assert_eq!(
            parse_request(&modal_submit("https://app.4.works/c/7", "31/04/2025"), TODAY).unwrap_err(),
            ValidationError::InvalidDate
        );
    }

    #[tokio::test]
    async fn records_and_announces_the_partnership() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/partnership"))
            .and(body_partial_json(json!({ "cardURL": "https://app.pipe.run/c/7" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": "Summit 2025" })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = RecordingMessage::default();
        let notifier = RecordingNotifier::default();
        let request = parse_request(&modal_submit("https://app.pipe.run/c/7", "10/05/2025"), TODAY).unwrap();
        record_partnership(
            &RetryPolicy::default(),
            &automation(&server),
            &notifier,
            "300",
            &reply,
            &request,
        )
        .await
        .unwrap();

        assert_eq!(reply.updates().len(), 1);
        assert!(reply.last().contains("**Card:** Summit 2025"));
        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "300");
        assert!(sent[0].1.contains("<@7>"));
    }

    #[tokio::test]
    async fn transient_failure_shows_progress_then_the_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;

        let reply = RecordingMessage::default();
        let notifier = RecordingNotifier::default();
        let request = parse_request(&modal_submit("https://app.pipe.run/c/7", "10/05/2025"), TODAY).unwrap();
        let policy = RetryPolicy::default()
            .with_max_attempts(2)
            .with_initial_delay(Duration::from_millis(10));
        record_partnership(&policy, &automation(&server), &notifier, "300", &reply, &request)
            .await
            .unwrap();

        let updates = reply.updates();
        assert_eq!(updates.len(), 3);
        assert_eq!(updates[0], "⏳ Instabilidade detectada. Tentando novamente em 0s... (1/2)");
        assert_eq!(updates[1], "⏳ Tentativa 2/2 - Processando registro de parceria...");
        assert!(updates[2].contains("tentou 2 vezes"));
        assert!(notifier.sent().is_empty());
    }
}
