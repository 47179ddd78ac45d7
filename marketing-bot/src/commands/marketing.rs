use std::sync::Arc;

use common::{AttemptResult, ProgressMessage, RetryPolicy, retry_with_feedback};
use metrics::counter;
use serde_json::Value;
use time::Date;
use tracing::{error, info};

use super::{failure_message, spawn_flow, truncate};
use crate::context::{BotContext, Channels};
use crate::discord::response::{self, TextInput};
use crate::discord::{Interaction, InteractionReply, Notifier, notify_channel, render_final};
use crate::n8n::{self, AutomationClient, TaskRequest};
use crate::validation::{self, ValidationError, non_empty, parse_deadline};

pub(super) const MODAL_ID: &str = "marketing_modal";
const OPERATION_NAME: &str = "solicitação de marketing";
const ACK: &str = "⏳ Criando solicitação de tarefa de marketing...";

const NAME_FIELD: &str = "nome_demanda";
const DETAILS_FIELD: &str = "detalhes_demanda";
const DEADLINE_FIELD: &str = "prazo";

pub(super) fn modal() -> Value {
    response::modal(
        MODAL_ID,
        "📋 Nova Solicitação de Marketing",
        &[
            TextInput {
                custom_id: NAME_FIELD,
                label: "Nome/Título da Tarefa",
                placeholder: "Ex: Campanha redes sociais para evento X",
                paragraph: false,
                max_length: 100,
            },
            TextInput {
                custom_id: DETAILS_FIELD,
                label: "Detalhes e Descrição da Tarefa",
                placeholder: "Descreva os detalhes da tarefa, objetivos, materiais necessários...",
                paragraph: true,
                max_length: 1000,
            },
            TextInput {
                custom_id: DEADLINE_FIELD,
                label: "Data Limite (DD/MM/AAAA)",
                placeholder: "25/12/2025",
                paragraph: false,
                max_length: 10,
            },
        ],
    )
}

fn parse_request(interaction: &Interaction, today: Date) -> Result<TaskRequest, ValidationError> {
    let field = |id: &'static str| interaction.field(id).ok_or(ValidationError::MissingField(id));
    Ok(TaskRequest {
        title: non_empty(field(NAME_FIELD)?, ValidationError::EmptyTaskName)?,
        details: non_empty(field(DETAILS_FIELD)?, ValidationError::EmptyTaskDetails)?,
        deadline: parse_deadline(field(DEADLINE_FIELD)?, today)?,
        requester: interaction.requester(),
    })
}

pub(super) fn submit(ctx: &Arc<BotContext>, interaction: Interaction) -> Value {
    let request = match parse_request(&interaction, validation::today()) {
        Ok(request) => request,
        Err(e) => {
            info!(error = %e, "Marketing request rejected");
            return response::ephemeral(&format!("❌ {e}"));
        }
    };
    let reply = InteractionReply::new(ctx.discord.clone(), interaction.token);
    let ctx = Arc::clone(ctx);
    spawn_flow("marketing", async move {
        create_task(
            &ctx.retry_policy,
            &ctx.automation,
            &ctx.discord,
            &ctx.channels,
            &reply,
            &request,
        )
        .await
    });
    response::message(ACK)
}

/// Submits the task with live feedback, then renders the outcome and, on
/// success, announces it in the marketing channel.
async fn create_task<M, N>(
    policy: &RetryPolicy,
    automation: &AutomationClient,
    notifier: &N,
    channels: &Channels,
    reply: &M,
    request: &TaskRequest,
) -> anyhow::Result<()>
where
    M: ProgressMessage + Sync,
    N: Notifier + Sync,
{
    let result = retry_with_feedback(policy, reply, OPERATION_NAME, &request.requester.tag, || {
        automation.submit_task(request)
    })
    .await;

    match result {
        AttemptResult::Success(data) => {
            let task_url = n8n::task_url(&data);
            counter!("marketing_bot.task.success").increment(1);
            info!(title = %request.title, task_url = ?task_url, "Marketing task created");

            let rendered = render_final(reply, &created_message(request, task_url.as_deref())).await;
            notify_channel(
                notifier,
                &channels.marketing,
                &alert_message(request, channels.marketing_role.as_deref(), task_url.as_deref()),
            )
            .await;
            rendered
        }
        AttemptResult::Failure(error) => {
            counter!("marketing_bot.task.failure").increment(1);
            error!(title = %request.title, error = %error, "Marketing task could not be created");
            render_final(reply, &failure_message("Erro ao criar solicitação", &error, policy)).await
        }
    }
}

fn created_message(request: &TaskRequest, task_url: Option<&str>) -> String {
    let mut message = format!(
        "✅ **Solicitação criada com sucesso!**\n\n\
         **Tarefa:** {}\n\
         **Detalhes:** {}\n\
         **Prazo:** {}\n\
         **Solicitado por:** {} ({})\n\
         **Criado em:** {}",
        request.title,
        truncate(&request.details, 800),
        request.deadline.formatted,
        request.requester.display_name,
        request.requester.tag,
        validation::now_formatted(),
    );
    if let Some(url) = task_url {
        message.push_str(&format!("\n🔗 **Link da tarefa:** [Clique aqui para acessar a tarefa]({url})"));
    }
    message
}

fn alert_message(request: &TaskRequest, role_id: Option<&str>, task_url: Option<&str>) -> String {
    let mention = role_id.map(|id| format!(" <@&{id}>")).unwrap_or_default();
    let mut message = format!(
        "🔔 **Nova demanda registrada!**{mention}\n\
         **Tarefa:** {}\n\
         **Detalhes:** {}\n\
         **Prazo:** {}\n\
         **Solicitado por:** <@{}>",
        request.title,
        truncate(&request.details, 500),
        request.deadline.formatted,
        request.requester.id,
    );
    if let Some(url) = task_url {
        message.push_str(&format!("\n🔗 {url}"));
    }
    message
}

#[cfg(test)]
mod tests {
    use core::time::Duration;

    use super::*;
    use crate::commands::testing::{RecordingMessage, RecordingNotifier};
    use serde_json::json;
    use time::macros::date;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TODAY: Date = date!(2025 - 06 - 15);

    fn modal_submit(name: &str, details: &str, deadline: &str) -> Interaction {
        serde_json::from_value(json!({
            "id": "1",
            "type": 5,
            "token": "tok",
            "member": { "user": { "id": "42", "username": "ana", "discriminator": "0" } },
            "data": {
                "custom_id": MODAL_ID,
                "components": [
                    { "type": 1, "components": [{ "type": 4, "custom_id": NAME_FIELD, "value": name }] },
                    { "type": 1, "components": [{ "type": 4, "custom_id": DETAILS_FIELD, "value": details }] },
                    { "type": 1, "components": [{ "type": 4, "custom_id": DEADLINE_FIELD, "value": deadline }] },
                ],
            },
        }))
        .unwrap()
    }

    fn channels() -> Channels {
        Channels {
            marketing: "100".to_string(),
            marketing_role: Some("200".to_string()),
            partnership: "300".to_string(),
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::default().with_initial_delay(Duration::from_millis(10))
    }

    fn automation(server: &MockServer) -> AutomationClient {
        AutomationClient::new(
            reqwest::Client::new(),
            format!("{}/task", server.uri()),
            format!("{}/partnership", server.uri()),
        )
    }

    fn request() -> TaskRequest {
        parse_request(&modal_submit("Hero banner", "Summit 2025 hero", "20/06/2025"), TODAY).unwrap()
    }

    #[test]
    fn parses_a_complete_submission() {
        let request = parse_request(&modal_submit("  Hero banner ", "Summit hero", "20/06/2025"), TODAY).unwrap();
        assert_eq!(request.title, "Hero banner");
        assert_eq!(request.deadline.formatted, "20/06/2025");
        assert_eq!(request.requester.id, "42");
    }

    #[test]
    fn rejects_blank_or_late_submissions() {
        assert_eq!(
            parse_request(&modal_submit(" ", "x", "20/06/2025"), TODAY).unwrap_err(),
            ValidationError::EmptyTaskName
        );
        assert_eq!(
            parse_request(&modal_submit("x", "", "20/06/2025"), TODAY).unwrap_err(),
            ValidationError::EmptyTaskDetails
        );
        assert_eq!(
            parse_request(&modal_submit("x", "y", "01/01/2025"), TODAY).unwrap_err(),
            ValidationError::PastDeadline
        );
    }

    #[tokio::test]
    async fn recovers_from_transient_errors_and_announces_the_task() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/task"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/task"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "taskUrl": "https://app.pipe.run/c/9" })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = RecordingMessage::default();
        let notifier = RecordingNotifier::default();
        create_task(&fast_policy(), &automation(&server), &notifier, &channels(), &reply, &request())
            .await
            .unwrap();

        let updates = reply.updates();
        assert_eq!(updates.len(), 5);
        assert_eq!(updates[1], "⏳ Tentativa 2/3 - Processando solicitação de marketing...");
        assert_eq!(updates[3], "⏳ Tentativa 3/3 - Processando solicitação de marketing...");
        assert!(updates[4].starts_with("✅ **Solicitação criada com sucesso!**"));
        assert!(updates[4].contains("https://app.pipe.run/c/9"));

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "100");
        assert!(sent[0].1.contains("<@&200>"));
        assert!(sent[0].1.contains("<@42>"));
    }

    #[tokio::test]
    async fn terminal_rejection_is_rendered_without_retrying() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(422))
            .expect(1)
            .mount(&server)
            .await;

        let reply = RecordingMessage::default();
        let notifier = RecordingNotifier::default();
        create_task(&fast_policy(), &automation(&server), &notifier, &channels(), &reply, &request())
            .await
            .unwrap();

        assert_eq!(reply.updates().len(), 1);
        assert!(reply.last().contains("```HTTP error: 422 - Unprocessable Entity```"));
        assert!(!reply.last().contains("tentou"));
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn exhausted_retries_suggest_trying_later() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let reply = RecordingMessage::default();
        let notifier = RecordingNotifier::default();
        create_task(&fast_policy(), &automation(&server), &notifier, &channels(), &reply, &request())
            .await
            .unwrap();

        assert_eq!(reply.updates().len(), 5);
        assert!(reply.last().starts_with("❌ **Erro ao criar solicitação**"));
        assert!(reply.last().contains("tentou 3 vezes"));
        assert!(notifier.sent().is_empty());
    }

    #[test]
    fn alert_omits_the_mention_without_a_role() {
        let alert = alert_message(&request(), None, None);
        assert!(!alert.contains("<@&"));
        assert!(alert.contains("**Prazo:** 20/06/2025"));
    }
}
