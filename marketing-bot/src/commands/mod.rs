//! Slash commands and the modal flows behind them.
//!
//! Slow work never runs inside the interaction request: the handler answers
//! with the acknowledgement and spawns the flow, which edits that message.

use core::future::Future;
use core::time::Duration;
use std::sync::Arc;

use common::RetryPolicy;
use metrics::counter;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::context::BotContext;
use crate::discord::{Interaction, InteractionType, response};

mod cro;
mod leads;
mod marketing;
mod partnership;
mod resources;

const HELP_TEXT: &str = "\
❓ **Central de ajuda**
Bot para criação de solicitações de tarefas de marketing, registro de parcerias e análise de performance.

📋 `/marketing` - cria uma nova solicitação de tarefa de marketing (formulário com nome, detalhes e prazo **DD/MM/AAAA**)
🤝 `/parceria` - registra uma parceria em um card existente do Pipe.run ou 4.works
📊 `/cro [data_desejada] [final_da_url_desejada]` - dados de desempenho via Microsoft Clarity
📈 `/leads [dias] [campanha]` - estatísticas do funil de leads
🎨 `/midiakit` - logos oficiais, ícones de produtos e materiais audiovisuais
📊 `/apresentações` - apresentações comerciais em PDF e editáveis (uso interno)
📄 `/modelos` - modelos de documentos com branding da 4.events (uso interno)
🖼️ `/capa-linkedin` - capa oficial da 4.events para LinkedIn
🖥️ `/fundo-escritorio` - papel de parede oficial para área de trabalho
🏓 `/ping` - testa a conectividade do bot
❓ `/help` - mostra esta mensagem";

/// Builds the synchronous answer to one interaction.
pub(crate) fn dispatch(ctx: &Arc<BotContext>, interaction: Interaction) -> Value {
    match interaction.kind {
        InteractionType::Ping => response::pong(),
        InteractionType::ApplicationCommand => on_command(ctx, interaction),
        InteractionType::ModalSubmit => on_modal_submit(ctx, interaction),
        kind => {
            warn!(?kind, interaction_id = %interaction.id, "Unsupported interaction type");
            response::ephemeral("❌ Esta interação não é suportada.")
        }
    }
}

fn on_command(ctx: &Arc<BotContext>, interaction: Interaction) -> Value {
    let command = interaction.command_name().to_string();
    counter!("marketing_bot.command.received", "command" => command.clone()).increment(1);
    info!(
        command,
        interaction_id = %interaction.id,
        user = %interaction.requester().tag,
        "Command received"
    );

    match command.as_str() {
        "marketing" => marketing::modal(),
        "parceria" => partnership::modal(),
        "cro" => cro::start(ctx, interaction),
        "leads" => leads::start(ctx, interaction),
        "ping" => response::message(&ping_text(ctx.started_at.elapsed())),
        "help" => response::message(HELP_TEXT),
        other => resources::reply(other, &interaction)
            .unwrap_or_else(|| response::ephemeral("❌ Comando desconhecido.")),
    }
}

fn on_modal_submit(ctx: &Arc<BotContext>, interaction: Interaction) -> Value {
    let modal_id = interaction.modal_id().to_string();
    match modal_id.as_str() {
        marketing::MODAL_ID => marketing::submit(ctx, interaction),
        partnership::MODAL_ID => partnership::submit(ctx, interaction),
        _ => {
            warn!(modal_id, "Unknown modal submitted");
            response::ephemeral("❌ Este formulário não é mais suportado.")
        }
    }
}

/// Runs a flow in the background; its error, if any, is only logged.
fn spawn_flow<F>(flow: &'static str, future: F)
where
    F: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = future.await {
            counter!("marketing_bot.flow.failure", "flow" => flow).increment(1);
            error!(flow, error = ?e, "Interaction flow failed");
        }
    });
}

/// Final text for a flow whose retry sequence ended in failure.
pub(crate) fn failure_message(title: &str, error: &str, policy: &RetryPolicy) -> String {
    let hint = if policy.is_retriable(error) {
        format!(
            "💡 **Este parece ser um erro temporário do servidor.**\n\
             O bot tentou {} vezes antes de desistir.\n\
             **Sugestão:** Tente novamente em alguns minutos ou entre em contato com o suporte.",
            policy.max_attempts
        )
    } else {
        "**Tente novamente ou entre em contato com o suporte.**".to_string()
    };
    format!("❌ **{title}**\n```{error}```\n{hint}")
}

/// Cuts `text` to at most `max_chars` characters, marking the cut with `...`.
pub(crate) fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{kept}...")
}

fn ping_text(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    format!(
        "🏓 Pong!\nTempo online: `{}h {}m {}s`\nStatus: `Conectado`",
        secs / 3600,
        secs % 3600 / 60,
        secs % 60
    )
}

#[cfg(test)]
pub(crate) mod testing {
    //! Recording fakes for the chat collaborators.

    use std::sync::Mutex;

    use common::ProgressMessage;

    use crate::discord::Notifier;

    #[derive(Default)]
    pub(crate) struct RecordingMessage {
        pub(crate) updates: Mutex<Vec<String>>,
    }

    impl RecordingMessage {
        pub(crate) fn updates(&self) -> Vec<String> {
            self.updates.lock().unwrap().clone()
        }

        pub(crate) fn last(&self) -> String {
            self.updates().last().cloned().unwrap_or_default()
        }
    }

    impl ProgressMessage for RecordingMessage {
        async fn update(&self, content: &str) -> anyhow::Result<()> {
            self.updates.lock().unwrap().push(content.to_string());
            Ok(())
        }
    }

    #[derive(Default)]
    pub(crate) struct RecordingNotifier {
        pub(crate) sent: Mutex<Vec<(String, String)>>,
    }

    impl RecordingNotifier {
        pub(crate) fn sent(&self) -> Vec<(String, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Notifier for RecordingNotifier {
        async fn notify(&self, channel_id: &str, content: &str) -> anyhow::Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((channel_id.to_string(), content.to_string()));
            Ok(())
        }
    }
}
