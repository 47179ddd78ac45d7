use core::future::Future;

use anyhow::Context;
use common::ProgressMessage;
use metrics::counter;
use reqwest::{Client, RequestBuilder};
use serde_json::{Value, json};
use tracing::{debug, warn};

/// Retries for the final edit of a flow message.
const EDIT_RETRIES: u32 = 2;

/// Discord REST API, authenticated as the bot.
#[derive(Clone)]
pub(crate) struct DiscordClient {
    http: Client,
    base_url: String,
    application_id: String,
    bot_token: String,
}

impl DiscordClient {
    pub(crate) fn new(http: Client, base_url: String, application_id: String, bot_token: String) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            application_id,
            bot_token,
        }
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(reqwest::header::AUTHORIZATION, format!("Bot {}", self.bot_token))
    }

    /// Overwrites the global slash command set of the application.
    pub(crate) async fn register_commands(&self, commands: &Value) -> anyhow::Result<()> {
        let url = format!("{}/applications/{}/commands", self.base_url, self.application_id);
        self.authorized(self.http.put(url))
            .json(commands)
            .send()
            .await
            .context("Failed to reach Discord")?
            .error_for_status()
            .context("Discord rejected the command registration")?;
        Ok(())
    }

    /// Replaces the first response of the interaction identified by `token`.
    pub(crate) async fn edit_original_response(&self, token: &str, body: &Value) -> anyhow::Result<()> {
        let url = format!(
            "{}/webhooks/{}/{token}/messages/@original",
            self.base_url, self.application_id
        );
        self.http
            .patch(url)
            .json(body)
            .send()
            .await
            .context("Failed to reach Discord")?
            .error_for_status()
            .context("Discord rejected the message edit")?;
        Ok(())
    }

    pub(crate) async fn create_message(&self, channel_id: &str, body: &Value) -> anyhow::Result<()> {
        let url = format!("{}/channels/{channel_id}/messages", self.base_url);
        self.authorized(self.http.post(url))
            .json(body)
            .send()
            .await
            .context("Failed to reach Discord")?
            .error_for_status()
            .with_context(|| format!("Discord rejected the message to channel {channel_id}"))?;
        Ok(())
    }
}

/// Channel fan-out for flow outcomes.
pub(crate) trait Notifier {
    fn notify(&self, channel_id: &str, content: &str) -> impl Future<Output = anyhow::Result<()>> + Send;
}

impl Notifier for DiscordClient {
    async fn notify(&self, channel_id: &str, content: &str) -> anyhow::Result<()> {
        self.create_message(
            channel_id,
            &json!({ "content": content, "allowed_mentions": { "parse": ["users", "roles"] } }),
        )
        .await
    }
}

/// Posts `content` to `channel_id`, logging instead of failing.
pub(crate) async fn notify_channel<N: Notifier>(notifier: &N, channel_id: &str, content: &str) {
    match notifier.notify(channel_id, content).await {
        Ok(()) => {
            counter!("marketing_bot.notification.success").increment(1);
            debug!(channel_id, "Channel notified");
        }
        Err(e) => {
            counter!("marketing_bot.notification.failure").increment(1);
            warn!(channel_id, error = ?e, "Failed to notify channel");
        }
    }
}

/// Handle on the acknowledgement message of one interaction.
pub(crate) struct InteractionReply {
    client: DiscordClient,
    token: String,
}

impl InteractionReply {
    pub(crate) fn new(client: DiscordClient, token: String) -> Self {
        Self { client, token }
    }
}

impl ProgressMessage for InteractionReply {
    async fn update(&self, content: &str) -> anyhow::Result<()> {
        self.client
            .edit_original_response(&self.token, &json!({ "content": content }))
            .await
    }
}

/// Sets the final content of a flow's message.
///
/// Unlike progress updates this one matters, so it gets a few retries before
/// the failure is surfaced.
pub(crate) async fn render_final<M: ProgressMessage + Sync>(message: &M, content: &str) -> anyhow::Result<()> {
    common::retry_with_backoff("render_final_message", EDIT_RETRIES, || message.update(content)).await
}
