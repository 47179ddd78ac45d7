use core::net::{IpAddr, SocketAddr};
use core::time::Duration;

use anyhow::ensure;
use clap::Parser;
use common::RetryPolicy;

/// Runtime configuration, read from flags or the environment.
///
/// Holds the bot token and API secrets, so it deliberately has no `Debug`.
#[derive(Parser)]
#[command(version, about = "Discord marketing bot and funnel event API")]
pub(crate) struct Config {
    #[arg(long, env = "BOT_TOKEN", hide_env_values = true)]
    pub(crate) bot_token: String,

    #[arg(long, env = "DISCORD_APPLICATION_ID")]
    pub(crate) application_id: String,

    /// Hex-encoded Ed25519 key used to verify interaction requests.
    #[arg(long, env = "DISCORD_PUBLIC_KEY")]
    pub(crate) public_key: String,

    #[arg(long, env = "CANAL_MARKETING")]
    pub(crate) marketing_channel_id: String,

    #[arg(long, env = "CANAL_PARCERIA")]
    pub(crate) partnership_channel_id: String,

    /// Role mentioned when a new marketing task is announced.
    #[arg(long, env = "MARKETING_ROLE_ID")]
    pub(crate) marketing_role_id: Option<String>,

    #[arg(long, env = "WEBHOOK")]
    pub(crate) task_webhook_url: String,

    #[arg(long, env = "WEBHOOK_PARCERIA")]
    pub(crate) partnership_webhook_url: String,

    #[arg(long, env = "CLARITY_PROJECT_ID")]
    pub(crate) clarity_project_id: String,

    #[arg(long, env = "CLARITY_API_TOKEN", hide_env_values = true)]
    pub(crate) clarity_api_token: String,

    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub(crate) database_url: String,

    #[arg(long, env = "DATABASE_MAX_CONNECTIONS", default_value_t = 10)]
    pub(crate) database_max_connections: u32,

    #[arg(long, env = "API_HOST", default_value = "0.0.0.0")]
    pub(crate) api_host: IpAddr,

    #[arg(long, env = "API_PORT", default_value_t = 3000)]
    pub(crate) api_port: u16,

    #[arg(long, env = "METRICS_ADDR", default_value = "0.0.0.0:9002")]
    pub(crate) metrics_addr: SocketAddr,

    #[arg(long, env = "RETRY_MAX_ATTEMPTS", default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..))]
    pub(crate) retry_max_attempts: u32,

    #[arg(long, env = "RETRY_INITIAL_DELAY_MS", default_value_t = 1000)]
    pub(crate) retry_initial_delay_ms: u64,

    #[arg(long, env = "RETRY_BACKOFF_MULTIPLIER", default_value_t = 1.5)]
    pub(crate) retry_backoff_multiplier: f64,

    /// Timeout for every outgoing HTTP request, in seconds.
    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value_t = 30)]
    pub(crate) http_timeout_secs: u64,

    #[arg(long, env = "DISCORD_API_URL", default_value = "https://discord.com/api/v10")]
    pub(crate) discord_api_url: String,

    #[arg(
        long,
        env = "CLARITY_API_URL",
        default_value = "https://www.clarity.ms/export-data/api/v1"
    )]
    pub(crate) clarity_api_url: String,
}

impl Config {
    pub(crate) fn api_addr(&self) -> SocketAddr {
        SocketAddr::new(self.api_host, self.api_port)
    }

    pub(crate) fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// The retry policy shared by every interactive flow.
    pub(crate) fn retry_policy(&self) -> anyhow::Result<RetryPolicy> {
        ensure!(
            self.retry_backoff_multiplier > 1.0,
            "RETRY_BACKOFF_MULTIPLIER must be greater than 1, got {}",
            self.retry_backoff_multiplier
        );
        Ok(RetryPolicy {
            max_attempts: self.retry_max_attempts,
            initial_delay: Duration::from_millis(self.retry_initial_delay_ms),
            backoff_multiplier: self.retry_backoff_multiplier,
            ..RetryPolicy::default()
        })
    }
}
