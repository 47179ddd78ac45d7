use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{Pool, Postgres};
use std::str::FromStr;
use std::time::Duration;

const USER_AGENT: &str = concat!("marketing-bot/", env!("CARGO_PKG_VERSION"));

pub async fn get_pg_pool(database_url: &str, max_connections: u32) -> anyhow::Result<Pool<Postgres>> {
    let pg_options = PgConnectOptions::from_str(database_url)?;
    Ok(PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(60))
        .connect_with(pg_options)
        .await?)
}

pub fn build_http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
}
