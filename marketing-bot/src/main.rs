#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![deny(unreachable_pub)]
#![deny(clippy::correctness)]
#![deny(clippy::suspicious)]
#![deny(clippy::style)]
#![deny(clippy::complexity)]
#![deny(clippy::perf)]
#![deny(clippy::pedantic)]
#![deny(clippy::std_instead_of_core)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::unreadable_literal)]

use core::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use tracing::info;

use crate::config::Config;
use crate::context::BotContext;
use crate::store::EventStore;

mod api;
mod clarity;
mod commands;
mod config;
mod context;
mod discord;
mod n8n;
mod store;
mod validation;

const STARTUP_RETRIES: u32 = 5;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let _otel_guard = common::init_tracing(env!("CARGO_PKG_NAME"));
    let config = Config::parse();
    common::init_metrics(config.metrics_addr)?;

    let pg_pool = common::retry_with_backoff("postgres_connect", STARTUP_RETRIES, || {
        common::get_pg_pool(&config.database_url, config.database_max_connections)
    })
    .await?;
    let store = EventStore::new(pg_pool);
    store.migrate().await.context("Failed to create event tables")?;

    let ctx = Arc::new(BotContext::from_config(&config, store)?);
    let commands = discord::model::command_definitions();
    common::retry_with_backoff("register_commands", STARTUP_RETRIES, || {
        ctx.discord.register_commands(&commands)
    })
    .await?;
    info!("Slash commands registered");

    let addr = config.api_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, "Marketing bot listening");
    axum::serve(
        listener,
        api::router(ctx).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Marketing bot stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for the shutdown signal");
    }
}
