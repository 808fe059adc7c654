use actix_web::{App, HttpServer, web};
use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rewards_engine::api;
use rewards_engine::engine::Engine;
use rewards_engine::store::{MemoryNotifier, MemoryStore};

#[derive(Debug, Parser)]
#[command(name = "rewards_engine", about = "Rewards ledger and tiered-commission service")]
struct Config {
    /// Address the HTTP server binds to
    #[arg(long, default_value = "127.0.0.1:8080")]
    bind_address: String,

    /// Number of HTTP worker threads (defaults to the core count)
    #[arg(long)]
    workers: Option<usize>,

    /// Log filter when RUST_LOG is not set, e.g. "info" or "rewards_engine=debug"
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let engine = web::Data::new(Engine::new(MemoryStore::new(), MemoryNotifier::new()));

    info!(bind_address = %config.bind_address, "starting rewards engine");

    let mut server = HttpServer::new(move || {
        App::new()
            .app_data(engine.clone())
            .configure(api::configure::<MemoryStore, MemoryNotifier>)
    })
    .bind(&config.bind_address)
    .with_context(|| format!("failed to bind {}", config.bind_address))?;

    if let Some(workers) = config.workers {
        server = server.workers(workers);
    }

    server.run().await.context("http server terminated")?;
    Ok(())
}
