// src/main.rs — docchat entry point

use std::sync::Arc;

use clap::Parser;

use docchat::cli::{Cli, Commands};
use docchat::infra::config::Config;
use docchat::infra::logger;
use docchat::session::ChatSession;
use docchat::upstream::http::HttpAnswerSource;

#[tokio::main]
async fn main() {
    // Initialize logging (respects RUST_LOG / DOCCHAT_LOG)
    logger::init_logging("warn");

    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load config (falls back to defaults if no config.toml)
    let mut config = if let Some(ref path) = cli.config {
        let mut config = Config::load_from(std::path::Path::new(path))?;
        config.apply_env();
        config
    } else {
        Config::load()?
    };
    if let Some(ref url) = cli.base_url {
        config.server.base_url = url.clone();
    }

    let source = Arc::new(HttpAnswerSource::new(&config.server)?);
    tracing::debug!(base_url = %source.base_url(), "answer service");

    match &cli.command {
        Some(Commands::Documents) => {
            return docchat::cli::documents::run_documents(&source).await;
        }
        Some(Commands::Health) => {
            return docchat::cli::documents::run_health(&source).await;
        }
        _ => {}
    }

    let session = ChatSession::new(source.clone(), &config);
    match source.list_documents().await {
        Ok(documents) => session.set_documents(documents),
        Err(e) => tracing::warn!("could not list documents: {e}"),
    }
    if let Some(ref id) = cli.document {
        session.select_document(id.clone());
    }

    match cli.command {
        Some(Commands::Ask { question, json }) => {
            docchat::cli::ask::run_ask(&session, &question.join(" "), json).await
        }
        _ => docchat::cli::chat::run_chat(&session, &source).await,
    }
}
