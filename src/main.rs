mod collectors;
mod config;
mod error;
mod export;
mod extract;
mod fetch;
mod models;
mod routes;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::collectors::{Aggregator, KeywordCache};
use crate::config::{Command, Config};
use crate::fetch::CaptchaGate;
use crate::fetch::captcha::console_operator;
use crate::routes::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("jobscraper=info,tower_http=info")),
        )
        .init();

    let config = Config::parse();

    let captcha = if config.manual_captcha {
        let (gate, prompts) = CaptchaGate::channel(Duration::from_secs(config.captcha_timeout));
        tokio::spawn(console_operator(prompts));
        tracing::info!("Manual CAPTCHA mode on, prompts are answered from this terminal");
        gate
    } else {
        CaptchaGate::disabled()
    };

    let sources = collectors::build_sources(&config, captcha)?;
    let aggregator = Arc::new(Aggregator::new(sources, Arc::new(KeywordCache::new())));

    match config.resolved_command() {
        Command::Serve { listen_addr } => {
            let app = routes::router(AppState { aggregator })
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive());

            let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
            tracing::info!("Listening on {listen_addr}");
            axum::serve(listener, app).await?;
        }
        Command::Scrape { keywords, out_dir } => {
            collectors::runner::run(&aggregator, &keywords, &out_dir).await?;
        }
    }

    Ok(())
}
