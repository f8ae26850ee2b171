use std::path::PathBuf;

use clap::Parser;

use crate::collectors::SourceKind;

#[derive(Parser, Debug, Clone)]
#[command(name = "jobscraper", about = "Multi-board job posting aggregator")]
pub struct Config {
    /// Job boards to scrape; results always follow remoteok, wwr, wanted order
    #[arg(
        long,
        env = "SOURCES",
        value_enum,
        value_delimiter = ',',
        default_value = "remoteok,wwr"
    )]
    pub sources: Vec<SourceKind>,

    /// Run the browser without a window
    #[arg(long, env = "HEADLESS", default_value = "true", action = clap::ArgAction::Set)]
    pub headless: bool,

    /// Pause on CAPTCHA pages until an operator solves them
    #[arg(long, env = "MANUAL_CAPTCHA")]
    pub manual_captcha: bool,

    /// Proxy endpoints (host:port) rotated round-robin
    #[arg(long, env = "PROXIES", value_delimiter = ',')]
    pub proxies: Vec<String>,

    /// Retries per fetch, overriding each board's default
    #[arg(long, env = "RETRY_COUNT", value_parser = clap::value_parser!(u32).range(0..=10))]
    pub retry_count: Option<u32>,

    /// Page navigation timeout in seconds
    #[arg(long, env = "NAVIGATION_TIMEOUT", default_value = "60")]
    pub navigation_timeout: u64,

    /// How long to wait for an operator to solve a CAPTCHA, in seconds
    #[arg(long, env = "CAPTCHA_TIMEOUT", default_value = "300")]
    pub captcha_timeout: u64,

    /// Where CAPTCHA screenshots are written
    #[arg(long, env = "ARTIFACTS_DIR", default_value = ".")]
    pub artifacts_dir: PathBuf,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(clap::Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the web server (default when no subcommand given)
    Serve {
        /// Listen address
        #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
        listen_addr: String,
    },
    /// Scrape keywords once and write CSV files
    Scrape {
        /// Comma-separated search keywords
        #[arg(long)]
        keywords: String,

        /// Output directory for the CSV files
        #[arg(long, env = "OUT_DIR", default_value = ".")]
        out_dir: PathBuf,
    },
}

impl Config {
    /// Resolve the command, defaulting to Serve if none specified.
    pub fn resolved_command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve {
            listen_addr: std::env::var("LISTEN_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
        })
    }
}
