use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::collectors::Aggregator;
use crate::collectors::aggregator::split_keywords;
use crate::export::{self, ExportError};

/// One-shot scrape: resolve each keyword and write one CSV per (source, keyword).
/// Exits early, keeping files already written, on SIGINT.
pub async fn run(aggregator: &Aggregator, keywords: &str, out_dir: &Path) -> anyhow::Result<()> {
    let keywords = split_keywords(keywords);
    if keywords.is_empty() {
        anyhow::bail!("No keywords given");
    }
    tracing::info!(
        "Scraping {} keyword(s) from {} into {}",
        keywords.len(),
        aggregator.source_names().join(", "),
        out_dir.display()
    );

    tokio::select! {
        biased;
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received, stopping scrape");
        }
        result = scrape_all(aggregator, &keywords, out_dir) => {
            let written = result?;
            tracing::info!("Scrape finished, {} file(s) written", written.len());
        }
    }

    Ok(())
}

async fn scrape_all(
    aggregator: &Aggregator,
    keywords: &[String],
    out_dir: &Path,
) -> anyhow::Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for keyword in keywords {
        let rows = aggregator.resolve(keyword).await;
        if rows.is_empty() {
            tracing::warn!("No jobs found for '{keyword}'");
            continue;
        }

        let sources: BTreeSet<&str> = rows.iter().map(|r| r.source.as_str()).collect();
        for source in sources {
            match export::export_csv(&rows, Some(source), keyword, Local::now()) {
                Ok(csv) => {
                    let path = export::save(&csv, out_dir).await?;
                    tracing::info!("Saved {source} jobs for '{keyword}' to {}", path.display());
                    written.push(path);
                }
                Err(ExportError::NoData) => {}
                Err(e) => return Err(e.into()),
            }
        }
    }
    Ok(written)
}
