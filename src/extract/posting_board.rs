use scraper::{ElementRef, Html};

use super::{RowError, RowLocator, absolute_url, attr, first_href, first_match, first_text};
use crate::models::job::{CompanyPostingJob, JobRecord, NOT_FOUND, UNKNOWN_COMPANY, UNTITLED};

pub const ORIGIN: &str = "https://www.wanted.co.kr";

const LOCATOR: RowLocator = RowLocator {
    container: "[class*=\"JobList\"]",
    candidates: "ul",
    row: "div[class*=\"JobCard_container\"]",
    has_identity,
};

const POSITION_ANCHOR: &str = "a[data-position-id]";
const TITLE: &[&str] = &["strong[class*=\"JobCard_title\"]", "[class*=\"JobCard_title\"]"];
const COMPANY: &[&str] = &[
    "span[class*=\"JobCard_companyName\"]",
    "[class*=\"JobCard_companyName\"]",
];
const LOCATION: &[&str] = &["span[class*=\"JobCard_location\"]"];
const REWARD: &[&str] = &["span[class*=\"JobCard_reward\"]", "[class*=\"JobCard_reward\"]"];

fn has_identity(card: &ElementRef<'_>) -> bool {
    first_match(*card, &[POSITION_ANCHOR]).is_some()
}

/// Extract the job cards of a company-posting search page.
pub fn extract(html: &str) -> Vec<JobRecord> {
    let document = Html::parse_document(html);
    let Some((tier, cards)) = LOCATOR.locate(&document, |_| true) else {
        tracing::warn!("Posting board: no job cards on page");
        return Vec::new();
    };
    tracing::info!("Posting board: {} cards located by {tier} tier", cards.len());

    cards
        .into_iter()
        .filter_map(|card| match extract_card(card) {
            Ok(job) => {
                tracing::debug!("Card: {} - {}", job.position, job.company);
                Some(JobRecord::CompanyPosting(job))
            }
            Err(e) => {
                tracing::warn!("Skipping posting board card: {e}");
                None
            }
        })
        .collect()
}

fn extract_card(card: ElementRef<'_>) -> Result<CompanyPostingJob, RowError> {
    let anchor = first_match(card, &[POSITION_ANCHOR, "a"]);
    let link = first_href(card, &[POSITION_ANCHOR, "a[href]"])
        .and_then(|href| absolute_url(ORIGIN, &href))
        .or_else(|| {
            anchor
                .and_then(|a| attr(a, "data-position-id"))
                .map(|id| format!("{ORIGIN}/wd/{id}"))
        })
        .ok_or(RowError::MissingLink)?;

    let company = first_text(card, COMPANY)
        .or_else(|| anchor.and_then(|a| attr(a, "data-company-name")))
        .unwrap_or_else(|| UNKNOWN_COMPANY.to_string());

    let mut job = CompanyPostingJob::new(
        first_text(card, TITLE).unwrap_or_else(|| UNTITLED.to_string()),
        company,
        link,
    );
    job.location = first_text(card, LOCATION);
    job.reward = Some(first_text(card, REWARD).unwrap_or_else(|| NOT_FOUND.to_string()));
    Ok(job)
}
