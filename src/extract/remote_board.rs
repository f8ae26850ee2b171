use scraper::{ElementRef, Html};

use super::{
    RowError, RowLocator, absolute_url, all_texts, attr, epoch_to_date, first_href, first_match,
    first_text, has_class, select_all, text_of,
};
use crate::models::job::{JobRecord, RemoteBoardJob, UNKNOWN_COMPANY, UNTITLED};

pub const ORIGIN: &str = "https://remoteok.com";

const LOCATOR: RowLocator = RowLocator {
    container: "table#jobsboard",
    candidates: "table",
    row: "tr",
    has_identity,
};

const ROW_CELL: &[&str] = &["td.company_and_position", "td.company.position"];
const TITLE: &[&str] = &["h2[itemprop=\"title\"]", "h2"];
const COMPANY: &[&str] = &["h3[itemprop=\"name\"]", "h3"];
const DIRECT_LINK: &[&str] = &["a[itemprop=\"url\"]", "a.preventLink"];
const TAGS: &[&str] = &["td.tags div.tag h3", "td.tags .tag"];
const DATE_TEXT: &[&str] = &["td.time time", "time"];

const AD_TITLE: &[&str] = &["strong", "a"];
const AD_FALLBACK_TITLE: &str = "Advertisement";
const AD_FALLBACK_COMPANY: &str = "Advertiser";

const SALARY_MARK: char = '💰';

fn has_identity(row: &ElementRef<'_>) -> bool {
    attr(*row, "data-id").is_some() || attr(*row, "data-slug").is_some()
}

fn is_listing_row(row: &ElementRef<'_>) -> bool {
    has_class(row, "job") || has_class(row, "sw-insert") || has_identity(row)
}

/// Extract every listing on a rendered remote-board page. Malformed rows are skipped.
pub fn extract(html: &str) -> Vec<JobRecord> {
    let document = Html::parse_document(html);
    let Some((tier, rows)) = LOCATOR.locate(&document, is_listing_row) else {
        tracing::warn!("Remote board: no job rows on page");
        return Vec::new();
    };
    tracing::info!("Remote board: {} rows located by {tier} tier", rows.len());

    rows.into_iter()
        .filter_map(|row| match extract_row(row) {
            Ok(job) => Some(JobRecord::RemoteBoard(job)),
            Err(e) => {
                tracing::warn!(
                    "Skipping remote board row {}: {e}",
                    attr(row, "data-id").unwrap_or_default()
                );
                None
            }
        })
        .collect()
}

fn extract_row(row: ElementRef<'_>) -> Result<RemoteBoardJob, RowError> {
    if has_class(&row, "sw-insert") {
        return extract_ad(row);
    }

    let link = listing_link(row).ok_or(RowError::MissingLink)?;
    let cell = first_match(row, ROW_CELL).ok_or(RowError::MissingField("company/position cell"))?;

    let (location, salary) = location_and_salary(cell);

    Ok(RemoteBoardJob {
        title: first_text(cell, TITLE).unwrap_or_else(|| UNTITLED.to_string()),
        company: first_text(cell, COMPANY).unwrap_or_else(|| UNKNOWN_COMPANY.to_string()),
        location,
        link,
        salary,
        posted_date: posted_date(row),
        tags: all_texts(row, TAGS),
        is_advertisement: false,
    })
}

/// Promoted rows carry little structure: title and company come from whatever
/// anchors or text the row has.
fn extract_ad(row: ElementRef<'_>) -> Result<RemoteBoardJob, RowError> {
    let link = first_href(row, &["a[href]"])
        .and_then(|href| absolute_url(ORIGIN, &href))
        .ok_or(RowError::MissingLink)?;
    let cell = first_match(row, ROW_CELL).unwrap_or(row);

    let title = first_text(cell, AD_TITLE).unwrap_or_else(|| AD_FALLBACK_TITLE.to_string());
    let company = select_all(cell, "a")
        .get(1)
        .map(|a| text_of(*a))
        .filter(|t| !t.is_empty())
        .or_else(|| first_text(cell, &["span"]))
        .unwrap_or_else(|| AD_FALLBACK_COMPANY.to_string());

    Ok(RemoteBoardJob {
        title,
        company,
        location: None,
        link,
        salary: None,
        posted_date: None,
        tags: Vec::new(),
        is_advertisement: true,
    })
}

/// Direct listing anchor, else the canonical URL built from the slug or id.
fn listing_link(row: ElementRef<'_>) -> Option<String> {
    first_href(row, DIRECT_LINK)
        .and_then(|href| absolute_url(ORIGIN, &href))
        .or_else(|| {
            attr(row, "data-slug")
                .or_else(|| attr(row, "data-id"))
                .map(|key| format!("{ORIGIN}/remote-jobs/{key}"))
        })
}

/// The first plain location badge, and the first badge carrying a salary mark.
fn location_and_salary(cell: ElementRef<'_>) -> (Option<String>, Option<String>) {
    let badges: Vec<String> = select_all(cell, "div.location")
        .into_iter()
        .map(text_of)
        .filter(|t| !t.is_empty())
        .collect();

    let location = badges.iter().find(|b| !b.contains(SALARY_MARK)).cloned();
    let salary = badges
        .iter()
        .find(|b| b.contains(SALARY_MARK))
        .cloned()
        .or_else(|| first_text(cell, &[".salary"]));
    (location, salary)
}

/// `data-epoch` as a calendar date, else the row's human-readable time text.
fn posted_date(row: ElementRef<'_>) -> Option<String> {
    attr(row, "data-epoch")
        .and_then(|epoch| epoch_to_date(&epoch))
        .or_else(|| {
            first_match(row, DATE_TEXT).and_then(|time| {
                attr(time, "datetime")
                    .map(|dt| dt.chars().take(10).collect())
                    .or_else(|| Some(text_of(time)).filter(|t| !t.is_empty()))
            })
        })
}
