use scraper::{ElementRef, Html};

use super::{
    RowError, RowLocator, absolute_url, all_texts, first_href, first_text, has_class, select_all,
    text_of,
};
use crate::models::job::{GeneralBoardJob, JobRecord, UNKNOWN_COMPANY, UNTITLED};

pub const ORIGIN: &str = "https://weworkremotely.com";

const LOCATOR: RowLocator = RowLocator {
    container: "section.jobs",
    candidates: "ul",
    row: "li",
    has_identity,
};

const LISTING_LINK: &[&str] = &["a[href*=\"/remote-jobs/\"]", "a[href]"];
const TITLE: &[&str] = &["h4.new-listing__header__title", "span.title"];
const COMPANY: &[&str] = &["p.new-listing__company-name", "span.company"];
const LOCATION: &[&str] = &["p.new-listing__company-headquarters", "span.region"];
const CATEGORIES: &[&str] = &["p.new-listing__categories__category", "span.listing-tag"];
const SECTION_HEADING: &[&str] = &["h2 a", "h2"];

/// Row classes that are never listings.
const EXCLUDED_CLASSES: &[&str] = &["view-all", "feature--ad"];

fn has_identity(row: &ElementRef<'_>) -> bool {
    !select_all(*row, LISTING_LINK[0]).is_empty()
}

fn is_listing_row(row: &ElementRef<'_>) -> bool {
    !EXCLUDED_CLASSES.iter().any(|class| has_class(row, class)) && has_identity(row)
}

/// Extract every listing on a general-board result page, tagging each with its
/// section heading when the page groups listings into sections.
pub fn extract(html: &str) -> Vec<JobRecord> {
    let document = Html::parse_document(html);
    let Some((tier, rows)) = LOCATOR.locate(&document, is_listing_row) else {
        tracing::warn!("General board: no job rows on page");
        return Vec::new();
    };
    tracing::info!("General board: {} rows located by {tier} tier", rows.len());

    rows.into_iter()
        .filter(is_listing_row)
        .filter_map(|row| match extract_row(row) {
            Ok(mut job) => {
                if let Some(section) = section_name(row) {
                    job.set_section(section);
                }
                tracing::debug!("{} [{}]", job.position, job.section().unwrap_or("-"));
                Some(JobRecord::GeneralBoard(job))
            }
            Err(e) => {
                tracing::warn!("Skipping general board row: {e}");
                None
            }
        })
        .collect()
}

fn extract_row(row: ElementRef<'_>) -> Result<GeneralBoardJob, RowError> {
    let link = first_href(row, LISTING_LINK)
        .and_then(|href| absolute_url(ORIGIN, &href))
        .ok_or(RowError::MissingLink)?;

    Ok(GeneralBoardJob::new(
        first_text(row, TITLE).unwrap_or_else(|| UNTITLED.to_string()),
        first_text(row, COMPANY).unwrap_or_else(|| UNKNOWN_COMPANY.to_string()),
        first_text(row, LOCATION),
        link,
        all_texts(row, CATEGORIES),
    ))
}

/// Heading of the nearest enclosing `<section>`.
fn section_name(row: ElementRef<'_>) -> Option<String> {
    row.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "section")
        .and_then(|section| first_text(section, SECTION_HEADING))
}

/// Number of result pages advertised by the pagination block; 1 when absent.
pub fn page_count(html: &str) -> usize {
    let document = Html::parse_document(html);
    let root = document.root_element();

    let pages = select_all(root, "div.pagination span.page").len();
    if pages > 0 {
        return pages;
    }

    select_all(root, ".pagination a")
        .into_iter()
        .filter_map(|a| text_of(a).parse::<usize>().ok())
        .max()
        .unwrap_or(1)
        .max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job::{NOT_SPECIFIED, Tabular};

    fn listing(slug: &str, title: &str) -> String {
        format!(
            r#"<li class="new-listing-container">
                 <a href="/remote-jobs/{slug}">
                   <h4 class="new-listing__header__title">{title}</h4>
                   <p class="new-listing__company-name">Acme</p>
                   <p class="new-listing__company-headquarters">Berlin, Germany</p>
                   <div class="new-listing__categories">
                     <p class="new-listing__categories__category">Full-Time</p>
                     <p class="new-listing__categories__category">Anywhere in the World</p>
                   </div>
                 </a>
               </li>"#
        )
    }

    fn section(heading: &str, items: &[String]) -> String {
        format!(
            r#"<section class="jobs"><h2><a href="/categories/x">{heading}</a></h2>
                 <article><ul>{}
                   <li class="view-all"><a href="/categories/x">View all</a></li>
                 </ul></article>
               </section>"#,
            items.join("\n")
        )
    }

    #[test]
    fn extracts_rows_with_sections_and_skips_ads() {
        let ad = r#"<li class="feature--ad"><a href="/remote-jobs/sponsored">Sponsored</a></li>"#;
        let html = format!(
            "<html><body>{}{}</body></html>",
            section(
                "Full-Stack Programming Jobs",
                &[listing("acme-rust", "Rust Engineer"), ad.to_string()]
            ),
            section("DevOps Jobs", &[listing("acme-sre", "SRE")]),
        );

        let records = extract(&html);
        assert_eq!(records.len(), 2);

        let JobRecord::GeneralBoard(first) = &records[0] else {
            panic!("unexpected variant: {:?}", records[0]);
        };
        assert_eq!(first.section(), Some("Full-Stack Programming Jobs"));
        assert_eq!(first.categories, vec!["Full-Time", "Anywhere in the World"]);
        assert_eq!(
            first.to_row(),
            vec![
                "Rust Engineer",
                "Acme",
                "Berlin, Germany",
                NOT_SPECIFIED,
                "https://weworkremotely.com/remote-jobs/acme-rust",
            ]
        );

        let JobRecord::GeneralBoard(second) = &records[1] else {
            panic!("unexpected variant: {:?}", records[1]);
        };
        assert_eq!(second.section(), Some("DevOps Jobs"));
    }

    #[test]
    fn falls_back_to_largest_list_without_sections() {
        let html = format!(
            r#"<html><body>
                 <ul class="menu"><li><a href="/about">About</a></li></ul>
                 <ul class="results">{}{}{}</ul>
               </body></html>"#,
            listing("a", "A"),
            listing("b", "B"),
            listing("c", "C"),
        );

        let records = extract(&html);
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.link().starts_with("https://")));
    }

    #[test]
    fn secondary_selectors_fill_legacy_markup() {
        let html = r#"<section class="jobs"><ul>
              <li><a href="/remote-jobs/legacy-1">
                <span class="company">Globex</span>
                <span class="title">Backend Dev</span>
                <span class="region">USA Only</span>
              </a></li>
            </ul></section>"#;

        let row = extract(html)[0].to_row();
        assert_eq!(row[0], "Backend Dev");
        assert_eq!(row[1], "Globex");
        assert_eq!(row[2], "USA Only");
    }

    #[test]
    fn missing_location_uses_sentinel() {
        let html = r#"<section class="jobs"><ul>
              <li><a href="/remote-jobs/bare"><h4 class="new-listing__header__title">Bare</h4></a></li>
            </ul></section>"#;

        let row = extract(html)[0].to_row();
        assert_eq!(row[1], UNKNOWN_COMPANY);
        assert_eq!(row[2], NOT_SPECIFIED);
    }

    #[test]
    fn page_count_reads_pagination_markers() {
        let spans = r#"<div class="pagination">
              <span class="page current">1</span><span class="page"><a href="?page=2">2</a></span>
              <span class="page"><a href="?page=3">3</a></span>
            </div>"#;
        assert_eq!(page_count(spans), 3);

        let anchors = r#"<nav class="pagination"><a href="?page=2">2</a><a href="?page=7">7</a>
            <a href="?page=2">Next</a></nav>"#;
        assert_eq!(page_count(anchors), 7);
    }

    #[test]
    fn page_count_defaults_to_one() {
        assert_eq!(page_count("<html><body><p>No results</p></body></html>"), 1);
        assert_eq!(page_count(""), 1);
    }
}
