// Turns raw listing pages into normalized records. Each board has its own
// module; the row-location tiers and field helpers below are shared.

pub mod general_board;
pub mod posting_board;
pub mod remote_board;

use std::collections::HashSet;
use std::fmt;

use chrono::DateTime;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Which strategy located the listing rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// The canonical listing container.
    Primary,
    /// The largest structurally similar container.
    Structural,
    /// Rows anywhere on the page that carry an identity attribute.
    Attribute,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Tier::Primary => "primary",
            Tier::Structural => "structural",
            Tier::Attribute => "attribute",
        })
    }
}

/// Where a board keeps its listing rows, tried tier by tier.
pub struct RowLocator {
    /// Canonical container(s), e.g. `table#jobsboard`.
    pub container: &'static str,
    /// Containers that look like the canonical one.
    pub candidates: &'static str,
    /// Row elements inside a container.
    pub row: &'static str,
    /// Whether a row carries a listing identity (id/slug attribute).
    pub has_identity: fn(&ElementRef<'_>) -> bool,
}

impl RowLocator {
    /// Returns rows from the first tier that yields any after `is_listing` filtering.
    ///
    /// The structural tier picks the candidate with the most raw rows; pages
    /// with several large unrelated containers can fool it.
    pub fn locate<'a>(
        &self,
        document: &'a Html,
        is_listing: impl Fn(&ElementRef<'a>) -> bool,
    ) -> Option<(Tier, Vec<ElementRef<'a>>)> {
        let root = document.root_element();

        // Matched containers may nest; each row is kept once, in document order.
        let mut seen = HashSet::new();
        let primary: Vec<_> = select_all(root, self.container)
            .into_iter()
            .flat_map(|container| select_all(container, self.row))
            .filter(|row| seen.insert(row.id()))
            .filter(|row| is_listing(row))
            .collect();
        if !primary.is_empty() {
            return Some((Tier::Primary, primary));
        }
        tracing::warn!("No rows under '{}', trying similar containers", self.container);

        let mut largest: Option<(usize, ElementRef<'a>)> = None;
        for candidate in select_all(root, self.candidates) {
            let count = select_all(candidate, self.row).len();
            if count > largest.map_or(0, |(best, _)| best) {
                largest = Some((count, candidate));
            }
        }
        if let Some((count, container)) = largest {
            tracing::info!("Largest '{}' candidate has {count} rows", self.candidates);
            let rows: Vec<_> = select_all(container, self.row)
                .into_iter()
                .filter(|row| is_listing(row))
                .collect();
            if !rows.is_empty() {
                return Some((Tier::Structural, rows));
            }
        }

        let rows: Vec<_> = select_all(root, self.row)
            .into_iter()
            .filter(|row| (self.has_identity)(row))
            .collect();
        if !rows.is_empty() {
            return Some((Tier::Attribute, rows));
        }

        tracing::warn!("No listing rows found by any tier");
        None
    }
}

/// Why a row was dropped.
#[derive(Debug, thiserror::Error)]
pub enum RowError {
    #[error("no usable link")]
    MissingLink,

    #[error("missing {0}")]
    MissingField(&'static str),
}

/// All matches of `css` under `scope`; an invalid selector matches nothing.
pub fn select_all<'a>(scope: ElementRef<'a>, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(selector) => scope.select(&selector).collect(),
        Err(e) => {
            tracing::error!("Invalid selector '{css}': {e:?}");
            Vec::new()
        }
    }
}

/// First element matching any of `selectors`, tried in order.
pub fn first_match<'a>(scope: ElementRef<'a>, selectors: &[&str]) -> Option<ElementRef<'a>> {
    selectors
        .iter()
        .find_map(|css| select_all(scope, css).into_iter().next())
}

/// Whitespace-collapsed text content.
pub fn text_of(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(|t| t.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Non-empty text of the first selector that yields any.
pub fn first_text(scope: ElementRef<'_>, selectors: &[&str]) -> Option<String> {
    selectors.iter().find_map(|css| {
        select_all(scope, css)
            .into_iter()
            .map(text_of)
            .find(|text| !text.is_empty())
    })
}

/// Non-empty texts of every match of the first selector that yields any.
pub fn all_texts(scope: ElementRef<'_>, selectors: &[&str]) -> Vec<String> {
    selectors
        .iter()
        .map(|css| {
            select_all(scope, css)
                .into_iter()
                .map(text_of)
                .filter(|text| !text.is_empty())
                .collect::<Vec<_>>()
        })
        .find(|texts| !texts.is_empty())
        .unwrap_or_default()
}

/// Non-empty attribute value, trimmed.
pub fn attr(element: ElementRef<'_>, name: &str) -> Option<String> {
    element
        .value()
        .attr(name)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// `href` of the first anchor matched by any of `selectors`.
pub fn first_href(scope: ElementRef<'_>, selectors: &[&str]) -> Option<String> {
    selectors.iter().find_map(|css| {
        select_all(scope, css)
            .into_iter()
            .find_map(|a| attr(a, "href"))
    })
}

pub fn has_class(element: &ElementRef<'_>, class: &str) -> bool {
    element.value().classes().any(|c| c == class)
}

/// Make `href` absolute against `origin`. Non-http(s) results are rejected.
pub fn absolute_url(origin: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let resolved = Url::parse(origin).ok()?.join(href).ok()?;
    matches!(resolved.scheme(), "http" | "https").then(|| resolved.to_string())
}

/// Format a unix timestamp as `YYYY-MM-DD` (UTC).
pub fn epoch_to_date(raw: &str) -> Option<String> {
    let seconds: i64 = raw.trim().parse().ok()?;
    DateTime::from_timestamp(seconds, 0).map(|dt| dt.format("%Y-%m-%d").to_string())
}
