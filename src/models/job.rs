use std::collections::BTreeMap;

use serde::Serialize;

/// Rendered in place of an optional attribute the source never provides.
pub const NOT_SPECIFIED: &str = "Not specified";
/// Rendered when a field's selectors all came up empty.
pub const NOT_FOUND: &str = "Not found";
pub const UNTITLED: &str = "Untitled";
pub const UNKNOWN_COMPANY: &str = "Unknown";
/// Value of the remote board's last column for promoted rows.
pub const AD_MARKER: &str = "Ad";

/// Shared rendering contract of every record variant.
///
/// `headers()` and `to_row()` are position-aligned and always have the same
/// length; index 0 is the position/title and index 1 the company.
pub trait Tabular {
    fn headers(&self) -> Vec<String>;
    fn to_row(&self) -> Vec<String>;
}

/// A listing from the remote board (rendered table rows, with promoted rows mixed in).
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteBoardJob {
    pub title: String,
    pub company: String,
    pub location: Option<String>,
    pub link: String,
    pub salary: Option<String>,
    pub posted_date: Option<String>,
    pub tags: Vec<String>,
    pub is_advertisement: bool,
}

impl Tabular for RemoteBoardJob {
    fn headers(&self) -> Vec<String> {
        [
            "Title",
            "Company",
            "Location",
            "Link",
            "Salary",
            "Posted Date",
            "Tags",
            "Ad",
        ]
        .map(String::from)
        .to_vec()
    }

    fn to_row(&self) -> Vec<String> {
        vec![
            self.title.clone(),
            self.company.clone(),
            or_not_specified(&self.location),
            self.link.clone(),
            or_not_specified(&self.salary),
            self.posted_date.clone().unwrap_or_default(),
            self.tags.join(", "),
            if self.is_advertisement {
                AD_MARKER.to_string()
            } else {
                String::new()
            },
        ]
    }
}

/// A listing from the general board, grouped into named sections on the page.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneralBoardJob {
    pub position: String,
    pub company: String,
    pub location: Option<String>,
    pub salary: Option<String>,
    pub link: String,
    pub categories: Vec<String>,
    section: Option<String>,
}

impl GeneralBoardJob {
    pub fn new(
        position: String,
        company: String,
        location: Option<String>,
        link: String,
        categories: Vec<String>,
    ) -> Self {
        Self {
            position,
            company,
            location,
            // The board never publishes salaries.
            salary: None,
            link,
            categories,
            section: None,
        }
    }

    /// Records the section heading once it is known; later calls are ignored.
    pub fn set_section(&mut self, name: impl Into<String>) {
        if self.section.is_none() {
            self.section = Some(name.into());
        }
    }

    pub fn section(&self) -> Option<&str> {
        self.section.as_deref()
    }
}

impl Tabular for GeneralBoardJob {
    fn headers(&self) -> Vec<String> {
        ["Position", "Company", "Location", "Salary", "Link"]
            .map(String::from)
            .to_vec()
    }

    fn to_row(&self) -> Vec<String> {
        vec![
            self.position.clone(),
            self.company.clone(),
            or_not_specified(&self.location),
            or_not_specified(&self.salary),
            self.link.clone(),
        ]
    }
}

/// Company posting with a variable set of columns.
///
/// Location, salary and reward only produce a column when present; extra
/// fields follow in key order, and the link is always last.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompanyPostingJob {
    pub position: String,
    pub company: String,
    pub link: String,
    pub location: Option<String>,
    pub salary: Option<String>,
    pub reward: Option<String>,
    pub extra: BTreeMap<String, String>,
}

impl CompanyPostingJob {
    pub fn new(position: String, company: String, link: String) -> Self {
        Self {
            position,
            company,
            link,
            ..Default::default()
        }
    }

    fn optional_columns(&self) -> impl Iterator<Item = (&'static str, &String)> {
        [
            ("Location", &self.location),
            ("Salary", &self.salary),
            ("Reward", &self.reward),
        ]
        .into_iter()
        .filter_map(|(header, value)| value.as_ref().map(|v| (header, v)))
    }
}

impl Tabular for CompanyPostingJob {
    fn headers(&self) -> Vec<String> {
        let mut headers = vec!["Position".to_string(), "Company".to_string()];
        headers.extend(self.optional_columns().map(|(h, _)| h.to_string()));
        headers.extend(self.extra.keys().map(|k| title_case(k)));
        headers.push("Link".to_string());
        headers
    }

    fn to_row(&self) -> Vec<String> {
        let mut row = vec![self.position.clone(), self.company.clone()];
        row.extend(self.optional_columns().map(|(_, v)| v.clone()));
        row.extend(self.extra.values().cloned());
        row.push(self.link.clone());
        row
    }
}

/// Normalized job record, one variant per listing layout.
#[derive(Debug, Clone, PartialEq)]
pub enum JobRecord {
    RemoteBoard(RemoteBoardJob),
    GeneralBoard(GeneralBoardJob),
    CompanyPosting(CompanyPostingJob),
}

impl JobRecord {
    pub fn link(&self) -> &str {
        match self {
            JobRecord::RemoteBoard(job) => &job.link,
            JobRecord::GeneralBoard(job) => &job.link,
            JobRecord::CompanyPosting(job) => &job.link,
        }
    }

    /// Reduce the record to the row shape that is cached and exported.
    pub fn flatten(&self, source: &str) -> FlatRow {
        FlatRow {
            source: source.to_string(),
            headers: self.headers(),
            cells: self.to_row(),
        }
    }

    fn inner(&self) -> &dyn Tabular {
        match self {
            JobRecord::RemoteBoard(job) => job,
            JobRecord::GeneralBoard(job) => job,
            JobRecord::CompanyPosting(job) => job,
        }
    }
}

impl Tabular for JobRecord {
    fn headers(&self) -> Vec<String> {
        self.inner().headers()
    }

    fn to_row(&self) -> Vec<String> {
        self.inner().to_row()
    }
}

/// A record reduced to strings, tagged with the source that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlatRow {
    pub source: String,
    pub headers: Vec<String>,
    pub cells: Vec<String>,
}

fn or_not_specified(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| NOT_SPECIFIED.to_string())
}

/// Upper-case the first letter of every alphabetic run: `posted_at` -> `Posted_At`.
fn title_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut boundary = true;
    for c in key.chars() {
        if c.is_alphabetic() {
            if boundary {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            boundary = false;
        } else {
            out.push(c);
            boundary = true;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(is_ad: bool) -> RemoteBoardJob {
        RemoteBoardJob {
            title: "Rust Engineer".into(),
            company: "Acme".into(),
            location: None,
            link: "https://remoteok.com/remote-jobs/rust-engineer-1".into(),
            salary: Some("💰 $100k - $150k".into()),
            posted_date: None,
            tags: vec!["rust".into(), "backend".into()],
            is_advertisement: is_ad,
        }
    }

    #[test]
    fn every_variant_aligns_headers_and_row() {
        let mut posting = CompanyPostingJob::new(
            "Backend".into(),
            "Wanted Lab".into(),
            "https://www.wanted.co.kr/wd/1".into(),
        );
        posting.reward = Some("1,000,000원".into());
        posting.extra.insert("posted_at".into(), "2024-01-01".into());
        posting.extra.insert("career".into(), "3-5".into());

        let records = [
            JobRecord::RemoteBoard(remote(false)),
            JobRecord::RemoteBoard(remote(true)),
            JobRecord::GeneralBoard(GeneralBoardJob::new(
                "Dev".into(),
                "Co".into(),
                None,
                "https://weworkremotely.com/remote-jobs/co-dev".into(),
                vec![],
            )),
            JobRecord::CompanyPosting(posting),
            JobRecord::CompanyPosting(CompanyPostingJob::default()),
        ];

        for record in &records {
            assert_eq!(record.headers().len(), record.to_row().len(), "{record:?}");
        }
    }

    #[test]
    fn remote_board_row_has_eight_columns_and_marker() {
        let row = remote(false).to_row();
        assert_eq!(row.len(), 8);
        assert_eq!(row[2], NOT_SPECIFIED);
        assert_eq!(row[5], "");
        assert_eq!(row[6], "rust, backend");
        assert_eq!(row[7], "");

        assert_eq!(remote(true).to_row()[7], AD_MARKER);
    }

    #[test]
    fn general_board_fills_missing_salary_with_sentinel() {
        let job = GeneralBoardJob::new(
            "Dev".into(),
            "Co".into(),
            Some("Anywhere".into()),
            "https://weworkremotely.com/x".into(),
            vec![],
        );
        assert_eq!(
            job.to_row(),
            vec!["Dev", "Co", "Anywhere", NOT_SPECIFIED, "https://weworkremotely.com/x"]
        );
    }

    #[test]
    fn section_is_set_once() {
        let mut job = GeneralBoardJob::new("a".into(), "b".into(), None, "c".into(), vec![]);
        job.set_section("Programming");
        job.set_section("Design");
        assert_eq!(job.section(), Some("Programming"));
    }

    #[test]
    fn company_posting_orders_extras_by_key_before_link() {
        let mut job = CompanyPostingJob::new("P".into(), "C".into(), "L".into());
        job.reward = Some("R".into());
        job.extra.insert("zeta".into(), "z".into());
        job.extra.insert("posted_at".into(), "p".into());

        assert_eq!(
            job.headers(),
            vec!["Position", "Company", "Reward", "Posted_At", "Zeta", "Link"]
        );
        assert_eq!(job.to_row(), vec!["P", "C", "R", "p", "z", "L"]);
    }

    #[test]
    fn flatten_keeps_source_and_shape() {
        let row = JobRecord::RemoteBoard(remote(false)).flatten("remoteok");
        assert_eq!(row.source, "remoteok");
        assert_eq!(row.headers[0], "Title");
        assert_eq!(row.cells[1], "Acme");
    }
}
