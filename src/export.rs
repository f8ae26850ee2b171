use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::models::job::FlatRow;

/// UTF-8 byte-order mark, so spreadsheet apps detect the encoding.
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Exports whose first row comes from this source are written with a BOM.
const BOM_SOURCE: &str = "remoteok";

/// Source label used in filenames when rows of several sources are exported together.
pub const MIXED_SOURCE: &str = "jobs";

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("No jobs data available")]
    NoData,

    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A finished CSV document ready to be served or saved.
#[derive(Debug, Clone)]
pub struct CsvExport {
    pub filename: String,
    pub content: Vec<u8>,
}

/// Export the rows of one source (or all rows, when `source` is `None`).
pub fn export_csv(
    rows: &[FlatRow],
    source: Option<&str>,
    keyword: &str,
    now: DateTime<Local>,
) -> Result<CsvExport, ExportError> {
    let selected: Vec<&FlatRow> = rows
        .iter()
        .filter(|row| source.is_none_or(|s| row.source == s))
        .collect();
    let first = selected.first().ok_or(ExportError::NoData)?;

    let content = to_csv(&selected, first.source == BOM_SOURCE)?;
    Ok(CsvExport {
        filename: filename(source.unwrap_or(MIXED_SOURCE), keyword, now),
        content,
    })
}

/// Header row from the first row, then every row's cells.
///
/// Rows of different shapes may be mixed; each record keeps its own width.
pub fn to_csv(rows: &[&FlatRow], bom: bool) -> Result<Vec<u8>, ExportError> {
    let first = rows.first().ok_or(ExportError::NoData)?;

    let mut buf = Vec::new();
    if bom {
        buf.extend_from_slice(UTF8_BOM);
    }
    let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(buf);
    writer.write_record(&first.headers)?;
    for row in rows {
        writer.write_record(&row.cells)?;
    }
    writer
        .into_inner()
        .map_err(|e| ExportError::Io(e.into_error()))
}

/// `{source}_{keyword}_{YYYYmmdd_HHMMSS}.csv`, with the keyword reduced to safe characters.
pub fn filename(source: &str, keyword: &str, now: DateTime<Local>) -> String {
    let keyword: String = keyword
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{source}_{keyword}_{}.csv", now.format("%Y%m%d_%H%M%S"))
}

/// Write an export into `dir`, creating the directory if needed.
pub async fn save(export: &CsvExport, dir: &Path) -> Result<PathBuf, ExportError> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(&export.filename);
    tokio::fs::write(&path, &export.content).await?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn row(source: &str, cells: &[&str]) -> FlatRow {
        FlatRow {
            source: source.into(),
            headers: (0..cells.len()).map(|i| format!("H{i}")).collect(),
            cells: cells.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn noon() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 3, 14, 12, 5, 9).unwrap()
    }

    #[test]
    fn remote_board_export_has_bom_and_header() {
        let rows = vec![row("remoteok", &["Rust Dev", "Acme, Inc"])];
        let export = export_csv(&rows, Some("remoteok"), "rust", noon()).unwrap();

        assert!(export.content.starts_with(UTF8_BOM));
        let text = String::from_utf8(export.content[UTF8_BOM.len()..].to_vec()).unwrap();
        assert_eq!(text, "H0,H1\nRust Dev,\"Acme, Inc\"\n");
        assert_eq!(export.filename, "remoteok_rust_20250314_120509.csv");
    }

    #[test]
    fn other_sources_have_no_bom() {
        let rows = vec![row("wwr", &["a", "b", "c", "d", "e"])];
        let export = export_csv(&rows, None, "go", noon()).unwrap();

        assert!(!export.content.starts_with(UTF8_BOM));
        assert_eq!(export.filename, "jobs_go_20250314_120509.csv");
    }

    #[test]
    fn mixed_widths_are_written() {
        let rows = vec![row("wwr", &["a", "b", "c"]), row("wanted", &["x", "y"])];
        let export = export_csv(&rows, None, "k", noon()).unwrap();
        assert_eq!(
            String::from_utf8(export.content).unwrap(),
            "H0,H1,H2\na,b,c\nx,y\n"
        );
    }

    #[test]
    fn empty_selection_is_no_data() {
        let rows = vec![row("wwr", &["a"])];
        assert!(matches!(
            export_csv(&rows, Some("remoteok"), "rust", noon()),
            Err(ExportError::NoData)
        ));
        assert!(matches!(
            export_csv(&[], None, "rust", noon()),
            Err(ExportError::NoData)
        ));
    }

    #[test]
    fn filename_sanitises_keyword() {
        assert_eq!(
            filename("wwr", " c++ / dev ", noon()),
            "wwr_c_____dev_20250314_120509.csv"
        );
    }

    #[tokio::test]
    async fn save_writes_into_directory() {
        let dir = tempfile::tempdir().unwrap();
        let export = CsvExport {
            filename: "wwr_rust_20250314_120509.csv".into(),
            content: b"H0\nx\n".to_vec(),
        };

        let path = save(&export, &dir.path().join("out")).await.unwrap();
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"H0\nx\n");
    }
}
