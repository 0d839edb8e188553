//! 📡 Source readers: turn a remote (or local) spreadsheet into rows.
//!
//! 🎭 Same casting as the stores: a [`Source`] trait, concrete readers for
//! delimited text and workbooks (plus an in-memory one for tests), and a
//! [`SourceBackend`] enum so the pipeline never cares which one it got.
//!
//! # Contract 📜
//! - one fetch per read: a single GET (or file read), no retry, no timeout
//!   beyond the client's connect timeout. Non-2xx is a [`SourceError`].
//! - the header row is parsed once into an `Arc<HeaderRow>` that every row
//!   of that sheet shares.
//! - rows whose cells are all blank are dropped. Ragged rows are fine.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use crate::app_config::SourceConfig;
use crate::errors::SourceError;
use crate::headers::{HeaderRow, Row};

pub mod delimited;
pub mod in_mem;
pub mod workbook;

pub use delimited::DelimitedSource;
pub use in_mem::InMemorySource;
pub use workbook::WorkbookSource;

/// 📍 Where the bytes come from.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceLocation {
    Url(String),
    File(PathBuf),
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceLocation::Url(url) => write!(f, "{url}"),
            SourceLocation::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// 🧾 How the bytes are shaped.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub enum SheetFormat {
    /// Comma/semicolon/tab separated text. `None` sniffs the first line.
    Delimited {
        #[serde(default)]
        delimiter: Option<char>,
    },
    /// xlsx / xls / ods, auto-detected from the bytes.
    Workbook {
        /// Worksheet name; first sheet when absent.
        #[serde(default)]
        sheet: Option<String>,
        /// 0-based row holding the headers. Rows above it are ignored.
        #[serde(default)]
        header_row: usize,
    },
}

impl Default for SheetFormat {
    fn default() -> Self {
        SheetFormat::Delimited { delimiter: None }
    }
}

/// 📄 A decoded sheet: its name, its headers, its non-blank rows.
#[derive(Debug, Clone)]
pub struct Sheet {
    pub name: String,
    pub header: Arc<HeaderRow>,
    pub rows: Vec<Row>,
}

impl Sheet {
    /// 🏗️ Builds a sheet from a header line and raw data lines.
    ///
    /// `first_line` is the 1-based source line of the first data row. Blank
    /// rows are dropped here, once, for every reader.
    pub fn from_grid(
        name: impl Into<String>,
        headers: Vec<String>,
        data: impl IntoIterator<Item = Vec<crate::common::CellValue>>,
        first_line: usize,
    ) -> Self {
        let numbered = data
            .into_iter()
            .enumerate()
            .map(|(offset, cells)| (first_line + offset, cells));
        Self::from_numbered_rows(name, headers, numbered)
    }

    /// 🏗️ Same as [`Sheet::from_grid`], for readers that know each row's own
    /// source line (a CSV reader skips empty lines, so offsets drift).
    pub fn from_numbered_rows(
        name: impl Into<String>,
        headers: Vec<String>,
        data: impl IntoIterator<Item = (usize, Vec<crate::common::CellValue>)>,
    ) -> Self {
        let header = Arc::new(HeaderRow::new(
            headers.into_iter().map(|h| h.trim().to_string()).collect(),
        ));
        let rows = data
            .into_iter()
            .filter(|(_, cells)| !cells.iter().all(|cell| cell.is_blank()))
            .map(|(line, cells)| Row::new(Arc::clone(&header), cells, line))
            .collect();
        Self {
            name: name.into(),
            header,
            rows,
        }
    }
}

/// 📡 Something that can produce a [`Sheet`].
#[async_trait]
pub trait Source: std::fmt::Debug + Send + Sync {
    /// 📥 Fetch and decode the whole sheet. One fetch per call.
    async fn read_sheet(&self) -> Result<Sheet>;
}

/// 🎭 The many faces of a sheet source.
#[derive(Debug)]
pub enum SourceBackend {
    Delimited(DelimitedSource),
    Workbook(WorkbookSource),
    InMemory(InMemorySource),
}

impl SourceBackend {
    /// 🏗️ Builds the reader a [`SourceConfig`] asks for.
    pub fn from_config(config: &SourceConfig) -> Result<Self> {
        let location = config.location()?;
        Ok(match &config.format {
            SheetFormat::Delimited { delimiter } => {
                SourceBackend::Delimited(DelimitedSource::new(location, *delimiter))
            }
            SheetFormat::Workbook { sheet, header_row } => SourceBackend::Workbook(
                WorkbookSource::new(location, sheet.clone(), *header_row),
            ),
        })
    }
}

#[async_trait]
impl Source for SourceBackend {
    async fn read_sheet(&self) -> Result<Sheet> {
        let sheet = match self {
            SourceBackend::Delimited(source) => source.read_sheet().await,
            SourceBackend::Workbook(source) => source.read_sheet().await,
            SourceBackend::InMemory(source) => source.read_sheet().await,
        }?;
        info!(
            "📄 sheet '{}' decoded: {} columns, {} rows",
            sheet.name,
            sheet.header.len(),
            sheet.rows.len()
        );
        Ok(sheet)
    }
}

/// 📥 The single suspending fetch of an import. URL or file, bytes out.
pub(crate) async fn fetch_bytes(location: &SourceLocation) -> Result<Vec<u8>> {
    match location {
        SourceLocation::Url(url) => {
            let client = reqwest::Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .build()
                .context("💀 The HTTP client refused to be born.")?;
            let response = client
                .get(url)
                .send()
                .await
                .with_context(|| format!("💀 fetching sheet from {url} failed"))?;
            let status = response.status();
            if !status.is_success() {
                return Err(SourceError::FetchStatus {
                    location: url.clone(),
                    status: status.as_u16(),
                }
                .into());
            }
            let bytes = response
                .bytes()
                .await
                .with_context(|| format!("💀 reading the body of {url} failed"))?;
            debug!("📡 fetched {} bytes from {url}", bytes.len());
            Ok(bytes.to_vec())
        }
        SourceLocation::File(path) => {
            let bytes = tokio::fs::read(path)
                .await
                .with_context(|| format!("💀 could not read sheet file '{}'", path.display()))?;
            debug!("📂 read {} bytes from {}", bytes.len(), path.display());
            Ok(bytes)
        }
    }
}

/// 🏷️ A sheet name for logs: the file name, or the last URL path segment.
pub(crate) fn display_name(location: &SourceLocation) -> String {
    match location {
        SourceLocation::Url(url) => reqwest::Url::parse(url)
            .ok()
            .and_then(|parsed| {
                parsed
                    .path_segments()
                    .and_then(|mut segments| segments.next_back().map(str::to_string))
            })
            .filter(|segment| !segment.is_empty())
            .unwrap_or_else(|| url.clone()),
        SourceLocation::File(path) => path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::common::CellValue;

    #[tokio::test]
    async fn the_one_where_a_404_sheet_stops_the_import_cold() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/helios.csv"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let location = SourceLocation::Url(format!("{}/helios.csv", server.uri()));
        let err = fetch_bytes(&location).await.expect_err("💀 404 must fail");
        let source_error = err
            .downcast_ref::<SourceError>()
            .expect("💀 should be a typed source error");
        assert!(matches!(
            source_error,
            SourceError::FetchStatus { status: 404, .. }
        ));
    }

    #[test]
    fn the_one_where_blank_rows_never_make_it_in() {
        let sheet = Sheet::from_grid(
            "fixture",
            vec![" Code ".into(), "Name".into()],
            vec![
                vec![CellValue::from("A1"), CellValue::from("Ship")],
                vec![CellValue::Empty, CellValue::from("   ")],
                vec![CellValue::from("A2")],
            ],
            2,
        );
        assert_eq!(sheet.header.names(), ["Code", "Name"]);
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[1].line, 4);
        assert_eq!(sheet.rows[1].cell(1), &CellValue::Empty);
    }

    #[test]
    fn the_one_where_names_come_from_the_tail_of_the_location() {
        assert_eq!(
            display_name(&SourceLocation::Url("https://x.example/pub/helios.csv?x=1".into())),
            "helios.csv"
        );
        assert_eq!(
            display_name(&SourceLocation::File(PathBuf::from("/tmp/orion.xlsx"))),
            "orion.xlsx"
        );
    }
}
