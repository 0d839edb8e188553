//! 🧾 Delimited text sheets: CSV, its semicolon cousin, and the odd TSV.
//!
//! Back-offices export whatever their locale prefers, so the delimiter is
//! sniffed from the header line unless configured. Bytes that are not valid
//! UTF-8 are read as Latin-1: that is exactly how the legacy Greek headers
//! turned into the mojibake the alias tables list by name.

use anyhow::{Context, Result};
use async_trait::async_trait;
use memchr::{memchr, memchr_iter};
use tracing::{debug, warn};

use crate::common::CellValue;
use crate::errors::SourceError;
use crate::sources::{Sheet, Source, SourceLocation, display_name, fetch_bytes};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const CANDIDATE_DELIMITERS: [u8; 3] = [b',', b';', b'\t'];

#[derive(Debug, Clone)]
pub struct DelimitedSource {
    location: SourceLocation,
    delimiter: Option<char>,
}

impl DelimitedSource {
    pub fn new(location: SourceLocation, delimiter: Option<char>) -> Self {
        Self {
            location,
            delimiter,
        }
    }
}

#[async_trait]
impl Source for DelimitedSource {
    async fn read_sheet(&self) -> Result<Sheet> {
        let bytes = fetch_bytes(&self.location).await?;
        let name = display_name(&self.location);
        parse_delimited(&name, &bytes, self.delimiter)
            .with_context(|| format!("💀 could not parse delimited sheet {}", self.location))
    }
}

/// 🔤 UTF-8 when it is UTF-8, Latin-1 otherwise. Never fails.
pub(crate) fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            debug!("🔤 sheet is not UTF-8, reading it as Latin-1");
            bytes.iter().map(|&byte| byte as char).collect()
        }
    }
}

/// 👃 Picks the most frequent of `,` `;` tab on the first line. Ties go to `,`.
pub(crate) fn sniff_delimiter(text: &str) -> u8 {
    let bytes = text.as_bytes();
    let first_line = match memchr(b'\n', bytes) {
        Some(end) => &bytes[..end],
        None => bytes,
    };
    let mut best = (b',', 0usize);
    for candidate in CANDIDATE_DELIMITERS {
        let count = memchr_iter(candidate, first_line).count();
        if count > best.1 {
            best = (candidate, count);
        }
    }
    best.0
}

pub(crate) fn parse_delimited(name: &str, bytes: &[u8], delimiter: Option<char>) -> Result<Sheet> {
    let text = decode_text(bytes);
    let delimiter = match delimiter {
        Some(explicit) if explicit.is_ascii() => explicit as u8,
        Some(explicit) => {
            return Err(SourceError::Decode {
                location: name.to_string(),
                detail: format!("delimiter {explicit:?} is not a single byte"),
            }
            .into());
        }
        None => sniff_delimiter(&text),
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut records = reader.records();
    let headers: Vec<String> = match records.next() {
        Some(first) => first
            .map_err(|err| SourceError::Decode {
                location: name.to_string(),
                detail: err.to_string(),
            })?
            .iter()
            .map(str::to_string)
            .collect(),
        None => {
            warn!("📭 sheet {name} is empty, not even a header line");
            Vec::new()
        }
    };

    let mut data = Vec::new();
    for (offset, record) in records.enumerate() {
        let record = record.map_err(|err| SourceError::Decode {
            location: name.to_string(),
            detail: err.to_string(),
        })?;
        let line = record
            .position()
            .and_then(|position| usize::try_from(position.line()).ok())
            .unwrap_or(offset + 2);
        data.push((line, record.iter().map(text_cell).collect::<Vec<_>>()));
    }
    Ok(Sheet::from_numbered_rows(name, headers, data))
}

fn text_cell(raw: &str) -> CellValue {
    if raw.is_empty() {
        CellValue::Empty
    } else {
        CellValue::Text(raw.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::headers::resolve_field;

    #[test]
    fn the_one_where_semicolons_win_the_popularity_contest() {
        assert_eq!(sniff_delimiter("Code;Name;Price\nA,1;x;2"), b';');
        assert_eq!(sniff_delimiter("Code\tName\n"), b'\t');
        assert_eq!(sniff_delimiter("Code"), b',');
    }

    #[test]
    fn the_one_where_cp1253_headers_come_out_as_mojibake() -> Result<()> {
        // -- "Κωδικός;Τιμή" in cp1253
        let mut bytes = vec![0xCA, 0xF9, 0xE4, 0xE9, 0xEA, 0xFC, 0xF2, b';'];
        bytes.extend_from_slice(&[0xD4, 0xE9, 0xEC, 0xDE, b'\n']);
        bytes.extend_from_slice(b"A1;12,50\n");

        let sheet = parse_delimited("legacy.csv", &bytes, None)?;
        assert_eq!(sheet.header.names(), ["Êùäéêüò", "ÔéìÞ"]);
        assert_eq!(
            resolve_field(&sheet.rows[0], &["Êùäéêüò"]),
            Some(&CellValue::from("A1"))
        );
        Ok(())
    }

    #[test]
    fn the_one_where_the_bom_and_ragged_rows_are_forgiven() -> Result<()> {
        let bytes = "\u{feff}Code,Name,Price\nA1,Ship\n,,\nA2,Boat,3.5,extra\n".as_bytes();
        let sheet = parse_delimited("fixture.csv", bytes, None)?;
        assert_eq!(sheet.header.names()[0], "Code");
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[0].cell(2), &CellValue::Empty);
        assert_eq!(sheet.rows[1].line, 4);
        Ok(())
    }

    #[test]
    fn the_one_where_blank_lines_do_not_shift_row_numbers() -> Result<()> {
        let bytes = b"Code,Name\n\nA1,Ship\n\n\nA2,Boat\n";
        let sheet = parse_delimited("fixture.csv", bytes, None)?;
        let lines: Vec<usize> = sheet.rows.iter().map(|row| row.line).collect();
        assert_eq!(lines, vec![3, 6]);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_the_sheet_comes_over_http() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pub/products.csv"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Code;Price\nA1;\"12,50\"\n"))
            .mount(&server)
            .await;

        let source = DelimitedSource::new(
            SourceLocation::Url(format!("{}/pub/products.csv", server.uri())),
            None,
        );
        let sheet = source.read_sheet().await?;
        assert_eq!(sheet.name, "products.csv");
        assert_eq!(sheet.rows[0].get("Price"), Some(&CellValue::from("12,50")));
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_the_sheet_lives_on_disk() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(b"Code|Name\nA1|Ship\n")?;

        let source = DelimitedSource::new(SourceLocation::File(file.path().to_path_buf()), Some('|'));
        let sheet = source.read_sheet().await?;
        assert_eq!(sheet.rows[0].get("Name"), Some(&CellValue::from("Ship")));
        Ok(())
    }
}
