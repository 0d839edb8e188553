//! 📗 Workbook sheets (xlsx, xls, ods) via calamine, decoded from memory.
//!
//! Image cells are the fun part: the value range only holds whatever Excel
//! cached (often nothing, sometimes `#VALUE!`), so the formula range is read
//! alongside and any `IMAGE(...)` formula replaces the cell as `=IMAGE(...)`.

use std::io::Cursor;

use anyhow::{Context, Result};
use async_trait::async_trait;
use calamine::{Data, Range, Reader, open_workbook_auto_from_rs};
use tracing::{debug, warn};

use crate::common::CellValue;
use crate::errors::SourceError;
use crate::sources::{Sheet, Source, SourceLocation, fetch_bytes};

#[derive(Debug, Clone)]
pub struct WorkbookSource {
    location: SourceLocation,
    sheet: Option<String>,
    header_row: usize,
}

impl WorkbookSource {
    pub fn new(location: SourceLocation, sheet: Option<String>, header_row: usize) -> Self {
        Self {
            location,
            sheet,
            header_row,
        }
    }
}

#[async_trait]
impl Source for WorkbookSource {
    async fn read_sheet(&self) -> Result<Sheet> {
        let bytes = fetch_bytes(&self.location).await?;
        parse_workbook(
            &self.location.to_string(),
            bytes,
            self.sheet.as_deref(),
            self.header_row,
        )
        .with_context(|| format!("💀 could not parse workbook {}", self.location))
    }
}

pub(crate) fn parse_workbook(
    location: &str,
    bytes: Vec<u8>,
    sheet: Option<&str>,
    header_row: usize,
) -> Result<Sheet> {
    let decode_error = |detail: String| SourceError::Decode {
        location: location.to_string(),
        detail,
    };

    let mut workbook =
        open_workbook_auto_from_rs(Cursor::new(bytes)).map_err(|err| decode_error(err.to_string()))?;
    let available = workbook.sheet_names();
    let name = match sheet {
        Some(wanted) if available.iter().any(|name| name == wanted) => wanted.to_string(),
        Some(wanted) => {
            return Err(SourceError::MissingWorksheet {
                sheet: wanted.to_string(),
                available,
            }
            .into());
        }
        None => available
            .first()
            .cloned()
            .ok_or_else(|| decode_error("workbook has no worksheets".to_string()))?,
    };

    let values = workbook
        .worksheet_range(&name)
        .map_err(|err| decode_error(err.to_string()))?;
    // -- formulas are a nice-to-have, a workbook without them is still a workbook
    let formulas = match workbook.worksheet_formula(&name) {
        Ok(formulas) => Some(formulas),
        Err(err) => {
            debug!("📗 no formula range for '{name}': {err}");
            None
        }
    };

    let Some((start_row, start_col)) = values.start() else {
        warn!("📭 worksheet '{name}' is empty");
        return Ok(Sheet::from_grid(name, Vec::new(), Vec::new(), 1));
    };
    let skip = (header_row as u32).saturating_sub(start_row) as usize;

    let mut grid = values.rows().enumerate().skip(skip).map(|(offset, cells)| {
        let absolute_row = start_row + offset as u32;
        cells
            .iter()
            .enumerate()
            .map(|(column, cell)| {
                let position = (absolute_row, start_col + column as u32);
                image_formula(formulas.as_ref(), position).unwrap_or_else(|| cell_value(cell))
            })
            .collect::<Vec<_>>()
    });

    let headers: Vec<String> = grid
        .next()
        .map(|cells| cells.iter().map(CellValue::as_text).collect())
        .unwrap_or_default();
    let first_line = start_row as usize + skip + 2;
    Ok(Sheet::from_grid(name, headers, grid, first_line))
}

/// 🖼️ `=IMAGE("...")` for cells whose formula is an image, `None` otherwise.
fn image_formula(formulas: Option<&Range<String>>, position: (u32, u32)) -> Option<CellValue> {
    let formula = formulas?.get_value(position)?.trim();
    let formula = formula.strip_prefix('=').unwrap_or(formula);
    let formula = formula.strip_prefix("_xlfn.").unwrap_or(formula);
    formula
        .get(..6)
        .is_some_and(|head| head.eq_ignore_ascii_case("image("))
        .then(|| CellValue::Text(format!("={formula}")))
}

fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::String(text) if text.is_empty() => CellValue::Empty,
        Data::String(text) => CellValue::Text(text.clone()),
        Data::Int(number) => CellValue::Number(*number as f64),
        Data::Float(number) => CellValue::Number(*number),
        Data::Bool(flag) => CellValue::Bool(*flag),
        Data::DateTime(moment) => CellValue::Number(moment.as_f64()),
        Data::DateTimeIso(text) | Data::DurationIso(text) => CellValue::Text(text.clone()),
        Data::Error(_) | Data::Empty => CellValue::Empty,
    }
}
