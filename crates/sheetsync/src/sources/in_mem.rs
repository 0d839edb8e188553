//! 🧠 A source that already has its rows. For tests and dry runs.

use anyhow::Result;
use async_trait::async_trait;

use crate::common::CellValue;
use crate::sources::{Sheet, Source};

#[derive(Debug, Clone)]
pub struct InMemorySource {
    name: String,
    headers: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl InMemorySource {
    pub fn new(name: impl Into<String>, headers: &[&str], rows: Vec<Vec<CellValue>>) -> Self {
        Self {
            name: name.into(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows,
        }
    }

    /// 🧪 Shorthand for all-text fixtures.
    pub fn from_text(name: impl Into<String>, headers: &[&str], rows: &[&[&str]]) -> Self {
        let rows = rows
            .iter()
            .map(|cells| cells.iter().map(|&cell| text_or_empty(cell)).collect())
            .collect();
        Self::new(name, headers, rows)
    }
}

fn text_or_empty(cell: &str) -> CellValue {
    if cell.is_empty() {
        CellValue::Empty
    } else {
        CellValue::from(cell)
    }
}

#[async_trait]
impl Source for InMemorySource {
    async fn read_sheet(&self) -> Result<Sheet> {
        Ok(Sheet::from_grid(
            self.name.clone(),
            self.headers.clone(),
            self.rows.clone(),
            2,
        ))
    }
}
