//! 💀 The three flavors of "something went wrong".
//!
//! - [`SkipReason`]: row-level. Counted, logged, and the import keeps going.
//! - [`SourceError`]: source-level. Fatal for that import, nothing is written.
//! - [`StoreError`]: the store answered, but not with good news. Surfaces as a
//!   fatal batch-level failure when it happens during a commit.
//!
//! Everything else travels as `anyhow::Error` with context stacked on top.

use thiserror::Error;

/// 🙈 Why a row never made it to the upsert engine (or was skipped in it).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SkipReason {
    #[error("row {line}: no business key")]
    MissingBusinessKey { line: usize },
    #[error("row {line}: business key {key:?} cannot be a document id")]
    InvalidBusinessKey { line: usize, key: String },
    #[error("record {key:?}: lookup failed: {detail}")]
    LookupFailed { key: String, detail: String },
}

/// 📡 The source could not be turned into rows. The import stops right here.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("fetching {location} answered with status {status}")]
    FetchStatus { location: String, status: u16 },
    #[error("worksheet {sheet:?} not found (available: {available:?})")]
    MissingWorksheet {
        sheet: String,
        available: Vec<String>,
    },
    #[error("sheet {sheet:?} has no column for {field} (tried {aliases:?})")]
    MissingColumn {
        sheet: String,
        field: String,
        aliases: Vec<String>,
    },
    #[error("could not decode {location}: {detail}")]
    Decode { location: String, detail: String },
}

/// 🗄️ The document store said no.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store request to {url} failed with status {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },
    #[error("batch of {attempted} writes exceeds the ceiling of {ceiling}")]
    BatchCeiling { attempted: usize, ceiling: usize },
    #[error("store rejected the commit: {0}")]
    Rejected(String),
}
