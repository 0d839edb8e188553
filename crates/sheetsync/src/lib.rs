//! 📊 sheetsync: brand spreadsheets in, document-store collections out.
//!
//! 🎬 Several brand back-offices publish their catalogues and customer lists
//! as spreadsheets. Each speaks its own dialect: Greek headers, English
//! headers, Greek headers that went through the wrong code page in 2014.
//! This crate reads them all, normalizes what it finds, and upserts the result
//! into brand-scoped collections, writing only what actually changed.
//!
//! 🧠 Knowledge graph:
//! - [`sources`] fetch and decode sheets (CSV via `csv`, workbooks via `calamine`)
//! - [`headers`] find columns through alias lists, accent- and script-insensitively
//! - [`normalize`] turn cells into prices, booleans, URLs and text
//! - [`mappers`] turn rows into [`common::Record`]s, one alias table per brand × entity
//! - [`upsert`] diff against the store and commit in bounded atomic batches
//! - [`salesmen`] rebuild the derived salesmen directory
//! - [`maintenance`] bulk deletes
//! - [`store`] the [`store::DocumentStore`] trait, Firestore and in-memory backends
//! - [`pipeline`] ties one configured operation together

pub mod app_config;
pub mod common;
pub mod errors;
pub mod headers;
pub mod maintenance;
pub mod mappers;
pub mod normalize;
pub mod pipeline;
pub mod progress;
pub mod salesmen;
pub mod sources;
pub mod store;
pub mod upsert;

pub use app_config::{AppConfig, load_config};
pub use mappers::EntityKind;
pub use pipeline::{ImportReport, Pipeline};
pub use salesmen::RebuildSummary;
pub use upsert::SyncSummary;
