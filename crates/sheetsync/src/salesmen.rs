//! 🧑‍💼 The salesmen directory: a derived collection, rebuilt per brand.
//!
//! Nobody maintains this list by hand. It is whatever distinct salesman names
//! the brand's synced collections mention, deduplicated so `"Νίκος  Παπάς"`
//! and `"ΝΙΚΟΣ ΠΑΠΑΣ"` are one person (first spelling seen wins).
//!
//! ⚠️ Rebuild = delete the brand's slice, then insert the fresh one. The two
//! phases are separate commits. A crash between them leaves the brand with
//! an empty directory until the rebuild is run again.

use std::collections::HashSet;

use anyhow::{Context, Result};
use futures::future::try_join_all;
use serde::Serialize;
use tracing::{debug, info};

use crate::app_config::SalesmenConfig;
use crate::common::{FieldValue, Fields};
use crate::maintenance::Maintenance;
use crate::normalize::strip_diacritics;
use crate::store::{DocumentStore, Query, WriteBatch, WriteOp};

/// 📊 What a rebuild did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RebuildSummary {
    pub deleted: usize,
    pub scanned: usize,
    pub inserted: usize,
}

/// 🔑 Dedup key for a display name: accent- and case-free, whitespace collapsed.
/// `/` counts as whitespace because the key ends up inside a document id.
pub fn salesman_key(name: &str) -> String {
    // -- final sigma only exists at the end of lowercase words, uppercase input never has it
    strip_diacritics(name)
        .replace('ς', "σ")
        .split(|c: char| c.is_whitespace() || c == '/')
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug)]
pub struct SalesmenRebuilder<'a> {
    store: &'a dyn DocumentStore,
    config: &'a SalesmenConfig,
    page_size: usize,
    batch_ceiling: usize,
}

impl<'a> SalesmenRebuilder<'a> {
    pub fn new(
        store: &'a dyn DocumentStore,
        config: &'a SalesmenConfig,
        page_size: usize,
        batch_ceiling: usize,
    ) -> Self {
        Self {
            store,
            config,
            page_size: page_size.max(1),
            batch_ceiling: batch_ceiling.max(1),
        }
    }

    /// 🔄 Replaces `brand`'s slice of the directory with the names found in
    /// `source_collections` right now.
    pub async fn rebuild(&self, brand: &str, source_collections: &[String]) -> Result<RebuildSummary> {
        let deleted = Maintenance::new(self.store, self.page_size, self.batch_ceiling)
            .delete_filtered_by(
                &self.config.collection,
                "brand",
                FieldValue::Text(brand.to_string()),
            )
            .await
            .with_context(|| format!("💀 clearing the '{brand}' salesmen slice failed"))?;

        let mut seen = HashSet::new();
        let mut names: Vec<(String, String)> = Vec::new();
        let mut scanned = 0;
        for collection in source_collections {
            scanned += self.scan(collection, &mut seen, &mut names).await?;
        }

        let batches = self.assemble(brand, &names)?;
        let commits = batches.len();
        try_join_all(batches.into_iter().map(|batch| self.store.commit(batch)))
            .await
            .with_context(|| {
                format!(
                    "💀 inserting the '{brand}' salesmen failed. The slice may be partially empty until the next rebuild."
                )
            })?;

        info!(
            "🧑‍💼 '{brand}' salesmen rebuilt: {deleted} removed, {scanned} documents scanned, {} names in {commits} batches",
            names.len()
        );
        Ok(RebuildSummary {
            deleted,
            scanned,
            inserted: names.len(),
        })
    }

    /// 🔍 Cursor-pages through one collection, collecting unseen names in order.
    async fn scan(
        &self,
        collection: &str,
        seen: &mut HashSet<String>,
        names: &mut Vec<(String, String)>,
    ) -> Result<usize> {
        let mut cursor: Option<String> = None;
        let mut scanned = 0;
        loop {
            let query = Query::page(collection, self.page_size).after(cursor.clone());
            let page = self
                .store
                .query(&query)
                .await
                .with_context(|| format!("💀 scanning '{collection}' for salesmen failed"))?;
            scanned += page.len();

            for document in &page {
                for path in &self.config.field_paths {
                    let Some(name) = document
                        .lookup_path(path)
                        .and_then(FieldValue::as_text)
                        .map(str::trim)
                        .filter(|name| !name.is_empty())
                    else {
                        continue;
                    };
                    let key = salesman_key(name);
                    if !key.is_empty() && seen.insert(key.clone()) {
                        names.push((name.to_string(), key));
                    }
                }
            }

            if page.len() < self.page_size {
                break;
            }
            cursor = page.last().map(|document| document.id.clone());
        }
        debug!("🔍 '{collection}': {scanned} documents scanned");
        Ok(scanned)
    }

    /// 📦 Every batch is complete before any of them is committed.
    fn assemble(&self, brand: &str, names: &[(String, String)]) -> Result<Vec<WriteBatch>> {
        let mut batches = Vec::new();
        for chunk in names.chunks(self.batch_ceiling) {
            let mut batch = WriteBatch::new(self.batch_ceiling);
            for (name, key) in chunk {
                let mut fields = Fields::new();
                fields.insert("name".into(), FieldValue::Text(name.clone()));
                fields.insert("brand".into(), FieldValue::Text(brand.to_string()));
                fields.insert("normalizedName".into(), FieldValue::Text(key.clone()));
                batch.push(WriteOp::Create {
                    collection: self.config.collection.clone(),
                    id: format!("{brand}_{key}"),
                    fields,
                    server_timestamps: Vec::new(),
                })?;
            }
            batches.push(batch);
        }
        Ok(batches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Document;
    use crate::store::InMemoryStore;

    fn customer(salesman: Option<&str>, nested: Option<&str>) -> Fields {
        let mut fields = Fields::new();
        if let Some(name) = salesman {
            fields.insert("salesman".into(), FieldValue::Text(name.into()));
        }
        if let Some(name) = nested {
            let mut contact = Fields::new();
            contact.insert("salesman".into(), FieldValue::Text(name.into()));
            fields.insert("contact".into(), FieldValue::Map(contact));
        }
        fields
    }

    fn names(documents: &[Document]) -> Vec<String> {
        documents
            .iter()
            .filter_map(|d| d.fields.get("name").and_then(FieldValue::as_text).map(str::to_string))
            .collect()
    }

    #[test]
    fn the_one_where_nikos_is_nikos_however_you_spell_him() {
        assert_eq!(salesman_key("  Νίκος   Παπάς "), "νικοσ παπασ");
        assert_eq!(salesman_key("ΝΙΚΟΣ ΠΑΠΑΣ"), salesman_key("νίκος παπάς"));
        assert_eq!(salesman_key("A/B"), "a b");
    }

    #[tokio::test]
    async fn the_one_where_the_rebuild_leaves_no_leftovers() -> Result<()> {
        let store = InMemoryStore::new();
        let config = SalesmenConfig::default();

        // -- last rebuild's entries, plus another brand that must survive
        for (id, brand) in [("helios_ghost", "helios"), ("orion_maria", "orion")] {
            let mut fields = Fields::new();
            fields.insert("brand".into(), FieldValue::Text(brand.into()));
            store.insert("salesmen", id, fields).await;
        }

        store.insert("helios_customers", "c1", customer(Some("Νίκος Παπάς"), None)).await;
        store.insert("helios_customers", "c2", customer(Some("ΝΙΚΟΣ ΠΑΠΑΣ"), Some("Ελένη"))).await;
        store.insert("helios_customers", "c3", customer(None, None)).await;
        store.insert("helios_orders", "o1", customer(Some("  "), Some("ελένη"))).await;

        let rebuilder = SalesmenRebuilder::new(&store, &config, 2, 500);
        let summary = rebuilder
            .rebuild("helios", &["helios_customers".into(), "helios_orders".into()])
            .await?;
        assert_eq!(summary, RebuildSummary { deleted: 1, scanned: 4, inserted: 2 });

        let directory = store.documents("salesmen").await;
        let ids: Vec<&str> = directory.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["helios_ελενη", "helios_νικοσ παπασ", "orion_maria"]);
        assert!(names(&directory).contains(&"Νίκος Παπάς".to_string()), "first casing wins");
        assert!(names(&directory).contains(&"Ελένη".to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_big_directories_commit_in_parallel_batches() -> Result<()> {
        let store = InMemoryStore::new();
        let config = SalesmenConfig::default();
        for i in 0..5 {
            store
                .insert("customers", &format!("c{i}"), customer(Some(&format!("Rep {i}")), None))
                .await;
        }

        let summary = SalesmenRebuilder::new(&store, &config, 500, 2)
            .rebuild("zephyr", &["customers".into()])
            .await?;
        assert_eq!(summary.inserted, 5);
        let mut sizes = store.commit_sizes().await;
        sizes.sort_unstable();
        assert_eq!(sizes, vec![1, 2, 2]);
        Ok(())
    }
}
