//! 🧹 Bulk deletes: wipe a collection, or just the documents matching a field.
//!
//! Both loops are the same: ask for a bounded page, delete it in one batch,
//! ask again, stop on the first empty page. Interrupting one is harmless;
//! the re-run simply finds fewer documents.

use anyhow::{Context, Result};
use tracing::info;

use crate::common::FieldValue;
use crate::store::{DocumentStore, Query, WriteBatch, WriteOp};

#[derive(Debug)]
pub struct Maintenance<'a> {
    store: &'a dyn DocumentStore,
    page_size: usize,
}

impl<'a> Maintenance<'a> {
    /// Pages never exceed `batch_ceiling`, so one page is always one batch.
    pub fn new(store: &'a dyn DocumentStore, page_size: usize, batch_ceiling: usize) -> Self {
        Self {
            store,
            page_size: page_size.min(batch_ceiling).max(1),
        }
    }

    /// 🗑️ Deletes every document in `collection`. Returns how many went.
    pub async fn delete_all_in_collection(&self, collection: &str) -> Result<usize> {
        self.delete_pages(Query::page(collection, self.page_size)).await
    }

    /// 🎯 Deletes the documents of `collection` whose `field` equals `value`.
    pub async fn delete_filtered_by(
        &self,
        collection: &str,
        field: &str,
        value: FieldValue,
    ) -> Result<usize> {
        self.delete_pages(Query::page(collection, self.page_size).filtered(field, value))
            .await
    }

    async fn delete_pages(&self, query: Query) -> Result<usize> {
        let mut total = 0;
        loop {
            let page = self
                .store
                .query(&query)
                .await
                .with_context(|| format!("💀 could not list '{}' for deletion", query.collection))?;
            if page.is_empty() {
                break;
            }

            let mut batch = WriteBatch::new(page.len());
            for document in &page {
                batch.push(WriteOp::Delete {
                    collection: query.collection.clone(),
                    id: document.id.clone(),
                })?;
            }
            self.store.commit(batch).await.with_context(|| {
                format!(
                    "💀 deleting a page of {} from '{}' failed after {total} deletions",
                    page.len(),
                    query.collection
                )
            })?;
            total += page.len();
            info!("🗑️ '{}': {total} documents deleted so far", query.collection);
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Fields;
    use crate::store::InMemoryStore;

    async fn seeded() -> InMemoryStore {
        let store = InMemoryStore::new();
        for i in 0..7 {
            let owner = if i % 2 == 0 { "maria" } else { "nikos" };
            let mut fields = Fields::new();
            fields.insert("owner".into(), FieldValue::Text(owner.into()));
            store.insert("orders", &format!("o{i}"), fields).await;
        }
        store
    }

    #[tokio::test]
    async fn the_one_where_the_collection_is_emptied_page_by_page() -> Result<()> {
        let store = seeded().await;
        let deleted = Maintenance::new(&store, 3, 500)
            .delete_all_in_collection("orders")
            .await?;
        assert_eq!(deleted, 7);
        assert!(store.documents("orders").await.is_empty());
        assert_eq!(store.commit_sizes().await, vec![3, 3, 1]);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_only_nikos_orders_are_deleted() -> Result<()> {
        let store = seeded().await;
        let maintenance = Maintenance::new(&store, 500, 2);
        let deleted = maintenance
            .delete_filtered_by("orders", "owner", FieldValue::Text("nikos".into()))
            .await?;
        assert_eq!(deleted, 3);
        assert_eq!(store.documents("orders").await.len(), 4);

        let again = maintenance
            .delete_filtered_by("orders", "owner", FieldValue::Text("nikos".into()))
            .await?;
        assert_eq!(again, 0, "re-running finds nothing left to do");
        Ok(())
    }
}
