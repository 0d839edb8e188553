//! 🧠 An in-memory document store for tests, dry runs, and trust issues.
//!
//! Collections live in a `BTreeMap` (so ids come back sorted, like the real
//! thing), behind an `Arc<Mutex<...>>` so clones share the same data and tests
//! can peek after handing a clone to the pipeline.
//!
//! ⚠️ This is NOT for production. It forgets everything when the process ends.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::common::{Document, FieldValue, Fields};
use crate::errors::StoreError;
use crate::store::{DocumentStore, Query, WriteBatch, WriteOp};

type Collections = BTreeMap<String, BTreeMap<String, Fields>>;

#[derive(Debug, Default)]
struct State {
    collections: Collections,
    /// 📊 size of every successful commit, in order
    commit_sizes: Vec<usize>,
    /// 💥 commits numbered >= this fail (0-based), for testing fatal paths
    fail_from_commit: Option<usize>,
    attempted_commits: usize,
}

/// 📦 A store that never forgets (until it's dropped).
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 🌱 Seeds a document directly, bypassing batches.
    pub async fn insert(&self, collection: &str, id: &str, fields: Fields) {
        self.state
            .lock()
            .await
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), fields);
    }

    /// 📋 Every document of a collection, sorted by id.
    pub async fn documents(&self, collection: &str) -> Vec<Document> {
        let state = self.state.lock().await;
        state
            .collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, fields)| Document {
                        id: id.clone(),
                        fields: fields.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// 📊 Sizes of the successful commits so far.
    pub async fn commit_sizes(&self) -> Vec<usize> {
        self.state.lock().await.commit_sizes.clone()
    }

    /// 💥 Makes the `nth` commit (0-based, counting attempts) and all later ones fail.
    pub async fn fail_from_commit(&self, nth: usize) {
        self.state.lock().await.fail_from_commit = Some(nth);
    }
}

/// ⏱️ Request time as the store would assign it: unix millis, as text.
fn request_time() -> FieldValue {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();
    FieldValue::Timestamp(millis.to_string())
}

fn apply(collections: &mut Collections, op: &WriteOp) {
    match op {
        WriteOp::Create {
            collection,
            id,
            fields,
            server_timestamps,
        } => {
            let mut stored = fields.clone();
            for field in server_timestamps {
                stored.insert(field.clone(), request_time());
            }
            collections
                .entry(collection.clone())
                .or_default()
                .insert(id.clone(), stored);
        }
        WriteOp::Update {
            collection,
            id,
            fields,
            server_timestamps,
        } => {
            if let Some(stored) = collections
                .get_mut(collection)
                .and_then(|docs| docs.get_mut(id))
            {
                stored.extend(fields.clone());
                for field in server_timestamps {
                    stored.insert(field.clone(), request_time());
                }
            }
        }
        WriteOp::Delete { collection, id } => {
            if let Some(docs) = collections.get_mut(collection) {
                docs.remove(id);
            }
        }
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let state = self.state.lock().await;
        Ok(state
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|fields| Document {
                id: id.to_string(),
                fields: fields.clone(),
            }))
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        let mut state = self.state.lock().await;
        let attempt = state.attempted_commits;
        state.attempted_commits += 1;
        if state.fail_from_commit.is_some_and(|nth| attempt >= nth) {
            return Err(StoreError::Rejected(format!("commit #{attempt} refused on purpose")).into());
        }

        // 🔒 validate everything before touching anything: all or nothing
        for op in batch.ops() {
            if let WriteOp::Update { collection, id, .. } = op {
                let exists = state
                    .collections
                    .get(collection)
                    .is_some_and(|docs| docs.contains_key(id));
                if !exists {
                    return Err(StoreError::Rejected(format!(
                        "update of missing document {collection}/{id}"
                    ))
                    .into());
                }
            }
        }

        for op in batch.ops() {
            apply(&mut state.collections, op);
        }
        state.commit_sizes.push(batch.len());
        debug!("🧠 in-memory commit of {} writes applied", batch.len());
        Ok(())
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>> {
        let state = self.state.lock().await;
        let Some(docs) = state.collections.get(&query.collection) else {
            return Ok(Vec::new());
        };
        let page = docs
            .iter()
            .filter(|(id, _)| {
                query
                    .start_after
                    .as_ref()
                    .is_none_or(|cursor| id.as_str() > cursor.as_str())
            })
            .map(|(id, fields)| Document {
                id: id.clone(),
                fields: fields.clone(),
            })
            .filter(|doc| match &query.filter {
                Some((field, expected)) => doc.lookup_path(field) == Some(expected),
                None => true,
            })
            .take(query.limit)
            .collect();
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> Fields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), FieldValue::Text(v.to_string())))
            .collect()
    }

    #[tokio::test]
    async fn the_one_where_a_bad_update_sinks_the_whole_batch() -> Result<()> {
        let store = InMemoryStore::new();
        let mut batch = WriteBatch::new(10);
        batch.push(WriteOp::Create {
            collection: "products".into(),
            id: "A1".into(),
            fields: fields(&[("name", "Ship")]),
            server_timestamps: vec!["importedAt".into()],
        })?;
        batch.push(WriteOp::Update {
            collection: "products".into(),
            id: "ghost".into(),
            fields: fields(&[("name", "Boo")]),
            server_timestamps: vec![],
        })?;

        assert!(store.commit(batch).await.is_err());
        assert!(store.documents("products").await.is_empty(), "nothing applied");
        assert!(store.commit_sizes().await.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_updates_merge_and_stamp() -> Result<()> {
        let store = InMemoryStore::new();
        store
            .insert("products", "A1", fields(&[("name", "Ship"), ("color", "red")]))
            .await;
        let mut batch = WriteBatch::new(10);
        batch.push(WriteOp::Update {
            collection: "products".into(),
            id: "A1".into(),
            fields: fields(&[("color", "blue")]),
            server_timestamps: vec!["lastUpdated".into()],
        })?;
        store.commit(batch).await?;

        let doc = store.get("products", "A1").await?.expect("💀 A1 should exist");
        assert_eq!(doc.fields["name"], FieldValue::Text("Ship".into()));
        assert_eq!(doc.fields["color"], FieldValue::Text("blue".into()));
        assert!(matches!(doc.fields["lastUpdated"], FieldValue::Timestamp(_)));
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_pages_follow_the_cursor_and_the_filter() -> Result<()> {
        let store = InMemoryStore::new();
        for (id, brand) in [("a", "x"), ("b", "y"), ("c", "x"), ("d", "x")] {
            store.insert("salesmen", id, fields(&[("brand", brand)])).await;
        }

        let query = Query::page("salesmen", 2).filtered("brand", FieldValue::Text("x".into()));
        let first: Vec<String> = store.query(&query).await?.into_iter().map(|d| d.id).collect();
        assert_eq!(first, vec!["a", "c"]);

        let second: Vec<String> = store
            .query(&query.clone().after(Some("c".into())))
            .await?
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(second, vec!["d"]);
        Ok(())
    }
}
