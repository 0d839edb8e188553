//! 🗄️ The destination document store: where normalized records go to live.
//!
//! 🎭 Same casting agency as always: a [`DocumentStore`] trait, concrete
//! backends, and a [`StoreBackend`] enum that dispatches so callers never care
//! whether documents land in RAM or in Firestore.
//!
//! # Contract 📜
//! - `get`: one document by id, `None` when absent.
//! - `commit`: a [`WriteBatch`] is applied atomically. All of it or none of it.
//! - `query`: one page of documents ordered by id, optionally filtered by an
//!   equality predicate, optionally starting after a cursor id.
//! - server timestamps are requested per write, never fabricated client-side.
//!
//! ⚠️ Nothing here spans more than one batch. There are no cross-batch
//! transactions, because the store does not offer them and we do not pretend.

use anyhow::Result;
use async_trait::async_trait;

use crate::app_config::StoreConfig;
use crate::common::{Document, FieldValue, Fields};
use crate::errors::StoreError;

pub mod firestore;
pub mod in_mem;

pub use firestore::{FirestoreConfig, FirestoreStore};
pub use in_mem::InMemoryStore;

/// ✍️ One pending write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Full document write. Replaces whatever was there.
    Create {
        collection: String,
        id: String,
        fields: Fields,
        server_timestamps: Vec<String>,
    },
    /// Partial write: only `fields` are touched. The document must exist.
    Update {
        collection: String,
        id: String,
        fields: Fields,
        server_timestamps: Vec<String>,
    },
    Delete {
        collection: String,
        id: String,
    },
}

impl WriteOp {
    pub fn collection(&self) -> &str {
        match self {
            WriteOp::Create { collection, .. }
            | WriteOp::Update { collection, .. }
            | WriteOp::Delete { collection, .. } => collection,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            WriteOp::Create { id, .. } | WriteOp::Update { id, .. } | WriteOp::Delete { id, .. } => {
                id
            }
        }
    }
}

/// 📦 A bounded list of writes, committed as one atomic unit.
///
/// The ceiling is the store's own limit (Firestore: 500). `push` refuses to
/// go past it, so an oversized batch cannot even be assembled.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
    ceiling: usize,
}

impl WriteBatch {
    pub fn new(ceiling: usize) -> Self {
        Self {
            ops: Vec::with_capacity(ceiling.min(512)),
            ceiling,
        }
    }

    pub fn push(&mut self, op: WriteOp) -> Result<(), StoreError> {
        if self.ops.len() >= self.ceiling {
            return Err(StoreError::BatchCeiling {
                attempted: self.ops.len() + 1,
                ceiling: self.ceiling,
            });
        }
        self.ops.push(op);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.ops.len() >= self.ceiling
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }
}

/// 🔍 One page worth of question for the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    /// Equality predicate on a (possibly dotted) field path.
    pub filter: Option<(String, FieldValue)>,
    /// Exclusive cursor: only documents with an id after this one.
    pub start_after: Option<String>,
    pub limit: usize,
}

impl Query {
    pub fn page(collection: impl Into<String>, limit: usize) -> Self {
        Self {
            collection: collection.into(),
            filter: None,
            start_after: None,
            limit,
        }
    }

    pub fn filtered(mut self, field: impl Into<String>, value: FieldValue) -> Self {
        self.filter = Some((field.into(), value));
        self
    }

    pub fn after(mut self, id: Option<String>) -> Self {
        self.start_after = id;
        self
    }
}

/// 🗄️ The destination store. `Send + Sync` because salesmen commits are
/// pipelined, and the futures borrow the store concurrently.
#[async_trait]
pub trait DocumentStore: std::fmt::Debug + Send + Sync {
    /// 📄 Fetch one document by id. Absent is `Ok(None)`, not an error.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>>;
    /// ✍️ Apply the whole batch atomically, or fail without applying any of it.
    async fn commit(&self, batch: WriteBatch) -> Result<()>;
    /// 🔍 One page of documents ordered by id.
    async fn query(&self, query: &Query) -> Result<Vec<Document>>;
}

/// 🎭 The many faces of a document store.
#[derive(Debug)]
pub enum StoreBackend {
    InMemory(InMemoryStore),
    Firestore(FirestoreStore),
}

impl StoreBackend {
    /// 🏗️ Builds the backend named in config.
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        Ok(match config {
            StoreConfig::InMemory => StoreBackend::InMemory(InMemoryStore::new()),
            StoreConfig::Firestore(firestore) => {
                StoreBackend::Firestore(FirestoreStore::new(firestore.clone())?)
            }
        })
    }
}

#[async_trait]
impl DocumentStore for StoreBackend {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        match self {
            StoreBackend::InMemory(store) => store.get(collection, id).await,
            StoreBackend::Firestore(store) => store.get(collection, id).await,
        }
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        match self {
            StoreBackend::InMemory(store) => store.commit(batch).await,
            StoreBackend::Firestore(store) => store.commit(batch).await,
        }
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>> {
        match self {
            StoreBackend::InMemory(store) => store.query(query).await,
            StoreBackend::Firestore(store) => store.query(query).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delete(id: &str) -> WriteOp {
        WriteOp::Delete {
            collection: "products".into(),
            id: id.into(),
        }
    }

    #[test]
    fn the_one_where_the_batch_refuses_one_write_too_many() {
        let mut batch = WriteBatch::new(2);
        batch.push(delete("a")).expect("💀 first write fits");
        batch.push(delete("b")).expect("💀 second write fits");
        assert!(batch.is_full());

        let err = batch.push(delete("c")).expect_err("💀 the ceiling should hold");
        assert!(matches!(
            err,
            StoreError::BatchCeiling {
                attempted: 3,
                ceiling: 2
            }
        ));
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn the_one_where_queries_build_up_fluently() {
        let query = Query::page("salesmen", 50)
            .filtered("brand", FieldValue::Text("helios".into()))
            .after(Some("helios_nikos".into()));
        assert_eq!(query.limit, 50);
        assert_eq!(query.start_after.as_deref(), Some("helios_nikos"));
        assert_eq!(
            query.filter,
            Some(("brand".to_string(), FieldValue::Text("helios".into())))
        );
    }
}
