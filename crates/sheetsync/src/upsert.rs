//! 🔁 The upsert engine: diff-based, batch-limited, idempotent.
//!
//! 🎬 COLD OPEN: 1,200 product rows arrive. 1,150 of them are identical to
//! what the store already holds. A naive importer rewrites all 1,200 and
//! bumps every `lastUpdated`. This one reads each document first, writes
//! only what changed, and leaves the other 1,150 alone.
//!
//! # How a chunk goes 📜
//! 1. at most `batch_ceiling` records per chunk;
//! 2. per record: mapping skips are counted, the stored document is fetched
//!    (a failed fetch is a skip, not a crash), then:
//!    - absent → full `Create` + `importedAt` and `lastUpdated` stamps;
//!    - present → field-by-field diff. Changes → `Update` of just those
//!      fields + `lastUpdated`. No changes → skipped, nothing written;
//! 3. the chunk's writes are committed atomically before the next chunk starts.
//!    A commit failure propagates and ends the import right there;
//! 4. a [`ProgressEvent`] goes out after every chunk.
//!
//! ⚠️ A failed commit leaves earlier chunks written. Re-running is the fix:
//! the diff turns those chunks into no-ops.

use std::collections::HashMap;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::common::{Fields, Record};
use crate::errors::SkipReason;
use crate::progress::{ProgressEvent, ProgressObserver};
use crate::store::{DocumentStore, WriteBatch, WriteOp};

/// ⏱️ Server-stamped on creation only.
pub const IMPORTED_AT: &str = "importedAt";
/// ⏱️ Server-stamped on every write.
pub const LAST_UPDATED: &str = "lastUpdated";

/// 📊 How an import went, counted per input record: `processed + skipped`
/// always equals the number of records handed in.
///
/// `processed` counts records whose changes were staged for writing. Repeats
/// of one key inside a chunk fold into a single write, so `processed` can
/// exceed the number of writes committed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub processed: usize,
    pub skipped: usize,
}

impl std::ops::AddAssign for SyncSummary {
    fn add_assign(&mut self, other: Self) {
        self.processed += other.processed;
        self.skipped += other.skipped;
    }
}

/// 🔍 Fields of `incoming` whose value differs from (or is missing in) `stored`.
///
/// Fields only the store has (timestamps, fields written by other tools) are
/// never part of a diff, so they are never touched.
pub fn diff_fields(incoming: &Fields, stored: &Fields) -> Fields {
    incoming
        .iter()
        .filter(|(name, value)| stored.get(*name) != Some(*value))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

/// 🔁 Pushes records into one collection of a [`DocumentStore`].
#[derive(Debug)]
pub struct UpsertEngine<'a> {
    store: &'a dyn DocumentStore,
    batch_ceiling: usize,
    progress: &'a dyn ProgressObserver,
}

/// ✍️ A write being assembled for the current chunk, plus the document as it
/// will look once the write lands (for duplicates later in the same chunk).
struct Staged {
    op: WriteOp,
    after: Fields,
}

impl<'a> UpsertEngine<'a> {
    pub fn new(
        store: &'a dyn DocumentStore,
        batch_ceiling: usize,
        progress: &'a dyn ProgressObserver,
    ) -> Self {
        Self {
            store,
            batch_ceiling: batch_ceiling.max(1),
            progress,
        }
    }

    /// 🚀 Syncs `records` into `collection`. `label` names the import in
    /// progress events and logs.
    pub async fn sync_records(
        &self,
        records: Vec<Result<Record, SkipReason>>,
        collection: &str,
        label: &str,
    ) -> Result<SyncSummary> {
        let total = records.len();
        let mut summary = SyncSummary::default();
        let mut current = 0;
        info!("🔁 syncing {total} records into '{collection}' ({label})");

        for (chunk_index, chunk) in records.chunks(self.batch_ceiling).enumerate() {
            let batch = self.stage_chunk(chunk, collection, &mut summary).await?;
            if batch.is_empty() {
                debug!("💤 chunk {chunk_index} of '{label}' has nothing to write");
            } else {
                let writes = batch.len();
                self.store.commit(batch).await.with_context(|| {
                    format!(
                        "💀 commit of chunk {chunk_index} ({writes} writes) into '{collection}' failed. \
                         Earlier chunks are already written; re-run the import to finish."
                    )
                })?;
                debug!("✍️ chunk {chunk_index} of '{label}' committed {writes} writes");
            }

            current += chunk.len();
            self.progress.on_progress(&ProgressEvent {
                current,
                total,
                label: label.to_string(),
                processed: summary.processed,
                skipped: summary.skipped,
            });
        }

        self.progress.on_finish(label);
        info!(
            "✅ '{label}' done: {} written, {} skipped",
            summary.processed, summary.skipped
        );
        Ok(summary)
    }

    async fn stage_chunk(
        &self,
        chunk: &[Result<Record, SkipReason>],
        collection: &str,
        summary: &mut SyncSummary,
    ) -> Result<WriteBatch> {
        let mut staged: Vec<Staged> = Vec::new();
        let mut by_key: HashMap<&str, usize> = HashMap::new();

        for item in chunk {
            let record = match item {
                Ok(record) => record,
                Err(reason) => {
                    warn!("🙈 skipped: {reason}");
                    summary.skipped += 1;
                    continue;
                }
            };

            if let Some(&index) = by_key.get(record.key.as_str()) {
                // -- same key twice in one chunk: diff against what we are about to write
                let entry = &mut staged[index];
                let changes = diff_fields(&record.fields, &entry.after);
                if changes.is_empty() {
                    summary.skipped += 1;
                } else {
                    entry.after.extend(changes.clone());
                    if let WriteOp::Create { fields, .. } | WriteOp::Update { fields, .. } =
                        &mut entry.op
                    {
                        fields.extend(changes);
                    }
                    summary.processed += 1;
                }
                continue;
            }

            let stored = match self.store.get(collection, &record.key).await {
                Ok(stored) => stored,
                Err(err) => {
                    let reason = SkipReason::LookupFailed {
                        key: record.key.clone(),
                        detail: format!("{err:#}"),
                    };
                    warn!("🙈 skipped: {reason}");
                    summary.skipped += 1;
                    continue;
                }
            };

            let next = match stored {
                None => Some(Staged {
                    op: WriteOp::Create {
                        collection: collection.to_string(),
                        id: record.key.clone(),
                        fields: record.fields.clone(),
                        server_timestamps: vec![IMPORTED_AT.to_string(), LAST_UPDATED.to_string()],
                    },
                    after: record.fields.clone(),
                }),
                Some(document) => {
                    let changes = diff_fields(&record.fields, &document.fields);
                    if changes.is_empty() {
                        None
                    } else {
                        let mut after = document.fields;
                        after.extend(changes.clone());
                        Some(Staged {
                            op: WriteOp::Update {
                                collection: collection.to_string(),
                                id: record.key.clone(),
                                fields: changes,
                                server_timestamps: vec![LAST_UPDATED.to_string()],
                            },
                            after,
                        })
                    }
                }
            };

            match next {
                Some(entry) => {
                    by_key.insert(record.key.as_str(), staged.len());
                    staged.push(entry);
                    summary.processed += 1;
                }
                None => summary.skipped += 1,
            }
        }

        let mut batch = WriteBatch::new(self.batch_ceiling);
        for entry in staged {
            batch.push(entry.op)?;
        }
        Ok(batch)
    }
}
