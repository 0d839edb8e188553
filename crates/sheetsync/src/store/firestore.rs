//! # 🔥 THE FIRESTORE BACKEND
//!
//! Speaks Firestore's REST v1 dialect over `reqwest`:
//! - `GET  .../documents/{collection}/{id}` for point reads (404 = absent);
//! - `POST .../documents:commit` for atomic batches, with `updateMask` for
//!   partial updates and `REQUEST_TIME` transforms for server timestamps;
//! - `POST .../documents:runQuery` for ordered, filtered, cursor-paged scans.
//!
//! Point `base_url` at the emulator (`http://localhost:8080`) and skip the
//! token for local runs. Production wants a bearer token.
//!
//! 🔄 Nothing in here retries. A failed commit is a failed import, and the
//! operator re-runs it. The diff makes that cheap.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, trace};

use crate::common::Document;
use crate::errors::StoreError;
use crate::store::{DocumentStore, Query, WriteBatch, WriteOp};

mod codec;

use codec::{decode_fields, encode_fields, encode_value, quote_field_path};

/// 🔥 Where the Firestore lives and how to get in.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct FirestoreConfig {
    pub project_id: String,
    #[serde(default = "default_database")]
    pub database: String,
    /// 📡 API root. Override for the emulator.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// 🔒 OAuth bearer token. Optional, like the emulator's sense of security.
    #[serde(default)]
    pub access_token: Option<String>,
}

fn default_database() -> String {
    "(default)".to_string()
}

fn default_base_url() -> String {
    "https://firestore.googleapis.com".to_string()
}

/// 🔥 Firestore over HTTP. Holds one pooled client for the whole run.
#[derive(Debug)]
pub struct FirestoreStore {
    client: reqwest::Client,
    config: FirestoreConfig,
}

impl FirestoreStore {
    pub fn new(config: FirestoreConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()
            .context("💀 The HTTP client refused to be born. Probably TLS. It is always TLS.")?;
        Ok(Self { client, config })
    }

    /// 🏷️ `projects/{p}/databases/{d}/documents`, the parent of everything.
    fn documents_root(&self) -> String {
        format!(
            "projects/{}/databases/{}/documents",
            self.config.project_id, self.config.database
        )
    }

    fn document_name(&self, collection: &str, id: &str) -> String {
        format!("{}/{}/{}", self.documents_root(), collection, id)
    }

    /// 📡 Builds `{base}/v1/projects/.../{segments...}` with every segment
    /// percent-encoded, so product codes with spaces or Greek letters survive.
    fn endpoint(&self, tail: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.config.base_url)
            .with_context(|| format!("💀 '{}' is not a URL", self.config.base_url))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| anyhow::anyhow!("💀 '{}' cannot be a base URL", self.config.base_url))?;
            segments.pop_if_empty();
            segments.extend([
                "v1",
                "projects",
                &self.config.project_id,
                "databases",
                &self.config.database,
            ]);
            segments.extend(tail);
        }
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn post_json(&self, url: Url, body: Value) -> Result<Value> {
        let payload = serde_json::to_string(&body)?;
        trace!("📡 POST {} ({} bytes)", url, payload.len());
        let response = self
            .authorized(self.client.post(url.clone()))
            .header("Content-Type", "application/json")
            .body(payload)
            .send()
            .await
            .with_context(|| format!("💀 Firestore at {url} never answered"))?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(StoreError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body: text,
            }
            .into());
        }
        serde_json::from_str(&text)
            .with_context(|| format!("💀 Firestore at {url} answered with something that is not JSON"))
    }

    fn encode_write(&self, op: &WriteOp) -> Value {
        match op {
            WriteOp::Create {
                collection,
                id,
                fields,
                server_timestamps,
            } => {
                let mut write = json!({
                    "update": {
                        "name": self.document_name(collection, id),
                        "fields": encode_fields(fields),
                    }
                });
                attach_timestamps(&mut write, server_timestamps);
                write
            }
            WriteOp::Update {
                collection,
                id,
                fields,
                server_timestamps,
            } => {
                let mask: Vec<String> = fields.keys().map(|f| quote_field_path(f)).collect();
                let mut write = json!({
                    "update": {
                        "name": self.document_name(collection, id),
                        "fields": encode_fields(fields),
                    },
                    "updateMask": { "fieldPaths": mask },
                    "currentDocument": { "exists": true },
                });
                attach_timestamps(&mut write, server_timestamps);
                write
            }
            WriteOp::Delete { collection, id } => {
                json!({ "delete": self.document_name(collection, id) })
            }
        }
    }

    fn encode_query(&self, query: &Query) -> Value {
        let mut structured = json!({
            "from": [{ "collectionId": query.collection }],
            "orderBy": [{ "field": { "fieldPath": "__name__" }, "direction": "ASCENDING" }],
            "limit": query.limit,
        });
        if let Some((field, value)) = &query.filter {
            structured["where"] = json!({
                "fieldFilter": {
                    "field": { "fieldPath": field },
                    "op": "EQUAL",
                    "value": encode_value(value),
                }
            });
        }
        if let Some(cursor) = &query.start_after {
            structured["startAt"] = json!({
                "values": [{ "referenceValue": self.document_name(&query.collection, cursor) }],
                "before": false,
            });
        }
        json!({ "structuredQuery": structured })
    }
}

fn attach_timestamps(write: &mut Value, fields: &[String]) {
    if fields.is_empty() {
        return;
    }
    let transforms: Vec<Value> = fields
        .iter()
        .map(|field| {
            json!({ "fieldPath": quote_field_path(field), "setToServerValue": "REQUEST_TIME" })
        })
        .collect();
    write["updateTransforms"] = Value::Array(transforms);
}

/// 🆔 Last path segment of a resource name is the document id.
fn id_from_name(name: &str) -> String {
    name.rsplit('/').next().unwrap_or(name).to_string()
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let url = self.endpoint(&["documents", collection, id])?;
        let response = self
            .authorized(self.client.get(url.clone()))
            .send()
            .await
            .with_context(|| format!("💀 Firestore at {url} never answered"))?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(StoreError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body: text,
            }
            .into());
        }
        let body: Value = serde_json::from_str(&text)
            .with_context(|| format!("💀 document {collection}/{id} is not JSON"))?;
        Ok(Some(Document {
            id: id.to_string(),
            fields: decode_fields(body.get("fields")),
        }))
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        let writes: Vec<Value> = batch.ops().iter().map(|op| self.encode_write(op)).collect();
        let url = self.endpoint(&["documents:commit"])?;
        self.post_json(url, json!({ "writes": writes }))
            .await
            .with_context(|| format!("💀 commit of {} writes was not applied", batch.len()))?;
        debug!("🔥 committed {} writes to Firestore", batch.len());
        Ok(())
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>> {
        let url = self.endpoint(&["documents:runQuery"])?;
        let response = self.post_json(url, self.encode_query(query)).await?;
        let documents = response
            .as_array()
            .map(|results| {
                results
                    .iter()
                    .filter_map(|result| result.get("document"))
                    .filter_map(|doc| {
                        let name = doc.get("name")?.as_str()?;
                        Some(Document {
                            id: id_from_name(name),
                            fields: decode_fields(doc.get("fields")),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(documents)
    }
}
