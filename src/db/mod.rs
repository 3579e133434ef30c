pub mod connection;
pub mod file;
pub mod mongo;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{Config, StorageBackend};
use crate::db::connection::{ConnectionError, ConnectionManager, RetryPolicy};
use crate::db::file::FileStore;
use crate::db::mongo::{MongoConnector, MongoStore};
use crate::models::Kind;

/// A stored record: a flat JSON object.
pub type Document = serde_json::Map<String, serde_json::Value>;

#[derive(Debug)]
pub enum StoreError {
    Connection(ConnectionError),
    Duplicate { field: String, value: String },
    Backend(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Connection(err) => write!(f, "{err}"),
            StoreError::Duplicate { field, value } => {
                write!(f, "Duplicate value for {field}: {value}")
            }
            StoreError::Backend(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<ConnectionError> for StoreError {
    fn from(err: ConnectionError) -> Self {
        StoreError::Connection(err)
    }
}

/// Persistence for the CMS collections.
///
/// Implementations enforce uniqueness of every field in `Kind::unique_fields`
/// and return documents without storage-internal keys.
#[async_trait]
pub trait Store: Send + Sync {
    fn backend(&self) -> &'static str;

    /// All records, newest `createdAt` first.
    async fn list(&self, kind: &Kind) -> Result<Vec<Document>, StoreError>;

    /// First record whose `field` equals `value`.
    async fn find(&self, kind: &Kind, field: &str, value: &str)
    -> Result<Option<Document>, StoreError>;

    async fn insert(&self, kind: &Kind, doc: Document) -> Result<Document, StoreError>;

    /// Replace the record with the given id. `None` if there is no such record.
    async fn replace(
        &self,
        kind: &Kind,
        id: &str,
        doc: Document,
    ) -> Result<Option<Document>, StoreError>;

    /// Returns whether a record was removed.
    async fn delete(&self, kind: &Kind, id: &str) -> Result<bool, StoreError>;

    /// Remove every record of a kind. Returns the number removed.
    async fn clear(&self, kind: &Kind) -> Result<u64, StoreError>;

    async fn shutdown(&self) {}
}

/// Open the store selected by configuration.
///
/// The MongoDB store connects eagerly so misconfiguration surfaces at startup;
/// transient connectivity failures are logged and retried on the next request.
pub async fn open(config: &Config) -> Result<Arc<dyn Store>, StoreError> {
    match config.storage {
        StorageBackend::File => {
            let store = FileStore::open(&config.data_dir).await?;
            tracing::info!("Using JSON file storage in {}", config.data_dir.display());
            Ok(Arc::new(store))
        }
        StorageBackend::MongoDb => {
            let connections = ConnectionManager::new(
                MongoConnector::new(config.mongodb.database.clone()),
                config.mongodb.uri.clone(),
                RetryPolicy::with_max_retries(config.mongodb.max_retries),
            );
            match connections.ensure_connected().await {
                Ok(_) => {}
                Err(err @ ConnectionError::Configuration(_)) => return Err(err.into()),
                Err(err) => tracing::warn!("MongoDB not reachable at startup: {err}"),
            }
            Ok(Arc::new(MongoStore::new(Arc::new(connections))))
        }
    }
}

/// Newest first; ties keep the later-inserted record first.
pub(crate) fn sort_newest_first(docs: &mut [Document]) {
    docs.reverse();
    docs.sort_by(|a, b| created_at(b).cmp(created_at(a)));
}

fn created_at(doc: &Document) -> &str {
    doc.get("createdAt")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
}
