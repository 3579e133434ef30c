use std::path::Path;

use serde_json::Value;

use crate::db::{Document, Store, StoreError};
use crate::models::{self, Client, IdGenerator, Project, Resource, Service};

#[derive(Debug)]
pub enum SeedError {
    Store(StoreError),
    Invalid { kind: &'static str, reason: String },
}

impl std::fmt::Display for SeedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeedError::Store(err) => write!(f, "Storage error: {err}"),
            SeedError::Invalid { kind, reason } => write!(f, "Invalid {kind} record: {reason}"),
        }
    }
}

impl std::error::Error for SeedError {}

impl From<StoreError> for SeedError {
    fn from(err: StoreError) -> Self {
        SeedError::Store(err)
    }
}

#[derive(Debug, Default, PartialEq)]
pub struct SeedReport {
    pub projects: usize,
    pub clients: usize,
    pub services: usize,
}

/// Replace every collection with the records found in `dir`.
///
/// Reads `projects.json`, `clients.json` and `services-data.json`, each shaped
/// `{"<collection>": [ ... ]}` or a bare array. A missing or unreadable file
/// leaves its collection empty. Every record is validated before anything is
/// cleared, so a bad file leaves the store untouched and `dir` may also be the
/// file store's own directory.
pub async fn seed(store: &dyn Store, dir: &Path) -> Result<SeedReport, SeedError> {
    let ids = IdGenerator::new();
    let projects = prepare::<Project>(&dir.join("projects.json"), &ids).await?;
    let clients = prepare::<Client>(&dir.join("clients.json"), &ids).await?;
    let services = prepare::<Service>(&dir.join("services-data.json"), &ids).await?;

    for kind in [&Project::KIND, &Client::KIND, &Service::KIND] {
        let removed = store.clear(kind).await?;
        tracing::info!("Cleared {removed} {}", kind.collection);
    }

    Ok(SeedReport {
        projects: insert_all::<Project>(store, projects).await?,
        clients: insert_all::<Client>(store, clients).await?,
        services: insert_all::<Service>(store, services).await?,
    })
}

/// Read and normalize one seed file, rejecting records that would collide.
async fn prepare<R: Resource>(path: &Path, ids: &IdGenerator) -> Result<Vec<Document>, SeedError> {
    let invalid = |reason: String| SeedError::Invalid {
        kind: R::KIND.name,
        reason,
    };

    let mut records = Vec::new();
    for raw in read_records(path, R::KIND.collection).await {
        let record = models::new_record::<R>(raw, ids).map_err(invalid)?;
        for field in R::KIND.unique_fields {
            let Some(value) = record.get(*field).and_then(Value::as_str) else {
                continue;
            };
            let taken = records
                .iter()
                .any(|other: &Document| other.get(*field).and_then(Value::as_str) == Some(value));
            if taken {
                return Err(invalid(format!("duplicate {field} '{value}'")));
            }
        }
        records.push(record);
    }
    Ok(records)
}

async fn insert_all<R: Resource>(store: &dyn Store, records: Vec<Document>) -> Result<usize, SeedError> {
    let count = records.len();
    for record in records {
        store.insert(&R::KIND, record).await?;
    }

    tracing::info!("Seeded {count} {}", R::KIND.collection);
    Ok(count)
}

async fn read_records(path: &Path, key: &str) -> Vec<Document> {
    let parsed = match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice::<Value>(&bytes)
            .map_err(|e| e.to_string())
            .and_then(|value| {
                let records = match value {
                    Value::Object(mut wrapper) => wrapper
                        .remove(key)
                        .ok_or_else(|| format!("missing \"{key}\" array"))?,
                    bare => bare,
                };
                serde_json::from_value(records).map_err(|e| e.to_string())
            }),
        Err(e) => Err(e.to_string()),
    };

    parsed.unwrap_or_else(|e| {
        tracing::warn!("Skipping {}: {e}", path.display());
        Vec::new()
    })
}
