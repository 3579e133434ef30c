use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;
use tokio::sync::RwLock;

use crate::db::{sort_newest_first, Document, Store, StoreError};
use crate::models::Kind;

/// One JSON file per collection, shaped `{"<collection>": [ ... ]}`.
///
/// Collections are loaded on first use and kept in memory. Every write
/// rewrites the whole file through a temp file + rename while holding the
/// collection lock, so the file always mirrors memory.
pub struct FileStore {
    dir: PathBuf,
    collections: RwLock<HashMap<&'static str, Vec<Document>>>,
}

impl FileStore {
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::Backend(format!("Cannot create {}: {e}", dir.display())))?;
        Ok(Self {
            dir,
            collections: RwLock::new(HashMap::new()),
        })
    }

    fn path(&self, kind: &Kind) -> PathBuf {
        self.dir.join(format!("{}.json", kind.collection))
    }

    async fn load(&self, kind: &Kind) -> Result<Vec<Document>, StoreError> {
        let path = self.path(kind);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StoreError::Backend(format!(
                    "Cannot read {}: {e}",
                    path.display()
                )));
            }
        };
        parse_collection(kind, &bytes)
            .map_err(|e| StoreError::Backend(format!("Cannot parse {}: {e}", path.display())))
    }

    async fn persist(&self, kind: &Kind, docs: &[Document]) -> Result<(), StoreError> {
        let path = self.path(kind);
        let tmp = path.with_extension("json.tmp");
        let mut wrapper = Document::new();
        wrapper.insert(
            kind.collection.to_string(),
            Value::Array(docs.iter().cloned().map(Value::Object).collect()),
        );
        let body =
            serde_json::to_vec_pretty(&wrapper).map_err(|e| StoreError::Backend(e.to_string()))?;

        fs::write(&tmp, body)
            .await
            .map_err(|e| StoreError::Backend(format!("Cannot write {}: {e}", tmp.display())))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| StoreError::Backend(format!("Cannot replace {}: {e}", path.display())))
    }

    async fn read<T>(
        &self,
        kind: &Kind,
        f: impl FnOnce(&[Document]) -> T + Send,
    ) -> Result<T, StoreError> {
        {
            let collections = self.collections.read().await;
            if let Some(docs) = collections.get(kind.collection) {
                return Ok(f(docs));
            }
        }

        let mut collections = self.collections.write().await;
        let docs = match collections.entry(kind.collection) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(self.load(kind).await?),
        };
        Ok(f(docs))
    }

    /// Apply `f` to a copy of the collection; persist and swap it in when `f`
    /// reports a change.
    async fn write<T>(
        &self,
        kind: &Kind,
        f: impl FnOnce(&mut Vec<Document>) -> Result<(T, bool), StoreError> + Send,
    ) -> Result<T, StoreError> {
        let mut collections = self.collections.write().await;
        let docs = match collections.entry(kind.collection) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(self.load(kind).await?),
        };

        let mut next = docs.clone();
        let (out, changed) = f(&mut next)?;
        if changed {
            self.persist(kind, &next).await?;
            *docs = next;
        }
        Ok(out)
    }
}

fn parse_collection(kind: &Kind, bytes: &[u8]) -> Result<Vec<Document>, serde_json::Error> {
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(Vec::new());
    }
    let value: Value = serde_json::from_slice(bytes)?;
    let items = match value {
        Value::Object(mut wrapper) => wrapper.remove(kind.collection).unwrap_or(Value::Null),
        other => other,
    };
    match items {
        Value::Null => Ok(Vec::new()),
        items => serde_json::from_value(items),
    }
}

fn position(docs: &[Document], id: &str) -> Option<usize> {
    docs.iter()
        .position(|d| d.get("id").and_then(Value::as_str) == Some(id))
}

/// Reject `doc` if one of the unique fields collides with another record.
/// The record at `skip` (the one being replaced) is ignored.
fn check_unique(
    kind: &Kind,
    docs: &[Document],
    doc: &Document,
    skip: Option<usize>,
) -> Result<(), StoreError> {
    for field in kind.unique_fields {
        let Some(value) = doc.get(*field).and_then(Value::as_str) else {
            continue;
        };
        let taken = docs.iter().enumerate().any(|(i, other)| {
            Some(i) != skip && other.get(*field).and_then(Value::as_str) == Some(value)
        });
        if taken {
            return Err(StoreError::Duplicate {
                field: field.to_string(),
                value: value.to_string(),
            });
        }
    }
    Ok(())
}

#[async_trait]
impl Store for FileStore {
    fn backend(&self) -> &'static str {
        "file"
    }

    async fn list(&self, kind: &Kind) -> Result<Vec<Document>, StoreError> {
        let mut docs = self.read(kind, |docs| docs.to_vec()).await?;
        sort_newest_first(&mut docs);
        Ok(docs)
    }

    async fn find(
        &self,
        kind: &Kind,
        field: &str,
        value: &str,
    ) -> Result<Option<Document>, StoreError> {
        self.read(kind, |docs| {
            docs.iter()
                .find(|d| d.get(field).and_then(Value::as_str) == Some(value))
                .cloned()
        })
        .await
    }

    async fn insert(&self, kind: &Kind, doc: Document) -> Result<Document, StoreError> {
        self.write(kind, |docs| {
            check_unique(kind, docs, &doc, None)?;
            docs.push(doc.clone());
            Ok((doc, true))
        })
        .await
    }

    async fn replace(
        &self,
        kind: &Kind,
        id: &str,
        doc: Document,
    ) -> Result<Option<Document>, StoreError> {
        self.write(kind, |docs| {
            let Some(index) = position(docs, id) else {
                return Ok((None, false));
            };
            check_unique(kind, docs, &doc, Some(index))?;
            docs[index] = doc.clone();
            Ok((Some(doc), true))
        })
        .await
    }

    async fn delete(&self, kind: &Kind, id: &str) -> Result<bool, StoreError> {
        self.write(kind, |docs| match position(docs, id) {
            Some(index) => {
                docs.remove(index);
                Ok((true, true))
            }
            None => Ok((false, false)),
        })
        .await
    }

    async fn clear(&self, kind: &Kind) -> Result<u64, StoreError> {
        self.write(kind, |docs| {
            let removed = docs.len() as u64;
            docs.clear();
            Ok((removed, true))
        })
        .await
    }
}
