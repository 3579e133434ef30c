pub mod client;
pub mod project;
pub mod service;

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{SecondsFormat, Utc};
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::db::Document;

pub use client::Client;
pub use project::{Project, ProjectStatus};
pub use service::Service;

/// Keys the server owns; callers cannot overwrite them through an update.
const MANAGED_KEYS: [&str; 5] = ["id", "createdAt", "updatedAt", "_id", "__v"];

/// Static description of one record kind.
#[derive(Debug)]
pub struct Kind {
    /// Singular name, also the generated-id prefix.
    pub name: &'static str,
    pub collection: &'static str,
    pub label: &'static str,
    /// Fields tried in order by get-by-id.
    pub lookup_fields: &'static [&'static str],
    pub unique_fields: &'static [&'static str],
}

/// A record kind served by the generic resource handlers.
pub trait Resource: Send + Sync + 'static {
    const KIND: Kind;

    /// Apply defaults, drop unknown fields and reject documents that violate the schema.
    fn normalize(doc: Document) -> Result<Document, String>;
}

/// Round-trip a document through its typed schema.
pub(crate) fn normalize_as<T>(doc: Document) -> Result<Document, String>
where
    T: Serialize + DeserializeOwned,
{
    let typed: T = serde_json::from_value(Value::Object(doc)).map_err(|e| e.to_string())?;
    match serde_json::to_value(typed).map_err(|e| e.to_string())? {
        Value::Object(map) => Ok(map),
        _ => Err("record did not serialize to an object".to_string()),
    }
}

/// Optional text field that also takes a bare number (`2023` becomes `"2023"`).
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(D::Error::custom(format!(
            "invalid type: {other}, expected a string or number"
        ))),
    }
}

/// Flag that also takes the usual string and numeric spellings of true and false.
pub(crate) fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let parsed = match &value {
        Value::Null => Some(true),
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    };
    parsed.ok_or_else(|| D::Error::custom(format!("invalid value: {value}, expected a boolean")))
}

/// Issues `{kind}-{epoch-millis}` ids that never repeat within a process.
#[derive(Debug, Default)]
pub struct IdGenerator {
    last: AtomicI64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self, kind: &Kind) -> String {
        let now = Utc::now().timestamp_millis();
        let mut last = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(last + 1);
            match self
                .last
                .compare_exchange_weak(last, candidate, Ordering::SeqCst, Ordering::Relaxed)
            {
                Ok(_) => return format!("{}-{candidate}", kind.name),
                Err(actual) => last = actual,
            }
        }
    }
}

pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Build a new record from a create payload.
pub fn new_record<R: Resource>(mut body: Document, ids: &IdGenerator) -> Result<Document, String> {
    let id = match body.remove("id") {
        None | Some(Value::Null) => ids.next_id(&R::KIND),
        Some(Value::String(id)) if id.trim().is_empty() => ids.next_id(&R::KIND),
        Some(Value::String(id)) => id,
        Some(_) => return Err("id must be a string".to_string()),
    };
    body.remove("_id");
    body.remove("__v");

    let now = timestamp();
    body.insert("id".to_string(), Value::String(id));
    body.insert("createdAt".to_string(), Value::String(now.clone()));
    body.insert("updatedAt".to_string(), Value::String(now));

    R::normalize(body)
}

/// Shallow-merge an update payload over an existing record.
pub fn merge_update<R: Resource>(mut existing: Document, patch: Document) -> Result<Document, String> {
    for (key, value) in patch {
        if MANAGED_KEYS.contains(&key.as_str()) {
            continue;
        }
        existing.insert(key, value);
    }
    existing.insert("updatedAt".to_string(), Value::String(timestamp()));

    R::normalize(existing)
}
