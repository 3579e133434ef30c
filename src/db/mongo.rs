use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::bson::{self, doc, Bson, Document as BsonDocument};
use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, IndexOptions, ReturnDocument};
use mongodb::{Client, Collection, Database, IndexModel};
use serde_json::Value;

use crate::db::connection::{ConnectionError, ConnectionManager, Connector};
use crate::db::{Document, Store, StoreError};
use crate::models::{Client as ClientRecord, Kind, Project, Resource, Service};

const DEFAULT_DATABASE: &str = "cms";
const DUPLICATE_KEY: i32 = 11000;

#[derive(Clone)]
pub struct MongoHandle {
    client: Client,
    database: Database,
}

pub struct MongoConnector {
    database: Option<String>,
}

impl MongoConnector {
    pub fn new(database: Option<String>) -> Self {
        Self { database }
    }
}

#[async_trait]
impl Connector for MongoConnector {
    type Handle = MongoHandle;

    async fn connect(&self, uri: &str) -> Result<MongoHandle, ConnectionError> {
        let mut options = ClientOptions::parse(uri).await.map_err(connection_error)?;
        options
            .server_selection_timeout
            .get_or_insert(Duration::from_secs(5));
        options.connect_timeout.get_or_insert(Duration::from_secs(10));

        let name = self
            .database
            .clone()
            .or_else(|| options.default_database.clone())
            .unwrap_or_else(|| DEFAULT_DATABASE.to_string());

        let client = Client::with_options(options).map_err(connection_error)?;
        let database = client.database(&name);
        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(connection_error)?;

        ensure_indexes(&database).await;
        tracing::debug!("Using MongoDB database {name}");

        Ok(MongoHandle { client, database })
    }

    async fn close(&self, handle: MongoHandle) {
        handle.client.shutdown().await;
    }
}

async fn ensure_indexes(database: &Database) {
    for kind in [&Project::KIND, &ClientRecord::KIND, &Service::KIND] {
        let collection = database.collection::<BsonDocument>(kind.collection);
        for field in kind.unique_fields {
            let mut keys = BsonDocument::new();
            keys.insert(*field, 1);
            let mut only_strings = BsonDocument::new();
            only_strings.insert(*field, doc! { "$type": "string" });

            let index = IndexModel::builder()
                .keys(keys)
                .options(
                    IndexOptions::builder()
                        .unique(true)
                        .partial_filter_expression(only_strings)
                        .build(),
                )
                .build();

            // An existing index with other options is left alone.
            if let Err(e) = collection.create_index(index).await {
                tracing::warn!("Could not ensure unique index {}.{field}: {e}", kind.collection);
            }
        }
    }
}

fn connection_error(err: MongoError) -> ConnectionError {
    match *err.kind {
        ErrorKind::InvalidArgument { .. } => ConnectionError::Configuration(err.to_string()),
        _ => ConnectionError::Connectivity(err.to_string()),
    }
}

fn store_error(err: MongoError) -> StoreError {
    let duplicate = match &*err.kind {
        ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == DUPLICATE_KEY => {
            Some(write.message.as_str())
        }
        ErrorKind::Command(command) if command.code == DUPLICATE_KEY => Some(command.message.as_str()),
        _ => None,
    };
    if let Some(message) = duplicate {
        let (field, value) =
            parse_duplicate_key(message).unwrap_or_else(|| ("id".to_string(), String::new()));
        return StoreError::Duplicate { field, value };
    }
    match *err.kind {
        ErrorKind::ServerSelection { .. }
        | ErrorKind::Io(_)
        | ErrorKind::ConnectionPoolCleared { .. } => {
            StoreError::Connection(ConnectionError::Connectivity(err.to_string()))
        }
        _ => StoreError::Backend(err.to_string()),
    }
}

/// Pull the field and value out of `... dup key: { slug: "audit" }`.
fn parse_duplicate_key(message: &str) -> Option<(String, String)> {
    let rest = message.split("dup key: {").nth(1)?;
    let (field, value) = rest.split_once(':')?;
    let value = value.trim().trim_end_matches('}').trim().trim_matches('"');
    Some((field.trim().to_string(), value.to_string()))
}

fn to_bson(doc: &Document) -> Result<BsonDocument, StoreError> {
    bson::to_document(doc).map_err(|e| StoreError::Backend(format!("Cannot encode record: {e}")))
}

fn from_bson(mut doc: BsonDocument) -> Document {
    doc.remove("_id");
    doc.remove("__v");
    doc.into_iter()
        .map(|(key, value)| {
            let value = match value {
                Bson::DateTime(dt) => dt
                    .try_to_rfc3339_string()
                    .map(Value::String)
                    .unwrap_or(Value::Null),
                other => other.into_relaxed_extjson(),
            };
            (key, value)
        })
        .collect()
}

fn filter(field: &str, value: &str) -> BsonDocument {
    let mut filter = BsonDocument::new();
    filter.insert(field, value);
    filter
}

pub struct MongoStore {
    connections: Arc<ConnectionManager<MongoConnector>>,
}

impl MongoStore {
    pub fn new(connections: Arc<ConnectionManager<MongoConnector>>) -> Self {
        Self { connections }
    }

    async fn collection(&self, kind: &Kind) -> Result<Collection<BsonDocument>, StoreError> {
        let handle = self.connections.ensure_connected().await?;
        Ok(handle.database.collection(kind.collection))
    }
}

#[async_trait]
impl Store for MongoStore {
    fn backend(&self) -> &'static str {
        "mongodb"
    }

    async fn list(&self, kind: &Kind) -> Result<Vec<Document>, StoreError> {
        let cursor = self
            .collection(kind)
            .await?
            .find(doc! {})
            .sort(doc! { "createdAt": -1, "_id": -1 })
            .await
            .map_err(store_error)?;
        let docs: Vec<BsonDocument> = cursor.try_collect().await.map_err(store_error)?;
        Ok(docs.into_iter().map(from_bson).collect())
    }

    async fn find(
        &self,
        kind: &Kind,
        field: &str,
        value: &str,
    ) -> Result<Option<Document>, StoreError> {
        let found = self
            .collection(kind)
            .await?
            .find_one(filter(field, value))
            .await
            .map_err(store_error)?;
        Ok(found.map(from_bson))
    }

    async fn insert(&self, kind: &Kind, doc: Document) -> Result<Document, StoreError> {
        self.collection(kind)
            .await?
            .insert_one(to_bson(&doc)?)
            .await
            .map_err(store_error)?;
        Ok(doc)
    }

    async fn replace(
        &self,
        kind: &Kind,
        id: &str,
        doc: Document,
    ) -> Result<Option<Document>, StoreError> {
        let replaced = self
            .collection(kind)
            .await?
            .find_one_and_replace(filter("id", id), to_bson(&doc)?)
            .return_document(ReturnDocument::After)
            .await
            .map_err(store_error)?;
        Ok(replaced.map(from_bson))
    }

    async fn delete(&self, kind: &Kind, id: &str) -> Result<bool, StoreError> {
        let result = self
            .collection(kind)
            .await?
            .delete_one(filter("id", id))
            .await
            .map_err(store_error)?;
        Ok(result.deleted_count > 0)
    }

    async fn clear(&self, kind: &Kind) -> Result<u64, StoreError> {
        let result = self
            .collection(kind)
            .await?
            .delete_many(doc! {})
            .await
            .map_err(store_error)?;
        Ok(result.deleted_count)
    }

    async fn shutdown(&self) {
        self.connections.shutdown().await;
    }
}
