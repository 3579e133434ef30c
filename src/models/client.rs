use serde_json::Value;

use crate::db::Document;
use crate::models::{Kind, Resource};

/// Clients carry no fixed schema beyond the managed keys.
pub struct Client;

impl Resource for Client {
    const KIND: Kind = Kind {
        name: "client",
        collection: "clients",
        label: "Client",
        lookup_fields: &["id"],
        unique_fields: &["id"],
    };

    fn normalize(doc: Document) -> Result<Document, String> {
        for key in ["id", "createdAt", "updatedAt"] {
            match doc.get(key) {
                Some(Value::String(_)) => {}
                _ => return Err(format!("{key} must be a string")),
            }
        }
        Ok(doc)
    }
}
