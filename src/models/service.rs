use serde::{Deserialize, Serialize};

use crate::db::Document;
use crate::models::project::default_active;
use crate::models::{lenient_bool, normalize_as, Kind, Resource};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_title: Option<String>,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detailed_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_expertise: Option<String>,
    pub icon: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub industries_served: Vec<String>,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default = "default_active", deserialize_with = "lenient_bool")]
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl Resource for Service {
    const KIND: Kind = Kind {
        name: "service",
        collection: "services",
        label: "Service",
        lookup_fields: &["id", "slug"],
        unique_fields: &["id", "slug"],
    };

    fn normalize(doc: Document) -> Result<Document, String> {
        normalize_as::<Service>(doc)
    }
}
