use serde::{Deserialize, Serialize};

use crate::db::Document;
use crate::models::{lenient_bool, normalize_as, string_or_number, Kind, Resource};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub title: String,
    pub category: String,
    pub location: String,
    pub description: String,
    pub client: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub status: ProjectStatus,
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub year: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detailed_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub budget: Option<String>,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default = "default_active", deserialize_with = "lenient_bool")]
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectStatus {
    #[default]
    Completed,
    Ongoing,
    InProgress,
    Planned,
}

pub(crate) fn default_active() -> bool {
    true
}

impl Resource for Project {
    const KIND: Kind = Kind {
        name: "project",
        collection: "projects",
        label: "Project",
        lookup_fields: &["id"],
        unique_fields: &["id"],
    };

    fn normalize(doc: Document) -> Result<Document, String> {
        normalize_as::<Project>(doc)
    }
}
