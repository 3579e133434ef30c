use axum::extract::{Path, State};

use crate::auth::extractor::AdminUser;
use crate::db::Document;
use crate::error::AppError;
use crate::models::{self, Resource};
use crate::response::{ApiJson, Envelope};
use crate::state::SharedState;

fn not_found<R: Resource>() -> AppError {
    AppError::NotFound(format!("{} not found", R::KIND.label))
}

fn invalid<R: Resource>(reason: String) -> AppError {
    AppError::Validation(format!("{} validation failed: {reason}", R::KIND.label))
}

pub async fn list<R: Resource>(
    State(state): State<SharedState>,
) -> Result<Envelope<Vec<Document>>, AppError> {
    let records = state.store.list(&R::KIND).await?;
    Ok(Envelope::data(records))
}

pub async fn get<R: Resource>(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Envelope<Document>, AppError> {
    for field in R::KIND.lookup_fields {
        if let Some(record) = state.store.find(&R::KIND, field, &id).await? {
            return Ok(Envelope::data(record));
        }
    }
    Err(not_found::<R>())
}

pub async fn create<R: Resource>(
    admin: AdminUser,
    State(state): State<SharedState>,
    ApiJson(body): ApiJson<Document>,
) -> Result<Envelope<Document>, AppError> {
    let record = models::new_record::<R>(body, &state.ids).map_err(invalid::<R>)?;
    let record = state.store.insert(&R::KIND, record).await?;

    tracing::info!(
        kind = R::KIND.name,
        id = record.get("id").and_then(|v| v.as_str()).unwrap_or_default(),
        by = %admin.email,
        "Record created"
    );

    Ok(Envelope::data(record).with_message(format!("{} created successfully", R::KIND.label)))
}

pub async fn update<R: Resource>(
    admin: AdminUser,
    State(state): State<SharedState>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<Document>,
) -> Result<Envelope<Document>, AppError> {
    let existing = state
        .store
        .find(&R::KIND, "id", &id)
        .await?
        .ok_or_else(not_found::<R>)?;

    let merged = models::merge_update::<R>(existing, body).map_err(invalid::<R>)?;
    let record = state
        .store
        .replace(&R::KIND, &id, merged)
        .await?
        .ok_or_else(not_found::<R>)?;

    tracing::info!(kind = R::KIND.name, %id, by = %admin.email, "Record updated");

    Ok(Envelope::data(record).with_message(format!("{} updated successfully", R::KIND.label)))
}

pub async fn delete<R: Resource>(
    admin: AdminUser,
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Envelope<()>, AppError> {
    if !state.store.delete(&R::KIND, &id).await? {
        return Err(not_found::<R>());
    }

    tracing::info!(kind = R::KIND.name, %id, by = %admin.email, "Record deleted");

    Ok(Envelope::message(format!("{} deleted successfully", R::KIND.label)))
}
