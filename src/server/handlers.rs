//! HTTP route handlers

use axum::{
    extract::{Extension, Json},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

use super::middleware::UserId;
use super::AppState;
use crate::storage::keys::{CREATED_DATE_FIELD, ID_FIELD};
use crate::storage::{Item, Scalar, StorageError, TableSpec};

/// Logical name of the journal table
pub const ENTRIES_TABLE: &str = "entries";

/// `entries`: hashed by user, sorted by date
pub fn entries_table() -> TableSpec {
    TableSpec::new(ENTRIES_TABLE, vec!["userId"]).with_sort_key(vec!["date"])
}

/// Body of `POST /entries`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveEntryInput {
    pub date: String,
    #[serde(default)]
    pub notes: Option<String>,
    pub rating_out_of_five: i64,
}

impl SaveEntryInput {
    /// The item written for `user_id`; absent notes are left out
    pub fn into_item(self, user_id: String) -> Item {
        let mut item = Item::new();
        item.insert("date".to_string(), Scalar::from(self.date));
        if let Some(notes) = self.notes {
            item.insert("notes".to_string(), Scalar::from(notes));
        }
        item.insert(
            "ratingOutOfFive".to_string(),
            Scalar::from(self.rating_out_of_five),
        );
        item.insert("userId".to_string(), Scalar::from(user_id));
        item
    }
}

/// A stored journal entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub created_date: String,
    pub date: String,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub rating_out_of_five: i64,
    pub user_id: String,
}

impl Entry {
    /// Read an entry back from a stored item; `None` if a field is missing
    /// or has the wrong type.
    pub fn from_item(item: &Item) -> Option<Self> {
        let text = |field: &str| item.get(field).and_then(Scalar::as_str).map(str::to_string);
        Some(Self {
            created_date: text(CREATED_DATE_FIELD)?,
            date: text("date")?,
            id: text(ID_FIELD)?,
            notes: text("notes"),
            rating_out_of_five: item.get("ratingOutOfFive")?.as_number()? as i64,
            user_id: text("userId")?,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn storage_failure(e: StorageError) -> Response {
    let status = match e {
        StorageError::MissingKey => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ErrorResponse { error: e.to_string() })).into_response()
}

/// `POST /entries`
#[instrument(skip_all)]
pub async fn save_entry(
    Extension(state): Extension<Arc<AppState>>,
    Extension(user_id): Extension<UserId>,
    Json(input): Json<SaveEntryInput>,
) -> Response {
    info!(user_id = %user_id.0, "Saving entry");

    let item = input.into_item(user_id.0);
    match state.storage.add_item(item, &entries_table()).await {
        Ok(stored) => match Entry::from_item(&stored) {
            Some(entry) => (StatusCode::CREATED, Json(entry)).into_response(),
            None => {
                error!("Stored entry is malformed");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        },
        Err(e) => {
            error!(error = %e, "Failed to save entry");
            storage_failure(e)
        }
    }
}

/// `GET /entries`
#[instrument(skip_all)]
pub async fn list_entries(
    Extension(state): Extension<Arc<AppState>>,
    Extension(user_id): Extension<UserId>,
) -> Response {
    info!(user_id = %user_id.0, "Listing entries");

    let items = match state
        .storage
        .get_items("userId", &Scalar::from(user_id.0), ENTRIES_TABLE)
        .await
    {
        Ok(items) => items,
        Err(e) if e.is_missing_table() => {
            info!("entries table does not exist, returning empty list");
            Vec::new()
        }
        Err(e) => {
            error!(error = %e, "Failed to list entries");
            return storage_failure(e);
        }
    };

    let entries: Vec<Entry> = items
        .iter()
        .filter_map(|item| {
            let entry = Entry::from_item(item);
            if entry.is_none() {
                debug!(?item, "Skipping malformed entry");
            }
            entry
        })
        .collect();

    Json(entries).into_response()
}
