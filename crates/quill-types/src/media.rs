//! Media types

use crate::Id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata for an uploaded file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Media {
    pub id: Id,
    pub filename: String,
    pub file_path: String,
    /// MIME type
    pub file_type: String,
    pub file_size: i64,
    pub user_id: Option<Id>,
    pub uploaded_at: DateTime<Utc>,
}

impl Media {
    pub fn from_new(id: Id, new: NewMedia, now: DateTime<Utc>) -> Self {
        Self {
            id,
            filename: new.filename,
            file_path: new.file_path,
            file_type: new.file_type,
            file_size: new.file_size,
            user_id: new.user_id,
            uploaded_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMedia {
    pub filename: String,
    pub file_path: String,
    pub file_type: String,
    pub file_size: i64,
    #[serde(default)]
    pub user_id: Option<Id>,
}
