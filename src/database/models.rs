use crate::schema::*;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

// Device models
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = devices)]
pub struct MobileDevice {
    pub id: String,
    pub display_name: String,
    pub last_seen_at: String,
    pub auto_import_enabled: bool,
    pub auto_import_folder: Option<String>,
}

// Import session models
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = import_sessions)]
pub struct ImportSession {
    pub id: String,
    pub device_id: String,
    pub project_id: Option<String>,
    pub status: String,
    pub requested_count: i32,
    pub imported_count: i32,
    pub skipped_duplicate_count: i32,
    pub failed_count: i32,
    pub failed_files: String, // JSON array of filenames
    pub started_at: String,
    pub completed_at: Option<String>,
}

impl ImportSession {
    pub fn status(&self) -> SessionStatus {
        SessionStatus::from(self.status.clone())
    }

    /// Filenames of candidates that failed, for targeted retry.
    pub fn failed_filenames(&self) -> Vec<String> {
        serde_json::from_str(&self.failed_files).unwrap_or_default()
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = import_sessions)]
pub struct NewImportSession {
    pub id: String,
    pub device_id: String,
    pub project_id: Option<String>,
    pub status: String,
    pub requested_count: i32,
    pub imported_count: i32,
    pub skipped_duplicate_count: i32,
    pub failed_count: i32,
    pub failed_files: String,
    pub started_at: String,
    pub completed_at: Option<String>,
}

// Library file models
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = library_files)]
pub struct LibraryFile {
    pub id: String,
    pub path: String,
    pub content_hash: String,
    pub device_id: String,
    pub device_folder: String,
    pub project_id: Option<String>,
    pub session_id: String,
    pub capture_date: String, // YYYY-MM-DD
    pub kept_duplicate: bool,
    pub source_path: String,
    pub size_bytes: i64,
    pub modified_at: String,
    pub imported_at: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = library_files)]
pub struct NewLibraryFile {
    pub id: String,
    pub path: String,
    pub content_hash: String,
    pub device_id: String,
    pub device_folder: String,
    pub project_id: Option<String>,
    pub session_id: String,
    pub capture_date: String,
    pub kept_duplicate: bool,
    pub source_path: String,
    pub size_bytes: i64,
    pub modified_at: String,
    pub imported_at: String,
}

// Project models
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = projects)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub library_root: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = projects)]
pub struct NewProject {
    pub id: String,
    pub name: String,
    pub library_root: String,
    pub created_at: String,
    pub updated_at: String,
}

// Enums for type safety
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum SessionStatus {
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl From<String> for SessionStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "running" => SessionStatus::Running,
            "completed" => SessionStatus::Completed,
            "cancelled" => SessionStatus::Cancelled,
            "failed" => SessionStatus::Failed,
            _ => SessionStatus::Failed,
        }
    }
}

impl From<SessionStatus> for String {
    fn from(status: SessionStatus) -> Self {
        match status {
            SessionStatus::Running => "running".to_string(),
            SessionStatus::Completed => "completed".to_string(),
            SessionStatus::Cancelled => "cancelled".to_string(),
            SessionStatus::Failed => "failed".to_string(),
        }
    }
}
