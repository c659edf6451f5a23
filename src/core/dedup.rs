use crate::database::repositories::LibraryFileRepository;
use crate::database::{DatabaseError, DbPool};
use serde::Serialize;

/// One prior occurrence of identical content in the library.
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateMatch {
    pub library_file_id: String,
    pub source_device_id: String,
    pub source_device_name: String,
    pub imported_at: String,
    pub project_id: Option<String>,
    pub project_name: Option<String>,
    pub is_same_device: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateClass {
    None,
    /// This exact device already contributed this content: a re-scan of
    /// a previously imported file, always skipped.
    SameDevice,
    /// A different device already holds identical content: skipped by
    /// default, importable via the per-session override.
    CrossDevice,
}

/// Library-wide content-hash lookup. Duplicate scope is the whole
/// library; project identity rides along for display only.
pub struct DuplicateIndex {
    files: LibraryFileRepository,
}

impl DuplicateIndex {
    pub fn new(pool: DbPool) -> Self {
        Self {
            files: LibraryFileRepository::new(pool),
        }
    }

    /// All prior occurrences of a content hash, most-recent-first.
    pub fn lookup(
        &self,
        content_hash: &str,
        current_device_id: &str,
    ) -> Result<Vec<DuplicateMatch>, DatabaseError> {
        let rows = self.files.find_matches_by_hash(content_hash)?;

        Ok(rows
            .into_iter()
            .map(|(file, device_name, project_name)| DuplicateMatch {
                library_file_id: file.id,
                is_same_device: file.device_id == current_device_id,
                source_device_id: file.device_id,
                source_device_name: device_name,
                imported_at: file.imported_at,
                project_id: file.project_id,
                project_name,
            })
            .collect())
    }

    pub fn classify(matches: &[DuplicateMatch]) -> DuplicateClass {
        if matches.is_empty() {
            DuplicateClass::None
        } else if matches.iter().any(|m| m.is_same_device) {
            DuplicateClass::SameDevice
        } else {
            DuplicateClass::CrossDevice
        }
    }

    /// Default policy: same-device matches are always skipped (idempotent
    /// re-import); cross-device matches are skipped unless the caller
    /// opted to import duplicates anyway.
    pub fn should_skip(class: DuplicateClass, import_duplicates: bool) -> bool {
        match class {
            DuplicateClass::None => false,
            DuplicateClass::SameDevice => true,
            DuplicateClass::CrossDevice => !import_duplicates,
        }
    }
}
