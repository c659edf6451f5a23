use super::{DatabaseError, Repository};
use crate::database::models::{ImportSession, NewImportSession, SessionStatus};
use crate::database::DbPool;
use crate::schema::import_sessions;
use chrono::Utc;
use diesel::prelude::*;
use uuid::Uuid;

/// Final per-outcome tallies written back when a session closes.
#[derive(Debug, Default, Clone)]
pub struct SessionCounts {
    pub imported: usize,
    pub skipped_duplicate: usize,
    pub failed: usize,
}

impl SessionCounts {
    pub fn total(&self) -> usize {
        self.imported + self.skipped_duplicate + self.failed
    }
}

pub struct ImportSessionRepository {
    pool: DbPool,
}

impl Repository for ImportSessionRepository {
    fn pool(&self) -> &DbPool {
        &self.pool
    }
}

impl ImportSessionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn open(
        &self,
        device_id: &str,
        project_id: Option<&str>,
    ) -> Result<ImportSession, DatabaseError> {
        let mut conn = self.get_connection()?;
        let now = Utc::now().to_rfc3339();
        let id = format!("ses_{}", Uuid::new_v4().simple());

        let new_session = NewImportSession {
            id: id.clone(),
            device_id: device_id.to_string(),
            project_id: project_id.map(|p| p.to_string()),
            status: String::from(SessionStatus::Running),
            requested_count: 0,
            imported_count: 0,
            skipped_duplicate_count: 0,
            failed_count: 0,
            failed_files: "[]".to_string(),
            started_at: now,
            completed_at: None,
        };

        diesel::insert_into(import_sessions::table)
            .values(&new_session)
            .execute(&mut conn)?;

        self.find_by_id(&id)
    }

    pub fn set_requested(&self, id: &str, requested: usize) -> Result<(), DatabaseError> {
        let mut conn = self.get_connection()?;

        diesel::update(import_sessions::table.filter(import_sessions::id.eq(id)))
            .set(import_sessions::requested_count.eq(requested as i32))
            .execute(&mut conn)?;

        Ok(())
    }

    /// Close a session exactly once. The update is guarded on
    /// status=running; a second finalize attempt is rejected so a
    /// finalized session stays an immutable audit record.
    pub fn finalize(
        &self,
        id: &str,
        status: SessionStatus,
        counts: &SessionCounts,
        failed_files: &[String],
    ) -> Result<ImportSession, DatabaseError> {
        let mut conn = self.get_connection()?;
        let now = Utc::now().to_rfc3339();

        let updated = diesel::update(
            import_sessions::table
                .filter(import_sessions::id.eq(id))
                .filter(import_sessions::status.eq(String::from(SessionStatus::Running))),
        )
        .set((
            import_sessions::status.eq(String::from(status)),
            import_sessions::imported_count.eq(counts.imported as i32),
            import_sessions::skipped_duplicate_count.eq(counts.skipped_duplicate as i32),
            import_sessions::failed_count.eq(counts.failed as i32),
            import_sessions::failed_files.eq(serde_json::to_string(failed_files)?),
            import_sessions::completed_at.eq(Some(now)),
        ))
        .execute(&mut conn)?;

        if updated == 0 {
            return Err(DatabaseError::InvalidState(format!(
                "Session {} is not running and cannot be finalized",
                id
            )));
        }

        self.find_by_id(id)
    }

    pub fn find_by_id(&self, id: &str) -> Result<ImportSession, DatabaseError> {
        let mut conn = self.get_connection()?;

        import_sessions::table
            .filter(import_sessions::id.eq(id))
            .select(ImportSession::as_select())
            .first(&mut conn)
            .map_err(DatabaseError::Query)
    }

    pub fn recent_for_device(
        &self,
        device_id: &str,
        limit: i64,
    ) -> Result<Vec<ImportSession>, DatabaseError> {
        let mut conn = self.get_connection()?;

        import_sessions::table
            .filter(import_sessions::device_id.eq(device_id))
            .order(import_sessions::started_at.desc())
            .limit(limit)
            .select(ImportSession::as_select())
            .load(&mut conn)
            .map_err(DatabaseError::Query)
    }
}
