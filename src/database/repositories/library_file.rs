use super::{DatabaseError, Repository};
use crate::database::models::{LibraryFile, NewLibraryFile};
use crate::database::DbPool;
use crate::schema::{devices, library_files, projects};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use std::collections::HashMap;

/// Outcome of an atomic registration attempt. `RaceLost` means another
/// session registered identical content between our duplicate lookup and
/// the insert; the caller records the file as a duplicate skip.
#[derive(Debug)]
pub enum Registration {
    Created(LibraryFile),
    RaceLost,
}

pub struct LibraryFileRepository {
    pool: DbPool,
}

impl Repository for LibraryFileRepository {
    fn pool(&self) -> &DbPool {
        &self.pool
    }
}

impl LibraryFileRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert a new library file. The unique index on
    /// (content_hash, device_id, kept_duplicate) arbitrates concurrent
    /// registration of identical content; losing that race is not an error.
    pub fn register(&self, new_file: NewLibraryFile) -> Result<Registration, DatabaseError> {
        let mut conn = self.get_connection()?;

        match diesel::insert_into(library_files::table)
            .values(&new_file)
            .execute(&mut conn)
        {
            Ok(_) => self.find_by_id(&new_file.id).map(Registration::Created),
            Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                Ok(Registration::RaceLost)
            }
            Err(e) => Err(DatabaseError::Query(e)),
        }
    }

    pub fn find_by_id(&self, id: &str) -> Result<LibraryFile, DatabaseError> {
        let mut conn = self.get_connection()?;

        library_files::table
            .filter(library_files::id.eq(id))
            .select(LibraryFile::as_select())
            .first(&mut conn)
            .map_err(DatabaseError::Query)
    }

    pub fn find_by_hash(&self, content_hash: &str) -> Result<Vec<LibraryFile>, DatabaseError> {
        let mut conn = self.get_connection()?;

        library_files::table
            .filter(library_files::content_hash.eq(content_hash))
            .order(library_files::imported_at.desc())
            .select(LibraryFile::as_select())
            .load(&mut conn)
            .map_err(DatabaseError::Query)
    }

    /// Duplicate lookup joined with device and project identity,
    /// most-recent-first. Feeds the DuplicateIndex.
    pub fn find_matches_by_hash(
        &self,
        content_hash: &str,
    ) -> Result<Vec<(LibraryFile, String, Option<String>)>, DatabaseError> {
        let mut conn = self.get_connection()?;

        library_files::table
            .inner_join(devices::table)
            .left_join(projects::table)
            .filter(library_files::content_hash.eq(content_hash))
            .order(library_files::imported_at.desc())
            .select((
                LibraryFile::as_select(),
                devices::display_name,
                projects::name.nullable(),
            ))
            .load(&mut conn)
            .map_err(DatabaseError::Query)
    }

    pub fn find_by_session(&self, session_id: &str) -> Result<Vec<LibraryFile>, DatabaseError> {
        let mut conn = self.get_connection()?;

        library_files::table
            .filter(library_files::session_id.eq(session_id))
            .select(LibraryFile::as_select())
            .load(&mut conn)
            .map_err(DatabaseError::Query)
    }

    /// Snapshot of (source_path -> (size_bytes, modified_at)) already
    /// imported from a device, used by incremental scans to avoid
    /// re-copying unchanged files.
    pub fn known_device_files(
        &self,
        device_id: &str,
    ) -> Result<HashMap<String, (i64, String)>, DatabaseError> {
        let mut conn = self.get_connection()?;

        let rows: Vec<(String, i64, String)> = library_files::table
            .filter(library_files::device_id.eq(device_id))
            .select((
                library_files::source_path,
                library_files::size_bytes,
                library_files::modified_at,
            ))
            .load(&mut conn)?;

        Ok(rows
            .into_iter()
            .map(|(path, size, modified)| (path, (size, modified)))
            .collect())
    }

    pub fn update_path(&self, id: &str, path: &str) -> Result<LibraryFile, DatabaseError> {
        let mut conn = self.get_connection()?;

        diesel::update(library_files::table.filter(library_files::id.eq(id)))
            .set(library_files::path.eq(path))
            .execute(&mut conn)?;

        self.find_by_id(id)
    }

    pub fn count_by_device(&self, device_id: &str) -> Result<i64, DatabaseError> {
        let mut conn = self.get_connection()?;

        library_files::table
            .filter(library_files::device_id.eq(device_id))
            .count()
            .get_result(&mut conn)
            .map_err(DatabaseError::Query)
    }
}
