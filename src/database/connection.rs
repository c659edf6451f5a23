use super::{establish_connection, get_database_path, DatabaseError, DbPool};
use std::sync::RwLock;

// Process-wide pool slot. Explicitly owned: initialized through
// `init_database`, torn down through `shutdown_database`. Embedding
// callers that manage their own pool can bypass this entirely and pass
// a `DbPool` straight into the repositories.
static DB_POOL: RwLock<Option<DbPool>> = RwLock::new(None);

pub fn init_database() -> Result<(), DatabaseError> {
    let database_url = get_database_path()?;
    init_database_at(&database_url)
}

pub fn init_database_at(database_url: &str) -> Result<(), DatabaseError> {
    let pool = establish_connection(database_url)?;

    let mut slot = DB_POOL
        .write()
        .map_err(|_| DatabaseError::Pool("Database pool lock poisoned".to_string()))?;
    if slot.is_some() {
        return Err(DatabaseError::InvalidState(
            "Database already initialized".to_string(),
        ));
    }
    *slot = Some(pool);

    Ok(())
}

pub fn get_pool() -> Result<DbPool, DatabaseError> {
    let slot = DB_POOL
        .read()
        .map_err(|_| DatabaseError::Pool("Database pool lock poisoned".to_string()))?;

    slot.clone()
        .ok_or_else(|| DatabaseError::InvalidState("Database not initialized".to_string()))
}

/// Teardown hook: drops the process-wide pool and its connections.
pub fn shutdown_database() {
    if let Ok(mut slot) = DB_POOL.write() {
        slot.take();
    }
}
