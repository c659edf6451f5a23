pub mod device;
pub mod import_session;
pub mod library_file;
pub mod project;

pub use device::DeviceRepository;
pub use import_session::ImportSessionRepository;
pub use library_file::{LibraryFileRepository, Registration};
pub use project::ProjectRepository;

use super::{DatabaseError, DbConnection, DbPool};

pub trait Repository {
    fn pool(&self) -> &DbPool;

    fn get_connection(&self) -> Result<DbConnection, DatabaseError> {
        self.pool()
            .get()
            .map_err(|e| DatabaseError::Pool(format!("Pool connection failed: {}", e)))
    }
}
