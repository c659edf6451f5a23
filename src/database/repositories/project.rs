use super::{DatabaseError, Repository};
use crate::database::models::{NewProject, Project};
use crate::database::DbPool;
use crate::schema::projects;
use chrono::Utc;
use diesel::prelude::*;
use uuid::Uuid;

pub struct ProjectRepository {
    pool: DbPool,
}

impl Repository for ProjectRepository {
    fn pool(&self) -> &DbPool {
        &self.pool
    }
}

impl ProjectRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn create(&self, name: String, library_root: String) -> Result<Project, DatabaseError> {
        let mut conn = self.get_connection()?;
        let now = Utc::now().to_rfc3339();
        let id = format!("prj_{}", Uuid::new_v4().simple());

        let new_project = NewProject {
            id: id.clone(),
            name,
            library_root,
            created_at: now.clone(),
            updated_at: now,
        };

        diesel::insert_into(projects::table)
            .values(&new_project)
            .execute(&mut conn)?;

        self.find_by_id(&id)
    }

    pub fn find_by_id(&self, id: &str) -> Result<Project, DatabaseError> {
        let mut conn = self.get_connection()?;

        projects::table
            .filter(projects::id.eq(id))
            .select(Project::as_select())
            .first(&mut conn)
            .map_err(DatabaseError::Query)
    }

    pub fn find_all(&self) -> Result<Vec<Project>, DatabaseError> {
        let mut conn = self.get_connection()?;

        projects::table
            .order(projects::created_at.desc())
            .select(Project::as_select())
            .load(&mut conn)
            .map_err(DatabaseError::Query)
    }

    pub fn exists(&self, id: &str) -> Result<bool, DatabaseError> {
        let mut conn = self.get_connection()?;

        let count: i64 = projects::table
            .filter(projects::id.eq(id))
            .count()
            .get_result(&mut conn)?;

        Ok(count > 0)
    }
}
