use super::{DatabaseError, Repository};
use crate::database::models::MobileDevice;
use crate::database::DbPool;
use crate::schema::devices;
use chrono::Utc;
use diesel::prelude::*;

pub struct DeviceRepository {
    pool: DbPool,
}

impl Repository for DeviceRepository {
    fn pool(&self) -> &DbPool {
        &self.pool
    }
}

impl DeviceRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Record that a device was seen, creating its preference row on
    /// first contact. The display name is only set on creation so a
    /// user-assigned name survives later sightings.
    pub fn upsert_seen(
        &self,
        device_id: &str,
        display_name: &str,
    ) -> Result<MobileDevice, DatabaseError> {
        let mut conn = self.get_connection()?;
        let now = Utc::now().to_rfc3339();

        let device = MobileDevice {
            id: device_id.to_string(),
            display_name: display_name.to_string(),
            last_seen_at: now.clone(),
            auto_import_enabled: false,
            auto_import_folder: None,
        };

        diesel::insert_into(devices::table)
            .values(&device)
            .on_conflict(devices::id)
            .do_update()
            .set(devices::last_seen_at.eq(now))
            .execute(&mut conn)?;

        self.find_by_id(device_id)
    }

    pub fn rename(&self, device_id: &str, display_name: &str) -> Result<MobileDevice, DatabaseError> {
        let mut conn = self.get_connection()?;

        diesel::update(devices::table.filter(devices::id.eq(device_id)))
            .set(devices::display_name.eq(display_name))
            .execute(&mut conn)?;

        self.find_by_id(device_id)
    }

    pub fn set_auto_import(
        &self,
        device_id: &str,
        enabled: bool,
        folder: Option<&str>,
    ) -> Result<MobileDevice, DatabaseError> {
        let mut conn = self.get_connection()?;

        diesel::update(devices::table.filter(devices::id.eq(device_id)))
            .set((
                devices::auto_import_enabled.eq(enabled),
                devices::auto_import_folder.eq(folder.map(|f| f.to_string())),
            ))
            .execute(&mut conn)?;

        self.find_by_id(device_id)
    }

    pub fn find_by_id(&self, device_id: &str) -> Result<MobileDevice, DatabaseError> {
        let mut conn = self.get_connection()?;

        devices::table
            .filter(devices::id.eq(device_id))
            .select(MobileDevice::as_select())
            .first(&mut conn)
            .map_err(DatabaseError::Query)
    }

    pub fn auto_import_candidates(&self) -> Result<Vec<MobileDevice>, DatabaseError> {
        let mut conn = self.get_connection()?;

        devices::table
            .filter(devices::auto_import_enabled.eq(true))
            .order(devices::last_seen_at.desc())
            .select(MobileDevice::as_select())
            .load(&mut conn)
            .map_err(DatabaseError::Query)
    }
}
