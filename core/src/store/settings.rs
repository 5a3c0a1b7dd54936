//! Per-group settings blobs.

use super::SqliteStore;
use crate::{
    config::GuildCrimeSettings,
    error::{CrimeError, CrimeResult},
    types::GroupId,
};
use rusqlite::{params, OptionalExtension};

pub const SETTINGS_SCHEMA_VERSION: u32 = 1;

impl SqliteStore {
    pub fn load_group_settings(&self, group: GroupId) -> CrimeResult<Option<GuildCrimeSettings>> {
        let row = self
            .conn()
            .query_row(
                "SELECT schema_version, settings_json FROM group_settings WHERE group_id = ?1",
                params![group as i64],
                |r| Ok((r.get::<_, u32>(0)?, r.get::<_, String>(1)?)),
            )
            .optional()?;
        match row {
            None => Ok(None),
            Some((version, _)) if version != SETTINGS_SCHEMA_VERSION => {
                Err(CrimeError::Other(anyhow::anyhow!(
                    "unsupported settings schema version {version} for group {group}"
                )))
            }
            Some((_, json)) => Ok(Some(serde_json::from_str(&json)?)),
        }
    }

    pub fn store_group_settings(&self, group: GroupId, settings: &GuildCrimeSettings) -> CrimeResult<()> {
        settings.validate()?;
        let json = serde_json::to_string(settings)?;
        self.conn().execute(
            "INSERT INTO group_settings (group_id, schema_version, revision, settings_json)
             VALUES (?1, ?2, 1, ?3)
             ON CONFLICT(group_id) DO UPDATE SET
                schema_version = excluded.schema_version,
                revision       = group_settings.revision + 1,
                settings_json  = excluded.settings_json",
            params![group as i64, SETTINGS_SCHEMA_VERSION, json],
        )?;
        Ok(())
    }

    /// Revision counter of the group's settings row; 0 before the first write.
    pub fn settings_revision(&self, group: GroupId) -> CrimeResult<i64> {
        Ok(self
            .conn()
            .query_row(
                "SELECT revision FROM group_settings WHERE group_id = ?1",
                params![group as i64],
                |r| r.get(0),
            )
            .optional()?
            .unwrap_or(0))
    }
}
