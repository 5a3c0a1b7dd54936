//! Per-member record blobs and the `ConfigStore` implementation.

use super::SqliteStore;
use crate::{
    collaborator::ConfigStore,
    config::GuildCrimeSettings,
    error::CrimeResult,
    record::{MemberCriminalRecord, RECORD_SCHEMA_VERSION},
    types::{ActorId, GroupId, MemberKey},
};
use rusqlite::{params, Connection, OptionalExtension};

fn load_record(conn: &Connection, member: MemberKey) -> CrimeResult<MemberCriminalRecord> {
    let json: Option<String> = conn
        .query_row(
            "SELECT record_json FROM member_record WHERE group_id = ?1 AND actor_id = ?2",
            params![member.group as i64, member.actor as i64],
            |r| r.get(0),
        )
        .optional()?;
    match json {
        Some(json) => MemberCriminalRecord::from_blob(&json),
        None => Ok(MemberCriminalRecord::default()),
    }
}

fn save_record(conn: &Connection, member: MemberKey, record: &MemberCriminalRecord) -> CrimeResult<()> {
    conn.execute(
        "INSERT INTO member_record (group_id, actor_id, schema_version, revision, record_json)
         VALUES (?1, ?2, ?3, 1, ?4)
         ON CONFLICT(group_id, actor_id) DO UPDATE SET
            schema_version = excluded.schema_version,
            revision       = member_record.revision + 1,
            record_json    = excluded.record_json",
        params![
            member.group as i64,
            member.actor as i64,
            RECORD_SCHEMA_VERSION,
            record.to_blob()?
        ],
    )?;
    Ok(())
}

impl SqliteStore {
    /// Revision counter of the member's record row; 0 before the first write.
    pub fn record_revision(&self, member: MemberKey) -> CrimeResult<i64> {
        Ok(self
            .conn()
            .query_row(
                "SELECT revision FROM member_record WHERE group_id = ?1 AND actor_id = ?2",
                params![member.group as i64, member.actor as i64],
                |r| r.get(0),
            )
            .optional()?
            .unwrap_or(0))
    }
}

impl ConfigStore for SqliteStore {
    fn group_settings(&self, group: GroupId) -> CrimeResult<Option<GuildCrimeSettings>> {
        self.load_group_settings(group)
    }

    fn set_group_settings(&self, group: GroupId, settings: &GuildCrimeSettings) -> CrimeResult<()> {
        self.store_group_settings(group, settings)
    }

    fn member_record(&self, member: MemberKey) -> CrimeResult<MemberCriminalRecord> {
        load_record(&self.conn(), member)
    }

    fn save_member_record(&self, member: MemberKey, record: &MemberCriminalRecord) -> CrimeResult<()> {
        save_record(&self.conn(), member, record)
    }

    fn mutate_member_record(
        &self,
        member: MemberKey,
        f: &mut dyn FnMut(&mut MemberCriminalRecord) -> CrimeResult<()>,
    ) -> CrimeResult<MemberCriminalRecord> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let mut record = load_record(&tx, member)?;
        // Dropping `tx` on error rolls back.
        f(&mut record)?;
        save_record(&tx, member, &record)?;
        tx.commit()?;
        Ok(record)
    }

    fn group_member_records(&self, group: GroupId) -> CrimeResult<Vec<(ActorId, MemberCriminalRecord)>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT actor_id, record_json FROM member_record
             WHERE group_id = ?1 ORDER BY actor_id",
        )?;
        let rows = stmt
            .query_map(params![group as i64], |r| {
                Ok((r.get::<_, i64>(0)? as ActorId, r.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(actor, json)| Ok((actor, MemberCriminalRecord::from_blob(&json)?)))
            .collect()
    }
}
