//! Audit log queries.

use super::SqliteStore;
use crate::{
    collaborator::EventJournal,
    error::CrimeResult,
    event::EventLogEntry,
    types::{GroupId, MemberKey},
};
use rusqlite::{params, Row};

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<EventLogEntry> {
    Ok(EventLogEntry {
        id:         Some(row.get(0)?),
        group:      row.get::<_, i64>(1)? as GroupId,
        actor:      row.get::<_, Option<i64>>(2)?.map(|a| a as u64),
        at:         row.get(3)?,
        subsystem:  row.get(4)?,
        event_type: row.get(5)?,
        payload:    row.get(6)?,
    })
}

impl SqliteStore {
    pub fn events_for_member(&self, member: MemberKey) -> CrimeResult<Vec<EventLogEntry>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, group_id, actor_id, at, subsystem, event_type, payload
             FROM event_log WHERE group_id = ?1 AND actor_id = ?2
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![member.group as i64, member.actor as i64], entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn events_for_group(&self, group: GroupId) -> CrimeResult<Vec<EventLogEntry>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, group_id, actor_id, at, subsystem, event_type, payload
             FROM event_log WHERE group_id = ?1
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![group as i64], entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn count_events(&self, group: GroupId, event_type: &str) -> CrimeResult<i64> {
        Ok(self.conn().query_row(
            "SELECT COUNT(*) FROM event_log WHERE group_id = ?1 AND event_type = ?2",
            params![group as i64, event_type],
            |r| r.get(0),
        )?)
    }
}

impl EventJournal for SqliteStore {
    fn append(&self, entry: &EventLogEntry) -> CrimeResult<()> {
        self.conn().execute(
            "INSERT INTO event_log (group_id, actor_id, at, subsystem, event_type, payload)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                entry.group as i64,
                entry.actor.map(|a| a as i64),
                entry.at,
                entry.subsystem,
                entry.event_type,
                entry.payload,
            ],
        )?;
        Ok(())
    }
}
