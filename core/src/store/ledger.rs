//! Reference currency ledger and perk inventory.

use super::SqliteStore;
use crate::{
    collaborator::{Inventory, Ledger},
    error::{CrimeError, CrimeResult},
    types::{Credits, GroupId, MemberKey},
};
use rusqlite::{params, Connection, OptionalExtension};

pub const DEFAULT_CURRENCY_NAME: &str = "credits";

fn read_balance(conn: &Connection, member: MemberKey) -> CrimeResult<Credits> {
    Ok(conn
        .query_row(
            "SELECT credits FROM balance WHERE group_id = ?1 AND actor_id = ?2",
            params![member.group as i64, member.actor as i64],
            |r| r.get(0),
        )
        .optional()?
        .unwrap_or(0))
}

fn write_balance(conn: &Connection, member: MemberKey, credits: Credits) -> CrimeResult<()> {
    conn.execute(
        "INSERT INTO balance (group_id, actor_id, credits) VALUES (?1, ?2, ?3)
         ON CONFLICT(group_id, actor_id) DO UPDATE SET credits = excluded.credits",
        params![member.group as i64, member.actor as i64, credits],
    )?;
    Ok(())
}

impl SqliteStore {
    /// Overwrite a balance. Seeding helper for tests and the runner.
    pub fn set_balance(&self, member: MemberKey, credits: Credits) -> CrimeResult<()> {
        if credits < 0 {
            return Err(CrimeError::Ledger(format!("negative balance {credits} for {member}")));
        }
        write_balance(&self.conn(), member, credits)
    }

    pub fn set_currency_name(&self, group: GroupId, name: &str) -> CrimeResult<()> {
        self.conn().execute(
            "INSERT INTO currency (group_id, name) VALUES (?1, ?2)
             ON CONFLICT(group_id) DO UPDATE SET name = excluded.name",
            params![group as i64, name],
        )?;
        Ok(())
    }

    pub fn grant_perk(&self, member: MemberKey, perk: &str) -> CrimeResult<()> {
        self.conn().execute(
            "INSERT OR IGNORE INTO perk (group_id, actor_id, perk) VALUES (?1, ?2, ?3)",
            params![member.group as i64, member.actor as i64, perk],
        )?;
        Ok(())
    }
}

impl Ledger for SqliteStore {
    fn balance(&self, member: MemberKey) -> CrimeResult<Credits> {
        read_balance(&self.conn(), member)
    }

    fn deposit(&self, member: MemberKey, amount: Credits) -> CrimeResult<Credits> {
        if amount < 0 {
            return Err(CrimeError::Ledger(format!("cannot deposit negative amount {amount}")));
        }
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let next = read_balance(&tx, member)?
            .checked_add(amount)
            .ok_or_else(|| CrimeError::Ledger(format!("balance overflow for {member}")))?;
        write_balance(&tx, member, next)?;
        tx.commit()?;
        Ok(next)
    }

    fn withdraw(&self, member: MemberKey, amount: Credits) -> CrimeResult<Credits> {
        if amount < 0 {
            return Err(CrimeError::Ledger(format!("cannot withdraw negative amount {amount}")));
        }
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let available = read_balance(&tx, member)?;
        if available < amount {
            return Err(CrimeError::InsufficientFunds { needed: amount, available });
        }
        write_balance(&tx, member, available - amount)?;
        tx.commit()?;
        Ok(available - amount)
    }

    fn currency_name(&self, group: GroupId) -> CrimeResult<String> {
        Ok(self
            .conn()
            .query_row(
                "SELECT name FROM currency WHERE group_id = ?1",
                params![group as i64],
                |r| r.get(0),
            )
            .optional()?
            .unwrap_or_else(|| DEFAULT_CURRENCY_NAME.to_string()))
    }
}

impl Inventory for SqliteStore {
    fn has_perk(&self, member: MemberKey, perk: &str) -> CrimeResult<bool> {
        let found: Option<i64> = self
            .conn()
            .query_row(
                "SELECT 1 FROM perk WHERE group_id = ?1 AND actor_id = ?2 AND perk = ?3",
                params![member.group as i64, member.actor as i64, perk],
                |r| r.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}
