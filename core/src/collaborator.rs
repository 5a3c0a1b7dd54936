//! Collaborator interfaces — the engine's only view of the outside world.
//!
//! RULE: The engine never formats text, stores currency, or talks to a
//! chat platform. It calls these traits. `store::SqliteStore` implements
//! the persistent ones; the integration tests bring recording doubles.

use crate::{
    config::GuildCrimeSettings,
    error::CrimeResult,
    event::EventLogEntry,
    outcome::{BailQuote, JailbreakAttempt, JailbreakOutcome, ResolutionResult},
    record::MemberCriminalRecord,
    types::{ActorId, ChannelRef, Credits, GroupId, MemberKey},
};

/// Currency accounts, one per member.
pub trait Ledger: Send + Sync {
    fn balance(&self, member: MemberKey) -> CrimeResult<Credits>;

    fn can_spend(&self, member: MemberKey, amount: Credits) -> CrimeResult<bool> {
        Ok(self.balance(member)? >= amount)
    }

    /// Returns the new balance.
    fn deposit(&self, member: MemberKey, amount: Credits) -> CrimeResult<Credits>;

    /// Returns the new balance. Fails with `InsufficientFunds` and leaves
    /// the balance untouched when `amount` exceeds it.
    fn withdraw(&self, member: MemberKey, amount: Credits) -> CrimeResult<Credits>;

    fn currency_name(&self, group: GroupId) -> CrimeResult<String>;
}

/// Withdraw up to `amount`, never below zero. Returns what was taken.
pub fn withdraw_capped(ledger: &dyn Ledger, member: MemberKey, amount: Credits) -> CrimeResult<Credits> {
    let taken = amount.min(ledger.balance(member)?).max(0);
    if taken > 0 {
        ledger.withdraw(member, taken)?;
    }
    Ok(taken)
}

/// Apply a signed delta: positive deposits, negative withdraws capped at
/// the balance. Returns the delta actually applied.
pub fn apply_credits_delta(ledger: &dyn Ledger, member: MemberKey, delta: Credits) -> CrimeResult<Credits> {
    if delta > 0 {
        ledger.deposit(member, delta)?;
        Ok(delta)
    } else if delta < 0 {
        Ok(-withdraw_capped(ledger, member, -delta)?)
    } else {
        Ok(0)
    }
}

/// Durable per-group settings and per-member records.
pub trait ConfigStore: Send + Sync {
    /// None until the group's settings are first written.
    fn group_settings(&self, group: GroupId) -> CrimeResult<Option<GuildCrimeSettings>>;

    fn set_group_settings(&self, group: GroupId, settings: &GuildCrimeSettings) -> CrimeResult<()>;

    /// Default record on first access; records are never deleted.
    fn member_record(&self, member: MemberKey) -> CrimeResult<MemberCriminalRecord>;

    fn save_member_record(&self, member: MemberKey, record: &MemberCriminalRecord) -> CrimeResult<()>;

    /// Read, mutate and write back as one transaction. If `f` fails nothing
    /// is written. Returns the record as saved.
    fn mutate_member_record(
        &self,
        member: MemberKey,
        f: &mut dyn FnMut(&mut MemberCriminalRecord) -> CrimeResult<()>,
    ) -> CrimeResult<MemberCriminalRecord>;

    fn group_member_records(&self, group: GroupId) -> CrimeResult<Vec<(ActorId, MemberCriminalRecord)>>;
}

/// Perks purchased elsewhere (a shop, an admin grant).
pub trait Inventory: Send + Sync {
    fn has_perk(&self, member: MemberKey, perk: &str) -> CrimeResult<bool>;
}

/// Outbound structured outcomes. Rendering is entirely the presenter's job.
pub trait Presenter: Send + Sync {
    fn resolution(&self, member: MemberKey, result: &ResolutionResult);
    fn jailbreak_attempt(&self, member: MemberKey, attempt: &JailbreakAttempt);
    fn jailbreak_outcome(&self, member: MemberKey, outcome: &JailbreakOutcome);
    fn bail_quote(&self, member: MemberKey, quote: &BailQuote);
}

/// Delivers "you are free" messages. Channel first; the DM fallback is
/// the implementation's concern.
pub trait ReleaseNotifier: Send + Sync {
    fn notify_release(&self, member: MemberKey, channel: Option<ChannelRef>) -> CrimeResult<()>;
}

/// Append-only audit log.
pub trait EventJournal: Send + Sync {
    fn append(&self, entry: &EventLogEntry) -> CrimeResult<()>;
}

