//! Release notifications — "your sentence is over" reminders.
//!
//! RULES:
//!   - At most one pending notification per member. Scheduling cancels
//!     whatever was pending first.
//!   - The pending map is only mutated under the member's actor lock.
//!     Callers of `reschedule` and `cancel` already hold it; `fire` takes it.
//!   - On fire, the record is re-read. A sentence that was extended or a
//!     member who opted out gets nothing.

use crate::{
    clock::Clock,
    collaborator::{ConfigStore, EventJournal, ReleaseNotifier},
    error::CrimeResult,
    event::{CrimeEvent, EventLogEntry},
    locks::ActorLocks,
    scheduler::{ScheduleHandle, Scheduler},
    types::MemberKey,
};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError, Weak},
};
use uuid::Uuid;

struct PendingNotification {
    token:  Uuid,
    handle: ScheduleHandle,
}

pub struct NotificationSubsystem {
    scheduler: Arc<dyn Scheduler>,
    store:     Arc<dyn ConfigStore>,
    notifier:  Arc<dyn ReleaseNotifier>,
    journal:   Arc<dyn EventJournal>,
    clock:     Arc<dyn Clock>,
    locks:     Arc<ActorLocks>,
    pending:   Mutex<HashMap<MemberKey, PendingNotification>>,
}

impl NotificationSubsystem {
    pub fn new(
        scheduler: Arc<dyn Scheduler>,
        store: Arc<dyn ConfigStore>,
        notifier: Arc<dyn ReleaseNotifier>,
        journal: Arc<dyn EventJournal>,
        clock: Arc<dyn Clock>,
        locks: Arc<ActorLocks>,
    ) -> Arc<Self> {
        Arc::new(Self {
            scheduler,
            store,
            notifier,
            journal,
            clock,
            locks,
            pending: Mutex::new(HashMap::new()),
        })
    }

    /// Cancel any pending notification for `member` and schedule a new one
    /// `delay_secs` from now. Caller holds the member's lock.
    pub fn reschedule(self: &Arc<Self>, member: MemberKey, delay_secs: u64) {
        self.cancel(member);

        let token = Uuid::new_v4();
        // Weak, so queued actions never keep the subsystem alive.
        let this: Weak<Self> = Arc::downgrade(self);
        let handle = self.scheduler.schedule(
            delay_secs,
            Box::new(move || {
                if let Some(this) = this.upgrade() {
                    if let Err(e) = this.fire(member, token) {
                        log::warn!("release notification for {member} failed: {e}");
                    }
                }
            }),
        );
        log::debug!("release notification for {member} scheduled in {delay_secs}s");
        self.pending_map().insert(member, PendingNotification { token, handle });
    }

    /// Cancel the pending notification, if any. Idempotent.
    /// Caller holds the member's lock.
    pub fn cancel(&self, member: MemberKey) -> bool {
        match self.pending_map().remove(&member) {
            Some(old) => {
                old.handle.cancel();
                log::debug!("release notification for {member} cancelled");
                true
            }
            None => false,
        }
    }

    pub fn has_pending(&self, member: MemberKey) -> bool {
        self.pending_map().contains_key(&member)
    }

    pub fn pending_handle(&self, member: MemberKey) -> Option<ScheduleHandle> {
        self.pending_map().get(&member).map(|p| p.handle.clone())
    }

    fn pending_map(&self) -> std::sync::MutexGuard<'_, HashMap<MemberKey, PendingNotification>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fire(&self, member: MemberKey, token: Uuid) -> CrimeResult<()> {
        self.locks.with_lock(member, || {
            let current = {
                let mut pending = self.pending_map();
                match pending.get(&member) {
                    Some(p) if p.token == token => {
                        pending.remove(&member);
                        true
                    }
                    _ => false,
                }
            };
            if !current {
                // Superseded by a later reschedule or cancel.
                return Ok(());
            }

            let now = self.clock.now();
            let record = self.store.member_record(member)?;
            if record.jail_remaining(now) > 0 {
                log::debug!("{member} still jailed at notification time, skipping");
                return Ok(());
            }
            if !record.notify_on_release {
                return Ok(());
            }

            self.notifier.notify_release(member, record.jail_channel)?;
            self.journal.append(&EventLogEntry::for_member(
                "notification",
                member,
                now,
                &CrimeEvent::ReleaseNotified { channel: record.jail_channel },
            )?)?;
            log::info!("{member} notified of release");
            Ok(())
        })
    }
}
