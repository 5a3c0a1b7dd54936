//! Incarceration state machine — sentences, bail, escapes.
//!
//! States: Free (`jail_until <= now`) and Jailed (`jail_until > now`).
//!
//! RULES:
//!   - Every method here runs with the member's actor lock already held
//!     and works on a record the caller loaded. The caller saves it.
//!   - Every path into Jailed goes through `commit`, so the jail-reducer
//!     perk is applied exactly once per sentence.
//!   - Every path out of Jailed early goes through `release`, which clears
//!     the jailbreak flag and cancels the pending notification.
//!   - A jailbreak is finished at most once, and only against the sentence
//!     it was begun on. `commit` and `release` drop any pending attempt.

use crate::{
    clock::Clock,
    collaborator::{apply_credits_delta, EventJournal, Inventory, Ledger},
    config::{EngineConfig, GuildCrimeSettings},
    error::{CrimeError, CrimeResult, ValidationError},
    event::{CrimeEvent, EventLogEntry, ReleaseReason},
    modifier_pipeline::{apply_events, clamp_chance, draw_jailbreak_events},
    notification_subsystem::NotificationSubsystem,
    outcome::{BailQuote, JailbreakAttempt, JailbreakOutcome, JailbreakResolution},
    record::{MemberCriminalRecord, PendingJailbreak},
    rng::RandomSource,
    scenario_registry::ScenarioRegistry,
    types::{ChannelRef, Credits, MemberKey},
};
use std::sync::Arc;

const SUBSYSTEM: &str = "incarceration";

pub struct IncarcerationSubsystem {
    ledger:        Arc<dyn Ledger>,
    inventory:     Arc<dyn Inventory>,
    journal:       Arc<dyn EventJournal>,
    clock:         Arc<dyn Clock>,
    notifications: Arc<NotificationSubsystem>,
    config:        Arc<EngineConfig>,
}

/// Bail price for `remaining_secs` left on the sentence.
pub fn bail_cost(multiplier: f64, remaining_secs: i64) -> Credits {
    (multiplier * remaining_secs as f64 / 60.0).round() as Credits
}

impl IncarcerationSubsystem {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        inventory: Arc<dyn Inventory>,
        journal: Arc<dyn EventJournal>,
        clock: Arc<dyn Clock>,
        notifications: Arc<NotificationSubsystem>,
        config: Arc<EngineConfig>,
    ) -> Self {
        Self { ledger, inventory, journal, clock, notifications, config }
    }

    fn log_event(&self, member: MemberKey, event: CrimeEvent) -> CrimeResult<()> {
        let entry = EventLogEntry::for_member(SUBSYSTEM, member, self.clock.now(), &event)?;
        self.journal.append(&entry)
    }

    /// The perk counts whether it sits on the record or in the inventory.
    pub fn has_jail_reducer(&self, member: MemberKey, record: &MemberCriminalRecord) -> CrimeResult<bool> {
        let perk = &self.config.jail_reducer_perk;
        Ok(record.has_perk(perk) || self.inventory.has_perk(member, perk)?)
    }

    // ── Transitions ────────────────────────────────────────────────

    /// Sentence `member` to `duration_secs`. Returns the seconds actually
    /// imposed after the jail-reducer perk.
    pub fn commit(
        &self,
        member: MemberKey,
        record: &mut MemberCriminalRecord,
        duration_secs: i64,
        channel: Option<ChannelRef>,
    ) -> CrimeResult<i64> {
        let reducer = self.has_jail_reducer(member, record)?;
        let sentence = if reducer {
            (duration_secs as f64 * self.config.jail_reducer_factor).floor() as i64
        } else {
            duration_secs
        }
        .max(0);

        let now = self.clock.now();
        record.jail_until = now + sentence;
        record.attempted_jailbreak = false;
        record.pending_jailbreak = None;
        if channel.is_some() {
            record.jail_channel = channel;
        }

        self.notifications.cancel(member);
        if record.notify_on_release && sentence > 0 {
            self.notifications.reschedule(member, sentence as u64);
        }

        self.log_event(member, CrimeEvent::Jailed {
            until:           record.jail_until,
            duration_secs:   sentence,
            reducer_applied: reducer,
            channel,
        })?;
        log::info!("{member} jailed for {sentence}s (reducer: {reducer})");
        Ok(sentence)
    }

    pub fn release(
        &self,
        member: MemberKey,
        record: &mut MemberCriminalRecord,
        reason: ReleaseReason,
    ) -> CrimeResult<()> {
        record.jail_until = 0;
        record.attempted_jailbreak = false;
        record.pending_jailbreak = None;
        self.notifications.cancel(member);
        self.log_event(member, CrimeEvent::Released { reason })?;
        log::info!("{member} released ({reason:?})");
        Ok(())
    }

    /// Lengthen the sentence after a failed escape. Returns the seconds added.
    /// The jailbreak flag stays set.
    pub fn extend(&self, member: MemberKey, record: &mut MemberCriminalRecord) -> CrimeResult<i64> {
        let now = self.clock.now();
        let remaining = record.jail_remaining(now);
        let added = (remaining as f64 * self.config.jailbreak_extension_factor).round() as i64;
        record.jail_until = now + remaining + added;

        if record.notify_on_release {
            self.notifications.reschedule(member, record.jail_remaining(now) as u64);
        }
        log::info!("{member} sentence extended by {added}s");
        Ok(added)
    }

    pub fn remaining(&self, record: &MemberCriminalRecord) -> i64 {
        record.jail_remaining(self.clock.now())
    }

    // ── Bail ───────────────────────────────────────────────────────

    pub fn quote_bail(
        &self,
        member: MemberKey,
        record: &MemberCriminalRecord,
        settings: &GuildCrimeSettings,
    ) -> CrimeResult<BailQuote> {
        let remaining = self.remaining(record);
        if remaining <= 0 {
            return Err(CrimeError::NotJailed);
        }
        if !settings.allow_bail {
            return Err(CrimeError::BailDisabled);
        }
        let cost = bail_cost(settings.bail_cost_multiplier, remaining);
        let balance = self.ledger.balance(member)?;
        Ok(BailQuote {
            cost,
            remaining_secs:       remaining,
            balance,
            can_afford:           balance >= cost,
            jail_reducer_applied: self.has_jail_reducer(member, record)?,
            currency_name:        self.ledger.currency_name(member.group)?,
        })
    }

    /// All or nothing: either the full cost is withdrawn and the member is
    /// released, or nothing changes.
    pub fn pay_bail(
        &self,
        member: MemberKey,
        record: &mut MemberCriminalRecord,
        settings: &GuildCrimeSettings,
    ) -> CrimeResult<Credits> {
        let quote = self.quote_bail(member, record, settings)?;
        if !quote.can_afford {
            log::warn!("{member} cannot afford bail of {}", quote.cost);
            return Err(CrimeError::InsufficientFunds {
                needed:    quote.cost,
                available: quote.balance,
            });
        }
        self.ledger.withdraw(member, quote.cost)?;
        record.total_bail_paid += quote.cost;
        self.log_event(member, CrimeEvent::BailPaid {
            cost:           quote.cost,
            remaining_secs: quote.remaining_secs,
        })?;
        self.release(member, record, ReleaseReason::Bail)?;
        Ok(quote.cost)
    }

    // ── Jailbreak ──────────────────────────────────────────────────

    /// Check, mark the flag, fix the scenario and events, and settle their
    /// credits. The flag is set before anything is drawn, so a concurrent
    /// attempt is rejected even while this one is being narrated.
    pub fn begin_jailbreak(
        &self,
        member: MemberKey,
        record: &mut MemberCriminalRecord,
        registry: &ScenarioRegistry,
        scenario_rng: &mut dyn RandomSource,
        events_rng: &mut dyn RandomSource,
        operation: u64,
    ) -> CrimeResult<JailbreakAttempt> {
        let remaining = self.remaining(record);
        if remaining <= 0 {
            return Err(CrimeError::NotJailed);
        }
        if record.attempted_jailbreak {
            return Err(CrimeError::AlreadyAttempted);
        }
        record.attempted_jailbreak = true;
        record.pending_jailbreak = Some(PendingJailbreak {
            operation,
            jail_until: record.jail_until,
        });

        let scenario = registry.pick_jailbreak(scenario_rng)?.clone();
        let events = draw_jailbreak_events(&scenario.events, events_rng);
        // Jailbreak events only move the chance and the balance.
        let effects = apply_events(scenario.base_chance, &events);
        let credits_delta = apply_credits_delta(self.ledger.as_ref(), member, effects.credits_delta)?;

        self.log_event(member, CrimeEvent::JailbreakAttempted {
            scenario: scenario.name.clone(),
            credits_delta,
        })?;
        log::debug!(
            "{member} attempts jailbreak '{}' at {:.2}",
            scenario.name,
            effects.final_chance
        );

        Ok(JailbreakAttempt {
            member,
            events,
            final_chance:   effects.final_chance,
            credits_delta,
            remaining_secs: remaining,
            currency_name:  self.ledger.currency_name(member.group)?,
            operation,
            scenario,
        })
    }

    /// Roll the attempt begun by `begin_jailbreak` and either release or
    /// extend. An attempt that was already finished, or whose sentence has
    /// since been replaced or ended early, is refused without a roll.
    pub fn finish_jailbreak(
        &self,
        member: MemberKey,
        record: &mut MemberCriminalRecord,
        attempt: &JailbreakAttempt,
        roll_rng: &mut dyn RandomSource,
    ) -> CrimeResult<JailbreakOutcome> {
        let expected = PendingJailbreak {
            operation:  attempt.operation,
            jail_until: record.jail_until,
        };
        if record.pending_jailbreak != Some(expected) {
            log::warn!("{member} has no pending jailbreak for operation {}", attempt.operation);
            return Err(if self.remaining(record) <= 0 {
                CrimeError::NotJailed
            } else {
                CrimeError::AlreadyAttempted
            });
        }
        record.pending_jailbreak = None;

        let credits_delta = attempt.credits_delta;
        let final_chance = clamp_chance(attempt.final_chance);

        let (resolution, roll) = if self.remaining(record) <= 0 {
            (JailbreakResolution::AlreadyFree, None)
        } else {
            let roll = roll_rng.next_f64();
            if roll < final_chance {
                self.release(member, record, ReleaseReason::Escape)?;
                (JailbreakResolution::Escaped, Some(roll))
            } else {
                let added = self.extend(member, record)?;
                let resolution = JailbreakResolution::Extended {
                    added_secs:    added,
                    new_remaining: self.remaining(record),
                };
                (resolution, Some(roll))
            }
        };

        let added_secs = match resolution {
            JailbreakResolution::Extended { added_secs, .. } => added_secs,
            _ => 0,
        };
        self.log_event(member, CrimeEvent::JailbreakResolved {
            scenario: attempt.scenario.name.clone(),
            escaped: matches!(resolution, JailbreakResolution::Escaped),
            added_secs,
            roll,
        })?;

        Ok(JailbreakOutcome {
            scenario_name: attempt.scenario.name.clone(),
            resolution,
            roll,
            final_chance,
            credits_delta,
            currency_name: attempt.currency_name.clone(),
        })
    }

    /// Administrative sentence through the normal commit path.
    pub fn manual_jail(
        &self,
        member: MemberKey,
        record: &mut MemberCriminalRecord,
        minutes: i64,
        channel: Option<ChannelRef>,
    ) -> CrimeResult<i64> {
        if minutes <= 0 {
            return Err(ValidationError::NonPositiveJailTime(minutes).into());
        }
        self.commit(member, record, minutes * 60, channel)
    }
}
