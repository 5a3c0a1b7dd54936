//! The crime engine — the single entry point callers use.
//!
//! OPERATION SHAPE (every mutating operation, no exceptions):
//!   1. Take the actor lock (both locks, in key order, for targeted crimes)
//!   2. Load the record(s) from the `ConfigStore`
//!   3. Run the subsystem
//!   4. Save the record(s)
//!   5. Release the lock, then hand the outcome to the `Presenter`
//!
//! RULES:
//!   - All randomness flows through the RngBank, one fresh set of streams
//!     per operation number.
//!   - All state changes are recorded in the event journal.
//!   - The engine never renders text.

use crate::{
    clock::Clock,
    collaborator::{ConfigStore, EventJournal, Inventory, Ledger, Presenter, ReleaseNotifier},
    command::AdminCommand,
    config::{EngineConfig, GuildCrimeSettings, RANDOM_CRIME_KEY},
    error::{CrimeError, CrimeResult},
    event::{CrimeEvent, EventLogEntry, ReleaseReason},
    incarceration_subsystem::IncarcerationSubsystem,
    leaderboard::{leaderboard, LeaderboardSection},
    locks::ActorLocks,
    notification_subsystem::NotificationSubsystem,
    outcome::{BailQuote, CrimeStats, CriminalStatus, JailbreakAttempt, JailbreakOutcome, ResolutionResult},
    record::MemberCriminalRecord,
    resolution_subsystem::{AttemptRequest, ResolutionSubsystem},
    rng::{RngBank, StreamSlot},
    scenario_registry::ScenarioRegistry,
    scheduler::Scheduler,
    store::SqliteStore,
    types::{ChannelRef, Credits, GroupId, MemberKey},
};
use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, PoisonError,
    },
};

/// Everything the engine talks to.
pub struct EngineDeps {
    pub store:     Arc<dyn ConfigStore>,
    pub ledger:    Arc<dyn Ledger>,
    pub inventory: Arc<dyn Inventory>,
    pub journal:   Arc<dyn EventJournal>,
    pub presenter: Arc<dyn Presenter>,
    pub notifier:  Arc<dyn ReleaseNotifier>,
    pub scheduler: Arc<dyn Scheduler>,
    pub clock:     Arc<dyn Clock>,
}

impl EngineDeps {
    /// Wire one SQLite store into all four persistent roles.
    pub fn with_sqlite(
        store: Arc<SqliteStore>,
        presenter: Arc<dyn Presenter>,
        notifier: Arc<dyn ReleaseNotifier>,
        scheduler: Arc<dyn Scheduler>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store: store.clone(),
            ledger: store.clone(),
            inventory: store.clone(),
            journal: store,
            presenter,
            notifier,
            scheduler,
            clock,
        }
    }
}

pub struct CrimeEngine {
    config:        Arc<EngineConfig>,
    registry:      Arc<ScenarioRegistry>,
    rngs:          RngBank,
    operations:    AtomicU64,
    locks:         Arc<ActorLocks>,
    settings_lock: Mutex<()>,
    store:         Arc<dyn ConfigStore>,
    ledger:        Arc<dyn Ledger>,
    inventory:     Arc<dyn Inventory>,
    journal:       Arc<dyn EventJournal>,
    presenter:     Arc<dyn Presenter>,
    clock:         Arc<dyn Clock>,
    notifications: Arc<NotificationSubsystem>,
    incarceration: Arc<IncarcerationSubsystem>,
    resolution:    ResolutionSubsystem,
}

impl CrimeEngine {
    pub fn new(
        config: EngineConfig,
        registry: ScenarioRegistry,
        seed: u64,
        deps: EngineDeps,
    ) -> CrimeResult<Self> {
        config.validate()?;
        registry.validate()?;
        let config = Arc::new(config);
        let registry = Arc::new(registry);
        let locks = Arc::new(ActorLocks::new());

        let notifications = NotificationSubsystem::new(
            deps.scheduler,
            deps.store.clone(),
            deps.notifier,
            deps.journal.clone(),
            deps.clock.clone(),
            locks.clone(),
        );
        let incarceration = Arc::new(IncarcerationSubsystem::new(
            deps.ledger.clone(),
            deps.inventory.clone(),
            deps.journal.clone(),
            deps.clock.clone(),
            notifications.clone(),
            config.clone(),
        ));
        let resolution = ResolutionSubsystem::new(
            deps.ledger.clone(),
            deps.journal.clone(),
            deps.clock.clone(),
            registry.clone(),
            incarceration.clone(),
            config.clone(),
        );

        log::info!("crime engine ready (seed {seed})");
        Ok(Self {
            config,
            registry,
            rngs: RngBank::new(seed),
            operations: AtomicU64::new(0),
            locks,
            settings_lock: Mutex::new(()),
            store: deps.store,
            ledger: deps.ledger,
            inventory: deps.inventory,
            journal: deps.journal,
            presenter: deps.presenter,
            clock: deps.clock,
            notifications,
            incarceration,
            resolution,
        })
    }

    fn next_operation(&self) -> u64 {
        self.operations.fetch_add(1, Ordering::SeqCst)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &ScenarioRegistry {
        &self.registry
    }

    pub fn notifications(&self) -> &NotificationSubsystem {
        &self.notifications
    }

    /// The group's settings, or the configured defaults before the first write.
    pub fn settings(&self, group: GroupId) -> CrimeResult<GuildCrimeSettings> {
        Ok(self
            .store
            .group_settings(group)?
            .unwrap_or_else(|| self.config.default_settings.clone()))
    }

    // ── Crimes ─────────────────────────────────────────────────────

    pub fn attempt_crime(&self, request: AttemptRequest) -> CrimeResult<ResolutionResult> {
        let member = request.member;
        let settings = self.settings(member.group)?;
        let operation = self.next_operation();

        let result = match request.target {
            Some(target) => {
                let victim = MemberKey::new(member.group, target);
                self.locks.with_pair(member, victim, || {
                    self.attempt_locked(&request, &settings, operation)
                })
            }
            None => self
                .locks
                .with_lock(member, || self.attempt_locked(&request, &settings, operation)),
        }?;

        self.presenter.resolution(member, &result);
        Ok(result)
    }

    fn attempt_locked(
        &self,
        request: &AttemptRequest,
        settings: &GuildCrimeSettings,
        operation: u64,
    ) -> CrimeResult<ResolutionResult> {
        let member = request.member;
        let mut record = self.store.member_record(member)?;
        let params = self
            .resolution
            .check(request, settings, &record, &self.rngs, operation)?;

        match params.target {
            Some(target) => {
                let victim = MemberKey::new(member.group, target);
                let mut victim_record = self.store.member_record(victim)?;
                let result = self.resolution.resolve(
                    request,
                    params,
                    settings,
                    &mut record,
                    Some(&mut victim_record),
                    &self.rngs,
                    operation,
                )?;
                self.store.save_member_record(member, &record)?;
                self.store.save_member_record(victim, &victim_record)?;
                Ok(result)
            }
            None => {
                let result = self.resolution.resolve(
                    request, params, settings, &mut record, None, &self.rngs, operation,
                )?;
                self.store.save_member_record(member, &record)?;
                Ok(result)
            }
        }
    }

    // ── Status & statistics ────────────────────────────────────────

    pub fn status(&self, member: MemberKey) -> CrimeResult<CriminalStatus> {
        let settings = self.settings(member.group)?;
        let record = self.store.member_record(member)?;
        let now = self.clock.now();

        let mut cooldowns = BTreeMap::new();
        for (crime, config) in settings.crime_options.iter().filter(|(_, c)| c.enabled) {
            let remaining = record.cooldown_remaining(crime, config.cooldown_secs, now);
            if remaining > 0 {
                cooldowns.insert(crime.clone(), remaining);
            }
        }
        if settings.random_enabled {
            let remaining = record.cooldown_remaining(RANDOM_CRIME_KEY, settings.random_cooldown_secs, now);
            if remaining > 0 {
                cooldowns.insert(RANDOM_CRIME_KEY.to_string(), remaining);
            }
        }

        let mut perks: Vec<String> = record.purchased_perks.iter().cloned().collect();
        for perk in [&self.config.jail_reducer_perk, &self.config.notify_perk] {
            if !record.has_perk(perk) && self.inventory.has_perk(member, perk)? {
                perks.push(perk.clone());
            }
        }
        perks.sort();

        Ok(CriminalStatus {
            jailed:              record.is_jailed(now),
            jail_until:          record.jail_until,
            remaining_secs:      record.jail_remaining(now),
            attempted_jailbreak: record.attempted_jailbreak,
            cooldowns,
            perks,
            notify_on_release:   record.notify_on_release,
            last_target:         record.last_target,
            current_streak:      record.current_streak,
            streak_multiplier:   record.streak_multiplier,
            stats:               CrimeStats::from(&record),
        })
    }

    pub fn stats(&self, member: MemberKey) -> CrimeResult<CrimeStats> {
        Ok(CrimeStats::from(&self.store.member_record(member)?))
    }

    pub fn leaderboard(&self, group: GroupId) -> CrimeResult<Vec<LeaderboardSection>> {
        Ok(leaderboard(&self.store.group_member_records(group)?))
    }

    // ── Bail ───────────────────────────────────────────────────────

    pub fn quote_bail(&self, member: MemberKey) -> CrimeResult<BailQuote> {
        let settings = self.settings(member.group)?;
        let quote = self.locks.with_lock(member, || {
            let record = self.store.member_record(member)?;
            self.incarceration.quote_bail(member, &record, &settings)
        })?;
        self.presenter.bail_quote(member, &quote);
        Ok(quote)
    }

    /// Returns the cost paid.
    pub fn pay_bail(&self, member: MemberKey) -> CrimeResult<Credits> {
        let settings = self.settings(member.group)?;
        self.locks.with_lock(member, || {
            let mut record = self.store.member_record(member)?;
            let cost = self.incarceration.pay_bail(member, &mut record, &settings)?;
            self.store.save_member_record(member, &record)?;
            Ok(cost)
        })
    }

    // ── Jailbreak ──────────────────────────────────────────────────

    /// First half of an escape: checks, sets the flag, fixes scenario and
    /// events and applies their credits. The flag and the pending attempt
    /// are saved before this returns.
    pub fn begin_jailbreak(&self, member: MemberKey) -> CrimeResult<JailbreakAttempt> {
        let operation = self.next_operation();
        let attempt = self.locks.with_lock(member, || {
            let mut record = self.store.member_record(member)?;
            let mut scenario_rng = self.rngs.for_operation(StreamSlot::Scenario, operation);
            let mut events_rng = self.rngs.for_operation(StreamSlot::Events, operation);
            let attempt = self.incarceration.begin_jailbreak(
                member,
                &mut record,
                &self.registry,
                &mut scenario_rng,
                &mut events_rng,
                operation,
            )?;
            self.store.save_member_record(member, &record)?;
            Ok::<_, CrimeError>(attempt)
        })?;
        self.presenter.jailbreak_attempt(member, &attempt);
        Ok(attempt)
    }

    /// Second half: roll, release or extension. Each attempt finishes once.
    pub fn finish_jailbreak(&self, attempt: &JailbreakAttempt) -> CrimeResult<JailbreakOutcome> {
        let member = attempt.member;
        let outcome = self.locks.with_lock(member, || {
            let mut record = self.store.member_record(member)?;
            let mut roll_rng = self.rngs.for_operation(StreamSlot::Jailbreak, attempt.operation);
            let outcome = self
                .incarceration
                .finish_jailbreak(member, &mut record, attempt, &mut roll_rng)?;
            self.store.save_member_record(member, &record)?;
            Ok::<_, CrimeError>(outcome)
        })?;
        self.presenter.jailbreak_outcome(member, &outcome);
        Ok(outcome)
    }

    /// Both halves back to back, for callers with nothing to narrate.
    pub fn attempt_jailbreak(&self, member: MemberKey) -> CrimeResult<JailbreakOutcome> {
        let attempt = self.begin_jailbreak(member)?;
        self.finish_jailbreak(&attempt)
    }

    // ── Notifications ──────────────────────────────────────────────

    /// Opt in or out of release notifications. Opting in needs the
    /// notification perk, bought or granted.
    pub fn set_notify_on_release(&self, member: MemberKey, enabled: bool) -> CrimeResult<()> {
        self.locks.with_lock(member, || {
            let mut record = self.store.member_record(member)?;
            if enabled
                && !record.notify_unlocked
                && !self.inventory.has_perk(member, &self.config.notify_perk)?
            {
                return Err(CrimeError::PerkRequired(self.config.notify_perk.clone()));
            }
            record.notify_on_release = enabled;

            let remaining = self.incarceration.remaining(&record);
            if enabled && remaining > 0 {
                self.notifications.reschedule(member, remaining as u64);
            } else if !enabled {
                self.notifications.cancel(member);
            }

            self.store.save_member_record(member, &record)?;
            self.journal.append(&EventLogEntry::for_member(
                "notification",
                member,
                self.clock.now(),
                &CrimeEvent::NotifyToggled { enabled },
            )?)
        })
    }

    // ── Administration ─────────────────────────────────────────────

    pub fn apply_admin(&self, group: GroupId, command: &AdminCommand) -> CrimeResult<()> {
        if let Some(actor) = command.targets_member() {
            return self.apply_member_command(MemberKey::new(group, actor), command);
        }

        let _guard = self.settings_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut settings = self.settings(group)?;
        command.apply(&mut settings, &self.config.default_settings)?;
        self.store.set_group_settings(group, &settings)?;

        let event = match command {
            AdminCommand::AddScenario { .. } => CrimeEvent::ScenarioAdded {
                name: settings
                    .custom_scenarios
                    .last()
                    .map(|s| s.name.clone())
                    .unwrap_or_default(),
            },
            AdminCommand::RemoveScenario { name } => CrimeEvent::ScenarioRemoved {
                name: name.trim().to_lowercase(),
            },
            _ => CrimeEvent::SettingsChanged { command: command.name().to_string() },
        };
        self.journal
            .append(&EventLogEntry::for_group("admin", group, self.clock.now(), &event)?)?;
        log::info!("group {group}: {} applied", command.name());
        Ok(())
    }

    fn apply_member_command(&self, member: MemberKey, command: &AdminCommand) -> CrimeResult<()> {
        match command {
            AdminCommand::ManualJail { minutes, channel, .. } => {
                self.manual_jail(member, *minutes, *channel).map(|_| ())
            }
            AdminCommand::ReleaseMember { .. } => self.locks.with_lock(member, || {
                let mut record = self.store.member_record(member)?;
                if !record.is_jailed(self.clock.now()) {
                    return Err(CrimeError::NotJailed);
                }
                self.incarceration.release(member, &mut record, ReleaseReason::Admin)?;
                self.store.save_member_record(member, &record)
            }),
            AdminCommand::GrantPerk { perk, .. } => self.locks.with_lock(member, || {
                let notify_perk = &self.config.notify_perk;
                self.store.mutate_member_record(member, &mut |record: &mut MemberCriminalRecord| {
                    record.purchased_perks.insert(perk.clone());
                    if perk == notify_perk {
                        record.notify_unlocked = true;
                    }
                    Ok(())
                })?;
                self.journal.append(&EventLogEntry::for_member(
                    "admin",
                    member,
                    self.clock.now(),
                    &CrimeEvent::PerkGranted { perk: perk.clone() },
                )?)
            }),
            _ => Err(CrimeError::Other(anyhow::anyhow!(
                "{} is not a member command",
                command.name()
            ))),
        }
    }

    /// Administrative sentence. Returns the seconds imposed after perks.
    pub fn manual_jail(
        &self,
        member: MemberKey,
        minutes: i64,
        channel: Option<ChannelRef>,
    ) -> CrimeResult<i64> {
        self.locks.with_lock(member, || {
            let mut record = self.store.member_record(member)?;
            let sentence = self
                .incarceration
                .manual_jail(member, &mut record, minutes, channel)?;
            self.store.save_member_record(member, &record)?;
            Ok(sentence)
        })
    }

    /// Balance as the ledger reports it.
    pub fn balance(&self, member: MemberKey) -> CrimeResult<Credits> {
        self.ledger.balance(member)
    }
}
