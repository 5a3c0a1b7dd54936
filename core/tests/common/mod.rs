//! Headless wiring shared by the integration tests.
//!
//! `SimHarness` builds a full engine over an in-memory store, a manual
//! clock and a manual scheduler, and records everything handed to the
//! presenter and the notifier.

#![allow(dead_code)]

use crime_core::{
    clock::{Clock, ManualClock},
    collaborator::{Presenter, ReleaseNotifier},
    config::EngineConfig,
    engine::{CrimeEngine, EngineDeps},
    error::CrimeResult,
    outcome::{BailQuote, CrimeChoice, JailbreakAttempt, JailbreakOutcome, ResolutionResult},
    resolution_subsystem::AttemptRequest,
    scenario_registry::ScenarioRegistry,
    scheduler::{ManualScheduler, Scheduler},
    store::SqliteStore,
    types::{ActorId, ChannelRef, Credits, GroupId, MemberKey, Timestamp},
};
use std::sync::{Arc, Mutex, PoisonError};

/// Everything the presenter was given, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Presented {
    Resolution(MemberKey, ResolutionResult),
    JailbreakAttempt(MemberKey, JailbreakAttempt),
    JailbreakOutcome(MemberKey, JailbreakOutcome),
    BailQuote(MemberKey, BailQuote),
}

#[derive(Default)]
pub struct RecordingPresenter {
    seen: Mutex<Vec<Presented>>,
}

impl RecordingPresenter {
    pub fn take(&self) -> Vec<Presented> {
        std::mem::take(&mut *self.seen.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&self, item: Presented) {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).push(item);
    }
}

impl Presenter for RecordingPresenter {
    fn resolution(&self, member: MemberKey, result: &ResolutionResult) {
        self.push(Presented::Resolution(member, result.clone()));
    }

    fn jailbreak_attempt(&self, member: MemberKey, attempt: &JailbreakAttempt) {
        self.push(Presented::JailbreakAttempt(member, attempt.clone()));
    }

    fn jailbreak_outcome(&self, member: MemberKey, outcome: &JailbreakOutcome) {
        self.push(Presented::JailbreakOutcome(member, outcome.clone()));
    }

    fn bail_quote(&self, member: MemberKey, quote: &BailQuote) {
        self.push(Presented::BailQuote(member, quote.clone()));
    }
}

/// Release notifications as (member, channel, time delivered).
pub struct RecordingNotifier {
    clock: Arc<dyn Clock>,
    sent:  Mutex<Vec<(MemberKey, Option<ChannelRef>, Timestamp)>>,
}

impl RecordingNotifier {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock, sent: Mutex::new(Vec::new()) }
    }

    pub fn sent(&self) -> Vec<(MemberKey, Option<ChannelRef>, Timestamp)> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl ReleaseNotifier for RecordingNotifier {
    fn notify_release(&self, member: MemberKey, channel: Option<ChannelRef>) -> CrimeResult<()> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((member, channel, self.clock.now()));
        Ok(())
    }
}

pub struct SimHarness {
    pub engine:    CrimeEngine,
    pub store:     Arc<SqliteStore>,
    pub clock:     Arc<ManualClock>,
    pub scheduler: Arc<ManualScheduler>,
    pub presenter: Arc<RecordingPresenter>,
    pub notifier:  Arc<RecordingNotifier>,
}

impl SimHarness {
    pub const GROUP: GroupId = 1;
    pub const START: Timestamp = 1_700_000_000;

    pub fn new(seed: u64) -> CrimeResult<Self> {
        Self::with_config(seed, EngineConfig::default())
    }

    pub fn with_config(seed: u64, config: EngineConfig) -> CrimeResult<Self> {
        let store = Arc::new(SqliteStore::in_memory()?);
        let clock = Arc::new(ManualClock::new(Self::START));
        let scheduler = Arc::new(ManualScheduler::new(clock.clone()));
        let presenter = Arc::new(RecordingPresenter::default());
        let notifier = Arc::new(RecordingNotifier::new(clock.clone()));

        let deps = EngineDeps::with_sqlite(
            store.clone(),
            presenter.clone(),
            notifier.clone(),
            scheduler.clone() as Arc<dyn Scheduler>,
            clock.clone(),
        );
        let engine = CrimeEngine::new(config, ScenarioRegistry::builtin()?, seed, deps)?;
        Ok(Self { engine, store, clock, scheduler, presenter, notifier })
    }

    pub fn member(actor: ActorId) -> MemberKey {
        MemberKey::new(Self::GROUP, actor)
    }

    pub fn fund(&self, actor: ActorId, credits: Credits) -> CrimeResult<()> {
        self.store.set_balance(Self::member(actor), credits)
    }

    pub fn balance(&self, actor: ActorId) -> CrimeResult<Credits> {
        self.engine.balance(Self::member(actor))
    }

    /// Move the clock forward and fire whatever fell due. Returns how many fired.
    pub fn advance(&self, secs: i64) -> usize {
        self.clock.advance(secs);
        self.scheduler.run_due()
    }

    pub fn attempt(&self, actor: ActorId, crime: &str, target: Option<ActorId>) -> CrimeResult<ResolutionResult> {
        self.engine.attempt_crime(AttemptRequest {
            member:  Self::member(actor),
            choice:  CrimeChoice::named(crime),
            target,
            channel: Some(100),
        })
    }

    pub fn attempt_random(&self, actor: ActorId) -> CrimeResult<ResolutionResult> {
        self.engine.attempt_crime(AttemptRequest {
            member:  Self::member(actor),
            choice:  CrimeChoice::Random,
            target:  None,
            channel: Some(100),
        })
    }
}
