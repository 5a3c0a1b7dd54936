//! Crime resolution — turns one attempt into an outcome.
//!
//! ORDER (fixed; each check can reject the attempt before anything changes):
//!   1. Jail        — `InJail` while `jail_until > now`
//!   2. Cooldown    — `CooldownActive` until last attempt + cooldown
//!   3. Parameters  — crime type config, or a random scenario
//!   4. Solvency    — only under `FinePolicy::RequireSolvency`
//!
//! Past the checks the attempt always completes: cooldown stamped, events
//! drawn and their credits applied, one roll, then success or failure.
//!
//! RULE: This module never takes locks or saves records. The engine loads
//! the records under the actor lock(s), calls `resolve`, and saves them.

use crate::{
    clock::Clock,
    collaborator::{apply_credits_delta, withdraw_capped, EventJournal, Ledger},
    config::{EngineConfig, FinePolicy, GuildCrimeSettings, RANDOM_CRIME_KEY},
    error::{CrimeError, CrimeResult},
    event::{CrimeEvent, EventLogEntry},
    incarceration_subsystem::IncarcerationSubsystem,
    modifier_pipeline::{apply_events, draw_events, ModifierEvent},
    outcome::{CrimeChoice, ResolutionResult},
    record::MemberCriminalRecord,
    rng::{RandomSource, RngBank, StreamSlot},
    scenario_registry::{pick_random, Scenario, ScenarioRegistry},
    streak,
    types::{ActorId, ChannelRef, Credits, MemberKey},
};
use std::sync::Arc;

const SUBSYSTEM: &str = "resolution";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRequest {
    pub member:  MemberKey,
    pub choice:  CrimeChoice,
    pub target:  Option<ActorId>,
    pub channel: Option<ChannelRef>,
}

/// Everything the roll needs, whichever way the crime was chosen.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptParameters {
    pub crime_key:       String,
    pub scenario:        Option<Scenario>,
    pub target:          Option<ActorId>,
    pub success_rate:    f64,
    pub min_reward:      Credits,
    pub max_reward:      Credits,
    pub jail_time_secs:  u64,
    pub fine_multiplier: f64,
}

impl AttemptParameters {
    /// Fine charged on failure, before any cap.
    pub fn worst_case_fine(&self) -> Credits {
        (self.max_reward as f64 * self.fine_multiplier).floor() as Credits
    }
}

/// Success payout before target caps: `floor(base × event mult × streak mult)`.
pub fn scaled_reward(base: Credits, reward_multiplier: f64, streak_multiplier: f64) -> Credits {
    (base as f64 * reward_multiplier * streak_multiplier).floor() as Credits
}

/// The key an attempt stamps its cooldown under, and that cooldown's length.
/// None for crime types that are not configured.
pub fn cooldown_for(choice: &CrimeChoice, settings: &GuildCrimeSettings) -> Option<(String, u64)> {
    match choice {
        CrimeChoice::Named(crime) => settings
            .crime_options
            .get(crime)
            .map(|config| (crime.clone(), config.cooldown_secs)),
        CrimeChoice::Random => Some((RANDOM_CRIME_KEY.to_string(), settings.random_cooldown_secs)),
    }
}

pub struct ResolutionSubsystem {
    ledger:        Arc<dyn Ledger>,
    journal:       Arc<dyn EventJournal>,
    clock:         Arc<dyn Clock>,
    registry:      Arc<ScenarioRegistry>,
    incarceration: Arc<IncarcerationSubsystem>,
    config:        Arc<EngineConfig>,
}

impl ResolutionSubsystem {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        journal: Arc<dyn EventJournal>,
        clock: Arc<dyn Clock>,
        registry: Arc<ScenarioRegistry>,
        incarceration: Arc<IncarcerationSubsystem>,
        config: Arc<EngineConfig>,
    ) -> Self {
        Self { ledger, journal, clock, registry, incarceration, config }
    }

    /// Steps 1–4. Read-only apart from the scenario draw.
    pub fn check(
        &self,
        request: &AttemptRequest,
        settings: &GuildCrimeSettings,
        record: &MemberCriminalRecord,
        rngs: &RngBank,
        operation: u64,
    ) -> CrimeResult<AttemptParameters> {
        let now = self.clock.now();
        if record.is_jailed(now) {
            return Err(CrimeError::InJail { remaining_secs: record.jail_remaining(now) });
        }

        if let Some((key, cooldown)) = cooldown_for(&request.choice, settings) {
            let remaining = record.cooldown_remaining(&key, cooldown, now);
            if remaining > 0 {
                return Err(CrimeError::CooldownActive { crime: key, remaining_secs: remaining });
            }
        }

        let params = match &request.choice {
            CrimeChoice::Named(crime) => self.named_parameters(crime, request, settings)?,
            CrimeChoice::Random => {
                if !settings.random_enabled {
                    return Err(CrimeError::CrimeDisabled(RANDOM_CRIME_KEY.to_string()));
                }
                let scenarios = self.registry.list_scenarios(settings);
                let mut rng = rngs.for_operation(StreamSlot::Scenario, operation);
                let scenario = (*pick_random(&scenarios, &mut rng)?).clone();
                AttemptParameters {
                    crime_key:       RANDOM_CRIME_KEY.to_string(),
                    target:          None,
                    success_rate:    scenario.success_rate,
                    min_reward:      scenario.min_reward,
                    max_reward:      scenario.max_reward,
                    jail_time_secs:  scenario.jail_time_secs,
                    fine_multiplier: scenario.fine_multiplier,
                    scenario:        Some(scenario),
                }
            }
        };

        if self.config.fine_policy == FinePolicy::RequireSolvency {
            let needed = params.worst_case_fine();
            let available = self.ledger.balance(request.member)?;
            if available < needed {
                log::warn!("{} rejected: cannot cover worst-case fine {needed}", request.member);
                return Err(CrimeError::InsufficientFunds { needed, available });
            }
        }
        Ok(params)
    }

    fn named_parameters(
        &self,
        crime: &str,
        request: &AttemptRequest,
        settings: &GuildCrimeSettings,
    ) -> CrimeResult<AttemptParameters> {
        let config = settings
            .crime_options
            .get(crime)
            .ok_or_else(|| CrimeError::UnknownCrimeType(crime.to_string()))?;
        if !config.enabled {
            return Err(CrimeError::CrimeDisabled(crime.to_string()));
        }

        let target = if config.target_required {
            let target = request
                .target
                .ok_or_else(|| CrimeError::TargetRequired(crime.to_string()))?;
            if target == request.member.actor {
                return Err(CrimeError::InvalidTarget("you cannot target yourself".into()));
            }
            let balance = self.ledger.balance(MemberKey::new(request.member.group, target))?;
            if balance < settings.min_steal_balance {
                return Err(CrimeError::TargetTooPoor {
                    balance,
                    minimum: settings.min_steal_balance,
                });
            }
            Some(target)
        } else {
            None
        };

        Ok(AttemptParameters {
            crime_key:       crime.to_string(),
            scenario:        None,
            target,
            success_rate:    config.success_rate,
            min_reward:      config.min_reward,
            max_reward:      config.max_reward,
            jail_time_secs:  config.jail_time_secs,
            fine_multiplier: config.fine_multiplier,
        })
    }

    /// Run a checked attempt to completion. `target_record` must be the
    /// target's record when `params.target` is set.
    #[allow(clippy::too_many_arguments)]
    pub fn resolve(
        &self,
        request: &AttemptRequest,
        params: AttemptParameters,
        settings: &GuildCrimeSettings,
        record: &mut MemberCriminalRecord,
        target_record: Option<&mut MemberCriminalRecord>,
        rngs: &RngBank,
        operation: u64,
    ) -> CrimeResult<ResolutionResult> {
        let member = request.member;
        let now = self.clock.now();
        record.last_attempts.insert(params.crime_key.clone(), now);

        // Scenario attempts have no event pool of their own.
        let pool: &[ModifierEvent] = if params.scenario.is_some() {
            &[]
        } else {
            self.registry.event_pool(&params.crime_key)
        };
        let mut events_rng = rngs.for_operation(StreamSlot::Events, operation);
        let events = draw_events(pool, &mut events_rng);
        let effects = apply_events(params.success_rate, &events);
        let credits_delta = apply_credits_delta(self.ledger.as_ref(), member, effects.credits_delta)?;

        let mut rng = rngs.for_operation(StreamSlot::Resolution, operation);
        let roll = rng.next_f64();
        let success = roll < effects.final_chance;

        let mut amount = 0;
        let mut fine = 0;
        let mut jail_time = 0;

        if success {
            let base = rng.uniform_inclusive(params.min_reward, params.max_reward);
            let streak_multiplier = self.config.streak_curve.multiplier_for(record.current_streak);
            let reward = scaled_reward(base, effects.reward_multiplier, streak_multiplier);

            amount = match (params.target, target_record) {
                (Some(target), Some(target_record)) => {
                    let victim = MemberKey::new(member.group, target);
                    let capped = reward.min(settings.max_steal_amount);
                    let taken = withdraw_capped(self.ledger.as_ref(), victim, capped)?;
                    if taken > 0 {
                        self.ledger.deposit(member, taken)?;
                    }
                    record.last_target = Some(target);
                    record.total_stolen_from += taken;
                    target_record.total_stolen_by += taken;
                    taken
                }
                (Some(_), None) => {
                    return Err(CrimeError::Other(anyhow::anyhow!(
                        "targeted attempt resolved without the target's record"
                    )));
                }
                (None, _) => {
                    if reward > 0 {
                        self.ledger.deposit(member, reward)?;
                    }
                    reward
                }
            };

            streak::record_success(record, &self.config.streak_curve);
            record.total_successful_crimes += 1;
            record.total_credits_earned += amount;
            record.largest_heist = record.largest_heist.max(amount);
        } else {
            streak::record_failure(record, &self.config.streak_curve);
            fine = withdraw_capped(self.ledger.as_ref(), member, params.worst_case_fine())?;
            let sentence = (params.jail_time_secs as f64 * effects.jail_multiplier).round() as i64;
            jail_time = self.incarceration.commit(member, record, sentence, request.channel)?;
            record.total_failed_crimes += 1;
            record.total_fines_paid += fine;
        }

        let result = ResolutionResult {
            crime:             params.crime_key,
            scenario:          params.scenario,
            target:            params.target,
            success,
            amount,
            fine,
            jail_time,
            events,
            final_chance:      effects.final_chance,
            credits_delta,
            roll,
            streak:            record.current_streak,
            streak_multiplier: record.streak_multiplier,
            currency_name:     self.ledger.currency_name(member.group)?,
        };

        let entry = EventLogEntry::for_member(SUBSYSTEM, member, now, &CrimeEvent::CrimeResolved {
            crime:         result.crime.clone(),
            scenario:      result.scenario.as_ref().map(|s| s.name.clone()),
            target:        result.target,
            success,
            amount,
            fine,
            jail_secs:     jail_time,
            final_chance:  result.final_chance,
            roll,
            credits_delta,
            streak:        result.streak,
        })?;
        self.journal.append(&entry)?;

        log::debug!(
            "{member} {} '{}' (roll {roll:.3} vs {:.3}): amount {amount}, fine {fine}, jail {jail_time}s",
            if success { "succeeded at" } else { "failed" },
            result.crime,
            result.final_chance
        );
        Ok(result)
    }
}
