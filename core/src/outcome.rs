//! Structured outcomes handed to the presenter.
//!
//! RULE: Outcomes carry numbers and scenario templates, never rendered text.

use crate::{
    modifier_pipeline::ModifierEvent,
    record::MemberCriminalRecord,
    scenario_registry::{JailbreakScenario, Scenario},
    types::{ActorId, Credits, MemberKey, Timestamp},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What the actor asked to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrimeChoice {
    /// A configured crime type such as `pickpocket`.
    Named(String),
    /// A uniformly drawn flavor scenario.
    Random,
}

impl CrimeChoice {
    pub fn named(crime: &str) -> Self {
        Self::Named(crime.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionResult {
    /// Crime type key, or `random` for scenario attempts.
    pub crime:             String,
    pub scenario:          Option<Scenario>,
    pub target:            Option<ActorId>,
    pub success:           bool,
    pub amount:            Credits,
    pub fine:              Credits,
    /// Seconds actually sentenced, after any perk.
    pub jail_time:         i64,
    pub events:            Vec<ModifierEvent>,
    pub final_chance:      f64,
    /// Event credit delta as applied, after capping at the balance.
    pub credits_delta:     Credits,
    pub roll:              f64,
    pub streak:            u32,
    pub streak_multiplier: f64,
    pub currency_name:     String,
}

/// The narration half of a jailbreak. Everything the roll needs is fixed
/// here, so `finish_jailbreak` is deterministic given this value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JailbreakAttempt {
    pub member:         MemberKey,
    pub scenario:       JailbreakScenario,
    pub events:         Vec<ModifierEvent>,
    pub final_chance:   f64,
    /// Event credit delta, already applied by `begin_jailbreak`.
    pub credits_delta:  Credits,
    pub remaining_secs: i64,
    pub currency_name:  String,
    pub operation:      u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "resolution", rename_all = "snake_case")]
pub enum JailbreakResolution {
    Escaped,
    Extended { added_secs: i64, new_remaining: i64 },
    /// The sentence ran out while the attempt was being narrated.
    AlreadyFree,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JailbreakOutcome {
    pub scenario_name: String,
    pub resolution:    JailbreakResolution,
    /// None when no roll was made.
    pub roll:          Option<f64>,
    pub final_chance:  f64,
    pub credits_delta: Credits,
    pub currency_name: String,
}

impl JailbreakOutcome {
    pub fn escaped(&self) -> bool {
        matches!(self.resolution, JailbreakResolution::Escaped)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BailQuote {
    pub cost:                 Credits,
    pub remaining_secs:       i64,
    pub balance:              Credits,
    pub can_afford:           bool,
    pub jail_reducer_applied: bool,
    pub currency_name:        String,
}

// ── Status & statistics ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrimeStats {
    pub total_successful_crimes: u64,
    pub total_failed_crimes:     u64,
    pub success_rate:            Option<f64>,
    pub total_credits_earned:    Credits,
    pub total_stolen_from:       Credits,
    pub total_stolen_by:         Credits,
    pub total_fines_paid:        Credits,
    pub total_bail_paid:         Credits,
    pub largest_heist:           Credits,
    pub highest_streak:          u32,
}

impl From<&MemberCriminalRecord> for CrimeStats {
    fn from(record: &MemberCriminalRecord) -> Self {
        Self {
            total_successful_crimes: record.total_successful_crimes,
            total_failed_crimes:     record.total_failed_crimes,
            success_rate:            record.success_rate(),
            total_credits_earned:    record.total_credits_earned,
            total_stolen_from:       record.total_stolen_from,
            total_stolen_by:         record.total_stolen_by,
            total_fines_paid:        record.total_fines_paid,
            total_bail_paid:         record.total_bail_paid,
            largest_heist:           record.largest_heist,
            highest_streak:          record.highest_streak,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriminalStatus {
    pub jailed:              bool,
    pub jail_until:          Timestamp,
    pub remaining_secs:      i64,
    pub attempted_jailbreak: bool,
    /// Seconds left per crime key, only for keys still cooling down.
    pub cooldowns:           BTreeMap<String, i64>,
    pub perks:               Vec<String>,
    pub notify_on_release:   bool,
    pub last_target:         Option<ActorId>,
    pub current_streak:      u32,
    pub streak_multiplier:   f64,
    pub stats:               CrimeStats,
}
