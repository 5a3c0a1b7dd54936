//! Typed engine and per-group configuration.
//!
//! RULE: Every configuration struct is validated at the boundary.
//! Files are parsed with `deny_unknown_fields`, so a typo or a missing key
//! is a load error rather than a silent default at some call site.

use crate::{
    error::{CrimeResult, ValidationError},
    scenario_registry::Scenario,
    streak::StreakCurve,
    types::Credits,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ── Per crime type ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CrimeTypeConfig {
    pub success_rate:    f64,
    pub min_reward:      Credits,
    pub max_reward:      Credits,
    pub cooldown_secs:   u64,
    pub jail_time_secs:  u64,
    pub fine_multiplier: f64,
    pub enabled:         bool,
    pub target_required: bool,
}

impl CrimeTypeConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_rate("success_rate", self.success_rate)?;
        validate_reward_range(self.min_reward, self.max_reward)?;
        validate_non_negative("fine_multiplier", self.fine_multiplier)?;
        Ok(())
    }
}

pub(crate) fn validate_rate(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ValidationError::RateOutOfRange { field, value });
    }
    Ok(())
}

pub(crate) fn validate_non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if value.is_nan() || value < 0.0 {
        return Err(ValidationError::Negative { field, value });
    }
    Ok(())
}

pub(crate) fn validate_reward_range(min: Credits, max: Credits) -> Result<(), ValidationError> {
    if min < 0 {
        return Err(ValidationError::Negative { field: "min_reward", value: min as f64 });
    }
    if max < min {
        return Err(ValidationError::RewardRange { min, max });
    }
    Ok(())
}

/// Key under which the random-scenario action stamps its cooldown.
pub const RANDOM_CRIME_KEY: &str = "random";

/// The catalog of crime types every new group starts with.
pub fn default_crime_options() -> BTreeMap<String, CrimeTypeConfig> {
    let mut options = BTreeMap::new();
    options.insert("pickpocket".to_string(), CrimeTypeConfig {
        success_rate:    0.60,
        min_reward:      50,
        max_reward:      150,
        cooldown_secs:   300,
        jail_time_secs:  1800,
        fine_multiplier: 0.35,
        enabled:         true,
        target_required: true,
    });
    options.insert("mugging".to_string(), CrimeTypeConfig {
        success_rate:    0.50,
        min_reward:      100,
        max_reward:      300,
        cooldown_secs:   600,
        jail_time_secs:  2700,
        fine_multiplier: 0.40,
        enabled:         true,
        target_required: true,
    });
    options.insert("rob_store".to_string(), CrimeTypeConfig {
        success_rate:    0.45,
        min_reward:      200,
        max_reward:      800,
        cooldown_secs:   1800,
        jail_time_secs:  3600,
        fine_multiplier: 0.45,
        enabled:         true,
        target_required: false,
    });
    options.insert("bank_heist".to_string(), CrimeTypeConfig {
        success_rate:    0.30,
        min_reward:      1000,
        max_reward:      5000,
        cooldown_secs:   7200,
        jail_time_secs:  7200,
        fine_multiplier: 0.50,
        enabled:         true,
        target_required: false,
    });
    options
}

// ── Per group ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GuildCrimeSettings {
    pub crime_options:        BTreeMap<String, CrimeTypeConfig>,
    pub custom_scenarios:     Vec<Scenario>,
    pub allow_bail:           bool,
    pub bail_cost_multiplier: f64,
    pub min_steal_balance:    Credits,
    pub max_steal_amount:     Credits,
    /// Random-scenario attempts take their parameters from the scenario,
    /// so their gate and cooldown live here instead of in `crime_options`.
    pub random_enabled:       bool,
    pub random_cooldown_secs: u64,
}

impl Default for GuildCrimeSettings {
    fn default() -> Self {
        Self {
            crime_options:        default_crime_options(),
            custom_scenarios:     Vec::new(),
            allow_bail:           true,
            bail_cost_multiplier: 1.5,
            min_steal_balance:    100,
            max_steal_amount:     1000,
            random_enabled:       true,
            random_cooldown_secs: 900,
        }
    }
}

impl GuildCrimeSettings {
    pub fn validate(&self) -> Result<(), ValidationError> {
        for config in self.crime_options.values() {
            config.validate()?;
        }
        for scenario in &self.custom_scenarios {
            scenario.validate()?;
        }
        validate_non_negative("bail_cost_multiplier", self.bail_cost_multiplier)?;
        validate_non_negative("min_steal_balance", self.min_steal_balance as f64)?;
        validate_non_negative("max_steal_amount", self.max_steal_amount as f64)?;
        Ok(())
    }
}

// ── Engine-wide ────────────────────────────────────────────────────

/// What happens when a failed attempt's fine exceeds the actor's balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinePolicy {
    /// Withdraw whatever the actor has, never going below zero.
    CapAtBalance,
    /// Refuse the attempt up front when the worst-case fine is unaffordable.
    RequireSolvency,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    pub streak_curve:               StreakCurve,
    pub fine_policy:                FinePolicy,
    /// Fraction of the remaining sentence added on a failed jailbreak.
    pub jailbreak_extension_factor: f64,
    /// Sentence factor for holders of the jail-reducer perk.
    pub jail_reducer_factor:        f64,
    pub jail_reducer_perk:          String,
    /// Perk that unlocks release notifications.
    pub notify_perk:                String,
    /// Settings a group gets on first access and on `ReloadDefaults`.
    pub default_settings:           GuildCrimeSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            streak_curve:               StreakCurve::default(),
            fine_policy:                FinePolicy::CapAtBalance,
            jailbreak_extension_factor: 0.3,
            jail_reducer_factor:        0.8,
            jail_reducer_perk:          "jail_reducer".to_string(),
            notify_perk:                "notify_on_release".to_string(),
            default_settings:           GuildCrimeSettings::default(),
        }
    }
}

impl EngineConfig {
    /// Load from a JSON file. Unknown or missing fields are errors.
    /// In tests, use `EngineConfig::default()`.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: EngineConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        config.validate().map_err(|e| anyhow::anyhow!("{path}: {e}"))?;
        Ok(config)
    }

    pub fn validate(&self) -> CrimeResult<()> {
        self.streak_curve.validate()?;
        validate_non_negative("jailbreak_extension_factor", self.jailbreak_extension_factor)?;
        validate_rate("jail_reducer_factor", self.jail_reducer_factor)?;
        if self.jail_reducer_perk.trim().is_empty() {
            return Err(ValidationError::Empty("jail_reducer_perk").into());
        }
        if self.notify_perk.trim().is_empty() {
            return Err(ValidationError::Empty("notify_perk").into());
        }
        self.default_settings.validate()?;
        Ok(())
    }
}
