//! Scenario registry — the catalog of everything an attempt can draw from.
//!
//! RULE: Built-in catalogs are immutable once loaded and shared by every
//! group. A group's custom scenarios live in its own settings, so one
//! group's additions never leak into another's list.
//!
//! Three catalogs ship with the engine, embedded from `data/`:
//!   - flavor scenarios for the random-crime action
//!   - modifier event pools, keyed by crime type
//!   - jailbreak scenarios, each with its own event pool

use crate::{
    config::{validate_non_negative, validate_rate, validate_reward_range, GuildCrimeSettings},
    error::{CrimeError, CrimeResult, ValidationError},
    modifier_pipeline::ModifierEvent,
    rng::RandomSource,
    types::Credits,
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::Path};

const BUILTIN_SCENARIOS: &str = include_str!("../../data/scenarios.json");
const BUILTIN_CRIME_EVENTS: &str = include_str!("../../data/crime_events.json");
const BUILTIN_JAILBREAKS: &str = include_str!("../../data/jailbreak_scenarios.json");

pub const SCENARIOS_FILE: &str = "scenarios.json";
pub const CRIME_EVENTS_FILE: &str = "crime_events.json";
pub const JAILBREAKS_FILE: &str = "jailbreak_scenarios.json";

// ── Risk tiers ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

/// Parameters a front end gets for free when it only asks for a tier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierPreset {
    pub success_rate:    f64,
    pub min_reward:      Credits,
    pub max_reward:      Credits,
    pub jail_time_secs:  u64,
    pub fine_multiplier: f64,
}

impl RiskTier {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        match raw.trim().to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(ValidationError::UnknownRiskTier(other.to_string())),
        }
    }

    pub fn preset(self) -> TierPreset {
        match self {
            Self::Low => TierPreset {
                success_rate:    0.7,
                min_reward:      100,
                max_reward:      300,
                jail_time_secs:  180,
                fine_multiplier: 0.3,
            },
            Self::Medium => TierPreset {
                success_rate:    0.5,
                min_reward:      300,
                max_reward:      800,
                jail_time_secs:  300,
                fine_multiplier: 0.4,
            },
            Self::High => TierPreset {
                success_rate:    0.3,
                min_reward:      800,
                max_reward:      2000,
                jail_time_secs:  600,
                fine_multiplier: 0.5,
            },
        }
    }
}

// ── Scenarios ──────────────────────────────────────────────────────

/// A flavor scenario for the random-crime action.
/// Text fields are templates over `{user}`, `{amount}`, `{currency}`, `{fine}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    pub name:            String,
    pub risk:            RiskTier,
    pub min_reward:      Credits,
    pub max_reward:      Credits,
    pub success_rate:    f64,
    pub jail_time_secs:  u64,
    pub fine_multiplier: f64,
    pub attempt_text:    String,
    pub success_text:    String,
    pub fail_text:       String,
}

impl Scenario {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::Empty("name"));
        }
        validate_rate("success_rate", self.success_rate)?;
        validate_reward_range(self.min_reward, self.max_reward)?;
        validate_non_negative("fine_multiplier", self.fine_multiplier)?;
        for (field, text) in [
            ("attempt_text", &self.attempt_text),
            ("success_text", &self.success_text),
            ("fail_text", &self.fail_text),
        ] {
            if text.trim().is_empty() {
                return Err(ValidationError::Empty(field));
            }
        }
        Ok(())
    }

    /// Case-insensitive name comparison.
    pub fn is_named(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.trim().to_lowercase()
    }
}

/// Raw input from whatever front end collects a custom scenario.
/// Only `name`, `risk` and the three texts are required; numeric fields
/// left empty are filled from the risk tier's preset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScenarioFields {
    pub name:            Option<String>,
    pub risk:            Option<String>,
    pub min_reward:      Option<Credits>,
    pub max_reward:      Option<Credits>,
    pub success_rate:    Option<f64>,
    pub jail_time_secs:  Option<u64>,
    pub fine_multiplier: Option<f64>,
    pub attempt_text:    Option<String>,
    pub success_text:    Option<String>,
    pub fail_text:       Option<String>,
}

fn required_text(value: Option<String>, field: &'static str) -> Result<String, ValidationError> {
    let text = value.ok_or(ValidationError::MissingField(field))?;
    if text.trim().is_empty() {
        return Err(ValidationError::Empty(field));
    }
    Ok(text)
}

/// Validate a set of scenario fields into a `Scenario`. Pure; never
/// touches settings. The stored name is trimmed and lower-cased.
pub fn build_scenario(fields: ScenarioFields) -> Result<Scenario, ValidationError> {
    let name = required_text(fields.name, "name")?.trim().to_lowercase();
    let risk = RiskTier::parse(&required_text(fields.risk, "risk")?)?;
    let preset = risk.preset();

    let scenario = Scenario {
        name,
        risk,
        min_reward:      fields.min_reward.unwrap_or(preset.min_reward),
        max_reward:      fields.max_reward.unwrap_or(preset.max_reward),
        success_rate:    fields.success_rate.unwrap_or(preset.success_rate),
        jail_time_secs:  fields.jail_time_secs.unwrap_or(preset.jail_time_secs),
        fine_multiplier: fields.fine_multiplier.unwrap_or(preset.fine_multiplier),
        attempt_text:    required_text(fields.attempt_text, "attempt_text")?,
        success_text:    required_text(fields.success_text, "success_text")?,
        fail_text:       required_text(fields.fail_text, "fail_text")?,
    };
    scenario.validate()?;
    Ok(scenario)
}

// ── Jailbreak scenarios ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JailbreakScenario {
    pub name:         String,
    pub attempt_text: String,
    pub success_text: String,
    pub fail_text:    String,
    pub base_chance:  f64,
    pub events:       Vec<ModifierEvent>,
}

impl JailbreakScenario {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::Empty("name"));
        }
        validate_rate("base_chance", self.base_chance)
    }
}

// ── Registry ───────────────────────────────────────────────────────

pub struct ScenarioRegistry {
    scenarios:    Vec<Scenario>,
    crime_events: BTreeMap<String, Vec<ModifierEvent>>,
    jailbreaks:   Vec<JailbreakScenario>,
}

impl ScenarioRegistry {
    /// The catalogs compiled into the binary.
    pub fn builtin() -> CrimeResult<Self> {
        Self::from_json(BUILTIN_SCENARIOS, BUILTIN_CRIME_EVENTS, BUILTIN_JAILBREAKS)
    }

    /// Load catalogs from `data_dir`. A missing file falls back to the
    /// embedded copy; a present but malformed file is an error.
    pub fn load(data_dir: &Path) -> CrimeResult<Self> {
        let read = |file: &str, fallback: &'static str| -> CrimeResult<String> {
            let path = data_dir.join(file);
            if path.exists() {
                log::debug!("loading {} from {}", file, data_dir.display());
                std::fs::read_to_string(&path).map_err(|e| {
                    CrimeError::Other(anyhow::anyhow!("Cannot read {}: {e}", path.display()))
                })
            } else {
                Ok(fallback.to_string())
            }
        };
        Self::from_json(
            &read(SCENARIOS_FILE, BUILTIN_SCENARIOS)?,
            &read(CRIME_EVENTS_FILE, BUILTIN_CRIME_EVENTS)?,
            &read(JAILBREAKS_FILE, BUILTIN_JAILBREAKS)?,
        )
    }

    pub fn from_json(scenarios: &str, crime_events: &str, jailbreaks: &str) -> CrimeResult<Self> {
        let registry = Self {
            scenarios:    serde_json::from_str(scenarios)?,
            crime_events: serde_json::from_str(crime_events)?,
            jailbreaks:   serde_json::from_str(jailbreaks)?,
        };
        registry.validate()?;
        log::debug!(
            "scenario registry: {} scenarios, {} event pools, {} jailbreaks",
            registry.scenarios.len(),
            registry.crime_events.len(),
            registry.jailbreaks.len()
        );
        Ok(registry)
    }

    pub fn validate(&self) -> CrimeResult<()> {
        for (i, scenario) in self.scenarios.iter().enumerate() {
            scenario.validate()?;
            if self.scenarios[..i].iter().any(|s| s.is_named(&scenario.name)) {
                return Err(CrimeError::DuplicateName { name: scenario.name.clone() });
            }
        }
        for jailbreak in &self.jailbreaks {
            jailbreak.validate()?;
        }
        Ok(())
    }

    pub fn builtin_scenarios(&self) -> &[Scenario] {
        &self.scenarios
    }

    /// Built-ins first, then the group's custom list, both in stored order.
    pub fn list_scenarios<'a>(&'a self, settings: &'a GuildCrimeSettings) -> Vec<&'a Scenario> {
        self.scenarios
            .iter()
            .chain(settings.custom_scenarios.iter())
            .collect()
    }

    /// Event pool for a crime type. Unknown types have an empty pool.
    pub fn event_pool(&self, crime_type: &str) -> &[ModifierEvent] {
        self.crime_events
            .get(crime_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn jailbreak_scenarios(&self) -> &[JailbreakScenario] {
        &self.jailbreaks
    }

    pub fn pick_jailbreak<R: RandomSource + ?Sized>(
        &self,
        rng: &mut R,
    ) -> CrimeResult<&JailbreakScenario> {
        pick_random(&self.jailbreaks, rng)
    }
}

/// Uniform pick. `EmptyPool` on an empty list.
pub fn pick_random<'a, T, R: RandomSource + ?Sized>(
    list: &'a [T],
    rng: &mut R,
) -> CrimeResult<&'a T> {
    if list.is_empty() {
        return Err(CrimeError::EmptyPool);
    }
    Ok(&list[rng.pick_index(list.len())])
}

/// Append a custom scenario. Names collide case-insensitively with other
/// custom scenarios only; shadowing a built-in is allowed.
pub fn add_custom_scenario(settings: &mut GuildCrimeSettings, scenario: Scenario) -> CrimeResult<()> {
    scenario.validate()?;
    if settings.custom_scenarios.iter().any(|s| s.is_named(&scenario.name)) {
        return Err(CrimeError::DuplicateName { name: scenario.name });
    }
    settings.custom_scenarios.push(scenario);
    Ok(())
}

/// Remove a custom scenario by case-insensitive name. Returns it.
pub fn remove_custom_scenario(settings: &mut GuildCrimeSettings, name: &str) -> CrimeResult<Scenario> {
    let index = settings
        .custom_scenarios
        .iter()
        .position(|s| s.is_named(name))
        .ok_or_else(|| CrimeError::NotFound { name: name.to_string() })?;
    Ok(settings.custom_scenarios.remove(index))
}
