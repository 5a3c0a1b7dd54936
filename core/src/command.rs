use crate::{
    config::{GuildCrimeSettings, RANDOM_CRIME_KEY},
    error::{CrimeError, CrimeResult},
    scenario_registry::{add_custom_scenario, build_scenario, remove_custom_scenario, ScenarioFields},
    types::{ActorId, ChannelRef, Credits},
};
use serde::{Deserialize, Serialize};

/// All administrative commands.
/// Variants are only ever appended, never removed or reordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum AdminCommand {
    // ── Per crime type ────────────────────────────
    SetSuccessRate { crime: String, rate: f64 },
    SetReward { crime: String, min: Credits, max: Credits },
    SetCooldown { crime: String, secs: u64 },
    SetJailTime { crime: String, secs: u64 },
    SetFineMultiplier { crime: String, multiplier: f64 },
    /// `random` toggles the random-scenario action.
    SetEnabled { crime: String, enabled: bool },

    // ── Group-wide ────────────────────────────────
    SetBailMultiplier { multiplier: f64 },
    ToggleBail { enabled: bool },
    SetStealLimits { min_balance: Credits, max_amount: Credits },
    SetRandomCooldown { secs: u64 },
    /// Restore every crime type to the engine defaults.
    ReloadDefaults,

    // ── Scenarios ─────────────────────────────────
    AddScenario { fields: ScenarioFields },
    RemoveScenario { name: String },

    // ── Members ───────────────────────────────────
    ManualJail { actor: ActorId, minutes: i64, channel: Option<ChannelRef> },
    GrantPerk { actor: ActorId, perk: String },
    ReleaseMember { actor: ActorId },
}

impl AdminCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetSuccessRate { .. }    => "set_success_rate",
            Self::SetReward { .. }         => "set_reward",
            Self::SetCooldown { .. }       => "set_cooldown",
            Self::SetJailTime { .. }       => "set_jail_time",
            Self::SetFineMultiplier { .. } => "set_fine_multiplier",
            Self::SetEnabled { .. }        => "set_enabled",
            Self::SetBailMultiplier { .. } => "set_bail_multiplier",
            Self::ToggleBail { .. }        => "toggle_bail",
            Self::SetStealLimits { .. }    => "set_steal_limits",
            Self::SetRandomCooldown { .. } => "set_random_cooldown",
            Self::ReloadDefaults           => "reload_defaults",
            Self::AddScenario { .. }       => "add_scenario",
            Self::RemoveScenario { .. }    => "remove_scenario",
            Self::ManualJail { .. }        => "manual_jail",
            Self::GrantPerk { .. }         => "grant_perk",
            Self::ReleaseMember { .. }     => "release_member",
        }
    }

    /// Commands that act on one member's record rather than on settings.
    pub fn targets_member(&self) -> Option<ActorId> {
        match self {
            Self::ManualJail { actor, .. }
            | Self::GrantPerk { actor, .. }
            | Self::ReleaseMember { actor } => Some(*actor),
            _ => None,
        }
    }

    /// Apply a settings command to a copy of `settings`, validate the whole
    /// result, and only then swap it in. `defaults` feeds `ReloadDefaults`.
    pub fn apply(&self, settings: &mut GuildCrimeSettings, defaults: &GuildCrimeSettings) -> CrimeResult<()> {
        let mut next = settings.clone();
        match self {
            Self::SetSuccessRate { crime, rate } => {
                crime_config(&mut next, crime)?.success_rate = *rate;
            }
            Self::SetReward { crime, min, max } => {
                let config = crime_config(&mut next, crime)?;
                config.min_reward = *min;
                config.max_reward = *max;
            }
            Self::SetCooldown { crime, secs } => {
                crime_config(&mut next, crime)?.cooldown_secs = *secs;
            }
            Self::SetJailTime { crime, secs } => {
                crime_config(&mut next, crime)?.jail_time_secs = *secs;
            }
            Self::SetFineMultiplier { crime, multiplier } => {
                crime_config(&mut next, crime)?.fine_multiplier = *multiplier;
            }
            Self::SetEnabled { crime, enabled } => {
                if crime == RANDOM_CRIME_KEY {
                    next.random_enabled = *enabled;
                } else {
                    crime_config(&mut next, crime)?.enabled = *enabled;
                }
            }
            Self::SetBailMultiplier { multiplier } => next.bail_cost_multiplier = *multiplier,
            Self::ToggleBail { enabled } => next.allow_bail = *enabled,
            Self::SetStealLimits { min_balance, max_amount } => {
                next.min_steal_balance = *min_balance;
                next.max_steal_amount = *max_amount;
            }
            Self::SetRandomCooldown { secs } => next.random_cooldown_secs = *secs,
            Self::ReloadDefaults => next.crime_options = defaults.crime_options.clone(),
            Self::AddScenario { fields } => {
                let scenario = build_scenario(fields.clone())?;
                add_custom_scenario(&mut next, scenario)?;
            }
            Self::RemoveScenario { name } => {
                remove_custom_scenario(&mut next, name)?;
            }
            Self::ManualJail { .. } | Self::GrantPerk { .. } | Self::ReleaseMember { .. } => {
                return Err(CrimeError::Other(anyhow::anyhow!(
                    "{} acts on a member, not on group settings",
                    self.name()
                )));
            }
        }
        next.validate()?;
        *settings = next;
        Ok(())
    }
}

fn crime_config<'a>(
    settings: &'a mut GuildCrimeSettings,
    crime: &str,
) -> CrimeResult<&'a mut crate::config::CrimeTypeConfig> {
    settings
        .crime_options
        .get_mut(crime)
        .ok_or_else(|| CrimeError::UnknownCrimeType(crime.to_string()))
}
