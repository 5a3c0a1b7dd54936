//! Event modifier pipeline — random perturbations for one attempt.
//!
//! Draws are pure functions of the pool and the injected random source,
//! so the pipeline needs no locking and replays exactly under a fixed seed.
//!
//! Crime attempts use the staged draw: the first event is guaranteed, then
//! a second with 75%, a third with 50% and a fourth with 10%. Jailbreaks
//! draw 1–3 events uniformly. Neither repeats an event within one attempt.

use crate::{rng::RandomSource, types::Credits};
use serde::{Deserialize, Serialize};

/// Success chance never leaves [CHANCE_FLOOR, CHANCE_CEILING].
pub const CHANCE_FLOOR: f64 = 0.05;
pub const CHANCE_CEILING: f64 = 1.0;

/// Odds of each successive draw for crime attempts.
pub const STAGED_DRAW_ODDS: [f64; 4] = [1.0, 0.75, 0.50, 0.10];

pub const JAILBREAK_MIN_EVENTS: u64 = 1;
pub const JAILBREAK_MAX_EVENTS: u64 = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModifierEvent {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chance_bonus: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chance_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reward_multiplier: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jail_multiplier: Option<f64>,
    #[serde(default, alias = "currency_bonus", skip_serializing_if = "Option::is_none")]
    pub credits_bonus: Option<Credits>,
    #[serde(default, alias = "currency_penalty", skip_serializing_if = "Option::is_none")]
    pub credits_penalty: Option<Credits>,
}

impl ModifierEvent {
    /// Signed change to the success chance.
    pub fn chance_delta(&self) -> f64 {
        self.chance_bonus.unwrap_or(0.0) - self.chance_penalty.unwrap_or(0.0)
    }

    /// Signed change to the actor's balance.
    pub fn credits_delta(&self) -> Credits {
        self.credits_bonus.unwrap_or(0) - self.credits_penalty.unwrap_or(0)
    }
}

/// The composed effect of every event drawn for one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventEffects {
    pub final_chance:      f64,
    pub reward_multiplier: f64,
    pub jail_multiplier:   f64,
    pub credits_delta:     Credits,
}

/// Staged draw without replacement.
pub fn draw_events<R: RandomSource + ?Sized>(
    pool: &[ModifierEvent],
    rng: &mut R,
) -> Vec<ModifierEvent> {
    let mut available: Vec<&ModifierEvent> = pool.iter().collect();
    let mut drawn = Vec::with_capacity(STAGED_DRAW_ODDS.len());

    for (stage, odds) in STAGED_DRAW_ODDS.iter().enumerate() {
        if available.is_empty() {
            break;
        }
        // A missed stage does not end the draw; later stages still roll.
        if stage > 0 && !rng.chance(*odds) {
            continue;
        }
        let idx = rng.pick_index(available.len());
        drawn.push(available.swap_remove(idx).clone());
    }
    drawn
}

/// Uniform 1–3 events without replacement.
pub fn draw_jailbreak_events<R: RandomSource + ?Sized>(
    pool: &[ModifierEvent],
    rng: &mut R,
) -> Vec<ModifierEvent> {
    if pool.is_empty() {
        return Vec::new();
    }
    let wanted = JAILBREAK_MIN_EVENTS
        + rng.next_u64_below(JAILBREAK_MAX_EVENTS - JAILBREAK_MIN_EVENTS + 1);
    let count = (wanted as usize).min(pool.len());

    let mut available: Vec<&ModifierEvent> = pool.iter().collect();
    let mut drawn = Vec::with_capacity(count);
    for _ in 0..count {
        let idx = rng.pick_index(available.len());
        drawn.push(available.swap_remove(idx).clone());
    }
    drawn
}

/// Compose events in draw order. Chance deltas add up and are clamped
/// once at the end; multipliers multiply; credit deltas sum.
pub fn apply_events(base_chance: f64, events: &[ModifierEvent]) -> EventEffects {
    let mut chance = base_chance;
    let mut reward_multiplier = 1.0;
    let mut jail_multiplier = 1.0;
    let mut credits_delta: Credits = 0;

    for event in events {
        chance += event.chance_delta();
        if let Some(m) = event.reward_multiplier {
            reward_multiplier *= m;
        }
        if let Some(m) = event.jail_multiplier {
            jail_multiplier *= m;
        }
        credits_delta += event.credits_delta();
    }

    EventEffects {
        final_chance: clamp_chance(chance),
        reward_multiplier,
        jail_multiplier,
        credits_delta,
    }
}

pub fn clamp_chance(chance: f64) -> f64 {
    if chance.is_nan() {
        return CHANCE_FLOOR;
    }
    chance.clamp(CHANCE_FLOOR, CHANCE_CEILING)
}
