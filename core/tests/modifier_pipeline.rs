//! Event draws and their composition.

use crime_core::{
    modifier_pipeline::{
        apply_events, clamp_chance, draw_events, draw_jailbreak_events, ModifierEvent, CHANCE_CEILING,
        CHANCE_FLOOR,
    },
    rng::StreamRng,
    scenario_registry::ScenarioRegistry,
};
use proptest::prelude::*;
use std::collections::HashSet;

fn event(text: &str) -> ModifierEvent {
    ModifierEvent {
        text:              text.to_string(),
        chance_bonus:      None,
        chance_penalty:    None,
        reward_multiplier: None,
        jail_multiplier:   None,
        credits_bonus:     None,
        credits_penalty:   None,
    }
}

fn pool(n: usize) -> Vec<ModifierEvent> {
    (0..n).map(|i| event(&format!("event {i}"))).collect()
}

#[test]
fn staged_draw_never_repeats_an_event() {
    let registry = ScenarioRegistry::builtin().expect("builtin registry");
    let pool = registry.event_pool("bank_heist");
    for seed in 0..500 {
        let mut rng = StreamRng::new(seed, 1);
        let drawn = draw_events(pool, &mut rng);
        assert!((1..=4).contains(&drawn.len()), "seed {seed}: drew {}", drawn.len());
        let unique: HashSet<_> = drawn.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(unique.len(), drawn.len(), "seed {seed}: repeated event");
    }
}

#[test]
fn staged_draw_counts_match_the_stage_odds() {
    // Stage odds 1 / .75 / .5 / .1, each stage independent of the last.
    // E[count] = 1 + .75 + .5 + .1 = 2.35
    const TRIALS: u64 = 20_000;
    let pool = pool(24);
    let mut total = 0usize;
    let mut with_fourth_stage = 0usize;
    for seed in 0..TRIALS {
        let mut rng = StreamRng::new(seed, 7);
        let drawn = draw_events(&pool, &mut rng);
        total += drawn.len();
        if drawn.len() == 4 {
            with_fourth_stage += 1;
        }
    }
    let mean = total as f64 / TRIALS as f64;
    assert!((mean - 2.35).abs() < 0.05, "mean draw count {mean}");

    // All four only when stages 2, 3 and 4 all hit: .75 × .5 × .1 = 0.0375
    let share = with_fourth_stage as f64 / TRIALS as f64;
    assert!((share - 0.0375).abs() < 0.01, "four-event share {share}");
}

#[test]
fn small_pools_run_dry_without_repeats() {
    let pool = pool(2);
    for seed in 0..200 {
        let drawn = draw_events(&pool, &mut StreamRng::new(seed, 3));
        assert!(drawn.len() <= 2);
        if drawn.len() == 2 {
            assert_ne!(drawn[0].text, drawn[1].text);
        }
    }
    assert!(draw_events(&[], &mut StreamRng::new(1, 3)).is_empty());
}

#[test]
fn jailbreak_draw_is_one_to_three_and_uniform() {
    let pool = pool(12);
    let mut counts = [0usize; 4];
    for seed in 0..9_000 {
        let drawn = draw_jailbreak_events(&pool, &mut StreamRng::new(seed, 4));
        let unique: HashSet<_> = drawn.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(unique.len(), drawn.len());
        counts[drawn.len()] += 1;
    }
    assert_eq!(counts[0], 0);
    for (n, count) in counts.iter().enumerate().skip(1) {
        let share = *count as f64 / 9_000.0;
        assert!((share - 1.0 / 3.0).abs() < 0.03, "{n} events drawn {share} of the time");
    }
}

#[test]
fn effects_compose_in_draw_order() {
    let mut a = event("a");
    a.chance_bonus = Some(0.2);
    a.reward_multiplier = Some(1.5);
    a.credits_bonus = Some(100);
    let mut b = event("b");
    b.chance_penalty = Some(0.1);
    b.jail_multiplier = Some(2.0);
    b.reward_multiplier = Some(2.0);
    b.credits_penalty = Some(250);

    let effects = apply_events(0.5, &[a, b]);
    assert!((effects.final_chance - 0.6).abs() < 1e-9);
    assert_eq!(effects.reward_multiplier, 3.0);
    assert_eq!(effects.jail_multiplier, 2.0);
    assert_eq!(effects.credits_delta, -150);
}

#[test]
fn no_events_leaves_everything_neutral() {
    let effects = apply_events(0.3, &[]);
    assert_eq!(effects.final_chance, 0.3);
    assert_eq!(effects.reward_multiplier, 1.0);
    assert_eq!(effects.jail_multiplier, 1.0);
    assert_eq!(effects.credits_delta, 0);
}

#[test]
fn chance_is_clamped_after_summing() {
    let mut big_penalty = event("penalty");
    big_penalty.chance_penalty = Some(0.9);
    let mut big_bonus = event("bonus");
    big_bonus.chance_bonus = Some(0.9);

    // Clamping happens once at the end, not per event.
    let effects = apply_events(0.5, &[big_penalty.clone(), big_bonus.clone()]);
    assert!((effects.final_chance - 0.5).abs() < 1e-9);

    assert_eq!(apply_events(0.1, &[big_penalty]).final_chance, CHANCE_FLOOR);
    assert_eq!(apply_events(0.5, &[big_bonus]).final_chance, CHANCE_CEILING);
    assert_eq!(clamp_chance(f64::NAN), CHANCE_FLOOR);
}

#[test]
fn event_files_accept_currency_aliases() {
    let json = r#"{"text": "found a wallet", "currency_bonus": 40}"#;
    let parsed: ModifierEvent = serde_json::from_str(json).expect("alias parses");
    assert_eq!(parsed.credits_bonus, Some(40));

    let typo = r#"{"text": "oops", "chance_bonsu": 0.1}"#;
    assert!(serde_json::from_str::<ModifierEvent>(typo).is_err());
}

proptest! {
    #[test]
    fn final_chance_always_within_bounds(
        base in -1.0f64..2.0,
        deltas in proptest::collection::vec(-1.0f64..1.0, 0..4),
    ) {
        let events: Vec<ModifierEvent> = deltas
            .iter()
            .map(|d| {
                let mut e = event("delta");
                if *d >= 0.0 { e.chance_bonus = Some(*d) } else { e.chance_penalty = Some(-d) }
                e
            })
            .collect();
        let chance = apply_events(base, &events).final_chance;
        prop_assert!((CHANCE_FLOOR..=CHANCE_CEILING).contains(&chance));
    }

    #[test]
    fn clamp_is_idempotent(chance in proptest::num::f64::ANY) {
        let once = clamp_chance(chance);
        prop_assert_eq!(clamp_chance(once), once);
    }
}
