//! Administrative commands and the leaderboard.

mod common;

use crime_core::{
    collaborator::ConfigStore,
    command::AdminCommand,
    config::{GuildCrimeSettings, RANDOM_CRIME_KEY},
    error::{CrimeError, ErrorKind},
    leaderboard::LeaderboardCategory,
    record::MemberCriminalRecord,
    scenario_registry::ScenarioFields,
};
use common::SimHarness;

const GROUP: u64 = SimHarness::GROUP;

fn settings(h: &SimHarness) -> GuildCrimeSettings {
    h.engine.settings(GROUP).expect("settings")
}

#[test]
fn unconfigured_group_uses_defaults_without_writing() {
    let h = SimHarness::new(1).unwrap();
    assert_eq!(settings(&h), GuildCrimeSettings::default());
    assert!(h.store.group_settings(GROUP).unwrap().is_none());
}

#[test]
fn per_crime_commands_update_one_field() {
    let h = SimHarness::new(1).unwrap();
    let commands = [
        AdminCommand::SetSuccessRate { crime: "mugging".into(), rate: 0.9 },
        AdminCommand::SetReward { crime: "mugging".into(), min: 10, max: 20 },
        AdminCommand::SetCooldown { crime: "mugging".into(), secs: 42 },
        AdminCommand::SetJailTime { crime: "mugging".into(), secs: 60 },
        AdminCommand::SetFineMultiplier { crime: "mugging".into(), multiplier: 0.1 },
        AdminCommand::SetEnabled { crime: "mugging".into(), enabled: false },
    ];
    for command in &commands {
        h.engine.apply_admin(GROUP, command).unwrap();
    }

    let mugging = settings(&h).crime_options["mugging"].clone();
    assert_eq!(mugging.success_rate, 0.9);
    assert_eq!((mugging.min_reward, mugging.max_reward), (10, 20));
    assert_eq!(mugging.cooldown_secs, 42);
    assert_eq!(mugging.jail_time_secs, 60);
    assert_eq!(mugging.fine_multiplier, 0.1);
    assert!(!mugging.enabled);
    assert_eq!(settings(&h).crime_options["pickpocket"], GuildCrimeSettings::default().crime_options["pickpocket"]);

    assert_eq!(h.store.settings_revision(GROUP).unwrap(), commands.len() as i64);
    assert_eq!(h.store.count_events(GROUP, "settings_changed").unwrap(), commands.len() as i64);
}

#[test]
fn invalid_commands_leave_settings_untouched() {
    let h = SimHarness::new(1).unwrap();
    h.engine.apply_admin(GROUP, &AdminCommand::SetBailMultiplier { multiplier: 2.0 }).unwrap();
    let before = settings(&h);

    let rejected = [
        AdminCommand::SetSuccessRate { crime: "mugging".into(), rate: 1.2 },
        AdminCommand::SetReward { crime: "mugging".into(), min: 500, max: 100 },
        AdminCommand::SetFineMultiplier { crime: "mugging".into(), multiplier: -0.5 },
        AdminCommand::SetBailMultiplier { multiplier: -1.0 },
    ];
    for command in &rejected {
        let err = h.engine.apply_admin(GROUP, command).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation, "{command:?}");
    }

    let err = h
        .engine
        .apply_admin(GROUP, &AdminCommand::SetCooldown { crime: "arson".into(), secs: 1 })
        .unwrap_err();
    assert!(matches!(err, CrimeError::UnknownCrimeType(ref c) if c == "arson"));

    assert_eq!(settings(&h), before);
    assert_eq!(h.store.settings_revision(GROUP).unwrap(), 1);
}

#[test]
fn random_has_its_own_switch_and_cooldown() {
    let h = SimHarness::new(1).unwrap();
    h.engine
        .apply_admin(GROUP, &AdminCommand::SetEnabled { crime: RANDOM_CRIME_KEY.into(), enabled: false })
        .unwrap();
    h.engine.apply_admin(GROUP, &AdminCommand::SetRandomCooldown { secs: 30 }).unwrap();
    let s = settings(&h);
    assert!(!s.random_enabled);
    assert_eq!(s.random_cooldown_secs, 30);
    assert!(!s.crime_options.contains_key(RANDOM_CRIME_KEY));
    assert!(matches!(h.attempt_random(1), Err(CrimeError::CrimeDisabled(_))));
}

#[test]
fn reload_defaults_only_resets_crime_types() {
    let h = SimHarness::new(1).unwrap();
    h.engine.apply_admin(GROUP, &AdminCommand::SetCooldown { crime: "rob_store".into(), secs: 5 }).unwrap();
    h.engine.apply_admin(GROUP, &AdminCommand::ToggleBail { enabled: false }).unwrap();
    h.engine
        .apply_admin(GROUP, &AdminCommand::SetStealLimits { min_balance: 10, max_amount: 50 })
        .unwrap();

    h.engine.apply_admin(GROUP, &AdminCommand::ReloadDefaults).unwrap();
    let s = settings(&h);
    assert_eq!(s.crime_options, GuildCrimeSettings::default().crime_options);
    assert!(!s.allow_bail);
    assert_eq!((s.min_steal_balance, s.max_steal_amount), (10, 50));
}

#[test]
fn scenarios_are_added_and_removed_through_commands() {
    let h = SimHarness::new(1).unwrap();
    let fields = ScenarioFields {
        name:         Some("Night Shift".into()),
        risk:         Some("low".into()),
        attempt_text: Some("{user} clocks in".into()),
        success_text: Some("{user} pockets {amount} {currency}".into()),
        fail_text:    Some("{user} pays {fine} {currency}".into()),
        ..Default::default()
    };
    h.engine.apply_admin(GROUP, &AdminCommand::AddScenario { fields: fields.clone() }).unwrap();
    assert_eq!(settings(&h).custom_scenarios[0].name, "night shift");

    let current = settings(&h);
    let listed = h.engine.registry().list_scenarios(&current);
    assert_eq!(listed.last().map(|s| s.name.as_str()), Some("night shift"));

    let err = h.engine.apply_admin(GROUP, &AdminCommand::AddScenario { fields }).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Duplicate);

    h.engine
        .apply_admin(GROUP, &AdminCommand::RemoveScenario { name: "NIGHT SHIFT".into() })
        .unwrap();
    assert!(settings(&h).custom_scenarios.is_empty());
    let err = h
        .engine
        .apply_admin(GROUP, &AdminCommand::RemoveScenario { name: "night shift".into() })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    assert_eq!(h.store.count_events(GROUP, "scenario_added").unwrap(), 1);
    assert_eq!(h.store.count_events(GROUP, "scenario_removed").unwrap(), 1);
}

#[test]
fn commands_parse_from_json_lines() {
    let parsed: AdminCommand =
        serde_json::from_str(r#"{"cmd": "set_cooldown", "crime": "mugging", "secs": 90}"#).unwrap();
    assert_eq!(parsed, AdminCommand::SetCooldown { crime: "mugging".into(), secs: 90 });
    assert_eq!(parsed.name(), "set_cooldown");
    assert_eq!(parsed.targets_member(), None);

    let jail: AdminCommand =
        serde_json::from_str(r#"{"cmd": "manual_jail", "actor": 7, "minutes": 3, "channel": null}"#).unwrap();
    assert_eq!(jail.targets_member(), Some(7));

    let mut s = GuildCrimeSettings::default();
    assert!(jail.apply(&mut s, &GuildCrimeSettings::default()).is_err());
    assert!(serde_json::from_str::<AdminCommand>(r#"{"cmd": "launch_missiles"}"#).is_err());
}

#[test]
fn settings_are_isolated_per_group() {
    let h = SimHarness::new(1).unwrap();
    h.engine.apply_admin(GROUP, &AdminCommand::ToggleBail { enabled: false }).unwrap();
    assert!(h.engine.settings(GROUP + 1).unwrap().allow_bail);
}

#[test]
fn leaderboard_ranks_top_three_per_category() {
    let h = SimHarness::new(1).unwrap();
    let seeds = [(1, 500, 3, 0), (2, 900, 1, 40), (3, 100, 7, 0), (4, 700, 2, 10), (5, 0, 0, 0)];
    for (actor, earned, streak, fines) in seeds {
        let mut record = MemberCriminalRecord::default();
        record.total_credits_earned = earned;
        record.largest_heist = earned;
        record.highest_streak = streak;
        record.total_fines_paid = fines;
        record.total_successful_crimes = streak as u64;
        h.store.save_member_record(SimHarness::member(actor), &record).unwrap();
    }

    let board = h.engine.leaderboard(GROUP).unwrap();
    assert_eq!(board.len(), LeaderboardCategory::ALL.len());

    let earnings = board.iter().find(|s| s.category == LeaderboardCategory::Earnings).unwrap();
    let order: Vec<u64> = earnings.entries.iter().map(|e| e.actor).collect();
    assert_eq!(order, vec![2, 4, 1]);

    let streaks = board.iter().find(|s| s.category == LeaderboardCategory::Streaks).unwrap();
    assert_eq!(streaks.entries[0].actor, 3);
    assert_eq!(streaks.entries[0].value, 7);

    let fines = board.iter().find(|s| s.category == LeaderboardCategory::Fines).unwrap();
    let order: Vec<u64> = fines.entries.iter().map(|e| e.actor).collect();
    assert_eq!(order, vec![2, 4], "zero values are not ranked");
}
