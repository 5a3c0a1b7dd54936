//! SQLite store: blobs, revisions, ledger and journal.

use crime_core::{
    collaborator::{ConfigStore, EventJournal, Inventory, Ledger},
    config::GuildCrimeSettings,
    error::{CrimeError, ErrorKind},
    event::{CrimeEvent, EventLogEntry, ReleaseReason},
    record::MemberCriminalRecord,
    store::{SqliteStore, DEFAULT_CURRENCY_NAME},
    types::MemberKey,
};

fn member(actor: u64) -> MemberKey {
    MemberKey::new(1, actor)
}

fn temp_db(tag: &str) -> String {
    let path = std::env::temp_dir().join(format!("crime-store-{tag}-{}.db", std::process::id()));
    let _ = std::fs::remove_file(&path);
    path.to_string_lossy().into_owned()
}

#[test]
fn missing_record_reads_as_default() {
    let store = SqliteStore::in_memory().unwrap();
    assert_eq!(store.member_record(member(1)).unwrap(), MemberCriminalRecord::default());
    assert_eq!(store.record_revision(member(1)).unwrap(), 0);
}

#[test]
fn record_round_trips_and_counts_revisions() {
    let store = SqliteStore::in_memory().unwrap();
    let mut record = MemberCriminalRecord::default();
    record.jail_until = 1_700_000_600;
    record.jail_channel = Some(42);
    record.current_streak = 3;
    record.streak_multiplier = 1.15;
    record.last_attempts.insert("mugging".into(), 1_700_000_000);
    record.purchased_perks.insert("jail_reducer".into());
    record.total_stolen_from = 250;

    store.save_member_record(member(1), &record).unwrap();
    assert_eq!(store.member_record(member(1)).unwrap(), record);
    assert_eq!(store.record_revision(member(1)).unwrap(), 1);

    store.save_member_record(member(1), &record).unwrap();
    assert_eq!(store.record_revision(member(1)).unwrap(), 2);

    // Same actor in another group is a different member.
    assert_eq!(
        store.member_record(MemberKey::new(2, 1)).unwrap(),
        MemberCriminalRecord::default()
    );
}

#[test]
fn failed_mutation_rolls_back() {
    let store = SqliteStore::in_memory().unwrap();
    let mut record = MemberCriminalRecord::default();
    record.total_fines_paid = 10;
    store.save_member_record(member(1), &record).unwrap();

    let err = store
        .mutate_member_record(member(1), &mut |r: &mut MemberCriminalRecord| {
            r.total_fines_paid = 999;
            Err(CrimeError::NotJailed)
        })
        .unwrap_err();
    assert!(matches!(err, CrimeError::NotJailed));
    assert_eq!(store.member_record(member(1)).unwrap().total_fines_paid, 10);
    assert_eq!(store.record_revision(member(1)).unwrap(), 1);

    let updated = store
        .mutate_member_record(member(1), &mut |r: &mut MemberCriminalRecord| {
            r.total_fines_paid += 5;
            Ok(())
        })
        .unwrap();
    assert_eq!(updated.total_fines_paid, 15);
    assert_eq!(store.member_record(member(1)).unwrap().total_fines_paid, 15);
}

#[test]
fn group_records_come_back_in_actor_order() {
    let store = SqliteStore::in_memory().unwrap();
    for actor in [30, 10, 20] {
        let mut record = MemberCriminalRecord::default();
        record.total_successful_crimes = actor;
        store.save_member_record(member(actor), &record).unwrap();
    }
    store
        .save_member_record(MemberKey::new(9, 5), &MemberCriminalRecord::default())
        .unwrap();

    let actors: Vec<u64> = store
        .group_member_records(1)
        .unwrap()
        .into_iter()
        .map(|(actor, record)| {
            assert_eq!(record.total_successful_crimes, actor);
            actor
        })
        .collect();
    assert_eq!(actors, vec![10, 20, 30]);
}

#[test]
fn settings_round_trip_with_validation() {
    let store = SqliteStore::in_memory().unwrap();
    assert!(store.group_settings(1).unwrap().is_none());
    assert_eq!(store.settings_revision(1).unwrap(), 0);

    let mut settings = GuildCrimeSettings::default();
    settings.bail_cost_multiplier = 2.5;
    settings.random_cooldown_secs = 60;
    store.set_group_settings(1, &settings).unwrap();
    assert_eq!(store.group_settings(1).unwrap(), Some(settings.clone()));
    assert_eq!(store.settings_revision(1).unwrap(), 1);

    let mut bad = settings.clone();
    bad.bail_cost_multiplier = -1.0;
    let err = store.set_group_settings(1, &bad).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(store.group_settings(1).unwrap(), Some(settings));
    assert_eq!(store.settings_revision(1).unwrap(), 1);
}

#[test]
fn unknown_schema_versions_are_refused() {
    let path = temp_db("schema");
    let store = SqliteStore::open(&path).unwrap();
    store.set_group_settings(1, &GuildCrimeSettings::default()).unwrap();
    store.save_member_record(member(1), &MemberCriminalRecord::default()).unwrap();

    let raw = rusqlite::Connection::open(&path).unwrap();
    raw.execute_batch(
        "UPDATE group_settings SET schema_version = 99;
         UPDATE member_record SET schema_version = 99;",
    )
    .unwrap();
    drop(raw);

    assert!(store.group_settings(1).is_err());
    let _ = std::fs::remove_file(&path);
}

#[test]
fn file_store_survives_reopen() {
    let path = temp_db("reopen");
    let store = SqliteStore::open(&path).unwrap();
    let mut record = MemberCriminalRecord::default();
    record.highest_streak = 7;
    store.save_member_record(member(3), &record).unwrap();
    store.set_balance(member(3), 500).unwrap();

    let again = store.reopen().unwrap();
    assert_eq!(again.member_record(member(3)).unwrap().highest_streak, 7);
    assert_eq!(again.balance(member(3)).unwrap(), 500);
    again.migrate().expect("migrations are idempotent");
    drop(store);
    drop(again);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn ledger_moves_credits_and_refuses_overdrafts() {
    let store = SqliteStore::in_memory().unwrap();
    assert_eq!(store.balance(member(1)).unwrap(), 0);
    assert_eq!(store.deposit(member(1), 300).unwrap(), 300);
    assert_eq!(store.withdraw(member(1), 120).unwrap(), 180);
    assert!(store.can_spend(member(1), 180).unwrap());
    assert!(!store.can_spend(member(1), 181).unwrap());

    let err = store.withdraw(member(1), 500).unwrap_err();
    assert!(matches!(err, CrimeError::InsufficientFunds { needed: 500, available: 180 }));
    assert_eq!(store.balance(member(1)).unwrap(), 180);

    assert!(store.set_balance(member(1), -5).is_err());
}

#[test]
fn currency_name_defaults_per_group() {
    let store = SqliteStore::in_memory().unwrap();
    assert_eq!(store.currency_name(1).unwrap(), DEFAULT_CURRENCY_NAME);
    store.set_currency_name(1, "doubloons").unwrap();
    assert_eq!(store.currency_name(1).unwrap(), "doubloons");
    assert_eq!(store.currency_name(2).unwrap(), DEFAULT_CURRENCY_NAME);
}

#[test]
fn perks_are_per_member_and_idempotent() {
    let store = SqliteStore::in_memory().unwrap();
    store.grant_perk(member(1), "jail_reducer").unwrap();
    store.grant_perk(member(1), "jail_reducer").unwrap();
    assert!(store.has_perk(member(1), "jail_reducer").unwrap());
    assert!(!store.has_perk(member(2), "jail_reducer").unwrap());
    assert!(!store.has_perk(member(1), "notify_on_release").unwrap());
}

#[test]
fn journal_keeps_member_and_group_events_in_order() {
    let store = SqliteStore::in_memory().unwrap();
    let released = CrimeEvent::Released { reason: ReleaseReason::Bail };
    store
        .append(&EventLogEntry::for_member("incarceration", member(1), 100, &released).unwrap())
        .unwrap();
    store
        .append(&EventLogEntry::for_group("admin", 1, 101, &CrimeEvent::NotifyToggled { enabled: true }).unwrap())
        .unwrap();
    store
        .append(&EventLogEntry::for_member("incarceration", member(2), 102, &released).unwrap())
        .unwrap();

    let group = store.events_for_group(1).unwrap();
    assert_eq!(group.len(), 3);
    assert!(group.windows(2).all(|w| w[0].id < w[1].id));
    assert_eq!(group[1].actor, None);

    let mine = store.events_for_member(member(1)).unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].event_type, "released");
    assert_eq!(mine[0].at, 100);
    let parsed: CrimeEvent = serde_json::from_str(&mine[0].payload).unwrap();
    assert_eq!(parsed, released);

    assert_eq!(store.count_events(1, "released").unwrap(), 2);
    assert_eq!(store.count_events(2, "released").unwrap(), 0);
}
