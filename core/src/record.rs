//! The per-actor, per-group criminal record.
//!
//! RULE: `jail_until` is authoritative. "Currently jailed" means
//! `jail_until > now`, nothing else. Cooldowns are a separate axis.

use crate::{
    error::{CrimeError, CrimeResult},
    types::{ActorId, ChannelRef, Credits, Timestamp},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Bump when the record's shape changes; `from_blob` refuses other versions.
pub const RECORD_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemberCriminalRecord {
    // ── Incarceration ─────────────────────────────────────────────
    pub jail_until:              Timestamp,
    pub attempted_jailbreak:     bool,
    pub jail_channel:            Option<ChannelRef>,
    pub notify_on_release:       bool,
    pub notify_unlocked:         bool,
    /// Set by `begin_jailbreak`, taken by `finish_jailbreak`.
    #[serde(default)]
    pub pending_jailbreak:       Option<PendingJailbreak>,

    // ── Streak ────────────────────────────────────────────────────
    pub current_streak:          u32,
    pub streak_multiplier:       f64,
    pub highest_streak:          u32,

    // ── Activity ──────────────────────────────────────────────────
    pub last_target:             Option<ActorId>,
    /// Last attempt timestamp per crime key, for cooldowns.
    pub last_attempts:           BTreeMap<String, Timestamp>,
    pub purchased_perks:         BTreeSet<String>,

    // ── Cumulative counters ───────────────────────────────────────
    pub total_credits_earned:    Credits,
    pub total_successful_crimes: u64,
    pub total_failed_crimes:     u64,
    pub total_stolen_from:       Credits,
    pub total_stolen_by:         Credits,
    pub total_fines_paid:        Credits,
    pub total_bail_paid:         Credits,
    pub largest_heist:           Credits,
}

/// An escape that was started but not yet rolled. Only the attempt
/// begun for this exact sentence may finish it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PendingJailbreak {
    pub operation:  u64,
    pub jail_until: Timestamp,
}

impl Default for MemberCriminalRecord {
    fn default() -> Self {
        Self {
            jail_until:              0,
            attempted_jailbreak:     false,
            jail_channel:            None,
            notify_on_release:       false,
            notify_unlocked:         false,
            pending_jailbreak:       None,
            current_streak:          0,
            streak_multiplier:       1.0,
            highest_streak:          0,
            last_target:             None,
            last_attempts:           BTreeMap::new(),
            purchased_perks:         BTreeSet::new(),
            total_credits_earned:    0,
            total_successful_crimes: 0,
            total_failed_crimes:     0,
            total_stolen_from:       0,
            total_stolen_by:         0,
            total_fines_paid:        0,
            total_bail_paid:         0,
            largest_heist:           0,
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RecordBlob {
    schema_version: u32,
    record:         MemberCriminalRecord,
}

impl MemberCriminalRecord {
    pub fn is_jailed(&self, now: Timestamp) -> bool {
        self.jail_until > now
    }

    /// Seconds left on the sentence, never negative.
    pub fn jail_remaining(&self, now: Timestamp) -> i64 {
        (self.jail_until - now).max(0)
    }

    /// Seconds until `crime` may be attempted again, never negative.
    pub fn cooldown_remaining(&self, crime: &str, cooldown_secs: u64, now: Timestamp) -> i64 {
        match self.last_attempts.get(crime) {
            Some(last) => (last + cooldown_secs as i64 - now).max(0),
            None => 0,
        }
    }

    pub fn has_perk(&self, perk: &str) -> bool {
        self.purchased_perks.contains(perk)
    }

    /// Share of attempts that succeeded, or None before the first attempt.
    pub fn success_rate(&self) -> Option<f64> {
        let total = self.total_successful_crimes + self.total_failed_crimes;
        (total > 0).then(|| self.total_successful_crimes as f64 / total as f64)
    }

    pub fn to_blob(&self) -> CrimeResult<String> {
        let blob = RecordBlob {
            schema_version: RECORD_SCHEMA_VERSION,
            record:         self.clone(),
        };
        Ok(serde_json::to_string(&blob)?)
    }

    pub fn from_blob(json: &str) -> CrimeResult<Self> {
        let blob: RecordBlob = serde_json::from_str(json)?;
        if blob.schema_version != RECORD_SCHEMA_VERSION {
            return Err(CrimeError::Other(anyhow::anyhow!(
                "unsupported record schema version {} (expected {})",
                blob.schema_version,
                RECORD_SCHEMA_VERSION
            )));
        }
        Ok(blob.record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_round_trip_keeps_every_field() {
        let mut record = MemberCriminalRecord {
            jail_until: 1_700_000_900,
            attempted_jailbreak: true,
            jail_channel: Some(12),
            notify_on_release: true,
            current_streak: 4,
            streak_multiplier: 1.1,
            highest_streak: 9,
            last_target: Some(77),
            total_credits_earned: 1_234,
            largest_heist: 800,
            ..Default::default()
        };
        record.last_attempts.insert("random".into(), 1_700_000_000);
        record.purchased_perks.insert("jail_reducer".into());

        let blob = record.to_blob().unwrap();
        assert!(blob.contains("\"schema_version\""));
        assert_eq!(MemberCriminalRecord::from_blob(&blob).unwrap(), record);
    }

    #[test]
    fn foreign_schema_version_is_rejected() {
        let blob = MemberCriminalRecord::default()
            .to_blob()
            .unwrap()
            .replace(&format!("\"schema_version\":{RECORD_SCHEMA_VERSION}"), "\"schema_version\":99");
        assert!(MemberCriminalRecord::from_blob(&blob).is_err());
    }

    #[test]
    fn jail_and_cooldown_are_independent() {
        let mut record = MemberCriminalRecord::default();
        assert!(!record.is_jailed(100));
        record.jail_until = 200;
        assert!(record.is_jailed(199));
        assert!(!record.is_jailed(200));
        assert_eq!(record.jail_remaining(150), 50);
        assert_eq!(record.jail_remaining(500), 0);

        record.last_attempts.insert("mugging".into(), 100);
        assert_eq!(record.cooldown_remaining("mugging", 60, 130), 30);
        assert_eq!(record.cooldown_remaining("mugging", 60, 400), 0);
        assert_eq!(record.cooldown_remaining("pickpocket", 60, 130), 0);
        assert_eq!(record.success_rate(), None);
    }
}
