//! The audit log — every state change the engine makes.
//!
//! RULE: Every mutation of a record, a balance or a group's settings
//! appends exactly one `CrimeEvent` to the journal.
//! Variants are only ever appended, never removed or reordered.

use crate::{
    error::CrimeResult,
    types::{ActorId, ChannelRef, Credits, GroupId, MemberKey, Timestamp},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CrimeEvent {
    // ── Resolution ─────────────────────────────────
    CrimeResolved {
        crime:         String,
        scenario:      Option<String>,
        target:        Option<ActorId>,
        success:       bool,
        amount:        Credits,
        fine:          Credits,
        jail_secs:     i64,
        final_chance:  f64,
        roll:          f64,
        credits_delta: Credits,
        streak:        u32,
    },

    // ── Incarceration ──────────────────────────────
    Jailed {
        until:           Timestamp,
        duration_secs:   i64,
        reducer_applied: bool,
        channel:         Option<ChannelRef>,
    },
    Released {
        reason: ReleaseReason,
    },
    BailPaid {
        cost:           Credits,
        remaining_secs: i64,
    },
    JailbreakAttempted {
        scenario:      String,
        credits_delta: Credits,
    },
    JailbreakResolved {
        scenario:   String,
        escaped:    bool,
        added_secs: i64,
        roll:       Option<f64>,
    },
    ReleaseNotified {
        channel: Option<ChannelRef>,
    },
    NotifyToggled {
        enabled: bool,
    },

    // ── Administration ─────────────────────────────
    SettingsChanged {
        command: String,
    },
    ScenarioAdded {
        name: String,
    },
    ScenarioRemoved {
        name: String,
    },
    PerkGranted {
        perk: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseReason {
    Bail,
    Escape,
    Admin,
}

impl CrimeEvent {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::CrimeResolved { .. }      => "crime_resolved",
            Self::Jailed { .. }             => "jailed",
            Self::Released { .. }           => "released",
            Self::BailPaid { .. }           => "bail_paid",
            Self::JailbreakAttempted { .. } => "jailbreak_attempted",
            Self::JailbreakResolved { .. }  => "jailbreak_resolved",
            Self::ReleaseNotified { .. }    => "release_notified",
            Self::NotifyToggled { .. }      => "notify_toggled",
            Self::SettingsChanged { .. }    => "settings_changed",
            Self::ScenarioAdded { .. }      => "scenario_added",
            Self::ScenarioRemoved { .. }    => "scenario_removed",
            Self::PerkGranted { .. }        => "perk_granted",
        }
    }
}

/// The event log entry as persisted to SQLite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id:         Option<i64>,
    pub group:      GroupId,
    /// None for group-wide events such as settings changes.
    pub actor:      Option<ActorId>,
    pub at:         Timestamp,
    pub subsystem:  String,
    pub event_type: String,
    pub payload:    String, // JSON-serialized CrimeEvent
}

impl EventLogEntry {
    pub fn for_member(
        subsystem: &str,
        member: MemberKey,
        at: Timestamp,
        event: &CrimeEvent,
    ) -> CrimeResult<Self> {
        Self::build(subsystem, member.group, Some(member.actor), at, event)
    }

    pub fn for_group(
        subsystem: &str,
        group: GroupId,
        at: Timestamp,
        event: &CrimeEvent,
    ) -> CrimeResult<Self> {
        Self::build(subsystem, group, None, at, event)
    }

    fn build(
        subsystem: &str,
        group: GroupId,
        actor: Option<ActorId>,
        at: Timestamp,
        event: &CrimeEvent,
    ) -> CrimeResult<Self> {
        Ok(Self {
            id:         None,
            group,
            actor,
            at,
            subsystem:  subsystem.to_string(),
            event_type: event.type_name().to_string(),
            payload:    serde_json::to_string(event)?,
        })
    }

    pub fn event(&self) -> CrimeResult<CrimeEvent> {
        Ok(serde_json::from_str(&self.payload)?)
    }
}
