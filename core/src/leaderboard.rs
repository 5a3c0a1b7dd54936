//! Per-group rankings over the cumulative record counters.
//!
//! RULE: Pure over a slice of records. The engine fetches them; nothing
//! here touches the store or the clock.

use crate::{
    record::MemberCriminalRecord,
    types::{ActorId, Credits},
};
use serde::{Deserialize, Serialize};

pub const LEADERBOARD_SIZE: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaderboardCategory {
    Earnings,
    /// Successful plus failed attempts.
    Crimes,
    /// Stolen from others plus stolen by others.
    Stolen,
    LargestHeist,
    /// Fines plus bail.
    Fines,
    Streaks,
}

impl LeaderboardCategory {
    pub const ALL: [LeaderboardCategory; 6] = [
        Self::Earnings,
        Self::Crimes,
        Self::Stolen,
        Self::LargestHeist,
        Self::Fines,
        Self::Streaks,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Earnings     => "earnings",
            Self::Crimes       => "crimes",
            Self::Stolen       => "stolen",
            Self::LargestHeist => "largest_heist",
            Self::Fines        => "fines",
            Self::Streaks      => "streaks",
        }
    }

    /// The components shown for one record; the ranking key is their sum.
    fn parts(&self, record: &MemberCriminalRecord) -> Vec<i64> {
        match self {
            Self::Earnings => vec![record.total_credits_earned],
            Self::Crimes => vec![
                record.total_successful_crimes as i64,
                record.total_failed_crimes as i64,
            ],
            Self::Stolen => vec![record.total_stolen_from, record.total_stolen_by],
            Self::LargestHeist => vec![record.largest_heist],
            Self::Fines => vec![record.total_fines_paid, record.total_bail_paid],
            Self::Streaks => vec![record.highest_streak as i64],
        }
    }

    /// Whether the values are currency amounts.
    pub fn is_credits(&self) -> bool {
        !matches!(self, Self::Crimes | Self::Streaks)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub actor: ActorId,
    pub value: Credits,
    pub parts: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardSection {
    pub category: LeaderboardCategory,
    pub entries:  Vec<LeaderboardEntry>,
}

/// Top entries for one category. Members with nothing to show are left
/// out; ties go to the lower actor id.
pub fn rank(
    category: LeaderboardCategory,
    records: &[(ActorId, MemberCriminalRecord)],
) -> LeaderboardSection {
    let mut entries: Vec<LeaderboardEntry> = records
        .iter()
        .map(|(actor, record)| {
            let parts = category.parts(record);
            LeaderboardEntry { actor: *actor, value: parts.iter().sum(), parts }
        })
        .filter(|entry| entry.value > 0)
        .collect();
    entries.sort_by(|a, b| b.value.cmp(&a.value).then(a.actor.cmp(&b.actor)));
    entries.truncate(LEADERBOARD_SIZE);
    LeaderboardSection { category, entries }
}

/// Every category, in display order. Empty categories are kept so the
/// presenter can decide how to show them.
pub fn leaderboard(records: &[(ActorId, MemberCriminalRecord)]) -> Vec<LeaderboardSection> {
    LeaderboardCategory::ALL
        .iter()
        .map(|category| rank(*category, records))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(earned: Credits, wins: u64, fails: u64) -> MemberCriminalRecord {
        MemberCriminalRecord {
            total_credits_earned: earned,
            total_successful_crimes: wins,
            total_failed_crimes: fails,
            ..Default::default()
        }
    }

    #[test]
    fn ranks_top_three_descending() {
        let records = vec![
            (1, record(100, 1, 0)),
            (2, record(500, 2, 3)),
            (3, record(300, 0, 1)),
            (4, record(900, 4, 4)),
        ];
        let section = rank(LeaderboardCategory::Earnings, &records);
        let actors: Vec<_> = section.entries.iter().map(|e| e.actor).collect();
        assert_eq!(actors, vec![4, 2, 3]);
    }

    #[test]
    fn combined_categories_rank_by_sum() {
        let records = vec![(1, record(0, 5, 0)), (2, record(0, 1, 6))];
        let section = rank(LeaderboardCategory::Crimes, &records);
        assert_eq!(section.entries[0].actor, 2);
        assert_eq!(section.entries[0].parts, vec![1, 6]);
        assert_eq!(section.entries[0].value, 7);
    }

    #[test]
    fn zero_rows_are_skipped_and_ties_break_by_actor() {
        let records = vec![(9, record(50, 0, 0)), (3, record(50, 0, 0)), (5, record(0, 0, 0))];
        let section = rank(LeaderboardCategory::Earnings, &records);
        let actors: Vec<_> = section.entries.iter().map(|e| e.actor).collect();
        assert_eq!(actors, vec![3, 9]);
        assert!(rank(LeaderboardCategory::Streaks, &records).entries.is_empty());
    }
}
