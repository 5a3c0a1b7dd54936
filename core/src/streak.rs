//! Streak tracker — consecutive successes drive a reward multiplier.
//!
//! The curve is configuration: an ordered list of tiers, each applying
//! from `min_streak` upward. Validation guarantees the result is
//! monotonic non-decreasing in streak length and never below 1.0.

use crate::{error::ValidationError, record::MemberCriminalRecord};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StreakTier {
    pub min_streak: u32,
    pub multiplier: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StreakCurve {
    pub tiers: Vec<StreakTier>,
}

impl Default for StreakCurve {
    fn default() -> Self {
        Self {
            tiers: vec![
                StreakTier { min_streak: 0,  multiplier: 1.0  },
                StreakTier { min_streak: 3,  multiplier: 1.1  },
                StreakTier { min_streak: 5,  multiplier: 1.25 },
                StreakTier { min_streak: 8,  multiplier: 1.5  },
                StreakTier { min_streak: 12, multiplier: 2.0  },
            ],
        }
    }
}

impl StreakCurve {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let first = self
            .tiers
            .first()
            .ok_or_else(|| ValidationError::StreakCurve("no tiers".into()))?;
        if first.min_streak != 0 {
            return Err(ValidationError::StreakCurve(
                "first tier must start at streak 0".into(),
            ));
        }
        if first.multiplier.is_nan() || first.multiplier < 1.0 {
            return Err(ValidationError::StreakCurve(format!(
                "floor multiplier {} is below 1.0",
                first.multiplier
            )));
        }
        for pair in self.tiers.windows(2) {
            if pair[1].min_streak <= pair[0].min_streak {
                return Err(ValidationError::StreakCurve(format!(
                    "tier at streak {} is out of order",
                    pair[1].min_streak
                )));
            }
            if pair[1].multiplier.is_nan() || pair[1].multiplier < pair[0].multiplier {
                return Err(ValidationError::StreakCurve(format!(
                    "multiplier drops at streak {}",
                    pair[1].min_streak
                )));
            }
        }
        Ok(())
    }

    /// Baseline multiplier, used after any failure.
    pub fn floor(&self) -> f64 {
        self.tiers.first().map(|t| t.multiplier).unwrap_or(1.0)
    }

    /// Multiplier earned by a streak of `streak` consecutive successes.
    pub fn multiplier_for(&self, streak: u32) -> f64 {
        self.tiers
            .iter()
            .take_while(|t| t.min_streak <= streak)
            .last()
            .map(|t| t.multiplier)
            .unwrap_or_else(|| self.floor())
    }
}

/// Apply a success to the record's streak fields.
pub fn record_success(record: &mut MemberCriminalRecord, curve: &StreakCurve) {
    record.current_streak += 1;
    record.highest_streak = record.highest_streak.max(record.current_streak);
    record.streak_multiplier = curve.multiplier_for(record.current_streak);
}

/// Apply a failure: the streak and its multiplier drop to the floor.
pub fn record_failure(record: &mut MemberCriminalRecord, curve: &StreakCurve) {
    record.current_streak = 0;
    record.streak_multiplier = curve.floor();
}
