use crate::types::Credits;
use thiserror::Error;

/// Bad configuration input. Rejected before anything is persisted.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{field} must be within [0, 1], got {value}")]
    RateOutOfRange { field: &'static str, value: f64 },

    #[error("{field} must not be negative, got {value}")]
    Negative { field: &'static str, value: f64 },

    #[error("max_reward ({max}) must be >= min_reward ({min})")]
    RewardRange { min: Credits, max: Credits },

    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("Unknown risk tier '{0}' (expected low, medium or high)")]
    UnknownRiskTier(String),

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Streak curve invalid: {0}")]
    StreakCurve(String),

    #[error("Jail time must be positive, got {0} minutes")]
    NonPositiveJailTime(i64),
}

#[derive(Error, Debug)]
pub enum CrimeError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Validation(#[from] ValidationError),

    // ── State conflicts ───────────────────────────────────────────
    #[error("Actor is in jail for another {remaining_secs}s")]
    InJail { remaining_secs: i64 },

    #[error("Actor is not in jail")]
    NotJailed,

    #[error("'{crime}' is on cooldown for another {remaining_secs}s")]
    CooldownActive { crime: String, remaining_secs: i64 },

    #[error("A jailbreak was already attempted during this sentence")]
    AlreadyAttempted,

    // ── Resource errors ───────────────────────────────────────────
    #[error("Insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: Credits, available: Credits },

    #[error("Bail is disabled in this group")]
    BailDisabled,

    #[error("Target balance {balance} is below the minimum of {minimum}")]
    TargetTooPoor { balance: Credits, minimum: Credits },

    #[error("The '{0}' perk is required")]
    PerkRequired(String),

    // ── Lookup / scenario management ──────────────────────────────
    #[error("Scenario '{name}' not found")]
    NotFound { name: String },

    #[error("Scenario '{name}' already exists")]
    DuplicateName { name: String },

    #[error("Cannot pick from an empty pool")]
    EmptyPool,

    #[error("Unknown crime type '{0}'")]
    UnknownCrimeType(String),

    #[error("Crime type '{0}' is disabled")]
    CrimeDisabled(String),

    #[error("Crime type '{0}' requires a target")]
    TargetRequired(String),

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Coarse classification the caller uses to decide how to report an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    StateConflict,
    Resource,
    NotFound,
    Duplicate,
    Internal,
}

impl CrimeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_)
            | Self::TargetRequired(_)
            | Self::InvalidTarget(_) => ErrorKind::Validation,
            Self::InJail { .. }
            | Self::NotJailed
            | Self::CooldownActive { .. }
            | Self::AlreadyAttempted
            | Self::CrimeDisabled(_) => ErrorKind::StateConflict,
            Self::InsufficientFunds { .. }
            | Self::BailDisabled
            | Self::TargetTooPoor { .. }
            | Self::PerkRequired(_) => ErrorKind::Resource,
            Self::NotFound { .. }
            | Self::UnknownCrimeType(_)
            | Self::EmptyPool => ErrorKind::NotFound,
            Self::DuplicateName { .. } => ErrorKind::Duplicate,
            Self::Database(_)
            | Self::Serialization(_)
            | Self::Ledger(_)
            | Self::Other(_) => ErrorKind::Internal,
        }
    }
}

pub type CrimeResult<T> = Result<T, CrimeError>;
