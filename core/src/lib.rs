//! crime-core — crime resolution and incarceration engine.
//!
//! Leaves first: types, rng, clock, config, scenario registry, modifier
//! pipeline, streaks; then the incarceration, notification and resolution
//! subsystems; `engine::CrimeEngine` wires them to the collaborators.

pub mod clock;
pub mod collaborator;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod incarceration_subsystem;
pub mod leaderboard;
pub mod locks;
pub mod modifier_pipeline;
pub mod notification_subsystem;
pub mod outcome;
pub mod record;
pub mod resolution_subsystem;
pub mod rng;
pub mod scenario_registry;
pub mod scheduler;
pub mod store;
pub mod streak;
pub mod types;
