//! Shared primitive types used across the entire engine.

use serde::{Deserialize, Serialize};

/// Unix timestamp in whole seconds.
pub type Timestamp = i64;

/// Whole currency units. Signed so deltas and balances share a type.
pub type Credits = i64;

/// Opaque identifier of a participant, assigned by the platform.
pub type ActorId = u64;

/// Opaque identifier of an isolated configuration/state scope.
pub type GroupId = u64;

/// Opaque reference to the channel a sentence was handed out in.
pub type ChannelRef = u64;

/// A criminal record is scoped to one actor inside one group.
/// Locks, records and pending notifications are all keyed by this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MemberKey {
    pub group: GroupId,
    pub actor: ActorId,
}

impl MemberKey {
    pub fn new(group: GroupId, actor: ActorId) -> Self {
        Self { group, actor }
    }
}

impl std::fmt::Display for MemberKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.group, self.actor)
    }
}
