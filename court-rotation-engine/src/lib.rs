//! Allocation engine rotating participants from a shared pool through four-player stations.
//!
//! Participants wait in the pool, get staged into groups of up to four, play on a station once
//! their group is full, and return to the pool with one more completed session afterwards.

mod engine;
mod lifecycle;
pub mod model;
pub mod selection;
mod store;

pub use engine::{Declined, Engine, Outcome};
pub use lifecycle::{check_invariants, InvariantViolation};
pub use model::{
    Category, Group, Participant, ParticipantChanges, ParticipantId, SkillTier, Station,
    StationId, Status, Timestamp, GROUP_CAPACITY,
};
pub use store::EntityStore;
