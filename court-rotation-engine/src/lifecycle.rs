//! Cleanup passes and the structural invariants they restore.

use std::collections::{HashMap, HashSet};

use rand::Rng;
use tracing::{debug, warn};

use crate::engine::Engine;
use crate::model::{Group, ParticipantId, StationId, Status, GROUP_CAPACITY};
use crate::store::EntityStore;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("the group sequence is empty")]
    NoGroups,
    #[error("group {index} holds {len} participants")]
    GroupOverCapacity { index: usize, len: usize },
    #[error("station {id} is partially occupied by {len} participants")]
    PartialStation { id: StationId, len: usize },
    #[error("station {0} has a start time exactly when it should not")]
    SessionClock(StationId),
    #[error("participant {0} is referenced but does not exist")]
    UnknownMember(ParticipantId),
    #[error("participant {0} is referenced more than once")]
    DuplicateMember(ParticipantId),
    #[error("participant id {0} is used by more than one record")]
    DuplicateParticipant(ParticipantId),
    #[error("participant {id} is {actual} but should be {expected}")]
    StatusMismatch {
        id: ParticipantId,
        actual: Status,
        expected: Status,
    },
}

/// Where each referenced participant sits, derived from group and station membership.
fn memberships(
    store: &EntityStore,
) -> Result<HashMap<&ParticipantId, Status>, InvariantViolation> {
    let mut placed = HashMap::new();
    let references = store
        .groups()
        .iter()
        .flat_map(|group| group.members().iter().map(|id| (id, Status::Staged)))
        .chain(store.stations().iter().flat_map(|station| {
            station.occupants.iter().map(|id| (id, Status::Active))
        }));
    for (id, status) in references {
        if store.participant(id).is_none() {
            return Err(InvariantViolation::UnknownMember(id.clone()));
        }
        if placed.insert(id, status).is_some() {
            return Err(InvariantViolation::DuplicateMember(id.clone()));
        }
    }
    Ok(placed)
}

/// Returns the first broken invariant of `store`, if any.
pub fn check_invariants(store: &EntityStore) -> Result<(), InvariantViolation> {
    if store.groups().is_empty() {
        return Err(InvariantViolation::NoGroups);
    }
    let mut ids = HashSet::new();
    for participant in store.participants() {
        if !ids.insert(&participant.id) {
            return Err(InvariantViolation::DuplicateParticipant(participant.id.clone()));
        }
    }
    for (index, group) in store.groups().iter().enumerate() {
        if group.len() > GROUP_CAPACITY {
            return Err(InvariantViolation::GroupOverCapacity {
                index,
                len: group.len(),
            });
        }
    }
    for station in store.stations() {
        let len = station.occupants.len();
        if len != 0 && len != GROUP_CAPACITY {
            return Err(InvariantViolation::PartialStation {
                id: station.id.clone(),
                len,
            });
        }
        if station.is_active() != station.started_at.is_some() {
            return Err(InvariantViolation::SessionClock(station.id.clone()));
        }
    }
    let placed = memberships(store)?;
    for participant in store.participants() {
        let expected = placed.get(&participant.id).copied().unwrap_or(Status::Pool);
        if participant.status != expected {
            return Err(InvariantViolation::StatusMismatch {
                id: participant.id.clone(),
                actual: participant.status,
                expected,
            });
        }
    }
    Ok(())
}

impl<R: Rng> Engine<R> {
    /// Strips group members that no longer resolve to a participant.
    pub fn sanitize(&mut self) {
        let known: HashSet<ParticipantId> = self
            .store
            .participants()
            .iter()
            .map(|participant| participant.id.clone())
            .collect();
        let mut stripped = 0_usize;
        for group in self.store.groups_mut() {
            let before = group.len();
            group.retain(|id| known.contains(id));
            stripped += before - group.len();
        }
        if stripped > 0 {
            debug!(stripped, "removed stale group members");
        }
    }

    /// Repairs a store that did not come from this engine, e.g. one restored from snapshots
    /// that were saved independently of each other.
    ///
    /// Only the first record of a participant id survives. Membership wins over the recorded
    /// status: stations come first, then groups in order, and whoever is referenced twice keeps
    /// the first place only. Stations that are not exactly full are closed without counting the
    /// session.
    pub(crate) fn normalize(&mut self) {
        let mut seen = HashSet::new();
        self.store.retain_participants(|participant| {
            let first = seen.insert(participant.id.clone());
            if !first {
                warn!(
                    id = %participant.id,
                    participant = %participant.name,
                    "dropping duplicate participant"
                );
            }
            first
        });
        self.sanitize();
        let known: HashSet<ParticipantId> = self
            .store
            .participants()
            .iter()
            .map(|participant| participant.id.clone())
            .collect();
        let mut placed: HashMap<ParticipantId, Status> = HashMap::new();

        let fallback_start = (self.clock)();
        for station in self.store.stations_mut() {
            let mut seen = HashSet::new();
            let intact = station.occupants.len() == GROUP_CAPACITY
                && station.occupants.iter().all(|id| {
                    known.contains(id) && !placed.contains_key(id) && seen.insert(id.clone())
                });
            if intact {
                placed.extend(station.occupants.iter().map(|id| (id.clone(), Status::Active)));
                if station.started_at.is_none() {
                    station.started_at = Some(fallback_start);
                }
            } else {
                if station.is_active() {
                    warn!(
                        id = %station.id,
                        occupants = station.occupants.len(),
                        "closing inconsistent station"
                    );
                }
                station.finish();
            }
        }

        for group in self.store.groups_mut() {
            group.retain(|id| {
                !placed.contains_key(id) && placed.insert(id.clone(), Status::Staged).is_none()
            });
            if group.len() > GROUP_CAPACITY {
                for id in &group.members()[GROUP_CAPACITY..] {
                    placed.remove(id);
                }
                group.truncate(GROUP_CAPACITY);
            }
        }
        if self.store.groups().is_empty() {
            self.store.push_group(Group::default());
        }

        for participant in self.store.participants_mut() {
            let expected = placed.get(&participant.id).copied().unwrap_or(Status::Pool);
            if participant.status != expected {
                debug!(
                    id = %participant.id,
                    from = %participant.status,
                    to = %expected,
                    "corrected participant status"
                );
                participant.status = expected;
            }
        }

        if let Err(violation) = check_invariants(&self.store) {
            warn!(%violation, "state is still inconsistent after normalization");
        }
    }
}
