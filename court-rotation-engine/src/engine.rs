use rand::rngs::StdRng;
use rand::{Rng, SeedableRng as _};
use tracing::debug;

use crate::model::{
    Category, Group, Participant, ParticipantChanges, ParticipantId, SkillTier, Station,
    StationId, Status, Timestamp, GROUP_CAPACITY,
};
use crate::selection::selection_queue;
use crate::store::EntityStore;

const STATION_NAME_PREFIX: &str = "Court ";

/// Why an operation left every entity untouched.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Declined {
    #[error("participant {0} does not exist")]
    UnknownParticipant(ParticipantId),
    #[error("participant {id} is {status}, not waiting in the pool")]
    NotInPool { id: ParticipantId, status: Status },
    #[error("participant name must not be empty")]
    EmptyName,
    #[error("the edit does not change any field")]
    NoChanges,
    #[error("every group is full")]
    NoCapacity,
    #[error("nobody is waiting in the pool")]
    EmptyPool,
    #[error("group {0} does not exist")]
    UnknownGroup(usize),
    #[error("group {index} has {len} of {capacity} participants", capacity = GROUP_CAPACITY)]
    GroupNotFull { index: usize, len: usize },
    #[error("group {group} has no participant in slot {slot}")]
    EmptySlot { group: usize, slot: usize },
    #[error("station {0} does not exist")]
    UnknownStation(StationId),
    #[error("station {0} is already in a session")]
    StationBusy(StationId),
    #[error("station {0} is idle")]
    StationIdle(StationId),
}

/// `Ok` when the operation was applied, otherwise the unmet precondition.
pub type Outcome<T = ()> = Result<T, Declined>;

/// Owns the [`EntityStore`] and performs every transition between pool, groups and stations.
///
/// Each operation checks its preconditions before touching anything, so a declined operation
/// never leaves a partial update behind.
#[derive(Debug)]
pub struct Engine<R = StdRng> {
    pub(crate) store: EntityStore,
    rng: R,
    pub(crate) clock: fn() -> Timestamp,
    repaired: bool,
}

impl Engine<StdRng> {
    /// Engine with an entropy-seeded shuffle.
    #[must_use]
    pub fn new(store: EntityStore) -> Self {
        Self::with_rng(store, StdRng::from_entropy())
    }

    /// Engine whose first-round shuffles are reproducible.
    #[must_use]
    pub fn seeded(store: EntityStore, seed: u64) -> Self {
        Self::with_rng(store, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> Engine<R> {
    /// Takes ownership of `store`, repairing anything a restored snapshot may have broken.
    pub fn with_rng(store: EntityStore, rng: R) -> Self {
        let restored = store.clone();
        let mut engine = Self {
            store,
            rng,
            clock: Timestamp::now,
            repaired: false,
        };
        engine.normalize();
        engine.repaired = engine.store != restored;
        engine
    }

    #[must_use]
    pub fn with_clock(mut self, clock: fn() -> Timestamp) -> Self {
        self.clock = clock;
        self
    }

    /// Whether the store handed to the constructor had to be repaired.
    #[must_use]
    pub const fn was_repaired(&self) -> bool {
        self.repaired
    }

    #[must_use]
    pub const fn state(&self) -> &EntityStore {
        &self.store
    }

    #[must_use]
    pub fn into_state(self) -> EntityStore {
        self.store
    }

    pub fn create_participant(
        &mut self,
        name: &str,
        category: Category,
        tier: SkillTier,
    ) -> Outcome<ParticipantId> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Declined::EmptyName);
        }
        let id = loop {
            let candidate = ParticipantId::random(&mut self.rng);
            if self.store.participant(&candidate).is_none() {
                break candidate;
            }
        };
        self.store
            .insert_participant(Participant::new(id.clone(), name, category, tier));
        self.sanitize();
        debug!(%id, participant = name, "created participant");
        Ok(id)
    }

    /// Updates descriptive fields only; status, session counter and membership stay as they are.
    pub fn edit_participant(
        &mut self,
        id: &ParticipantId,
        changes: ParticipantChanges,
    ) -> Outcome {
        if changes.is_empty() {
            return Err(Declined::NoChanges);
        }
        let name = match changes.name {
            Some(name) if name.trim().is_empty() => return Err(Declined::EmptyName),
            Some(name) => Some(name.trim().to_owned()),
            None => None,
        };
        let participant = self
            .store
            .participant_mut(id)
            .ok_or_else(|| Declined::UnknownParticipant(id.clone()))?;
        if let Some(name) = name {
            participant.name = name;
        }
        if let Some(category) = changes.category {
            participant.category = category;
        }
        if let Some(tier) = changes.tier {
            participant.tier = tier;
        }
        debug!(%id, "edited participant");
        Ok(())
    }

    /// Removes the participant together with every reference to it.
    ///
    /// Deleting a playing participant aborts its station's session: a station is never left
    /// partially occupied, and an aborted session does not count as completed for anybody.
    pub fn delete_participant(&mut self, id: &ParticipantId) -> Outcome {
        let status = self
            .store
            .participant(id)
            .ok_or_else(|| Declined::UnknownParticipant(id.clone()))?
            .status;
        match status {
            Status::Pool => {}
            Status::Staged => {
                for group in self.store.groups_mut() {
                    group.remove(id);
                }
            }
            Status::Active => {
                let released: Vec<ParticipantId> = self
                    .store
                    .stations_mut()
                    .iter_mut()
                    .filter(|station| station.occupants.contains(id))
                    .flat_map(Station::finish)
                    .filter(|occupant| occupant != id)
                    .collect();
                debug!(%id, released = released.len(), "aborted session of deleted participant");
                self.set_status(&released, Status::Pool);
            }
        }
        self.store.remove_participant(id);
        self.sanitize();
        debug!(%id, "deleted participant");
        Ok(())
    }

    /// Stages a pool participant into the first group with a free slot and returns its index.
    pub fn promote(&mut self, id: &ParticipantId) -> Outcome<usize> {
        self.require_pool(id)?;
        let index = self
            .store
            .groups()
            .iter()
            .position(Group::has_capacity)
            .ok_or(Declined::NoCapacity)?;
        if let Some(group) = self.store.group_mut(index) {
            group.push(id.clone());
        }
        self.set_status(core::slice::from_ref(id), Status::Staged);
        debug!(%id, group = index, "promoted participant");
        Ok(index)
    }

    /// Fills every existing group front to back from the selection queue and returns how many
    /// participants were staged. Existing members are never moved and no group is created.
    pub fn fill_all(&mut self) -> Outcome<usize> {
        if !self
            .store
            .participants()
            .iter()
            .any(|participant| participant.status == Status::Pool)
        {
            return Err(Declined::EmptyPool);
        }
        if !self.store.groups().iter().any(Group::has_capacity) {
            return Err(Declined::NoCapacity);
        }

        let mut queue = selection_queue(self.store.participants(), &mut self.rng);
        let mut staged = Vec::new();
        for group in self.store.groups_mut() {
            while group.has_capacity() {
                let Some(id) = queue.pop_front() else {
                    break;
                };
                group.push(id.clone());
                staged.push(id);
            }
        }
        self.set_status(&staged, Status::Staged);
        debug!(staged = staged.len(), waiting = queue.len(), "filled groups");
        Ok(staged.len())
    }

    /// Appends an empty group and returns its index.
    pub fn create_group(&mut self) -> usize {
        self.store.push_group(Group::default());
        let index = self.store.groups().len() - 1;
        debug!(group = index, "created group");
        index
    }

    /// Removes a group; its members go back to the pool with their counters untouched.
    pub fn remove_group(&mut self, index: usize) -> Outcome {
        let group = self
            .store
            .remove_group(index)
            .ok_or(Declined::UnknownGroup(index))?;
        self.set_status(group.members(), Status::Pool);
        if self.store.groups().is_empty() {
            self.store.push_group(Group::default());
        }
        debug!(group = index, released = group.len(), "removed group");
        Ok(())
    }

    /// Exchanges the member at `slot` with a pool participant, keeping the slot position.
    pub fn swap_group_member(
        &mut self,
        group_index: usize,
        slot: usize,
        incoming: &ParticipantId,
    ) -> Outcome {
        let group = self
            .store
            .group(group_index)
            .ok_or(Declined::UnknownGroup(group_index))?;
        if slot >= group.len() {
            return Err(Declined::EmptySlot {
                group: group_index,
                slot,
            });
        }
        self.require_pool(incoming)?;

        let outgoing = self
            .store
            .group_mut(group_index)
            .and_then(|group| group.replace(slot, incoming.clone()))
            .ok_or(Declined::EmptySlot {
                group: group_index,
                slot,
            })?;
        self.set_status(core::slice::from_ref(&outgoing), Status::Pool);
        self.set_status(core::slice::from_ref(incoming), Status::Staged);
        debug!(group = group_index, slot, %outgoing, %incoming, "swapped group member");
        Ok(())
    }

    /// Appends an idle station and returns its id.
    pub fn create_station(&mut self) -> StationId {
        let id = loop {
            let candidate = StationId::random(&mut self.rng);
            if self.store.station(&candidate).is_none() {
                break candidate;
            }
        };
        let number = self
            .store
            .stations()
            .iter()
            .filter_map(|station| station.name.strip_prefix(STATION_NAME_PREFIX))
            .filter_map(|number| number.parse::<u32>().ok())
            .max()
            .unwrap_or(0)
            + 1;
        let name = format!("{STATION_NAME_PREFIX}{number}");
        debug!(%id, station = %name, "created station");
        self.store.insert_station(Station::new(id.clone(), name));
        id
    }

    /// Ends a running session first, counting it as completed, then deletes the station.
    pub fn remove_station(&mut self, id: &StationId) -> Outcome {
        let station = self
            .store
            .station(id)
            .ok_or_else(|| Declined::UnknownStation(id.clone()))?;
        if station.is_active() {
            self.end_station_session(id)?;
        }
        self.store.remove_station(id);
        debug!(%id, "removed station");
        Ok(())
    }

    /// Moves a full group onto an idle station. The group leaves the sequence, later groups
    /// move up by one and a fresh empty group is appended at the end.
    pub fn assign_group_to_station(
        &mut self,
        group_index: usize,
        station_id: &StationId,
    ) -> Outcome {
        let group = self
            .store
            .group(group_index)
            .ok_or(Declined::UnknownGroup(group_index))?;
        if !group.is_full() {
            return Err(Declined::GroupNotFull {
                index: group_index,
                len: group.len(),
            });
        }
        let station = self
            .store
            .station(station_id)
            .ok_or_else(|| Declined::UnknownStation(station_id.clone()))?;
        if station.is_active() {
            return Err(Declined::StationBusy(station_id.clone()));
        }

        let group = self
            .store
            .remove_group(group_index)
            .ok_or(Declined::UnknownGroup(group_index))?;
        self.store.push_group(Group::default());
        let occupants = group.into_members();
        self.set_status(&occupants, Status::Active);
        let now = (self.clock)();
        if let Some(station) = self.store.station_mut(station_id) {
            station.start(occupants, now);
        }
        self.store.mark_assigned();
        debug!(group = group_index, station = %station_id, "assigned group to station");
        Ok(())
    }

    /// Completes the session: every occupant gets one more finished session and returns to
    /// the pool, the station becomes idle.
    pub fn end_station_session(&mut self, id: &StationId) -> Outcome {
        let station = self
            .store
            .station_mut(id)
            .ok_or_else(|| Declined::UnknownStation(id.clone()))?;
        if station.is_idle() {
            return Err(Declined::StationIdle(id.clone()));
        }
        let occupants = station.finish();
        for participant in self.store.participants_mut() {
            if occupants.contains(&participant.id) {
                participant.sessions = participant.sessions.saturating_add(1);
                participant.status = Status::Pool;
            }
        }
        debug!(%id, released = occupants.len(), "ended station session");
        Ok(())
    }

    fn require_pool(&self, id: &ParticipantId) -> Outcome {
        let participant = self
            .store
            .participant(id)
            .ok_or_else(|| Declined::UnknownParticipant(id.clone()))?;
        if participant.status == Status::Pool {
            Ok(())
        } else {
            Err(Declined::NotInPool {
                id: id.clone(),
                status: participant.status,
            })
        }
    }

    pub(crate) fn set_status(&mut self, ids: &[ParticipantId], status: Status) {
        for participant in self.store.participants_mut() {
            if ids.contains(&participant.id) {
                participant.status = status;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> Engine {
        Engine::seeded(EntityStore::default(), 42).with_clock(|| Timestamp::from_millis(1_000))
    }

    fn add(engine: &mut Engine, name: &str) -> ParticipantId {
        engine
            .create_participant(name, Category::Unspecified, SkillTier::Tier2)
            .unwrap()
    }

    fn status(engine: &Engine, id: &ParticipantId) -> Status {
        engine.state().participant(id).unwrap().status
    }

    #[test]
    fn blank_names_are_declined() {
        let mut engine = engine();
        assert_eq!(
            engine.create_participant("   ", Category::Male, SkillTier::Tier1),
            Err(Declined::EmptyName)
        );
        let id = add(&mut engine, "  Ada ");
        assert_eq!(engine.state().participant(&id).unwrap().name, "Ada");
        assert_eq!(
            engine.edit_participant(
                &id,
                ParticipantChanges {
                    name: Some(String::new()),
                    ..ParticipantChanges::default()
                }
            ),
            Err(Declined::EmptyName)
        );
    }

    #[test]
    fn edit_without_changes_is_declined() {
        let mut engine = engine();
        let id = add(&mut engine, "Ada");
        let before = engine.state().clone();
        assert_eq!(
            engine.edit_participant(&id, ParticipantChanges::default()),
            Err(Declined::NoChanges)
        );
        assert_eq!(engine.state(), &before);
    }

    #[test]
    fn edit_keeps_status_and_counter() {
        let mut engine = engine();
        let id = add(&mut engine, "Ada");
        engine.promote(&id).unwrap();
        engine
            .edit_participant(
                &id,
                ParticipantChanges {
                    name: Some("Ada L.".to_owned()),
                    category: Some(Category::Female),
                    tier: Some(SkillTier::Tier3),
                },
            )
            .unwrap();
        let participant = engine.state().participant(&id).unwrap();
        assert_eq!(participant.name, "Ada L.");
        assert_eq!(participant.category, Category::Female);
        assert_eq!(participant.tier, SkillTier::Tier3);
        assert_eq!(participant.status, Status::Staged);
        assert_eq!(participant.sessions, 0);
    }

    #[test]
    fn promote_uses_first_group_with_capacity() {
        let mut engine = engine();
        engine.create_group();
        let ids: Vec<_> = (0..5).map(|i| add(&mut engine, &format!("p{i}"))).collect();
        for id in &ids[..4] {
            assert_eq!(engine.promote(id), Ok(0));
        }
        assert_eq!(engine.promote(&ids[4]), Ok(1));
        assert_eq!(status(&engine, &ids[4]), Status::Staged);
        assert_eq!(
            engine.promote(&ids[4]),
            Err(Declined::NotInPool {
                id: ids[4].clone(),
                status: Status::Staged
            })
        );
    }

    #[test]
    fn promote_without_capacity_changes_nothing() {
        let mut engine = engine();
        let ids: Vec<_> = (0..5).map(|i| add(&mut engine, &format!("p{i}"))).collect();
        for id in &ids[..4] {
            engine.promote(id).unwrap();
        }
        let before = engine.state().clone();
        assert_eq!(engine.promote(&ids[4]), Err(Declined::NoCapacity));
        assert_eq!(engine.state(), &before);
    }

    #[test]
    fn station_names_continue_numbering() {
        let mut engine = engine();
        let first = engine.create_station();
        let second = engine.create_station();
        engine.remove_station(&first).unwrap();
        engine.create_station();
        let names: Vec<&str> = engine
            .state()
            .stations()
            .iter()
            .map(|station| station.name.as_str())
            .collect();
        assert_eq!(names, ["Court 2", "Court 3"]);
        assert_eq!(engine.state().stations()[0].id, second);
    }

    #[test]
    fn assignment_requires_full_group_and_idle_station() {
        let mut engine = engine();
        let station = engine.create_station();
        let ids: Vec<_> = (0..8).map(|i| add(&mut engine, &format!("p{i}"))).collect();
        engine.promote(&ids[0]).unwrap();
        assert_eq!(
            engine.assign_group_to_station(0, &station),
            Err(Declined::GroupNotFull { index: 0, len: 1 })
        );
        for id in &ids[1..4] {
            engine.promote(id).unwrap();
        }
        assert_eq!(
            engine.assign_group_to_station(0, &StationId::new("missing")),
            Err(Declined::UnknownStation(StationId::new("missing")))
        );
        engine.assign_group_to_station(0, &station).unwrap();
        assert!(engine.state().has_assigned());
        assert_eq!(
            engine.state().station(&station).unwrap().started_at,
            Some(Timestamp::from_millis(1_000))
        );

        for id in &ids[4..] {
            engine.promote(id).unwrap();
        }
        assert_eq!(
            engine.assign_group_to_station(0, &station),
            Err(Declined::StationBusy(station.clone()))
        );
        assert_eq!(
            engine.assign_group_to_station(7, &station),
            Err(Declined::UnknownGroup(7))
        );
    }

    #[test]
    fn removing_the_last_group_leaves_an_empty_one() {
        let mut engine = engine();
        let id = add(&mut engine, "Ada");
        engine.promote(&id).unwrap();
        engine.remove_group(0).unwrap();
        assert_eq!(engine.state().groups(), [Group::default()]);
        assert_eq!(status(&engine, &id), Status::Pool);
        assert_eq!(engine.remove_group(3), Err(Declined::UnknownGroup(3)));
    }

    #[test]
    fn swap_requires_occupied_slot_and_pool_participant() {
        let mut engine = engine();
        let staged = add(&mut engine, "staged");
        let waiting = add(&mut engine, "waiting");
        engine.promote(&staged).unwrap();
        assert_eq!(
            engine.swap_group_member(0, 1, &waiting),
            Err(Declined::EmptySlot { group: 0, slot: 1 })
        );
        assert_eq!(
            engine.swap_group_member(0, 0, &staged),
            Err(Declined::NotInPool {
                id: staged.clone(),
                status: Status::Staged
            })
        );
        assert_eq!(
            engine.swap_group_member(4, 0, &waiting),
            Err(Declined::UnknownGroup(4))
        );
    }

    #[test]
    fn ending_an_idle_station_is_declined() {
        let mut engine = engine();
        let station = engine.create_station();
        assert_eq!(
            engine.end_station_session(&station),
            Err(Declined::StationIdle(station.clone()))
        );
    }

    #[test]
    fn removing_an_active_station_completes_its_session() {
        let mut engine = engine();
        let station = engine.create_station();
        let ids: Vec<_> = (0..4).map(|i| add(&mut engine, &format!("p{i}"))).collect();
        engine.fill_all().unwrap();
        engine.assign_group_to_station(0, &station).unwrap();
        engine.remove_station(&station).unwrap();
        assert!(engine.state().stations().is_empty());
        for id in &ids {
            let participant = engine.state().participant(id).unwrap();
            assert_eq!(participant.status, Status::Pool);
            assert_eq!(participant.sessions, 1);
        }
    }

    #[test]
    fn deleting_a_player_aborts_the_session_without_counting_it() {
        let mut engine = engine();
        let station = engine.create_station();
        let ids: Vec<_> = (0..4).map(|i| add(&mut engine, &format!("p{i}"))).collect();
        engine.fill_all().unwrap();
        engine.assign_group_to_station(0, &station).unwrap();

        engine.delete_participant(&ids[0]).unwrap();
        let station = engine.state().station(&station).unwrap();
        assert!(station.is_idle());
        assert_eq!(station.started_at, None);
        for id in &ids[1..] {
            let participant = engine.state().participant(id).unwrap();
            assert_eq!(participant.status, Status::Pool);
            assert_eq!(participant.sessions, 0);
        }
        assert_eq!(
            engine.delete_participant(&ids[0]),
            Err(Declined::UnknownParticipant(ids[0].clone()))
        );
    }
}
