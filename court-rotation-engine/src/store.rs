use serde::{Deserialize, Serialize};

use crate::model::{Group, Participant, ParticipantId, Station, StationId};

/// Authoritative holder of participants, stations and the group sequence.
///
/// Only the [`Engine`](crate::Engine) mutates a store; everybody else gets shared references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityStore {
    participants: Vec<Participant>,
    stations: Vec<Station>,
    groups: Vec<Group>,
    /// Whether a group was ever assigned to a station.
    has_assigned: bool,
}

impl Default for EntityStore {
    fn default() -> Self {
        Self {
            participants: Vec::new(),
            stations: Vec::new(),
            groups: vec![Group::default()],
            has_assigned: false,
        }
    }
}

impl EntityStore {
    /// Reassembles a store from independently restored snapshots.
    ///
    /// The parts are taken as they are, the engine normalizes them when it takes ownership.
    #[must_use]
    pub const fn from_parts(
        participants: Vec<Participant>,
        stations: Vec<Station>,
        groups: Vec<Group>,
        has_assigned: bool,
    ) -> Self {
        Self {
            participants,
            stations,
            groups,
            has_assigned,
        }
    }

    #[must_use]
    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    #[must_use]
    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    #[must_use]
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    #[must_use]
    pub const fn has_assigned(&self) -> bool {
        self.has_assigned
    }

    #[must_use]
    pub fn participant(&self, id: &ParticipantId) -> Option<&Participant> {
        self.participants
            .iter()
            .find(|participant| &participant.id == id)
    }

    #[must_use]
    pub fn station(&self, id: &StationId) -> Option<&Station> {
        self.stations.iter().find(|station| &station.id == id)
    }

    #[must_use]
    pub fn group(&self, index: usize) -> Option<&Group> {
        self.groups.get(index)
    }

    pub(crate) fn insert_participant(&mut self, participant: Participant) {
        self.participants.push(participant);
    }

    pub(crate) fn remove_participant(&mut self, id: &ParticipantId) -> Option<Participant> {
        let position = self
            .participants
            .iter()
            .position(|participant| &participant.id == id)?;
        Some(self.participants.remove(position))
    }

    pub(crate) fn participant_mut(&mut self, id: &ParticipantId) -> Option<&mut Participant> {
        self.participants
            .iter_mut()
            .find(|participant| &participant.id == id)
    }

    pub(crate) fn participants_mut(&mut self) -> &mut [Participant] {
        &mut self.participants
    }

    pub(crate) fn retain_participants(&mut self, keep: impl FnMut(&Participant) -> bool) {
        self.participants.retain(keep);
    }

    pub(crate) fn push_group(&mut self, group: Group) {
        self.groups.push(group);
    }

    pub(crate) fn remove_group(&mut self, index: usize) -> Option<Group> {
        (index < self.groups.len()).then(|| self.groups.remove(index))
    }

    pub(crate) fn group_mut(&mut self, index: usize) -> Option<&mut Group> {
        self.groups.get_mut(index)
    }

    pub(crate) fn groups_mut(&mut self) -> &mut [Group] {
        &mut self.groups
    }

    pub(crate) fn insert_station(&mut self, station: Station) {
        self.stations.push(station);
    }

    pub(crate) fn remove_station(&mut self, id: &StationId) -> Option<Station> {
        let position = self.stations.iter().position(|station| &station.id == id)?;
        Some(self.stations.remove(position))
    }

    pub(crate) fn station_mut(&mut self, id: &StationId) -> Option<&mut Station> {
        self.stations.iter_mut().find(|station| &station.id == id)
    }

    pub(crate) fn stations_mut(&mut self) -> &mut [Station] {
        &mut self.stations
    }

    pub(crate) fn mark_assigned(&mut self) {
        self.has_assigned = true;
    }
}
