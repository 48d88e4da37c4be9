use core::fmt::{self, Display};
use core::time::Duration;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Every station hosts exactly this many players, and a group is full at this size.
pub const GROUP_CAPACITY: usize = 4;

const IDENTIFIER_LENGTH: usize = 16;

fn random_identifier<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..IDENTIFIER_LENGTH)
        .map(|_| char::from(rng.sample(Alphanumeric)))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub(crate) fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self(random_identifier(rng))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StationId(String);

impl StationId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub(crate) fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self(random_identifier(rng))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Male,
    Female,
    Unspecified,
}

/// Ordered from the lowest tier upwards, the derived `Ord` is used as a tie-break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillTier {
    Tier1,
    Tier2,
    Tier3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Waiting and available for staging.
    Pool,
    /// Member of a group.
    Staged,
    /// Playing on a station.
    Active,
}

impl Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pool => "pool",
            Self::Staged => "staged",
            Self::Active => "active",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub name: String,
    pub category: Category,
    pub tier: SkillTier,
    /// Number of completed station sessions.
    pub sessions: u32,
    pub status: Status,
}

impl Participant {
    /// A freshly registered participant waits in the pool and has not played yet.
    pub fn new(
        id: ParticipantId,
        name: impl Into<String>,
        category: Category,
        tier: SkillTier,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            category,
            tier,
            sessions: 0,
            status: Status::Pool,
        }
    }
}

/// Partial update of the descriptive participant fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ParticipantChanges {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub tier: Option<SkillTier>,
}

impl ParticipantChanges {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none() && self.category.is_none() && self.tier.is_none()
    }
}

/// Staging area for up to [`GROUP_CAPACITY`] participants. Member order is display order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Group(Vec<ParticipantId>);

impl Group {
    #[must_use]
    pub fn members(&self) -> &[ParticipantId] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.0.len() >= GROUP_CAPACITY
    }

    #[must_use]
    pub fn has_capacity(&self) -> bool {
        !self.is_full()
    }

    #[must_use]
    pub fn contains(&self, id: &ParticipantId) -> bool {
        self.0.contains(id)
    }

    pub(crate) fn push(&mut self, id: ParticipantId) {
        debug_assert!(self.has_capacity());
        self.0.push(id);
    }

    /// Replaces the member at `slot` and returns the previous one.
    pub(crate) fn replace(&mut self, slot: usize, id: ParticipantId) -> Option<ParticipantId> {
        self.0
            .get_mut(slot)
            .map(|member| core::mem::replace(member, id))
    }

    /// Returns whether `id` was a member.
    pub(crate) fn remove(&mut self, id: &ParticipantId) -> bool {
        let before = self.0.len();
        self.0.retain(|member| member != id);
        before != self.0.len()
    }

    pub(crate) fn retain(&mut self, mut keep: impl FnMut(&ParticipantId) -> bool) {
        self.0.retain(|member| keep(member));
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.0.truncate(len);
    }

    pub(crate) fn into_members(self) -> Vec<ParticipantId> {
        self.0
    }
}

impl FromIterator<ParticipantId> for Group {
    fn from_iter<T: IntoIterator<Item = ParticipantId>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Milliseconds since the unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0
    }

    #[must_use]
    pub fn now() -> Self {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self(u64::try_from(since_epoch.as_millis()).unwrap_or(u64::MAX))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Station {
    pub id: StationId,
    pub name: String,
    /// Either empty or exactly [`GROUP_CAPACITY`] participants.
    #[serde(default)]
    pub occupants: Vec<ParticipantId>,
    /// Present exactly when the station is occupied.
    #[serde(default)]
    pub started_at: Option<Timestamp>,
}

impl Station {
    pub fn new(id: StationId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            occupants: Vec::new(),
            started_at: None,
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.occupants.is_empty()
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.occupants.is_empty()
    }

    /// Time spent in the current session, `None` while idle.
    #[must_use]
    pub fn elapsed(&self, now: Timestamp) -> Option<Duration> {
        self.started_at
            .map(|started_at| Duration::from_millis(now.0.saturating_sub(started_at.0)))
    }

    pub(crate) fn start(&mut self, occupants: Vec<ParticipantId>, now: Timestamp) {
        debug_assert_eq!(occupants.len(), GROUP_CAPACITY);
        self.occupants = occupants;
        self.started_at = Some(now);
    }

    /// Clears the station and hands back whoever was playing on it.
    pub(crate) fn finish(&mut self) -> Vec<ParticipantId> {
        self.started_at = None;
        core::mem::take(&mut self.occupants)
    }
}
