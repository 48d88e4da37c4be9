//! Order in which waiting participants are pulled into groups.

use std::collections::VecDeque;

use itertools::Itertools;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::model::{Participant, ParticipantId, Status};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionOrder {
    /// Nobody has finished a session yet, so input order would be arbitrary. Shuffle instead.
    Shuffled,
    /// Fewest completed sessions first, then lower tier, then name.
    FewestSessionsFirst,
}

impl SelectionOrder {
    /// Decided over everybody, not just the pool: one finished session anywhere switches
    /// the whole pool to the deterministic order.
    pub fn for_participants<'a>(participants: impl IntoIterator<Item = &'a Participant>) -> Self {
        if participants
            .into_iter()
            .any(|participant| participant.sessions > 0)
        {
            Self::FewestSessionsFirst
        } else {
            Self::Shuffled
        }
    }
}

/// Pool participants in the order they should be staged.
pub fn selection_queue<R: Rng + ?Sized>(
    participants: &[Participant],
    rng: &mut R,
) -> VecDeque<ParticipantId> {
    let pool = participants
        .iter()
        .filter(|participant| participant.status == Status::Pool);
    match SelectionOrder::for_participants(participants) {
        SelectionOrder::Shuffled => {
            let mut pool: Vec<&Participant> = pool.collect();
            pool.shuffle(rng);
            pool.into_iter()
                .map(|participant| participant.id.clone())
                .collect()
        }
        SelectionOrder::FewestSessionsFirst => pool
            .sorted_by(|left, right| {
                left.sessions
                    .cmp(&right.sessions)
                    .then(left.tier.cmp(&right.tier))
                    .then_with(|| left.name.cmp(&right.name))
            })
            .map(|participant| participant.id.clone())
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng as _;

    use super::*;
    use crate::model::{Category, SkillTier};

    fn participant(id: &str, sessions: u32, tier: SkillTier, status: Status) -> Participant {
        Participant {
            sessions,
            status,
            ..Participant::new(ParticipantId::new(id), id, Category::Unspecified, tier)
        }
    }

    fn ids(queue: VecDeque<ParticipantId>) -> Vec<String> {
        queue.into_iter().map(|id| id.as_str().to_owned()).collect()
    }

    #[test]
    fn any_finished_session_switches_to_deterministic_order() {
        let fresh = [
            participant("a", 0, SkillTier::Tier1, Status::Pool),
            participant("b", 0, SkillTier::Tier1, Status::Active),
        ];
        assert_eq!(
            SelectionOrder::for_participants(&fresh),
            SelectionOrder::Shuffled
        );

        let played = [
            participant("a", 0, SkillTier::Tier1, Status::Pool),
            participant("b", 1, SkillTier::Tier1, Status::Active),
        ];
        assert_eq!(
            SelectionOrder::for_participants(&played),
            SelectionOrder::FewestSessionsFirst
        );
    }

    #[test]
    fn ties_are_broken_by_tier_then_name() {
        let participants = [
            participant("zoe", 1, SkillTier::Tier1, Status::Pool),
            participant("carl", 1, SkillTier::Tier3, Status::Pool),
            participant("amy", 1, SkillTier::Tier1, Status::Pool),
            participant("bob", 0, SkillTier::Tier2, Status::Pool),
            participant("dan", 3, SkillTier::Tier1, Status::Pool),
        ];
        let queue = selection_queue(&participants, &mut StdRng::seed_from_u64(1));
        assert_eq!(ids(queue), ["bob", "amy", "zoe", "carl", "dan"]);
    }

    #[test]
    fn only_the_pool_is_queued() {
        let participants = [
            participant("a", 0, SkillTier::Tier1, Status::Staged),
            participant("b", 2, SkillTier::Tier1, Status::Pool),
            participant("c", 0, SkillTier::Tier1, Status::Active),
        ];
        let queue = selection_queue(&participants, &mut StdRng::seed_from_u64(1));
        assert_eq!(ids(queue), ["b"]);
    }

    #[test]
    fn first_round_is_shuffled() {
        let participants: Vec<Participant> = (0..8)
            .map(|index| participant(&format!("p{index}"), 0, SkillTier::Tier2, Status::Pool))
            .collect();
        let orders: Vec<Vec<String>> = (0..32)
            .map(|seed| ids(selection_queue(&participants, &mut StdRng::seed_from_u64(seed))))
            .collect();
        assert!(orders.iter().all(|order| order.len() == participants.len()));
        assert!(orders.iter().any(|order| order != &orders[0]));
    }
}
