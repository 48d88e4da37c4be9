use court_rotation_engine::{
    Category, EntityStore, ParticipantChanges, ParticipantId, SkillTier, StationId,
};
use serde::{Deserialize, Serialize};

/// One user command as it arrives over the wire, tagged by `command`.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum Command {
    CreateParticipant {
        name: String,
        category: Category,
        tier: SkillTier,
    },
    EditParticipant {
        id: ParticipantId,
        #[serde(flatten)]
        changes: ParticipantChanges,
    },
    DeleteParticipant {
        id: ParticipantId,
    },
    Promote {
        id: ParticipantId,
    },
    FillAll,
    CreateGroup,
    RemoveGroup {
        index: usize,
    },
    SwapMember {
        group_index: usize,
        slot_index: usize,
        pool_id: ParticipantId,
    },
    CreateStation,
    RemoveStation {
        id: StationId,
    },
    AssignGroupToStation {
        group_index: usize,
        station_id: StationId,
    },
    EndStationSession {
        station_id: StationId,
    },
}

impl Command {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::CreateParticipant { .. } => "create-participant",
            Self::EditParticipant { .. } => "edit-participant",
            Self::DeleteParticipant { .. } => "delete-participant",
            Self::Promote { .. } => "promote",
            Self::FillAll => "fill-all",
            Self::CreateGroup => "create-group",
            Self::RemoveGroup { .. } => "remove-group",
            Self::SwapMember { .. } => "swap-member",
            Self::CreateStation => "create-station",
            Self::RemoveStation { .. } => "remove-station",
            Self::AssignGroupToStation { .. } => "assign-group-to-station",
            Self::EndStationSession { .. } => "end-station-session",
        }
    }
}

/// What an applied command produced, if anything worth reporting back.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    Participant(ParticipantId),
    Station(StationId),
    /// Index of the group that was created or received the promoted participant.
    Group(usize),
    /// Number of participants moved by a bulk fill.
    Staged(usize),
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum Report {
    Applied {
        #[serde(skip_serializing_if = "Option::is_none")]
        effect: Option<Effect>,
    },
    Declined {
        reason: String,
    },
}

impl Report {
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

/// Body of every `POST /commands` reply: the report next to the state it left behind.
#[derive(Serialize, Debug)]
pub struct CommandResponse<'a> {
    #[serde(flatten)]
    pub report: &'a Report,
    pub state: &'a EntityStore,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn commands_are_tagged_in_kebab_case() {
        let command: Command = serde_json::from_value(json!({
            "command": "swap-member",
            "group_index": 1,
            "slot_index": 2,
            "pool_id": "abc",
        }))
        .unwrap();
        assert_eq!(
            command,
            Command::SwapMember {
                group_index: 1,
                slot_index: 2,
                pool_id: ParticipantId::new("abc"),
            }
        );
        assert_eq!(command.name(), "swap-member");

        let command: Command = serde_json::from_value(json!({ "command": "fill-all" })).unwrap();
        assert_eq!(command, Command::FillAll);
    }

    #[test]
    fn edit_changes_are_optional() {
        let command: Command = serde_json::from_value(json!({
            "command": "edit-participant",
            "id": "abc",
            "tier": "tier3",
        }))
        .unwrap();
        assert_eq!(
            command,
            Command::EditParticipant {
                id: ParticipantId::new("abc"),
                changes: ParticipantChanges {
                    tier: Some(SkillTier::Tier3),
                    ..ParticipantChanges::default()
                },
            }
        );
    }

    #[test]
    fn unknown_commands_are_rejected() {
        assert!(serde_json::from_value::<Command>(json!({ "command": "reset" })).is_err());
        assert!(serde_json::from_value::<Command>(json!({ "command": "promote" })).is_err());
    }

    #[test]
    fn reports_are_flat() {
        let applied = Report::Applied {
            effect: Some(Effect::Group(2)),
        };
        assert_eq!(
            serde_json::to_value(&applied).unwrap(),
            json!({ "outcome": "applied", "effect": { "group": 2 } })
        );
        let declined = Report::Declined {
            reason: "nope".to_owned(),
        };
        assert_eq!(
            serde_json::to_value(&declined).unwrap(),
            json!({ "outcome": "declined", "reason": "nope" })
        );
        assert_eq!(
            serde_json::to_value(Report::Applied { effect: None }).unwrap(),
            json!({ "outcome": "applied" })
        );
    }
}
