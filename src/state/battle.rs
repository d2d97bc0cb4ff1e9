use std::time::SystemTime;

use uuid::Uuid;

use crate::{
    dao::models::{BattleEntity, BattleStatusEntity, RemixSelectionEntity},
    state::lifecycle::{BattleEvent, BattleStatus, InvalidTransition, PhasePlan, Transition},
};

/// One player's remix choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemixSelection {
    /// Participant who chose.
    pub player_id: Uuid,
    /// One of the sound's remixes.
    pub remix_id: Uuid,
    /// Time of the latest choice.
    pub selected_at: SystemTime,
}

/// Runtime representation of a battle between two players.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Battle {
    /// Primary key of the battle.
    pub id: Uuid,
    /// Player who plays first; the requester for queue matches.
    pub player1_id: Uuid,
    /// Player who plays second.
    pub player2_id: Uuid,
    /// Sound both remixes derive from.
    pub sound_id: Uuid,
    /// Free-form stage name chosen at creation.
    pub scene: Option<String>,
    /// Current lifecycle phase.
    pub status: BattleStatus,
    /// At most one entry per participant, in the order they first selected.
    pub remix_selections: Vec<RemixSelection>,
    /// Set while the battle is in a timed phase.
    pub playing_ends_at: Option<SystemTime>,
    /// Creation time, used for trending windows.
    pub created_at: SystemTime,
    /// Time of the last committed change.
    pub updated_at: SystemTime,
    /// Set once the battle reaches `COMPLETED`.
    pub completed_at: Option<SystemTime>,
    /// Version of the stored document this value was read from.
    pub version: u64,
}

/// Why a selection was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionRejected {
    /// The player is not one of the two participants.
    NotParticipant,
    /// Selections are only accepted while selecting.
    WrongPhase(BattleStatus),
}

/// Result of a recorded selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionOutcome {
    /// The stored selection.
    pub selection: RemixSelection,
    /// Whether both participants have now chosen.
    pub both_selected: bool,
    /// Set when this selection completed the pair and started the first round.
    pub transition: Option<Transition>,
}

impl Battle {
    /// Build a fresh battle in the selection phase.
    pub fn new(
        player1_id: Uuid,
        player2_id: Uuid,
        sound_id: Uuid,
        scene: Option<String>,
        now: SystemTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            player1_id,
            player2_id,
            sound_id,
            scene,
            status: BattleStatus::Selecting,
            remix_selections: Vec::new(),
            playing_ends_at: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
            version: 0,
        }
    }

    /// Whether `player_id` is one of the two players.
    pub fn is_participant(&self, player_id: Uuid) -> bool {
        self.player1_id == player_id || self.player2_id == player_id
    }

    /// Current selection of a player, if any.
    pub fn selection_of(&self, player_id: Uuid) -> Option<&RemixSelection> {
        self.remix_selections
            .iter()
            .find(|selection| selection.player_id == player_id)
    }

    /// Whether each participant has a selection.
    pub fn both_selected(&self) -> bool {
        self.selection_of(self.player1_id).is_some() && self.selection_of(self.player2_id).is_some()
    }

    /// Whether the current phase deadline has passed at `now`.
    pub fn is_expired(&self, now: SystemTime) -> bool {
        self.status.is_timed()
            && self
                .playing_ends_at
                .is_some_and(|deadline| deadline <= now)
    }

    fn apply(&mut self, transition: &Transition, at: SystemTime) {
        self.status = transition.to;
        self.playing_ends_at = transition.playing_ends_at;
        if transition.to.is_terminal() {
            self.completed_at = Some(at);
        }
    }

    /// Upsert the player's selection and start the first round once both
    /// participants have picked. Both happen on `self`, so a single write commits them.
    pub fn record_selection(
        &mut self,
        plan: &PhasePlan,
        player_id: Uuid,
        remix_id: Uuid,
        now: SystemTime,
    ) -> Result<SelectionOutcome, SelectionRejected> {
        if !self.is_participant(player_id) {
            return Err(SelectionRejected::NotParticipant);
        }
        if self.status != BattleStatus::Selecting {
            return Err(SelectionRejected::WrongPhase(self.status));
        }

        let selection = RemixSelection {
            player_id,
            remix_id,
            selected_at: now,
        };
        match self
            .remix_selections
            .iter_mut()
            .find(|existing| existing.player_id == player_id)
        {
            Some(existing) => *existing = selection.clone(),
            None => self.remix_selections.push(selection.clone()),
        }

        let both_selected = self.both_selected();
        let transition = if both_selected {
            let transition = plan
                .plan(self.status, BattleEvent::BothSelected, now)
                .map_err(|err| SelectionRejected::WrongPhase(err.from))?;
            self.apply(&transition, now);
            Some(transition)
        } else {
            None
        };

        Ok(SelectionOutcome {
            selection,
            both_selected,
            transition,
        })
    }

    /// Apply every deadline that passed by `now`. Each following deadline is
    /// measured from the one that expired, so an untouched battle catches up
    /// deterministically.
    pub fn settle_expired(&mut self, plan: &PhasePlan, now: SystemTime) -> Vec<Transition> {
        let mut applied = Vec::new();
        while self.is_expired(now) {
            let Some(deadline) = self.playing_ends_at else {
                break;
            };
            match plan.plan(self.status, BattleEvent::DeadlineExpired, deadline) {
                Ok(transition) => {
                    self.apply(&transition, deadline);
                    applied.push(transition);
                }
                Err(_) => break,
            }
        }
        applied
    }

    /// End the current timed phase now. `Ok(None)` once the battle is completed.
    pub fn advance(
        &mut self,
        plan: &PhasePlan,
        now: SystemTime,
    ) -> Result<Option<Transition>, InvalidTransition> {
        if self.status.is_terminal() {
            return Ok(None);
        }
        let transition = plan.plan(self.status, BattleEvent::Advance, now)?;
        self.apply(&transition, now);
        Ok(Some(transition))
    }
}

impl From<BattleStatusEntity> for BattleStatus {
    fn from(value: BattleStatusEntity) -> Self {
        match value {
            BattleStatusEntity::Selecting => BattleStatus::Selecting,
            BattleStatusEntity::PlayingP1 => BattleStatus::PlayingP1,
            BattleStatusEntity::PlayingP2 => BattleStatus::PlayingP2,
            BattleStatusEntity::Voting => BattleStatus::Voting,
            BattleStatusEntity::Completed => BattleStatus::Completed,
        }
    }
}

impl From<BattleStatus> for BattleStatusEntity {
    fn from(value: BattleStatus) -> Self {
        match value {
            BattleStatus::Selecting => BattleStatusEntity::Selecting,
            BattleStatus::PlayingP1 => BattleStatusEntity::PlayingP1,
            BattleStatus::PlayingP2 => BattleStatusEntity::PlayingP2,
            BattleStatus::Voting => BattleStatusEntity::Voting,
            BattleStatus::Completed => BattleStatusEntity::Completed,
        }
    }
}

impl From<RemixSelectionEntity> for RemixSelection {
    fn from(value: RemixSelectionEntity) -> Self {
        Self {
            player_id: value.player_id,
            remix_id: value.remix_id,
            selected_at: value.selected_at,
        }
    }
}

impl From<RemixSelection> for RemixSelectionEntity {
    fn from(value: RemixSelection) -> Self {
        Self {
            player_id: value.player_id,
            remix_id: value.remix_id,
            selected_at: value.selected_at,
        }
    }
}

impl From<BattleEntity> for Battle {
    fn from(value: BattleEntity) -> Self {
        Self {
            id: value.id,
            player1_id: value.player1_id,
            player2_id: value.player2_id,
            sound_id: value.sound_id,
            scene: value.scene,
            status: value.status.into(),
            remix_selections: value.remix_selections.into_iter().map(Into::into).collect(),
            playing_ends_at: value.playing_ends_at,
            created_at: value.created_at,
            updated_at: value.updated_at,
            completed_at: value.completed_at,
            version: value.version,
        }
    }
}

impl From<Battle> for BattleEntity {
    fn from(value: Battle) -> Self {
        Self {
            id: value.id,
            player1_id: value.player1_id,
            player2_id: value.player2_id,
            sound_id: value.sound_id,
            scene: value.scene,
            status: value.status.into(),
            remix_selections: value.remix_selections.into_iter().map(Into::into).collect(),
            playing_ends_at: value.playing_ends_at,
            created_at: value.created_at,
            updated_at: value.updated_at,
            completed_at: value.completed_at,
            version: value.version,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::state::lifecycle::TimedPhase;

    fn battle() -> Battle {
        Battle::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            None,
            SystemTime::UNIX_EPOCH,
        )
    }

    #[test]
    fn repeated_selection_keeps_last_remix() {
        let plan = PhasePlan::default();
        let mut battle = battle();
        let player = battle.player1_id;
        let (r1, r2) = (Uuid::new_v4(), Uuid::new_v4());

        battle
            .record_selection(&plan, player, r1, SystemTime::now())
            .unwrap();
        let outcome = battle
            .record_selection(&plan, player, r2, SystemTime::now())
            .unwrap();

        assert!(!outcome.both_selected);
        assert!(outcome.transition.is_none());
        assert_eq!(battle.remix_selections.len(), 1);
        assert_eq!(battle.selection_of(player).unwrap().remix_id, r2);
        assert_eq!(battle.status, BattleStatus::Selecting);
    }

    #[test]
    fn second_participant_starts_first_round() {
        let plan = PhasePlan::default();
        let mut battle = battle();
        let now = SystemTime::now();

        battle
            .record_selection(&plan, battle.player1_id, Uuid::new_v4(), now)
            .unwrap();
        let outcome = battle
            .record_selection(&plan, battle.player2_id, Uuid::new_v4(), now)
            .unwrap();

        assert!(outcome.both_selected);
        let transition = outcome.transition.unwrap();
        assert_eq!(transition.from, BattleStatus::Selecting);
        assert_eq!(transition.to, BattleStatus::PlayingP1);
        assert_eq!(battle.status, BattleStatus::PlayingP1);
        assert_eq!(battle.playing_ends_at, Some(now + Duration::from_secs(60)));

        let snapshot = battle.clone();
        let err = battle
            .record_selection(&plan, battle.player1_id, Uuid::new_v4(), now)
            .unwrap_err();
        assert_eq!(err, SelectionRejected::WrongPhase(BattleStatus::PlayingP1));
        assert_eq!(battle, snapshot);
    }

    #[test]
    fn outsider_cannot_select() {
        let plan = PhasePlan::default();
        let mut battle = battle();
        let err = battle
            .record_selection(&plan, Uuid::new_v4(), Uuid::new_v4(), SystemTime::now())
            .unwrap_err();
        assert_eq!(err, SelectionRejected::NotParticipant);
        assert!(battle.remix_selections.is_empty());
    }

    #[test]
    fn settle_catches_up_through_several_phases() {
        let plan = PhasePlan::new(vec![
            TimedPhase {
                status: BattleStatus::PlayingP1,
                duration: Duration::from_secs(10),
            },
            TimedPhase {
                status: BattleStatus::PlayingP2,
                duration: Duration::from_secs(10),
            },
            TimedPhase {
                status: BattleStatus::Voting,
                duration: Duration::from_secs(5),
            },
        ])
        .unwrap();
        let start = SystemTime::UNIX_EPOCH + Duration::from_secs(100);
        let mut battle = battle();
        battle
            .record_selection(&plan, battle.player1_id, Uuid::new_v4(), start)
            .unwrap();
        battle
            .record_selection(&plan, battle.player2_id, Uuid::new_v4(), start)
            .unwrap();

        // P1 ends at +10, P2 at +20, voting at +25.
        let applied = battle.settle_expired(&plan, start + Duration::from_secs(22));
        assert_eq!(applied.len(), 2);
        assert_eq!(battle.status, BattleStatus::Voting);
        assert_eq!(
            battle.playing_ends_at,
            Some(start + Duration::from_secs(25))
        );

        let applied = battle.settle_expired(&plan, start + Duration::from_secs(1_000));
        assert_eq!(applied.len(), 1);
        assert_eq!(battle.status, BattleStatus::Completed);
        assert_eq!(battle.playing_ends_at, None);
        assert_eq!(battle.completed_at, Some(start + Duration::from_secs(25)));
        assert!(!battle.is_expired(SystemTime::now()));
    }

    #[test]
    fn advance_is_noop_once_completed_and_invalid_while_selecting() {
        let plan = PhasePlan::default();
        let mut battle = battle();
        assert!(battle.advance(&plan, SystemTime::now()).is_err());

        battle.status = BattleStatus::Voting;
        battle.playing_ends_at = Some(SystemTime::now());
        let transition = battle.advance(&plan, SystemTime::now()).unwrap().unwrap();
        assert_eq!(transition.to, BattleStatus::Completed);

        let snapshot = battle.clone();
        assert_eq!(battle.advance(&plan, SystemTime::now()).unwrap(), None);
        assert_eq!(battle, snapshot);
    }

    #[test]
    fn entity_conversion_preserves_fields() {
        let mut battle = battle();
        battle.scene = Some("rooftop".into());
        battle.version = 7;
        let entity: BattleEntity = battle.clone().into();
        assert_eq!(entity.status, BattleStatusEntity::Selecting);
        assert_eq!(Battle::from(entity), battle);
    }
}
