use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Phases a battle moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BattleStatus {
    /// Both players pick a remix; initial state.
    Selecting,
    /// First player's timed round.
    PlayingP1,
    /// Second player's timed round.
    PlayingP2,
    /// Audience voting window.
    Voting,
    /// Terminal state. Nothing changes after this.
    Completed,
}

impl BattleStatus {
    /// Whether the status carries a deadline.
    pub fn is_timed(self) -> bool {
        matches!(
            self,
            BattleStatus::PlayingP1 | BattleStatus::PlayingP2 | BattleStatus::Voting
        )
    }

    /// Whether the battle is finished.
    pub fn is_terminal(self) -> bool {
        self == BattleStatus::Completed
    }
}

/// Events that can be applied to a battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BattleEvent {
    /// Both participants now hold a remix selection.
    BothSelected,
    /// A participant asked to end the current timed phase early.
    Advance,
    /// The current phase deadline passed.
    DeadlineExpired,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The status the battle was in when the event was received.
    pub from: BattleStatus,
    /// The event that cannot be applied from this status.
    pub event: BattleEvent,
}

/// Reasons a configured phase plan is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PhasePlanError {
    #[error("phase plan must contain at least one timed phase")]
    Empty,
    #[error("phase plan must start with PLAYING_P1, found {0:?}")]
    MustStartWithFirstRound(BattleStatus),
    #[error("{0:?} is not a timed phase")]
    NotTimed(BattleStatus),
    #[error("{0:?} appears more than once in the phase plan")]
    Repeated(BattleStatus),
}

/// One entry of the phase plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedPhase {
    /// Phase entered.
    pub status: BattleStatus,
    /// Time spent in the phase before it expires.
    pub duration: Duration,
}

/// Ordered timed phases a battle goes through after remix selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhasePlan {
    phases: Vec<TimedPhase>,
}

impl Default for PhasePlan {
    fn default() -> Self {
        Self {
            phases: vec![
                TimedPhase {
                    status: BattleStatus::PlayingP1,
                    duration: Duration::from_secs(60),
                },
                TimedPhase {
                    status: BattleStatus::PlayingP2,
                    duration: Duration::from_secs(60),
                },
                TimedPhase {
                    status: BattleStatus::Voting,
                    duration: Duration::from_secs(30),
                },
            ],
        }
    }
}

/// A validated transition, ready to be applied to a battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Status before the transition.
    pub from: BattleStatus,
    /// Status after the transition.
    pub to: BattleStatus,
    /// What triggered it.
    pub event: BattleEvent,
    /// Deadline of `to` when it is a timed phase.
    pub playing_ends_at: Option<SystemTime>,
}

impl PhasePlan {
    /// Validate and build a phase plan.
    pub fn new(phases: Vec<TimedPhase>) -> Result<Self, PhasePlanError> {
        let first = phases.first().ok_or(PhasePlanError::Empty)?;
        if first.status != BattleStatus::PlayingP1 {
            return Err(PhasePlanError::MustStartWithFirstRound(first.status));
        }

        for (index, phase) in phases.iter().enumerate() {
            if !phase.status.is_timed() {
                return Err(PhasePlanError::NotTimed(phase.status));
            }
            if phases[..index].iter().any(|p| p.status == phase.status) {
                return Err(PhasePlanError::Repeated(phase.status));
            }
        }

        Ok(Self { phases })
    }

    /// Timed phases in order.
    pub fn phases(&self) -> &[TimedPhase] {
        &self.phases
    }

    /// Configured duration of a timed phase.
    pub fn duration_of(&self, status: BattleStatus) -> Option<Duration> {
        self.phases
            .iter()
            .find(|phase| phase.status == status)
            .map(|phase| phase.duration)
    }

    /// Status following `status` in the plan. A status the plan does not list
    /// completes the battle.
    fn next_after(&self, status: BattleStatus) -> BattleStatus {
        self.phases
            .iter()
            .position(|phase| phase.status == status)
            .and_then(|index| self.phases.get(index + 1))
            .map(|phase| phase.status)
            .unwrap_or(BattleStatus::Completed)
    }

    /// Compute the transition triggered by `event` while in `from`.
    ///
    /// `anchor` is the instant the next deadline is measured from: the current
    /// time for selections and explicit advances, the expired deadline when a
    /// phase timed out.
    pub fn plan(
        &self,
        from: BattleStatus,
        event: BattleEvent,
        anchor: SystemTime,
    ) -> Result<Transition, InvalidTransition> {
        let to = match (from, event) {
            (BattleStatus::Selecting, BattleEvent::BothSelected) => self
                .phases
                .first()
                .map(|phase| phase.status)
                .unwrap_or(BattleStatus::Completed),
            (status, BattleEvent::Advance | BattleEvent::DeadlineExpired) if status.is_timed() => {
                self.next_after(status)
            }
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        let playing_ends_at = self.duration_of(to).map(|duration| anchor + duration);

        Ok(Transition {
            from,
            to,
            event,
            playing_ends_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(value: u64) -> Duration {
        Duration::from_secs(value)
    }

    #[test]
    fn full_happy_path_through_battle() {
        let plan = PhasePlan::default();
        let t0 = SystemTime::UNIX_EPOCH + secs(1_000);

        let selected = plan
            .plan(BattleStatus::Selecting, BattleEvent::BothSelected, t0)
            .unwrap();
        assert_eq!(selected.to, BattleStatus::PlayingP1);
        assert_eq!(selected.playing_ends_at, Some(t0 + secs(60)));

        let second = plan
            .plan(BattleStatus::PlayingP1, BattleEvent::Advance, t0)
            .unwrap();
        assert_eq!(second.to, BattleStatus::PlayingP2);

        let voting = plan
            .plan(BattleStatus::PlayingP2, BattleEvent::DeadlineExpired, t0)
            .unwrap();
        assert_eq!(voting.to, BattleStatus::Voting);
        assert_eq!(voting.playing_ends_at, Some(t0 + secs(30)));

        let done = plan
            .plan(BattleStatus::Voting, BattleEvent::DeadlineExpired, t0)
            .unwrap();
        assert_eq!(done.to, BattleStatus::Completed);
        assert_eq!(done.playing_ends_at, None);
    }

    #[test]
    fn completed_and_selecting_reject_advance() {
        let plan = PhasePlan::default();
        let now = SystemTime::now();

        let err = plan
            .plan(BattleStatus::Completed, BattleEvent::Advance, now)
            .unwrap_err();
        assert_eq!(err.from, BattleStatus::Completed);

        let err = plan
            .plan(BattleStatus::Selecting, BattleEvent::DeadlineExpired, now)
            .unwrap_err();
        assert_eq!(err.event, BattleEvent::DeadlineExpired);

        assert!(
            plan.plan(BattleStatus::PlayingP1, BattleEvent::BothSelected, now)
                .is_err()
        );
    }

    #[test]
    fn shortened_plan_skips_unlisted_phases() {
        let plan = PhasePlan::new(vec![TimedPhase {
            status: BattleStatus::PlayingP1,
            duration: secs(10),
        }])
        .unwrap();
        let now = SystemTime::now();

        let done = plan
            .plan(BattleStatus::PlayingP1, BattleEvent::Advance, now)
            .unwrap();
        assert_eq!(done.to, BattleStatus::Completed);
    }

    #[test]
    fn invalid_plans_are_rejected() {
        assert_eq!(PhasePlan::new(vec![]), Err(PhasePlanError::Empty));

        let wrong_start = vec![TimedPhase {
            status: BattleStatus::Voting,
            duration: secs(1),
        }];
        assert_eq!(
            PhasePlan::new(wrong_start),
            Err(PhasePlanError::MustStartWithFirstRound(BattleStatus::Voting))
        );

        let repeated = vec![
            TimedPhase {
                status: BattleStatus::PlayingP1,
                duration: secs(1),
            },
            TimedPhase {
                status: BattleStatus::PlayingP1,
                duration: secs(1),
            },
        ];
        assert_eq!(
            PhasePlan::new(repeated),
            Err(PhasePlanError::Repeated(BattleStatus::PlayingP1))
        );

        let terminal = vec![
            TimedPhase {
                status: BattleStatus::PlayingP1,
                duration: secs(1),
            },
            TimedPhase {
                status: BattleStatus::Completed,
                duration: secs(1),
            },
        ];
        assert_eq!(
            PhasePlan::new(terminal),
            Err(PhasePlanError::NotTimed(BattleStatus::Completed))
        );
    }
}
