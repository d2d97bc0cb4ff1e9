use std::{collections::HashMap, time::SystemTime};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Partner a queued player is looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Someone with a close taste.
    Similar,
    /// Someone with a distant taste.
    Opposite,
    /// Someone halfway between.
    #[default]
    Balanced,
}

/// A player waiting for a partner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    /// Changes on every join so a stale snapshot can be told apart from a re-join.
    pub queue_id: Uuid,
    /// Player waiting in this slot.
    pub player_id: Uuid,
    /// Policy used when this player initiates a match.
    pub mode: MatchMode,
    /// Join time, used for positions and tie-breaks.
    pub joined_at: SystemTime,
}

/// Receipt handed back on join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueTicket {
    /// Identifier of the entry just created.
    pub queue_id: Uuid,
    /// 1-based, advisory.
    pub position: usize,
}

/// Raised when an entry taken from a snapshot is no longer queued as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("queue entry for player `{player_id}` changed since the snapshot")]
pub struct PairConflict {
    /// Player whose entry no longer matches.
    pub player_id: Uuid,
}

/// What [`MatchQueue::leave`] found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// The entry was removed.
    Removed,
    /// The player was not queued.
    Absent,
    /// The player belongs to a pair whose battle is being created. The withdrawal is
    /// recorded so a failed pairing does not queue them again.
    Pending,
}

/// Two entries removed together, with the slots they occupied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedPair {
    slots: [(usize, QueueEntry); 2],
}

impl RemovedPair {
    /// The requester's entry.
    pub fn requester(&self) -> &QueueEntry {
        &self.slots[0].1
    }

    /// The chosen partner's entry.
    pub fn partner(&self) -> &QueueEntry {
        &self.slots[1].1
    }
}

/// Waiting players in join order, one entry per player.
///
/// Players taken out by [`MatchQueue::remove_pair`] stay tracked until the pair is
/// either [settled](MatchQueue::settle) or [restored](MatchQueue::restore), so a leave
/// arriving in between is not undone by a restore.
#[derive(Debug, Default)]
pub struct MatchQueue {
    entries: IndexMap<Uuid, QueueEntry>,
    /// Players of in-flight pairs, `true` once they asked to leave.
    in_flight: HashMap<Uuid, bool>,
}

impl MatchQueue {
    /// Empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of waiting players.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nobody is waiting.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert or replace the player's entry. A re-join moves the player to the back.
    pub fn join(&mut self, player_id: Uuid, mode: MatchMode, now: SystemTime) -> QueueTicket {
        // The new entry supersedes any in-flight one.
        self.withdraw_in_flight(player_id);
        self.entries.shift_remove(&player_id);
        let entry = QueueEntry {
            queue_id: Uuid::new_v4(),
            player_id,
            mode,
            joined_at: now,
        };
        let queue_id = entry.queue_id;
        self.entries.insert(player_id, entry);

        QueueTicket {
            queue_id,
            position: self.position(player_id).unwrap_or(self.entries.len()),
        }
    }

    /// Remove the player's entry.
    pub fn leave(&mut self, player_id: Uuid) -> LeaveOutcome {
        if self.withdraw_in_flight(player_id) {
            return LeaveOutcome::Pending;
        }
        match self.entries.shift_remove(&player_id) {
            Some(_) => LeaveOutcome::Removed,
            None => LeaveOutcome::Absent,
        }
    }

    /// Current entry of the player, if queued.
    pub fn entry(&self, player_id: Uuid) -> Option<&QueueEntry> {
        self.entries.get(&player_id)
    }

    /// 1-based position ordered by join time, queue order breaking ties.
    pub fn position(&self, player_id: Uuid) -> Option<usize> {
        let (index, _, entry) = self.entries.get_full(&player_id)?;
        let ahead = self
            .entries
            .values()
            .enumerate()
            .filter(|(other_index, other)| {
                other.joined_at < entry.joined_at
                    || (other.joined_at == entry.joined_at && *other_index < index)
            })
            .count();
        Some(ahead + 1)
    }

    /// Everyone queued except `player_id`, in queue order.
    pub fn snapshot_excluding(&self, player_id: Uuid) -> Vec<QueueEntry> {
        self.entries
            .values()
            .filter(|entry| entry.player_id != player_id)
            .cloned()
            .collect()
    }

    /// Remove both entries if each is still exactly the one from the snapshot.
    /// Nothing is removed on conflict.
    pub fn remove_pair(
        &mut self,
        requester: &QueueEntry,
        partner: &QueueEntry,
    ) -> Result<RemovedPair, PairConflict> {
        if requester.player_id == partner.player_id {
            return Err(PairConflict {
                player_id: partner.player_id,
            });
        }
        let requester_index = self.index_of_exact(requester)?;
        let partner_index = self.index_of_exact(partner)?;

        // Higher slot first so the lower index stays valid.
        let (high, low) = if requester_index > partner_index {
            (requester_index, partner_index)
        } else {
            (partner_index, requester_index)
        };
        let high_entry = self.entries.shift_remove_index(high).map(|(_, entry)| entry);
        let low_entry = self.entries.shift_remove_index(low).map(|(_, entry)| entry);
        let (Some(high_entry), Some(low_entry)) = (high_entry, low_entry) else {
            return Err(PairConflict {
                player_id: requester.player_id,
            });
        };

        let (requester_entry, partner_entry) = if high == requester_index {
            (high_entry, low_entry)
        } else {
            (low_entry, high_entry)
        };

        self.in_flight.insert(requester_entry.player_id, false);
        self.in_flight.insert(partner_entry.player_id, false);

        Ok(RemovedPair {
            slots: [
                (requester_index, requester_entry),
                (partner_index, partner_entry),
            ],
        })
    }

    /// Forget a pair that turned into a battle.
    pub fn settle(&mut self, pair: &RemovedPair) {
        for (_, entry) in &pair.slots {
            self.in_flight.remove(&entry.player_id);
        }
    }

    /// Put a removed pair back where it was. A player who re-joined meanwhile keeps
    /// the newer entry; one who left meanwhile stays out.
    pub fn restore(&mut self, pair: RemovedPair) {
        let mut slots = pair.slots;
        slots.sort_by_key(|(index, _)| *index);
        for (index, entry) in slots {
            let withdrawn = self.in_flight.remove(&entry.player_id).unwrap_or(false);
            if withdrawn || self.entries.contains_key(&entry.player_id) {
                continue;
            }
            let index = index.min(self.entries.len());
            self.entries.shift_insert(index, entry.player_id, entry);
        }
    }

    /// Mark an in-flight player as withdrawn. Returns whether they were in flight.
    fn withdraw_in_flight(&mut self, player_id: Uuid) -> bool {
        match self.in_flight.get_mut(&player_id) {
            Some(withdrawn) => {
                *withdrawn = true;
                true
            }
            None => false,
        }
    }

    fn index_of_exact(&self, expected: &QueueEntry) -> Result<usize, PairConflict> {
        match self.entries.get_full(&expected.player_id) {
            Some((index, _, current)) if current.queue_id == expected.queue_id => Ok(index),
            _ => Err(PairConflict {
                player_id: expected.player_id,
            }),
        }
    }
}

/// Similarity cut-offs for the strict candidate pools.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchThresholds {
    /// `similar` keeps candidates scoring at least this.
    pub similar: f64,
    /// `opposite` keeps candidates scoring at most this.
    pub opposite: f64,
}

impl Default for MatchThresholds {
    fn default() -> Self {
        Self {
            similar: 0.7,
            opposite: 0.3,
        }
    }
}

/// A queued player with their similarity to the requester.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    /// Snapshot of the candidate's queue entry.
    pub entry: QueueEntry,
    /// Clamped to `[0, 1]`.
    pub similarity: f64,
}

/// Pick the partner `mode` prefers among `candidates` (queue order).
///
/// The strict pool for the mode is used when non-empty, the whole list otherwise.
/// Ties go to the earliest join, then to queue order.
pub fn select_partner<'a>(
    mode: MatchMode,
    candidates: &'a [ScoredCandidate],
    thresholds: &MatchThresholds,
) -> Option<&'a ScoredCandidate> {
    let in_strict_pool = |candidate: &ScoredCandidate| match mode {
        MatchMode::Similar => candidate.similarity >= thresholds.similar,
        MatchMode::Opposite => candidate.similarity <= thresholds.opposite,
        MatchMode::Balanced => true,
    };
    let cost = |candidate: &ScoredCandidate| match mode {
        MatchMode::Similar => -candidate.similarity,
        MatchMode::Opposite => candidate.similarity,
        MatchMode::Balanced => (candidate.similarity - 0.5).abs(),
    };

    let strict: Vec<&ScoredCandidate> = candidates
        .iter()
        .filter(|candidate| in_strict_pool(*candidate))
        .collect();
    let pool: Vec<&ScoredCandidate> = if strict.is_empty() {
        candidates.iter().collect()
    } else {
        strict
    };

    let mut best: Option<&ScoredCandidate> = None;
    for candidate in pool {
        best = match best {
            None => Some(candidate),
            Some(current) => {
                let (new_cost, current_cost) = (cost(candidate), cost(current));
                let better = new_cost < current_cost
                    || (new_cost == current_cost
                        && candidate.entry.joined_at < current.entry.joined_at);
                Some(if better { candidate } else { current })
            }
        };
    }
    best
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn scored(similarity: f64, offset_secs: u64) -> ScoredCandidate {
        ScoredCandidate {
            entry: QueueEntry {
                queue_id: Uuid::new_v4(),
                player_id: Uuid::new_v4(),
                mode: MatchMode::Balanced,
                joined_at: SystemTime::UNIX_EPOCH + Duration::from_secs(offset_secs),
            },
            similarity,
        }
    }

    #[test]
    fn mode_picks_expected_partner() {
        let x = scored(0.9, 1);
        let y = scored(0.1, 2);
        let z = scored(0.5, 3);
        let pool = vec![x.clone(), y.clone(), z.clone()];
        let thresholds = MatchThresholds::default();

        let pick = |mode| {
            select_partner(mode, &pool, &thresholds)
                .unwrap()
                .entry
                .player_id
        };
        assert_eq!(pick(MatchMode::Similar), x.entry.player_id);
        assert_eq!(pick(MatchMode::Opposite), y.entry.player_id);
        assert_eq!(pick(MatchMode::Balanced), z.entry.player_id);
    }

    #[test]
    fn empty_strict_pool_falls_back_to_everyone() {
        let pool = vec![scored(0.4, 1), scored(0.6, 2)];
        let thresholds = MatchThresholds::default();

        let similar = select_partner(MatchMode::Similar, &pool, &thresholds).unwrap();
        assert_eq!(similar.similarity, 0.6);
        let opposite = select_partner(MatchMode::Opposite, &pool, &thresholds).unwrap();
        assert_eq!(opposite.similarity, 0.4);
        assert!(select_partner(MatchMode::Balanced, &[], &thresholds).is_none());
    }

    #[test]
    fn ties_go_to_longest_waiting() {
        let late = scored(0.8, 50);
        let early = scored(0.8, 10);
        let pool = vec![late, early.clone()];
        let chosen =
            select_partner(MatchMode::Similar, &pool, &MatchThresholds::default()).unwrap();
        assert_eq!(chosen.entry.player_id, early.entry.player_id);
    }

    #[test]
    fn rejoin_replaces_entry_and_moves_to_back() {
        let mut queue = MatchQueue::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let t = SystemTime::UNIX_EPOCH;

        let first = queue.join(a, MatchMode::Similar, t);
        queue.join(b, MatchMode::Balanced, t + Duration::from_secs(1));
        assert_eq!(first.position, 1);

        let second = queue.join(a, MatchMode::Opposite, t + Duration::from_secs(2));
        assert_eq!(queue.len(), 2);
        assert_ne!(first.queue_id, second.queue_id);
        assert_eq!(second.position, 2);
        assert_eq!(queue.position(b), Some(1));
        assert_eq!(queue.entry(a).unwrap().mode, MatchMode::Opposite);
    }

    #[test]
    fn remove_pair_rejects_stale_snapshot() {
        let mut queue = MatchQueue::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let now = SystemTime::now();
        queue.join(a, MatchMode::Balanced, now);
        queue.join(b, MatchMode::Balanced, now);

        let requester = queue.entry(a).cloned().unwrap();
        let partner = queue.snapshot_excluding(a).remove(0);
        queue.join(b, MatchMode::Similar, now);

        let err = queue.remove_pair(&requester, &partner).unwrap_err();
        assert_eq!(err.player_id, b);
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.leave(b), LeaveOutcome::Removed);
        assert_eq!(queue.leave(b), LeaveOutcome::Absent);
        assert!(queue.remove_pair(&requester, &partner).is_err());
    }

    #[test]
    fn restore_puts_entries_back_in_place() {
        let mut queue = MatchQueue::new();
        let ids: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        let t = SystemTime::UNIX_EPOCH;
        for (offset, id) in ids.iter().enumerate() {
            queue.join(*id, MatchMode::Balanced, t + Duration::from_secs(offset as u64));
        }

        let requester = queue.entry(ids[3]).cloned().unwrap();
        let partner = queue.entry(ids[1]).cloned().unwrap();
        let removed = queue.remove_pair(&requester, &partner).unwrap();
        assert_eq!(removed.requester().player_id, ids[3]);
        assert_eq!(removed.partner().player_id, ids[1]);
        assert_eq!(queue.len(), 2);

        queue.restore(removed);
        let order: Vec<Uuid> = queue
            .snapshot_excluding(Uuid::nil())
            .iter()
            .map(|entry| entry.player_id)
            .collect();
        assert_eq!(order, ids);
        assert_eq!(queue.position(ids[3]), Some(4));
    }

    #[test]
    fn leave_during_pairing_survives_restore() {
        let mut queue = MatchQueue::new();
        let now = SystemTime::UNIX_EPOCH;
        let leaver = Uuid::new_v4();
        let seeker = Uuid::new_v4();
        queue.join(leaver, MatchMode::Balanced, now);
        queue.join(seeker, MatchMode::Balanced, now + Duration::from_secs(1));

        let requester = queue.entry(seeker).cloned().unwrap();
        let partner = queue.entry(leaver).cloned().unwrap();
        let removed = queue.remove_pair(&requester, &partner).unwrap();

        assert_eq!(queue.leave(leaver), LeaveOutcome::Pending);
        queue.restore(removed);

        assert!(queue.entry(leaver).is_none());
        assert_eq!(queue.position(seeker), Some(1));
        assert!(queue.in_flight.is_empty());
    }

    #[test]
    fn settled_pair_no_longer_tracks_leaves() {
        let mut queue = MatchQueue::new();
        let now = SystemTime::UNIX_EPOCH;
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        queue.join(a, MatchMode::Balanced, now);
        queue.join(b, MatchMode::Balanced, now);

        let requester = queue.entry(a).cloned().unwrap();
        let partner = queue.entry(b).cloned().unwrap();
        let removed = queue.remove_pair(&requester, &partner).unwrap();
        queue.settle(&removed);

        assert!(queue.in_flight.is_empty());
        assert_eq!(queue.leave(b), LeaveOutcome::Absent);
        assert!(queue.in_flight.is_empty());
    }
}
