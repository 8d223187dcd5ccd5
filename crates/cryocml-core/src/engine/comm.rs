//! Collective operations between the replicas of a distributed search.
//!
//! Every replica runs the same search on its own copy of the orientation state and
//! meets the others at fixed points: the projection order of each iteration, the
//! candidate scores and the choice of each projection, and the end of each
//! iteration. A replica that calls a different collective, or leaves, fails the
//! whole group instead of letting the replicas drift apart.

use super::error::EngineError;
use super::tasks::spin::CandidateScore;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

/// Chosen candidate slot and in-plane step of one projection.
pub type Choice = Option<(usize, usize)>;

pub trait Collective {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    #[inline]
    fn is_coordinator(&self) -> bool {
        self.rank() == 0
    }

    /// Returns the coordinator's `order` on every rank.
    fn broadcast_order(&mut self, order: Vec<usize>) -> Result<Vec<usize>, EngineError>;

    /// Merges the partial scores of all ranks with [`merge_scores`].
    fn reduce_scores(
        &mut self,
        partial: Vec<Option<CandidateScore>>,
    ) -> Result<Vec<Option<CandidateScore>>, EngineError>;

    /// Returns the coordinator's `choice` on every rank.
    fn broadcast_choice(&mut self, choice: Choice) -> Result<Choice, EngineError>;

    fn barrier(&mut self) -> Result<(), EngineError>;
}

/// Elementwise minimum of two partial score vectors; `None` marks a candidate the
/// rank did not examine.
pub fn merge_scores(
    mut acc: Vec<Option<CandidateScore>>,
    other: &[Option<CandidateScore>],
) -> Vec<Option<CandidateScore>> {
    if acc.len() < other.len() {
        acc.resize(other.len(), None);
    }
    for (slot, incoming) in acc.iter_mut().zip(other) {
        *slot = match (*slot, *incoming) {
            (Some(a), Some(b)) if b.discrepancy < a.discrepancy => Some(b),
            (Some(a), _) => Some(a),
            (None, b) => b,
        };
    }
    acc
}

/// The single-worker strategy: every collective returns its input.
#[derive(Debug, Default, Clone, Copy)]
pub struct Solo;

impl Collective for Solo {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn broadcast_order(&mut self, order: Vec<usize>) -> Result<Vec<usize>, EngineError> {
        Ok(order)
    }

    fn reduce_scores(
        &mut self,
        partial: Vec<Option<CandidateScore>>,
    ) -> Result<Vec<Option<CandidateScore>>, EngineError> {
        Ok(partial)
    }

    fn broadcast_choice(&mut self, choice: Choice) -> Result<Choice, EngineError> {
        Ok(choice)
    }

    fn barrier(&mut self) -> Result<(), EngineError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CollectiveKind {
    Order,
    Scores,
    Choice,
    Barrier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Tag {
    kind: CollectiveKind,
    seq: u64,
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} #{}", self.kind, self.seq)
    }
}

#[derive(Debug, Clone)]
enum Payload {
    Order(Vec<usize>),
    Scores(Vec<Option<CandidateScore>>),
    Choice(Choice),
    Empty,
}

#[derive(Debug)]
struct Round {
    size: usize,
    generation: u64,
    arrived: usize,
    slots: Vec<Option<(Tag, Payload)>>,
    completed: Arc<Vec<(Tag, Payload)>>,
    departed: bool,
}

#[derive(Debug)]
struct Rendezvous {
    round: Mutex<Round>,
    wake: Condvar,
}

impl Rendezvous {
    fn lock(&self) -> MutexGuard<'_, Round> {
        self.round.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Builds the ranks of a thread-backed group.
pub struct ThreadGroup;

impl ThreadGroup {
    /// One handle per rank; move each into its own thread.
    pub fn new(size: usize) -> Vec<ThreadComm> {
        let size = size.max(1);
        let shared = Arc::new(Rendezvous {
            round: Mutex::new(Round {
                size,
                generation: 0,
                arrived: 0,
                slots: vec![None; size],
                completed: Arc::new(Vec::new()),
                departed: false,
            }),
            wake: Condvar::new(),
        });
        (0..size)
            .map(|rank| ThreadComm {
                rank,
                size,
                seq: 0,
                shared: Arc::clone(&shared),
            })
            .collect()
    }
}

/// One rank of a [`ThreadGroup`]. Every collective is a tagged all-gather.
#[derive(Debug)]
pub struct ThreadComm {
    rank: usize,
    size: usize,
    seq: u64,
    shared: Arc<Rendezvous>,
}

impl ThreadComm {
    fn exchange(
        &mut self,
        kind: CollectiveKind,
        payload: Payload,
    ) -> Result<Vec<Payload>, EngineError> {
        let tag = Tag {
            kind,
            seq: self.seq,
        };
        self.seq += 1;

        let completed = {
            let mut round = self.shared.lock();
            if round.departed {
                return Err(EngineError::WorkerDeparted { rank: self.rank });
            }
            let generation = round.generation;
            round.slots[self.rank] = Some((tag, payload));
            round.arrived += 1;
            if round.arrived == round.size {
                let entries = round.slots.iter_mut().filter_map(Option::take).collect();
                round.completed = Arc::new(entries);
                round.arrived = 0;
                round.generation += 1;
                self.shared.wake.notify_all();
            } else {
                while round.generation == generation && !round.departed {
                    round = self
                        .shared
                        .wake
                        .wait(round)
                        .unwrap_or_else(|poisoned| poisoned.into_inner());
                }
                if round.generation == generation {
                    return Err(EngineError::WorkerDeparted { rank: self.rank });
                }
            }
            Arc::clone(&round.completed)
        };

        if let Some((found, _)) = completed.iter().find(|(t, _)| *t != tag) {
            return Err(EngineError::CollectiveMismatch {
                rank: self.rank,
                expected: tag.to_string(),
                found: found.to_string(),
            });
        }
        Ok(completed.iter().map(|(_, p)| p.clone()).collect())
    }

    fn unexpected(&self, payload: &Payload) -> EngineError {
        EngineError::Internal(format!(
            "rank {} received an unexpected payload: {:?}",
            self.rank, payload
        ))
    }
}

impl Drop for ThreadComm {
    fn drop(&mut self) {
        let mut round = self.shared.lock();
        round.departed = true;
        self.shared.wake.notify_all();
    }
}

impl Collective for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn broadcast_order(&mut self, order: Vec<usize>) -> Result<Vec<usize>, EngineError> {
        let mut all = self.exchange(CollectiveKind::Order, Payload::Order(order))?;
        match all.swap_remove(0) {
            Payload::Order(order) => Ok(order),
            other => Err(self.unexpected(&other)),
        }
    }

    fn reduce_scores(
        &mut self,
        partial: Vec<Option<CandidateScore>>,
    ) -> Result<Vec<Option<CandidateScore>>, EngineError> {
        let all = self.exchange(CollectiveKind::Scores, Payload::Scores(partial))?;
        let mut merged = Vec::new();
        for payload in &all {
            match payload {
                Payload::Scores(scores) => merged = merge_scores(merged, scores),
                other => return Err(self.unexpected(other)),
            }
        }
        Ok(merged)
    }

    fn broadcast_choice(&mut self, choice: Choice) -> Result<Choice, EngineError> {
        let mut all = self.exchange(CollectiveKind::Choice, Payload::Choice(choice))?;
        match all.swap_remove(0) {
            Payload::Choice(choice) => Ok(choice),
            other => Err(self.unexpected(&other)),
        }
    }

    fn barrier(&mut self) -> Result<(), EngineError> {
        self.exchange(CollectiveKind::Barrier, Payload::Empty)
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn score(d: f64, p: usize) -> Option<CandidateScore> {
        Some(CandidateScore {
            discrepancy: d,
            psi_index: p,
        })
    }

    #[test]
    fn merge_takes_the_elementwise_minimum() {
        let a = vec![score(2.0, 1), None, score(5.0, 3), None];
        let b = vec![score(1.0, 4), score(3.0, 0), score(5.0, 9), None];
        assert_eq!(
            merge_scores(a, &b),
            vec![score(1.0, 4), score(3.0, 0), score(5.0, 3), None]
        );
        assert_eq!(merge_scores(Vec::new(), &[score(1.0, 0)]), vec![score(1.0, 0)]);
    }

    #[test]
    fn solo_collectives_are_identities() {
        let mut solo = Solo;
        assert!(solo.is_coordinator());
        assert_eq!(solo.broadcast_order(vec![2, 0, 1]).unwrap(), vec![2, 0, 1]);
        assert_eq!(solo.broadcast_choice(Some((3, 4))).unwrap(), Some((3, 4)));
        assert_eq!(solo.reduce_scores(vec![None]).unwrap(), vec![None]);
        solo.barrier().unwrap();
    }

    #[test]
    fn thread_group_shares_the_coordinator_values() {
        let results: Vec<_> = thread::scope(|s| {
            let handles: Vec<_> = ThreadGroup::new(3)
                .into_iter()
                .map(|mut comm| {
                    s.spawn(move || {
                        let rank = comm.rank();
                        let order = comm.broadcast_order(vec![rank; 2]).unwrap();
                        let mut partial = vec![None; 3];
                        partial[rank] = score(rank as f64 + 1.0, rank);
                        let merged = comm.reduce_scores(partial).unwrap();
                        let choice = comm.broadcast_choice(Some((rank, rank))).unwrap();
                        comm.barrier().unwrap();
                        (order, merged, choice)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        for (order, merged, choice) in results {
            assert_eq!(order, vec![0, 0]);
            assert_eq!(merged, vec![score(1.0, 0), score(2.0, 1), score(3.0, 2)]);
            assert_eq!(choice, Some((0, 0)));
        }
    }

    #[test]
    fn diverging_collectives_fail_on_every_rank() {
        let results: Vec<_> = thread::scope(|s| {
            let mut comms = ThreadGroup::new(2).into_iter();
            let mut first = comms.next().unwrap();
            let mut second = comms.next().unwrap();
            let a = s.spawn(move || first.barrier());
            let b = s.spawn(move || second.broadcast_choice(None).map(|_| ()));
            vec![a.join().unwrap(), b.join().unwrap()]
        });
        for result in results {
            assert!(matches!(
                result,
                Err(EngineError::CollectiveMismatch { .. })
            ));
        }
    }

    #[test]
    fn departed_rank_releases_the_waiters() {
        let mut comms = ThreadGroup::new(2);
        let leaver = comms.pop().unwrap();
        let mut stayer = comms.pop().unwrap();
        let waiter = thread::spawn(move || stayer.barrier());
        drop(leaver);
        assert!(matches!(
            waiter.join().unwrap(),
            Err(EngineError::WorkerDeparted { rank: 0 })
        ));
    }
}
