//! The RoundGate is the monitor that starts and drains rounds.  It
//! holds the round-sequence number, the bounds of the current round,
//! the number of workers that have finished it and the number of the
//! last round the persister published, all under one mutex.  Every
//! wait is a predicate over that state on a single condition variable,
//! and every change wakes all waiters.
//!
//! A round is drained only when all workers have reported *and* the
//! persister has published it.  Tying both to the same round number
//! is what keeps the coordinator from dispatching round r+1 while the
//! frame of round r is still being written.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::error::{Error, Result};
use crate::planes::ViewBounds;

/// Where the current round stands, as seen by the coordinator.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RoundPhase {
    /// The last dispatched round has been published (or none has been
    /// dispatched yet).  New bounds are accepted immediately.
    Idle,
    /// Workers are computing; `completed` of them have reported.
    Computing {
        /// Workers that have finished their rows.
        completed: usize,
    },
    /// Every worker has reported and the frame is going through the
    /// barrier and out to storage.
    Persisting,
    /// The quit signal has been raised.
    Terminating,
}

#[derive(Debug)]
struct RoundState {
    round: u64,
    bounds: ViewBounds,
    completed: usize,
    persisted: u64,
    quit: bool,
}

impl RoundState {
    fn is_drained(&self, workers: usize) -> bool {
        self.completed == workers && self.persisted == self.round
    }
}

/// Monitor gating rounds for a fixed number of workers.
#[derive(Debug)]
pub struct RoundGate {
    workers: usize,
    state: Mutex<RoundState>,
    changed: Condvar,
}

impl RoundGate {
    /// A gate with no round dispatched yet.  The initial state counts
    /// as drained so the first submission goes straight through.
    pub fn new(workers: usize) -> Self {
        RoundGate {
            workers,
            state: Mutex::new(RoundState {
                round: 0,
                bounds: ViewBounds::DEFAULT,
                completed: workers,
                persisted: 0,
                quit: false,
            }),
            changed: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RoundState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait_while<'a, F>(
        &self,
        guard: MutexGuard<'a, RoundState>,
        condition: F,
    ) -> MutexGuard<'a, RoundState>
    where
        F: FnMut(&mut RoundState) -> bool,
    {
        self.changed
            .wait_while(guard, condition)
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until the in-flight round has drained, then install
    /// `bounds` as a new round and release the workers.  Returns the
    /// new round number, or `Terminated` once quit has been raised.
    pub fn submit(&self, bounds: ViewBounds) -> Result<u64> {
        let workers = self.workers;
        let mut state = self.wait_while(self.lock(), |s| !s.quit && !s.is_drained(workers));
        if state.quit {
            return Err(Error::Terminated);
        }
        state.round += 1;
        state.bounds = bounds;
        state.completed = 0;
        let round = state.round;
        drop(state);
        self.changed.notify_all();
        Ok(round)
    }

    /// Block until the in-flight round has been computed and
    /// published.
    pub fn wait_for_drain(&self) -> Result<()> {
        let workers = self.workers;
        let state = self.wait_while(self.lock(), |s| !s.quit && !s.is_drained(workers));
        if state.quit {
            Err(Error::Terminated)
        } else {
            Ok(())
        }
    }

    /// Worker side: block until a round newer than `last_seen` is
    /// dispatched and return it with its bounds.  Returns `None` once
    /// quit has been raised.
    pub fn wait_for_round(&self, last_seen: u64) -> Option<(u64, ViewBounds)> {
        let state = self.wait_while(self.lock(), |s| !s.quit && s.round == last_seen);
        if state.quit {
            None
        } else {
            Some((state.round, state.bounds))
        }
    }

    /// Worker side: count one worker as finished with `round`.
    pub fn report_done(&self, round: u64) {
        let mut state = self.lock();
        debug_assert_eq!(state.round, round);
        debug_assert!(state.completed < self.workers);
        state.completed += 1;
        drop(state);
        self.changed.notify_all();
    }

    /// The number of the most recently dispatched round.
    pub fn current_round(&self) -> u64 {
        self.lock().round
    }

    /// Persister side: `round` has been published.
    pub fn mark_persisted(&self, round: u64) {
        let mut state = self.lock();
        debug_assert_eq!(state.round, round);
        state.persisted = round;
        drop(state);
        self.changed.notify_all();
    }

    /// Raise the quit signal and wake everyone blocked on the gate.
    pub fn quit(&self) {
        self.lock().quit = true;
        self.changed.notify_all();
    }

    /// Whether quit has been raised.
    pub fn is_quit(&self) -> bool {
        self.lock().quit
    }

    /// Snapshot of the round state machine.
    pub fn phase(&self) -> RoundPhase {
        let state = self.lock();
        if state.quit {
            RoundPhase::Terminating
        } else if state.persisted == state.round {
            RoundPhase::Idle
        } else if state.completed < self.workers {
            RoundPhase::Computing {
                completed: state.completed,
            }
        } else {
            RoundPhase::Persisting
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel::{unbounded, Receiver, RecvTimeoutError};
    use std::time::Duration;

    const SHORT: Duration = Duration::from_millis(50);
    const LONG: Duration = Duration::from_secs(10);

    fn still_blocked<T>(rx: &Receiver<T>) -> bool {
        match rx.recv_timeout(SHORT) {
            Err(RecvTimeoutError::Timeout) => true,
            _ => false,
        }
    }

    #[test]
    fn first_submission_goes_straight_through() {
        let gate = RoundGate::new(3);
        assert_eq!(gate.phase(), RoundPhase::Idle);
        assert_eq!(gate.submit(ViewBounds::ZOOMED).unwrap(), 1);
        assert_eq!(gate.phase(), RoundPhase::Computing { completed: 0 });
        assert_eq!(gate.wait_for_round(0), Some((1, ViewBounds::ZOOMED)));
    }

    #[test]
    fn phases_follow_the_round() {
        let gate = RoundGate::new(2);
        gate.submit(ViewBounds::DEFAULT).unwrap();
        gate.report_done(1);
        assert_eq!(gate.phase(), RoundPhase::Computing { completed: 1 });
        gate.report_done(1);
        assert_eq!(gate.phase(), RoundPhase::Persisting);
        gate.mark_persisted(1);
        assert_eq!(gate.phase(), RoundPhase::Idle);
        gate.quit();
        assert_eq!(gate.phase(), RoundPhase::Terminating);
    }

    #[test]
    fn next_submission_waits_for_workers_and_persister() {
        let gate = RoundGate::new(2);
        gate.submit(ViewBounds::DEFAULT).unwrap();
        let (tx, rx) = unbounded();
        crossbeam::scope(|s| {
            s.spawn(|_| tx.send(gate.submit(ViewBounds::ZOOMED)).unwrap());

            assert!(still_blocked(&rx));
            gate.report_done(1);
            gate.report_done(1);
            // All workers are done but the frame is not out yet.
            assert!(still_blocked(&rx));
            gate.mark_persisted(1);
            assert_eq!(rx.recv_timeout(LONG).unwrap().unwrap(), 2);
        })
        .unwrap();
        assert_eq!(gate.wait_for_round(1), Some((2, ViewBounds::ZOOMED)));
    }

    #[test]
    fn workers_wait_for_a_new_round() {
        let gate = RoundGate::new(1);
        let (tx, rx) = unbounded();
        crossbeam::scope(|s| {
            s.spawn(|_| tx.send(gate.wait_for_round(0)).unwrap());
            assert!(still_blocked(&rx));
            gate.submit(ViewBounds::ZOOMED).unwrap();
            assert_eq!(rx.recv_timeout(LONG).unwrap(), Some((1, ViewBounds::ZOOMED)));
        })
        .unwrap();
    }

    #[test]
    fn quit_wakes_every_waiter() {
        let gate = RoundGate::new(2);
        gate.submit(ViewBounds::DEFAULT).unwrap();
        let (tx, rx) = unbounded();
        crossbeam::scope(|s| {
            let gate = &gate;
            let tx1 = tx.clone();
            s.spawn(move |_| tx1.send(gate.wait_for_round(1).is_none()).unwrap());
            let tx2 = tx.clone();
            s.spawn(move |_| tx2.send(gate.wait_for_drain().is_err()).unwrap());
            let tx3 = tx.clone();
            s.spawn(move |_| tx3.send(gate.submit(ViewBounds::ZOOMED).is_err()).unwrap());

            assert!(still_blocked(&rx));
            gate.quit();
            for _ in 0..3 {
                assert!(rx.recv_timeout(LONG).unwrap());
            }
        })
        .unwrap();
        assert!(gate.is_quit());
    }

    #[test]
    fn submit_after_quit_is_refused() {
        let gate = RoundGate::new(1);
        gate.quit();
        match gate.submit(ViewBounds::DEFAULT) {
            Err(Error::Terminated) => {}
            other => panic!("expected Terminated, got {:?}", other),
        }
        assert_eq!(gate.current_round(), 0);
    }
}
