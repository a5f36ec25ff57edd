//! A reusable rendezvous for a fixed number of parties that can be
//! broken.  `std::sync::Barrier` has no way to release the threads
//! waiting on it when the program is shutting down, so the completion
//! barrier keeps its own arrival count and generation under a mutex
//! and adds an `abort` that fails every present and future wait.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::error::{Error, Result};

#[derive(Debug)]
struct BarrierState {
    arrived: usize,
    generation: u64,
    aborted: bool,
}

/// The rendezvous between the workers and the persister.  Built with
/// `workers + 1` parties.  Releasing it is the point after which every
/// worker's writes to the frame are visible to the persister.
#[derive(Debug)]
pub struct CompletionBarrier {
    parties: usize,
    state: Mutex<BarrierState>,
    released: Condvar,
}

impl CompletionBarrier {
    /// A barrier that releases once `parties` threads have arrived.
    pub fn new(parties: usize) -> Self {
        assert!(parties > 0, "a barrier needs at least one party");
        CompletionBarrier {
            parties,
            state: Mutex::new(BarrierState {
                arrived: 0,
                generation: 0,
                aborted: false,
            }),
            released: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BarrierState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Arrive and block until every party has arrived, then return how
    /// many times the barrier has released, counting this one.  Fails
    /// with `Terminated` if the barrier is aborted first, or was already.
    pub fn wait(&self) -> Result<u64> {
        let mut state = self.lock();
        if state.aborted {
            return Err(Error::Terminated);
        }
        state.arrived += 1;
        if state.arrived == self.parties {
            state.arrived = 0;
            state.generation += 1;
            let generation = state.generation;
            drop(state);
            self.released.notify_all();
            return Ok(generation);
        }
        let generation = state.generation;
        let state = self
            .released
            .wait_while(state, |s| !s.aborted && s.generation == generation)
            .unwrap_or_else(PoisonError::into_inner);
        if state.generation != generation {
            // Released before the abort came in.
            Ok(generation + 1)
        } else {
            Err(Error::Terminated)
        }
    }

    /// Break the barrier: wake every waiting party with `Terminated`
    /// and refuse all later arrivals.
    pub fn abort(&self) {
        self.lock().aborted = true;
        self.released.notify_all();
    }
}
