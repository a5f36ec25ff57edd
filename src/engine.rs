// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The engine owns everything the threads share: the round gate, the
//! completion barrier, the frame buffer and the freshness signal.
//! `Engine::run` starts one thread per worker and one persister inside
//! a crossbeam scope, hands the calling thread a `Coordinator`, and
//! joins everything once the coordinator is done.
//!
//! A round goes like this.  The coordinator submits bounds; the gate
//! waits for the previous round to drain, installs the bounds under a
//! new round number and wakes the workers.  Each worker renders its
//! band, reports to the gate and arrives at the barrier, where the
//! persister is already waiting.  When the last of the N+1 parties
//! arrives the persister reads the whole frame, publishes it, raises
//! the freshness signal and marks the round persisted, which is what
//! finally lets the gate accept the next bounds.

use std::sync::{Mutex, PoisonError};
use std::thread;

use tracing::{debug, error, info, warn};

use crate::barrier::CompletionBarrier;
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::frame::FrameBuffer;
use crate::freshness::FreshnessSignal;
use crate::gate::{RoundGate, RoundPhase};
use crate::partition::partition_rows;
use crate::persist::FramePersister;
use crate::planes::{PlaneMapper, ViewBounds};

/// A configured, not yet running, renderer.
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    gate: RoundGate,
    barrier: CompletionBarrier,
    frame: FrameBuffer,
    freshness: FreshnessSignal,
    failure: Mutex<Option<Error>>,
}

impl Engine {
    /// Validates the configuration and splits the frame between the
    /// workers.  No thread is started until `run`.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let partition = partition_rows(config.height, config.workers)?;
        info!(
            width = config.width,
            height = config.height,
            workers = config.workers,
            max_iterations = config.max_iterations,
            "engine configured"
        );
        Ok(Engine {
            gate: RoundGate::new(config.workers),
            barrier: CompletionBarrier::new(config.workers + 1),
            frame: FrameBuffer::new(config.width, config.height, &partition),
            freshness: FreshnessSignal::new(),
            failure: Mutex::new(None),
            config,
        })
    }

    /// The configuration the engine was built with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Another handle on the freshness signal, for a viewer living
    /// outside the engine.
    pub fn freshness(&self) -> FreshnessSignal {
        self.freshness.clone()
    }

    /// Start the workers and the persister and call `drive` on this
    /// thread with a coordinator.  When `drive` returns (or panics) the
    /// quit signal is raised and every thread is joined.  A round still
    /// computing at that point is not published; call
    /// `Coordinator::wait_for_drain` first to keep it.
    ///
    /// Returns what `drive` returned, unless the persister failed, in
    /// which case its error is returned instead.
    pub fn run<F, R>(self, drive: F) -> Result<R>
    where
        F: FnOnce(&Coordinator<'_>) -> R,
    {
        let engine = &self;
        let outcome = crossbeam::scope(|scope| {
            for id in 0..engine.config.workers {
                scope.spawn(move |_| {
                    let _guard = QuitGuard::on_panic(engine);
                    engine.work(id)
                });
            }
            scope.spawn(move |_| {
                let _guard = QuitGuard::on_panic(engine);
                engine.persist_rounds()
            });
            let _guard = QuitGuard::always(engine);
            drive(&Coordinator { engine })
        });
        let value = outcome.map_err(|_| Error::ThreadPanicked)?;
        let failure = self
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match failure {
            Some(err) => Err(err),
            None => Ok(value),
        }
    }

    fn request_quit(&self) {
        self.gate.quit();
        self.barrier.abort();
    }

    fn fail(&self, err: Error) {
        self.failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_or_insert(err);
        self.request_quit();
    }

    fn work(&self, id: usize) {
        let (width, height) = (self.config.width, self.config.height);
        let mut last_seen = 0;
        while let Some((round, bounds)) = self.gate.wait_for_round(last_seen) {
            last_seen = round;
            let plane = PlaneMapper::new(width, height, &bounds);
            self.frame
                .band(id)
                .render(&plane, width, self.config.max_iterations, round);
            debug!(worker = id, round, "rows done");
            self.gate.report_done(round);
            if self.barrier.wait().is_err() {
                break;
            }
        }
        debug!(worker = id, "worker stopped");
    }

    fn persist_rounds(&self) {
        let persister = FramePersister::new(&self.frame, self.config.output.clone());
        while let Ok(generation) = self.barrier.wait() {
            let round = self.gate.current_round();
            // One barrier release per round, and rounds count from 1.
            debug_assert_eq!(generation, round);
            match persister.persist(round) {
                Ok(handle) => {
                    self.freshness.raise(handle);
                    self.gate.mark_persisted(round);
                    info!(round, path = %persister.output().display(), "frame persisted");
                }
                Err(err) => {
                    error!(round, "persister giving up: {}", err);
                    self.fail(err);
                    break;
                }
            }
        }
        debug!("persister stopped");
    }
}

/// Raises the quit signal when dropped, either always or only while
/// the thread is unwinding.  Keeps one dead thread from leaving the
/// others blocked forever.
struct QuitGuard<'a> {
    engine: &'a Engine,
    only_on_panic: bool,
}

impl<'a> QuitGuard<'a> {
    fn always(engine: &'a Engine) -> Self {
        QuitGuard {
            engine,
            only_on_panic: false,
        }
    }

    fn on_panic(engine: &'a Engine) -> Self {
        QuitGuard {
            engine,
            only_on_panic: true,
        }
    }
}

impl<'a> Drop for QuitGuard<'a> {
    fn drop(&mut self) {
        if !self.only_on_panic || thread::panicking() {
            self.engine.request_quit();
        }
    }
}

/// The coordinator's side of a running engine.
#[derive(Debug)]
pub struct Coordinator<'a> {
    engine: &'a Engine,
}

impl<'a> Coordinator<'a> {
    /// Validate `bounds`, wait for the in-flight round to drain and
    /// dispatch a new round.  Returns the new round number.  Bad
    /// bounds are refused at once and nothing is dispatched.
    pub fn submit_bounds(&self, bounds: ViewBounds) -> Result<u64> {
        if let Err(err) = bounds.validate() {
            warn!("bounds refused: {}", err);
            return Err(err);
        }
        let round = self.engine.gate.submit(bounds)?;
        info!(
            round,
            left = bounds.left,
            right = bounds.right,
            top = bounds.top,
            bottom = bounds.bottom,
            "round dispatched"
        );
        Ok(round)
    }

    /// `submit_bounds` from four edges.
    pub fn submit(&self, left: f64, right: f64, top: f64, bottom: f64) -> Result<u64> {
        self.submit_bounds(ViewBounds::new(left, right, top, bottom))
    }

    /// Block until the last dispatched round has been published.
    pub fn wait_for_drain(&self) -> Result<()> {
        self.engine.gate.wait_for_drain()
    }

    /// Raise the quit signal.  Every thread stops at its next
    /// checkpoint; a band being rendered is finished first.
    pub fn request_quit(&self) {
        info!("quit requested");
        self.engine.request_quit();
    }

    /// Where the current round stands.
    pub fn phase(&self) -> RoundPhase {
        self.engine.gate.phase()
    }

    /// The engine's freshness signal.
    pub fn freshness(&self) -> FreshnessSignal {
        self.engine.freshness()
    }

    /// The engine's configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.engine.config
    }
}
