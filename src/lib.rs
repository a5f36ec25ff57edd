#![deny(missing_docs)]
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Round-synchronized Mandelbrot renderer
//!
//! The Mandelbrot set is the set of points c on the complex plane for
//! which z = z * z + c, iterated from z = 0, never goes to infinity.
//! How quickly a point outside the set escapes (how many iterations
//! it takes |z| to pass 2) is the number used to shade its pixel.
//!
//! This crate renders the set over and over, once per set of view
//! bounds handed to it.  A fixed pool of workers shares the frame, each
//! owning a band of rows.  A round gate releases them when new bounds
//! arrive and holds the next bounds back until the round is done; a
//! completion barrier brings the workers together with the persister,
//! which writes the finished frame out as a TGA file and raises a
//! freshness signal for whatever viewer is polling for it.
//!
//! ```no_run
//! use mandelround::{Engine, EngineConfig, ViewBounds};
//!
//! let engine = Engine::new(EngineConfig::default()).unwrap();
//! engine
//!     .run(|coordinator| {
//!         coordinator.submit_bounds(ViewBounds::DEFAULT)?;
//!         coordinator.submit_bounds(ViewBounds::ZOOMED)?;
//!         coordinator.wait_for_drain()
//!     })
//!     .unwrap()
//!     .unwrap();
//! ```

extern crate crossbeam;
extern crate failure;
extern crate image;
extern crate itertools;
extern crate num;
extern crate tempfile;
extern crate tracing;

pub mod barrier;
pub mod config;
pub mod engine;
pub mod error;
pub mod escape;
pub mod frame;
pub mod freshness;
pub mod gate;
pub mod partition;
pub mod persist;
pub mod planes;
pub mod viewer;

pub use config::EngineConfig;
pub use engine::{Coordinator, Engine};
pub use error::{Error, Result};
pub use freshness::{FrameHandle, FreshnessSignal};
pub use gate::RoundPhase;
pub use planes::ViewBounds;
pub use viewer::{FrameViewer, LoadedFrame};
