//! Every way the engine can fail, in one enum.

use failure::Fail;
use std::io;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The errors the engine, the persister and the viewer can report.
#[derive(Debug, Fail)]
pub enum Error {
    /// The rectangle handed to the coordinator cannot be mapped onto
    /// the pixel grid.  Nothing is dispatched and the previous frame
    /// stays valid.
    #[fail(display = "invalid view bounds: {}", _0)]
    InvalidBounds(String),

    /// The engine configuration was rejected before any thread was
    /// spawned.
    #[fail(display = "invalid configuration: {}", _0)]
    Config(String),

    /// Staging or publishing a frame failed.  This is fatal: the whole
    /// engine shuts down.
    #[fail(display = "failed to persist frame for round {}: {}", _0, _1)]
    PersistFailure(u64, #[cause] io::Error),

    /// The persister found a band that was not written for the round
    /// it is serializing.
    #[fail(
        display = "band starting at row {} carries round {} while persisting round {}",
        _0, _1, _2
    )]
    TornFrame(usize, u64, u64),

    /// The viewer could not decode a published frame.
    #[fail(display = "failed to load frame: {}", _0)]
    Load(#[cause] image::ImageError),

    /// The quit signal has been raised; no further rounds will run.
    #[fail(display = "the engine is shutting down")]
    Terminated,

    /// One of the engine threads panicked.
    #[fail(display = "an engine thread panicked")]
    ThreadPanicked,
}

impl Error {
    /// True for the errors that are reported synchronously and leave
    /// the engine running.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::InvalidBounds(_) => true,
            _ => false,
        }
    }
}
