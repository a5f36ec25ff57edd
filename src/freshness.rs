//! The freshness signal between the persister and the viewer.  Rather
//! than a bare flag, the persister leaves a versioned handle to the
//! frame it just published; the viewer takes it when it next polls.
//! A handle raised before the previous one was taken replaces it, so
//! the viewer always reloads the newest frame and may skip some.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Names a published frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameHandle {
    round: u64,
    path: PathBuf,
    width: usize,
    height: usize,
}

impl FrameHandle {
    /// A handle on the frame of `round`, published at `path`.
    pub fn new(round: u64, path: PathBuf, width: usize, height: usize) -> Self {
        FrameHandle {
            round,
            path,
            width,
            height,
        }
    }

    /// The round the frame was rendered in.
    pub fn round(&self) -> u64 {
        self.round
    }

    /// Where the frame was published.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Frame width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Frame height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }
}

/// The signal itself.  Cloning it gives another handle on the same
/// slot, so the viewer can hold one outside the engine.
#[derive(Clone, Debug, Default)]
pub struct FreshnessSignal {
    slot: Arc<Mutex<Option<FrameHandle>>>,
    raised: Arc<AtomicU64>,
}

impl FreshnessSignal {
    /// A lowered signal.
    pub fn new() -> Self {
        FreshnessSignal::default()
    }

    /// Persister side: `frame` is published and ready to be shown.
    pub fn raise(&self, frame: FrameHandle) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(frame);
        self.raised.fetch_add(1, Ordering::SeqCst);
    }

    /// Viewer side: take the newest frame, lowering the signal.
    /// Returns `None` if nothing was published since the last call.
    pub fn try_consume(&self) -> Option<FrameHandle> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Whether a frame is waiting to be consumed.
    pub fn is_raised(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// How many times the signal has been raised in total.
    pub fn times_raised(&self) -> u64 {
        self.raised.load(Ordering::SeqCst)
    }
}
