//! The shared pixel grid.  The frame is stored as one band per worker,
//! each band covering that worker's rows.  A band is only ever touched
//! by its own worker while a round computes, and only by the persister
//! after the completion barrier has released, so the mutex around each
//! band is never contended; it exists to hand the rows from one thread
//! to the next.

use std::ops::Range;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::planes::PlaneMapper;

/// A worker's rows of the frame, tagged with the round that last
/// wrote them.
#[derive(Debug)]
pub struct Band {
    rows: Range<usize>,
    round: u64,
    pixels: Vec<u32>,
}

impl Band {
    /// The frame rows this band covers.
    pub fn rows(&self) -> Range<usize> {
        self.rows.clone()
    }

    /// The round that last wrote the band, 0 if none has yet.
    pub fn round(&self) -> u64 {
        self.round
    }

    /// The band's pixels, row-major, packed as `0x00RRGGBB`.
    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    /// Recompute every pixel of the band for `round`.
    pub fn render(&mut self, plane: &PlaneMapper, width: usize, limit: u32, round: u64) {
        crate::escape::render_rows(plane, width, self.rows.clone(), limit, &mut self.pixels);
        self.round = round;
    }
}

/// A `width` x `height` frame split into row bands.
#[derive(Debug)]
pub struct FrameBuffer {
    width: usize,
    height: usize,
    bands: Vec<Mutex<Band>>,
}

impl FrameBuffer {
    /// Allocates a black frame with one band per row range.  The
    /// ranges must be a partition of `[0, height)` in row order.
    pub fn new(width: usize, height: usize, partition: &[Range<usize>]) -> Self {
        debug_assert_eq!(partition.iter().map(|r| r.len()).sum::<usize>(), height);
        let bands = partition
            .iter()
            .map(|rows| {
                Mutex::new(Band {
                    rows: rows.clone(),
                    round: 0,
                    pixels: vec![0 as u32; rows.len() * width],
                })
            })
            .collect();
        FrameBuffer {
            width,
            height,
            bands,
        }
    }

    /// Frame width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Frame height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of bands, which is the number of workers.
    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    /// Take band `index`.  A worker that panicked mid-render leaves its
    /// band poisoned; the pixels are still well-formed, so the guard is
    /// recovered rather than propagating the panic.
    pub fn band(&self, index: usize) -> MutexGuard<'_, Band> {
        self.bands[index]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Visit every band in row order.
    pub fn for_each_band<F>(&self, mut visit: F)
    where
        F: FnMut(&Band),
    {
        for index in 0..self.bands.len() {
            visit(&*self.band(index));
        }
    }

    /// Copy the whole frame out, row-major.
    pub fn to_pixels(&self) -> Vec<u32> {
        let mut pixels = Vec::with_capacity(self.width * self.height);
        self.for_each_band(|band| pixels.extend_from_slice(band.pixels()));
        pixels
    }
}
