//! The viewer side.  It is not synchronized with the engine at all: it
//! polls the freshness signal at its own pace and reloads the newest
//! published frame whenever the signal is up.  Drawing the frame is
//! left to whoever drives the viewer.

use std::time::Duration;

use crossbeam::channel::{Receiver, RecvTimeoutError};
use image::{ImageFormat, RgbImage};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::freshness::{FrameHandle, FreshnessSignal};

/// A published frame, decoded.
#[derive(Debug)]
pub struct LoadedFrame {
    /// The handle the frame was loaded through.
    pub handle: FrameHandle,
    /// The decoded pixels.
    pub image: RgbImage,
}

/// Polls a freshness signal and keeps the most recently loaded frame.
#[derive(Debug)]
pub struct FrameViewer {
    signal: FreshnessSignal,
    current: Option<LoadedFrame>,
}

impl FrameViewer {
    /// A viewer watching `signal`.
    pub fn new(signal: FreshnessSignal) -> Self {
        FrameViewer {
            signal,
            current: None,
        }
    }

    /// Take the handle of the newest published frame, if one was
    /// published since the last call.
    pub fn try_consume_frame(&self) -> Option<FrameHandle> {
        self.signal.try_consume()
    }

    /// The frame shown last, which may be stale.
    pub fn current(&self) -> Option<&LoadedFrame> {
        self.current.as_ref()
    }

    /// Poll once.  If a new frame was published, load it and return it;
    /// otherwise return `None` and keep showing the current one.
    pub fn reload(&mut self) -> Result<Option<&LoadedFrame>> {
        let handle = match self.try_consume_frame() {
            Some(handle) => handle,
            None => return Ok(None),
        };
        let image = load(&handle)?;
        debug!(round = handle.round(), "frame reloaded");
        self.current = Some(LoadedFrame { handle, image });
        Ok(self.current.as_ref())
    }

    /// Poll every `interval` until a message arrives on `stop` (or its
    /// sender goes away), handing each newly loaded frame to
    /// `on_frame`.  A frame that fails to load is logged and skipped.
    /// The signal is polled one last time on the way out.
    pub fn watch<F>(&mut self, interval: Duration, stop: &Receiver<()>, mut on_frame: F)
    where
        F: FnMut(&LoadedFrame),
    {
        loop {
            self.poll_into(&mut on_frame);
            match stop.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => continue,
                _ => break,
            }
        }
        self.poll_into(&mut on_frame);
    }

    fn poll_into<F>(&mut self, on_frame: &mut F)
    where
        F: FnMut(&LoadedFrame),
    {
        match self.reload() {
            Ok(Some(frame)) => on_frame(frame),
            Ok(None) => {}
            Err(e) => warn!("skipping frame: {}", e),
        }
    }
}

fn load(handle: &FrameHandle) -> Result<RgbImage> {
    let bytes = std::fs::read(handle.path()).map_err(|e| Error::Load(e.into()))?;
    let image =
        image::load_from_memory_with_format(&bytes, ImageFormat::TGA).map_err(Error::Load)?;
    Ok(image.to_rgb())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::{publish, tga_header};
    use image::Pixel;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn gray_frame(path: &PathBuf, width: usize, height: usize, level: u8) {
        let mut bytes = tga_header(width, height).to_vec();
        bytes.extend(std::iter::repeat(level).take(3 * width * height));
        publish(&bytes, path).unwrap();
    }

    #[test]
    fn nothing_to_reload_until_the_signal_is_raised() {
        let mut viewer = FrameViewer::new(FreshnessSignal::new());
        assert!(viewer.reload().unwrap().is_none());
        assert!(viewer.current().is_none());
    }

    #[test]
    fn reload_decodes_the_published_frame() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("output.tga");
        gray_frame(&path, 6, 4, 232);
        let signal = FreshnessSignal::new();
        let mut viewer = FrameViewer::new(signal.clone());
        signal.raise(FrameHandle::new(1, path.clone(), 6, 4));

        let frame = viewer.reload().unwrap().unwrap();
        assert_eq!(frame.handle.round(), 1);
        assert_eq!(frame.image.dimensions(), (6, 4));
        assert!(frame
            .image
            .pixels()
            .all(|p| p.channels() == &[232u8, 232, 232][..]));
        assert!(!signal.is_raised());
    }

    #[test]
    fn first_stored_row_is_the_top_of_the_image() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("output.tga");
        let mut bytes = tga_header(1, 2).to_vec();
        bytes.extend_from_slice(&[10, 10, 10, 200, 200, 200]);
        publish(&bytes, &path).unwrap();
        let signal = FreshnessSignal::new();
        let mut viewer = FrameViewer::new(signal.clone());
        signal.raise(FrameHandle::new(1, path, 1, 2));

        let frame = viewer.reload().unwrap().unwrap();
        assert_eq!(frame.image.get_pixel(0, 0).channels(), &[10u8, 10, 10][..]);
        assert_eq!(frame.image.get_pixel(0, 1).channels(), &[200u8, 200, 200][..]);
    }

    #[test]
    fn stale_frame_stays_current_between_publishes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("output.tga");
        gray_frame(&path, 2, 2, 9);
        let signal = FreshnessSignal::new();
        let mut viewer = FrameViewer::new(signal.clone());
        signal.raise(FrameHandle::new(3, path, 2, 2));
        viewer.reload().unwrap();
        assert!(viewer.reload().unwrap().is_none());
        assert_eq!(viewer.current().map(|f| f.handle.round()), Some(3));
    }

    #[test]
    fn missing_file_is_a_load_error() {
        let dir = tempdir().unwrap();
        let signal = FreshnessSignal::new();
        let mut viewer = FrameViewer::new(signal.clone());
        signal.raise(FrameHandle::new(1, dir.path().join("gone.tga"), 2, 2));
        match viewer.reload() {
            Err(Error::Load(_)) => {}
            other => panic!("expected Load error, got {:?}", other.map(|f| f.is_some())),
        }
    }
}
