//! Writing frames to storage.  A frame is encoded as an uncompressed
//! 24-bit TGA image and published in two steps: the bytes go to a
//! staging file next to the destination, which is then renamed over
//! it.  A reader opening the destination sees either the previous
//! frame or the new one, never a half-written file.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{Error, Result};
use crate::frame::FrameBuffer;
use crate::freshness::FrameHandle;

/// Size of the TGA header.
pub const HEADER_LEN: usize = 18;

/// Image type 2: uncompressed true-color.
const UNCOMPRESSED_TRUE_COLOR: u8 = 2;

/// Descriptor bit 5: the first stored row is the top of the image.
const TOP_LEFT_ORIGIN: u8 = 0x20;

/// The TGA header for a `width` x `height` 24-bit image with no image
/// ID and no color map.  Rows are stored top row first, matching the
/// frame buffer.
pub fn tga_header(width: usize, height: usize) -> [u8; HEADER_LEN] {
    [
        0, // no image ID
        0, // no color map
        UNCOMPRESSED_TRUE_COLOR,
        0, 0, 0, 0, 0, // empty color map specification
        0, 0, // x origin
        0, 0, // y origin
        (width & 0xff) as u8,
        ((width >> 8) & 0xff) as u8,
        (height & 0xff) as u8,
        ((height >> 8) & 0xff) as u8,
        24, // bits per pixel
        TOP_LEFT_ORIGIN,
    ]
}

/// The size of an encoded frame.  Fixed for given dimensions.
pub fn encoded_len(width: usize, height: usize) -> usize {
    HEADER_LEN + 3 * width * height
}

#[inline]
fn push_pixel(out: &mut Vec<u8>, pixel: u32) {
    out.push((pixel & 0xff) as u8); // blue
    out.push(((pixel >> 8) & 0xff) as u8); // green
    out.push(((pixel >> 16) & 0xff) as u8); // red
}

/// Encode the frame as it stands after `round`.  Every band must have
/// been written by that round; finding one that was not means the
/// frame was read while a worker still owned it.
pub fn encode_frame(frame: &FrameBuffer, round: u64) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(encoded_len(frame.width(), frame.height()));
    out.extend_from_slice(&tga_header(frame.width(), frame.height()));
    let mut torn = None;
    frame.for_each_band(|band| {
        if band.round() != round {
            torn.get_or_insert((band.rows().start, band.round()));
            return;
        }
        for &pixel in band.pixels() {
            push_pixel(&mut out, pixel);
        }
    });
    if let Some((row, band_round)) = torn {
        return Err(Error::TornFrame(row, band_round, round));
    }
    Ok(out)
}

/// Write `bytes` to a staging file in the directory of `path`, flush it
/// to disk and rename it over `path`.
pub fn publish(bytes: &[u8], path: &Path) -> io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut staging = NamedTempFile::new_in(dir)?;
    staging.write_all(bytes)?;
    staging.as_file().sync_all()?;
    staging.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// The sole writer of frames.  Reads the frame buffer once per round,
/// after the completion barrier, and publishes it to `output`.
#[derive(Debug)]
pub struct FramePersister<'a> {
    frame: &'a FrameBuffer,
    output: PathBuf,
}

impl<'a> FramePersister<'a> {
    /// A persister writing `frame` to `output`.
    pub fn new(frame: &'a FrameBuffer, output: PathBuf) -> Self {
        FramePersister { frame, output }
    }

    /// Where frames are published.
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Encode and publish the frame of `round`, returning the handle
    /// to raise on the freshness signal.
    pub fn persist(&self, round: u64) -> Result<FrameHandle> {
        let bytes = encode_frame(self.frame, round)?;
        publish(&bytes, &self.output).map_err(|e| Error::PersistFailure(round, e))?;
        debug!(round, bytes = bytes.len(), path = %self.output.display(), "frame published");
        Ok(FrameHandle::new(
            round,
            self.output.clone(),
            self.frame.width(),
            self.frame.height(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::escape::{render_single, shade};
    use crate::partition::partition_rows;
    use crate::planes::{PlaneMapper, ViewBounds};
    use tempfile::tempdir;

    fn rendered_frame(width: usize, height: usize, workers: usize, round: u64) -> FrameBuffer {
        let frame = FrameBuffer::new(width, height, &partition_rows(height, workers).unwrap());
        let plane = PlaneMapper::new(width, height, &ViewBounds::DEFAULT);
        for index in 0..frame.band_count() {
            frame.band(index).render(&plane, width, 300, round);
        }
        frame
    }

    #[test]
    fn header_encodes_dimensions_little_endian() {
        let header = tga_header(640, 480);
        assert_eq!(
            header,
            [0, 0, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x80, 0x02, 0xe0, 0x01, 24, 0x20]
        );
    }

    #[test]
    fn pixels_are_stored_blue_green_red() {
        let mut out = vec![];
        push_pixel(&mut out, 0x0011_2233);
        assert_eq!(out, vec![0x33, 0x22, 0x11]);
    }

    #[test]
    fn encoded_frame_has_fixed_size_and_row_major_pixels() {
        let frame = rendered_frame(20, 15, 4, 1);
        let bytes = encode_frame(&frame, 1).unwrap();
        assert_eq!(bytes.len(), encoded_len(20, 15));
        let reference = render_single(&ViewBounds::DEFAULT, 20, 15, 300);
        let mut expected = tga_header(20, 15).to_vec();
        for &pixel in &reference {
            push_pixel(&mut expected, pixel);
        }
        assert_eq!(bytes, expected);
        assert_eq!(shade(300) & 0xff, 300 % 256);
    }

    #[test]
    fn stale_band_is_refused() {
        let frame = rendered_frame(8, 6, 3, 1);
        match encode_frame(&frame, 2) {
            Err(Error::TornFrame(0, 1, 2)) => {}
            other => panic!("expected TornFrame, got {:?}", other),
        }
    }

    #[test]
    fn publish_replaces_the_destination_and_leaves_no_staging_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("output.tga");
        publish(b"first", &path).unwrap();
        publish(b"second", &path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"second");
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn persist_into_missing_directory_fails() {
        let dir = tempdir().unwrap();
        let frame = rendered_frame(8, 6, 2, 3);
        let persister = FramePersister::new(&frame, dir.path().join("missing").join("out.tga"));
        match persister.persist(3) {
            Err(Error::PersistFailure(3, _)) => {}
            other => panic!("expected PersistFailure, got {:?}", other),
        }
    }

    #[test]
    fn persist_returns_a_handle_on_the_published_frame() {
        let dir = tempdir().unwrap();
        let frame = rendered_frame(8, 6, 2, 4);
        let path = dir.path().join("out.tga");
        let handle = FramePersister::new(&frame, path.clone()).persist(4).unwrap();
        assert_eq!(handle, FrameHandle::new(4, path.clone(), 8, 6));
        assert_eq!(std::fs::read(&path).unwrap().len(), encoded_len(8, 6));
    }
}
