//! The escape-time kernel.  A point c on the complex plane is iterated
//! as z = z * z + c, starting at z = 0, until |z| reaches 2 or the
//! iteration cap is hit.  The number of iterations taken is turned
//! into a gray pixel by folding it into a fixed band of 256 shades.

use itertools::iproduct;
use num::Complex;
use std::ops::Range;

use crate::planes::{Pixel, PlaneMapper, ViewBounds};

/// Width of the color band the iteration count is folded into.
pub const BAND_WIDTH: u32 = 256;

/// Count the iterations it takes `c` to leave the circle of radius 2,
/// giving up at `limit`.  Points inside the set return `limit`.
#[inline]
pub fn escape_time(c: Complex<f64>, limit: u32) -> u32 {
    let mut z: Complex<f64> = Complex { re: 0.0, im: 0.0 };
    let mut iterations = 0;
    while iterations < limit && z.norm_sqr() < 4.0 {
        z = z * z + c;
        iterations += 1;
    }
    iterations
}

/// Packs an iteration count into a `0x00RRGGBB` pixel with the same
/// value on every channel.
#[inline]
pub fn shade(iterations: u32) -> u32 {
    let band = iterations % BAND_WIDTH;
    (band << 16) | (band << 8) | band
}

/// Render `rows` of a `width`-wide frame into `pixels`, which holds
/// exactly those rows, row-major.
pub fn render_rows(
    plane: &PlaneMapper,
    width: usize,
    rows: Range<usize>,
    limit: u32,
    pixels: &mut [u32],
) {
    assert_eq!(pixels.len(), width * rows.len());
    let first = rows.start;
    for (row, column) in iproduct!(rows, 0..width) {
        let c = plane.pixel_to_point(&Pixel(column, row));
        pixels[(row - first) * width + column] = shade(escape_time(c, limit));
    }
}

/// The single-threaded renderer.  Produces the whole frame for a set
/// of bounds in one pass; the worker pool must agree with it pixel
/// for pixel.
pub fn render_single(bounds: &ViewBounds, width: usize, height: usize, limit: u32) -> Vec<u32> {
    let plane = PlaneMapper::new(width, height, bounds);
    let mut pixels = vec![0 as u32; width * height];
    render_rows(&plane, width, 0..height, limit, &mut pixels);
    pixels
}
