//! Contains the ViewBounds struct, which describes the rectangle of
//! the complex plane a round is rendering, and the PlaneMapper, which
//! relates that rectangle to an integral pixel grid with an origin at
//! 0,0 in the top-left corner.
use crate::error::{Error, Result};
use num::Complex;
use std::str::FromStr;

/// Describes the x, y of a pixel in the frame.  x is the column, y
/// is the row.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Pixel(pub usize, pub usize);

/// The four edges of the rendered rectangle of the complex plane.
/// `left` and `right` are real parts, `top` and `bottom` imaginary
/// parts.  Row 0 of the frame lies on `top`, column 0 on `left`.
/// Nothing requires left < right or bottom < top; an inverted
/// rectangle simply mirrors the image.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ViewBounds {
    /// Real part at column 0.
    pub left: f64,
    /// Real part one column past the last.
    pub right: f64,
    /// Imaginary part at row 0.
    pub top: f64,
    /// Imaginary part one row past the last.
    pub bottom: f64,
}

impl ViewBounds {
    /// The whole set.
    pub const DEFAULT: ViewBounds = ViewBounds {
        left: -2.0,
        right: 1.0,
        top: 1.125,
        bottom: -1.125,
    };

    /// A small region on the boundary of the main cardioid.
    pub const ZOOMED: ViewBounds = ViewBounds {
        left: -0.751085,
        right: -0.734975,
        top: 0.118378,
        bottom: 0.134488,
    };

    /// Builds bounds without checking them; see `validate`.
    pub fn new(left: f64, right: f64, top: f64, bottom: f64) -> Self {
        ViewBounds {
            left,
            right,
            top,
            bottom,
        }
    }

    /// Rejects rectangles the plane mapper cannot work with: any edge
    /// that is not a finite number, or a rectangle with no width or no
    /// height.
    pub fn validate(&self) -> Result<()> {
        let edges = [
            ("left", self.left),
            ("right", self.right),
            ("top", self.top),
            ("bottom", self.bottom),
        ];
        if let Some((name, value)) = edges.iter().find(|(_, v)| !v.is_finite()) {
            return Err(Error::InvalidBounds(format!(
                "{} edge is not a finite number ({})",
                name, value
            )));
        }
        if self.width() == 0.0 {
            return Err(Error::InvalidBounds(format!(
                "left and right are both {}",
                self.left
            )));
        }
        if self.height() == 0.0 {
            return Err(Error::InvalidBounds(format!(
                "top and bottom are both {}",
                self.top
            )));
        }
        Ok(())
    }

    /// Signed extent along the real axis.
    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    /// Signed extent along the imaginary axis, measured from top to
    /// bottom.
    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }
}

impl Default for ViewBounds {
    fn default() -> Self {
        ViewBounds::DEFAULT
    }
}

/// Parses `left,right,top,bottom`.  Commas and whitespace are both
/// accepted as separators so the same parser serves the command line
/// and the interactive prompt.
impl FromStr for ViewBounds {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|p| !p.is_empty())
            .collect();
        if parts.len() != 4 {
            return Err(Error::InvalidBounds(format!(
                "expected four numbers (left, right, top, bottom), found {}",
                parts.len()
            )));
        }
        let mut edges = [0.0_f64; 4];
        for (edge, part) in edges.iter_mut().zip(parts.iter()) {
            *edge = f64::from_str(part)
                .map_err(|_| Error::InvalidBounds(format!("'{}' is not a number", part)))?;
        }
        Ok(ViewBounds::new(edges[0], edges[1], edges[2], edges[3]))
    }
}

/// Maps pixels of a `width` x `height` grid onto the rectangle given
/// by a set of bounds by linear interpolation.  Built once per round
/// from the bounds the round was dispatched with.
#[derive(Debug)]
pub struct PlaneMapper {
    origin: Complex<f64>,
    // The distance on the complex plane between two neighbouring
    // pixels, horizontally and vertically.
    grid_factors: (f64, f64),
}

impl PlaneMapper {
    /// Constructor.  The bounds are assumed to have been validated.
    pub fn new(width: usize, height: usize, bounds: &ViewBounds) -> PlaneMapper {
        PlaneMapper {
            origin: Complex::new(bounds.left, bounds.top),
            grid_factors: (
                bounds.width() / (width as f64),
                bounds.height() / (height as f64),
            ),
        }
    }

    /// Given a pixel on the integral plane, return the complex number
    /// at the equivalent location of the mapped rectangle.
    pub fn pixel_to_point(&self, pixel: &Pixel) -> Complex<f64> {
        Complex::new(
            self.origin.re + (pixel.0 as f64) * self.grid_factors.0,
            self.origin.im + (pixel.1 as f64) * self.grid_factors.1,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bounds_are_valid() {
        assert!(ViewBounds::DEFAULT.validate().is_ok());
        assert!(ViewBounds::ZOOMED.validate().is_ok());
    }

    #[test]
    fn non_finite_edges_are_rejected() {
        for bounds in &[
            ViewBounds::new(std::f64::NAN, 1.0, 1.0, -1.0),
            ViewBounds::new(-1.0, std::f64::INFINITY, 1.0, -1.0),
            ViewBounds::new(-1.0, 1.0, std::f64::NEG_INFINITY, -1.0),
            ViewBounds::new(-1.0, 1.0, 1.0, std::f64::NAN),
        ] {
            match bounds.validate() {
                Err(Error::InvalidBounds(_)) => {}
                other => panic!("expected InvalidBounds for {:?}, got {:?}", bounds, other),
            }
        }
    }

    #[test]
    fn empty_rectangles_are_rejected() {
        assert!(ViewBounds::new(0.5, 0.5, 1.0, -1.0).validate().is_err());
        assert!(ViewBounds::new(-1.0, 1.0, 0.25, 0.25).validate().is_err());
    }

    #[test]
    fn inverted_rectangles_are_accepted() {
        assert!(ViewBounds::new(1.0, -2.0, -1.125, 1.125).validate().is_ok());
    }

    #[test]
    fn bounds_parse_from_commas_and_spaces() {
        let expected = ViewBounds::new(-2.0, 1.0, 1.125, -1.125);
        assert_eq!("-2.0,1.0,1.125,-1.125".parse::<ViewBounds>().unwrap(), expected);
        assert_eq!("-2.0 1.0  1.125 -1.125".parse::<ViewBounds>().unwrap(), expected);
        assert_eq!("-2.0, 1.0, 1.125, -1.125".parse::<ViewBounds>().unwrap(), expected);
    }

    #[test]
    fn bounds_parse_rejects_garbage() {
        assert!("-2.0,1.0,1.125".parse::<ViewBounds>().is_err());
        assert!("-2.0,1.0,1.125,-1.125,4".parse::<ViewBounds>().is_err());
        assert!("left,1.0,1.125,-1.125".parse::<ViewBounds>().is_err());
    }

    #[test]
    fn top_left_pixel_maps_to_left_top_corner() {
        let pm = PlaneMapper::new(640, 480, &ViewBounds::DEFAULT);
        assert_eq!(pm.pixel_to_point(&Pixel(0, 0)), Complex::new(-2.0, 1.125));
    }

    #[test]
    fn pixels_interpolate_linearly() {
        let pm = PlaneMapper::new(4, 4, &ViewBounds::new(-2.0, 2.0, 2.0, -2.0));
        assert_eq!(pm.pixel_to_point(&Pixel(2, 2)), Complex::new(0.0, 0.0));
        assert_eq!(pm.pixel_to_point(&Pixel(1, 3)), Complex::new(-1.0, -1.0));
        assert_eq!(pm.pixel_to_point(&Pixel(4, 4)), Complex::new(2.0, -2.0));
    }

    #[test]
    fn pixel_to_point_on_positive_planes() {
        let pm = PlaneMapper::new(5, 5, &ViewBounds::new(0.0, 5.0, 0.0, 5.0));
        assert_eq!(pm.pixel_to_point(&Pixel(0, 0)), Complex::new(0.0, 0.0));
        assert_eq!(pm.pixel_to_point(&Pixel(2, 2)), Complex::new(2.0, 2.0));
        assert_eq!(pm.pixel_to_point(&Pixel(4, 4)), Complex::new(4.0, 4.0));
    }
}
