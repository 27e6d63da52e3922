//! Coordinate space conversions.
//!
//! Pointer positions arrive in surface (screen) coordinates. They are mapped
//! into normalized [0,1] image space for the ROI and into pixel space for
//! prompts. Rotated ROI frames use the standard 2D rotation matrix with the
//! angle given in degrees.

use crate::model::{ImageSize, Point};

/// The on-screen rectangle the image is drawn into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl SurfaceRect {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// A rect with zero, negative, or non-finite extent cannot map pointers.
    pub fn is_degenerate(&self) -> bool {
        !(self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0)
    }
}

fn clamp01(v: f32) -> f32 {
    v.clamp(0.0, 1.0)
}

/// Map a pointer position to normalized image coordinates, clamped to [0,1].
///
/// Returns `None` for a degenerate surface rect or a non-finite pointer.
pub fn pointer_to_normalized(pointer: Point, rect: &SurfaceRect) -> Option<Point> {
    if rect.is_degenerate() || !pointer.is_finite() || !rect.left.is_finite() || !rect.top.is_finite()
    {
        return None;
    }
    Some(Point::new(
        clamp01((pointer.x - rect.left) / rect.width),
        clamp01((pointer.y - rect.top) / rect.height),
    ))
}

/// Map a pointer position to integral pixel coordinates.
///
/// `image` is the raster's true size when known; otherwise `fallback` (the
/// configured output resolution) is used.
pub fn pointer_to_pixel(
    pointer: Point,
    rect: &SurfaceRect,
    image: Option<ImageSize>,
    fallback: ImageSize,
) -> Option<Point> {
    let normalized = pointer_to_normalized(pointer, rect)?;
    let size = image.filter(ImageSize::is_valid).unwrap_or(fallback);
    let scaled = size.to_pixels(normalized);
    Some(Point::new(scaled.x.round(), scaled.y.round()))
}

/// Convert degrees to radians.
#[inline]
pub fn to_radians(degrees: f32) -> f32 {
    degrees * std::f32::consts::PI / 180.0
}

/// Rotate a vector about the origin by `degrees`.
pub fn rotate(v: Point, degrees: f32) -> Point {
    let (s, c) = to_radians(degrees).sin_cos();
    Point::new(c * v.x - s * v.y, s * v.x + c * v.y)
}

/// Rotate a vector about the origin by `-degrees`.
pub fn inverse_rotate(v: Point, degrees: f32) -> Point {
    let (s, c) = to_radians(degrees).sin_cos();
    Point::new(c * v.x + s * v.y, -s * v.x + c * v.y)
}

/// Region-local point to global: rotate, then translate by the center.
pub fn local_to_global(local: Point, center: Point, rotation_degrees: f32) -> Point {
    rotate(local, rotation_degrees).offset(center)
}

/// Global point to region-local: translate by the center, then inverse-rotate.
pub fn global_to_local(global: Point, center: Point, rotation_degrees: f32) -> Point {
    inverse_rotate(global.delta_from(&center), rotation_degrees)
}
