//! Rotated rectangular region of interest.
//!
//! All extents are normalized to the host image. The region is a pure value:
//! every query is a function of the fields, and edits happen through
//! [`crate::interaction::RoiEditor`].

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_ROI_EXTENT;
use crate::coords::{global_to_local, local_to_global};
use crate::model::Point;

/// Corner handles in their fixed order. Handle indices and resize math depend on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomRight,
    BottomLeft,
}

impl Corner {
    /// All corners, in index order.
    pub const ALL: [Corner; 4] = [
        Corner::TopLeft,
        Corner::TopRight,
        Corner::BottomRight,
        Corner::BottomLeft,
    ];

    pub fn index(self) -> usize {
        match self {
            Corner::TopLeft => 0,
            Corner::TopRight => 1,
            Corner::BottomRight => 2,
            Corner::BottomLeft => 3,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Sign of the half-extent offsets for this corner in the local frame.
    fn local_sign(self) -> (f32, f32) {
        match self {
            Corner::TopLeft => (-1.0, -1.0),
            Corner::TopRight => (1.0, -1.0),
            Corner::BottomRight => (1.0, 1.0),
            Corner::BottomLeft => (-1.0, 1.0),
        }
    }
}

/// A rotated rectangle in normalized image space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionOfInterest {
    pub center_x: f32,
    pub center_y: f32,
    pub width: f32,
    pub height: f32,
    /// Clockwise rotation on a y-down image, in (-360, 360].
    pub rotation_degrees: f32,
}

impl Default for RegionOfInterest {
    /// A centered, unrotated box.
    fn default() -> Self {
        Self::new(0.5, 0.5, DEFAULT_ROI_EXTENT, DEFAULT_ROI_EXTENT, 0.0)
    }
}

impl RegionOfInterest {
    pub fn new(center_x: f32, center_y: f32, width: f32, height: f32, rotation_degrees: f32) -> Self {
        Self {
            center_x,
            center_y,
            width,
            height,
            rotation_degrees,
        }
    }

    /// Axis-aligned region spanning two points, rotation reset to zero.
    pub fn from_bounds(a: Point, b: Point) -> Self {
        let min_x = a.x.min(b.x);
        let min_y = a.y.min(b.y);
        let width = (a.x - b.x).abs();
        let height = (a.y - b.y).abs();
        Self::new(min_x + width / 2.0, min_y + height / 2.0, width, height, 0.0)
    }

    pub fn center(&self) -> Point {
        Point::new(self.center_x, self.center_y)
    }

    /// Whether the region has positive extent.
    pub fn is_valid(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    /// Global position of one corner.
    pub fn corner(&self, corner: Corner) -> Point {
        let (sx, sy) = corner.local_sign();
        let local = Point::new(sx * self.width / 2.0, sy * self.height / 2.0);
        local_to_global(local, self.center(), self.rotation_degrees)
    }

    /// The four corners in top-left, top-right, bottom-right, bottom-left order.
    pub fn corners(&self) -> [Point; 4] {
        Corner::ALL.map(|c| self.corner(c))
    }

    /// Point in the region's local, unrotated frame.
    pub fn to_local(&self, point: Point) -> Point {
        global_to_local(point, self.center(), self.rotation_degrees)
    }

    /// Containment test, edges inclusive.
    pub fn contains(&self, point: Point) -> bool {
        let local = self.to_local(point);
        local.x.abs() <= self.width / 2.0 && local.y.abs() <= self.height / 2.0
    }

    /// Rotation handle: `offset` beyond the midpoint of the top edge, rotated with the region.
    pub fn rotation_handle_position(&self, offset: f32) -> Point {
        let local = Point::new(0.0, -self.height / 2.0 - offset);
        local_to_global(local, self.center(), self.rotation_degrees)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Ray casting point-in-polygon, used as an independent reference.
    fn polygon_contains(vertices: &[Point], point: Point) -> bool {
        let mut inside = false;
        let mut j = vertices.len() - 1;
        for i in 0..vertices.len() {
            let vi = vertices[i];
            let vj = vertices[j];
            if ((vi.y > point.y) != (vj.y > point.y))
                && (point.x < (vj.x - vi.x) * (point.y - vi.y) / (vj.y - vi.y) + vi.x)
            {
                inside = !inside;
            }
            j = i;
        }
        inside
    }

    #[test]
    fn test_corner_order_unrotated() {
        let roi = RegionOfInterest::new(0.5, 0.4, 0.2, 0.3, 0.0);
        let (cx, cy, w, h) = (0.5f32, 0.4f32, 0.2f32, 0.3f32);
        assert_eq!(
            roi.corners(),
            [
                Point::new(cx - w / 2.0, cy - h / 2.0),
                Point::new(cx + w / 2.0, cy - h / 2.0),
                Point::new(cx + w / 2.0, cy + h / 2.0),
                Point::new(cx - w / 2.0, cy + h / 2.0),
            ]
        );
    }

    #[test]
    fn test_contains_agrees_with_polygon_test() {
        for rotation in [0.0, 45.0, 90.0, 135.0, 180.0, 270.0] {
            let roi = RegionOfInterest::new(0.5, 0.45, 0.4, 0.2, rotation);
            let corners = roi.corners();
            for i in 0..=40 {
                for j in 0..=40 {
                    let p = Point::new(i as f32 * 0.025 + 0.0013, j as f32 * 0.025 + 0.0007);
                    let local = roi.to_local(p);
                    let margin_x = (local.x.abs() - roi.width / 2.0).abs();
                    let margin_y = (local.y.abs() - roi.height / 2.0).abs();
                    if margin_x < 1e-4 || margin_y < 1e-4 {
                        continue;
                    }
                    assert_eq!(
                        roi.contains(p),
                        polygon_contains(&corners, p),
                        "rotation {} point {:?}",
                        rotation,
                        p
                    );
                }
            }
        }
    }

    #[test]
    fn test_contains_rotated() {
        // A long thin region rotated a quarter turn covers vertical space instead.
        let roi = RegionOfInterest::new(0.5, 0.5, 0.6, 0.1, 90.0);
        assert!(roi.contains(Point::new(0.5, 0.75)));
        assert!(!roi.contains(Point::new(0.75, 0.5)));
    }

    #[test]
    fn test_rotation_handle_follows_rotation() {
        let roi = RegionOfInterest::new(0.5, 0.5, 0.4, 0.2, 0.0);
        let handle = roi.rotation_handle_position(0.04);
        assert!((handle.x - 0.5).abs() < 1e-6);
        assert!((handle.y - 0.36).abs() < 1e-6);

        let rotated = RegionOfInterest {
            rotation_degrees: 90.0,
            ..roi
        };
        let handle = rotated.rotation_handle_position(0.04);
        assert!((handle.x - 0.64).abs() < 1e-6);
        assert!((handle.y - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_from_bounds() {
        let roi = RegionOfInterest::from_bounds(Point::new(0.6, 0.2), Point::new(0.2, 0.4));
        assert!((roi.center_x - 0.4).abs() < 1e-6);
        assert!((roi.center_y - 0.3).abs() < 1e-6);
        assert!((roi.width - 0.4).abs() < 1e-6);
        assert!((roi.height - 0.2).abs() < 1e-6);
        assert_eq!(roi.rotation_degrees, 0.0);
    }

    #[test]
    fn test_corner_index_roundtrip() {
        for corner in Corner::ALL {
            assert_eq!(Corner::from_index(corner.index()), Some(corner));
        }
        assert_eq!(Corner::from_index(4), None);
    }
}
