//! Region filtering.
//!
//! Two predicates share the ROI containment test: whether a mask's bbox
//! center falls inside the 2D region, and whether a 3D scan point is
//! excluded by a floor plane or an axis-aligned box. The point-cloud side only
//! ever receives the boolean results.

use ndarray::{Array1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::masks::MaskCollection;
use crate::model::{ImageSize, Mask, MaskId, Point3, RegionOfInterest};

/// Whether the mask's bbox center lies inside the region.
///
/// Returns `None` when the mask has no bbox or the image size is degenerate:
/// the position is unknown and the caller must not exclude the mask.
pub fn mask_inside_roi(mask: &Mask, roi: &RegionOfInterest, image: ImageSize) -> Option<bool> {
    let bbox = mask.bbox?;
    let center = image.to_normalized(bbox.center())?;
    Some(roi.contains(center))
}

/// Ids of masks to keep for the region: those inside it, plus any whose
/// position is unknown.
pub fn masks_inside_roi(
    collection: &MaskCollection,
    roi: &RegionOfInterest,
    image: ImageSize,
) -> Vec<MaskId> {
    collection
        .masks()
        .iter()
        .filter(|m| mask_inside_roi(m, roi, image).unwrap_or(true))
        .map(|m| m.id)
        .collect()
}

/// Horizontal cut-off plane; points strictly below `z` are excluded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FloorPlane {
    pub z: f32,
    pub enabled: bool,
}

/// Axis-aligned box; points inside it (bounds inclusive) are excluded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExclusionBox {
    pub min: [f32; 3],
    pub max: [f32; 3],
    pub enabled: bool,
}

impl ExclusionBox {
    /// Unbounded box; pair with per-axis edits.
    pub fn unbounded() -> Self {
        Self {
            min: [f32::NEG_INFINITY; 3],
            max: [f32::INFINITY; 3],
            enabled: true,
        }
    }

    pub fn new(min: [f32; 3], max: [f32; 3]) -> Self {
        Self {
            min,
            max,
            enabled: true,
        }
    }

    pub fn contains(&self, p: &Point3) -> bool {
        let coords = [p.x, p.y, p.z];
        (0..3).all(|axis| coords[axis] >= self.min[axis] && coords[axis] <= self.max[axis])
    }
}

/// Floor plane and exclusion box, each independently optional and toggleable.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ExclusionVolume {
    #[serde(default)]
    pub floor: Option<FloorPlane>,
    #[serde(default)]
    pub exclusion_box: Option<ExclusionBox>,
}

impl ExclusionVolume {
    pub fn with_floor(mut self, z: f32) -> Self {
        self.floor = Some(FloorPlane { z, enabled: true });
        self
    }

    pub fn with_box(mut self, exclusion_box: ExclusionBox) -> Self {
        self.exclusion_box = Some(exclusion_box);
        self
    }

    fn active_floor(&self) -> Option<f32> {
        self.floor.filter(|f| f.enabled).map(|f| f.z)
    }

    fn active_box(&self) -> Option<&ExclusionBox> {
        self.exclusion_box.as_ref().filter(|b| b.enabled)
    }

    /// Whether the point is excluded by the floor plane or the box.
    pub fn excludes(&self, p: &Point3) -> bool {
        if self.active_floor().is_some_and(|z| p.z < z) {
            return true;
        }
        self.active_box().is_some_and(|b| b.contains(p))
    }

    /// Keep-flags for an `N x 3` array of points (`true` = keep).
    ///
    /// Rows with fewer than three columns are kept untouched.
    pub fn retain_mask(&self, points: ArrayView2<'_, f32>) -> Array1<bool> {
        if points.ncols() < 3 {
            log::warn!(
                "Expected N x 3 points, got {} columns; keeping all {} points",
                points.ncols(),
                points.nrows()
            );
            return Array1::from_elem(points.nrows(), true);
        }
        let keep: Array1<bool> = points
            .axis_iter(Axis(0))
            .map(|row| !self.excludes(&Point3::new(row[0], row[1], row[2])))
            .collect();
        log::debug!(
            "Exclusion volume kept {} of {} points",
            keep.iter().filter(|k| **k).count(),
            keep.len()
        );
        keep
    }
}

/// Standalone form of [`ExclusionVolume::excludes`].
pub fn point_3d_inside_exclusion_volume(
    point: &Point3,
    floor_z: Option<f32>,
    exclusion_box: Option<&ExclusionBox>,
) -> bool {
    let volume = ExclusionVolume {
        floor: floor_z.map(|z| FloorPlane { z, enabled: true }),
        exclusion_box: exclusion_box.copied(),
    };
    volume.excludes(point)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::masks::MergeOptions;
    use crate::model::{BoundingBox, MaskSource, RawMask};
    use ndarray::array;

    fn collection() -> MaskCollection {
        MaskCollection::new().merge(
            &[
                RawMask::new("rib", Some(BoundingBox::new(40.0, 40.0, 20.0, 20.0))),
                RawMask::new("rib", Some(BoundingBox::new(0.0, 0.0, 10.0, 10.0))),
                RawMask::new("rib", None),
            ],
            MaskSource::Auto,
            &MergeOptions::default(),
        )
    }

    #[test]
    fn test_mask_inside_roi_uses_bbox_center() {
        let c = collection();
        let image = ImageSize::new(100, 100);
        let roi = RegionOfInterest::new(0.5, 0.5, 0.3, 0.3, 0.0);
        assert_eq!(mask_inside_roi(&c.masks()[0], &roi, image), Some(true));
        assert_eq!(mask_inside_roi(&c.masks()[1], &roi, image), Some(false));
        assert_eq!(mask_inside_roi(&c.masks()[2], &roi, image), None);
    }

    #[test]
    fn test_masks_without_bbox_are_kept() {
        let c = collection();
        let roi = RegionOfInterest::new(0.5, 0.5, 0.3, 0.3, 0.0);
        let kept = masks_inside_roi(&c, &roi, ImageSize::new(100, 100));
        assert_eq!(kept, vec![c.masks()[0].id, c.masks()[2].id]);
    }

    #[test]
    fn test_rotated_roi_filter() {
        // A thin horizontal strip turned upright no longer covers a point to the side.
        let c = MaskCollection::new().merge(
            &[RawMask::new("boss", Some(BoundingBox::new(70.0, 45.0, 10.0, 10.0)))],
            MaskSource::Auto,
            &MergeOptions::default(),
        );
        let image = ImageSize::new(100, 100);
        let flat = RegionOfInterest::new(0.5, 0.5, 0.8, 0.1, 0.0);
        let upright = RegionOfInterest { rotation_degrees: 90.0, ..flat };
        assert_eq!(mask_inside_roi(&c.masks()[0], &flat, image), Some(true));
        assert_eq!(mask_inside_roi(&c.masks()[0], &upright, image), Some(false));
    }

    #[test]
    fn test_floor_plane() {
        let volume = ExclusionVolume::default().with_floor(1.0);
        assert!(volume.excludes(&Point3::new(0.0, 0.0, 0.5)));
        assert!(!volume.excludes(&Point3::new(0.0, 0.0, 1.0)));

        let disabled = ExclusionVolume {
            floor: Some(FloorPlane {
                z: 1.0,
                enabled: false,
            }),
            ..Default::default()
        };
        assert!(!disabled.excludes(&Point3::new(0.0, 0.0, 0.5)));
    }

    #[test]
    fn test_exclusion_box_inclusive() {
        let b = ExclusionBox::new([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
        assert!(point_3d_inside_exclusion_volume(
            &Point3::new(1.0, 0.5, 0.0),
            None,
            Some(&b)
        ));
        assert!(!point_3d_inside_exclusion_volume(
            &Point3::new(1.1, 0.5, 0.5),
            None,
            Some(&b)
        ));
        assert!(!point_3d_inside_exclusion_volume(
            &Point3::new(0.5, 0.5, 0.5),
            None,
            None
        ));
    }

    #[test]
    fn test_unbounded_box_with_one_axis_limited() {
        let mut b = ExclusionBox::unbounded();
        b.max[2] = 2.0;
        let volume = ExclusionVolume::default().with_box(b);
        assert!(volume.excludes(&Point3::new(100.0, -50.0, 1.0)));
        assert!(!volume.excludes(&Point3::new(0.0, 0.0, 3.0)));
    }

    #[test]
    fn test_retain_mask_matches_predicate() {
        let volume = ExclusionVolume::default()
            .with_floor(0.0)
            .with_box(ExclusionBox::new([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]));
        let points = array![
            [0.5f32, 0.5, 0.5],
            [0.5, 0.5, -1.0],
            [2.0, 2.0, 2.0],
            [5.0, 0.0, 0.0],
        ];
        let keep = volume.retain_mask(points.view());
        assert_eq!(keep.to_vec(), vec![false, false, true, true]);
    }

    #[test]
    fn test_retain_mask_wrong_shape_keeps_all() {
        let volume = ExclusionVolume::default().with_floor(10.0);
        let points = array![[0.0f32, 0.0], [1.0, 1.0]];
        assert_eq!(volume.retain_mask(points.view()).to_vec(), vec![true, true]);
    }
}
