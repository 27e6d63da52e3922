//! Geometry measured from binary mask rasters.
//!
//! Used when the segmentation service returns a mask without a bounding box.

use image::GrayImage;

use crate::error::Result;
use crate::model::{BoundingBox, RawMask};

/// Bounding box of the non-zero pixels and their count.
///
/// Returns `None` for an empty mask.
pub fn measure(mask: &GrayImage) -> Option<(BoundingBox, u64)> {
    let mut min = (u32::MAX, u32::MAX);
    let mut max = (0u32, 0u32);
    let mut area = 0u64;
    for (x, y, pixel) in mask.enumerate_pixels() {
        if pixel.0[0] == 0 {
            continue;
        }
        area += 1;
        min = (min.0.min(x), min.1.min(y));
        max = (max.0.max(x), max.1.max(y));
    }
    if area == 0 {
        return None;
    }
    let bbox = BoundingBox::new(
        min.0 as f32,
        min.1 as f32,
        (max.0 - min.0 + 1) as f32,
        (max.1 - min.1 + 1) as f32,
    );
    Some((bbox, area))
}

/// Decode an encoded mask image (e.g. PNG) into a single channel.
pub fn decode_mask(bytes: &[u8]) -> Result<GrayImage> {
    Ok(image::load_from_memory(bytes)?.to_luma8())
}

impl RawMask {
    /// Fill in a missing bbox (and area) from the mask raster.
    pub fn with_measured_geometry(mut self, mask: &GrayImage) -> Self {
        if self.bbox.is_some() {
            return self;
        }
        match measure(mask) {
            Some((bbox, area)) => {
                self.bbox = Some(bbox);
                self.area = area;
            }
            None => log::debug!("Mask '{}' raster is empty; bbox left unknown", self.label),
        }
        self
    }
}
