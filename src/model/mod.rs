//! Data models for the ROI and mask engine.

mod geometry;
mod mask;
mod prompt;
mod roi;

pub use geometry::{BoundingBox, ImageSize, Point, Point3};
pub use mask::{
    Mask, MaskId, MaskSource, RawMask, UNLABELED, base_label_of, group_key_of, numbered_label,
    ordinal_of,
};
pub use prompt::{BoxPrompt, PointPrompt, Polarity, PolygonPrompt, PromptId};
pub use roi::{Corner, RegionOfInterest};
