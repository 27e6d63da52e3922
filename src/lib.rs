//! roimask - region of interest and annotation prompt engine
//!
//! Lets an operator draw, move, resize, and rotate a region over a 2D
//! projection image, sketch point/box/polygon prompts for an external
//! segmentation service, and manage the labeled masks that come back
//! (grouping, numbering, duplicate suppression, coloring, visibility).
//!
//! Rendering, the segmentation model, and project storage belong to the
//! host; this crate exposes the geometry, state machines, and collection
//! logic plus the contracts for those collaborators.

pub mod color_utils;
pub mod config;
pub mod constants;
pub mod coords;
pub mod drafts;
pub mod error;
pub mod interaction;
pub mod keybindings;
pub mod masks;
pub mod model;
pub mod persistence;
pub mod projection;
pub mod raster;
pub mod region_filter;
pub mod segmentation;
pub mod session;

pub use color_utils::{Color, MASK_PALETTE};
pub use config::{EngineConfig, LogLevel, init_logging};
pub use drafts::{DraftEvent, DraftManager};
pub use error::{EngineError, Result};
pub use interaction::{PromptTool, RoiEditor, RoiHit, RoiRelease};
pub use masks::{MaskCollection, MaskGroup, MergeOptions, merge_masks};
pub use model::{
    BoundingBox, BoxPrompt, Corner, ImageSize, Mask, MaskId, MaskSource, Point, Point3,
    PointPrompt, Polarity, PolygonPrompt, RawMask, RegionOfInterest, base_label_of,
};
pub use persistence::{PersistenceSink, RoiExport};
pub use projection::{ImageRef, ProjectionProvider};
pub use region_filter::{ExclusionBox, ExclusionVolume, mask_inside_roi};
pub use segmentation::{SegmentationMode, SegmentationRequest, SegmentationResponse, SegmentationService};
pub use session::{EditTarget, ImageSession, Workspace};
