//! Default tolerances and sizes for the ROI and prompt engine.

/// Fallback raster width when the true image dimensions are not yet known.
pub const DEFAULT_OUTPUT_WIDTH: u32 = 2048;

/// Fallback raster height when the true image dimensions are not yet known.
pub const DEFAULT_OUTPUT_HEIGHT: u32 = 2048;

/// Width and height of the default centered region (normalized).
pub const DEFAULT_ROI_EXTENT: f32 = 0.5;

/// Hit radius for ROI corner and rotation handles (normalized).
pub const HANDLE_TOLERANCE: f32 = 0.03;

/// Distance of the rotation handle beyond the top edge (normalized).
pub const ROTATION_HANDLE_OFFSET: f32 = 0.04;

/// A drawn region must exceed this width and height to be committed (normalized).
pub const MIN_REGION_SIZE: f32 = 0.01;

/// Resizing never shrinks a region below this width or height (normalized).
pub const MIN_RESIZE_EXTENT: f32 = 0.05;

/// Lower bound for the region center while moving (normalized).
pub const MOVE_CLAMP_MIN: f32 = 0.1;

/// Upper bound for the region center while moving (normalized).
pub const MOVE_CLAMP_MAX: f32 = 0.9;

/// Minimum side length of a committed box prompt (pixels).
pub const MIN_BOX_SIDE_PX: f32 = 10.0;

/// A polygon click closer than this to a draft vertex removes it (pixels).
pub const POINT_REMOVAL_RADIUS_PX: f32 = 15.0;

/// Minimum number of vertices for a committed polygon prompt.
pub const MIN_POLYGON_VERTICES: usize = 3;

/// Masks overlapping an existing mask by more than this IoU are dropped.
pub const DUPLICATE_IOU_THRESHOLD: f32 = 0.5;
