//! Engine configuration.
//!
//! Tolerances, the fallback output resolution, and the mask palette can be
//! exported to and imported from JSON. Every field has a default so partial
//! files load cleanly.

use serde::{Deserialize, Serialize};

use crate::color_utils::{Color, MASK_PALETTE};
use crate::constants::{
    DEFAULT_OUTPUT_HEIGHT, DEFAULT_OUTPUT_WIDTH, DUPLICATE_IOU_THRESHOLD, HANDLE_TOLERANCE,
    MIN_BOX_SIDE_PX, MIN_REGION_SIZE, MIN_RESIZE_EXTENT, MOVE_CLAMP_MAX, MOVE_CLAMP_MIN,
    POINT_REMOVAL_RADIUS_PX, ROTATION_HANDLE_OFFSET,
};
use crate::error::{EngineError, Result};
use crate::model::ImageSize;

/// Log level setting for the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Show only errors
    Error,
    /// Show errors and warnings
    Warn,
    /// Show errors, warnings, and info messages
    #[default]
    Info,
    /// Show debug-level logging
    Debug,
    /// Show all log messages including trace
    Trace,
}

impl LogLevel {
    /// Convert to log crate's LevelFilter.
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Install an `env_logger` backend at the given level.
///
/// `RUST_LOG` still overrides per-module filters. Calling this more than once
/// is harmless; later calls are ignored.
pub fn init_logging(level: LogLevel) {
    let result = env_logger::Builder::new()
        .filter_level(level.to_level_filter())
        .parse_default_env()
        .try_init();
    if result.is_err() {
        log::debug!("Logger already initialized; keeping existing backend");
    }
}

/// Current configuration file format version.
/// Increment this when making breaking changes to the config format.
pub const CONFIG_VERSION: u32 = 1;

/// Tolerances and defaults for the ROI and prompt engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Version of the configuration file format
    pub version: u32,

    /// Pixel resolution assumed until the raster's true size is known
    pub output_resolution: ImageSize,

    /// Hit radius for corner and rotation handles (normalized)
    pub handle_tolerance: f32,

    /// Rotation handle distance beyond the top edge (normalized)
    pub rotation_handle_offset: f32,

    /// Drawn regions at or below this width/height are discarded (normalized)
    pub min_region_size: f32,

    /// Floor for width/height while resizing (normalized)
    pub min_resize_extent: f32,

    /// Allowed range for the region center while moving (normalized)
    pub move_clamp: (f32, f32),

    /// Minimum box prompt side length (pixels)
    pub min_box_side_px: f32,

    /// Polygon clicks this close to a draft vertex remove it (pixels)
    pub point_removal_radius_px: f32,

    /// IoU above which an incoming mask is a duplicate
    pub duplicate_iou_threshold: f32,

    /// Group colors in assignment order
    pub palette: Vec<Color>,

    /// Log verbosity level
    pub log_level: LogLevel,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            output_resolution: ImageSize::new(DEFAULT_OUTPUT_WIDTH, DEFAULT_OUTPUT_HEIGHT),
            handle_tolerance: HANDLE_TOLERANCE,
            rotation_handle_offset: ROTATION_HANDLE_OFFSET,
            min_region_size: MIN_REGION_SIZE,
            min_resize_extent: MIN_RESIZE_EXTENT,
            move_clamp: (MOVE_CLAMP_MIN, MOVE_CLAMP_MAX),
            min_box_side_px: MIN_BOX_SIDE_PX,
            point_removal_radius_px: POINT_REMOVAL_RADIUS_PX,
            duplicate_iou_threshold: DUPLICATE_IOU_THRESHOLD,
            palette: MASK_PALETTE.to_vec(),
            log_level: LogLevel::default(),
        }
    }
}

impl EngineConfig {
    /// Check that every value is usable.
    pub fn validate(&self) -> Result<()> {
        if self.version > CONFIG_VERSION {
            return Err(EngineError::VersionMismatch {
                expected: CONFIG_VERSION,
                found: self.version,
            });
        }
        if !self.output_resolution.is_valid() {
            return Err(EngineError::InvalidResolution {
                width: self.output_resolution.width,
                height: self.output_resolution.height,
            });
        }
        let (lo, hi) = self.move_clamp;
        if !(0.0..=1.0).contains(&lo) || !(0.0..=1.0).contains(&hi) || lo > hi {
            return Err(EngineError::invalid_config(format!(
                "move_clamp must be an ordered range within [0, 1], got ({}, {})",
                lo, hi
            )));
        }
        let positive = [
            ("handle_tolerance", self.handle_tolerance),
            ("min_resize_extent", self.min_resize_extent),
            ("min_box_side_px", self.min_box_side_px),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(EngineError::invalid_config(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.duplicate_iou_threshold) {
            return Err(EngineError::invalid_config(format!(
                "duplicate_iou_threshold must be within [0, 1], got {}",
                self.duplicate_iou_threshold
            )));
        }
        Ok(())
    }

    /// Export to a pretty-printed JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Import from JSON and validate.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip() {
        let config = EngineConfig {
            min_box_side_px: 12.0,
            log_level: LogLevel::Debug,
            ..Default::default()
        };

        let json = config.to_json().unwrap();
        let loaded = EngineConfig::from_json(&json).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let loaded = EngineConfig::from_json(r#"{"handle_tolerance": 0.05}"#).unwrap();
        assert_eq!(loaded.handle_tolerance, 0.05);
        assert_eq!(loaded.palette, MASK_PALETTE.to_vec());
        assert_eq!(loaded.version, CONFIG_VERSION);
    }

    #[test]
    fn test_newer_version_rejected() {
        let err = EngineConfig::from_json(r#"{"version": 99}"#).unwrap_err();
        assert!(matches!(err, EngineError::VersionMismatch { found: 99, .. }));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = EngineConfig::from_json(r#"{"move_clamp": [0.9, 0.1]}"#).unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig { .. }));

        let err = EngineConfig::from_json(r#"{"output_resolution": {"width": 0, "height": 10}}"#)
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidResolution { .. }));
    }

    #[test]
    fn test_log_level_filter() {
        assert_eq!(LogLevel::Warn.to_level_filter(), log::LevelFilter::Warn);
        assert_eq!(LogLevel::default(), LogLevel::Info);
    }
}
