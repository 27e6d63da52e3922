//! Persistence export and import.
//!
//! On commit the ROI is handed to the host in pixel space and the mask set as
//! a flat list. The same shapes restore a session later. Where the data goes
//! is up to the [`PersistenceSink`]; [`JsonDirSink`] writes one JSON snapshot
//! per image.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::masks::MaskCollection;
use crate::model::{ImageSize, Mask, Point, RegionOfInterest};
use crate::projection::ImageRef;

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// A mask as persisted: `{ id, label, color, maskData, bbox, area, visible, source }`.
pub type MaskExport = Mask;

/// A region of interest in pixel space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoiExport {
    /// Center X in pixels
    pub x: f32,
    /// Center Y in pixels
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Degrees
    #[serde(default)]
    pub rotation: f32,
    /// TL, TR, BR, BL in pixels; informational on import
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corners: Option<[[f32; 2]; 4]>,
}

fn require_valid(size: ImageSize) -> Result<()> {
    if size.is_valid() {
        Ok(())
    } else {
        Err(EngineError::InvalidResolution {
            width: size.width,
            height: size.height,
        })
    }
}

/// Fold an angle into (-360, 360].
fn normalize_rotation(degrees: f32) -> f32 {
    let r = degrees % 360.0;
    if r <= -360.0 { r + 360.0 } else { r }
}

impl RegionOfInterest {
    /// Scale into pixel space for the persistence service.
    pub fn to_pixel_export(&self, size: ImageSize) -> Result<RoiExport> {
        require_valid(size)?;
        let (w, h) = (size.width as f32, size.height as f32);
        let corners = self.corners().map(|c| {
            let p = size.to_pixels(c);
            [p.x, p.y]
        });
        Ok(RoiExport {
            x: self.center_x * w,
            y: self.center_y * h,
            width: self.width * w,
            height: self.height * h,
            rotation: self.rotation_degrees,
            corners: Some(corners),
        })
    }

    /// Restore from a pixel-space export.
    ///
    /// A saved region with no area falls back to the default region.
    pub fn from_pixel_export(export: &RoiExport, size: ImageSize) -> Result<Self> {
        require_valid(size)?;
        let center = size
            .to_normalized(Point::new(export.x, export.y))
            .ok_or(EngineError::InvalidResolution {
                width: size.width,
                height: size.height,
            })?;
        let region = Self::new(
            center.x,
            center.y,
            export.width / size.width as f32,
            export.height / size.height as f32,
            normalize_rotation(export.rotation),
        );
        if region.is_valid() {
            Ok(region)
        } else {
            log::warn!(
                "Saved ROI {}x{} has no area; using the default region",
                export.width,
                export.height
            );
            Ok(Self::default())
        }
    }
}

impl MaskCollection {
    /// Flat list for the persistence service.
    pub fn to_export(&self) -> Vec<MaskExport> {
        self.masks().to_vec()
    }

    /// Restore a saved list. Labels and colors are kept as saved.
    pub fn from_export(masks: Vec<MaskExport>) -> Self {
        Self::from_masks(masks)
    }
}

/// Receives committed state.
pub trait PersistenceSink {
    fn save_roi(&mut self, image: &ImageRef, roi: &RoiExport) -> Result<()>;

    fn save_masks(&mut self, image: &ImageRef, masks: &[MaskExport]) -> Result<()>;
}

/// Everything persisted for one image, as a single document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub version: u32,
    pub image: ImageRef,
    #[serde(default)]
    pub roi: Option<RoiExport>,
    #[serde(default)]
    pub masks: Vec<MaskExport>,
}

impl SessionSnapshot {
    pub fn new(image: ImageRef) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            image,
            roi: None,
            masks: Vec::new(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a snapshot, rejecting versions newer than this crate writes.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Self = serde_json::from_str(json)?;
        if snapshot.version > SNAPSHOT_VERSION {
            return Err(EngineError::VersionMismatch {
                expected: SNAPSHOT_VERSION,
                found: snapshot.version,
            });
        }
        Ok(snapshot)
    }
}

/// Writes `<dir>/<image>.json` snapshots.
///
/// File names keep lowercase ASCII letters, digits, `-` and `_`; every other
/// byte of the image ref is written as `%XX`, so distinct refs never share a
/// file, even on case-insensitive file systems.
#[derive(Debug, Clone)]
pub struct JsonDirSink {
    dir: PathBuf,
}

impl JsonDirSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, image: &ImageRef) -> PathBuf {
        let mut name = String::with_capacity(image.as_str().len());
        for byte in image.as_str().bytes() {
            match byte {
                b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' => name.push(char::from(byte)),
                _ => name.push_str(&format!("%{:02X}", byte)),
            }
        }
        self.dir.join(format!("{}.json", name))
    }

    /// Load the snapshot for `image`, if one was written.
    pub fn load(&self, image: &ImageRef) -> Result<Option<SessionSnapshot>> {
        let path = self.path_for(image);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path)?;
        let snapshot = SessionSnapshot::from_json(&json)?;
        if snapshot.image != *image {
            log::warn!(
                "{} holds a snapshot for '{}', not '{}'; ignoring it",
                path.display(),
                snapshot.image,
                image
            );
            return Ok(None);
        }
        Ok(Some(snapshot))
    }

    fn update(&self, image: &ImageRef, edit: impl FnOnce(&mut SessionSnapshot)) -> Result<()> {
        let mut snapshot = self
            .load(image)?
            .unwrap_or_else(|| SessionSnapshot::new(image.clone()));
        edit(&mut snapshot);
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(image);
        fs::write(&path, snapshot.to_json()?)?;
        log::debug!("Saved {} to {}", image, path.display());
        Ok(())
    }
}

impl PersistenceSink for JsonDirSink {
    fn save_roi(&mut self, image: &ImageRef, roi: &RoiExport) -> Result<()> {
        self.update(image, |s| s.roi = Some(roi.clone()))
    }

    fn save_masks(&mut self, image: &ImageRef, masks: &[MaskExport]) -> Result<()> {
        self.update(image, |s| s.masks = masks.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::masks::MergeOptions;
    use crate::model::{BoundingBox, MaskSource, RawMask};

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn test_roi_export_scales_to_pixels() {
        let roi = RegionOfInterest::new(0.5, 0.25, 0.5, 0.5, 0.0);
        let export = roi.to_pixel_export(ImageSize::new(2000, 1000)).unwrap();
        assert_eq!((export.x, export.y), (1000.0, 250.0));
        assert_eq!((export.width, export.height), (1000.0, 500.0));
        assert_eq!(
            export.corners,
            Some([[500.0, 0.0], [1500.0, 0.0], [1500.0, 500.0], [500.0, 500.0]])
        );
    }

    #[test]
    fn test_roi_round_trip_through_pixels() {
        let size = ImageSize::new(2048, 1536);
        let roi = RegionOfInterest::new(0.4, 0.6, 0.3, 0.2, 35.0);
        let restored =
            RegionOfInterest::from_pixel_export(&roi.to_pixel_export(size).unwrap(), size).unwrap();
        assert!(approx_eq(restored.center_x, roi.center_x));
        assert!(approx_eq(restored.center_y, roi.center_y));
        assert!(approx_eq(restored.width, roi.width));
        assert!(approx_eq(restored.height, roi.height));
        assert!(approx_eq(restored.rotation_degrees, 35.0));
    }

    #[test]
    fn test_roi_import_without_corners() {
        let export: RoiExport =
            serde_json::from_str(r#"{"x": 100, "y": 50, "width": 40, "height": 20}"#).unwrap();
        let roi = RegionOfInterest::from_pixel_export(&export, ImageSize::new(200, 100)).unwrap();
        assert_eq!(roi, RegionOfInterest::new(0.5, 0.5, 0.2, 0.2, 0.0));
    }

    #[test]
    fn test_roi_import_edge_cases() {
        let flat = RoiExport {
            x: 10.0,
            y: 10.0,
            width: 0.0,
            height: 10.0,
            rotation: 0.0,
            corners: None,
        };
        let size = ImageSize::new(100, 100);
        assert_eq!(
            RegionOfInterest::from_pixel_export(&flat, size).unwrap(),
            RegionOfInterest::default()
        );
        assert!(matches!(
            RegionOfInterest::from_pixel_export(&flat, ImageSize::new(0, 100)),
            Err(EngineError::InvalidResolution { .. })
        ));

        let spun = RoiExport {
            width: 10.0,
            rotation: 450.0,
            ..flat
        };
        let roi = RegionOfInterest::from_pixel_export(&spun, size).unwrap();
        assert!(approx_eq(roi.rotation_degrees, 90.0));
    }

    #[test]
    fn test_mask_export_wire_shape() {
        let collection = MaskCollection::new().merge(
            &[RawMask::new("rib", Some(BoundingBox::new(1.0, 2.0, 3.0, 4.0))).with_mask_data("png")],
            MaskSource::Manual,
            &MergeOptions::default(),
        );
        let json = serde_json::to_value(collection.to_export()).unwrap();
        let mask = &json[0];
        assert_eq!(mask["label"], "rib #1");
        assert_eq!(mask["maskData"], "png");
        assert_eq!(mask["bbox"], serde_json::json!([1.0, 2.0, 3.0, 4.0]));
        assert_eq!(mask["source"], "manual");
        assert_eq!(mask["visible"], true);
        assert!(mask["color"].as_str().unwrap().starts_with('#'));
    }

    #[test]
    fn test_mask_import_restores_collection() {
        let collection = MaskCollection::new().merge(
            &[
                RawMask::new("rib", Some(BoundingBox::new(0.0, 0.0, 10.0, 10.0))),
                RawMask::new("boss", Some(BoundingBox::new(50.0, 50.0, 10.0, 10.0))),
            ],
            MaskSource::Auto,
            &MergeOptions::default(),
        );
        let json = serde_json::to_string(&collection.to_export()).unwrap();
        let restored = MaskCollection::from_export(serde_json::from_str(&json).unwrap());
        assert_eq!(restored.masks(), collection.masks());
    }

    #[test]
    fn test_snapshot_version_check() {
        let mut snapshot = SessionSnapshot::new(ImageRef::from("plan"));
        snapshot.version = SNAPSHOT_VERSION + 1;
        let json = snapshot.to_json().unwrap();
        assert!(matches!(
            SessionSnapshot::from_json(&json),
            Err(EngineError::VersionMismatch { .. })
        ));
    }

    #[test]
    fn test_json_dir_sink_round_trip() {
        let dir = std::env::temp_dir().join(format!("roimask-sink-{}", std::process::id()));
        let mut sink = JsonDirSink::new(dir.clone());
        let image = ImageRef::from("plan/view 1");
        let size = ImageSize::new(100, 100);
        let roi = RegionOfInterest::default().to_pixel_export(size).unwrap();

        assert!(sink.load(&image).unwrap().is_none());
        sink.save_roi(&image, &roi).unwrap();
        sink.save_masks(&image, &[]).unwrap();

        let snapshot = sink.load(&image).unwrap().unwrap();
        assert_eq!(snapshot.image, image);
        assert_eq!(snapshot.roi, Some(roi));
        assert!(snapshot.masks.is_empty());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_json_dir_sink_keeps_similar_refs_apart() {
        let dir = std::env::temp_dir().join(format!("roimask-refs-{}", std::process::id()));
        let mut sink = JsonDirSink::new(dir.clone());
        let slashed = ImageRef::from("plan/a");
        let underscored = ImageRef::from("plan_a");
        let upper = ImageRef::from("Plan_a");
        assert_ne!(sink.path_for(&slashed), sink.path_for(&underscored));
        assert_ne!(
            sink.path_for(&upper).to_string_lossy().to_lowercase(),
            sink.path_for(&underscored).to_string_lossy().to_lowercase()
        );

        let saved = MaskCollection::new().merge(
            &[RawMask::new("rib", Some(BoundingBox::new(0.0, 0.0, 5.0, 5.0)))],
            MaskSource::Manual,
            &MergeOptions::default(),
        );
        sink.save_masks(&slashed, &saved.to_export()).unwrap();
        assert!(sink.load(&underscored).unwrap().is_none());

        sink.save_masks(&underscored, &[]).unwrap();
        let snapshot = sink.load(&slashed).unwrap().unwrap();
        assert_eq!(snapshot.image, slashed);
        assert_eq!(snapshot.masks.len(), 1);

        let _ = fs::remove_dir_all(&dir);
    }
}
