//! Mask data model and label grouping.
//!
//! A mask label optionally ends in an ordinal suffix (`"rib #3"`). Grouping,
//! coloring, and renumbering all key off the label with that suffix removed,
//! so the parsing lives in one place: [`base_label_of`] and [`group_key_of`].

use serde::{Deserialize, Serialize};

use crate::color_utils::Color;
use crate::model::BoundingBox;

/// Unique identifier for a mask within a collection.
pub type MaskId = u64;

/// Base label used when a label is empty once its suffix is removed.
pub const UNLABELED: &str = "mask";

/// How a mask came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaskSource {
    /// Produced by automatic segmentation without operator prompts
    #[default]
    Auto,
    /// Produced from operator prompts (text, boxes, points, polygons)
    Manual,
}

/// A committed mask.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mask {
    pub id: MaskId,
    pub label: String,
    pub color: Color,
    /// Opaque raster handle owned by the host (e.g. an encoded PNG).
    pub mask_data: String,
    /// `[x, y, w, h]` in pixels. Missing boxes mean "unknown position".
    #[serde(default)]
    pub bbox: Option<BoundingBox>,
    #[serde(default)]
    pub area: u64,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default)]
    pub source: MaskSource,
}

fn default_visible() -> bool {
    true
}

impl Mask {
    /// Label with the ordinal suffix removed.
    pub fn base_label(&self) -> &str {
        base_label_of(&self.label)
    }

    /// Grouping key for this mask.
    pub fn group_key(&self) -> String {
        group_key_of(&self.label)
    }

    /// The `#n` suffix, if present.
    pub fn ordinal(&self) -> Option<u32> {
        ordinal_of(&self.label)
    }
}

/// A mask as returned by the segmentation service, before merging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMask {
    pub label: String,
    #[serde(default)]
    pub color: Option<Color>,
    #[serde(alias = "maskBase64")]
    pub mask_data: String,
    #[serde(default)]
    pub bbox: Option<BoundingBox>,
    #[serde(default)]
    pub area: u64,
    #[serde(default, alias = "predictedIou")]
    pub predicted_confidence: f32,
}

impl RawMask {
    pub fn new(label: impl Into<String>, bbox: Option<BoundingBox>) -> Self {
        Self {
            label: label.into(),
            color: None,
            mask_data: String::new(),
            bbox,
            area: bbox.map(|b| b.area().max(0.0) as u64).unwrap_or(0),
            predicted_confidence: 0.0,
        }
    }

    pub fn with_mask_data(mut self, mask_data: impl Into<String>) -> Self {
        self.mask_data = mask_data.into();
        self
    }
}

/// Split a label into the text before a trailing `#<digits>` and the digits.
fn split_ordinal(label: &str) -> (&str, Option<&str>) {
    let trimmed = label.trim();
    if let Some(hash) = trimmed.rfind('#') {
        let digits = &trimmed[hash + 1..];
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            return (trimmed[..hash].trim_end(), Some(digits));
        }
    }
    (trimmed, None)
}

/// The label with any trailing `#<n>` ordinal removed and whitespace trimmed.
///
/// Case is preserved. Labels that are empty after stripping map to [`UNLABELED`].
///
/// ```
/// use roimask::base_label_of;
/// assert_eq!(base_label_of("rib #3"), "rib");
/// assert_eq!(base_label_of("  Boss Stone  "), "Boss Stone");
/// assert_eq!(base_label_of("#2"), "mask");
/// ```
pub fn base_label_of(label: &str) -> &str {
    let (base, _) = split_ordinal(label);
    if base.is_empty() { UNLABELED } else { base }
}

/// Case-insensitive grouping key: the base label, lowercased.
pub fn group_key_of(label: &str) -> String {
    base_label_of(label).to_lowercase()
}

/// The ordinal suffix of a label, if present.
pub fn ordinal_of(label: &str) -> Option<u32> {
    split_ordinal(label).1.and_then(|d| d.parse().ok())
}

/// Format `"<base> #<n>"`.
pub fn numbered_label(base: &str, ordinal: usize) -> String {
    format!("{} #{}", base_label_of(base), ordinal)
}
