//! Prompt types that guide the external segmentation call.
//!
//! All prompt geometry is in image pixels.

use serde::{Deserialize, Serialize};

use crate::constants::{MIN_BOX_SIDE_PX, MIN_POLYGON_VERTICES};
use crate::model::{BoundingBox, Point};

/// Unique identifier for a prompt within one draft manager.
pub type PromptId = u32;

/// Whether a prompt marks content to include or to exclude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    #[default]
    Positive,
    Negative,
}

impl Polarity {
    /// Wire label: 1 = positive (include), 0 = negative (exclude).
    pub fn label(self) -> u8 {
        match self {
            Polarity::Positive => 1,
            Polarity::Negative => 0,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Polarity::Positive => Polarity::Negative,
            Polarity::Negative => Polarity::Positive,
        }
    }
}

/// A committed box prompt, `[x1, y1, x2, y2]` with `x2 > x1` and `y2 > y1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxPrompt {
    pub id: PromptId,
    pub coords: [f32; 4],
    pub polarity: Polarity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl BoxPrompt {
    /// Build a box from two drag corners. Returns `None` when either side is
    /// shorter than `min_side` pixels.
    pub fn from_drag(id: PromptId, start: Point, end: Point, polarity: Polarity, min_side: f32) -> Option<Self> {
        let [x1, y1, x2, y2] = BoundingBox::from_corners(start, end).to_xyxy();
        if x2 - x1 < min_side || y2 - y1 < min_side {
            return None;
        }
        Some(Self {
            id,
            coords: [x1, y1, x2, y2],
            polarity,
            name: None,
        })
    }

    pub fn bounding_box(&self) -> BoundingBox {
        let [x1, y1, x2, y2] = self.coords;
        BoundingBox::new(x1, y1, x2 - x1, y2 - y1)
    }

    pub fn contains(&self, point: &Point) -> bool {
        self.bounding_box().contains(point)
    }

    /// Translate the box by a pixel delta.
    pub fn translated(&self, delta: Point) -> Self {
        let [x1, y1, x2, y2] = self.coords;
        Self {
            coords: [x1 + delta.x, y1 + delta.y, x2 + delta.x, y2 + delta.y],
            ..self.clone()
        }
    }

    /// Whether the box meets the default minimum side length.
    pub fn is_valid(&self) -> bool {
        let [x1, y1, x2, y2] = self.coords;
        x2 - x1 >= MIN_BOX_SIDE_PX && y2 - y1 >= MIN_BOX_SIDE_PX
    }
}

/// A polygon prompt. Only closed polygons are ever committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolygonPrompt {
    pub id: PromptId,
    pub points: Vec<Point>,
    pub polarity: Polarity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub closed: bool,
}

impl PolygonPrompt {
    /// Close a draft into a prompt. Returns `None` with fewer than three points.
    pub fn close(id: PromptId, points: Vec<Point>, polarity: Polarity) -> Option<Self> {
        if points.len() < MIN_POLYGON_VERTICES {
            return None;
        }
        Some(Self {
            id,
            points,
            polarity,
            name: None,
            closed: true,
        })
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        BoundingBox::enclosing(&self.points)
    }
}

/// A single click prompt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointPrompt {
    pub id: PromptId,
    pub position: Point,
    pub polarity: Polarity,
}
