//! Segmentation service contract and submission guard.
//!
//! The segmentation model itself lives outside this crate. Here we build the
//! request from the current drafts, keep at most one request in flight per
//! image, and turn the response into a merge batch (or an error that leaves
//! the drafts untouched so the operator can retry).

use serde::{Deserialize, Serialize};
use web_time::Instant;

use crate::drafts::DraftManager;
use crate::error::{EngineError, Result};
use crate::model::{MaskSource, RawMask, group_key_of};

/// How the service should segment the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SegmentationMode {
    /// Automatic detection, no prompts
    #[default]
    #[serde(rename = "auto")]
    Auto,
    /// Text prompts only
    #[serde(rename = "text")]
    TextPrompt,
    /// Geometric prompts only
    #[serde(rename = "box")]
    BoxPrompt,
    /// Text plus geometric prompts
    #[serde(rename = "combined")]
    Combined,
}

impl SegmentationMode {
    /// Source recorded on masks produced in this mode.
    pub fn mask_source(self) -> MaskSource {
        match self {
            SegmentationMode::Auto => MaskSource::Auto,
            SegmentationMode::TextPrompt
            | SegmentationMode::BoxPrompt
            | SegmentationMode::Combined => MaskSource::Manual,
        }
    }

    fn uses_text(self) -> bool {
        matches!(self, SegmentationMode::TextPrompt | SegmentationMode::Combined)
    }

    fn uses_geometry(self) -> bool {
        matches!(self, SegmentationMode::BoxPrompt | SegmentationMode::Combined)
    }
}

/// A box prompt on the wire: `[x1, y1, x2, y2]` pixels, label 1 = include, 0 = exclude.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxPromptWire {
    pub coords: [f32; 4],
    pub label: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointPromptWire {
    pub point: [f32; 2],
    pub label: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolygonPromptWire {
    pub points: Vec<[f32; 2]>,
    pub label: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Request sent to the segmentation service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentationRequest {
    #[serde(alias = "projectionId")]
    pub image_ref: String,
    pub mode: SegmentationMode,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub text_prompts: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub boxes: Vec<BoxPromptWire>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub points: Vec<PointPromptWire>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub polygons: Vec<PolygonPromptWire>,
}

impl SegmentationRequest {
    /// A request with no prompts.
    pub fn new(image_ref: impl Into<String>, mode: SegmentationMode) -> Self {
        Self {
            image_ref: image_ref.into(),
            mode,
            text_prompts: Vec::new(),
            boxes: Vec::new(),
            points: Vec::new(),
            polygons: Vec::new(),
        }
    }

    /// Build a request from committed drafts.
    ///
    /// Only the prompt kinds the mode uses are included. Blank text prompts
    /// are dropped.
    pub fn from_drafts(
        image_ref: impl Into<String>,
        mode: SegmentationMode,
        text_prompts: &[&str],
        drafts: &DraftManager,
    ) -> Self {
        let mut request = Self::new(image_ref, mode);
        if mode.uses_text() {
            request.text_prompts = text_prompts
                .iter()
                .map(|t| t.trim())
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect();
        }
        if mode.uses_geometry() {
            request.boxes = drafts
                .boxes()
                .iter()
                .map(|b| BoxPromptWire {
                    coords: b.coords,
                    label: b.polarity.label(),
                    name: b.name.clone(),
                })
                .collect();
            request.points = drafts
                .points()
                .iter()
                .map(|p| PointPromptWire {
                    point: [p.position.x, p.position.y],
                    label: p.polarity.label(),
                })
                .collect();
            request.polygons = drafts
                .polygons()
                .iter()
                .map(|p| PolygonPromptWire {
                    points: p.points.iter().map(|v| [v.x, v.y]).collect(),
                    label: p.polarity.label(),
                    name: p.name.clone(),
                })
                .collect();
        }
        request
    }

    fn has_geometry(&self) -> bool {
        !(self.boxes.is_empty() && self.points.is_empty() && self.polygons.is_empty())
    }

    /// Whether the request carries the prompts its mode needs.
    pub fn has_required_prompts(&self) -> bool {
        match self.mode {
            SegmentationMode::Auto => true,
            SegmentationMode::TextPrompt => !self.text_prompts.is_empty(),
            SegmentationMode::BoxPrompt | SegmentationMode::Combined => self.has_geometry(),
        }
    }

    /// Name of the first positive box or polygon prompt that has one.
    ///
    /// Masks the geometric prompts produce are labeled with it.
    pub fn label_seed(&self) -> Option<&str> {
        let boxes = self.boxes.iter().map(|b| (b.label, &b.name));
        let polygons = self.polygons.iter().map(|p| (p.label, &p.name));
        boxes
            .chain(polygons)
            .filter(|(label, _)| *label == 1)
            .filter_map(|(_, name)| name.as_deref().map(str::trim))
            .find(|name| !name.is_empty())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Response from the segmentation service.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SegmentationResponse {
    pub success: bool,
    #[serde(default)]
    pub masks: Option<Vec<RawMask>>,
    #[serde(default)]
    pub error: Option<String>,
}

impl SegmentationResponse {
    pub fn succeeded(masks: Vec<RawMask>) -> Self {
        Self {
            success: true,
            masks: Some(masks),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            masks: None,
            error: Some(error.into()),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// The merge batch, or the error to show the operator.
    pub fn into_masks(self) -> Result<Vec<RawMask>> {
        if !self.success {
            let message = self
                .error
                .filter(|e| !e.trim().is_empty())
                .unwrap_or_else(|| "unknown error".to_string());
            return Err(EngineError::segmentation_failed(message));
        }
        match self.masks {
            Some(masks) if !masks.is_empty() => Ok(masks),
            _ => Err(EngineError::NoMasksReturned),
        }
    }
}

/// The external segmentation call.
///
/// Implementations may block; asynchronous hosts should instead drive
/// [`SubmissionTracker`] themselves and deliver the response on completion.
pub trait SegmentationService {
    fn segment(&self, request: &SegmentationRequest) -> Result<SegmentationResponse>;
}

/// Identifies one submission so a late completion can be matched to it.
pub type SubmissionTicket = u64;

/// The submission currently awaiting a response.
#[derive(Debug, Clone)]
pub struct PendingSubmission {
    pub ticket: SubmissionTicket,
    pub mode: SegmentationMode,
    pub started: Instant,
    /// Label for masks from the geometric prompts
    pub label_seed: Option<String>,
    /// Text prompts sent; masks labeled with one of these keep their label
    pub text_prompts: Vec<String>,
}

impl PendingSubmission {
    /// Relabel masks produced by the named geometric prompts.
    ///
    /// In combined mode a mask whose base label matches a submitted text
    /// prompt came from that prompt and is left alone.
    pub fn seed_labels(&self, masks: &mut [RawMask]) {
        let Some(seed) = &self.label_seed else {
            return;
        };
        let text_keys: Vec<String> = self.text_prompts.iter().map(|t| group_key_of(t)).collect();
        for mask in masks {
            if !text_keys.contains(&group_key_of(&mask.label)) {
                mask.label = seed.clone();
            }
        }
    }
}

/// Allows at most one outstanding submission.
#[derive(Debug, Clone, Default)]
pub struct SubmissionTracker {
    pending: Option<PendingSubmission>,
    last_ticket: SubmissionTicket,
}

impl SubmissionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_in_flight(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending(&self) -> Option<&PendingSubmission> {
        self.pending.as_ref()
    }

    /// Register `request` as submitted, or fail if one is still outstanding.
    pub fn begin(&mut self, request: &SegmentationRequest) -> Result<SubmissionTicket> {
        if self.pending.is_some() {
            return Err(EngineError::SubmissionInFlight);
        }
        self.last_ticket += 1;
        let ticket = self.last_ticket;
        self.pending = Some(PendingSubmission {
            ticket,
            mode: request.mode,
            started: Instant::now(),
            label_seed: request.label_seed().map(str::to_string),
            text_prompts: request.text_prompts.clone(),
        });
        Ok(ticket)
    }

    /// Clear the outstanding submission matching `ticket`.
    pub fn finish(&mut self, ticket: SubmissionTicket) -> Result<PendingSubmission> {
        match self.pending.take() {
            Some(pending) if pending.ticket == ticket => {
                log::debug!(
                    "Segmentation {} ({:?}) finished in {:.2?}",
                    ticket,
                    pending.mode,
                    pending.started.elapsed()
                );
                Ok(pending)
            }
            other => {
                self.pending = other;
                Err(EngineError::UnknownSubmission { ticket })
            }
        }
    }

    /// Forget the outstanding submission; a late response will be rejected.
    pub fn abandon(&mut self) -> bool {
        self.pending.take().is_some()
    }
}
