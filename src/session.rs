//! Per-image sessions and event routing.
//!
//! Each image keeps its own drafts, mask collection, and submission state.
//! The [`Workspace`] tracks which image is active and routes pointer and
//! keyboard events either to the ROI editor (normalized coordinates) or to the
//! draft manager (pixel coordinates), depending on the [`EditTarget`].

use std::collections::HashMap;

use crate::config::EngineConfig;
use crate::coords::{SurfaceRect, pointer_to_normalized, pointer_to_pixel};
use crate::drafts::{DraftEvent, DraftManager, DraftTolerances};
use crate::error::{EngineError, Result};
use crate::interaction::{RoiEditor, RoiHit, RoiRelease, RoiTolerances};
use crate::keybindings::{Key, KeyAction, KeyBindings};
use crate::masks::{MaskCollection, MergeOptions};
use crate::model::{ImageSize, MaskId, Point, RegionOfInterest};
use crate::persistence::{PersistenceSink, SessionSnapshot};
use crate::projection::{ImageRef, ProjectionProvider};
use crate::region_filter::masks_inside_roi;
use crate::segmentation::{
    SegmentationMode, SegmentationRequest, SegmentationResponse, SegmentationService,
    SubmissionTicket, SubmissionTracker,
};

/// Which editor receives pointer events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditTarget {
    Roi,
    #[default]
    Prompts,
}

impl EditTarget {
    pub fn toggled(self) -> Self {
        match self {
            EditTarget::Roi => EditTarget::Prompts,
            EditTarget::Prompts => EditTarget::Roi,
        }
    }
}

/// Result of a routed pointer event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerOutcome {
    /// The pointer could not be mapped, or nothing was in progress
    Ignored,
    RoiGrabbed(RoiHit),
    RoiReleased(RoiRelease),
    Draft(DraftEvent),
    /// A drag updated the live region or box
    Moved,
}

/// Result of a routed key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    Ignored,
    Action(KeyAction),
    Draft(DraftEvent),
    RoiDragCancelled,
}

/// State held for one image.
#[derive(Debug, Clone)]
pub struct ImageSession {
    image: ImageRef,
    size: Option<ImageSize>,
    roi: RoiEditor,
    drafts: DraftManager,
    masks: MaskCollection,
    submission: SubmissionTracker,
}

impl ImageSession {
    pub fn new(image: ImageRef, size: Option<ImageSize>, config: &EngineConfig) -> Self {
        Self {
            image,
            size,
            roi: RoiEditor::new(RoiTolerances::from(config)),
            drafts: DraftManager::new(DraftTolerances::from(config)),
            masks: MaskCollection::new(),
            submission: SubmissionTracker::new(),
        }
    }

    pub fn image(&self) -> &ImageRef {
        &self.image
    }

    /// True raster size, when known.
    pub fn size(&self) -> Option<ImageSize> {
        self.size
    }

    pub fn set_size(&mut self, size: ImageSize) {
        if size.is_valid() {
            self.size = Some(size);
        }
    }

    /// True raster size, or `fallback` while it is unknown.
    pub fn pixel_size(&self, fallback: ImageSize) -> ImageSize {
        self.size.filter(ImageSize::is_valid).unwrap_or(fallback)
    }

    pub fn roi(&self) -> &RegionOfInterest {
        self.roi.region()
    }

    pub fn roi_editor(&self) -> &RoiEditor {
        &self.roi
    }

    pub fn roi_editor_mut(&mut self) -> &mut RoiEditor {
        &mut self.roi
    }

    pub fn drafts(&self) -> &DraftManager {
        &self.drafts
    }

    pub fn drafts_mut(&mut self) -> &mut DraftManager {
        &mut self.drafts
    }

    pub fn masks(&self) -> &MaskCollection {
        &self.masks
    }

    /// Replace the collection with a new value.
    pub fn set_masks(&mut self, masks: MaskCollection) {
        self.masks = masks;
    }

    pub fn submission(&self) -> &SubmissionTracker {
        &self.submission
    }

    /// Ids of masks whose bbox center lies inside the ROI (unknown positions kept).
    pub fn masks_in_roi(&self, fallback: ImageSize) -> Vec<MaskId> {
        masks_inside_roi(&self.masks, self.roi.region(), self.pixel_size(fallback))
    }

    fn cancel_gestures(&mut self) {
        self.roi.cancel();
        self.drafts.cancel_gesture();
    }
}

/// All open images plus the routing state shared between them.
#[derive(Debug, Clone)]
pub struct Workspace {
    config: EngineConfig,
    keybindings: KeyBindings,
    sessions: HashMap<ImageRef, ImageSession>,
    active: Option<ImageRef>,
    target: EditTarget,
}

impl Workspace {
    /// Create a workspace after validating `config`.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            keybindings: KeyBindings::default(),
            sessions: HashMap::new(),
            active: None,
            target: EditTarget::default(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn keybindings(&self) -> &KeyBindings {
        &self.keybindings
    }

    pub fn set_keybindings(&mut self, keybindings: KeyBindings) {
        self.keybindings = keybindings;
    }

    pub fn target(&self) -> EditTarget {
        self.target
    }

    /// Switch between ROI and prompt editing, abandoning any drag.
    pub fn set_target(&mut self, target: EditTarget) {
        if self.target != target {
            if let Ok(session) = self.active_session_mut() {
                session.cancel_gestures();
            }
            self.target = target;
        }
    }

    pub fn active_image(&self) -> Option<&ImageRef> {
        self.active.as_ref()
    }

    pub fn session(&self, image: &ImageRef) -> Option<&ImageSession> {
        self.sessions.get(image)
    }

    pub fn active_session(&self) -> Result<&ImageSession> {
        self.active
            .as_ref()
            .and_then(|image| self.sessions.get(image))
            .ok_or(EngineError::NoActiveImage)
    }

    pub fn active_session_mut(&mut self) -> Result<&mut ImageSession> {
        self.active
            .as_ref()
            .and_then(|image| self.sessions.get_mut(image))
            .ok_or(EngineError::NoActiveImage)
    }

    fn session_mut(&mut self, image: &ImageRef) -> Result<&mut ImageSession> {
        self.sessions
            .get_mut(image)
            .ok_or_else(|| EngineError::unknown_image(image.as_str()))
    }

    /// Make `image` active.
    ///
    /// The image gets a fresh default ROI; its drafts and masks are kept from
    /// any earlier visit.
    pub fn switch_image(&mut self, image: impl Into<ImageRef>, size: Option<ImageSize>) {
        let image = image.into();
        if let Ok(previous) = self.active_session_mut() {
            previous.cancel_gestures();
        }
        let config = &self.config;
        let session = self
            .sessions
            .entry(image.clone())
            .or_insert_with(|| ImageSession::new(image.clone(), size, config));
        if let Some(size) = size {
            session.set_size(size);
        }
        session.roi.reset();
        log::info!(
            "Active image is now '{}' ({} masks, {} box prompts)",
            image,
            session.masks.len(),
            session.drafts.boxes().len()
        );
        self.active = Some(image);
    }

    /// Follow the provider's active image and resolution.
    pub fn sync_with(&mut self, provider: &dyn ProjectionProvider) -> Result<()> {
        let image = provider.active_image().ok_or(EngineError::NoActiveImage)?;
        let size = provider.resolution(&image);
        if self.active.as_ref() == Some(&image) {
            if let Some(size) = size {
                self.active_session_mut()?.set_size(size);
            }
        } else {
            self.switch_image(image, size);
        }
        Ok(())
    }

    /// Drop an image's session. Returns whether it existed.
    pub fn close_image(&mut self, image: &ImageRef) -> bool {
        if self.active.as_ref() == Some(image) {
            self.active = None;
        }
        self.sessions.remove(image).is_some()
    }

    // ========================================================================
    // Pointer routing
    // ========================================================================

    fn map_pointer(&self, session: &ImageSession, pointer: Point, rect: &SurfaceRect) -> Option<Point> {
        match self.target {
            EditTarget::Roi => pointer_to_normalized(pointer, rect),
            EditTarget::Prompts => {
                pointer_to_pixel(pointer, rect, session.size, self.config.output_resolution)
            }
        }
    }

    pub fn pointer_down(&mut self, pointer: Point, rect: &SurfaceRect) -> Result<PointerOutcome> {
        let Some(p) = self.map_pointer(self.active_session()?, pointer, rect) else {
            return Ok(PointerOutcome::Ignored);
        };
        let target = self.target;
        let session = self.active_session_mut()?;
        Ok(match target {
            EditTarget::Roi => PointerOutcome::RoiGrabbed(session.roi.pointer_down(p)),
            EditTarget::Prompts => PointerOutcome::Draft(session.drafts.pointer_down(p)),
        })
    }

    pub fn pointer_move(&mut self, pointer: Point, rect: &SurfaceRect) -> Result<PointerOutcome> {
        let Some(p) = self.map_pointer(self.active_session()?, pointer, rect) else {
            return Ok(PointerOutcome::Ignored);
        };
        let target = self.target;
        let session = self.active_session_mut()?;
        let changed = match target {
            EditTarget::Roi => session.roi.pointer_move(p),
            EditTarget::Prompts => session.drafts.pointer_move(p),
        };
        Ok(if changed {
            PointerOutcome::Moved
        } else {
            PointerOutcome::Ignored
        })
    }

    pub fn pointer_up(&mut self) -> Result<PointerOutcome> {
        let target = self.target;
        let session = self.active_session_mut()?;
        Ok(match target {
            EditTarget::Roi => PointerOutcome::RoiReleased(session.roi.pointer_up()),
            EditTarget::Prompts => PointerOutcome::Draft(session.drafts.pointer_up()),
        })
    }

    // ========================================================================
    // Keyboard
    // ========================================================================

    pub fn handle_key(&mut self, key: Key) -> Result<KeyOutcome> {
        let naming = self.active_session()?.drafts.pending_box().is_some();
        // Characters belong to the naming prompt while it is open.
        if !naming {
            if let Some(action) = self.keybindings.action_for_key(key) {
                self.apply_action(action)?;
                return Ok(KeyOutcome::Action(action));
            }
        }

        let target = self.target;
        let session = self.active_session_mut()?;
        if target == EditTarget::Roi {
            if key == Key::Escape && session.roi.is_dragging() {
                session.roi.cancel();
                return Ok(KeyOutcome::RoiDragCancelled);
            }
            return Ok(KeyOutcome::Ignored);
        }
        Ok(match session.drafts.handle_key(key) {
            DraftEvent::Ignored => KeyOutcome::Ignored,
            event => KeyOutcome::Draft(event),
        })
    }

    fn apply_action(&mut self, action: KeyAction) -> Result<()> {
        match action {
            KeyAction::SelectTool(tool) => {
                self.set_target(EditTarget::Prompts);
                self.active_session_mut()?.drafts.set_tool(tool);
            }
            KeyAction::ToggleRoiEditing => self.set_target(self.target.toggled()),
            KeyAction::TogglePolarity => self.active_session_mut()?.drafts.toggle_polarity(),
        }
        Ok(())
    }

    // ========================================================================
    // Masks
    // ========================================================================

    /// Apply a collection transition to the active image's masks.
    ///
    /// Returns whether the collection changed.
    pub fn update_masks(
        &mut self,
        transition: impl FnOnce(&MaskCollection) -> MaskCollection,
    ) -> Result<bool> {
        let session = self.active_session_mut()?;
        let next = transition(&session.masks);
        let changed = next.revision() != session.masks.revision();
        session.masks = next;
        Ok(changed)
    }

    /// Ids of active-image masks inside its ROI.
    pub fn masks_in_roi(&self) -> Result<Vec<MaskId>> {
        Ok(self
            .active_session()?
            .masks_in_roi(self.config.output_resolution))
    }

    // ========================================================================
    // Segmentation
    // ========================================================================

    /// Build the request for the active image and mark it in flight.
    ///
    /// Fails with [`EngineError::SubmissionInFlight`] while an earlier
    /// submission for the same image is outstanding.
    pub fn begin_submission(
        &mut self,
        mode: SegmentationMode,
        text_prompts: &[&str],
    ) -> Result<(ImageRef, SubmissionTicket, SegmentationRequest)> {
        let session = self.active_session_mut()?;
        let request = session
            .drafts
            .build_request(session.image.as_str(), mode, text_prompts);
        if !request.has_required_prompts() {
            return Err(EngineError::segmentation_failed(format!(
                "{:?} segmentation needs prompts",
                mode
            )));
        }
        let ticket = session.submission.begin(&request)?;
        Ok((session.image.clone(), ticket, request))
    }

    /// Deliver a response to the image it was submitted for.
    ///
    /// On success the masks are merged and the number added is returned. Masks
    /// from named box or polygon prompts take the prompt's name. On failure
    /// drafts and ROI are left as they were.
    pub fn complete_submission(
        &mut self,
        image: &ImageRef,
        ticket: SubmissionTicket,
        response: SegmentationResponse,
    ) -> Result<usize> {
        let options = MergeOptions::from(&self.config);
        let session = self.session_mut(image)?;
        let pending = session.submission.finish(ticket)?;
        let mut raw = match response.into_masks() {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("Segmentation for '{}' failed: {}", image, e);
                return Err(e);
            }
        };
        pending.seed_labels(&mut raw);
        let before = session.masks.len();
        session.masks = session
            .masks
            .merge(&raw, pending.mode.mask_source(), &options);
        let added = session.masks.len() - before;
        log::info!(
            "Segmentation for '{}' returned {} masks, {} kept",
            image,
            raw.len(),
            added
        );
        Ok(added)
    }

    /// Submit and wait for a blocking service.
    pub fn run_segmentation(
        &mut self,
        service: &dyn SegmentationService,
        mode: SegmentationMode,
        text_prompts: &[&str],
    ) -> Result<usize> {
        let (image, ticket, request) = self.begin_submission(mode, text_prompts)?;
        match service.segment(&request) {
            Ok(response) => self.complete_submission(&image, ticket, response),
            Err(e) => {
                self.session_mut(&image)?.submission.abandon();
                log::warn!("Segmentation call for '{}' failed: {}", image, e);
                Err(e)
            }
        }
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Export the active image's ROI and masks.
    pub fn persist(&self, sink: &mut dyn PersistenceSink) -> Result<()> {
        let session = self.active_session()?;
        let size = session.pixel_size(self.config.output_resolution);
        sink.save_roi(&session.image, &session.roi.region().to_pixel_export(size)?)?;
        sink.save_masks(&session.image, &session.masks.to_export())
    }

    /// Restore a saved image into the workspace and make it active.
    pub fn restore(&mut self, snapshot: SessionSnapshot, size: Option<ImageSize>) -> Result<()> {
        let image = snapshot.image.clone();
        self.switch_image(image.clone(), size);
        let fallback = self.config.output_resolution;
        let session = self.session_mut(&image)?;
        if let Some(roi) = &snapshot.roi {
            let region = RegionOfInterest::from_pixel_export(roi, session.pixel_size(fallback))?;
            session.roi.set_region(region);
        }
        session.masks = MaskCollection::from_export(snapshot.masks);
        Ok(())
    }
}
