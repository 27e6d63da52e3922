//! Annotation draft manager.
//!
//! Accumulates box, polygon, and point prompts (in image pixels) before they
//! are submitted to the segmentation service. Box drags that are too short,
//! polygons with fewer than three vertices, and boxes whose naming prompt is
//! cancelled are dropped silently.

use crate::config::EngineConfig;
use crate::interaction::PromptTool;
use crate::keybindings::Key;
use crate::model::{BoxPrompt, Point, PointPrompt, Polarity, PolygonPrompt, PromptId};
use crate::segmentation::{SegmentationMode, SegmentationRequest};

/// Name given to a box when the operator accepts the generic one.
pub const GENERIC_BOX_NAME: &str = "object";

/// Tolerances used by [`DraftManager`], taken from [`EngineConfig`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DraftTolerances {
    pub min_box_side_px: f32,
    pub point_removal_radius_px: f32,
}

impl From<&EngineConfig> for DraftTolerances {
    fn from(config: &EngineConfig) -> Self {
        Self {
            min_box_side_px: config.min_box_side_px,
            point_removal_radius_px: config.point_removal_radius_px,
        }
    }
}

impl Default for DraftTolerances {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

/// State of the current box gesture.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DraftState {
    #[default]
    Idle,
    /// Dragging out a new box
    DrawingBox { start: Point, current: Point },
    /// Dragging an existing box; `original` restores it on cancel
    MovingBox {
        id: PromptId,
        anchor: Point,
        original: BoxPrompt,
    },
    /// A box was drawn and waits for the operator to name it
    AwaitingName { pending: BoxPrompt },
}

/// What a draft operation did, for the host to react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftEvent {
    /// Nothing happened
    Ignored,
    BoxStarted,
    BoxGrabbed(PromptId),
    BoxMoved(PromptId),
    /// A box is waiting in [`DraftState::AwaitingName`]; show the naming prompt
    NameRequested(PromptId),
    BoxCommitted(PromptId),
    BoxDiscarded,
    /// A box drag or move was abandoned
    GestureCancelled,
    PointAdded(PromptId),
    VertexAdded(usize),
    VertexRemoved(usize),
    PolygonCommitted(PromptId),
    PolygonDiscarded,
    PromptDeleted(PromptId),
}

/// Accumulates prompts for one image.
#[derive(Debug, Clone, Default)]
pub struct DraftManager {
    tool: PromptTool,
    polarity: Polarity,
    boxes: Vec<BoxPrompt>,
    polygons: Vec<PolygonPrompt>,
    points: Vec<PointPrompt>,
    polygon_draft: Vec<Point>,
    state: DraftState,
    selected_box: Option<PromptId>,
    next_id: PromptId,
    tolerances: DraftTolerances,
}

impl DraftManager {
    pub fn new(tolerances: DraftTolerances) -> Self {
        Self {
            tolerances,
            next_id: 1,
            ..Default::default()
        }
    }

    fn allocate_id(&mut self) -> PromptId {
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        id
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn tool(&self) -> PromptTool {
        self.tool
    }

    /// Polarity given to newly created prompts.
    pub fn polarity(&self) -> Polarity {
        self.polarity
    }

    pub fn boxes(&self) -> &[BoxPrompt] {
        &self.boxes
    }

    pub fn polygons(&self) -> &[PolygonPrompt] {
        &self.polygons
    }

    pub fn points(&self) -> &[PointPrompt] {
        &self.points
    }

    /// Vertices of the polygon currently being placed.
    pub fn polygon_draft(&self) -> &[Point] {
        &self.polygon_draft
    }

    pub fn state(&self) -> &DraftState {
        &self.state
    }

    pub fn selected_box(&self) -> Option<PromptId> {
        self.selected_box
    }

    /// The box waiting for a name, if any.
    pub fn pending_box(&self) -> Option<&BoxPrompt> {
        match &self.state {
            DraftState::AwaitingName { pending } => Some(pending),
            _ => None,
        }
    }

    /// Whether any committed prompt exists.
    pub fn has_prompts(&self) -> bool {
        !(self.boxes.is_empty() && self.polygons.is_empty() && self.points.is_empty())
    }

    pub fn box_by_id(&self, id: PromptId) -> Option<&BoxPrompt> {
        self.boxes.iter().find(|b| b.id == id)
    }

    /// Segmentation request for the committed prompts.
    pub fn build_request(
        &self,
        image_ref: impl Into<String>,
        mode: SegmentationMode,
        text_prompts: &[&str],
    ) -> SegmentationRequest {
        SegmentationRequest::from_drafts(image_ref, mode, text_prompts, self)
    }

    // ========================================================================
    // Tool and polarity
    // ========================================================================

    /// Switch tools, abandoning any gesture in progress.
    pub fn set_tool(&mut self, tool: PromptTool) {
        if self.tool != tool {
            self.cancel_gesture();
            self.polygon_draft.clear();
            self.tool = tool;
        }
    }

    pub fn set_polarity(&mut self, polarity: Polarity) {
        self.polarity = polarity;
    }

    pub fn toggle_polarity(&mut self) {
        self.polarity = self.polarity.toggled();
    }

    // ========================================================================
    // Pointer events
    // ========================================================================

    /// Handle a pointer press at pixel position `p`.
    pub fn pointer_down(&mut self, p: Point) -> DraftEvent {
        if matches!(self.state, DraftState::AwaitingName { .. }) {
            return DraftEvent::Ignored;
        }
        match self.tool {
            PromptTool::Box => self.begin_box_gesture(p),
            PromptTool::Point => self.add_point(p),
            PromptTool::Polygon => self.polygon_click(p),
        }
    }

    fn begin_box_gesture(&mut self, p: Point) -> DraftEvent {
        // Topmost (most recently added) box wins.
        let hit = self.boxes.iter().rev().find(|b| b.contains(&p)).cloned();
        match hit {
            Some(original) => {
                let id = original.id;
                self.selected_box = Some(id);
                self.state = DraftState::MovingBox {
                    id,
                    anchor: p,
                    original,
                };
                DraftEvent::BoxGrabbed(id)
            }
            None => {
                self.selected_box = None;
                self.state = DraftState::DrawingBox {
                    start: p,
                    current: p,
                };
                DraftEvent::BoxStarted
            }
        }
    }

    fn add_point(&mut self, p: Point) -> DraftEvent {
        let id = self.allocate_id();
        self.points.push(PointPrompt {
            id,
            position: p,
            polarity: self.polarity,
        });
        DraftEvent::PointAdded(id)
    }

    fn polygon_click(&mut self, p: Point) -> DraftEvent {
        let radius = self.tolerances.point_removal_radius_px;
        let nearby = self
            .polygon_draft
            .iter()
            .position(|v| v.distance_to(&p) < radius);
        match nearby {
            Some(index) => {
                self.polygon_draft.remove(index);
                DraftEvent::VertexRemoved(index)
            }
            None => {
                self.polygon_draft.push(p);
                DraftEvent::VertexAdded(self.polygon_draft.len() - 1)
            }
        }
    }

    /// Handle pointer motion. Returns whether anything changed.
    pub fn pointer_move(&mut self, p: Point) -> bool {
        match &mut self.state {
            DraftState::DrawingBox { current, .. } => {
                *current = p;
                true
            }
            DraftState::MovingBox {
                id,
                anchor,
                original,
            } => {
                let moved = original.translated(p.delta_from(anchor));
                if let Some(b) = self.boxes.iter_mut().find(|b| b.id == *id) {
                    *b = moved;
                }
                true
            }
            DraftState::Idle | DraftState::AwaitingName { .. } => false,
        }
    }

    /// Handle a pointer release.
    pub fn pointer_up(&mut self) -> DraftEvent {
        match std::mem::take(&mut self.state) {
            DraftState::DrawingBox { start, current } => {
                let id = self.allocate_id();
                match BoxPrompt::from_drag(
                    id,
                    start,
                    current,
                    self.polarity,
                    self.tolerances.min_box_side_px,
                ) {
                    Some(pending) => {
                        self.state = DraftState::AwaitingName { pending };
                        DraftEvent::NameRequested(id)
                    }
                    None => {
                        log::debug!("Box prompt below minimum side length; discarded");
                        DraftEvent::BoxDiscarded
                    }
                }
            }
            DraftState::MovingBox { id, .. } => DraftEvent::BoxMoved(id),
            state @ DraftState::AwaitingName { .. } => {
                self.state = state;
                DraftEvent::Ignored
            }
            DraftState::Idle => DraftEvent::Ignored,
        }
    }

    /// Abandon the current box gesture. A box being moved returns to its
    /// original position; a box waiting for a name is discarded.
    pub fn cancel_gesture(&mut self) {
        if let DraftState::MovingBox { id, original, .. } = std::mem::take(&mut self.state) {
            if let Some(b) = self.boxes.iter_mut().find(|b| b.id == id) {
                *b = original;
            }
        }
    }

    // ========================================================================
    // Box naming
    // ========================================================================

    /// Commit the pending box. A blank or missing name accepts the generic one.
    pub fn confirm_name(&mut self, name: Option<&str>) -> Option<PromptId> {
        let DraftState::AwaitingName { mut pending } = std::mem::take(&mut self.state) else {
            return None;
        };
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(GENERIC_BOX_NAME);
        pending.name = Some(name.to_string());
        let id = pending.id;
        log::debug!("Committed box prompt {} '{}' {:?}", id, name, pending.coords);
        self.boxes.push(pending);
        self.selected_box = Some(id);
        Some(id)
    }

    /// Cancel the naming prompt, discarding the pending box.
    pub fn cancel_name(&mut self) -> bool {
        if matches!(self.state, DraftState::AwaitingName { .. }) {
            self.state = DraftState::Idle;
            log::debug!("Box naming cancelled; box discarded");
            true
        } else {
            false
        }
    }

    // ========================================================================
    // Polygon drafting
    // ========================================================================

    /// Close the draft into a polygon prompt. Needs at least three vertices.
    pub fn commit_polygon(&mut self) -> Option<PromptId> {
        if self.polygon_draft.len() < crate::constants::MIN_POLYGON_VERTICES {
            log::debug!(
                "Polygon draft has {} vertices; not committed",
                self.polygon_draft.len()
            );
            return None;
        }
        let id = self.allocate_id();
        let points = std::mem::take(&mut self.polygon_draft);
        let polygon = PolygonPrompt::close(id, points, self.polarity)?;
        self.polygons.push(polygon);
        Some(id)
    }

    pub fn discard_polygon(&mut self) -> bool {
        let had_draft = !self.polygon_draft.is_empty();
        self.polygon_draft.clear();
        had_draft
    }

    pub fn remove_last_vertex(&mut self) -> Option<Point> {
        self.polygon_draft.pop()
    }

    // ========================================================================
    // Keyboard
    // ========================================================================

    /// Handle an editing key. Returns what happened.
    pub fn handle_key(&mut self, key: Key) -> DraftEvent {
        match key {
            Key::Escape => {
                if self.pending_box().is_some() {
                    self.cancel_name();
                    DraftEvent::BoxDiscarded
                } else if !self.state_is_idle() {
                    self.cancel_gesture();
                    DraftEvent::GestureCancelled
                } else if self.discard_polygon() {
                    DraftEvent::PolygonDiscarded
                } else {
                    DraftEvent::Ignored
                }
            }
            Key::Enter => {
                if self.pending_box().is_some() {
                    self.confirm_name(None)
                        .map(DraftEvent::BoxCommitted)
                        .unwrap_or(DraftEvent::Ignored)
                } else if self.tool == PromptTool::Polygon {
                    self.commit_polygon()
                        .map(DraftEvent::PolygonCommitted)
                        .unwrap_or(DraftEvent::Ignored)
                } else {
                    DraftEvent::Ignored
                }
            }
            Key::Backspace if !self.polygon_draft.is_empty() => {
                self.remove_last_vertex();
                DraftEvent::VertexRemoved(self.polygon_draft.len())
            }
            Key::Backspace | Key::Delete => match self.selected_box {
                Some(id) if self.state_is_idle() => {
                    self.remove_box(id);
                    DraftEvent::PromptDeleted(id)
                }
                _ => DraftEvent::Ignored,
            },
            Key::Char(_) => DraftEvent::Ignored,
        }
    }

    fn state_is_idle(&self) -> bool {
        matches!(self.state, DraftState::Idle)
    }

    // ========================================================================
    // Editing committed prompts
    // ========================================================================

    /// Set the polarity of any prompt by id.
    pub fn set_prompt_polarity(&mut self, id: PromptId, polarity: Polarity) -> bool {
        if let Some(b) = self.boxes.iter_mut().find(|b| b.id == id) {
            b.polarity = polarity;
        } else if let Some(p) = self.polygons.iter_mut().find(|p| p.id == id) {
            p.polarity = polarity;
        } else if let Some(p) = self.points.iter_mut().find(|p| p.id == id) {
            p.polarity = polarity;
        } else {
            return false;
        }
        true
    }

    /// Rename a box or polygon prompt. A blank name clears it.
    pub fn rename_prompt(&mut self, id: PromptId, name: &str) -> bool {
        let name = Some(name.trim().to_string()).filter(|n| !n.is_empty());
        if let Some(b) = self.boxes.iter_mut().find(|b| b.id == id) {
            b.name = name;
        } else if let Some(p) = self.polygons.iter_mut().find(|p| p.id == id) {
            p.name = name;
        } else {
            return false;
        }
        true
    }

    pub fn remove_box(&mut self, id: PromptId) -> bool {
        let before = self.boxes.len();
        self.boxes.retain(|b| b.id != id);
        if self.selected_box == Some(id) {
            self.selected_box = None;
        }
        self.boxes.len() != before
    }

    pub fn remove_polygon(&mut self, id: PromptId) -> bool {
        let before = self.polygons.len();
        self.polygons.retain(|p| p.id != id);
        self.polygons.len() != before
    }

    pub fn remove_point(&mut self, id: PromptId) -> bool {
        let before = self.points.len();
        self.points.retain(|p| p.id != id);
        self.points.len() != before
    }

    /// Remove every prompt and any gesture in progress.
    pub fn clear(&mut self) {
        self.boxes.clear();
        self.polygons.clear();
        self.points.clear();
        self.polygon_draft.clear();
        self.state = DraftState::Idle;
        self.selected_box = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(tool: PromptTool) -> DraftManager {
        let mut m = DraftManager::new(DraftTolerances::default());
        m.set_tool(tool);
        m
    }

    fn draw_box(m: &mut DraftManager, a: Point, b: Point) -> DraftEvent {
        m.pointer_down(a);
        m.pointer_move(b);
        m.pointer_up()
    }

    #[test]
    fn test_box_commit_after_naming() {
        let mut m = manager(PromptTool::Box);
        let event = draw_box(&mut m, Point::new(10.0, 10.0), Point::new(60.0, 40.0));
        let DraftEvent::NameRequested(id) = event else {
            panic!("Expected naming prompt, got {:?}", event);
        };
        assert!(m.boxes().is_empty());
        assert_eq!(m.pending_box().map(|b| b.coords), Some([10.0, 10.0, 60.0, 40.0]));

        assert_eq!(m.confirm_name(Some("  boss stone ")), Some(id));
        assert_eq!(m.boxes().len(), 1);
        assert_eq!(m.boxes()[0].name.as_deref(), Some("boss stone"));
        assert_eq!(m.boxes()[0].polarity, Polarity::Positive);
    }

    #[test]
    fn test_box_generic_name() {
        let mut m = manager(PromptTool::Box);
        draw_box(&mut m, Point::new(0.0, 0.0), Point::new(20.0, 20.0));
        m.confirm_name(Some("   "));
        assert_eq!(m.boxes()[0].name.as_deref(), Some(GENERIC_BOX_NAME));
    }

    #[test]
    fn test_cancel_name_discards_box() {
        let mut m = manager(PromptTool::Box);
        draw_box(&mut m, Point::new(0.0, 0.0), Point::new(20.0, 20.0));
        assert!(m.cancel_name());
        assert!(m.boxes().is_empty());
        assert_eq!(*m.state(), DraftState::Idle);
    }

    #[test]
    fn test_small_box_discarded() {
        let mut m = manager(PromptTool::Box);
        let event = draw_box(&mut m, Point::new(0.0, 0.0), Point::new(9.0, 50.0));
        assert_eq!(event, DraftEvent::BoxDiscarded);
        assert!(m.pending_box().is_none());
    }

    #[test]
    fn test_drag_existing_box_moves_it() {
        let mut m = manager(PromptTool::Box);
        draw_box(&mut m, Point::new(0.0, 0.0), Point::new(20.0, 20.0));
        let id = m.confirm_name(None).unwrap();

        assert_eq!(m.pointer_down(Point::new(10.0, 10.0)), DraftEvent::BoxGrabbed(id));
        m.pointer_move(Point::new(15.0, 30.0));
        assert_eq!(m.pointer_up(), DraftEvent::BoxMoved(id));
        assert_eq!(m.boxes()[0].coords, [5.0, 20.0, 25.0, 40.0]);
        assert_eq!(m.boxes().len(), 1);
    }

    #[test]
    fn test_cancel_move_restores_box() {
        let mut m = manager(PromptTool::Box);
        draw_box(&mut m, Point::new(0.0, 0.0), Point::new(20.0, 20.0));
        m.confirm_name(None);
        m.pointer_down(Point::new(10.0, 10.0));
        m.pointer_move(Point::new(50.0, 50.0));
        m.handle_key(Key::Escape);
        assert_eq!(m.boxes()[0].coords, [0.0, 0.0, 20.0, 20.0]);
    }

    #[test]
    fn test_delete_selected_box() {
        let mut m = manager(PromptTool::Box);
        draw_box(&mut m, Point::new(0.0, 0.0), Point::new(20.0, 20.0));
        let id = m.confirm_name(None).unwrap();
        assert_eq!(m.handle_key(Key::Delete), DraftEvent::PromptDeleted(id));
        assert!(m.boxes().is_empty());
        assert_eq!(m.handle_key(Key::Delete), DraftEvent::Ignored);
    }

    #[test]
    fn test_polygon_click_adds_and_removes() {
        let mut m = manager(PromptTool::Polygon);
        m.pointer_down(Point::new(0.0, 0.0));
        m.pointer_down(Point::new(100.0, 0.0));
        assert_eq!(
            m.pointer_down(Point::new(105.0, 5.0)),
            DraftEvent::VertexRemoved(1)
        );
        assert_eq!(m.polygon_draft(), &[Point::new(0.0, 0.0)]);
        // Exactly at the radius is far enough to add.
        assert_eq!(m.pointer_down(Point::new(15.0, 0.0)), DraftEvent::VertexAdded(1));
    }

    #[test]
    fn test_polygon_enter_requires_three_points() {
        let mut m = manager(PromptTool::Polygon);
        m.pointer_down(Point::new(0.0, 0.0));
        m.pointer_down(Point::new(100.0, 0.0));
        assert_eq!(m.handle_key(Key::Enter), DraftEvent::Ignored);
        assert_eq!(m.polygon_draft().len(), 2);

        m.pointer_down(Point::new(50.0, 80.0));
        let event = m.handle_key(Key::Enter);
        assert!(matches!(event, DraftEvent::PolygonCommitted(_)));
        assert_eq!(m.polygons().len(), 1);
        assert!(m.polygons()[0].closed);
        assert!(m.polygon_draft().is_empty());
    }

    #[test]
    fn test_polygon_backspace_and_escape() {
        let mut m = manager(PromptTool::Polygon);
        m.pointer_down(Point::new(0.0, 0.0));
        m.pointer_down(Point::new(100.0, 0.0));
        m.handle_key(Key::Backspace);
        assert_eq!(m.polygon_draft().len(), 1);
        assert_eq!(m.handle_key(Key::Escape), DraftEvent::PolygonDiscarded);
        assert!(m.polygon_draft().is_empty());
    }

    #[test]
    fn test_points_carry_polarity() {
        let mut m = manager(PromptTool::Point);
        m.pointer_down(Point::new(5.0, 5.0));
        m.toggle_polarity();
        m.pointer_down(Point::new(6.0, 6.0));
        assert_eq!(m.points().len(), 2);
        assert_eq!(m.points()[0].polarity, Polarity::Positive);
        assert_eq!(m.points()[1].polarity, Polarity::Negative);
    }

    #[test]
    fn test_edit_prompts() {
        let mut m = manager(PromptTool::Box);
        draw_box(&mut m, Point::new(0.0, 0.0), Point::new(20.0, 20.0));
        let id = m.confirm_name(Some("rib")).unwrap();
        assert!(m.set_prompt_polarity(id, Polarity::Negative));
        assert!(m.rename_prompt(id, "boss"));
        assert_eq!(m.box_by_id(id).unwrap().polarity, Polarity::Negative);
        assert_eq!(m.box_by_id(id).unwrap().name.as_deref(), Some("boss"));
        assert!(!m.rename_prompt(999, "x"));
    }

    #[test]
    fn test_switching_tool_drops_polygon_draft() {
        let mut m = manager(PromptTool::Polygon);
        m.pointer_down(Point::new(0.0, 0.0));
        m.set_tool(PromptTool::Box);
        assert!(m.polygon_draft().is_empty());
    }

    #[test]
    fn test_prompt_ids_are_unique() {
        let mut m = manager(PromptTool::Point);
        m.pointer_down(Point::new(1.0, 1.0));
        m.set_tool(PromptTool::Box);
        draw_box(&mut m, Point::new(0.0, 0.0), Point::new(20.0, 20.0));
        let box_id = m.confirm_name(None).unwrap();
        assert_ne!(m.points()[0].id, box_id);
    }
}
