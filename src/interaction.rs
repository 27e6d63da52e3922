//! Pointer interaction state machine for the region of interest.
//!
//! A pointer-down is resolved against the current region in priority order:
//! corner handles, the rotation handle, the interior, and finally empty space
//! (which starts drawing a fresh region). Moves update the live region and
//! pointer-up commits it.
//!
//! Prompt drawing has its own, independent tool selection ([`PromptTool`]);
//! the two only share the coordinate conversions in [`crate::coords`].

use crate::config::EngineConfig;
use crate::coords::inverse_rotate;
use crate::model::{Corner, Point, RegionOfInterest};

/// Prompt drawing tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PromptTool {
    /// Single click prompts
    Point,
    /// Drag to draw a box prompt
    #[default]
    Box,
    /// Click to place polygon vertices
    Polygon,
}

impl PromptTool {
    /// Get the display name for this tool.
    pub fn name(&self) -> &'static str {
        match self {
            PromptTool::Point => "Point",
            PromptTool::Box => "Box",
            PromptTool::Polygon => "Polygon",
        }
    }

    /// Get all available prompt tools.
    pub fn all() -> &'static [PromptTool] {
        &[PromptTool::Point, PromptTool::Box, PromptTool::Polygon]
    }
}

/// What a pointer-down landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoiHit {
    Corner(Corner),
    RotationHandle,
    Interior,
    Outside,
}

/// Current drag, with the state captured at pointer-down.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum RoiDragState {
    #[default]
    Idle,
    /// Drawing a new axis-aligned region from `start`
    Drawing { start: Point, current: Point },
    /// Translating; `anchor` is the pointer-down position
    Moving {
        anchor: Point,
        start: RegionOfInterest,
    },
    /// Resizing from one corner handle
    Resizing {
        handle: Corner,
        anchor: Point,
        start: RegionOfInterest,
    },
    /// Turning about the center via the rotation handle
    Rotating { start: RegionOfInterest },
}

impl RoiDragState {
    pub fn is_idle(&self) -> bool {
        matches!(self, RoiDragState::Idle)
    }
}

/// Outcome of a pointer-up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RoiRelease {
    /// No drag was in progress
    Ignored,
    /// The region was committed with these values
    Committed(RegionOfInterest),
    /// A drawn region was too small; the region was reset to the default
    Discarded,
}

/// Tolerances used by [`RoiEditor`], taken from [`EngineConfig`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoiTolerances {
    pub handle_tolerance: f32,
    pub rotation_handle_offset: f32,
    pub min_region_size: f32,
    pub min_resize_extent: f32,
    pub move_clamp: (f32, f32),
}

impl From<&EngineConfig> for RoiTolerances {
    fn from(config: &EngineConfig) -> Self {
        Self {
            handle_tolerance: config.handle_tolerance,
            rotation_handle_offset: config.rotation_handle_offset,
            min_region_size: config.min_region_size,
            min_resize_extent: config.min_resize_extent,
            move_clamp: config.move_clamp,
        }
    }
}

impl Default for RoiTolerances {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

/// Translate a region by `delta`, keeping the center inside `clamp`.
pub fn move_region(start: &RegionOfInterest, delta: Point, clamp: (f32, f32)) -> RegionOfInterest {
    let (lo, hi) = clamp;
    RegionOfInterest {
        center_x: (start.center_x + delta.x).clamp(lo, hi),
        center_y: (start.center_y + delta.y).clamp(lo, hi),
        ..*start
    }
}

/// Resize a region from a corner handle about its fixed center.
///
/// `local_delta` is the pointer delta in the region's unrotated frame. Left
/// handles (0, 3) shrink the width on positive x, top handles (0, 1) shrink
/// the height on positive y; the opposite handles grow. Both extents change by
/// twice the delta since the center stays put.
pub fn resize_region(
    start: &RegionOfInterest,
    handle: Corner,
    local_delta: Point,
    min_extent: f32,
) -> RegionOfInterest {
    let dx = match handle {
        Corner::TopLeft | Corner::BottomLeft => -local_delta.x,
        Corner::TopRight | Corner::BottomRight => local_delta.x,
    };
    let dy = match handle {
        Corner::TopLeft | Corner::TopRight => -local_delta.y,
        Corner::BottomRight | Corner::BottomLeft => local_delta.y,
    };
    RegionOfInterest {
        width: (start.width + 2.0 * dx).max(min_extent),
        height: (start.height + 2.0 * dy).max(min_extent),
        ..*start
    }
}

/// Rotation that points the region's top edge at `pointer`, in degrees.
pub fn rotation_towards(center: Point, pointer: Point) -> f32 {
    (pointer.x - center.x).atan2(-(pointer.y - center.y)).to_degrees()
}

/// Edits a single region of interest from pointer events in normalized space.
#[derive(Debug, Clone)]
pub struct RoiEditor {
    region: RegionOfInterest,
    state: RoiDragState,
    tolerances: RoiTolerances,
}

impl Default for RoiEditor {
    fn default() -> Self {
        Self::new(RoiTolerances::default())
    }
}

impl RoiEditor {
    /// Editor holding the default centered region.
    pub fn new(tolerances: RoiTolerances) -> Self {
        Self::with_region(RegionOfInterest::default(), tolerances)
    }

    pub fn with_region(region: RegionOfInterest, tolerances: RoiTolerances) -> Self {
        Self {
            region,
            state: RoiDragState::Idle,
            tolerances,
        }
    }

    /// The committed (or live, while dragging) region.
    pub fn region(&self) -> &RegionOfInterest {
        &self.region
    }

    pub fn state(&self) -> &RoiDragState {
        &self.state
    }

    pub fn is_dragging(&self) -> bool {
        !self.state.is_idle()
    }

    /// Region to render: the in-progress rectangle while drawing, else the region.
    pub fn preview(&self) -> RegionOfInterest {
        match self.state {
            RoiDragState::Drawing { start, current } => RegionOfInterest::from_bounds(start, current),
            _ => self.region,
        }
    }

    /// Replace the region outright, abandoning any drag.
    pub fn set_region(&mut self, region: RegionOfInterest) {
        self.region = region;
        self.state = RoiDragState::Idle;
    }

    /// Reset to the default centered region.
    pub fn reset(&mut self) {
        self.set_region(RegionOfInterest::default());
    }

    /// Resolve what a pointer at `p` would grab, without changing state.
    pub fn hit_test(&self, p: Point) -> RoiHit {
        let tol = self.tolerances.handle_tolerance;
        let nearest_corner = Corner::ALL
            .iter()
            .map(|&c| (c, self.region.corner(c).distance_to(&p)))
            .filter(|(_, d)| *d <= tol)
            .min_by(|a, b| a.1.total_cmp(&b.1));
        if let Some((corner, _)) = nearest_corner {
            return RoiHit::Corner(corner);
        }

        let handle = self
            .region
            .rotation_handle_position(self.tolerances.rotation_handle_offset);
        if handle.distance_to(&p) <= tol {
            return RoiHit::RotationHandle;
        }

        if self.region.contains(p) {
            RoiHit::Interior
        } else {
            RoiHit::Outside
        }
    }

    /// Begin a drag at `p`.
    pub fn pointer_down(&mut self, p: Point) -> RoiHit {
        let hit = self.hit_test(p);
        self.state = match hit {
            RoiHit::Corner(handle) => RoiDragState::Resizing {
                handle,
                anchor: p,
                start: self.region,
            },
            RoiHit::RotationHandle => RoiDragState::Rotating { start: self.region },
            RoiHit::Interior => RoiDragState::Moving {
                anchor: p,
                start: self.region,
            },
            RoiHit::Outside => RoiDragState::Drawing {
                start: p,
                current: p,
            },
        };
        log::trace!("ROI pointer down at ({:.3}, {:.3}): {:?}", p.x, p.y, hit);
        hit
    }

    /// Continue the drag. Returns whether anything changed.
    pub fn pointer_move(&mut self, p: Point) -> bool {
        match &mut self.state {
            RoiDragState::Idle => false,
            RoiDragState::Drawing { current, .. } => {
                *current = p;
                true
            }
            RoiDragState::Moving { anchor, start } => {
                self.region = move_region(start, p.delta_from(anchor), self.tolerances.move_clamp);
                true
            }
            RoiDragState::Resizing {
                handle,
                anchor,
                start,
            } => {
                let local = inverse_rotate(p.delta_from(anchor), start.rotation_degrees);
                self.region =
                    resize_region(start, *handle, local, self.tolerances.min_resize_extent);
                true
            }
            RoiDragState::Rotating { .. } => {
                self.region.rotation_degrees = rotation_towards(self.region.center(), p);
                true
            }
        }
    }

    /// Finish the drag and return to idle.
    pub fn pointer_up(&mut self) -> RoiRelease {
        let state = std::mem::take(&mut self.state);
        match state {
            RoiDragState::Idle => RoiRelease::Ignored,
            RoiDragState::Drawing { start, current } => {
                let drawn = RegionOfInterest::from_bounds(start, current);
                let min = self.tolerances.min_region_size;
                if drawn.width > min && drawn.height > min {
                    self.region = drawn;
                    log::debug!(
                        "ROI drawn: center ({:.3}, {:.3}) size {:.3}x{:.3}",
                        drawn.center_x,
                        drawn.center_y,
                        drawn.width,
                        drawn.height
                    );
                    RoiRelease::Committed(drawn)
                } else {
                    log::debug!("Discarding degenerate ROI draw; resetting to default region");
                    self.region = RegionOfInterest::default();
                    RoiRelease::Discarded
                }
            }
            RoiDragState::Moving { .. }
            | RoiDragState::Resizing { .. }
            | RoiDragState::Rotating { .. } => RoiRelease::Committed(self.region),
        }
    }

    /// Abandon the drag, restoring the region from before it started.
    pub fn cancel(&mut self) {
        match std::mem::take(&mut self.state) {
            RoiDragState::Moving { start, .. }
            | RoiDragState::Resizing { start, .. }
            | RoiDragState::Rotating { start } => {
                self.region = start;
            }
            RoiDragState::Idle | RoiDragState::Drawing { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-5;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    fn editor_at(roi: RegionOfInterest) -> RoiEditor {
        RoiEditor::with_region(roi, RoiTolerances::default())
    }

    #[test]
    fn test_hit_priority() {
        let editor = editor_at(RegionOfInterest::new(0.5, 0.5, 0.4, 0.4, 0.0));
        assert_eq!(editor.hit_test(Point::new(0.3, 0.3)), RoiHit::Corner(Corner::TopLeft));
        assert_eq!(
            editor.hit_test(Point::new(0.71, 0.69)),
            RoiHit::Corner(Corner::BottomRight)
        );
        assert_eq!(editor.hit_test(Point::new(0.5, 0.26)), RoiHit::RotationHandle);
        assert_eq!(editor.hit_test(Point::new(0.5, 0.5)), RoiHit::Interior);
        assert_eq!(editor.hit_test(Point::new(0.05, 0.05)), RoiHit::Outside);
    }

    #[test]
    fn test_corner_beats_interior() {
        // Just inside the corner is still a handle grab.
        let editor = editor_at(RegionOfInterest::new(0.5, 0.5, 0.4, 0.4, 0.0));
        assert_eq!(
            editor.hit_test(Point::new(0.31, 0.31)),
            RoiHit::Corner(Corner::TopLeft)
        );
    }

    #[test]
    fn test_drag_resize_top_left_shrinks() {
        let mut editor = editor_at(RegionOfInterest::new(0.5, 0.5, 0.4, 0.4, 0.0));
        assert_eq!(
            editor.pointer_down(Point::new(0.3, 0.3)),
            RoiHit::Corner(Corner::TopLeft)
        );
        editor.pointer_move(Point::new(0.35, 0.35));
        let roi = *editor.region();
        assert!(approx_eq(roi.width, 0.3));
        assert!(approx_eq(roi.height, 0.3));
        assert!(approx_eq(roi.center_x, 0.5));
        assert!(approx_eq(roi.center_y, 0.5));
        assert!(matches!(editor.pointer_up(), RoiRelease::Committed(_)));
        assert!(!editor.is_dragging());
    }

    #[test]
    fn test_resize_opposite_corner_grows() {
        let start = RegionOfInterest::new(0.5, 0.5, 0.4, 0.4, 0.0);
        let roi = resize_region(&start, Corner::BottomRight, Point::new(0.05, 0.05), 0.05);
        assert!(approx_eq(roi.width, 0.5));
        assert!(approx_eq(roi.height, 0.5));

        let roi = resize_region(&start, Corner::TopRight, Point::new(0.05, 0.05), 0.05);
        assert!(approx_eq(roi.width, 0.5));
        assert!(approx_eq(roi.height, 0.3));
    }

    #[test]
    fn test_resize_enforces_floor() {
        let start = RegionOfInterest::new(0.5, 0.5, 0.2, 0.2, 0.0);
        let roi = resize_region(&start, Corner::TopLeft, Point::new(0.5, 0.5), 0.05);
        assert!(approx_eq(roi.width, 0.05));
        assert!(approx_eq(roi.height, 0.05));
    }

    #[test]
    fn test_resize_uses_local_frame() {
        // Rotated a quarter turn, a global +y drag is a local +x drag.
        let mut editor = editor_at(RegionOfInterest::new(0.5, 0.5, 0.4, 0.2, 90.0));
        let corner = editor.region().corner(Corner::BottomRight);
        assert_eq!(
            editor.pointer_down(corner),
            RoiHit::Corner(Corner::BottomRight)
        );
        editor.pointer_move(Point::new(corner.x, corner.y + 0.05));
        assert!(approx_eq(editor.region().width, 0.5));
        assert!(approx_eq(editor.region().height, 0.2));
    }

    #[test]
    fn test_rotation_handle_drag() {
        let mut editor = editor_at(RegionOfInterest::new(0.5, 0.5, 0.4, 0.4, 0.0));
        assert_eq!(
            editor.pointer_down(Point::new(0.5, 0.26)),
            RoiHit::RotationHandle
        );
        editor.pointer_move(Point::new(0.6, 0.5));
        assert!((editor.region().rotation_degrees - 90.0).abs() < 1e-3);

        editor.pointer_move(Point::new(0.4, 0.5));
        assert!((editor.region().rotation_degrees + 90.0).abs() < 1e-3);
        editor.pointer_up();
    }

    #[test]
    fn test_move_is_clamped() {
        let mut editor = editor_at(RegionOfInterest::new(0.5, 0.5, 0.2, 0.2, 30.0));
        assert_eq!(editor.pointer_down(Point::new(0.5, 0.5)), RoiHit::Interior);
        editor.pointer_move(Point::new(0.6, 0.45));
        assert!(approx_eq(editor.region().center_x, 0.6));
        assert!(approx_eq(editor.region().center_y, 0.45));

        editor.pointer_move(Point::new(1.0, -0.2));
        assert!(approx_eq(editor.region().center_x, 0.9));
        assert!(approx_eq(editor.region().center_y, 0.1));
        assert!(approx_eq(editor.region().rotation_degrees, 30.0));
    }

    #[test]
    fn test_draw_new_region() {
        let mut editor = editor_at(RegionOfInterest::new(0.5, 0.5, 0.2, 0.2, 45.0));
        assert_eq!(editor.pointer_down(Point::new(0.9, 0.9)), RoiHit::Outside);
        editor.pointer_move(Point::new(0.7, 0.8));
        let preview = editor.preview();
        assert!(approx_eq(preview.width, 0.2));
        assert!(approx_eq(preview.height, 0.1));

        match editor.pointer_up() {
            RoiRelease::Committed(roi) => {
                assert!(approx_eq(roi.center_x, 0.8));
                assert!(approx_eq(roi.center_y, 0.85));
                assert_eq!(roi.rotation_degrees, 0.0);
            }
            other => panic!("Expected commit, got {:?}", other),
        }
    }

    #[test]
    fn test_degenerate_draw_resets_to_default() {
        let mut editor = editor_at(RegionOfInterest::new(0.3, 0.3, 0.1, 0.1, 0.0));
        editor.pointer_down(Point::new(0.9, 0.9));
        editor.pointer_move(Point::new(0.905, 0.6));
        assert_eq!(editor.pointer_up(), RoiRelease::Discarded);
        assert_eq!(*editor.region(), RegionOfInterest::default());
    }

    #[test]
    fn test_pointer_up_when_idle_is_ignored() {
        let mut editor = RoiEditor::default();
        assert_eq!(editor.pointer_up(), RoiRelease::Ignored);
        assert!(!editor.pointer_move(Point::new(0.1, 0.1)));
    }

    #[test]
    fn test_cancel_restores_start() {
        let start = RegionOfInterest::new(0.5, 0.5, 0.4, 0.4, 0.0);
        let mut editor = editor_at(start);
        editor.pointer_down(Point::new(0.5, 0.5));
        editor.pointer_move(Point::new(0.6, 0.6));
        editor.cancel();
        assert_eq!(*editor.region(), start);
    }

    #[test]
    fn test_cancel_restores_rotation() {
        let start = RegionOfInterest::new(0.5, 0.5, 0.4, 0.4, 0.0);
        let mut editor = editor_at(start);
        assert_eq!(
            editor.pointer_down(Point::new(0.5, 0.26)),
            RoiHit::RotationHandle
        );
        editor.pointer_move(Point::new(0.6, 0.5));
        assert!((editor.region().rotation_degrees - 90.0).abs() < 1e-3);

        editor.cancel();
        assert_eq!(*editor.region(), start);
        assert!(editor.state().is_idle());
    }
}
