/// Pointer state machine for placing the photo
///
/// The controller owns the transform and turns pointer events into
/// transform changes. It knows nothing about the windowing toolkit: the host
/// feeds it canvas-space points and carries out the returned actions.

use cgmath::Point2;
use tracing::debug;

use crate::geometry::{
    self, Corner, DrawSize, Handle, HandleSet, ResizeProjection, RotationGrab, MAX_SLIDER_SCALE,
    MIN_SCALE,
};

use super::transform::{CanvasDimensions, Transform};

/// Cursor the host should show
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorHint {
    /// Nothing loaded yet; a click opens the file picker
    Pointer,
    Move,
    /// Diagonal resize along NW-SE
    ResizeNwse,
    /// Diagonal resize along NE-SW
    ResizeNesw,
    Grab,
    Grabbing,
}

/// Side effects requested by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Open the image picker
    RequestImage,
    /// The transform changed; redraw the surfaces
    Redraw,
    SetCursor(CursorHint),
}

/// Current gesture
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InteractionState {
    Idle,
    /// Pointer minus image center at grab time
    Dragging { offset: cgmath::Vector2<f64> },
    Resizing {
        corner: Corner,
        projection: ResizeProjection,
    },
    Rotating { grab: RotationGrab },
}

#[derive(Debug, Clone)]
pub struct InteractionController {
    canvas: CanvasDimensions,
    transform: Transform,
    /// Width / height of the loaded photo
    image_aspect: Option<f64>,
    state: InteractionState,
}

impl InteractionController {
    pub fn new(canvas: CanvasDimensions) -> Self {
        Self {
            canvas,
            transform: Transform::centered(&canvas),
            image_aspect: None,
            state: InteractionState::Idle,
        }
    }

    pub fn canvas(&self) -> &CanvasDimensions {
        &self.canvas
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    pub fn has_image(&self) -> bool {
        self.image_aspect.is_some()
    }

    /// A new photo replaces the old one and starts centered
    pub fn set_image(&mut self, width: u32, height: u32) -> Vec<Action> {
        let aspect = if height == 0 {
            1.0
        } else {
            f64::from(width) / f64::from(height)
        };
        self.image_aspect = Some(aspect);
        self.state = InteractionState::Idle;
        self.transform.reset(&self.canvas);
        debug!(width, height, "image placed");
        vec![Action::Redraw, Action::SetCursor(CursorHint::Move)]
    }

    /// Size of the photo as currently drawn
    pub fn draw_size(&self) -> Option<DrawSize> {
        self.image_aspect
            .map(|aspect| geometry::current_draw_size(aspect, &self.canvas, self.transform.scale))
    }

    /// Handle positions for the current transform
    pub fn handles(&self) -> Option<HandleSet> {
        self.draw_size().map(|size| {
            geometry::handle_positions(self.transform.center(), size, self.transform.rotation_degrees)
        })
    }

    pub fn on_pointer_down(&mut self, point: Point2<f64>) -> Vec<Action> {
        let (Some(handles), Some(size)) = (self.handles(), self.draw_size()) else {
            return vec![Action::RequestImage];
        };

        let center = self.transform.center();
        self.state = match geometry::hit_test(point, &handles) {
            Some(Handle::Corner(corner)) => InteractionState::Resizing {
                corner,
                projection: ResizeProjection::begin(
                    &handles,
                    corner,
                    point,
                    size,
                    self.transform.scale,
                ),
            },
            Some(Handle::Rotate) => InteractionState::Rotating {
                grab: RotationGrab::begin(center, point, self.transform.rotation_degrees),
            },
            None => InteractionState::Dragging {
                offset: point - center,
            },
        };

        let cursor = match self.state {
            InteractionState::Resizing { corner, .. } => corner_cursor(corner),
            InteractionState::Rotating { .. } => CursorHint::Grabbing,
            _ => CursorHint::Move,
        };
        vec![Action::SetCursor(cursor)]
    }

    pub fn on_pointer_move(&mut self, point: Point2<f64>) -> Vec<Action> {
        let center = self.transform.center();
        match self.state {
            InteractionState::Idle => vec![Action::SetCursor(self.hover_cursor(point))],
            InteractionState::Dragging { offset } => {
                self.transform.move_to(point - offset);
                vec![Action::Redraw]
            }
            InteractionState::Resizing { projection, .. } => {
                self.transform.set_scale(projection.scale_at(center, point));
                vec![Action::Redraw]
            }
            InteractionState::Rotating { grab } => {
                self.transform.set_rotation(grab.rotation_at(center, point));
                vec![Action::Redraw]
            }
        }
    }

    /// Pointer released; also used for leave and cancel
    pub fn on_pointer_up(&mut self) -> Vec<Action> {
        if self.state == InteractionState::Idle {
            return Vec::new();
        }
        self.state = InteractionState::Idle;
        let cursor = if self.has_image() {
            CursorHint::Move
        } else {
            CursorHint::Pointer
        };
        vec![Action::SetCursor(cursor)]
    }

    pub fn on_pointer_leave(&mut self) -> Vec<Action> {
        self.on_pointer_up()
    }

    /// Cursor for a pointer hovering at `point` while idle
    pub fn hover_cursor(&self, point: Point2<f64>) -> CursorHint {
        let Some(handles) = self.handles() else {
            return CursorHint::Pointer;
        };
        match geometry::hit_test(point, &handles) {
            Some(Handle::Corner(corner)) => corner_cursor(corner),
            Some(Handle::Rotate) => CursorHint::Grab,
            None => CursorHint::Move,
        }
    }

    /// Slider input, clamped to the slider range
    pub fn set_scale(&mut self, scale: f64) -> Vec<Action> {
        self.transform.set_scale(scale.clamp(MIN_SCALE, MAX_SLIDER_SCALE));
        vec![Action::Redraw]
    }

    /// Slider input in degrees
    pub fn set_rotation(&mut self, degrees: f64) -> Vec<Action> {
        self.transform.set_rotation(degrees);
        vec![Action::Redraw]
    }

    /// Back to centered, unscaled and unrotated; any gesture is dropped
    pub fn reset(&mut self) -> Vec<Action> {
        self.state = InteractionState::Idle;
        self.transform.reset(&self.canvas);
        vec![Action::Redraw]
    }
}

fn corner_cursor(corner: Corner) -> CursorHint {
    match corner {
        Corner::NorthWest | Corner::SouthEast => CursorHint::ResizeNwse,
        Corner::NorthEast | Corner::SouthWest => CursorHint::ResizeNesw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded() -> InteractionController {
        let mut controller = InteractionController::new(CanvasDimensions::new(300.0, 400.0));
        controller.set_image(800, 600);
        controller
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_click_without_image_requests_one() {
        let mut controller = InteractionController::new(CanvasDimensions::default());
        let actions = controller.on_pointer_down(Point2::new(10.0, 10.0));
        assert_eq!(actions, vec![Action::RequestImage]);
        assert_eq!(*controller.state(), InteractionState::Idle);
        assert_eq!(controller.hover_cursor(Point2::new(0.0, 0.0)), CursorHint::Pointer);
    }

    #[test]
    fn test_drag_keeps_grab_offset() {
        let mut controller = loaded();
        controller.on_pointer_down(Point2::new(160.0, 210.0));
        assert!(matches!(controller.state(), InteractionState::Dragging { .. }));

        let actions = controller.on_pointer_move(Point2::new(200.0, 100.0));
        assert_eq!(actions, vec![Action::Redraw]);
        assert!(approx(controller.transform().x, 190.0));
        assert!(approx(controller.transform().y, 90.0));

        controller.on_pointer_up();
        assert_eq!(*controller.state(), InteractionState::Idle);
    }

    #[test]
    fn test_corner_drag_resizes() {
        let mut controller = loaded();
        let handles = controller.handles().unwrap();
        let se = handles.corner(Corner::SouthEast);

        controller.on_pointer_down(se);
        assert!(matches!(
            controller.state(),
            InteractionState::Resizing { corner: Corner::SouthEast, .. }
        ));

        // Push the corner outward along its diagonal by a tenth of the reference
        let size = controller.draw_size().unwrap();
        let direction = (se - handles.center) / (se - handles.center).x.hypot((se - handles.center).y);
        let target = se + direction * (size.reference() * 0.1);
        controller.on_pointer_move(target);

        assert!(approx(controller.transform().scale, 1.1));
    }

    #[test]
    fn test_rotate_handle_rotates() {
        let mut controller = loaded();
        let knob = controller.handles().unwrap().rotate;

        assert_eq!(controller.hover_cursor(knob), CursorHint::Grab);
        controller.on_pointer_down(knob);
        assert!(matches!(controller.state(), InteractionState::Rotating { .. }));

        // Quarter turn clockwise around the center
        let center = controller.transform().center();
        let radius = center.y - knob.y;
        controller.on_pointer_move(Point2::new(center.x + radius, center.y));

        assert!(approx(controller.transform().rotation_degrees, 90.0));
    }

    #[test]
    fn test_every_gesture_ends_on_leave_or_up() {
        let start_points = |controller: &InteractionController| {
            let handles = controller.handles().unwrap();
            [handles.center, handles.corner(Corner::NorthEast), handles.rotate]
        };

        for release_by_leaving in [true, false] {
            for index in 0..3 {
                let mut controller = loaded();
                let start = start_points(&controller)[index];

                controller.on_pointer_down(start);
                assert_ne!(*controller.state(), InteractionState::Idle);
                controller.on_pointer_move(start + cgmath::Vector2::new(15.0, -10.0));

                let actions = if release_by_leaving {
                    controller.on_pointer_leave()
                } else {
                    controller.on_pointer_up()
                };
                assert_eq!(actions, vec![Action::SetCursor(CursorHint::Move)]);
                assert_eq!(*controller.state(), InteractionState::Idle);

                // Later moves only update the cursor
                let settled = *controller.transform();
                let actions = controller.on_pointer_move(Point2::new(40.0, 60.0));
                assert!(matches!(actions.as_slice(), [Action::SetCursor(_)]));
                assert_eq!(*controller.transform(), settled);
            }
        }
    }

    #[test]
    fn test_hover_cursors() {
        let controller = loaded();
        let handles = controller.handles().unwrap();

        assert_eq!(controller.hover_cursor(handles.corner(Corner::NorthWest)), CursorHint::ResizeNwse);
        assert_eq!(controller.hover_cursor(handles.corner(Corner::SouthEast)), CursorHint::ResizeNwse);
        assert_eq!(controller.hover_cursor(handles.corner(Corner::NorthEast)), CursorHint::ResizeNesw);
        assert_eq!(controller.hover_cursor(handles.corner(Corner::SouthWest)), CursorHint::ResizeNesw);
        assert_eq!(controller.hover_cursor(handles.center), CursorHint::Move);
    }

    #[test]
    fn test_sliders_clamp_scale() {
        let mut controller = loaded();
        controller.set_scale(7.0);
        assert_eq!(controller.transform().scale, MAX_SLIDER_SCALE);
        controller.set_scale(0.0);
        assert_eq!(controller.transform().scale, MIN_SCALE);
        controller.set_rotation(-135.0);
        assert_eq!(controller.transform().rotation_degrees, -135.0);
    }

    #[test]
    fn test_reset_drops_gesture() {
        let mut controller = loaded();
        controller.on_pointer_down(Point2::new(150.0, 200.0));
        controller.on_pointer_move(Point2::new(20.0, 30.0));
        controller.set_rotation(33.0);

        controller.reset();

        assert_eq!(*controller.state(), InteractionState::Idle);
        assert!(controller.transform().is_default_for(controller.canvas()));
        // Moves after reset do nothing but update the cursor
        let actions = controller.on_pointer_move(Point2::new(0.0, 0.0));
        assert!(matches!(actions.as_slice(), [Action::SetCursor(_)]));
    }

    #[test]
    fn test_new_image_recenters() {
        let mut controller = loaded();
        controller.set_scale(2.0);
        controller.set_image(100, 100);
        assert!(controller.transform().is_default_for(controller.canvas()));
    }
}
