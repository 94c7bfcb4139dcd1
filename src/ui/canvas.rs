use iced::mouse::{self, Cursor};
use iced::widget::canvas::{self, Program};
use iced::{Point, Rectangle, Renderer, Theme};

use frame_studio::state::interaction::CursorHint;

use crate::Message;

/// Pointer input in canvas coordinates
#[derive(Debug, Clone, Copy)]
pub enum PointerEvent {
    Down(Point),
    Moved(Point),
    Up,
    /// Pointer left the canvas mid-gesture
    Left,
}

/// Transparent input layer stacked over the rendered surface
///
/// Drawing happens off-screen in the library; this layer only turns mouse
/// events into canvas-space pointer events and shows the requested cursor.
pub struct EditorCanvas {
    pub cursor: CursorHint,
}

impl Program<Message> for EditorCanvas {
    type State = PointerState;

    fn draw(
        &self,
        _state: &Self::State,
        _renderer: &Renderer,
        _theme: &Theme,
        _bounds: Rectangle,
        _cursor: Cursor,
    ) -> Vec<canvas::Geometry> {
        // The composite is shown by the image layer underneath
        vec![]
    }

    fn update(
        &self,
        state: &mut Self::State,
        event: canvas::Event,
        bounds: Rectangle,
        cursor: Cursor,
    ) -> (canvas::event::Status, Option<Message>) {
        let canvas::Event::Mouse(event) = event else {
            return (canvas::event::Status::Ignored, None);
        };

        match event {
            mouse::Event::ButtonPressed(mouse::Button::Left) => {
                if let Some(position) = cursor.position_in(bounds) {
                    state.pressed = true;
                    return captured(PointerEvent::Down(position));
                }
            }

            mouse::Event::ButtonReleased(mouse::Button::Left) if state.pressed => {
                state.pressed = false;
                return captured(PointerEvent::Up);
            }

            mouse::Event::CursorMoved { .. } => match cursor.position_in(bounds) {
                Some(position) => return captured(PointerEvent::Moved(position)),
                None if state.pressed => {
                    state.pressed = false;
                    return captured(PointerEvent::Left);
                }
                None => {}
            },

            mouse::Event::CursorLeft if state.pressed => {
                state.pressed = false;
                return captured(PointerEvent::Left);
            }

            _ => {}
        }

        (canvas::event::Status::Ignored, None)
    }

    fn mouse_interaction(
        &self,
        _state: &Self::State,
        bounds: Rectangle,
        cursor: Cursor,
    ) -> mouse::Interaction {
        if !cursor.is_over(bounds) {
            return mouse::Interaction::default();
        }
        match self.cursor {
            CursorHint::Pointer => mouse::Interaction::Pointer,
            CursorHint::Move | CursorHint::Grab => mouse::Interaction::Grab,
            CursorHint::Grabbing => mouse::Interaction::Grabbing,
            CursorHint::ResizeNwse | CursorHint::ResizeNesw => mouse::Interaction::Crosshair,
        }
    }
}

fn captured(event: PointerEvent) -> (canvas::event::Status, Option<Message>) {
    (canvas::event::Status::Captured, Some(Message::Pointer(event)))
}

/// Whether a gesture started on this canvas is still running
#[derive(Debug, Clone, Default)]
pub struct PointerState {
    pub pressed: bool,
}
