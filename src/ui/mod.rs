/// Desktop shell widgets
///
/// - canvas.rs: pointer input layer over the rendered surface
/// - editor(): the surface stacked under the input layer, at canvas size

pub mod canvas;

use iced::widget::{canvas as canvas_widget, column, image, text, Space, Stack};
use iced::{Alignment, Element, Length};

use frame_studio::state::interaction::CursorHint;
use frame_studio::state::transform::CanvasDimensions;

use crate::Message;

/// Shown over the placeholder until a photo is picked
pub const UPLOAD_HINT: &str = "Click to upload an image";

/// Rendered surface with the input layer on top
pub fn editor<'a>(
    surface: Option<&image::Handle>,
    dimensions: &CanvasDimensions,
    cursor: CursorHint,
    has_image: bool,
) -> Element<'a, Message> {
    let width = Length::Fixed(dimensions.width as f32);
    let height = Length::Fixed(dimensions.height as f32);

    let mut layers: Stack<'a, Message> = Stack::new().width(width).height(height);

    if let Some(handle) = surface {
        layers = layers.push(
            image(handle.clone())
                .width(width)
                .height(height)
                .content_fit(iced::ContentFit::Fill),
        );
    }

    if !has_image {
        layers = layers.push(
            column![
                Space::with_height(Length::Fixed(dimensions.height as f32 * 0.5 + 36.0)),
                text(UPLOAD_HINT)
                    .size(14)
                    .color(iced::Color::from_rgb8(0x6b, 0x72, 0x80)),
            ]
            .width(width)
            .align_x(Alignment::Center),
        );
    }

    layers
        .push(
            canvas_widget(canvas::EditorCanvas { cursor })
                .width(width)
                .height(height),
        )
        .into()
}
