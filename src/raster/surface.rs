/// Surface rendering.
///
/// Two surfaces share one image transform:
/// - the composite: white, then the photo, then the frame stretched over the
///   canvas, then (while editing) the handle overlay
/// - the content-only surface: the photo alone on transparency
///
/// Both are drawn at `pixel_ratio` device pixels per canvas pixel.

use tiny_skia::{
    BlendMode, Color, FillRule, FilterQuality, Paint, PathBuilder, Pixmap, PixmapPaint, Rect,
    Stroke, StrokeDash, Transform as SkTransform,
};

use crate::geometry::{self, HandleSet, HANDLE_DRAW_SIZE, ROTATE_HANDLE_RADIUS};
use crate::state::transform::{CanvasDimensions, Transform};
use crate::{Result, StudioError};

const HANDLE_COLOR: [u8; 3] = [0x25, 0x63, 0xeb];
const ROTATE_COLOR: [u8; 3] = [0xf5, 0x9e, 0x0b];
const PLACEHOLDER_COLOR: [u8; 3] = [0x9c, 0xa3, 0xaf];
const PLACEHOLDER_INSET: f32 = 20.0;

/// What goes into one surface.
#[derive(Clone, Copy)]
pub struct Scene<'a> {
    pub canvas: &'a CanvasDimensions,
    pub transform: &'a Transform,
    pub image: Option<&'a Pixmap>,
    pub frame: &'a Pixmap,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Renderer {
    pixel_ratio: f32,
}

impl Renderer {
    pub fn new(pixel_ratio: f32) -> Self {
        Self {
            pixel_ratio: pixel_ratio.max(1.0),
        }
    }

    pub fn pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }

    fn blank(&self, canvas: &CanvasDimensions) -> Result<Pixmap> {
        let (width, height) = canvas.device_size(self.pixel_ratio);
        Pixmap::new(width, height)
            .ok_or_else(|| StudioError::encoding(format!("cannot allocate a {width}x{height} surface")))
    }

    fn base(&self) -> SkTransform {
        SkTransform::from_scale(self.pixel_ratio, self.pixel_ratio)
    }

    /// Photo and frame, with handles on top when `overlay` is given.
    pub fn render_composite(&self, scene: Scene<'_>, overlay: Option<&HandleSet>) -> Result<Pixmap> {
        let mut pixmap = self.blank(scene.canvas)?;
        pixmap.fill(Color::WHITE);

        match scene.image {
            Some(image) => self.draw_image(&mut pixmap, scene.canvas, scene.transform, image),
            None => self.draw_placeholder(&mut pixmap, scene.canvas),
        }

        self.draw_frame(&mut pixmap, scene.canvas, scene.frame);

        if let (Some(handles), Some(_)) = (overlay, scene.image) {
            self.draw_handles(&mut pixmap, handles);
        }

        Ok(pixmap)
    }

    /// Photo alone on a transparent background.
    pub fn render_content(&self, scene: Scene<'_>) -> Result<Pixmap> {
        let image = scene
            .image
            .ok_or_else(|| StudioError::validation("Please upload an image first."))?;

        let mut pixmap = self.blank(scene.canvas)?;
        self.draw_image(&mut pixmap, scene.canvas, scene.transform, image);
        Ok(pixmap)
    }

    fn draw_image(
        &self,
        pixmap: &mut Pixmap,
        canvas: &CanvasDimensions,
        transform: &Transform,
        image: &Pixmap,
    ) {
        let (iw, ih) = (image.width() as f32, image.height() as f32);
        let base = geometry::cover_fit_size(f64::from(iw / ih), canvas);
        let (bw, bh) = (base.width as f32, base.height as f32);
        let scale = transform.scale as f32;

        let placement = self
            .base()
            .pre_translate(transform.x as f32, transform.y as f32)
            .pre_rotate(transform.rotation_degrees as f32)
            .pre_scale(scale, scale)
            .pre_translate(-bw / 2.0, -bh / 2.0)
            .pre_scale(bw / iw, bh / ih);

        let paint = PixmapPaint {
            quality: FilterQuality::Bicubic,
            ..PixmapPaint::default()
        };
        pixmap.draw_pixmap(0, 0, image.as_ref(), &paint, placement, None);
    }

    fn draw_frame(&self, pixmap: &mut Pixmap, canvas: &CanvasDimensions, frame: &Pixmap) {
        let stretch = self.base().pre_scale(
            canvas.width as f32 / frame.width() as f32,
            canvas.height as f32 / frame.height() as f32,
        );
        let paint = PixmapPaint {
            quality: FilterQuality::Bicubic,
            ..PixmapPaint::default()
        };
        pixmap.draw_pixmap(0, 0, frame.as_ref(), &paint, stretch, None);
    }

    /// Dashed outline with a picture glyph in the middle.
    fn draw_placeholder(&self, pixmap: &mut Pixmap, canvas: &CanvasDimensions) {
        let (w, h) = (canvas.width as f32, canvas.height as f32);
        let paint = solid(PLACEHOLDER_COLOR);
        let base = self.base();

        if let Some(outline) = Rect::from_xywh(
            PLACEHOLDER_INSET,
            PLACEHOLDER_INSET,
            w - 2.0 * PLACEHOLDER_INSET,
            h - 2.0 * PLACEHOLDER_INSET,
        ) {
            let stroke = Stroke {
                width: 2.0,
                dash: StrokeDash::new(vec![5.0, 5.0], 0.0),
                ..Stroke::default()
            };
            let path = PathBuilder::from_rect(outline);
            pixmap.stroke_path(&path, &paint, &stroke, base, None);
        }

        // Picture glyph: a frame with a mountain and a sun
        let (cx, cy) = (w / 2.0, h / 2.0);
        if let Some(glyph) = Rect::from_xywh(cx - 24.0, cy - 18.0, 48.0, 36.0) {
            let path = PathBuilder::from_rect(glyph);
            let stroke = Stroke {
                width: 2.0,
                ..Stroke::default()
            };
            pixmap.stroke_path(&path, &paint, &stroke, base, None);
        }

        let mut mountain = PathBuilder::new();
        mountain.move_to(cx - 20.0, cy + 14.0);
        mountain.line_to(cx - 6.0, cy - 4.0);
        mountain.line_to(cx + 4.0, cy + 6.0);
        mountain.line_to(cx + 10.0, cy);
        mountain.line_to(cx + 20.0, cy + 14.0);
        mountain.close();
        if let Some(path) = mountain.finish() {
            pixmap.fill_path(&path, &paint, FillRule::Winding, base, None);
        }

        if let Some(sun) = PathBuilder::from_circle(cx + 12.0, cy - 9.0, 4.0) {
            pixmap.fill_path(&sun, &paint, FillRule::Winding, base, None);
        }
    }

    fn draw_handles(&self, pixmap: &mut Pixmap, handles: &HandleSet) {
        let base = self.base();
        let handle_paint = solid(HANDLE_COLOR);
        let rotate_paint = solid(ROTATE_COLOR);
        let line = Stroke {
            width: 2.0,
            ..Stroke::default()
        };

        // Rotated bounding box
        let mut outline = PathBuilder::new();
        let [first, rest @ ..] = &handles.corners;
        outline.move_to(first.x as f32, first.y as f32);
        for corner in rest {
            outline.line_to(corner.x as f32, corner.y as f32);
        }
        outline.close();
        if let Some(path) = outline.finish() {
            pixmap.stroke_path(&path, &handle_paint, &line, base, None);
        }

        // Connector from the top edge to the rotate knob
        let mut connector = PathBuilder::new();
        connector.move_to(handles.top_center.x as f32, handles.top_center.y as f32);
        connector.line_to(handles.rotate.x as f32, handles.rotate.y as f32);
        if let Some(path) = connector.finish() {
            pixmap.stroke_path(&path, &rotate_paint, &line, base, None);
        }

        let half = (HANDLE_DRAW_SIZE / 2.0) as f32;
        for corner in &handles.corners {
            if let Some(rect) = Rect::from_xywh(
                corner.x as f32 - half,
                corner.y as f32 - half,
                2.0 * half,
                2.0 * half,
            ) {
                pixmap.fill_rect(rect, &handle_paint, base, None);
            }
        }

        if let Some(knob) = PathBuilder::from_circle(
            handles.rotate.x as f32,
            handles.rotate.y as f32,
            ROTATE_HANDLE_RADIUS as f32,
        ) {
            pixmap.fill_path(&knob, &rotate_paint, FillRule::Winding, base, None);
        }
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new(2.0)
    }
}

fn solid([r, g, b]: [u8; 3]) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(r, g, b, 255);
    paint.anti_alias = true;
    paint
}

/// Paint that punches fully transparent holes.
pub(crate) fn eraser() -> Paint<'static> {
    let mut paint = Paint::default();
    paint.blend_mode = BlendMode::Clear;
    paint
}
