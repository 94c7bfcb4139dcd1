/// Placement geometry for the photo inside the frame.
///
/// Everything here is pure math in canvas (CSS-like, y-down) pixels:
/// cover-fit sizing, where the resize/rotate handles sit for a given
/// transform, which handle a pointer is over, and how a pointer drag maps to
/// a new scale or rotation.

use cgmath::{Basis2, Deg, InnerSpace, Point2, Rotation, Rotation2, Vector2};

use crate::state::transform::CanvasDimensions;

/// Lower bound for the image scale factor.
pub const MIN_SCALE: f64 = 0.1;
/// Upper bound used by the scale slider.
pub const MAX_SLIDER_SCALE: f64 = 3.0;
/// Half the side of the square hit region around a corner handle.
pub const HANDLE_HIT_HALF_SIZE: f64 = 6.0;
/// Side of the square drawn for a corner handle.
pub const HANDLE_DRAW_SIZE: f64 = 10.0;
/// Radius of the rotate knob, both drawn and hit-tested.
pub const ROTATE_HANDLE_RADIUS: f64 = 8.0;
/// Straight-up screen offset of the rotate knob from the box's top-center.
pub const ROTATE_HANDLE_OFFSET: f64 = 24.0;

/// Width and height of the image as drawn on the canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawSize {
    pub width: f64,
    pub height: f64,
}

impl DrawSize {
    pub fn scaled(self, scale: f64) -> Self {
        Self {
            width: self.width * scale,
            height: self.height * scale,
        }
    }

    /// Longest side, used as the reference length for resize drags.
    pub fn reference(&self) -> f64 {
        self.width.max(self.height)
    }
}

/// Size that makes an image of `image_aspect` fully cover the canvas at
/// scale 1, cropping whatever overflows.
pub fn cover_fit_size(image_aspect: f64, canvas: &CanvasDimensions) -> DrawSize {
    if image_aspect > canvas.aspect() {
        // Wider than the canvas: match heights, overflow horizontally
        let height = canvas.height;
        DrawSize {
            width: height * image_aspect,
            height,
        }
    } else {
        // Taller than the canvas: match widths, overflow vertically
        let width = canvas.width;
        DrawSize {
            width,
            height: width / image_aspect,
        }
    }
}

/// Cover-fit size multiplied by the current scale.
pub fn current_draw_size(image_aspect: f64, canvas: &CanvasDimensions, scale: f64) -> DrawSize {
    cover_fit_size(image_aspect, canvas).scaled(scale)
}

/// Rotate `offset` by `rotation_degrees` with the standard rotation matrix.
///
/// In y-down screen space a positive angle turns clockwise.
pub fn rotate_offset(offset: Vector2<f64>, rotation_degrees: f64) -> Vector2<f64> {
    let basis: Basis2<f64> = Rotation2::from_angle(Deg(rotation_degrees));
    basis.rotate_vector(offset)
}

/// The four resize corners, named by compass direction before rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Corner {
    NorthWest,
    NorthEast,
    SouthEast,
    SouthWest,
}

impl Corner {
    pub const ALL: [Corner; 4] = [
        Corner::NorthWest,
        Corner::NorthEast,
        Corner::SouthEast,
        Corner::SouthWest,
    ];

    /// Signs of the (x, y) half-extent offsets for this corner.
    pub fn signs(self) -> (f64, f64) {
        match self {
            Corner::NorthWest => (-1.0, -1.0),
            Corner::NorthEast => (1.0, -1.0),
            Corner::SouthEast => (1.0, 1.0),
            Corner::SouthWest => (-1.0, 1.0),
        }
    }

    fn index(self) -> usize {
        match self {
            Corner::NorthWest => 0,
            Corner::NorthEast => 1,
            Corner::SouthEast => 2,
            Corner::SouthWest => 3,
        }
    }
}

/// Anything the pointer can grab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handle {
    Corner(Corner),
    Rotate,
}

/// Screen positions of every handle for one frame.
///
/// Always recomputed from the transform; never stored between frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandleSet {
    pub center: Point2<f64>,
    /// Corner positions in NW, NE, SE, SW order.
    pub corners: [Point2<f64>; 4],
    /// Rotated midpoint of the top edge, where the knob's connector starts.
    pub top_center: Point2<f64>,
    pub rotate: Point2<f64>,
}

impl HandleSet {
    pub fn corner(&self, corner: Corner) -> Point2<f64> {
        self.corners[corner.index()]
    }
}

/// Compute handle positions for a box of `size` centered at `center` and
/// rotated by `rotation_degrees`.
///
/// The rotate knob is the rotated top-center point moved straight up by
/// [`ROTATE_HANDLE_OFFSET`] in screen space. The offset itself does not
/// rotate with the box, so the knob's distance from the edge varies with the
/// angle.
pub fn handle_positions(center: Point2<f64>, size: DrawSize, rotation_degrees: f64) -> HandleSet {
    let half_w = size.width / 2.0;
    let half_h = size.height / 2.0;

    let corners = Corner::ALL.map(|corner| {
        let (sx, sy) = corner.signs();
        center + rotate_offset(Vector2::new(sx * half_w, sy * half_h), rotation_degrees)
    });

    let top_center = center + rotate_offset(Vector2::new(0.0, -half_h), rotation_degrees);
    let rotate = Point2::new(top_center.x, top_center.y - ROTATE_HANDLE_OFFSET);

    HandleSet {
        center,
        corners,
        top_center,
        rotate,
    }
}

/// Find the handle under `point`, corners first.
pub fn hit_test(point: Point2<f64>, handles: &HandleSet) -> Option<Handle> {
    for corner in Corner::ALL {
        let h = handles.corner(corner);
        if (point.x - h.x).abs() <= HANDLE_HIT_HALF_SIZE
            && (point.y - h.y).abs() <= HANDLE_HIT_HALF_SIZE
        {
            return Some(Handle::Corner(corner));
        }
    }

    let d = point - handles.rotate;
    if d.magnitude2() <= ROTATE_HANDLE_RADIUS * ROTATE_HANDLE_RADIUS {
        return Some(Handle::Rotate);
    }

    None
}

/// Projection captured when a corner handle is grabbed.
///
/// Pointer motion is projected onto the unit vector from the center to the
/// grabbed corner, so scaling is continuous at grab time and behaves the same
/// at any rotation and from any corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeProjection {
    pub direction: Vector2<f64>,
    pub initial_along: f64,
    pub start_scale: f64,
    pub reference: f64,
}

impl ResizeProjection {
    /// Capture the projection for a grab of `corner` at `pointer`.
    ///
    /// `size` is the current draw size (already multiplied by `start_scale`).
    pub fn begin(
        handles: &HandleSet,
        corner: Corner,
        pointer: Point2<f64>,
        size: DrawSize,
        start_scale: f64,
    ) -> Self {
        let to_handle = handles.corner(corner) - handles.center;
        let len = to_handle.magnitude();
        let len = if len > 0.0 { len } else { 1.0 };
        let direction = to_handle / len;

        Self {
            direction,
            initial_along: (pointer - handles.center).dot(direction),
            start_scale,
            reference: size.reference(),
        }
    }

    /// Scale for the pointer at `pointer`, floored at [`MIN_SCALE`].
    pub fn scale_at(&self, center: Point2<f64>, pointer: Point2<f64>) -> f64 {
        let along = (pointer - center).dot(self.direction);
        let delta = along - self.initial_along;
        (self.start_scale * (1.0 + delta / self.reference)).max(MIN_SCALE)
    }
}

/// Angle of the pointer around the center, in radians.
pub fn pointer_angle(center: Point2<f64>, pointer: Point2<f64>) -> f64 {
    (pointer.y - center.y).atan2(pointer.x - center.x)
}

/// Reference captured when the rotate knob is grabbed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationGrab {
    /// Pointer angle at grab time, radians.
    pub start_angle: f64,
    /// Transform rotation at grab time, degrees.
    pub start_rotation: f64,
}

impl RotationGrab {
    pub fn begin(center: Point2<f64>, pointer: Point2<f64>, start_rotation: f64) -> Self {
        Self {
            start_angle: pointer_angle(center, pointer),
            start_rotation,
        }
    }

    /// Rotation in degrees that follows the pointer's angular displacement.
    ///
    /// The result is not normalized.
    pub fn rotation_at(&self, center: Point2<f64>, pointer: Point2<f64>) -> f64 {
        let delta = pointer_angle(center, pointer) - self.start_angle;
        self.start_rotation + delta.to_degrees()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const EPS: f64 = 1e-9;

    fn canvas() -> CanvasDimensions {
        CanvasDimensions::new(300.0, 400.0)
    }

    #[test]
    fn test_cover_fit_matches_height_for_wide_images() {
        let size = cover_fit_size(800.0 / 600.0, &canvas());
        assert_eq!(size.height, 400.0);
        assert!((size.width - 533.333_333).abs() < 1e-3);
    }

    #[test]
    fn test_cover_fit_matches_width_for_tall_images() {
        let size = cover_fit_size(0.5, &canvas());
        assert_eq!(size.width, 300.0);
        assert_eq!(size.height, 600.0);
    }

    #[test]
    fn test_cover_fit_always_covers_canvas() {
        for aspect in [0.2, 0.5, 0.75, 1.0, 1.5, 3.0] {
            let size = cover_fit_size(aspect, &canvas());
            assert!(size.width >= 300.0 - EPS);
            assert!(size.height >= 400.0 - EPS);
        }
    }

    #[test]
    fn test_unrotated_handles_sit_on_box_corners() {
        let handles = handle_positions(
            Point2::new(150.0, 200.0),
            DrawSize { width: 100.0, height: 60.0 },
            0.0,
        );
        assert_eq!(handles.corner(Corner::NorthWest), Point2::new(100.0, 170.0));
        assert_eq!(handles.corner(Corner::SouthEast), Point2::new(200.0, 230.0));
        assert_eq!(handles.top_center, Point2::new(150.0, 170.0));
        assert_eq!(handles.rotate, Point2::new(150.0, 146.0));
    }

    #[test]
    fn test_rotate_knob_offset_stays_vertical_when_box_turns() {
        let handles = handle_positions(
            Point2::new(0.0, 0.0),
            DrawSize { width: 100.0, height: 100.0 },
            90.0,
        );
        // Top-center of a box turned 90 degrees clockwise lands on the right.
        assert!((handles.top_center.x - 50.0).abs() < EPS);
        assert!(handles.top_center.y.abs() < EPS);
        // The knob still moves straight up in screen space.
        assert!((handles.rotate.x - 50.0).abs() < EPS);
        assert!((handles.rotate.y + ROTATE_HANDLE_OFFSET).abs() < EPS);
    }

    #[test]
    fn test_hit_test_prefers_corners_then_knob() {
        let handles = handle_positions(
            Point2::new(150.0, 200.0),
            DrawSize { width: 100.0, height: 60.0 },
            0.0,
        );
        assert_eq!(
            hit_test(Point2::new(105.0, 175.0), &handles),
            Some(Handle::Corner(Corner::NorthWest))
        );
        assert_eq!(
            hit_test(Point2::new(106.0, 176.0), &handles),
            Some(Handle::Corner(Corner::NorthWest))
        );
        assert_eq!(hit_test(Point2::new(107.0, 170.0), &handles), None);
        assert_eq!(hit_test(Point2::new(155.0, 150.0), &handles), Some(Handle::Rotate));
        assert_eq!(hit_test(Point2::new(150.0, 137.0), &handles), None);
        assert_eq!(hit_test(Point2::new(150.0, 200.0), &handles), None);
    }

    #[test]
    fn test_resize_is_continuous_at_grab() {
        let center = Point2::new(150.0, 200.0);
        let size = DrawSize { width: 533.3, height: 400.0 };
        let handles = handle_positions(center, size, 30.0);
        let grab = handles.corner(Corner::NorthEast) + Vector2::new(2.0, -3.0);
        let projection = ResizeProjection::begin(&handles, Corner::NorthEast, grab, size, 1.0);
        assert!((projection.scale_at(center, grab) - 1.0).abs() < EPS);
    }

    #[test]
    fn test_resize_never_drops_below_minimum() {
        let center = Point2::new(0.0, 0.0);
        let size = DrawSize { width: 200.0, height: 100.0 };
        let handles = handle_positions(center, size, 0.0);
        let grab = handles.corner(Corner::SouthEast);
        let projection = ResizeProjection::begin(&handles, Corner::SouthEast, grab, size, 1.0);
        let scale = projection.scale_at(center, Point2::new(-1000.0, -1000.0));
        assert_eq!(scale, MIN_SCALE);
    }

    #[test]
    fn test_rotation_crossing_negative_x_axis_stays_trig_equivalent() {
        let center = Point2::new(0.0, 0.0);
        let grab = RotationGrab::begin(center, Point2::new(-10.0, -0.1), 0.0);
        let rotation = grab.rotation_at(center, Point2::new(-10.0, 0.1));
        let wrapped = rotation.to_radians();
        let expected = 2.0 * (0.1f64 / 10.0).atan();
        // A jump of a full turn is allowed; the angle itself must match.
        assert!((wrapped.sin() - (-expected).sin()).abs() < 1e-6);
        assert!((wrapped.cos() - (-expected).cos()).abs() < 1e-6);
    }

    proptest! {
        #[test]
        fn test_handles_follow_rotation_matrix(
            scale in 0.1f64..3.0,
            rotation in -1080.0f64..1080.0,
            cx in -500.0f64..500.0,
            cy in -500.0f64..500.0,
        ) {
            let size = cover_fit_size(4.0 / 3.0, &canvas()).scaled(scale);
            let center = Point2::new(cx, cy);
            let handles = handle_positions(center, size, rotation);
            let (sin, cos) = rotation.to_radians().sin_cos();

            for corner in Corner::ALL {
                let (sx, sy) = corner.signs();
                let ox = sx * size.width / 2.0;
                let oy = sy * size.height / 2.0;
                let expected_x = cx + ox * cos - oy * sin;
                let expected_y = cy + ox * sin + oy * cos;
                let actual = handles.corner(corner);
                prop_assert!((actual.x - expected_x).abs() < 1e-6);
                prop_assert!((actual.y - expected_y).abs() < 1e-6);
            }
        }

        #[test]
        fn test_radial_drag_scales_linearly(
            start_scale in 0.5f64..3.0,
            rotation in -720.0f64..720.0,
            delta in -20.0f64..200.0,
            corner_idx in 0usize..4,
        ) {
            let corner = Corner::ALL[corner_idx];
            let center = Point2::new(150.0, 200.0);
            let size = cover_fit_size(4.0 / 3.0, &canvas()).scaled(start_scale);
            let handles = handle_positions(center, size, rotation);
            let grab = handles.corner(corner);
            let projection = ResizeProjection::begin(&handles, corner, grab, size, start_scale);

            let moved = grab + projection.direction * delta;
            let expected = (start_scale * (1.0 + delta / size.reference())).max(MIN_SCALE);
            prop_assert!((projection.scale_at(center, moved) - expected).abs() < 1e-9);
        }

        #[test]
        fn test_rotate_drag_tracks_angular_displacement(
            start_rotation in -360.0f64..360.0,
            start_angle in -170.0f64..170.0,
            delta in -9.0f64..9.0,
            grab_radius in 5.0f64..400.0,
            move_radius in 5.0f64..400.0,
        ) {
            let center = Point2::new(150.0, 200.0);
            let at = |deg: f64, radius: f64| {
                let (s, c) = deg.to_radians().sin_cos();
                Point2::new(center.x + radius * c, center.y + radius * s)
            };
            let grab = RotationGrab::begin(center, at(start_angle, grab_radius), start_rotation);
            let rotation = grab.rotation_at(center, at(start_angle + delta, move_radius));
            prop_assert!((rotation - (start_rotation + delta)).abs() < 1e-6);
        }
    }
}
