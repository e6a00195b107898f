// ============================================================================
// GEOMETRY: mapping between display space and natural pixel space
// ============================================================================
//
// Display space: CSS-like pixels of the on-screen image element.
// Natural space: pixels of the underlying raster.
// The two are related by an independent scale per axis; images are not
// assumed to keep their aspect ratio on screen.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn sub(self, other: Point) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn from_pixels(width: u32, height: u32) -> Self {
        Self::new(width as f32, height as f32)
    }
}

/// Axis-aligned rectangle: top-left origin plus extent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn has_positive_area(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    /// Overlap of two rectangles, `None` when it has no area.
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let clipped = Rect::new(x, y, self.right().min(other.right()) - x, self.bottom().min(other.bottom()) - y);
        clipped.has_positive_area().then_some(clipped)
    }
}

/// Integer pixel coordinate in natural space (hotspot form).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelPoint {
    pub x: i32,
    pub y: i32,
}

/// Per-axis display→natural scale factors.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Scale {
    pub x: f32,
    pub y: f32,
}

impl Scale {
    pub const IDENTITY: Scale = Scale { x: 1.0, y: 1.0 };

    /// `natural / displayed`, computed independently per axis.
    /// Returns `None` when the displayed size is degenerate.
    pub fn display_to_natural(displayed: Size, natural: Size) -> Option<Scale> {
        if displayed.width <= 0.0 || displayed.height <= 0.0 {
            return None;
        }
        Some(Scale {
            x: natural.width / displayed.width,
            y: natural.height / displayed.height,
        })
    }
}

/// Map a display-space point into natural space, keeping sub-pixel precision.
/// Used for drag and crop. A degenerate displayed size maps to the origin.
pub fn display_to_natural(point: Point, displayed: Size, natural: Size) -> Point {
    match Scale::display_to_natural(displayed, natural) {
        Some(scale) => Point::new(point.x * scale.x, point.y * scale.y),
        None => Point::ZERO,
    }
}

/// Map a display-space point to the nearest natural pixel. Used for hotspots.
pub fn display_to_natural_pixel(point: Point, displayed: Size, natural: Size) -> PixelPoint {
    let p = display_to_natural(point, displayed, natural);
    PixelPoint {
        x: p.x.round() as i32,
        y: p.y.round() as i32,
    }
}

/// Pointer event position relative to the container's top-left corner.
pub fn client_to_local(point: Point, container: Rect) -> Point {
    point.sub(container.origin())
}

/// Inclusive containment test.
pub fn within_bounds(point: Point, rect: Rect) -> bool {
    point.x >= rect.x && point.x <= rect.right() && point.y >= rect.y && point.y <= rect.bottom()
}

/// Scale every coordinate and dimension of a display-space rectangle.
pub fn rect_to_natural(rect: Rect, scale: Scale) -> Rect {
    Rect::new(
        rect.x * scale.x,
        rect.y * scale.y,
        rect.width * scale.x,
        rect.height * scale.y,
    )
}

/// Build a rectangle from two drag corners (any order).
pub fn rect_from_corners(a: Point, b: Point) -> Rect {
    let x = a.x.min(b.x);
    let y = a.y.min(b.y);
    Rect::new(x, y, (a.x - b.x).abs(), (a.y - b.y).abs())
}

/// Crop selection aspect constraint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum AspectConstraint {
    #[default]
    Free,
    /// Positive width:height ratio.
    Ratio(f32, f32),
}

impl AspectConstraint {
    pub const SQUARE: AspectConstraint = AspectConstraint::Ratio(1.0, 1.0);
    pub const WIDE: AspectConstraint = AspectConstraint::Ratio(16.0, 9.0);
    pub const STANDARD: AspectConstraint = AspectConstraint::Ratio(4.0, 3.0);

    pub fn presets() -> &'static [AspectConstraint] {
        &[
            AspectConstraint::Free,
            AspectConstraint::SQUARE,
            AspectConstraint::WIDE,
            AspectConstraint::STANDARD,
        ]
    }

    pub fn label(&self) -> String {
        match self {
            AspectConstraint::Free => "Free".to_string(),
            AspectConstraint::Ratio(w, h) => format!("{}:{}", w, h),
        }
    }

    /// `width / height`, or `None` when unconstrained or invalid.
    pub fn ratio(&self) -> Option<f32> {
        match *self {
            AspectConstraint::Ratio(w, h) if w > 0.0 && h > 0.0 => Some(w / h),
            _ => None,
        }
    }
}

/// Shrink `rect` to the constraint's ratio, keeping its origin.
/// The result always fits inside the input rectangle.
pub fn constrain_to_aspect(rect: Rect, constraint: AspectConstraint) -> Rect {
    let Some(ratio) = constraint.ratio() else {
        return rect;
    };
    if !rect.has_positive_area() {
        return rect;
    }
    let width_from_height = rect.height * ratio;
    if width_from_height <= rect.width {
        Rect::new(rect.x, rect.y, width_from_height, rect.height)
    } else {
        Rect::new(rect.x, rect.y, rect.width, rect.width / ratio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_to_natural_scales_axes_independently() {
        let displayed = Size::new(500.0, 100.0);
        let natural = Size::new(1000.0, 400.0);
        let p = display_to_natural(Point::new(10.0, 10.0), displayed, natural);
        assert_eq!(p, Point::new(20.0, 40.0));
    }

    #[test]
    fn hotspot_rounds_to_nearest_pixel() {
        let displayed = Size::new(300.0, 300.0);
        let natural = Size::new(1000.0, 1000.0);
        let p = display_to_natural_pixel(Point::new(100.0, 50.0), displayed, natural);
        // 333.33 -> 333, 166.67 -> 167
        assert_eq!(p, PixelPoint { x: 333, y: 167 });
    }

    #[test]
    fn degenerate_display_size_maps_to_origin() {
        let p = display_to_natural(Point::new(5.0, 5.0), Size::new(0.0, 10.0), Size::new(10.0, 10.0));
        assert_eq!(p, Point::ZERO);
    }

    #[test]
    fn client_to_local_subtracts_container_origin() {
        let container = Rect::new(40.0, 60.0, 200.0, 100.0);
        assert_eq!(client_to_local(Point::new(50.0, 65.0), container), Point::new(10.0, 5.0));
    }

    #[test]
    fn within_bounds_is_inclusive() {
        let r = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(within_bounds(Point::new(10.0, 10.0), r));
        assert!(within_bounds(Point::new(0.0, 5.0), r));
        assert!(!within_bounds(Point::new(10.1, 5.0), r));
        assert!(!within_bounds(Point::new(-0.1, 5.0), r));
    }

    #[test]
    fn crop_rect_maps_per_axis() {
        let scale = Scale::display_to_natural(Size::new(500.0, 250.0), Size::new(1000.0, 500.0)).unwrap();
        let natural = rect_to_natural(Rect::new(100.0, 50.0, 100.0, 50.0), scale);
        assert_eq!(natural, Rect::new(200.0, 100.0, 200.0, 100.0));
    }

    #[test]
    fn corners_normalize() {
        let r = rect_from_corners(Point::new(30.0, 5.0), Point::new(10.0, 25.0));
        assert_eq!(r, Rect::new(10.0, 5.0, 20.0, 20.0));
    }

    #[test]
    fn aspect_constraint_fits_inside() {
        let r = constrain_to_aspect(Rect::new(0.0, 0.0, 100.0, 30.0), AspectConstraint::SQUARE);
        assert_eq!(r, Rect::new(0.0, 0.0, 30.0, 30.0));
        let r = constrain_to_aspect(Rect::new(5.0, 5.0, 160.0, 200.0), AspectConstraint::WIDE);
        assert_eq!((r.x, r.y, r.width), (5.0, 5.0, 160.0));
        assert!((r.height - 90.0).abs() < 1e-3);
        let free = Rect::new(1.0, 2.0, 3.0, 4.0);
        assert_eq!(constrain_to_aspect(free, AspectConstraint::Free), free);
    }

    #[test]
    fn intersect_clips_and_rejects_disjoint() {
        let bounds = Rect::new(0.0, 0.0, 100.0, 100.0);
        assert_eq!(
            Rect::new(50.0, 50.0, 100.0, 100.0).intersect(&bounds),
            Some(Rect::new(50.0, 50.0, 50.0, 50.0))
        );
        assert_eq!(Rect::new(120.0, 0.0, 10.0, 10.0).intersect(&bounds), None);
        assert_eq!(Rect::new(100.0, 0.0, 10.0, 10.0).intersect(&bounds), None);
    }
}
